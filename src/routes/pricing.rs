use actix_web::{web, HttpResponse, Responder};
use crate::models::{ErrorResponse, SuggestPriceRequest};
use crate::routes::AppState;

/// Configure pricing routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/pricing/suggest", web::post().to(suggest_price));
}

/// Price suggestion endpoint
///
/// POST /api/v1/pricing/suggest
///
/// Request body:
/// ```json
/// {
///   "load": { "originLat": 33.57, "originLng": -7.59, "pickupDate": "2024-06-03", ... },
///   "historicalLoads": [{ "price": 1800, "pickupDate": "2024-05-01", ... }]
/// }
/// ```
async fn suggest_price(
    state: web::Data<AppState>,
    req: web::Json<SuggestPriceRequest>,
) -> impl Responder {
    let SuggestPriceRequest { load, historical_loads } = req.into_inner();

    tracing::info!(
        "Suggesting price for load {} from {} historical loads",
        load.label(),
        historical_loads.len()
    );

    let engine = state.pricing.clone();
    match web::block(move || engine.suggest_price(&load, &historical_loads)).await {
        Ok(suggestion) => HttpResponse::Ok().json(suggestion),
        Err(e) => {
            tracing::error!("Pricing task failed: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Pricing failed".to_string(),
                message: e.to_string(),
                status_code: 500,
            })
        }
    }
}
