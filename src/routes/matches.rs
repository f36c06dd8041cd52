use actix_web::{web, HttpResponse, Responder};
use validator::Validate;
use crate::models::{ErrorResponse, FindMatchesRequest, FindMatchesResponse, HealthResponse};
use crate::routes::AppState;

/// Configure all match-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/matches/find", web::post().to(find_matches));
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        model_loaded: state.pricing.model().is_loaded(),
    })
}

/// Find matches endpoint
///
/// POST /api/v1/matches/find
///
/// Request body:
/// ```json
/// {
///   "load": { "originLat": 40.0, "originLng": -75.0, "equipmentType": "flatbed", ... },
///   "carriers": [{ "id": 1, "operatingRegions": "[...]", "equipmentTypes": ["flatbed"], ... }],
///   "topK": 5
/// }
/// ```
async fn find_matches(
    state: web::Data<AppState>,
    req: web::Json<FindMatchesRequest>,
) -> impl Responder {
    // Validate request
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for find_matches request: field_errors={:?}", errors);
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        });
    }

    let FindMatchesRequest { load, carriers, top_k } = req.into_inner();
    // Cap top_k to keep responses bounded
    let top_k = top_k
        .map(usize::from)
        .unwrap_or(state.default_top_k)
        .min(state.max_top_k);

    tracing::info!("Finding matches for load {} among {} carriers, top_k: {}", load.label(), carriers.len(), top_k);

    let matcher = state.matcher.clone();
    let result = match web::block(move || matcher.find_matches(&load, &carriers, top_k)).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("Matching task failed: {}", e);
            return HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Matching failed".to_string(),
                message: e.to_string(),
                status_code: 500,
            });
        }
    };

    let response = FindMatchesResponse {
        total_carriers: result.total_carriers,
        degraded_carriers: result.degraded,
        matches: result.matches,
    };

    tracing::info!(
        "Returning {} matches (from {} carriers, {} degraded)",
        response.matches.len(),
        response.total_carriers,
        response.degraded_carriers.len()
    );

    HttpResponse::Ok().json(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Matcher, PricingEngine};
    use crate::routes::configure_routes;
    use actix_web::{test, App};
    use serde_json::json;
    use std::sync::Arc;

    fn test_state() -> AppState {
        AppState {
            matcher: Matcher::default(),
            pricing: Arc::new(PricingEngine::with_defaults()),
            default_top_k: 5,
            max_top_k: 100,
        }
    }

    #[actix_web::test]
    async fn test_health_check() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/health").to_request();
        let body: HealthResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body.status, "healthy");
        assert!(!body.model_loaded);
    }

    #[actix_web::test]
    async fn test_find_matches_endpoint() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/matches/find")
            .set_json(json!({
                "load": {
                    "originLat": 40.0, "originLng": -75.0,
                    "destinationLat": 41.0, "destinationLng": -76.0,
                    "weight": 1000, "equipmentType": "flatbed"
                },
                "carriers": [
                    {"id": 2, "companyName": "Far Van Co", "operatingRegions": "[{\"lat\":10,\"lng\":10}]",
                     "equipmentTypes": "[\"van\"]", "verificationStatus": "pending"},
                    {"id": 1, "companyName": "Near Flatbed", "operatingRegions": [{"lat": 40.1, "lng": -75.1}],
                     "equipmentTypes": ["flatbed"], "verificationStatus": "verified"},
                    {"id": 3, "fleetSize": "unknown"}
                ],
                "topK": 5
            }))
            .to_request();

        let body: FindMatchesResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body.total_carriers, 3);
        assert_eq!(body.matches.len(), 2);
        assert_eq!(body.matches[0].carrier_id, "1");
        assert_eq!(body.degraded_carriers, vec!["3".to_string()]);
    }

    #[actix_web::test]
    async fn test_find_matches_tolerates_loose_carrier_records() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/matches/find")
            .set_json(json!({
                "load": {
                    "originLat": 40.0, "originLng": -75.0,
                    "destinationLat": 41.0, "destinationLng": -76.0,
                    "weight": 1000, "equipmentType": 53
                },
                "carriers": [
                    {"id": "a", "companyName": null, "verificationStatus": null,
                     "operatingRegions": [{"lat": 40.0, "lng": -75.0}]},
                    {"companyName": "no id"},
                    null,
                    {"id": "d", "verificationStatus": 1, "equipmentTypes": ["53"]}
                ]
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::OK);

        let body: FindMatchesResponse = test::read_body_json(resp).await;
        assert_eq!(body.total_carriers, 4);
        assert_eq!(body.degraded_carriers, vec!["2".to_string()]);

        let ids: Vec<&str> = body.matches.iter().map(|m| m.carrier_id.as_str()).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.contains(&"a"));
        assert!(ids.contains(&"1"));
        assert!(ids.contains(&"d"));
    }

    #[actix_web::test]
    async fn test_find_matches_rejects_zero_top_k() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(test_state()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/matches/find")
            .set_json(json!({"load": {}, "carriers": [], "topK": 0}))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }
}
