// Route exports
pub mod matches;
pub mod pricing;

use actix_web::web;
use crate::core::{Matcher, PricingEngine};
use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub matcher: Matcher,
    pub pricing: Arc<PricingEngine>,
    pub default_top_k: usize,
    pub max_top_k: usize,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(matches::configure)
            .configure(pricing::configure),
    );
}
