//! Freight Analytics - load-carrier matching and dynamic pricing core
//!
//! This library ranks carriers against a load by geographic, equipment and
//! verification compatibility, and suggests a price band for a load from
//! historical transactions. Every public operation is total: malformed
//! records degrade to defaults instead of failing.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{Matcher, MatchResult, PricingConfig, PricingEngine, distance::haversine_distance};
pub use crate::models::{Carrier, Load, ScoredCarrier, PriceSuggestion, ScoringWeights, FindMatchesRequest, FindMatchesResponse};
pub use crate::services::ModelHandle;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        // Verify that the library exports work correctly
        let distance = haversine_distance(40.0, -75.0, 40.0, -75.0);
        assert_eq!(distance, 0.0);

        let result = Matcher::default().find_matches(&Load::default(), &[], 5);
        assert!(result.matches.is_empty());
    }
}
