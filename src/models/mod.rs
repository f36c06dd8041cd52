// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    Carrier, Confidence, Encoded, FeatureError, Load, PriceRange, PriceSuggestion, PricingSource,
    RawField, Region, ScoredCarrier, ScoringWeights, VerificationStatus,
};
pub use requests::{FindMatchesRequest, SuggestPriceRequest};
pub use responses::{ErrorResponse, FindMatchesResponse, HealthResponse};
