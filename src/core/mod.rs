// Core algorithm exports
pub mod distance;
pub mod features;
pub mod matcher;
pub mod pricing;
pub mod scoring;

pub use distance::{euclidean_distance, haversine_distance};
pub use features::{
    extract_carrier_features, extract_load_features, extract_pricing_features, CarrierFeatures,
    Extracted, LoadFeatures, PricingFeatures,
};
pub use matcher::{MatchResult, Matcher, DEFAULT_TOP_K};
pub use pricing::{PricingConfig, PricingEngine, PricingError};
pub use scoring::calculate_compatibility;
