use serde::{Deserialize, Serialize};
use validator::Validate;
use crate::models::domain::{deserialize_carriers, deserialize_loads, Carrier, Load};

/// Request to rank carriers for a load
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FindMatchesRequest {
    pub load: Load,
    #[serde(default, deserialize_with = "deserialize_carriers")]
    pub carriers: Vec<Carrier>,
    #[validate(range(min = 1))]
    #[serde(alias = "top_k", rename = "topK")]
    pub top_k: Option<u16>,
}

/// Request for a price suggestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestPriceRequest {
    pub load: Load,
    #[serde(
        alias = "historical_loads",
        rename = "historicalLoads",
        default,
        deserialize_with = "deserialize_loads"
    )]
    pub historical_loads: Vec<Load>,
}
