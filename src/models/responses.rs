use serde::{Deserialize, Serialize};
use crate::models::domain::ScoredCarrier;

/// Response for find matches endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindMatchesResponse {
    pub matches: Vec<ScoredCarrier>,
    #[serde(rename = "totalCarriers")]
    pub total_carriers: usize,
    #[serde(rename = "degradedCarriers")]
    pub degraded_carriers: Vec<String>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(rename = "modelLoaded")]
    pub model_loaded: bool,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
