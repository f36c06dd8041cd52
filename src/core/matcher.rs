use crate::core::{
    features::{extract_carrier_features, extract_load_features},
    scoring::{calculate_compatibility, describe},
};
use crate::models::{Carrier, Load, ScoredCarrier, ScoringWeights};

/// Default number of carriers returned per load
pub const DEFAULT_TOP_K: usize = 5;

/// Result of the matching process
#[derive(Debug, Clone, Default)]
pub struct MatchResult {
    pub matches: Vec<ScoredCarrier>,
    pub total_carriers: usize,
    /// Carriers whose records could not be scored and were left out
    pub degraded: Vec<String>,
}

/// Main matching orchestrator - ranks a carrier pool against one load
///
/// # Pipeline Stages
/// 1. Feature extraction for the load and every carrier
/// 2. Compatibility scoring (proximity, equipment, verification)
/// 3. Scoring-error guard for degraded records
/// 4. Stable ranking and truncation
#[derive(Debug, Clone)]
pub struct Matcher {
    weights: ScoringWeights,
}

impl Matcher {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn with_default_weights() -> Self {
        Self {
            weights: ScoringWeights::default(),
        }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Find the best matching carriers for a load
    ///
    /// Carriers that score 0 are still ranked. Only carriers whose features
    /// could not be extracted (or whose score is not a number) are dropped,
    /// and their ids are reported in `degraded`.
    ///
    /// # Arguments
    /// * `load` - The load to place
    /// * `carriers` - Snapshot of the carrier pool
    /// * `top_k` - Maximum number of matches to return
    ///
    /// # Returns
    /// MatchResult with matches ordered by descending score, ties in input order
    pub fn find_matches(&self, load: &Load, carriers: &[Carrier], top_k: usize) -> MatchResult {
        let total_carriers = carriers.len();

        if carriers.is_empty() {
            return MatchResult::default();
        }

        let load_features = extract_load_features(load);
        if let Some(reason) = load_features.reason() {
            tracing::warn!(
                "Load {} has malformed features ({}), matching from zero vector",
                load.label(),
                reason
            );
        }
        let load_features = load_features.value();
        let required_equipment = load.required_equipment();

        let mut degraded = Vec::new();
        let mut scored_matches: Vec<ScoredCarrier> = carriers
            .iter()
            .filter_map(|carrier| {
                let features = extract_carrier_features(carrier);
                if let Some(reason) = features.reason() {
                    tracing::warn!("Skipping carrier {}: {}", carrier.id, reason);
                    degraded.push(carrier.id.clone());
                    return None;
                }

                let compatibility = calculate_compatibility(
                    &load_features,
                    required_equipment.as_deref(),
                    carrier,
                    &features.value(),
                    &self.weights,
                );

                if !compatibility.score.is_finite() {
                    tracing::warn!("Skipping carrier {}: score is not a number", carrier.id);
                    degraded.push(carrier.id.clone());
                    return None;
                }

                tracing::trace!("Carrier {} scored {:.4}", carrier.id, compatibility.score);

                Some(ScoredCarrier {
                    carrier_id: carrier.id.clone(),
                    name: carrier.name.clone(),
                    score: compatibility.score,
                    reason: describe(&compatibility, required_equipment.as_deref()),
                    distance_km: compatibility.distance_km,
                    equipment_match: compatibility.equipment_match,
                    is_verified: compatibility.verified,
                })
            })
            .collect();

        // Stable sort keeps input order for equal scores
        scored_matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        scored_matches.truncate(top_k);

        tracing::debug!(
            "Ranked {} of {} carriers for load {} ({} degraded)",
            scored_matches.len(),
            total_carriers,
            load.label(),
            degraded.len()
        );

        MatchResult {
            matches: scored_matches,
            total_carriers,
            degraded,
        }
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::with_default_weights()
    }
}
