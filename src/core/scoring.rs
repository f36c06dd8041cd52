use crate::core::distance::{euclidean_distance, haversine_distance};
use crate::core::features::{CarrierFeatures, LoadFeatures};
use crate::models::{Carrier, ScoringWeights};

/// Breakdown of a carrier's compatibility with a load
#[derive(Debug, Clone, PartialEq)]
pub struct Compatibility {
    /// Weighted score in [0, 1]
    pub score: f64,
    pub proximity: f64,
    pub equipment_match: bool,
    pub verified: bool,
    /// Great-circle km from the load origin to the carrier's region center
    pub distance_km: f64,
}

/// Calculate how compatible a carrier is with a load (0-1)
///
/// Scoring formula:
/// score = (
///     proximity * 0.6 +     # 1 / (1 + euclidean(origin, region center))
///     equipment * 0.3 +     # required equipment supported, or none required
///     verified * 0.1        # verificationStatus = verified
/// )
pub fn calculate_compatibility(
    load: &LoadFeatures,
    required_equipment: Option<&str>,
    carrier: &Carrier,
    features: &CarrierFeatures,
    weights: &ScoringWeights,
) -> Compatibility {
    let proximity = calculate_proximity_score(load.origin(), features.region_center());

    let equipment_match = match required_equipment {
        None => true,
        Some(tag) => carrier.equipment().iter().any(|supported| supported == tag),
    };
    let equipment_score = if equipment_match { 1.0 } else { 0.0 };

    let verified = features.verified >= 1.0;
    let verified_score = if verified { 1.0 } else { 0.0 };

    let total = proximity * weights.proximity
        + equipment_score * weights.equipment
        + verified_score * weights.verified;

    let (region_lat, region_lng) = features.region_center();
    let distance_km = haversine_distance(load.origin_lat, load.origin_lng, region_lat, region_lng);

    Compatibility {
        // NaN passes through so the matcher can treat it as a scoring failure
        score: if total.is_nan() { total } else { total.clamp(0.0, 1.0) },
        proximity,
        equipment_match,
        verified,
        distance_km,
    }
}

/// Calculate proximity score (0-1)
/// Same point = 1.0, decaying hyperbolically with coordinate distance
#[inline]
fn calculate_proximity_score(origin: (f64, f64), region_center: (f64, f64)) -> f64 {
    1.0 / (1.0 + euclidean_distance(origin, region_center))
}

/// Human-readable explanation of a compatibility score
pub fn describe(compatibility: &Compatibility, required_equipment: Option<&str>) -> String {
    let mut parts = vec![format!("{:.0} km from pickup", compatibility.distance_km)];

    match (required_equipment, compatibility.equipment_match) {
        (Some(tag), true) => parts.push(format!("supports {}", tag)),
        (Some(tag), false) => parts.push(format!("no {} equipment", tag)),
        (None, _) => parts.push("no equipment required".to_string()),
    }

    parts.push(if compatibility.verified { "verified" } else { "not verified" }.to_string());

    parts.join("; ")
}
