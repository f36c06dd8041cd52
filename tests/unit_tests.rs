// Unit tests for Freight Analytics

use freight_analytics::core::{
    distance::{euclidean_distance, haversine_distance},
    features::{extract_carrier_features, extract_load_features, extract_pricing_features},
    scoring::calculate_compatibility,
};
use freight_analytics::models::{Carrier, Encoded, Load, RawField, Region, ScoringWeights, VerificationStatus};
use chrono::NaiveDate;

fn carrier(lat: f64, lng: f64, equipment: &[&str], status: VerificationStatus) -> Carrier {
    Carrier::new("c", "Carrier")
        .with_regions(vec![Region { lat, lng }])
        .with_equipment(equipment)
        .with_status(status)
}

#[test]
fn test_haversine_distance_zero() {
    let distance = haversine_distance(40.7128, -74.0060, 40.7128, -74.0060);
    assert!(distance < 0.01);
}

#[test]
fn test_haversine_distance_casablanca_to_rabat() {
    // Casablanca to Rabat is approximately 87 km
    let distance = haversine_distance(33.5731, -7.5898, 34.0209, -6.8416);
    assert!(distance > 80.0 && distance < 95.0, "got {}", distance);
}

#[test]
fn test_euclidean_distance_in_degrees() {
    assert!((euclidean_distance((40.0, -75.0), (40.1, -75.1)) - 0.1414).abs() < 1e-3);
}

#[test]
fn test_load_feature_vector_length_is_fixed() {
    let full = Load::new((40.0, -75.0), (41.0, -76.0), 1000.0)
        .with_price(2000.0)
        .with_pickup_date(NaiveDate::from_ymd_opt(2024, 12, 2).unwrap());
    let empty = Load::default();

    assert_eq!(extract_load_features(&full).value().to_vector().len(), 8);
    assert_eq!(extract_load_features(&empty).value().to_vector().len(), 8);
    assert!(extract_load_features(&empty).is_degraded());
}

#[test]
fn test_load_features_accept_numeric_strings() {
    let mut load = Load::new((40.0, -75.0), (41.0, -76.0), 1000.0);
    load.weight = Some(RawField::from(" 2500 "));
    load.pickup_date = Some(RawField::from("2024-12-02T06:00:00Z"));

    let features = extract_load_features(&load);
    assert!(!features.is_degraded());
    assert_eq!(features.value().weight, 2500.0);
    assert_eq!(features.value().pickup_month, 12.0);
    // December 2nd 2024 is a Monday
    assert_eq!(features.value().pickup_weekday, 0.0);
}

#[test]
fn test_carrier_feature_vector_length_is_fixed() {
    let structured = carrier(40.0, -75.0, &["van"], VerificationStatus::Verified);
    let mut broken = Carrier::new("b", "Broken");
    broken.fleet_size = Some(RawField::from("?"));

    assert_eq!(extract_carrier_features(&structured).value().to_vector().len(), 5);
    assert_eq!(extract_carrier_features(&broken).value().to_vector(), [0.0; 5]);
}

#[test]
fn test_serialized_and_structured_carriers_agree() {
    let structured = carrier(40.0, -75.0, &["van", "reefer"], VerificationStatus::Verified);

    let mut serialized = Carrier::new("c", "Carrier").with_status(VerificationStatus::Verified);
    serialized.operating_regions = Some(Encoded::Serialized(r#"[{"lat": 40.0, "lng": -75.0}]"#.to_string()));
    serialized.equipment_types = Some(Encoded::Serialized(r#"["van", "reefer"]"#.to_string()));

    assert_eq!(
        extract_carrier_features(&structured),
        extract_carrier_features(&serialized)
    );
}

#[test]
fn test_pricing_features_weekday_is_monday_based() {
    let load = Load::new((0.0, 0.0), (0.0, 1.0), 100.0)
        // A Sunday
        .with_pickup_date(NaiveDate::from_ymd_opt(2024, 6, 2).unwrap());

    let row = extract_pricing_features(&load).unwrap();
    assert_eq!(row[3], 6.0);
    assert_eq!(row[4], 0.0);
}

#[test]
fn test_equipment_support_never_lowers_score() {
    let load = Load::new((40.0, -75.0), (41.0, -76.0), 1000.0).with_equipment("flatbed");
    let load_features = extract_load_features(&load).value();
    let weights = ScoringWeights::default();

    for (lat, lng) in [(40.0, -75.0), (45.0, -80.0), (-30.0, 120.0)] {
        for status in [VerificationStatus::Verified, VerificationStatus::Unknown] {
            let with = carrier(lat, lng, &["flatbed", "van"], status);
            let without = carrier(lat, lng, &["van"], status);

            let with_score = calculate_compatibility(
                &load_features,
                Some("flatbed"),
                &with,
                &extract_carrier_features(&with).value(),
                &weights,
            );
            let without_score = calculate_compatibility(
                &load_features,
                Some("flatbed"),
                &without,
                &extract_carrier_features(&without).value(),
                &weights,
            );

            assert!(with_score.score >= without_score.score);
        }
    }
}

#[test]
fn test_scores_within_unit_interval() {
    let load = Load::new((40.0, -75.0), (41.0, -76.0), 1000.0).with_equipment("van");
    let load_features = extract_load_features(&load).value();

    for i in 0..50 {
        let c = carrier(
            -80.0 + i as f64 * 3.3,
            -170.0 + i as f64 * 6.7,
            if i % 2 == 0 { &["van"] } else { &["reefer"] },
            if i % 3 == 0 { VerificationStatus::Verified } else { VerificationStatus::Unverified },
        );
        let compatibility = calculate_compatibility(
            &load_features,
            Some("van"),
            &c,
            &extract_carrier_features(&c).value(),
            &ScoringWeights::default(),
        );
        assert!((0.0..=1.0).contains(&compatibility.score));
    }
}
