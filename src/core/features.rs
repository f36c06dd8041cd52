use chrono::{Datelike, NaiveDate};
use crate::core::distance::haversine_distance;
use crate::models::domain::{required_number, Carrier, FeatureError, Load};

/// Number of entries in a pricing feature row
pub const PRICING_FEATURES: usize = 5;

/// Fixed-order pricing row: weight, route km, month, weekday, equipment flag
pub type PricingFeatures = [f64; PRICING_FEATURES];

/// Outcome of feature extraction
///
/// Extraction never fails outright. A malformed record still yields a value
/// of the right shape, but it is tagged so callers can tell it apart.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted<T> {
    Computed(T),
    Degraded { value: T, reason: FeatureError },
}

impl<T: Copy + Default> Extracted<T> {
    fn from_result(result: Result<T, FeatureError>) -> Self {
        match result {
            Ok(value) => Extracted::Computed(value),
            Err(reason) => Extracted::Degraded {
                value: T::default(),
                reason,
            },
        }
    }

    pub fn value(&self) -> T {
        match self {
            Extracted::Computed(value) => *value,
            Extracted::Degraded { value, .. } => *value,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Extracted::Degraded { .. })
    }

    pub fn reason(&self) -> Option<&FeatureError> {
        match self {
            Extracted::Computed(_) => None,
            Extracted::Degraded { reason, .. } => Some(reason),
        }
    }
}

/// Numeric encoding of a load
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoadFeatures {
    pub weight: f64,
    pub price: f64,
    pub origin_lat: f64,
    pub origin_lng: f64,
    pub destination_lat: f64,
    pub destination_lng: f64,
    /// 1-12, or 0 without a pickup date
    pub pickup_month: f64,
    /// 0 (Monday) to 6, or 0 without a pickup date
    pub pickup_weekday: f64,
}

impl LoadFeatures {
    pub fn to_vector(&self) -> [f64; 8] {
        [
            self.weight,
            self.price,
            self.origin_lat,
            self.origin_lng,
            self.destination_lat,
            self.destination_lng,
            self.pickup_month,
            self.pickup_weekday,
        ]
    }

    pub fn origin(&self) -> (f64, f64) {
        (self.origin_lat, self.origin_lng)
    }
}

/// Numeric encoding of a carrier
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CarrierFeatures {
    /// Mean latitude of operating regions, 0 without regions
    pub region_lat: f64,
    /// Mean longitude of operating regions, 0 without regions
    pub region_lng: f64,
    pub fleet_size: f64,
    pub equipment_count: f64,
    /// 1.0 when verified
    pub verified: f64,
}

impl CarrierFeatures {
    pub fn to_vector(&self) -> [f64; 5] {
        [
            self.region_lat,
            self.region_lng,
            self.fleet_size,
            self.equipment_count,
            self.verified,
        ]
    }

    pub fn region_center(&self) -> (f64, f64) {
        (self.region_lat, self.region_lng)
    }
}

/// Extract the load feature vector
///
/// Weight and coordinates are required. Price and pickup date are optional
/// and contribute 0 when absent, but a pickup date that is present and
/// unparsable degrades the whole record.
pub fn extract_load_features(load: &Load) -> Extracted<LoadFeatures> {
    Extracted::from_result(try_load_features(load))
}

fn try_load_features(load: &Load) -> Result<LoadFeatures, FeatureError> {
    let price = match &load.price {
        Some(price) => price.as_number("price")?,
        None => 0.0,
    };

    let (pickup_month, pickup_weekday) = match &load.pickup_date {
        Some(raw) => {
            let date = raw.as_date()?;
            (month_of(date), weekday_of(date))
        }
        None => (0.0, 0.0),
    };

    Ok(LoadFeatures {
        weight: required_number(&load.weight, "weight")?,
        price,
        origin_lat: required_number(&load.origin_lat, "originLat")?,
        origin_lng: required_number(&load.origin_lng, "originLng")?,
        destination_lat: required_number(&load.destination_lat, "destinationLat")?,
        destination_lng: required_number(&load.destination_lng, "destinationLng")?,
        pickup_month,
        pickup_weekday,
    })
}

/// Extract the carrier feature vector
///
/// Collections that fail to decode count as empty. A fleet size that is
/// present but not a positive number, or a region with a non-finite
/// coordinate, degrades the record to the zero vector.
pub fn extract_carrier_features(carrier: &Carrier) -> Extracted<CarrierFeatures> {
    Extracted::from_result(try_carrier_features(carrier))
}

fn try_carrier_features(carrier: &Carrier) -> Result<CarrierFeatures, FeatureError> {
    if let Some(reason) = &carrier.malformed {
        return Err(FeatureError::MalformedRecord(reason.clone()));
    }

    let fleet_size = match &carrier.fleet_size {
        Some(raw) => {
            let size = raw
                .as_number("fleetSize")
                .map_err(|_| FeatureError::InvalidFleetSize(raw.to_string()))?;
            if size < 1.0 {
                return Err(FeatureError::InvalidFleetSize(raw.to_string()));
            }
            size
        }
        None => 1.0,
    };

    let regions = carrier.regions();
    if regions.iter().any(|r| !r.lat.is_finite() || !r.lng.is_finite()) {
        return Err(FeatureError::NotFinite {
            field: "operatingRegions",
        });
    }

    let (region_lat, region_lng) = if regions.is_empty() {
        (0.0, 0.0)
    } else {
        let count = regions.len() as f64;
        (
            regions.iter().map(|r| r.lat).sum::<f64>() / count,
            regions.iter().map(|r| r.lng).sum::<f64>() / count,
        )
    };

    Ok(CarrierFeatures {
        region_lat,
        region_lng,
        fleet_size,
        equipment_count: carrier.equipment().len() as f64,
        verified: if carrier.verified() { 1.0 } else { 0.0 },
    })
}

/// Extract the pricing row for a load
///
/// Unlike the matching extractors this is strict: every field the model
/// needs must be present and well formed.
pub fn extract_pricing_features(load: &Load) -> Result<PricingFeatures, FeatureError> {
    let weight = required_number(&load.weight, "weight")?;
    let distance_km = haversine_distance(
        required_number(&load.origin_lat, "originLat")?,
        required_number(&load.origin_lng, "originLng")?,
        required_number(&load.destination_lat, "destinationLat")?,
        required_number(&load.destination_lng, "destinationLng")?,
    );
    let date = load
        .pickup_date
        .as_ref()
        .ok_or(FeatureError::Missing("pickupDate"))?
        .as_date()?;
    let equipment_flag = if load.required_equipment().is_some() { 1.0 } else { 0.0 };

    Ok([
        weight,
        distance_km,
        month_of(date),
        weekday_of(date),
        equipment_flag,
    ])
}

/// Observed price of a historical load
pub fn observed_price(load: &Load) -> Result<f64, FeatureError> {
    required_number(&load.price, "price")
}

fn month_of(date: NaiveDate) -> f64 {
    date.month() as f64
}

fn weekday_of(date: NaiveDate) -> f64 {
    date.weekday().num_days_from_monday() as f64
}
