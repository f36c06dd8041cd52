use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors raised while reading a raw record field
///
/// These never cross an engine boundary: the feature extractor turns them
/// into degraded values and the pricing engine into its fallback.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    #[error("missing field: {0}")]
    Missing(&'static str),

    #[error("field {field} is not numeric: {value}")]
    NotNumeric { field: &'static str, value: String },

    #[error("field {field} is not finite")]
    NotFinite { field: &'static str },

    #[error("unparsable date: {0}")]
    InvalidDate(String),

    #[error("invalid fleet size: {0}")]
    InvalidFleetSize(String),

    #[error("malformed record: {0}")]
    MalformedRecord(String),
}

/// A loosely typed field as it arrives from the posting flow
///
/// Decimal columns are frequently serialized as text, so numbers are accepted
/// either way. Anything else is kept so it can be reported, not rejected at
/// the deserialization layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawField {
    Number(f64),
    Text(String),
    Other(Value),
}

impl RawField {
    /// Read the field as a finite number
    pub fn as_number(&self, field: &'static str) -> Result<f64, FeatureError> {
        let value = match self {
            RawField::Number(n) => *n,
            RawField::Text(s) => s.trim().parse::<f64>().map_err(|_| FeatureError::NotNumeric {
                field,
                value: s.clone(),
            })?,
            RawField::Other(v) => {
                return Err(FeatureError::NotNumeric {
                    field,
                    value: v.to_string(),
                })
            }
        };

        if value.is_finite() {
            Ok(value)
        } else {
            Err(FeatureError::NotFinite { field })
        }
    }

    /// Read the field as a calendar date
    ///
    /// Accepts `YYYY-MM-DD`, RFC 3339 timestamps and naive ISO date-times.
    pub fn as_date(&self) -> Result<NaiveDate, FeatureError> {
        let text = match self {
            RawField::Text(s) => s.trim(),
            other => return Err(FeatureError::InvalidDate(other.to_string())),
        };

        if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            return Ok(date);
        }
        if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
            return Ok(ts.date_naive());
        }
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(ts) = NaiveDateTime::parse_from_str(text, format) {
                return Ok(ts.date());
            }
        }

        Err(FeatureError::InvalidDate(text.to_string()))
    }
}

impl std::fmt::Display for RawField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawField::Number(n) => write!(f, "{}", n),
            RawField::Text(s) => write!(f, "{}", s),
            RawField::Other(v) => write!(f, "{}", v),
        }
    }
}

impl From<f64> for RawField {
    fn from(value: f64) -> Self {
        RawField::Number(value)
    }
}

impl From<&str> for RawField {
    fn from(value: &str) -> Self {
        RawField::Text(value.to_string())
    }
}

/// Read an optional field that the caller requires
pub(crate) fn required_number(
    field: &Option<RawField>,
    name: &'static str,
) -> Result<f64, FeatureError> {
    field
        .as_ref()
        .ok_or(FeatureError::Missing(name))?
        .as_number(name)
}

/// Shipment request posted by a shipper
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Load {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RawField>,
    #[serde(rename = "originLat", default)]
    pub origin_lat: Option<RawField>,
    #[serde(rename = "originLng", default)]
    pub origin_lng: Option<RawField>,
    #[serde(rename = "destinationLat", default)]
    pub destination_lat: Option<RawField>,
    #[serde(rename = "destinationLng", default)]
    pub destination_lng: Option<RawField>,
    #[serde(default)]
    pub weight: Option<RawField>,
    #[serde(default)]
    pub price: Option<RawField>,
    #[serde(rename = "pickupDate", default)]
    pub pickup_date: Option<RawField>,
    #[serde(rename = "equipmentType", default, deserialize_with = "deserialize_optional_text")]
    pub equipment_type: Option<String>,
}

impl Load {
    /// Build a well-formed load from coordinates and weight
    pub fn new(origin: (f64, f64), destination: (f64, f64), weight: f64) -> Self {
        Self {
            id: None,
            origin_lat: Some(origin.0.into()),
            origin_lng: Some(origin.1.into()),
            destination_lat: Some(destination.0.into()),
            destination_lng: Some(destination.1.into()),
            weight: Some(weight.into()),
            price: None,
            pickup_date: None,
            equipment_type: None,
        }
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price.into());
        self
    }

    pub fn with_pickup_date(mut self, date: NaiveDate) -> Self {
        self.pickup_date = Some(RawField::Text(date.format("%Y-%m-%d").to_string()));
        self
    }

    pub fn with_equipment(mut self, equipment: &str) -> Self {
        self.equipment_type = Some(equipment.to_string());
        self
    }

    /// Required equipment tag, normalized; blank tags count as no requirement
    pub fn required_equipment(&self) -> Option<String> {
        self.equipment_type
            .as_deref()
            .map(normalize_tag)
            .filter(|tag| !tag.is_empty())
    }

    /// Identifier for log lines
    pub fn label(&self) -> String {
        self.id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "<unposted>".to_string())
    }
}

/// Lowercase and trim an equipment tag for comparison
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}

/// Center of a carrier's operating region
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub lat: f64,
    pub lng: f64,
}

/// A collection that may arrive structured or as a serialized JSON string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Encoded<T> {
    Items(Vec<T>),
    Serialized(String),
    Other(Value),
}

impl<T> Encoded<T>
where
    T: DeserializeOwned + Clone,
{
    /// Decode into items; anything undecodable is an empty collection
    pub fn decode(&self) -> Vec<T> {
        match self {
            Encoded::Items(items) => items.clone(),
            Encoded::Serialized(text) if text.trim().is_empty() => Vec::new(),
            Encoded::Serialized(text) => serde_json::from_str(text).unwrap_or_else(|e| {
                tracing::debug!("Could not decode serialized collection ({}), using empty", e);
                Vec::new()
            }),
            Encoded::Other(value) => {
                tracing::debug!("Unexpected collection shape {}, using empty", value);
                Vec::new()
            }
        }
    }
}

impl<T> From<Vec<T>> for Encoded<T> {
    fn from(items: Vec<T>) -> Self {
        Encoded::Items(items)
    }
}

/// Carrier verification status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Verified,
    #[serde(alias = "pending", alias = "rejected")]
    Unverified,
    #[default]
    #[serde(other)]
    Unknown,
}

impl VerificationStatus {
    /// Map a free-form status label, case-insensitively
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "verified" => VerificationStatus::Verified,
            "unverified" | "pending" | "rejected" => VerificationStatus::Unverified,
            _ => VerificationStatus::Unknown,
        }
    }
}

/// Transport provider snapshot supplied per matching request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Carrier {
    #[serde(default, deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(alias = "companyName", default, deserialize_with = "deserialize_text")]
    pub name: String,
    #[serde(rename = "fleetSize", default)]
    pub fleet_size: Option<RawField>,
    #[serde(rename = "operatingRegions", default)]
    pub operating_regions: Option<Encoded<Region>>,
    #[serde(rename = "equipmentTypes", default)]
    pub equipment_types: Option<Encoded<String>>,
    #[serde(rename = "verificationStatus", default, deserialize_with = "deserialize_status")]
    pub verification_status: VerificationStatus,
    /// Set when the raw record could not be read at all
    #[serde(skip)]
    pub malformed: Option<String>,
}

impl Carrier {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            fleet_size: None,
            operating_regions: None,
            equipment_types: None,
            verification_status: VerificationStatus::Unknown,
            malformed: None,
        }
    }

    /// Build a carrier from one raw batch entry; never fails
    ///
    /// A record without a usable id is identified by its position in the
    /// batch. A record that cannot be read at all is kept as a malformed
    /// placeholder so matching can report it.
    pub fn from_record(index: usize, record: Value) -> Self {
        let mut carrier = match serde_json::from_value::<Carrier>(record) {
            Ok(carrier) => carrier,
            Err(e) => {
                let mut placeholder = Carrier::new("", "");
                placeholder.malformed = Some(e.to_string());
                placeholder
            }
        };
        if carrier.id.trim().is_empty() {
            carrier.id = index.to_string();
        }
        carrier
    }

    pub fn with_regions(mut self, regions: Vec<Region>) -> Self {
        self.operating_regions = Some(regions.into());
        self
    }

    pub fn with_equipment(mut self, equipment: &[&str]) -> Self {
        let tags = equipment.iter().map(|t| t.to_string()).collect::<Vec<_>>();
        self.equipment_types = Some(tags.into());
        self
    }

    pub fn with_fleet_size(mut self, size: f64) -> Self {
        self.fleet_size = Some(size.into());
        self
    }

    pub fn with_status(mut self, status: VerificationStatus) -> Self {
        self.verification_status = status;
        self
    }

    pub fn verified(&self) -> bool {
        self.verification_status == VerificationStatus::Verified
    }

    pub fn regions(&self) -> Vec<Region> {
        self.operating_regions
            .as_ref()
            .map(Encoded::decode)
            .unwrap_or_default()
    }

    /// Supported equipment tags, normalized
    pub fn equipment(&self) -> Vec<String> {
        self.equipment_types
            .as_ref()
            .map(Encoded::decode)
            .unwrap_or_default()
            .into_iter()
            .map(|tag| normalize_tag(&tag))
            .collect()
    }
}

/// Deserialize a carrier batch entry by entry
///
/// Individual records never fail the batch; see `Carrier::from_record`.
pub fn deserialize_carriers<'de, D>(deserializer: D) -> Result<Vec<Carrier>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let records = Vec::<Value>::deserialize(deserializer)?;
    Ok(records
        .into_iter()
        .enumerate()
        .map(|(index, record)| Carrier::from_record(index, record))
        .collect())
}

/// Deserialize historical loads entry by entry
///
/// An entry that is not a load object becomes an empty load, which the
/// pricing engine treats like any other record with missing fields.
pub fn deserialize_loads<'de, D>(deserializer: D) -> Result<Vec<Load>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let records = Vec::<Value>::deserialize(deserializer)?;
    Ok(records
        .into_iter()
        .map(|record| {
            serde_json::from_value(record).unwrap_or_else(|e| {
                tracing::debug!("Unreadable historical load ({}), keeping it empty", e);
                Load::default()
            })
        })
        .collect())
}

/// Numbers and strings are ids; anything else is treated as missing
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(deserialize_optional_text(deserializer)?.unwrap_or_default())
}

fn deserialize_optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn deserialize_status<'de, D>(deserializer: D) -> Result<VerificationStatus, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(label) => VerificationStatus::from_label(&label),
        _ => VerificationStatus::Unknown,
    })
}

/// Ranked carrier for a load
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCarrier {
    #[serde(rename = "carrierId")]
    pub carrier_id: String,
    pub name: String,
    #[serde(rename = "matchingScore")]
    pub score: f64,
    pub reason: String,
    #[serde(rename = "distanceKm")]
    pub distance_km: f64,
    #[serde(rename = "equipmentMatch")]
    pub equipment_match: bool,
    #[serde(rename = "isVerified")]
    pub is_verified: bool,
}

/// Coarse indicator of how reliable a price suggestion is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Which branch of the pricing engine produced a suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PricingSource {
    /// Too little history, mean price with jitter
    Heuristic,
    /// Regression model with bootstrap band
    Model,
    /// Safe default after a failure in the model path
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

/// Suggested price for a load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSuggestion {
    pub suggested_price: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub price_range: Option<PriceRange>,
    pub confidence: Confidence,
    pub source: PricingSource,
}

impl PriceSuggestion {
    /// The fixed answer returned when the model path fails
    pub fn fallback() -> Self {
        Self {
            suggested_price: 1000.0,
            price_range: Some(PriceRange {
                min: 900.0,
                max: 1100.0,
            }),
            confidence: Confidence::Low,
            source: PricingSource::Fallback,
        }
    }
}

/// Scoring weights for carrier compatibility
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub proximity: f64,
    pub equipment: f64,
    pub verified: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            proximity: 0.6,
            equipment: 0.3,
            verified: 0.1,
        }
    }
}
