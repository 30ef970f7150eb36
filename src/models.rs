//! Metric data model
//!
//! ## Label values
//!
//! Internally a label is an opaque scalar ([`LabelValue`]). Crossing the
//! network boundary narrows every label to a string ([`WireMetric`]):
//!
//! | Internal            | Wire                     |
//! |---------------------|--------------------------|
//! | `Text(s)`           | `s`                      |
//! | `Bool(b)`           | `"true"` / `"false"`     |
//! | `Int(i)`            | decimal form             |
//! | `Float(f)` finite   | shortest decimal form    |
//! | `Float(f)` NaN/inf  | rejected ([`LabelError`]) |
//!
//! Non-finite floats are also rejected when a metric is serialized for the
//! transport, the cache or storage, so they never leave the process that
//! created them.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Label key marking a metric republished from the cache.
pub const CACHED_LABEL: &str = "cached";

/// Label map attached to every metric.
pub type Labels = BTreeMap<String, LabelValue>;

/// A single label value
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LabelValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl LabelValue {
    /// Narrow the value to its wire representation.
    pub fn to_wire(&self) -> Result<String, LabelError> {
        match self {
            LabelValue::Text(s) => Ok(s.clone()),
            LabelValue::Bool(b) => Ok(b.to_string()),
            LabelValue::Int(i) => Ok(i.to_string()),
            LabelValue::Float(f) if f.is_finite() => Ok(f.to_string()),
            LabelValue::Float(f) => Err(LabelError::NonFinite(*f)),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            LabelValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl Serialize for LabelValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            LabelValue::Bool(b) => serializer.serialize_bool(*b),
            LabelValue::Int(i) => serializer.serialize_i64(*i),
            LabelValue::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            LabelValue::Float(f) => Err(serde::ser::Error::custom(LabelError::NonFinite(*f))),
            LabelValue::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl From<&str> for LabelValue {
    fn from(value: &str) -> Self {
        LabelValue::Text(value.to_string())
    }
}

impl From<String> for LabelValue {
    fn from(value: String) -> Self {
        LabelValue::Text(value)
    }
}

impl From<i64> for LabelValue {
    fn from(value: i64) -> Self {
        LabelValue::Int(value)
    }
}

impl From<f64> for LabelValue {
    fn from(value: f64) -> Self {
        LabelValue::Float(value)
    }
}

impl From<bool> for LabelValue {
    fn from(value: bool) -> Self {
        LabelValue::Bool(value)
    }
}

/// A label value that has no wire representation
#[derive(Debug, Clone, PartialEq)]
pub enum LabelError {
    NonFinite(f64),
}

impl fmt::Display for LabelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelError::NonFinite(v) => write!(f, "label value {v} is not a finite number"),
        }
    }
}

impl std::error::Error for LabelError {}

/// A raw metric reading
///
/// Identity for caching and lookup is the `(source, name)` pair; several
/// readings of the same pair are ordered by `collected_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Producer identity (e.g. "GitHub")
    pub source: String,

    /// Metric identifier (e.g. "stargazers_count")
    pub name: String,

    pub value: f64,

    #[serde(default)]
    pub labels: Labels,

    pub collected_at: DateTime<Utc>,
}

impl Metric {
    pub fn new(source: impl Into<String>, name: impl Into<String>, value: f64) -> Self {
        Self {
            source: source.into(),
            name: name.into(),
            value,
            labels: Labels::new(),
            collected_at: Utc::now(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<LabelValue>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn collected_at(mut self, at: DateTime<Utc>) -> Self {
        self.collected_at = at;
        self
    }

    /// Cache key for this metric's `(source, name)` pair
    pub fn cache_key(&self) -> String {
        cache_key(&self.source, &self.name)
    }

    /// Whether this metric was republished from the cache
    ///
    /// Only the string `"true"` (or a boolean `true`) counts.
    pub fn is_cache_derived(&self) -> bool {
        match self.labels.get(CACHED_LABEL) {
            Some(LabelValue::Text(s)) => s == "true",
            Some(LabelValue::Bool(b)) => *b,
            _ => false,
        }
    }

    /// Clone of a cached metric restamped for republication
    pub fn as_cache_hit(&self, now: DateTime<Utc>) -> Self {
        let mut metric = self.clone();
        metric.collected_at = now;
        metric
            .labels
            .insert(CACHED_LABEL.to_string(), LabelValue::Text("true".to_string()));
        metric
    }
}

/// Cache key for a `(source, name)` pair
pub fn cache_key(source: &str, name: &str) -> String {
    format!("{source}:{name}")
}

/// Hourly statistical summary of raw points
///
/// Invariants: `min_value <= avg_value <= max_value` and `count > 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMetric {
    pub source: String,
    pub name: String,
    pub avg_value: f64,
    pub min_value: f64,
    pub max_value: f64,
    pub count: usize,
    pub time_range: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Metric as it crosses the network boundary (labels narrowed to strings)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMetric {
    pub source: String,
    pub name: String,
    pub value: f64,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    pub collected_at: DateTime<Utc>,
}

impl TryFrom<&Metric> for WireMetric {
    type Error = LabelError;

    fn try_from(metric: &Metric) -> Result<Self, Self::Error> {
        let labels = metric
            .labels
            .iter()
            .map(|(k, v)| v.to_wire().map(|v| (k.clone(), v)))
            .collect::<Result<_, _>>()?;

        Ok(Self {
            source: metric.source.clone(),
            name: metric.name.clone(),
            value: metric.value,
            labels,
            collected_at: metric.collected_at,
        })
    }
}

impl From<WireMetric> for Metric {
    fn from(wire: WireMetric) -> Self {
        Self {
            source: wire.source,
            name: wire.name,
            value: wire.value,
            labels: wire
                .labels
                .into_iter()
                .map(|(k, v)| (k, LabelValue::Text(v)))
                .collect(),
            collected_at: wire.collected_at,
        }
    }
}

/// Response body for range reads
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub metrics: Vec<WireMetric>,
}

/// Response body for single-metric reads (`metric` is `null` when absent)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricResponse {
    pub metric: Option<WireMetric>,
}
