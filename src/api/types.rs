//! Request and response bodies of the API

use serde::{Deserialize, Serialize};

use crate::models::AggregatedMetric;

pub use crate::models::{MetricResponse, MetricsResponse};

/// Default number of raw points returned by range reads
pub const DEFAULT_LIMIT: usize = 60;

/// Upper bound for `?limit=`
pub const MAX_LIMIT: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub storage: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub timestamp: String,
    pub storage: String,
}

/// Answer to a fully stored ingestion batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub message: String,
    pub successful_count: usize,
    pub failed_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatesResponse {
    pub aggregates: Vec<AggregatedMetric>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

impl LimitQuery {
    /// Requested limit, defaulted and capped at [`MAX_LIMIT`]
    pub fn resolve(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT)
    }
}
