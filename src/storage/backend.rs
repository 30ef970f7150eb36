//! Storage backend trait definition

use std::collections::HashMap;

use async_trait::async_trait;

use super::error::{BatchOutcome, StorageResult};
use crate::models::{AggregatedMetric, Metric};

/// Health status of the storage backend
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Is the backend operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: HashMap<String, String>,
}

/// Durable store of raw metrics and aggregated summaries
///
/// Implementations must be `Send + Sync`; a single backend is shared by the
/// persister, the aggregator and the API server.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Store a batch of metrics in one transaction
    ///
    /// Items that fail (label serialization or the insert itself) are
    /// counted and skipped; the transaction is still committed so the
    /// successful rows are kept. Only a failure to begin or commit the
    /// transaction is returned as `Err`, in which case nothing was stored.
    async fn store_batch(&self, metrics: &[Metric]) -> StorageResult<BatchOutcome>;

    /// Up to `limit` most recent metrics for `(source, name)`, newest first
    async fn read_range(&self, source: &str, name: &str, limit: usize)
    -> StorageResult<Vec<Metric>>;

    /// Most recent metric for `(source, name)`, `None` when there is none
    async fn read_latest(&self, source: &str, name: &str) -> StorageResult<Option<Metric>>;

    /// Persist one aggregated summary
    async fn save_aggregated(&self, aggregated: &AggregatedMetric) -> StorageResult<()>;

    /// Up to `limit` most recent summaries for `(source, name)`, newest first
    async fn query_aggregated(
        &self,
        source: &str,
        name: &str,
        limit: usize,
    ) -> StorageResult<Vec<AggregatedMetric>>;

    /// Check backend health with a lightweight query
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Human-readable statistics about the backend
    async fn get_stats(&self) -> StorageResult<String>;

    /// Close the backend and release resources
    async fn close(&self) -> StorageResult<()>;
}
