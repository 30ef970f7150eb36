//! In-process adapters used when no remote endpoint is configured

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use super::{CachedMetricLookup, MetricsReader};
use crate::cache::MetricCache;
use crate::models::Metric;
use crate::storage::StorageBackend;

/// Reads straight from the storage backend
#[derive(Clone)]
pub struct StorageReader(pub Arc<dyn StorageBackend>);

#[async_trait]
impl MetricsReader for StorageReader {
    async fn read_range(&self, source: &str, name: &str, limit: usize) -> Result<Vec<Metric>> {
        Ok(self.0.read_range(source, name, limit).await?)
    }

    async fn read_latest(&self, source: &str, name: &str) -> Result<Option<Metric>> {
        Ok(self.0.read_latest(source, name).await?)
    }
}

/// Looks up the shared cache directly
#[derive(Clone)]
pub struct LocalCacheLookup(pub Arc<dyn MetricCache>);

#[async_trait]
impl CachedMetricLookup for LocalCacheLookup {
    async fn get_cached(&self, source: &str, name: &str) -> Result<Option<Metric>> {
        Ok(self.0.get_metric(source, name).await?)
    }
}
