//! Capabilities workers consume across the network boundary
//!
//! The aggregator reads raw points through a [`MetricsReader`] and the
//! collector consults the cache through a [`CachedMetricLookup`]. Both have
//! an HTTP client talking to the hub's API and an in-process adapter over
//! the storage backend or cache.

pub mod client;
pub mod local;

use async_trait::async_trait;

use crate::models::Metric;

pub use client::{CacheServiceClient, ReadApiClient};
pub use local::{LocalCacheLookup, StorageReader};

/// Range and point reads over stored raw metrics
#[async_trait]
pub trait MetricsReader: Send + Sync {
    /// Up to `limit` points for `(source, name)`, most recent first
    async fn read_range(&self, source: &str, name: &str, limit: usize)
    -> anyhow::Result<Vec<Metric>>;

    /// Most recent point, `None` when nothing was stored yet
    async fn read_latest(&self, source: &str, name: &str) -> anyhow::Result<Option<Metric>>;
}

/// Read-through cache lookup; a miss is `Ok(None)`
#[async_trait]
pub trait CachedMetricLookup: Send + Sync {
    async fn get_cached(&self, source: &str, name: &str) -> anyhow::Result<Option<Metric>>;
}
