//! Cache layer holding the most recent metric per `(source, name)`
//!
//! Entries carry a TTL chosen at write time by [`TtlPolicy`]. A missing or
//! expired entry is a normal outcome (`Ok(None)`), never an error.

pub mod memory;
pub mod ttl;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::models::Metric;

pub use memory::MemoryCache;
pub use ttl::TtlPolicy;

/// Result type alias for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur during cache operations
#[derive(Debug)]
pub enum CacheError {
    /// Metric could not be serialized or deserialized
    Serialization(String),

    /// The cache backend failed
    Backend(String),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Serialization(msg) => write!(f, "cache serialization error: {msg}"),
            CacheError::Backend(msg) => write!(f, "cache backend error: {msg}"),
        }
    }
}

impl std::error::Error for CacheError {}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

/// Key-value store of recent metrics with per-entry expiration
#[async_trait]
pub trait MetricCache: Send + Sync {
    /// Store `metric` under its `(source, name)` key, replacing any previous entry
    async fn set_metric(&self, metric: &Metric, ttl: Duration) -> CacheResult<()>;

    /// Fetch the metric stored for `(source, name)`, if present and not expired
    async fn get_metric(&self, source: &str, name: &str) -> CacheResult<Option<Metric>>;
}
