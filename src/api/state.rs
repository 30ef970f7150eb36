//! Shared state passed to all API handlers

use std::sync::Arc;

use crate::cache::MetricCache;
use crate::storage::StorageBackend;

#[derive(Clone)]
pub struct ApiState {
    /// Raw and aggregated metrics
    pub storage: Arc<dyn StorageBackend>,

    /// Cache served by the cache-service endpoint
    pub cache: Arc<dyn MetricCache>,
}

impl ApiState {
    pub fn new(storage: Arc<dyn StorageBackend>, cache: Arc<dyn MetricCache>) -> Self {
        Self { storage, cache }
    }
}
