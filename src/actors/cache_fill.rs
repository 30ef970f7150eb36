//! Mirrors transported metrics into the cache
//!
//! Metrics produced by a cache hit carry `cached="true"` and are skipped,
//! otherwise a republished cache entry would refresh its own TTL forever.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, trace};

use super::consumer::{MetricHandler, consume_loop};
use crate::broker::MessageConsumer;
use crate::cache::{MetricCache, TtlPolicy};
use crate::models::Metric;

pub const GROUP: &str = "cache-fill";

pub struct CacheFiller {
    cache: Arc<dyn MetricCache>,
    ttl: TtlPolicy,
}

impl CacheFiller {
    pub fn new(cache: Arc<dyn MetricCache>, ttl: TtlPolicy) -> Self {
        Self { cache, ttl }
    }

    /// Start draining `consumer` into the cache until `cancel` fires
    pub fn spawn<C>(self, consumer: C, cancel: CancellationToken) -> JoinHandle<()>
    where
        C: MessageConsumer + 'static,
    {
        tokio::spawn(consume_loop(consumer, self, cancel))
    }
}

#[async_trait]
impl MetricHandler for CacheFiller {
    async fn handle(&mut self, metric: Metric) {
        if metric.is_cache_derived() {
            trace!("skipping cache-derived metric {}", metric.cache_key());
            return;
        }

        let ttl = self.ttl.ttl_for(&metric.source);
        match self.cache.set_metric(&metric, ttl).await {
            Ok(()) => trace!("cached {} for {ttl:?}", metric.cache_key()),
            Err(e) => error!("failed to cache {}: {e}", metric.cache_key()),
        }
    }
}
