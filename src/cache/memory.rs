//! In-memory TTL cache
//!
//! Values are kept as serialized JSON, mirroring a remote key-value store.
//! Expired entries are evicted lazily on read, or in bulk with
//! [`MemoryCache::purge_expired`].

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::{CacheResult, MetricCache};
use crate::models::{Metric, cache_key};

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-memory metric cache
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining lifetime of the entry for `(source, name)`
    pub async fn ttl_remaining(&self, source: &str, name: &str) -> Option<Duration> {
        let entries = self.entries.read().await;
        let entry = entries.get(&cache_key(source, name))?;
        let now = Instant::now();
        (entry.expires_at > now).then(|| entry.expires_at - now)
    }

    /// Drop all expired entries, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        let removed = before - entries.len();
        if removed > 0 {
            debug!("purged {removed} expired cache entries");
        }
        removed
    }

    /// Number of entries, including expired ones not yet evicted
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Saturates at roughly thirty years out when `ttl` would overflow the clock
fn expiry(ttl: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(ttl)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

#[async_trait]
impl MetricCache for MemoryCache {
    async fn set_metric(&self, metric: &Metric, ttl: Duration) -> CacheResult<()> {
        let value = serde_json::to_string(metric)?;
        let key = metric.cache_key();
        trace!("caching {key} for {ttl:?}");

        self.entries.write().await.insert(
            key,
            Entry {
                value,
                expires_at: expiry(ttl),
            },
        );
        Ok(())
    }

    async fn get_metric(&self, source: &str, name: &str) -> CacheResult<Option<Metric>> {
        let key = cache_key(source, name);
        let now = Instant::now();

        {
            let entries = self.entries.read().await;
            match entries.get(&key) {
                None => return Ok(None),
                Some(entry) if entry.expires_at > now => {
                    return Ok(Some(serde_json::from_str(&entry.value)?));
                }
                Some(_) => {}
            }
        }

        // expired: evict unless a writer refreshed it meanwhile
        let mut entries = self.entries.write().await;
        if entries.get(&key).is_some_and(|entry| entry.expires_at <= now) {
            trace!("evicting expired cache entry {key}");
            entries.remove(&key);
        }
        Ok(None)
    }
}
