//! Announces increases of tracked metrics
//!
//! The last value per tracked key is kept in memory only. After a restart the
//! first observation of a key is recorded without comparison, so a cold start
//! never produces an alert.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::consumer::{MetricHandler, consume_loop};
use crate::broker::MessageConsumer;
use crate::config::TrackedMetric;
use crate::models::Metric;
use crate::notifier::Notifier;

pub const GROUP: &str = "notification";

/// Last-seen value per key, holding at most `max_keys` keys
#[derive(Debug)]
pub struct LastSeenStore {
    values: HashMap<String, f64>,
    max_keys: usize,
}

impl LastSeenStore {
    pub fn new(max_keys: usize) -> Self {
        Self {
            values: HashMap::new(),
            max_keys,
        }
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    /// Record `value` for `key`; a new key is refused once the store is full
    pub fn record(&mut self, key: &str, value: f64) -> bool {
        if let Some(last) = self.values.get_mut(key) {
            *last = value;
            return true;
        }
        if self.values.len() >= self.max_keys {
            return false;
        }
        self.values.insert(key.to_string(), value);
        true
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// What processing one metric amounted to
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// Not a tracked `(source, name)`
    Untracked,
    /// First value seen for the key, recorded without comparison
    First,
    Increased { old: f64, new: f64 },
    /// Equal to or below the previous value
    NotIncreased,
    /// Key could not be recorded because the store is full
    Dropped,
}

pub struct NotificationProcessor {
    tracked: Vec<TrackedMetric>,
    store: LastSeenStore,
    notifier: Arc<dyn Notifier>,
}

impl NotificationProcessor {
    pub fn new(
        tracked: Vec<TrackedMetric>,
        max_tracked_keys: usize,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            tracked,
            store: LastSeenStore::new(max_tracked_keys),
            notifier,
        }
    }

    pub fn spawn<C>(self, consumer: C, cancel: CancellationToken) -> JoinHandle<()>
    where
        C: MessageConsumer + 'static,
    {
        tokio::spawn(consume_loop(consumer, self, cancel))
    }

    pub fn last_seen(&self, key: &str) -> Option<f64> {
        self.store.get(key)
    }

    fn key_for(&self, metric: &Metric) -> Option<String> {
        self.tracked
            .iter()
            .find(|t| t.source == metric.source && t.name == metric.name)
            .map(|t| t.key.clone())
    }

    /// Compare against the last value, notify on a strict increase, then record
    pub async fn process(&mut self, metric: &Metric) -> Observation {
        let Some(key) = self.key_for(metric) else {
            return Observation::Untracked;
        };

        let new = metric.value;
        let observation = match self.store.get(&key) {
            None => Observation::First,
            Some(old) if new > old => Observation::Increased { old, new },
            Some(_) => Observation::NotIncreased,
        };

        if let Observation::Increased { old, new } = observation {
            info!("{key} increased from {old} to {new}");
            if let Err(e) = self.notifier.notify_increase(&key, old, new).await {
                error!("failed to notify increase of {key}: {e:#}");
            }
        }

        // recorded even when the notification failed
        if !self.store.record(&key, new) {
            warn!(
                "not tracking {key}, already tracking {} keys",
                self.store.len()
            );
            return Observation::Dropped;
        }

        debug!("{key}: last seen value is now {new}");
        observation
    }
}

#[async_trait]
impl MetricHandler for NotificationProcessor {
    async fn handle(&mut self, metric: Metric) {
        self.process(&metric).await;
    }
}
