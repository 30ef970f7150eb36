//! Stores every transported metric as one row

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, trace, warn};

use super::consumer::{MetricHandler, consume_loop};
use crate::broker::MessageConsumer;
use crate::models::Metric;
use crate::storage::{BatchOutcome, StorageBackend};

pub const GROUP: &str = "persister";

pub struct Persister {
    storage: Arc<dyn StorageBackend>,
}

impl Persister {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    pub fn spawn<C>(self, consumer: C, cancel: CancellationToken) -> JoinHandle<()>
    where
        C: MessageConsumer + 'static,
    {
        tokio::spawn(consume_loop(consumer, self, cancel))
    }
}

#[async_trait]
impl MetricHandler for Persister {
    async fn handle(&mut self, metric: Metric) {
        match self.storage.store_batch(std::slice::from_ref(&metric)).await {
            Ok(BatchOutcome::AllStored { .. }) => trace!("stored {}", metric.cache_key()),
            Ok(BatchOutcome::Partial(partial)) => warn!("{partial}"),
            Err(e) => error!("failed to store {}: {e}", metric.cache_key()),
        }
    }
}
