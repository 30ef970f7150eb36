//! CollectorActor - Polls external sources and publishes their metrics
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick → cache lookup ─hit─→ republish cached value (cached="true")
//!                   │
//!                  miss → fetch from source → publish Metric → transport
//!     ↑
//!     └─── Commands (PollNow, Shutdown)
//! ```
//!
//! The cache lookup is best-effort. A failed lookup counts as a miss and the
//! external source is called as usual.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use super::messages::{Collected, CollectionReport, CollectorCommand, SourceFailure};
use crate::broker::MessageBroker;
use crate::models::Metric;
use crate::remote::CachedMetricLookup;
use crate::sources::MetricSource;

/// Actor that polls every configured source once per interval
pub struct CollectorActor {
    sources: Vec<Arc<dyn MetricSource>>,

    /// Read-through cache, `None` disables cache lookups
    cache: Option<Arc<dyn CachedMetricLookup>>,

    broker: Arc<dyn MessageBroker>,

    command_rx: mpsc::Receiver<CollectorCommand>,

    poll_interval: Duration,

    cancel: CancellationToken,
}

impl CollectorActor {
    pub fn new(
        sources: Vec<Arc<dyn MetricSource>>,
        cache: Option<Arc<dyn CachedMetricLookup>>,
        broker: Arc<dyn MessageBroker>,
        command_rx: mpsc::Receiver<CollectorCommand>,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            sources,
            cache,
            broker,
            command_rx,
            poll_interval,
            cancel,
        }
    }

    /// Run until cancelled or a Shutdown command arrives
    ///
    /// The first cycle runs immediately.
    #[instrument(skip(self), fields(sources = self.sources.len()))]
    pub async fn run(mut self) {
        debug!("starting collector actor");

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut commands_open = true;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("collector cancelled");
                    break;
                }

                _ = ticker.tick() => {
                    self.collect_all().await;
                }

                cmd = self.command_rx.recv(), if commands_open => {
                    match cmd {
                        Some(CollectorCommand::PollNow { respond_to }) => {
                            debug!("received PollNow command");
                            let report = self.collect_all().await;
                            let _ = respond_to.send(report);
                        }
                        Some(CollectorCommand::Shutdown) => {
                            debug!("received shutdown command");
                            break;
                        }
                        None => {
                            trace!("all collector handles dropped, continuing on timer");
                            commands_open = false;
                        }
                    }
                }
            }
        }

        debug!("collector actor stopped");
    }

    /// One cycle over every source; sources run concurrently
    async fn collect_all(&self) -> CollectionReport {
        let outcomes = join_all(self.sources.iter().map(|source| async move {
            let outcome = self.collect_one(source.as_ref()).await;
            (source, outcome)
        }))
        .await;

        let mut report = CollectionReport::default();
        for (source, outcome) in outcomes {
            match outcome {
                Ok(Collected::Fetched) => report.fetched += 1,
                Ok(Collected::CacheHit) => report.cache_hits += 1,
                Err(e) => {
                    warn!("{}/{}: {e:#}", source.source(), source.name());
                    report.failures.push(SourceFailure {
                        source: source.source().to_string(),
                        name: source.name().to_string(),
                        error: format!("{e:#}"),
                    });
                }
            }
        }

        info!(
            "collection cycle finished: {} fetched, {} from cache, {} failed",
            report.fetched,
            report.cache_hits,
            report.failures.len()
        );
        report
    }

    #[instrument(skip_all, fields(source = source.source(), name = source.name()))]
    async fn collect_one(&self, source: &dyn MetricSource) -> Result<Collected> {
        let now = Utc::now();

        if let Some(cache) = &self.cache {
            match cache.get_cached(source.source(), source.name()).await {
                Ok(Some(cached)) => {
                    trace!("cache hit, skipping external call");
                    self.publish(cached.as_cache_hit(now)).await?;
                    return Ok(Collected::CacheHit);
                }
                Ok(None) => trace!("cache miss"),
                Err(e) => warn!("cache lookup failed, fetching from source: {e:#}"),
            }
        }

        let reading = source
            .fetch()
            .await
            .context("failed to fetch from source")?;

        let metric = Metric {
            source: source.source().to_string(),
            name: source.name().to_string(),
            value: reading.value,
            labels: reading.labels,
            collected_at: now,
        };

        self.publish(metric).await?;
        Ok(Collected::Fetched)
    }

    async fn publish(&self, metric: Metric) -> Result<()> {
        self.broker
            .publish(std::slice::from_ref(&metric))
            .await
            .context("failed to publish metric")?;
        trace!("published {} = {}", metric.cache_key(), metric.value);
        Ok(())
    }
}

/// Handle for controlling a CollectorActor
///
/// Cloneable; dropping every handle leaves the actor running on its timer.
#[derive(Clone)]
pub struct CollectorHandle {
    sender: mpsc::Sender<CollectorCommand>,
}

impl CollectorHandle {
    /// Spawn a collector actor and return a handle plus its task
    pub fn spawn(
        sources: Vec<Arc<dyn MetricSource>>,
        cache: Option<Arc<dyn CachedMetricLookup>>,
        broker: Arc<dyn MessageBroker>,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = CollectorActor::new(sources, cache, broker, cmd_rx, poll_interval, cancel);
        let task = tokio::spawn(actor.run());

        (Self { sender: cmd_tx }, task)
    }

    /// Run a collection cycle now and wait for its report
    pub async fn poll_now(&self) -> Result<CollectionReport> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(CollectorCommand::PollNow { respond_to: tx })
            .await
            .context("failed to send PollNow command")?;

        rx.await.context("failed to receive response")
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(CollectorCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
