//! Hourly summaries of raw metrics
//!
//! Every tick the declared `(source, name)` pairs are read from the current
//! configuration snapshot and processed concurrently, one task per pair. The
//! tick ends once every task has finished. Failed pairs are reported together
//! in a single warning and never affect the other pairs.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use super::messages::{AggregatorCommand, TickReport};
use crate::config::ConfigStore;
use crate::models::{AggregatedMetric, Metric};
use crate::remote::MetricsReader;
use crate::storage::StorageBackend;

pub const TIME_RANGE: &str = "hour";

/// Nominal window stamped on every summary
pub const WINDOW: chrono::Duration = chrono::Duration::hours(1);

/// Summary statistics over a set of raw points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

/// `None` for an empty slice
///
/// Non-finite values are left out. The average is kept inside `[min, max]`
/// so float rounding never breaks `min <= avg <= max`.
pub fn summarize(values: &[f64]) -> Option<Summary> {
    let mut finite = values.iter().copied().filter(|v| v.is_finite());
    let first = finite.next()?;

    let (sum, min, max, count) = finite.fold((first, first, first, 1usize), |acc, v| {
        (acc.0 + v, acc.1.min(v), acc.2.max(v), acc.3 + 1)
    });

    let avg = (sum / count as f64).max(min).min(max);
    Some(Summary {
        avg,
        min,
        max,
        count,
    })
}

pub fn aggregate_points(points: &[Metric]) -> Option<Summary> {
    let values: Vec<f64> = points.iter().map(|p| p.value).collect();
    summarize(&values)
}

/// Outcome of aggregating one pair
#[derive(Debug, Clone, PartialEq)]
pub enum PairOutcome {
    Stored(AggregatedMetric),
    /// No raw points, nothing written
    Skipped,
}

/// Reads raw points and writes summaries for single pairs
pub struct Aggregator {
    reader: Arc<dyn MetricsReader>,
    storage: Arc<dyn StorageBackend>,
}

impl Aggregator {
    pub fn new(reader: Arc<dyn MetricsReader>, storage: Arc<dyn StorageBackend>) -> Self {
        Self { reader, storage }
    }

    /// Summarize the last `limit` points of `(source, name)` into the hour ending at `now`
    #[instrument(skip(self, now))]
    pub async fn aggregate_hourly(
        &self,
        source: &str,
        name: &str,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<PairOutcome> {
        let points = self
            .reader
            .read_range(source, name, limit)
            .await
            .context("failed to read raw points")?;

        let Some(summary) = aggregate_points(&points) else {
            trace!("no points to aggregate");
            return Ok(PairOutcome::Skipped);
        };

        let aggregated = AggregatedMetric {
            source: source.to_string(),
            name: name.to_string(),
            avg_value: summary.avg,
            min_value: summary.min,
            max_value: summary.max,
            count: summary.count,
            time_range: TIME_RANGE.to_string(),
            start_time: now - WINDOW,
            end_time: now,
        };

        self.storage
            .save_aggregated(&aggregated)
            .await
            .context("failed to save aggregate")?;

        Ok(PairOutcome::Stored(aggregated))
    }

    /// One tick: every pair in its own task, joined before returning
    pub async fn run_tick(
        self: &Arc<Self>,
        pairs: Vec<(String, String)>,
        limit: usize,
    ) -> TickReport {
        let now = Utc::now();

        let tasks = pairs.into_iter().map(|(source, name)| {
            let label = format!("{source}/{name}");
            let aggregator = Arc::clone(self);
            let task = tokio::spawn(async move {
                aggregator
                    .aggregate_hourly(&source, &name, limit, now)
                    .await
            });
            (label, task)
        });
        let (labels, tasks): (Vec<_>, Vec<_>) = tasks.unzip();
        let results = join_all(tasks).await;

        let mut report = TickReport::default();
        for (label, result) in labels.into_iter().zip(results) {
            match result {
                Ok(Ok(PairOutcome::Stored(aggregated))) => report.stored.push(aggregated),
                Ok(Ok(PairOutcome::Skipped)) => report.skipped.push(label),
                Ok(Err(e)) => report.errors.push(format!("{label}: {e:#}")),
                Err(e) => report.errors.push(format!("{label}: task failed: {e}")),
            }
        }

        if !report.errors.is_empty() {
            warn!(
                "aggregation finished with {} errors:\n- {}",
                report.errors.len(),
                report.errors.join("\n- ")
            );
        }
        if !report.stored.is_empty() {
            let done: Vec<String> = report
                .stored
                .iter()
                .map(|a| format!("{}/{} ({} points)", a.source, a.name, a.count))
                .collect();
            info!("aggregated {}", done.join(", "));
        }
        if !report.skipped.is_empty() {
            debug!("no raw points for {}", report.skipped.join(", "));
        }

        report
    }
}

/// Actor running aggregation ticks on the configured interval
pub struct AggregatorActor {
    aggregator: Arc<Aggregator>,
    config: Arc<ConfigStore>,
    command_rx: mpsc::Receiver<AggregatorCommand>,
    cancel: CancellationToken,
}

impl AggregatorActor {
    pub fn new(
        aggregator: Arc<Aggregator>,
        config: Arc<ConfigStore>,
        command_rx: mpsc::Receiver<AggregatorCommand>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            aggregator,
            config,
            command_rx,
            cancel,
        }
    }

    fn ticker(period: Duration) -> Interval {
        // first tick fires one full period after start
        let now = Instant::now();
        let mut ticker = interval_at(now.checked_add(period).unwrap_or(now), period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    }

    async fn tick(&self) -> TickReport {
        let snapshot = self.config.snapshot();
        self.aggregator
            .run_tick(snapshot.aggregator.pairs(), snapshot.aggregator.limit)
            .await
    }

    #[instrument(skip(self))]
    pub async fn run(mut self) {
        let mut period = self.config.snapshot().aggregator.interval();
        debug!("starting aggregator actor with interval {period:?}");

        let mut ticker = Self::ticker(period);
        let mut commands_open = true;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("aggregator cancelled");
                    break;
                }

                _ = ticker.tick() => {
                    self.tick().await;

                    let configured = self.config.snapshot().aggregator.interval();
                    if configured != period {
                        info!("aggregation interval changed from {period:?} to {configured:?}");
                        period = configured;
                        ticker = Self::ticker(period);
                    }
                }

                cmd = self.command_rx.recv(), if commands_open => {
                    match cmd {
                        Some(AggregatorCommand::AggregateNow { respond_to }) => {
                            debug!("received AggregateNow command");
                            let report = self.tick().await;
                            let _ = respond_to.send(report);
                        }
                        Some(AggregatorCommand::Shutdown) => {
                            debug!("received shutdown command");
                            break;
                        }
                        None => commands_open = false,
                    }
                }
            }
        }

        debug!("aggregator actor stopped");
    }
}

#[derive(Clone)]
pub struct AggregatorHandle {
    sender: mpsc::Sender<AggregatorCommand>,
}

impl AggregatorHandle {
    pub fn spawn(
        aggregator: Arc<Aggregator>,
        config: Arc<ConfigStore>,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let actor = AggregatorActor::new(aggregator, config, cmd_rx, cancel);
        let task = tokio::spawn(actor.run());
        (Self { sender: cmd_tx }, task)
    }

    /// Run a tick now and wait for its report
    pub async fn aggregate_now(&self) -> Result<TickReport> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(AggregatorCommand::AggregateNow { respond_to: tx })
            .await
            .context("failed to send AggregateNow command")?;

        rx.await.context("failed to receive response")
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(AggregatorCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
