//! In-process partitioned log
//!
//! Append-only partitions of JSON records with consumer-group offsets.
//!
//! ## Semantics
//!
//! - A metric's partition is derived from its `(source, name)` pair, so
//!   readings of one pair stay ordered
//! - A newly created group starts at the end of every partition; later
//!   subscribers of an existing group share (and resume from) its offsets
//! - Each partition retains at most `retention` records; a group that falls
//!   behind is moved forward to the oldest retained record

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::{debug, instrument, trace, warn};

use super::error::{BrokerError, BrokerResult};
use super::{MessageBroker, MessageConsumer};
use crate::models::Metric;

/// Default number of partitions
pub const DEFAULT_PARTITIONS: usize = 3;

/// Default number of records retained per partition
pub const DEFAULT_RETENTION: usize = 10_000;

#[derive(Debug, Default)]
struct Partition {
    /// Offset of the first retained record
    base: u64,
    records: VecDeque<Arc<[u8]>>,
}

impl Partition {
    fn end(&self) -> u64 {
        self.base + self.records.len() as u64
    }
}

type GroupOffsets = Arc<Mutex<Vec<u64>>>;

/// Append-only partitioned log shared by producers and consumers
#[derive(Debug)]
pub struct PartitionedLog {
    partitions: Vec<Mutex<Partition>>,
    groups: Mutex<HashMap<String, GroupOffsets>>,
    notify: Notify,
    retention: usize,
    closed: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // a panic while holding the lock cannot leave a partition half-written
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl PartitionedLog {
    /// Create a log with `partitions` partitions (at least one)
    pub fn new(partitions: usize, retention: usize) -> Arc<Self> {
        let partitions = partitions.max(1);
        debug!("creating partitioned log with {partitions} partitions");

        Arc::new(Self {
            partitions: (0..partitions)
                .map(|_| Mutex::new(Partition::default()))
                .collect(),
            groups: Mutex::new(HashMap::new()),
            notify: Notify::new(),
            retention: retention.max(1),
            closed: AtomicBool::new(false),
        })
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Total number of retained records across all partitions
    pub fn retained(&self) -> usize {
        self.partitions.iter().map(|p| lock(p).records.len()).sum()
    }

    fn partition_for(&self, metric: &Metric) -> usize {
        let mut hasher = DefaultHasher::new();
        metric.source.hash(&mut hasher);
        metric.name.hash(&mut hasher);
        (hasher.finish() % self.partitions.len() as u64) as usize
    }

    fn append(&self, partition: usize, record: Arc<[u8]>) {
        let mut partition = lock(&self.partitions[partition]);
        partition.records.push_back(record);
        while partition.records.len() > self.retention {
            partition.records.pop_front();
            partition.base += 1;
        }
    }

    /// Subscribe to the log as a member of `group`
    pub fn subscribe(self: &Arc<Self>, group: impl Into<String>) -> LogConsumer {
        let group = group.into();
        let offsets = {
            let mut groups = lock(&self.groups);
            groups
                .entry(group.clone())
                .or_insert_with(|| {
                    debug!("creating consumer group {group} at latest offsets");
                    let latest = self.partitions.iter().map(|p| lock(p).end()).collect();
                    Arc::new(Mutex::new(latest))
                })
                .clone()
        };

        LogConsumer {
            log: Arc::clone(self),
            group,
            offsets,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Close the log; consumers get [`BrokerError::Closed`] once drained
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}

#[async_trait]
impl MessageBroker for PartitionedLog {
    #[instrument(skip(self, metrics), fields(count = metrics.len()))]
    async fn publish(&self, metrics: &[Metric]) -> BrokerResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::Closed);
        }

        let mut published = 0;
        let mut errors = Vec::new();

        for (i, metric) in metrics.iter().enumerate() {
            match serde_json::to_vec(metric) {
                Ok(bytes) => {
                    self.append(self.partition_for(metric), bytes.into());
                    published += 1;
                }
                Err(e) => errors.push(format!(
                    "metric {i} {}/{}: failed to serialize metric: {e}",
                    metric.source, metric.name
                )),
            }
        }

        if published > 0 {
            trace!("appended {published} records");
            self.notify.notify_waiters();
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(BrokerError::Serialization {
                published,
                failed: errors.len(),
                errors,
            })
        }
    }
}

/// Member of a consumer group
pub struct LogConsumer {
    log: Arc<PartitionedLog>,
    group: String,
    offsets: GroupOffsets,
    /// Partition to inspect first on the next poll (round robin)
    cursor: AtomicUsize,
}

impl LogConsumer {
    /// Take the next available record of this group, if any
    fn poll_once(&self) -> Option<Arc<[u8]>> {
        let mut offsets = lock(&self.offsets);
        let count = self.log.partitions.len();
        let start = self.cursor.load(Ordering::Relaxed);

        for i in 0..count {
            let index = (start + i) % count;
            let partition = lock(&self.log.partitions[index]);

            if offsets[index] < partition.base {
                warn!(
                    "consumer group {} lagged, skipped {} records on partition {index}",
                    self.group,
                    partition.base - offsets[index]
                );
                offsets[index] = partition.base;
            }

            if offsets[index] < partition.end() {
                let position = (offsets[index] - partition.base) as usize;
                let record = partition.records[position].clone();
                offsets[index] += 1;
                self.cursor.store(index + 1, Ordering::Relaxed);
                return Some(record);
            }
        }

        None
    }
}

#[async_trait]
impl MessageConsumer for LogConsumer {
    async fn consume(&self) -> BrokerResult<Metric> {
        loop {
            // register interest before polling so a concurrent publish is not missed
            let notified = self.log.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(record) = self.poll_once() {
                return serde_json::from_slice(&record)
                    .map_err(|e| BrokerError::Decode(e.to_string()));
            }

            if self.log.closed.load(Ordering::SeqCst) {
                return Err(BrokerError::Closed);
            }

            notified.await;
        }
    }

    fn group(&self) -> &str {
        &self.group
    }
}
