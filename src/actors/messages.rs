//! Commands and reports exchanged with the scheduled actors
//!
//! Consumers only talk to the transport. The collector and the aggregator
//! additionally accept commands over an mpsc channel and answer through a
//! oneshot, which lets callers trigger a cycle and wait for its result.

use std::fmt;

use tokio::sync::oneshot;

use crate::models::AggregatedMetric;

/// Commands that can be sent to the CollectorActor
#[derive(Debug)]
pub enum CollectorCommand {
    /// Run a collection cycle now, independent of the timer
    PollNow {
        respond_to: oneshot::Sender<CollectionReport>,
    },

    /// Finish the current cycle and stop
    Shutdown,
}

/// How the metric of one source was obtained in a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collected {
    /// Fresh value from the external system
    Fetched,
    /// Cached value republished without calling the external system
    CacheHit,
}

/// A source whose cycle was aborted
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFailure {
    pub source: String,
    pub name: String,
    pub error: String,
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}: {}", self.source, self.name, self.error)
    }
}

/// Result of one collection cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionReport {
    pub fetched: usize,
    pub cache_hits: usize,
    pub failures: Vec<SourceFailure>,
}

impl CollectionReport {
    pub fn published(&self) -> usize {
        self.fetched + self.cache_hits
    }
}

/// Commands that can be sent to the AggregatorActor
#[derive(Debug)]
pub enum AggregatorCommand {
    /// Run an aggregation tick now, independent of the timer
    AggregateNow {
        respond_to: oneshot::Sender<TickReport>,
    },

    Shutdown,
}

/// Result of one aggregation tick across all declared pairs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Summaries written to storage
    pub stored: Vec<AggregatedMetric>,
    /// Pairs without raw points (`source/name`)
    pub skipped: Vec<String>,
    /// One entry per failed pair
    pub errors: Vec<String>,
}
