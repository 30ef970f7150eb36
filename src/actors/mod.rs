//! Long-lived pipeline tasks
//!
//! Each actor runs as an independent Tokio task with its own child of the
//! process-wide cancellation token.
//!
//! ## Architecture Overview
//!
//! ```text
//!   external sources        cache lookup
//!          │                     │
//!   ┌──────▼─────────────────────▼──┐
//!   │         CollectorActor         │ ◄── PollNow
//!   └──────────────┬────────────────┘
//!                  │ publish
//!        ┌─────────▼──────────┐
//!        │  PartitionedLog     │ (one offset per consumer group)
//!        └──┬──────┬───────┬──┘
//!           │      │       │ consume
//!   ┌───────▼┐ ┌───▼─────┐ ┌▼────────────────────┐
//!   │CacheFill│ │Persister│ │NotificationProcessor│
//!   └───┬─────┘ └───┬─────┘ └──────────┬──────────┘
//!       ▼           ▼                  ▼
//!     cache      storage ◄──┐        notifier
//!                   │       │
//!              MetricsReader│
//!                   │       │
//!           ┌───────▼───────┴┐
//!           │ AggregatorActor │ ◄── AggregateNow
//!           └────────────────┘
//! ```
//!
//! ## Communication Patterns
//!
//! 1. **Transport**: metrics flow through the partitioned log, every consumer
//!    group sees every message
//! 2. **Commands**: the collector and aggregator accept mpsc commands
//! 3. **Request/Response**: oneshot channels return cycle reports

pub mod aggregator;
pub mod cache_fill;
pub mod collector;
pub mod consumer;
pub mod messages;
pub mod notification;
pub mod persister;
