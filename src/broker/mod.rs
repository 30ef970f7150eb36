//! Message transport between producers and consumer groups
//!
//! ## Design
//!
//! - **Producers** publish batches of [`Metric`]s through [`MessageBroker`]
//! - **Consumers** pull one metric at a time through [`MessageConsumer`];
//!   `consume` suspends until a record is available
//! - Records are JSON-serialized metrics
//! - Offsets are tracked per named group, so every group sees every message
//!
//! [`PartitionedLog`] is the in-process implementation used by the hub.

pub mod error;
pub mod log;

use async_trait::async_trait;

use crate::models::Metric;

pub use error::{BrokerError, BrokerResult};
pub use log::{LogConsumer, PartitionedLog};

/// Publishing side of the transport
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Publish a batch of metrics
    ///
    /// Metrics that cannot be serialized are skipped; the remaining ones are
    /// still published and the tally is reported as
    /// [`BrokerError::Serialization`].
    async fn publish(&self, metrics: &[Metric]) -> BrokerResult<()>;
}

/// Consuming side of the transport, bound to one consumer group
#[async_trait]
pub trait MessageConsumer: Send + Sync {
    /// Wait for the next metric of this consumer's group
    async fn consume(&self) -> BrokerResult<Metric>;

    /// Name of the consumer group
    fn group(&self) -> &str;
}
