//! Shared consume loop for the transport subscribers
//!
//! Cache-fill, persister and notification all drain the transport the same
//! way: block on `consume`, hand the metric to a handler, and on a consume
//! error log it and pause for [`CONSUME_ERROR_PAUSE`] before trying again.
//! Only cancellation (or a closed transport) ends the loop.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument};

use crate::broker::{BrokerError, MessageConsumer};
use crate::models::Metric;

pub const CONSUME_ERROR_PAUSE: Duration = Duration::from_secs(1);

/// Per-metric work of one consumer component
#[async_trait]
pub trait MetricHandler: Send {
    async fn handle(&mut self, metric: Metric);
}

#[instrument(skip_all, fields(group = %consumer.group()))]
pub async fn consume_loop<C, H>(consumer: C, mut handler: H, cancel: CancellationToken)
where
    C: MessageConsumer,
    H: MetricHandler,
{
    debug!("starting consumer");

    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = consumer.consume() => result,
        };

        match result {
            Ok(metric) => handler.handle(metric).await,
            Err(BrokerError::Closed) => {
                debug!("transport closed");
                break;
            }
            Err(e) => {
                error!("failed to consume message: {e}");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(CONSUME_ERROR_PAUSE) => {}
                }
            }
        }
    }

    debug!("consumer stopped");
}
