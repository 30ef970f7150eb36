//! Delivery of "value increased" notifications

pub mod discord;
pub mod webhook;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::Alert;

pub use discord::DiscordNotifier;
pub use webhook::WebhookNotifier;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Announce that the value tracked under `key` went from `old` to `new`
    async fn notify_increase(&self, key: &str, old: f64, new: f64) -> anyhow::Result<()>;
}

/// `Stars: 100 -> 150 (+50)`
pub fn format_increase(old: f64, new: f64) -> String {
    format!("Stars: {old} -> {new} (+{})", new - old)
}

/// Writes the notification to the log only
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_increase(&self, key: &str, old: f64, new: f64) -> anyhow::Result<()> {
        info!("{key}: {}", format_increase(old, new));
        Ok(())
    }
}

/// Notifier for the configured alert, log-only when none is configured
pub fn from_alert(alert: Option<&Alert>) -> anyhow::Result<Arc<dyn Notifier>> {
    Ok(match alert {
        Some(Alert::Discord(discord)) => Arc::new(DiscordNotifier::new(discord.clone())?),
        Some(Alert::Webhook(webhook)) => Arc::new(WebhookNotifier::new(webhook.clone())?),
        None => Arc::new(LogNotifier),
    })
}
