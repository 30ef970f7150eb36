use anyhow::{Context, bail};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::json;
use tracing::{info, instrument};

use super::{Notifier, format_increase};
use crate::config::Webhook;

/// Posts `{message, key, old, new, timestamp}` to a generic webhook
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    webhook: Webhook,
}

impl WebhookNotifier {
    pub fn new(webhook: Webhook) -> anyhow::Result<Self> {
        Ok(Self {
            client: crate::sources::http_client(crate::sources::REQUEST_TIMEOUT)?,
            webhook,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    #[instrument(skip(self))]
    async fn notify_increase(&self, key: &str, old: f64, new: f64) -> anyhow::Result<()> {
        let payload = json!({
            "message": format_increase(old, new),
            "key": key,
            "old": old,
            "new": new,
            "timestamp": Utc::now().to_rfc3339()
        });

        let response = self
            .client
            .post(&self.webhook.url)
            .json(&payload)
            .send()
            .await
            .context("failed to send webhook alert")?;

        if !response.status().is_success() {
            bail!("webhook alert failed with status: {}", response.status());
        }

        info!("successfully sent webhook alert");
        Ok(())
    }
}
