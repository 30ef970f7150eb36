use anyhow::{Context, bail};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use tracing::{info, instrument};

use super::{Notifier, format_increase};
use crate::config::Discord;

const GREEN: u32 = 3066993;

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Default)]
pub struct MessageBuilder {
    content: Option<String>,
    embeds: Vec<Embed>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(mut self, content: impl ToString) -> Self {
        self.content = Some(content.to_string());
        self
    }

    pub fn add_embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn build(self) -> Message {
        Message {
            content: self.content,
            embeds: self.embeds,
        }
    }
}

/// Posts an embed to a Discord webhook
#[derive(Debug, Clone)]
pub struct DiscordNotifier {
    client: Client,
    discord: Discord,
}

impl DiscordNotifier {
    pub fn new(discord: Discord) -> anyhow::Result<Self> {
        Ok(Self {
            client: crate::sources::http_client(crate::sources::REQUEST_TIMEOUT)?,
            discord,
        })
    }

    pub fn build_increase_embed(key: &str, old: f64, new: f64) -> Embed {
        Embed {
            title: Some("⭐ New stars".to_string()),
            description: Some(format!("**{key}**: {}", format_increase(old, new))),
            color: Some(GREEN),
            fields: vec![
                EmbedField {
                    name: "Previous".to_string(),
                    value: old.to_string(),
                    inline: true,
                },
                EmbedField {
                    name: "Current".to_string(),
                    value: new.to_string(),
                    inline: true,
                },
            ],
            timestamp: Some(Utc::now().to_rfc3339()),
        }
    }

    pub fn build_message(&self, key: &str, old: f64, new: f64) -> Message {
        let mut builder = MessageBuilder::new().add_embed(Self::build_increase_embed(key, old, new));
        if let Some(user_id) = &self.discord.user_id {
            builder = builder.content(format!("⭐ ({key} ~ {new}) <@{user_id}>"));
        }
        builder.build()
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    #[instrument(skip(self))]
    async fn notify_increase(&self, key: &str, old: f64, new: f64) -> anyhow::Result<()> {
        let message = self.build_message(key, old, new);

        let response = self
            .client
            .post(&self.discord.url)
            .json(&message)
            .send()
            .await
            .context("failed to send Discord message")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Discord message failed with status {status}: {body}");
        }

        info!("successfully sent Discord message");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_message_mentions_user() {
        let notifier = DiscordNotifier::new(Discord {
            url: "http://localhost".to_string(),
            user_id: Some("42".to_string()),
        })
        .unwrap();

        let message = notifier.build_message("golang/go", 100.0, 150.0);
        assert_eq!(message.content.as_deref(), Some("⭐ (golang/go ~ 150) <@42>"));
        assert_eq!(
            message.embeds[0].description.as_deref(),
            Some("**golang/go**: Stars: 100 -> 150 (+50)")
        );
    }

    #[tokio::test]
    async fn test_posts_embed() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/webhook"))
            .and(body_partial_json(serde_json::json!({
                "embeds": [{ "description": "**golang/go**: Stars: 100 -> 150 (+50)" }]
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let notifier = DiscordNotifier::new(Discord {
            url: format!("{}/webhook", mock_server.uri()),
            user_id: None,
        })
        .unwrap();

        notifier
            .notify_increase("golang/go", 100.0, 150.0)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rejected_message_is_an_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad embed"))
            .mount(&mock_server)
            .await;

        let notifier = DiscordNotifier::new(Discord {
            url: mock_server.uri(),
            user_id: None,
        })
        .unwrap();

        let err = notifier
            .notify_increase("golang/go", 1.0, 2.0)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("bad embed"));
    }
}
