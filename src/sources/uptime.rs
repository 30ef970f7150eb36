//! HTTP availability check
//!
//! A 2xx response reads as 100 % availability, anything else as 0 %. An
//! unreachable site is an outage observation, so transport errors also
//! produce a 0 % reading instead of an error.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{instrument, warn};

use super::{MetricSource, Reading, http_client};
use crate::models::Labels;

pub const SOURCE: &str = "UptimeChecker";
pub const NAME: &str = "availability_percent";
pub const DEFAULT_URL: &str = "https://www.google.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct UptimeSource {
    client: reqwest::Client,
    url: String,
    site: String,
}

impl UptimeSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url = url.into();
        let site = site_label(&url);

        Ok(Self {
            client: http_client(timeout)?,
            url,
            site,
        })
    }
}

/// Host part of `url` without a leading `www.`
fn site_label(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .map(|host| host.trim_start_matches("www.").to_string())
        .unwrap_or_else(|| url.to_string())
}

#[async_trait]
impl MetricSource for UptimeSource {
    fn source(&self) -> &str {
        SOURCE
    }

    fn name(&self) -> &str {
        NAME
    }

    #[instrument(skip(self), fields(site = %self.site))]
    async fn fetch(&self) -> Result<Reading> {
        let value = match self.client.get(&self.url).send().await {
            Ok(response) if response.status().is_success() => 100.0,
            Ok(response) => {
                warn!("{} answered with {}", self.url, response.status());
                0.0
            }
            Err(e) => {
                warn!("failed to check uptime of {}: {e}", self.url);
                0.0
            }
        };

        let mut labels = Labels::new();
        labels.insert("site".to_string(), self.site.as_str().into());

        Ok(Reading { value, labels })
    }
}
