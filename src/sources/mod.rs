//! External metric sources polled by the collector
//!
//! Each source produces one reading per poll for a fixed `(source, name)`
//! pair. Failures are returned to the collector, which logs them and skips
//! that source until the next tick.

pub mod github;
pub mod openweather;
pub mod uptime;

use async_trait::async_trait;

use crate::models::Labels;

pub use github::GithubSource;
pub use openweather::OpenWeatherSource;
pub use uptime::UptimeSource;

/// Timeout applied to requests against external APIs
pub const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// A single value read from an external source
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub value: f64,
    pub labels: Labels,
}

/// An external system producing one metric
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Producer identity (e.g. "GitHub")
    fn source(&self) -> &str;

    /// Metric identifier (e.g. "stargazers_count")
    fn name(&self) -> &str;

    /// Call the external system for a fresh reading
    async fn fetch(&self) -> anyhow::Result<Reading>;
}

pub(crate) fn http_client(timeout: std::time::Duration) -> anyhow::Result<reqwest::Client> {
    use anyhow::Context;

    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("metric-platform/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")
}
