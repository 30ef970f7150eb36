//! HTTP clients for the Read API and the cache service endpoint

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use super::{CachedMetricLookup, MetricsReader};
use crate::models::{Metric, MetricResponse, MetricsResponse};

const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared plumbing: base URL plus a pooled reqwest client
#[derive(Debug, Clone)]
struct ApiEndpoint {
    client: reqwest::Client,
    base: Url,
}

impl ApiEndpoint {
    fn new(base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url).with_context(|| format!("invalid API url {base_url}"))?;
        if base.cannot_be_a_base() {
            bail!("API url {base_url} cannot be used as a base");
        }

        let client = reqwest::Client::builder()
            .timeout(CLIENT_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { client, base })
    }

    /// `{base}/api/v1/{segments...}` with every segment percent-encoded
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("API url {} cannot be used as a base", self.base))?
            .pop_if_empty()
            .extend(["api", "v1"])
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!("GET {url}");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("failed to request {url}"))?;

        if !response.status().is_success() {
            bail!("{url} answered with {}", response.status());
        }

        response
            .json()
            .await
            .with_context(|| format!("failed to decode response from {url}"))
    }
}

/// Client for the Read API (`/api/v1/metrics/...`)
#[derive(Debug, Clone)]
pub struct ReadApiClient {
    endpoint: ApiEndpoint,
}

impl ReadApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            endpoint: ApiEndpoint::new(base_url)?,
        })
    }
}

#[async_trait]
impl MetricsReader for ReadApiClient {
    #[instrument(skip(self))]
    async fn read_range(&self, source: &str, name: &str, limit: usize) -> Result<Vec<Metric>> {
        let mut url = self.endpoint.url(&["metrics", source, name])?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string());

        let response: MetricsResponse = self.endpoint.get_json(url).await?;
        Ok(response.metrics.into_iter().map(Metric::from).collect())
    }

    #[instrument(skip(self))]
    async fn read_latest(&self, source: &str, name: &str) -> Result<Option<Metric>> {
        let url = self.endpoint.url(&["metrics", source, name, "latest"])?;
        let response: MetricResponse = self.endpoint.get_json(url).await?;
        Ok(response.metric.map(Metric::from))
    }
}

/// Client for the cache service endpoint (`/api/v1/cache/...`)
#[derive(Debug, Clone)]
pub struct CacheServiceClient {
    endpoint: ApiEndpoint,
}

impl CacheServiceClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            endpoint: ApiEndpoint::new(base_url)?,
        })
    }
}

#[async_trait]
impl CachedMetricLookup for CacheServiceClient {
    #[instrument(skip(self))]
    async fn get_cached(&self, source: &str, name: &str) -> Result<Option<Metric>> {
        let url = self.endpoint.url(&["cache", source, name])?;
        let response: MetricResponse = self.endpoint.get_json(url).await?;
        Ok(response.metric.map(Metric::from))
    }
}
