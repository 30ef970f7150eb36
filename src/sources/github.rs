//! GitHub repository stargazer count

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{instrument, trace};

use super::{MetricSource, REQUEST_TIMEOUT, Reading, http_client};
use crate::models::Labels;

pub const SOURCE: &str = "GitHub";
pub const NAME: &str = "stargazers_count";
pub const DEFAULT_BASE_URL: &str = "https://api.github.com";

#[derive(Debug, Deserialize)]
struct RepoInfo {
    stargazers_count: u64,
}

/// Stargazer count of one `owner/repo` repository
#[derive(Debug, Clone)]
pub struct GithubSource {
    client: reqwest::Client,
    base_url: String,
    repository: String,
    token: Option<String>,
}

impl GithubSource {
    pub fn new(
        base_url: impl Into<String>,
        repository: impl Into<String>,
        token: Option<String>,
    ) -> Result<Self> {
        let repository = repository.into();
        if !is_valid_repository(&repository) {
            bail!("invalid repository name {repository:?}, expected 'owner/repo'");
        }

        Ok(Self {
            client: http_client(REQUEST_TIMEOUT)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            repository,
            token: token.filter(|t| !t.is_empty()),
        })
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }
}

/// `owner/repo` with both parts non-empty
pub fn is_valid_repository(repository: &str) -> bool {
    matches!(repository.split_once('/'), Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/'))
}

#[async_trait]
impl MetricSource for GithubSource {
    fn source(&self) -> &str {
        SOURCE
    }

    fn name(&self) -> &str {
        NAME
    }

    #[instrument(skip(self), fields(repo = %self.repository))]
    async fn fetch(&self) -> Result<Reading> {
        let url = format!("{}/repos/{}", self.base_url, self.repository);
        trace!("requesting repository info from {url}");

        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github.v3+json");

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .context("failed to execute request")?;

        if !response.status().is_success() {
            bail!("unexpected status code: {}", response.status());
        }

        let info: RepoInfo = response
            .json()
            .await
            .context("failed to decode response body")?;

        let mut labels = Labels::new();
        labels.insert("repository".to_string(), self.repository.as_str().into());

        Ok(Reading {
            value: info.stargazers_count as f64,
            labels,
        })
    }
}
