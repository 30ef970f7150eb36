use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use arc_swap::ArcSwap;
use tracing::{info, trace};

use crate::cache::TtlPolicy;
use crate::cache::ttl::{DEFAULT_TTL, GITHUB_TTL, OPEN_WEATHER_TTL, UPTIME_TTL};
use crate::sources::{github, openweather, uptime};

/// Upper bound for every configured interval, timeout and TTL (one year)
pub const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

fn check_duration(field: &str, secs: u64) -> anyhow::Result<()> {
    if secs > MAX_DURATION_SECS {
        bail!("{field} must be at most {MAX_DURATION_SECS} seconds, got {secs}");
    }
    Ok(())
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    /// Deployment environment, `dev` enables trace logging
    pub env: String,
    pub transport: TransportConfig,
    pub collector: CollectorConfig,
    pub cache: CacheConfig,
    pub storage: StorageConfig,
    pub aggregator: AggregatorConfig,
    pub notification: NotificationConfig,
    pub api: ApiConfig,
    pub remote: RemoteConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            env: "prod".to_string(),
            transport: TransportConfig::default(),
            collector: CollectorConfig::default(),
            cache: CacheConfig::default(),
            storage: StorageConfig::default(),
            aggregator: AggregatorConfig::default(),
            notification: NotificationConfig::default(),
            api: ApiConfig::default(),
            remote: RemoteConfig::default(),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub partitions: usize,
    /// Records kept per partition
    pub retention: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            partitions: crate::broker::log::DEFAULT_PARTITIONS,
            retention: crate::broker::log::DEFAULT_RETENTION,
        }
    }
}

/// Sources polled by the collector; `null` disables a source
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub poll_interval_secs: u64,
    pub github: Option<GithubConfig>,
    pub open_weather: Option<OpenWeatherConfig>,
    pub uptime: Option<UptimeConfig>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            github: Some(GithubConfig::default()),
            open_weather: Some(OpenWeatherConfig::default()),
            uptime: Some(UptimeConfig::default()),
        }
    }
}

impl CollectorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    /// `owner/repo`
    pub repository: String,
    pub token: Option<String>,
    pub base_url: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            repository: "golang/go".to_string(),
            token: None,
            base_url: github::DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct OpenWeatherConfig {
    pub city: String,
    /// Without a key the source is not polled
    pub api_key: Option<String>,
    pub base_url: String,
}

impl Default for OpenWeatherConfig {
    fn default() -> Self {
        Self {
            city: "London".to_string(),
            api_key: None,
            base_url: openweather::DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct UptimeConfig {
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for UptimeConfig {
    fn default() -> Self {
        Self {
            url: uptime::DEFAULT_URL.to_string(),
            timeout_secs: uptime::DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub default_ttl_secs: u64,
    /// TTL per source, in seconds
    pub ttl_secs: HashMap<String, u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let ttl_secs = [
            (github::SOURCE, GITHUB_TTL),
            (openweather::SOURCE, OPEN_WEATHER_TTL),
            (uptime::SOURCE, UPTIME_TTL),
        ]
        .into_iter()
        .map(|(source, ttl)| (source.to_string(), ttl.as_secs()))
        .collect();

        Self {
            default_ttl_secs: DEFAULT_TTL.as_secs(),
            ttl_secs,
        }
    }
}

impl CacheConfig {
    pub fn ttl_policy(&self) -> TtlPolicy {
        TtlPolicy::new(
            self.ttl_secs
                .iter()
                .map(|(source, secs)| (source.clone(), Duration::from_secs(*secs)))
                .collect(),
            Duration::from_secs(self.default_ttl_secs),
        )
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    pub path: PathBuf,
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./metrics.db"),
            max_connections: crate::storage::sqlite::DEFAULT_MAX_CONNECTIONS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct MetricSelector {
    pub source: String,
    pub names: Vec<String>,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub interval_secs: u64,
    /// Raw points folded into one summary
    pub limit: usize,
    pub metrics: Vec<MetricSelector>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        let metrics = [
            (github::SOURCE, github::NAME),
            (openweather::SOURCE, openweather::NAME),
            (uptime::SOURCE, uptime::NAME),
        ]
        .into_iter()
        .map(|(source, name)| MetricSelector {
            source: source.to_string(),
            names: vec![name.to_string()],
        })
        .collect();

        Self {
            interval_secs: 3600,
            limit: 60,
            metrics,
        }
    }
}

impl AggregatorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Every declared `(source, name)` pair
    pub fn pairs(&self) -> Vec<(String, String)> {
        self.metrics
            .iter()
            .flat_map(|selector| {
                selector
                    .names
                    .iter()
                    .map(|name| (selector.source.clone(), name.clone()))
            })
            .collect()
    }
}

/// A metric whose increases are announced
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct TrackedMetric {
    pub source: String,
    pub name: String,
    /// Key the last-seen value is stored under (e.g. `golang/go`)
    pub key: String,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub tracked: Vec<TrackedMetric>,
    pub max_tracked_keys: usize,
    pub alert: Option<Alert>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            tracked: vec![TrackedMetric {
                source: github::SOURCE.to_string(),
                name: github::NAME.to_string(),
                key: "golang/go".to_string(),
            }],
            max_tracked_keys: 1024,
            alert: None,
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alert {
    Discord(Discord),
    Webhook(Webhook),
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Webhook {
    pub url: String,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Discord {
    pub url: String,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            enable_cors: false,
        }
    }
}

/// Remote endpoints; unset means the in-process adapters are used
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub api_url: Option<String>,
    pub cache_url: Option<String>,
}

impl Config {
    pub fn is_dev(&self) -> bool {
        self.env == "dev"
    }

    /// Secrets and environment from the process environment win over the file
    pub fn apply_env(&mut self) {
        if let Some(env) = crate::util::get_env() {
            self.env = env;
        }

        if let (Some(github), Some(token)) =
            (self.collector.github.as_mut(), crate::util::get_github_token())
        {
            github.token = Some(token);
        }

        if let (Some(weather), Some(key)) = (
            self.collector.open_weather.as_mut(),
            crate::util::get_openweather_api_key(),
        ) {
            weather.api_key = Some(key);
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.transport.partitions == 0 {
            bail!("transport.partitions must be greater than zero");
        }
        if self.transport.retention == 0 {
            bail!("transport.retention must be greater than zero");
        }
        if self.collector.poll_interval_secs == 0 {
            bail!("collector.poll_interval_secs must be greater than zero");
        }
        check_duration("collector.poll_interval_secs", self.collector.poll_interval_secs)?;
        if let Some(github) = &self.collector.github {
            if !github::is_valid_repository(&github.repository) {
                bail!(
                    "collector.github.repository {:?} is not of the form 'owner/repo'",
                    github.repository
                );
            }
        }
        if let Some(uptime) = &self.collector.uptime {
            if uptime.timeout_secs == 0 {
                bail!("collector.uptime.timeout_secs must be greater than zero");
            }
            check_duration("collector.uptime.timeout_secs", uptime.timeout_secs)?;
        }
        check_duration("cache.default_ttl_secs", self.cache.default_ttl_secs)?;
        for (source, ttl) in &self.cache.ttl_secs {
            check_duration(&format!("cache.ttl_secs.{source}"), *ttl)?;
        }
        if self.storage.max_connections == 0 {
            bail!("storage.max_connections must be greater than zero");
        }
        if self.aggregator.interval_secs == 0 {
            bail!("aggregator.interval_secs must be greater than zero");
        }
        check_duration("aggregator.interval_secs", self.aggregator.interval_secs)?;
        if self.aggregator.limit == 0 {
            bail!("aggregator.limit must be greater than zero");
        }
        if self.notification.max_tracked_keys == 0 {
            bail!("notification.max_tracked_keys must be greater than zero");
        }
        Ok(())
    }
}

pub fn read_config_file(path: impl AsRef<Path>) -> anyhow::Result<Config> {
    let path = path.as_ref();
    let file_content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_json::from_str(&file_content)
        .with_context(|| format!("invalid configuration file {}", path.display()))
        .inspect(|config| trace!("loaded config: {config:?}"))
}

/// Read, apply environment overrides and validate
pub fn load_config(path: impl AsRef<Path>) -> anyhow::Result<Config> {
    let mut config = read_config_file(path)?;
    config.apply_env();
    config.validate()?;
    Ok(config)
}

/// Immutable configuration snapshot that can be swapped atomically
///
/// Readers call [`ConfigStore::snapshot`] and keep the returned `Arc` for as
/// long as they need a consistent view. A reload never mutates a snapshot
/// that is already handed out.
#[derive(Debug)]
pub struct ConfigStore {
    current: ArcSwap<Config>,
    path: Option<PathBuf>,
}

impl ConfigStore {
    pub fn load(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let config = load_config(&path)?;
        Ok(Self {
            current: ArcSwap::from_pointee(config),
            path: Some(path),
        })
    }

    /// Store without a backing file; `reload` keeps the snapshot as is
    pub fn from_config(config: Config) -> Self {
        Self {
            current: ArcSwap::from_pointee(config),
            path: None,
        }
    }

    pub fn snapshot(&self) -> Arc<Config> {
        self.current.load_full()
    }

    /// Re-read the backing file; on error the previous snapshot stays active
    pub fn reload(&self) -> anyhow::Result<Arc<Config>> {
        let Some(path) = &self.path else {
            return Ok(self.snapshot());
        };

        let config = Arc::new(load_config(path)?);
        self.current.store(config.clone());
        info!("configuration reloaded from {}", path.display());
        Ok(config)
    }

    pub fn replace(&self, config: Config) -> anyhow::Result<()> {
        config.validate()?;
        self.current.store(Arc::new(config));
        Ok(())
    }
}
