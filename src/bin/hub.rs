use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use metric_platform::{
    actors::{
        aggregator::{Aggregator, AggregatorHandle},
        cache_fill::{self, CacheFiller},
        collector::CollectorHandle,
        notification::{self, NotificationProcessor},
        persister::{self, Persister},
    },
    api::{ApiState, spawn_api_server},
    broker::PartitionedLog,
    cache::MemoryCache,
    config::{CollectorConfig, ConfigStore},
    notifier,
    remote::{
        CacheServiceClient, CachedMetricLookup, LocalCacheLookup, MetricsReader, ReadApiClient,
        StorageReader,
    },
    sources::{GithubSource, MetricSource, OpenWeatherSource, UptimeSource},
    storage::{StorageBackend, sqlite::SqliteBackend},
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

const CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Parser)]
#[command(version, about = "Collects, stores, caches and aggregates metrics")]
struct Args {
    /// Config file
    #[arg(short, long)]
    file: PathBuf,
}

fn init(dev: bool) {
    let level = if dev {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    };
    let filter = filter::Targets::new().with_targets(vec![
        ("metric_platform", level),
        ("metric_hub", level),
        ("tower_http", LevelFilter::INFO),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let store = Arc::new(ConfigStore::load(args.file.clone())?);
    let config = store.snapshot();

    init(config.is_dev());
    trace!("started with args: {args:?}");

    let storage: Arc<dyn StorageBackend> = Arc::new(
        SqliteBackend::with_max_connections(&config.storage.path, config.storage.max_connections)
            .await
            .context("failed to open storage")?,
    );
    let log = PartitionedLog::new(config.transport.partitions, config.transport.retention);
    let cache = Arc::new(MemoryCache::new());

    let sources = build_sources(&config.collector)?;
    let notifier = notifier::from_alert(config.notification.alert.as_ref())?;

    let cache_lookup: Arc<dyn CachedMetricLookup> = match &config.remote.cache_url {
        Some(url) => Arc::new(CacheServiceClient::new(url)?),
        None => Arc::new(LocalCacheLookup(cache.clone())),
    };
    let reader: Arc<dyn MetricsReader> = match &config.remote.api_url {
        Some(url) => Arc::new(ReadApiClient::new(url)?),
        None => Arc::new(StorageReader(storage.clone())),
    };

    let shutdown = CancellationToken::new();
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    // consumers join at the latest offset, so subscribe before anything publishes
    tasks.push(
        CacheFiller::new(cache.clone(), config.cache.ttl_policy())
            .spawn(log.subscribe(cache_fill::GROUP), shutdown.child_token()),
    );
    tasks.push(
        Persister::new(storage.clone())
            .spawn(log.subscribe(persister::GROUP), shutdown.child_token()),
    );
    tasks.push(
        NotificationProcessor::new(
            config.notification.tracked.clone(),
            config.notification.max_tracked_keys,
            notifier,
        )
        .spawn(log.subscribe(notification::GROUP), shutdown.child_token()),
    );
    tasks.push(spawn_cache_purge(cache.clone(), shutdown.child_token()));

    let (_, api_task) = spawn_api_server(
        &config.api,
        ApiState::new(storage.clone(), cache.clone()),
        shutdown.child_token(),
    )
    .await
    .context("failed to start API server")?;
    tasks.push(api_task);

    let (_collector, collector_task) = CollectorHandle::spawn(
        sources,
        Some(cache_lookup),
        log.clone(),
        config.collector.poll_interval(),
        shutdown.child_token(),
    );
    tasks.push(collector_task);

    let (_aggregator, aggregator_task) = AggregatorHandle::spawn(
        Arc::new(Aggregator::new(reader, storage.clone())),
        store.clone(),
        shutdown.child_token(),
    );
    tasks.push(aggregator_task);

    tasks.push(spawn_reload_on_hangup(store.clone(), shutdown.child_token())?);

    wait_for_termination().await;
    info!("shutting down");

    shutdown.cancel();
    log.close();

    for task in tasks {
        if let Err(e) = task.await {
            error!("{e}");
        }
    }

    storage.close().await?;
    info!("stopped");

    Ok(())
}

fn build_sources(config: &CollectorConfig) -> anyhow::Result<Vec<Arc<dyn MetricSource>>> {
    let mut sources: Vec<Arc<dyn MetricSource>> = Vec::new();

    if let Some(github) = &config.github {
        sources.push(Arc::new(GithubSource::new(
            &github.base_url,
            &github.repository,
            github.token.clone(),
        )?));
    }

    if let Some(weather) = &config.open_weather {
        match &weather.api_key {
            Some(key) => sources.push(Arc::new(OpenWeatherSource::new(
                &weather.base_url,
                key,
                &weather.city,
            )?)),
            None => warn!("no OpenWeatherMap api key configured, not polling the weather"),
        }
    }

    if let Some(uptime) = &config.uptime {
        sources.push(Arc::new(UptimeSource::new(
            &uptime.url,
            Duration::from_secs(uptime.timeout_secs),
        )?));
    }

    if sources.is_empty() {
        warn!("no sources configured, the collector will stay idle");
    }

    Ok(sources)
}

fn spawn_cache_purge(cache: Arc<MemoryCache>, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CACHE_PURGE_INTERVAL);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    cache.purge_expired().await;
                }
            }
        }
    })
}

#[cfg(unix)]
fn spawn_reload_on_hangup(
    store: Arc<ConfigStore>,
    cancel: CancellationToken,
) -> anyhow::Result<JoinHandle<()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = signal(SignalKind::hangup()).context("failed to install SIGHUP handler")?;

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = hangup.recv() => {
                    if received.is_none() {
                        break;
                    }
                    if let Err(e) = store.reload() {
                        error!("failed to reload configuration, keeping the previous one: {e:#}");
                    }
                }
            }
        }
    }))
}

#[cfg(not(unix))]
fn spawn_reload_on_hangup(
    _store: Arc<ConfigStore>,
    _cancel: CancellationToken,
) -> anyhow::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async {}))
}

async fn wait_for_termination() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
                return;
            }
            Err(e) => warn!("failed to install SIGTERM handler: {e}"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for ctrl-c: {e}");
    }
}
