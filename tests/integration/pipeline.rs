//! Integration tests for the full metric pipeline
//!
//! Collector → transport → cache-fill / persister / notification, wired the
//! way the hub wires them.

use std::sync::Arc;
use std::time::Duration;

use metric_platform::{
    Metric,
    actors::{
        cache_fill::{self, CacheFiller},
        collector::CollectorHandle,
        notification::{self, NotificationProcessor},
        persister::{self, Persister},
    },
    broker::{MessageBroker, PartitionedLog},
    cache::{MemoryCache, MetricCache},
    config::{CacheConfig, TrackedMetric},
    remote::{CachedMetricLookup, LocalCacheLookup},
    storage::StorageBackend,
};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use crate::helpers::*;

const SLOW: Duration = Duration::from_secs(3600);

struct Pipeline {
    log: Arc<PartitionedLog>,
    cache: Arc<MemoryCache>,
    storage: Arc<dyn StorageBackend>,
    notifier: Arc<RecordingNotifier>,
    cancel: CancellationToken,
    tasks: Vec<tokio::task::JoinHandle<()>>,
    _dir: tempfile::TempDir,
}

async fn start_consumers() -> Pipeline {
    let (storage, dir) = temp_storage().await;
    let log = PartitionedLog::new(3, 1000);
    let cache = Arc::new(MemoryCache::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let cancel = CancellationToken::new();

    let tracked = vec![TrackedMetric {
        source: "GitHub".to_string(),
        name: "stargazers_count".to_string(),
        key: "golang/go".to_string(),
    }];

    let tasks = vec![
        CacheFiller::new(cache.clone(), CacheConfig::default().ttl_policy())
            .spawn(log.subscribe(cache_fill::GROUP), cancel.child_token()),
        Persister::new(storage.clone())
            .spawn(log.subscribe(persister::GROUP), cancel.child_token()),
        NotificationProcessor::new(tracked, 16, notifier.clone())
            .spawn(log.subscribe(notification::GROUP), cancel.child_token()),
    ];

    Pipeline {
        log,
        cache,
        storage,
        notifier,
        cancel,
        tasks,
        _dir: dir,
    }
}

impl Pipeline {
    async fn stored(&self) -> usize {
        self.storage
            .read_range("GitHub", "stargazers_count", 100)
            .await
            .unwrap()
            .len()
    }

    fn stored_at_least(&self, n: usize) -> impl std::future::Future<Output = bool> + '_ {
        async move { self.stored().await >= n }
    }

    async fn notified(&self) -> bool {
        !self.notifier.calls.lock().await.is_empty()
    }

    async fn stop(self) {
        self.cancel.cancel();
        self.log.close();
        for task in self.tasks {
            tokio::time::timeout(Duration::from_secs(2), task)
                .await
                .expect("consumer did not stop")
                .unwrap();
        }
    }
}

#[tokio::test]
async fn test_star_increase_is_announced_once() {
    let pipeline = start_consumers().await;
    let source = ScriptedSource::new("GitHub", "stargazers_count", &[100.0, 150.0, 150.0]);

    let (collector, task) = CollectorHandle::spawn(
        as_sources(&[&source]),
        None,
        pipeline.log.clone(),
        SLOW,
        pipeline.cancel.child_token(),
    );

    // the first cycle runs on spawn
    collector.poll_now().await.unwrap();
    collector.poll_now().await.unwrap();

    wait_until("three persisted readings", || pipeline.stored_at_least(3)).await;
    wait_until("a notification", || pipeline.notified()).await;

    let calls = pipeline.notifier.calls.lock().await.clone();
    assert_eq!(calls, vec![("golang/go".to_string(), 100.0, 150.0)]);

    let latest = pipeline
        .storage
        .read_latest("GitHub", "stargazers_count")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.value, 150.0);

    collector.shutdown().await.unwrap();
    task.await.unwrap();
    pipeline.stop().await;
}

#[tokio::test]
async fn test_cache_hit_skips_the_source_but_is_persisted() {
    let pipeline = start_consumers().await;
    let source = ScriptedSource::new("GitHub", "stargazers_count", &[100.0]);
    let lookup: Arc<dyn CachedMetricLookup> = Arc::new(LocalCacheLookup(pipeline.cache.clone()));

    let (collector, task) = CollectorHandle::spawn(
        as_sources(&[&source]),
        Some(lookup),
        pipeline.log.clone(),
        SLOW,
        pipeline.cancel.child_token(),
    );

    let cache = pipeline.cache.clone();
    wait_until("cache fill", || {
        let cache = cache.clone();
        async move {
            cache
                .get_metric("GitHub", "stargazers_count")
                .await
                .unwrap()
                .is_some()
        }
    })
    .await;

    let report = collector.poll_now().await.unwrap();
    assert_eq!(report.cache_hits, 1);
    assert_eq!(report.fetched, 0);
    assert_eq!(source.calls(), 1);

    wait_until("two persisted readings", || pipeline.stored_at_least(2)).await;

    let stored = pipeline
        .storage
        .read_range("GitHub", "stargazers_count", 10)
        .await
        .unwrap();
    assert_eq!(stored.iter().filter(|m| m.is_cache_derived()).count(), 1);
    assert!(stored.iter().all(|m| m.value == 100.0));

    // the republished value never refreshes the cache entry
    let cached = pipeline
        .cache
        .get_metric("GitHub", "stargazers_count")
        .await
        .unwrap()
        .unwrap();
    assert!(!cached.is_cache_derived());

    collector.shutdown().await.unwrap();
    task.await.unwrap();
    pipeline.stop().await;
}

#[tokio::test]
async fn test_ttl_follows_source() {
    let pipeline = start_consumers().await;

    pipeline
        .log
        .publish(&[
            stars(10.0),
            Metric::new("OpenWeatherMap", "temperature_celsius", 12.5),
            Metric::new("UptimeChecker", "availability_percent", 100.0),
            Metric::new("Custom", "queue_depth", 3.0),
        ])
        .await
        .unwrap();

    let cache = pipeline.cache.clone();
    wait_until("all four cached", || {
        let cache = cache.clone();
        async move { cache.len().await == 4 }
    })
    .await;

    let ttl = |source: &'static str, name: &'static str| {
        let cache = cache.clone();
        async move { cache.ttl_remaining(source, name).await.unwrap() }
    };

    let github = ttl("GitHub", "stargazers_count").await;
    let weather = ttl("OpenWeatherMap", "temperature_celsius").await;
    let uptime = ttl("UptimeChecker", "availability_percent").await;
    let custom = ttl("Custom", "queue_depth").await;

    assert!(github > Duration::from_secs(590) && github <= Duration::from_secs(600));
    assert!(weather > Duration::from_secs(290) && weather <= Duration::from_secs(300));
    assert!(uptime > Duration::from_secs(50) && uptime <= Duration::from_secs(60));
    assert!(custom > Duration::from_secs(290) && custom <= Duration::from_secs(300));

    pipeline.stop().await;
}

#[tokio::test]
async fn test_consumers_stop_on_cancel() {
    let pipeline = start_consumers().await;
    pipeline.log.publish(&[stars(1.0)]).await.unwrap();
    wait_until("one persisted reading", || pipeline.stored_at_least(1)).await;

    pipeline.stop().await;
}
