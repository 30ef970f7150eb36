//! Integration tests for the HTTP clients against a live API server
//!
//! Covers the split deployment: aggregator and collector running apart from
//! the storage and cache they read through the API.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::{TimeZone, Utc};
use metric_platform::{
    Metric,
    actors::aggregator::{Aggregator, PairOutcome},
    api::{ApiState, spawn_api_server},
    cache::{MemoryCache, MetricCache},
    config::ApiConfig,
    remote::{CacheServiceClient, CachedMetricLookup, MetricsReader, ReadApiClient},
    storage::StorageBackend,
};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use crate::helpers::*;

struct Remote {
    base_url: String,
    storage: Arc<dyn StorageBackend>,
    cache: Arc<MemoryCache>,
    cancel: CancellationToken,
    _dir: tempfile::TempDir,
}

impl Drop for Remote {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn spawn_remote() -> Remote {
    let (storage, dir) = temp_storage().await;
    let cache = Arc::new(MemoryCache::new());
    let cancel = CancellationToken::new();

    let config = ApiConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        enable_cors: false,
    };
    let (addr, _task) = spawn_api_server(
        &config,
        ApiState::new(storage.clone(), cache.clone()),
        cancel.clone(),
    )
    .await
    .unwrap();

    Remote {
        base_url: format!("http://{addr}"),
        storage,
        cache,
        cancel,
        _dir: dir,
    }
}

#[tokio::test]
async fn test_read_client_round_trips_labels_as_strings() {
    let remote = spawn_remote().await;
    remote
        .storage
        .store_batch(&[stars(7.0).with_label("forks", 3i64)])
        .await
        .unwrap();

    let client = ReadApiClient::new(&remote.base_url).unwrap();

    let range = client
        .read_range("GitHub", "stargazers_count", 10)
        .await
        .unwrap();
    assert_eq!(range.len(), 1);
    assert_eq!(range[0].labels["forks"].as_str(), Some("3"));

    let latest = client
        .read_latest("GitHub", "stargazers_count")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.value, 7.0);

    assert!(client.read_latest("GitHub", "watchers").await.unwrap().is_none());
}

#[tokio::test]
async fn test_cache_client_sees_hits_and_misses() {
    let remote = spawn_remote().await;
    let client = CacheServiceClient::new(&remote.base_url).unwrap();

    assert!(
        client
            .get_cached("UptimeChecker", "availability_percent")
            .await
            .unwrap()
            .is_none()
    );

    remote
        .cache
        .set_metric(
            &Metric::new("UptimeChecker", "availability_percent", 100.0)
                .with_label("site", "google.com"),
            Duration::from_secs(60),
        )
        .await
        .unwrap();

    let hit = client
        .get_cached("UptimeChecker", "availability_percent")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(hit.value, 100.0);
}

#[tokio::test]
async fn test_cache_client_fails_when_service_is_down() {
    let client = CacheServiceClient::new("http://127.0.0.1:9").unwrap();
    assert!(client.get_cached("GitHub", "stargazers_count").await.is_err());
}

#[tokio::test]
async fn test_aggregation_over_remote_reads() {
    let remote = spawn_remote().await;
    remote
        .storage
        .store_batch(&[stars(10.0), stars(20.0), stars(30.0), stars(40.0)])
        .await
        .unwrap();

    let reader: Arc<dyn MetricsReader> = Arc::new(ReadApiClient::new(&remote.base_url).unwrap());
    let aggregator = Aggregator::new(reader, remote.storage.clone());
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap();

    let outcome = aggregator
        .aggregate_hourly("GitHub", "stargazers_count", 60, now)
        .await
        .unwrap();
    let aggregated = assert_matches!(outcome, PairOutcome::Stored(a) => a);

    assert_eq!(aggregated.count, 4);
    assert_eq!(aggregated.avg_value, 25.0);
    assert_eq!(aggregated.min_value, 10.0);
    assert_eq!(aggregated.max_value, 40.0);
    assert_eq!(aggregated.time_range, "hour");
    assert_eq!(aggregated.end_time, now);
    assert_eq!(
        aggregated.start_time,
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    );

    let stored = remote
        .storage
        .query_aggregated("GitHub", "stargazers_count", 10)
        .await
        .unwrap();
    assert_eq!(stored, vec![aggregated]);
}

#[tokio::test]
async fn test_tick_reports_each_pair() {
    let remote = spawn_remote().await;
    remote.storage.store_batch(&[stars(5.0)]).await.unwrap();

    let reader: Arc<dyn MetricsReader> = Arc::new(ReadApiClient::new(&remote.base_url).unwrap());
    let aggregator = Arc::new(Aggregator::new(reader, remote.storage.clone()));

    let report = aggregator
        .run_tick(
            vec![
                ("GitHub".to_string(), "stargazers_count".to_string()),
                ("OpenWeatherMap".to_string(), "temperature_celsius".to_string()),
            ],
            60,
        )
        .await;

    assert_eq!(report.stored.len(), 1);
    assert_eq!(report.stored[0].count, 1);
    assert_eq!(
        report.skipped,
        vec!["OpenWeatherMap/temperature_celsius".to_string()]
    );
    assert!(report.errors.is_empty());
}
