//! Integration tests for storage persistence
//!
//! These tests verify that:
//! - Metrics survive closing and reopening the database
//! - Range reads are ordered newest first and honor the limit
//! - Labels keep their scalar type through storage
//! - A batch with bad items keeps the good ones

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use metric_platform::{
    LabelValue, Metric,
    storage::{BatchOutcome, StorageBackend, sqlite::SqliteBackend},
};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

use crate::helpers::*;

#[tokio::test]
async fn test_metrics_survive_reopen() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("metrics.db");

    {
        let backend = SqliteBackend::new(&db_path).await.unwrap();
        let outcome = backend
            .store_batch(&[stars(100.0), stars(101.0)])
            .await
            .unwrap();
        assert_matches!(outcome, BatchOutcome::AllStored { count: 2 });
        backend.close().await.unwrap();
    }

    let backend = SqliteBackend::new(&db_path).await.unwrap();
    let stored = backend
        .read_range("GitHub", "stargazers_count", 10)
        .await
        .unwrap();
    assert_eq!(stored.len(), 2);
}

#[tokio::test]
async fn test_range_is_newest_first_and_limited() {
    let (storage, _dir) = temp_storage().await;
    let base = Utc::now();

    let batch: Vec<Metric> = (0..5)
        .map(|i| stars(i as f64).collected_at(base + Duration::seconds(i)))
        .collect();
    storage.store_batch(&batch).await.unwrap();

    let stored = storage
        .read_range("GitHub", "stargazers_count", 3)
        .await
        .unwrap();
    let values: Vec<f64> = stored.iter().map(|m| m.value).collect();
    assert_eq!(values, vec![4.0, 3.0, 2.0]);

    let latest = storage
        .read_latest("GitHub", "stargazers_count")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.value, 4.0);
}

#[tokio::test]
async fn test_pairs_do_not_mix() {
    let (storage, _dir) = temp_storage().await;

    storage
        .store_batch(&[
            stars(1.0),
            Metric::new("OpenWeatherMap", "temperature_celsius", 18.0),
        ])
        .await
        .unwrap();

    let weather = storage
        .read_range("OpenWeatherMap", "temperature_celsius", 10)
        .await
        .unwrap();
    assert_eq!(weather.len(), 1);
    assert_eq!(weather[0].value, 18.0);

    assert!(
        storage
            .read_latest("GitHub", "forks_count")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_label_types_survive_storage() {
    let (storage, _dir) = temp_storage().await;

    let metric = Metric::new("UptimeChecker", "availability_percent", 100.0)
        .with_label("site", "google.com")
        .with_label("status", LabelValue::Int(200))
        .with_label("reachable", LabelValue::Bool(true))
        .with_label("latency", LabelValue::Float(0.25));
    storage.store_batch(&[metric.clone()]).await.unwrap();

    let stored = storage
        .read_latest("UptimeChecker", "availability_percent")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.labels, metric.labels);
}

#[tokio::test]
async fn test_bad_items_are_dropped_and_the_rest_kept() {
    let (storage, _dir) = temp_storage().await;

    let batch = [
        stars(1.0),
        stars(2.0).with_label("ratio", LabelValue::Float(f64::INFINITY)),
        Metric::new("", "stargazers_count", 3.0),
        stars(4.0),
    ];

    let outcome = storage.store_batch(&batch).await.unwrap();
    assert_eq!(outcome.stored(), 2);
    assert_eq!(outcome.failed(), 2);

    let partial = assert_matches!(outcome, BatchOutcome::Partial(partial) => partial);
    let indexes: Vec<usize> = partial.errors.iter().map(|e| e.index).collect();
    assert_eq!(indexes, vec![1, 2]);

    let stored = storage
        .read_range("GitHub", "stargazers_count", 10)
        .await
        .unwrap();
    assert_eq!(stored.len(), 2);
}

#[tokio::test]
async fn test_stats_count_rows() {
    let (storage, _dir) = temp_storage().await;
    storage.store_batch(&[stars(1.0), stars(2.0)]).await.unwrap();

    let stats = storage.get_stats().await.unwrap();
    assert!(stats.contains("2 raw rows"), "{stats}");
}
