//! Integration tests for API endpoints
//!
//! These tests verify that:
//! - Ingestion answers 202 / 207 / 400 / 500 as documented
//! - Range and latest reads return wire metrics newest first
//! - The cache endpoint distinguishes hits from misses
//! - Health reflects storage availability

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use chrono::{TimeZone, Utc};
use metric_platform::{
    AggregatedMetric,
    api::{ApiState, spawn_api_server},
    cache::{MemoryCache, MetricCache},
    config::ApiConfig,
    storage::StorageBackend,
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::helpers::*;

struct TestApi {
    addr: SocketAddr,
    storage: Arc<dyn StorageBackend>,
    cache: Arc<MemoryCache>,
    cancel: CancellationToken,
    _dir: TempDir,
}

impl TestApi {
    fn url(&self, path: &str) -> String {
        format!("http://{}/api/v1{}", self.addr, path)
    }
}

impl Drop for TestApi {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn spawn_test_api() -> TestApi {
    let (storage, dir) = temp_storage().await;
    let cache = Arc::new(MemoryCache::new());
    let cancel = CancellationToken::new();

    let config = ApiConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(), // Random port
        enable_cors: true,
    };

    let (addr, _task) = spawn_api_server(
        &config,
        ApiState::new(storage.clone(), cache.clone()),
        cancel.clone(),
    )
    .await
    .unwrap();

    TestApi {
        addr,
        storage,
        cache,
        cancel,
        _dir: dir,
    }
}

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let api = spawn_test_api().await;

    let response = reqwest::get(api.url("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json: Value = response.json().await.unwrap();
    assert_eq!(json["status"], "ok");
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn test_health_degrades_when_storage_is_closed() {
    let api = spawn_test_api().await;
    api.storage.close().await.unwrap();

    let response = reqwest::get(api.url("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let json: Value = response.json().await.unwrap();
    assert_eq!(json["status"], "degraded");
}

#[tokio::test]
async fn test_stats_endpoint_returns_storage_info() {
    let api = spawn_test_api().await;

    let response = reqwest::get(api.url("/stats")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json: Value = response.json().await.unwrap();
    assert!(json["storage"].as_str().unwrap().contains("0 raw rows"));
}

#[tokio::test]
async fn test_ingest_then_read_back() {
    let api = spawn_test_api().await;
    let client = reqwest::Client::new();

    let body = json!([
        {
            "source": "GitHub",
            "name": "stargazers_count",
            "value": 100.0,
            "labels": {"repository": "golang/go", "stars": 100, "public": true},
            "collected_at": "2024-05-01T10:00:00Z"
        },
        {
            "source": "GitHub",
            "name": "stargazers_count",
            "value": 101.0,
            "labels": {"repository": "golang/go"},
            "collected_at": "2024-05-01T10:01:00Z"
        }
    ]);

    let response = client
        .post(api.url("/metrics"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json: Value = response.json().await.unwrap();
    assert_eq!(json["successful_count"], 2);
    assert_eq!(json["failed_count"], 0);

    let json: Value = reqwest::get(api.url("/metrics/GitHub/stargazers_count?limit=10"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let metrics = json["metrics"].as_array().unwrap();
    assert_eq!(metrics.len(), 2);
    assert_eq!(metrics[0]["value"], 101.0);
    assert_eq!(metrics[1]["labels"]["stars"], "100");
    assert_eq!(metrics[1]["labels"]["public"], "true");

    let json: Value = reqwest::get(api.url("/metrics/GitHub/stargazers_count?limit=1"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["metrics"].as_array().unwrap().len(), 1);

    let json: Value = reqwest::get(api.url("/metrics/GitHub/stargazers_count/latest"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["metric"]["value"], 101.0);
    assert_eq!(json["metric"]["labels"]["repository"], "golang/go");
}

#[tokio::test]
async fn test_latest_of_unknown_pair_is_null() {
    let api = spawn_test_api().await;

    let response = reqwest::get(api.url("/metrics/Nobody/nothing/latest"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json: Value = response.json().await.unwrap();
    assert!(json["metric"].is_null());
}

#[tokio::test]
async fn test_partially_stored_batch_returns_multi_status() {
    let api = spawn_test_api().await;

    let body = json!([
        {"source": "GitHub", "name": "stargazers_count", "value": 1.0, "collected_at": "2024-05-01T10:00:00Z"},
        {"source": "", "name": "stargazers_count", "value": 2.0, "collected_at": "2024-05-01T10:00:00Z"}
    ]);

    let response = reqwest::Client::new()
        .post(api.url("/metrics"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::MULTI_STATUS);

    let json: Value = response.json().await.unwrap();
    assert_eq!(json["successful_count"], 1);
    assert_eq!(json["failed_count"], 1);
    assert_eq!(json["errors"].as_array().unwrap().len(), 1);

    let stored = api
        .storage
        .read_range("GitHub", "stargazers_count", 10)
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn test_invalid_bodies_are_rejected() {
    let api = spawn_test_api().await;
    let client = reqwest::Client::new();

    let empty = client
        .post(api.url("/metrics"))
        .json(&json!([]))
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let malformed = client
        .post(api.url("/metrics"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_ingest_fails_when_storage_is_closed() {
    let api = spawn_test_api().await;
    api.storage.close().await.unwrap();

    let body = json!([
        {"source": "GitHub", "name": "stargazers_count", "value": 1.0, "collected_at": "2024-05-01T10:00:00Z"}
    ]);

    let response = reqwest::Client::new()
        .post(api.url("/metrics"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_cache_endpoint_hit_and_miss() {
    let api = spawn_test_api().await;

    let json: Value = reqwest::get(api.url("/cache/GitHub/stargazers_count"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(json["metric"].is_null());

    api.cache
        .set_metric(&stars(42.0), Duration::from_secs(60))
        .await
        .unwrap();

    let json: Value = reqwest::get(api.url("/cache/GitHub/stargazers_count"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["metric"]["value"], 42.0);
    assert_eq!(json["metric"]["labels"]["repository"], "golang/go");
}

#[tokio::test]
async fn test_aggregates_endpoint_lists_newest_first() {
    let api = spawn_test_api().await;

    for hour in [9, 10] {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap();
        api.storage
            .save_aggregated(&AggregatedMetric {
                source: "GitHub".to_string(),
                name: "stargazers_count".to_string(),
                avg_value: 10.0 + hour as f64,
                min_value: 10.0,
                max_value: 30.0,
                count: 4,
                time_range: "hour".to_string(),
                start_time: start,
                end_time: start + chrono::Duration::hours(1),
            })
            .await
            .unwrap();
    }

    let json: Value = reqwest::get(api.url("/aggregates/GitHub/stargazers_count"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let aggregates = json["aggregates"].as_array().unwrap();
    assert_eq!(aggregates.len(), 2);
    assert_eq!(aggregates[0]["avg_value"], 20.0);
    assert_eq!(aggregates[0]["time_range"], "hour");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let api = spawn_test_api().await;

    let response = reqwest::get(api.url("/servers")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
