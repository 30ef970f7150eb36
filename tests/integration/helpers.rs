//! Helper functions for integration tests

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use metric_platform::{
    Metric,
    notifier::Notifier,
    sources::{MetricSource, Reading},
    storage::{StorageBackend, sqlite::SqliteBackend},
};
use tempfile::TempDir;
use tokio::sync::Mutex;

/// SQLite backend in a fresh temporary directory
///
/// The directory lives as long as the returned guard.
pub async fn temp_storage() -> (Arc<dyn StorageBackend>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let backend = SqliteBackend::new(dir.path().join("metrics.db"))
        .await
        .unwrap();
    (Arc::new(backend), dir)
}

/// Poll `check` until it returns true, panicking after two seconds
pub async fn wait_until<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

/// Source replaying a fixed series of readings, repeating the last one
pub struct ScriptedSource {
    source: String,
    name: String,
    values: std::sync::Mutex<VecDeque<f64>>,
    last: std::sync::Mutex<f64>,
    pub calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(source: &str, name: &str, values: &[f64]) -> Arc<Self> {
        Arc::new(Self {
            source: source.to_string(),
            name: name.to_string(),
            values: std::sync::Mutex::new(values.iter().copied().collect()),
            last: std::sync::Mutex::new(0.0),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricSource for ScriptedSource {
    fn source(&self) -> &str {
        &self.source
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> anyhow::Result<Reading> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.values.lock().unwrap().pop_front() {
            *last = next;
        }
        Ok(Reading {
            value: *last,
            labels: Default::default(),
        })
    }
}

pub fn as_sources(list: &[&Arc<ScriptedSource>]) -> Vec<Arc<dyn MetricSource>> {
    list.iter()
        .map(|source| Arc::clone(*source) as Arc<dyn MetricSource>)
        .collect()
}

/// Notifier remembering every call
#[derive(Default)]
pub struct RecordingNotifier {
    pub calls: Mutex<Vec<(String, f64, f64)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_increase(&self, key: &str, old: f64, new: f64) -> anyhow::Result<()> {
        self.calls.lock().await.push((key.to_string(), old, new));
        Ok(())
    }
}

pub fn stars(value: f64) -> Metric {
    Metric::new("GitHub", "stargazers_count", value).with_label("repository", "golang/go")
}
