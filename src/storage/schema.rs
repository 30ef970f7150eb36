//! Database row definitions
//!
//! ## Layout
//!
//! Raw readings live in `metrics`: typed columns for the identity pair,
//! the value and the collection time, plus the label map as a JSON text
//! column. Timestamps are stored as Unix milliseconds.
//!
//! Hourly summaries live in `aggregated_metrics`, one row per aggregation
//! tick and `(source, name)` pair. Rows are never updated.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::error::{StorageError, StorageResult};
use crate::models::{AggregatedMetric, Labels, Metric};

/// Convert a timestamp to Unix milliseconds for SQLite
pub fn timestamp_to_millis(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

/// Convert Unix milliseconds from SQLite back to a timestamp
pub fn millis_to_timestamp(millis: i64) -> StorageResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StorageError::SerializationError(format!("invalid timestamp {millis}")))
}

/// A raw metric prepared for insertion
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRow {
    pub source: String,
    pub name: String,
    pub value: f64,
    /// Label map serialized as JSON
    pub labels: String,
    pub collected_at: i64,
}

impl MetricRow {
    /// Prepare a metric for storage
    ///
    /// Fails when the label map cannot be serialized (non-finite floats).
    pub fn from_metric(metric: &Metric) -> StorageResult<Self> {
        let labels = serde_json::to_string(&metric.labels).map_err(|e| {
            StorageError::SerializationError(format!("failed to serialize labels: {e}"))
        })?;

        Ok(Self {
            source: metric.source.clone(),
            name: metric.name.clone(),
            value: metric.value,
            labels,
            collected_at: timestamp_to_millis(&metric.collected_at),
        })
    }

    pub fn from_sqlite(row: &SqliteRow) -> StorageResult<Self> {
        Ok(Self {
            source: row.try_get("source")?,
            name: row.try_get("name")?,
            value: row.try_get("value")?,
            labels: row.try_get("labels")?,
            collected_at: row.try_get("collected_at")?,
        })
    }

    pub fn into_metric(self) -> StorageResult<Metric> {
        let labels: Labels = serde_json::from_str(&self.labels).map_err(|e| {
            StorageError::SerializationError(format!("failed to deserialize labels: {e}"))
        })?;

        Ok(Metric {
            source: self.source,
            name: self.name,
            value: self.value,
            labels,
            collected_at: millis_to_timestamp(self.collected_at)?,
        })
    }
}

/// Read an aggregated summary back from SQLite
pub fn aggregated_from_sqlite(row: &SqliteRow) -> StorageResult<AggregatedMetric> {
    let count: i64 = row.try_get("count")?;

    Ok(AggregatedMetric {
        source: row.try_get("source")?,
        name: row.try_get("name")?,
        avg_value: row.try_get("avg_value")?,
        min_value: row.try_get("min_value")?,
        max_value: row.try_get("max_value")?,
        count: usize::try_from(count).map_err(|_| {
            StorageError::SerializationError(format!("invalid aggregate count {count}"))
        })?,
        time_range: row.try_get("time_range")?,
        start_time: millis_to_timestamp(row.try_get("start_time")?)?,
        end_time: millis_to_timestamp(row.try_get("end_time")?)?,
    })
}
