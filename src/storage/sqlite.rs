//! SQLite storage backend implementation
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Readers (API, aggregator) are not blocked by the persister
//! - **Connection pooling**: Concurrent access is handled by the pool
//! - **Migrations**: Schema versioning with embedded sqlx migrations

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use tracing::{debug, info, instrument, warn};

use super::backend::{HealthStatus, StorageBackend};
use super::error::{BatchOutcome, ItemFailure, PartialFailure, StorageError, StorageResult};
use super::schema::{self, MetricRow};
use crate::models::{AggregatedMetric, Metric};

/// Default size of the connection pool
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

const INSERT_METRIC: &str = r#"
    INSERT INTO metrics (source, name, value, labels, collected_at)
    VALUES (?, ?, ?, ?, ?)
"#;

const SELECT_METRICS: &str = r#"
    SELECT source, name, value, labels, collected_at
    FROM metrics
    WHERE source = ? AND name = ?
    ORDER BY collected_at DESC, id DESC
    LIMIT ?
"#;

const INSERT_AGGREGATED: &str = r#"
    INSERT INTO aggregated_metrics (
        source, name, avg_value, min_value, max_value,
        count, time_range, start_time, end_time
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const SELECT_AGGREGATED: &str = r#"
    SELECT source, name, avg_value, min_value, max_value,
           count, time_range, start_time, end_time
    FROM aggregated_metrics
    WHERE source = ? AND name = ?
    ORDER BY end_time DESC, id DESC
    LIMIT ?
"#;

/// SQLite storage backend
pub struct SqliteBackend {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteBackend {
    /// Open (or create) the database at `db_path` and run migrations
    ///
    /// ## Example
    ///
    /// ```no_run
    /// # use metric_platform::storage::sqlite::SqliteBackend;
    /// # async fn example() -> anyhow::Result<()> {
    /// let backend = SqliteBackend::new("./metrics.db").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::with_max_connections(db_path, DEFAULT_MAX_CONNECTIONS).await
    }

    #[instrument(skip_all)]
    pub async fn with_max_connections(
        db_path: impl AsRef<Path>,
        max_connections: u32,
    ) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite backend at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;

        info!("SQLite backend ready");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    async fn count_rows(&self, table: &str) -> StorageResult<i64> {
        let row: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    #[instrument(skip(self, metrics), fields(count = metrics.len()))]
    async fn store_batch(&self, metrics: &[Metric]) -> StorageResult<BatchOutcome> {
        if metrics.is_empty() {
            return Ok(BatchOutcome::AllStored { count: 0 });
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::QueryFailed(format!("could not begin transaction: {e}")))?;

        let mut tally = PartialFailure::default();

        // sqlx prepares INSERT_METRIC once per connection and reuses it for every row
        for (index, metric) in metrics.iter().enumerate() {
            let failure = |error| ItemFailure {
                index,
                source: metric.source.clone(),
                name: metric.name.clone(),
                error,
            };

            let row = match MetricRow::from_metric(metric) {
                Ok(row) => row,
                Err(e) => {
                    tally.record_failure(failure(e));
                    continue;
                }
            };

            let inserted = sqlx::query(INSERT_METRIC)
                .bind(&row.source)
                .bind(&row.name)
                .bind(row.value)
                .bind(&row.labels)
                .bind(row.collected_at)
                .execute(&mut *tx)
                .await;

            match inserted {
                Ok(_) => tally.record_success(),
                Err(e) => tally.record_failure(failure(StorageError::QueryFailed(format!(
                    "db insert failed: {e}"
                )))),
            }
        }

        // failed rows are dropped, the rest is kept
        tx.commit()
            .await
            .map_err(|e| StorageError::CommitFailed(e.to_string()))?;

        if tally.failed_count == 0 {
            debug!("stored {} metrics", tally.successful_count);
            Ok(BatchOutcome::AllStored {
                count: tally.successful_count,
            })
        } else {
            debug!(
                "stored {} metrics, dropped {}",
                tally.successful_count, tally.failed_count
            );
            Ok(BatchOutcome::Partial(tally))
        }
    }

    #[instrument(skip(self))]
    async fn read_range(
        &self,
        source: &str,
        name: &str,
        limit: usize,
    ) -> StorageResult<Vec<Metric>> {
        let rows = sqlx::query(SELECT_METRICS)
            .bind(source)
            .bind(name)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        let mut metrics = Vec::with_capacity(rows.len());
        for row in rows {
            match MetricRow::from_sqlite(&row).and_then(MetricRow::into_metric) {
                Ok(metric) => metrics.push(metric),
                Err(e) => warn!("skipping unreadable metric row: {e}"),
            }
        }

        debug!("read {} metrics", metrics.len());
        Ok(metrics)
    }

    #[instrument(skip(self))]
    async fn read_latest(&self, source: &str, name: &str) -> StorageResult<Option<Metric>> {
        let row = sqlx::query(SELECT_METRICS)
            .bind(source)
            .bind(name)
            .bind(1i64)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| MetricRow::from_sqlite(&row)?.into_metric())
            .transpose()
    }

    #[instrument(skip(self, aggregated), fields(source = %aggregated.source, name = %aggregated.name))]
    async fn save_aggregated(&self, aggregated: &AggregatedMetric) -> StorageResult<()> {
        let count = i64::try_from(aggregated.count).map_err(|_| {
            StorageError::SerializationError(format!("count {} out of range", aggregated.count))
        })?;

        sqlx::query(INSERT_AGGREGATED)
            .bind(&aggregated.source)
            .bind(&aggregated.name)
            .bind(aggregated.avg_value)
            .bind(aggregated.min_value)
            .bind(aggregated.max_value)
            .bind(count)
            .bind(&aggregated.time_range)
            .bind(schema::timestamp_to_millis(&aggregated.start_time))
            .bind(schema::timestamp_to_millis(&aggregated.end_time))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                StorageError::QueryFailed(format!("failed to insert aggregated metric: {e}"))
            })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn query_aggregated(
        &self,
        source: &str,
        name: &str,
        limit: usize,
    ) -> StorageResult<Vec<AggregatedMetric>> {
        let rows = sqlx::query(SELECT_AGGREGATED)
            .bind(source)
            .bind(name)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(schema::aggregated_from_sqlite).collect()
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => Ok(HealthStatus {
                healthy: true,
                message: "SQLite backend operational".to_string(),
                metadata: HashMap::from([
                    ("backend".to_string(), "sqlite".to_string()),
                    ("db_path".to_string(), self.db_path.clone()),
                ]),
            }),
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata: HashMap::new(),
                })
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_stats(&self) -> StorageResult<String> {
        let raw = self.count_rows("metrics").await?;
        let aggregated = self.count_rows("aggregated_metrics").await?;

        let file_size = std::fs::metadata(&self.db_path)
            .map(|m| m.len())
            .unwrap_or(0);
        let file_size_mb = file_size as f64 / 1_000_000.0;

        Ok(format!(
            "SQLite: {} raw rows, {} aggregated rows, {:.2} MB on disk",
            raw, aggregated, file_size_mb
        ))
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite backend");
        self.pool.close().await;
        Ok(())
    }
}
