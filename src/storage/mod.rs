//! Storage layer for raw metrics and aggregated summaries
//!
//! ## Design
//!
//! - **Trait-based**: `StorageBackend` hides the database from the actors
//! - **Async**: all operations are async for use from Tokio tasks
//! - **Batch-oriented**: `store_batch` reports per-item failures instead of
//!   aborting the whole batch
//!
//! ## Usage
//!
//! ```no_run
//! use metric_platform::storage::{StorageBackend, sqlite::SqliteBackend};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = SqliteBackend::new("./metrics.db").await?;
//!     let latest = backend.read_latest("GitHub", "stargazers_count").await?;
//!     println!("{latest:?}");
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod schema;
pub mod sqlite;

pub use backend::{HealthStatus, StorageBackend};
pub use error::{BatchOutcome, ItemFailure, PartialFailure, StorageError, StorageResult};
