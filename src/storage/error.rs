//! Error and outcome types for storage operations

use std::fmt;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations
#[derive(Debug)]
pub enum StorageError {
    /// Database connection failed
    ConnectionFailed(String),

    /// Database query failed
    QueryFailed(String),

    /// Migration failed
    MigrationFailed(String),

    /// Metric serialization/deserialization error
    SerializationError(String),

    /// Transaction could not be committed (nothing was stored)
    CommitFailed(String),

    /// I/O error (file access, etc.)
    IoError(std::io::Error),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ConnectionFailed(msg) => {
                write!(f, "failed to connect to storage backend: {}", msg)
            }
            StorageError::QueryFailed(msg) => write!(f, "storage query failed: {}", msg),
            StorageError::MigrationFailed(msg) => write!(f, "database migration failed: {}", msg),
            StorageError::SerializationError(msg) => {
                write!(f, "metric serialization error: {}", msg)
            }
            StorageError::CommitFailed(msg) => write!(f, "failed to commit transaction: {}", msg),
            StorageError::IoError(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::IoError(err)
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(io_err) => StorageError::IoError(io_err),
            sqlx::Error::RowNotFound => StorageError::QueryFailed("no rows found".to_string()),
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StorageError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StorageError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::SerializationError(err.to_string())
    }
}

/// Failure of one item inside a batch
#[derive(Debug)]
pub struct ItemFailure {
    /// Position of the item in the submitted batch
    pub index: usize,
    pub source: String,
    pub name: String,
    pub error: StorageError,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "metric {} {}/{}: {}",
            self.index, self.source, self.name, self.error
        )
    }
}

/// Per-item tally of a batch in which some items were dropped
#[derive(Debug, Default)]
pub struct PartialFailure {
    pub successful_count: usize,
    pub failed_count: usize,
    pub errors: Vec<ItemFailure>,
}

impl PartialFailure {
    pub(crate) fn record_success(&mut self) {
        self.successful_count += 1;
    }

    pub(crate) fn record_failure(&mut self, failure: ItemFailure) {
        self.failed_count += 1;
        self.errors.push(failure);
    }
}

impl fmt::Display for PartialFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "batch insertion completed with {} successes and {} failures",
            self.successful_count, self.failed_count
        )?;
        for error in &self.errors {
            write!(f, "\n- {error}")?;
        }
        Ok(())
    }
}

/// Outcome of a committed batch write
///
/// A batch that could not be committed at all is reported as
/// `Err(StorageError)` instead.
#[derive(Debug)]
pub enum BatchOutcome {
    /// Every item was stored
    AllStored { count: usize },

    /// Some items were dropped; the successful ones were committed
    Partial(PartialFailure),
}

impl BatchOutcome {
    pub fn stored(&self) -> usize {
        match self {
            BatchOutcome::AllStored { count } => *count,
            BatchOutcome::Partial(partial) => partial.successful_count,
        }
    }

    pub fn failed(&self) -> usize {
        match self {
            BatchOutcome::AllStored { .. } => 0,
            BatchOutcome::Partial(partial) => partial.failed_count,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, BatchOutcome::AllStored { .. })
    }
}
