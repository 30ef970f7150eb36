//! Error types for transport operations

use std::fmt;

/// Result type alias for transport operations
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Errors that can occur while publishing or consuming
#[derive(Debug)]
pub enum BrokerError {
    /// Some metrics of a batch could not be serialized (the rest were published)
    Serialization {
        published: usize,
        failed: usize,
        errors: Vec<String>,
    },

    /// A record could not be decoded into a metric (it has been skipped)
    Decode(String),

    /// The transport has been closed
    Closed,
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrokerError::Serialization {
                published,
                failed,
                errors,
            } => {
                write!(
                    f,
                    "published {published} metrics, {failed} failed to serialize"
                )?;
                for error in errors {
                    write!(f, "\n- {error}")?;
                }
                Ok(())
            }
            BrokerError::Decode(msg) => write!(f, "failed to decode record: {msg}"),
            BrokerError::Closed => write!(f, "transport closed"),
        }
    }
}

impl std::error::Error for BrokerError {}
