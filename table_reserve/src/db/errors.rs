//! Store error types.

use super::timeouts::TimeoutError;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by repository implementations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Query did not finish in time
    #[error("Database operation timed out after {0:?}")]
    Timeout(Duration),

    /// The record changed underneath a compare-and-update
    #[error("Concurrent modification of record {0}")]
    Conflict(String),

    /// A stored value could not be decoded
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl From<TimeoutError> for StoreError {
    fn from(err: TimeoutError) -> Self {
        match err {
            TimeoutError::Timeout(d) => StoreError::Timeout(d),
            TimeoutError::Database(e) => StoreError::Database(e),
        }
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
