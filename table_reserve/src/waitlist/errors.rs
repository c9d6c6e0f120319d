//! Waitlist error types.

use super::models::{WaitlistId, WaitlistStatus};
use crate::db::StoreError;
use thiserror::Error;

/// Waitlist errors
#[derive(Debug, Error)]
pub enum WaitlistError {
    /// The request is malformed; never retried automatically
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The entry is not in a state that allows the operation
    #[error("Waitlist entry {id} is {actual}, expected {expected}")]
    InvalidState {
        id: WaitlistId,
        expected: &'static str,
        actual: WaitlistStatus,
    },

    /// Entry not found
    #[error("Waitlist entry not found: {0}")]
    NotFound(WaitlistId),

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl WaitlistError {
    /// Get a client-safe error message that doesn't leak store internals
    pub fn client_message(&self) -> String {
        match self {
            WaitlistError::Store(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for waitlist operations
pub type WaitlistResult<T> = Result<T, WaitlistError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_invalid_state_message() {
        let id = Uuid::nil();
        let err = WaitlistError::InvalidState {
            id,
            expected: "notified",
            actual: WaitlistStatus::Pending,
        };
        assert_eq!(
            err.to_string(),
            format!("Waitlist entry {} is pending, expected notified", id)
        );
    }

    #[test]
    fn test_store_errors_are_redacted() {
        let err = WaitlistError::Store(StoreError::Corrupt("bad column".to_string()));
        assert_eq!(err.client_message(), "Internal server error");

        let err = WaitlistError::Validation("Guest count must be at least 1".to_string());
        assert!(err.client_message().contains("Guest count"));
    }
}
