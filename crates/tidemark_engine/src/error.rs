//! Error types for the replication engine.

use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur during change tracking and replication.
///
/// Conflicts are deliberately absent: they are data returned from
/// `replicate`, not errors.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Store transport failure (connection error, timeout).
    #[error("store error: {message}")]
    Store {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// A record carries no string `id` attribute.
    #[error("record has no usable string id")]
    MissingId,

    /// A mutation targeted an id the store does not hold.
    #[error("unknown record id {model_id}")]
    UnknownRecord {
        /// The id that could not be found.
        model_id: String,
    },
}

impl EngineError {
    /// Creates a retryable store error.
    pub fn store_retryable(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable store error.
    pub fn store_fatal(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    ///
    /// Replication calls are idempotent with respect to the ledger, so
    /// a retryable failure is safe to retry by re-invoking the whole
    /// call with the same `since` values.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Store { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(EngineError::store_retryable("connection lost").is_retryable());
        assert!(!EngineError::store_fatal("schema mismatch").is_retryable());
        assert!(!EngineError::MissingId.is_retryable());
    }

    #[test]
    fn error_display() {
        let err = EngineError::UnknownRecord {
            model_id: "c1".into(),
        };
        assert_eq!(err.to_string(), "unknown record id c1");
    }
}
