//! Error types for the outbox queue.

use thiserror::Error;

/// Result type for outbox operations.
pub type OutboxResult<T> = Result<T, OutboxError>;

/// Errors that can occur in the outbox queue.
#[derive(Debug, Error)]
pub enum OutboxError {
    /// The underlying store failed. Fatal to the calling operation.
    #[error("store error: {0}")]
    Store(#[from] ledgersync_store::StoreError),

    /// The referenced operation does not exist.
    #[error("operation not found: {0}")]
    NotFound(String),

    /// A persisted row could not be decoded.
    #[error("corrupt outbox row {key}: {message}")]
    CorruptRow {
        /// Row key.
        key: String,
        /// Decode failure detail.
        message: String,
    },

    /// An operation row could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// The requested status transition is not allowed.
    #[error("invalid transition for operation {id}: {from:?} -> {to:?}")]
    InvalidTransition {
        /// Operation id.
        id: String,
        /// Current status.
        from: crate::OperationStatus,
        /// Attempted status.
        to: crate::OperationStatus,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OperationStatus;

    #[test]
    fn error_display() {
        let err = OutboxError::NotFound("op-1".into());
        assert!(err.to_string().contains("op-1"));

        let err = OutboxError::InvalidTransition {
            id: "op-2".into(),
            from: OperationStatus::Completed,
            to: OperationStatus::Processing,
        };
        assert!(err.to_string().contains("op-2"));
    }
}
