//! Error types for entity services.

use thiserror::Error;

/// Result type for entity service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors that can occur in an entity service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Input failed domain validation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The referenced record does not exist.
    #[error("record not found: {0}")]
    NotFound(String),

    /// The underlying store failed. Fatal to the calling operation.
    #[error("store error: {0}")]
    Store(#[from] ledgersync_store::StoreError),

    /// The outbox rejected the enqueue.
    #[error("outbox error: {0}")]
    Outbox(#[from] ledgersync_outbox::OutboxError),

    /// A record could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ServiceError::Validation("amount must not be zero".into());
        assert!(err.to_string().contains("amount must not be zero"));

        let err = ServiceError::NotFound("tx-9".into());
        assert!(err.to_string().contains("tx-9"));
    }
}
