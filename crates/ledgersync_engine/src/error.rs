//! Error types for the sync engine.

use thiserror::Error;

/// Result type for engine-internal operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur inside a sync run.
///
/// These never escape [`crate::SyncEngine::start_sync`]; the engine folds
/// them into the returned [`crate::SyncReport`] so every caller - UI
/// action, background timer, reconnect handler - can treat an invocation
/// uniformly.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The outbox queue failed.
    #[error("outbox error: {0}")]
    Outbox(#[from] ledgersync_outbox::OutboxError),

    /// A record status transition failed.
    #[error("record status error: {0}")]
    Status(#[from] ledgersync_records::ServiceError),
}
