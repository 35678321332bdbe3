//! Error types for store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
///
/// Store failures are fatal to the calling operation and are never
/// silently swallowed - they threaten data durability, not just a single
/// sync attempt.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A stored row could not be interpreted.
    #[error("store corrupted: {0}")]
    Corrupted(String),

    /// The store has been closed.
    #[error("store is closed")]
    Closed,
}
