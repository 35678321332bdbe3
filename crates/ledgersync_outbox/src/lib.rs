//! # LedgerSync Outbox
//!
//! The durable, ordered log of pending mutations for LedgerSync.
//!
//! Every local write (create, update, delete of an entity record) appends
//! an [`OutboxOperation`] here. The sync engine later drains the queue in
//! priority order and applies each operation against the remote authority.
//!
//! ## Key Invariants
//!
//! - Enqueue is a local durable write and never blocks on the network
//! - Pending operations are fetched priority-descending, FIFO within a
//!   priority tier, so urgent operations go first without starving old
//!   low-priority ones
//! - Operations for the same record are applied in creation order
//! - A failed operation returns to `pending` while its retry budget lasts,
//!   then stays `failed` permanently
//! - Completed operations are retained for a cleanup window, then removed

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod operation;
mod queue;

pub use error::{OutboxError, OutboxResult};
pub use operation::{OperationId, OperationKind, OperationStatus, OutboxOperation};
pub use queue::{OutboxQueue, QueueStats, DEFAULT_HIGH_PRIORITY_THRESHOLD, DEFAULT_MAX_RETRIES};
