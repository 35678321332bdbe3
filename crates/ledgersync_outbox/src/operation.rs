//! Outbox operation model.

use serde::{Deserialize, Serialize};

/// Unique identifier of an outbox operation.
pub type OperationId = String;

/// The kind of mutation an operation carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// A record was created locally.
    Create,
    /// A record was updated locally.
    Update,
    /// A record was tombstoned locally.
    Delete,
}

impl OperationKind {
    /// Returns the wire name of the kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        }
    }
}

/// Lifecycle status of an outbox operation.
///
/// Transitions: `Pending -> Processing -> Completed`, or
/// `Pending -> Processing -> Pending` again while retries remain, ending
/// in `Failed` once the budget is exhausted. `Completed` and exhausted
/// `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    /// Waiting to be picked up by a sync run.
    Pending,
    /// Currently being applied against the remote.
    Processing,
    /// Applied successfully. Terminal, garbage-collected after retention.
    Completed,
    /// Not applied. Terminal once the retry budget is exhausted.
    Failed,
}

impl OperationStatus {
    /// Returns true for terminal statuses.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationStatus::Completed | OperationStatus::Failed)
    }
}

/// A single pending mutation, durably queued for the sync engine.
///
/// `data` is a snapshot of the record at enqueue time. Superseding
/// mutations for the same record are simply queued behind it and applied
/// in creation order, so the final remote state is last-write-wins by
/// local sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxOperation {
    /// Unique operation id.
    pub id: OperationId,
    /// The mutation kind.
    pub kind: OperationKind,
    /// Entity table this operation targets.
    pub table_name: String,
    /// The record's client-assigned offline id.
    pub record_id: String,
    /// Snapshot of the record at enqueue time.
    pub data: serde_json::Value,
    /// Scheduling priority. Higher is more urgent.
    pub priority: i32,
    /// Enqueue time, epoch milliseconds.
    pub created_at: u64,
    /// Number of failed attempts so far.
    pub retry_count: u32,
    /// Time of the last attempt, epoch milliseconds.
    pub last_attempt: Option<u64>,
    /// Completion time, epoch milliseconds. The retention window for
    /// completed operations is measured from here, not from enqueue, so
    /// rows that waited out a long offline period keep their full audit
    /// window.
    pub completed_at: Option<u64>,
    /// Message from the last failed attempt.
    pub error_message: Option<String>,
    /// Lifecycle status.
    pub status: OperationStatus,
    /// Correlation id of the sync batch that picked this operation up.
    pub batch_id: Option<String>,
}

impl OutboxOperation {
    /// Encodes the operation for storage.
    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Decodes an operation from a stored row.
    pub fn decode(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}
