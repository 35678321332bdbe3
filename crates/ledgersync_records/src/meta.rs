//! Sync metadata carried by every entity record.

use serde::{Deserialize, Serialize};

/// Synchronization state of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Local mutation not yet accepted by the remote.
    Pending,
    /// Remote has accepted the latest local state.
    Synced,
    /// Sync failed permanently; needs user attention.
    Error,
    /// Remote reported a version conflict; needs explicit resolution.
    Conflict,
}

impl Default for SyncStatus {
    fn default() -> Self {
        SyncStatus::Pending
    }
}

/// Client-side identity and sync bookkeeping for a record.
///
/// `offline_id` is assigned locally, is permanent, and is never reused.
/// `server_id` appears once the remote accepts the record. `version`
/// starts at 1 and is bumped on every local mutation; the remote uses it
/// for optimistic concurrency checks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncMeta {
    /// Client-assigned unique identifier.
    pub offline_id: String,
    /// Remote-assigned identifier, set on first successful sync.
    pub server_id: Option<String>,
    /// Local mutation counter, starting at 1.
    pub version: u32,
    /// Current synchronization state.
    #[serde(default)]
    pub sync_status: SyncStatus,
    /// Message from the last permanent sync failure.
    pub error_message: Option<String>,
    /// Tombstone flag; deleted records stay syncable.
    #[serde(default)]
    pub deleted: bool,
    /// Creation time, epoch milliseconds.
    pub created_at: u64,
    /// Last local mutation time, epoch milliseconds.
    pub updated_at: u64,
}
