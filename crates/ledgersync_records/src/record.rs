//! The record trait and the sync engine's callback seam.

use crate::error::ServiceResult;
use crate::meta::SyncMeta;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// An entity record managed by a [`crate::RecordService`].
///
/// Implementors carry a [`SyncMeta`] alongside their domain fields. The
/// service owns all metadata transitions; domain code only fills in the
/// domain fields.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Store table (and remote collection) name for this record type.
    const TABLE: &'static str;

    /// Returns the sync metadata.
    fn meta(&self) -> &SyncMeta;

    /// Returns the sync metadata mutably.
    fn meta_mut(&mut self) -> &mut SyncMeta;

    /// Validates domain fields before a create or update is accepted.
    fn validate(&self) -> ServiceResult<()> {
        Ok(())
    }

    /// Scheduling priority for this record's outbox operations.
    ///
    /// Records at or above the queue's high-priority threshold are synced
    /// in a dedicated pass before the general batch loop.
    fn sync_priority(&self) -> i32 {
        1
    }
}

/// Sync-engine-only status transitions on a record.
///
/// The sync engine is the sole writer of transitions away from
/// `Pending`; entity services are the sole writer of transitions back to
/// `Pending` (every new local mutation resets it).
pub trait StatusSink: Send + Sync {
    /// Marks a record as accepted by the remote, propagating the remote
    /// identifier when one was assigned.
    fn mark_synced(&self, offline_id: &str, server_id: Option<&str>) -> ServiceResult<()>;

    /// Marks a record as permanently failed to sync.
    fn mark_error(&self, offline_id: &str, message: &str) -> ServiceResult<()>;

    /// Marks a record as conflicted, requiring explicit resolution.
    fn mark_conflict(&self, offline_id: &str) -> ServiceResult<()>;
}
