//! The generic local-first entity service.

use crate::error::{ServiceError, ServiceResult};
use crate::meta::SyncStatus;
use crate::record::{Record, StatusSink};
use ledgersync_outbox::{OperationKind, OutboxQueue};
use ledgersync_store::{Clock, StoreBackend, WriteBatch};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// A local-first service for one record type.
///
/// Every mutating call persists the record and appends the matching
/// outbox operation in a single atomic store write, then returns
/// immediately - no call here ever waits on the network. The sync engine
/// reports outcomes back through the [`StatusSink`] implementation.
///
/// The same service shape is shared by transaction, merchant, and user
/// records; only the [`Record`] implementation differs.
pub struct RecordService<R: Record, S: StoreBackend> {
    store: Arc<S>,
    outbox: Arc<OutboxQueue<S>>,
    clock: Arc<dyn Clock>,
    _record: PhantomData<R>,
}

impl<R: Record, S: StoreBackend> RecordService<R, S> {
    /// Creates a service over the given store and outbox.
    pub fn new(store: Arc<S>, outbox: Arc<OutboxQueue<S>>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            outbox,
            clock,
            _record: PhantomData,
        }
    }

    /// Creates a record.
    ///
    /// Validates the domain fields, assigns an `offline_id` if the caller
    /// did not, sets `version = 1` and `sync_status = Pending`, and
    /// commits the record together with a `create` outbox operation.
    ///
    /// # Errors
    ///
    /// Returns a validation error or a fatal store error. Never a network
    /// error - this call does not touch the network.
    pub fn create(&self, mut record: R) -> ServiceResult<R> {
        record.validate()?;

        let now = self.clock.now_ms();
        let meta = record.meta_mut();
        if meta.offline_id.is_empty() {
            meta.offline_id = Uuid::new_v4().to_string();
        }
        meta.server_id = None;
        meta.version = 1;
        meta.sync_status = SyncStatus::Pending;
        meta.error_message = None;
        meta.deleted = false;
        meta.created_at = now;
        meta.updated_at = now;

        self.commit(&record, OperationKind::Create)?;
        debug!(table = R::TABLE, record = %record.meta().offline_id, "record created");
        Ok(record)
    }

    /// Updates a record through a patch closure.
    ///
    /// Applies the patch, re-validates, bumps `version`, resets
    /// `sync_status = Pending`, and commits the record together with an
    /// `update` outbox operation. A new mutation always resets to pending,
    /// even mid-sync - the next pass picks up the newer snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] for unknown ids, a validation
    /// error, or a fatal store error.
    pub fn update(&self, offline_id: &str, patch: impl FnOnce(&mut R)) -> ServiceResult<R> {
        let mut record = self.require(offline_id)?;
        patch(&mut record);
        record.validate()?;

        let now = self.clock.now_ms();
        let meta = record.meta_mut();
        meta.offline_id = offline_id.to_string();
        meta.version += 1;
        meta.sync_status = SyncStatus::Pending;
        meta.error_message = None;
        meta.updated_at = now;

        self.commit(&record, OperationKind::Update)?;
        debug!(
            table = R::TABLE,
            record = %offline_id,
            version = record.meta().version,
            "record updated"
        );
        Ok(record)
    }

    /// Tombstones a record.
    ///
    /// The row is never physically removed - it must remain syncable.
    /// Bumps `version`, sets the tombstone flag and `Pending`, and commits
    /// a `delete` outbox operation the remote interprets as a tombstone.
    ///
    /// Returns `false` if the record does not exist.
    ///
    /// # Errors
    ///
    /// Returns a fatal store error.
    pub fn delete(&self, offline_id: &str) -> ServiceResult<bool> {
        let mut record = match self.get(offline_id)? {
            Some(record) => record,
            None => return Ok(false),
        };

        let now = self.clock.now_ms();
        let meta = record.meta_mut();
        meta.version += 1;
        meta.sync_status = SyncStatus::Pending;
        meta.deleted = true;
        meta.updated_at = now;

        self.commit(&record, OperationKind::Delete)?;
        debug!(table = R::TABLE, record = %offline_id, "record tombstoned");
        Ok(true)
    }

    /// Loads a record, returning `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns a fatal store error or a codec error for a corrupt row.
    pub fn get(&self, offline_id: &str) -> ServiceResult<Option<R>> {
        match self.store.get(R::TABLE, offline_id)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Returns all records in creation order, tombstones included.
    ///
    /// # Errors
    ///
    /// Returns a fatal store error or a codec error for a corrupt row.
    pub fn list(&self) -> ServiceResult<Vec<R>> {
        self.store
            .scan(R::TABLE)?
            .into_iter()
            .map(|(_, bytes)| serde_json::from_slice(&bytes).map_err(ServiceError::from))
            .collect()
    }

    fn require(&self, offline_id: &str) -> ServiceResult<R> {
        self.get(offline_id)?
            .ok_or_else(|| ServiceError::NotFound(offline_id.to_string()))
    }

    /// Persists the record and its outbox operation atomically.
    fn commit(&self, record: &R, kind: OperationKind) -> ServiceResult<()> {
        let snapshot = serde_json::to_value(record)?;
        let mut batch = WriteBatch::new();
        batch.put(R::TABLE, &record.meta().offline_id, serde_json::to_vec(record)?);
        self.outbox.stage(
            &mut batch,
            kind,
            R::TABLE,
            &record.meta().offline_id,
            snapshot,
            record.sync_priority(),
            None,
        )?;
        self.store.apply(batch)?;
        Ok(())
    }

    fn transition(
        &self,
        offline_id: &str,
        apply: impl FnOnce(&mut R),
    ) -> ServiceResult<()> {
        let mut record = self.require(offline_id)?;
        apply(&mut record);
        record.meta_mut().updated_at = self.clock.now_ms();
        self.store
            .put(R::TABLE, offline_id, serde_json::to_vec(&record)?)?;
        Ok(())
    }
}

impl<R: Record, S: StoreBackend> StatusSink for RecordService<R, S> {
    fn mark_synced(&self, offline_id: &str, server_id: Option<&str>) -> ServiceResult<()> {
        self.transition(offline_id, |record| {
            let meta = record.meta_mut();
            if let Some(server_id) = server_id {
                meta.server_id = Some(server_id.to_string());
            }
            meta.sync_status = SyncStatus::Synced;
            meta.error_message = None;
        })?;
        debug!(table = R::TABLE, record = %offline_id, "record synced");
        Ok(())
    }

    fn mark_error(&self, offline_id: &str, message: &str) -> ServiceResult<()> {
        self.transition(offline_id, |record| {
            let meta = record.meta_mut();
            meta.sync_status = SyncStatus::Error;
            meta.error_message = Some(message.to_string());
        })?;
        info!(table = R::TABLE, record = %offline_id, message, "record marked error");
        Ok(())
    }

    fn mark_conflict(&self, offline_id: &str) -> ServiceResult<()> {
        self.transition(offline_id, |record| {
            record.meta_mut().sync_status = SyncStatus::Conflict;
        })?;
        info!(table = R::TABLE, record = %offline_id, "record marked conflicted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{Transaction, TransactionKind};
    use ledgersync_outbox::{OperationStatus, QueueStats};
    use ledgersync_store::{InMemoryStore, ManualClock};

    fn make_service() -> (
        RecordService<Transaction, InMemoryStore>,
        Arc<OutboxQueue<InMemoryStore>>,
    ) {
        let store = Arc::new(InMemoryStore::new());
        let clock: Arc<ManualClock> = Arc::new(ManualClock::at(1_000));
        let outbox = Arc::new(OutboxQueue::new(store.clone(), clock.clone()));
        (
            RecordService::new(store, outbox.clone(), clock),
            outbox,
        )
    }

    fn sale(amount_cents: i64) -> Transaction {
        Transaction::new(TransactionKind::Sale, amount_cents, "Acme Grocers")
    }

    #[test]
    fn create_persists_record_and_exactly_one_pending_op() {
        let (service, outbox) = make_service();

        let tx = service.create(sale(500)).unwrap();
        assert!(!tx.meta().offline_id.is_empty());
        assert_eq!(tx.meta().version, 1);
        assert_eq!(tx.meta().sync_status, SyncStatus::Pending);

        let stored = service.get(&tx.meta().offline_id).unwrap().unwrap();
        assert_eq!(stored.amount_cents, 500);

        let pending = outbox.pending(10).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].kind, OperationKind::Create);
        assert_eq!(pending[0].record_id, tx.meta().offline_id);
        assert_eq!(pending[0].status, OperationStatus::Pending);
    }

    #[test]
    fn create_rejects_invalid_input_without_enqueueing() {
        let (service, outbox) = make_service();

        let err = service.create(sale(0)).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        assert_eq!(outbox.stats().unwrap(), QueueStats::default());
    }

    #[test]
    fn update_bumps_version_and_resets_pending() {
        let (service, outbox) = make_service();
        let tx = service.create(sale(500)).unwrap();
        let id = tx.meta().offline_id.clone();

        let updated = service
            .update(&id, |tx| {
                tx.amount_cents = 750;
                tx.note = Some("corrected amount".into());
            })
            .unwrap();

        assert_eq!(updated.meta().version, 2);
        assert_eq!(updated.meta().sync_status, SyncStatus::Pending);
        assert_eq!(updated.amount_cents, 750);

        // One op per mutation, applied in creation order.
        let pending = outbox.pending(10).unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].kind, OperationKind::Create);
        assert_eq!(pending[1].kind, OperationKind::Update);
    }

    #[test]
    fn update_of_missing_record() {
        let (service, _) = make_service();
        let err = service.update("missing", |_| {}).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn delete_is_a_tombstone() {
        let (service, outbox) = make_service();
        let tx = service.create(sale(500)).unwrap();
        let id = tx.meta().offline_id.clone();

        assert!(service.delete(&id).unwrap());
        assert!(!service.delete("missing").unwrap());

        // The row is still there, flagged deleted and pending.
        let stored = service.get(&id).unwrap().unwrap();
        assert!(stored.meta().deleted);
        assert_eq!(stored.meta().version, 2);
        assert_eq!(stored.meta().sync_status, SyncStatus::Pending);

        let pending = outbox.pending(10).unwrap();
        assert_eq!(pending.last().unwrap().kind, OperationKind::Delete);
    }

    #[test]
    fn mark_synced_sets_server_id_and_clears_error() {
        let (service, _) = make_service();
        let tx = service.create(sale(500)).unwrap();
        let id = tx.meta().offline_id.clone();

        service.mark_error(&id, "remote 500").unwrap();
        assert_eq!(
            service.get(&id).unwrap().unwrap().meta().sync_status,
            SyncStatus::Error
        );

        service.mark_synced(&id, Some("srv-42")).unwrap();
        let stored = service.get(&id).unwrap().unwrap();
        assert_eq!(stored.meta().sync_status, SyncStatus::Synced);
        assert_eq!(stored.meta().server_id.as_deref(), Some("srv-42"));
        assert_eq!(stored.meta().error_message, None);
    }

    #[test]
    fn mark_conflict_preserves_local_data() {
        let (service, _) = make_service();
        let tx = service.create(sale(500)).unwrap();
        let id = tx.meta().offline_id.clone();

        service.mark_conflict(&id).unwrap();
        let stored = service.get(&id).unwrap().unwrap();
        assert_eq!(stored.meta().sync_status, SyncStatus::Conflict);
        assert_eq!(stored.amount_cents, 500);
    }

    #[test]
    fn list_returns_creation_order() {
        let (service, _) = make_service();
        let a = service.create(sale(100)).unwrap();
        let b = service.create(sale(200)).unwrap();

        let ids: Vec<String> = service
            .list()
            .unwrap()
            .into_iter()
            .map(|tx| tx.meta().offline_id.clone())
            .collect();
        assert_eq!(
            ids,
            vec![a.meta().offline_id.clone(), b.meta().offline_id.clone()]
        );
    }
}
