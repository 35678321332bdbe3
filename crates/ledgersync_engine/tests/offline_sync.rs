//! End-to-end offline-first flows: capture while offline, reconnect, and
//! drain through the full engine pipeline against a scripted remote.

use ledgersync_engine::{
    FixedConnectivity, MockRemote, RemoteAck, RemoteApplier, RemoteError, RemoteResult,
    SyncConfig, SyncEngine, TableRegistry,
};
use ledgersync_outbox::OutboxQueue;
use ledgersync_records::{Record, RecordService, SyncStatus, Transaction, TransactionKind};
use ledgersync_store::{InMemoryStore, ManualClock};
use std::sync::Arc;

struct Harness {
    outbox: Arc<OutboxQueue<InMemoryStore>>,
    service: Arc<RecordService<Transaction, InMemoryStore>>,
    remote: Arc<MockRemote>,
    connectivity: Arc<FixedConnectivity>,
    engine: SyncEngine<InMemoryStore>,
}

fn harness(online: bool) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(ManualClock::at(1_700_000_000_000));
    let outbox = Arc::new(OutboxQueue::new(store.clone(), clock.clone()));
    let service = Arc::new(RecordService::<Transaction, _>::new(
        store,
        outbox.clone(),
        clock.clone(),
    ));
    let remote = Arc::new(MockRemote::new());
    let connectivity = Arc::new(FixedConnectivity::new(online));

    let registry = Arc::new(TableRegistry::new());
    registry.register(Transaction::TABLE, remote.clone(), service.clone());

    let engine = SyncEngine::new(
        SyncConfig::default(),
        outbox.clone(),
        registry,
        connectivity.clone(),
        clock,
    );
    Harness {
        outbox,
        service,
        remote,
        connectivity,
        engine,
    }
}

fn sale(amount_cents: i64) -> Transaction {
    Transaction::new(TransactionKind::Sale, amount_cents, "Acme Grocers")
}

#[test]
fn capture_offline_then_sync_on_reconnect() {
    let h = harness(false);
    let tx = h.service.create(sale(1_200)).unwrap();
    let id = tx.meta.offline_id.clone();

    // Offline: the write succeeded locally, sync is refused up front.
    let report = h.engine.start_sync();
    assert_eq!(report.error.as_deref(), Some("network offline"));
    assert_eq!(report.total_processed, 0);
    assert_eq!(h.remote.call_count(), 0);

    h.connectivity.set_online(true);
    let report = h.engine.start_sync();
    assert_eq!(report.error, None);
    assert_eq!(report.successful, 1);
    assert_eq!(report.total_processed, 1);

    let stored = h.service.get(&id).unwrap().unwrap();
    assert_eq!(stored.meta.sync_status, SyncStatus::Synced);
    assert_eq!(stored.meta.server_id.as_deref(), Some("srv-1"));
    assert!(h.outbox.pending(10).unwrap().is_empty());
}

#[test]
fn mutations_apply_in_creation_order() {
    let h = harness(true);
    let tx = h.service.create(sale(1_000)).unwrap();
    let id = tx.meta.offline_id.clone();
    h.service
        .update(&id, |tx| tx.amount_cents = 1_100)
        .unwrap();
    h.service
        .update(&id, |tx| tx.amount_cents = 1_150)
        .unwrap();

    let report = h.engine.start_sync();
    assert_eq!(report.successful, 3);

    let calls = h.remote.calls();
    let methods: Vec<&str> = calls.iter().map(|(m, _)| m.as_str()).collect();
    assert_eq!(methods, vec!["create", "update", "update"]);

    // The last snapshot carries the final state of the record.
    let last = &calls[2].1;
    assert_eq!(last["amount_cents"], 1_150);
    assert_eq!(last["version"], 3);
}

#[test]
fn version_conflict_surfaces_without_marking_synced() {
    let h = harness(true);
    let tx = h.service.create(sale(2_500)).unwrap();
    let id = tx.meta.offline_id.clone();

    h.remote.push_outcome(Err(RemoteError::Conflict {
        record_id: id.clone(),
        remote_version: Some(4),
    }));

    let report = h.engine.start_sync();
    assert_eq!(report.conflicts, 1);
    assert_eq!(report.successful, 0);

    // Local data is preserved, flagged for manual resolution, and the
    // operation is never retried.
    let stored = h.service.get(&id).unwrap().unwrap();
    assert_eq!(stored.meta.sync_status, SyncStatus::Conflict);
    assert_eq!(stored.amount_cents, 2_500);
    assert!(stored.meta.server_id.is_none());
    assert!(h.outbox.pending(10).unwrap().is_empty());

    let report = h.engine.start_sync();
    assert_eq!(report.total_processed, 0);
}

#[test]
fn conflict_resolution_disabled_degrades_to_permanent_failure() {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(ManualClock::at(0));
    let outbox = Arc::new(OutboxQueue::new(store.clone(), clock.clone()));
    let service = Arc::new(RecordService::<Transaction, _>::new(
        store,
        outbox.clone(),
        clock.clone(),
    ));
    let remote = Arc::new(MockRemote::new());
    let registry = Arc::new(TableRegistry::new());
    registry.register(Transaction::TABLE, remote.clone(), service.clone());
    let engine = SyncEngine::new(
        SyncConfig::default().with_conflict_resolution(false),
        outbox,
        registry,
        Arc::new(FixedConnectivity::new(true)),
        clock,
    );

    let tx = service.create(sale(900)).unwrap();
    let id = tx.meta.offline_id.clone();
    remote.push_outcome(Err(RemoteError::Conflict {
        record_id: id.clone(),
        remote_version: None,
    }));

    let report = engine.start_sync();
    assert_eq!(report.conflicts, 0);
    assert_eq!(report.failed, 1);
    assert_eq!(
        service.get(&id).unwrap().unwrap().meta.sync_status,
        SyncStatus::Error
    );
}

#[test]
fn retry_budget_exhaustion_marks_record_errored() {
    let h = harness(true);
    let tx = h.service.create(sale(800)).unwrap();
    let id = tx.meta.offline_id.clone();

    h.remote
        .push_failures(RemoteError::transport_retryable("connection reset"), 3);

    // One run drains the queue to empty, so all three attempts happen here.
    let report = h.engine.start_sync();
    assert_eq!(report.failed, 3);
    assert_eq!(report.successful, 0);
    assert_eq!(h.remote.call_count(), 3);

    let stored = h.service.get(&id).unwrap().unwrap();
    assert_eq!(stored.meta.sync_status, SyncStatus::Error);
    assert_eq!(
        stored.meta.error_message.as_deref(),
        Some("transport error: connection reset")
    );
    assert!(h.outbox.pending(10).unwrap().is_empty());
}

#[test]
fn transient_failure_recovers_within_the_run() {
    let h = harness(true);
    let tx = h.service.create(sale(800)).unwrap();
    let id = tx.meta.offline_id.clone();

    h.remote.push_outcome(Err(RemoteError::Timeout));

    let report = h.engine.start_sync();
    assert_eq!(report.failed, 1);
    assert_eq!(report.successful, 1);
    assert_eq!(h.remote.call_count(), 2);
    assert_eq!(
        h.service.get(&id).unwrap().unwrap().meta.sync_status,
        SyncStatus::Synced
    );
}

#[test]
fn rejection_is_permanent_after_one_attempt() {
    let h = harness(true);
    let tx = h.service.create(sale(600)).unwrap();
    let id = tx.meta.offline_id.clone();

    h.remote
        .push_outcome(Err(RemoteError::Rejected("currency not supported".into())));

    let report = h.engine.start_sync();
    assert_eq!(report.failed, 1);
    assert_eq!(h.remote.call_count(), 1);

    let stored = h.service.get(&id).unwrap().unwrap();
    assert_eq!(stored.meta.sync_status, SyncStatus::Error);
    assert_eq!(h.outbox.stats().unwrap().failed, 1);
}

#[test]
fn high_value_entries_sync_first() {
    let h = harness(true);
    // The small sale is captured first; the high-value one still wins.
    let small = h.service.create(sale(500)).unwrap();
    let large = h.service.create(sale(250_000)).unwrap();

    let report = h.engine.start_sync();
    assert_eq!(report.successful, 2);

    let calls = h.remote.calls();
    assert_eq!(calls[0].1["offline_id"], large.meta.offline_id.as_str());
    assert_eq!(calls[1].1["offline_id"], small.meta.offline_id.as_str());
}

#[test]
fn tombstone_delete_reaches_remote() {
    let h = harness(true);
    let tx = h.service.create(sale(400)).unwrap();
    let id = tx.meta.offline_id.clone();
    assert!(h.service.delete(&id).unwrap());

    let report = h.engine.start_sync();
    assert_eq!(report.successful, 2);

    let calls = h.remote.calls();
    assert_eq!(calls[1].0, "delete");
    assert_eq!(calls[1].1["deleted"], true);
}

#[test]
fn concurrent_start_is_rejected() {
    use std::sync::Barrier;

    struct BlockingRemote {
        gate: Arc<Barrier>,
    }

    impl RemoteApplier for BlockingRemote {
        fn apply_create(
            &self,
            _: &serde_json::Value,
            _: std::time::Duration,
        ) -> RemoteResult<RemoteAck> {
            self.gate.wait();
            Ok(RemoteAck::with_server_id("srv-blocked"))
        }
        fn apply_update(&self, _: &serde_json::Value, _: std::time::Duration) -> RemoteResult<()> {
            Ok(())
        }
        fn apply_delete(&self, _: &serde_json::Value, _: std::time::Duration) -> RemoteResult<()> {
            Ok(())
        }
    }

    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(ManualClock::at(0));
    let outbox = Arc::new(OutboxQueue::new(store.clone(), clock.clone()));
    let service = Arc::new(RecordService::<Transaction, _>::new(
        store,
        outbox.clone(),
        clock.clone(),
    ));
    service.create(sale(700)).unwrap();

    let gate = Arc::new(Barrier::new(2));
    let registry = Arc::new(TableRegistry::new());
    registry.register(
        Transaction::TABLE,
        Arc::new(BlockingRemote { gate: gate.clone() }),
        service,
    );
    let engine = Arc::new(SyncEngine::new(
        SyncConfig::default(),
        outbox,
        registry,
        Arc::new(FixedConnectivity::new(true)),
        clock,
    ));

    let first = {
        let engine = engine.clone();
        std::thread::spawn(move || engine.start_sync())
    };

    // Wait for the first run to claim the engine, then race a second one.
    while !engine.status().is_running {
        std::thread::yield_now();
    }
    let second = engine.start_sync();
    assert_eq!(second.error.as_deref(), Some("sync already running"));
    assert_eq!(second.total_processed, 0);

    gate.wait();
    let first = first.join().unwrap();
    assert_eq!(first.error, None);
    assert_eq!(first.successful, 1);
}
