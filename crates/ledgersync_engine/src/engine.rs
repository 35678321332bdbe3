//! The sync engine.

use crate::config::SyncConfig;
use crate::error::EngineResult;
use crate::registry::{TableHandlers, TableRegistry};
use crate::remote::RemoteError;
use ledgersync_outbox::{OperationKind, OutboxOperation, OutboxQueue, QueueStats};
use ledgersync_store::{Clock, StoreBackend};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Answers whether the device currently has a usable connection.
///
/// [`crate::NetworkMonitor`] is the production implementation; tests use
/// [`FixedConnectivity`].
pub trait Connectivity: Send + Sync {
    /// Returns true if the network is usable for sync.
    fn is_online(&self) -> bool;
}

/// A connectivity source with a settable answer, for tests and for
/// environments without a platform network callback.
#[derive(Debug, Default)]
pub struct FixedConnectivity {
    online: AtomicBool,
}

impl FixedConnectivity {
    /// Creates a source reporting the given state.
    #[must_use]
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    /// Changes the reported state.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl Connectivity for FixedConnectivity {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// Control surface the network monitor and background scheduler drive.
pub trait SyncControl: Send + Sync {
    /// Starts a sync run, returning its report.
    fn start_sync(&self) -> SyncReport;

    /// Requests cooperative cancellation of the active run.
    fn stop_sync(&self);

    /// Returns true while a run is active.
    fn is_running(&self) -> bool;
}

/// Outcome of one sync run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    /// Operations applied successfully.
    pub successful: u64,
    /// Operations that failed (retryably or permanently).
    pub failed: u64,
    /// Operations that hit a version conflict.
    pub conflicts: u64,
    /// All operations attempted in this run.
    pub total_processed: u64,
    /// Wall time of the run.
    pub duration: Duration,
    /// Precondition or internal failure, if any. `start_sync` never
    /// returns `Err`; this field is the uniform error channel.
    pub error: Option<String>,
}

impl SyncReport {
    /// Creates a zero-processed report carrying an error message.
    #[must_use]
    pub fn empty(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Engine status exposed to callers.
#[derive(Debug, Clone)]
pub struct EngineStatus {
    /// True while a sync run is active.
    pub is_running: bool,
    /// The engine's configuration.
    pub config: SyncConfig,
}

/// Resets the running flag when a run ends, however it ends.
struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// The sync orchestrator.
///
/// Drains the outbox in priority order, batches operations per entity
/// table, invokes the registered remote applier for each operation in
/// creation order, and reflects the outcome onto the outbox and the
/// entity record.
///
/// All collaborators are injected; the engine holds no global state and a
/// test can compose a complete sync pipeline in memory.
pub struct SyncEngine<S: StoreBackend> {
    config: SyncConfig,
    outbox: Arc<OutboxQueue<S>>,
    registry: Arc<TableRegistry>,
    connectivity: Arc<dyn Connectivity>,
    clock: Arc<dyn Clock>,
    running: AtomicBool,
    stop_requested: AtomicBool,
}

impl<S: StoreBackend> SyncEngine<S> {
    /// Creates a new engine.
    ///
    /// The configured retry budget and high-priority threshold are pushed
    /// onto the outbox queue here so both sides agree on them.
    pub fn new(
        config: SyncConfig,
        outbox: Arc<OutboxQueue<S>>,
        registry: Arc<TableRegistry>,
        connectivity: Arc<dyn Connectivity>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        outbox.set_max_retries(config.max_retries);
        outbox.set_high_priority_threshold(config.high_priority_threshold);
        Self {
            config,
            outbox,
            registry,
            connectivity,
            clock,
            running: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
        }
    }

    /// Returns the engine status.
    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            is_running: self.running.load(Ordering::SeqCst),
            config: self.config.clone(),
        }
    }

    /// Returns current outbox counts.
    ///
    /// # Errors
    ///
    /// Returns an error if the store scan fails.
    pub fn queue_stats(&self) -> ledgersync_outbox::OutboxResult<QueueStats> {
        self.outbox.stats()
    }

    /// Runs one sync: reclaim stale work, high-priority pass, general
    /// pass, retention cleanup.
    ///
    /// Never panics and never returns `Err`. Precondition failures
    /// ("already running", "offline") and internal failures come back as
    /// a report with `error` set and zero-or-partial counters.
    pub fn start_sync(&self) -> SyncReport {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("sync requested while a run is active");
            return SyncReport::empty("sync already running");
        }
        let _guard = RunGuard {
            flag: &self.running,
        };
        self.stop_requested.store(false, Ordering::SeqCst);

        if !self.connectivity.is_online() {
            debug!("sync requested while offline");
            return SyncReport::empty("network offline");
        }

        let start = Instant::now();
        let mut report = SyncReport::default();
        info!("sync run started");

        if let Err(e) = self.run(&mut report) {
            error!(error = %e, "sync run aborted");
            report.error = Some(e.to_string());
        }

        report.duration = start.elapsed();
        info!(
            successful = report.successful,
            failed = report.failed,
            conflicts = report.conflicts,
            total = report.total_processed,
            duration_ms = report.duration.as_millis() as u64,
            "sync run finished"
        );
        report
    }

    /// Requests cancellation. Checked between batches; an in-flight
    /// remote call is allowed to complete so no operation is left
    /// half-applied.
    pub fn stop_sync(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    fn run(&self, report: &mut SyncReport) -> EngineResult<()> {
        // Work left in `processing` by an interrupted run is retryable.
        self.outbox
            .reclaim_stale_processing(self.config.stale_processing)?;

        // High-priority pass: one batch, no size cap, strictly before the
        // general loop.
        let urgent = self.outbox.high_priority()?;
        if !urgent.is_empty() {
            debug!(count = urgent.len(), "high-priority pass");
            self.process_batch(&urgent, report)?;
        }

        // General pass: drain until empty, yielding between batches.
        loop {
            if self.stop_requested.load(Ordering::SeqCst) {
                info!("sync cancelled between batches");
                break;
            }
            let batch = self.outbox.pending(self.config.max_batch_size)?;
            if batch.is_empty() {
                break;
            }
            self.process_batch(&batch, report)?;
            self.clock.sleep(self.config.inter_batch_delay);
        }

        self.outbox.cleanup_completed(self.config.retention)?;
        Ok(())
    }

    /// Applies one batch, grouped per table with creation order preserved
    /// within each group.
    fn process_batch(
        &self,
        operations: &[OutboxOperation],
        report: &mut SyncReport,
    ) -> EngineResult<()> {
        let batch_id = Uuid::new_v4().to_string();

        let mut groups: Vec<(&str, Vec<&OutboxOperation>)> = Vec::new();
        for op in operations {
            match groups
                .iter_mut()
                .find(|(table, _)| *table == op.table_name.as_str())
            {
                Some((_, group)) => group.push(op),
                None => groups.push((op.table_name.as_str(), vec![op])),
            }
        }

        for (table, group) in groups {
            let Some(handlers) = self.registry.get(table) else {
                warn!(table, count = group.len(), "no handler registered for table");
                for op in group {
                    self.outbox
                        .mark_failed_permanently(&op.id, "no handler registered for table")?;
                    report.failed += 1;
                    report.total_processed += 1;
                }
                continue;
            };

            for op in group {
                self.outbox.mark_processing(&op.id, Some(&batch_id))?;
                self.apply_one(op, &handlers, report)?;
            }
        }
        Ok(())
    }

    fn apply_one(
        &self,
        op: &OutboxOperation,
        handlers: &TableHandlers,
        report: &mut SyncReport,
    ) -> EngineResult<()> {
        let timeout = self.config.timeout;
        let outcome = match op.kind {
            OperationKind::Create => handlers
                .remote
                .apply_create(&op.data, timeout)
                .map(|ack| ack.server_id),
            OperationKind::Update => handlers
                .remote
                .apply_update(&op.data, timeout)
                .map(|()| None),
            OperationKind::Delete => handlers
                .remote
                .apply_delete(&op.data, timeout)
                .map(|()| None),
        };
        report.total_processed += 1;

        match outcome {
            Ok(server_id) => {
                self.outbox.mark_completed(&op.id)?;
                handlers
                    .sink
                    .mark_synced(&op.record_id, server_id.as_deref())?;
                report.successful += 1;
            }
            Err(err @ RemoteError::Conflict { .. }) if self.config.enable_conflict_resolution => {
                // Conservative policy for financial records: surface the
                // conflict, never overwrite silently, never auto-requeue.
                warn!(
                    operation = %op.id,
                    record = %op.record_id,
                    table = %op.table_name,
                    "remote reported version conflict"
                );
                self.outbox
                    .mark_failed_permanently(&op.id, &err.to_string())?;
                handlers.sink.mark_conflict(&op.record_id)?;
                report.conflicts += 1;
            }
            Err(err) if err.is_retryable() => {
                let message = err.to_string();
                let can_retry = self.outbox.mark_failed(&op.id, &message)?;
                report.failed += 1;
                if can_retry {
                    self.clock.sleep(self.config.retry_delay);
                } else {
                    handlers.sink.mark_error(&op.record_id, &message)?;
                }
            }
            Err(err) => {
                // Permanent: rejection, or a conflict with resolution
                // disabled. One attempt is enough.
                let message = err.to_string();
                self.outbox.mark_failed_permanently(&op.id, &message)?;
                handlers.sink.mark_error(&op.record_id, &message)?;
                report.failed += 1;
            }
        }
        Ok(())
    }
}

impl<S: StoreBackend> SyncControl for SyncEngine<S> {
    fn start_sync(&self) -> SyncReport {
        SyncEngine::start_sync(self)
    }

    fn stop_sync(&self) {
        SyncEngine::stop_sync(self);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
