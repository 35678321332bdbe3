//! The durable outbox queue.

use crate::error::{OutboxError, OutboxResult};
use crate::operation::{OperationId, OperationKind, OperationStatus, OutboxOperation};
use ledgersync_store::{Clock, StoreBackend, WriteBatch};
use std::cmp::Reverse;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default retry budget per operation.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default priority threshold for the dedicated high-priority pass.
pub const DEFAULT_HIGH_PRIORITY_THRESHOLD: i32 = 5;

/// Store table holding outbox rows.
const OUTBOX_TABLE: &str = "_outbox";

/// Counts of outbox operations by status.
///
/// Used for scheduler gating and for surfacing queue depth to the UI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Operations waiting for a sync run.
    pub pending: u64,
    /// Operations currently being applied.
    pub processing: u64,
    /// Operations applied successfully, awaiting cleanup.
    pub completed: u64,
    /// Operations that failed permanently.
    pub failed: u64,
    /// All operations in the queue.
    pub total: u64,
}

/// A durable, ordered log of pending mutations.
///
/// The queue persists every operation through the injected
/// [`StoreBackend`]; queue writes are local and never block on the
/// network. Store failures propagate as fatal [`OutboxError::Store`]
/// errors rather than being treated as sync failures.
pub struct OutboxQueue<S: StoreBackend> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    max_retries: AtomicU32,
    high_priority_threshold: AtomicI32,
}

impl<S: StoreBackend> OutboxQueue<S> {
    /// Creates a queue over the given store with default retry budget and
    /// priority threshold.
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            max_retries: AtomicU32::new(DEFAULT_MAX_RETRIES),
            high_priority_threshold: AtomicI32::new(DEFAULT_HIGH_PRIORITY_THRESHOLD),
        }
    }

    /// Sets the retry budget.
    #[must_use]
    pub fn with_max_retries(self, max_retries: u32) -> Self {
        self.set_max_retries(max_retries);
        self
    }

    /// Sets the high-priority threshold.
    #[must_use]
    pub fn with_high_priority_threshold(self, threshold: i32) -> Self {
        self.set_high_priority_threshold(threshold);
        self
    }

    /// Changes the retry budget on a shared queue. The sync engine applies
    /// its configured budget here at construction.
    pub fn set_max_retries(&self, max_retries: u32) {
        self.max_retries.store(max_retries, Ordering::SeqCst);
    }

    /// Changes the high-priority threshold on a shared queue.
    pub fn set_high_priority_threshold(&self, threshold: i32) {
        self.high_priority_threshold.store(threshold, Ordering::SeqCst);
    }

    /// Returns the retry budget.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries.load(Ordering::SeqCst)
    }

    /// Returns the high-priority threshold.
    #[must_use]
    pub fn high_priority_threshold(&self) -> i32 {
        self.high_priority_threshold.load(Ordering::SeqCst)
    }

    /// Appends a new pending operation to the queue.
    ///
    /// Always a local durable write; never blocks on the network.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write or row encoding fails.
    pub fn enqueue(
        &self,
        kind: OperationKind,
        table_name: &str,
        record_id: &str,
        data: serde_json::Value,
        priority: i32,
        batch_id: Option<String>,
    ) -> OutboxResult<OperationId> {
        let mut batch = WriteBatch::new();
        let id = self.stage(&mut batch, kind, table_name, record_id, data, priority, batch_id)?;
        self.store.apply(batch)?;
        Ok(id)
    }

    /// Stages an enqueue into an existing [`WriteBatch`].
    ///
    /// Entity services use this to commit a record mutation and its outbox
    /// entry in one atomic store write.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be encoded.
    #[allow(clippy::too_many_arguments)]
    pub fn stage(
        &self,
        batch: &mut WriteBatch,
        kind: OperationKind,
        table_name: &str,
        record_id: &str,
        data: serde_json::Value,
        priority: i32,
        batch_id: Option<String>,
    ) -> OutboxResult<OperationId> {
        let operation = OutboxOperation {
            id: Uuid::new_v4().to_string(),
            kind,
            table_name: table_name.to_string(),
            record_id: record_id.to_string(),
            data,
            priority,
            created_at: self.clock.now_ms(),
            retry_count: 0,
            last_attempt: None,
            completed_at: None,
            error_message: None,
            status: OperationStatus::Pending,
            batch_id,
        };

        debug!(
            operation = %operation.id,
            kind = operation.kind.as_str(),
            table = %operation.table_name,
            record = %operation.record_id,
            priority = operation.priority,
            "outbox enqueue"
        );

        batch.put(OUTBOX_TABLE, &operation.id, operation.encode()?);
        Ok(operation.id)
    }

    /// Returns up to `limit` pending operations, highest priority first
    /// and FIFO within a priority tier.
    ///
    /// # Errors
    ///
    /// Returns an error if the store scan fails or a row is corrupt.
    pub fn pending(&self, limit: usize) -> OutboxResult<Vec<OutboxOperation>> {
        let mut ops: Vec<OutboxOperation> = self
            .scan_all()?
            .into_iter()
            .filter(|op| op.status == OperationStatus::Pending)
            .collect();
        // Stable sort keeps insertion (creation) order within a tier.
        ops.sort_by_key(|op| Reverse(op.priority));
        ops.truncate(limit);
        Ok(ops)
    }

    /// Returns all pending operations at or above the high-priority
    /// threshold, in the same order as [`pending`](Self::pending).
    ///
    /// # Errors
    ///
    /// Returns an error if the store scan fails or a row is corrupt.
    pub fn high_priority(&self) -> OutboxResult<Vec<OutboxOperation>> {
        let mut ops: Vec<OutboxOperation> = self
            .scan_all()?
            .into_iter()
            .filter(|op| {
                op.status == OperationStatus::Pending
                    && op.priority >= self.high_priority_threshold()
            })
            .collect();
        ops.sort_by_key(|op| Reverse(op.priority));
        Ok(ops)
    }

    /// Marks an operation as processing, stamping the batch correlation id
    /// and the attempt time.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation is missing or not pending.
    pub fn mark_processing(&self, id: &str, batch_id: Option<&str>) -> OutboxResult<()> {
        let mut op = self.load(id)?;
        if op.status != OperationStatus::Pending {
            return Err(OutboxError::InvalidTransition {
                id: id.to_string(),
                from: op.status,
                to: OperationStatus::Processing,
            });
        }
        op.status = OperationStatus::Processing;
        op.last_attempt = Some(self.clock.now_ms());
        if let Some(batch_id) = batch_id {
            op.batch_id = Some(batch_id.to_string());
        }
        self.save(&op)
    }

    /// Marks an operation as completed.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation is missing or not processing.
    pub fn mark_completed(&self, id: &str) -> OutboxResult<()> {
        let mut op = self.load(id)?;
        if op.status != OperationStatus::Processing {
            return Err(OutboxError::InvalidTransition {
                id: id.to_string(),
                from: op.status,
                to: OperationStatus::Completed,
            });
        }
        op.status = OperationStatus::Completed;
        op.completed_at = Some(self.clock.now_ms());
        op.error_message = None;
        self.save(&op)
    }

    /// Records a failed attempt.
    ///
    /// Increments the retry count. While the budget lasts the operation
    /// returns to `pending` for the next pass and `true` is returned.
    /// Once the budget is exhausted the operation stays `failed` and the
    /// caller is responsible for surfacing it.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation is missing or the store write
    /// fails.
    pub fn mark_failed(&self, id: &str, error: &str) -> OutboxResult<bool> {
        let mut op = self.load(id)?;
        op.retry_count += 1;
        op.last_attempt = Some(self.clock.now_ms());
        op.error_message = Some(error.to_string());

        let can_retry = op.retry_count < self.max_retries();
        if can_retry {
            op.status = OperationStatus::Pending;
            debug!(
                operation = %op.id,
                retry_count = op.retry_count,
                error,
                "outbox operation failed, will retry"
            );
        } else {
            op.status = OperationStatus::Failed;
            warn!(
                operation = %op.id,
                table = %op.table_name,
                record = %op.record_id,
                error,
                "outbox operation failed permanently, retry budget exhausted"
            );
        }
        self.save(&op)?;
        Ok(can_retry)
    }

    /// Marks an operation as permanently failed, exhausting its budget.
    ///
    /// Used for remote rejections and version conflicts, which retrying
    /// cannot fix. The operation never reappears in a `pending` fetch.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation is missing or the store write
    /// fails.
    pub fn mark_failed_permanently(&self, id: &str, error: &str) -> OutboxResult<()> {
        let mut op = self.load(id)?;
        op.retry_count = op.retry_count.max(self.max_retries());
        op.last_attempt = Some(self.clock.now_ms());
        op.error_message = Some(error.to_string());
        op.status = OperationStatus::Failed;
        warn!(
            operation = %op.id,
            table = %op.table_name,
            record = %op.record_id,
            error,
            "outbox operation failed permanently"
        );
        self.save(&op)
    }

    /// Returns retry-eligible failed operations to `pending`.
    ///
    /// Used after a long offline period or a manual retry action. Rows
    /// whose retry budget is exhausted are left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the store scan or a row write fails.
    pub fn reset_failed_for_retry(&self) -> OutboxResult<Vec<OutboxOperation>> {
        let mut reset = Vec::new();
        for mut op in self.scan_all()? {
            if op.status == OperationStatus::Failed && op.retry_count < self.max_retries() {
                op.status = OperationStatus::Pending;
                self.save(&op)?;
                reset.push(op);
            }
        }
        if !reset.is_empty() {
            info!(count = reset.len(), "reset failed outbox operations for retry");
        }
        Ok(reset)
    }

    /// Deletes completed operations whose completion is older than the
    /// retention window.
    ///
    /// Age is measured from completion time, so a row that sat pending
    /// through a long offline period still gets its full audit window
    /// after it finally syncs. Idempotent: a second run with no new
    /// completions removes nothing. Never touches non-terminal rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the store scan or a row removal fails.
    pub fn cleanup_completed(&self, older_than: Duration) -> OutboxResult<u64> {
        let now = self.clock.now_ms();
        let cutoff = now.saturating_sub(older_than.as_millis() as u64);
        let mut removed = 0;
        for op in self.scan_all()? {
            if op.status == OperationStatus::Completed
                && op.completed_at.unwrap_or(op.created_at) < cutoff
            {
                self.store.remove(OUTBOX_TABLE, &op.id)?;
                removed += 1;
            }
        }
        if removed > 0 {
            info!(removed, "cleaned up completed outbox operations");
        }
        Ok(removed)
    }

    /// Returns operations stuck in `processing` past the staleness window
    /// to `pending`.
    ///
    /// An operation left in `processing` by an interrupted run must be
    /// treated as retryable by the next run, not as in-flight forever.
    ///
    /// # Errors
    ///
    /// Returns an error if the store scan or a row write fails.
    pub fn reclaim_stale_processing(&self, staleness: Duration) -> OutboxResult<u64> {
        let now = self.clock.now_ms();
        let cutoff = now.saturating_sub(staleness.as_millis() as u64);
        let mut reclaimed = 0;
        for mut op in self.scan_all()? {
            if op.status == OperationStatus::Processing
                && op.last_attempt.unwrap_or(op.created_at) < cutoff
            {
                op.status = OperationStatus::Pending;
                self.save(&op)?;
                reclaimed += 1;
            }
        }
        if reclaimed > 0 {
            warn!(reclaimed, "reclaimed stale processing outbox operations");
        }
        Ok(reclaimed)
    }

    /// Returns counts of operations by status.
    ///
    /// # Errors
    ///
    /// Returns an error if the store scan fails.
    pub fn stats(&self) -> OutboxResult<QueueStats> {
        let mut stats = QueueStats::default();
        for op in self.scan_all()? {
            stats.total += 1;
            match op.status {
                OperationStatus::Pending => stats.pending += 1,
                OperationStatus::Processing => stats.processing += 1,
                OperationStatus::Completed => stats.completed += 1,
                OperationStatus::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }

    /// Loads a single operation.
    ///
    /// # Errors
    ///
    /// Returns [`OutboxError::NotFound`] if the operation does not exist.
    pub fn load(&self, id: &str) -> OutboxResult<OutboxOperation> {
        let bytes = self
            .store
            .get(OUTBOX_TABLE, id)?
            .ok_or_else(|| OutboxError::NotFound(id.to_string()))?;
        OutboxOperation::decode(&bytes).map_err(|e| OutboxError::CorruptRow {
            key: id.to_string(),
            message: e.to_string(),
        })
    }

    fn save(&self, op: &OutboxOperation) -> OutboxResult<()> {
        self.store.put(OUTBOX_TABLE, &op.id, op.encode()?)?;
        Ok(())
    }

    fn scan_all(&self) -> OutboxResult<Vec<OutboxOperation>> {
        self.store
            .scan(OUTBOX_TABLE)?
            .into_iter()
            .map(|(key, bytes)| {
                OutboxOperation::decode(&bytes).map_err(|e| OutboxError::CorruptRow {
                    key,
                    message: e.to_string(),
                })
            })
            .collect()
    }
}
