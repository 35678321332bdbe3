//! Configuration for the sync engine and background scheduler.

use std::time::Duration;

/// Configuration for sync runs.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum operations fetched per general-pass batch.
    pub max_batch_size: usize,
    /// Retry budget per operation. Applied to the outbox queue when the
    /// engine is constructed.
    pub max_retries: u32,
    /// Delay after a retryable failure before the next dispatch.
    pub retry_delay: Duration,
    /// Delay between general-pass batches. A deliberate backpressure
    /// point, not incidental.
    pub inter_batch_delay: Duration,
    /// Per-remote-call timeout, passed to every [`crate::RemoteApplier`]
    /// dispatch.
    pub timeout: Duration,
    /// Priority at or above which operations sync in the dedicated
    /// high-priority pass. Applied to the outbox queue when the engine is
    /// constructed.
    pub high_priority_threshold: i32,
    /// Retention window for completed outbox operations.
    pub retention: Duration,
    /// Age past which an operation stuck in `processing` is treated as
    /// retryable by the next run.
    pub stale_processing: Duration,
    /// When false, a remote version conflict degrades to a permanent
    /// failure instead of marking the record conflicted.
    pub enable_conflict_resolution: bool,
}

impl SyncConfig {
    /// Sets the general-pass batch size.
    #[must_use]
    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }

    /// Sets the retry budget.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the delay after a retryable failure.
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Sets the delay between batches.
    #[must_use]
    pub fn with_inter_batch_delay(mut self, delay: Duration) -> Self {
        self.inter_batch_delay = delay;
        self
    }

    /// Sets the per-remote-call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the high-priority threshold.
    #[must_use]
    pub fn with_high_priority_threshold(mut self, threshold: i32) -> Self {
        self.high_priority_threshold = threshold;
        self
    }

    /// Sets the completed-operation retention window.
    #[must_use]
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Sets the stale-processing window.
    #[must_use]
    pub fn with_stale_processing(mut self, staleness: Duration) -> Self {
        self.stale_processing = staleness;
        self
    }

    /// Enables or disables conflict resolution.
    #[must_use]
    pub fn with_conflict_resolution(mut self, enabled: bool) -> Self {
        self.enable_conflict_resolution = enabled;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 50,
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
            inter_batch_delay: Duration::from_millis(500),
            timeout: Duration::from_secs(30),
            high_priority_threshold: 5,
            retention: Duration::from_secs(7 * 24 * 60 * 60),
            stale_processing: Duration::from_secs(5 * 60),
            enable_conflict_resolution: true,
        }
    }
}

/// Configuration for the background scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between scheduled sync attempts.
    pub interval: Duration,
    /// Pending count above which a sync is a bulk backlog and requires at
    /// least poor connection quality.
    pub bulk_threshold: u64,
}

impl SchedulerConfig {
    /// Sets the scheduling interval.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the bulk backlog threshold.
    #[must_use]
    pub fn with_bulk_threshold(mut self, threshold: u64) -> Self {
        self.bulk_threshold = threshold;
        self
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15 * 60),
            bulk_threshold: 100,
        }
    }
}
