//! Periodic background sync with network and backlog gating.

use crate::config::SchedulerConfig;
use crate::engine::SyncControl;
use crate::network::{ConnectionQuality, NetworkProbe};
use ledgersync_outbox::{OutboxQueue, OutboxResult, QueueStats};
use ledgersync_store::StoreBackend;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// Source of outbox counts for scheduling decisions.
pub trait QueueStatsSource: Send + Sync {
    /// Returns current outbox counts.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store scan fails.
    fn queue_stats(&self) -> OutboxResult<QueueStats>;
}

impl<S: StoreBackend> QueueStatsSource for OutboxQueue<S> {
    fn queue_stats(&self) -> OutboxResult<QueueStats> {
        self.stats()
    }
}

struct Shutdown {
    requested: Mutex<bool>,
    signal: Condvar,
}

/// Fires sync runs on a fixed interval, skipping ticks when there is
/// nothing to do or the network cannot carry the work.
///
/// Gating per tick: sync only when the outbox has pending operations and
/// the network is online. A backlog larger than
/// [`SchedulerConfig::bulk_threshold`] additionally requires at least the
/// [`ConnectionQuality::Poor`] tier; only an unusable link defers a bulk
/// backlog, while small queues sync opportunistically on any connection.
pub struct BackgroundScheduler {
    config: SchedulerConfig,
    control: Arc<dyn SyncControl>,
    probe: Arc<dyn NetworkProbe>,
    queue: Arc<dyn QueueStatsSource>,
    shutdown: Arc<Shutdown>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl BackgroundScheduler {
    /// Creates a scheduler. Call [`start`](Self::start) to begin ticking.
    pub fn new(
        config: SchedulerConfig,
        control: Arc<dyn SyncControl>,
        probe: Arc<dyn NetworkProbe>,
        queue: Arc<dyn QueueStatsSource>,
    ) -> Self {
        Self {
            config,
            control,
            probe,
            queue,
            shutdown: Arc::new(Shutdown {
                requested: Mutex::new(false),
                signal: Condvar::new(),
            }),
            handle: Mutex::new(None),
        }
    }

    /// Evaluates the gating conditions and, when they pass, runs one sync.
    /// Returns true if a sync was started.
    pub fn run_once(&self) -> bool {
        let pending = match self.queue.queue_stats() {
            Ok(stats) => stats.pending,
            Err(e) => {
                warn!(error = %e, "scheduler could not read queue stats");
                return false;
            }
        };
        if pending == 0 {
            debug!("scheduler tick: queue empty");
            return false;
        }
        if !self.probe.is_online() {
            debug!(pending, "scheduler tick: offline");
            return false;
        }
        if pending > self.config.bulk_threshold && self.probe.quality() < ConnectionQuality::Poor {
            info!(
                pending,
                quality = ?self.probe.quality(),
                "scheduler tick: bulk backlog deferred, link unusable"
            );
            return false;
        }

        debug!(pending, "scheduler tick: starting sync");
        self.control.start_sync();
        true
    }

    /// Spawns the scheduler thread. Idempotent while a thread is running.
    pub fn start(self: &Arc<Self>) {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            return;
        }
        *self.shutdown.requested.lock() = false;

        let scheduler = Arc::clone(self);
        let interval = self.config.interval;
        info!(interval_secs = interval.as_secs(), "background scheduler started");

        *handle = Some(std::thread::spawn(move || loop {
            {
                let mut requested = scheduler.shutdown.requested.lock();
                if !*requested {
                    let _ = scheduler
                        .shutdown
                        .signal
                        .wait_for(&mut requested, interval);
                }
                if *requested {
                    break;
                }
            }
            scheduler.run_once();
        }));
    }

    /// Stops the scheduler thread and waits for it to exit.
    pub fn stop(&self) {
        {
            let mut requested = self.shutdown.requested.lock();
            *requested = true;
        }
        self.shutdown.signal.notify_all();
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
            info!("background scheduler stopped");
        }
    }

    /// Returns true while the scheduler thread is running.
    pub fn is_started(&self) -> bool {
        self.handle.lock().is_some()
    }
}

impl Drop for BackgroundScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
