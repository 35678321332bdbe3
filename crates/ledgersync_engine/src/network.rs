//! Network state monitoring and the reconnect trigger.

use crate::engine::{Connectivity, SyncControl};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Coarse connectivity status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    /// Connected with internet reachability confirmed.
    Online,
    /// No connection.
    Offline,
    /// Connected but reachability unconfirmed.
    Unknown,
}

/// The physical connection type reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionType {
    /// Wi-Fi.
    Wifi,
    /// Wired ethernet.
    Ethernet,
    /// Cellular data.
    Cellular,
    /// No connection.
    None,
    /// Anything else the platform reports.
    Other,
}

/// Cellular generation, when known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellularGeneration {
    /// 3G or older.
    Gen3,
    /// 4G / LTE.
    Gen4,
    /// 5G.
    Gen5,
}

/// Connection quality tier, ordered worst to best.
///
/// Feeds scheduler gating; never blocks a manual sync request outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectionQuality {
    /// No usable connectivity.
    Unusable,
    /// Expensive or slow cellular.
    Poor,
    /// Fast cellular on a non-expensive link.
    Good,
    /// Wi-Fi or ethernet.
    Excellent,
}

/// A raw connectivity callback payload from the platform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkSnapshot {
    /// Physical connection type.
    pub connection_type: ConnectionType,
    /// Cellular generation, for cellular connections.
    pub cellular_generation: Option<CellularGeneration>,
    /// Whether the platform flags the link as expensive (metered).
    pub is_expensive: bool,
    /// Whether a link is up.
    pub is_connected: bool,
    /// Whether the internet is reachable over the link.
    pub is_internet_reachable: bool,
}

impl NetworkSnapshot {
    /// A healthy Wi-Fi connection.
    #[must_use]
    pub fn wifi() -> Self {
        Self {
            connection_type: ConnectionType::Wifi,
            cellular_generation: None,
            is_expensive: false,
            is_connected: true,
            is_internet_reachable: true,
        }
    }

    /// A cellular connection.
    #[must_use]
    pub fn cellular(generation: CellularGeneration, is_expensive: bool) -> Self {
        Self {
            connection_type: ConnectionType::Cellular,
            cellular_generation: Some(generation),
            is_expensive,
            is_connected: true,
            is_internet_reachable: true,
        }
    }

    /// No connectivity.
    #[must_use]
    pub fn offline() -> Self {
        Self {
            connection_type: ConnectionType::None,
            cellular_generation: None,
            is_expensive: false,
            is_connected: false,
            is_internet_reachable: false,
        }
    }
}

/// Computed network state. Transient: recomputed on every platform
/// callback, never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkState {
    /// Coarse status.
    pub status: NetworkStatus,
    /// Physical connection type.
    pub connection_type: ConnectionType,
    /// Whether a link is up.
    pub is_connected: bool,
    /// Whether the internet is reachable.
    pub is_internet_reachable: bool,
    /// Quality tier.
    pub quality: ConnectionQuality,
}

impl NetworkState {
    /// The initial state before any platform callback arrives.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            status: NetworkStatus::Unknown,
            connection_type: ConnectionType::None,
            is_connected: false,
            is_internet_reachable: false,
            quality: ConnectionQuality::Unusable,
        }
    }

    /// Classifies a platform snapshot.
    #[must_use]
    pub fn classify(snapshot: NetworkSnapshot) -> Self {
        let status = if snapshot.is_connected && snapshot.is_internet_reachable {
            NetworkStatus::Online
        } else if !snapshot.is_connected {
            NetworkStatus::Offline
        } else {
            NetworkStatus::Unknown
        };

        let quality = if status != NetworkStatus::Online {
            ConnectionQuality::Unusable
        } else {
            match snapshot.connection_type {
                ConnectionType::Wifi | ConnectionType::Ethernet => ConnectionQuality::Excellent,
                ConnectionType::Cellular => match snapshot.cellular_generation {
                    Some(CellularGeneration::Gen4 | CellularGeneration::Gen5)
                        if !snapshot.is_expensive =>
                    {
                        ConnectionQuality::Good
                    }
                    _ => ConnectionQuality::Poor,
                },
                ConnectionType::Other => ConnectionQuality::Poor,
                ConnectionType::None => ConnectionQuality::Unusable,
            }
        };

        Self {
            status,
            connection_type: snapshot.connection_type,
            is_connected: snapshot.is_connected,
            is_internet_reachable: snapshot.is_internet_reachable,
            quality,
        }
    }
}

/// Network view the background scheduler gates on.
pub trait NetworkProbe: Send + Sync {
    /// Returns true if the network is online.
    fn is_online(&self) -> bool;

    /// Returns the current quality tier.
    fn quality(&self) -> ConnectionQuality;
}

/// Handle for removing a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&NetworkState) + Send + Sync>;

/// Observes connectivity and drives the sync engine on transitions.
///
/// The platform layer feeds every OS connectivity callback into
/// [`update`](Self::update). An offline-to-online transition triggers one
/// `start_sync` on the attached [`SyncControl`] (skipped while a run is
/// already active); an online-to-offline transition requests `stop_sync`.
pub struct NetworkMonitor {
    state: RwLock<NetworkState>,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_listener: AtomicU64,
    control: RwLock<Option<Arc<dyn SyncControl>>>,
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkMonitor {
    /// Creates a monitor in the unknown state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(NetworkState::unknown()),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            control: RwLock::new(None),
        }
    }

    /// Attaches the sync control driven on transitions.
    pub fn attach_control(&self, control: Arc<dyn SyncControl>) {
        *self.control.write() = Some(control);
    }

    /// Returns the current state.
    pub fn current_state(&self) -> NetworkState {
        *self.state.read()
    }

    /// Returns true if the network is online.
    pub fn is_online(&self) -> bool {
        self.current_state().status == NetworkStatus::Online
    }

    /// Returns true if the network is offline or unknown.
    pub fn is_offline(&self) -> bool {
        !self.is_online()
    }

    /// Returns the current quality tier.
    pub fn quality(&self) -> ConnectionQuality {
        self.current_state().quality
    }

    /// Registers a listener invoked on every state recomputation.
    pub fn add_listener(
        &self,
        listener: impl Fn(&NetworkState) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::SeqCst));
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    /// Removes a listener. Unknown ids are ignored.
    pub fn remove_listener(&self, id: ListenerId) {
        self.listeners.lock().retain(|(lid, _)| *lid != id);
    }

    /// Recomputes state from a platform callback and reacts to the
    /// transition.
    pub fn update(&self, snapshot: NetworkSnapshot) {
        let new_state = NetworkState::classify(snapshot);
        let old_state = {
            let mut state = self.state.write();
            std::mem::replace(&mut *state, new_state)
        };

        if old_state.status != new_state.status {
            info!(from = ?old_state.status, to = ?new_state.status, "network transition");
        }

        // Snapshot under the lock, invoke outside it: a listener may
        // re-enter add_listener/remove_listener or update.
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in &listeners {
            listener(&new_state);
        }

        let control = self.control.read().clone();
        let Some(control) = control else { return };

        let came_online = old_state.status != NetworkStatus::Online
            && new_state.status == NetworkStatus::Online;
        let went_offline = old_state.status == NetworkStatus::Online
            && new_state.status == NetworkStatus::Offline;

        if came_online {
            // Debounced: a run already in flight keeps going and will see
            // the full queue anyway.
            if control.is_running() {
                debug!("reconnect sync skipped, run already active");
            } else {
                info!("network restored, starting sync");
                // The platform callback thread must not be held for a
                // whole run; the sync gets its own thread.
                std::thread::spawn(move || {
                    control.start_sync();
                });
            }
        } else if went_offline {
            info!("network lost, stopping sync");
            control.stop_sync();
        }
    }
}

impl Connectivity for NetworkMonitor {
    fn is_online(&self) -> bool {
        NetworkMonitor::is_online(self)
    }
}

impl NetworkProbe for NetworkMonitor {
    fn is_online(&self) -> bool {
        NetworkMonitor::is_online(self)
    }

    fn quality(&self) -> ConnectionQuality {
        NetworkMonitor::quality(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SyncReport;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingControl {
        starts: AtomicUsize,
        stops: AtomicUsize,
        running: AtomicBool,
        start_thread: Mutex<Option<std::thread::ThreadId>>,
    }

    impl RecordingControl {
        /// Waits for the expected number of starts; reconnect syncs run on
        /// their own thread.
        fn wait_for_starts(&self, expected: usize) {
            for _ in 0..200 {
                if self.starts.load(Ordering::SeqCst) >= expected {
                    return;
                }
                std::thread::sleep(Duration::from_millis(5));
            }
        }
    }

    impl SyncControl for RecordingControl {
        fn start_sync(&self) -> SyncReport {
            *self.start_thread.lock() = Some(std::thread::current().id());
            self.starts.fetch_add(1, Ordering::SeqCst);
            SyncReport::default()
        }

        fn stop_sync(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }

        fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn quality_classification() {
        assert_eq!(
            NetworkState::classify(NetworkSnapshot::wifi()).quality,
            ConnectionQuality::Excellent
        );
        assert_eq!(
            NetworkState::classify(NetworkSnapshot::cellular(CellularGeneration::Gen5, false))
                .quality,
            ConnectionQuality::Good
        );
        assert_eq!(
            NetworkState::classify(NetworkSnapshot::cellular(CellularGeneration::Gen4, true))
                .quality,
            ConnectionQuality::Poor
        );
        assert_eq!(
            NetworkState::classify(NetworkSnapshot::cellular(CellularGeneration::Gen3, false))
                .quality,
            ConnectionQuality::Poor
        );
        assert_eq!(
            NetworkState::classify(NetworkSnapshot::offline()).quality,
            ConnectionQuality::Unusable
        );
    }

    #[test]
    fn quality_tiers_are_ordered() {
        assert!(ConnectionQuality::Unusable < ConnectionQuality::Poor);
        assert!(ConnectionQuality::Poor < ConnectionQuality::Good);
        assert!(ConnectionQuality::Good < ConnectionQuality::Excellent);
    }

    #[test]
    fn connected_without_reachability_is_unknown() {
        let state = NetworkState::classify(NetworkSnapshot {
            is_internet_reachable: false,
            ..NetworkSnapshot::wifi()
        });
        assert_eq!(state.status, NetworkStatus::Unknown);
        assert_eq!(state.quality, ConnectionQuality::Unusable);
    }

    #[test]
    fn reconnect_triggers_sync_once() {
        let monitor = NetworkMonitor::new();
        let control = Arc::new(RecordingControl::default());
        monitor.attach_control(control.clone());

        monitor.update(NetworkSnapshot::offline());
        assert_eq!(control.starts.load(Ordering::SeqCst), 0);

        monitor.update(NetworkSnapshot::wifi());
        control.wait_for_starts(1);
        assert_eq!(control.starts.load(Ordering::SeqCst), 1);

        // Staying online does not re-trigger.
        monitor.update(NetworkSnapshot::wifi());
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(control.starts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reconnect_sync_runs_off_the_callback_thread() {
        let monitor = NetworkMonitor::new();
        let control = Arc::new(RecordingControl::default());
        monitor.attach_control(control.clone());

        monitor.update(NetworkSnapshot::offline());
        monitor.update(NetworkSnapshot::wifi());
        control.wait_for_starts(1);

        let start_thread = control.start_thread.lock().unwrap();
        assert_ne!(start_thread, std::thread::current().id());
    }

    #[test]
    fn reconnect_skipped_while_running() {
        let monitor = NetworkMonitor::new();
        let control = Arc::new(RecordingControl::default());
        control.running.store(true, Ordering::SeqCst);
        monitor.attach_control(control.clone());

        monitor.update(NetworkSnapshot::offline());
        monitor.update(NetworkSnapshot::wifi());
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(control.starts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn going_offline_stops_sync() {
        let monitor = NetworkMonitor::new();
        let control = Arc::new(RecordingControl::default());
        monitor.attach_control(control.clone());

        monitor.update(NetworkSnapshot::wifi());
        monitor.update(NetworkSnapshot::offline());
        assert_eq!(control.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listeners_observe_and_unsubscribe() {
        let monitor = NetworkMonitor::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in_listener = seen.clone();

        let id = monitor.add_listener(move |_| {
            seen_in_listener.fetch_add(1, Ordering::SeqCst);
        });

        monitor.update(NetworkSnapshot::wifi());
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        monitor.remove_listener(id);
        monitor.update(NetworkSnapshot::offline());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_may_change_subscriptions_reentrantly() {
        let monitor = Arc::new(NetworkMonitor::new());
        let seen = Arc::new(AtomicUsize::new(0));

        let inner_monitor = monitor.clone();
        let seen_in_listener = seen.clone();
        monitor.add_listener(move |_| {
            seen_in_listener.fetch_add(1, Ordering::SeqCst);
            let id = inner_monitor.add_listener(|_| {});
            inner_monitor.remove_listener(id);
        });

        monitor.update(NetworkSnapshot::wifi());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
