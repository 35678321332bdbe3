//! # LedgerSync Engine
//!
//! The orchestrator of offline-first synchronization.
//!
//! This crate provides:
//! - [`SyncEngine`] - drains the outbox in priority order, batches
//!   operations per entity table, applies them against the remote, and
//!   reports success, retryable failure, and version conflicts back onto
//!   the outbox and the entity records
//! - [`RemoteApplier`] - the per-table remote boundary, with conflict
//!   signaled distinctly from generic failure
//! - [`TableRegistry`] - table name to handler map, so new entity types
//!   plug in without touching the engine loop
//! - [`NetworkMonitor`] - connectivity state, quality classification, and
//!   the reconnect trigger
//! - [`BackgroundScheduler`] - periodic sync with network and queue-size
//!   gating
//!
//! ## Key Invariants
//!
//! - At most one sync run is active at a time; concurrent `start_sync`
//!   calls return an "already running" report with zero processed
//! - The high-priority pass strictly precedes the general pass
//! - Operations for the same record are applied in creation order
//! - A version conflict never marks a record synced
//! - `start_sync` never panics or returns `Err`; precondition failures
//!   come back as an empty report with an error message, so timers and
//!   reconnect handlers treat every invocation uniformly

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod network;
mod registry;
mod remote;
mod scheduler;

pub use config::{SchedulerConfig, SyncConfig};
pub use engine::{Connectivity, EngineStatus, FixedConnectivity, SyncControl, SyncEngine, SyncReport};
pub use error::{EngineError, EngineResult};
pub use network::{
    CellularGeneration, ConnectionQuality, ConnectionType, ListenerId, NetworkMonitor,
    NetworkProbe, NetworkSnapshot, NetworkState, NetworkStatus,
};
pub use registry::{TableHandlers, TableRegistry};
pub use remote::{MockRemote, RemoteAck, RemoteApplier, RemoteError, RemoteResult};
pub use scheduler::{BackgroundScheduler, QueueStatsSource};
