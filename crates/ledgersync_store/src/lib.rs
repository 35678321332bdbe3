//! # LedgerSync Store
//!
//! Local store abstraction for LedgerSync.
//!
//! The sync core does not own a database engine. It consumes any durable
//! store that can provide tabled record CRUD with **monotonic insertion
//! ordering** and atomic multi-row writes. This crate defines that seam:
//!
//! - [`StoreBackend`] - the trait the outbox, entity services, and sync
//!   engine are written against
//! - [`WriteBatch`] - an atomic group of writes (a record mutation and its
//!   outbox entry must commit together)
//! - [`InMemoryStore`] - a thread-safe reference implementation for tests
//!   and ephemeral use
//!
//! It also hosts the [`Clock`] abstraction shared by the queue and the
//! engine, so retention windows, staleness checks, and inter-batch delays
//! are testable without wall-clock waits.
//!
//! ## Example
//!
//! ```rust
//! use ledgersync_store::{InMemoryStore, StoreBackend, WriteBatch};
//!
//! let store = InMemoryStore::new();
//! let mut batch = WriteBatch::new();
//! batch.put("transactions", "tx-1", b"snapshot".to_vec());
//! batch.put("_outbox", "op-1", b"operation".to_vec());
//! store.apply(batch).unwrap();
//! assert_eq!(store.count("transactions").unwrap(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod clock;
mod error;
mod memory;

pub use backend::{BatchOp, StoreBackend, WriteBatch};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
