//! # LedgerSync Records
//!
//! Entity records and the local-first entity service pattern.
//!
//! A record is owned by exactly one [`RecordService`]. Every mutating call
//! succeeds offline: it persists the record locally and, in the same
//! atomic store write, appends a matching outbox operation for the sync
//! engine to drain later. The sync engine never mutates records directly -
//! it calls back through the [`StatusSink`] trait to transition
//! `sync_status` away from [`SyncStatus::Pending`].
//!
//! The concrete [`Transaction`] ledger entry is defined here; merchant and
//! user records follow the same [`Record`] pattern.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod meta;
mod record;
mod service;
mod transaction;

pub use error::{ServiceError, ServiceResult};
pub use meta::{SyncMeta, SyncStatus};
pub use record::{Record, StatusSink};
pub use service::RecordService;
pub use transaction::{GeoPoint, Transaction, TransactionKind};
