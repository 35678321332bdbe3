//! The merchant ledger transaction record.

use crate::error::{ServiceError, ServiceResult};
use crate::meta::SyncMeta;
use crate::record::Record;
use serde::{Deserialize, Serialize};

/// Amount at or above which a transaction syncs in the high-priority pass.
const HIGH_VALUE_CENTS: i64 = 100_000;

/// The direction of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Money in: a sale to a customer.
    Sale,
    /// Money out: a purchase or operating expense.
    Expense,
    /// Money returned to a customer.
    Refund,
}

/// A geographic point captured at entry time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

/// A merchant ledger transaction.
///
/// Amounts are in minor currency units (cents) to avoid floating point
/// drift in financial records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sync identity and bookkeeping.
    #[serde(flatten)]
    pub meta: SyncMeta,
    /// Entry direction.
    pub kind: TransactionKind,
    /// Amount in cents. Always positive; `kind` carries the direction.
    pub amount_cents: i64,
    /// The other party: customer, supplier, or description of one.
    pub counterpart: String,
    /// Free-form note.
    pub note: Option<String>,
    /// Where the entry was recorded, if the device knew.
    pub location: Option<GeoPoint>,
}

impl Transaction {
    /// Creates a transaction with empty sync metadata.
    ///
    /// The owning service assigns identity and versioning on `create`.
    #[must_use]
    pub fn new(kind: TransactionKind, amount_cents: i64, counterpart: impl Into<String>) -> Self {
        Self {
            meta: SyncMeta::default(),
            kind,
            amount_cents,
            counterpart: counterpart.into(),
            note: None,
            location: None,
        }
    }

    /// Sets the note.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Sets the capture location.
    #[must_use]
    pub fn with_location(mut self, latitude: f64, longitude: f64) -> Self {
        self.location = Some(GeoPoint {
            latitude,
            longitude,
        });
        self
    }
}

impl Record for Transaction {
    const TABLE: &'static str = "transactions";

    fn meta(&self) -> &SyncMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut SyncMeta {
        &mut self.meta
    }

    fn validate(&self) -> ServiceResult<()> {
        if self.amount_cents <= 0 {
            return Err(ServiceError::Validation(
                "amount must be a positive number of cents".into(),
            ));
        }
        if self.counterpart.trim().is_empty() {
            return Err(ServiceError::Validation("counterpart must not be empty".into()));
        }
        if let Some(location) = &self.location {
            if !(-90.0..=90.0).contains(&location.latitude)
                || !(-180.0..=180.0).contains(&location.longitude)
            {
                return Err(ServiceError::Validation("location out of range".into()));
            }
        }
        Ok(())
    }

    fn sync_priority(&self) -> i32 {
        // High-value entries go through the dedicated priority pass.
        if self.amount_cents >= HIGH_VALUE_CENTS {
            5
        } else {
            1
        }
    }
}
