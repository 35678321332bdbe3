//! Store backend trait definition.

use crate::error::StoreResult;

/// A durable local store for LedgerSync.
///
/// Backends are **opaque byte stores** organized into named tables. They
/// do not interpret row contents - the outbox and entity services own all
/// serialization.
///
/// # Invariants
///
/// - `scan` returns rows in insertion order (first `put` of a key wins for
///   ordering; overwriting a key keeps its original position)
/// - `apply` commits a [`WriteBatch`] atomically: either every write in the
///   batch becomes visible, or none does
/// - Backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - for tests and ephemeral databases
pub trait StoreBackend: Send + Sync {
    /// Writes a row, creating or replacing it.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying write fails.
    fn put(&self, table: &str, key: &str, value: Vec<u8>) -> StoreResult<()>;

    /// Reads a row, returning `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying read fails.
    fn get(&self, table: &str, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Removes a row, returning `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying write fails.
    fn remove(&self, table: &str, key: &str) -> StoreResult<bool>;

    /// Returns all rows of a table in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying read fails.
    fn scan(&self, table: &str) -> StoreResult<Vec<(String, Vec<u8>)>>;

    /// Returns the number of rows in a table.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying read fails.
    fn count(&self, table: &str) -> StoreResult<u64>;

    /// Applies a batch of writes atomically.
    ///
    /// Either all writes in the batch take effect or none do. This is the
    /// mechanism that keeps a record mutation and its outbox entry from
    /// drifting apart.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch cannot be committed. On error no
    /// write in the batch is visible.
    fn apply(&self, batch: WriteBatch) -> StoreResult<()>;
}

/// A single write inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Create or replace a row.
    Put {
        /// Target table.
        table: String,
        /// Row key.
        key: String,
        /// Row contents.
        value: Vec<u8>,
    },
    /// Remove a row if present.
    Remove {
        /// Target table.
        table: String,
        /// Row key.
        key: String,
    },
}

/// An atomic group of writes across tables.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a put to the batch.
    pub fn put(&mut self, table: &str, key: &str, value: Vec<u8>) -> &mut Self {
        self.ops.push(BatchOp::Put {
            table: table.to_string(),
            key: key.to_string(),
            value,
        });
        self
    }

    /// Adds a remove to the batch.
    pub fn remove(&mut self, table: &str, key: &str) -> &mut Self {
        self.ops.push(BatchOp::Remove {
            table: table.to_string(),
            key: key.to_string(),
        });
        self
    }

    /// Returns the writes in the batch, in order.
    #[must_use]
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    /// Returns the number of writes in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if the batch contains no writes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Consumes the batch, returning its writes.
    #[must_use]
    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_preserves_order() {
        let mut batch = WriteBatch::new();
        batch.put("a", "1", vec![1]).remove("b", "2").put("c", "3", vec![3]);

        assert_eq!(batch.len(), 3);
        assert!(matches!(batch.ops()[0], BatchOp::Put { .. }));
        assert!(matches!(batch.ops()[1], BatchOp::Remove { .. }));
        assert!(matches!(batch.ops()[2], BatchOp::Put { .. }));
    }

    #[test]
    fn empty_batch() {
        let batch = WriteBatch::new();
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
    }
}
