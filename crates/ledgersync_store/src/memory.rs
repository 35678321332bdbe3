//! In-memory store backend for testing.

use crate::backend::{BatchOp, StoreBackend, WriteBatch};
use crate::error::StoreResult;
use parking_lot::RwLock;
use std::collections::HashMap;

/// A row with its insertion sequence number.
#[derive(Debug, Clone)]
struct Row {
    seq: u64,
    value: Vec<u8>,
}

/// An in-memory store backend.
///
/// Suitable for unit tests, integration tests, and ephemeral databases
/// that do not need persistence. Rows keep their original insertion
/// position across overwrites, which gives the outbox its FIFO-within-tier
/// ordering for free.
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads behind an
/// `Arc`.
///
/// # Example
///
/// ```rust
/// use ledgersync_store::{InMemoryStore, StoreBackend};
///
/// let store = InMemoryStore::new();
/// store.put("transactions", "tx-1", vec![1, 2, 3]).unwrap();
/// assert_eq!(store.get("transactions", "tx-1").unwrap(), Some(vec![1, 2, 3]));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<HashMap<String, HashMap<String, Row>>>,
    next_seq: RwLock<u64>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn bump_seq(&self) -> u64 {
        let mut seq = self.next_seq.write();
        *seq += 1;
        *seq
    }

    fn apply_op(
        tables: &mut HashMap<String, HashMap<String, Row>>,
        op: BatchOp,
        seq: u64,
    ) {
        match op {
            BatchOp::Put { table, key, value } => {
                let rows = tables.entry(table).or_default();
                match rows.get_mut(&key) {
                    // Overwrites keep the original insertion position.
                    Some(row) => row.value = value,
                    None => {
                        rows.insert(key, Row { seq, value });
                    }
                }
            }
            BatchOp::Remove { table, key } => {
                if let Some(rows) = tables.get_mut(&table) {
                    rows.remove(&key);
                }
            }
        }
    }
}

impl StoreBackend for InMemoryStore {
    fn put(&self, table: &str, key: &str, value: Vec<u8>) -> StoreResult<()> {
        let seq = self.bump_seq();
        let mut tables = self.tables.write();
        Self::apply_op(
            &mut tables,
            BatchOp::Put {
                table: table.to_string(),
                key: key.to_string(),
                value,
            },
            seq,
        );
        Ok(())
    }

    fn get(&self, table: &str, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let tables = self.tables.read();
        Ok(tables
            .get(table)
            .and_then(|rows| rows.get(key))
            .map(|row| row.value.clone()))
    }

    fn remove(&self, table: &str, key: &str) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        Ok(tables
            .get_mut(table)
            .map(|rows| rows.remove(key).is_some())
            .unwrap_or(false))
    }

    fn scan(&self, table: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
        let tables = self.tables.read();
        let mut rows: Vec<(&String, &Row)> = tables
            .get(table)
            .map(|rows| rows.iter().collect())
            .unwrap_or_default();
        rows.sort_by_key(|(_, row)| row.seq);
        Ok(rows
            .into_iter()
            .map(|(key, row)| (key.clone(), row.value.clone()))
            .collect())
    }

    fn count(&self, table: &str) -> StoreResult<u64> {
        let tables = self.tables.read();
        Ok(tables.get(table).map(|rows| rows.len() as u64).unwrap_or(0))
    }

    fn apply(&self, batch: WriteBatch) -> StoreResult<()> {
        // Single lock acquisition makes the whole batch atomic.
        let mut tables = self.tables.write();
        for op in batch.into_ops() {
            let seq = {
                let mut seq = self.next_seq.write();
                *seq += 1;
                *seq
            };
            Self::apply_op(&mut tables, op, seq);
        }
        Ok(())
    }
}
