//! Table handler registry.

use crate::remote::RemoteApplier;
use ledgersync_records::StatusSink;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// The handlers for one entity table: the remote boundary and the entity
/// service's status callback.
#[derive(Clone)]
pub struct TableHandlers {
    /// Applies operations against the remote system.
    pub remote: Arc<dyn RemoteApplier>,
    /// Receives record status transitions from the engine.
    pub sink: Arc<dyn StatusSink>,
}

/// Maps table names to their handlers.
///
/// New entity types plug in by registering here; the engine's batch loop
/// never needs to change. An operation for an unregistered table is a
/// permanent failure.
#[derive(Default)]
pub struct TableRegistry {
    tables: RwLock<HashMap<String, TableHandlers>>,
}

impl TableRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the handlers for a table.
    pub fn register(
        &self,
        table: impl Into<String>,
        remote: Arc<dyn RemoteApplier>,
        sink: Arc<dyn StatusSink>,
    ) {
        self.tables
            .write()
            .insert(table.into(), TableHandlers { remote, sink });
    }

    /// Returns the handlers for a table, if registered.
    pub fn get(&self, table: &str) -> Option<TableHandlers> {
        self.tables.read().get(table).cloned()
    }

    /// Returns the registered table names.
    pub fn tables(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MockRemote;
    use ledgersync_records::ServiceResult;

    struct NullSink;

    impl StatusSink for NullSink {
        fn mark_synced(&self, _: &str, _: Option<&str>) -> ServiceResult<()> {
            Ok(())
        }
        fn mark_error(&self, _: &str, _: &str) -> ServiceResult<()> {
            Ok(())
        }
        fn mark_conflict(&self, _: &str) -> ServiceResult<()> {
            Ok(())
        }
    }

    #[test]
    fn register_and_lookup() {
        let registry = TableRegistry::new();
        assert!(registry.get("transactions").is_none());

        registry.register(
            "transactions",
            Arc::new(MockRemote::new()),
            Arc::new(NullSink),
        );

        assert!(registry.get("transactions").is_some());
        assert!(registry.get("merchants").is_none());
        assert_eq!(registry.tables(), vec!["transactions".to_string()]);
    }
}
