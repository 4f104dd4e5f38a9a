//! The scope handle passed into a transaction body (spec.md §4.7).

use std::sync::Arc;

use storm_core::{Connection, Value};
use storm_write::ObservationRecord;

use crate::manager::TransactionManager;

/// Handle to the currently active transaction frame, passed into the
/// closure given to [`TransactionManager::with_transaction`]. Does not
/// outlive the scope it was issued for.
pub struct TxHandle<'a> {
    pub(crate) manager: &'a TransactionManager,
}

impl<'a> TxHandle<'a> {
    /// The connection backing the current frame.
    pub fn connection(&self) -> Arc<dyn Connection> {
        self.manager.with_top(|frame| frame.connection.clone())
    }

    /// Mark the current scope rollback-only. Propagates to the nearest
    /// owning frame, stopping at a savepoint boundary or a `REQUIRES_NEW`
    /// root (spec.md §4.7).
    pub fn mark_rollback_only(&self) {
        self.manager.mark_rollback_only();
    }

    pub fn is_rollback_only(&self) -> bool {
        self.manager.with_top(|frame| frame.rollback_only)
    }

    /// Record an observation snapshot for later dirty-check comparison.
    pub fn observe(&self, record: ObservationRecord) {
        self.manager.with_top_mut(|frame| frame.observe(record));
    }

    /// Retrieve a previously observed snapshot, if any, for `(type_name,
    /// pk)` within the current frame.
    pub fn observation(&self, type_name: &'static str, pk: &[Value]) -> Option<ObservationRecord> {
        self.manager.with_top(|frame| frame.observation(type_name, pk).cloned())
    }
}
