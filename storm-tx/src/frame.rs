//! A single entry on the transaction scope stack (spec.md §4.7).

use std::sync::Arc;
use std::time::Duration;

use storm_core::{Connection, IsolationLevel, Savepoint, Value};
use storm_write::ObservationRecord;

use crate::propagation::Propagation;

/// One transaction frame (spec.md §4.7's `{propagation, isolation, timeout,
/// readOnly, connection, ownsConnection, savepoint, rollbackOnly,
/// rollbackInherited, timedOut}`).
pub struct Frame {
    pub propagation: Propagation,
    pub isolation: Option<IsolationLevel>,
    pub timeout: Option<Duration>,
    pub read_only: bool,
    pub connection: Arc<dyn Connection>,
    /// Whether this frame opened `connection` itself (root of a new physical
    /// transaction) as opposed to reusing an outer frame's connection.
    pub owns_connection: bool,
    /// Set only for `NESTED` frames; identifies the savepoint to roll back
    /// to if this frame alone is marked rollback-only.
    pub savepoint: Option<Savepoint>,
    pub rollback_only: bool,
    pub rollback_inherited: bool,
    pub timed_out: bool,
    /// Observation snapshots keyed by `(type_name, pk)` (spec.md §5).
    /// Suppressed entirely at `READ_UNCOMMITTED` by never inserting here.
    /// `Value` carries an `f64` variant and so isn't `Hash`/`Eq`; a plain
    /// `Vec` with linear lookup stands in for a hash map, which is fine at
    /// the handful of entries a single scope typically observes.
    pub observations: Vec<((&'static str, Vec<Value>), ObservationRecord)>,
}

impl Frame {
    pub fn root(connection: Arc<dyn Connection>, propagation: Propagation, isolation: Option<IsolationLevel>, timeout: Option<Duration>, read_only: bool) -> Self {
        Self {
            propagation,
            isolation,
            timeout,
            read_only,
            connection,
            owns_connection: true,
            savepoint: None,
            rollback_only: false,
            rollback_inherited: false,
            timed_out: false,
            observations: Vec::new(),
        }
    }

    pub fn joined(connection: Arc<dyn Connection>, propagation: Propagation) -> Self {
        Self {
            propagation,
            isolation: None,
            timeout: None,
            read_only: false,
            connection,
            owns_connection: false,
            savepoint: None,
            rollback_only: false,
            rollback_inherited: false,
            timed_out: false,
            observations: Vec::new(),
        }
    }

    pub fn savepoint(connection: Arc<dyn Connection>, savepoint: Savepoint) -> Self {
        Self {
            propagation: Propagation::Nested,
            isolation: None,
            timeout: None,
            read_only: false,
            connection,
            owns_connection: false,
            savepoint: Some(savepoint),
            rollback_only: false,
            rollback_inherited: false,
            timed_out: false,
            observations: Vec::new(),
        }
    }

    /// Whether this frame is a boundary that stops rollback-only propagation
    /// from reaching further outward (spec.md §4.7: "not across savepoint
    /// boundaries or REQUIRES_NEW").
    pub fn is_rollback_boundary(&self) -> bool {
        self.owns_connection || self.savepoint.is_some()
    }

    /// Record an observation snapshot, suppressed entirely at
    /// `READ_UNCOMMITTED` (spec.md §5: "dirty state cannot be trusted").
    pub fn observe(&mut self, record: ObservationRecord) {
        if self.isolation == Some(IsolationLevel::ReadUncommitted) {
            return;
        }
        let key = (record.type_name, record.pk.clone());
        match self.observations.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = record,
            None => self.observations.push((key, record)),
        }
    }

    /// Look up a previously observed snapshot for `(type_name, pk)`.
    pub fn observation(&self, type_name: &'static str, pk: &[Value]) -> Option<&ObservationRecord> {
        self.observations
            .iter()
            .find(|((t, p), _)| *t == type_name && p == pk)
            .map(|(_, record)| record)
    }
}
