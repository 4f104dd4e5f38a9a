//! The `Dialect` port (spec.md §6): dialect-specific SQL fragments,
//! identifier escaping, and lock-hint placement, consumed by both the
//! template renderer (C3) and the execution engine (C6).

use crate::Value;

/// Where a lock hint is rendered relative to the statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockPlacement {
    /// Appended after the statement, e.g. `... FOR UPDATE`.
    Trailing,
    /// Rendered as a per-table hint immediately after the table reference.
    TableHint,
}

/// A rendered lock clause and where it belongs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockClause {
    pub sql: String,
    pub placement: LockPlacement,
}

/// Pluggable strategy for dialect-specific SQL fragments (spec.md §6).
/// Dialect-specific concerns are explicitly out of the composer's core
/// (spec.md §1); implementations live in backend crates such as
/// `storm-postgres`.
pub trait Dialect: Send + Sync {
    /// Whether `DELETE FROM t AS alias ...` is supported; if not, the query
    /// builder must avoid emitting a delete alias.
    fn supports_delete_alias(&self) -> bool;

    /// Whether the dialect has a native multi-column tuple `IN` syntax
    /// (`(a, b) IN ((1, 2), (3, 4))`); if not, the query builder falls back
    /// to OR-of-AND (spec.md §4.4).
    fn supports_multi_value_tuples(&self) -> bool;

    /// Escape a bare identifier for safe inclusion in SQL text.
    fn escape(&self, ident: &str) -> String;

    /// `LIMIT n` fragment.
    fn limit(&self, n: u64) -> String;

    /// `LIMIT n OFFSET m` fragment.
    fn limit_offset(&self, n: u64, offset: u64) -> String;

    /// Render the native multi-value tuple `IN` fragment for `columns`
    /// column names and `row_count` rows of bound placeholders. Only called
    /// when [`Dialect::supports_multi_value_tuples`] is true.
    fn multi_value_in(&self, columns: &[String], row_count: usize) -> String;

    /// `FOR SHARE`-equivalent lock hint, if supported.
    fn for_share(&self) -> Option<LockClause>;

    /// `FOR UPDATE`-equivalent lock hint, if supported.
    fn for_update(&self) -> Option<LockClause>;

    /// Emit a native upsert statement for `table`, inserting `columns` and
    /// resolving conflicts on `conflict_columns`, or `None` if the dialect
    /// has no SQL-level upsert (spec.md §4.5's upsert routing falls back to
    /// INSERT/UPDATE when this returns `None`).
    fn upsert(&self, table: &str, columns: &[String], conflict_columns: &[String]) -> Option<String>;

    /// Normalise a temporal [`Value`] to the representation this dialect's
    /// driver expects on the wire (spec.md §4.6's binding pipeline step
    /// between `converter.toDatabase` and the driver bind).
    fn normalize_temporal(&self, value: Value) -> Value {
        value
    }
}
