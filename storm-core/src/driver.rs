//! The `Driver` port (spec.md §6): the single seam between Storm and a
//! concrete database client library. `storm-exec` (C6) drives statement
//! execution through it; `storm-tx` (C7) drives connection and transaction
//! lifecycle through it. Backend crates such as `storm-postgres` provide the
//! concrete implementation.
//!
//! Every call here is a suspension point (spec.md §5): implementations are
//! async so that both the blocking and cooperative transaction
//! representations can drive the same trait object.

use async_trait::async_trait;

use crate::error::StormResult;
use crate::value::Value;

/// Transaction isolation levels a [`Connection`] can be asked to run at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

/// A single row pulled from an open [`RowCursor`], columns in select order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row(pub Vec<Value>);

impl Row {
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }
}

/// The number of rows an `executeUpdate`/batch entry affected.
pub type UpdateCount = u64;

/// A server-side savepoint handle, opaque to everything above the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Savepoint(pub String);

/// A row cursor left open by [`Statement::execute_query`] (spec.md §4.6's
/// `stream`). Pulled one row at a time so a caller can bound memory use on
/// a large result set; dropping it without exhausting it must still release
/// the underlying server-side cursor.
#[async_trait]
pub trait RowCursor: Send {
    /// Fetch the next row, or `None` once exhausted.
    async fn next(&mut self) -> StormResult<Option<Row>>;

    /// Release the cursor before it is exhausted (spec.md §5: "cancelling a
    /// stream closes its cursor ... deterministically").
    async fn close(&mut self) -> StormResult<()>;
}

/// A prepared statement bound to one [`Connection`] (spec.md §6).
#[async_trait]
pub trait Statement: Send {
    /// Bind `value` at the given zero-based parameter index. `type_hint`, if
    /// present, is a dialect-specific type tag used to bind typed `NULL`s
    /// (spec.md §4.6: "Nulls are bound as typed NULLs when the column type
    /// is known").
    async fn bind(&mut self, index: usize, value: &Value, type_hint: Option<&str>) -> StormResult<()>;

    /// Execute as a query, returning an open cursor.
    async fn execute_query(&mut self) -> StormResult<Box<dyn RowCursor>>;

    /// Execute as a DML statement, returning the affected row count.
    async fn execute_update(&mut self) -> StormResult<UpdateCount>;

    /// Add the current binding as one entry of a batch; does not execute.
    async fn add_batch(&mut self) -> StormResult<()>;

    /// Execute the accumulated batch, one row count per entry in submission
    /// order (spec.md §4.6's `batch`).
    async fn execute_batch(&mut self) -> StormResult<Vec<UpdateCount>>;

    /// Rows generated by the server for an INSERT against an IDENTITY PK
    /// (spec.md §4.6's generated-key capture), one row per submitted insert
    /// in submission order.
    async fn generated_keys(&mut self) -> StormResult<Vec<Row>>;

    /// Per-statement execution timeout (spec.md §4.7's "per-statement
    /// query-timeout is also applied through the driver").
    async fn set_query_timeout(&mut self, timeout: std::time::Duration) -> StormResult<()>;

    /// Release the statement and any resources it still holds.
    async fn close(&mut self) -> StormResult<()>;
}

/// A single physical connection, owned by at most one transaction frame at
/// a time (spec.md §5: "connections are never shared across frames
/// concurrently").
#[async_trait]
pub trait Connection: Send + Sync {
    async fn prepare(&self, sql: &str) -> StormResult<Box<dyn Statement>>;

    async fn set_auto_commit(&self, auto_commit: bool) -> StormResult<()>;
    async fn commit(&self) -> StormResult<()>;
    async fn rollback(&self) -> StormResult<()>;

    async fn set_savepoint(&self) -> StormResult<Savepoint>;
    async fn release_savepoint(&self, savepoint: &Savepoint) -> StormResult<()>;
    async fn rollback_to_savepoint(&self, savepoint: &Savepoint) -> StormResult<()>;

    async fn set_transaction_isolation(&self, level: IsolationLevel) -> StormResult<()>;
    async fn set_read_only(&self, read_only: bool) -> StormResult<()>;

    async fn close(&self) -> StormResult<()>;
}

/// The top-level driver port: opens connections against a configured
/// backend. One implementation per backend crate (e.g. `storm-postgres`).
#[async_trait]
pub trait Driver: Send + Sync {
    async fn open_connection(&self) -> StormResult<Box<dyn Connection>>;
}
