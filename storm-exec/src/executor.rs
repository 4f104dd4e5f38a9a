//! The execution engine (C6, spec.md §4.6): runs prepared statements
//! against a [`Connection`], turning bound arguments into row counts, rows,
//! or generated keys.

use std::future::Future;
use std::sync::Arc;

use storm_core::{Connection, Dialect, ExecError, Row, RowCursor, StormResult, UpdateCount, Value};

use crate::binder::normalize_args;

/// Executes statements against a `Connection` (C6). Stateless beyond its
/// `Dialect` and batch chunk size; share one instance across every
/// repository operation in a process.
pub struct Executor {
    dialect: Arc<dyn Dialect>,
    batch_size: usize,
}

impl Executor {
    pub fn new(dialect: Arc<dyn Dialect>, batch_size: usize) -> Self {
        Self { dialect, batch_size: batch_size.max(1) }
    }

    async fn prepare_and_bind(&self, conn: &dyn Connection, sql: &str, args: Vec<Value>) -> StormResult<Box<dyn storm_core::Statement>> {
        let mut stmt = conn.prepare(sql).await?;
        for (index, value) in normalize_args(&*self.dialect, args).into_iter().enumerate() {
            stmt.bind(index, &value, None).await?;
        }
        Ok(stmt)
    }

    /// `execute(query) -> UpdateCount` (spec.md §4.6).
    pub async fn execute(&self, conn: &dyn Connection, sql: &str, args: Vec<Value>) -> StormResult<UpdateCount> {
        let mut stmt = self.prepare_and_bind(conn, sql, args).await?;
        let count = stmt.execute_update().await?;
        stmt.close().await?;
        Ok(count)
    }

    /// As [`Executor::execute`], but a zero row count is reported as
    /// `OptimisticLock` instead of success (spec.md §4.6: "fails with
    /// `OptimisticLock` if version-aware and row-count is 0").
    pub async fn execute_versioned(&self, conn: &dyn Connection, sql: &str, args: Vec<Value>) -> StormResult<UpdateCount> {
        let count = self.execute(conn, sql, args).await?;
        if count == 0 {
            return Err(ExecError::OptimisticLock.into());
        }
        Ok(count)
    }

    /// `stream(query) -> LazyFiniteSequence<Row>` (spec.md §4.6): a
    /// pull-based cursor, left open until the caller exhausts or drops it.
    /// Prefer [`Executor::with_cursor`] unless the caller genuinely needs
    /// to hold the cursor open across other work.
    pub async fn stream(&self, conn: &dyn Connection, sql: &str, args: Vec<Value>) -> StormResult<Box<dyn RowCursor>> {
        let mut stmt = self.prepare_and_bind(conn, sql, args).await?;
        stmt.execute_query().await
    }

    /// Run `f` against an open cursor, closing it on every exit path,
    /// including an error from `f` (spec.md §4.6: "wrapping the stream in a
    /// scoped acquisition releases it deterministically on all exit
    /// paths").
    pub async fn with_cursor<T, F, Fut>(&self, conn: &dyn Connection, sql: &str, args: Vec<Value>, f: F) -> StormResult<T>
    where
        F: FnOnce(&mut dyn RowCursor) -> Fut,
        Fut: Future<Output = StormResult<T>>,
    {
        let mut cursor = self.stream(conn, sql, args).await?;
        let result = f(&mut *cursor).await;
        let close_result = cursor.close().await;
        match (result, close_result) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(close_err)) => Err(close_err),
            (Err(body_err), _) => Err(body_err),
        }
    }

    /// Eagerly drain a query into a `Vec<Row>`.
    pub async fn query(&self, conn: &dyn Connection, sql: &str, args: Vec<Value>) -> StormResult<Vec<Row>> {
        self.with_cursor(conn, sql, args, |cursor| async move {
            let mut rows = Vec::new();
            while let Some(row) = cursor.next().await? {
                rows.push(row);
            }
            Ok(rows)
        })
        .await
    }

    /// `getSingleResult` (spec.md §4.6): `NoResult` on empty, `NonUniqueResult`
    /// on more than one row.
    pub async fn single(&self, conn: &dyn Connection, sql: &str, args: Vec<Value>) -> StormResult<Row> {
        let mut rows = self.query(conn, sql, args).await?;
        match rows.len() {
            0 => Err(ExecError::NoResult.into()),
            1 => Ok(rows.remove(0)),
            count => Err(ExecError::NonUniqueResult { count }.into()),
        }
    }

    /// `batch(preparedQuery, records)` (spec.md §4.6): binds each row's
    /// arguments to the statement batch and executes in chunks of the
    /// configured batch size, concatenating row counts in submission order.
    /// `versioned` mirrors [`Executor::execute_versioned`]'s zero-count
    /// check, applied per entry across the whole batch.
    pub async fn batch(&self, conn: &dyn Connection, sql: &str, rows: Vec<Vec<Value>>, versioned: bool) -> StormResult<Vec<UpdateCount>> {
        let mut counts = Vec::with_capacity(rows.len());
        for chunk in rows.chunks(self.batch_size) {
            let mut stmt = conn.prepare(sql).await?;
            for args in chunk {
                for (index, value) in normalize_args(&*self.dialect, args.clone()).into_iter().enumerate() {
                    stmt.bind(index, &value, None).await?;
                }
                stmt.add_batch().await?;
            }
            let chunk_counts = stmt.execute_batch().await?;
            stmt.close().await?;
            if versioned && chunk_counts.iter().any(|&count| count == 0) {
                return Err(ExecError::OptimisticLock.into());
            }
            counts.extend(chunk_counts);
        }
        Ok(counts)
    }

    /// Insert capturing server-generated keys (spec.md §4.6: "on INSERT
    /// with IDENTITY PK, driver-side returning interface populates the PK
    /// column"); one row of generated columns per submitted insert, in
    /// submission order.
    pub async fn insert_returning_keys(&self, conn: &dyn Connection, sql: &str, args: Vec<Value>) -> StormResult<Vec<Row>> {
        let mut stmt = self.prepare_and_bind(conn, sql, args).await?;
        stmt.execute_update().await?;
        let keys = stmt.generated_keys().await?;
        stmt.close().await?;
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use storm_core::{LockClause, Savepoint, Statement};

    struct FixedDialect;

    impl Dialect for FixedDialect {
        fn supports_delete_alias(&self) -> bool {
            true
        }
        fn supports_multi_value_tuples(&self) -> bool {
            true
        }
        fn escape(&self, ident: &str) -> String {
            format!("\"{ident}\"")
        }
        fn limit(&self, n: u64) -> String {
            format!("LIMIT {n}")
        }
        fn limit_offset(&self, n: u64, offset: u64) -> String {
            format!("LIMIT {n} OFFSET {offset}")
        }
        fn multi_value_in(&self, _columns: &[String], _row_count: usize) -> String {
            String::new()
        }
        fn for_share(&self) -> Option<LockClause> {
            None
        }
        fn for_update(&self) -> Option<LockClause> {
            None
        }
        fn upsert(&self, _table: &str, _columns: &[String], _conflict_columns: &[String]) -> Option<String> {
            None
        }
    }

    /// A statement that plays back a scripted response, recording every
    /// bound value for the test to assert on.
    struct ScriptedStatement {
        bound: Vec<Value>,
        batch_entries: Vec<Vec<Value>>,
        update_count: UpdateCount,
        batch_counts: Vec<UpdateCount>,
        rows: Vec<Row>,
        generated: Vec<Row>,
    }

    #[async_trait]
    impl Statement for ScriptedStatement {
        async fn bind(&mut self, index: usize, value: &Value, _type_hint: Option<&str>) -> StormResult<()> {
            if index == self.bound.len() {
                self.bound.push(value.clone());
            } else {
                self.bound[index] = value.clone();
            }
            Ok(())
        }
        async fn execute_query(&mut self) -> StormResult<Box<dyn RowCursor>> {
            Ok(Box::new(VecCursor { rows: self.rows.clone().into_iter() }))
        }
        async fn execute_update(&mut self) -> StormResult<UpdateCount> {
            Ok(self.update_count)
        }
        async fn add_batch(&mut self) -> StormResult<()> {
            self.batch_entries.push(std::mem::take(&mut self.bound));
            Ok(())
        }
        async fn execute_batch(&mut self) -> StormResult<Vec<UpdateCount>> {
            Ok(self.batch_counts.clone())
        }
        async fn generated_keys(&mut self) -> StormResult<Vec<Row>> {
            Ok(self.generated.clone())
        }
        async fn set_query_timeout(&mut self, _timeout: std::time::Duration) -> StormResult<()> {
            Ok(())
        }
        async fn close(&mut self) -> StormResult<()> {
            Ok(())
        }
    }

    struct VecCursor {
        rows: std::vec::IntoIter<Row>,
    }

    #[async_trait]
    impl RowCursor for VecCursor {
        async fn next(&mut self) -> StormResult<Option<Row>> {
            Ok(self.rows.next())
        }
        async fn close(&mut self) -> StormResult<()> {
            Ok(())
        }
    }

    struct ScriptedConnection {
        statement: Mutex<Option<ScriptedStatement>>,
    }

    #[async_trait]
    impl Connection for ScriptedConnection {
        async fn prepare(&self, _sql: &str) -> StormResult<Box<dyn Statement>> {
            let stmt = self.statement.lock().unwrap().take().expect("statement already taken");
            Ok(Box::new(stmt))
        }
        async fn set_auto_commit(&self, _auto_commit: bool) -> StormResult<()> {
            Ok(())
        }
        async fn commit(&self) -> StormResult<()> {
            Ok(())
        }
        async fn rollback(&self) -> StormResult<()> {
            Ok(())
        }
        async fn set_savepoint(&self) -> StormResult<Savepoint> {
            unimplemented!()
        }
        async fn release_savepoint(&self, _savepoint: &Savepoint) -> StormResult<()> {
            unimplemented!()
        }
        async fn rollback_to_savepoint(&self, _savepoint: &Savepoint) -> StormResult<()> {
            unimplemented!()
        }
        async fn set_transaction_isolation(&self, _level: storm_core::IsolationLevel) -> StormResult<()> {
            Ok(())
        }
        async fn set_read_only(&self, _read_only: bool) -> StormResult<()> {
            Ok(())
        }
        async fn close(&self) -> StormResult<()> {
            Ok(())
        }
    }

    fn scripted(update_count: UpdateCount, rows: Vec<Row>, batch_counts: Vec<UpdateCount>, generated: Vec<Row>) -> ScriptedConnection {
        ScriptedConnection {
            statement: Mutex::new(Some(ScriptedStatement {
                bound: Vec::new(),
                batch_entries: Vec::new(),
                update_count,
                batch_counts,
                rows,
                generated,
            })),
        }
    }

    #[tokio::test]
    async fn execute_returns_the_driver_row_count() {
        let executor = Executor::new(Arc::new(FixedDialect), 32);
        let conn = scripted(1, vec![], vec![], vec![]);
        let count = executor.execute(&conn, "UPDATE pet SET name = ?", vec![Value::Text("Rex".into())]).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn execute_versioned_zero_rows_is_optimistic_lock() {
        let executor = Executor::new(Arc::new(FixedDialect), 32);
        let conn = scripted(0, vec![], vec![], vec![]);
        let result = executor.execute_versioned(&conn, "UPDATE pet SET name = ? WHERE version = ?", vec![]).await;
        assert!(matches!(result, Err(storm_core::StormError::Exec(ExecError::OptimisticLock))));
    }

    #[tokio::test]
    async fn single_fails_on_empty_and_on_multiple_rows() {
        let executor = Executor::new(Arc::new(FixedDialect), 32);

        let conn = scripted(0, vec![], vec![], vec![]);
        let result = executor.single(&conn, "SELECT 1", vec![]).await;
        assert!(matches!(result, Err(storm_core::StormError::Exec(ExecError::NoResult))));

        let conn = scripted(0, vec![Row(vec![Value::I64(1)]), Row(vec![Value::I64(2)])], vec![], vec![]);
        let result = executor.single(&conn, "SELECT 1", vec![]).await;
        assert!(matches!(result, Err(storm_core::StormError::Exec(ExecError::NonUniqueResult { count: 2 }))));
    }

    #[tokio::test]
    async fn single_returns_the_only_row() {
        let executor = Executor::new(Arc::new(FixedDialect), 32);
        let conn = scripted(0, vec![Row(vec![Value::I64(7)])], vec![], vec![]);
        let row = executor.single(&conn, "SELECT 1", vec![]).await.unwrap();
        assert_eq!(row, Row(vec![Value::I64(7)]));
    }

    #[tokio::test]
    async fn batch_versioned_fails_when_any_entry_affects_zero_rows() {
        let executor = Executor::new(Arc::new(FixedDialect), 32);
        let conn = scripted(0, vec![], vec![1, 0, 1], vec![]);
        let rows = vec![vec![Value::I64(1)], vec![Value::I64(2)], vec![Value::I64(3)]];
        let result = executor.batch(&conn, "UPDATE pet SET name = ? WHERE id = ? AND version = ?", rows, true).await;
        assert!(matches!(result, Err(storm_core::StormError::Exec(ExecError::OptimisticLock))));
    }

    #[tokio::test]
    async fn batch_unversioned_concatenates_counts_in_order() {
        let executor = Executor::new(Arc::new(FixedDialect), 32);
        let conn = scripted(0, vec![], vec![1, 1, 1], vec![]);
        let rows = vec![vec![Value::I64(1)], vec![Value::I64(2)], vec![Value::I64(3)]];
        let counts = executor.batch(&conn, "INSERT INTO pet(id) VALUES (?)", rows, false).await.unwrap();
        assert_eq!(counts, vec![1, 1, 1]);
    }

    #[tokio::test]
    async fn insert_returning_keys_surfaces_the_generated_rows() {
        let executor = Executor::new(Arc::new(FixedDialect), 32);
        let conn = scripted(1, vec![], vec![], vec![Row(vec![Value::I64(42)])]);
        let keys = executor
            .insert_returning_keys(&conn, "INSERT INTO pet(name) VALUES (?)", vec![Value::Text("Rex".into())])
            .await
            .unwrap();
        assert_eq!(keys, vec![Row(vec![Value::I64(42)])]);
    }
}
