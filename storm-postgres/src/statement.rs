//! `storm_core::Statement`/`RowCursor` over a prepared `tokio_postgres::Statement`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::Object;
use tokio_postgres::types::ToSql;

use storm_core::{ExecError, Row, RowCursor, Statement, StormResult, UpdateCount, Value};

use crate::value::{value_from_row, PgValue};

/// A prepared statement bound to one pooled `deadpool_postgres::Object`
/// (spec.md §6).
pub struct PgStatement {
    client: Arc<Object>,
    sql: String,
    prepared: tokio_postgres::Statement,
    bound: Vec<Value>,
    batch: Vec<Vec<Value>>,
    generated: Vec<Row>,
}

impl PgStatement {
    pub(crate) fn new(client: Arc<Object>, sql: String, prepared: tokio_postgres::Statement) -> Self {
        Self {
            client,
            sql,
            prepared,
            bound: Vec::new(),
            batch: Vec::new(),
            generated: Vec::new(),
        }
    }

    fn wrap(values: &[Value]) -> Vec<PgValue<'_>> {
        values.iter().map(PgValue).collect()
    }

    fn as_sql_refs(wrapped: &[PgValue<'_>]) -> Vec<&(dyn ToSql + Sync)> {
        wrapped.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
    }

    /// The statement text contains a `RETURNING` clause, meaning affected
    /// rows can be recovered from the same round trip that runs the
    /// statement rather than a second query (spec.md §4.6's generated-key
    /// capture). `tokio_postgres` has no JDBC-style `getGeneratedKeys`, so
    /// this is the pragmatic way to unify `executeUpdate`'s row count with
    /// `generated_keys`'s row set for one submission.
    fn has_returning(&self) -> bool {
        self.sql.to_ascii_uppercase().contains("RETURNING")
    }

    async fn persistence_err<T>(result: Result<T, tokio_postgres::Error>) -> StormResult<T> {
        result.map_err(|e| ExecError::Persistence(e.to_string()).into())
    }
}

#[async_trait]
impl Statement for PgStatement {
    async fn bind(&mut self, index: usize, value: &Value, _type_hint: Option<&str>) -> StormResult<()> {
        if index == self.bound.len() {
            self.bound.push(value.clone());
        } else if index < self.bound.len() {
            self.bound[index] = value.clone();
        } else {
            self.bound.resize(index, Value::Null);
            self.bound.push(value.clone());
        }
        Ok(())
    }

    async fn execute_query(&mut self) -> StormResult<Box<dyn RowCursor>> {
        let wrapped = Self::wrap(&self.bound);
        let params = Self::as_sql_refs(&wrapped);
        let rows = Self::persistence_err(self.client.query(&self.prepared, &params).await).await?;
        let converted = rows
            .iter()
            .map(|r| row_to_storm_row(r))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ExecError::Persistence(e.0))?;
        Ok(Box::new(PgCursor { rows: converted.into() }))
    }

    async fn execute_update(&mut self) -> StormResult<UpdateCount> {
        let wrapped = Self::wrap(&self.bound);
        let params = Self::as_sql_refs(&wrapped);
        if self.has_returning() {
            let rows = Self::persistence_err(self.client.query(&self.prepared, &params).await).await?;
            self.generated = rows
                .iter()
                .map(|r| row_to_storm_row(r))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| ExecError::Persistence(e.0))?;
            Ok(self.generated.len() as UpdateCount)
        } else {
            Self::persistence_err(self.client.execute(&self.prepared, &params).await).await
        }
    }

    async fn add_batch(&mut self) -> StormResult<()> {
        self.batch.push(std::mem::take(&mut self.bound));
        Ok(())
    }

    async fn execute_batch(&mut self) -> StormResult<Vec<UpdateCount>> {
        let mut counts = Vec::with_capacity(self.batch.len());
        for entry in std::mem::take(&mut self.batch) {
            let wrapped = Self::wrap(&entry);
            let params = Self::as_sql_refs(&wrapped);
            let count = Self::persistence_err(self.client.execute(&self.prepared, &params).await).await?;
            counts.push(count);
        }
        Ok(counts)
    }

    async fn generated_keys(&mut self) -> StormResult<Vec<Row>> {
        Ok(std::mem::take(&mut self.generated))
    }

    async fn set_query_timeout(&mut self, timeout: Duration) -> StormResult<()> {
        let millis = timeout.as_millis();
        let sql = format!("SET statement_timeout = {millis}");
        Self::persistence_err(self.client.batch_execute(&sql).await).await
    }

    async fn close(&mut self) -> StormResult<()> {
        Ok(())
    }
}

fn row_to_storm_row(row: &tokio_postgres::Row) -> Result<Row, storm_core::ConvertError> {
    (0..row.len())
        .map(|i| value_from_row(row, i))
        .collect::<Result<Vec<_>, _>>()
        .map(Row)
}

/// A cursor over a result set fetched eagerly in one round trip.
///
/// `tokio_postgres` does expose true server-side portals
/// (`query_portal`/`bind`), but driving them through a trait object adds a
/// second lifetime-bound cursor type this port doesn't need to model; Storm
/// bounds memory use at the `Executor::stream` call site instead (spec.md
/// §4.6), so an eagerly-fetched `Vec<Row>` satisfies `RowCursor`'s contract
/// without a server-side cursor underneath it.
pub struct PgCursor {
    rows: VecDeque<Row>,
}

#[async_trait]
impl RowCursor for PgCursor {
    async fn next(&mut self) -> StormResult<Option<Row>> {
        Ok(self.rows.pop_front())
    }

    async fn close(&mut self) -> StormResult<()> {
        self.rows.clear();
        Ok(())
    }
}
