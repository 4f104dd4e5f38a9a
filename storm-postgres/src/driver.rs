//! `storm_core::Driver`/`Connection` over a `deadpool_postgres::Pool`
//! (spec.md §6): the concrete client wrapping the pool, handing out one
//! `Connection` per checked-out `deadpool_postgres::Object`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use deadpool_postgres::{Object, Pool};

use storm_core::{Connection, Driver, ExecError, IsolationLevel, Savepoint, Statement, StormResult};

use crate::placeholder::rewrite_to_dollar;
use crate::statement::PgStatement;

/// The `Driver` port backed by a Postgres connection pool.
#[derive(Clone)]
pub struct PgDriver {
    pool: Pool,
}

impl PgDriver {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn from_config(config: &crate::PgConfig) -> StormResult<Self> {
        Ok(Self::new(config.create_pool()?))
    }

    /// Current pool occupancy, for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }
}

#[async_trait]
impl Driver for PgDriver {
    async fn open_connection(&self) -> StormResult<Box<dyn Connection>> {
        let object = self
            .pool
            .get()
            .await
            .map_err(|e| ExecError::Persistence(format!("failed to check out a connection: {e}")))?;
        Ok(Box::new(PgConnection {
            client: Arc::new(object),
            savepoint_seq: AtomicU64::new(0),
        }))
    }
}

/// A single pooled connection, owned by at most one transaction frame at a
/// time (spec.md §5).
pub struct PgConnection {
    client: Arc<Object>,
    savepoint_seq: AtomicU64,
}

impl PgConnection {
    async fn run(&self, sql: &str) -> StormResult<()> {
        self.client
            .batch_execute(sql)
            .await
            .map_err(|e| ExecError::Persistence(e.to_string()).into())
    }
}

#[async_trait]
impl Connection for PgConnection {
    async fn prepare(&self, sql: &str) -> StormResult<Box<dyn Statement>> {
        let rewritten = rewrite_to_dollar(sql);
        let prepared = self
            .client
            .prepare(&rewritten)
            .await
            .map_err(|e| ExecError::Persistence(format!("prepare failed: {e}")))?;
        Ok(Box::new(PgStatement::new(self.client.clone(), rewritten, prepared)))
    }

    async fn set_auto_commit(&self, auto_commit: bool) -> StormResult<()> {
        if auto_commit {
            // Default client mode: each statement commits itself. Nothing
            // to undo here; a prior transaction has already been
            // committed or rolled back by the time this is called.
            Ok(())
        } else {
            self.run("BEGIN").await
        }
    }

    async fn commit(&self) -> StormResult<()> {
        self.run("COMMIT").await
    }

    async fn rollback(&self) -> StormResult<()> {
        self.run("ROLLBACK").await
    }

    async fn set_savepoint(&self) -> StormResult<Savepoint> {
        let seq = self.savepoint_seq.fetch_add(1, Ordering::SeqCst);
        let name = format!("storm_sp_{seq}");
        self.run(&format!("SAVEPOINT {name}")).await?;
        Ok(Savepoint(name))
    }

    async fn release_savepoint(&self, savepoint: &Savepoint) -> StormResult<()> {
        self.run(&format!("RELEASE SAVEPOINT {}", savepoint.0)).await
    }

    async fn rollback_to_savepoint(&self, savepoint: &Savepoint) -> StormResult<()> {
        self.run(&format!("ROLLBACK TO SAVEPOINT {}", savepoint.0)).await
    }

    async fn set_transaction_isolation(&self, level: IsolationLevel) -> StormResult<()> {
        let clause = match level {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        };
        self.run(&format!("SET TRANSACTION ISOLATION LEVEL {clause}")).await
    }

    async fn set_read_only(&self, read_only: bool) -> StormResult<()> {
        let clause = if read_only { "READ ONLY" } else { "READ WRITE" };
        self.run(&format!("SET TRANSACTION {clause}")).await
    }

    async fn close(&self) -> StormResult<()> {
        // Returning the pooled `Object` to the pool happens on drop;
        // nothing else to release explicitly.
        Ok(())
    }
}
