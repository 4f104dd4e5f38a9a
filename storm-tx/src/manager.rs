//! The transaction manager (C7, spec.md §4.7): a scope stack per execution
//! context, propagation-matrix-driven frame management, savepoints, and
//! timeouts.
//!
//! The frame stack is represented two ways depending on [`ExecutionMode`]:
//! a thread-local `Vec<Frame>` for blocking callers (one stack per OS
//! thread), or a `tokio::task_local` `Vec<Frame>` for cooperative callers,
//! so a transaction opened in one poll of a task resumes correctly even if
//! a later poll runs on a different worker thread (spec.md §9's
//! "coroutine-aware transaction state"). Both are driven through the same
//! `TransactionManager` API; callers pick the representation once, at
//! construction.

use std::cell::RefCell;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use storm_core::{Connection, Driver, ExecError, IsolationLevel, StormError, StormResult, TxError};
use storm_write::ObservationRecord;

use crate::frame::Frame;
use crate::handle::TxHandle;
use crate::propagation::{decide, Action, Propagation};

thread_local! {
    static BLOCKING_STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

tokio::task_local! {
    static COOPERATIVE_STACK: RefCell<Vec<Frame>>;
}

/// Which scope-stack representation a [`TransactionManager`] uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One stack per OS thread (spec.md §5: "the blocking API uses
    /// parallel threads with one connection per active transaction
    /// frame").
    Blocking,
    /// One stack per cooperative task, propagated across `.await` points
    /// regardless of which worker thread resumes the task.
    Cooperative,
}

/// Settings a scope opens with, beyond what the propagation decides.
#[derive(Debug, Clone, Copy, Default)]
pub struct TxSettings {
    pub isolation: Option<IsolationLevel>,
    pub timeout: Option<Duration>,
    pub read_only: bool,
}

/// Drives the transaction scope stack for one execution context
/// (spec.md §4.7).
pub struct TransactionManager {
    driver: Arc<dyn Driver>,
    mode: ExecutionMode,
}

impl TransactionManager {
    pub fn blocking(driver: Arc<dyn Driver>) -> Self {
        Self { driver, mode: ExecutionMode::Blocking }
    }

    pub fn cooperative(driver: Arc<dyn Driver>) -> Self {
        Self { driver, mode: ExecutionMode::Cooperative }
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Cooperative mode only: establishes the task-local scope stack for
    /// the lifetime of `fut`. Every transaction `fut` opens shares this
    /// stack, even across suspension and resumption on a different worker
    /// thread. Call once at the entry point of a cooperative task; nesting
    /// is not meaningful (a freshly scoped stack has no outer frame).
    pub async fn run_cooperative<F: Future>(&self, fut: F) -> F::Output {
        debug_assert_eq!(self.mode, ExecutionMode::Cooperative, "run_cooperative used on a blocking manager");
        COOPERATIVE_STACK.scope(RefCell::new(Vec::new()), fut).await
    }

    fn with_stack<R>(&self, f: impl FnOnce(&mut Vec<Frame>) -> R) -> R {
        match self.mode {
            ExecutionMode::Blocking => BLOCKING_STACK.with(|stack| f(&mut stack.borrow_mut())),
            ExecutionMode::Cooperative => COOPERATIVE_STACK.with(|stack| f(&mut stack.borrow_mut())),
        }
    }

    pub(crate) fn with_top<R>(&self, f: impl FnOnce(&Frame) -> R) -> R {
        self.with_stack(|stack| f(stack.last().expect("no active transaction frame")))
    }

    pub(crate) fn with_top_mut<R>(&self, f: impl FnOnce(&mut Frame) -> R) -> R {
        self.with_stack(|stack| f(stack.last_mut().expect("no active transaction frame")))
    }

    /// Mark the current frame rollback-only, propagating outward until a
    /// savepoint boundary or an owning (new-connection) frame is reached
    /// (spec.md §4.7). The originating frame (the one on top of the stack
    /// when this is called) is marked directly; any owning frame the mark
    /// propagates into beyond that is recorded as having *inherited*
    /// rollback-only from a joined inner frame (`rollback_inherited`), so
    /// teardown can refuse to silently commit over it (spec.md §7,
    /// `UnexpectedRollback`).
    pub(crate) fn mark_rollback_only(&self) {
        self.with_stack(|stack| {
            let mut frames = stack.iter_mut().rev();
            let Some(origin) = frames.next() else {
                return;
            };
            origin.rollback_only = true;
            if origin.is_rollback_boundary() {
                return;
            }
            for frame in frames {
                frame.rollback_only = true;
                if frame.owns_connection {
                    frame.rollback_inherited = true;
                }
                if frame.is_rollback_boundary() {
                    break;
                }
            }
        });
    }

    /// Look up an observation across every frame on the current stack,
    /// innermost first (a nested scope may have re-read a row the outer
    /// scope already observed).
    pub fn observation(&self, type_name: &'static str, pk: &[storm_core::Value]) -> Option<ObservationRecord> {
        self.with_stack(|stack| {
            stack.iter().rev().find_map(|frame| frame.observation(type_name, pk).cloned())
        })
    }

    /// Run `body` inside a transaction scope opened per `propagation`
    /// against whatever frame (if any) is already on the stack
    /// (spec.md §4.7's propagation matrix).
    pub async fn with_transaction<T, F, Fut>(&self, propagation: Propagation, settings: TxSettings, body: F) -> StormResult<T>
    where
        F: FnOnce(TxHandle<'_>) -> Fut,
        Fut: Future<Output = StormResult<T>>,
    {
        let outer_present = self.with_stack(|stack| !stack.is_empty());
        let action = decide(propagation, outer_present);

        let suspended = match action {
            Action::SuspendOuterOpenNew | Action::SuspendOuterOpenNonTransactional => {
                Some(self.with_stack(|stack| stack.pop().expect("outer frame present")))
            }
            _ => None,
        };

        match action {
            Action::Fail => {
                return Err(match propagation {
                    Propagation::Mandatory => TxError::MandatoryWithoutOuter,
                    Propagation::Never => TxError::NeverWithOuter,
                    _ => unreachable!("Fail is only produced for MANDATORY/NEVER"),
                }
                .into());
            }
            Action::Join => {
                let conn = self.with_stack(|stack| stack.last().expect("outer frame present").connection.clone());
                self.with_stack(|stack| stack.push(Frame::joined(conn, propagation)));
            }
            Action::SavepointOnOuter => {
                let conn = self.with_stack(|stack| stack.last().expect("outer frame present").connection.clone());
                let savepoint = conn.set_savepoint().await?;
                self.with_stack(|stack| stack.push(Frame::savepoint(conn, savepoint)));
            }
            Action::OpenNew | Action::SuspendOuterOpenNew => {
                let conn: Arc<dyn Connection> = Arc::from(self.driver.open_connection().await?);
                conn.set_auto_commit(false).await?;
                if let Some(level) = settings.isolation {
                    conn.set_transaction_isolation(level).await?;
                }
                if settings.read_only {
                    conn.set_read_only(true).await?;
                }
                self.with_stack(|stack| stack.push(Frame::root(conn, propagation, settings.isolation, settings.timeout, settings.read_only)));
            }
            Action::OpenNonTransactional | Action::SuspendOuterOpenNonTransactional => {
                let conn: Arc<dyn Connection> = Arc::from(self.driver.open_connection().await?);
                conn.set_auto_commit(true).await?;
                self.with_stack(|stack| stack.push(Frame::root(conn, propagation, None, None, settings.read_only)));
            }
        }

        let handle = TxHandle { manager: self };
        let result = match settings.timeout {
            Some(duration) => match tokio::time::timeout(duration, body(handle)).await {
                Ok(r) => r,
                Err(_elapsed) => {
                    tracing::debug!(?duration, "transaction scope timed out");
                    self.with_top_mut(|frame| frame.timed_out = true);
                    self.mark_rollback_only();
                    Err(TxError::TimedOut(duration).into())
                }
            },
            None => body(handle).await,
        };

        // OptimisticLock is surfaced to the caller but does not mark the
        // scope rollback-only on its own (spec.md §7): a caller may catch
        // it and retry within the same transaction.
        let is_optimistic_lock = matches!(&result, Err(StormError::Exec(ExecError::OptimisticLock)));
        if result.is_err() && !is_optimistic_lock {
            self.mark_rollback_only();
        }

        let frame = self.with_stack(|stack| stack.pop().expect("frame pushed above"));

        let teardown: StormResult<()> = if let Some(savepoint) = &frame.savepoint {
            if frame.rollback_only {
                frame.connection.rollback_to_savepoint(savepoint).await
            } else {
                frame.connection.release_savepoint(savepoint).await
            }
        } else if frame.owns_connection {
            let outcome = if frame.rollback_only {
                frame.connection.rollback().await
            } else {
                frame.connection.commit().await
            };
            let _ = frame.connection.close().await;
            match outcome {
                // The body itself returned `Ok`, so this frame would have
                // committed, but a joined inner frame marked it
                // rollback-only first: the data was rolled back, not
                // committed, and the caller must be told rather than
                // handed a silent `Ok` (spec.md §7, `UnexpectedRollback`).
                Ok(()) if frame.rollback_inherited && result.is_ok() => Err(TxError::UnexpectedRollback.into()),
                other => other,
            }
        } else {
            // Joined frame: rollback-only, if set, was already propagated
            // to the owning frame by `mark_rollback_only` above.
            Ok(())
        };

        if let Some(outer) = suspended {
            self.with_stack(|stack| stack.push(outer));
        }

        match (result, teardown) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(teardown_err)) => Err(teardown_err),
            (Err(body_err), _) => Err(body_err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use storm_core::{Row, RowCursor, Savepoint, Statement, Value};

    #[derive(Default)]
    struct CountingConnection {
        commits: AtomicUsize,
        rollbacks: AtomicUsize,
        savepoints: AtomicUsize,
        savepoint_rollbacks: AtomicUsize,
        savepoint_releases: AtomicUsize,
    }

    struct NoopStatement;

    #[async_trait]
    impl Statement for NoopStatement {
        async fn bind(&mut self, _index: usize, _value: &Value, _type_hint: Option<&str>) -> StormResult<()> {
            Ok(())
        }
        async fn execute_query(&mut self) -> StormResult<Box<dyn RowCursor>> {
            unimplemented!()
        }
        async fn execute_update(&mut self) -> StormResult<u64> {
            Ok(0)
        }
        async fn add_batch(&mut self) -> StormResult<()> {
            Ok(())
        }
        async fn execute_batch(&mut self) -> StormResult<Vec<u64>> {
            Ok(vec![])
        }
        async fn generated_keys(&mut self) -> StormResult<Vec<Row>> {
            Ok(vec![])
        }
        async fn set_query_timeout(&mut self, _timeout: Duration) -> StormResult<()> {
            Ok(())
        }
        async fn close(&mut self) -> StormResult<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl Connection for CountingConnection {
        async fn prepare(&self, _sql: &str) -> StormResult<Box<dyn Statement>> {
            Ok(Box::new(NoopStatement))
        }
        async fn set_auto_commit(&self, _auto_commit: bool) -> StormResult<()> {
            Ok(())
        }
        async fn commit(&self) -> StormResult<()> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn rollback(&self) -> StormResult<()> {
            self.rollbacks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn set_savepoint(&self) -> StormResult<Savepoint> {
            let n = self.savepoints.fetch_add(1, Ordering::SeqCst);
            Ok(Savepoint(format!("sp{n}")))
        }
        async fn release_savepoint(&self, _savepoint: &Savepoint) -> StormResult<()> {
            self.savepoint_releases.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn rollback_to_savepoint(&self, _savepoint: &Savepoint) -> StormResult<()> {
            self.savepoint_rollbacks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn set_transaction_isolation(&self, _level: IsolationLevel) -> StormResult<()> {
            Ok(())
        }
        async fn set_read_only(&self, _read_only: bool) -> StormResult<()> {
            Ok(())
        }
        async fn close(&self) -> StormResult<()> {
            Ok(())
        }
    }

    struct SingleConnectionDriver {
        connection: Arc<CountingConnection>,
    }

    #[async_trait]
    impl Driver for SingleConnectionDriver {
        async fn open_connection(&self) -> StormResult<Box<dyn Connection>> {
            Ok(Box::new(SharedConnection(self.connection.clone())))
        }
    }

    /// Adapts the single shared `CountingConnection` to a fresh boxed
    /// `Connection` per `open_connection` call, so the test can assert on
    /// counts after the manager drops its `Arc`.
    struct SharedConnection(Arc<CountingConnection>);

    #[async_trait]
    impl Connection for SharedConnection {
        async fn prepare(&self, sql: &str) -> StormResult<Box<dyn Statement>> {
            self.0.prepare(sql).await
        }
        async fn set_auto_commit(&self, auto_commit: bool) -> StormResult<()> {
            self.0.set_auto_commit(auto_commit).await
        }
        async fn commit(&self) -> StormResult<()> {
            self.0.commit().await
        }
        async fn rollback(&self) -> StormResult<()> {
            self.0.rollback().await
        }
        async fn set_savepoint(&self) -> StormResult<Savepoint> {
            self.0.set_savepoint().await
        }
        async fn release_savepoint(&self, savepoint: &Savepoint) -> StormResult<()> {
            self.0.release_savepoint(savepoint).await
        }
        async fn rollback_to_savepoint(&self, savepoint: &Savepoint) -> StormResult<()> {
            self.0.rollback_to_savepoint(savepoint).await
        }
        async fn set_transaction_isolation(&self, level: IsolationLevel) -> StormResult<()> {
            self.0.set_transaction_isolation(level).await
        }
        async fn set_read_only(&self, read_only: bool) -> StormResult<()> {
            self.0.set_read_only(read_only).await
        }
        async fn close(&self) -> StormResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn required_opens_new_and_commits_on_success() {
        let conn = Arc::new(CountingConnection::default());
        let manager = TransactionManager::blocking(Arc::new(SingleConnectionDriver { connection: conn.clone() }));

        manager
            .with_transaction(Propagation::Required, TxSettings::default(), |_handle| async { Ok(()) })
            .await
            .unwrap();

        assert_eq!(conn.commits.load(Ordering::SeqCst), 1);
        assert_eq!(conn.rollbacks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn required_rolls_back_when_body_errors() {
        let conn = Arc::new(CountingConnection::default());
        let manager = TransactionManager::blocking(Arc::new(SingleConnectionDriver { connection: conn.clone() }));

        let result: StormResult<()> = manager
            .with_transaction(Propagation::Required, TxSettings::default(), |_handle| async {
                Err(TxError::UnexpectedRollback.into())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(conn.commits.load(Ordering::SeqCst), 0);
        assert_eq!(conn.rollbacks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn mandatory_without_outer_fails() {
        let conn = Arc::new(CountingConnection::default());
        let manager = TransactionManager::blocking(Arc::new(SingleConnectionDriver { connection: conn }));

        let result: StormResult<()> = manager
            .with_transaction(Propagation::Mandatory, TxSettings::default(), |_handle| async { Ok(()) })
            .await;

        assert!(matches!(result, Err(storm_core::StormError::Tx(TxError::MandatoryWithoutOuter))));
    }

    #[tokio::test]
    async fn nested_rollback_releases_only_the_savepoint() {
        let conn = Arc::new(CountingConnection::default());
        let manager = TransactionManager::blocking(Arc::new(SingleConnectionDriver { connection: conn.clone() }));

        manager
            .with_transaction(Propagation::Required, TxSettings::default(), |_outer| async {
                let inner: StormResult<()> = manager
                    .with_transaction(Propagation::Nested, TxSettings::default(), |_inner| async {
                        Err(TxError::UnexpectedRollback.into())
                    })
                    .await;
                assert!(inner.is_err());
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(conn.savepoints.load(Ordering::SeqCst), 1);
        assert_eq!(conn.savepoint_rollbacks.load(Ordering::SeqCst), 1);
        assert_eq!(conn.savepoint_releases.load(Ordering::SeqCst), 0);
        // Outer scope never saw rollback-only: it committed normally.
        assert_eq!(conn.commits.load(Ordering::SeqCst), 1);
        assert_eq!(conn.rollbacks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn requires_new_opens_a_second_physical_connection() {
        let outer_conn = Arc::new(CountingConnection::default());
        let manager = TransactionManager::blocking(Arc::new(SingleConnectionDriver { connection: outer_conn.clone() }));

        manager
            .with_transaction(Propagation::Required, TxSettings::default(), |_outer| async {
                manager
                    .with_transaction(Propagation::RequiresNew, TxSettings::default(), |_inner| async { Ok(()) })
                    .await
            })
            .await
            .unwrap();

        // Both the inner REQUIRES_NEW frame and the outer frame own a
        // connection and each commits independently.
        assert_eq!(outer_conn.commits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn optimistic_lock_does_not_mark_the_scope_rollback_only() {
        let conn = Arc::new(CountingConnection::default());
        let manager = TransactionManager::blocking(Arc::new(SingleConnectionDriver { connection: conn.clone() }));

        let result: StormResult<()> = manager
            .with_transaction(Propagation::Required, TxSettings::default(), |_handle| async {
                Err(storm_core::ExecError::OptimisticLock.into())
            })
            .await;

        assert!(matches!(result, Err(storm_core::StormError::Exec(storm_core::ExecError::OptimisticLock))));
        // Unlike other body errors, OptimisticLock must not force a
        // rollback of the owning frame's connection (spec.md §7).
        assert_eq!(conn.commits.load(Ordering::SeqCst), 1);
        assert_eq!(conn.rollbacks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn joined_inner_rollback_only_surfaces_unexpected_rollback_on_outer_commit() {
        let conn = Arc::new(CountingConnection::default());
        let manager = TransactionManager::blocking(Arc::new(SingleConnectionDriver { connection: conn.clone() }));

        let result: StormResult<()> = manager
            .with_transaction(Propagation::Required, TxSettings::default(), |_outer| async {
                manager
                    .with_transaction(Propagation::Required, TxSettings::default(), |inner| async move {
                        inner.mark_rollback_only();
                        Ok(())
                    })
                    .await
            })
            .await;

        // The outer body itself returned Ok, but the joined inner frame
        // marked it rollback-only first: the caller must be told the
        // commit it expected never happened (spec.md §7).
        assert!(matches!(result, Err(storm_core::StormError::Tx(TxError::UnexpectedRollback))));
        assert_eq!(conn.commits.load(Ordering::SeqCst), 0);
        assert_eq!(conn.rollbacks.load(Ordering::SeqCst), 1);
    }
}
