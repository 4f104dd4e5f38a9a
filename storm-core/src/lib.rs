//! Storm Core - Shared Types
//!
//! Error kinds, process-wide configuration, the dynamic `Value` carried
//! across the driver boundary, and the `RecordAccess`/`Converter`
//! capabilities every other Storm crate is built on. This crate contains
//! no query composition or execution logic of its own.

mod callbacks;
mod config;
mod dialect;
mod driver;
mod error;
mod record;
mod value;

pub use callbacks::{CallbackRegistry, LifecyclePoint};
pub use config::{DirtyCheck, StormConfig, UpdateMode};
pub use dialect::{Dialect, LockClause, LockPlacement};
pub use driver::{Connection, Driver, IsolationLevel, Row, RowCursor, Savepoint, Statement, UpdateCount};
pub use error::{ConfigError, ExecError, StormError, StormResult, TemplateError, TxError};
pub use record::RecordAccess;
pub use value::{Converter, ConvertError, IdentityConverter, Value};
