//! Error kinds shared across the Storm workspace.

use thiserror::Error;

/// Errors raised while building or looking up a [`crate::model`]-style schema descriptor.
///
/// Lives here rather than in `storm-model` so that `storm-exec` and `storm-tx`
/// can report model problems without depending on the model crate directly.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("record type {type_name} has no primary key")]
    MissingPrimaryKey { type_name: &'static str },

    #[error("record type {type_name} declares {count} primary key groups, expected exactly one")]
    MultiplePrimaryKeys { type_name: &'static str, count: usize },

    #[error("sequence-generated primary key on {type_name} requires a sequence name")]
    SequenceNameRequired { type_name: &'static str },

    #[error("foreign key on {type_name} references unknown type {referenced}")]
    UnknownForeignKeyTarget {
        type_name: &'static str,
        referenced: &'static str,
    },

    #[error("column name collision on {type_name}: {column} declared more than once")]
    ColumnNameCollision { type_name: &'static str, column: String },
}

/// Errors raised while resolving or rendering a [`TemplateString`](../storm_template).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unresolved element: {detail}")]
    UnresolvedElement { detail: String },

    #[error("unknown alias {alias:?} referenced in template")]
    UnknownAlias { alias: String },

    #[error("ambiguous table reference for type {type_name}: candidates {paths:?}")]
    AmbiguousTable {
        type_name: &'static str,
        paths: Vec<String>,
    },

    #[error("scope misuse: {detail}")]
    ScopeMisuse { detail: String },

    #[error("unterminated placeholder starting at byte {offset}")]
    UnterminatedPlaceholder { offset: usize },
}

/// Errors surfaced by the execution engine.
#[derive(Debug, Clone, Error)]
pub enum ExecError {
    #[error("no result for query expecting exactly one row")]
    NoResult,

    #[error("expected exactly one row, got {count}")]
    NonUniqueResult { count: usize },

    #[error("optimistic lock failure: update affected 0 rows")]
    OptimisticLock,

    #[error("driver error: {0}")]
    Persistence(String),
}

/// Errors surfaced by the transaction manager.
#[derive(Debug, Clone, Error)]
pub enum TxError {
    #[error("transaction timed out after {0:?}")]
    TimedOut(std::time::Duration),

    #[error("propagation MANDATORY requires an active transaction")]
    MandatoryWithoutOuter,

    #[error("propagation NEVER forbids an active transaction")]
    NeverWithOuter,

    #[error("outer transaction observed inherited rollback-only from a joined inner scope")]
    UnexpectedRollback,

    #[error("driver error while managing transaction: {0}")]
    Driver(String),
}

/// Top-level aggregate error type for Storm, mirroring each component's
/// crate-local error through a `#[from]` conversion.
#[derive(Debug, Clone, Error)]
pub enum StormError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    #[error("execution error: {0}")]
    Exec(#[from] ExecError),

    #[error("transaction error: {0}")]
    Tx(#[from] TxError),
}

/// Result type alias used throughout Storm.
pub type StormResult<T> = Result<T, StormError>;
