//! Storm Postgres - reference `Driver`/`Dialect` implementation
//!
//! Backs the `storm-core::Driver`/`Dialect` ports with `tokio-postgres` and
//! `deadpool-postgres` (spec.md §6). This is the "does it actually run"
//! backend: it proves the ports are implementable end to end and is what
//! `storm-tx`'s cooperative mode pools connections through, but it carries
//! no query-composition logic of its own — that stays in `storm-template`/
//! `storm-query`.

mod config;
mod dialect;
mod driver;
mod placeholder;
mod statement;
mod value;

pub use config::PgConfig;
pub use dialect::PostgresDialect;
pub use driver::{PgConnection, PgDriver};
