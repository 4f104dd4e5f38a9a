//! Storm Exec - Execution Engine (C6)
//!
//! Runs prepared statements against a `storm-core::Connection`: the tail of
//! the parameter binding pipeline, result streaming with deterministic
//! cursor release, chunked batch execution, `getSingleResult` semantics,
//! and generated-key capture (spec.md §4.6).

mod binder;
mod executor;

pub use binder::normalize_args;
pub use executor::Executor;


