//! The tail of the parameter binding pipeline (spec.md §4.6): by the time an
//! argument reaches `storm-exec` it has already gone through
//! `converter.toDatabase` while the template was being composed (spec.md
//! §4.3); only the dialect's temporal normalisation step remains before the
//! value is handed to the driver.

use storm_core::{Dialect, Value};

/// Apply `dialect.normalize_temporal` to every argument, preserving order.
pub fn normalize_args(dialect: &dyn Dialect, args: Vec<Value>) -> Vec<Value> {
    args.into_iter().map(|v| dialect.normalize_temporal(v)).collect()
}
