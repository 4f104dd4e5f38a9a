//! `RecordAccess`: the compile-time-generatable capability that replaces
//! reflection on the hot path (spec.md §9, "Reflection → trait/interface +
//! generated accessors"). Storm does not ship a derive macro for it (macro
//! authoring is out of core scope, spec.md §1); callers implement it by hand
//! or via an external derive crate. The core only defines and consumes the
//! trait.

use crate::value::Value;

/// A record type that can expose its columns and primary key without
/// reflection, and can be reconstructed from an ordered list of database
/// values (the shape the execution engine materialises a row into).
pub trait RecordAccess: Sized {
    /// Stable name used in error messages and model caching.
    fn type_name() -> &'static str;

    /// Column names in declaration order (with inlined records expanded in
    /// place), matching `Model::columns` (spec.md §3).
    fn column_names() -> &'static [&'static str];

    /// The database value of the column at `index`, in the same order as
    /// [`RecordAccess::column_names`].
    fn column_value(&self, index: usize) -> Value;

    /// The primary key value(s) extracted without reflection (spec.md §4.1
    /// `pkOf`). A composite key returns more than one value, in the declared
    /// PK column order.
    fn primary_key_values(&self) -> Vec<Value>;

    /// Construct an instance from values in [`RecordAccess::column_names`]
    /// order, as produced by a result-row cursor.
    fn from_ordered_values(values: &[Value]) -> Result<Self, crate::value::ConvertError>;
}
