//! Upsert routing (spec.md §4.5): decides whether a save operation becomes
//! a SQL-level upsert, a plain INSERT, or a plain UPDATE, depending on the
//! entity's PK state and what the active `Dialect` supports.

use storm_model::{Model, PrimaryKey};

/// The operation a save() call decomposes into (spec.md §4.5's upsert
/// routing paragraph). Lifecycle callbacks fire for whichever operation
/// this resolves to, never for both insert and update on the same call
/// (spec.md §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertRoute {
    /// The dialect has a native `INSERT ... ON CONFLICT`-style statement.
    NativeUpsert,
    Insert,
    Update,
}

/// Route a save() call per spec.md §4.5:
///
/// > SQL-level upsert when (a) PK is supplied or non-IDENTITY, and (b)
/// > dialect exposes it. Else routed to INSERT (unset PK) or UPDATE (set PK).
pub fn route_upsert<T>(model: &Model<T>, pk_is_set: bool, dialect_supports_upsert: bool) -> UpsertRoute {
    let pk_condition = pk_is_set || !matches!(model.pk, PrimaryKey::Identity(_));
    if pk_condition && dialect_supports_upsert {
        UpsertRoute::NativeUpsert
    } else if pk_is_set {
        UpsertRoute::Update
    } else {
        UpsertRoute::Insert
    }
}
