//! Storm Write - Dynamic Update Write Planner (C5)
//!
//! Tracks entities observed during a transaction, computes per-entity dirty
//! sets, and selects the UPDATE shape (OFF / ENTITY / FIELD with shape-cap
//! fallback), per spec.md §4.5. Upsert routing is included as it shares the
//! same PK/dialect inputs.

mod observation;
mod planner;
mod shape;
mod upsert;

pub use observation::ObservationRecord;
pub use planner::{bump_version, UpdatePlan, WritePlanner};
pub use shape::ShapeRegistry;
pub use upsert::{route_upsert, UpsertRoute};
