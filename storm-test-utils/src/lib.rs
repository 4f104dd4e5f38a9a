//! Storm Test Utilities
//!
//! Shared fixtures, record-type generators, and a mock `Driver` used by
//! integration tests across the Storm workspace (SPEC_FULL.md §3): the
//! `Pet`/`PetType`/`Owner` record types and schema catalog spec.md §8's
//! end-to-end scenarios are written against, `proptest` strategies for
//! property tests, and an in-memory scriptable driver standing in for a
//! real `storm-postgres` connection.

mod fixtures;
mod generators;
mod mock_driver;

pub use fixtures::{Owner, Pet, PetSchemaCatalog, PetType};
pub use generators::{arb_pet, arb_scalar_value, arb_value};
pub use mock_driver::{CapturedCall, MockConnection, MockCursor, MockDriver, MockStatement};
