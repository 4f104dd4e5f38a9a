//! `proptest` strategies for `storm_core::Value` and the fixture record
//! types (spec.md §8's P1/P4 properties are exercised against these across
//! the workspace).

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;

use storm_core::Value;

use crate::fixtures::Pet;

/// Any non-`Null` scalar `Value`, weighted evenly across variants.
pub fn arb_scalar_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(Value::I32),
        any::<i64>().prop_map(Value::I64),
        // Exclude NaN: `Value::F64(NaN) != Value::F64(NaN)`, which breaks
        // every round-trip property these generators exist to support.
        (-1e12f64..1e12).prop_map(Value::F64),
        ".*".prop_map(Value::Text),
        proptest::collection::vec(any::<u8>(), 0..32).prop_map(Value::Bytes),
        arb_timestamp().prop_map(Value::Timestamp),
    ]
}

/// Any `Value`, including `Null`.
pub fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![1 => Just(Value::Null), 9 => arb_scalar_value()]
}

fn arb_timestamp() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..2_000_000_000).prop_map(|secs| Utc.timestamp_opt(secs, 0).single().expect("in-range unix timestamp"))
}

/// A `Pet` with an always-positive id (identity PKs never observe 0 or
/// negative values from a real sequence) and an optional owner.
pub fn arb_pet() -> impl Strategy<Value = Pet> {
    (
        1i64..1_000_000,
        "[A-Za-z ]{1,24}",
        arb_timestamp(),
        1i64..100,
        proptest::option::of(1i64..1_000_000),
    )
        .prop_map(|(id, name, birth_date, pet_type_id, owner_id)| Pet {
            id,
            name,
            birth_date,
            pet_type_id,
            owner_id,
        })
}
