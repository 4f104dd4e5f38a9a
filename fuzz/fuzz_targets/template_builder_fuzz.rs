//! Fuzz the contextual-resolution step of `TemplateBuilder::build`: arbitrary
//! literal text around a bare type token should always resolve to exactly
//! one element, never panic, and keep the chunk/slot invariant.

#![no_main]

use libfuzzer_sys::fuzz_target;
use storm_core::{ConvertError, RecordAccess, Value};
use storm_template::TemplateString;

struct Pet;

impl RecordAccess for Pet {
    fn type_name() -> &'static str {
        "Pet"
    }
    fn column_names() -> &'static [&'static str] {
        &["id", "name"]
    }
    fn column_value(&self, _index: usize) -> Value {
        Value::Null
    }
    fn primary_key_values(&self) -> Vec<Value> {
        vec![Value::Null]
    }
    fn from_ordered_values(_values: &[Value]) -> Result<Self, ConvertError> {
        Ok(Pet)
    }
}

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let half = text.chars().count() / 2;
    let midpoint = text.char_indices().nth(half).map(|(i, _)| i).unwrap_or(text.len());
    let (prefix, suffix) = text.split_at(midpoint);

    let template = TemplateString::builder().sql(prefix).ty::<Pet>().sql(suffix).build();

    assert_eq!(template.chunks.len(), template.slots.len() + 1);
});
