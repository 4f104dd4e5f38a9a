//! The entity observation record (spec.md §3): a snapshot of a row read
//! through a repository within a transaction scope, used as the dirty-check
//! baseline. Lifecycle ownership (created on read, discarded at scope end,
//! suppressed at `READ_UNCOMMITTED`) belongs to `storm-tx`'s frame; this
//! crate only defines the snapshot shape and compares against it.

use storm_core::{RecordAccess, Value};

/// Snapshot of a row's columns as observed at read time (spec.md §3).
/// Equality/identity of the owning scope and isolation suppression are a
/// `storm-tx` concern; this type is the payload `storm-tx` keys by
/// `(model_ref, pk)` inside each frame (spec.md §5).
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationRecord {
    pub type_name: &'static str,
    pub pk: Vec<Value>,
    /// Column values in [`RecordAccess::column_names`] order, matching
    /// `Model::columns` (spec.md §3).
    pub columns: Vec<Value>,
}

impl ObservationRecord {
    /// Capture a snapshot of `entity` as read, for later dirty comparison.
    pub fn capture<T: RecordAccess>(entity: &T) -> Self {
        let columns = (0..T::column_names().len())
            .map(|i| entity.column_value(i))
            .collect();
        Self {
            type_name: T::type_name(),
            pk: entity.primary_key_values(),
            columns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pet {
        id: i64,
        name: String,
    }

    impl RecordAccess for Pet {
        fn type_name() -> &'static str {
            "Pet"
        }
        fn column_names() -> &'static [&'static str] {
            &["id", "name"]
        }
        fn column_value(&self, index: usize) -> Value {
            match index {
                0 => Value::I64(self.id),
                1 => Value::Text(self.name.clone()),
                _ => Value::Null,
            }
        }
        fn primary_key_values(&self) -> Vec<Value> {
            vec![Value::I64(self.id)]
        }
        fn from_ordered_values(_values: &[Value]) -> Result<Self, storm_core::ConvertError> {
            unimplemented!()
        }
    }

    #[test]
    fn capture_snapshots_columns_in_declared_order() {
        let pet = Pet { id: 7, name: "Rex".into() };
        let snapshot = ObservationRecord::capture(&pet);
        assert_eq!(snapshot.pk, vec![Value::I64(7)]);
        assert_eq!(snapshot.columns, vec![Value::I64(7), Value::Text("Rex".into())]);
    }
}
