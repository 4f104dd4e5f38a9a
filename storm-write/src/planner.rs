//! The dynamic-update planner (C5, spec.md §4.5): selects the UPDATE shape
//! (OFF / ENTITY / FIELD with shape-cap fallback) for an entity observed
//! during a transaction, and bumps its version column.

use storm_core::{DirtyCheck, RecordAccess, UpdateMode, Value};
use storm_model::{Model, VersionColumn, VersionKind};

use crate::observation::ObservationRecord;
use crate::shape::ShapeRegistry;

/// The decided set of `col = value` assignments for an UPDATE statement, or
/// `Skip` when no I/O should be issued (spec.md §4.5 step 3 / P5).
#[derive(Debug, Clone, PartialEq)]
pub enum UpdatePlan {
    /// No dirty columns and no version-forced write (spec.md §9's Open
    /// Question: Storm preserves this behaviour and skips, documented in
    /// `DESIGN.md`).
    Skip,
    /// Full-row UPDATE: every updatable column, in `Model::columns` order.
    FullRow { set: Vec<(String, Value)> },
    /// UPDATE scoped to the dirty columns only.
    Shape { set: Vec<(String, Value)> },
}

impl UpdatePlan {
    pub fn set_columns(&self) -> &[(String, Value)] {
        match self {
            UpdatePlan::Skip => &[],
            UpdatePlan::FullRow { set } | UpdatePlan::Shape { set } => set,
        }
    }
}

/// Per-process write planner: holds the FIELD-shape registry that P6's cap
/// applies to (spec.md §4.5). Construct one and share it (e.g. behind an
/// `Arc`) across every repository operation in the process, mirroring the
/// single shared `storm-model::ModelRegistry` instance pattern.
#[derive(Default)]
pub struct WritePlanner {
    shapes: ShapeRegistry,
}

impl WritePlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide the UPDATE shape for `entity`, given the baseline `observation`
    /// captured at read time (spec.md §4.5's algorithm, steps 1-5).
    pub fn plan_update<T: RecordAccess + 'static>(
        &self,
        model: &Model<T>,
        entity: &T,
        observation: Option<&ObservationRecord>,
        mode: UpdateMode,
        dirty_check: DirtyCheck,
        max_shapes: usize,
    ) -> UpdatePlan {
        // Step 1: OFF, or never read inside the transaction (no baseline to
        // diff against) — always full-row.
        let Some(observation) = observation.filter(|_| !matches!(mode, UpdateMode::Off)) else {
            return Self::full_row(model, entity);
        };

        // Step 2: dirty columns over updatable columns only.
        let dirty = Self::dirty_columns(model, entity, observation, dirty_check);

        // Step 3: nothing changed - skip (see Open Question resolution above).
        if dirty.is_empty() {
            return UpdatePlan::Skip;
        }

        match mode {
            UpdateMode::Off => unreachable!("handled above"),
            // Step 4.
            UpdateMode::Entity => Self::full_row(model, entity),
            // Step 5: shape cap fallback to ENTITY.
            UpdateMode::Field => {
                let promote = self.shapes.register_or_promote::<T>(&dirty, max_shapes);
                if promote {
                    tracing::debug!(
                        type_name = T::type_name(),
                        shape = ?dirty,
                        "FIELD shape cap exceeded, promoting to ENTITY"
                    );
                    Self::full_row(model, entity)
                } else {
                    let set = dirty
                        .iter()
                        .map(|&i| (model.columns[i].name.clone(), entity.column_value(i)))
                        .collect();
                    UpdatePlan::Shape { set }
                }
            }
        }
    }

    fn full_row<T: RecordAccess>(model: &Model<T>, entity: &T) -> UpdatePlan {
        let set = model
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.updatable)
            .map(|(i, c)| (c.name.clone(), entity.column_value(i)))
            .collect();
        UpdatePlan::FullRow { set }
    }

    fn dirty_columns<T: RecordAccess>(
        model: &Model<T>,
        entity: &T,
        observation: &ObservationRecord,
        dirty_check: DirtyCheck,
    ) -> Vec<usize> {
        model
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.updatable)
            .filter_map(|(i, col)| {
                let before = observation.columns.get(i)?;
                let after = entity.column_value(i);
                let changed = match dirty_check {
                    // INSTANCE: a structural difference is a dirty field,
                    // without further column-type-aware normalisation.
                    DirtyCheck::Instance => *before != after,
                    // VALUE: compare through the column's converter when
                    // one is registered, so two domain values whose
                    // database encodings normalise equal aren't flagged
                    // dirty (e.g. trailing-zero-insensitive numerics).
                    DirtyCheck::Value => match model.converters.get(&col.name) {
                        Some(conv) => conv.to_database(before) != conv.to_database(&after),
                        None => *before != after,
                    },
                };
                changed.then_some(i)
            })
            .collect()
    }
}

/// Compute the post-UPDATE value of a version column (spec.md §3: "Version
/// column is always included in WHERE on UPDATE and is auto-bumped").
pub fn bump_version(version: &VersionColumn, current: &Value) -> Value {
    match version.kind {
        VersionKind::Numeric => match current {
            Value::I32(v) => Value::I32(v.wrapping_add(1)),
            Value::I64(v) => Value::I64(v.wrapping_add(1)),
            other => other.clone(),
        },
        VersionKind::Temporal => Value::Timestamp(chrono::Utc::now()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storm_model::{Column, ModelBuilder, PrimaryKey, Table};

    struct Pet {
        id: i64,
        name: String,
        birth_date: i64,
    }

    impl RecordAccess for Pet {
        fn type_name() -> &'static str {
            "Pet"
        }
        fn column_names() -> &'static [&'static str] {
            &["id", "name", "birth_date"]
        }
        fn column_value(&self, index: usize) -> Value {
            match index {
                0 => Value::I64(self.id),
                1 => Value::Text(self.name.clone()),
                2 => Value::I64(self.birth_date),
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

    fn pet_model() -> Model<Pet> {
        ModelBuilder::<Pet>::new(Table::new("pet"))
            .column(Column::new("id", 0).not_updatable())
            .column(Column::new("name", 1))
            .column(Column::new("birth_date", 2))
            .pk(PrimaryKey::Identity(Column::new("id", 0)))
            .build()
            .unwrap()
    }

    #[test]
    fn no_observation_means_full_row() {
        let planner = WritePlanner::new();
        let model = pet_model();
        let pet = Pet { id: 1, name: "Rex".into(), birth_date: 100 };
        let plan = planner.plan_update(&model, &pet, None, UpdateMode::Field, DirtyCheck::Instance, 16);
        assert!(matches!(plan, UpdatePlan::FullRow { .. }));
    }

    #[test]
    fn unchanged_entity_skips_update() {
        let planner = WritePlanner::new();
        let model = pet_model();
        let pet = Pet { id: 1, name: "Rex".into(), birth_date: 100 };
        let observation = ObservationRecord::capture(&pet);
        let plan = planner.plan_update(&model, &pet, Some(&observation), UpdateMode::Entity, DirtyCheck::Instance, 16);
        assert_eq!(plan, UpdatePlan::Skip);
    }

    #[test]
    fn field_mode_emits_only_dirty_columns() {
        let planner = WritePlanner::new();
        let model = pet_model();
        let before = Pet { id: 1, name: "Rex".into(), birth_date: 100 };
        let observation = ObservationRecord::capture(&before);
        let after = Pet { id: 1, name: "Max".into(), birth_date: 100 };
        let plan = planner.plan_update(&model, &after, Some(&observation), UpdateMode::Field, DirtyCheck::Instance, 16);
        match plan {
            UpdatePlan::Shape { set } => {
                assert_eq!(set, vec![("name".to_string(), Value::Text("Max".into()))]);
            }
            other => panic!("expected Shape, got {other:?}"),
        }
    }

    #[test]
    fn shape_cap_promotes_to_entity() {
        let planner = WritePlanner::new();
        let model = pet_model();
        let before = Pet { id: 1, name: "Rex".into(), birth_date: 100 };
        let observation = ObservationRecord::capture(&before);

        let name_changed = Pet { id: 1, name: "Max".into(), birth_date: 100 };
        let plan = planner.plan_update(&model, &name_changed, Some(&observation), UpdateMode::Field, DirtyCheck::Instance, 1);
        assert!(matches!(plan, UpdatePlan::Shape { .. }));

        let date_changed = Pet { id: 1, name: "Rex".into(), birth_date: 200 };
        // A second, distinct shape exceeds the cap of 1, so this promotes.
        let plan = planner.plan_update(&model, &date_changed, Some(&observation), UpdateMode::Field, DirtyCheck::Instance, 1);
        assert!(matches!(plan, UpdatePlan::FullRow { .. }));
    }

    #[test]
    fn entity_mode_emits_full_row_when_dirty() {
        let planner = WritePlanner::new();
        let model = pet_model();
        let before = Pet { id: 1, name: "Rex".into(), birth_date: 100 };
        let observation = ObservationRecord::capture(&before);
        let after = Pet { id: 1, name: "Max".into(), birth_date: 100 };
        let plan = planner.plan_update(&model, &after, Some(&observation), UpdateMode::Entity, DirtyCheck::Instance, 16);
        match plan {
            UpdatePlan::FullRow { set } => assert_eq!(set.len(), 2),
            other => panic!("expected FullRow, got {other:?}"),
        }
    }

    #[test]
    fn bump_numeric_version() {
        let version = VersionColumn {
            column: Column::new("version", 3),
            kind: VersionKind::Numeric,
        };
        assert_eq!(bump_version(&version, &Value::I64(4)), Value::I64(5));
    }
}
