//! The Model Registry (C1, spec.md §4.1): `modelOf` reflect-and-cache with
//! at-most-one-builder semantics under concurrent first miss, and `pkOf`
//! extraction via [`storm_core::RecordAccess`] rather than reflection.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::OnceCell;
use storm_core::{ConfigError, RecordAccess, Value};

use crate::model::Model;

type BuildCell = Arc<OnceCell<Result<Arc<dyn Any + Send + Sync>, ConfigError>>>;

/// Process-wide cache of [`Model`] descriptors, keyed by `TypeId`.
///
/// Lookups are read-mostly: an already-cached type never blocks on a lock
/// held across a build. A concurrent first miss for the same type converges
/// on a single builder call (spec.md §4.1, §5) because the per-type
/// [`OnceCell`] is installed under a short-lived write lock on the outer map
/// before the builder ever runs.
#[derive(Default)]
pub struct ModelRegistry {
    cells: RwLock<HashMap<TypeId, BuildCell>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell_for<T: 'static>(&self) -> BuildCell {
        let type_id = TypeId::of::<T>();
        if let Some(cell) = self.cells.read().expect("model registry poisoned").get(&type_id) {
            return cell.clone();
        }
        let mut guard = self.cells.write().expect("model registry poisoned");
        guard
            .entry(type_id)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    /// Reflect-and-cache `Model<T>`, building it with `builder` at most once
    /// per type even under concurrent first-miss (spec.md §4.1).
    pub fn model_of<T: 'static>(
        &self,
        builder: impl FnOnce() -> Result<Model<T>, ConfigError>,
    ) -> Result<Arc<Model<T>>, ConfigError> {
        let cell = self.cell_for::<T>();
        let erased = cell.get_or_init(|| builder().map(|m| crate::model::erase(Arc::new(m))));
        match erased {
            Ok(any) => Ok(any
                .clone()
                .downcast::<Model<T>>()
                .expect("model registry type mismatch")),
            Err(e) => Err(e.clone()),
        }
    }

    /// Number of types currently cached. Mostly useful for tests.
    pub fn cached_type_count(&self) -> usize {
        self.cells.read().expect("model registry poisoned").len()
    }
}

/// Extract the primary key value(s) from an entity instance without
/// reflection, via its precomputed [`RecordAccess`] accessor (spec.md
/// §4.1 `pkOf`).
pub fn pk_of<T: RecordAccess>(entity: &T) -> Vec<Value> {
    entity.primary_key_values()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Column, ModelBuilder, PrimaryKey, Table};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    struct Pet;

    fn pet_model() -> Result<Model<Pet>, ConfigError> {
        ModelBuilder::<Pet>::new(Table::new("pet"))
            .column(Column::new("id", 0))
            .pk(PrimaryKey::Identity(Column::new("id", 0)))
            .build()
    }

    #[test]
    fn caches_across_lookups() {
        let registry = ModelRegistry::new();
        let build_count = AtomicUsize::new(0);
        let m1 = registry
            .model_of::<Pet>(|| {
                build_count.fetch_add(1, Ordering::SeqCst);
                pet_model()
            })
            .unwrap();
        let m2 = registry
            .model_of::<Pet>(|| {
                build_count.fetch_add(1, Ordering::SeqCst);
                pet_model()
            })
            .unwrap();
        assert_eq!(build_count.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&m1, &m2));
    }

    #[test]
    fn concurrent_first_miss_builds_once() {
        let registry = Arc::new(ModelRegistry::new());
        let build_count = Arc::new(AtomicUsize::new(0));
        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let registry = registry.clone();
                let build_count = build_count.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    registry
                        .model_of::<Pet>(|| {
                            build_count.fetch_add(1, Ordering::SeqCst);
                            pet_model()
                        })
                        .unwrap()
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(build_count.load(Ordering::SeqCst), 1);
    }
}
