//! The per-type FIELD-shape registry (spec.md §4.5, P6): tracks the
//! distinct dirty-column shapes seen for each type and promotes to ENTITY
//! once the configured cap is exceeded. Mirrors `storm-model::ModelRegistry`'s
//! process-wide, `RwLock`-guarded cache shape (spec.md §5).

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

/// The set of dirty-column-index shapes observed so far for each record
/// type, capped at `max_shapes` distinct shapes (spec.md §4.5).
#[derive(Default)]
pub struct ShapeRegistry {
    shapes: RwLock<HashMap<TypeId, HashSet<Vec<usize>>>>,
}

impl ShapeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `shape` for `T` if the cap allows it; returns `true` when
    /// the caller should promote this UPDATE to the full-row ENTITY shape
    /// instead (spec.md §4.5, P6: "after emitting `max_shapes` distinct
    /// FIELD shapes for type T, subsequent updates for T use ENTITY shape").
    ///
    /// A shape already registered for `T` never counts against the cap
    /// again (re-observing the same dirty set is not a new shape).
    pub fn register_or_promote<T: 'static>(&self, shape: &[usize], max_shapes: usize) -> bool {
        let type_id = TypeId::of::<T>();

        {
            let guard = self.shapes.read().expect("shape registry poisoned");
            if let Some(set) = guard.get(&type_id) {
                if set.contains(shape) {
                    return false;
                }
            }
        }

        let mut guard = self.shapes.write().expect("shape registry poisoned");
        let set = guard.entry(type_id).or_default();
        if set.contains(shape) {
            return false;
        }
        if set.len() >= max_shapes {
            return true;
        }
        set.insert(shape.to_vec());
        false
    }

    /// Number of distinct shapes currently registered for `T`. Mostly useful
    /// for tests verifying the cap.
    pub fn shape_count<T: 'static>(&self) -> usize {
        self.shapes
            .read()
            .expect("shape registry poisoned")
            .get(&TypeId::of::<T>())
            .map(HashSet::len)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pet;

    #[test]
    fn promotes_after_cap_is_reached() {
        let registry = ShapeRegistry::new();
        assert!(!registry.register_or_promote::<Pet>(&[0], 2));
        assert!(!registry.register_or_promote::<Pet>(&[1], 2));
        // Third distinct shape exceeds the cap of 2.
        assert!(registry.register_or_promote::<Pet>(&[2], 2));
        assert_eq!(registry.shape_count::<Pet>(), 2);
    }

    #[test]
    fn re_registering_known_shape_never_promotes() {
        let registry = ShapeRegistry::new();
        assert!(!registry.register_or_promote::<Pet>(&[0], 1));
        assert!(!registry.register_or_promote::<Pet>(&[0], 1));
        assert_eq!(registry.shape_count::<Pet>(), 1);
    }
}
