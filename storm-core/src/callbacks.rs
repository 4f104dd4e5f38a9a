//! Lifecycle callback registry (spec.md §9).
//!
//! Callbacks are registered per record type and observe the eight lifecycle
//! points around insert/update/upsert/delete. Upsert routing (spec.md §4.5)
//! dispatches to the insert or update callbacks when it decomposes into one
//! of those operations, never invoking the upsert callbacks and an
//! insert/update callback for the same operation.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::RwLock;

/// The eight lifecycle hook points a registered callback can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePoint {
    BeforeInsert,
    AfterInsert,
    BeforeUpdate,
    AfterUpdate,
    BeforeUpsert,
    AfterUpsert,
    BeforeDelete,
    AfterDelete,
}

type BoxedCallback<T> = Box<dyn Fn(&T) + Send + Sync>;

struct Callbacks<T> {
    points: HashMap<LifecyclePoint, Vec<BoxedCallback<T>>>,
}

impl<T> Default for Callbacks<T> {
    fn default() -> Self {
        Self {
            points: HashMap::new(),
        }
    }
}

/// A process-wide registry of lifecycle callbacks, keyed by record type.
///
/// Mirrors the single `RwLock`-guarded process-wide cache pattern used by
/// the model registry (spec.md §4.1, §5): registration is rare, dispatch is
/// read-mostly.
#[derive(Default)]
pub struct CallbackRegistry {
    by_type: RwLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for `T` at the given lifecycle point.
    pub fn register<T: 'static>(
        &self,
        point: LifecyclePoint,
        callback: impl Fn(&T) + Send + Sync + 'static,
    ) {
        let mut guard = self.by_type.write().expect("callback registry poisoned");
        let entry = guard
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(Callbacks::<T>::default()));
        let callbacks = entry
            .downcast_mut::<Callbacks<T>>()
            .expect("callback registry type mismatch");
        callbacks
            .points
            .entry(point)
            .or_default()
            .push(Box::new(callback));
    }

    /// Invoke every callback registered for `T` at `point`, in registration
    /// order. A no-op if none are registered.
    pub fn fire<T: 'static>(&self, point: LifecyclePoint, value: &T) {
        let guard = self.by_type.read().expect("callback registry poisoned");
        let Some(entry) = guard.get(&TypeId::of::<T>()) else {
            return;
        };
        let Some(callbacks) = entry.downcast_ref::<Callbacks<T>>() else {
            return;
        };
        if let Some(hooks) = callbacks.points.get(&point) {
            for hook in hooks {
                hook(value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Pet {
        name: String,
    }

    #[test]
    fn fires_only_registered_type_and_point() {
        let registry = CallbackRegistry::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        registry.register::<Pet>(LifecyclePoint::BeforeInsert, move |_p| {
            seen2.fetch_add(1, Ordering::SeqCst);
        });

        registry.fire(LifecyclePoint::AfterInsert, &Pet { name: "Rex".into() });
        assert_eq!(seen.load(Ordering::SeqCst), 0);

        registry.fire(LifecyclePoint::BeforeInsert, &Pet { name: "Rex".into() });
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
