//! # Request State
//!
//! The mutable, request-scoped bag that hooks, policies and the dispatcher use
//! to share data while the request view itself stays immutable.
//!
//! ## Design Principles (SOLID)
//!
//! - **S**: Only handles state storage and retrieval
//! - **O**: Extensible via `get_typed::<T>()` for any type
//! - **D**: Handlers depend on this handle, never on the host's internals
//!
//! Two kinds of slot live side by side:
//!
//! - JSON values under string keys (introspectable, e.g. `matchedRoute`)
//! - typed values keyed by `TypeId` (service directory, forward target, policy cache)

use serde_json::{Map, Value};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct Slots {
    values: Map<String, Value>,
    typed: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

/// Request-scoped shared state
///
/// Cloning the handle shares the underlying bag; a fresh bag is created per
/// request by the host and never outlives it.
///
/// # Example
///
/// ```ignore
/// let state = RequestState::new();
/// state.set("user", json!({ "id": 1 }));
/// state.set_nested("services.api.users", json!("UserService"));
/// ```
#[derive(Clone, Default)]
pub struct RequestState {
    slots: Arc<Mutex<Slots>>,
}

impl RequestState {
    /// Create a new empty state bag
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a JSON value under a top-level key
    ///
    /// Overwrites any existing value with the same key.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.lock().values.insert(key.into(), value.into());
    }

    /// Store a JSON value under a dotted path, creating intermediate objects
    pub fn set_nested(&self, path: &str, value: impl Into<Value>) {
        set_nested(&mut self.lock().values, path, value.into());
    }

    /// Get a cloned JSON value by top-level key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().values.get(key).cloned()
    }

    /// Check if a JSON key exists
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.lock().values.contains_key(key)
    }

    /// Remove a JSON value by key
    pub fn remove(&self, key: &str) -> bool {
        self.lock().values.remove(key).is_some()
    }

    /// Snapshot of every JSON value as one object
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.lock().values.clone())
    }

    /// Store a value by its type
    pub fn insert<T: Send + Sync + 'static>(&self, value: T) {
        self.lock().typed.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Get a cloned value by type
    #[must_use]
    pub fn get_typed<T: Clone + Send + Sync + 'static>(&self) -> Option<T> {
        self.lock()
            .typed
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
            .cloned()
    }

    /// Get the value stored for `T`, building and storing it first if absent
    ///
    /// `init` runs without the lock held so it may itself read the state.
    /// If two callers race, the first stored value wins.
    pub fn get_or_insert_with<T, F>(&self, init: F) -> T
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        if let Some(existing) = self.get_typed::<T>() {
            return existing;
        }
        let built = init();
        let mut slots = self.lock();
        slots
            .typed
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(built.clone()))
            .downcast_ref::<T>()
            .cloned()
            .unwrap_or(built)
    }

    /// Mutate the value stored for `T` in place, defaulting it if absent
    pub fn update<T, R>(&self, f: impl FnOnce(&mut T) -> R) -> R
    where
        T: Default + Send + Sync + 'static,
    {
        let mut slots = self.lock();
        let slot = slots
            .typed
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(T::default()));
        if let Some(value) = slot.downcast_mut::<T>() {
            f(value)
        } else {
            // The map is keyed by TypeId, so the downcast cannot miss.
            let mut fresh = T::default();
            let out = f(&mut fresh);
            *slot = Box::new(fresh);
            out
        }
    }

    /// Check if a typed value exists
    #[must_use]
    pub fn contains_typed<T: 'static>(&self) -> bool {
        self.lock().typed.contains_key(&TypeId::of::<T>())
    }
}

impl std::fmt::Debug for RequestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots = self.lock();
        f.debug_struct("RequestState")
            .field("keys", &slots.values.keys().collect::<Vec<_>>())
            .field("typed", &slots.typed.len())
            .finish()
    }
}

/// Write `value` at a dotted `path` inside `map`
///
/// Missing intermediate segments become empty objects; a non-object found on
/// the way is replaced by an object.
pub fn set_nested(map: &mut Map<String, Value>, path: &str, value: Value) {
    let mut parts: Vec<&str> = path.split('.').collect();
    let Some(last) = parts.pop() else {
        return;
    };

    let mut current = map;
    for part in parts {
        let entry = current
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Value::Object(next) = entry else {
            return;
        };
        current = next;
    }
    current.insert(last.to_string(), value);
}
