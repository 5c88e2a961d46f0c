//! The observation capability consumed by the store
//!
//! The store never discovers its reactive backend from a global. It is
//! handed an `Arc<dyn Observer>` at construction and talks to it only
//! through this trait.

use crate::error::{display_path, ReactiveError, ReactiveResult};
use crate::root::{ComputedSet, ReactiveRoot};
use crate::state::StateCell;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Identifier handed out by [`Observer::watch`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchId(pub u64);

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "watch#{}", self.0)
    }
}

/// Produces the watched value
pub type Selector = Box<dyn Fn() -> Value + Send + Sync>;

/// Receives `(new, old)` when the watched value changes
pub type WatchCallback = Box<dyn Fn(&Value, &Value) + Send + Sync>;

/// Work scheduled after the current flush
pub type DeferredTask = Box<dyn FnOnce() + Send>;

/// How a watcher compares and when it is notified
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchOptions {
    /// Compare the whole structure instead of the top level only
    #[serde(default)]
    pub deep: bool,
    /// Notify synchronously with the triggering write instead of on flush
    #[serde(default)]
    pub sync: bool,
    /// Fire once at registration with a null old value
    #[serde(default)]
    pub immediate: bool,
}

impl WatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deep(mut self) -> Self {
        self.deep = true;
        self
    }

    pub fn sync(mut self) -> Self {
        self.sync = true;
        self
    }

    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }
}

/// Reactive-observation backend
///
/// Property installation and removal have default implementations on top
/// of [`StateCell::write`]; a backend only has to provide watching,
/// notification and deferral.
pub trait Observer: Send + Sync {
    /// Register a watcher over `selector`
    fn watch(&self, selector: Selector, callback: WatchCallback, options: WatchOptions) -> WatchId;

    /// Remove a watcher; returns whether it was still registered
    fn unwatch(&self, id: WatchId) -> bool;

    /// Called by the state cell after every write
    fn notify(&self);

    /// Schedule `task` after the current flush cycle
    fn defer(&self, task: DeferredTask);

    /// Make `parent[key]` an observed property holding `value`
    ///
    /// Returns the value previously stored under `key`, if any.
    fn install_property(
        &self,
        cell: &StateCell,
        parent: &[String],
        key: &str,
        value: Value,
    ) -> ReactiveResult<Option<Value>> {
        cell.write(parent, |target| match target.as_object_mut() {
            Some(map) => Ok(map.insert(key.to_string(), value)),
            None => Err(ReactiveError::NotAnObject(display_path(parent))),
        })
        .unwrap_or_else(|| Err(ReactiveError::MissingPath(display_path(parent))))
    }

    /// Remove `parent[key]`, returning the removed value
    fn delete_property(
        &self,
        cell: &StateCell,
        parent: &[String],
        key: &str,
    ) -> ReactiveResult<Option<Value>> {
        cell.write(parent, |target| match target.as_object_mut() {
            Some(map) => Ok(map.remove(key)),
            None => Err(ReactiveError::NotAnObject(display_path(parent))),
        })
        .unwrap_or_else(|| Err(ReactiveError::MissingPath(display_path(parent))))
    }

    /// Wrap the state cell and computed accessors into a fresh root
    fn create_root(&self, cell: Arc<StateCell>, computed: ComputedSet) -> Arc<ReactiveRoot> {
        Arc::new(ReactiveRoot::new(cell, computed))
    }
}

/// Whether a watcher should fire for `old -> new`
pub fn has_changed(old: &Value, new: &Value, deep: bool) -> bool {
    if deep {
        return old != new;
    }
    match (old, new) {
        (Value::Object(a), Value::Object(b)) => {
            a.len() != b.len() || a.keys().any(|key| !b.contains_key(key))
        }
        (Value::Array(a), Value::Array(b)) => a.len() != b.len(),
        _ => old != new,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deep_comparison() {
        let old = json!({ "a": { "b": 1 } });
        let new = json!({ "a": { "b": 2 } });
        assert!(has_changed(&old, &new, true));
        assert!(!has_changed(&old, &old.clone(), true));
    }

    #[test]
    fn test_shallow_comparison_ignores_nested_changes() {
        let old = json!({ "a": { "b": 1 } });
        let new = json!({ "a": { "b": 2 } });
        assert!(!has_changed(&old, &new, false));

        let added = json!({ "a": { "b": 1 }, "c": 0 });
        assert!(has_changed(&old, &added, false));

        assert!(has_changed(&json!([1]), &json!([1, 2]), false));
        assert!(has_changed(&json!(1), &json!(2), false));
    }
}
