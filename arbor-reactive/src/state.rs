//! Root state cell
//!
//! The whole state tree lives in one [`StateCell`]. Readers take cheap
//! `Arc<Value>` snapshots; writers go through [`StateCell::write`], which
//! copies on write when a snapshot is still held elsewhere, bumps the
//! revision and notifies the observer once the write lock is released.

use crate::observer::Observer;
use crate::revision::Revision;
use parking_lot::RwLock;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared, revisioned holder of the root state tree
pub struct StateCell {
    value: RwLock<Arc<Value>>,
    revision: AtomicU64,
    observer: Arc<dyn Observer>,
}

impl StateCell {
    pub fn new(value: Value, observer: Arc<dyn Observer>) -> Self {
        Self {
            value: RwLock::new(Arc::new(value)),
            revision: AtomicU64::new(Revision::ZERO.0),
            observer,
        }
    }

    /// Current root state
    pub fn snapshot(&self) -> Arc<Value> {
        self.value.read().clone()
    }

    /// Revision of the last write
    pub fn revision(&self) -> Revision {
        Revision(self.revision.load(Ordering::SeqCst))
    }

    /// Clone of the value at `path`, if it resolves
    pub fn get(&self, path: &[String]) -> Option<Value> {
        let root = self.snapshot();
        get_nested(&root, path).cloned()
    }

    /// Mutate the value at `path` in place
    ///
    /// Returns `None` without touching the revision when the path does not
    /// resolve. The write lock is held while `f` runs, so `f` must not read
    /// back through this cell.
    pub fn write<R>(&self, path: &[String], f: impl FnOnce(&mut Value) -> R) -> Option<R> {
        let result = {
            let mut guard = self.value.write();
            let root = Arc::make_mut(&mut guard);
            let target = get_nested_mut(root, path)?;
            f(target)
        };
        self.changed();
        Some(result)
    }

    /// Swap in a whole new root, returning the previous one
    pub fn replace(&self, value: Value) -> Arc<Value> {
        let previous = std::mem::replace(&mut *self.value.write(), Arc::new(value));
        self.changed();
        previous
    }

    pub fn observer(&self) -> &Arc<dyn Observer> {
        &self.observer
    }

    fn changed(&self) {
        self.revision.fetch_add(1, Ordering::SeqCst);
        self.observer.notify();
    }
}

impl fmt::Debug for StateCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateCell")
            .field("revision", &self.revision())
            .field("value", &self.snapshot())
            .finish()
    }
}

/// Walk object keys from `value`
pub fn get_nested<'a>(value: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter()
        .try_fold(value, |current, key| current.as_object()?.get(key))
}

/// Mutable counterpart of [`get_nested`]
pub fn get_nested_mut<'a>(value: &'a mut Value, path: &[String]) -> Option<&'a mut Value> {
    path.iter()
        .try_fold(value, |current, key| current.as_object_mut()?.get_mut(key))
}
