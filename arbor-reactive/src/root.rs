//! Reactive roots: the state reference plus memoized computed values
//!
//! A root is rebuilt every time the store's getter set changes. Computed
//! values are memoized per key and stay valid only for the revision they
//! were computed at, so any state write makes the next read recompute.

use crate::observer::{Observer, WatchId};
use crate::revision::Revision;
use crate::state::StateCell;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A computed accessor
pub type ComputedFn = Arc<dyn Fn() -> Value + Send + Sync>;

/// Computed accessors keyed by name, in registration order
pub type ComputedSet = IndexMap<String, ComputedFn>;

/// Lifecycle of a reactive root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootStatus {
    /// Currently serving the store
    Active,
    /// State reference dropped after a hot swap, disposal pending
    Detached,
    /// Watchers removed and memo cleared
    Destroyed,
}

/// A memoized computed value
#[derive(Debug, Clone)]
struct MemoEntry {
    value: Value,
    computed_at: Revision,
}

/// State reference plus computed accessors
pub struct ReactiveRoot {
    state: RwLock<Option<Arc<StateCell>>>,
    computed: ComputedSet,
    memo: Mutex<HashMap<String, MemoEntry>>,
    watchers: Mutex<Vec<WatchId>>,
    status: RwLock<RootStatus>,
}

impl ReactiveRoot {
    pub fn new(cell: Arc<StateCell>, computed: ComputedSet) -> Self {
        Self {
            state: RwLock::new(Some(cell)),
            computed,
            memo: Mutex::new(HashMap::new()),
            watchers: Mutex::new(Vec::new()),
            status: RwLock::new(RootStatus::Active),
        }
    }

    /// The wrapped state cell, `None` once detached
    pub fn state_cell(&self) -> Option<Arc<StateCell>> {
        self.state.read().clone()
    }

    /// Snapshot of the wrapped state, `None` once detached
    pub fn state(&self) -> Option<Arc<Value>> {
        self.state.read().as_ref().map(|cell| cell.snapshot())
    }

    pub fn status(&self) -> RootStatus {
        *self.status.read()
    }

    pub fn has_computed(&self, key: &str) -> bool {
        self.computed.contains_key(key)
    }

    /// Names of all computed accessors, in registration order
    pub fn computed_keys(&self) -> impl Iterator<Item = &str> {
        self.computed.keys().map(String::as_str)
    }

    /// Read a computed value, recomputing if the state moved on
    pub fn computed(&self, key: &str) -> Option<Value> {
        let compute = self.computed.get(key)?.clone();
        let revision = self.state.read().as_ref().map(|cell| cell.revision());

        if let Some(revision) = revision {
            if let Some(entry) = self.memo.lock().get(key) {
                if entry.computed_at == revision {
                    return Some(entry.value.clone());
                }
            }
        }

        // No lock is held here: computed values may read other computed values.
        let value = compute();

        if let Some(revision) = revision {
            self.memo.lock().insert(
                key.to_string(),
                MemoEntry {
                    value: value.clone(),
                    computed_at: revision,
                },
            );
        }
        Some(value)
    }

    /// Number of memoized values
    pub fn memo_len(&self) -> usize {
        self.memo.lock().len()
    }

    /// Tie a watcher's lifetime to this root
    pub fn adopt_watcher(&self, id: WatchId) {
        self.watchers.lock().push(id);
    }

    /// Drop the state reference so the root can no longer pass for the
    /// active one
    pub fn detach(&self) {
        *self.state.write() = None;
        self.memo.lock().clear();
        *self.status.write() = RootStatus::Detached;
    }

    /// Unregister owned watchers, leaving state and memo in place
    pub fn release_watchers(&self, observer: &dyn Observer) {
        let released: Vec<WatchId> = self.watchers.lock().drain(..).collect();
        for id in released {
            observer.unwatch(id);
        }
    }

    /// Remove owned watchers and clear the memo
    pub fn destroy(&self, observer: &dyn Observer) {
        self.release_watchers(observer);
        self.memo.lock().clear();
        *self.status.write() = RootStatus::Destroyed;
        tracing::debug!("Reactive root destroyed");
    }
}

impl fmt::Debug for ReactiveRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveRoot")
            .field("status", &self.status())
            .field("computed", &self.computed.keys().collect::<Vec<_>>())
            .field("memoized", &self.memo_len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactor::Reactor;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn doubled(cell: &Arc<StateCell>, calls: &Arc<AtomicUsize>) -> ComputedSet {
        let cell = cell.clone();
        let calls = calls.clone();
        let mut computed = ComputedSet::new();
        computed.insert(
            "doubled".to_string(),
            Arc::new(move || {
                calls.fetch_add(1, Ordering::SeqCst);
                json!(cell.snapshot()["count"].as_i64().unwrap_or(0) * 2)
            }),
        );
        computed
    }

    #[test]
    fn test_computed_is_memoized_per_revision() {
        let reactor = Arc::new(Reactor::new());
        let cell = Arc::new(StateCell::new(json!({ "count": 2 }), reactor.clone()));
        let calls = Arc::new(AtomicUsize::new(0));
        let root = reactor.create_root(cell.clone(), doubled(&cell, &calls));

        assert_eq!(root.computed("doubled"), Some(json!(4)));
        assert_eq!(root.computed("doubled"), Some(json!(4)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cell.write(&["count".to_string()], |v| *v = json!(5));
        assert_eq!(root.computed("doubled"), Some(json!(10)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert_eq!(root.computed("missing"), None);
    }

    #[test]
    fn test_detach_and_destroy() {
        let reactor = Arc::new(Reactor::new());
        let cell = Arc::new(StateCell::new(json!({ "count": 2 }), reactor.clone()));
        let calls = Arc::new(AtomicUsize::new(0));
        let root = reactor.create_root(cell.clone(), doubled(&cell, &calls));

        let id = reactor.watch(
            Box::new(|| Value::Null),
            Box::new(|_, _| {}),
            Default::default(),
        );
        root.adopt_watcher(id);
        assert_eq!(root.status(), RootStatus::Active);

        root.detach();
        assert_eq!(root.status(), RootStatus::Detached);
        assert!(root.state().is_none());

        root.destroy(reactor.as_ref());
        assert_eq!(root.status(), RootStatus::Destroyed);
        assert!(reactor.is_empty());
    }

    #[test]
    fn test_release_watchers_keeps_root_usable() {
        let reactor = Arc::new(Reactor::new());
        let cell = Arc::new(StateCell::new(json!({ "count": 2 }), reactor.clone()));
        let calls = Arc::new(AtomicUsize::new(0));
        let root = reactor.create_root(cell.clone(), doubled(&cell, &calls));

        let id = reactor.watch(
            Box::new(|| Value::Null),
            Box::new(|_, _| {}),
            Default::default(),
        );
        root.adopt_watcher(id);

        root.release_watchers(reactor.as_ref());
        assert!(reactor.is_empty());
        assert_eq!(root.status(), RootStatus::Active);
        assert_eq!(root.computed("doubled"), Some(json!(4)));

        // Releasing twice is harmless
        root.release_watchers(reactor.as_ref());
        assert!(reactor.is_empty());
    }
}
