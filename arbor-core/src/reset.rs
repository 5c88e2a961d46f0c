//! Registry rebuilds and reactive root swaps
//!
//! Any structural change (module registered or removed, hot update) rebuilds
//! the registries from the module tree and swaps in a new reactive root. The
//! replaced root is disposed through the observer's deferral queue, so
//! readers in flight during the swap still see a consistent root.

use crate::diagnostics::{report, DiagnosticKind};
use crate::installer::Installer;
use crate::registry::Registry;
use crate::store::Store;
use arbor_reactive::{ComputedFn, ComputedSet, ReactiveRoot, WatchOptions};
use arbor_types::ModulePath;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

impl Store {
    /// Rebuild every registry from the module tree, then the root
    pub(crate) fn reset_store(&self, hot: bool) {
        let mut registry = Registry::default();
        {
            let mut modules = self.inner.modules.write();
            let root = modules.root();
            Installer::new(self, &mut *modules, &mut registry).install(&ModulePath::root(), root);
        }
        *self.inner.registry.write() = registry;
        self.reset_root(hot);
    }

    /// Swap in a reactive root built from the current getter registry
    pub(crate) fn reset_root(&self, hot: bool) {
        let old = self.inner.root.read().clone();
        self.inner.local_getters.lock().clear();

        let computed: ComputedSet = self
            .inner
            .registry
            .read()
            .getters
            .iter()
            .map(|(kind, getter)| {
                let store = self.downgrade();
                let getter = getter.clone();
                let compute: ComputedFn = Arc::new(move || match Store::upgrade(&store) {
                    Some(store) => getter.evaluate(&store),
                    None => Value::Null,
                });
                (kind.clone(), compute)
            })
            .collect();

        let root = self
            .inner
            .observer
            .create_root(self.inner.cell.clone(), computed);
        *self.inner.root.write() = Some(root.clone());

        if self.inner.strict {
            self.enable_strict_mode(&root);
        }

        if let Some(old) = old {
            // Only the active root observes writes; memo disposal can wait
            old.release_watchers(self.inner.observer.as_ref());
            if hot {
                self.with_commit(|| {
                    old.detach();
                    self.inner.observer.notify();
                });
            }
            let observer = Arc::downgrade(&self.inner.observer);
            self.inner.observer.defer(Box::new(move || {
                if let Some(observer) = observer.upgrade() {
                    old.destroy(observer.as_ref());
                }
            }));
        }
        tracing::debug!(hot, "Reactive root reset");
    }

    /// Report every change of the root's state made outside a commit
    ///
    /// The watcher fires on revision bumps only. The last seen snapshot is
    /// kept as an `Arc`, and values are compared only when the snapshot
    /// pointer moved.
    fn enable_strict_mode(&self, root: &Arc<ReactiveRoot>) {
        let watched = Arc::downgrade(root);
        let revisions = watched.clone();
        let store = self.downgrade();
        let seen = Mutex::new(root.state());
        let id = self.inner.observer.watch(
            Box::new(move || {
                revisions
                    .upgrade()
                    .and_then(|root| root.state_cell())
                    .map(|cell| json!(cell.revision().0))
                    .unwrap_or(Value::Null)
            }),
            Box::new(move |_, _| {
                let Some(store) = Store::upgrade(&store) else {
                    return;
                };
                let current = watched.upgrade().and_then(|root| root.state());
                let changed = {
                    let mut last = seen.lock();
                    let changed = match (last.as_ref(), current.as_ref()) {
                        (Some(old), Some(new)) => !Arc::ptr_eq(old, new) && old != new,
                        (None, None) => false,
                        _ => true,
                    };
                    *last = current;
                    changed
                };
                if changed && !store.is_committing() {
                    report!(
                        store.diagnostics(),
                        DiagnosticKind::StrictViolation,
                        "do not mutate store state outside mutation handlers"
                    );
                }
            }),
            WatchOptions::new().sync(),
        );
        root.adopt_watcher(id);
    }
}
