//! Module-local views of the store
//!
//! Each installed module gets a [`LocalContext`]. For a namespaced module
//! it prefixes intent types with the namespace and checks that the prefixed
//! type exists; for a module without a namespace it forwards unchanged.

use crate::action::Deferred;
use crate::diagnostics::{report, DiagnosticKind};
use crate::getters::Getters;
use crate::store::{Store, StoreInner};
use arbor_reactive::get_nested;
use arbor_types::{ActionRecord, Call, CommitOptions, DispatchOptions, ModulePath, MutationRecord};
use serde_json::Value;
use std::fmt;
use std::sync::Weak;

/// Namespace-bound commit, dispatch, getters and state
pub struct LocalContext {
    store: Weak<StoreInner>,
    namespace: String,
    path: ModulePath,
}

impl LocalContext {
    pub(crate) fn new(store: &Store, namespace: String, path: ModulePath) -> Self {
        Self {
            store: store.downgrade(),
            namespace,
            path,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn path(&self) -> &ModulePath {
        &self.path
    }

    fn store(&self) -> Option<Store> {
        Store::upgrade(&self.store)
    }

    pub fn commit(&self, kind: &str, payload: Value) {
        self.commit_call(Call::typed(kind, payload), CommitOptions::default());
    }

    pub fn commit_with(&self, kind: &str, payload: Value, options: CommitOptions) {
        self.commit_call(Call::typed(kind, payload), options);
    }

    pub fn commit_call(&self, call: Call, options: CommitOptions) {
        let Some(store) = self.store() else {
            return;
        };
        if self.namespace.is_empty() {
            store.commit_call(call, options);
            return;
        }

        let Some((kind, payload)) = call.into_parts() else {
            report!(
                store.diagnostics(),
                DiagnosticKind::InvalidCall,
                "expects string as the type, but found an object without one"
            );
            return;
        };
        let kind = if options.root {
            kind
        } else {
            let global = format!("{}{}", self.namespace, kind);
            if !store.has_mutation(&global) {
                report!(
                    store.diagnostics(),
                    DiagnosticKind::UnknownLocalMutation,
                    "unknown local mutation type: {}, global type: {}",
                    kind,
                    global
                );
                return;
            }
            global
        };
        store.commit_record(MutationRecord::new(kind, payload), options);
    }

    pub fn dispatch(&self, kind: &str, payload: Value) -> Option<Deferred> {
        self.dispatch_call(Call::typed(kind, payload), DispatchOptions::default())
    }

    pub fn dispatch_with(
        &self,
        kind: &str,
        payload: Value,
        options: DispatchOptions,
    ) -> Option<Deferred> {
        self.dispatch_call(Call::typed(kind, payload), options)
    }

    pub fn dispatch_call(&self, call: Call, options: DispatchOptions) -> Option<Deferred> {
        let store = self.store()?;
        if self.namespace.is_empty() {
            return store.dispatch_call(call);
        }

        let Some((kind, payload)) = call.into_parts() else {
            report!(
                store.diagnostics(),
                DiagnosticKind::InvalidCall,
                "expects string as the type, but found an object without one"
            );
            return None;
        };
        let kind = if options.root {
            kind
        } else {
            let global = format!("{}{}", self.namespace, kind);
            if !store.has_action(&global) {
                report!(
                    store.diagnostics(),
                    DiagnosticKind::UnknownLocalAction,
                    "unknown local action type: {}, global type: {}",
                    kind,
                    global
                );
                return None;
            }
            global
        };
        store.dispatch_record(ActionRecord::new(kind, payload))
    }

    /// Getters of this module under their local names
    pub fn getters(&self) -> Option<Getters> {
        self.store().map(|store| store.local_getters(&self.namespace))
    }

    /// Current state of this module, read from the root on every call
    pub fn state(&self) -> Value {
        self.store()
            .map(|store| self.state_in(&store))
            .unwrap_or(Value::Null)
    }

    pub(crate) fn state_in(&self, store: &Store) -> Value {
        get_nested(&store.state(), self.path.segments())
            .cloned()
            .unwrap_or(Value::Null)
    }
}

impl fmt::Debug for LocalContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalContext")
            .field("namespace", &self.namespace)
            .field("path", &self.path)
            .finish()
    }
}
