//! Global handler registries
//!
//! Handlers are stored under their namespaced type, each bound to the local
//! context of the module that declared it. Several modules may register the
//! same mutation or action type; getters must be unique.

use crate::action::{ActionContext, Deferred};
use crate::collection::ModuleId;
use crate::context::LocalContext;
use crate::descriptor::{ActionFn, GetterFn, MutationFn};
use crate::devtools::DevtoolEvent;
use crate::store::Store;
use arbor_reactive::{get_nested, StateCell};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct RegisteredMutation {
    pub(crate) local: Arc<LocalContext>,
    pub(crate) handler: MutationFn,
}

impl RegisteredMutation {
    /// Run the handler against the module's current local state
    ///
    /// Returns `false` when the module state no longer resolves.
    pub(crate) fn invoke(&self, cell: &StateCell, payload: &Value) -> bool {
        cell.write(self.local.path().segments(), |state| {
            (self.handler)(state, payload)
        })
        .is_some()
    }
}

#[derive(Clone)]
pub(crate) struct RegisteredAction {
    pub(crate) kind: String,
    pub(crate) local: Arc<LocalContext>,
    pub(crate) handler: ActionFn,
}

impl RegisteredAction {
    pub(crate) fn invoke(&self, store: &Store, payload: Value) -> Deferred {
        let context = ActionContext::new(store.clone(), self.local.clone());
        let deferred = (self.handler)(context, payload).into_deferred();

        match store.devtool_hook() {
            Some(hook) => {
                let kind = self.kind.clone();
                Deferred::new(async move {
                    let result = deferred.await;
                    if let Err(err) = &result {
                        hook.emit(DevtoolEvent::ActionError {
                            kind,
                            message: err.to_string(),
                        });
                    }
                    result
                })
            }
            None => deferred,
        }
    }
}

#[derive(Clone)]
pub(crate) struct WrappedGetter {
    pub(crate) local: Arc<LocalContext>,
    pub(crate) getter: GetterFn,
}

impl WrappedGetter {
    pub(crate) fn evaluate(&self, store: &Store) -> Value {
        let root_state = store.state();
        let local_state = get_nested(&root_state, self.local.path().segments())
            .cloned()
            .unwrap_or(Value::Null);
        let local_getters = store.local_getters(self.local.namespace());
        let root_getters = store.getters();
        (self.getter)(&local_state, &local_getters, &root_state, &root_getters)
    }
}

#[derive(Clone, Default)]
pub(crate) struct Registry {
    pub(crate) mutations: HashMap<String, Vec<RegisteredMutation>>,
    pub(crate) actions: HashMap<String, Vec<RegisteredAction>>,
    pub(crate) getters: IndexMap<String, WrappedGetter>,
    pub(crate) namespaces: HashMap<String, ModuleId>,
}

impl Registry {
    pub(crate) fn add_mutation(&mut self, kind: String, mutation: RegisteredMutation) {
        self.mutations.entry(kind).or_default().push(mutation);
    }

    pub(crate) fn add_action(&mut self, action: RegisteredAction) {
        self.actions
            .entry(action.kind.clone())
            .or_default()
            .push(action);
    }

    /// Returns `false` and keeps the first getter on a duplicate key
    pub(crate) fn add_getter(&mut self, kind: String, getter: WrappedGetter) -> bool {
        if self.getters.contains_key(&kind) {
            return false;
        }
        self.getters.insert(kind, getter);
        true
    }

    /// Returns the module previously mapped to `namespace`
    pub(crate) fn add_namespace(&mut self, namespace: String, id: ModuleId) -> Option<ModuleId> {
        self.namespaces.insert(namespace, id)
    }
}
