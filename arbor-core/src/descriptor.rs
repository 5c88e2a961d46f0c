//! Module descriptors
//!
//! A [`ModuleDescriptor`] is the static definition of a module: its initial
//! state, handlers, getters and child modules. Descriptors are cheap to
//! clone; every handler is reference counted.

use crate::action::{ActionContext, ActionReturn};
use crate::error::StoreError;
use crate::getters::Getters;
use arbor_types::{ModulePath, NAMESPACE_SEPARATOR};
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Synchronous state transition over the owning module's local state
pub type MutationFn = Arc<dyn Fn(&mut Value, &Value) + Send + Sync>;

/// Action handler, invoked with a context bound to the owning module
pub type ActionFn = Arc<dyn Fn(ActionContext, Value) -> ActionReturn + Send + Sync>;

/// Derived value over `(local state, local getters, root state, root getters)`
pub type GetterFn = Arc<dyn Fn(&Value, &Getters, &Value, &Getters) -> Value + Send + Sync>;

/// An action handler plus its registration flag
#[derive(Clone)]
pub struct ActionDef {
    pub handler: ActionFn,
    /// Register under the bare name even inside a namespaced module
    pub root: bool,
}

/// Static definition of a module and its children
#[derive(Clone, Default)]
pub struct ModuleDescriptor {
    pub namespaced: bool,
    /// Initial state, `{}` when absent
    pub state: Option<Value>,
    pub mutations: IndexMap<String, MutationFn>,
    pub actions: IndexMap<String, ActionDef>,
    pub getters: IndexMap<String, GetterFn>,
    pub modules: IndexMap<String, ModuleDescriptor>,
}

impl ModuleDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespaced(mut self) -> Self {
        self.namespaced = true;
        self
    }

    pub fn state(mut self, state: Value) -> Self {
        self.state = Some(state);
        self
    }

    pub fn mutation<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut Value, &Value) + Send + Sync + 'static,
    {
        self.mutations.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn action<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ActionContext, Value) -> ActionReturn + Send + Sync + 'static,
    {
        self.actions.insert(
            name.into(),
            ActionDef {
                handler: Arc::new(handler),
                root: false,
            },
        );
        self
    }

    /// An action registered globally even when this module is namespaced
    pub fn root_action<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ActionContext, Value) -> ActionReturn + Send + Sync + 'static,
    {
        self.actions.insert(
            name.into(),
            ActionDef {
                handler: Arc::new(handler),
                root: true,
            },
        );
        self
    }

    pub fn getter<F>(mut self, name: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&Value, &Getters, &Value, &Getters) -> Value + Send + Sync + 'static,
    {
        self.getters.insert(name.into(), Arc::new(getter));
        self
    }

    pub fn module(mut self, name: impl Into<String>, module: ModuleDescriptor) -> Self {
        self.modules.insert(name.into(), module);
        self
    }

    /// Check child module names recursively
    pub fn validate(&self, path: &ModulePath) -> Result<(), StoreError> {
        for (name, child) in &self.modules {
            if name.is_empty() || name.contains(NAMESPACE_SEPARATOR) {
                return Err(StoreError::InvalidModuleName {
                    path: path.clone(),
                    name: name.clone(),
                });
            }
            child.validate(&path.child(name.as_str()))?;
        }
        Ok(())
    }
}

impl fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("namespaced", &self.namespaced)
            .field("state", &self.state)
            .field("mutations", &self.mutations.keys().collect::<Vec<_>>())
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .field("getters", &self.getters.keys().collect::<Vec<_>>())
            .field("modules", &self.modules)
            .finish()
    }
}
