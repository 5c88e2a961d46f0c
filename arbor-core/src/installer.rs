//! Module installation
//!
//! [`Installer`] walks the module collection and registers handlers, binding
//! each module to a fresh [`LocalContext`]. Installation never touches the
//! state tree: [`collect_states`] gathers the state of newly added modules,
//! which the store attaches once every lock is released.

use crate::collection::{ModuleCollection, ModuleId};
use crate::context::LocalContext;
use crate::diagnostics::{report, DiagnosticKind};
use crate::registry::{RegisteredAction, RegisteredMutation, Registry, WrappedGetter};
use crate::store::Store;
use arbor_types::ModulePath;
use serde_json::Value;
use std::sync::Arc;

/// Module state waiting to be placed under its parent's state
#[derive(Debug, Clone)]
pub(crate) struct StateAttachment {
    pub(crate) path: ModulePath,
    pub(crate) state: Value,
}

/// Take the descriptor state of `id` and its descendants, parents first
///
/// The root's own state is never collected; it seeds the state cell.
pub(crate) fn collect_states(
    modules: &mut ModuleCollection,
    path: &ModulePath,
    id: ModuleId,
) -> Vec<StateAttachment> {
    let mut attachments = Vec::new();
    collect_into(modules, path, id, &mut attachments);
    attachments
}

fn collect_into(
    modules: &mut ModuleCollection,
    path: &ModulePath,
    id: ModuleId,
    attachments: &mut Vec<StateAttachment>,
) {
    let Some(module) = modules.module_mut(id) else {
        return;
    };
    if !path.is_root() {
        attachments.push(StateAttachment {
            path: path.clone(),
            state: module.take_state(),
        });
    }
    let children: Vec<(String, ModuleId)> = module
        .children()
        .iter()
        .map(|(name, child)| (name.clone(), *child))
        .collect();
    for (name, child) in children {
        collect_into(modules, &path.child(name), child, attachments);
    }
}

pub(crate) struct Installer<'a> {
    store: &'a Store,
    modules: &'a mut ModuleCollection,
    registry: &'a mut Registry,
}

impl<'a> Installer<'a> {
    pub(crate) fn new(
        store: &'a Store,
        modules: &'a mut ModuleCollection,
        registry: &'a mut Registry,
    ) -> Self {
        Self {
            store,
            modules,
            registry,
        }
    }

    /// Install the module `id` at `path` and all its children
    pub(crate) fn install(&mut self, path: &ModulePath, id: ModuleId) {
        let namespace = self.modules.namespace(path);
        let Some(module) = self.modules.module_mut(id) else {
            return;
        };

        let local = Arc::new(LocalContext::new(
            self.store,
            namespace.clone(),
            path.clone(),
        ));
        module.set_context(local.clone());

        if module.is_namespaced() {
            if let Some(previous) = self.registry.add_namespace(namespace.clone(), id) {
                if previous != id {
                    report!(
                        self.store.diagnostics(),
                        DiagnosticKind::DuplicateNamespace,
                        "duplicate namespace {} for the namespaced module {}",
                        namespace,
                        path
                    );
                }
            }
        }

        let Some(module) = self.modules.module(id) else {
            return;
        };
        let registry = &mut *self.registry;

        for (name, handler) in module.mutations() {
            registry.add_mutation(
                format!("{}{}", namespace, name),
                RegisteredMutation {
                    local: local.clone(),
                    handler: handler.clone(),
                },
            );
        }

        for (name, action) in module.actions() {
            let kind = if action.root {
                name.clone()
            } else {
                format!("{}{}", namespace, name)
            };
            registry.add_action(RegisteredAction {
                kind,
                local: local.clone(),
                handler: action.handler.clone(),
            });
        }

        for (name, getter) in module.getters() {
            let kind = format!("{}{}", namespace, name);
            let added = registry.add_getter(
                kind.clone(),
                WrappedGetter {
                    local: local.clone(),
                    getter: getter.clone(),
                },
            );
            if !added {
                report!(
                    self.store.diagnostics(),
                    DiagnosticKind::DuplicateGetter,
                    "duplicate getter key: {}",
                    kind
                );
            }
        }

        let children: Vec<(String, ModuleId)> = module
            .children()
            .iter()
            .map(|(name, child)| (name.clone(), *child))
            .collect();
        for (name, child) in children {
            self.install(&path.child(name), child);
        }
    }
}
