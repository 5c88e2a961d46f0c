//! Module tree
//!
//! Modules live in an arena indexed by [`ModuleId`]. Parent links are ids,
//! so the tree can be walked both ways without reference cycles, and a
//! module's slot is freed when it is unregistered.

use crate::context::LocalContext;
use crate::descriptor::{ActionDef, GetterFn, ModuleDescriptor, MutationFn};
use crate::error::StoreError;
use arbor_types::{ModulePath, NAMESPACE_SEPARATOR};
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Index of a module in the collection arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(usize);

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module#{}", self.0)
    }
}

/// A node of the module tree
pub struct Module {
    name: String,
    parent: Option<ModuleId>,
    /// Registered after construction, and therefore removable
    runtime: bool,
    namespaced: bool,
    /// Descriptor state not yet attached to the root tree
    raw_state: Option<Value>,
    mutations: IndexMap<String, MutationFn>,
    actions: IndexMap<String, ActionDef>,
    getters: IndexMap<String, GetterFn>,
    children: IndexMap<String, ModuleId>,
    context: Option<Arc<LocalContext>>,
}

impl Module {
    fn from_descriptor(
        name: String,
        parent: Option<ModuleId>,
        descriptor: &ModuleDescriptor,
        runtime: bool,
    ) -> Self {
        Self {
            name,
            parent,
            runtime,
            namespaced: descriptor.namespaced,
            raw_state: Some(descriptor.state.clone().unwrap_or_else(empty_state)),
            mutations: descriptor.mutations.clone(),
            actions: descriptor.actions.clone(),
            getters: descriptor.getters.clone(),
            children: IndexMap::new(),
            context: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<ModuleId> {
        self.parent
    }

    pub fn is_runtime(&self) -> bool {
        self.runtime
    }

    pub fn is_namespaced(&self) -> bool {
        self.namespaced
    }

    pub fn mutations(&self) -> &IndexMap<String, MutationFn> {
        &self.mutations
    }

    pub fn actions(&self) -> &IndexMap<String, ActionDef> {
        &self.actions
    }

    pub fn getters(&self) -> &IndexMap<String, GetterFn> {
        &self.getters
    }

    pub fn children(&self) -> &IndexMap<String, ModuleId> {
        &self.children
    }

    pub fn child(&self, name: &str) -> Option<ModuleId> {
        self.children.get(name).copied()
    }

    /// Local context bound at installation
    pub fn context(&self) -> Option<&Arc<LocalContext>> {
        self.context.as_ref()
    }

    pub(crate) fn set_context(&mut self, context: Arc<LocalContext>) {
        self.context = Some(context);
    }

    /// Hand the descriptor state over for attachment
    pub(crate) fn take_state(&mut self) -> Value {
        self.raw_state.take().unwrap_or_else(empty_state)
    }

    /// Swap in new definitions, keeping state and children
    fn update(&mut self, descriptor: &ModuleDescriptor) {
        self.namespaced = descriptor.namespaced;
        self.mutations = descriptor.mutations.clone();
        self.actions = descriptor.actions.clone();
        self.getters = descriptor.getters.clone();
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("runtime", &self.runtime)
            .field("namespaced", &self.namespaced)
            .field("children", &self.children.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Result of a successful [`ModuleCollection::register`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registered {
    /// Topmost node created by the registration
    pub id: ModuleId,
    pub path: ModulePath,
    /// A module already lived at the target path and was replaced
    pub replaced: bool,
}

/// Tree of modules mirroring the state tree
pub struct ModuleCollection {
    nodes: Vec<Option<Module>>,
    free: Vec<usize>,
    root: ModuleId,
}

impl ModuleCollection {
    /// Build the static tree from the root descriptor
    pub fn new(root: &ModuleDescriptor) -> Result<Self, StoreError> {
        root.validate(&ModulePath::root())?;
        let mut collection = Self {
            nodes: Vec::new(),
            free: Vec::new(),
            root: ModuleId(0),
        };
        collection.root = collection.insert_tree(String::new(), None, root, false);
        Ok(collection)
    }

    pub fn root(&self) -> ModuleId {
        self.root
    }

    pub fn module(&self, id: ModuleId) -> Option<&Module> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    pub(crate) fn module_mut(&mut self, id: ModuleId) -> Option<&mut Module> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Resolve a path to a module
    pub fn get(&self, path: &ModulePath) -> Option<ModuleId> {
        path.segments()
            .iter()
            .try_fold(self.root, |id, name| self.module(id)?.child(name))
    }

    /// Number of live modules
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Namespace prefix for `path`: `name/` for every namespaced module
    /// along the path, the root excluded
    pub fn namespace(&self, path: &ModulePath) -> String {
        let mut namespace = String::new();
        let mut id = self.root;
        for name in path.segments() {
            let Some(child) = self.module(id).and_then(|module| module.child(name)) else {
                break;
            };
            id = child;
            if self.module(id).map(Module::is_namespaced).unwrap_or(false) {
                namespace.push_str(name);
                namespace.push(NAMESPACE_SEPARATOR);
            }
        }
        namespace
    }

    /// Attach a runtime module at `path`, creating missing intermediate
    /// modules on the way
    pub fn register(
        &mut self,
        path: &ModulePath,
        descriptor: &ModuleDescriptor,
        runtime: bool,
    ) -> Result<Registered, StoreError> {
        if path.is_root() {
            return Err(StoreError::RootRegistration);
        }
        let mut checked = ModulePath::root();
        for name in path.segments() {
            if name.is_empty() || name.contains(NAMESPACE_SEPARATOR) {
                return Err(StoreError::InvalidModuleName {
                    path: checked,
                    name: name.to_string(),
                });
            }
            checked = checked.child(name.as_str());
        }
        descriptor.validate(path)?;

        let mut parent = self.root;
        let mut topmost: Option<(ModuleId, ModulePath)> = None;
        let mut current = ModulePath::root();
        let (leaf, ancestors) = path
            .segments()
            .split_last()
            .ok_or(StoreError::RootRegistration)?;

        for segment in ancestors {
            current = current.child(segment.as_str());
            let existing = self.module(parent).and_then(|module| module.child(segment));
            parent = match existing {
                Some(id) => id,
                None => {
                    let id = self.insert_tree(
                        segment.clone(),
                        Some(parent),
                        &ModuleDescriptor::new(),
                        runtime,
                    );
                    if topmost.is_none() {
                        topmost = Some((id, current.clone()));
                    }
                    id
                }
            };
        }

        let replaced = match self.module(parent).and_then(|module| module.child(leaf)) {
            Some(old) => {
                self.remove_subtree(old);
                true
            }
            None => false,
        };
        let id = self.insert_tree(leaf.clone(), Some(parent), descriptor, runtime);
        let (id, path) = topmost.unwrap_or((id, path.clone()));

        Ok(Registered { id, path, replaced })
    }

    /// Detach the runtime module at `path` and free its subtree
    pub fn unregister(&mut self, path: &ModulePath) -> Result<(), StoreError> {
        let Some(name) = path.name() else {
            return Err(StoreError::RootUnregistration);
        };
        let parent = path
            .parent()
            .and_then(|parent| self.get(&parent))
            .ok_or_else(|| StoreError::ModuleNotFound(path.clone()))?;
        let id = self
            .module(parent)
            .and_then(|module| module.child(name))
            .ok_or_else(|| StoreError::ModuleNotFound(path.clone()))?;

        if !self.module(id).map(Module::is_runtime).unwrap_or(false) {
            return Err(StoreError::StaticModule(path.clone()));
        }

        self.remove_subtree(id);
        Ok(())
    }

    /// Apply new definitions to the existing tree
    ///
    /// State is left alone. Children that do not exist yet are not added;
    /// a message is returned for each of them.
    pub fn update(&mut self, descriptor: &ModuleDescriptor) -> Vec<String> {
        let mut skipped = Vec::new();
        self.update_node(self.root, &ModulePath::root(), descriptor, &mut skipped);
        skipped
    }

    fn update_node(
        &mut self,
        id: ModuleId,
        path: &ModulePath,
        descriptor: &ModuleDescriptor,
        skipped: &mut Vec<String>,
    ) {
        let Some(module) = self.module_mut(id) else {
            return;
        };
        module.update(descriptor);
        let children = module.children.clone();

        for (name, child) in &descriptor.modules {
            let child_path = path.child(name.as_str());
            match children.get(name) {
                Some(&child_id) => self.update_node(child_id, &child_path, child, skipped),
                None => skipped.push(format!(
                    "trying to add a new module '{}' on hot reloading at {}, manual reload is needed",
                    name, path
                )),
            }
        }
    }

    fn insert_tree(
        &mut self,
        name: String,
        parent: Option<ModuleId>,
        descriptor: &ModuleDescriptor,
        runtime: bool,
    ) -> ModuleId {
        let module = Module::from_descriptor(name.clone(), parent, descriptor, runtime);
        let id = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(module);
                ModuleId(slot)
            }
            None => {
                self.nodes.push(Some(module));
                ModuleId(self.nodes.len() - 1)
            }
        };

        if let Some(parent) = parent.and_then(|parent| self.module_mut(parent)) {
            parent.children.insert(name, id);
        }

        for (child_name, child) in &descriptor.modules {
            self.insert_tree(child_name.clone(), Some(id), child, runtime);
        }
        id
    }

    fn remove_subtree(&mut self, id: ModuleId) {
        let Some(module) = self.nodes.get_mut(id.0).and_then(Option::take) else {
            return;
        };
        self.free.push(id.0);

        if let Some(parent) = module.parent.and_then(|parent| self.module_mut(parent)) {
            parent.children.shift_remove(&module.name);
        }
        for child in module.children.values() {
            self.remove_subtree(*child);
        }
    }
}

impl fmt::Debug for ModuleCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleCollection")
            .field("root", &self.root)
            .field("modules", &self.len())
            .finish()
    }
}

fn empty_state() -> Value {
    Value::Object(Default::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree() -> ModuleCollection {
        let root = ModuleDescriptor::new()
            .state(json!({ "count": 1 }))
            .module(
                "a",
                ModuleDescriptor::new()
                    .namespaced()
                    .module("inner", ModuleDescriptor::new())
                    .module("deep", ModuleDescriptor::new().namespaced()),
            )
            .module("b", ModuleDescriptor::new());
        ModuleCollection::new(&root).unwrap()
    }

    #[test]
    fn test_namespace_skips_plain_modules() {
        let modules = tree();
        assert_eq!(modules.namespace(&ModulePath::root()), "");
        assert_eq!(modules.namespace(&ModulePath::from("a")), "a/");
        assert_eq!(modules.namespace(&ModulePath::from(["a", "inner"])), "a/");
        assert_eq!(modules.namespace(&ModulePath::from(["a", "deep"])), "a/deep/");
        assert_eq!(modules.namespace(&ModulePath::from("b")), "");
    }

    #[test]
    fn test_register_creates_intermediate_modules() {
        let mut modules = tree();
        let before = modules.len();

        let registered = modules
            .register(&ModulePath::from(["x", "y"]), &ModuleDescriptor::new(), true)
            .unwrap();

        assert_eq!(registered.path, ModulePath::from("x"));
        assert!(!registered.replaced);
        assert_eq!(modules.len(), before + 2);
        assert!(modules.get(&ModulePath::from(["x", "y"])).is_some());
        assert!(modules.module(registered.id).unwrap().is_runtime());
    }

    #[test]
    fn test_register_root_is_rejected() {
        let mut modules = tree();
        let err = modules
            .register(&ModulePath::root(), &ModuleDescriptor::new(), true)
            .unwrap_err();
        assert_eq!(err, StoreError::RootRegistration);
    }

    #[test]
    fn test_register_checks_every_segment() {
        let mut modules = tree();
        let before = modules.len();

        let err = modules
            .register(&ModulePath::from(["a/b", "c"]), &ModuleDescriptor::new(), true)
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::InvalidModuleName {
                path: ModulePath::root(),
                name: "a/b".to_string(),
            }
        );

        let err = modules
            .register(&ModulePath::from(["x", "", "z"]), &ModuleDescriptor::new(), true)
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::InvalidModuleName {
                path: ModulePath::from("x"),
                name: String::new(),
            }
        );

        assert_eq!(modules.len(), before);
        assert!(modules.get(&ModulePath::from("x")).is_none());
    }

    #[test]
    fn test_unregister_guards() {
        let mut modules = tree();
        assert_eq!(
            modules.unregister(&ModulePath::root()),
            Err(StoreError::RootUnregistration)
        );
        assert_eq!(
            modules.unregister(&ModulePath::from("missing")),
            Err(StoreError::ModuleNotFound(ModulePath::from("missing")))
        );
        assert_eq!(
            modules.unregister(&ModulePath::from("b")),
            Err(StoreError::StaticModule(ModulePath::from("b")))
        );
    }

    #[test]
    fn test_unregister_frees_subtree_and_reuses_slots() {
        let mut modules = tree();
        let before = modules.len();
        modules
            .register(
                &ModulePath::from("c"),
                &ModuleDescriptor::new().module("d", ModuleDescriptor::new()),
                true,
            )
            .unwrap();
        assert_eq!(modules.len(), before + 2);

        modules.unregister(&ModulePath::from("c")).unwrap();
        assert_eq!(modules.len(), before);
        assert!(modules.get(&ModulePath::from("c")).is_none());

        let registered = modules
            .register(&ModulePath::from("c"), &ModuleDescriptor::new(), true)
            .unwrap();
        assert!(registered.id.0 < before + 2);
    }

    #[test]
    fn test_update_reports_new_children() {
        let mut modules = tree();
        let updated = ModuleDescriptor::new()
            .mutation("inc", |_, _| {})
            .module("a", ModuleDescriptor::new().namespaced())
            .module("new", ModuleDescriptor::new());

        let skipped = modules.update(&updated);

        assert_eq!(skipped.len(), 1);
        assert!(skipped[0].contains("'new'"));
        assert!(modules.get(&ModulePath::from("new")).is_none());
        let root = modules.module(modules.root()).unwrap();
        assert!(root.mutations().contains_key("inc"));
    }
}
