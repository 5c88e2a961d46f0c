//! The store
//!
//! [`Store`] is a cheap, cloneable handle. All state lives in one
//! [`StateCell`]; every legitimate write happens inside [`Store::with_commit`],
//! which is what strict mode checks against.
//!
//! No store lock is held while user code runs. Mutation handlers are the one
//! exception: they run under the state cell's write lock and must not call
//! back into the store.

use crate::action::Deferred;
use crate::collection::ModuleCollection;
use crate::context::LocalContext;
use crate::descriptor::ModuleDescriptor;
use crate::devtools::{self, DevtoolHook};
use crate::diagnostics::{report, Diagnostic, DiagnosticCollector, DiagnosticKind};
use crate::error::StoreError;
use crate::getters::{Getters, NamespaceView};
use crate::installer::{collect_states, StateAttachment};
use crate::registry::Registry;
use crate::subscription::{ActionSubscriber, MutationSubscriber, SubscriberList, Unwatch, Unsubscribe};
use arbor_reactive::{Observer, ReactiveRoot, StateCell, WatchOptions};
use arbor_types::{ActionRecord, Call, CommitOptions, ModulePath, MutationRecord, RegisterOptions};
use futures_util::future::join_all;
use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Called once with the constructed store
pub type Plugin = Arc<dyn Fn(&Store) + Send + Sync>;

/// Construction options
#[derive(Clone, Default)]
pub struct StoreOptions {
    /// Report every state write made outside a commit
    pub strict: bool,
    /// Connect `devtool_hook` after plugins run
    pub devtools: bool,
    pub plugins: Vec<Plugin>,
    pub devtool_hook: Option<Arc<dyn DevtoolHook>>,
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn plugin<F>(mut self, plugin: F) -> Self
    where
        F: Fn(&Store) + Send + Sync + 'static,
    {
        self.plugins.push(Arc::new(plugin));
        self
    }

    pub fn devtools(mut self, hook: Arc<dyn DevtoolHook>) -> Self {
        self.devtools = true;
        self.devtool_hook = Some(hook);
        self
    }
}

impl fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreOptions")
            .field("strict", &self.strict)
            .field("devtools", &self.devtools)
            .field("plugins", &self.plugins.len())
            .field("devtool_hook", &self.devtool_hook.is_some())
            .finish()
    }
}

/// Where the store is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorePhase {
    Constructing,
    Installed,
    /// A module registration, removal or hot update is in progress
    Installing,
}

pub(crate) struct StoreInner {
    pub(crate) observer: Arc<dyn Observer>,
    pub(crate) cell: Arc<StateCell>,
    pub(crate) root: RwLock<Option<Arc<ReactiveRoot>>>,
    pub(crate) modules: RwLock<ModuleCollection>,
    pub(crate) registry: RwLock<Registry>,
    pub(crate) local_getters: Mutex<HashMap<String, Arc<NamespaceView>>>,
    pub(crate) subscribers: Arc<SubscriberList<MutationSubscriber>>,
    pub(crate) action_subscribers: Arc<SubscriberList<ActionSubscriber>>,
    pub(crate) committing: AtomicBool,
    pub(crate) strict: bool,
    pub(crate) devtool_hook: RwLock<Option<Arc<dyn DevtoolHook>>>,
    pub(crate) diagnostics: DiagnosticCollector,
    pub(crate) phase: RwLock<StorePhase>,
    pub(crate) install_lock: ReentrantMutex<()>,
}

/// Handle to a store
#[derive(Clone)]
pub struct Store {
    pub(crate) inner: Arc<StoreInner>,
}

/// Restores the commit flag on drop, so nested and panicking commits
/// leave it as they found it
struct CommitGuard<'a> {
    flag: &'a AtomicBool,
    previous: bool,
}

impl Drop for CommitGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(self.previous, Ordering::SeqCst);
    }
}

/// Serializes structural changes and tracks the install phase
pub(crate) struct InstallGuard<'a> {
    _lock: ReentrantMutexGuard<'a, ()>,
    phase: &'a RwLock<StorePhase>,
    previous: StorePhase,
}

impl Drop for InstallGuard<'_> {
    fn drop(&mut self) {
        *self.phase.write() = self.previous;
    }
}

impl Store {
    /// Build a store from the root module descriptor
    ///
    /// Fails only on an invalid module tree. The observer is the reactive
    /// backend every state write is reported to.
    pub fn new(
        root: ModuleDescriptor,
        options: StoreOptions,
        observer: Arc<dyn Observer>,
    ) -> Result<Store, StoreError> {
        let mut modules = ModuleCollection::new(&root)?;
        let root_id = modules.root();
        let state = modules
            .module_mut(root_id)
            .map(|module| module.take_state())
            .unwrap_or_else(|| Value::Object(Default::default()));
        let attachments = collect_states(&mut modules, &ModulePath::root(), root_id);

        let cell = Arc::new(StateCell::new(state, observer.clone()));
        let store = Store {
            inner: Arc::new(StoreInner {
                observer,
                cell,
                root: RwLock::new(None),
                modules: RwLock::new(modules),
                registry: RwLock::new(Registry::default()),
                local_getters: Mutex::new(HashMap::new()),
                subscribers: Arc::new(SubscriberList::new()),
                action_subscribers: Arc::new(SubscriberList::new()),
                committing: AtomicBool::new(false),
                strict: options.strict,
                devtool_hook: RwLock::new(None),
                diagnostics: DiagnosticCollector::new(),
                phase: RwLock::new(StorePhase::Constructing),
                install_lock: ReentrantMutex::new(()),
            }),
        };

        store.attach_states(attachments);
        store.reset_store(false);
        *store.inner.phase.write() = StorePhase::Installed;

        for plugin in &options.plugins {
            plugin(&store);
        }

        if options.devtools {
            match options.devtool_hook {
                Some(hook) => devtools::connect(&store, hook),
                None => tracing::debug!("Devtools enabled without a hook, nothing to connect"),
            }
        }

        tracing::debug!(
            modules = store.inner.modules.read().len(),
            strict = store.inner.strict,
            "Store created"
        );
        Ok(store)
    }

    pub(crate) fn downgrade(&self) -> Weak<StoreInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(inner: &Weak<StoreInner>) -> Option<Store> {
        inner.upgrade().map(|inner| Store { inner })
    }

    /// Current root state
    pub fn state(&self) -> Arc<Value> {
        self.inner.cell.snapshot()
    }

    /// Root state is read-only; this only reports how to replace it
    pub fn set_state(&self, _state: Value) {
        report!(
            self.diagnostics(),
            DiagnosticKind::ReadOnlyState,
            "use store.replace_state() to explicitly replace store state"
        );
    }

    /// Getters of the whole store
    pub fn getters(&self) -> Getters {
        Getters::root(self.clone())
    }

    /// Getters of `namespace` under their local names
    pub(crate) fn local_getters(&self, namespace: &str) -> Getters {
        if namespace.is_empty() {
            return self.getters();
        }
        let cached = self.inner.local_getters.lock().get(namespace).cloned();
        let view = match cached {
            Some(view) => view,
            None => {
                let view = Arc::new(match self.active_root() {
                    Some(root) => NamespaceView::build(namespace, root.computed_keys()),
                    None => NamespaceView::default(),
                });
                self.inner
                    .local_getters
                    .lock()
                    .insert(namespace.to_string(), view.clone());
                view
            }
        };
        Getters::scoped(self.clone(), view)
    }

    /// The reactive root currently serving getters
    pub fn active_root(&self) -> Option<Arc<ReactiveRoot>> {
        self.inner.root.read().clone()
    }

    pub fn commit(&self, kind: &str, payload: Value) {
        self.commit_call(Call::typed(kind, payload), CommitOptions::default());
    }

    pub fn commit_with(&self, kind: &str, payload: Value, options: CommitOptions) {
        self.commit_call(Call::typed(kind, payload), options);
    }

    /// Commit either call shape
    pub fn commit_call(&self, call: Call, options: CommitOptions) {
        match call.into_parts() {
            Some((kind, payload)) => self.commit_record(MutationRecord::new(kind, payload), options),
            None => report!(
                self.diagnostics(),
                DiagnosticKind::InvalidCall,
                "expects string as the type, but found an object without one"
            ),
        }
    }

    pub(crate) fn commit_record(&self, mutation: MutationRecord, options: CommitOptions) {
        let handlers = self.inner.registry.read().mutations.get(&mutation.kind).cloned();
        let Some(handlers) = handlers else {
            report!(
                self.diagnostics(),
                DiagnosticKind::UnknownMutation,
                "unknown mutation type: {}",
                mutation.kind
            );
            return;
        };

        tracing::trace!(kind = %mutation.kind, handlers = handlers.len(), "Committing mutation");
        self.with_commit(|| {
            for handler in &handlers {
                if !handler.invoke(&self.inner.cell, &mutation.payload) {
                    report!(
                        self.diagnostics(),
                        DiagnosticKind::MissingState,
                        "state of module {} is missing, mutation {} skipped",
                        handler.local.path(),
                        mutation.kind
                    );
                }
            }
        });

        let state = self.state();
        for subscriber in self.inner.subscribers.snapshot() {
            subscriber(&mutation, &state);
        }

        if options.silent {
            report!(
                self.diagnostics(),
                DiagnosticKind::Deprecated,
                "mutation type: {}. Silent option has been removed. Use the filter functionality in the devtools",
                mutation.kind
            );
        }
    }

    /// Dispatch an action
    ///
    /// Returns `None` for an unknown type. Otherwise the returned
    /// [`Deferred`] resolves with the handler's value, or with an array of
    /// values when several modules registered the type. `after` hooks of
    /// action subscribers run once the result is awaited and succeeded.
    ///
    /// Synchronous handler work happens here, but a deferred body runs only
    /// when the returned value is polled. Spawn it on an executor to
    /// dispatch without awaiting.
    pub fn dispatch(&self, kind: &str, payload: Value) -> Option<Deferred> {
        self.dispatch_call(Call::typed(kind, payload))
    }

    pub fn dispatch_call(&self, call: Call) -> Option<Deferred> {
        match call.into_parts() {
            Some((kind, payload)) => self.dispatch_record(ActionRecord::new(kind, payload)),
            None => {
                report!(
                    self.diagnostics(),
                    DiagnosticKind::InvalidCall,
                    "expects string as the type, but found an object without one"
                );
                None
            }
        }
    }

    pub(crate) fn dispatch_record(&self, action: ActionRecord) -> Option<Deferred> {
        let handlers = self.inner.registry.read().actions.get(&action.kind).cloned();
        let Some(handlers) = handlers else {
            report!(
                self.diagnostics(),
                DiagnosticKind::UnknownAction,
                "unknown action type: {}",
                action.kind
            );
            return None;
        };

        let state = self.state();
        for subscriber in self.inner.action_subscribers.snapshot() {
            if let Some(before) = &subscriber.before {
                if let Err(err) = before(&action, &state) {
                    report!(
                        self.diagnostics(),
                        DiagnosticKind::SubscriberFailure,
                        "error in before action subscribers: {:#}",
                        err
                    );
                }
            }
        }

        tracing::trace!(kind = %action.kind, handlers = handlers.len(), "Dispatching action");
        let result = match handlers.as_slice() {
            [handler] => handler.invoke(self, action.payload.clone()),
            handlers => {
                let pending: Vec<Deferred> = handlers
                    .iter()
                    .map(|handler| handler.invoke(self, action.payload.clone()))
                    .collect();
                Deferred::new(async move {
                    // Every handler settles before the first rejection is surfaced
                    join_all(pending)
                        .await
                        .into_iter()
                        .collect::<Result<Vec<_>, _>>()
                        .map(Value::Array)
                })
            }
        };

        let store = self.clone();
        Some(Deferred::new(async move {
            let value = result.await?;
            let state = store.state();
            for subscriber in store.inner.action_subscribers.snapshot() {
                if let Some(after) = &subscriber.after {
                    if let Err(err) = after(&action, &state) {
                        report!(
                            store.diagnostics(),
                            DiagnosticKind::SubscriberFailure,
                            "error in after action subscribers: {:#}",
                            err
                        );
                    }
                }
            }
            Ok(value)
        }))
    }

    /// Watch a value derived from `(state, getters)`
    pub fn watch<G, C>(&self, getter: G, callback: C, options: WatchOptions) -> Unwatch
    where
        G: Fn(&Value, &Getters) -> Value + Send + Sync + 'static,
        C: Fn(&Value, &Value) + Send + Sync + 'static,
    {
        let store = self.downgrade();
        let selector = Box::new(move || match Store::upgrade(&store) {
            Some(store) => getter(&store.state(), &store.getters()),
            None => Value::Null,
        });
        let id = self
            .inner
            .observer
            .watch(selector, Box::new(callback), options);

        let observer = Arc::downgrade(&self.inner.observer);
        Unsubscribe::new(move || {
            if let Some(observer) = observer.upgrade() {
                observer.unwatch(id);
            }
        })
    }

    /// Swap the whole root state
    pub fn replace_state(&self, state: Value) {
        self.with_commit(|| {
            self.inner.cell.replace(state);
        });
    }

    /// Run `f` with the commit flag raised
    ///
    /// State writes made inside `f` count as legitimate in strict mode.
    pub fn with_commit<R>(&self, f: impl FnOnce() -> R) -> R {
        let previous = self.inner.committing.swap(true, Ordering::SeqCst);
        let _guard = CommitGuard {
            flag: &self.inner.committing,
            previous,
        };
        f()
    }

    pub fn is_committing(&self) -> bool {
        self.inner.committing.load(Ordering::SeqCst)
    }

    /// Add a module at `path` after construction
    ///
    /// Missing intermediate modules are created empty. Unless
    /// `preserve_state` is set, the descriptor's state is attached under
    /// the parent's state, replacing whatever lived under that key.
    pub fn register_module(
        &self,
        path: impl Into<ModulePath>,
        descriptor: ModuleDescriptor,
        options: RegisterOptions,
    ) -> Result<(), StoreError> {
        let path = path.into();
        if path.is_root() {
            return Err(StoreError::RootRegistration);
        }

        let _installing = self.begin_install();
        let attachments = {
            let mut modules = self.inner.modules.write();
            let registered = modules.register(&path, &descriptor, true)?;
            if registered.replaced {
                report!(
                    self.diagnostics(),
                    DiagnosticKind::DuplicateModule,
                    "module at {} was already registered and has been replaced",
                    path
                );
            }
            if options.preserve_state {
                Vec::new()
            } else {
                collect_states(&mut *modules, &registered.path, registered.id)
            }
        };

        self.attach_states(attachments);
        self.reset_store(false);
        tracing::debug!(path = %path, "Module registered");
        Ok(())
    }

    /// Remove a module added with [`Store::register_module`]
    ///
    /// The root, unknown paths and modules declared at construction are
    /// reported and left alone.
    pub fn unregister_module(&self, path: impl Into<ModulePath>) {
        let path = path.into();
        let _installing = self.begin_install();

        if let Err(err) = self.inner.modules.write().unregister(&path) {
            report!(
                self.diagnostics(),
                DiagnosticKind::InvalidUnregister,
                "{}",
                err
            );
            return;
        }

        let (Some(parent), Some(name)) = (path.parent(), path.name()) else {
            return;
        };
        self.with_commit(|| {
            if let Err(err) =
                self.inner
                    .observer
                    .delete_property(&self.inner.cell, parent.segments(), name)
            {
                report!(
                    self.diagnostics(),
                    DiagnosticKind::StatePlacement,
                    "could not remove state of module {}: {}",
                    path,
                    err
                );
            }
        });

        self.reset_store(false);
        tracing::debug!(path = %path, "Module unregistered");
    }

    pub fn has_module(&self, path: impl Into<ModulePath>) -> bool {
        self.inner.modules.read().get(&path.into()).is_some()
    }

    /// Replace handler definitions, keeping state
    ///
    /// Modules missing from the current tree are reported and skipped.
    pub fn hot_update(&self, descriptor: ModuleDescriptor) {
        if let Err(err) = descriptor.validate(&ModulePath::root()) {
            report!(
                self.diagnostics(),
                DiagnosticKind::HotUpdateMismatch,
                "hot update rejected: {}",
                err
            );
            return;
        }

        let _installing = self.begin_install();
        let skipped = self.inner.modules.write().update(&descriptor);
        for message in skipped {
            report!(
                self.diagnostics(),
                DiagnosticKind::HotUpdateMismatch,
                "{}",
                message
            );
        }
        self.reset_store(true);
        tracing::debug!("Hot update applied");
    }

    /// Local context of the module at `path`
    pub fn module_context(&self, path: impl Into<ModulePath>) -> Option<Arc<LocalContext>> {
        let modules = self.inner.modules.read();
        let id = modules.get(&path.into())?;
        modules.module(id)?.context().cloned()
    }

    /// Local context of the namespaced module registered under `namespace`
    pub fn module_by_namespace(&self, namespace: &str) -> Option<Arc<LocalContext>> {
        let id = *self.inner.registry.read().namespaces.get(namespace)?;
        let modules = self.inner.modules.read();
        modules.module(id)?.context().cloned()
    }

    pub fn has_mutation(&self, kind: &str) -> bool {
        self.inner.registry.read().mutations.contains_key(kind)
    }

    pub fn has_action(&self, kind: &str) -> bool {
        self.inner.registry.read().actions.contains_key(kind)
    }

    pub fn is_strict(&self) -> bool {
        self.inner.strict
    }

    pub fn phase(&self) -> StorePhase {
        *self.inner.phase.read()
    }

    pub fn diagnostics(&self) -> &DiagnosticCollector {
        &self.inner.diagnostics
    }

    /// Snapshot of every diagnostic reported so far
    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        let diagnostics = self.inner.diagnostics.diagnostics();
        self.inner.diagnostics.clear();
        diagnostics
    }

    /// The state cell behind the store
    ///
    /// Writing through it bypasses commits; strict stores report that.
    pub fn state_cell(&self) -> &Arc<StateCell> {
        &self.inner.cell
    }

    pub fn observer(&self) -> &Arc<dyn Observer> {
        &self.inner.observer
    }

    pub(crate) fn devtool_hook(&self) -> Option<Arc<dyn DevtoolHook>> {
        self.inner.devtool_hook.read().clone()
    }

    pub(crate) fn begin_install(&self) -> InstallGuard<'_> {
        let lock = self.inner.install_lock.lock();
        let previous = std::mem::replace(&mut *self.inner.phase.write(), StorePhase::Installing);
        InstallGuard {
            _lock: lock,
            phase: &self.inner.phase,
            previous,
        }
    }

    /// Place collected module state under its parent's state
    pub(crate) fn attach_states(&self, attachments: Vec<StateAttachment>) {
        if attachments.is_empty() {
            return;
        }
        self.with_commit(|| {
            for StateAttachment { path, state } in attachments {
                let (Some(parent), Some(name)) = (path.parent(), path.name()) else {
                    continue;
                };
                match self.inner.observer.install_property(
                    &self.inner.cell,
                    parent.segments(),
                    name,
                    state,
                ) {
                    Ok(Some(_)) => report!(
                        self.diagnostics(),
                        DiagnosticKind::StateOverride,
                        "state field \"{}\" was overridden by a module with the same name at \"{}\"",
                        name,
                        path
                    ),
                    Ok(None) => {}
                    Err(err) => report!(
                        self.diagnostics(),
                        DiagnosticKind::StatePlacement,
                        "could not attach state of module {}: {}",
                        path,
                        err
                    ),
                }
            }
        });
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("phase", &self.phase())
            .field("strict", &self.inner.strict)
            .field("modules", &self.inner.modules.read().len())
            .field("revision", &self.inner.cell.revision())
            .finish()
    }
}
