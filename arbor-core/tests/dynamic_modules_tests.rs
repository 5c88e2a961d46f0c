//! Runtime registration and removal of modules

use arbor_core::{
    ActionReturn, DiagnosticKind, ModuleDescriptor, ModulePath, RegisterOptions, Store,
    StoreError, StoreOptions,
};
use arbor_reactive::{Reactor, RootStatus};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;

fn increment(state: &mut Value, _payload: &Value) {
    let count = state["count"].as_i64().unwrap_or(0);
    state["count"] = json!(count + 1);
}

fn counter() -> ModuleDescriptor {
    ModuleDescriptor::new()
        .namespaced()
        .state(json!({ "count": 0 }))
        .mutation("increment", increment)
        .action("go", |ctx, _| {
            ctx.commit("increment", Value::Null);
            ActionReturn::done()
        })
        .getter("count", |state, _, _, _| state["count"].clone())
}

fn build(root: ModuleDescriptor) -> (Store, Arc<Reactor>) {
    let reactor = Arc::new(Reactor::new());
    let store = Store::new(root, StoreOptions::new(), reactor.clone()).unwrap();
    (store, reactor)
}

fn base_root() -> ModuleDescriptor {
    ModuleDescriptor::new()
        .state(json!({ "count": 1 }))
        .mutation("increment", increment)
        .module("b", ModuleDescriptor::new().state(json!({ "count": 1 })))
}

#[test]
fn test_register_then_unregister_leaves_no_trace() {
    let (store, _) = build(base_root());
    store
        .register_module(
            ModulePath::from("a"),
            ModuleDescriptor::new().namespaced(),
            RegisterOptions::new(),
        )
        .unwrap();
    let before = store.state().as_ref().clone();
    let getters_before = store.getters().keys();

    store
        .register_module(["a", "b"], counter(), RegisterOptions::new())
        .unwrap();

    assert_eq!(store.state()["a"]["b"], json!({ "count": 0 }));
    assert!(store.has_mutation("a/b/increment"));
    assert!(store.has_action("a/b/go"));
    assert_eq!(store.getters().get("a/b/count"), Some(json!(0)));
    store.commit("a/b/increment", Value::Null);
    assert_eq!(store.state()["a"]["b"]["count"], 1);

    store.unregister_module(["a", "b"]);

    assert_eq!(*store.state(), before);
    assert!(!store.has_mutation("a/b/increment"));
    assert!(!store.has_action("a/b/go"));
    assert_eq!(store.getters().keys(), getters_before);
    assert!(!store.has_module(["a", "b"]));
    assert!(store.module_by_namespace("a/b/").is_none());
    assert!(store.diagnostics().is_empty());
}

#[test]
fn test_register_creates_missing_parents() {
    let (store, _) = build(base_root());

    store
        .register_module(["x", "y"], counter(), RegisterOptions::new())
        .unwrap();

    assert!(store.has_module("x"));
    assert_eq!(store.state()["x"], json!({ "y": { "count": 0 } }));
    // The created parent is not namespaced
    assert!(store.has_mutation("y/increment"));

    store.unregister_module(["x", "y"]);
    assert_eq!(store.state()["x"], json!({}));
    assert!(store.has_module("x"));
}

#[tokio::test]
async fn test_registered_module_is_live() {
    let (store, _) = build(base_root());
    store
        .register_module("counter", counter(), RegisterOptions::new())
        .unwrap();

    store.dispatch("counter/go", Value::Null).unwrap().await.unwrap();

    assert_eq!(store.state()["counter"]["count"], 1);
    let local = store.module_context("counter").unwrap();
    assert_eq!(local.namespace(), "counter/");
    assert_eq!(local.getters().unwrap().get("count"), Some(json!(1)));
}

#[test]
fn test_preserve_state_keeps_hydrated_state() {
    let (store, _) = build(base_root());
    store.replace_state(json!({ "count": 1, "b": { "count": 1 }, "counter": { "count": 41 } }));

    store
        .register_module(
            "counter",
            counter(),
            RegisterOptions::new().with_preserve_state(),
        )
        .unwrap();
    store.commit("counter/increment", Value::Null);

    assert_eq!(store.state()["counter"]["count"], 42);
}

#[test]
fn test_static_modules_cannot_be_unregistered() {
    let (store, _) = build(base_root());

    store.unregister_module("b");
    store.unregister_module("missing");
    store.unregister_module(ModulePath::root());

    assert_eq!(store.state()["b"], json!({ "count": 1 }));
    assert!(store.has_module("b"));
    let reported = store.diagnostics().by_kind(DiagnosticKind::InvalidUnregister);
    assert_eq!(reported.len(), 3);
    assert_eq!(
        reported[0].message,
        "Module at b was not registered at runtime and cannot be unregistered"
    );
}

#[test]
fn test_invalid_registrations_are_errors() {
    let (store, _) = build(base_root());

    assert_eq!(
        store.register_module(ModulePath::root(), counter(), RegisterOptions::new()),
        Err(StoreError::RootRegistration)
    );
    assert!(matches!(
        store.register_module("a/b", counter(), RegisterOptions::new()),
        Err(StoreError::InvalidModuleName { .. })
    ));
    assert!(matches!(
        store.register_module(["a/b", "c"], counter(), RegisterOptions::new()),
        Err(StoreError::InvalidModuleName { .. })
    ));
    assert!(!store.has_module("a/b"));
    assert!(!store.has_mutation("c/increment"));
    assert!(matches!(
        Store::new(
            ModuleDescriptor::new().module("", ModuleDescriptor::new()),
            StoreOptions::new(),
            Arc::new(Reactor::new()),
        ),
        Err(StoreError::InvalidModuleName { .. })
    ));
}

#[test]
fn test_state_field_collision_is_reported() {
    let root = base_root().state(json!({ "count": 1, "extra": "field" }));
    let (store, _) = build(root);

    store
        .register_module("extra", counter(), RegisterOptions::new())
        .unwrap();

    assert_eq!(store.state()["extra"], json!({ "count": 0 }));
    assert!(store.diagnostics().has(DiagnosticKind::StateOverride));
}

#[test]
fn test_duplicate_getter_keeps_the_first() {
    let (store, _) = build(base_root());
    let first = ModuleDescriptor::new()
        .getter("total", |_, _, _, _| json!("first"));
    let second = ModuleDescriptor::new()
        .getter("total", |_, _, _, _| json!("second"));

    store.register_module("one", first, RegisterOptions::new()).unwrap();
    store.register_module("two", second, RegisterOptions::new()).unwrap();

    assert_eq!(store.getters().get("total"), Some(json!("first")));
    assert!(store.diagnostics().has(DiagnosticKind::DuplicateGetter));
}

#[test]
fn test_reregistering_a_path_replaces_the_module() {
    let (store, _) = build(base_root());
    store.register_module("counter", counter(), RegisterOptions::new()).unwrap();

    let replacement = ModuleDescriptor::new()
        .namespaced()
        .state(json!({ "value": "new" }))
        .mutation("reset", |state, _| state["value"] = json!(""));
    store
        .register_module("counter", replacement, RegisterOptions::new())
        .unwrap();

    assert!(store.has_mutation("counter/reset"));
    assert!(!store.has_mutation("counter/increment"));
    assert_eq!(store.state()["counter"], json!({ "value": "new" }));
    assert!(store.diagnostics().has(DiagnosticKind::DuplicateModule));
}

#[test]
fn test_replaced_root_is_disposed_on_flush() {
    let (store, reactor) = build(base_root());
    let old = store.active_root().unwrap();

    store.register_module("counter", counter(), RegisterOptions::new()).unwrap();

    let current = store.active_root().unwrap();
    assert!(!Arc::ptr_eq(&old, &current));
    assert_eq!(old.status(), RootStatus::Active);

    reactor.flush();
    assert_eq!(old.status(), RootStatus::Destroyed);
    assert_eq!(current.status(), RootStatus::Active);
}

#[test]
fn test_strict_store_accepts_dynamic_registration() {
    let reactor = Arc::new(Reactor::new());
    let store = Store::new(base_root(), StoreOptions::new().strict(), reactor.clone()).unwrap();

    store.register_module("counter", counter(), RegisterOptions::new()).unwrap();
    store.unregister_module("counter");
    reactor.flush();

    assert!(!store.diagnostics().has(DiagnosticKind::StrictViolation));

    store
        .state_cell()
        .write(&["count".to_string()], |count| *count = json!(9));
    assert_eq!(store.diagnostics().count(DiagnosticKind::StrictViolation), 1);
}

#[test]
fn test_registration_does_not_stack_strict_watchers() {
    let reactor = Arc::new(Reactor::new());
    let store = Store::new(base_root(), StoreOptions::new().strict(), reactor.clone()).unwrap();
    let watchers = reactor.len();

    store.register_module("x", counter(), RegisterOptions::new()).unwrap();
    store.register_module("y", counter(), RegisterOptions::new()).unwrap();
    store.unregister_module("x");
    assert_eq!(reactor.len(), watchers);

    store
        .state_cell()
        .write(&["count".to_string()], |count| *count = json!(7));
    assert_eq!(store.diagnostics().count(DiagnosticKind::StrictViolation), 1);
}

proptest! {
    #[test]
    fn prop_register_unregister_roundtrip(names in prop::collection::btree_set("m[a-e]{1,3}", 0..6)) {
        let (store, reactor) = build(base_root());
        let state = store.state().as_ref().clone();

        for name in &names {
            store
                .register_module(name.as_str(), counter(), RegisterOptions::new())
                .unwrap();
            let mutation = format!("{}/increment", name);
            prop_assert!(store.has_mutation(&mutation));
        }
        for name in &names {
            store.unregister_module(name.as_str());
        }
        reactor.flush();

        let final_state = store.state();
        prop_assert_eq!(final_state.as_ref(), &state);
        prop_assert!(store.getters().is_empty());
        for name in &names {
            prop_assert!(!store.has_module(name.as_str()));
            let action = format!("{}/go", name);
            prop_assert!(!store.has_action(&action));
        }
        prop_assert!(store.diagnostics().is_empty());
    }
}
