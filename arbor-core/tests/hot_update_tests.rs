//! Hot swapping of handler definitions

use arbor_core::{ActionReturn, DiagnosticKind, ModuleDescriptor, Store, StoreOptions};
use arbor_reactive::{Reactor, RootStatus};
use serde_json::{json, Value};
use std::sync::Arc;

fn adder(step: i64) -> impl Fn(&mut Value, &Value) + Send + Sync + 'static {
    move |state, _| {
        let count = state["count"].as_i64().unwrap_or(0);
        state["count"] = json!(count + step);
    }
}

fn tree(step: i64, label: &'static str) -> ModuleDescriptor {
    ModuleDescriptor::new()
        .state(json!({ "count": 1 }))
        .mutation("add", adder(step))
        .getter("label", move |_, _, _, _| json!(label))
        .module(
            "a",
            ModuleDescriptor::new()
                .namespaced()
                .state(json!({ "count": 1 }))
                .mutation("add", adder(step))
                .action("addTwice", |ctx, _| {
                    ctx.commit("add", Value::Null);
                    ctx.commit("add", Value::Null);
                    ActionReturn::done()
                }),
        )
}

fn build(root: ModuleDescriptor, options: StoreOptions) -> (Store, Arc<Reactor>) {
    let reactor = Arc::new(Reactor::new());
    let store = Store::new(root, options, reactor.clone()).unwrap();
    (store, reactor)
}

#[test]
fn test_hot_update_keeps_state_and_swaps_handlers() {
    let (store, _) = build(tree(1, "v1"), StoreOptions::new());
    store.commit("add", Value::Null);
    store.commit("a/add", Value::Null);
    let before = store.state();

    store.hot_update(tree(10, "v2"));

    assert_eq!(store.state(), before);
    insta::assert_json_snapshot!(store.state().as_ref(), @r###"
    {
      "a": {
        "count": 2
      },
      "count": 2
    }
    "###);

    store.commit("add", Value::Null);
    store.commit("a/add", Value::Null);
    assert_eq!(store.state()["count"], 12);
    assert_eq!(store.state()["a"]["count"], 12);
    assert_eq!(store.getters().get("label"), Some(json!("v2")));
}

#[tokio::test]
async fn test_hot_updated_actions_use_new_mutations() {
    let (store, _) = build(tree(1, "v1"), StoreOptions::new());

    store.hot_update(tree(5, "v2"));
    store.dispatch("a/addTwice", Value::Null).unwrap().await.unwrap();

    assert_eq!(store.state()["a"]["count"], 11);
}

#[test]
fn test_hot_update_detaches_the_old_root() {
    let (store, reactor) = build(tree(1, "v1"), StoreOptions::new());
    let old = store.active_root().unwrap();

    store.hot_update(tree(2, "v2"));

    assert_eq!(old.status(), RootStatus::Detached);
    assert!(old.state().is_none());
    assert!(store.active_root().unwrap().state().is_some());

    reactor.flush();
    assert_eq!(old.status(), RootStatus::Destroyed);
}

#[test]
fn test_hot_update_in_strict_mode_is_not_a_violation() {
    let (store, reactor) = build(tree(1, "v1"), StoreOptions::new().strict());

    store.hot_update(tree(2, "v2"));
    reactor.flush();
    store.commit("add", Value::Null);

    assert!(!store.diagnostics().has(DiagnosticKind::StrictViolation));
    assert_eq!(store.state()["count"], 3);
}

#[test]
fn test_new_child_on_hot_update_needs_manual_reload() {
    let (store, _) = build(tree(1, "v1"), StoreOptions::new());

    let updated = tree(1, "v1").module("fresh", ModuleDescriptor::new().state(json!({ "n": 0 })));
    store.hot_update(updated);

    assert!(!store.has_module("fresh"));
    assert!(store.state().get("fresh").is_none());
    let reported = store.diagnostics().by_kind(DiagnosticKind::HotUpdateMismatch);
    assert_eq!(reported.len(), 1);
    assert!(reported[0].message.contains("manual reload is needed"));
}

#[test]
fn test_hot_update_can_drop_handlers() {
    let (store, _) = build(tree(1, "v1"), StoreOptions::new());

    let stripped = ModuleDescriptor::new().module("a", ModuleDescriptor::new().namespaced());
    store.hot_update(stripped);

    assert!(!store.has_mutation("add"));
    assert!(!store.has_action("a/addTwice"));
    assert!(store.getters().is_empty());
    assert_eq!(store.state()["a"]["count"], 1);
}
