//! The counter store the CLI operates on.

use anyhow::{Context, Result};
use arbor_core::{ActionReturn, ModuleDescriptor, RecordingHook, Store, StoreConfig};
use arbor_reactive::Reactor;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

fn add(state: &mut Value, payload: &Value) {
    let step = payload.as_i64().unwrap_or(1);
    let count = state["count"].as_i64().unwrap_or(0);
    state["count"] = json!(count + step);
}

fn reduction(state: &mut Value, payload: &Value) {
    let step = payload.as_i64().unwrap_or(1);
    let count = state["count"].as_i64().unwrap_or(0);
    state["count"] = json!(count - step);
}

fn counter(initial: Value) -> ModuleDescriptor {
    ModuleDescriptor::new()
        .state(initial)
        .mutation("add", add)
        .mutation("reduction", reduction)
        .action("addFun", |ctx, payload| {
            ctx.commit("add", payload);
            ActionReturn::value(ctx.state()["count"].clone())
        })
        .action("reductionFun", |ctx, payload| {
            ctx.commit("reduction", payload);
            ActionReturn::value(ctx.state()["count"].clone())
        })
        .getter("getStateCount", |state, _, _, _| {
            json!(state["count"].as_i64().unwrap_or(0) + 1)
        })
}

/// Root counter with a namespaced module `a` and a plain module `b`.
///
/// `b` shares the root's mutation names, so a root `add` reaches both.
pub fn descriptor(config: &StoreConfig) -> ModuleDescriptor {
    let root_state = config.merge_state(json!({ "count": 1 }));
    let b = ModuleDescriptor::new()
        .state(json!({ "count": 1 }))
        .mutation("add", add)
        .mutation("reduction", reduction);

    counter(root_state)
        .module("a", counter(json!({ "count": 1 })).namespaced())
        .module("b", b)
}

/// A store built from the config file, plus what the commands need to
/// inspect it.
pub struct Session {
    pub store: Store,
    pub reactor: Arc<Reactor>,
    pub devtools: Option<Arc<RecordingHook>>,
}

impl Session {
    /// `config_path` is optional; a missing file means default settings.
    pub fn open(config_path: &Path, strict: bool) -> Result<Self> {
        let config = if config_path.exists() {
            StoreConfig::from_file(config_path).context("Failed to load configuration")?
        } else {
            tracing::debug!(path = %config_path.display(), "No config file, using defaults");
            StoreConfig::default()
        };

        let mut options = config.to_options();
        options.strict |= strict;
        options = options.plugin(|store: &Store| {
            store.subscribe(|mutation, _| {
                tracing::info!(kind = %mutation.kind, payload = %mutation.payload, "mutation");
            });
        });

        let devtools = if config.devtools {
            let hook = Arc::new(RecordingHook::new());
            options = options.devtools(hook.clone());
            Some(hook)
        } else {
            None
        };

        let reactor = Arc::new(Reactor::new());
        let store = Store::new(descriptor(&config), options, reactor.clone())
            .context("Failed to build store")?;

        Ok(Self {
            store,
            reactor,
            devtools,
        })
    }

    /// Run pending watchers
    pub fn settle(&self) {
        self.reactor.flush();
    }

    pub fn diagnostics_json(&self) -> Value {
        json!(self.store.diagnostics().diagnostics())
    }

    pub fn devtools_json(&self) -> Option<Value> {
        self.devtools.as_ref().map(|hook| json!(hook.events()))
    }
}

/// Parse a CLI payload argument as JSON, falling back to null
pub fn parse_payload(raw: Option<&str>) -> Result<Value> {
    match raw {
        Some(raw) => serde_json::from_str(raw)
            .with_context(|| format!("Payload is not valid JSON: {}", raw)),
        None => Ok(Value::Null),
    }
}
