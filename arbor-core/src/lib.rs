//! Arbor store engine
//!
//! A hierarchical state container: one JSON state tree, changed only by
//! synchronous mutations, with asynchronous actions, memoized getters and a
//! tree of optionally namespaced modules that can be added, removed and
//! hot-swapped at runtime.
//!
//! - **Modules**: [`ModuleDescriptor`] trees, kept in a [`ModuleCollection`]
//! - **Intents**: `commit` runs mutations, `dispatch` runs actions and
//!   returns a [`Deferred`]
//! - **Namespaces**: a [`LocalContext`] per module rewrites intent types
//!   and scopes getters
//! - **Observation**: any [`arbor_reactive::Observer`], with
//!   [`arbor_reactive::Reactor`] as the default
//! - **Diagnostics**: misuse is logged and recorded, never fatal
//!
//! ## Example
//!
//! ```rust
//! use arbor_core::{ActionReturn, ModuleDescriptor, Store, StoreOptions};
//! use arbor_reactive::Reactor;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let counter = ModuleDescriptor::new()
//!     .namespaced()
//!     .state(json!({ "count": 0 }))
//!     .mutation("increment", |state, by| {
//!         let next = state["count"].as_i64().unwrap_or(0) + by.as_i64().unwrap_or(1);
//!         state["count"] = json!(next);
//!     })
//!     .action("increment", |ctx, by| {
//!         ctx.commit("increment", by);
//!         ActionReturn::done()
//!     });
//!
//! let root = ModuleDescriptor::new().module("counter", counter);
//! let store = Store::new(root, StoreOptions::new(), Arc::new(Reactor::new())).unwrap();
//!
//! store.commit("counter/increment", json!(2));
//! assert_eq!(store.state()["counter"]["count"], 2);
//! ```

pub mod action;
pub mod collection;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod devtools;
pub mod diagnostics;
pub mod error;
pub mod getters;
mod installer;
mod registry;
mod reset;
pub mod store;
pub mod subscription;

pub use action::{ActionContext, ActionReturn, Deferred};
pub use collection::{Module, ModuleCollection, ModuleId, Registered};
pub use config::{ConfigError, StoreConfig};
pub use context::LocalContext;
pub use descriptor::{ActionDef, ActionFn, GetterFn, ModuleDescriptor, MutationFn};
pub use devtools::{DevtoolEvent, DevtoolHook, RecordingHook};
pub use diagnostics::{Diagnostic, DiagnosticCollector, DiagnosticKind, Severity};
pub use error::{ActionError, ActionResult, StoreError, StoreResult};
pub use getters::Getters;
pub use store::{Plugin, Store, StoreOptions, StorePhase};
pub use subscription::{ActionHook, ActionSubscriber, MutationSubscriber, Unsubscribe, Unwatch};

pub use arbor_types::{
    ActionRecord, Call, CommitOptions, DispatchOptions, ModulePath, MutationRecord,
    RegisterOptions,
};
