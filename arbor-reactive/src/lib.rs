//! Arbor reactive observation backend
//!
//! This crate provides the observation capability the arbor store is built
//! on. The store depends only on the [`Observer`] trait; [`Reactor`] is the
//! default implementation.
//!
//! - **State cell**: one revisioned, copy-on-write holder of the JSON state tree
//! - **Properties**: install and delete object keys with change notification
//! - **Watchers**: deep or shallow, synchronous or batched until [`Reactor::flush`]
//! - **Roots**: a state reference plus computed values memoized per revision
//! - **Deferral**: tasks queued to run after the current flush
//!
//! ## Example
//!
//! ```rust
//! use arbor_reactive::{Observer, Reactor, StateCell, WatchOptions};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let reactor = Arc::new(Reactor::new());
//! let cell = Arc::new(StateCell::new(json!({ "count": 1 }), reactor.clone()));
//!
//! let watched = cell.clone();
//! reactor.watch(
//!     Box::new(move || watched.snapshot()["count"].clone()),
//!     Box::new(|new, old| println!("count {old} -> {new}")),
//!     WatchOptions::new().sync(),
//! );
//!
//! cell.write(&["count".to_string()], |count| *count = json!(2));
//! ```

pub mod error;
pub mod observer;
pub mod reactor;
pub mod revision;
pub mod root;
pub mod state;

pub use error::{ReactiveError, ReactiveResult};
pub use observer::{
    has_changed, DeferredTask, Observer, Selector, WatchCallback, WatchId, WatchOptions,
};
pub use reactor::{Reactor, MAX_FLUSH_ROUNDS};
pub use revision::Revision;
pub use root::{ComputedFn, ComputedSet, ReactiveRoot, RootStatus};
pub use state::{get_nested, get_nested_mut, StateCell};
