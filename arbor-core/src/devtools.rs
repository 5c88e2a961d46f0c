//! Devtools bridge
//!
//! A [`DevtoolHook`] receives the store's initial state, every committed
//! mutation and every rejected action. Time travel goes the other way
//! through [`Store::travel_to`].

use crate::store::Store;
use arbor_types::MutationRecord;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Event emitted to a devtool hook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DevtoolEvent {
    Init { state: Value },
    Mutation { mutation: MutationRecord, state: Value },
    ActionError { kind: String, message: String },
}

/// Sink for devtool events
pub trait DevtoolHook: Send + Sync {
    fn emit(&self, event: DevtoolEvent);
}

/// Hook that keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingHook {
    events: Mutex<Vec<DevtoolEvent>>,
}

impl RecordingHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DevtoolEvent> {
        self.events.lock().clone()
    }
}

impl DevtoolHook for RecordingHook {
    fn emit(&self, event: DevtoolEvent) {
        self.events.lock().push(event);
    }
}

/// Attach `hook` to `store`
pub(crate) fn connect(store: &Store, hook: Arc<dyn DevtoolHook>) {
    *store.inner.devtool_hook.write() = Some(hook.clone());
    hook.emit(DevtoolEvent::Init {
        state: store.state().as_ref().clone(),
    });
    store.subscribe(move |mutation, state| {
        hook.emit(DevtoolEvent::Mutation {
            mutation: mutation.clone(),
            state: state.clone(),
        });
    });
    tracing::debug!("Devtool hook connected");
}

impl Store {
    /// Replace the whole state with a recorded snapshot
    pub fn travel_to(&self, state: Value) {
        tracing::debug!("Travelling to recorded state");
        self.replace_state(state);
    }
}
