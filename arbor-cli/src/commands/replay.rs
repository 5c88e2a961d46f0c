//! Replay a recorded sequence of intents.
//!
//! ```yaml
//! steps:
//!   - commit: add
//!     payload: 2
//!   - dispatch: a/addFun
//!   - replace_state: { count: 0, a: { count: 0 }, b: { count: 0 } }
//! ```

use super::emit;
use crate::demo::Session;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;

#[derive(Debug, Deserialize)]
struct Script {
    #[serde(default)]
    steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
struct Step {
    #[serde(default)]
    commit: Option<String>,
    #[serde(default)]
    dispatch: Option<String>,
    #[serde(default)]
    replace_state: Option<Value>,
    #[serde(default)]
    payload: Value,
}

enum Intent {
    Commit(String),
    Dispatch(String),
    Replace(Value),
}

impl Step {
    fn into_intent(self, index: usize) -> Result<(Intent, Value)> {
        let intent = match (self.commit, self.dispatch, self.replace_state) {
            (Some(kind), None, None) => Intent::Commit(kind),
            (None, Some(kind), None) => Intent::Dispatch(kind),
            (None, None, Some(state)) => Intent::Replace(state),
            _ => bail!(
                "Step {} must have exactly one of commit, dispatch or replace_state",
                index
            ),
        };
        Ok((intent, self.payload))
    }
}

/// Run every step in order and print the final state, root getters,
/// action results and diagnostics.
///
/// Diagnostics do not stop a replay; a rejected action does.
pub async fn replay(session: &Session, file: &Path, pretty: bool) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let script: Script = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", file.display()))?;

    let mut results = Vec::new();
    for (index, step) in script.steps.into_iter().enumerate() {
        let (intent, payload) = step.into_intent(index)?;
        match intent {
            Intent::Commit(kind) => session.store.commit(&kind, payload),
            Intent::Dispatch(kind) => {
                if let Some(pending) = session.store.dispatch(&kind, payload) {
                    let value = pending
                        .await
                        .with_context(|| format!("Step {}: action {} failed", index, kind))?;
                    results.push(value);
                }
            }
            Intent::Replace(state) => session.store.replace_state(state),
        }
        session.settle();
    }

    let mut report = json!({
        "state": session.store.state().as_ref(),
        "getters": session.store.getters().to_json(),
        "results": results,
        "diagnostics": session.diagnostics_json(),
    });
    if let Some(events) = session.devtools_json() {
        report["devtools"] = events;
    }
    emit(&report, pretty)
}
