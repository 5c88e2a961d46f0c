//! Single commit or dispatch against the store.

use super::emit;
use crate::demo::{parse_payload, Session};
use anyhow::{anyhow, bail, Result};
use arbor_core::CommitOptions;
use serde_json::json;

pub fn commit(
    session: &Session,
    kind: &str,
    payload: Option<&str>,
    silent: bool,
    pretty: bool,
) -> Result<()> {
    let payload = parse_payload(payload)?;
    if !session.store.has_mutation(kind) {
        bail!("Unknown mutation type: {}", kind);
    }

    let options = if silent {
        CommitOptions::new().with_silent()
    } else {
        CommitOptions::new()
    };
    session.store.commit_with(kind, payload, options);
    session.settle();

    emit(session.store.state().as_ref(), pretty)
}

/// Dispatch `kind` and print `{"result", "state"}` once every handler
/// has settled.
pub async fn dispatch(
    session: &Session,
    kind: &str,
    payload: Option<&str>,
    pretty: bool,
) -> Result<()> {
    let payload = parse_payload(payload)?;
    let Some(pending) = session.store.dispatch(kind, payload) else {
        bail!("Unknown action type: {}", kind);
    };

    let result = pending
        .await
        .map_err(|err| anyhow!("Action {} failed: {}", kind, err))?;
    session.settle();

    emit(
        &json!({
            "result": result,
            "state": session.store.state().as_ref(),
        }),
        pretty,
    )
}
