//! Read-only views of the store.

use super::emit;
use crate::demo::Session;
use anyhow::{bail, Result};

pub fn print_state(session: &Session, pretty: bool) -> Result<()> {
    emit(session.store.state().as_ref(), pretty)
}

/// Print root getters, or the local view of one namespace.
pub fn print_getters(session: &Session, namespace: Option<&str>, pretty: bool) -> Result<()> {
    let getters = match namespace {
        None => session.store.getters(),
        Some(namespace) => match session
            .store
            .module_by_namespace(namespace)
            .and_then(|local| local.getters())
        {
            Some(getters) => getters,
            None => bail!("No module with namespace {:?}", namespace),
        },
    };
    emit(&getters.to_json(), pretty)
}
