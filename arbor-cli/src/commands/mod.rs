//! CLI command implementations.

pub mod inspect;
pub mod intent;
pub mod replay;

pub use inspect::{print_getters, print_state};
pub use intent::{commit, dispatch};
pub use replay::replay;

use anyhow::Result;
use serde::Serialize;

pub(crate) fn emit<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let payload = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", payload);
    Ok(())
}
