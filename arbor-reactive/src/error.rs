//! Error types for reactive operations

use thiserror::Error;

/// Errors raised by property installation and removal
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    #[error("State path not found: {0}")]
    MissingPath(String),

    #[error("State at {0} is not an object")]
    NotAnObject(String),
}

pub type ReactiveResult<T> = Result<T, ReactiveError>;

pub(crate) fn display_path(path: &[String]) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.join(".")
    }
}
