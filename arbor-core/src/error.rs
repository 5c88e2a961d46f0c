//! Error types for the store

use arbor_types::ModulePath;
use thiserror::Error;

/// Fatal store errors
///
/// Everything that is a usage mistake rather than a broken store (unknown
/// types, bad unregister targets, subscriber failures) is reported as a
/// [`Diagnostic`](crate::Diagnostic) instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Invalid module name {name:?} at {path}: names must be non-empty and must not contain '/'")]
    InvalidModuleName { path: ModulePath, name: String },

    #[error("Cannot register the root module dynamically")]
    RootRegistration,

    #[error("Cannot unregister the root module")]
    RootUnregistration,

    #[error("No module registered at {0}")]
    ModuleNotFound(ModulePath),

    #[error("Module at {0} was not registered at runtime and cannot be unregistered")]
    StaticModule(ModulePath),
}

/// Why an action's deferred result was rejected
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Action rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl ActionError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        ActionError::Rejected(reason.into())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of a dispatched action
pub type ActionResult = Result<serde_json::Value, ActionError>;
