//! Action return values and the context handed to action handlers

use crate::context::LocalContext;
use crate::error::{ActionError, ActionResult};
use crate::getters::Getters;
use crate::store::Store;
use arbor_types::{CommitOptions, DispatchOptions};
use futures_util::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Deferred result of a dispatch
///
/// Every dispatch resolves through a `Deferred`, including actions that
/// returned a plain value.
pub struct Deferred {
    inner: BoxFuture<'static, ActionResult>,
}

impl Deferred {
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = ActionResult> + Send + 'static,
    {
        Self {
            inner: Box::pin(future),
        }
    }

    pub fn resolved(value: Value) -> Self {
        Self::new(std::future::ready(Ok(value)))
    }

    pub fn rejected(error: ActionError) -> Self {
        Self::new(std::future::ready(Err(error)))
    }
}

impl Future for Deferred {
    type Output = ActionResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred").finish_non_exhaustive()
    }
}

/// What an action handler returns
pub enum ActionReturn {
    /// Settled synchronously
    Ready(ActionResult),
    /// Settles later
    Pending(Deferred),
}

impl ActionReturn {
    /// Resolve with `Value::Null`
    pub fn done() -> Self {
        ActionReturn::Ready(Ok(Value::Null))
    }

    pub fn value(value: Value) -> Self {
        ActionReturn::Ready(Ok(value))
    }

    pub fn reject(error: impl Into<ActionError>) -> Self {
        ActionReturn::Ready(Err(error.into()))
    }

    /// Settle with `future`, which runs only once the dispatch result is
    /// polled
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = ActionResult> + Send + 'static,
    {
        ActionReturn::Pending(Deferred::new(future))
    }

    pub fn into_deferred(self) -> Deferred {
        match self {
            ActionReturn::Ready(Ok(value)) => Deferred::resolved(value),
            ActionReturn::Ready(Err(error)) => Deferred::rejected(error),
            ActionReturn::Pending(deferred) => deferred,
        }
    }
}

impl From<Value> for ActionReturn {
    fn from(value: Value) -> Self {
        ActionReturn::value(value)
    }
}

impl From<ActionResult> for ActionReturn {
    fn from(result: ActionResult) -> Self {
        ActionReturn::Ready(result)
    }
}

impl From<Deferred> for ActionReturn {
    fn from(deferred: Deferred) -> Self {
        ActionReturn::Pending(deferred)
    }
}

/// Handle passed to action handlers
///
/// `commit`, `dispatch`, `state` and `getters` are bound to the owning
/// module; the `root_*` accessors always see the whole store.
#[derive(Clone)]
pub struct ActionContext {
    store: Store,
    local: Arc<LocalContext>,
}

impl ActionContext {
    pub(crate) fn new(store: Store, local: Arc<LocalContext>) -> Self {
        Self { store, local }
    }

    pub fn commit(&self, kind: &str, payload: Value) {
        self.local.commit(kind, payload);
    }

    pub fn commit_with(&self, kind: &str, payload: Value, options: CommitOptions) {
        self.local.commit_with(kind, payload, options);
    }

    pub fn dispatch(&self, kind: &str, payload: Value) -> Option<Deferred> {
        self.local.dispatch(kind, payload)
    }

    pub fn dispatch_with(
        &self,
        kind: &str,
        payload: Value,
        options: DispatchOptions,
    ) -> Option<Deferred> {
        self.local.dispatch_with(kind, payload, options)
    }

    /// Current state of the owning module
    pub fn state(&self) -> Value {
        self.local.state_in(&self.store)
    }

    pub fn getters(&self) -> Getters {
        self.store.local_getters(self.local.namespace())
    }

    pub fn root_state(&self) -> Arc<Value> {
        self.store.state()
    }

    pub fn root_getters(&self) -> Getters {
        self.store.getters()
    }

    pub fn namespace(&self) -> &str {
        self.local.namespace()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}

impl fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionContext")
            .field("namespace", &self.local.namespace())
            .field("path", self.local.path())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_ready_returns_resolve_through_deferred() {
        let value = ActionReturn::value(json!(3)).into_deferred().await.unwrap();
        assert_eq!(value, json!(3));

        let err = ActionReturn::reject(ActionError::rejected("nope"))
            .into_deferred()
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Action rejected: nope");
    }

    #[tokio::test]
    async fn test_pending_return_is_awaited() {
        let deferred = ActionReturn::deferred(async {
            tokio::task::yield_now().await;
            Ok(json!("later"))
        })
        .into_deferred();
        assert_eq!(deferred.await.unwrap(), json!("later"));
    }
}
