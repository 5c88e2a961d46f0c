//! Mutation and action subscribers

use crate::store::Store;
use arbor_types::{ActionRecord, MutationRecord};
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Called after every committed mutation with the post-mutation state
pub type MutationSubscriber = Arc<dyn Fn(&MutationRecord, &Value) + Send + Sync>;

/// Called around an action; an error is reported, never propagated
pub type ActionHook = Arc<dyn Fn(&ActionRecord, &Value) -> anyhow::Result<()> + Send + Sync>;

/// Hooks run before an action's handlers and after its result resolves
#[derive(Clone, Default)]
pub struct ActionSubscriber {
    pub before: Option<ActionHook>,
    pub after: Option<ActionHook>,
}

impl ActionSubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    /// A subscriber with only a `before` hook
    pub fn before<F>(hook: F) -> Self
    where
        F: Fn(&ActionRecord, &Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::new().with_before(hook)
    }

    /// A subscriber with only an `after` hook
    pub fn after<F>(hook: F) -> Self
    where
        F: Fn(&ActionRecord, &Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::new().with_after(hook)
    }

    pub fn with_before<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ActionRecord, &Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.before = Some(Arc::new(hook));
        self
    }

    pub fn with_after<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ActionRecord, &Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.after = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for ActionSubscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionSubscriber")
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .finish()
    }
}

/// Ordered subscriber list
///
/// Every subscription gets its own id, so subscribing the same function
/// twice registers it twice.
pub(crate) struct SubscriberList<T> {
    entries: Mutex<Vec<(u64, T)>>,
    next_id: AtomicU64,
}

impl<T: Clone> SubscriberList<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn add(&self, subscriber: T) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.entries.lock().push((id, subscriber));
        id
    }

    pub(crate) fn remove(&self, id: u64) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(entry, _)| *entry != id);
        entries.len() != before
    }

    /// Copy of the current list, so subscribers may (un)subscribe while
    /// being notified
    pub(crate) fn snapshot(&self) -> Vec<T> {
        self.entries
            .lock()
            .iter()
            .map(|(_, subscriber)| subscriber.clone())
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Handle returned by `subscribe`, `subscribe_action` and `watch`
///
/// Dropping the handle keeps the subscription alive; call
/// [`Unsubscribe::unsubscribe`] to remove it. Removing twice is a no-op.
pub struct Unsubscribe {
    remove: Box<dyn Fn() + Send + Sync>,
}

/// Handle returned by `watch`
pub type Unwatch = Unsubscribe;

impl Unsubscribe {
    pub(crate) fn new(remove: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            remove: Box::new(remove),
        }
    }

    pub(crate) fn from_list<T: Clone + Send + 'static>(list: &Arc<SubscriberList<T>>, id: u64) -> Self {
        let list: Weak<SubscriberList<T>> = Arc::downgrade(list);
        Self::new(move || {
            if let Some(list) = list.upgrade() {
                list.remove(id);
            }
        })
    }

    pub fn unsubscribe(&self) {
        (self.remove)();
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe").finish_non_exhaustive()
    }
}

impl Store {
    /// Observe every committed mutation
    pub fn subscribe<F>(&self, subscriber: F) -> Unsubscribe
    where
        F: Fn(&MutationRecord, &Value) + Send + Sync + 'static,
    {
        let list = &self.inner.subscribers;
        let id = list.add(Arc::new(subscriber));
        Unsubscribe::from_list(list, id)
    }

    /// Observe every dispatched action
    pub fn subscribe_action(&self, subscriber: ActionSubscriber) -> Unsubscribe {
        let list = &self.inner.action_subscribers;
        let id = list.add(subscriber);
        Unsubscribe::from_list(list, id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    pub fn action_subscriber_count(&self) -> usize {
        self.inner.action_subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_subscriber_twice_is_two_entries() {
        let list = Arc::new(SubscriberList::new());
        let hook: Arc<dyn Fn() + Send + Sync> = Arc::new(|| {});
        let first = list.add(hook.clone());
        let second = list.add(hook);
        assert_ne!(first, second);
        assert_eq!(list.len(), 2);

        let handle = Unsubscribe::from_list(&list, first);
        handle.unsubscribe();
        handle.unsubscribe();
        assert_eq!(list.len(), 1);
    }
}
