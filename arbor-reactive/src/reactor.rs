//! Default observation backend
//!
//! The [`Reactor`] keeps an ordered set of watchers. Every state write calls
//! [`Observer::notify`]: sync watchers are re-evaluated on the spot, batched
//! watchers are queued until the host calls [`Reactor::flush`]. Deferred
//! tasks (disposal of replaced reactive roots) run at the end of a flush.

use crate::observer::{has_changed, DeferredTask, Observer, Selector, WatchCallback, WatchId, WatchOptions};
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Upper bound on flush rounds before giving up on a feedback loop
pub const MAX_FLUSH_ROUNDS: usize = 100;

struct Watcher {
    selector: Selector,
    callback: WatchCallback,
    options: WatchOptions,
    last: Mutex<Value>,
}

impl Watcher {
    /// Re-evaluate and fire the callback if the value changed
    fn run(&self) -> bool {
        let new = (self.selector)();
        let old = {
            let mut last = self.last.lock();
            if !has_changed(&last, &new, self.options.deep) {
                return false;
            }
            std::mem::replace(&mut *last, new.clone())
        };
        (self.callback)(&new, &old);
        true
    }
}

/// Publish/subscribe observation backend
pub struct Reactor {
    watchers: RwLock<IndexMap<WatchId, Arc<Watcher>>>,
    pending: Mutex<VecDeque<WatchId>>,
    deferred: Mutex<VecDeque<DeferredTask>>,
    next_id: AtomicU64,
}

impl Reactor {
    pub fn new() -> Self {
        Self {
            watchers: RwLock::new(IndexMap::new()),
            pending: Mutex::new(VecDeque::new()),
            deferred: Mutex::new(VecDeque::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Run queued watchers, then deferred tasks, until both queues drain
    ///
    /// Returns the number of watcher callbacks that fired.
    pub fn flush(&self) -> usize {
        let mut fired = 0;

        for _ in 0..MAX_FLUSH_ROUNDS {
            let queued: Vec<WatchId> = self.pending.lock().drain(..).collect();
            for id in queued {
                let watcher = self.watchers.read().get(&id).cloned();
                if let Some(watcher) = watcher {
                    if watcher.run() {
                        fired += 1;
                    }
                }
            }

            let tasks: Vec<DeferredTask> = self.deferred.lock().drain(..).collect();
            for task in tasks {
                task();
            }

            if !self.has_pending() {
                return fired;
            }
        }

        tracing::warn!(
            "Possible infinite update loop: flush did not settle after {} rounds",
            MAX_FLUSH_ROUNDS
        );
        self.pending.lock().clear();
        self.deferred.lock().clear();
        fired
    }

    /// Whether a flush has work to do
    pub fn has_pending(&self) -> bool {
        !self.pending.lock().is_empty() || !self.deferred.lock().is_empty()
    }

    /// Number of registered watchers
    pub fn len(&self) -> usize {
        self.watchers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.watchers.read().is_empty()
    }
}

impl Default for Reactor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Reactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactor")
            .field("watchers", &self.len())
            .field("pending", &self.pending.lock().len())
            .field("deferred", &self.deferred.lock().len())
            .finish()
    }
}

impl Observer for Reactor {
    fn watch(&self, selector: Selector, callback: WatchCallback, options: WatchOptions) -> WatchId {
        let id = WatchId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let initial = selector();

        if options.immediate {
            callback(&initial, &Value::Null);
        }

        let watcher = Arc::new(Watcher {
            selector,
            callback,
            options,
            last: Mutex::new(initial),
        });
        self.watchers.write().insert(id, watcher);
        id
    }

    fn unwatch(&self, id: WatchId) -> bool {
        self.pending.lock().retain(|queued| *queued != id);
        self.watchers.write().shift_remove(&id).is_some()
    }

    fn notify(&self) {
        let watchers: Vec<(WatchId, Arc<Watcher>)> = self
            .watchers
            .read()
            .iter()
            .map(|(id, watcher)| (*id, watcher.clone()))
            .collect();

        for (id, watcher) in watchers {
            if watcher.options.sync {
                watcher.run();
            } else {
                let mut pending = self.pending.lock();
                if !pending.contains(&id) {
                    pending.push_back(id);
                }
            }
        }
    }

    fn defer(&self, task: DeferredTask) {
        self.deferred.lock().push_back(task);
    }
}
