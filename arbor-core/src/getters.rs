//! Read access to computed getters

use crate::store::Store;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Local-to-global key mapping for one namespace
#[derive(Debug, Default)]
pub(crate) struct NamespaceView {
    namespace: String,
    keys: IndexMap<String, String>,
}

impl NamespaceView {
    /// Every global key under `namespace`, with the prefix stripped
    pub(crate) fn build<'a>(namespace: &str, global_keys: impl Iterator<Item = &'a str>) -> Self {
        let keys = global_keys
            .filter_map(|global| {
                global
                    .strip_prefix(namespace)
                    .map(|local| (local.to_string(), global.to_string()))
            })
            .collect();
        Self {
            namespace: namespace.to_string(),
            keys,
        }
    }
}

/// Getter accessor, either over the whole store or one namespace
///
/// Values are read through the active reactive root, so they are memoized
/// until the next state write.
#[derive(Clone)]
pub struct Getters {
    store: Store,
    view: Option<Arc<NamespaceView>>,
}

impl Getters {
    pub(crate) fn root(store: Store) -> Self {
        Self { store, view: None }
    }

    pub(crate) fn scoped(store: Store, view: Arc<NamespaceView>) -> Self {
        Self {
            store,
            view: Some(view),
        }
    }

    /// Namespace the keys are relative to, empty for the root accessor
    pub fn namespace(&self) -> &str {
        self.view
            .as_ref()
            .map(|view| view.namespace.as_str())
            .unwrap_or("")
    }

    fn resolve<'a>(&'a self, key: &'a str) -> Option<&'a str> {
        match &self.view {
            Some(view) => view.keys.get(key).map(String::as_str),
            None => Some(key),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let global = self.resolve(key)?;
        self.store.active_root()?.computed(global)
    }

    pub fn contains(&self, key: &str) -> bool {
        match self.resolve(key) {
            Some(global) => self
                .store
                .active_root()
                .map(|root| root.has_computed(global))
                .unwrap_or(false),
            None => false,
        }
    }

    pub fn keys(&self) -> Vec<String> {
        match &self.view {
            Some(view) => view.keys.keys().cloned().collect(),
            None => self
                .store
                .active_root()
                .map(|root| root.computed_keys().map(str::to_string).collect())
                .unwrap_or_default(),
        }
    }

    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys().is_empty()
    }

    /// Evaluate every getter into one JSON object
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .keys()
            .into_iter()
            .filter_map(|key| self.get(&key).map(|value| (key, value)))
            .collect();
        Value::Object(map)
    }
}

impl fmt::Debug for Getters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Getters")
            .field("namespace", &self.namespace())
            .field("keys", &self.keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_view_strips_prefix() {
        let globals = ["cart/total", "cart/items/count", "count", "cartish"];
        let view = NamespaceView::build("cart/", globals.iter().copied());

        assert_eq!(view.keys.get("total").map(String::as_str), Some("cart/total"));
        assert_eq!(
            view.keys.get("items/count").map(String::as_str),
            Some("cart/items/count")
        );
        assert!(!view.keys.contains_key("count"));
        assert_eq!(view.keys.len(), 2);
    }
}
