//! Shared types for arbor
//!
//! This crate provides the vocabulary shared by the reactive layer, the
//! store engine and the CLI: module paths, intent records and the option
//! structs accepted by `commit`, `dispatch` and `register_module`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Separator appended to every namespaced module name
pub const NAMESPACE_SEPARATOR: char = '/';

/// Path of a module from the root, one segment per nesting level
///
/// The root module has the empty path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModulePath(Vec<String>);

impl ModulePath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Local name of the addressed module (last segment)
    pub fn name(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Path of the parent module, `None` for the root
    pub fn parent(&self) -> Option<ModulePath> {
        if self.0.is_empty() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// Path extended by one child segment
    pub fn child(&self, name: impl Into<String>) -> ModulePath {
        let mut segments = self.0.clone();
        segments.push(name.into());
        Self(segments)
    }

    /// Whether `self` equals `other` or lies below it
    pub fn starts_with(&self, other: &ModulePath) -> bool {
        self.0.starts_with(&other.0)
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// A bare string addresses a single top-level module.
impl From<&str> for ModulePath {
    fn from(name: &str) -> Self {
        Self(vec![name.to_string()])
    }
}

impl From<String> for ModulePath {
    fn from(name: String) -> Self {
        Self(vec![name])
    }
}

impl From<Vec<String>> for ModulePath {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

impl From<&[&str]> for ModulePath {
    fn from(segments: &[&str]) -> Self {
        Self::new(segments.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for ModulePath {
    fn from(segments: [&str; N]) -> Self {
        Self::new(segments)
    }
}

/// The two accepted call shapes for `commit` and `dispatch`
///
/// `Typed` carries the type and the payload separately. `Object` is a single
/// JSON object whose `type` field names the intent; the whole object is the
/// payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Typed { kind: String, payload: Value },
    Object(Value),
}

impl Call {
    pub fn typed(kind: impl Into<String>, payload: Value) -> Self {
        Call::Typed {
            kind: kind.into(),
            payload,
        }
    }

    pub fn object(value: Value) -> Self {
        Call::Object(value)
    }

    /// Normalize either shape into `(type, payload)`
    ///
    /// Returns `None` for an object without a string `type` field.
    pub fn into_parts(self) -> Option<(String, Value)> {
        match self {
            Call::Typed { kind, payload } => Some((kind, payload)),
            Call::Object(value) => {
                let kind = value.get("type")?.as_str()?.to_string();
                Some((kind, value))
            }
        }
    }
}

/// A committed mutation as seen by mutation subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRecord {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

impl MutationRecord {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }
}

/// A dispatched action as seen by action subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

impl ActionRecord {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }
}

/// Options accepted by `commit`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitOptions {
    /// Skip namespace prefixing in a local context
    #[serde(default)]
    pub root: bool,
    /// Removed feature, only reported
    #[serde(default)]
    pub silent: bool,
}

impl CommitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(mut self) -> Self {
        self.root = true;
        self
    }

    pub fn with_silent(mut self) -> Self {
        self.silent = true;
        self
    }
}

/// Options accepted by a local `dispatch`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOptions {
    #[serde(default)]
    pub root: bool,
}

impl DispatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(mut self) -> Self {
        self.root = true;
        self
    }
}

/// Options accepted by `register_module`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterOptions {
    /// Keep the state already present at the module path instead of
    /// attaching the descriptor's state
    #[serde(default)]
    pub preserve_state: bool,
}

impl RegisterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_preserve_state(mut self) -> Self {
        self.preserve_state = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_module_path_navigation() {
        let path = ModulePath::from(["cart", "items"]);
        assert_eq!(path.name(), Some("items"));
        assert_eq!(path.parent(), Some(ModulePath::from("cart")));
        assert_eq!(path.child("first").len(), 3);
        assert!(path.starts_with(&ModulePath::from("cart")));
        assert_eq!(path.to_string(), "cart.items");

        let root = ModulePath::root();
        assert!(root.is_root());
        assert_eq!(root.parent(), None);
        assert_eq!(root.name(), None);
    }

    #[test]
    fn test_call_shapes_normalize_to_same_parts() {
        let typed = Call::typed("increment", json!({ "by": 2 }));
        assert_eq!(
            typed.into_parts(),
            Some(("increment".to_string(), json!({ "by": 2 })))
        );

        let object = Call::object(json!({ "type": "increment", "by": 2 }));
        let (kind, payload) = object.into_parts().unwrap();
        assert_eq!(kind, "increment");
        assert_eq!(payload["by"], 2);
    }

    #[test]
    fn test_call_object_without_type() {
        assert_eq!(Call::object(json!({ "by": 2 })).into_parts(), None);
        assert_eq!(Call::object(json!({ "type": 7 })).into_parts(), None);
    }

    #[test]
    fn test_record_serializes_type_field() {
        let record = MutationRecord::new("cart/add", json!(1));
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value, json!({ "type": "cart/add", "payload": 1 }));
    }
}
