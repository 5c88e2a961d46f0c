//! Store configuration loaded from YAML

use crate::store::StoreOptions;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid initial state: {0}")]
    InvalidState(String),
}

/// Store settings, usually read from `arbor.yml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub strict: bool,

    #[serde(default)]
    pub devtools: bool,

    /// Top-level fields merged over the root module's initial state
    #[serde(default)]
    pub state: Option<Value>,

    // Internal: path to config file
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

impl StoreConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content)?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: StoreConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match &self.state {
            Some(state) if !state.is_object() => Err(ConfigError::InvalidState(format!(
                "expected a mapping, found {}",
                kind_of(state)
            ))),
            _ => Ok(()),
        }
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Options for [`Store::new`](crate::Store::new), without plugins or a
    /// devtool hook
    pub fn to_options(&self) -> StoreOptions {
        StoreOptions {
            strict: self.strict,
            devtools: self.devtools,
            ..StoreOptions::default()
        }
    }

    /// `base` with the configured top-level fields written over it
    pub fn merge_state(&self, base: Value) -> Value {
        match (base, &self.state) {
            (Value::Object(mut base), Some(Value::Object(overlay))) => {
                for (key, value) in overlay {
                    base.insert(key.clone(), value.clone());
                }
                Value::Object(base)
            }
            (base, _) => base,
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_parse_config() {
        let config = StoreConfig::from_yaml(
            r#"
strict: true
state:
  count: 5
"#,
        )
        .unwrap();

        assert!(config.strict);
        assert!(!config.devtools);
        assert_eq!(config.state, Some(json!({ "count": 5 })));
        assert!(config.to_options().strict);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = StoreConfig::from_yaml("{}").unwrap();
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn test_scalar_state_is_rejected() {
        let err = StoreConfig::from_yaml("state: 3").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidState(_)));
    }

    #[test]
    fn test_merge_state_overrides_top_level_fields() {
        let config = StoreConfig::from_yaml("state:\n  count: 9\n").unwrap();
        let merged = config.merge_state(json!({ "count": 1, "name": "demo" }));
        assert_eq!(merged, json!({ "count": 9, "name": "demo" }));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "devtools: true").unwrap();

        let config = StoreConfig::from_file(file.path()).unwrap();
        assert!(config.devtools);
        assert_eq!(config.config_path(), Some(file.path()));

        let missing = StoreConfig::from_file(Path::new("/definitely/not/here.yml"));
        assert!(matches!(missing, Err(ConfigError::ReadError(_))));
    }
}
