//! Deployment configuration and option resolution.
//!
//! A deployment is driven by an immutable mapping from option name to value,
//! assembled once at startup from a YAML file plus `--opt key=value`
//! command-line overrides. Lookups are pure reads; a missing required option
//! fails fast with `DavitError::MissingOption` naming the primary key.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{DavitError, Result};

/// A single configuration value.
///
/// Numbers are carried as their string representation; no other implicit
/// coercion happens between value types.
#[derive(Debug, Clone, PartialEq)]
pub enum OptValue {
    String(String),
    Bool(bool),
    List(Vec<String>),
    Map(BTreeMap<String, OptValue>),
}

impl OptValue {
    /// Render a scalar value as a string. Lists and maps have no string form.
    pub fn as_str(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.clone()),
            Self::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

fn from_yaml(value: serde_yaml::Value) -> Result<OptValue> {
    match value {
        serde_yaml::Value::Bool(b) => Ok(OptValue::Bool(b)),
        serde_yaml::Value::String(s) => Ok(OptValue::String(s)),
        serde_yaml::Value::Number(n) => Ok(OptValue::String(n.to_string())),
        serde_yaml::Value::Sequence(seq) => {
            let mut items = Vec::with_capacity(seq.len());
            for item in seq {
                match from_yaml(item)? {
                    OptValue::String(s) => items.push(s),
                    OptValue::Bool(b) => items.push(b.to_string()),
                    other => {
                        return Err(DavitError::Config(format!(
                            "list entries must be scalars, got {other:?}"
                        )))
                    }
                }
            }
            Ok(OptValue::List(items))
        }
        serde_yaml::Value::Mapping(map) => {
            let mut entries = BTreeMap::new();
            for (key, value) in map {
                let key = key
                    .as_str()
                    .ok_or_else(|| DavitError::Config("option names must be strings".to_string()))?
                    .to_string();
                entries.insert(key, from_yaml(value)?);
            }
            Ok(OptValue::Map(entries))
        }
        serde_yaml::Value::Null => Err(DavitError::Config(
            "null is not a valid option value".to_string(),
        )),
        serde_yaml::Value::Tagged(_) => Err(DavitError::Config(
            "tagged YAML values are not supported".to_string(),
        )),
    }
}

/// Immutable deployment options, read-only for the lifetime of a deployment.
#[derive(Debug, Clone, Default)]
pub struct DeployConfig {
    values: BTreeMap<String, OptValue>,
}

impl DeployConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from a YAML document (a mapping at the top level).
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(content)
            .map_err(|e| DavitError::Config(format!("Invalid config: {e}")))?;
        match from_yaml(value)? {
            OptValue::Map(values) => Ok(Self { values }),
            _ => Err(DavitError::Config(
                "config must be a mapping of option names to values".to_string(),
            )),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DavitError::Config(format!("Cannot read config {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Insert an option during construction. Configuration is not mutated
    /// once a deployment starts.
    pub fn set(&mut self, name: impl Into<String>, value: OptValue) {
        self.values.insert(name.into(), value);
    }

    /// Apply a `key=value` override from the command line. `true`/`false`
    /// become booleans, everything else stays a string.
    pub fn apply_override(&mut self, spec: &str) -> Result<()> {
        let (key, value) = spec.split_once('=').ok_or_else(|| {
            DavitError::Config(format!("Invalid override {spec:?}, expected key=value"))
        })?;
        let value = match value {
            "true" => OptValue::Bool(true),
            "false" => OptValue::Bool(false),
            other => OptValue::String(other.to_string()),
        };
        self.set(key.trim(), value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&OptValue> {
        self.values.get(name)
    }

    /// Resolve a required option, failing with the option's name if absent.
    pub fn option(&self, name: &str) -> Result<&OptValue> {
        self.option_any(name, &[])
    }

    /// Resolve the first present value among `name` and the ordered
    /// fallbacks. The error names the primary key.
    pub fn option_any(&self, name: &str, fallbacks: &[&str]) -> Result<&OptValue> {
        std::iter::once(name)
            .chain(fallbacks.iter().copied())
            .find_map(|key| self.values.get(key))
            .ok_or_else(|| DavitError::MissingOption {
                name: name.to_string(),
            })
    }

    /// Required option rendered as a string.
    pub fn str_option(&self, name: &str) -> Result<String> {
        self.str_option_any(name, &[])
    }

    pub fn str_option_any(&self, name: &str, fallbacks: &[&str]) -> Result<String> {
        let value = self.option_any(name, fallbacks)?;
        value
            .as_str()
            .ok_or_else(|| DavitError::Config(format!("Option {name} is not a string")))
    }

    /// Boolean flag; absent means false.
    pub fn bool_flag(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(OptValue::Bool(true)))
    }

    /// List option; absent means empty, a scalar promotes to a one-element
    /// list (so `run: restart` and `run: [restart]` behave alike).
    pub fn list_option(&self, name: &str) -> Vec<String> {
        match self.values.get(name) {
            Some(OptValue::List(items)) => items.clone(),
            Some(value) => value.as_str().map(|s| vec![s]).unwrap_or_default(),
            None => Vec::new(),
        }
    }

    /// Required nested mapping.
    pub fn map_option(&self, name: &str) -> Result<&BTreeMap<String, OptValue>> {
        match self.option(name)? {
            OptValue::Map(map) => Ok(map),
            _ => Err(DavitError::Config(format!("Option {name} is not a map"))),
        }
    }
}
