//! Target configuration records.
//!
//! A [`Configuration`] is an immutable set of named options handed to a
//! target's action. New configurations are only ever produced by deriving
//! from a template with a list of overrides:
//!
//! - scalar options are replaced by the override value
//! - list options are appended to, unless the override asks for replacement
//! - overriding a key the template does not define is an error
//!
//! Cloning a configuration is cheap; the entries are shared.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error produced while deriving a configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown configuration key `{key}` (not defined by the template)")]
    UnknownKey { key: String },

    #[error("configuration key `{key}` is a {expected}, cannot override it with a {found}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// A single configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Integer(i64),
    String(String),
    List(Vec<String>),
}

impl ConfigValue {
    /// Name of the value kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ConfigValue::Bool(_) => "boolean",
            ConfigValue::Integer(_) => "integer",
            ConfigValue::String(_) => "string",
            ConfigValue::List(_) => "list",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            ConfigValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigValue {
    /// Lists render space-separated, the way they appear on a command line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(b) => write!(f, "{}", b),
            ConfigValue::Integer(i) => write!(f, "{}", i),
            ConfigValue::String(s) => f.write_str(s),
            ConfigValue::List(items) => f.write_str(&items.join(" ")),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::String(s.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue::String(s)
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Bool(b)
    }
}

impl From<i64> for ConfigValue {
    fn from(i: i64) -> Self {
        ConfigValue::Integer(i)
    }
}

impl From<Vec<String>> for ConfigValue {
    fn from(items: Vec<String>) -> Self {
        ConfigValue::List(items)
    }
}

impl From<Vec<&str>> for ConfigValue {
    fn from(items: Vec<&str>) -> Self {
        ConfigValue::List(items.into_iter().map(String::from).collect())
    }
}

/// How an override combines with the template value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverrideMode {
    /// Replace scalars, append to lists.
    #[default]
    Merge,
    /// Replace the template value outright.
    Replace,
}

/// One override applied during [`derive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Override {
    pub key: String,
    pub value: ConfigValue,
    pub mode: OverrideMode,
}

impl Override {
    /// Merge override: replaces scalars, appends to lists.
    pub fn set(key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        Override {
            key: key.into(),
            value: value.into(),
            mode: OverrideMode::Merge,
        }
    }

    /// Replacing override, for lists that should not inherit template entries.
    pub fn replace(key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        Override {
            key: key.into(),
            value: value.into(),
            mode: OverrideMode::Replace,
        }
    }
}

/// Immutable option record passed to target actions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Configuration {
    entries: Arc<BTreeMap<String, ConfigValue>>,
}

impl Configuration {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Configuration::default()
    }

    /// Create a root template from a set of entries.
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ConfigValue>,
    {
        Configuration {
            entries: Arc::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Derive a new configuration from this one. See [`derive`].
    pub fn derive(&self, overrides: &[Override]) -> Result<Configuration, ConfigError> {
        derive(self, overrides)
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ConfigValue::as_str)
    }

    pub fn get_list(&self, key: &str) -> Option<&[String]> {
        self.get(key).and_then(ConfigValue::as_list)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterate over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Merge `overrides` onto `template`, producing a new configuration.
///
/// The result holds every key of the template. Overrides are applied in
/// order, so a later override of the same key sees the earlier result.
pub fn derive(template: &Configuration, overrides: &[Override]) -> Result<Configuration, ConfigError> {
    let mut entries = (*template.entries).clone();

    for ov in overrides {
        let current = entries.get_mut(&ov.key).ok_or_else(|| ConfigError::UnknownKey {
            key: ov.key.clone(),
        })?;
        *current = merge_value(&ov.key, current, &ov.value, ov.mode)?;
    }

    Ok(Configuration {
        entries: Arc::new(entries),
    })
}

fn merge_value(
    key: &str,
    base: &ConfigValue,
    value: &ConfigValue,
    mode: OverrideMode,
) -> Result<ConfigValue, ConfigError> {
    let mismatch = || ConfigError::TypeMismatch {
        key: key.to_string(),
        expected: base.kind(),
        found: value.kind(),
    };

    match (base, value) {
        (ConfigValue::List(items), ConfigValue::List(extra)) => match mode {
            OverrideMode::Merge => {
                let mut merged = items.clone();
                merged.extend(extra.iter().cloned());
                Ok(ConfigValue::List(merged))
            }
            OverrideMode::Replace => Ok(value.clone()),
        },
        // A single string appends one element to a list.
        (ConfigValue::List(items), ConfigValue::String(extra)) => match mode {
            OverrideMode::Merge => {
                let mut merged = items.clone();
                merged.push(extra.clone());
                Ok(ConfigValue::List(merged))
            }
            OverrideMode::Replace => Ok(ConfigValue::List(vec![extra.clone()])),
        },
        (ConfigValue::List(_), _) => Err(mismatch()),
        (_, _) if base.kind() == value.kind() => Ok(value.clone()),
        (_, _) => Err(mismatch()),
    }
}
