//! Runtime options and option contributors.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, RegistryResult};

/// Description of one option key a provider understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSpec {
    /// Option key, e.g. `sampler-n-execs`.
    pub key: String,
    /// Help text.
    pub description: String,
}

impl OptionSpec {
    /// Create a descriptor.
    pub fn new(key: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            description: description.into(),
        }
    }
}

/// Capability for services that declare and consume runtime options.
pub trait OptionsProvider: Send + Sync {
    /// Keys this provider understands.
    fn options(&self) -> Vec<OptionSpec>;

    /// Apply recognized keys from `options`. Returns true if anything was
    /// consumed.
    fn handle_options(&self, options: &BTreeMap<String, String>) -> bool {
        let _ = options;
        false
    }
}

/// String-keyed, string-valued option map owned by the context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuntimeOptions {
    values: BTreeMap<String, String>,
}

impl RuntimeOptions {
    /// Create an empty option map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Remove `key`, returning its value.
    pub fn unset(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    /// True if `key` is set.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// The underlying map.
    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    /// Number of set options.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if nothing is set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RuntimeOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Parse `options[key]` if present.
pub fn parse_option<T>(options: &BTreeMap<String, String>, key: &str) -> RegistryResult<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    options
        .get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| RegistryError::InvalidOption {
                    key: key.to_string(),
                    message: format!("'{raw}': {e}"),
                })
        })
        .transpose()
}

/// Parse a comma-separated list in `options[key]` if present.
pub fn parse_list<T>(options: &BTreeMap<String, String>, key: &str) -> RegistryResult<Option<Vec<T>>>
where
    T: FromStr,
    T::Err: Display,
{
    let Some(raw) = options.get(key) else {
        return Ok(None);
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|item| {
            item.parse::<T>().map_err(|e| RegistryError::InvalidOption {
                key: key.to_string(),
                message: format!("'{item}': {e}"),
            })
        })
        .collect::<RegistryResult<Vec<T>>>()
        .map(Some)
}
