//! Accelerator configuration.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Configuration handed to [`Accelerator::initialize`](crate::Accelerator::initialize)
/// and to decorator stages.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AcceleratorConfig {
    /// Name of the accelerator.
    #[serde(default)]
    pub name: String,
    /// API endpoint URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Authentication token.
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
    /// Additional settings.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AcceleratorConfig {
    /// Create a configuration for `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: None,
            token: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Set the endpoint URL.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the authentication token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Add an extra setting.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Extra settings flattened to strings, the shape option contributors
    /// consume. Arrays become comma-separated lists.
    pub fn options(&self) -> BTreeMap<String, String> {
        self.extra
            .iter()
            .filter_map(|(k, v)| value_to_option(v).map(|s| (k.clone(), s)))
            .collect()
    }
}

fn value_to_option(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        serde_json::Value::Array(items) => {
            let parts: Option<Vec<String>> = items.iter().map(value_to_option).collect();
            parts.map(|p| p.join(","))
        }
        serde_json::Value::Null | serde_json::Value::Object(_) => None,
    }
}

impl fmt::Debug for AcceleratorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcceleratorConfig")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("token", &"[REDACTED]")
            .field("extra", &self.extra)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_token_redacted() {
        let config = AcceleratorConfig::new("ibm").with_token("secret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret"));
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }

    #[test]
    fn test_options_flattening() {
        let config = AcceleratorConfig::new("local")
            .with_extra("shots", 256)
            .with_extra("rich-extrap-r", json!([1, 3, 5]))
            .with_extra("seed", "7")
            .with_extra("nested", json!({"a": 1}));
        let opts = config.options();
        assert_eq!(opts.get("shots").map(String::as_str), Some("256"));
        assert_eq!(opts.get("rich-extrap-r").map(String::as_str), Some("1,3,5"));
        assert_eq!(opts.get("seed").map(String::as_str), Some("7"));
        assert!(!opts.contains_key("nested"));
    }

    #[test]
    fn test_deserialize_flattened_extra() {
        let config: AcceleratorConfig =
            serde_json::from_str(r#"{"name":"local","shots":64}"#).unwrap();
        assert_eq!(config.name, "local");
        assert_eq!(config.extra.get("shots"), Some(&json!(64)));
    }
}
