//! Configuration management.
//!
//! Configuration is loaded from a YAML file and then overridden by
//! environment variables with the `QPIPE_` prefix.
//!
//! Precedence (highest to lowest):
//! 1. Environment variables
//! 2. Configuration file
//! 3. Default values
//!
//! | variable                      | field                               |
//! |-------------------------------|-------------------------------------|
//! | `QPIPE_PLUGIN_ROOT`           | `plugins.root_path`                 |
//! | `QPIPE_LOG_LEVEL`             | `logging.level`                     |
//! | `QPIPE_LOG_FORMAT`            | `logging.format`                    |
//! | `QPIPE_REMOTE_TIMEOUT`        | `remote.timeout_seconds`            |
//! | `QPIPE_REMOTE_MAX_ATTEMPTS`   | `remote.max_attempts`               |
//! | `QPIPE_REMOTE_BACKOFF_MILLIS` | `remote.backoff_millis`             |
//! | `QPIPE_OPTION_<KEY>`          | `options.<key>`                     |
//! | `QPIPE_TOKEN_<NAME>`          | `accelerators.<name>.token`         |
//! | `QPIPE_ENDPOINT_<NAME>`       | `accelerators.<name>.endpoint`      |
//!
//! `<KEY>` and `<NAME>` are lowercased and `_` becomes `-`, so
//! `QPIPE_OPTION_SAMPLER_N_EXECS=3` sets option `sampler-n-execs`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use qpipe_hal::AcceleratorConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{FrameworkError, FrameworkResult};

const ENV_PREFIX: &str = "QPIPE_";

/// Complete framework configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Plugin discovery.
    pub plugins: PluginsConfig,

    /// Log output.
    pub logging: LoggingConfig,

    /// Defaults for every remote accelerator.
    pub remote: RemoteConfig,

    /// Runtime options forwarded to every options contributor.
    pub options: BTreeMap<String, String>,

    /// Per-accelerator configuration, keyed by registry name.
    pub accelerators: BTreeMap<String, AcceleratorConfig>,
}

/// Plugin discovery settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    /// Framework root; dynamic plugins live in `<root>/plugins`. Defaults
    /// to `$QPIPE_ROOT`, else `~/.qpipe`.
    pub root_path: Option<PathBuf>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output.
    #[default]
    Console,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = FrameworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "console" => Ok(Self::Console),
            "json" => Ok(Self::Json),
            other => Err(FrameworkError::Config(format!(
                "unknown log format '{other}', expected 'console' or 'json'"
            ))),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive: "trace", "debug", "info", "warn", "error", or a
    /// full `EnvFilter` directive such as `qpipe_hal=debug,info`.
    pub level: String,

    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Console,
        }
    }
}

/// Remote dispatch defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Timeout of one remote call.
    pub timeout_seconds: u64,

    /// Attempts per call, including the first.
    pub max_attempts: u32,

    /// Pause between attempts.
    pub backoff_millis: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: qpipe_hal::DEFAULT_TIMEOUT.as_secs(),
            max_attempts: 1,
            backoff_millis: 500,
        }
    }
}

impl RemoteConfig {
    /// The settings as remote-accelerator option keys.
    pub fn as_options(&self) -> [(&'static str, serde_json::Value); 3] {
        [
            ("timeout-seconds", self.timeout_seconds.into()),
            ("max-attempts", self.max_attempts.into()),
            ("backoff-millis", self.backoff_millis.into()),
        ]
    }
}

impl Config {
    /// Load the file at `path` (if any), then apply the process
    /// environment.
    pub fn load(path: Option<&Path>) -> FrameworkResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(std::env::vars())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file, without environment overrides.
    pub fn from_file(path: impl AsRef<Path>) -> FrameworkResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml(yaml: &str) -> FrameworkResult<Self> {
        let mut config: Config = serde_yaml_ng::from_str(yaml)
            .map_err(|e| FrameworkError::Config(format!("invalid YAML: {e}")))?;
        for (name, acc) in &mut config.accelerators {
            if acc.name.is_empty() {
                acc.name.clone_from(name);
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Apply `QPIPE_*` variables from `vars`. Unrelated variables are
    /// ignored; malformed values of known variables are an error.
    pub fn apply_env<I, K, V>(&mut self, vars: I) -> FrameworkResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            let Some(key) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.into();
            match key {
                "PLUGIN_ROOT" => self.plugins.root_path = Some(PathBuf::from(value)),
                "LOG_LEVEL" => self.logging.level = value,
                "LOG_FORMAT" => self.logging.format = value.parse()?,
                "REMOTE_TIMEOUT" => self.remote.timeout_seconds = parse_env(key, &value)?,
                "REMOTE_MAX_ATTEMPTS" => self.remote.max_attempts = parse_env(key, &value)?,
                "REMOTE_BACKOFF_MILLIS" => self.remote.backoff_millis = parse_env(key, &value)?,
                _ => {
                    if let Some(option) = key.strip_prefix("OPTION_") {
                        self.options.insert(env_name(option), value);
                    } else if let Some(name) = key.strip_prefix("TOKEN_") {
                        self.accelerator_entry(&env_name(name)).token = Some(value);
                    } else if let Some(name) = key.strip_prefix("ENDPOINT_") {
                        self.accelerator_entry(&env_name(name)).endpoint = Some(value);
                    }
                }
            }
        }
        Ok(())
    }

    /// Check value ranges.
    pub fn validate(&self) -> FrameworkResult<()> {
        if self.remote.timeout_seconds == 0 {
            return Err(FrameworkError::Config(
                "remote.timeout_seconds must be positive".into(),
            ));
        }
        if self.remote.max_attempts == 0 {
            return Err(FrameworkError::Config(
                "remote.max_attempts must be at least 1".into(),
            ));
        }
        if self.logging.level.trim().is_empty() {
            warn!("Empty log level, falling back to 'info'");
        }
        Ok(())
    }

    /// Configuration handed to accelerator `name`: its own entry, with the
    /// remote defaults filling keys the entry does not set.
    pub fn accelerator_config(&self, name: &str, remote: bool) -> AcceleratorConfig {
        let mut config = self
            .accelerators
            .get(name)
            .cloned()
            .unwrap_or_else(|| AcceleratorConfig::new(name));
        if remote {
            for (key, value) in self.remote.as_options() {
                config.extra.entry(key).or_insert(value);
            }
        }
        config
    }

    fn accelerator_entry(&mut self, name: &str) -> &mut AcceleratorConfig {
        self.accelerators
            .entry(name.to_string())
            .or_insert_with(|| AcceleratorConfig::new(name))
    }
}

fn env_name(raw: &str) -> String {
    raw.to_ascii_lowercase().replace('_', "-")
}

fn parse_env<T>(key: &str, value: &str) -> FrameworkResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| FrameworkError::Config(format!("{ENV_PREFIX}{key}='{value}': {e}")))
}
