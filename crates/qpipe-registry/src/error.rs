//! Error types for the registry.

use thiserror::Error;

/// Errors raised by registry and context misuse.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RegistryError {
    /// No provider of the capability carries the requested name.
    #[error("Service '{name}' not found for capability {capability}")]
    ServiceNotFound {
        /// Requested name.
        name: String,
        /// Capability type name.
        capability: &'static str,
    },

    /// The context was used before `initialize`.
    #[error("Registry not initialized; call Context::initialize first")]
    NotInitialized,

    /// A plugin failed to register or load.
    #[error("Plugin error: {0}")]
    Plugin(String),

    /// A runtime option has an unusable value.
    #[error("Invalid option '{key}': {message}")]
    InvalidOption {
        /// Option key.
        key: String,
        /// What is wrong with it.
        message: String,
    },
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
