//! Error types for the HAL crate.

use qpipe_ir::IrError;
use qpipe_registry::RegistryError;
use thiserror::Error;

/// Errors that can occur in accelerator operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HalError {
    /// Structural IR error surfaced during execution.
    #[error(transparent)]
    Ir(#[from] IrError),

    /// Invalid runtime option.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Requested register size is not supported.
    #[error("Invalid buffer size {size} for accelerator '{accelerator}'")]
    InvalidBufferSize {
        /// Requested size.
        size: usize,
        /// Accelerator name.
        accelerator: String,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Unsupported feature.
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// Execution failed inside the backend.
    #[error("Execution failed: {0}")]
    Execution(String),

    /// Remote call did not complete within the configured timeout.
    #[error("Remote call to {target} timed out after {seconds}s")]
    RemoteTimeout {
        /// URL and path of the call.
        target: String,
        /// Configured timeout in seconds.
        seconds: u64,
    },

    /// Transport failure (connection, HTTP status).
    #[error("Transport error: {0}")]
    Transport(String),

    /// Backend returned a different number of results than kernels sent.
    #[error("Expected {expected} result buffers, backend returned {got}")]
    ResponseMismatch {
        /// Number of kernels submitted.
        expected: usize,
        /// Number of buffers parsed from the response.
        got: usize,
    },

    /// Not enough successful runs to fit an estimate.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HalError {
    /// True for failures worth retrying at the transport boundary.
    pub fn is_transient(&self) -> bool {
        matches!(self, HalError::RemoteTimeout { .. } | HalError::Transport(_))
    }
}

/// Result type for HAL operations.
pub type HalResult<T> = Result<T, HalError>;
