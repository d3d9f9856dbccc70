//! Error types for the framework facade.

use qpipe_compile::CompileError;
use qpipe_hal::HalError;
use qpipe_ir::IrError;
use qpipe_registry::RegistryError;
use thiserror::Error;

/// Any error surfaced through [`Framework`](crate::Framework).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FrameworkError {
    /// IR error.
    #[error(transparent)]
    Ir(#[from] IrError),

    /// Registry or plugin error.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Compilation error.
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// Accelerator error.
    #[error(transparent)]
    Hal(#[from] HalError),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for framework operations.
pub type FrameworkResult<T> = Result<T, FrameworkError>;
