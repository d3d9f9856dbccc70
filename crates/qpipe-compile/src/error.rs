//! Error types for compilers.

use qpipe_ir::IrError;
use thiserror::Error;

/// Errors that can occur while compiling or translating.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CompileError {
    /// Source or wire text is malformed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The input uses something this compiler cannot express.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Structural IR error while building kernels.
    #[error(transparent)]
    Ir(#[from] IrError),

    /// Output could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;
