//! Error types for the IR crate.

use thiserror::Error;

/// Errors that can occur in IR operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IrError {
    /// Positional access past the end of an instruction list.
    #[error("Index {index} out of range for '{context}' (length {len})")]
    IndexOutOfRange {
        /// The requested position.
        index: usize,
        /// Current length of the collection.
        len: usize,
        /// Name of the function or IR being accessed.
        context: String,
    },

    /// A bit map does not cover a referenced bit.
    #[error("Bit {bit} has no entry in bit map of length {map_len}")]
    InvalidBitMap {
        /// The unmapped bit.
        bit: usize,
        /// Length of the supplied map.
        map_len: usize,
    },

    /// Parameter or operand count mismatch.
    #[error("'{name}' expects {expected} {what}, got {got}")]
    Arity {
        /// Name of the function or instruction kind.
        name: String,
        /// What was being counted (parameters, bits).
        what: &'static str,
        /// Expected count.
        expected: usize,
        /// Actual count.
        got: usize,
    },

    /// The operation is not meaningful for this IR variant.
    #[error("Operation '{operation}' is not supported for {variant}")]
    UnsupportedOperation {
        /// The requested operation.
        operation: &'static str,
        /// Description of the IR variant.
        variant: String,
    },

    /// Expression could not be parsed or evaluated.
    #[error("Expression error in '{expression}': {message}")]
    Expression {
        /// The offending expression text.
        expression: String,
        /// What went wrong.
        message: String,
    },

    /// Persisted form could not be read or written.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O failure while persisting.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IrError {
    pub(crate) fn expression(expression: &str, message: impl Into<String>) -> Self {
        IrError::Expression {
            expression: expression.to_string(),
            message: message.into(),
        }
    }
}

/// Result type for IR operations.
pub type IrResult<T> = Result<T, IrError>;
