//! The compiler capability.

use std::fmt;

use qpipe_hal::{Accelerator, AcceleratorType};
use qpipe_ir::{Function, Ir};

use crate::error::{CompileError, CompileResult};

/// Translates between external source text and the IR.
///
/// # Contract
///
/// - `compile()` produces a fresh [`Ir`] with one kernel per program unit
///   in the source, in source order.
/// - `translate()` serializes only the enabled instructions of a kernel.
/// - Compiling the output of `translate()` reproduces the kernel's
///   canonical instruction sequence.
pub trait Compiler: Send + Sync {
    /// Registry name.
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str {
        ""
    }

    /// Compile `source` into kernels.
    fn compile(&self, source: &str) -> CompileResult<Ir>;

    /// Compile `source` for a specific accelerator.
    ///
    /// The default rejects annealers, which have no gate-level input, and
    /// otherwise defers to [`Compiler::compile`].
    fn compile_for(&self, source: &str, accelerator: &dyn Accelerator) -> CompileResult<Ir> {
        if accelerator.accelerator_type() == AcceleratorType::Annealer {
            return Err(CompileError::Unsupported(format!(
                "{} cannot target annealer '{}'",
                self.name(),
                accelerator.name()
            )));
        }
        self.compile(source)
    }

    /// Serialize `function` into this compiler's external form.
    fn translate(&self, buffer_name: &str, function: &Function) -> CompileResult<String>;
}

impl fmt::Debug for dyn Compiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compiler")
            .field("name", &self.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::QObjectCompiler;

    #[test]
    fn test_debug_names_the_compiler() {
        let compiler: Arc<dyn Compiler> = Arc::new(QObjectCompiler::new());
        assert_eq!(format!("{compiler:?}"), r#"Compiler { name: "qobject" }"#);
    }
}
