//! The accelerator capability.
//!
//! An [`Accelerator`] executes kernels against a backend and writes results
//! into an [`AcceleratorBuffer`]:
//!
//! ```text
//!   initialize() ──→ create_buffer() ──→ execute() / execute_batch()
//!     (sync)            (sync)                 (async)
//! ```
//!
//! Accelerators are resolved through the registry as `dyn Accelerator`, so
//! every method takes `&self`. Implementations that accept configuration
//! keep it behind interior mutability.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use qpipe_ir::{Function, IrTransformation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::buffer::AcceleratorBuffer;
use crate::config::AcceleratorConfig;
use crate::error::{HalError, HalResult};

/// Execution model of an accelerator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceleratorType {
    /// Gate-model device or simulator.
    #[default]
    GateModel,
    /// Quantum annealer.
    Annealer,
}

impl fmt::Display for AcceleratorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcceleratorType::GateModel => write!(f, "gate-model"),
            AcceleratorType::Annealer => write!(f, "annealer"),
        }
    }
}

/// Trait for execution backends.
///
/// # Contract
///
/// - `execute()` mutates the buffer in place and blocks the caller until
///   the backend returns.
/// - `execute_batch()` returns exactly one buffer per kernel, in input
///   order, and attaches each as a child of the parent buffer.
/// - `create_buffer_with_size()` fails with
///   [`HalError::InvalidBufferSize`] when `is_valid_buffer_size()` rejects
///   the size.
#[async_trait]
pub trait Accelerator: Send + Sync {
    /// Registry name of this accelerator.
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str {
        ""
    }

    /// Apply configuration. Called once before first use.
    fn initialize(&self, config: &AcceleratorConfig) -> HalResult<()> {
        let _ = config;
        Ok(())
    }

    /// Execution model.
    fn accelerator_type(&self) -> AcceleratorType {
        AcceleratorType::GateModel
    }

    /// Register size used by [`Accelerator::create_buffer`].
    fn default_buffer_size(&self) -> usize;

    /// True if a register of `size` qubits can be executed.
    fn is_valid_buffer_size(&self, size: usize) -> bool {
        size > 0
    }

    /// Create an empty buffer of the default size.
    fn create_buffer(&self, id: &str) -> HalResult<AcceleratorBuffer> {
        self.create_buffer_with_size(id, self.default_buffer_size())
    }

    /// Create an empty buffer of `size` qubits.
    fn create_buffer_with_size(&self, id: &str, size: usize) -> HalResult<AcceleratorBuffer> {
        if !self.is_valid_buffer_size(size) {
            return Err(HalError::InvalidBufferSize {
                size,
                accelerator: self.name().to_string(),
            });
        }
        debug!(accelerator = self.name(), id, size, "Creating buffer");
        Ok(AcceleratorBuffer::new(id, size))
    }

    /// Passes this backend requires before execution.
    fn ir_transformations(&self) -> Vec<Arc<dyn IrTransformation>> {
        Vec::new()
    }

    /// Per-qubit readout error rates, if calibrated.
    fn one_bit_error_rates(&self) -> Vec<f64> {
        Vec::new()
    }

    /// Per-coupler two-qubit error rates, if calibrated.
    fn two_bit_error_rates(&self) -> Vec<f64> {
        Vec::new()
    }

    /// Qubit coupling map. Empty means all-to-all.
    fn connectivity(&self) -> Vec<(usize, usize)> {
        Vec::new()
    }

    /// True if execution leaves the process.
    fn is_remote(&self) -> bool {
        false
    }

    /// Execute one kernel, writing results into `buffer`.
    async fn execute(&self, buffer: &mut AcceleratorBuffer, function: &Function) -> HalResult<()>;

    /// Execute several kernels.
    ///
    /// The default runs them one after another, each into a child buffer
    /// named after its kernel.
    async fn execute_batch(
        &self,
        buffer: &mut AcceleratorBuffer,
        functions: &[Function],
    ) -> HalResult<Vec<AcceleratorBuffer>> {
        let mut results = Vec::with_capacity(functions.len());
        for function in functions {
            let mut child = AcceleratorBuffer::new(function.name(), buffer.size());
            self.execute(&mut child, function).await?;
            results.push(child);
        }
        attach_children(buffer, &results);
        Ok(results)
    }
}

/// Attach `results` to `parent` as children, preserving order.
pub fn attach_children(parent: &mut AcceleratorBuffer, results: &[AcceleratorBuffer]) {
    for child in results {
        parent.append_child(child.clone());
    }
}

impl fmt::Debug for dyn Accelerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accelerator")
            .field("name", &self.name())
            .field("type", &self.accelerator_type())
            .field("remote", &self.is_remote())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qpipe_ir::{Instruction, Operation};

    struct Echo;

    #[async_trait]
    impl Accelerator for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn default_buffer_size(&self) -> usize {
            2
        }

        fn is_valid_buffer_size(&self, size: usize) -> bool {
            (1..=4).contains(&size)
        }

        async fn execute(
            &self,
            buffer: &mut AcceleratorBuffer,
            function: &Function,
        ) -> HalResult<()> {
            buffer.append_measurement_count("0".repeat(buffer.size()), function.len() as u64);
            Ok(())
        }
    }

    fn kernel(name: &str, n: usize) -> Function {
        let mut f = Function::new(name);
        for q in 0..n {
            f.add_instruction(Instruction::op("H", [q], []));
        }
        f.add_instruction(Operation::measure(0, 0));
        f
    }

    #[test]
    fn test_create_buffer() {
        let acc = Echo;
        let buf = acc.create_buffer("q").unwrap();
        assert_eq!(buf.size(), 2);
        assert!(matches!(
            acc.create_buffer_with_size("q", 9),
            Err(HalError::InvalidBufferSize { size: 9, .. })
        ));
        assert_eq!(acc.accelerator_type(), AcceleratorType::GateModel);
        assert!(!acc.is_remote());
    }

    #[tokio::test]
    async fn test_default_batch_order() {
        let acc = Echo;
        let mut parent = acc.create_buffer("q").unwrap();
        let kernels = vec![kernel("a", 1), kernel("b", 3), kernel("c", 0)];
        let results = acc.execute_batch(&mut parent, &kernels).await.unwrap();

        let names: Vec<_> = results.iter().map(|b| b.name().to_string()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(results[1].total_shots(), 4);
        assert_eq!(parent.children_names(), vec!["a", "b", "c"]);
    }
}
