//! qpipe Local Accelerator
//!
//! A statevector simulator registered as the `local` accelerator. It gives
//! exact amplitudes and samples measurement outcomes per shot, so it is
//! limited to small registers.
//!
//! # Memory
//!
//! | Qubits | Statevector |
//! |--------|-------------|
//! | 10 | ~16 KB |
//! | 20 | ~16 MB |
//! | 25 | ~512 MB |
//!
//! # Example
//!
//! ```rust
//! use qpipe_adapter_sim::LocalAccelerator;
//! use qpipe_hal::{Accelerator, AcceleratorConfig};
//! use qpipe_ir::{Function, Instruction, Operation};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let acc = LocalAccelerator::new();
//! acc.initialize(&AcceleratorConfig::new("local").with_extra("shots", 100)).unwrap();
//!
//! let mut bell = Function::new("bell");
//! bell.add_instruction(Instruction::op("H", [0], []));
//! bell.add_instruction(Instruction::op("CNOT", [0, 1], []));
//! bell.add_instruction(Operation::measure(0, 0));
//! bell.add_instruction(Operation::measure(1, 1));
//!
//! let mut buffer = acc.create_buffer_with_size("q", 2).unwrap();
//! acc.execute(&mut buffer, &bell).await.unwrap();
//!
//! let counts = buffer.measurement_counts();
//! assert_eq!(counts.get("00").copied().unwrap_or(0) + counts.get("11").copied().unwrap_or(0), 100);
//! # });
//! ```

mod plugin;
mod simulator;
mod statevector;

pub use plugin::SimPlugin;
pub use simulator::{DEFAULT_MAX_QUBITS, DEFAULT_SHOTS, LocalAccelerator, SimSettings};
pub use statevector::Statevector;
