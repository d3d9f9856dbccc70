//! qpipe Compilation
//!
//! This crate translates between external program text and the qpipe IR,
//! and provides IR transformations.
//!
//! # Core Components
//!
//! - **Compilers**: the [`Compiler`] trait; [`QObjectCompiler`] speaks the
//!   QObject JSON wire schema
//! - **Wire schema**: [`QObject`] requests and [`QObjectResult`] responses
//! - **Visitors**: [`InstructionVisitor`] walked over the enabled
//!   instructions of a kernel
//! - **Transformations**: [`CircuitOptimizer`]
//!
//! # Example: Round Trip
//!
//! ```rust
//! use qpipe_compile::{Compiler, QObjectCompiler};
//! use qpipe_ir::{Function, Instruction, Operation};
//!
//! let mut bell = Function::new("bell");
//! bell.add_instruction(Instruction::op("H", [0], []));
//! bell.add_instruction(Instruction::op("CNOT", [0, 1], []));
//! bell.add_instruction(Operation::measure(0, 0));
//! bell.add_instruction(Operation::measure(1, 1));
//!
//! let compiler = QObjectCompiler::new();
//! let wire = compiler.translate("q", &bell).unwrap();
//! assert!(wire.contains(r#""name":"cx""#));
//!
//! let ir = compiler.compile(&wire).unwrap();
//! assert_eq!(ir.kernel(0).unwrap().instructions(), bell.instructions());
//! ```

pub mod compiler;
pub mod error;
pub mod optimizer;
pub mod plugin;
pub mod qobject;
pub mod qobject_compiler;
pub mod visitor;

pub use compiler::Compiler;
pub use error::{CompileError, CompileResult};
pub use optimizer::CircuitOptimizer;
pub use plugin::CompilePlugin;
pub use qobject::{
    BackendRef, DEFAULT_SHOTS, Experiment, ExperimentData, ExperimentHeader, ExperimentResult,
    ExperimentResultHeader, QObject, QObjectConfig, QObjectDocument, QObjectInstruction,
    QObjectResult, QObjectRoot, SCHEMA_VERSION, bitstring_to_hex, hex_to_bitstring,
};
pub use qobject_compiler::{QObjectCompiler, experiment_for, normalize_source};
pub use visitor::{InstructionVisitor, QObjectExperimentVisitor, qobject_name, walk};
