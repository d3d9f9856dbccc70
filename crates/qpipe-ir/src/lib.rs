//! qpipe Intermediate Representation
//!
//! This crate holds the data structures that programs are compiled into,
//! transformed, and executed from.
//!
//! # Core Components
//!
//! - **Parameters**: [`Parameter`], a closed sum of integer, real, string and
//!   complex values; strings may carry symbolic expressions
//! - **Instructions**: [`Instruction`], either a leaf [`Operation`] or a
//!   nested [`Function`]
//! - **Functions**: ordered, mutable instruction trees with declared
//!   variables, bit mapping, graph views and evaluation
//! - **IR**: [`Ir`], an ordered list of kernels
//! - **Traversal**: [`InstructionIterator`], a restartable pre-order walk
//! - **Collaborators**: [`IrProvider`], [`IrTransformation`],
//!   [`IrGenerator`], [`EmbeddingAlgorithm`], [`Graph`]
//!
//! # Example: Binding a Variational Kernel
//!
//! ```rust
//! use qpipe_ir::{Function, Instruction, Operation, Parameter};
//!
//! let mut kernel = Function::new("ansatz");
//! kernel.add_instruction(Instruction::op("X", [0], []));
//! kernel.add_instruction(Instruction::op("Ry", [1], [Parameter::from("t0")]));
//! kernel.add_instruction(Instruction::op("CNOT", [1, 0], []));
//! kernel.add_instruction(Operation::measure(0, 0));
//!
//! assert_eq!(kernel.depth().unwrap(), 3);
//!
//! let bound = kernel.evaluate(&[0.59]).unwrap();
//! assert_eq!(
//!     bound.instruction(1).unwrap().as_operation().unwrap().parameters(),
//!     &[Parameter::Double(0.59)]
//! );
//! ```

pub mod embedding;
pub mod error;
pub mod expression;
pub mod function;
pub mod graph;
pub mod instruction;
pub mod ir;
pub mod iterator;
pub mod parameter;
pub mod provider;

pub use embedding::{Embedding, EmbeddingAlgorithm, TrivialEmbedding};
pub use error::{IrError, IrResult};
pub use expression::{Expr, SymbolTable};
pub use function::{ANNEAL, Function, FunctionKind, QMI};
pub use graph::{ConnectivityGraph, DependencyGraph, Graph, IrGraph, VertexAttributes};
pub use instruction::{Instruction, MEASURE, Operation};
pub use ir::Ir;
pub use iterator::InstructionIterator;
pub use parameter::{Parameter, RESERVED_KEYWORDS};
pub use provider::{
    AnnealIrProvider, GateIrProvider, InstructionKind, IrGenerator, IrProvider, IrTransformation,
    QftGenerator,
};
