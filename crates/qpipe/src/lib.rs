//! qpipe: a modular quantum programming pipeline.
//!
//! This crate ties the workspace together. It loads configuration, sets up
//! logging, and bootstraps a [`Framework`] whose registry holds the
//! built-in compilers, IR services, decorators and accelerators.
//!
//! # Architecture
//!
//! ```text
//!   source ──→ Compiler ──→ Ir ──→ IrTransformation* ──→ Accelerator ──→ AcceleratorBuffer
//!                                                          │
//!                                             decorators ──┘ (outer-to-inner)
//! ```
//!
//! | crate             | role                                               |
//! |-------------------|----------------------------------------------------|
//! | `qpipe-ir`        | instructions, kernels, graphs, providers           |
//! | `qpipe-registry`  | capability registry, plugins, runtime options      |
//! | `qpipe-compile`   | QObject compiler, circuit optimizer                |
//! | `qpipe-hal`       | accelerators, buffers, decorators, remote dispatch |
//! | `qpipe-adapter-*` | `local` simulator and `ibm` remote accelerator     |
//!
//! # Example
//!
//! ```rust
//! use qpipe::{Config, Framework};
//! use qpipe_ir::{Function, Instruction, Operation};
//!
//! let mut config = Config::default();
//! config.options.insert("shots".into(), "200".into());
//! config.options.insert("seed".into(), "11".into());
//! let framework = Framework::bootstrap(config).unwrap();
//!
//! let mut bell = Function::new("bell");
//! bell.add_instruction(Instruction::op("H", [0], []));
//! bell.add_instruction(Instruction::op("CNOT", [0, 1], []));
//! bell.add_instruction(Operation::measure(0, 0));
//! bell.add_instruction(Operation::measure(1, 1));
//!
//! let local = framework.accelerator("local").unwrap();
//! let mut buffer = local.create_buffer_with_size("q", 2).unwrap();
//! tokio::runtime::Runtime::new()
//!     .unwrap()
//!     .block_on(local.execute(&mut buffer, &bell))
//!     .unwrap();
//!
//! assert_eq!(buffer.total_shots(), 200);
//! assert!((buffer.expectation_value_z() - 1.0).abs() < 1e-12);
//! ```

pub mod config;
pub mod error;
pub mod framework;
pub mod logging;

pub use config::{Config, LogFormat, LoggingConfig, PluginsConfig, RemoteConfig};
pub use error::{FrameworkError, FrameworkResult};
pub use framework::Framework;
pub use logging::init_tracing;

pub use qpipe_compile as compile;
pub use qpipe_hal as hal;
pub use qpipe_ir as ir;
pub use qpipe_registry as registry;
