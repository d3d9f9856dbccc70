//! qpipe Accelerator Abstraction
//!
//! This crate defines how kernels are executed and how results come back.
//!
//! # Core Components
//!
//! - **Buffers**: [`AcceleratorBuffer`], measurements, counts, typed extra
//!   info and per-kernel children
//! - **Accelerators**: the [`Accelerator`] trait every backend implements
//! - **Decorators**: [`DecoratedAccelerator`] runs an ordered chain of
//!   [`ExecutionStage`]s around a base accelerator
//! - **Remote dispatch**: [`RemoteAccelerator`] drives a [`RemoteBackend`]
//!   over a [`RestClient`] with a timeout and an explicit [`RetryPolicy`]
//!
//! # Example: Wrapping an Accelerator
//!
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use qpipe_hal::{
//!     Accelerator, AcceleratorBuffer, DecoratedAccelerator, HalResult, ImprovedSampling,
//! };
//! use qpipe_ir::{Function, Operation};
//!
//! struct AlwaysOne;
//!
//! #[async_trait]
//! impl Accelerator for AlwaysOne {
//!     fn name(&self) -> &str { "always-one" }
//!     fn default_buffer_size(&self) -> usize { 1 }
//!     async fn execute(&self, buffer: &mut AcceleratorBuffer, _f: &Function) -> HalResult<()> {
//!         buffer.append_measurement_count("1", 10);
//!         Ok(())
//!     }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let acc = DecoratedAccelerator::new(Arc::new(AlwaysOne))
//!     .with_stage(Arc::new(ImprovedSampling::new(3)));
//!
//! let mut kernel = Function::new("flip");
//! kernel.add_instruction(Operation::measure(0, 0));
//!
//! let mut buffer = acc.create_buffer("q").unwrap();
//! acc.execute(&mut buffer, &kernel).await.unwrap();
//! assert_eq!(buffer.total_shots(), 30);
//! # });
//! ```

pub mod accelerator;
pub mod buffer;
pub mod config;
pub mod decorator;
pub mod error;
pub mod plugin;
pub mod remote;
pub mod stages;
pub mod transport;

pub use accelerator::{Accelerator, AcceleratorType, attach_children};
pub use buffer::{AcceleratorBuffer, EXP_VAL_Z, ExtraInfo, expectation_from_counts};
pub use config::AcceleratorConfig;
pub use decorator::{DecoratedAccelerator, ExecutionStage, Next};
pub use error::{HalError, HalResult};
pub use plugin::DecoratorPlugin;
pub use remote::{DEFAULT_TIMEOUT, RemoteAccelerator, RemoteBackend, RetryPolicy};
pub use stages::{ImprovedSampling, ReadoutErrorCorrection, RichardsonExtrapolation};
pub use transport::{CONNECT_TIMEOUT, Headers, HttpRestClient, RestClient, join_url};
