//! qpipe Capability Registry
//!
//! Implementations of compilers, accelerators, IR transformations and the
//! other pluggable capabilities are registered here under string names and
//! resolved at runtime without the caller knowing their concrete types.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use qpipe_registry::{Context, Plugin, Provider, RegistryResult, ServiceRegistry};
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> &str;
//! }
//!
//! struct Hello;
//! impl Greeter for Hello {
//!     fn greet(&self) -> &str { "hello" }
//! }
//!
//! struct HelloPlugin;
//! impl Plugin for HelloPlugin {
//!     fn name(&self) -> &str { "hello" }
//!     fn register(&self, registry: &mut ServiceRegistry) -> RegistryResult<()> {
//!         registry.register(Provider::<dyn Greeter>::cloneable("hello", || {
//!             Arc::new(Hello) as Arc<dyn Greeter>
//!         }));
//!         Ok(())
//!     }
//! }
//!
//! let mut ctx = Context::new().with_plugin(HelloPlugin);
//! ctx.initialize(Context::default_root()).unwrap();
//! let greeter = ctx.service::<dyn Greeter>("hello").unwrap();
//! assert_eq!(greeter.greet(), "hello");
//! ```

pub mod context;
pub mod error;
pub mod options;
pub mod plugin;
pub mod registry;

pub use context::Context;
pub use error::{RegistryError, RegistryResult};
pub use options::{OptionSpec, OptionsProvider, RuntimeOptions, parse_list, parse_option};
#[cfg(feature = "dynamic-plugins")]
pub use plugin::{LoadedPlugin, PluginCreateFn};
pub use plugin::{Plugin, PluginInfo};
pub use registry::{Provider, ServiceRegistry};
