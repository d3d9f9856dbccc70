//! Plugin contributing the `local` accelerator.

use std::sync::Arc;

use qpipe_hal::Accelerator;
use qpipe_registry::{OptionsProvider, Plugin, Provider, RegistryResult, ServiceRegistry};

use crate::simulator::LocalAccelerator;

/// Registers one shared `local` accelerator, which also receives runtime
/// options.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimPlugin;

impl Plugin for SimPlugin {
    fn name(&self) -> &str {
        "local"
    }

    fn description(&self) -> &str {
        "Local statevector accelerator"
    }

    fn register(&self, registry: &mut ServiceRegistry) -> RegistryResult<()> {
        let local = Arc::new(LocalAccelerator::new());
        registry.register(Provider::<dyn Accelerator>::shared(
            "local",
            Arc::clone(&local) as Arc<dyn Accelerator>,
        ));
        registry.register(Provider::<dyn OptionsProvider>::anonymous(local));
        Ok(())
    }
}
