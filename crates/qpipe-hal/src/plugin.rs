//! Plugin contributing the built-in execution stages.

use std::sync::Arc;

use qpipe_registry::{OptionsProvider, Plugin, Provider, RegistryResult, ServiceRegistry};

use crate::decorator::ExecutionStage;
use crate::stages::{ImprovedSampling, ReadoutErrorCorrection, RichardsonExtrapolation};

/// Registers `improved-sampling`, `ro-error` and `rich-extrapolation`.
///
/// Stages are cloneable: every lookup gets its own options state.
#[derive(Debug, Default, Clone, Copy)]
pub struct DecoratorPlugin;

impl Plugin for DecoratorPlugin {
    fn name(&self) -> &str {
        "decorators"
    }

    fn description(&self) -> &str {
        "Built-in accelerator decorators"
    }

    fn register(&self, registry: &mut ServiceRegistry) -> RegistryResult<()> {
        registry.register(Provider::<dyn ExecutionStage>::cloneable(
            "improved-sampling",
            || Arc::new(ImprovedSampling::default()) as Arc<dyn ExecutionStage>,
        ));
        registry.register(Provider::<dyn ExecutionStage>::cloneable("ro-error", || {
            Arc::new(ReadoutErrorCorrection::new()) as Arc<dyn ExecutionStage>
        }));
        registry.register(Provider::<dyn ExecutionStage>::cloneable(
            "rich-extrapolation",
            || Arc::new(RichardsonExtrapolation::new()) as Arc<dyn ExecutionStage>,
        ));

        registry.register(Provider::<dyn OptionsProvider>::anonymous(Arc::new(
            ImprovedSampling::default(),
        )));
        registry.register(Provider::<dyn OptionsProvider>::anonymous(Arc::new(
            ReadoutErrorCorrection::new(),
        )));
        registry.register(Provider::<dyn OptionsProvider>::anonymous(Arc::new(
            RichardsonExtrapolation::new(),
        )));
        Ok(())
    }
}
