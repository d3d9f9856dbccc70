//! Plugin contributing the compiler and IR collaborators.

use std::sync::Arc;

use qpipe_ir::{
    AnnealIrProvider, EmbeddingAlgorithm, GateIrProvider, IrGenerator, IrProvider,
    IrTransformation, QftGenerator, TrivialEmbedding,
};
use qpipe_registry::{OptionsProvider, Plugin, Provider, RegistryResult, ServiceRegistry};

use crate::compiler::Compiler;
use crate::optimizer::CircuitOptimizer;
use crate::qobject_compiler::QObjectCompiler;

/// Registers the `qobject` compiler, the `gate` and `anneal` instruction
/// families, the `circuit-optimizer` pass, the `qft`/`iqft` generators and
/// the `trivial` embedding.
#[derive(Debug, Default, Clone, Copy)]
pub struct CompilePlugin;

impl Plugin for CompilePlugin {
    fn name(&self) -> &str {
        "compile"
    }

    fn description(&self) -> &str {
        "QObject compiler and IR collaborators"
    }

    fn register(&self, registry: &mut ServiceRegistry) -> RegistryResult<()> {
        registry.register(Provider::<dyn Compiler>::shared(
            "qobject",
            Arc::new(QObjectCompiler::new()),
        ));

        registry.register(Provider::<dyn IrProvider>::shared("gate", Arc::new(GateIrProvider)));
        registry.register(Provider::<dyn IrProvider>::shared(
            "anneal",
            Arc::new(AnnealIrProvider),
        ));

        // The shared pass is also the options contributor, so options
        // handled by the registry reach the instance callers get.
        let optimizer = Arc::new(CircuitOptimizer::default());
        registry.register(Provider::<dyn IrTransformation>::shared(
            "circuit-optimizer",
            Arc::clone(&optimizer) as Arc<dyn IrTransformation>,
        ));
        registry.register(Provider::<dyn OptionsProvider>::anonymous(optimizer));

        registry.register(Provider::<dyn IrGenerator>::shared(
            "qft",
            Arc::new(QftGenerator::new()),
        ));
        registry.register(Provider::<dyn IrGenerator>::shared(
            "iqft",
            Arc::new(QftGenerator::inverse()),
        ));

        registry.register(Provider::<dyn EmbeddingAlgorithm>::shared(
            "trivial",
            Arc::new(TrivialEmbedding),
        ));
        Ok(())
    }
}
