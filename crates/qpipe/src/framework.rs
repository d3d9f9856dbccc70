//! Framework bootstrap and service lookups.

use std::sync::Arc;

use qpipe_adapter_ibm::IbmPlugin;
use qpipe_adapter_sim::SimPlugin;
use qpipe_compile::{CompilePlugin, Compiler};
use qpipe_hal::{Accelerator, DecoratedAccelerator, DecoratorPlugin, ExecutionStage};
use qpipe_ir::{EmbeddingAlgorithm, Function, Ir, IrGenerator, IrProvider, IrTransformation};
use qpipe_registry::{Context, Plugin};
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::error::FrameworkResult;

/// An initialized [`Context`] plus the configuration it was built from.
///
/// The built-in plugins are `compile`, `decorators`, `local` and `ibm`.
/// Extra plugins passed to [`Framework::bootstrap_with`] register after
/// them, so a plugin providing an existing name shadows the built-in one.
#[derive(Debug)]
pub struct Framework {
    context: Context,
    config: Config,
}

impl Framework {
    /// Bootstrap with the built-in plugins.
    pub fn bootstrap(config: Config) -> FrameworkResult<Self> {
        Self::bootstrap_with(config, Vec::new())
    }

    /// Bootstrap with the built-in plugins followed by `plugins`.
    #[instrument(skip_all)]
    pub fn bootstrap_with(config: Config, plugins: Vec<Box<dyn Plugin>>) -> FrameworkResult<Self> {
        config.validate()?;
        let mut context = Context::new()
            .with_plugin(CompilePlugin)
            .with_plugin(DecoratorPlugin)
            .with_plugin(SimPlugin)
            .with_plugin(IbmPlugin::new());
        for plugin in plugins {
            context.add_plugin(plugin)?;
        }

        let root = config
            .plugins
            .root_path
            .clone()
            .unwrap_or_else(Context::default_root);
        context.initialize(&root)?;

        for (key, value) in &config.options {
            context.set_option(key.clone(), value.clone());
        }
        if !config.options.is_empty() && !context.handle_options()? {
            warn!(
                options = config.options.len(),
                "No plugin accepted the configured options"
            );
        }

        info!(
            plugins = context.plugins().len(),
            options = config.options.len(),
            "Framework ready"
        );
        Ok(Self { context, config })
    }

    /// The underlying context.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// The configuration this framework was built from.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Set a runtime option and forward all options to contributors.
    /// Returns true if any contributor accepted them.
    pub fn set_option(&mut self, key: impl Into<String>, value: impl Into<String>) -> FrameworkResult<bool> {
        self.context.set_option(key, value);
        Ok(self.context.handle_options()?)
    }

    /// Accelerator `name`, initialized with its configuration entry. Remote
    /// accelerators also receive the `remote` defaults.
    pub fn accelerator(&self, name: &str) -> FrameworkResult<Arc<dyn Accelerator>> {
        let accelerator = self.context.service::<dyn Accelerator>(name)?;
        let config = self.config.accelerator_config(name, accelerator.is_remote());
        accelerator.initialize(&config)?;
        debug!(accelerator = name, remote = accelerator.is_remote(), "Accelerator resolved");
        Ok(accelerator)
    }

    /// Wrap `base` in the decorators `names`, first name outermost. Each
    /// stage is a fresh instance configured from the runtime options.
    pub fn decorated(
        &self,
        base: Arc<dyn Accelerator>,
        names: &[&str],
    ) -> FrameworkResult<DecoratedAccelerator> {
        let options = self.context.options().as_map();
        let mut decorated = DecoratedAccelerator::new(base);
        for &name in names {
            let stage = self.context.service::<dyn ExecutionStage>(name)?;
            stage.apply_options(options)?;
            decorated = decorated.with_stage(stage);
        }
        Ok(decorated)
    }

    /// Compiler `name`.
    pub fn compiler(&self, name: &str) -> FrameworkResult<Arc<dyn Compiler>> {
        Ok(self.context.service::<dyn Compiler>(name)?)
    }

    /// IR transformation `name`.
    pub fn ir_transformation(&self, name: &str) -> FrameworkResult<Arc<dyn IrTransformation>> {
        Ok(self.context.service::<dyn IrTransformation>(name)?)
    }

    /// IR provider `name`.
    pub fn ir_provider(&self, name: &str) -> FrameworkResult<Arc<dyn IrProvider>> {
        Ok(self.context.service::<dyn IrProvider>(name)?)
    }

    /// IR generator `name`.
    pub fn ir_generator(&self, name: &str) -> FrameworkResult<Arc<dyn IrGenerator>> {
        Ok(self.context.service::<dyn IrGenerator>(name)?)
    }

    /// Embedding algorithm `name`.
    pub fn embedding_algorithm(&self, name: &str) -> FrameworkResult<Arc<dyn EmbeddingAlgorithm>> {
        Ok(self.context.service::<dyn EmbeddingAlgorithm>(name)?)
    }

    /// Compile `source` with compiler `compiler`.
    pub fn compile(&self, source: &str, compiler: &str) -> FrameworkResult<Ir> {
        Ok(self.compiler(compiler)?.compile(source)?)
    }

    /// Translate `function` with compiler `compiler`, naming the buffer
    /// after the function.
    pub fn translate(&self, function: &Function, compiler: &str) -> FrameworkResult<String> {
        Ok(self.compiler(compiler)?.translate(function.name(), function)?)
    }
}
