//! Decorator middleware chain.
//!
//! A [`DecoratedAccelerator`] wraps a base accelerator with an ordered list
//! of [`ExecutionStage`]s. Every accelerator method except `execute`
//! delegates to the base; `execute` runs the stages as around-advice:
//!
//! ```text
//!   stage[0] ──→ stage[1] ──→ ... ──→ base.execute()
//!      ↑             ↑                      │
//!      └─────────────┴──────────────────────┘
//! ```
//!
//! The first stage added is the outermost. Stages run strictly
//! sequentially; a stage that calls [`Next::run`] several times gets
//! several full passes through the rest of the chain.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use qpipe_ir::{Function, IrTransformation};
use qpipe_registry::OptionsProvider;
use tracing::{debug, instrument};

use crate::accelerator::{Accelerator, AcceleratorType, attach_children};
use crate::buffer::AcceleratorBuffer;
use crate::config::AcceleratorConfig;
use crate::error::HalResult;

/// One around-advice stage of the chain.
#[async_trait]
pub trait ExecutionStage: OptionsProvider {
    /// Registry name of the stage.
    fn name(&self) -> &str;

    /// Apply recognized option keys. Returns true if any were consumed;
    /// malformed values are an error.
    fn apply_options(&self, options: &std::collections::BTreeMap<String, String>)
    -> HalResult<bool>;

    /// Configure from an accelerator configuration's extra settings.
    fn configure(&self, config: &AcceleratorConfig) -> HalResult<()> {
        self.apply_options(&config.options()).map(|_| ())
    }

    /// Run this stage. Call `next.run()` to continue down the chain.
    async fn execute(
        &self,
        buffer: &mut AcceleratorBuffer,
        function: &Function,
        next: Next<'_>,
    ) -> HalResult<()>;
}

/// The remainder of the chain below a stage.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    stages: &'a [Arc<dyn ExecutionStage>],
    terminal: &'a dyn Accelerator,
}

impl<'a> Next<'a> {
    /// Chain over `stages` ending in `terminal`.
    pub fn new(stages: &'a [Arc<dyn ExecutionStage>], terminal: &'a dyn Accelerator) -> Self {
        Self { stages, terminal }
    }

    /// Continue execution with the next stage, or the base accelerator if
    /// none remain.
    pub async fn run(self, buffer: &mut AcceleratorBuffer, function: &Function) -> HalResult<()> {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                debug!(stage = stage.name(), "Entering stage");
                stage
                    .execute(buffer, function, Next::new(rest, self.terminal))
                    .await
            }
            None => self.terminal.execute(buffer, function).await,
        }
    }

    /// The base accelerator at the end of the chain.
    pub fn accelerator(&self) -> &'a dyn Accelerator {
        self.terminal
    }

    /// Number of stages left before the base.
    pub fn remaining(&self) -> usize {
        self.stages.len()
    }
}

/// An accelerator wrapped in execution stages.
pub struct DecoratedAccelerator {
    base: Arc<dyn Accelerator>,
    stages: Vec<Arc<dyn ExecutionStage>>,
    name: String,
}

impl DecoratedAccelerator {
    /// Wrap `base` with no stages.
    pub fn new(base: Arc<dyn Accelerator>) -> Self {
        let name = base.name().to_string();
        Self {
            base,
            stages: Vec::new(),
            name,
        }
    }

    /// Add a stage inside the ones already added. The name reads outermost
    /// first: stages `a` then `b` over `base` give `a[b[base]]`.
    #[must_use]
    pub fn with_stage(mut self, stage: Arc<dyn ExecutionStage>) -> Self {
        self.stages.push(stage);
        self.name = self
            .stages
            .iter()
            .rev()
            .fold(self.base.name().to_string(), |inner, s| {
                format!("{}[{inner}]", s.name())
            });
        self
    }

    /// The wrapped accelerator.
    pub fn base(&self) -> &Arc<dyn Accelerator> {
        &self.base
    }

    /// Stage names, outermost first.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    fn chain(&self) -> Next<'_> {
        Next::new(&self.stages, self.base.as_ref())
    }
}

impl fmt::Debug for DecoratedAccelerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoratedAccelerator")
            .field("base", &self.base.name())
            .field("stages", &self.stage_names())
            .finish()
    }
}

#[async_trait]
impl Accelerator for DecoratedAccelerator {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        self.base.description()
    }

    fn initialize(&self, config: &AcceleratorConfig) -> HalResult<()> {
        self.base.initialize(config)?;
        for stage in &self.stages {
            stage.configure(config)?;
        }
        Ok(())
    }

    fn accelerator_type(&self) -> AcceleratorType {
        self.base.accelerator_type()
    }

    fn default_buffer_size(&self) -> usize {
        self.base.default_buffer_size()
    }

    fn is_valid_buffer_size(&self, size: usize) -> bool {
        self.base.is_valid_buffer_size(size)
    }

    fn ir_transformations(&self) -> Vec<Arc<dyn IrTransformation>> {
        self.base.ir_transformations()
    }

    fn one_bit_error_rates(&self) -> Vec<f64> {
        self.base.one_bit_error_rates()
    }

    fn two_bit_error_rates(&self) -> Vec<f64> {
        self.base.two_bit_error_rates()
    }

    fn connectivity(&self) -> Vec<(usize, usize)> {
        self.base.connectivity()
    }

    fn is_remote(&self) -> bool {
        self.base.is_remote()
    }

    #[instrument(skip_all, fields(accelerator = %self.name, kernel = function.name()))]
    async fn execute(&self, buffer: &mut AcceleratorBuffer, function: &Function) -> HalResult<()> {
        self.chain().run(buffer, function).await
    }

    async fn execute_batch(
        &self,
        buffer: &mut AcceleratorBuffer,
        functions: &[Function],
    ) -> HalResult<Vec<AcceleratorBuffer>> {
        if self.stages.is_empty() {
            return self.base.execute_batch(buffer, functions).await;
        }
        let mut results = Vec::with_capacity(functions.len());
        for function in functions {
            let mut child = AcceleratorBuffer::new(function.name(), buffer.size());
            self.chain().run(&mut child, function).await?;
            results.push(child);
        }
        attach_children(buffer, &results);
        Ok(results)
    }
}
