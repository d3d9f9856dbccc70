//! Repeat-and-aggregate sampling.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use qpipe_ir::Function;
use qpipe_registry::{OptionSpec, OptionsProvider, RegistryError, parse_option};
use tracing::debug;

use crate::buffer::AcceleratorBuffer;
use crate::decorator::{ExecutionStage, Next};
use crate::error::HalResult;

const N_EXECS: &str = "sampler-n-execs";
const DEFAULT_N_EXECS: usize = 5;

/// Runs the rest of the chain `sampler-n-execs` times and merges every
/// run's measurements into the target buffer.
#[derive(Debug)]
pub struct ImprovedSampling {
    n_execs: AtomicUsize,
}

impl Default for ImprovedSampling {
    fn default() -> Self {
        Self::new(DEFAULT_N_EXECS)
    }
}

impl ImprovedSampling {
    /// Stage that repeats `n_execs` times.
    pub fn new(n_execs: usize) -> Self {
        Self {
            n_execs: AtomicUsize::new(n_execs),
        }
    }

    /// Configured repetition count.
    pub fn n_execs(&self) -> usize {
        self.n_execs.load(Ordering::Relaxed)
    }
}

impl OptionsProvider for ImprovedSampling {
    fn options(&self) -> Vec<OptionSpec> {
        vec![OptionSpec::new(
            N_EXECS,
            "Number of times to execute each kernel (default 5)",
        )]
    }

    fn handle_options(&self, options: &BTreeMap<String, String>) -> bool {
        super::broadcast_options(self, options)
    }
}

#[async_trait]
impl ExecutionStage for ImprovedSampling {
    fn name(&self) -> &str {
        "improved-sampling"
    }

    fn apply_options(&self, options: &BTreeMap<String, String>) -> HalResult<bool> {
        match parse_option::<usize>(options, N_EXECS)? {
            Some(0) => Err(RegistryError::InvalidOption {
                key: N_EXECS.into(),
                message: "must be at least 1".into(),
            }
            .into()),
            Some(n) => {
                self.n_execs.store(n, Ordering::Relaxed);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn execute(
        &self,
        buffer: &mut AcceleratorBuffer,
        function: &Function,
        next: Next<'_>,
    ) -> HalResult<()> {
        let n = self.n_execs();
        for run in 0..n {
            let mut scratch = AcceleratorBuffer::new(buffer.name(), buffer.size());
            next.run(&mut scratch, function).await?;
            debug!(run, shots = scratch.total_shots(), "Sampling run finished");
            buffer.absorb(&scratch);
        }
        buffer.add_extra_info(N_EXECS, n);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options() {
        let stage = ImprovedSampling::default();
        assert_eq!(stage.n_execs(), 5);

        let opts = BTreeMap::from([(N_EXECS.to_string(), "12".to_string())]);
        assert!(stage.apply_options(&opts).unwrap());
        assert_eq!(stage.n_execs(), 12);

        let bad = BTreeMap::from([(N_EXECS.to_string(), "zero".to_string())]);
        assert!(stage.apply_options(&bad).is_err());
        assert!(!stage.handle_options(&bad));
        assert_eq!(stage.n_execs(), 12);

        let zero = BTreeMap::from([(N_EXECS.to_string(), "0".to_string())]);
        assert!(stage.apply_options(&zero).is_err());
        assert!(!stage.apply_options(&BTreeMap::new()).unwrap());
    }
}
