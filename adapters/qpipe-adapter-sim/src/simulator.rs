//! The `local` accelerator.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use std::time::Instant;

use async_trait::async_trait;
use qpipe_hal::{
    Accelerator, AcceleratorBuffer, AcceleratorConfig, HalError, HalResult, attach_children,
};
use qpipe_ir::{Function, Operation};
use qpipe_registry::{OptionSpec, OptionsProvider, parse_option};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, instrument, warn};

use crate::statevector::Statevector;

/// Shots per kernel unless configured.
pub const DEFAULT_SHOTS: u64 = 1024;

/// Register limit unless configured.
pub const DEFAULT_MAX_QUBITS: usize = 20;

/// Hard ceiling on `max-qubits`.
const QUBIT_CEILING: usize = 28;

/// Execution settings of the local accelerator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimSettings {
    /// Shots per kernel.
    pub shots: u64,
    /// RNG seed; `None` draws from entropy.
    pub seed: Option<u64>,
    /// Largest register a kernel may use.
    pub max_qubits: usize,
    /// Symmetric probability of flipping each measured bit.
    pub readout_error: f64,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            shots: DEFAULT_SHOTS,
            seed: None,
            max_qubits: DEFAULT_MAX_QUBITS,
            readout_error: 0.0,
        }
    }
}

impl SimSettings {
    /// Settings with `options` applied. Returns the new settings and whether
    /// any key was recognized.
    fn with_options(mut self, options: &BTreeMap<String, String>) -> HalResult<(Self, bool)> {
        let mut handled = false;
        if let Some(shots) = parse_option::<u64>(options, "shots")? {
            if shots == 0 {
                return Err(HalError::Configuration("shots must be positive".into()));
            }
            self.shots = shots;
            handled = true;
        }
        if let Some(seed) = parse_option::<u64>(options, "seed")? {
            self.seed = Some(seed);
            handled = true;
        }
        if let Some(max) = parse_option::<usize>(options, "max-qubits")? {
            if max == 0 || max > QUBIT_CEILING {
                return Err(HalError::Configuration(format!(
                    "max-qubits must be in 1..={QUBIT_CEILING}, got {max}"
                )));
            }
            self.max_qubits = max;
            handled = true;
        }
        if let Some(p) = parse_option::<f64>(options, "readout-error")? {
            if !(0.0..=0.5).contains(&p) {
                return Err(HalError::Configuration(format!(
                    "readout-error must be in [0, 0.5], got {p}"
                )));
            }
            self.readout_error = p;
            handled = true;
        }
        Ok((self, handled))
    }
}

/// A kernel flattened for simulation.
#[derive(Debug)]
struct KernelPlan {
    name: String,
    ops: Vec<Operation>,
    n_qubits: usize,
    /// `(qubit, classical slot)` pairs read out at the end of a shot.
    readout: Vec<(usize, usize)>,
    width: usize,
    /// No gate follows the first measurement, so one evolution serves
    /// every shot.
    terminal: bool,
}

impl KernelPlan {
    fn new(function: &Function, buffer_size: usize, max_qubits: usize) -> HalResult<Self> {
        let ops: Vec<Operation> = function.enabled_operations().into_iter().cloned().collect();
        let n_qubits = ops
            .iter()
            .flat_map(|op| op.bits().iter().copied())
            .max()
            .map_or(0, |q| q + 1);
        if n_qubits > max_qubits {
            return Err(HalError::Execution(format!(
                "kernel '{}' needs {n_qubits} qubits; the local simulator is limited to {max_qubits}",
                function.name()
            )));
        }
        if n_qubits > buffer_size {
            return Err(HalError::Execution(format!(
                "kernel '{}' needs {n_qubits} qubits but the buffer holds {buffer_size}",
                function.name()
            )));
        }

        let mut readout = Vec::new();
        for op in ops.iter().filter(|op| op.is_measure()) {
            let slot = op.classical_slot().ok_or_else(|| {
                HalError::Execution(format!(
                    "measurement without an integer classical slot in '{}'",
                    function.name()
                ))
            })?;
            let qubit = op.bits().first().copied().ok_or_else(|| {
                HalError::Execution(format!("measurement without a qubit in '{}'", function.name()))
            })?;
            readout.push((qubit, slot));
        }
        if readout.is_empty() {
            readout = (0..n_qubits).map(|q| (q, q)).collect();
        }
        let width = readout.iter().map(|&(_, slot)| slot + 1).max().unwrap_or(0);
        let terminal = ops
            .iter()
            .skip_while(|op| !op.is_measure())
            .all(Operation::is_measure);

        Ok(Self {
            name: function.name().to_string(),
            ops,
            n_qubits,
            readout,
            width,
            terminal,
        })
    }

    fn run(&self, settings: &SimSettings, rng: &mut StdRng) -> HalResult<BTreeMap<String, u64>> {
        let start = Instant::now();
        let mut counts = BTreeMap::new();
        let flip = |value: bool, rng: &mut StdRng| {
            value ^ (settings.readout_error > 0.0 && rng.gen_bool(settings.readout_error))
        };

        if self.terminal {
            let mut sv = Statevector::new(self.n_qubits);
            for op in self.ops.iter().filter(|op| !op.is_measure()) {
                sv.apply(op)?;
            }
            for _ in 0..settings.shots {
                let index = sv.sample(rng);
                let mut bits = vec!['0'; self.width];
                for &(qubit, slot) in &self.readout {
                    if flip((index >> qubit) & 1 == 1, rng) {
                        bits[slot] = '1';
                    }
                }
                *counts.entry(bits.into_iter().collect()).or_insert(0) += 1;
            }
        } else {
            for _ in 0..settings.shots {
                let mut sv = Statevector::new(self.n_qubits);
                let mut bits = vec!['0'; self.width];
                for op in &self.ops {
                    if op.is_measure() {
                        let (qubit, slot) = (op.bits()[0], op.classical_slot().unwrap_or(0));
                        bits[slot] = if flip(sv.measure(qubit, rng), rng) { '1' } else { '0' };
                    } else {
                        sv.apply(op)?;
                    }
                }
                *counts.entry(bits.into_iter().collect()).or_insert(0) += 1;
            }
        }

        debug!(
            kernel = %self.name,
            qubits = self.n_qubits,
            shots = settings.shots,
            terminal = self.terminal,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Simulation completed"
        );
        Ok(counts)
    }
}

/// Run `plan` on the blocking pool.
async fn simulate(
    plan: KernelPlan,
    settings: SimSettings,
    seed: Option<u64>,
) -> HalResult<BTreeMap<String, u64>> {
    tokio::task::spawn_blocking(move || {
        let mut rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        plan.run(&settings, &mut rng)
    })
    .await
    .map_err(|e| HalError::Execution(format!("simulation task failed: {e}")))?
}

fn fill(buffer: &mut AcceleratorBuffer, counts: BTreeMap<String, u64>) {
    for (bits, count) in counts {
        buffer.append_measurement_count(bits, count);
    }
}

/// Local statevector accelerator.
///
/// Supports the canonical gate table and measurement into classical slots.
/// Outcome bitstrings have one character per classical slot, slot `i` at
/// position `i`; a kernel without measurements reads out every qubit it
/// touches.
///
/// Options (via [`Accelerator::initialize`] or the registry): `shots`,
/// `seed`, `max-qubits`, `readout-error`.
#[derive(Debug, Default)]
pub struct LocalAccelerator {
    settings: RwLock<SimSettings>,
}

impl LocalAccelerator {
    /// Accelerator with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accelerator with explicit settings.
    pub fn with_settings(settings: SimSettings) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }

    /// Current settings.
    pub fn settings(&self) -> SimSettings {
        *self.settings.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply_options(&self, options: &BTreeMap<String, String>) -> HalResult<bool> {
        let mut settings = self.settings.write().unwrap_or_else(PoisonError::into_inner);
        let (updated, handled) = settings.with_options(options)?;
        *settings = updated;
        Ok(handled)
    }
}

#[async_trait]
impl Accelerator for LocalAccelerator {
    fn name(&self) -> &str {
        "local"
    }

    fn description(&self) -> &str {
        "Local statevector simulator"
    }

    fn initialize(&self, config: &AcceleratorConfig) -> HalResult<()> {
        self.apply_options(&config.options())?;
        debug!(settings = ?self.settings(), "Initialized local accelerator");
        Ok(())
    }

    fn default_buffer_size(&self) -> usize {
        self.settings().max_qubits
    }

    fn is_valid_buffer_size(&self, size: usize) -> bool {
        (1..=self.settings().max_qubits).contains(&size)
    }

    fn one_bit_error_rates(&self) -> Vec<f64> {
        let settings = self.settings();
        if settings.readout_error > 0.0 {
            vec![settings.readout_error; settings.max_qubits]
        } else {
            Vec::new()
        }
    }

    #[instrument(skip_all, fields(kernel = function.name(), buffer = buffer.name()))]
    async fn execute(&self, buffer: &mut AcceleratorBuffer, function: &Function) -> HalResult<()> {
        let settings = self.settings();
        let plan = KernelPlan::new(function, buffer.size(), settings.max_qubits)?;
        let counts = simulate(plan, settings, settings.seed).await?;
        fill(buffer, counts);
        Ok(())
    }

    /// Kernels run concurrently on blocking tasks; results keep input order.
    /// With a seed, kernel `i` uses `seed + i`.
    #[instrument(skip_all, fields(kernels = functions.len(), buffer = buffer.name()))]
    async fn execute_batch(
        &self,
        buffer: &mut AcceleratorBuffer,
        functions: &[Function],
    ) -> HalResult<Vec<AcceleratorBuffer>> {
        let settings = self.settings();
        let plans = functions
            .iter()
            .map(|f| KernelPlan::new(f, buffer.size(), settings.max_qubits))
            .collect::<HalResult<Vec<_>>>()?;

        let tasks = plans.into_iter().enumerate().map(|(i, plan)| {
            let seed = settings.seed.map(|s| s.wrapping_add(i as u64));
            simulate(plan, settings, seed)
        });
        let all_counts = futures::future::try_join_all(tasks).await?;

        let results: Vec<AcceleratorBuffer> = functions
            .iter()
            .zip(all_counts)
            .map(|(function, counts)| {
                let mut child = AcceleratorBuffer::new(function.name(), buffer.size());
                fill(&mut child, counts);
                child
            })
            .collect();
        attach_children(buffer, &results);
        Ok(results)
    }
}

impl OptionsProvider for LocalAccelerator {
    fn options(&self) -> Vec<OptionSpec> {
        vec![
            OptionSpec::new("shots", "Shots per kernel on the local simulator"),
            OptionSpec::new("seed", "RNG seed for the local simulator"),
            OptionSpec::new("max-qubits", "Largest register the local simulator accepts"),
            OptionSpec::new("readout-error", "Symmetric readout flip probability"),
        ]
    }

    fn handle_options(&self, options: &BTreeMap<String, String>) -> bool {
        match self.apply_options(options) {
            Ok(handled) => handled,
            Err(e) => {
                warn!("Ignoring local simulator options: {e}");
                false
            }
        }
    }
}
