//! Peephole cancellation of self-inverse gate pairs.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use qpipe_ir::{Function, Instruction, Ir, IrResult, IrTransformation, Operation};
use qpipe_registry::{OptionSpec, OptionsProvider, parse_option};
use tracing::{debug, warn};

/// Gates that are their own inverse.
const SELF_INVERSE: &[&str] = &["H", "X", "Y", "Z", "CNOT", "CY", "CZ", "CH", "Swap"];

/// Self-inverse gates whose action does not depend on bit order.
const SYMMETRIC: &[&str] = &["CZ", "Swap"];

/// Default number of cancellation sweeps.
pub const DEFAULT_N_TRIES: usize = 3;

fn self_inverse(op: &Operation) -> bool {
    op.parameters().is_empty() && SELF_INVERSE.contains(&op.name())
}

fn cancels(a: &Operation, b: &Operation) -> bool {
    if a.name() != b.name() || !self_inverse(a) {
        return false;
    }
    if SYMMETRIC.contains(&a.name()) {
        let mut x = a.bits().to_vec();
        let mut y = b.bits().to_vec();
        x.sort_unstable();
        y.sort_unstable();
        x == y
    } else {
        a.bits() == b.bits()
    }
}

/// Removes disabled instructions and cancels adjacent self-inverse pairs
/// acting on identical bits (`H·H`, `X·X`, `CNOT·CNOT`, ...).
///
/// Two gates are adjacent when nothing else touches any of their bits in
/// between. Nested functions are optimized in place and act as barriers on
/// the bits they use. Each sweep is repeated until nothing changes, at most
/// `circuit-opt-n-tries` times.
#[derive(Debug)]
pub struct CircuitOptimizer {
    n_tries: AtomicUsize,
}

impl Default for CircuitOptimizer {
    fn default() -> Self {
        Self::new(DEFAULT_N_TRIES)
    }
}

impl CircuitOptimizer {
    /// Optimizer running at most `n_tries` sweeps (at least one).
    pub fn new(n_tries: usize) -> Self {
        Self {
            n_tries: AtomicUsize::new(n_tries.max(1)),
        }
    }

    /// Maximum number of sweeps.
    pub fn n_tries(&self) -> usize {
        self.n_tries.load(Ordering::Relaxed)
    }

    /// Optimize one function, returning the rewritten copy.
    pub fn optimize(&self, function: &Function) -> Function {
        let mut current = function.clone();
        for sweep in 0..self.n_tries() {
            let (next, removed) = sweep_function(&current);
            current = next;
            debug!(kernel = function.name(), sweep, removed, "Optimizer sweep");
            if removed == 0 {
                break;
            }
        }
        current
    }
}

/// One sweep. Returns the rewritten function and the number of
/// instructions removed.
fn sweep_function(function: &Function) -> (Function, usize) {
    let mut slots: Vec<Option<Instruction>> = Vec::with_capacity(function.len());
    let mut wires: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    let mut removed = 0;

    for inst in function.instructions() {
        if !inst.is_enabled() {
            removed += 1;
            continue;
        }
        let inst = match inst {
            Instruction::Composite(inner) => {
                let (optimized, n) = sweep_function(inner);
                removed += n;
                Instruction::Composite(optimized)
            }
            Instruction::Leaf(op) => {
                if let Some(previous) = cancellation_partner(op, &slots, &wires) {
                    slots[previous] = None;
                    for bit in op.bits() {
                        if let Some(stack) = wires.get_mut(bit) {
                            stack.pop();
                        }
                    }
                    removed += 2;
                    continue;
                }
                Instruction::Leaf(op.clone())
            }
        };

        let index = slots.len();
        for bit in inst.bits() {
            wires.entry(bit).or_default().push(index);
        }
        slots.push(Some(inst));
    }

    let mut rebuilt = function.clone();
    while !rebuilt.is_empty() {
        if rebuilt.remove_instruction(rebuilt.len() - 1).is_err() {
            break;
        }
    }
    for inst in slots.into_iter().flatten() {
        rebuilt.add_instruction(inst);
    }
    (rebuilt, removed)
}

/// Index of the kept instruction that `op` cancels against, if any.
fn cancellation_partner(
    op: &Operation,
    slots: &[Option<Instruction>],
    wires: &BTreeMap<usize, Vec<usize>>,
) -> Option<usize> {
    if !self_inverse(op) || op.bits().is_empty() {
        return None;
    }
    let mut tops = op
        .bits()
        .iter()
        .map(|bit| wires.get(bit).and_then(|stack| stack.last().copied()));
    let first = tops.next()??;
    if !tops.all(|top| top == Some(first)) {
        return None;
    }
    let previous = slots.get(first)?.as_ref()?.as_operation()?;
    // The partner must not touch bits beyond the ones `op` uses.
    (previous.bits().len() == op.bits().len() && cancels(previous, op)).then_some(first)
}

impl IrTransformation for CircuitOptimizer {
    fn name(&self) -> &str {
        "circuit-optimizer"
    }

    fn description(&self) -> &str {
        "Cancels adjacent self-inverse gate pairs and drops disabled instructions"
    }

    fn transform(&self, ir: &Ir) -> IrResult<Ir> {
        Ok(ir
            .kernels()
            .iter()
            .map(|kernel| self.optimize(kernel))
            .collect::<Vec<_>>()
            .into())
    }
}

impl OptionsProvider for CircuitOptimizer {
    fn options(&self) -> Vec<OptionSpec> {
        vec![OptionSpec::new(
            "circuit-opt-n-tries",
            "Maximum number of cancellation sweeps per kernel",
        )]
    }

    fn handle_options(&self, options: &BTreeMap<String, String>) -> bool {
        match parse_option::<usize>(options, "circuit-opt-n-tries") {
            Ok(Some(n)) if n > 0 => {
                self.n_tries.store(n, Ordering::Relaxed);
                true
            }
            Ok(Some(_)) => {
                warn!("circuit-opt-n-tries must be positive; keeping {}", self.n_tries());
                false
            }
            Ok(None) => false,
            Err(e) => {
                warn!("{e}");
                false
            }
        }
    }
}
