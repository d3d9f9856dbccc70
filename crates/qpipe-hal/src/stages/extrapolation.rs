//! Richardson zero-noise extrapolation.
//!
//! Noise is amplified by folding: every enabled two-qubit gate is repeated
//! `r` times for an odd scale `r`, which leaves the ideal circuit unchanged
//! (the gates are self-inverse) while multiplying their error. The
//! expectation values measured at each scale are fitted with a straight
//! line and the intercept at zero noise is reported.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use qpipe_ir::{Function, Instruction};
use qpipe_registry::{OptionSpec, OptionsProvider, RegistryError, parse_list};
use tracing::{debug, warn};

use crate::buffer::{AcceleratorBuffer, EXP_VAL_Z};
use crate::decorator::{ExecutionStage, Next};
use crate::error::{HalError, HalResult};

const SCALES: &str = "rich-extrap-r";
const SCALES_INFO: &str = "rich-extrap-scales";
const VALUES_INFO: &str = "rich-extrap-values";

/// Two-qubit gates that are their own inverse.
const FOLDABLE: [&str; 4] = ["CNOT", "CZ", "Swap", "CY"];

/// Runs the chain at several noise scales and extrapolates `exp-val-z` to
/// zero noise.
///
/// A failed scale is skipped with a warning as long as two points remain
/// for the fit; otherwise the last failure is returned.
#[derive(Debug)]
pub struct RichardsonExtrapolation {
    scales: RwLock<Vec<usize>>,
}

impl Default for RichardsonExtrapolation {
    fn default() -> Self {
        Self {
            scales: RwLock::new(vec![1, 3, 5]),
        }
    }
}

impl RichardsonExtrapolation {
    /// Stage with the default scales `1, 3, 5`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configured noise scales.
    pub fn scales(&self) -> Vec<usize> {
        self.scales
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

fn validate_scales(scales: &[usize]) -> Result<(), RegistryError> {
    let invalid = |message: String| RegistryError::InvalidOption {
        key: SCALES.into(),
        message,
    };
    if scales.is_empty() {
        return Err(invalid("no scales given".into()));
    }
    if let Some(r) = scales.iter().find(|&&r| r % 2 == 0) {
        return Err(invalid(format!("scale {r} is not odd")));
    }
    let mut sorted = scales.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    if sorted.len() != scales.len() {
        return Err(invalid("scales must be distinct".into()));
    }
    Ok(())
}

/// Copy of `function` with every enabled foldable two-qubit gate repeated
/// `scale` times, recursing into composites.
pub fn fold_two_qubit_gates(function: &Function, scale: usize) -> HalResult<Function> {
    let mut folded = function.clone();
    for i in (0..folded.len()).rev() {
        let instruction = folded.instruction(i)?.clone();
        match &instruction {
            Instruction::Composite(inner) => {
                folded.replace_instruction(i, Instruction::Composite(fold_two_qubit_gates(inner, scale)?))?;
            }
            Instruction::Leaf(op)
                if op.is_enabled()
                    && op.bits().len() == 2
                    && FOLDABLE.iter().any(|g| g.eq_ignore_ascii_case(op.name())) =>
            {
                for _ in 1..scale {
                    folded.insert_instruction(i, instruction.clone())?;
                }
            }
            Instruction::Leaf(_) => {}
        }
    }
    Ok(folded)
}

/// Least-squares line through `points`, evaluated at zero.
pub fn linear_intercept(points: &[(f64, f64)]) -> HalResult<f64> {
    if points.len() < 2 {
        return Err(HalError::InsufficientData(format!(
            "linear fit needs two points, got {}",
            points.len()
        )));
    }
    #[allow(clippy::cast_precision_loss)]
    let n = points.len() as f64;
    let sum_x: f64 = points.iter().map(|(x, _)| x).sum();
    let sum_y: f64 = points.iter().map(|(_, y)| y).sum();
    let sum_xy: f64 = points.iter().map(|(x, y)| x * y).sum();
    let sum_x2: f64 = points.iter().map(|(x, _)| x * x).sum();

    let denom = n * sum_x2 - sum_x * sum_x;
    if denom.abs() < f64::EPSILON {
        return Err(HalError::InsufficientData(
            "noise scales are not distinct".into(),
        ));
    }
    let slope = (n * sum_xy - sum_x * sum_y) / denom;
    Ok((sum_y - slope * sum_x) / n)
}

impl OptionsProvider for RichardsonExtrapolation {
    fn options(&self) -> Vec<OptionSpec> {
        vec![OptionSpec::new(
            SCALES,
            "Comma-separated odd noise scales (default 1,3,5)",
        )]
    }

    fn handle_options(&self, options: &BTreeMap<String, String>) -> bool {
        super::broadcast_options(self, options)
    }
}

#[async_trait]
impl ExecutionStage for RichardsonExtrapolation {
    fn name(&self) -> &str {
        "rich-extrapolation"
    }

    fn apply_options(&self, options: &BTreeMap<String, String>) -> HalResult<bool> {
        let Some(scales) = parse_list::<usize>(options, SCALES)? else {
            return Ok(false);
        };
        validate_scales(&scales)?;
        *self
            .scales
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = scales;
        Ok(true)
    }

    async fn execute(
        &self,
        buffer: &mut AcceleratorBuffer,
        function: &Function,
        next: Next<'_>,
    ) -> HalResult<()> {
        let mut points = Vec::new();
        let mut first_run: Option<AcceleratorBuffer> = None;
        let mut last_error = None;

        for scale in self.scales() {
            let folded = fold_two_qubit_gates(function, scale)?;
            let mut scratch = AcceleratorBuffer::new(buffer.name(), buffer.size());
            match next.run(&mut scratch, &folded).await {
                Ok(()) => {
                    let value = scratch.expectation_value_z();
                    debug!(scale, value, "Noise scale measured");
                    #[allow(clippy::cast_precision_loss)]
                    points.push((scale as f64, value));
                    first_run.get_or_insert(scratch);
                }
                Err(e) => {
                    warn!(scale, "Skipping failed noise scale: {e}");
                    last_error = Some(e);
                }
            }
        }

        if points.len() < 2 {
            return Err(last_error.unwrap_or_else(|| {
                HalError::InsufficientData(format!(
                    "rich-extrapolation needs two noise scales, got {}",
                    points.len()
                ))
            }));
        }

        let estimate = linear_intercept(&points)?;
        if let Some(run) = first_run {
            buffer.absorb(&run);
        }
        buffer.add_extra_info(SCALES_INFO, points.iter().map(|(x, _)| *x).collect::<Vec<_>>());
        buffer.add_extra_info(VALUES_INFO, points.iter().map(|(_, y)| *y).collect::<Vec<_>>());
        buffer.add_extra_info(EXP_VAL_Z, estimate);
        Ok(())
    }
}
