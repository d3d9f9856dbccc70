//! Readout error correction.
//!
//! Each classical bit `i` is modeled by a 2x2 confusion matrix
//!
//! ```text
//!   | 1 - p01    p10   |
//!   |   p01    1 - p10 |
//! ```
//!
//! where `p01` is the probability of reading 1 from a prepared 0 and `p10`
//! the reverse. The stage applies the tensor product of the per-bit
//! inverses to the measured distribution, clamps negative quasi
//! probabilities, renormalizes and rewrites the counts.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use qpipe_ir::Function;
use qpipe_registry::{OptionSpec, OptionsProvider, parse_list};
use tracing::debug;

use crate::buffer::{AcceleratorBuffer, expectation_from_counts};
use crate::decorator::{ExecutionStage, Next};
use crate::error::{HalError, HalResult};

const P01: &str = "ro-error-p01";
const P10: &str = "ro-error-p10";
const FIXED_EXP_VAL: &str = "ro-fixed-exp-val-z";
const RAW_EXP_VAL: &str = "ro-raw-exp-val-z";

#[derive(Debug, Default, Clone)]
struct Rates {
    p01: Option<Vec<f64>>,
    p10: Option<Vec<f64>>,
}

/// Rewrites measurement counts using per-bit readout error rates.
///
/// Rates come from `ro-error-p01`/`ro-error-p10`; without them the base
/// accelerator's one-bit error rates are used symmetrically. A single
/// value applies to every bit.
#[derive(Debug, Default)]
pub struct ReadoutErrorCorrection {
    rates: RwLock<Rates>,
}

impl ReadoutErrorCorrection {
    /// Stage without calibration; rates come from options or the base.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage with explicit per-bit rates.
    pub fn with_rates(p01: Vec<f64>, p10: Vec<f64>) -> Self {
        Self {
            rates: RwLock::new(Rates {
                p01: Some(p01),
                p10: Some(p10),
            }),
        }
    }

    fn resolve_rates(&self, fallback: &[f64]) -> HalResult<(Vec<f64>, Vec<f64>)> {
        let rates = self
            .rates
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        let p01 = rates.p01.or_else(|| non_empty(fallback));
        let p10 = rates.p10.or_else(|| non_empty(fallback));
        match (p01, p10) {
            (Some(p01), Some(p10)) => Ok((p01, p10)),
            _ => Err(HalError::Configuration(format!(
                "ro-error needs {P01} and {P10} or a calibrated accelerator"
            ))),
        }
    }
}

fn non_empty(rates: &[f64]) -> Option<Vec<f64>> {
    (!rates.is_empty()).then(|| rates.to_vec())
}

fn rate_for(rates: &[f64], bit: usize, key: &str) -> HalResult<f64> {
    let rate = match rates {
        [single] => *single,
        _ => *rates.get(bit).ok_or_else(|| {
            HalError::Configuration(format!(
                "{key} has {} entries, bit {bit} has no rate",
                rates.len()
            ))
        })?,
    };
    if (0.0..=1.0).contains(&rate) {
        Ok(rate)
    } else {
        Err(HalError::Configuration(format!("{key} rate {rate} is not a probability")))
    }
}

/// Apply the inverse confusion matrices to `counts`, returning corrected
/// probabilities (clamped and renormalized).
pub(crate) fn correct_distribution(
    counts: &BTreeMap<String, u64>,
    p01: &[f64],
    p10: &[f64],
) -> HalResult<BTreeMap<String, f64>> {
    let total: u64 = counts.values().sum();
    if total == 0 {
        return Ok(BTreeMap::new());
    }
    let width = counts.keys().map(String::len).max().unwrap_or(0);

    #[allow(clippy::cast_precision_loss)]
    let mut dist: BTreeMap<Vec<u8>, f64> = counts
        .iter()
        .map(|(bits, &c)| (bits.as_bytes().to_vec(), c as f64 / total as f64))
        .collect();

    for bit in 0..width {
        let a = rate_for(p01, bit, P01)?;
        let b = rate_for(p10, bit, P10)?;
        let det = 1.0 - a - b;
        if det.abs() < 1e-12 {
            return Err(HalError::Configuration(format!(
                "readout confusion matrix for bit {bit} is singular"
            )));
        }
        // Rows of the inverse, indexed by [true][measured].
        let inv = [[(1.0 - b) / det, -b / det], [-a / det, (1.0 - a) / det]];

        let mut next: BTreeMap<Vec<u8>, f64> = BTreeMap::new();
        for (key, value) in dist {
            let measured = usize::from(key.get(bit) == Some(&b'1'));
            for (truth, row) in inv.iter().enumerate() {
                let weight = row[measured] * value;
                if weight == 0.0 {
                    continue;
                }
                let mut target = key.clone();
                if let Some(slot) = target.get_mut(bit) {
                    *slot = if truth == 1 { b'1' } else { b'0' };
                }
                *next.entry(target).or_insert(0.0) += weight;
            }
        }
        dist = next;
    }

    let clamped: Vec<(Vec<u8>, f64)> = dist.into_iter().map(|(k, v)| (k, v.max(0.0))).collect();
    let norm: f64 = clamped.iter().map(|(_, v)| v).sum();
    if norm <= 0.0 {
        return Err(HalError::Execution(
            "readout correction produced an empty distribution".into(),
        ));
    }
    Ok(clamped
        .into_iter()
        .filter(|(_, v)| *v > 0.0)
        .map(|(k, v)| (String::from_utf8_lossy(&k).into_owned(), v / norm))
        .collect())
}

fn parity_expectation(probabilities: &BTreeMap<String, f64>) -> f64 {
    probabilities
        .iter()
        .map(|(bits, p)| {
            if bits.chars().filter(|&c| c == '1').count() % 2 == 0 {
                *p
            } else {
                -*p
            }
        })
        .sum()
}

impl OptionsProvider for ReadoutErrorCorrection {
    fn options(&self) -> Vec<OptionSpec> {
        vec![
            OptionSpec::new(P01, "Per-bit probability of reading 1 from a prepared 0"),
            OptionSpec::new(P10, "Per-bit probability of reading 0 from a prepared 1"),
        ]
    }

    fn handle_options(&self, options: &BTreeMap<String, String>) -> bool {
        super::broadcast_options(self, options)
    }
}

#[async_trait]
impl ExecutionStage for ReadoutErrorCorrection {
    fn name(&self) -> &str {
        "ro-error"
    }

    fn apply_options(&self, options: &BTreeMap<String, String>) -> HalResult<bool> {
        let p01 = parse_list::<f64>(options, P01)?;
        let p10 = parse_list::<f64>(options, P10)?;
        let handled = p01.is_some() || p10.is_some();
        let mut rates = self
            .rates
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(p01) = p01 {
            rates.p01 = Some(p01);
        }
        if let Some(p10) = p10 {
            rates.p10 = Some(p10);
        }
        Ok(handled)
    }

    async fn execute(
        &self,
        buffer: &mut AcceleratorBuffer,
        function: &Function,
        next: Next<'_>,
    ) -> HalResult<()> {
        next.run(buffer, function).await?;

        let raw = buffer.measurement_counts().clone();
        let total = buffer.total_shots();
        if total == 0 {
            return Ok(());
        }
        let (p01, p10) = self.resolve_rates(&next.accelerator().one_bit_error_rates())?;
        let corrected = correct_distribution(&raw, &p01, &p10)?;

        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let counts: BTreeMap<String, u64> = corrected
            .iter()
            .map(|(bits, p)| (bits.clone(), (p * total as f64).round() as u64))
            .filter(|(_, c)| *c > 0)
            .collect();

        let fixed = parity_expectation(&corrected);
        debug!(
            raw = expectation_from_counts(&raw),
            fixed, "Readout correction applied"
        );
        buffer.add_extra_info(RAW_EXP_VAL, expectation_from_counts(&raw));
        buffer.add_extra_info(FIXED_EXP_VAL, fixed);
        buffer.replace_counts(counts);
        Ok(())
    }
}
