//! Built-in execution stages.
//!
//! | Stage | Name | Options |
//! |-------|------|---------|
//! | [`ImprovedSampling`] | `improved-sampling` | `sampler-n-execs` |
//! | [`ReadoutErrorCorrection`] | `ro-error` | `ro-error-p01`, `ro-error-p10` |
//! | [`RichardsonExtrapolation`] | `rich-extrapolation` | `rich-extrap-r` |

mod extrapolation;
mod readout;
mod sampling;

use std::collections::BTreeMap;

use tracing::warn;

use crate::decorator::ExecutionStage;

pub use extrapolation::{RichardsonExtrapolation, fold_two_qubit_gates, linear_intercept};
pub use readout::ReadoutErrorCorrection;
pub use sampling::ImprovedSampling;

/// Forward an options map to a stage, logging malformed values instead of
/// failing. Used by the registry-wide option broadcast.
pub(crate) fn broadcast_options(stage: &dyn ExecutionStage, options: &BTreeMap<String, String>) -> bool {
    match stage.apply_options(options) {
        Ok(handled) => handled,
        Err(e) => {
            warn!(stage = stage.name(), "Ignoring options: {e}");
            false
        }
    }
}
