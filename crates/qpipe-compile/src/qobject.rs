//! QObject wire schema.
//!
//! A QObject request carries one experiment per kernel:
//!
//! ```json
//! {
//!   "qObject": {
//!     "qobj_id": "...", "schema_version": "1.1.0", "type": "QASM",
//!     "header": {},
//!     "config": {"shots": 1024, "memory": false, "meas_level": 2,
//!                "memory_slots": 2, "meas_return": "avg",
//!                "memory_slot_size": 100, "n_qubits": 2},
//!     "experiments": [{"header": {"name": "bell"},
//!                      "instructions": [{"name": "h", "qubits": [0], "params": []}]}]
//!   },
//!   "backend": {"name": "ibmq_qasm_simulator"}
//! }
//! ```
//!
//! Results come back as hex-keyed counts per experiment.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, CompileResult};

/// Default shot count.
pub const DEFAULT_SHOTS: u64 = 1024;

/// Schema version emitted.
pub const SCHEMA_VERSION: &str = "1.1.0";

/// A request envelope naming the target backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QObjectRoot {
    /// The request proper.
    #[serde(rename = "qObject")]
    pub qobject: QObject,
    /// Target backend.
    #[serde(default)]
    pub backend: BackendRef,
}

/// Backend reference inside a [`QObjectRoot`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendRef {
    /// Backend name.
    pub name: String,
}

/// Either an enveloped or a bare QObject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QObjectDocument {
    /// `{"qObject": ..., "backend": ...}`.
    Enveloped(QObjectRoot),
    /// A bare QObject.
    Bare(QObject),
}

impl QObjectDocument {
    /// The contained QObject.
    pub fn into_qobject(self) -> QObject {
        match self {
            QObjectDocument::Enveloped(root) => root.qobject,
            QObjectDocument::Bare(qobject) => qobject,
        }
    }
}

/// A batch of experiments with shared execution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QObject {
    /// Request identifier.
    #[serde(default)]
    pub qobj_id: String,
    /// Schema version.
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    /// Object type, `QASM` for gate-model requests.
    #[serde(rename = "type", default = "default_type")]
    pub kind: String,
    /// Free-form header.
    #[serde(default)]
    pub header: serde_json::Map<String, serde_json::Value>,
    /// Execution settings.
    #[serde(default)]
    pub config: QObjectConfig,
    /// One experiment per kernel.
    #[serde(default)]
    pub experiments: Vec<Experiment>,
}

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

fn default_type() -> String {
    "QASM".to_string()
}

/// Execution settings shared by every experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QObjectConfig {
    /// Shots per experiment.
    #[serde(default = "default_shots")]
    pub shots: u64,
    /// Return per-shot memory.
    #[serde(default)]
    pub memory: bool,
    /// Measurement level, 2 for discriminated bits.
    #[serde(default = "default_meas_level")]
    pub meas_level: u32,
    /// Classical slots needed by the widest experiment.
    #[serde(default)]
    pub memory_slots: usize,
    /// Return format, `avg` or `single`.
    #[serde(default = "default_meas_return")]
    pub meas_return: String,
    /// Size of each memory slot.
    #[serde(default = "default_memory_slot_size")]
    pub memory_slot_size: u32,
    /// Qubits needed by the widest experiment.
    #[serde(default)]
    pub n_qubits: usize,
}

fn default_shots() -> u64 {
    DEFAULT_SHOTS
}

fn default_meas_level() -> u32 {
    2
}

fn default_meas_return() -> String {
    "avg".to_string()
}

fn default_memory_slot_size() -> u32 {
    100
}

impl Default for QObjectConfig {
    fn default() -> Self {
        Self {
            shots: DEFAULT_SHOTS,
            memory: false,
            meas_level: default_meas_level(),
            memory_slots: 0,
            meas_return: default_meas_return(),
            memory_slot_size: default_memory_slot_size(),
            n_qubits: 0,
        }
    }
}

/// One kernel on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    /// Experiment metadata.
    pub header: ExperimentHeader,
    /// Flat operation list.
    #[serde(default)]
    pub instructions: Vec<QObjectInstruction>,
}

/// Experiment metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentHeader {
    /// Kernel name.
    pub name: String,
    /// Classical slots used by this experiment.
    #[serde(default)]
    pub memory_slots: usize,
    /// Qubits used by this experiment.
    #[serde(default)]
    pub n_qubits: usize,
}

/// One operation on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QObjectInstruction {
    /// Lowercase operation name.
    pub name: String,
    /// Target qubits.
    #[serde(default)]
    pub qubits: Vec<usize>,
    /// Numeric parameters.
    #[serde(default)]
    pub params: Vec<f64>,
    /// Classical slots written by a measurement.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub memory: Vec<usize>,
}

/// Result document returned by a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QObjectResult {
    /// Backend-assigned job id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    /// Backend name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_name: Option<String>,
    /// Overall success.
    #[serde(default = "default_true")]
    pub success: bool,
    /// One result per experiment, in submission order.
    #[serde(default)]
    pub results: Vec<ExperimentResult>,
}

/// Result of one experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResult {
    /// Echo of the experiment header.
    pub header: ExperimentResultHeader,
    /// Shots executed.
    #[serde(default)]
    pub shots: u64,
    /// Experiment success.
    #[serde(default = "default_true")]
    pub success: bool,
    /// Measurement data.
    #[serde(default)]
    pub data: ExperimentData,
}

/// Echoed experiment header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentResultHeader {
    /// Kernel name.
    pub name: String,
}

/// Measurement data of one experiment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentData {
    /// Hex-encoded outcome to count, e.g. `"0x3": 512`.
    #[serde(default)]
    pub counts: BTreeMap<String, u64>,
}

fn default_true() -> bool {
    true
}

/// Decode a hex outcome key into a bitstring of `width` characters where
/// character `i` is classical slot `i`.
pub fn hex_to_bitstring(hex: &str, width: usize) -> CompileResult<String> {
    let digits = hex.trim().trim_start_matches("0x").trim_start_matches("0X");
    let value = u128::from_str_radix(if digits.is_empty() { "0" } else { digits }, 16)
        .map_err(|e| CompileError::Parse(format!("outcome key '{hex}': {e}")))?;
    if width < 128 && value >> width != 0 {
        return Err(CompileError::Parse(format!(
            "outcome key '{hex}' does not fit in {width} bits"
        )));
    }
    Ok((0..width)
        .map(|i| if i < 128 && (value >> i) & 1 == 1 { '1' } else { '0' })
        .collect())
}

/// Encode a bitstring (character `i` is slot `i`) as a hex outcome key.
pub fn bitstring_to_hex(bits: &str) -> CompileResult<String> {
    let mut value: u128 = 0;
    for (i, c) in bits.chars().enumerate() {
        match c {
            '0' => {}
            '1' if i < 128 => value |= 1 << i,
            _ => {
                return Err(CompileError::Parse(format!(
                    "'{bits}' is not an encodable bitstring"
                )));
            }
        }
    }
    Ok(format!("0x{value:x}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_decoding() {
        assert_eq!(hex_to_bitstring("0x0", 2).unwrap(), "00");
        assert_eq!(hex_to_bitstring("0x1", 3).unwrap(), "100");
        assert_eq!(hex_to_bitstring("0x6", 3).unwrap(), "011");
        assert!(hex_to_bitstring("0x8", 3).is_err());
        assert!(hex_to_bitstring("0xzz", 3).is_err());
        assert_eq!(bitstring_to_hex("011").unwrap(), "0x6");
        assert!(bitstring_to_hex("01x").is_err());
    }

    #[test]
    fn test_config_defaults() {
        let qobj: QObject =
            serde_json::from_str(r#"{"experiments": [{"header": {"name": "k"}}]}"#).unwrap();
        assert_eq!(qobj.config.shots, DEFAULT_SHOTS);
        assert_eq!(qobj.config.meas_level, 2);
        assert_eq!(qobj.config.meas_return, "avg");
        assert_eq!(qobj.config.memory_slot_size, 100);
        assert_eq!(qobj.kind, "QASM");
        assert_eq!(qobj.experiments[0].header.name, "k");
    }

    #[test]
    fn test_document_forms() {
        let bare = r#"{"qobj_id": "a", "experiments": []}"#;
        let doc: QObjectDocument = serde_json::from_str(bare).unwrap();
        assert_eq!(doc.into_qobject().qobj_id, "a");

        let wrapped = r#"{"qObject": {"qobj_id": "b"}, "backend": {"name": "sim"}}"#;
        let doc: QObjectDocument = serde_json::from_str(wrapped).unwrap();
        assert!(matches!(doc, QObjectDocument::Enveloped(_)));
        assert_eq!(doc.into_qobject().qobj_id, "b");
    }

    #[test]
    fn test_result_parsing() {
        let text = r#"{"job_id": "j1", "results": [
            {"header": {"name": "bell"}, "shots": 10, "data": {"counts": {"0x0": 6, "0x3": 4}}}
        ]}"#;
        let result: QObjectResult = serde_json::from_str(text).unwrap();
        assert!(result.success);
        assert_eq!(result.results[0].data.counts["0x3"], 4);
    }
}
