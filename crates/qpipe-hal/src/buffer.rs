//! Accelerator result buffers.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::HalResult;

/// Key under which an explicit Z expectation value overrides the one
/// computed from counts.
pub const EXP_VAL_Z: &str = "exp-val-z";

/// Typed value stored in a buffer's extra-info map.
///
/// Persisted as `{"type": ..., "value": ...}` so that every variant,
/// including empty lists, reloads as itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum ExtraInfo {
    /// Integer.
    Int(i64),
    /// Real.
    Double(#[serde(with = "real")] f64),
    /// String.
    String(String),
    /// Integer list.
    IntList(Vec<i64>),
    /// Real list.
    DoubleList(#[serde(with = "real::list")] Vec<f64>),
    /// String list.
    StringList(Vec<String>),
}

/// JSON has no NaN or infinities; those are written as the strings `"NaN"`,
/// `"inf"` and `"-inf"`.
mod real {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Named(String),
    }

    fn encode(v: f64) -> Repr {
        if v.is_nan() {
            Repr::Named("NaN".into())
        } else if v.is_infinite() {
            Repr::Named(if v > 0.0 { "inf" } else { "-inf" }.into())
        } else {
            Repr::Number(v)
        }
    }

    fn decode<E: Error>(repr: Repr) -> Result<f64, E> {
        match repr {
            Repr::Number(v) => Ok(v),
            Repr::Named(name) => match name.as_str() {
                "NaN" => Ok(f64::NAN),
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                other => Err(E::custom(format!("invalid real '{other}'"))),
            },
        }
    }

    pub fn serialize<S: Serializer>(v: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        encode(*v).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        decode(Repr::deserialize(deserializer)?)
    }

    pub mod list {
        use super::{Deserialize, Deserializer, Repr, Serializer, decode, encode};

        pub fn serialize<S: Serializer>(v: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_seq(v.iter().map(|&x| encode(x)))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
            Vec::<Repr>::deserialize(deserializer)?
                .into_iter()
                .map(decode)
                .collect()
        }
    }
}

impl ExtraInfo {
    /// Numeric value of scalar entries.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss)]
            ExtraInfo::Int(v) => Some(*v as f64),
            ExtraInfo::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// String value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ExtraInfo::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i64> for ExtraInfo {
    fn from(v: i64) -> Self {
        ExtraInfo::Int(v)
    }
}

impl From<usize> for ExtraInfo {
    fn from(v: usize) -> Self {
        ExtraInfo::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for ExtraInfo {
    fn from(v: f64) -> Self {
        ExtraInfo::Double(v)
    }
}

impl From<&str> for ExtraInfo {
    fn from(v: &str) -> Self {
        ExtraInfo::String(v.to_string())
    }
}

impl From<String> for ExtraInfo {
    fn from(v: String) -> Self {
        ExtraInfo::String(v)
    }
}

impl From<Vec<i64>> for ExtraInfo {
    fn from(v: Vec<i64>) -> Self {
        ExtraInfo::IntList(v)
    }
}

impl From<Vec<f64>> for ExtraInfo {
    fn from(v: Vec<f64>) -> Self {
        ExtraInfo::DoubleList(v)
    }
}

impl From<Vec<String>> for ExtraInfo {
    fn from(v: Vec<String>) -> Self {
        ExtraInfo::StringList(v)
    }
}

/// A register of qubits plus the results of executing against it.
///
/// `counts` is always the histogram of `measurements`. Bitstring character
/// `i` is classical slot `i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceleratorBuffer {
    name: String,
    size: usize,
    #[serde(default)]
    measurements: Vec<String>,
    #[serde(default)]
    counts: BTreeMap<String, u64>,
    #[serde(default)]
    extra_info: BTreeMap<String, ExtraInfo>,
    #[serde(default)]
    children: Vec<AcceleratorBuffer>,
}

impl AcceleratorBuffer {
    /// Create an empty buffer over `size` qubits.
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            size,
            measurements: Vec::new(),
            counts: BTreeMap::new(),
            extra_info: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Buffer name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of qubits.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Record one measured bitstring.
    pub fn append_measurement(&mut self, bits: impl Into<String>) {
        let bits = bits.into();
        *self.counts.entry(bits.clone()).or_insert(0) += 1;
        self.measurements.push(bits);
    }

    /// Record `count` occurrences of `bits`.
    pub fn append_measurement_count(&mut self, bits: impl Into<String>, count: u64) {
        if count == 0 {
            return;
        }
        let bits = bits.into();
        for _ in 0..count {
            self.measurements.push(bits.clone());
        }
        *self.counts.entry(bits).or_insert(0) += count;
    }

    /// Replace all measurement state with `counts`.
    pub fn replace_counts(&mut self, counts: BTreeMap<String, u64>) {
        self.measurements.clear();
        self.counts.clear();
        for (bits, count) in counts {
            self.append_measurement_count(bits, count);
        }
    }

    /// Copy another buffer's measurements into this one.
    pub fn merge_measurements(&mut self, other: &AcceleratorBuffer) {
        for bits in &other.measurements {
            self.append_measurement(bits.clone());
        }
    }

    /// Take measurements and extra info from `other`.
    pub fn absorb(&mut self, other: &AcceleratorBuffer) {
        self.merge_measurements(other);
        for (key, value) in &other.extra_info {
            self.extra_info.insert(key.clone(), value.clone());
        }
    }

    /// Measured bitstrings in recording order.
    pub fn measurements(&self) -> &[String] {
        &self.measurements
    }

    /// Bitstring to occurrence count.
    pub fn measurement_counts(&self) -> &BTreeMap<String, u64> {
        &self.counts
    }

    /// Total recorded shots.
    pub fn total_shots(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Fraction of shots that produced `bits`.
    pub fn compute_measurement_probability(&self, bits: &str) -> f64 {
        let total = self.total_shots();
        if total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let p = self.counts.get(bits).copied().unwrap_or(0) as f64 / total as f64;
        p
    }

    /// Distinct bitstrings observed, sorted.
    pub fn all_unique(&self) -> Vec<String> {
        self.counts.keys().cloned().collect()
    }

    /// Z-basis expectation value: the `exp-val-z` extra info if present,
    /// otherwise the parity-weighted sum over counts. Zero when empty.
    pub fn expectation_value_z(&self) -> f64 {
        if let Some(v) = self.extra_info.get(EXP_VAL_Z).and_then(ExtraInfo::as_f64) {
            return v;
        }
        expectation_from_counts(&self.counts)
    }

    /// Clear measurements and counts, keeping everything else.
    pub fn reset_buffer(&mut self) {
        self.measurements.clear();
        self.counts.clear();
    }

    /// Store an extra-info entry.
    pub fn add_extra_info(&mut self, key: impl Into<String>, value: impl Into<ExtraInfo>) {
        self.extra_info.insert(key.into(), value.into());
    }

    /// Extra-info entry for `key`.
    pub fn information(&self, key: &str) -> Option<&ExtraInfo> {
        self.extra_info.get(key)
    }

    /// All extra-info entries.
    pub fn extra_info(&self) -> &BTreeMap<String, ExtraInfo> {
        &self.extra_info
    }

    /// True if `key` is present.
    pub fn has_extra_info_key(&self, key: &str) -> bool {
        self.extra_info.contains_key(key)
    }

    /// Extra-info keys, sorted.
    pub fn list_extra_info_keys(&self) -> Vec<String> {
        self.extra_info.keys().cloned().collect()
    }

    /// Attach a child result buffer.
    pub fn append_child(&mut self, child: AcceleratorBuffer) {
        self.children.push(child);
    }

    /// Child buffers in attachment order.
    pub fn children(&self) -> &[AcceleratorBuffer] {
        &self.children
    }

    /// First child named `name`.
    pub fn child(&self, name: &str) -> Option<&AcceleratorBuffer> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Names of the children in order.
    pub fn children_names(&self) -> Vec<String> {
        self.children.iter().map(|c| c.name.clone()).collect()
    }

    /// Number of children.
    pub fn n_children(&self) -> usize {
        self.children.len()
    }

    /// Write the buffer as JSON.
    pub fn persist<W: Write>(&self, writer: W) -> HalResult<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Read a buffer written by [`AcceleratorBuffer::persist`].
    pub fn load<R: Read>(reader: R) -> HalResult<Self> {
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Parity-weighted Z expectation of a histogram: each bitstring with an odd
/// number of ones contributes negatively.
pub fn expectation_from_counts(counts: &BTreeMap<String, u64>) -> f64 {
    let total: u64 = counts.values().sum();
    if total == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let signed: f64 = counts
        .iter()
        .map(|(bits, &count)| {
            let ones = bits.chars().filter(|&c| c == '1').count();
            if ones % 2 == 0 {
                count as f64
            } else {
                -(count as f64)
            }
        })
        .sum();
    #[allow(clippy::cast_precision_loss)]
    let total = total as f64;
    signed / total
}

impl fmt::Display for AcceleratorBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string_pretty(self) {
            Ok(json) => write!(f, "{json}"),
            Err(_) => Err(fmt::Error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_follow_measurements() {
        let mut buf = AcceleratorBuffer::new("q", 2);
        buf.append_measurement("00");
        buf.append_measurement("11");
        buf.append_measurement("11");
        buf.append_measurement_count("01", 2);

        assert_eq!(buf.measurements().len(), 5);
        assert_eq!(buf.measurement_counts().get("11"), Some(&2));
        assert_eq!(buf.total_shots(), 5);
        assert!((buf.compute_measurement_probability("01") - 0.4).abs() < 1e-12);
        assert_eq!(buf.all_unique(), vec!["00", "01", "11"]);
    }

    #[test]
    fn test_expectation_value() {
        let mut buf = AcceleratorBuffer::new("q", 2);
        assert_eq!(buf.expectation_value_z(), 0.0);
        buf.append_measurement_count("00", 3);
        buf.append_measurement_count("01", 1);
        assert!((buf.expectation_value_z() - 0.5).abs() < 1e-12);

        buf.add_extra_info(EXP_VAL_Z, -0.25);
        assert!((buf.expectation_value_z() + 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_reset_keeps_extra_info() {
        let mut buf = AcceleratorBuffer::new("q", 1);
        buf.append_measurement("1");
        buf.add_extra_info("note", "kept");
        buf.reset_buffer();
        assert!(buf.measurements().is_empty());
        assert!(buf.measurement_counts().is_empty());
        assert!(buf.has_extra_info_key("note"));
        assert_eq!(buf.size(), 1);
    }

    #[test]
    fn test_replace_counts() {
        let mut buf = AcceleratorBuffer::new("q", 1);
        buf.append_measurement_count("0", 10);
        buf.replace_counts(BTreeMap::from([("1".to_string(), 4), ("0".to_string(), 0)]));
        assert_eq!(buf.total_shots(), 4);
        assert_eq!(buf.measurements().len(), 4);
        assert!(!buf.measurement_counts().contains_key("0"));
    }

    #[test]
    fn test_children() {
        let mut parent = AcceleratorBuffer::new("q", 2);
        parent.append_child(AcceleratorBuffer::new("k0", 2));
        parent.append_child(AcceleratorBuffer::new("k1", 2));
        assert_eq!(parent.n_children(), 2);
        assert_eq!(parent.children_names(), vec!["k0", "k1"]);
        assert!(parent.child("k1").is_some());
        assert!(parent.child("k2").is_none());
    }

    #[test]
    fn test_persist_round_trip() {
        let mut buf = AcceleratorBuffer::new("q", 3);
        buf.append_measurement_count("010", 7);
        buf.append_measurement("111");
        buf.add_extra_info("energy", -1.137);
        buf.add_extra_info("scales", vec![1.0, 3.0]);
        buf.add_extra_info("labels", vec!["a".to_string()]);
        buf.add_extra_info("shots", 8_i64);
        let mut child = AcceleratorBuffer::new("k", 3);
        child.append_measurement("000");
        buf.append_child(child);

        let mut out = Vec::new();
        buf.persist(&mut out).unwrap();
        let back = AcceleratorBuffer::load(out.as_slice()).unwrap();
        assert_eq!(back, buf);
        assert_eq!(back.expectation_value_z(), buf.expectation_value_z());
    }

    #[test]
    fn test_persist_keeps_empty_lists_typed() {
        let mut buf = AcceleratorBuffer::new("q", 1);
        buf.add_extra_info("values", Vec::<f64>::new());
        buf.add_extra_info("names", Vec::<String>::new());
        buf.add_extra_info("ids", Vec::<i64>::new());

        let mut out = Vec::new();
        buf.persist(&mut out).unwrap();
        let back = AcceleratorBuffer::load(out.as_slice()).unwrap();
        assert_eq!(back.information("values"), Some(&ExtraInfo::DoubleList(vec![])));
        assert_eq!(back.information("names"), Some(&ExtraInfo::StringList(vec![])));
        assert_eq!(back.information("ids"), Some(&ExtraInfo::IntList(vec![])));
    }

    #[test]
    fn test_persist_non_finite_reals() {
        let mut buf = AcceleratorBuffer::new("q", 1);
        buf.add_extra_info(EXP_VAL_Z, f64::NAN);
        buf.add_extra_info("bounds", vec![f64::NEG_INFINITY, 0.5, f64::INFINITY]);

        let mut out = Vec::new();
        buf.persist(&mut out).unwrap();
        let back = AcceleratorBuffer::load(out.as_slice()).unwrap();
        assert!(back.expectation_value_z().is_nan());
        assert_eq!(
            back.information("bounds"),
            Some(&ExtraInfo::DoubleList(vec![f64::NEG_INFINITY, 0.5, f64::INFINITY]))
        );
    }

    #[test]
    fn test_load_rejects_unknown_real_name() {
        let json = r#"{"name": "q", "size": 1,
            "extra_info": {"x": {"type": "double", "value": "huge"}}}"#;
        assert!(AcceleratorBuffer::load(json.as_bytes()).is_err());
    }
}
