//! Leaf and composite instructions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{IrError, IrResult};
use crate::function::Function;
use crate::parameter::Parameter;

/// Canonical name of the measurement instruction.
pub const MEASURE: &str = "Measure";

/// A leaf operation: a named kind applied to bits with parameters.
///
/// Bit and parameter counts are fixed at construction; parameters may be
/// replaced in place but never added or removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    name: String,
    bits: Vec<usize>,
    parameters: Vec<Parameter>,
    enabled: bool,
    #[serde(default)]
    analog: bool,
}

impl Operation {
    /// Create an enabled digital operation.
    pub fn new(
        name: impl Into<String>,
        bits: impl IntoIterator<Item = usize>,
        parameters: impl IntoIterator<Item = Parameter>,
    ) -> Self {
        Self {
            name: name.into(),
            bits: bits.into_iter().collect(),
            parameters: parameters.into_iter().collect(),
            enabled: true,
            analog: false,
        }
    }

    /// Create a measurement of `qubit` into classical slot `slot`.
    pub fn measure(qubit: usize, slot: usize) -> Self {
        Self::new(MEASURE, [qubit], [Parameter::Int(slot as i64)])
    }

    /// Mark this operation as analog.
    #[must_use]
    pub fn with_analog(mut self, analog: bool) -> Self {
        self.analog = analog;
        self
    }

    /// The instruction kind name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bits this operation acts on.
    pub fn bits(&self) -> &[usize] {
        &self.bits
    }

    /// Parameters in positional order.
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Parameter at position `index`.
    pub fn parameter(&self, index: usize) -> Option<&Parameter> {
        self.parameters.get(index)
    }

    /// Replace the parameter at `index`.
    pub fn set_parameter(&mut self, index: usize, value: impl Into<Parameter>) -> IrResult<()> {
        let len = self.parameters.len();
        let slot = self
            .parameters
            .get_mut(index)
            .ok_or_else(|| IrError::IndexOutOfRange {
                index,
                len,
                context: self.name.clone(),
            })?;
        *slot = value.into();
        Ok(())
    }

    /// True for measurement operations.
    pub fn is_measure(&self) -> bool {
        self.name == MEASURE
    }

    /// Classical slot targeted by a measurement.
    pub fn classical_slot(&self) -> Option<usize> {
        if !self.is_measure() {
            return None;
        }
        self.parameters
            .first()
            .and_then(Parameter::as_int)
            .and_then(|v| usize::try_from(v).ok())
    }

    /// True if enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// True if analog.
    pub fn is_analog(&self) -> bool {
        self.analog
    }

    fn check_bits(&self, map: &[usize]) -> IrResult<()> {
        match self.bits.iter().find(|&&b| b >= map.len()) {
            Some(&bit) => Err(IrError::InvalidBitMap {
                bit,
                map_len: map.len(),
            }),
            None => Ok(()),
        }
    }

    fn apply_bits(&mut self, map: &[usize]) {
        for bit in &mut self.bits {
            *bit = map[*bit];
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.parameters.is_empty() {
            let params: Vec<String> = self.parameters.iter().map(ToString::to_string).collect();
            write!(f, "({})", params.join(","))?;
        }
        let bits: Vec<String> = self.bits.iter().map(|b| format!("q{b}")).collect();
        if !bits.is_empty() {
            write!(f, " {}", bits.join(","))?;
        }
        Ok(())
    }
}

/// A node of the instruction tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instruction {
    /// A leaf operation.
    Leaf(Operation),
    /// A nested function used as a single instruction.
    Composite(Function),
}

impl Instruction {
    /// Shorthand for a leaf instruction.
    pub fn op(
        name: impl Into<String>,
        bits: impl IntoIterator<Item = usize>,
        parameters: impl IntoIterator<Item = Parameter>,
    ) -> Self {
        Instruction::Leaf(Operation::new(name, bits, parameters))
    }

    /// Name of the operation or nested function.
    pub fn name(&self) -> &str {
        match self {
            Instruction::Leaf(op) => op.name(),
            Instruction::Composite(f) => f.name(),
        }
    }

    /// Bits referenced by this instruction. Composites report the sorted
    /// distinct bits of their subtree.
    pub fn bits(&self) -> Vec<usize> {
        match self {
            Instruction::Leaf(op) => op.bits().to_vec(),
            Instruction::Composite(f) => f.bits(),
        }
    }

    /// True only for composites.
    pub fn is_composite(&self) -> bool {
        matches!(self, Instruction::Composite(_))
    }

    /// True if enabled.
    pub fn is_enabled(&self) -> bool {
        match self {
            Instruction::Leaf(op) => op.enabled,
            Instruction::Composite(f) => f.is_enabled(),
        }
    }

    /// Include this instruction in emitted output.
    pub fn enable(&mut self) {
        self.set_enabled(true);
    }

    /// Exclude this instruction from emitted output; it stays in the tree.
    pub fn disable(&mut self) {
        self.set_enabled(false);
    }

    fn set_enabled(&mut self, enabled: bool) {
        match self {
            Instruction::Leaf(op) => op.enabled = enabled,
            Instruction::Composite(f) => f.set_enabled(enabled),
        }
    }

    /// True if analog. Composites are analog if anything inside is.
    pub fn is_analog(&self) -> bool {
        match self {
            Instruction::Leaf(op) => op.analog,
            Instruction::Composite(f) => f.is_analog(),
        }
    }

    /// The leaf operation, if any.
    pub fn as_operation(&self) -> Option<&Operation> {
        match self {
            Instruction::Leaf(op) => Some(op),
            Instruction::Composite(_) => None,
        }
    }

    /// Mutable leaf operation, if any.
    pub fn as_operation_mut(&mut self) -> Option<&mut Operation> {
        match self {
            Instruction::Leaf(op) => Some(op),
            Instruction::Composite(_) => None,
        }
    }

    /// The nested function, if any.
    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Instruction::Composite(f) => Some(f),
            Instruction::Leaf(_) => None,
        }
    }

    /// Check that `map` covers every referenced bit.
    pub(crate) fn check_bits(&self, map: &[usize]) -> IrResult<()> {
        match self {
            Instruction::Leaf(op) => op.check_bits(map),
            Instruction::Composite(f) => f
                .instructions()
                .iter()
                .try_for_each(|inst| inst.check_bits(map)),
        }
    }

    /// Rewrite bits through a map already validated by `check_bits`.
    pub(crate) fn apply_bits(&mut self, map: &[usize]) {
        match self {
            Instruction::Leaf(op) => op.apply_bits(map),
            Instruction::Composite(f) => f.apply_bits(map),
        }
    }

    /// Replace every bit `b` with `map[b]`, recursively.
    pub fn map_bits(&mut self, map: &[usize]) -> IrResult<()> {
        match self {
            Instruction::Leaf(op) => {
                op.check_bits(map)?;
                op.apply_bits(map);
                Ok(())
            }
            Instruction::Composite(f) => f.map_bits(map),
        }
    }
}

impl From<Operation> for Instruction {
    fn from(op: Operation) -> Self {
        Instruction::Leaf(op)
    }
}

impl From<Function> for Instruction {
    fn from(f: Function) -> Self {
        Instruction::Composite(f)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Leaf(op) => write!(f, "{op}"),
            Instruction::Composite(func) => write!(f, "{func}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_display() {
        let op = Operation::new("Rz", [1], [Parameter::Double(0.5)]);
        assert_eq!(op.to_string(), "Rz(0.5) q1");
        let cx = Operation::new("CNOT", [0, 1], []);
        assert_eq!(cx.to_string(), "CNOT q0,q1");
    }

    #[test]
    fn test_set_parameter_keeps_arity() {
        let mut op = Operation::new("Rx", [0], [Parameter::from("theta")]);
        op.set_parameter(0, 1.25).unwrap();
        assert_eq!(op.parameters(), &[Parameter::Double(1.25)]);
        let err = op.set_parameter(1, 0.0).unwrap_err();
        assert!(matches!(err, IrError::IndexOutOfRange { index: 1, len: 1, .. }));
    }

    #[test]
    fn test_measure_slot() {
        let m = Operation::measure(2, 5);
        assert!(m.is_measure());
        assert_eq!(m.classical_slot(), Some(5));
        assert_eq!(Operation::new("H", [0], []).classical_slot(), None);
    }

    #[test]
    fn test_map_bits_is_atomic() {
        let mut inst = Instruction::op("CNOT", [0, 3], []);
        let err = inst.map_bits(&[4, 5]).unwrap_err();
        assert!(matches!(err, IrError::InvalidBitMap { bit: 3, map_len: 2 }));
        assert_eq!(inst.bits(), vec![0, 3]);

        inst.map_bits(&[4, 5, 6, 7]).unwrap();
        assert_eq!(inst.bits(), vec![4, 7]);
    }

    #[test]
    fn test_disable_enable() {
        let mut inst = Instruction::op("H", [0], []);
        inst.disable();
        assert!(!inst.is_enabled());
        inst.enable();
        assert!(inst.is_enabled());
    }
}
