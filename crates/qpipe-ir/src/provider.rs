//! Collaborator capabilities resolved by name through the registry, and the
//! built-in instruction families.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use crate::error::{IrError, IrResult};
use crate::function::{ANNEAL, Function, FunctionKind, QMI};
use crate::instruction::{Instruction, MEASURE, Operation};
use crate::ir::Ir;
use crate::parameter::Parameter;

/// Constructs canonical instructions and functions for one instruction
/// family.
pub trait IrProvider: Send + Sync {
    /// Family name, e.g. `"gate"`.
    fn name(&self) -> &str;

    /// Build an instruction, validating known kinds.
    fn create_instruction(
        &self,
        name: &str,
        bits: Vec<usize>,
        parameters: Vec<Parameter>,
    ) -> IrResult<Instruction>;

    /// Build an empty function of this family.
    fn create_function(&self, name: &str) -> Function;

    /// Build an empty IR.
    fn create_ir(&self) -> Ir {
        Ir::new()
    }

    /// Canonical names of the known instruction kinds.
    fn instructions(&self) -> Vec<String>;
}

/// A rewrite pass over a whole IR.
pub trait IrTransformation: Send + Sync {
    /// Pass name.
    fn name(&self) -> &str;

    /// One-line description.
    fn description(&self) -> &str {
        ""
    }

    /// Produce a transformed copy of `ir`.
    fn transform(&self, ir: &Ir) -> IrResult<Ir>;
}

/// Parametric circuit synthesis.
pub trait IrGenerator: Send + Sync {
    /// Generator name.
    fn name(&self) -> &str;

    /// Names accepted by [`IrGenerator::generate`], in positional order.
    fn parameter_names(&self) -> Vec<String>;

    /// Generate from named parameters.
    fn generate(&self, parameters: &BTreeMap<String, Parameter>) -> IrResult<Function>;

    /// Generate from positional parameters.
    fn generate_positional(&self, parameters: &[Parameter]) -> IrResult<Function> {
        let names = self.parameter_names();
        if names.len() != parameters.len() {
            return Err(IrError::Arity {
                name: self.name().to_string(),
                what: "parameters",
                expected: names.len(),
                got: parameters.len(),
            });
        }
        let named = names.into_iter().zip(parameters.iter().cloned()).collect();
        self.generate(&named)
    }
}

/// Static description of a known instruction kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstructionKind {
    /// Canonical name.
    pub name: &'static str,
    /// Number of bits.
    pub n_bits: usize,
    /// Number of parameters.
    pub n_params: usize,
    /// Whether the instruction is analog.
    pub analog: bool,
}

const fn kind(name: &'static str, n_bits: usize, n_params: usize) -> InstructionKind {
    InstructionKind {
        name,
        n_bits,
        n_params,
        analog: false,
    }
}

const GATE_KINDS: &[InstructionKind] = &[
    kind("I", 1, 0),
    kind("H", 1, 0),
    kind("X", 1, 0),
    kind("Y", 1, 0),
    kind("Z", 1, 0),
    kind("S", 1, 0),
    kind("Sdg", 1, 0),
    kind("T", 1, 0),
    kind("Tdg", 1, 0),
    kind("Rx", 1, 1),
    kind("Ry", 1, 1),
    kind("Rz", 1, 1),
    kind("U", 1, 3),
    kind("CNOT", 2, 0),
    kind("CY", 2, 0),
    kind("CZ", 2, 0),
    kind("CH", 2, 0),
    kind("CRZ", 2, 1),
    kind("CPhase", 2, 1),
    kind("Swap", 2, 0),
    kind(MEASURE, 1, 1),
];

const ANNEAL_KINDS: &[InstructionKind] = &[
    InstructionKind {
        name: QMI,
        n_bits: 2,
        n_params: 1,
        analog: true,
    },
    InstructionKind {
        name: ANNEAL,
        n_bits: 0,
        n_params: 4,
        analog: true,
    },
];

fn lookup(table: &'static [InstructionKind], name: &str) -> Option<&'static InstructionKind> {
    table.iter().find(|k| k.name.eq_ignore_ascii_case(name))
}

/// Validate against `table` and build. Unknown names build generic
/// operations; an empty parameter list on a known kind is filled with
/// defaults.
fn build(
    table: &'static [InstructionKind],
    name: &str,
    bits: Vec<usize>,
    parameters: Vec<Parameter>,
) -> IrResult<Instruction> {
    let Some(kind) = lookup(table, name) else {
        return Ok(Instruction::Leaf(Operation::new(name, bits, parameters)));
    };
    if bits.len() != kind.n_bits {
        return Err(IrError::Arity {
            name: kind.name.to_string(),
            what: "bits",
            expected: kind.n_bits,
            got: bits.len(),
        });
    }
    let parameters = if parameters.is_empty() && kind.n_params > 0 {
        default_parameters(kind)
    } else if parameters.len() != kind.n_params {
        return Err(IrError::Arity {
            name: kind.name.to_string(),
            what: "parameters",
            expected: kind.n_params,
            got: parameters.len(),
        });
    } else {
        parameters
    };
    Ok(Instruction::Leaf(
        Operation::new(kind.name, bits, parameters).with_analog(kind.analog),
    ))
}

fn default_parameters(kind: &InstructionKind) -> Vec<Parameter> {
    match kind.name {
        MEASURE => vec![Parameter::Int(0)],
        ANNEAL => vec![
            Parameter::Double(0.0),
            Parameter::Double(0.0),
            Parameter::Double(0.0),
            Parameter::from("forward"),
        ],
        _ => vec![Parameter::Double(0.0); kind.n_params],
    }
}

/// The gate-model instruction family.
#[derive(Debug, Clone, Copy, Default)]
pub struct GateIrProvider;

impl GateIrProvider {
    /// Static description of a gate, matched case-insensitively.
    pub fn kind(name: &str) -> Option<&'static InstructionKind> {
        lookup(GATE_KINDS, name)
    }
}

impl IrProvider for GateIrProvider {
    fn name(&self) -> &str {
        "gate"
    }

    fn create_instruction(
        &self,
        name: &str,
        bits: Vec<usize>,
        parameters: Vec<Parameter>,
    ) -> IrResult<Instruction> {
        build(GATE_KINDS, name, bits, parameters)
    }

    fn create_function(&self, name: &str) -> Function {
        Function::new(name)
    }

    fn instructions(&self) -> Vec<String> {
        GATE_KINDS.iter().map(|k| k.name.to_string()).collect()
    }
}

/// The quantum-annealing instruction family.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnnealIrProvider;

impl IrProvider for AnnealIrProvider {
    fn name(&self) -> &str {
        "anneal"
    }

    fn create_instruction(
        &self,
        name: &str,
        bits: Vec<usize>,
        parameters: Vec<Parameter>,
    ) -> IrResult<Instruction> {
        build(ANNEAL_KINDS, name, bits, parameters)
    }

    fn create_function(&self, name: &str) -> Function {
        Function::with_kind(name, FunctionKind::Anneal)
    }

    fn instructions(&self) -> Vec<String> {
        ANNEAL_KINDS.iter().map(|k| k.name.to_string()).collect()
    }
}

/// Quantum Fourier transform generator (`"qft"`), or its inverse
/// (`"iqft"`). Takes one parameter, `nqubits`.
#[derive(Debug, Clone, Copy, Default)]
pub struct QftGenerator {
    inverse: bool,
}

impl QftGenerator {
    /// The forward transform.
    pub fn new() -> Self {
        Self { inverse: false }
    }

    /// The inverse transform.
    pub fn inverse() -> Self {
        Self { inverse: true }
    }
}

impl IrGenerator for QftGenerator {
    fn name(&self) -> &str {
        if self.inverse { "iqft" } else { "qft" }
    }

    fn parameter_names(&self) -> Vec<String> {
        vec!["nqubits".into()]
    }

    fn generate(&self, parameters: &BTreeMap<String, Parameter>) -> IrResult<Function> {
        let n = parameters
            .get("nqubits")
            .and_then(Parameter::as_int)
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| IrError::Arity {
                name: self.name().to_string(),
                what: "integer 'nqubits' parameters",
                expected: 1,
                got: 0,
            })?;

        let mut ops = Vec::new();
        for i in 0..n {
            ops.push(Operation::new("H", [i], []));
            for j in (i + 1)..n {
                #[allow(clippy::cast_precision_loss)]
                let angle = PI / (1u64 << (j - i)) as f64;
                ops.push(Operation::new("CPhase", [j, i], [Parameter::Double(angle)]));
            }
        }
        for i in 0..n / 2 {
            ops.push(Operation::new("Swap", [i, n - 1 - i], []));
        }

        if self.inverse {
            ops.reverse();
            for op in &mut ops {
                if let Some(angle) = op.parameter(0).and_then(Parameter::as_f64) {
                    op.set_parameter(0, -angle)?;
                }
            }
        }

        let mut f = Function::new(self.name());
        for op in ops {
            f.add_instruction(op);
        }
        Ok(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_table() {
        let p = GateIrProvider;
        let cx = p.create_instruction("cnot", vec![0, 1], vec![]).unwrap();
        assert_eq!(cx.name(), "CNOT");

        let rz = p
            .create_instruction("rz", vec![0], vec![Parameter::Double(0.5)])
            .unwrap();
        assert_eq!(rz.name(), "Rz");

        let defaulted = p.create_instruction("Rx", vec![0], vec![]).unwrap();
        assert_eq!(
            defaulted.as_operation().map(Operation::parameters),
            Some(&[Parameter::Double(0.0)][..])
        );

        assert!(matches!(
            p.create_instruction("H", vec![0, 1], vec![]),
            Err(IrError::Arity { what: "bits", .. })
        ));
        assert!(matches!(
            p.create_instruction("U", vec![0], vec![Parameter::Double(1.0)]),
            Err(IrError::Arity { what: "parameters", expected: 3, got: 1, .. })
        ));

        let custom = p
            .create_instruction("Foo", vec![0, 1, 2], vec![Parameter::Int(4)])
            .unwrap();
        assert_eq!(custom.name(), "Foo");
        assert_eq!(custom.bits(), vec![0, 1, 2]);
    }

    #[test]
    fn test_anneal_family() {
        let p = AnnealIrProvider;
        let qmi = p
            .create_instruction(QMI, vec![0, 1], vec![Parameter::Double(1.0)])
            .unwrap();
        assert!(qmi.is_analog());
        assert_eq!(p.create_function("f").kind(), FunctionKind::Anneal);
    }

    #[test]
    fn test_qft() {
        let g = QftGenerator::new();
        let f = g.generate_positional(&[Parameter::Int(3)]).unwrap();
        // 3 H, 3 CPhase, 1 Swap
        assert_eq!(f.len(), 7);
        assert_eq!(f.instruction(6).unwrap().name(), "Swap");

        let inv = QftGenerator::inverse()
            .generate_positional(&[Parameter::Int(3)])
            .unwrap();
        assert_eq!(inv.instruction(0).unwrap().name(), "Swap");
        assert_eq!(inv.instruction(6).unwrap().name(), "H");

        assert!(g.generate_positional(&[]).is_err());
        assert!(g.generate(&BTreeMap::new()).is_err());
    }
}
