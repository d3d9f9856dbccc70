//! Instruction visitors used by translation.

use qpipe_ir::{Function, Instruction, Operation, Parameter};

use crate::error::{CompileError, CompileResult};
use crate::qobject::{Experiment, ExperimentHeader, QObjectInstruction};

/// Callback interface for a pre-order walk over a kernel.
pub trait InstructionVisitor {
    /// Called for every enabled leaf operation.
    fn visit_operation(&mut self, operation: &Operation) -> CompileResult<()>;

    /// Called when entering an enabled nested function, before its
    /// instructions are visited.
    fn visit_function(&mut self, function: &Function) -> CompileResult<()> {
        let _ = function;
        Ok(())
    }
}

/// Walk the enabled instructions of `function` in pre-order.
pub fn walk(function: &Function, visitor: &mut dyn InstructionVisitor) -> CompileResult<()> {
    let view = function.enabled_view();
    for instruction in view.iter() {
        match instruction {
            Instruction::Leaf(op) => visitor.visit_operation(op)?,
            Instruction::Composite(f) => visitor.visit_function(f)?,
        }
    }
    Ok(())
}

/// Wire name of a canonical instruction.
pub fn qobject_name(canonical: &str) -> String {
    match canonical {
        "CNOT" => "cx".to_string(),
        "U" => "u3".to_string(),
        "CPhase" => "cu1".to_string(),
        "I" => "id".to_string(),
        other => other.to_ascii_lowercase(),
    }
}

fn numeric(operation: &Operation, parameter: &Parameter) -> CompileResult<f64> {
    match parameter {
        Parameter::Int(_) | Parameter::Double(_) => parameter.as_f64().ok_or_else(|| {
            CompileError::Unsupported(format!("parameter {parameter} of {}", operation.name()))
        }),
        Parameter::Str(text) => Err(CompileError::Unsupported(format!(
            "symbolic parameter '{text}' on {}; evaluate the kernel first",
            operation.name()
        ))),
        Parameter::Complex(c) => Err(CompileError::Unsupported(format!(
            "complex parameter {c} on {}",
            operation.name()
        ))),
    }
}

/// Accumulates one QObject experiment.
#[derive(Debug, Default)]
pub struct QObjectExperimentVisitor {
    instructions: Vec<QObjectInstruction>,
    max_slot: Option<usize>,
    max_qubit: Option<usize>,
}

impl QObjectExperimentVisitor {
    /// Empty visitor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Classical slots referenced so far: largest measured slot plus one.
    pub fn memory_slots(&self) -> usize {
        self.max_slot.map_or(0, |s| s + 1)
    }

    /// Qubits referenced so far: largest qubit plus one.
    pub fn n_qubits(&self) -> usize {
        self.max_qubit.map_or(0, |q| q + 1)
    }

    /// Finish into an experiment named `name`.
    pub fn into_experiment(self, name: &str) -> Experiment {
        Experiment {
            header: ExperimentHeader {
                name: name.to_string(),
                memory_slots: self.memory_slots(),
                n_qubits: self.n_qubits(),
            },
            instructions: self.instructions,
        }
    }
}

impl InstructionVisitor for QObjectExperimentVisitor {
    fn visit_operation(&mut self, operation: &Operation) -> CompileResult<()> {
        if let Some(&q) = operation.bits().iter().max() {
            self.max_qubit = self.max_qubit.max(Some(q));
        }

        if operation.is_measure() {
            let slot = operation.classical_slot().ok_or_else(|| {
                CompileError::Unsupported(format!(
                    "measurement without an integer classical slot: {:?}",
                    operation.parameters()
                ))
            })?;
            self.max_slot = self.max_slot.max(Some(slot));
            self.instructions.push(QObjectInstruction {
                name: "measure".into(),
                qubits: operation.bits().to_vec(),
                params: Vec::new(),
                memory: vec![slot],
            });
            return Ok(());
        }

        let params = operation
            .parameters()
            .iter()
            .map(|p| numeric(operation, p))
            .collect::<CompileResult<Vec<f64>>>()?;
        self.instructions.push(QObjectInstruction {
            name: qobject_name(operation.name()),
            qubits: operation.bits().to_vec(),
            params,
            memory: Vec::new(),
        });
        Ok(())
    }
}
