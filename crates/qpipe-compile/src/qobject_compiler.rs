//! Compiler for the QObject wire schema.

use std::f64::consts::FRAC_PI_2;
use std::sync::atomic::{AtomicU64, Ordering};

use qpipe_ir::{Function, GateIrProvider, Instruction, Ir, IrProvider, Operation, Parameter};
use tracing::{debug, instrument};

use crate::compiler::Compiler;
use crate::error::{CompileError, CompileResult};
use crate::qobject::{
    BackendRef, DEFAULT_SHOTS, Experiment, QObject, QObjectConfig, QObjectDocument,
    QObjectInstruction, QObjectRoot, SCHEMA_VERSION,
};
use crate::visitor::{QObjectExperimentVisitor, walk};

/// Rewrite a Python-flavoured literal into JSON: single quotes become double
/// quotes and bare `True`/`False`/`None` become `true`/`false`/`null`.
/// String contents are left alone.
pub fn normalize_source(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
                // `\'` is not a JSON escape.
                if c == '\'' {
                    out.pop();
                }
                out.push(c);
            } else if c == '\\' {
                escaped = true;
                out.push(c);
            } else if c == open {
                quote = None;
                out.push('"');
            } else if c == '"' {
                out.push_str("\\\"");
            } else {
                out.push(c);
            }
            continue;
        }
        match c {
            '"' | '\'' => {
                quote = Some(c);
                out.push('"');
            }
            c if c.is_ascii_alphabetic() => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        word.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push_str(match word.as_str() {
                    "True" => "true",
                    "False" => "false",
                    "None" => "null",
                    other => other,
                });
            }
            c => out.push(c),
        }
    }
    out
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

fn doubles(values: &[f64]) -> Vec<Parameter> {
    values.iter().copied().map(Parameter::Double).collect()
}

fn expect_params(inst: &QObjectInstruction, expected: usize) -> CompileResult<()> {
    if inst.params.len() == expected {
        Ok(())
    } else {
        Err(CompileError::Parse(format!(
            "'{}' expects {expected} params, got {}",
            inst.name,
            inst.params.len()
        )))
    }
}

/// Canonical instructions for one wire operation.
fn canonicalize(inst: &QObjectInstruction) -> CompileResult<Vec<Instruction>> {
    let provider = GateIrProvider;
    let name = inst.name.to_ascii_lowercase();
    let qubits = inst.qubits.clone();

    let single = match name.as_str() {
        "measure" => {
            if inst.memory.len() != inst.qubits.len() {
                return Err(CompileError::Parse(format!(
                    "measure over {} qubits names {} memory slots",
                    inst.qubits.len(),
                    inst.memory.len()
                )));
            }
            return Ok(inst
                .qubits
                .iter()
                .zip(&inst.memory)
                .map(|(&q, &slot)| Instruction::Leaf(Operation::measure(q, slot)))
                .collect());
        }
        "u1" => {
            expect_params(inst, 1)?;
            provider.create_instruction("U", qubits, doubles(&[0.0, 0.0, inst.params[0]]))?
        }
        "u2" => {
            expect_params(inst, 2)?;
            provider.create_instruction(
                "U",
                qubits,
                doubles(&[FRAC_PI_2, inst.params[0], inst.params[1]]),
            )?
        }
        "u3" | "u" => provider.create_instruction("U", qubits, doubles(&inst.params))?,
        "cx" => provider.create_instruction("CNOT", qubits, doubles(&inst.params))?,
        "cu1" => provider.create_instruction("CPhase", qubits, doubles(&inst.params))?,
        "id" => provider.create_instruction("I", qubits, doubles(&inst.params))?,
        other => match GateIrProvider::kind(other) {
            Some(kind) => provider.create_instruction(kind.name, qubits, doubles(&inst.params))?,
            None => Instruction::Leaf(Operation::new(
                capitalize(other),
                qubits,
                doubles(&inst.params),
            )),
        },
    };
    Ok(vec![single])
}

/// Compiles QObject JSON into kernels and translates kernels back.
///
/// Fixed-angle families expand into the canonical three-angle `U`:
/// `u1(λ)` becomes `U(0, 0, λ)` and `u2(φ, λ)` becomes `U(π/2, φ, λ)`.
/// Translation always emits `u3`, so this expansion does not round-trip.
#[derive(Debug)]
pub struct QObjectCompiler {
    backend: String,
    shots: AtomicU64,
}

impl Default for QObjectCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl QObjectCompiler {
    /// Compiler targeting the `local` backend with 1024 shots.
    pub fn new() -> Self {
        Self {
            backend: "local".to_string(),
            shots: AtomicU64::new(DEFAULT_SHOTS),
        }
    }

    /// Set the backend named in translated envelopes.
    #[must_use]
    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = backend.into();
        self
    }

    /// Set the shot count used by [`Compiler::translate`].
    #[must_use]
    pub fn with_shots(self, shots: u64) -> Self {
        self.shots.store(shots, Ordering::Relaxed);
        self
    }

    /// Shot count used by [`Compiler::translate`].
    pub fn shots(&self) -> u64 {
        self.shots.load(Ordering::Relaxed)
    }

    /// Parse QObject text, enveloped or bare, after normalization.
    pub fn parse(source: &str) -> CompileResult<QObject> {
        let normalized = normalize_source(source);
        let document: QObjectDocument = serde_json::from_str(&normalized)
            .map_err(|e| CompileError::Parse(format!("QObject: {e}")))?;
        Ok(document.into_qobject())
    }

    /// One experiment per function, sharing `shots` and `n_qubits`.
    ///
    /// `memory_slots` is the largest requirement of any experiment;
    /// `n_qubits` is raised if a kernel needs more.
    pub fn to_qobject(
        &self,
        functions: &[Function],
        shots: u64,
        n_qubits: usize,
    ) -> CompileResult<QObject> {
        let mut experiments = Vec::with_capacity(functions.len());
        let mut memory_slots = 0;
        let mut width = n_qubits;
        for function in functions {
            let experiment = experiment_for(function)?;
            memory_slots = memory_slots.max(experiment.header.memory_slots);
            width = width.max(experiment.header.n_qubits);
            experiments.push(experiment);
        }

        Ok(QObject {
            qobj_id: uuid::Uuid::new_v4().to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            kind: "QASM".to_string(),
            header: serde_json::Map::new(),
            config: QObjectConfig {
                shots,
                memory_slots,
                n_qubits: width,
                ..QObjectConfig::default()
            },
            experiments,
        })
    }

    /// Wrap `qobject` in an envelope naming this compiler's backend.
    pub fn envelope(&self, qobject: QObject) -> QObjectRoot {
        QObjectRoot {
            qobject,
            backend: BackendRef {
                name: self.backend.clone(),
            },
        }
    }
}

/// Translate one function into an experiment.
pub fn experiment_for(function: &Function) -> CompileResult<Experiment> {
    let mut visitor = QObjectExperimentVisitor::new();
    walk(function, &mut visitor)?;
    Ok(visitor.into_experiment(function.name()))
}

impl Compiler for QObjectCompiler {
    fn name(&self) -> &str {
        "qobject"
    }

    fn description(&self) -> &str {
        "QObject JSON wire schema"
    }

    #[instrument(skip_all, fields(compiler = "qobject", bytes = source.len()))]
    fn compile(&self, source: &str) -> CompileResult<Ir> {
        let qobject = Self::parse(source)?;
        let mut ir = GateIrProvider.create_ir();
        for experiment in &qobject.experiments {
            let mut function = GateIrProvider.create_function(&experiment.header.name);
            for inst in &experiment.instructions {
                for canonical in canonicalize(inst)? {
                    function.add_instruction(canonical);
                }
            }
            debug!(
                kernel = function.name(),
                instructions = function.len(),
                "Compiled experiment"
            );
            ir.add_kernel(function);
        }
        Ok(ir)
    }

    fn translate(&self, buffer_name: &str, function: &Function) -> CompileResult<String> {
        let mut qobject =
            self.to_qobject(std::slice::from_ref(function), self.shots(), function.n_physical_bits())?;
        qobject.qobj_id = buffer_name.to_string();
        Ok(serde_json::to_string(&self.envelope(qobject))?)
    }
}
