//! Functions: ordered, mutable instruction trees.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{IrError, IrResult};
use crate::expression::{self, SymbolTable};
use crate::graph::{ConnectivityGraph, DependencyGraph, IrGraph};
use crate::instruction::{Instruction, Operation};
use crate::iterator::InstructionIterator;
use crate::parameter::Parameter;

/// Name of the annealing coupler/bias instruction: bits `[i, j]` and a
/// weight; `i == j` denotes the bias of qubit `i`.
pub const QMI: &str = "dw-qmi";

/// Name of the annealing schedule instruction.
pub const ANNEAL: &str = "anneal";

/// Instruction family of a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionKind {
    /// Directed, bit-causal gate sequence.
    #[default]
    Gate,
    /// Undirected annealing problem; order carries no meaning.
    Anneal,
}

impl fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionKind::Gate => write!(f, "gate function"),
            FunctionKind::Anneal => write!(f, "annealing function"),
        }
    }
}

/// An ordered collection of instructions plus declared variables.
///
/// Position `i` always means the `i`-th instruction in the current order;
/// inserting or removing shifts everything after it.
///
/// # Example
///
/// ```rust
/// use qpipe_ir::{Function, Instruction, Parameter};
///
/// let mut f = Function::new("ansatz");
/// f.add_instruction(Instruction::op("X", [0], []));
/// f.add_instruction(Instruction::op("Ry", [1], [Parameter::from("theta")]));
/// f.add_instruction(Instruction::op("CNOT", [1, 0], []));
/// assert_eq!(f.parameters(), &["theta".to_string()]);
///
/// let bound = f.evaluate(&[0.59]).unwrap();
/// assert!(bound.parameters().is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tag: Option<String>,
    #[serde(default)]
    kind: FunctionKind,
    instructions: Vec<Instruction>,
    #[serde(default)]
    parameters: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    bit_map: Vec<usize>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    options: BTreeMap<String, Parameter>,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Function {
    /// Create an empty gate function.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_kind(name, FunctionKind::Gate)
    }

    /// Create an empty annealing function.
    pub fn anneal(name: impl Into<String>) -> Self {
        Self::with_kind(name, FunctionKind::Anneal)
    }

    /// Create an empty function of the given kind.
    pub fn with_kind(name: impl Into<String>, kind: FunctionKind) -> Self {
        Self {
            name: name.into(),
            tag: None,
            kind,
            instructions: Vec::new(),
            parameters: Vec::new(),
            bit_map: Vec::new(),
            options: BTreeMap::new(),
            enabled: true,
        }
    }

    /// Function name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Optional tag.
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Set the tag.
    pub fn set_tag(&mut self, tag: impl Into<String>) {
        self.tag = Some(tag.into());
    }

    /// Instruction family.
    pub fn kind(&self) -> FunctionKind {
        self.kind
    }

    /// Top-level instructions in order.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Number of top-level instructions.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// True if there are no top-level instructions.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Declared variables, deduplicated, in insertion order.
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    /// Number of declared variables.
    pub fn n_parameters(&self) -> usize {
        self.parameters.len()
    }

    /// Declare a variable unless it is already declared.
    pub fn add_parameter(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.parameters.contains(&name) {
            self.parameters.push(name);
        }
    }

    fn register_parameters(&mut self, instruction: &Instruction) {
        match instruction {
            Instruction::Leaf(op) => {
                for p in op.parameters() {
                    for var in p.variables() {
                        self.add_parameter(var);
                    }
                }
            }
            Instruction::Composite(f) => {
                for var in f.parameters() {
                    self.add_parameter(var.clone());
                }
            }
        }
    }

    fn out_of_range(&self, index: usize) -> IrError {
        IrError::IndexOutOfRange {
            index,
            len: self.instructions.len(),
            context: self.name.clone(),
        }
    }

    /// Append an instruction, declaring any new variables it references.
    pub fn add_instruction(&mut self, instruction: impl Into<Instruction>) {
        let instruction = instruction.into();
        self.register_parameters(&instruction);
        self.instructions.push(instruction);
    }

    /// Instruction at position `index`.
    pub fn instruction(&self, index: usize) -> IrResult<&Instruction> {
        self.instructions
            .get(index)
            .ok_or_else(|| self.out_of_range(index))
    }

    /// Insert before position `index`.
    pub fn insert_instruction(
        &mut self,
        index: usize,
        instruction: impl Into<Instruction>,
    ) -> IrResult<()> {
        if index >= self.instructions.len() {
            return Err(self.out_of_range(index));
        }
        let instruction = instruction.into();
        self.register_parameters(&instruction);
        self.instructions.insert(index, instruction);
        Ok(())
    }

    /// Replace the instruction at `index`, returning the previous one.
    pub fn replace_instruction(
        &mut self,
        index: usize,
        instruction: impl Into<Instruction>,
    ) -> IrResult<Instruction> {
        if index >= self.instructions.len() {
            return Err(self.out_of_range(index));
        }
        let instruction = instruction.into();
        self.register_parameters(&instruction);
        Ok(std::mem::replace(&mut self.instructions[index], instruction))
    }

    /// Remove and return the instruction at `index`.
    pub fn remove_instruction(&mut self, index: usize) -> IrResult<Instruction> {
        if index >= self.instructions.len() {
            return Err(self.out_of_range(index));
        }
        Ok(self.instructions.remove(index))
    }

    /// Pre-order traversal over the whole tree.
    pub fn iter(&self) -> InstructionIterator<'_> {
        InstructionIterator::new(self)
    }

    /// Enabled leaf operations in program order, skipping disabled subtrees.
    pub fn enabled_operations(&self) -> Vec<&Operation> {
        let mut out = Vec::new();
        collect_enabled(&self.instructions, &mut out);
        out
    }

    /// Sorted distinct bits referenced anywhere in the tree.
    pub fn bits(&self) -> Vec<usize> {
        let mut bits: Vec<usize> = self
            .iter()
            .filter_map(Instruction::as_operation)
            .flat_map(|op| op.bits().iter().copied())
            .collect();
        bits.sort_unstable();
        bits.dedup();
        bits
    }

    /// Number of distinct bits referenced.
    pub fn n_logical_bits(&self) -> usize {
        self.bits().len()
    }

    /// Register width needed to run this function: the largest referenced
    /// bit plus one.
    pub fn n_physical_bits(&self) -> usize {
        self.bits().last().map_or(0, |b| b + 1)
    }

    /// The last bit map applied, empty if never mapped.
    pub fn bit_map(&self) -> &[usize] {
        &self.bit_map
    }

    /// True once `map_bits` has succeeded.
    pub fn has_been_bit_mapped(&self) -> bool {
        !self.bit_map.is_empty()
    }

    /// Replace every bit `b` in the tree with `map[b]`.
    ///
    /// Either every bit is rewritten or none is.
    pub fn map_bits(&mut self, map: &[usize]) -> IrResult<()> {
        if self.kind == FunctionKind::Anneal {
            return Err(IrError::UnsupportedOperation {
                operation: "map_bits",
                variant: self.kind.to_string(),
            });
        }
        self.instructions
            .iter()
            .try_for_each(|inst| inst.check_bits(map))?;
        self.apply_bits(map);
        debug!(function = %self.name, "applied bit map of length {}", map.len());
        Ok(())
    }

    pub(crate) fn apply_bits(&mut self, map: &[usize]) {
        for inst in &mut self.instructions {
            inst.apply_bits(map);
        }
        self.bit_map = map.to_vec();
    }

    /// True if enabled as a whole.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Re-enable this function and every instruction in it.
    pub fn enable(&mut self) {
        self.enabled = true;
        for inst in &mut self.instructions {
            match inst {
                Instruction::Leaf(_) => inst.enable(),
                Instruction::Composite(f) => f.enable(),
            }
        }
    }

    /// True if any instruction in the tree is analog.
    pub fn is_analog(&self) -> bool {
        self.iter()
            .filter_map(Instruction::as_operation)
            .any(Operation::is_analog)
    }

    /// A detached copy holding only currently enabled instructions.
    pub fn enabled_view(&self) -> Function {
        let mut view = Function {
            instructions: Vec::new(),
            ..self.clone_header()
        };
        for inst in self.instructions.iter().filter(|i| i.is_enabled()) {
            let kept = match inst {
                Instruction::Leaf(op) => Instruction::Leaf(op.clone()),
                Instruction::Composite(f) => Instruction::Composite(f.enabled_view()),
            };
            view.instructions.push(kept);
        }
        view
    }

    fn clone_header(&self) -> Function {
        Function {
            name: self.name.clone(),
            tag: self.tag.clone(),
            kind: self.kind,
            instructions: Vec::new(),
            parameters: self.parameters.clone(),
            bit_map: self.bit_map.clone(),
            options: self.options.clone(),
            enabled: self.enabled,
        }
    }

    /// Set a per-function option.
    pub fn set_option(&mut self, key: impl Into<String>, value: impl Into<Parameter>) {
        self.options.insert(key.into(), value.into());
    }

    /// Per-function option.
    pub fn option(&self, key: &str) -> Option<&Parameter> {
        self.options.get(key)
    }

    /// All per-function options.
    pub fn options(&self) -> &BTreeMap<String, Parameter> {
        &self.options
    }

    /// Bind the declared variables, in order, to `values`.
    ///
    /// Returns a new function in which every variable-bearing parameter is
    /// replaced by its numeric value. Literal strings and reserved keywords
    /// pass through. Nested functions are evaluated against the same
    /// bindings. `self` is left untouched.
    pub fn evaluate(&self, values: &[f64]) -> IrResult<Function> {
        if values.len() != self.parameters.len() {
            return Err(IrError::Arity {
                name: self.name.clone(),
                what: "parameters",
                expected: self.parameters.len(),
                got: values.len(),
            });
        }
        let table: SymbolTable = self
            .parameters
            .iter()
            .map(String::as_str)
            .zip(values.iter().copied())
            .collect();
        self.evaluate_with(&table)
    }

    fn evaluate_with(&self, table: &SymbolTable) -> IrResult<Function> {
        let mut out = Function {
            parameters: Vec::new(),
            ..self.clone_header()
        };
        for inst in &self.instructions {
            let evaluated = match inst {
                Instruction::Leaf(op) => {
                    let mut op = op.clone();
                    for (i, p) in op.parameters().to_vec().iter().enumerate() {
                        if let Parameter::Str(text) = p {
                            if p.is_variable() {
                                op.set_parameter(i, expression::evaluate(text, table)?)?;
                            }
                        }
                    }
                    Instruction::Leaf(op)
                }
                Instruction::Composite(f) => Instruction::Composite(f.evaluate_with(table)?),
            };
            out.instructions.push(evaluated);
        }
        Ok(out)
    }

    /// Derive the graph view: a dependency graph for gate functions, a
    /// connectivity graph for annealing functions.
    pub fn to_graph(&self) -> IrResult<IrGraph> {
        match self.kind {
            FunctionKind::Gate => Ok(IrGraph::Dependency(DependencyGraph::from_function(self))),
            FunctionKind::Anneal => Ok(IrGraph::Connectivity(ConnectivityGraph::from_anneal(
                self,
            )?)),
        }
    }

    /// Number of instructions on the longest dependency path.
    pub fn depth(&self) -> IrResult<usize> {
        match self.kind {
            FunctionKind::Gate => Ok(DependencyGraph::from_function(self).depth()),
            FunctionKind::Anneal => Err(IrError::UnsupportedOperation {
                operation: "depth",
                variant: "an undirected graph".into(),
            }),
        }
    }

    /// Text form of `to_graph()`.
    pub fn persist_graph(&self) -> IrResult<String> {
        let mut out = Vec::new();
        self.to_graph()?.write(&mut out)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Qubit biases of an annealing function, as `(qubit, weight)`.
    pub fn biases(&self) -> Vec<(usize, &Parameter)> {
        self.qmi_terms()
            .filter(|(bits, _)| bits[0] == bits[1])
            .map(|(bits, w)| (bits[0], w))
            .collect()
    }

    /// Couplers of an annealing function, as `(a, b, weight)`.
    pub fn couplers(&self) -> Vec<(usize, usize, &Parameter)> {
        self.qmi_terms()
            .filter(|(bits, _)| bits[0] != bits[1])
            .map(|(bits, w)| (bits[0], bits[1], w))
            .collect()
    }

    fn qmi_terms(&self) -> impl Iterator<Item = (&[usize], &Parameter)> {
        self.enabled_operations().into_iter().filter_map(|op| {
            if op.name() != QMI || op.bits().len() != 2 {
                return None;
            }
            op.parameter(0).map(|w| (op.bits(), w))
        })
    }

    /// Write the function as JSON.
    pub fn persist<W: Write>(&self, writer: W) -> IrResult<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Read a function written by [`Function::persist`].
    pub fn load<R: Read>(reader: R) -> IrResult<Function> {
        Ok(serde_json::from_reader(reader)?)
    }
}

fn collect_enabled<'a>(instructions: &'a [Instruction], out: &mut Vec<&'a Operation>) {
    for inst in instructions.iter().filter(|i| i.is_enabled()) {
        match inst {
            Instruction::Leaf(op) => out.push(op),
            Instruction::Composite(f) => collect_enabled(f.instructions(), out),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for inst in &self.instructions {
            match inst {
                Instruction::Leaf(op) => writeln!(f, "{op}")?,
                Instruction::Composite(func) => write!(f, "{func}")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bell() -> Function {
        let mut f = Function::new("bell");
        f.add_instruction(Instruction::op("H", [0], []));
        f.add_instruction(Instruction::op("CNOT", [0, 1], []));
        f.add_instruction(Operation::measure(0, 0));
        f.add_instruction(Operation::measure(1, 1));
        f
    }

    #[test]
    fn test_positional_access() {
        let mut f = bell();
        f.insert_instruction(1, Instruction::op("X", [1], [])).unwrap();
        assert_eq!(f.instruction(1).unwrap().name(), "X");
        assert_eq!(f.instruction(2).unwrap().name(), "CNOT");

        let old = f.replace_instruction(1, Instruction::op("Z", [1], [])).unwrap();
        assert_eq!(old.name(), "X");
        assert_eq!(f.instruction(1).unwrap().name(), "Z");

        let removed = f.remove_instruction(0).unwrap();
        assert_eq!(removed.name(), "H");
        assert_eq!(f.instruction(0).unwrap().name(), "Z");
        assert_eq!(f.len(), 4);
    }

    #[test]
    fn test_index_errors() {
        let mut f = bell();
        let len = f.len();
        assert!(matches!(
            f.remove_instruction(len),
            Err(IrError::IndexOutOfRange { index, .. }) if index == len
        ));
        assert!(f.insert_instruction(len, Instruction::op("H", [0], [])).is_err());
        assert!(f.replace_instruction(10, Instruction::op("H", [0], [])).is_err());
        assert!(f.instruction(10).is_err());
    }

    #[test]
    fn test_parameter_registration_dedups() {
        let mut f = Function::new("vqe");
        f.add_instruction(Instruction::op("Rx", [0], [Parameter::from("t0")]));
        f.add_instruction(Instruction::op("Ry", [1], [Parameter::from("t1")]));
        f.add_instruction(Instruction::op("Rz", [0], [Parameter::from("2*t0 + t1")]));
        f.add_instruction(Instruction::op("Rz", [0], [Parameter::Double(0.3)]));
        assert_eq!(f.parameters(), &["t0".to_string(), "t1".to_string()]);

        let mut outer = Function::new("outer");
        outer.add_instruction(Instruction::op("Rx", [2], [Parameter::from("t2")]));
        outer.add_instruction(f);
        assert_eq!(
            outer.parameters(),
            &["t2".to_string(), "t0".to_string(), "t1".to_string()]
        );
    }

    #[test]
    fn test_evaluate_binds_nested() {
        let mut inner = Function::new("inner");
        inner.add_instruction(Instruction::op("Ry", [1], [Parameter::from("b")]));
        let mut f = Function::new("f");
        f.add_instruction(Instruction::op("Rx", [0], [Parameter::from("a*2")]));
        f.add_instruction(inner);
        assert_eq!(f.parameters(), &["a".to_string(), "b".to_string()]);

        let bound = f.evaluate(&[0.5, 0.25]).unwrap();
        let ops = bound.enabled_operations();
        assert_eq!(ops[0].parameters(), &[Parameter::Double(1.0)]);
        assert_eq!(ops[1].parameters(), &[Parameter::Double(0.25)]);
        assert!(bound.parameters().is_empty());
        assert_eq!(f.enabled_operations()[0].parameters(), &[Parameter::from("a*2")]);
    }

    #[test]
    fn test_evaluate_arity() {
        let mut f = Function::new("f");
        f.add_instruction(Instruction::op("Rx", [0], [Parameter::from("a")]));
        let err = f.evaluate(&[]).unwrap_err();
        assert!(matches!(err, IrError::Arity { expected: 1, got: 0, .. }));
        assert!(f.evaluate(&[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_evaluate_keeps_keywords() {
        let mut f = Function::anneal("schedule");
        f.add_instruction(Operation::new(QMI, [0, 1], [Parameter::from("j")]).with_analog(true));
        f.add_instruction(
            Operation::new(
                ANNEAL,
                [],
                [
                    Parameter::Double(20.0),
                    Parameter::Double(0.0),
                    Parameter::Double(0.0),
                    Parameter::from("reverse"),
                ],
            )
            .with_analog(true),
        );
        assert_eq!(f.parameters(), &["j".to_string()]);
        let bound = f.evaluate(&[-1.0]).unwrap();
        let ops = bound.enabled_operations();
        assert_eq!(ops[0].parameters(), &[Parameter::Double(-1.0)]);
        assert_eq!(ops[1].parameter(3), Some(&Parameter::from("reverse")));
        assert!(bound.is_analog());
    }

    #[test]
    fn test_depth_and_graph() {
        let f = bell();
        assert_eq!(f.depth().unwrap(), 3);
        let graph = f.persist_graph().unwrap();
        assert!(graph.starts_with("digraph"));
        assert_eq!(Function::new("empty").depth().unwrap(), 0);
    }

    #[test]
    fn test_disjoint_bits_share_a_layer() {
        let mut f = Function::new("layer");
        f.add_instruction(Instruction::op("H", [0], []));
        f.add_instruction(Instruction::op("H", [1], []));
        f.add_instruction(Instruction::op("H", [2], []));
        assert_eq!(f.depth().unwrap(), 1);
        f.add_instruction(Instruction::op("CNOT", [0, 2], []));
        assert_eq!(f.depth().unwrap(), 2);
    }

    #[test]
    fn test_anneal_variant_limits() {
        let mut f = Function::anneal("ising");
        f.add_instruction(Operation::new(QMI, [0, 0], [Parameter::Double(1.0)]));
        f.add_instruction(Operation::new(QMI, [0, 1], [Parameter::Double(-0.5)]));
        assert!(matches!(
            f.depth(),
            Err(IrError::UnsupportedOperation { operation: "depth", .. })
        ));
        assert!(matches!(
            f.map_bits(&[1, 0]),
            Err(IrError::UnsupportedOperation { .. })
        ));
        assert_eq!(f.biases().len(), 1);
        assert_eq!(f.couplers()[0].0, 0);
        assert!(f.persist_graph().unwrap().starts_with("graph"));
    }

    #[test]
    fn test_enabled_view_is_detached() {
        let mut f = bell();
        let mut inst = f.remove_instruction(0).unwrap();
        inst.disable();
        f.insert_instruction(0, inst).unwrap();

        let mut view = f.enabled_view();
        assert_eq!(view.len(), 3);
        view.remove_instruction(0).unwrap();
        assert_eq!(f.len(), 4);

        f.enable();
        assert!(f.instructions().iter().all(Instruction::is_enabled));
    }

    #[test]
    fn test_bit_accounting() {
        let mut f = bell();
        assert_eq!(f.bits(), vec![0, 1]);
        assert_eq!(f.n_logical_bits(), 2);
        f.map_bits(&[3, 5]).unwrap();
        assert_eq!(f.bits(), vec![3, 5]);
        assert_eq!(f.n_physical_bits(), 6);
        assert!(f.has_been_bit_mapped());
    }

    #[test]
    fn test_persist_round_trip() {
        let mut f = bell();
        f.set_tag("demo");
        f.set_option("shots", 100);
        let mut buf = Vec::new();
        f.persist(&mut buf).unwrap();
        let back = Function::load(buf.as_slice()).unwrap();
        assert_eq!(f, back);
    }

    #[test]
    fn test_display() {
        let text = bell().to_string();
        assert_eq!(text, "H q0\nCNOT q0,q1\nMeasure(0) q0\nMeasure(1) q1\n");
    }
}
