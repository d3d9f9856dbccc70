//! Graph views of functions.
//!
//! Gate functions yield a [`DependencyGraph`] (directed, bit-causal);
//! annealing functions yield a [`ConnectivityGraph`] (undirected, weighted).

use std::collections::BTreeMap;
use std::io::{self, Write};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use rustc_hash::FxHashMap;

use crate::error::{IrError, IrResult};
use crate::function::{Function, QMI};
use crate::parameter::Parameter;

/// Attributes attached to a graph vertex.
pub type VertexAttributes = BTreeMap<String, Parameter>;

/// Generic undirected graph capability used by embedding algorithms.
pub trait Graph {
    /// Add a vertex, returning its id.
    fn add_vertex(&mut self, attributes: VertexAttributes) -> usize;

    /// Add (or reweight) an undirected edge.
    fn add_edge(&mut self, a: usize, b: usize, weight: f64) -> IrResult<()>;

    /// Number of vertices.
    fn order(&self) -> usize;

    /// Number of edges.
    fn size(&self) -> usize;

    /// Vertices adjacent to `v`, ascending.
    fn neighbors(&self, v: usize) -> Vec<usize>;

    /// True if `a` and `b` are adjacent.
    fn has_edge(&self, a: usize, b: usize) -> bool;

    /// Write a textual form of the graph.
    fn write(&self, out: &mut dyn Write) -> io::Result<()>;
}

/// One enabled leaf instruction in program order.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyNode {
    /// Position among the enabled leaves.
    pub position: usize,
    /// Instruction name.
    pub name: String,
    /// Bits the instruction acts on.
    pub bits: Vec<usize>,
    /// Assembly-like label.
    pub label: String,
}

/// Directed dependency graph over the enabled leaves of a gate function.
///
/// Each instruction gets one edge from the most recent earlier instruction
/// on each of its bits. Instructions on disjoint bits are never connected,
/// so they land in the same layer.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<DependencyNode, Vec<usize>>,
}

impl DependencyGraph {
    /// Build the graph for `function`.
    pub fn from_function(function: &Function) -> Self {
        let mut graph: DiGraph<DependencyNode, Vec<usize>> = DiGraph::new();
        let mut last_on_bit: FxHashMap<usize, NodeIndex> = FxHashMap::default();

        for (position, op) in function.enabled_operations().into_iter().enumerate() {
            let node = graph.add_node(DependencyNode {
                position,
                name: op.name().to_string(),
                bits: op.bits().to_vec(),
                label: op.to_string(),
            });
            for &bit in op.bits() {
                if let Some(&prev) = last_on_bit.get(&bit) {
                    if prev != node {
                        match graph.find_edge(prev, node) {
                            Some(edge) => graph[edge].push(bit),
                            None => {
                                graph.add_edge(prev, node, vec![bit]);
                            }
                        }
                    }
                }
                last_on_bit.insert(bit, node);
            }
        }

        Self { graph }
    }

    /// Number of instructions on the longest path; zero when empty.
    pub fn depth(&self) -> usize {
        // Nodes are added in program order and edges always point forward,
        // so index order is a topological order.
        let mut longest = vec![0usize; self.graph.node_count()];
        for node in self.graph.node_indices() {
            let best = self
                .graph
                .neighbors_directed(node, Direction::Incoming)
                .map(|pred| longest[pred.index()])
                .max()
                .unwrap_or(0);
            longest[node.index()] = best + 1;
        }
        longest.into_iter().max().unwrap_or(0)
    }

    /// Number of vertices.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// True if instruction `from` directly precedes instruction `to`.
    pub fn has_edge(&self, from: usize, to: usize) -> bool {
        self.graph
            .find_edge(NodeIndex::new(from), NodeIndex::new(to))
            .is_some()
    }

    /// Vertex data by position.
    pub fn node(&self, position: usize) -> Option<&DependencyNode> {
        self.graph.node_weight(NodeIndex::new(position))
    }

    /// Write the graph in DOT syntax.
    pub fn write(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "digraph G {{")?;
        for node in self.graph.node_indices() {
            let data = &self.graph[node];
            writeln!(out, "  {} [label=\"{}\"];", data.position, data.label)?;
        }
        for edge in self.graph.edge_references() {
            let bits: Vec<String> = edge.weight().iter().map(ToString::to_string).collect();
            writeln!(
                out,
                "  {} -> {} [bits=\"{}\"];",
                edge.source().index(),
                edge.target().index(),
                bits.join(",")
            )?;
        }
        writeln!(out, "}}")
    }
}

/// Undirected weighted graph of an annealing problem or a hardware
/// topology.
#[derive(Debug, Clone, Default)]
pub struct ConnectivityGraph {
    graph: UnGraph<VertexAttributes, f64>,
}

impl ConnectivityGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a graph with `n` attribute-less vertices.
    pub fn with_vertices(n: usize) -> Self {
        let mut g = Self::new();
        for _ in 0..n {
            g.add_vertex(VertexAttributes::new());
        }
        g
    }

    /// Build a graph with one vertex per qubit (bias in the `bias`
    /// attribute) and one edge per coupler.
    pub fn from_anneal(function: &Function) -> IrResult<Self> {
        let mut g = Self::with_vertices(function.n_physical_bits());
        for (qubit, weight) in function.biases() {
            let value = numeric_weight(function, weight)?;
            if let Some(attrs) = g.graph.node_weight_mut(NodeIndex::new(qubit)) {
                attrs.insert("bias".into(), Parameter::Double(value));
            }
        }
        for (a, b, weight) in function.couplers() {
            g.add_edge(a, b, numeric_weight(function, weight)?)?;
        }
        Ok(g)
    }

    /// Vertex attributes.
    pub fn attributes(&self, v: usize) -> Option<&VertexAttributes> {
        self.graph.node_weight(NodeIndex::new(v))
    }

    /// Weight of the edge between `a` and `b`.
    pub fn weight(&self, a: usize, b: usize) -> Option<f64> {
        self.graph
            .find_edge(NodeIndex::new(a), NodeIndex::new(b))
            .map(|e| self.graph[e])
    }

    /// All edges as `(a, b, weight)` with `a < b`.
    pub fn edges(&self) -> Vec<(usize, usize, f64)> {
        self.graph
            .edge_references()
            .map(|e| {
                let (a, b) = (e.source().index(), e.target().index());
                (a.min(b), a.max(b), *e.weight())
            })
            .collect()
    }

    fn check_vertex(&self, v: usize) -> IrResult<()> {
        if v < self.graph.node_count() {
            Ok(())
        } else {
            Err(IrError::IndexOutOfRange {
                index: v,
                len: self.graph.node_count(),
                context: "connectivity graph".into(),
            })
        }
    }
}

fn numeric_weight(function: &Function, weight: &Parameter) -> IrResult<f64> {
    weight.as_f64().ok_or_else(|| IrError::UnsupportedOperation {
        operation: "to_graph",
        variant: format!(
            "'{}' with non-numeric {QMI} weight '{weight}'",
            function.name()
        ),
    })
}

impl Graph for ConnectivityGraph {
    fn add_vertex(&mut self, attributes: VertexAttributes) -> usize {
        self.graph.add_node(attributes).index()
    }

    fn add_edge(&mut self, a: usize, b: usize, weight: f64) -> IrResult<()> {
        self.check_vertex(a)?;
        self.check_vertex(b)?;
        self.graph
            .update_edge(NodeIndex::new(a), NodeIndex::new(b), weight);
        Ok(())
    }

    fn order(&self) -> usize {
        self.graph.node_count()
    }

    fn size(&self) -> usize {
        self.graph.edge_count()
    }

    fn neighbors(&self, v: usize) -> Vec<usize> {
        let mut out: Vec<usize> = self
            .graph
            .neighbors(NodeIndex::new(v))
            .map(NodeIndex::index)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    fn has_edge(&self, a: usize, b: usize) -> bool {
        self.weight(a, b).is_some()
    }

    fn write(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "graph G {{")?;
        for node in self.graph.node_indices() {
            let attrs: Vec<String> = self.graph[node]
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            if attrs.is_empty() {
                writeln!(out, "  {};", node.index())?;
            } else {
                writeln!(out, "  {} [{}];", node.index(), attrs.join(", "))?;
            }
        }
        for (a, b, w) in self.edges() {
            writeln!(out, "  {a} -- {b} [weight={w}];")?;
        }
        writeln!(out, "}}")
    }
}

/// The graph derived from a function.
#[derive(Debug, Clone)]
pub enum IrGraph {
    /// Directed dependency graph of a gate function.
    Dependency(DependencyGraph),
    /// Undirected connectivity graph of an annealing function.
    Connectivity(ConnectivityGraph),
}

impl IrGraph {
    /// Longest dependency path; undefined for connectivity graphs.
    pub fn depth(&self) -> IrResult<usize> {
        match self {
            IrGraph::Dependency(g) => Ok(g.depth()),
            IrGraph::Connectivity(_) => Err(IrError::UnsupportedOperation {
                operation: "depth",
                variant: "an undirected graph".into(),
            }),
        }
    }

    /// Number of vertices.
    pub fn order(&self) -> usize {
        match self {
            IrGraph::Dependency(g) => g.node_count(),
            IrGraph::Connectivity(g) => g.order(),
        }
    }

    /// Number of edges.
    pub fn size(&self) -> usize {
        match self {
            IrGraph::Dependency(g) => g.edge_count(),
            IrGraph::Connectivity(g) => g.size(),
        }
    }

    /// Write the textual form.
    pub fn write(&self, out: &mut dyn Write) -> io::Result<()> {
        match self {
            IrGraph::Dependency(g) => g.write(out),
            IrGraph::Connectivity(g) => g.write(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{Instruction, Operation};

    #[test]
    fn test_dependency_edges() {
        let mut f = Function::new("f");
        f.add_instruction(Instruction::op("H", [0], []));
        f.add_instruction(Instruction::op("H", [1], []));
        f.add_instruction(Instruction::op("CNOT", [0, 1], []));
        f.add_instruction(Instruction::op("CNOT", [0, 1], []));

        let g = DependencyGraph::from_function(&f);
        assert_eq!(g.node_count(), 4);
        assert!(g.has_edge(0, 2));
        assert!(g.has_edge(1, 2));
        assert!(!g.has_edge(0, 1));
        // Two shared bits, one edge.
        assert!(g.has_edge(2, 3));
        assert_eq!(g.edge_count(), 3);
        assert_eq!(g.depth(), 3);

        let mut dot = Vec::new();
        g.write(&mut dot).unwrap();
        let dot = String::from_utf8(dot).unwrap();
        assert!(dot.contains("2 -> 3 [bits=\"0,1\"];"));
    }

    #[test]
    fn test_disabled_instructions_are_skipped() {
        let mut f = Function::new("f");
        f.add_instruction(Instruction::op("H", [0], []));
        let mut x = Instruction::op("X", [0], []);
        x.disable();
        f.add_instruction(x);
        f.add_instruction(Instruction::op("Z", [0], []));
        let g = DependencyGraph::from_function(&f);
        assert_eq!(g.node_count(), 2);
        assert_eq!(g.node(1).map(|n| n.name.as_str()), Some("Z"));
        assert_eq!(g.depth(), 2);
    }

    #[test]
    fn test_connectivity_from_anneal() {
        let mut f = Function::anneal("ising");
        f.add_instruction(Operation::new(QMI, [0, 0], [Parameter::Double(0.5)]));
        f.add_instruction(Operation::new(QMI, [0, 2], [Parameter::Double(-1.0)]));
        f.add_instruction(Operation::new(QMI, [1, 2], [Parameter::Double(0.25)]));

        let g = ConnectivityGraph::from_anneal(&f).unwrap();
        assert_eq!(g.order(), 3);
        assert_eq!(g.size(), 2);
        assert_eq!(g.neighbors(2), vec![0, 1]);
        assert_eq!(g.weight(2, 0), Some(-1.0));
        assert_eq!(
            g.attributes(0).and_then(|a| a.get("bias")),
            Some(&Parameter::Double(0.5))
        );
    }

    #[test]
    fn test_symbolic_weight_rejected() {
        let mut f = Function::anneal("ising");
        f.add_instruction(Operation::new(QMI, [0, 1], [Parameter::from("j")]));
        assert!(ConnectivityGraph::from_anneal(&f).is_err());
    }

    #[test]
    fn test_graph_capability() {
        let mut g = ConnectivityGraph::new();
        let a = g.add_vertex(VertexAttributes::new());
        let b = g.add_vertex(VertexAttributes::new());
        g.add_edge(a, b, 1.0).unwrap();
        g.add_edge(b, a, 2.0).unwrap();
        assert_eq!(g.size(), 1);
        assert_eq!(g.weight(a, b), Some(2.0));
        assert!(g.add_edge(a, 9, 1.0).is_err());

        let mut out = Vec::new();
        g.write(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("0 -- 1 [weight=2]"));
    }
}
