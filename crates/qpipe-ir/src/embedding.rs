//! Minor-embedding capability.

use std::collections::BTreeMap;

use crate::error::{IrError, IrResult};
use crate::graph::{ConnectivityGraph, Graph};

/// Problem vertex to the chain of hardware vertices representing it.
pub type Embedding = BTreeMap<usize, Vec<usize>>;

/// Places a problem graph onto a hardware graph.
pub trait EmbeddingAlgorithm: Send + Sync {
    /// Algorithm name.
    fn name(&self) -> &str;

    /// Compute an embedding of `problem` into `hardware`.
    fn embed(
        &self,
        problem: &ConnectivityGraph,
        hardware: &ConnectivityGraph,
        parameters: &BTreeMap<String, String>,
    ) -> IrResult<Embedding>;
}

/// Identity placement: problem vertex `v` goes to hardware vertex
/// `v + offset`. Fails unless every problem edge exists on the hardware.
///
/// Accepts one parameter, `offset` (default 0).
#[derive(Debug, Clone, Copy, Default)]
pub struct TrivialEmbedding;

impl EmbeddingAlgorithm for TrivialEmbedding {
    fn name(&self) -> &str {
        "trivial"
    }

    fn embed(
        &self,
        problem: &ConnectivityGraph,
        hardware: &ConnectivityGraph,
        parameters: &BTreeMap<String, String>,
    ) -> IrResult<Embedding> {
        let offset = match parameters.get("offset") {
            Some(raw) => raw.trim().parse::<usize>().map_err(|e| IrError::Expression {
                expression: raw.clone(),
                message: e.to_string(),
            })?,
            None => 0,
        };

        let unplaceable = |detail: String| IrError::UnsupportedOperation {
            operation: "embed",
            variant: detail,
        };

        if problem.order() + offset > hardware.order() {
            return Err(unplaceable(format!(
                "{} problem vertices at offset {offset} on {} hardware vertices",
                problem.order(),
                hardware.order()
            )));
        }
        for (a, b, _) in problem.edges() {
            if !hardware.has_edge(a + offset, b + offset) {
                return Err(unplaceable(format!(
                    "problem edge ({a}, {b}) has no hardware coupler"
                )));
            }
        }

        Ok((0..problem.order()).map(|v| (v, vec![v + offset])).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> ConnectivityGraph {
        let mut g = ConnectivityGraph::with_vertices(n);
        for i in 1..n {
            g.add_edge(i - 1, i, 1.0).unwrap();
        }
        g
    }

    #[test]
    fn test_identity_embedding() {
        let emb = TrivialEmbedding
            .embed(&line(3), &line(5), &BTreeMap::new())
            .unwrap();
        assert_eq!(emb.len(), 3);
        assert_eq!(emb[&2], vec![2]);

        let params = BTreeMap::from([("offset".to_string(), "2".to_string())]);
        let shifted = TrivialEmbedding.embed(&line(3), &line(5), &params).unwrap();
        assert_eq!(shifted[&0], vec![2]);
    }

    #[test]
    fn test_missing_coupler() {
        let mut triangle = line(3);
        triangle.add_edge(0, 2, 1.0).unwrap();
        assert!(
            TrivialEmbedding
                .embed(&triangle, &line(3), &BTreeMap::new())
                .is_err()
        );
        assert!(
            TrivialEmbedding
                .embed(&line(4), &line(3), &BTreeMap::new())
                .is_err()
        );
    }
}
