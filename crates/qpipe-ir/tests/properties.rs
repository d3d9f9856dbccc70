//! Property-based tests for the instruction tree.
//!
//! Random nested functions are checked for bit mapping, evaluation and
//! traversal invariants.

use proptest::prelude::*;
use qpipe_ir::{Function, Instruction, IrError, Operation, Parameter};

const MAX_BITS: usize = 6;

/// Leaf parameter: a literal or an expression over a small variable pool.
fn arb_parameter() -> impl Strategy<Value = Parameter> {
    prop_oneof![
        (-3.0_f64..3.0).prop_map(Parameter::Double),
        prop::sample::select(vec!["a", "b", "c", "2*a - b", "sin(c) + pi", "forward"])
            .prop_map(Parameter::from),
    ]
}

fn arb_leaf() -> impl Strategy<Value = Instruction> {
    (
        prop::sample::select(vec!["H", "Rx", "CNOT", "U"]),
        prop::collection::vec(0..MAX_BITS, 1..=2),
        prop::collection::vec(arb_parameter(), 0..=2),
    )
        .prop_map(|(name, bits, params)| Instruction::Leaf(Operation::new(name, bits, params)))
}

/// Functions nested up to two levels deep.
fn arb_function() -> impl Strategy<Value = Function> {
    let leaf_fn = prop::collection::vec(arb_leaf(), 0..6).prop_map(|insts| build("inner", insts));
    let inner = prop_oneof![arb_leaf(), leaf_fn.prop_map(Instruction::Composite)];
    prop::collection::vec(inner, 0..8).prop_map(|insts| build("kernel", insts))
}

fn build(name: &str, instructions: Vec<Instruction>) -> Function {
    let mut f = Function::new(name);
    for inst in instructions {
        f.add_instruction(inst);
    }
    f
}

fn leaf_bits(f: &Function) -> Vec<Vec<usize>> {
    f.iter()
        .filter_map(Instruction::as_operation)
        .map(|op| op.bits().to_vec())
        .collect()
}

fn count_instructions(f: &Function) -> usize {
    f.instructions()
        .iter()
        .map(|inst| match inst {
            Instruction::Leaf(_) => 1,
            Instruction::Composite(nested) => 1 + count_instructions(nested),
        })
        .sum()
}

proptest! {
    /// Every bit b becomes map[b], through composites.
    #[test]
    fn test_map_bits_rewrites_every_bit(
        f in arb_function(),
        map in prop::collection::vec(0_usize..100, MAX_BITS),
    ) {
        let before = leaf_bits(&f);
        let mut mapped = f.clone();
        mapped.map_bits(&map).unwrap();
        let after = leaf_bits(&mapped);

        prop_assert_eq!(before.len(), after.len());
        for (orig, new) in before.iter().zip(&after) {
            let expected: Vec<usize> = orig.iter().map(|&b| map[b]).collect();
            prop_assert_eq!(&expected, new);
        }
    }

    /// A map that misses a referenced bit fails and leaves the tree alone.
    #[test]
    fn test_short_map_fails(f in arb_function()) {
        let n = f.n_physical_bits();
        prop_assume!(n > 0);
        let mut g = f.clone();
        let short: Vec<usize> = (0..n - 1).collect();
        let is_invalid_map = matches!(g.map_bits(&short), Err(IrError::InvalidBitMap { .. }));
        prop_assert!(is_invalid_map);
        prop_assert_eq!(g, f);
    }

    /// Binding leaves no variables behind and is deterministic.
    #[test]
    fn test_evaluation_binds_everything(
        f in arb_function(),
        values in prop::collection::vec(-2.0_f64..2.0, 3),
    ) {
        let k = f.n_parameters();
        let values = &values[..k];
        let once = f.evaluate(values).unwrap();
        let twice = f.evaluate(values).unwrap();
        prop_assert_eq!(&once, &twice);

        let remaining = once
            .iter()
            .filter_map(Instruction::as_operation)
            .flat_map(|op| op.parameters().iter())
            .filter(|p| p.is_variable())
            .count();
        prop_assert_eq!(remaining, 0);
    }

    /// Wrong value count is an arity error.
    #[test]
    fn test_evaluation_arity(f in arb_function(), extra in 1_usize..3) {
        let values = vec![0.5; f.n_parameters() + extra];
        let is_arity = matches!(f.evaluate(&values), Err(IrError::Arity { .. }));
        prop_assert!(is_arity);
    }

    /// The iterator visits every node once and replays identically.
    #[test]
    fn test_iterator_visits_all(f in arb_function()) {
        let expected = count_instructions(&f);
        let first: Vec<String> = f.iter().map(ToString::to_string).collect();
        let second: Vec<String> = f.iter().map(ToString::to_string).collect();
        prop_assert_eq!(first.len(), expected);
        prop_assert_eq!(first, second);
    }
}
