//! Round-trip tests for the QObject compiler.
//!
//! Kernels built from canonical instructions must survive
//! `compile(translate(kernel))` unchanged; fixed-angle families only
//! survive in their expanded form.

use proptest::prelude::*;
use qpipe_compile::{CompileError, Compiler, QObjectCompiler, QObjectRoot};
use qpipe_ir::{Function, GateIrProvider, Instruction, IrProvider, Operation, Parameter};

const MAX_BITS: usize = 5;

/// Angles with short exact binary expansions.
fn arb_angle() -> impl Strategy<Value = f64> {
    (-16i32..16).prop_map(|k| f64::from(k) / 4.0)
}

fn arb_gate() -> impl Strategy<Value = Instruction> {
    let names = vec![
        "I", "H", "X", "Y", "Z", "S", "Sdg", "T", "Tdg", "Rx", "Ry", "Rz", "U", "CNOT", "CY",
        "CZ", "CH", "CRZ", "CPhase", "Swap",
    ];
    (
        prop::sample::select(names),
        prop::sample::subsequence((0..MAX_BITS).collect::<Vec<_>>(), 2),
        prop::collection::vec(arb_angle(), 3),
    )
        .prop_map(|(name, pair, angles)| {
            let kind = GateIrProvider::kind(name).unwrap();
            let bits = pair[..kind.n_bits].to_vec();
            let params = angles[..kind.n_params]
                .iter()
                .copied()
                .map(Parameter::Double)
                .collect();
            GateIrProvider.create_instruction(name, bits, params).unwrap()
        })
}

fn arb_kernel() -> impl Strategy<Value = Function> {
    (
        prop::collection::vec(arb_gate(), 0..12),
        prop::sample::subsequence((0..MAX_BITS).collect::<Vec<_>>(), 0..=MAX_BITS),
    )
        .prop_map(|(gates, measured)| {
            let mut f = Function::new("kernel");
            for gate in gates {
                f.add_instruction(gate);
            }
            for (slot, qubit) in measured.into_iter().enumerate() {
                f.add_instruction(Operation::measure(qubit, slot));
            }
            f
        })
}

proptest! {
    #[test]
    fn canonical_kernels_round_trip(kernel in arb_kernel()) {
        let compiler = QObjectCompiler::new();
        let wire = compiler.translate("buffer", &kernel).unwrap();
        let ir = compiler.compile(&wire).unwrap();

        prop_assert_eq!(ir.len(), 1);
        let back = ir.kernel(0).unwrap();
        prop_assert_eq!(back.name(), kernel.name());
        prop_assert_eq!(back.instructions(), kernel.instructions());
    }

    #[test]
    fn memory_slots_track_largest_slot(slots in prop::collection::vec(0usize..8, 1..6)) {
        let mut kernel = Function::new("m");
        for (qubit, &slot) in slots.iter().enumerate() {
            kernel.add_instruction(Operation::measure(qubit, slot));
        }
        let wire = QObjectCompiler::new().translate("b", &kernel).unwrap();
        let root: QObjectRoot = serde_json::from_str(&wire).unwrap();
        prop_assert_eq!(
            root.qobject.config.memory_slots,
            slots.iter().max().unwrap() + 1
        );
        prop_assert_eq!(root.qobject.experiments[0].header.memory_slots, root.qobject.config.memory_slots);
    }
}

#[test]
fn disabled_instructions_are_not_emitted() {
    let mut kernel = Function::new("k");
    kernel.add_instruction(Instruction::op("H", [0], []));
    let mut hidden = Instruction::op("X", [0], []);
    hidden.disable();
    kernel.add_instruction(hidden);
    kernel.add_instruction(Operation::measure(0, 0));

    let compiler = QObjectCompiler::new();
    let ir = compiler.compile(&compiler.translate("b", &kernel).unwrap()).unwrap();
    let names: Vec<_> = ir
        .kernel(0)
        .unwrap()
        .instructions()
        .iter()
        .map(Instruction::name)
        .collect();
    assert_eq!(names, vec!["H", "Measure"]);
}

#[test]
fn nested_functions_are_flattened() {
    let mut inner = Function::new("prep");
    inner.add_instruction(Instruction::op("H", [0], []));
    inner.add_instruction(Instruction::op("CNOT", [0, 1], []));
    let mut kernel = Function::new("k");
    kernel.add_instruction(Instruction::Composite(inner));
    kernel.add_instruction(Operation::measure(1, 0));

    let compiler = QObjectCompiler::new();
    let ir = compiler.compile(&compiler.translate("b", &kernel).unwrap()).unwrap();
    assert_eq!(ir.kernel(0).unwrap().len(), 3);
}

#[test]
fn fixed_angle_expansion_is_one_way() {
    let source = r#"{'experiments': [{'header': {'name': 'k'},
        'instructions': [{'name': 'u1', 'qubits': [0], 'params': [0.5]}]}]}"#;
    let compiler = QObjectCompiler::new();
    let expanded = compiler.compile(source).unwrap();
    let kernel = expanded.kernel(0).unwrap();

    let wire = compiler.translate("b", kernel).unwrap();
    assert!(wire.contains(r#""name":"u3""#));
    assert!(!wire.contains("u1"));
    let again = compiler.compile(&wire).unwrap();
    assert_eq!(again.kernel(0).unwrap().instructions(), kernel.instructions());
}

#[test]
fn foreign_literals_are_normalized() {
    let source = r#"{'qObject': {'config': {'shots': 10, 'memory': True},
        'header': {'backend_version': None},
        'experiments': [{'header': {'name': 'a'}, 'instructions': []},
                        {'header': {'name': 'b'}, 'instructions': [{'name': 'x', 'qubits': [1]}]}]},
        'backend': {'name': 'ibmq_qasm_simulator'}}"#;
    let ir = QObjectCompiler::new().compile(source).unwrap();
    assert_eq!(ir.len(), 2);
    assert!(ir.kernel(0).unwrap().is_empty());
    assert_eq!(ir.kernel_by_name("b").unwrap().instruction(0).unwrap().name(), "X");
}

#[test]
fn symbolic_kernels_must_be_evaluated_first() {
    let mut kernel = Function::new("ansatz");
    kernel.add_instruction(Instruction::op("Ry", [0], [Parameter::from("theta")]));

    let compiler = QObjectCompiler::new();
    let err = compiler.translate("b", &kernel).unwrap_err();
    assert!(matches!(err, CompileError::Unsupported(_)));

    let bound = kernel.evaluate(&[0.25]).unwrap();
    assert!(compiler.translate("b", &bound).is_ok());
}
