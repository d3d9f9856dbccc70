//! Integration tests for the decorator middleware chain.
//!
//! A deterministic mock accelerator stands in for a real backend so the
//! effect of each stage can be checked exactly.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use qpipe_hal::{
    Accelerator, AcceleratorBuffer, AcceleratorConfig, DecoratedAccelerator, EXP_VAL_Z,
    ExtraInfo, HalError, HalResult, ImprovedSampling, ReadoutErrorCorrection,
    RichardsonExtrapolation,
};
use qpipe_ir::{Function, Instruction, Operation};

/// Records `shots` copies of bitstring "1" per execution.
struct Deterministic {
    shots: u64,
    calls: AtomicUsize,
}

impl Deterministic {
    fn new(shots: u64) -> Arc<Self> {
        Arc::new(Self {
            shots,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Accelerator for Deterministic {
    fn name(&self) -> &str {
        "deterministic"
    }

    fn default_buffer_size(&self) -> usize {
        1
    }

    async fn execute(&self, buffer: &mut AcceleratorBuffer, _function: &Function) -> HalResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        buffer.append_measurement_count("1", self.shots);
        Ok(())
    }
}

/// Reports an expectation value that decays linearly with the number of
/// CNOTs, and fails once `fail_from` CNOTs are reached.
struct Noisy {
    fail_from: usize,
}

fn count_cnots(function: &Function) -> usize {
    function.iter().filter(|i| i.name() == "CNOT").count()
}

#[async_trait]
impl Accelerator for Noisy {
    fn name(&self) -> &str {
        "noisy"
    }

    fn default_buffer_size(&self) -> usize {
        2
    }

    async fn execute(&self, buffer: &mut AcceleratorBuffer, function: &Function) -> HalResult<()> {
        let cnots = count_cnots(function);
        if cnots >= self.fail_from {
            return Err(HalError::Execution(format!("{cnots} CNOTs is too deep")));
        }
        buffer.append_measurement_count("00", 100);
        buffer.add_extra_info(EXP_VAL_Z, 1.0 - 0.05 * cnots as f64);
        Ok(())
    }
}

/// Symmetric 10% readout error on a prepared |0>.
struct Leaky;

#[async_trait]
impl Accelerator for Leaky {
    fn name(&self) -> &str {
        "leaky"
    }

    fn default_buffer_size(&self) -> usize {
        1
    }

    fn one_bit_error_rates(&self) -> Vec<f64> {
        vec![0.1]
    }

    async fn execute(&self, buffer: &mut AcceleratorBuffer, _function: &Function) -> HalResult<()> {
        buffer.append_measurement_count("0", 90);
        buffer.append_measurement_count("1", 10);
        Ok(())
    }
}

struct Broken;

#[async_trait]
impl Accelerator for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    fn default_buffer_size(&self) -> usize {
        1
    }

    async fn execute(&self, _buffer: &mut AcceleratorBuffer, _function: &Function) -> HalResult<()> {
        Err(HalError::Execution("device offline".into()))
    }
}

fn single_measure() -> Function {
    let mut f = Function::new("measure-one");
    f.add_instruction(Instruction::op("X", [0], []));
    f.add_instruction(Operation::measure(0, 0));
    f
}

fn bell() -> Function {
    let mut f = Function::new("bell");
    f.add_instruction(Instruction::op("H", [0], []));
    f.add_instruction(Instruction::op("CNOT", [0, 1], []));
    f.add_instruction(Operation::measure(0, 0));
    f.add_instruction(Operation::measure(1, 1));
    f
}

#[tokio::test]
async fn test_repeat_five_times_multiplies_counts() {
    let base = Deterministic::new(64);

    let mut bare = base.create_buffer("bare").unwrap();
    base.execute(&mut bare, &single_measure()).await.unwrap();

    let decorated = DecoratedAccelerator::new(base.clone())
        .with_stage(Arc::new(ImprovedSampling::default()));
    decorated
        .initialize(&AcceleratorConfig::new("deterministic").with_extra("sampler-n-execs", 5))
        .unwrap();

    let mut buffer = decorated.create_buffer("q").unwrap();
    decorated.execute(&mut buffer, &single_measure()).await.unwrap();

    let summed: u64 = buffer.measurement_counts().values().sum();
    assert_eq!(summed, 5 * bare.total_shots());
    assert_eq!(buffer.measurements().len(), 5 * 64);
    assert_eq!(base.calls.load(Ordering::SeqCst), 1 + 5);
    assert_eq!(buffer.information("sampler-n-execs"), Some(&ExtraInfo::Int(5)));
}

#[tokio::test]
async fn test_nested_sampling_multiplies() {
    let base = Deterministic::new(10);
    let decorated = DecoratedAccelerator::new(base.clone())
        .with_stage(Arc::new(ImprovedSampling::new(2)))
        .with_stage(Arc::new(ImprovedSampling::new(3)));

    let mut buffer = decorated.create_buffer("q").unwrap();
    decorated.execute(&mut buffer, &single_measure()).await.unwrap();

    assert_eq!(buffer.total_shots(), 2 * 3 * 10);
    assert_eq!(base.calls.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn test_readout_correction_uses_base_calibration() {
    let decorated =
        DecoratedAccelerator::new(Arc::new(Leaky)).with_stage(Arc::new(ReadoutErrorCorrection::new()));

    let mut buffer = decorated.create_buffer("q").unwrap();
    decorated.execute(&mut buffer, &single_measure()).await.unwrap();

    assert_eq!(buffer.measurement_counts().get("0"), Some(&100));
    assert!(!buffer.measurement_counts().contains_key("1"));
    let fixed = buffer.information("ro-fixed-exp-val-z").and_then(ExtraInfo::as_f64).unwrap();
    let raw = buffer.information("ro-raw-exp-val-z").and_then(ExtraInfo::as_f64).unwrap();
    assert!((fixed - 1.0).abs() < 1e-9);
    assert!((raw - 0.8).abs() < 1e-9);
}

#[tokio::test]
async fn test_readout_without_calibration_fails() {
    let decorated = DecoratedAccelerator::new(Deterministic::new(1))
        .with_stage(Arc::new(ReadoutErrorCorrection::new()));
    let mut buffer = decorated.create_buffer("q").unwrap();
    let err = decorated.execute(&mut buffer, &single_measure()).await.unwrap_err();
    assert!(matches!(err, HalError::Configuration(_)));
}

#[tokio::test]
async fn test_extrapolation_recovers_zero_noise() {
    let decorated = DecoratedAccelerator::new(Arc::new(Noisy { fail_from: usize::MAX }))
        .with_stage(Arc::new(RichardsonExtrapolation::new()));

    let mut buffer = decorated.create_buffer("q").unwrap();
    decorated.execute(&mut buffer, &bell()).await.unwrap();

    assert!((buffer.expectation_value_z() - 1.0).abs() < 1e-9);
    assert_eq!(
        buffer.information("rich-extrap-scales"),
        Some(&ExtraInfo::DoubleList(vec![1.0, 3.0, 5.0]))
    );
    // Measurements come from the unscaled run.
    assert_eq!(buffer.total_shots(), 100);
}

#[tokio::test]
async fn test_extrapolation_tolerates_one_failed_scale() {
    let decorated = DecoratedAccelerator::new(Arc::new(Noisy { fail_from: 5 }))
        .with_stage(Arc::new(RichardsonExtrapolation::new()));

    let mut buffer = decorated.create_buffer("q").unwrap();
    decorated.execute(&mut buffer, &bell()).await.unwrap();
    assert_eq!(
        buffer.information("rich-extrap-scales"),
        Some(&ExtraInfo::DoubleList(vec![1.0, 3.0]))
    );
    assert!((buffer.expectation_value_z() - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_extrapolation_propagates_when_too_few_points() {
    let decorated = DecoratedAccelerator::new(Arc::new(Noisy { fail_from: 3 }))
        .with_stage(Arc::new(RichardsonExtrapolation::new()));

    let mut buffer = decorated.create_buffer("q").unwrap();
    let err = decorated.execute(&mut buffer, &bell()).await.unwrap_err();
    assert!(matches!(err, HalError::Execution(_)));
    assert_eq!(buffer.total_shots(), 0);
}

#[tokio::test]
async fn test_delegate_failure_propagates() {
    let decorated = DecoratedAccelerator::new(Arc::new(Broken))
        .with_stage(Arc::new(ImprovedSampling::default()));
    let mut buffer = decorated.create_buffer("q").unwrap();
    let err = decorated.execute(&mut buffer, &single_measure()).await.unwrap_err();
    assert!(matches!(err, HalError::Execution(ref m) if m == "device offline"));
}

#[tokio::test]
async fn test_batch_preserves_order_through_chain() {
    let base = Deterministic::new(4);
    let decorated =
        DecoratedAccelerator::new(base).with_stage(Arc::new(ImprovedSampling::new(2)));

    let kernels: Vec<Function> = ["k0", "k1", "k2", "k3"]
        .iter()
        .map(|name| {
            let mut f = Function::new(*name);
            f.add_instruction(Operation::measure(0, 0));
            f
        })
        .collect();

    let mut parent = decorated.create_buffer("q").unwrap();
    let results = decorated.execute_batch(&mut parent, &kernels).await.unwrap();

    assert_eq!(results.len(), kernels.len());
    for (result, kernel) in results.iter().zip(&kernels) {
        assert_eq!(result.name(), kernel.name());
        assert_eq!(result.total_shots(), 8);
    }
    assert_eq!(parent.children_names(), vec!["k0", "k1", "k2", "k3"]);
}
