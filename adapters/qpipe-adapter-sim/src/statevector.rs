//! Statevector simulation engine.

use std::f64::consts::PI;

use num_complex::Complex64;
use qpipe_hal::{HalError, HalResult};
use qpipe_ir::Operation;
use rand::Rng;

/// A statevector over `num_qubits` qubits; qubit `q` is bit `q` of the
/// amplitude index.
#[derive(Debug, Clone)]
pub struct Statevector {
    amplitudes: Vec<Complex64>,
    num_qubits: usize,
}

fn angle(op: &Operation, index: usize) -> HalResult<f64> {
    let parameter = op.parameter(index).ok_or_else(|| {
        HalError::Execution(format!("{} is missing parameter {index}", op.name()))
    })?;
    parameter.as_f64().ok_or_else(|| {
        HalError::Unsupported(format!(
            "non-numeric parameter {parameter} on {}; evaluate the kernel first",
            op.name()
        ))
    })
}

impl Statevector {
    /// |0...0⟩ over `num_qubits` qubits.
    pub fn new(num_qubits: usize) -> Self {
        let mut amplitudes = vec![Complex64::new(0.0, 0.0); 1 << num_qubits];
        amplitudes[0] = Complex64::new(1.0, 0.0);
        Self {
            amplitudes,
            num_qubits,
        }
    }

    /// Number of qubits.
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// Amplitudes in index order.
    pub fn amplitudes(&self) -> &[Complex64] {
        &self.amplitudes
    }

    /// Apply a canonical gate. Measurements are not gates; see
    /// [`Statevector::measure`].
    pub fn apply(&mut self, op: &Operation) -> HalResult<()> {
        let bits = op.bits();
        if let Some(&q) = bits.iter().find(|&&q| q >= self.num_qubits) {
            return Err(HalError::Execution(format!(
                "{} targets qubit {q} of a {}-qubit register",
                op.name(),
                self.num_qubits
            )));
        }
        let arity = match op.name() {
            "CNOT" | "CY" | "CZ" | "CH" | "CRZ" | "CPhase" | "Swap" => 2,
            _ => 1,
        };
        if bits.len() != arity || (arity == 2 && bits[0] == bits[1]) {
            return Err(HalError::Execution(format!(
                "{} expects {arity} distinct qubits, got {bits:?}",
                op.name()
            )));
        }

        match op.name() {
            "I" => {}
            "X" => self.apply_x(bits[0]),
            "Y" => self.apply_y(bits[0]),
            "Z" => self.apply_phase(bits[0], PI),
            "H" => self.apply_h(bits[0]),
            "S" => self.apply_phase(bits[0], PI / 2.0),
            "Sdg" => self.apply_phase(bits[0], -PI / 2.0),
            "T" => self.apply_phase(bits[0], PI / 4.0),
            "Tdg" => self.apply_phase(bits[0], -PI / 4.0),
            "Rx" => self.apply_rx(bits[0], angle(op, 0)?),
            "Ry" => self.apply_ry(bits[0], angle(op, 0)?),
            "Rz" => self.apply_rz(bits[0], angle(op, 0)?),
            "U" => self.apply_u(bits[0], angle(op, 0)?, angle(op, 1)?, angle(op, 2)?),
            "CNOT" => self.apply_cx(bits[0], bits[1]),
            "CY" => self.apply_cy(bits[0], bits[1]),
            "CZ" => self.apply_cp(bits[0], bits[1], PI),
            "CH" => self.apply_ch(bits[0], bits[1]),
            "CRZ" => self.apply_crz(bits[0], bits[1], angle(op, 0)?),
            "CPhase" => self.apply_cp(bits[0], bits[1], angle(op, 0)?),
            "Swap" => self.apply_swap(bits[0], bits[1]),
            other => {
                return Err(HalError::Unsupported(format!(
                    "instruction '{other}' on the local simulator"
                )));
            }
        }
        Ok(())
    }

    /// Pair up indices differing only in `qubit` and apply a 2x2 update.
    fn pairs(&mut self, qubit: usize, mut f: impl FnMut(Complex64, Complex64) -> (Complex64, Complex64)) {
        let mask = 1 << qubit;
        for i in 0..self.amplitudes.len() {
            if i & mask == 0 {
                let j = i | mask;
                let (a, b) = f(self.amplitudes[i], self.amplitudes[j]);
                self.amplitudes[i] = a;
                self.amplitudes[j] = b;
            }
        }
    }

    /// Like [`Statevector::pairs`], restricted to indices where `control`
    /// is set.
    fn controlled_pairs(
        &mut self,
        control: usize,
        target: usize,
        mut f: impl FnMut(Complex64, Complex64) -> (Complex64, Complex64),
    ) {
        let ctrl_mask = 1 << control;
        let tgt_mask = 1 << target;
        for i in 0..self.amplitudes.len() {
            if i & ctrl_mask != 0 && i & tgt_mask == 0 {
                let j = i | tgt_mask;
                let (a, b) = f(self.amplitudes[i], self.amplitudes[j]);
                self.amplitudes[i] = a;
                self.amplitudes[j] = b;
            }
        }
    }

    fn apply_x(&mut self, qubit: usize) {
        self.pairs(qubit, |a, b| (b, a));
    }

    fn apply_y(&mut self, qubit: usize) {
        let i = Complex64::i();
        self.pairs(qubit, |a, b| (-i * b, i * a));
    }

    fn apply_h(&mut self, qubit: usize) {
        let r = std::f64::consts::FRAC_1_SQRT_2;
        self.pairs(qubit, |a, b| (r * (a + b), r * (a - b)));
    }

    fn apply_phase(&mut self, qubit: usize, theta: f64) {
        let phase = Complex64::from_polar(1.0, theta);
        self.pairs(qubit, |a, b| (a, phase * b));
    }

    fn apply_rx(&mut self, qubit: usize, theta: f64) {
        let c = (theta / 2.0).cos();
        let neg_i_s = Complex64::new(0.0, -(theta / 2.0).sin());
        self.pairs(qubit, |a, b| (c * a + neg_i_s * b, neg_i_s * a + c * b));
    }

    fn apply_ry(&mut self, qubit: usize, theta: f64) {
        let c = (theta / 2.0).cos();
        let s = (theta / 2.0).sin();
        self.pairs(qubit, |a, b| (c * a - s * b, s * a + c * b));
    }

    fn apply_rz(&mut self, qubit: usize, theta: f64) {
        let p0 = Complex64::from_polar(1.0, -theta / 2.0);
        let p1 = Complex64::from_polar(1.0, theta / 2.0);
        self.pairs(qubit, |a, b| (p0 * a, p1 * b));
    }

    fn apply_u(&mut self, qubit: usize, theta: f64, phi: f64, lambda: f64) {
        let c = (theta / 2.0).cos();
        let s = (theta / 2.0).sin();
        let e_il = Complex64::from_polar(1.0, lambda);
        let e_ip = Complex64::from_polar(1.0, phi);
        let e_ipl = Complex64::from_polar(1.0, phi + lambda);
        self.pairs(qubit, |a, b| (c * a - e_il * s * b, e_ip * s * a + e_ipl * c * b));
    }

    fn apply_cx(&mut self, control: usize, target: usize) {
        self.controlled_pairs(control, target, |a, b| (b, a));
    }

    fn apply_cy(&mut self, control: usize, target: usize) {
        let i = Complex64::i();
        self.controlled_pairs(control, target, |a, b| (-i * b, i * a));
    }

    fn apply_ch(&mut self, control: usize, target: usize) {
        let r = std::f64::consts::FRAC_1_SQRT_2;
        self.controlled_pairs(control, target, |a, b| (r * (a + b), r * (a - b)));
    }

    fn apply_crz(&mut self, control: usize, target: usize, theta: f64) {
        let p0 = Complex64::from_polar(1.0, -theta / 2.0);
        let p1 = Complex64::from_polar(1.0, theta / 2.0);
        self.controlled_pairs(control, target, |a, b| (p0 * a, p1 * b));
    }

    fn apply_cp(&mut self, control: usize, target: usize, theta: f64) {
        let phase = Complex64::from_polar(1.0, theta);
        self.controlled_pairs(control, target, |a, b| (a, phase * b));
    }

    fn apply_swap(&mut self, q1: usize, q2: usize) {
        let m1 = 1 << q1;
        let m2 = 1 << q2;
        for i in 0..self.amplitudes.len() {
            if i & m1 != 0 && i & m2 == 0 {
                self.amplitudes.swap(i, (i & !m1) | m2);
            }
        }
    }

    /// Probability of reading `qubit` as 1.
    pub fn probability_one(&self, qubit: usize) -> f64 {
        let mask = 1 << qubit;
        self.amplitudes
            .iter()
            .enumerate()
            .filter(|(i, _)| i & mask != 0)
            .map(|(_, a)| a.norm_sqr())
            .sum()
    }

    /// Measure `qubit`, collapsing the state onto the outcome.
    pub fn measure<R: Rng>(&mut self, qubit: usize, rng: &mut R) -> bool {
        let p1 = self.probability_one(qubit).clamp(0.0, 1.0);
        let outcome = rng.gen_bool(p1);
        let mask = 1 << qubit;
        let norm = if outcome { p1 } else { 1.0 - p1 }.sqrt();
        for (i, amp) in self.amplitudes.iter_mut().enumerate() {
            if (i & mask != 0) == outcome {
                if norm > 0.0 {
                    *amp /= norm;
                }
            } else {
                *amp = Complex64::new(0.0, 0.0);
            }
        }
        outcome
    }

    /// Sample a full basis-state index without collapsing.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> usize {
        let r: f64 = rng.r#gen();
        let mut cumulative = 0.0;
        for (i, amp) in self.amplitudes.iter().enumerate() {
            cumulative += amp.norm_sqr();
            if r < cumulative {
                return i;
            }
        }
        // Rounding left the total just below 1.
        self.amplitudes.len() - 1
    }
}
