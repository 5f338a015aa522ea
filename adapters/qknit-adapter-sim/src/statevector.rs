//! Statevector simulation engine.

use num_complex::Complex64;
use std::f64::consts::PI;

use qknit_ir::StandardGate;

/// A statevector representing a quantum state.
#[derive(Debug, Clone)]
pub struct Statevector {
    /// The state amplitudes (2^n complex numbers).
    amplitudes: Vec<Complex64>,
    /// Number of qubits.
    num_qubits: usize,
}

impl Statevector {
    /// Create a new statevector initialized to |0...0⟩.
    pub fn new(num_qubits: usize) -> Self {
        let size = 1 << num_qubits;
        let mut amplitudes = vec![Complex64::new(0.0, 0.0); size];
        amplitudes[0] = Complex64::new(1.0, 0.0);
        Self {
            amplitudes,
            num_qubits,
        }
    }

    /// Probability of each computational basis state.
    pub fn probabilities(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.amplitudes
            .iter()
            .enumerate()
            .map(|(i, a)| (i, a.norm_sqr()))
    }

    /// Apply a standard gate to the given qubit indices.
    pub fn apply_gate(&mut self, gate: &StandardGate, qubits: &[usize]) {
        match *gate {
            // Single-qubit gates
            StandardGate::I => {}
            StandardGate::X => self.apply_x(qubits[0]),
            StandardGate::Y => self.apply_y(qubits[0]),
            StandardGate::Z => self.apply_z(qubits[0]),
            StandardGate::H => self.apply_h(qubits[0]),
            StandardGate::S => self.apply_phase(qubits[0], PI / 2.0),
            StandardGate::Sdg => self.apply_phase(qubits[0], -PI / 2.0),
            StandardGate::T => self.apply_phase(qubits[0], PI / 4.0),
            StandardGate::Tdg => self.apply_phase(qubits[0], -PI / 4.0),
            StandardGate::SX => self.apply_sx(qubits[0]),
            StandardGate::SXdg => self.apply_sxdg(qubits[0]),
            StandardGate::Rx(theta) => self.apply_rx(qubits[0], theta),
            StandardGate::Ry(theta) => self.apply_ry(qubits[0], theta),
            StandardGate::Rz(theta) => self.apply_rz(qubits[0], theta),
            StandardGate::P(theta) => self.apply_phase(qubits[0], theta),
            StandardGate::U(theta, phi, lambda) => self.apply_u(qubits[0], theta, phi, lambda),

            // Two-qubit gates
            StandardGate::CX => self.apply_cx(qubits[0], qubits[1]),
            StandardGate::CY => self.apply_cy(qubits[0], qubits[1]),
            StandardGate::CZ => self.apply_cz(qubits[0], qubits[1]),
            StandardGate::CH => self.apply_ch(qubits[0], qubits[1]),
            StandardGate::Swap | StandardGate::Move => self.apply_swap(qubits[0], qubits[1]),
            StandardGate::ISwap => self.apply_iswap(qubits[0], qubits[1]),
            StandardGate::CRz(theta) => self.apply_crz(qubits[0], qubits[1], theta),
            StandardGate::CP(theta) => self.apply_cp(qubits[0], qubits[1], theta),
            StandardGate::RXX(theta) => self.apply_rxx(qubits[0], qubits[1], theta),
            StandardGate::RYY(theta) => self.apply_ryy(qubits[0], qubits[1], theta),
            StandardGate::RZZ(theta) => self.apply_rzz(qubits[0], qubits[1], theta),
        }
    }

    // =========================================================================
    // Single-qubit gate implementations
    // =========================================================================

    fn apply_x(&mut self, qubit: usize) {
        let mask = 1 << qubit;
        for i in 0..(1 << self.num_qubits) {
            if i & mask == 0 {
                let j = i | mask;
                self.amplitudes.swap(i, j);
            }
        }
    }

    fn apply_y(&mut self, qubit: usize) {
        let mask = 1 << qubit;
        let i_val = Complex64::new(0.0, 1.0);
        for i in 0..(1 << self.num_qubits) {
            if i & mask == 0 {
                let j = i | mask;
                let tmp = self.amplitudes[i];
                self.amplitudes[i] = -i_val * self.amplitudes[j];
                self.amplitudes[j] = i_val * tmp;
            }
        }
    }

    fn apply_z(&mut self, qubit: usize) {
        self.apply_phase(qubit, PI);
    }

    fn apply_h(&mut self, qubit: usize) {
        let mask = 1 << qubit;
        let sqrt2_inv = 1.0 / 2.0_f64.sqrt();
        for i in 0..(1 << self.num_qubits) {
            if i & mask == 0 {
                let j = i | mask;
                let a = self.amplitudes[i];
                let b = self.amplitudes[j];
                self.amplitudes[i] = sqrt2_inv * (a + b);
                self.amplitudes[j] = sqrt2_inv * (a - b);
            }
        }
    }

    fn apply_phase(&mut self, qubit: usize, theta: f64) {
        let mask = 1 << qubit;
        let phase = Complex64::from_polar(1.0, theta);
        for i in 0..(1 << self.num_qubits) {
            if i & mask != 0 {
                self.amplitudes[i] *= phase;
            }
        }
    }

    fn apply_rx(&mut self, qubit: usize, theta: f64) {
        let mask = 1 << qubit;
        let c = (theta / 2.0).cos();
        let s = (theta / 2.0).sin();
        let neg_i_s = Complex64::new(0.0, -s);
        for i in 0..(1 << self.num_qubits) {
            if i & mask == 0 {
                let j = i | mask;
                let a = self.amplitudes[i];
                let b = self.amplitudes[j];
                self.amplitudes[i] = c * a + neg_i_s * b;
                self.amplitudes[j] = neg_i_s * a + c * b;
            }
        }
    }

    fn apply_ry(&mut self, qubit: usize, theta: f64) {
        let mask = 1 << qubit;
        let c = (theta / 2.0).cos();
        let s = (theta / 2.0).sin();
        for i in 0..(1 << self.num_qubits) {
            if i & mask == 0 {
                let j = i | mask;
                let a = self.amplitudes[i];
                let b = self.amplitudes[j];
                self.amplitudes[i] = c * a - s * b;
                self.amplitudes[j] = s * a + c * b;
            }
        }
    }

    fn apply_rz(&mut self, qubit: usize, theta: f64) {
        let mask = 1 << qubit;
        let phase_0 = Complex64::from_polar(1.0, -theta / 2.0);
        let phase_1 = Complex64::from_polar(1.0, theta / 2.0);
        for i in 0..(1 << self.num_qubits) {
            if i & mask == 0 {
                self.amplitudes[i] *= phase_0;
            } else {
                self.amplitudes[i] *= phase_1;
            }
        }
    }

    fn apply_u(&mut self, qubit: usize, theta: f64, phi: f64, lambda: f64) {
        let mask = 1 << qubit;
        let c = (theta / 2.0).cos();
        let s = (theta / 2.0).sin();
        let e_il = Complex64::from_polar(1.0, lambda);
        let e_ip = Complex64::from_polar(1.0, phi);
        let e_ipl = Complex64::from_polar(1.0, phi + lambda);

        for i in 0..(1 << self.num_qubits) {
            if i & mask == 0 {
                let j = i | mask;
                let a = self.amplitudes[i];
                let b = self.amplitudes[j];
                self.amplitudes[i] = c * a - e_il * s * b;
                self.amplitudes[j] = e_ip * s * a + e_ipl * c * b;
            }
        }
    }

    fn apply_sx(&mut self, qubit: usize) {
        self.apply_rx(qubit, PI / 2.0);
    }

    fn apply_sxdg(&mut self, qubit: usize) {
        self.apply_rx(qubit, -PI / 2.0);
    }

    // =========================================================================
    // Two-qubit gate implementations
    // =========================================================================

    fn apply_cx(&mut self, control: usize, target: usize) {
        let ctrl_mask = 1 << control;
        let tgt_mask = 1 << target;
        for i in 0..(1 << self.num_qubits) {
            if (i & ctrl_mask != 0) && (i & tgt_mask == 0) {
                let j = i | tgt_mask;
                self.amplitudes.swap(i, j);
            }
        }
    }

    fn apply_cy(&mut self, control: usize, target: usize) {
        let ctrl_mask = 1 << control;
        let tgt_mask = 1 << target;
        let i_val = Complex64::new(0.0, 1.0);
        for i in 0..(1 << self.num_qubits) {
            if (i & ctrl_mask != 0) && (i & tgt_mask == 0) {
                let j = i | tgt_mask;
                let tmp = self.amplitudes[i];
                self.amplitudes[i] = -i_val * self.amplitudes[j];
                self.amplitudes[j] = i_val * tmp;
            }
        }
    }

    fn apply_cz(&mut self, control: usize, target: usize) {
        self.apply_cp(control, target, PI);
    }

    fn apply_ch(&mut self, control: usize, target: usize) {
        let ctrl_mask = 1 << control;
        let tgt_mask = 1 << target;
        let sqrt2_inv = 1.0 / 2.0_f64.sqrt();
        for i in 0..(1 << self.num_qubits) {
            if (i & ctrl_mask != 0) && (i & tgt_mask == 0) {
                let j = i | tgt_mask;
                let a = self.amplitudes[i];
                let b = self.amplitudes[j];
                self.amplitudes[i] = sqrt2_inv * (a + b);
                self.amplitudes[j] = sqrt2_inv * (a - b);
            }
        }
    }

    fn apply_swap(&mut self, q1: usize, q2: usize) {
        let mask1 = 1 << q1;
        let mask2 = 1 << q2;
        for i in 0..(1 << self.num_qubits) {
            if (i & mask1 != 0) && (i & mask2 == 0) {
                let j = (i & !mask1) | mask2;
                self.amplitudes.swap(i, j);
            }
        }
    }

    fn apply_iswap(&mut self, q1: usize, q2: usize) {
        let mask1 = 1 << q1;
        let mask2 = 1 << q2;
        let i_val = Complex64::new(0.0, 1.0);
        for i in 0..(1 << self.num_qubits) {
            if (i & mask1 != 0) && (i & mask2 == 0) {
                let j = (i & !mask1) | mask2;
                let tmp = self.amplitudes[i];
                self.amplitudes[i] = i_val * self.amplitudes[j];
                self.amplitudes[j] = i_val * tmp;
            }
        }
    }

    fn apply_crz(&mut self, control: usize, target: usize, theta: f64) {
        let ctrl_mask = 1 << control;
        let tgt_mask = 1 << target;
        let phase_0 = Complex64::from_polar(1.0, -theta / 2.0);
        let phase_1 = Complex64::from_polar(1.0, theta / 2.0);
        for i in 0..(1 << self.num_qubits) {
            if i & ctrl_mask != 0 {
                if i & tgt_mask == 0 {
                    self.amplitudes[i] *= phase_0;
                } else {
                    self.amplitudes[i] *= phase_1;
                }
            }
        }
    }

    fn apply_cp(&mut self, control: usize, target: usize, theta: f64) {
        let ctrl_mask = 1 << control;
        let tgt_mask = 1 << target;
        let phase = Complex64::from_polar(1.0, theta);
        for i in 0..(1 << self.num_qubits) {
            if (i & ctrl_mask != 0) && (i & tgt_mask != 0) {
                self.amplitudes[i] *= phase;
            }
        }
    }

    fn apply_rzz(&mut self, q1: usize, q2: usize, theta: f64) {
        let mask1 = 1 << q1;
        let mask2 = 1 << q2;
        let even = Complex64::from_polar(1.0, -theta / 2.0);
        let odd = Complex64::from_polar(1.0, theta / 2.0);
        for i in 0..(1 << self.num_qubits) {
            let parity = ((i & mask1) != 0) ^ ((i & mask2) != 0);
            self.amplitudes[i] *= if parity { odd } else { even };
        }
    }

    fn apply_rxx(&mut self, q1: usize, q2: usize, theta: f64) {
        let mask1 = 1 << q1;
        let mask2 = 1 << q2;
        let c = (theta / 2.0).cos();
        let neg_i_s = Complex64::new(0.0, -(theta / 2.0).sin());
        for i in 0..(1 << self.num_qubits) {
            if i & mask1 == 0 {
                let j = i ^ mask1 ^ mask2;
                let a = self.amplitudes[i];
                let b = self.amplitudes[j];
                self.amplitudes[i] = c * a + neg_i_s * b;
                self.amplitudes[j] = c * b + neg_i_s * a;
            }
        }
    }

    fn apply_ryy(&mut self, q1: usize, q2: usize, theta: f64) {
        let mask1 = 1 << q1;
        let mask2 = 1 << q2;
        let c = (theta / 2.0).cos();
        let i_s = Complex64::new(0.0, (theta / 2.0).sin());
        for i in 0..(1 << self.num_qubits) {
            if i & mask1 == 0 {
                let j = i ^ mask1 ^ mask2;
                let a = self.amplitudes[i];
                let b = self.amplitudes[j];
                // Y⊗Y maps |00⟩ ↔ −|11⟩ and |01⟩ ↔ |10⟩.
                let coupling = if i & mask2 == 0 { i_s } else { -i_s };
                self.amplitudes[i] = c * a + coupling * b;
                self.amplitudes[j] = c * b + coupling * a;
            }
        }
    }

    // =========================================================================
    // Non-unitary operations
    // =========================================================================

    /// Probability of measuring `qubit` as 1.
    pub fn prob_one(&self, qubit: usize) -> f64 {
        let mask = 1 << qubit;
        self.amplitudes
            .iter()
            .enumerate()
            .filter(|(i, _)| i & mask != 0)
            .map(|(_, a)| a.norm_sqr())
            .sum()
    }

    /// Collapse `qubit` onto `outcome`, given that outcome's probability.
    pub fn project(&mut self, qubit: usize, outcome: bool, probability: f64) {
        let mask = 1 << qubit;
        let norm = probability.sqrt();
        for (i, amp) in self.amplitudes.iter_mut().enumerate() {
            if ((i & mask) != 0) == outcome {
                *amp /= norm;
            } else {
                *amp = Complex64::new(0.0, 0.0);
            }
        }
    }

    /// Flip a qubit that has been projected onto |1⟩ back to |0⟩.
    pub fn flip(&mut self, qubit: usize) {
        self.apply_x(qubit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-10;

    fn approx_eq(a: Complex64, b: Complex64) -> bool {
        (a - b).norm() < EPS
    }

    fn prob(sv: &Statevector, index: usize) -> f64 {
        sv.amplitudes[index].norm_sqr()
    }

    #[test]
    fn test_initial_state() {
        let sv = Statevector::new(2);
        assert!(approx_eq(sv.amplitudes[0], Complex64::new(1.0, 0.0)));
        assert_eq!(sv.amplitudes.len(), 4);
    }

    #[test]
    fn test_hadamard() {
        let mut sv = Statevector::new(1);
        sv.apply_gate(&StandardGate::H, &[0]);
        assert!((prob(&sv, 0) - 0.5).abs() < EPS);
        assert!((prob(&sv, 1) - 0.5).abs() < EPS);
    }

    #[test]
    fn test_bell_state() {
        let mut sv = Statevector::new(2);
        sv.apply_gate(&StandardGate::H, &[0]);
        sv.apply_gate(&StandardGate::CX, &[0, 1]);
        assert!((prob(&sv, 0b00) - 0.5).abs() < EPS);
        assert!((prob(&sv, 0b11) - 0.5).abs() < EPS);
        assert!((sv.prob_one(1) - 0.5).abs() < EPS);
    }

    #[test]
    fn test_rzz_phases() {
        let theta = 0.7;
        let mut sv = Statevector::new(2);
        sv.apply_gate(&StandardGate::X, &[0]);
        sv.apply_gate(&StandardGate::RZZ(theta), &[0, 1]);
        assert!(approx_eq(
            sv.amplitudes[0b01],
            Complex64::from_polar(1.0, theta / 2.0)
        ));
    }

    #[test]
    fn test_rxx_equals_conjugated_rzz() {
        let theta = 1.1;
        let mut a = Statevector::new(2);
        a.apply_gate(&StandardGate::Ry(0.4), &[0]);
        a.apply_gate(&StandardGate::RXX(theta), &[0, 1]);

        let mut b = Statevector::new(2);
        b.apply_gate(&StandardGate::Ry(0.4), &[0]);
        b.apply_gate(&StandardGate::H, &[0]);
        b.apply_gate(&StandardGate::H, &[1]);
        b.apply_gate(&StandardGate::RZZ(theta), &[0, 1]);
        b.apply_gate(&StandardGate::H, &[0]);
        b.apply_gate(&StandardGate::H, &[1]);

        for i in 0..4 {
            assert!(approx_eq(a.amplitudes[i], b.amplitudes[i]));
        }
    }

    #[test]
    fn test_ryy_equals_conjugated_rzz() {
        let theta = -0.8;
        let mut a = Statevector::new(2);
        a.apply_gate(&StandardGate::Rx(0.3), &[1]);
        a.apply_gate(&StandardGate::RYY(theta), &[0, 1]);

        // Y = S·H·Z·H·S†, so conjugate RZZ by (S·H) ⊗ (S·H).
        let mut b = Statevector::new(2);
        b.apply_gate(&StandardGate::Rx(0.3), &[1]);
        for q in 0..2 {
            b.apply_gate(&StandardGate::Sdg, &[q]);
            b.apply_gate(&StandardGate::H, &[q]);
        }
        b.apply_gate(&StandardGate::RZZ(theta), &[0, 1]);
        for q in 0..2 {
            b.apply_gate(&StandardGate::H, &[q]);
            b.apply_gate(&StandardGate::S, &[q]);
        }

        for i in 0..4 {
            assert!(approx_eq(a.amplitudes[i], b.amplitudes[i]));
        }
    }

    #[test]
    fn test_move_onto_fresh_qubit() {
        let mut sv = Statevector::new(2);
        sv.apply_gate(&StandardGate::X, &[0]);
        sv.apply_gate(&StandardGate::Move, &[0, 1]);
        assert!((prob(&sv, 0b10) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_project() {
        let mut sv = Statevector::new(2);
        sv.apply_gate(&StandardGate::H, &[0]);
        sv.apply_gate(&StandardGate::CX, &[0, 1]);
        let p1 = sv.prob_one(0);
        sv.project(0, true, p1);
        assert!((prob(&sv, 0b11) - 1.0).abs() < EPS);
        sv.flip(0);
        assert!((prob(&sv, 0b10) - 1.0).abs() < EPS);
    }
}
