//! Quasi-probability decompositions of two-qubit gates and wires.
//!
//! Every supported gate except [`VirtualGate::Move`] is a local-unitary
//! conjugate of `exp(iφ Z⊗Z)`, whose channel expands into six products of
//! single-qubit operations:
//!
//! | # | side 0 | side 1 | coefficient |
//! |---|--------|--------|-------------|
//! | 0 | I      | I      | cos²φ       |
//! | 1 | Z      | Z      | sin²φ       |
//! | 2 | M      | S†     | cosφ·sinφ   |
//! | 3 | M      | S      | −cosφ·sinφ  |
//! | 4 | S†     | M      | cosφ·sinφ   |
//! | 5 | S      | M      | −cosφ·sinφ  |
//!
//! `M` is a Z-basis measurement into the side's auxiliary bit; its outcome
//! contributes a sign `(−1)^bit` at knitting time. A wire cut ([`Move`])
//! expands the identity channel in the Pauli basis: measure the source in
//! the Z, X or Y basis and prepare the matching eigenstate on a fresh qubit.
//!
//! [`Move`]: VirtualGate::Move

use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_4;

use qknit_hal::Distribution;
use qknit_ir::{QubitId, StandardGate};

use crate::error::{CutError, CutResult};

/// A single-qubit step of an instantiation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LocalOp {
    /// A single-qubit gate.
    Gate(StandardGate),
    /// Z-basis measurement into the side's auxiliary bit.
    Measure,
}

/// One term of a decomposition: a local program for each side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instantiation {
    /// Operations on the first and second qubit, in time order.
    pub sides: [Vec<LocalOp>; 2],
}

/// Two-qubit operations with a known decomposition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum VirtualGate {
    /// Controlled-Z.
    CZ,
    /// Controlled-X; the first qubit is the control.
    CX,
    /// Controlled-Y; the first qubit is the control.
    CY,
    /// Controlled phase.
    CP(f64),
    /// Controlled Z rotation.
    CRZ(f64),
    /// `exp(-iθ/2 Z⊗Z)`.
    RZZ(f64),
    /// `exp(-iθ/2 X⊗X)`.
    RXX(f64),
    /// `exp(-iθ/2 Y⊗Y)`.
    RYY(f64),
    /// Wire cut: transfer the first qubit onto a fresh second qubit.
    Move,
}

/// Single-qubit wrappers turning `exp(iφ Z⊗Z)` into a concrete gate.
struct ZzFrame {
    phi: f64,
    pre: [Vec<StandardGate>; 2],
    post: [Vec<StandardGate>; 2],
}

const MOVE_COEFFICIENTS: [f64; 8] = [0.5, 0.5, 0.5, -0.5, 0.5, -0.5, 0.5, -0.5];

impl VirtualGate {
    /// Resolve the decomposition for a standard gate.
    pub fn from_standard(gate: &StandardGate) -> CutResult<Self> {
        match *gate {
            StandardGate::CZ => Ok(VirtualGate::CZ),
            StandardGate::CX => Ok(VirtualGate::CX),
            StandardGate::CY => Ok(VirtualGate::CY),
            StandardGate::CP(t) => Ok(VirtualGate::CP(t)),
            StandardGate::CRz(t) => Ok(VirtualGate::CRZ(t)),
            StandardGate::RZZ(t) => Ok(VirtualGate::RZZ(t)),
            StandardGate::RXX(t) => Ok(VirtualGate::RXX(t)),
            StandardGate::RYY(t) => Ok(VirtualGate::RYY(t)),
            StandardGate::Move => Ok(VirtualGate::Move),
            other => Err(CutError::UnsupportedGateKind {
                gate: other.name().to_string(),
            }),
        }
    }

    /// The gate this operation stands for.
    pub fn to_standard(&self) -> StandardGate {
        match *self {
            VirtualGate::CZ => StandardGate::CZ,
            VirtualGate::CX => StandardGate::CX,
            VirtualGate::CY => StandardGate::CY,
            VirtualGate::CP(t) => StandardGate::CP(t),
            VirtualGate::CRZ(t) => StandardGate::CRz(t),
            VirtualGate::RZZ(t) => StandardGate::RZZ(t),
            VirtualGate::RXX(t) => StandardGate::RXX(t),
            VirtualGate::RYY(t) => StandardGate::RYY(t),
            VirtualGate::Move => StandardGate::Move,
        }
    }

    /// Get the name of the underlying gate.
    pub fn name(&self) -> &'static str {
        self.to_standard().name()
    }

    /// Number of terms in the decomposition.
    pub fn num_instantiations(&self) -> usize {
        match self {
            VirtualGate::Move => 8,
            _ => 6,
        }
    }

    /// Signed weight of every term.
    pub fn coefficients(&self) -> Vec<f64> {
        match self.zz_frame() {
            None => MOVE_COEFFICIENTS.to_vec(),
            Some(frame) => {
                let (s, c) = frame.phi.sin_cos();
                vec![c * c, s * s, c * s, -c * s, c * s, -c * s]
            }
        }
    }

    /// Sum of absolute coefficients (the sampling cost per shot).
    pub fn gamma(&self) -> f64 {
        self.coefficients().iter().map(|c| c.abs()).sum()
    }

    fn zz_frame(&self) -> Option<ZzFrame> {
        use StandardGate::{H, Rz, S, Sdg};
        let frame = |phi, pre: [Vec<StandardGate>; 2], post: [Vec<StandardGate>; 2]| {
            Some(ZzFrame { phi, pre, post })
        };
        match *self {
            VirtualGate::CZ => frame(FRAC_PI_4, [vec![], vec![]], [vec![S], vec![S]]),
            VirtualGate::CX => frame(FRAC_PI_4, [vec![], vec![H]], [vec![S], vec![S, H]]),
            VirtualGate::CY => frame(
                FRAC_PI_4,
                [vec![], vec![Sdg, H]],
                [vec![S], vec![S, H, S]],
            ),
            VirtualGate::CP(t) => frame(
                t / 4.0,
                [vec![], vec![]],
                [vec![Rz(t / 2.0)], vec![Rz(t / 2.0)]],
            ),
            VirtualGate::CRZ(t) => frame(t / 4.0, [vec![], vec![]], [vec![], vec![Rz(t / 2.0)]]),
            VirtualGate::RZZ(t) => frame(-t / 2.0, [vec![], vec![]], [vec![], vec![]]),
            VirtualGate::RXX(t) => frame(-t / 2.0, [vec![H], vec![H]], [vec![H], vec![H]]),
            VirtualGate::RYY(t) => frame(
                -t / 2.0,
                [vec![Sdg, H], vec![Sdg, H]],
                [vec![H, S], vec![H, S]],
            ),
            VirtualGate::Move => None,
        }
    }

    /// The `index`-th term of the decomposition.
    pub fn instantiate(&self, index: usize) -> CutResult<Instantiation> {
        let n = self.num_instantiations();
        if index >= n {
            return Err(CutError::InstantiationMismatch {
                expected: n,
                got: index + 1,
                context: format!("instantiation index of virtual {}", self.name()),
            });
        }

        let Some(frame) = self.zz_frame() else {
            return Ok(move_instantiation(index));
        };

        use StandardGate::{S, Sdg, Z};
        let core: [Vec<LocalOp>; 2] = match index {
            0 => [vec![], vec![]],
            1 => [vec![LocalOp::Gate(Z)], vec![LocalOp::Gate(Z)]],
            2 => [vec![LocalOp::Measure], vec![LocalOp::Gate(Sdg)]],
            3 => [vec![LocalOp::Measure], vec![LocalOp::Gate(S)]],
            4 => [vec![LocalOp::Gate(Sdg)], vec![LocalOp::Measure]],
            _ => [vec![LocalOp::Gate(S)], vec![LocalOp::Measure]],
        };

        let [core0, core1] = core;
        let wrap = |side: usize, core: Vec<LocalOp>| -> Vec<LocalOp> {
            frame.pre[side]
                .iter()
                .copied()
                .map(LocalOp::Gate)
                .chain(core)
                .chain(frame.post[side].iter().copied().map(LocalOp::Gate))
                .collect()
        };
        Ok(Instantiation {
            sides: [wrap(0, core0), wrap(1, core1)],
        })
    }

    /// Combine one result per instantiation into the uncut distribution.
    ///
    /// Each outcome of result `i` contributes `c_i · (−1)^(a₀ ⊕ a₁)` of its
    /// weight, where `a₀`, `a₁` are the bits at `aux_bits`; both bits are
    /// cleared in the output.
    pub fn knit(&self, results: &[Distribution], aux_bits: [usize; 2]) -> CutResult<Distribution> {
        let coefficients = self.coefficients();
        if results.len() != coefficients.len() {
            return Err(CutError::InstantiationMismatch {
                expected: coefficients.len(),
                got: results.len(),
                context: format!("knit of virtual {}", self.name()),
            });
        }

        let mask0 = 1u64 << aux_bits[0];
        let mask1 = 1u64 << aux_bits[1];
        let clear = !(mask0 | mask1);

        let mut out = Distribution::new();
        for (result, &c) in results.iter().zip(&coefficients) {
            for (outcome, w) in result.iter() {
                let parity = ((outcome & mask0) != 0) ^ ((outcome & mask1) != 0);
                let sign = if parity { -1.0 } else { 1.0 };
                out.add(outcome & clear, sign * c * w);
            }
        }
        Ok(out)
    }
}

fn move_instantiation(index: usize) -> Instantiation {
    use StandardGate::{H, S, Sdg, X};
    let g = LocalOp::Gate;
    let m = LocalOp::Measure;
    // Measurement basis on the source, eigenstate preparation on the target.
    let (src, dst) = match index {
        0 => (vec![], vec![]),
        1 => (vec![], vec![g(X)]),
        2 => (vec![m], vec![]),
        3 => (vec![m], vec![g(X)]),
        4 => (vec![g(H), m], vec![g(H)]),
        5 => (vec![g(H), m], vec![g(X), g(H)]),
        6 => (vec![g(Sdg), g(H), m], vec![g(H), g(S)]),
        _ => (vec![g(Sdg), g(H), m], vec![g(X), g(H), g(S)]),
    };
    Instantiation { sides: [src, dst] }
}

/// A virtual gate placed in a lowered circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualOperation {
    /// The decomposition.
    pub gate: VirtualGate,
    /// Lowered qubits of the two sides.
    pub qubits: [QubitId; 2],
    /// Fragments owning the two sides.
    pub fragments: [usize; 2],
    /// Instruction index in the lowered circuit.
    pub position: usize,
    /// Outcome bit positions of the two auxiliary measurements.
    pub aux_bits: [usize; 2],
}

impl VirtualOperation {
    /// Number of terms in the decomposition.
    pub fn num_instantiations(&self) -> usize {
        self.gate.num_instantiations()
    }

    /// Signed weight of every term.
    pub fn coefficients(&self) -> Vec<f64> {
        self.gate.coefficients()
    }

    /// The `index`-th term of the decomposition.
    pub fn instantiate(&self, index: usize) -> CutResult<Instantiation> {
        self.gate.instantiate(index)
    }

    /// Knit one result per instantiation, reading this operation's aux bits.
    pub fn knit(&self, results: &[Distribution]) -> CutResult<Distribution> {
        self.gate.knit(results, self.aux_bits)
    }

    /// Whether the two sides live in different fragments.
    pub fn crosses_fragments(&self) -> bool {
        self.fragments[0] != self.fragments[1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cz_coefficients() {
        let coeffs = VirtualGate::CZ.coefficients();
        let expected = [0.5, 0.5, 0.5, -0.5, 0.5, -0.5];
        for (c, e) in coeffs.iter().zip(expected) {
            assert!((c - e).abs() < 1e-12);
        }
        assert!((VirtualGate::CZ.gamma() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_coefficients_sum_to_one() {
        // The two unmeasured terms carry the full trace.
        let gates = [
            VirtualGate::CX,
            VirtualGate::CP(0.3),
            VirtualGate::RXX(1.7),
            VirtualGate::Move,
        ];
        for gate in gates {
            let c = gate.coefficients();
            assert!((c[0] + c[1] - 1.0).abs() < 1e-12, "{}", gate.name());
        }
    }

    #[test]
    fn test_from_standard() {
        assert_eq!(
            VirtualGate::from_standard(&StandardGate::CRz(0.2)).unwrap(),
            VirtualGate::CRZ(0.2)
        );
        let err = VirtualGate::from_standard(&StandardGate::Swap).unwrap_err();
        assert!(matches!(err, CutError::UnsupportedGateKind { gate } if gate == "swap"));
    }

    #[test]
    fn test_instantiation_counts() {
        assert_eq!(VirtualGate::RZZ(0.1).num_instantiations(), 6);
        assert_eq!(VirtualGate::Move.num_instantiations(), 8);
        assert!(VirtualGate::CZ.instantiate(6).is_err());
        assert!(VirtualGate::Move.instantiate(7).is_ok());
    }

    #[test]
    fn test_cx_wraps_target_in_hadamards() {
        let inst = VirtualGate::CX.instantiate(0).unwrap();
        assert_eq!(inst.sides[0], vec![LocalOp::Gate(StandardGate::S)]);
        assert_eq!(
            inst.sides[1],
            vec![
                LocalOp::Gate(StandardGate::H),
                LocalOp::Gate(StandardGate::S),
                LocalOp::Gate(StandardGate::H),
            ]
        );
    }

    #[test]
    fn test_measuring_terms() {
        for i in 0..6 {
            let inst = VirtualGate::CZ.instantiate(i).unwrap();
            let measured: Vec<bool> = inst
                .sides
                .iter()
                .map(|side| side.contains(&LocalOp::Measure))
                .collect();
            let expected = match i {
                0 | 1 => [false, false],
                2 | 3 => [true, false],
                _ => [false, true],
            };
            assert_eq!(measured, expected, "instantiation {i}");
        }
    }

    #[test]
    fn test_knit_rejects_wrong_count() {
        let results = vec![Distribution::delta(0); 5];
        let err = VirtualGate::CZ.knit(&results, [2, 3]).unwrap_err();
        assert!(matches!(
            err,
            CutError::InstantiationMismatch {
                expected: 6,
                got: 5,
                ..
            }
        ));
    }
}
