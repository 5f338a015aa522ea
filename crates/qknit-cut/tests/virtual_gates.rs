//! Decomposition tests: every term executed on the simulator and knitted
//! must reproduce the exact gate.

use qknit_adapter_sim::SimulatorExecutor;
use qknit_cut::{LocalOp, VirtualGate};
use qknit_hal::Distribution;
use qknit_ir::{Circuit, ClbitId, QubitId, StandardGate};

const AUX_BITS: [usize; 2] = [2, 3];

/// Prepare both qubits; the target of a move starts fresh in |0⟩.
fn prepare(circuit: &mut Circuit, gate: &VirtualGate) {
    circuit.u(0.9, 0.4, -0.3, QubitId(0)).unwrap();
    if !matches!(gate, VirtualGate::Move) {
        circuit.u(1.7, -1.1, 0.6, QubitId(1)).unwrap();
    }
}

fn apply_side(circuit: &mut Circuit, side: usize, ops: &[LocalOp]) {
    let qubit = QubitId(side as u32);
    for op in ops {
        match op {
            LocalOp::Gate(g) => {
                circuit.gate(*g, [qubit]).unwrap();
            }
            LocalOp::Measure => {
                circuit.measure(qubit, ClbitId(AUX_BITS[side] as u32)).unwrap();
            }
        }
    }
}

fn finish(circuit: &mut Circuit, gate: &VirtualGate) {
    if matches!(gate, VirtualGate::Move) {
        circuit
            .rx(0.5, QubitId(1))
            .unwrap()
            .measure(QubitId(1), ClbitId(0))
            .unwrap();
    } else {
        circuit
            .ry(0.3, QubitId(0))
            .unwrap()
            .rx(-0.7, QubitId(1))
            .unwrap()
            .measure(QubitId(0), ClbitId(0))
            .unwrap()
            .measure(QubitId(1), ClbitId(1))
            .unwrap();
    }
}

fn reference(gate: &VirtualGate) -> Distribution {
    let mut circuit = Circuit::with_size("reference", 2, 4);
    prepare(&mut circuit, gate);
    circuit
        .gate(gate.to_standard(), [QubitId(0), QubitId(1)])
        .unwrap();
    finish(&mut circuit, gate);
    SimulatorExecutor::exact_distribution(&circuit).unwrap()
}

fn knitted(gate: &VirtualGate) -> Distribution {
    let results: Vec<Distribution> = (0..gate.num_instantiations())
        .map(|i| {
            let inst = gate.instantiate(i).unwrap();
            let mut circuit = Circuit::with_size(format!("term_{i}"), 2, 4);
            prepare(&mut circuit, gate);
            apply_side(&mut circuit, 0, &inst.sides[0]);
            apply_side(&mut circuit, 1, &inst.sides[1]);
            finish(&mut circuit, gate);
            SimulatorExecutor::exact_distribution(&circuit).unwrap()
        })
        .collect();
    gate.knit(&results, AUX_BITS).unwrap()
}

#[test]
fn test_decompositions_reproduce_gates() {
    let gates = [
        VirtualGate::CZ,
        VirtualGate::CX,
        VirtualGate::CY,
        VirtualGate::CP(0.8),
        VirtualGate::CP(-2.1),
        VirtualGate::CRZ(1.3),
        VirtualGate::RZZ(0.4),
        VirtualGate::RXX(2.2),
        VirtualGate::RYY(-0.9),
        VirtualGate::Move,
    ];
    for gate in gates {
        let expected = reference(&gate);
        let got = knitted(&gate);
        assert!(
            got.max_abs_diff(&expected) < 1e-9,
            "{}: knitted {:?}, expected {:?}",
            gate.name(),
            got.sorted(),
            expected.sorted()
        );
    }
}

#[test]
fn test_cz_knit_by_hand() {
    let results: Vec<Distribution> = vec![
        [(0, 0.5), (1, 0.5)].into_iter().collect(),
        [(1, 1.0)].into_iter().collect(),
        [(0b010, 0.25), (0, 0.75)].into_iter().collect(),
        [(0b011, 1.0)].into_iter().collect(),
        [(0b100, 0.5), (0b101, 0.5)].into_iter().collect(),
        [(0b110, 1.0)].into_iter().collect(),
    ];
    let out = VirtualGate::CZ.knit(&results, [1, 2]).unwrap();
    assert_eq!(out.len(), 2);
    assert!((out.get(0) + 0.25).abs() < 1e-12);
    assert!((out.get(1) - 1.0).abs() < 1e-12);
}

#[test]
fn test_zero_angle_is_identity() {
    // Every weight sits on the unmeasured identity term.
    let coefficients = VirtualGate::RZZ(0.0).coefficients();
    assert!((coefficients[0] - 1.0).abs() < 1e-12);
    assert!(coefficients[1..].iter().all(|c| c.abs() < 1e-12));
    assert!((VirtualGate::RZZ(0.0).gamma() - 1.0).abs() < 1e-12);
}

#[test]
fn test_gamma_grows_with_angle() {
    let small = VirtualGate::CP(0.2).gamma();
    let large = VirtualGate::CP(std::f64::consts::PI).gamma();
    assert!(small < large);
    assert!((large - 3.0).abs() < 1e-12);
    assert!((VirtualGate::Move.gamma() - 4.0).abs() < 1e-12);
}

#[test]
fn test_standard_round_trip() {
    let gate = StandardGate::RXX(0.3);
    assert_eq!(
        VirtualGate::from_standard(&gate).unwrap().to_standard(),
        gate
    );
}
