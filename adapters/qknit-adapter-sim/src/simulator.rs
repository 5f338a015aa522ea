//! Simulator executor implementation.

use async_trait::async_trait;
use rand::SeedableRng;
use rand::distributions::{Distribution as _, WeightedIndex};
use rand::rngs::StdRng;
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, instrument};

use qknit_hal::{Distribution, Executor, HalError, HalResult};
use qknit_ir::{Circuit, InstructionKind};

use crate::statevector::Statevector;

/// Amplitudes and branch probabilities below this are treated as zero.
const PROB_EPSILON: f64 = 1e-14;

/// One measurement history of a circuit.
#[derive(Clone)]
struct Branch {
    state: Statevector,
    clbits: u64,
    probability: f64,
}

/// Local statevector simulator.
///
/// Mid-circuit measurements and resets are handled by branching, so
/// `shots == 0` yields the exact outcome distribution. With `shots > 0`
/// the exact distribution is sampled.
pub struct SimulatorExecutor {
    /// Executor name.
    name: String,
    /// Maximum number of qubits supported.
    max_qubits: usize,
    /// Seeded generator for reproducible sampling.
    rng: Option<Arc<Mutex<StdRng>>>,
}

impl SimulatorExecutor {
    /// Create a new simulator with default settings.
    pub fn new() -> Self {
        Self {
            name: "simulator".into(),
            max_qubits: 20,
            rng: None,
        }
    }

    /// Create a simulator with custom max qubits.
    pub fn with_max_qubits(max_qubits: usize) -> Self {
        Self {
            max_qubits,
            ..Self::new()
        }
    }

    /// Make shot sampling reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Some(Arc::new(Mutex::new(StdRng::seed_from_u64(seed))));
        self
    }

    /// Exact outcome distribution of a circuit.
    #[instrument(skip(circuit), fields(name = circuit.name()))]
    pub fn exact_distribution(circuit: &Circuit) -> HalResult<Distribution> {
        let start = Instant::now();
        if circuit.num_clbits() > 64 {
            return Err(HalError::InvalidCircuit(format!(
                "Circuit '{}' has {} classical bits, at most 64 are supported",
                circuit.name(),
                circuit.num_clbits()
            )));
        }

        let instructions = circuit.instructions();
        let terminal = terminal_measurements(circuit);
        let mut deferred: Vec<(usize, usize)> = vec![];

        let mut branches = vec![Branch {
            state: Statevector::new(circuit.num_qubits()),
            clbits: 0,
            probability: 1.0,
        }];

        for (idx, inst) in instructions.iter().enumerate() {
            match inst.kind {
                InstructionKind::Gate(gate) => {
                    let qubits: Vec<_> = inst.qubits.iter().map(|q| q.index()).collect();
                    for branch in &mut branches {
                        branch.state.apply_gate(&gate, &qubits);
                    }
                }
                InstructionKind::Measure if terminal[idx] => {
                    deferred.push((inst.qubits[0].index(), inst.clbits[0].index()));
                }
                InstructionKind::Measure => {
                    let qubit = inst.qubits[0].index();
                    let mask = 1u64 << inst.clbits[0].index();
                    branches = split(branches, qubit, |branch, outcome| {
                        if outcome {
                            branch.clbits |= mask;
                        } else {
                            branch.clbits &= !mask;
                        }
                    });
                }
                InstructionKind::Reset => {
                    let qubit = inst.qubits[0].index();
                    branches = split(branches, qubit, |branch, outcome| {
                        if outcome {
                            branch.state.flip(qubit);
                        }
                    });
                }
                InstructionKind::Barrier => {}
                InstructionKind::Virtual(_) | InstructionKind::WireCut => {
                    return Err(HalError::Unsupported(format!(
                        "cut marker '{}' cannot be simulated",
                        inst.name()
                    )));
                }
            }
        }

        let deferred_mask = deferred.iter().fold(0u64, |m, &(_, c)| m | (1 << c));
        let mut dist = Distribution::new();
        for branch in &branches {
            let base = branch.clbits & !deferred_mask;
            for (index, p) in branch.state.probabilities() {
                if p < PROB_EPSILON {
                    continue;
                }
                let outcome = deferred.iter().fold(base, |acc, &(q, c)| {
                    if index & (1 << q) != 0 {
                        acc | (1 << c)
                    } else {
                        acc
                    }
                });
                dist.add(outcome, branch.probability * p);
            }
        }

        debug!(
            "Simulated {} qubits with {} branches in {:?}",
            circuit.num_qubits(),
            branches.len(),
            start.elapsed()
        );
        Ok(dist)
    }

    fn sample(&self, exact: &Distribution, shots: u32) -> HalResult<Distribution> {
        let entries = exact.sorted();
        let weights = WeightedIndex::new(entries.iter().map(|&(_, w)| w.max(0.0)))
            .map_err(|e| HalError::Backend(format!("cannot sample distribution: {e}")))?;

        let mut counts: FxHashMap<u64, u64> = FxHashMap::default();
        let mut draw = |rng: &mut dyn rand::RngCore| {
            for _ in 0..shots {
                *counts.entry(entries[weights.sample(rng)].0).or_insert(0) += 1;
            }
        };
        match &self.rng {
            Some(rng) => {
                let mut rng = rng.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                draw(&mut *rng);
            }
            None => draw(&mut rand::thread_rng()),
        }
        Ok(Distribution::from_counts(&counts, shots))
    }
}

impl Default for SimulatorExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for SimulatorExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    fn max_qubits(&self) -> Option<usize> {
        Some(self.max_qubits)
    }

    #[instrument(skip(self, circuits), fields(batch = circuits.len()))]
    async fn run(&self, circuits: &[Circuit], shots: u32) -> HalResult<Vec<Distribution>> {
        self.validate(circuits)?;

        let owned = circuits.to_vec();
        let exact = tokio::task::spawn_blocking(move || {
            owned
                .iter()
                .map(SimulatorExecutor::exact_distribution)
                .collect::<HalResult<Vec<_>>>()
        })
        .await
        .map_err(|e| HalError::Backend(format!("simulation task failed: {e}")))??;

        if shots == 0 {
            return Ok(exact);
        }
        exact.iter().map(|d| self.sample(d, shots)).collect()
    }
}

/// Branch every history on the Z-basis outcome of `qubit`.
fn split(
    branches: Vec<Branch>,
    qubit: usize,
    mut record: impl FnMut(&mut Branch, bool),
) -> Vec<Branch> {
    let mut out = Vec::with_capacity(branches.len() * 2);
    for branch in branches {
        let p1 = branch.state.prob_one(qubit);
        let p0 = 1.0 - p1;
        if p0 < PROB_EPSILON || p1 < PROB_EPSILON {
            let outcome = p1 >= PROB_EPSILON;
            let mut b = branch;
            record(&mut b, outcome);
            out.push(b);
            continue;
        }
        for (outcome, p) in [(false, p0), (true, p1)] {
            let mut b = branch.clone();
            b.state.project(qubit, outcome, p);
            b.probability *= p;
            record(&mut b, outcome);
            out.push(b);
        }
    }
    out
}

/// A measurement is terminal when nothing later touches its qubit or
/// overwrites its classical bit; terminal measurements are read off the
/// final state instead of branching.
fn terminal_measurements(circuit: &Circuit) -> Vec<bool> {
    let instructions = circuit.instructions();
    let mut qubit_used = vec![false; circuit.num_qubits()];
    let mut clbit_used = vec![false; circuit.num_clbits()];
    let mut terminal = vec![false; instructions.len()];

    for (idx, inst) in instructions.iter().enumerate().rev() {
        if matches!(inst.kind, InstructionKind::Barrier) {
            continue;
        }
        if inst.is_measure() {
            let q = inst.qubits[0].index();
            let c = inst.clbits[0].index();
            terminal[idx] = !qubit_used[q] && !clbit_used[c];
        }
        for q in &inst.qubits {
            qubit_used[q.index()] = true;
        }
        for c in &inst.clbits {
            clbit_used[c.index()] = true;
        }
    }
    terminal
}

#[cfg(test)]
mod tests {
    use super::*;
    use qknit_ir::{ClbitId, QubitId, StandardGate};

    #[tokio::test]
    async fn test_simulator_bell_state() {
        let sim = SimulatorExecutor::new();
        let circuit = Circuit::bell().unwrap();
        let out = sim.run(&[circuit], 0).await.unwrap();

        let dist = &out[0];
        assert!((dist.get(0b00) - 0.5).abs() < 1e-10);
        assert!((dist.get(0b11) - 0.5).abs() < 1e-10);
        assert_eq!(dist.len(), 2);
    }

    #[tokio::test]
    async fn test_simulator_ghz_sampled() {
        let sim = SimulatorExecutor::new().with_seed(7);
        let circuit = Circuit::ghz(3).unwrap();
        let out = sim.run(&[circuit], 1000).await.unwrap();

        let dist = &out[0];
        assert!((dist.get(0b000) + dist.get(0b111) - 1.0).abs() < 1e-10);
        assert!(dist.get(0b000) > 0.4 && dist.get(0b111) > 0.4);
    }

    #[tokio::test]
    async fn test_simulator_too_many_qubits() {
        let sim = SimulatorExecutor::with_max_qubits(5);
        let circuit = Circuit::with_size("test", 10, 0);
        let result = sim.run(&[circuit], 100).await;
        assert!(matches!(result, Err(HalError::CircuitTooLarge(_))));
    }

    #[test]
    fn test_mid_circuit_measurement() {
        // Measure |+⟩, then copy the collapsed value onto q1.
        let mut circuit = Circuit::with_size("mid", 2, 2);
        circuit
            .h(QubitId(0))
            .unwrap()
            .measure(QubitId(0), ClbitId(0))
            .unwrap()
            .cx(QubitId(0), QubitId(1))
            .unwrap()
            .measure(QubitId(1), ClbitId(1))
            .unwrap();
        assert_eq!(terminal_measurements(&circuit), vec![false, false, false, true]);

        let dist = SimulatorExecutor::exact_distribution(&circuit).unwrap();
        assert!((dist.get(0b00) - 0.5).abs() < 1e-10);
        assert!((dist.get(0b11) - 0.5).abs() < 1e-10);
    }

    #[test]
    fn test_reset_returns_to_zero() {
        let mut circuit = Circuit::with_size("reset", 1, 1);
        circuit
            .h(QubitId(0))
            .unwrap()
            .reset(QubitId(0))
            .unwrap()
            .measure(QubitId(0), ClbitId(0))
            .unwrap();
        let dist = SimulatorExecutor::exact_distribution(&circuit).unwrap();
        assert!((dist.get(0) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_rejects_cut_markers() {
        let mut circuit = Circuit::with_size("cut", 2, 0);
        circuit
            .virtual_gate(StandardGate::CZ, QubitId(0), QubitId(1))
            .unwrap();
        let err = SimulatorExecutor::exact_distribution(&circuit).unwrap_err();
        assert!(matches!(err, HalError::Unsupported(_)));
    }
}
