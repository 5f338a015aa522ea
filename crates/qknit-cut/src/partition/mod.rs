//! Partitioning a circuit into fragments.
//!
//! Three techniques are available, selected by [`Technique`]:
//!
//! - **bisection**: recursive METIS bisection of the qubit graph, refined
//!   by Kernighan–Lin
//! - **metis**: METIS k-way partitioning of the qubit graph, repaired to
//!   the size limit and refined
//! - **optimal**: exact branch and bound; on the occurrence graph when wire
//!   cuts are allowed, so it can trade gate cuts for wire cuts
//!
//! Whatever the technique, [`Partitioner::plan`] lowers wire cuts, marks
//! crossing gates virtual and verifies the result before returning it.

mod bisection;
mod multiway;
mod optimal;
mod split;

pub use bisection::{bisect, bisect_vertices, kernighan_lin, recursive_partition};
pub use multiway::multiway_partition;
pub use optimal::{CutBudget, optimal_partition};
pub use split::{PartitioningStrategy, find_partitioning};

use std::ops::RangeInclusive;

use rustc_hash::FxHashMap;
use tracing::{debug, info, instrument};

use qknit_ir::{Circuit, InstructionKind, QubitId, StandardGate};

use crate::config::{CutConfig, Technique};
use crate::cost::CostEstimator;
use crate::error::{CutError, CutResult};
use crate::graph::{CircuitGraph, Vertex};
use crate::plan::{Fragment, PartitionPlan};
use crate::virtual_gate::{VirtualGate, VirtualOperation};

/// A circuit with every wire cut replaced by a virtual move.
#[derive(Debug, Clone)]
pub struct LoweredCircuit {
    /// The lowered circuit.
    pub circuit: Circuit,
    /// Input qubit of every lowered qubit.
    pub origin: Vec<QubitId>,
    /// Number of wire cuts replaced.
    pub moves: usize,
}

/// Replace each `WireCut` on `q` by a virtual `move` from the current
/// qubit of `q` onto a fresh qubit; later operations on `q` use the fresh
/// qubit. Fresh qubits are numbered after the input qubits, in order of
/// appearance.
pub fn lower_wire_cuts(circuit: &Circuit) -> CutResult<LoweredCircuit> {
    let num_qubits = circuit.num_qubits();
    let moves = circuit
        .instructions()
        .iter()
        .filter(|i| i.is_wire_cut())
        .count();

    let mut lowered = Circuit::with_size(
        circuit.name(),
        (num_qubits + moves) as u32,
        circuit.num_clbits() as u32,
    );
    let mut current: Vec<QubitId> = circuit.qubits().collect();
    let mut origin: Vec<QubitId> = circuit.qubits().collect();

    for inst in circuit.instructions() {
        if inst.is_wire_cut() {
            let qubit = inst.qubits[0];
            let fresh = QubitId(origin.len() as u32);
            lowered.virtual_gate(StandardGate::Move, current[qubit.index()], fresh)?;
            current[qubit.index()] = fresh;
            origin.push(qubit);
            continue;
        }
        let mut remapped = inst.clone();
        for q in &mut remapped.qubits {
            *q = current[q.index()];
        }
        lowered.push(remapped)?;
    }

    Ok(LoweredCircuit {
        circuit: lowered,
        origin,
        moves,
    })
}

/// Drives a partitioning technique and turns its result into a plan.
#[derive(Debug, Clone, Copy)]
pub struct Partitioner<'a> {
    config: &'a CutConfig,
}

impl<'a> Partitioner<'a> {
    /// Create a partitioner for a configuration.
    pub fn new(config: &'a CutConfig) -> Self {
        Self { config }
    }

    /// Partition `circuit` into fragments.
    ///
    /// Gates and wires the caller already marked for cutting are always
    /// cut and do not count against the budgets.
    #[instrument(skip(self, circuit), fields(name = circuit.name(), technique = ?self.config.technique))]
    pub fn plan(&self, circuit: &Circuit) -> CutResult<PartitionPlan> {
        self.config.validate()?;
        if circuit.num_qubits() == 0 {
            return Err(CutError::InvalidCircuit(format!(
                "circuit '{}' has no qubits",
                circuit.name()
            )));
        }

        let lowered = lower_wire_cuts(circuit)?;
        let max_size = self.config.max_fragment_size;
        let num_qubits = lowered.circuit.num_qubits();

        let candidates: Vec<CutResult<PartitionPlan>> = match self.config.technique {
            Technique::Bisection => {
                let graph = CircuitGraph::from_qubits(&lowered.circuit);
                vec![
                    recursive_partition(&graph, max_size)
                        .and_then(|parts| self.build(&lowered, &graph, &parts)),
                ]
            }
            Technique::Metis => {
                let graph = CircuitGraph::from_qubits(&lowered.circuit);
                self.fragment_counts(num_qubits)?
                    .map(|k| {
                        multiway_partition(&graph, k, max_size)
                            .and_then(|parts| self.build(&lowered, &graph, &parts))
                    })
                    .collect()
            }
            Technique::Optimal => {
                let graph = if self.config.max_wire_cuts > 0 {
                    CircuitGraph::from_occurrences(&lowered.circuit)
                } else {
                    CircuitGraph::from_qubits(&lowered.circuit)
                };
                let budget = CutBudget {
                    gates: self.config.max_gate_cuts,
                    wires: self.config.max_wire_cuts,
                };
                self.fragment_counts(num_qubits)?
                    .map(|k| {
                        optimal_partition(&graph, k, max_size, budget, self.config.search_limit)
                            .and_then(|parts| self.build(&lowered, &graph, &parts))
                    })
                    .collect()
            }
        };

        let plan = select(candidates)?;
        info!(
            "Partitioned {} qubits into {} fragments: {} gate cuts, {} wire cuts, {} virtual operations",
            circuit.num_qubits(),
            plan.num_fragments(),
            plan.gate_cuts,
            plan.wire_cuts,
            plan.num_virtual_ops()
        );
        Ok(plan)
    }

    /// Fragment counts worth trying for `num_qubits` lowered qubits.
    fn fragment_counts(&self, num_qubits: usize) -> CutResult<RangeInclusive<usize>> {
        let max_size = self.config.max_fragment_size;
        if max_size < 1 {
            return Err(CutError::InfeasiblePartition(
                "max_fragment_size must be at least 1".into(),
            ));
        }
        if let Some(k) = self.config.num_fragments {
            return Ok(k..=k);
        }
        let k_min = num_qubits.div_ceil(max_size).max(1);
        Ok(k_min..=(k_min + 2).min(num_qubits).max(k_min))
    }

    /// Turn a vertex partition into a verified plan.
    fn build(
        &self,
        lowered: &LoweredCircuit,
        graph: &CircuitGraph,
        parts: &[Vec<usize>],
    ) -> CutResult<PartitionPlan> {
        let (circuit, origin, part_of, wire_cuts) = if graph.is_occurrence_graph() {
            cut_wires(lowered, graph, parts)?
        } else {
            let mut part_of = vec![usize::MAX; lowered.circuit.num_qubits()];
            for (p, part) in parts.iter().enumerate() {
                for &v in part {
                    part_of[graph.vertex(v).qubit().index()] = p;
                }
            }
            (lowered.circuit.clone(), lowered.origin.clone(), part_of, 0)
        };

        if let Some(q) = part_of.iter().position(|&p| p == usize::MAX) {
            return Err(CutError::InvalidCircuit(format!(
                "qubit {q} was not assigned to a fragment"
            )));
        }

        // Fragments ordered by smallest qubit.
        let mut groups: Vec<Vec<QubitId>> = vec![vec![]; parts.len()];
        for (q, &p) in part_of.iter().enumerate() {
            groups[p].push(QubitId(q as u32));
        }
        groups.retain(|g| !g.is_empty());
        groups.sort_by_key(|g| g[0]);
        let mut fragment_of = vec![0; part_of.len()];
        for (f, group) in groups.iter().enumerate() {
            for q in group {
                fragment_of[q.index()] = f;
            }
        }
        let fragments: Vec<Fragment> = groups
            .into_iter()
            .enumerate()
            .map(|(index, qubits)| Fragment { index, qubits })
            .collect();

        let (circuit, gate_cuts) = tag_crossing_gates(&circuit, &fragment_of)?;
        let virtual_ops = collect_virtual_ops(&circuit, &fragment_of)?;

        let plan = PartitionPlan {
            num_clbits: circuit.num_clbits(),
            circuit,
            fragments,
            virtual_ops,
            gate_cuts,
            wire_cuts,
            qubit_origin: origin,
        };
        self.verify(&plan)?;
        Ok(plan)
    }

    fn verify(&self, plan: &PartitionPlan) -> CutResult<()> {
        let num_qubits = plan.circuit.num_qubits();
        let mut seen = vec![false; num_qubits];
        for fragment in &plan.fragments {
            for q in &fragment.qubits {
                if std::mem::replace(&mut seen[q.index()], true) {
                    return Err(CutError::InvalidCircuit(format!(
                        "qubit {q} belongs to more than one fragment"
                    )));
                }
            }
        }
        if seen.iter().any(|s| !s) {
            return Err(CutError::InvalidCircuit(
                "fragments do not cover every qubit".into(),
            ));
        }

        let max_size = self.config.max_fragment_size;
        if let Some(f) = plan.fragments.iter().find(|f| f.size() > max_size) {
            return Err(CutError::InfeasiblePartition(format!(
                "fragment {} has {} qubits, at most {max_size} allowed",
                f.index,
                f.size()
            )));
        }
        if plan.gate_cuts > self.config.max_gate_cuts {
            return Err(CutError::InfeasiblePartition(format!(
                "{} gate cuts needed, at most {} allowed",
                plan.gate_cuts, self.config.max_gate_cuts
            )));
        }
        if plan.wire_cuts > self.config.max_wire_cuts {
            return Err(CutError::InfeasiblePartition(format!(
                "{} wire cuts needed, at most {} allowed",
                plan.wire_cuts, self.config.max_wire_cuts
            )));
        }

        // Every classical bit is written by a single fragment.
        let mut writer: FxHashMap<usize, usize> = FxHashMap::default();
        for inst in plan.circuit.instructions().iter().filter(|i| i.is_measure()) {
            let clbit = inst.clbits[0].index();
            let Some(f) = plan.fragment_of(inst.qubits[0]) else {
                continue;
            };
            if *writer.entry(clbit).or_insert(f) != f {
                return Err(CutError::InvalidCircuit(format!(
                    "classical bit {clbit} is written from more than one fragment"
                )));
            }
        }
        Ok(())
    }
}

/// Keep the candidate with the lowest sampling overhead, then the lowest
/// contraction cost, then the earliest. Fails with the first error when no
/// candidate is valid.
fn select(candidates: Vec<CutResult<PartitionPlan>>) -> CutResult<PartitionPlan> {
    let mut best: Option<((f64, f64), PartitionPlan)> = None;
    let mut first_error = None;

    for (i, candidate) in candidates.into_iter().enumerate() {
        let scored = candidate.and_then(|plan| CostEstimator::score(&plan).map(|estimate| (plan, estimate)));
        match scored {
            Ok((plan, estimate)) => {
                let key = (estimate.sampling_overhead, estimate.flops);
                debug!(
                    "Candidate {i}: {} fragments, overhead {}, flops {:.3e}",
                    plan.num_fragments(),
                    key.0,
                    key.1
                );
                if best.as_ref().is_none_or(|(b, _)| key < *b) {
                    best = Some((key, plan));
                }
            }
            Err(e) => {
                debug!("Candidate {i} rejected: {e}");
                first_error.get_or_insert(e);
            }
        }
    }

    match (best, first_error) {
        (Some((_, plan)), _) => Ok(plan),
        (None, Some(e)) => Err(e),
        (None, None) => Err(CutError::InfeasiblePartition(
            "no candidate partition".into(),
        )),
    }
}

/// Insert wire cuts where an occurrence partition changes part along a
/// qubit, lower them, and assign every lowered qubit its part.
fn cut_wires(
    lowered: &LoweredCircuit,
    graph: &CircuitGraph,
    parts: &[Vec<usize>],
) -> CutResult<(Circuit, Vec<QubitId>, Vec<usize>, usize)> {
    let num_qubits = lowered.circuit.num_qubits();
    let mut part_of_vertex = vec![0; graph.num_vertices()];
    for (p, part) in parts.iter().enumerate() {
        for &v in part {
            part_of_vertex[v] = p;
        }
    }

    // Part of every wire segment, per qubit, in time order.
    let mut segments: Vec<Vec<usize>> = vec![vec![]; num_qubits];
    let mut cuts_before: FxHashMap<usize, Vec<QubitId>> = FxHashMap::default();
    for v in 0..graph.num_vertices() {
        let vertex = graph.vertex(v);
        let qubit = vertex.qubit();
        match (graph.wire_predecessor(v), vertex) {
            (None, _) => segments[qubit.index()].push(part_of_vertex[v]),
            (Some(u), Vertex::Occurrence { instruction, .. })
                if part_of_vertex[u] != part_of_vertex[v] =>
            {
                cuts_before.entry(instruction).or_default().push(qubit);
                segments[qubit.index()].push(part_of_vertex[v]);
            }
            _ => {}
        }
    }

    let mut marked = Circuit::with_size(
        lowered.circuit.name(),
        num_qubits as u32,
        lowered.circuit.num_clbits() as u32,
    );
    for (idx, inst) in lowered.circuit.instructions().iter().enumerate() {
        if let Some(qubits) = cuts_before.get(&idx) {
            for &q in qubits {
                marked.wire_cut(q)?;
            }
        }
        marked.push(inst.clone())?;
    }

    let relowered = lower_wire_cuts(&marked)?;
    let mut next_segment = vec![0; num_qubits];
    let mut part_of = Vec::with_capacity(relowered.origin.len());
    for base in &relowered.origin {
        let b = base.index();
        let part = segments[b].get(next_segment[b]).copied().ok_or_else(|| {
            CutError::InvalidCircuit(format!("no wire segment for qubit {base}"))
        })?;
        part_of.push(part);
        next_segment[b] += 1;
    }
    let origin = relowered
        .origin
        .iter()
        .map(|q| lowered.origin[q.index()])
        .collect();

    debug!("Inserted {} wire cuts", relowered.moves);
    Ok((relowered.circuit, origin, part_of, relowered.moves))
}

/// Mark every gate whose qubits lie in different fragments as virtual.
fn tag_crossing_gates(circuit: &Circuit, fragment_of: &[usize]) -> CutResult<(Circuit, usize)> {
    let mut tagged = Circuit::with_size(
        circuit.name(),
        circuit.num_qubits() as u32,
        circuit.num_clbits() as u32,
    );
    let mut gate_cuts = 0;
    for inst in circuit.instructions() {
        match inst.kind {
            InstructionKind::Gate(gate)
                if inst.qubits.len() == 2
                    && fragment_of[inst.qubits[0].index()] != fragment_of[inst.qubits[1].index()] =>
            {
                VirtualGate::from_standard(&gate)?;
                tagged.virtual_gate(gate, inst.qubits[0], inst.qubits[1])?;
                gate_cuts += 1;
            }
            _ => {
                tagged.push(inst.clone())?;
            }
        }
    }
    Ok((tagged, gate_cuts))
}

/// Virtual operations in circuit order with their auxiliary bits.
fn collect_virtual_ops(circuit: &Circuit, fragment_of: &[usize]) -> CutResult<Vec<VirtualOperation>> {
    let num_clbits = circuit.num_clbits();
    let instructions = circuit.instructions();
    let mut ops = vec![];

    for (position, inst) in instructions.iter().enumerate() {
        let InstructionKind::Virtual(gate) = inst.kind else {
            continue;
        };
        let gate = VirtualGate::from_standard(&gate)?;
        let qubits = [inst.qubits[0], inst.qubits[1]];

        if gate == VirtualGate::Move {
            let touches = |q: QubitId, i: &qknit_ir::Instruction| {
                !matches!(i.kind, InstructionKind::Barrier) && i.qubits.contains(&q)
            };
            if instructions[..position].iter().any(|i| touches(qubits[1], i)) {
                return Err(CutError::InvalidCircuit(format!(
                    "virtual move at {position} targets qubit {} which is already in use",
                    qubits[1]
                )));
            }
            if instructions[position + 1..].iter().any(|i| touches(qubits[0], i)) {
                return Err(CutError::InvalidCircuit(format!(
                    "virtual move at {position} leaves qubit {} in use afterwards",
                    qubits[0]
                )));
            }
        }

        let j = ops.len();
        ops.push(VirtualOperation {
            gate,
            qubits,
            fragments: qubits.map(|q| fragment_of[q.index()]),
            position,
            aux_bits: [num_clbits + 2 * j, num_clbits + 2 * j + 1],
        });
    }
    Ok(ops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qknit_ir::ClbitId;

    fn chain(n: u32) -> Circuit {
        let mut circuit = Circuit::with_size("chain", n, n);
        for i in 0..n {
            circuit.h(QubitId(i)).unwrap();
        }
        for i in 0..n - 1 {
            circuit.cz(QubitId(i), QubitId(i + 1)).unwrap();
        }
        circuit.measure_all().unwrap();
        circuit
    }

    #[test]
    fn test_lower_wire_cuts() {
        let mut circuit = Circuit::with_size("wire", 2, 2);
        circuit
            .h(QubitId(0))
            .unwrap()
            .wire_cut(QubitId(0))
            .unwrap()
            .cx(QubitId(0), QubitId(1))
            .unwrap()
            .measure(QubitId(0), ClbitId(0))
            .unwrap();

        let lowered = lower_wire_cuts(&circuit).unwrap();
        assert_eq!(lowered.moves, 1);
        assert_eq!(lowered.circuit.num_qubits(), 3);
        assert_eq!(lowered.origin, vec![QubitId(0), QubitId(1), QubitId(0)]);

        let insts = lowered.circuit.instructions();
        assert_eq!(insts[1].kind, InstructionKind::Virtual(StandardGate::Move));
        assert_eq!(insts[1].qubits, vec![QubitId(0), QubitId(2)]);
        assert_eq!(insts[2].qubits, vec![QubitId(2), QubitId(1)]);
        assert_eq!(insts[3].qubits, vec![QubitId(2)]);
    }

    #[test]
    fn test_bisection_plan() {
        let config = CutConfig::default().with_max_fragment_size(2);
        let plan = Partitioner::new(&config).plan(&chain(4)).unwrap();

        assert_eq!(plan.num_fragments(), 2);
        assert_eq!(plan.fragments[0].qubits, vec![QubitId(0), QubitId(1)]);
        assert_eq!(plan.fragments[1].qubits, vec![QubitId(2), QubitId(3)]);
        assert_eq!(plan.gate_cuts, 1);
        assert_eq!(plan.sampling_overhead(), Some(6));

        let op = &plan.virtual_ops[0];
        assert_eq!(op.gate, VirtualGate::CZ);
        assert_eq!(op.fragments, [0, 1]);
        assert_eq!(op.aux_bits, [4, 5]);
    }

    #[test]
    fn test_user_cuts_are_free() {
        let mut circuit = chain(2);
        circuit
            .virtual_gate(StandardGate::RZZ(0.4), QubitId(0), QubitId(1))
            .unwrap();
        let config = CutConfig::default()
            .with_max_fragment_size(2)
            .with_max_gate_cuts(0);
        let plan = Partitioner::new(&config).plan(&circuit).unwrap();
        assert_eq!(plan.num_fragments(), 1);
        assert_eq!(plan.gate_cuts, 0);
        assert_eq!(plan.num_virtual_ops(), 1);
        assert!(!plan.virtual_ops[0].crosses_fragments());
    }

    #[test]
    fn test_infeasible_without_cuts() {
        let config = CutConfig::default()
            .with_max_fragment_size(1)
            .with_max_gate_cuts(0);
        let err = Partitioner::new(&config)
            .plan(&Circuit::bell().unwrap())
            .unwrap_err();
        assert!(matches!(err, CutError::InfeasiblePartition(_)));
    }

    #[test]
    fn test_unsupported_crossing_gate() {
        let mut circuit = Circuit::with_size("swap", 2, 0);
        circuit.swap(QubitId(0), QubitId(1)).unwrap();
        let config = CutConfig::default().with_max_fragment_size(1);
        let err = Partitioner::new(&config).plan(&circuit).unwrap_err();
        assert!(matches!(err, CutError::UnsupportedGateKind { gate } if gate == "swap"));
    }

    #[test]
    fn test_optimal_wire_cut() {
        let config = CutConfig::default()
            .with_technique(Technique::Optimal)
            .with_max_fragment_size(2)
            .with_max_gate_cuts(0)
            .with_max_wire_cuts(1);
        let plan = Partitioner::new(&config).plan(&chain(3)).unwrap();

        assert_eq!(plan.wire_cuts, 1);
        assert_eq!(plan.gate_cuts, 0);
        assert_eq!(plan.circuit.num_qubits(), 4);
        assert_eq!(plan.qubit_origin[3], QubitId(1));
        assert_eq!(plan.fragments[0].qubits, vec![QubitId(0), QubitId(1)]);
        assert_eq!(plan.fragments[1].qubits, vec![QubitId(2), QubitId(3)]);

        let op = &plan.virtual_ops[0];
        assert_eq!(op.gate, VirtualGate::Move);
        assert_eq!(op.qubits, [QubitId(1), QubitId(3)]);
        assert_eq!(op.fragments, [0, 1]);
    }

    #[test]
    fn test_metis_picks_cheapest_count() {
        let config = CutConfig::default()
            .with_technique(Technique::Metis)
            .with_max_fragment_size(2);
        let plan = Partitioner::new(&config).plan(&chain(6)).unwrap();
        assert_eq!(plan.num_fragments(), 3);
        assert_eq!(plan.gate_cuts, 2);
    }

    #[test]
    fn test_shared_clbit_across_fragments() {
        let mut circuit = Circuit::with_size("clash", 2, 1);
        circuit
            .measure(QubitId(0), ClbitId(0))
            .unwrap()
            .measure(QubitId(1), ClbitId(0))
            .unwrap();
        let config = CutConfig::default().with_max_fragment_size(1);
        let err = Partitioner::new(&config).plan(&circuit).unwrap_err();
        assert!(matches!(err, CutError::InvalidCircuit(_)));
    }

    #[test]
    fn test_misplaced_virtual_move() {
        let mut circuit = Circuit::with_size("move", 2, 0);
        circuit
            .h(QubitId(1))
            .unwrap()
            .virtual_gate(StandardGate::Move, QubitId(0), QubitId(1))
            .unwrap();
        let config = CutConfig::default();
        let err = Partitioner::new(&config).plan(&circuit).unwrap_err();
        assert!(matches!(err, CutError::InvalidCircuit(_)));
    }
}
