//! Enumeration of instantiation labels and fragment circuits.
//!
//! A *global label* picks one instantiation for every virtual operation.
//! Labels are enumerated in mixed radix with the first operation of the
//! fold order varying fastest, which lets the knitting engine fold each
//! operation over contiguous chunks.
//!
//! A fragment only sees the operations touching it, so many global labels
//! share a *local label* and the same fragment circuit.

use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use tracing::debug;

use qknit_ir::{Circuit, ClbitId, Instruction, InstructionKind, QubitId};

use crate::error::{CutError, CutResult};
use crate::plan::PartitionPlan;
use crate::pool::WorkerPool;
use crate::virtual_gate::LocalOp;

/// One instantiation index per virtual operation.
pub type GlobalLabel = Vec<usize>;

/// A global label restricted to one fragment; `None` for operations that
/// do not touch it.
pub type LocalLabel = Vec<Option<usize>>;

/// Every circuit a fragment has to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentBatch {
    /// Fragment index.
    pub fragment: usize,
    /// Local labels, one per circuit.
    pub labels: Vec<LocalLabel>,
    /// Fragment circuits, in label order.
    pub circuits: Vec<Circuit>,
    /// Global outcome bit of every local classical bit.
    pub clbit_map: Vec<usize>,
}

/// Local numbering of one fragment.
#[derive(Debug, Clone)]
struct FragmentLayout {
    /// Local index of every lowered qubit in the fragment.
    qubits: FxHashMap<QubitId, QubitId>,
    /// Local index of every global outcome bit written by the fragment.
    clbits: FxHashMap<usize, ClbitId>,
    /// Global outcome bit of every local classical bit.
    clbit_map: Vec<usize>,
    /// Virtual operations touching the fragment.
    ops: Vec<usize>,
}

/// Generates labels and fragment circuits for a plan.
#[derive(Debug)]
pub struct InstantiationGenerator<'a> {
    plan: &'a PartitionPlan,
    fold_order: Vec<usize>,
    overhead: usize,
    layouts: Vec<FragmentLayout>,
    /// Virtual operation at each instruction position.
    op_at: FxHashMap<usize, usize>,
}

impl<'a> InstantiationGenerator<'a> {
    /// Prepare generation for `plan`, enumerating labels in `fold_order`.
    pub fn new(plan: &'a PartitionPlan, fold_order: Vec<usize>) -> CutResult<Self> {
        let num_ops = plan.num_virtual_ops();
        let mut sorted = fold_order.clone();
        sorted.sort_unstable();
        if sorted != (0..num_ops).collect::<Vec<_>>() {
            return Err(CutError::InstantiationMismatch {
                expected: num_ops,
                got: fold_order.len(),
                context: "fold order (must be a permutation of the virtual operations)".into(),
            });
        }

        let bits = plan.outcome_bits();
        if bits > 64 {
            return Err(CutError::OutcomeOverflow { bits });
        }
        let overhead = plan.sampling_overhead().ok_or_else(|| {
            CutError::InvalidCircuit(format!(
                "sampling overhead of {num_ops} virtual operations overflows"
            ))
        })?;

        let layouts = (0..plan.num_fragments())
            .map(|f| layout(plan, f))
            .collect();
        let op_at = plan
            .virtual_ops
            .iter()
            .enumerate()
            .map(|(j, op)| (op.position, j))
            .collect();

        Ok(Self {
            plan,
            fold_order,
            overhead,
            layouts,
            op_at,
        })
    }

    /// The plan being instantiated.
    pub fn plan(&self) -> &'a PartitionPlan {
        self.plan
    }

    /// Fold order the labels are enumerated in.
    pub fn fold_order(&self) -> &[usize] {
        &self.fold_order
    }

    /// Number of global labels, `Π Nⱼ`.
    pub fn overhead(&self) -> usize {
        self.overhead
    }

    /// Global outcome bit of every local classical bit of `fragment`.
    pub fn clbit_map(&self, fragment: usize) -> &[usize] {
        &self.layouts[fragment].clbit_map
    }

    /// The `index`-th global label.
    pub fn global_label(&self, index: usize) -> GlobalLabel {
        let mut label = vec![0; self.plan.num_virtual_ops()];
        let mut rest = index;
        for &j in &self.fold_order {
            let n = self.plan.virtual_ops[j].num_instantiations();
            label[j] = rest % n;
            rest /= n;
        }
        label
    }

    /// All global labels in fold order.
    pub fn global_labels(&self) -> Vec<GlobalLabel> {
        (0..self.overhead).map(|i| self.global_label(i)).collect()
    }

    /// Restrict a global label to `fragment`.
    pub fn project(&self, label: &[usize], fragment: usize) -> LocalLabel {
        let ops = &self.layouts[fragment].ops;
        label
            .iter()
            .enumerate()
            .map(|(j, &i)| ops.binary_search(&j).ok().map(|_| i))
            .collect()
    }

    /// Distinct local labels of `fragment`, in order of first appearance.
    pub fn local_labels(&self, fragment: usize) -> Vec<LocalLabel> {
        let mut seen: FxHashSet<LocalLabel> = FxHashSet::default();
        let mut labels = vec![];
        for i in 0..self.overhead {
            let local = self.project(&self.global_label(i), fragment);
            if seen.insert(local.clone()) {
                labels.push(local);
            }
        }
        labels
    }

    /// Build the circuit `fragment` runs for `label`.
    ///
    /// Qubits and classical bits are renumbered locally; every side of a
    /// virtual operation in the fragment is replaced by its half of the
    /// chosen instantiation, with measurements written to the side's
    /// auxiliary bit.
    pub fn instantiate_fragment(&self, fragment: usize, label: &[Option<usize>]) -> CutResult<Circuit> {
        let layout = self.layouts.get(fragment).ok_or_else(|| {
            CutError::InvalidCircuit(format!("no fragment {fragment} in plan"))
        })?;
        if label.len() != self.plan.num_virtual_ops() {
            return Err(CutError::InstantiationMismatch {
                expected: self.plan.num_virtual_ops(),
                got: label.len(),
                context: format!("label length for fragment {fragment}"),
            });
        }

        let mut circuit = Circuit::with_size(
            format!("{}_f{fragment}", self.plan.circuit.name()),
            layout.qubits.len() as u32,
            layout.clbit_map.len() as u32,
        );

        for (position, inst) in self.plan.circuit.instructions().iter().enumerate() {
            if let Some(&j) = self.op_at.get(&position) {
                let op = &self.plan.virtual_ops[j];
                if !op.fragments.contains(&fragment) {
                    continue;
                }
                let index = label[j].ok_or_else(|| CutError::InstantiationMismatch {
                    expected: self.plan.num_virtual_ops(),
                    got: label.iter().filter(|l| l.is_some()).count(),
                    context: format!("label of fragment {fragment} misses virtual operation {j}"),
                })?;
                let instantiation = op.instantiate(index)?;
                for side in 0..2 {
                    if op.fragments[side] != fragment {
                        continue;
                    }
                    let qubit = layout.qubits[&op.qubits[side]];
                    for step in &instantiation.sides[side] {
                        match *step {
                            LocalOp::Gate(gate) => {
                                circuit.push(Instruction::single_qubit_gate(gate, qubit))?;
                            }
                            LocalOp::Measure => {
                                let clbit = layout.clbits[&op.aux_bits[side]];
                                circuit.measure(qubit, clbit)?;
                            }
                        }
                    }
                }
                continue;
            }

            if matches!(inst.kind, InstructionKind::Barrier) {
                let local: Vec<QubitId> = inst
                    .qubits
                    .iter()
                    .filter_map(|q| layout.qubits.get(q).copied())
                    .collect();
                if !local.is_empty() {
                    circuit.barrier(local)?;
                }
                continue;
            }

            let local: Vec<QubitId> = inst
                .qubits
                .iter()
                .filter_map(|q| layout.qubits.get(q).copied())
                .collect();
            if local.is_empty() {
                continue;
            }
            if local.len() != inst.qubits.len() {
                return Err(CutError::InvalidCircuit(format!(
                    "instruction {position} ('{}') crosses fragment {fragment}",
                    inst.name()
                )));
            }
            let clbits = inst
                .clbits
                .iter()
                .map(|c| layout.clbits[&c.index()])
                .collect();
            circuit.push(Instruction {
                kind: inst.kind,
                qubits: local,
                clbits,
            })?;
        }
        Ok(circuit)
    }

    /// Every fragment's circuits, generated on the worker pool.
    pub fn fragment_circuits(&self, pool: &WorkerPool) -> CutResult<Vec<FragmentBatch>> {
        (0..self.plan.num_fragments())
            .map(|fragment| {
                let labels = self.local_labels(fragment);
                let circuits = pool.install(|| {
                    labels
                        .par_iter()
                        .map(|label| self.instantiate_fragment(fragment, label))
                        .collect::<CutResult<Vec<_>>>()
                })?;
                debug!(
                    "Fragment {fragment}: {} circuits on {} qubits",
                    circuits.len(),
                    self.plan.fragments[fragment].size()
                );
                Ok(FragmentBatch {
                    fragment,
                    labels,
                    circuits,
                    clbit_map: self.layouts[fragment].clbit_map.clone(),
                })
            })
            .collect()
    }
}

fn layout(plan: &PartitionPlan, fragment: usize) -> FragmentLayout {
    let members = &plan.fragments[fragment].qubits;
    let qubits: FxHashMap<QubitId, QubitId> = members
        .iter()
        .enumerate()
        .map(|(i, &q)| (q, QubitId(i as u32)))
        .collect();

    let mut measured: Vec<usize> = plan
        .circuit
        .instructions()
        .iter()
        .filter(|i| i.is_measure() && qubits.contains_key(&i.qubits[0]))
        .map(|i| i.clbits[0].index())
        .collect();
    measured.sort_unstable();
    measured.dedup();

    let ops = plan.ops_touching(fragment);
    let mut clbit_map = measured;
    for &j in &ops {
        let op = &plan.virtual_ops[j];
        for side in 0..2 {
            if op.fragments[side] == fragment {
                clbit_map.push(op.aux_bits[side]);
            }
        }
    }
    let clbits = clbit_map
        .iter()
        .enumerate()
        .map(|(i, &bit)| (bit, ClbitId(i as u32)))
        .collect();

    FragmentLayout {
        qubits,
        clbits,
        clbit_map,
        ops,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CutConfig;
    use crate::partition::Partitioner;
    use qknit_ir::StandardGate;

    /// Two CZ cuts between {0, 1} and {2, 3}, one RZZ cut between {2, 3}
    /// and {4}.
    fn three_fragment_plan() -> PartitionPlan {
        let mut circuit = Circuit::with_size("three", 5, 5);
        circuit
            .h(QubitId(1))
            .unwrap()
            .virtual_gate(StandardGate::CZ, QubitId(1), QubitId(2))
            .unwrap()
            .cx(QubitId(0), QubitId(1))
            .unwrap()
            .cx(QubitId(2), QubitId(3))
            .unwrap()
            .virtual_gate(StandardGate::CZ, QubitId(0), QubitId(3))
            .unwrap()
            .virtual_gate(StandardGate::RZZ(0.3), QubitId(3), QubitId(4))
            .unwrap()
            .measure_all()
            .unwrap();
        let config = CutConfig::default().with_max_fragment_size(2);
        Partitioner::new(&config).plan(&circuit).unwrap()
    }

    #[test]
    fn test_mixed_radix_labels() {
        let plan = three_fragment_plan();
        assert_eq!(plan.num_fragments(), 3);
        let generator = InstantiationGenerator::new(&plan, vec![2, 0, 1]).unwrap();
        assert_eq!(generator.overhead(), 216);

        let labels = generator.global_labels();
        assert_eq!(labels.len(), 216);
        assert_eq!(labels[0], vec![0, 0, 0]);
        assert_eq!(labels[1], vec![0, 0, 1]);
        assert_eq!(labels[6], vec![1, 0, 0]);
        assert_eq!(labels[36], vec![0, 1, 0]);
    }

    #[test]
    fn test_local_labels_deduplicate() {
        let plan = three_fragment_plan();
        let generator = InstantiationGenerator::new(&plan, vec![0, 1, 2]).unwrap();

        // Fragment {0, 1} sees the two CZs, fragment {4} only the RZZ.
        assert_eq!(generator.local_labels(0).len(), 36);
        assert_eq!(generator.local_labels(1).len(), 216);
        let last = generator.local_labels(2);
        assert_eq!(last.len(), 6);
        assert_eq!(last[1], vec![None, None, Some(1)]);
    }

    #[test]
    fn test_fragment_circuit_layout() {
        let plan = three_fragment_plan();
        let generator = InstantiationGenerator::new(&plan, vec![0, 1, 2]).unwrap();

        // Original clbits first, then one aux bit per side.
        assert_eq!(generator.clbit_map(0), &[0, 1, 5, 7][..]);
        assert_eq!(generator.clbit_map(2), &[4, 10][..]);

        // CZ term 2 measures side 0.
        let circuit = generator
            .instantiate_fragment(0, &[Some(2), Some(0), None])
            .unwrap();
        assert_eq!(circuit.num_qubits(), 2);
        assert_eq!(circuit.num_clbits(), 4);
        let aux_measure = circuit
            .instructions()
            .iter()
            .find(|i| i.is_measure() && i.clbits[0] == ClbitId(2))
            .unwrap();
        assert_eq!(aux_measure.qubits, vec![QubitId(1)]);
        assert!(circuit.instructions().iter().all(|i| !i.is_virtual()));
    }

    #[test]
    fn test_wrong_label_length() {
        let plan = three_fragment_plan();
        let generator = InstantiationGenerator::new(&plan, vec![0, 1, 2]).unwrap();
        let err = generator.instantiate_fragment(0, &[Some(0)]).unwrap_err();
        assert!(matches!(err, CutError::InstantiationMismatch { .. }));
    }

    #[test]
    fn test_rejects_bad_fold_order() {
        let plan = three_fragment_plan();
        assert!(InstantiationGenerator::new(&plan, vec![0, 0, 1]).is_err());
        assert!(InstantiationGenerator::new(&plan, vec![0, 1]).is_err());
    }

    #[test]
    fn test_batches_cover_every_fragment() {
        let plan = three_fragment_plan();
        let generator = InstantiationGenerator::new(&plan, vec![0, 1, 2]).unwrap();
        let pool = WorkerPool::new(Some(2)).unwrap();
        let batches = generator.fragment_circuits(&pool).unwrap();
        let sizes: Vec<usize> = batches.iter().map(|b| b.circuits.len()).collect();
        assert_eq!(sizes, vec![36, 216, 6]);
        assert!(batches.iter().all(|b| b.labels.len() == b.circuits.len()));
    }
}
