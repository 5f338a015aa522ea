//! The result of partitioning: a lowered circuit and its fragments.

use serde::{Deserialize, Serialize};

use qknit_ir::{Circuit, QubitId};

use crate::virtual_gate::VirtualOperation;

/// A set of lowered qubits executed together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    /// Fragment index.
    pub index: usize,
    /// Lowered qubits, sorted.
    pub qubits: Vec<QubitId>,
}

impl Fragment {
    /// Number of qubits.
    pub fn size(&self) -> usize {
        self.qubits.len()
    }

    /// Whether the fragment owns `qubit`.
    pub fn contains(&self, qubit: QubitId) -> bool {
        self.qubits.binary_search(&qubit).is_ok()
    }
}

/// An immutable cutting plan.
///
/// The lowered circuit has every wire cut replaced by a virtual `move`
/// onto a fresh qubit and every gate crossing a fragment boundary marked
/// virtual. Virtual operations are listed in circuit order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionPlan {
    /// The lowered circuit.
    pub circuit: Circuit,
    /// Fragments, ordered by their smallest qubit.
    pub fragments: Vec<Fragment>,
    /// Virtual operations in circuit order.
    pub virtual_ops: Vec<VirtualOperation>,
    /// Gates the partitioner virtualised.
    pub gate_cuts: usize,
    /// Wires the partitioner cut.
    pub wire_cuts: usize,
    /// Original qubit of every lowered qubit.
    pub qubit_origin: Vec<QubitId>,
    /// Classical bits of the original circuit.
    pub num_clbits: usize,
}

impl PartitionPlan {
    /// Number of fragments.
    pub fn num_fragments(&self) -> usize {
        self.fragments.len()
    }

    /// Number of virtual operations.
    pub fn num_virtual_ops(&self) -> usize {
        self.virtual_ops.len()
    }

    /// Fragment owning a lowered qubit.
    pub fn fragment_of(&self, qubit: QubitId) -> Option<usize> {
        self.fragments.iter().position(|f| f.contains(qubit))
    }

    /// Indices of the virtual operations with a side in `fragment`.
    pub fn ops_touching(&self, fragment: usize) -> Vec<usize> {
        self.virtual_ops
            .iter()
            .enumerate()
            .filter(|(_, op)| op.fragments.contains(&fragment))
            .map(|(j, _)| j)
            .collect()
    }

    /// Number of global instantiation labels, `None` on overflow.
    pub fn sampling_overhead(&self) -> Option<usize> {
        self.virtual_ops
            .iter()
            .try_fold(1usize, |acc, op| acc.checked_mul(op.num_instantiations()))
    }

    /// Bits in a packed outcome: original clbits plus two per virtual op.
    pub fn outcome_bits(&self) -> usize {
        self.num_clbits + 2 * self.virtual_ops.len()
    }
}
