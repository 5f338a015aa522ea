//! Circuit instructions combining operations with operands.

use serde::{Deserialize, Serialize};

use crate::gate::StandardGate;
use crate::qubit::{ClbitId, QubitId};

/// The kind of instruction in a circuit.
///
/// Cut markers are explicit variants so every consumer has to decide what
/// to do with them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InstructionKind {
    /// A quantum gate operation.
    Gate(StandardGate),
    /// Measurement of each qubit into the matching classical bit.
    Measure,
    /// Reset qubit to |0⟩.
    Reset,
    /// Barrier (no semantic effect).
    Barrier,
    /// A two-qubit gate that must be replaced by its quasi-probability
    /// decomposition.
    Virtual(StandardGate),
    /// Request to cut the qubit wire at this point.
    WireCut,
}

/// A complete instruction with operands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// The kind of instruction.
    pub kind: InstructionKind,
    /// Qubits this instruction operates on.
    pub qubits: Vec<QubitId>,
    /// Classical bits this instruction writes (measurements only).
    pub clbits: Vec<ClbitId>,
}

impl Instruction {
    /// Create a gate instruction.
    pub fn gate(gate: StandardGate, qubits: impl IntoIterator<Item = QubitId>) -> Self {
        Self {
            kind: InstructionKind::Gate(gate),
            qubits: qubits.into_iter().collect(),
            clbits: vec![],
        }
    }

    /// Create a single-qubit gate instruction.
    pub fn single_qubit_gate(gate: StandardGate, qubit: QubitId) -> Self {
        Self::gate(gate, [qubit])
    }

    /// Create a two-qubit gate instruction.
    pub fn two_qubit_gate(gate: StandardGate, q1: QubitId, q2: QubitId) -> Self {
        Self::gate(gate, [q1, q2])
    }

    /// Create a measurement instruction.
    pub fn measure(qubit: QubitId, clbit: ClbitId) -> Self {
        Self {
            kind: InstructionKind::Measure,
            qubits: vec![qubit],
            clbits: vec![clbit],
        }
    }

    /// Create a reset instruction.
    pub fn reset(qubit: QubitId) -> Self {
        Self {
            kind: InstructionKind::Reset,
            qubits: vec![qubit],
            clbits: vec![],
        }
    }

    /// Create a barrier instruction.
    pub fn barrier(qubits: impl IntoIterator<Item = QubitId>) -> Self {
        Self {
            kind: InstructionKind::Barrier,
            qubits: qubits.into_iter().collect(),
            clbits: vec![],
        }
    }

    /// Mark a two-qubit gate for virtualisation.
    pub fn virtual_gate(gate: StandardGate, q1: QubitId, q2: QubitId) -> Self {
        Self {
            kind: InstructionKind::Virtual(gate),
            qubits: vec![q1, q2],
            clbits: vec![],
        }
    }

    /// Create a wire cut marker.
    pub fn wire_cut(qubit: QubitId) -> Self {
        Self {
            kind: InstructionKind::WireCut,
            qubits: vec![qubit],
            clbits: vec![],
        }
    }

    /// Check if this is a gate instruction.
    pub fn is_gate(&self) -> bool {
        matches!(self.kind, InstructionKind::Gate(_))
    }

    /// Check if this is a measurement.
    pub fn is_measure(&self) -> bool {
        matches!(self.kind, InstructionKind::Measure)
    }

    /// Check if this instruction is tagged for virtualisation.
    pub fn is_virtual(&self) -> bool {
        matches!(self.kind, InstructionKind::Virtual(_))
    }

    /// Check if this is a wire cut marker.
    pub fn is_wire_cut(&self) -> bool {
        matches!(self.kind, InstructionKind::WireCut)
    }

    /// A non-virtual gate acting on two qubits: an edge of the interaction graph.
    pub fn is_two_qubit_gate(&self) -> bool {
        matches!(self.kind, InstructionKind::Gate(g) if g.num_qubits() == 2)
    }

    /// Get the gate if this is a gate or a virtualised gate.
    pub fn as_gate(&self) -> Option<&StandardGate> {
        match &self.kind {
            InstructionKind::Gate(g) | InstructionKind::Virtual(g) => Some(g),
            _ => None,
        }
    }

    /// Get the name of the instruction.
    pub fn name(&self) -> &str {
        match &self.kind {
            InstructionKind::Gate(g) | InstructionKind::Virtual(g) => g.name(),
            InstructionKind::Measure => "measure",
            InstructionKind::Reset => "reset",
            InstructionKind::Barrier => "barrier",
            InstructionKind::WireCut => "wire_cut",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_instruction() {
        let inst = Instruction::single_qubit_gate(StandardGate::H, QubitId(0));
        assert!(inst.is_gate());
        assert!(!inst.is_two_qubit_gate());
        assert_eq!(inst.name(), "h");
    }

    #[test]
    fn test_two_qubit_gate_instruction() {
        let inst = Instruction::two_qubit_gate(StandardGate::CZ, QubitId(0), QubitId(1));
        assert!(inst.is_two_qubit_gate());
        assert_eq!(inst.qubits, vec![QubitId(0), QubitId(1)]);
    }

    #[test]
    fn test_cut_markers() {
        let inst = Instruction::virtual_gate(StandardGate::CX, QubitId(0), QubitId(1));
        assert!(inst.is_virtual());
        assert!(!inst.is_two_qubit_gate());
        assert_eq!(inst.as_gate(), Some(&StandardGate::CX));
        assert_eq!(inst.name(), "cx");

        let cut = Instruction::wire_cut(QubitId(2));
        assert!(cut.is_wire_cut());
        assert_eq!(cut.name(), "wire_cut");
        assert!(cut.as_gate().is_none());
    }

    #[test]
    fn test_measure_instruction() {
        let inst = Instruction::measure(QubitId(0), ClbitId(0));
        assert!(inst.is_measure());
        assert_eq!(inst.clbits.len(), 1);
    }
}
