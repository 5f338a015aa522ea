//! High-level circuit builder API.

use serde::{Deserialize, Serialize};

use crate::error::{IrError, IrResult};
use crate::gate::StandardGate;
use crate::instruction::{Instruction, InstructionKind};
use crate::qubit::{ClbitId, QubitId};

/// A quantum circuit.
///
/// Instructions are kept in program order. Every instruction is validated
/// against the circuit's qubit and classical bit counts when it is pushed,
/// so consumers can index operands without re-checking them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circuit {
    /// Name of the circuit.
    name: String,
    /// Number of qubits.
    num_qubits: u32,
    /// Number of classical bits.
    num_clbits: u32,
    /// Instructions in program order.
    instructions: Vec<Instruction>,
}

impl Circuit {
    /// Create a new empty circuit.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            num_qubits: 0,
            num_clbits: 0,
            instructions: vec![],
        }
    }

    /// Create a circuit with a given number of qubits and classical bits.
    pub fn with_size(name: impl Into<String>, num_qubits: u32, num_clbits: u32) -> Self {
        Self {
            name: name.into(),
            num_qubits,
            num_clbits,
            instructions: vec![],
        }
    }

    /// Add a single qubit to the circuit.
    pub fn add_qubit(&mut self) -> QubitId {
        let id = QubitId(self.num_qubits);
        self.num_qubits += 1;
        id
    }

    /// Add a single classical bit to the circuit.
    pub fn add_clbit(&mut self) -> ClbitId {
        let id = ClbitId(self.num_clbits);
        self.num_clbits += 1;
        id
    }

    /// Rename the circuit.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Append an instruction after validating its operands.
    pub fn push(&mut self, instruction: Instruction) -> IrResult<&mut Self> {
        self.validate(&instruction)?;
        self.instructions.push(instruction);
        Ok(self)
    }

    fn validate(&self, inst: &Instruction) -> IrResult<()> {
        let gate_name = Some(inst.name().to_string());
        for (i, q) in inst.qubits.iter().enumerate() {
            if q.0 >= self.num_qubits {
                return Err(IrError::QubitNotFound {
                    qubit: *q,
                    gate_name,
                });
            }
            if inst.qubits[..i].contains(q) {
                return Err(IrError::DuplicateQubit {
                    qubit: *q,
                    gate_name,
                });
            }
        }
        for c in &inst.clbits {
            if c.0 >= self.num_clbits {
                return Err(IrError::ClbitNotFound { clbit: *c });
            }
        }

        match inst.kind {
            InstructionKind::Gate(g) | InstructionKind::Virtual(g) => {
                let got = inst.qubits.len() as u32;
                if got != g.num_qubits() {
                    return Err(IrError::QubitCountMismatch {
                        gate_name: g.name().to_string(),
                        expected: g.num_qubits(),
                        got,
                    });
                }
                if !g.has_finite_parameters() {
                    return Err(IrError::NonFiniteParameter {
                        gate_name: g.name().to_string(),
                    });
                }
                if inst.is_virtual() && g.num_qubits() != 2 {
                    return Err(IrError::NotVirtualizable(g.name().to_string()));
                }
            }
            InstructionKind::Measure => {
                if inst.qubits.len() != 1 || inst.clbits.len() != 1 {
                    return Err(IrError::MeasureArity {
                        qubits: inst.qubits.len(),
                        clbits: inst.clbits.len(),
                    });
                }
            }
            InstructionKind::Reset | InstructionKind::WireCut => {
                if inst.qubits.len() != 1 {
                    return Err(IrError::QubitCountMismatch {
                        gate_name: inst.name().to_string(),
                        expected: 1,
                        got: inst.qubits.len() as u32,
                    });
                }
            }
            InstructionKind::Barrier => {}
        }
        Ok(())
    }

    fn apply_gate(&mut self, gate: StandardGate, qubits: &[QubitId]) -> IrResult<&mut Self> {
        self.push(Instruction::gate(gate, qubits.iter().copied()))
    }

    // =========================================================================
    // Single-qubit gates
    // =========================================================================

    /// Apply identity gate.
    pub fn id(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_gate(StandardGate::I, &[qubit])
    }

    /// Apply Hadamard gate.
    pub fn h(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_gate(StandardGate::H, &[qubit])
    }

    /// Apply Pauli-X gate.
    pub fn x(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_gate(StandardGate::X, &[qubit])
    }

    /// Apply Pauli-Y gate.
    pub fn y(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_gate(StandardGate::Y, &[qubit])
    }

    /// Apply Pauli-Z gate.
    pub fn z(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_gate(StandardGate::Z, &[qubit])
    }

    /// Apply S gate.
    pub fn s(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_gate(StandardGate::S, &[qubit])
    }

    /// Apply S-dagger gate.
    pub fn sdg(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_gate(StandardGate::Sdg, &[qubit])
    }

    /// Apply T gate.
    pub fn t(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_gate(StandardGate::T, &[qubit])
    }

    /// Apply T-dagger gate.
    pub fn tdg(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_gate(StandardGate::Tdg, &[qubit])
    }

    /// Apply sqrt(X) gate.
    pub fn sx(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_gate(StandardGate::SX, &[qubit])
    }

    /// Apply sqrt(X)-dagger gate.
    pub fn sxdg(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_gate(StandardGate::SXdg, &[qubit])
    }

    /// Apply Rx rotation gate.
    pub fn rx(&mut self, theta: f64, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_gate(StandardGate::Rx(theta), &[qubit])
    }

    /// Apply Ry rotation gate.
    pub fn ry(&mut self, theta: f64, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_gate(StandardGate::Ry(theta), &[qubit])
    }

    /// Apply Rz rotation gate.
    pub fn rz(&mut self, theta: f64, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_gate(StandardGate::Rz(theta), &[qubit])
    }

    /// Apply phase gate.
    pub fn p(&mut self, theta: f64, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_gate(StandardGate::P(theta), &[qubit])
    }

    /// Apply universal U gate.
    pub fn u(&mut self, theta: f64, phi: f64, lambda: f64, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply_gate(StandardGate::U(theta, phi, lambda), &[qubit])
    }

    // =========================================================================
    // Two-qubit gates
    // =========================================================================

    /// Apply CNOT (CX) gate.
    pub fn cx(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.apply_gate(StandardGate::CX, &[control, target])
    }

    /// Apply CY gate.
    pub fn cy(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.apply_gate(StandardGate::CY, &[control, target])
    }

    /// Apply CZ gate.
    pub fn cz(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.apply_gate(StandardGate::CZ, &[control, target])
    }

    /// Apply controlled-Hadamard gate.
    pub fn ch(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.apply_gate(StandardGate::CH, &[control, target])
    }

    /// Apply SWAP gate.
    pub fn swap(&mut self, q1: QubitId, q2: QubitId) -> IrResult<&mut Self> {
        self.apply_gate(StandardGate::Swap, &[q1, q2])
    }

    /// Apply iSWAP gate.
    pub fn iswap(&mut self, q1: QubitId, q2: QubitId) -> IrResult<&mut Self> {
        self.apply_gate(StandardGate::ISwap, &[q1, q2])
    }

    /// Apply controlled phase gate.
    pub fn cp(&mut self, theta: f64, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.apply_gate(StandardGate::CP(theta), &[control, target])
    }

    /// Apply controlled Rz gate.
    pub fn crz(&mut self, theta: f64, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.apply_gate(StandardGate::CRz(theta), &[control, target])
    }

    /// Apply RXX gate.
    pub fn rxx(&mut self, theta: f64, q1: QubitId, q2: QubitId) -> IrResult<&mut Self> {
        self.apply_gate(StandardGate::RXX(theta), &[q1, q2])
    }

    /// Apply RYY gate.
    pub fn ryy(&mut self, theta: f64, q1: QubitId, q2: QubitId) -> IrResult<&mut Self> {
        self.apply_gate(StandardGate::RYY(theta), &[q1, q2])
    }

    /// Apply RZZ gate.
    pub fn rzz(&mut self, theta: f64, q1: QubitId, q2: QubitId) -> IrResult<&mut Self> {
        self.apply_gate(StandardGate::RZZ(theta), &[q1, q2])
    }

    /// Move the state of `src` onto the unused qubit `dst`.
    pub fn move_qubit(&mut self, src: QubitId, dst: QubitId) -> IrResult<&mut Self> {
        self.apply_gate(StandardGate::Move, &[src, dst])
    }

    // =========================================================================
    // Cut markers
    // =========================================================================

    /// Apply a two-qubit gate marked for virtualisation.
    pub fn virtual_gate(&mut self, gate: StandardGate, q1: QubitId, q2: QubitId) -> IrResult<&mut Self> {
        self.push(Instruction::virtual_gate(gate, q1, q2))
    }

    /// Cut the wire of `qubit` at this point.
    pub fn wire_cut(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.push(Instruction::wire_cut(qubit))
    }

    // =========================================================================
    // Other operations
    // =========================================================================

    /// Apply a gate to arbitrary operands.
    pub fn gate(
        &mut self,
        gate: StandardGate,
        qubits: impl IntoIterator<Item = QubitId>,
    ) -> IrResult<&mut Self> {
        self.push(Instruction::gate(gate, qubits))
    }

    /// Measure a qubit to a classical bit.
    pub fn measure(&mut self, qubit: QubitId, clbit: ClbitId) -> IrResult<&mut Self> {
        self.push(Instruction::measure(qubit, clbit))
    }

    /// Measure all qubits to corresponding classical bits.
    pub fn measure_all(&mut self) -> IrResult<&mut Self> {
        // Ensure we have enough classical bits
        if self.num_clbits < self.num_qubits {
            self.num_clbits = self.num_qubits;
        }
        for i in 0..self.num_qubits {
            self.push(Instruction::measure(QubitId(i), ClbitId(i)))?;
        }
        Ok(self)
    }

    /// Reset a qubit to |0⟩.
    pub fn reset(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.push(Instruction::reset(qubit))
    }

    /// Apply a barrier to specified qubits.
    pub fn barrier(&mut self, qubits: impl IntoIterator<Item = QubitId>) -> IrResult<&mut Self> {
        self.push(Instruction::barrier(qubits))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the circuit name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of qubits.
    pub fn num_qubits(&self) -> usize {
        self.num_qubits as usize
    }

    /// Get the number of classical bits.
    pub fn num_clbits(&self) -> usize {
        self.num_clbits as usize
    }

    /// Instructions in program order.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Iterate over the qubit identifiers.
    pub fn qubits(&self) -> impl Iterator<Item = QubitId> + '_ {
        (0..self.num_qubits).map(QubitId)
    }

    /// Number of non-virtual two-qubit gates.
    pub fn num_two_qubit_gates(&self) -> usize {
        self.instructions
            .iter()
            .filter(|i| i.is_two_qubit_gate())
            .count()
    }

    /// Get the circuit depth.
    ///
    /// Barriers synchronise the wires they touch but do not add a layer.
    pub fn depth(&self) -> usize {
        let mut qubit_level = vec![0usize; self.num_qubits as usize];
        let mut clbit_level = vec![0usize; self.num_clbits as usize];
        let mut depth = 0;

        for inst in &self.instructions {
            let start = inst
                .qubits
                .iter()
                .map(|q| qubit_level[q.index()])
                .chain(inst.clbits.iter().map(|c| clbit_level[c.index()]))
                .max()
                .unwrap_or(0);
            let level = match inst.kind {
                InstructionKind::Barrier => start,
                _ => start + 1,
            };
            for q in &inst.qubits {
                qubit_level[q.index()] = level;
            }
            for c in &inst.clbits {
                clbit_level[c.index()] = level;
            }
            depth = depth.max(level);
        }
        depth
    }

    // =========================================================================
    // Pre-built circuits
    // =========================================================================

    /// Create a Bell state circuit.
    pub fn bell() -> IrResult<Self> {
        let mut circuit = Self::with_size("bell", 2, 2);
        circuit
            .h(QubitId(0))?
            .cx(QubitId(0), QubitId(1))?
            .measure(QubitId(0), ClbitId(0))?
            .measure(QubitId(1), ClbitId(1))?;
        Ok(circuit)
    }

    /// Create a GHZ state circuit.
    pub fn ghz(n: u32) -> IrResult<Self> {
        if n == 0 {
            return Ok(Self::new("ghz_0"));
        }

        let mut circuit = Self::with_size("ghz", n, n);
        circuit.h(QubitId(0))?;
        for i in 0..n - 1 {
            circuit.cx(QubitId(i), QubitId(i + 1))?;
        }
        for i in 0..n {
            circuit.measure(QubitId(i), ClbitId(i))?;
        }
        Ok(circuit)
    }
}
