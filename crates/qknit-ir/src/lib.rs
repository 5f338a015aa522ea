//! qknit Circuit Intermediate Representation
//!
//! This crate provides the circuit data structures consumed by the qknit
//! cutting core and by executors.
//!
//! # Overview
//!
//! A [`Circuit`] is a validated list of [`Instruction`]s over dense qubit and
//! classical bit identifiers. Besides ordinary gates, measurements, resets and
//! barriers, an instruction may be a cut marker:
//!
//! - [`InstructionKind::Virtual`] tags a two-qubit gate for replacement by its
//!   quasi-probability decomposition.
//! - [`InstructionKind::WireCut`] requests that a qubit wire be cut at that
//!   point in time.
//!
//! # Example: Building a Bell State
//!
//! ```rust
//! use qknit_ir::{Circuit, QubitId};
//!
//! let mut circuit = Circuit::with_size("bell_state", 2, 2);
//! circuit.h(QubitId(0)).unwrap();
//! circuit.cx(QubitId(0), QubitId(1)).unwrap();
//! circuit.measure_all().unwrap();
//!
//! assert_eq!(circuit.num_qubits(), 2);
//! assert_eq!(circuit.depth(), 3);
//! ```
//!
//! # Example: Marking a Gate for Virtualisation
//!
//! ```rust
//! use qknit_ir::{Circuit, QubitId, StandardGate};
//!
//! let mut circuit = Circuit::with_size("cut", 2, 2);
//! circuit.h(QubitId(0)).unwrap();
//! circuit
//!     .virtual_gate(StandardGate::CZ, QubitId(0), QubitId(1))
//!     .unwrap();
//! circuit.measure_all().unwrap();
//!
//! assert_eq!(circuit.num_two_qubit_gates(), 0);
//! ```

pub mod circuit;
pub mod error;
pub mod gate;
pub mod instruction;
pub mod qubit;

pub use circuit::Circuit;
pub use error::{IrError, IrResult};
pub use gate::StandardGate;
pub use instruction::{Instruction, InstructionKind};
pub use qubit::{ClbitId, QubitId};
