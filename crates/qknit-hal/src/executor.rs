//! The Executor contract.
//!
//! An [`Executor`] turns a batch of fragment circuits into one outcome
//! distribution per circuit:
//!
//! ```text
//!   run(&[Circuit], shots) ──→ Vec<Distribution>
//!        (async)               (same length, same order)
//! ```
//!
//! `shots == 0` requests exact probabilities. Executors that can only sample
//! must reject it with [`HalError::InvalidShots`].

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use qknit_ir::{Circuit, InstructionKind};

use crate::distribution::Distribution;
use crate::error::{HalError, HalResult};

/// Something that can execute circuits.
///
/// Implementations must be `Send + Sync`: the run pipeline submits several
/// batches concurrently through a shared reference.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Get the executor name.
    fn name(&self) -> &str;

    /// Run every circuit and return its outcome distribution, in order.
    async fn run(&self, circuits: &[Circuit], shots: u32) -> HalResult<Vec<Distribution>>;

    /// Largest circuit this executor accepts, if bounded.
    fn max_qubits(&self) -> Option<usize> {
        None
    }

    /// Check a batch against the executor's limits before running it.
    ///
    /// Cut markers must have been lowered away before execution.
    fn validate(&self, circuits: &[Circuit]) -> HalResult<()> {
        for circuit in circuits {
            if let Some(max) = self.max_qubits() {
                if circuit.num_qubits() > max {
                    return Err(HalError::CircuitTooLarge(format!(
                        "Circuit '{}' has {} qubits but {} supports {}",
                        circuit.name(),
                        circuit.num_qubits(),
                        self.name(),
                        max
                    )));
                }
            }
            if let Some(inst) = circuit.instructions().iter().find(|i| {
                matches!(
                    i.kind,
                    InstructionKind::Virtual(_) | InstructionKind::WireCut
                )
            }) {
                return Err(HalError::Unsupported(format!(
                    "Circuit '{}' still contains cut marker '{}'",
                    circuit.name(),
                    inst.name()
                )));
            }
        }
        debug!("{} validated {} circuits", self.name(), circuits.len());
        Ok(())
    }
}

#[async_trait]
impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn run(&self, circuits: &[Circuit], shots: u32) -> HalResult<Vec<Distribution>> {
        (**self).run(circuits, shots).await
    }

    fn max_qubits(&self) -> Option<usize> {
        (**self).max_qubits()
    }

    fn validate(&self, circuits: &[Circuit]) -> HalResult<()> {
        (**self).validate(circuits)
    }
}
