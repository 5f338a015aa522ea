//! Error types for the cutting core.

use qknit_hal::HalError;
use qknit_ir::IrError;
use thiserror::Error;

/// Errors that can occur while planning, executing or knitting a cut circuit.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CutError {
    /// No fragment assignment satisfies the size and cut budgets.
    #[error("Infeasible partition: {0}")]
    InfeasiblePartition(String),

    /// The graph partitioner rejected its input or failed.
    #[error("Graph partitioning failed: {0}")]
    GraphPartitioning(String),

    /// A gate has no quasi-probability decomposition.
    #[error("Gate '{gate}' has no virtual decomposition")]
    UnsupportedGateKind {
        /// Name of the gate.
        gate: String,
    },

    /// The number of results does not match the number of instantiations.
    #[error("Expected {expected} results for {context}, got {got}")]
    InstantiationMismatch {
        /// Expected number of results.
        expected: usize,
        /// Actual number of results.
        got: usize,
        /// Where the mismatch was detected.
        context: String,
    },

    /// The executor failed to run a batch.
    #[error("Executor failure: {0}")]
    ExecutorFailure(#[from] HalError),

    /// The knitted quasi-distribution is far from any probability distribution.
    #[error("Numerical instability: distance {distance:.3e} to nearest distribution exceeds {tolerance:.3e}")]
    NumericalInstability {
        /// Distance to the nearest probability distribution.
        distance: f64,
        /// Configured tolerance.
        tolerance: f64,
    },

    /// Circuit construction error.
    #[error("Circuit error: {0}")]
    Ir(#[from] IrError),

    /// Inconsistent configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The circuit cannot be cut as given.
    #[error("Invalid circuit: {0}")]
    InvalidCircuit(String),

    /// Outcomes need more bits than fit in a packed outcome.
    #[error("Outcome needs {bits} bits, at most 64 are supported")]
    OutcomeOverflow {
        /// Number of bits required.
        bits: usize,
    },

    /// The worker pool could not be created.
    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    /// Configuration file could not be parsed.
    #[error("Config parse error: {0}")]
    Config(#[from] serde_yaml_ng::Error),

    /// Configuration file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for cutting operations.
pub type CutResult<T> = Result<T, CutError>;
