//! Error types for the HAL crate.

use thiserror::Error;

/// Errors reported by an [`Executor`](crate::Executor).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HalError {
    /// Invalid circuit.
    #[error("Invalid circuit: {0}")]
    InvalidCircuit(String),

    /// Circuit exceeds executor capabilities.
    #[error("Circuit exceeds executor capabilities: {0}")]
    CircuitTooLarge(String),

    /// Unsupported feature.
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// Invalid number of shots.
    #[error("Invalid shots: {0}")]
    InvalidShots(String),

    /// Generic executor error.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Result type for HAL operations.
pub type HalResult<T> = Result<T, HalError>;
