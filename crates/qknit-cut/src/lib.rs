//! qknit Circuit Cutting and Knitting
//!
//! Splits a circuit that is too wide for an executor into fragments,
//! replaces every cut gate or wire by a quasi-probability decomposition,
//! runs the resulting fragment circuits and knits their outcome
//! distributions back into the distribution of the uncut circuit.
//!
//! # Pipeline
//!
//! 1. [`Partitioner`] builds a [`CircuitGraph`], runs the configured
//!    [`Technique`] and returns an immutable [`PartitionPlan`]: the circuit
//!    with wire cuts lowered to virtual moves and crossing gates marked
//!    virtual.
//! 2. [`InstantiationGenerator`] enumerates instantiation labels and builds
//!    one circuit per fragment and distinct local label.
//! 3. An [`Executor`](qknit_hal::Executor) runs every fragment batch.
//! 4. [`KnitEngine`] merges fragment results per label, folds every
//!    [`VirtualOperation`] and projects onto the nearest probability
//!    distribution.
//!
//! [`CutRunner`] drives all four steps.
//!
//! # Example
//!
//! ```ignore
//! use qknit_adapter_sim::SimulatorExecutor;
//! use qknit_cut::{CutConfig, CutRunner};
//! use qknit_ir::{Circuit, QubitId};
//!
//! let mut circuit = Circuit::with_size("chain", 4, 4);
//! for q in 0..4 {
//!     circuit.h(QubitId(q))?;
//! }
//! circuit.cz(QubitId(0), QubitId(1))?;
//! circuit.cz(QubitId(1), QubitId(2))?;
//! circuit.cz(QubitId(2), QubitId(3))?;
//! circuit.measure_all()?;
//!
//! let runner = CutRunner::new(CutConfig::default().with_max_fragment_size(2))?;
//! let result = runner.run(&circuit, &SimulatorExecutor::new()).await?;
//! assert_eq!(result.diagnostics.num_fragments, 2);
//! ```

pub mod config;
pub mod cost;
pub mod error;
pub mod graph;
pub mod instantiation;
pub mod knit;
pub mod partition;
pub mod plan;
pub mod pool;
pub mod runner;
pub mod virtual_gate;

pub use config::{CutConfig, FoldOrder, Technique};
pub use cost::{CostEstimate, CostEstimator};
pub use error::{CutError, CutResult};
pub use graph::{CircuitGraph, Coupling, Vertex};
pub use instantiation::{FragmentBatch, GlobalLabel, InstantiationGenerator, LocalLabel};
pub use knit::{KnitEngine, Knitted, nearest_probability};
pub use partition::{
    CutBudget, LoweredCircuit, Partitioner, PartitioningStrategy, bisect, bisect_vertices,
    find_partitioning, kernighan_lin, lower_wire_cuts, multiway_partition, optimal_partition,
    recursive_partition,
};
pub use plan::{Fragment, PartitionPlan};
pub use pool::WorkerPool;
pub use runner::{CutRunner, Diagnostics, Reconstruction, cut_and_run};
pub use virtual_gate::{Instantiation, LocalOp, VirtualGate, VirtualOperation};
