//! qknit Local Statevector Simulator
//!
//! This crate provides the reference [`Executor`](qknit_hal::Executor) used
//! to run fragment circuits locally. It uses statevector simulation and is
//! limited to ~20-25 qubits, which is the regime circuit cutting targets.
//!
//! # Features
//!
//! - **Exact Distributions**: `shots == 0` returns exact outcome
//!   probabilities, branching on mid-circuit measurements and resets
//! - **Shot Sampling**: `shots > 0` samples the exact distribution, with an
//!   optional seed for reproducible runs
//! - **All Standard Gates**: including `RXX`, `RYY`, `RZZ` and `Move`
//!
//! # Performance
//!
//! | Qubits | Memory | Simulation Speed |
//! |--------|--------|------------------|
//! | 10 | ~16 KB | Instant |
//! | 15 | ~512 KB | Fast |
//! | 20 | ~16 MB | Moderate |
//! | 25 | ~512 MB | Slow |
//!
//! Each mid-circuit measurement can double the number of tracked branches.
//!
//! # Example
//!
//! ```ignore
//! use qknit_adapter_sim::SimulatorExecutor;
//! use qknit_hal::Executor;
//! use qknit_ir::Circuit;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let sim = SimulatorExecutor::new();
//!     let circuit = Circuit::bell()?;
//!     let dists = sim.run(&[circuit], 0).await?;
//!
//!     // Exactly 50% |00⟩ and 50% |11⟩
//!     println!("{:?}", dists[0].to_bitstrings(2));
//!     Ok(())
//! }
//! ```

mod simulator;
mod statevector;

pub use simulator::SimulatorExecutor;
