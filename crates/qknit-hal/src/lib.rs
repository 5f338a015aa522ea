//! qknit Hardware Abstraction Layer
//!
//! This crate defines the boundary between the cutting core and whatever
//! runs fragment circuits: a local simulator, a remote service or a test
//! double.
//!
//! # Overview
//!
//! - [`Executor`]: async trait taking a batch of circuits and returning one
//!   [`Distribution`] per circuit, in order.
//! - [`Distribution`]: packed outcome → weight map shared by executors
//!   (probabilities) and the knitting engine (quasi-probabilities).
//!
//! # Implementing an Executor
//!
//! ```ignore
//! use qknit_hal::{Distribution, Executor, HalResult};
//! use qknit_ir::Circuit;
//! use async_trait::async_trait;
//!
//! struct MyExecutor;
//!
//! #[async_trait]
//! impl Executor for MyExecutor {
//!     fn name(&self) -> &str {
//!         "my_executor"
//!     }
//!
//!     async fn run(&self, circuits: &[Circuit], shots: u32) -> HalResult<Vec<Distribution>> {
//!         self.validate(circuits)?;
//!         todo!("submit and collect")
//!     }
//! }
//! ```

pub mod distribution;
pub mod error;
pub mod executor;

pub use distribution::{Distribution, scatter_bits};
pub use error::{HalError, HalResult};
pub use executor::Executor;
