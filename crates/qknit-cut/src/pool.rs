//! Worker pool for circuit generation and knitting.

use std::fmt;

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{CutError, CutResult};

/// A dedicated rayon pool.
///
/// Parallel work of a run is installed into this pool, never into the
/// global one.
pub struct WorkerPool {
    pool: ThreadPool,
}

impl WorkerPool {
    /// Build a pool with `workers` threads, or rayon's default count.
    pub fn new(workers: Option<usize>) -> CutResult<Self> {
        let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("qknit-worker-{i}"));
        if let Some(n) = workers {
            builder = builder.num_threads(n);
        }
        let pool = builder
            .build()
            .map_err(|e| CutError::WorkerPool(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Run `op` inside the pool.
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }

    /// Number of worker threads.
    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("num_threads", &self.num_threads())
            .finish()
    }
}
