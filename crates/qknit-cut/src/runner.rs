//! End-to-end cut, execute and knit pipeline.

use std::sync::Arc;
use std::time::Instant;

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use qknit_hal::{Distribution, Executor};
use qknit_ir::Circuit;

use crate::config::{CutConfig, FoldOrder};
use crate::cost::{CostEstimate, CostEstimator};
use crate::error::{CutError, CutResult};
use crate::instantiation::InstantiationGenerator;
use crate::knit::KnitEngine;
use crate::partition::Partitioner;
use crate::plan::PartitionPlan;
use crate::pool::WorkerPool;

/// Summary of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Number of fragments.
    pub num_fragments: usize,
    /// Number of virtual operations.
    pub num_virtual_ops: usize,
    /// Number of global instantiation labels.
    pub sampling_overhead: usize,
    /// Fragment circuits handed to the executor.
    pub circuits_submitted: usize,
    /// Contraction cost of the knit.
    pub estimated_cost: CostEstimate,
    /// Distance from the knitted quasi-distribution to the returned
    /// distribution.
    pub projection_distance: f64,
}

/// Result of a cut-and-knit run.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconstruction {
    /// Probability distribution over the original classical bits.
    pub distribution: Distribution,
    /// Knitted quasi-distribution before projection.
    pub quasi_distribution: Distribution,
    /// Run summary.
    pub diagnostics: Diagnostics,
}

/// Plans, executes and knits circuits with a fixed configuration.
#[derive(Debug, Clone)]
pub struct CutRunner {
    config: CutConfig,
    pool: Arc<WorkerPool>,
}

impl CutRunner {
    /// Create a runner with its own worker pool.
    pub fn new(config: CutConfig) -> CutResult<Self> {
        config.validate()?;
        let pool = Arc::new(WorkerPool::new(config.workers)?);
        Ok(Self { config, pool })
    }

    /// Create a runner sharing an existing worker pool.
    pub fn with_pool(config: CutConfig, pool: Arc<WorkerPool>) -> CutResult<Self> {
        config.validate()?;
        Ok(Self { config, pool })
    }

    /// The configuration in use.
    pub fn config(&self) -> &CutConfig {
        &self.config
    }

    /// Partition a circuit without running it.
    pub fn plan(&self, circuit: &Circuit) -> CutResult<PartitionPlan> {
        Partitioner::new(&self.config).plan(circuit)
    }

    /// Cut `circuit`, run the fragments on `executor` and knit the results.
    #[instrument(skip(self, circuit, executor), fields(name = circuit.name(), executor = executor.name()))]
    pub async fn run<E>(&self, circuit: &Circuit, executor: &E) -> CutResult<Reconstruction>
    where
        E: Executor + ?Sized,
    {
        let plan = self.plan(circuit)?;
        self.run_plan(&plan, executor).await
    }

    /// Run and knit an existing plan.
    pub async fn run_plan<E>(&self, plan: &PartitionPlan, executor: &E) -> CutResult<Reconstruction>
    where
        E: Executor + ?Sized,
    {
        let start = Instant::now();
        let fold_order = match self.config.fold_order {
            FoldOrder::Insertion => (0..plan.num_virtual_ops()).collect(),
            FoldOrder::Cost => CostEstimator::elimination_order(&plan.virtual_ops)?,
        };
        let generator = InstantiationGenerator::new(plan, fold_order)?;
        let batches = generator.fragment_circuits(&self.pool)?;
        let circuits_submitted: usize = batches.iter().map(|b| b.circuits.len()).sum();
        info!(
            "Submitting {circuits_submitted} circuits for {} fragments (overhead {})",
            batches.len(),
            generator.overhead()
        );

        let shots = self.config.shots;
        let results = try_join_all(batches.iter().map(|b| executor.run(&b.circuits, shots))).await?;
        for (batch, result) in batches.iter().zip(&results) {
            if result.len() != batch.circuits.len() {
                return Err(CutError::InstantiationMismatch {
                    expected: batch.circuits.len(),
                    got: result.len(),
                    context: format!("executor results for fragment {}", batch.fragment),
                });
            }
        }

        let knitted = KnitEngine::new(&generator, self.config.projection_tolerance).knit(
            &batches,
            &results,
            &self.pool,
        )?;

        let diagnostics = Diagnostics {
            num_fragments: plan.num_fragments(),
            num_virtual_ops: plan.num_virtual_ops(),
            sampling_overhead: generator.overhead(),
            circuits_submitted,
            estimated_cost: CostEstimator::score(plan)?,
            projection_distance: knitted.projection_distance,
        };
        info!(
            "Knitted {} fragments in {:?}, projection distance {:.3e}",
            diagnostics.num_fragments,
            start.elapsed(),
            diagnostics.projection_distance
        );

        Ok(Reconstruction {
            distribution: knitted.distribution,
            quasi_distribution: knitted.quasi_distribution,
            diagnostics,
        })
    }
}

/// Cut, run and knit `circuit` in one call.
pub async fn cut_and_run<E>(circuit: &Circuit, config: CutConfig, executor: &E) -> CutResult<Reconstruction>
where
    E: Executor + ?Sized,
{
    CutRunner::new(config)?.run(circuit, executor).await
}
