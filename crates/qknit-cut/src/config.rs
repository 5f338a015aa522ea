//! Cut configuration.
//!
//! Loaded from YAML or built in code:
//!
//! ```yaml
//! technique: optimal
//! max_fragment_size: 4
//! max_gate_cuts: 2
//! max_wire_cuts: 1
//! fold_order: cost
//! ```
//!
//! Every field has a default, so a partial document is valid.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CutError, CutResult};

/// Partitioning technique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Technique {
    /// Recursive METIS bisection of the qubit graph, refined by Kernighan–Lin.
    #[default]
    Bisection,
    /// Exact branch-and-bound search, with automatic wire cuts.
    Optimal,
    /// METIS k-way partitioning, repaired to the size limit and refined.
    #[serde(alias = "multiway")]
    Metis,
}

/// Order in which virtual operations are folded during knitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FoldOrder {
    /// Order of appearance in the circuit.
    Insertion,
    /// Elimination order from the contraction planner.
    #[default]
    Cost,
}

/// Settings for one cut-and-knit run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutConfig {
    /// Partitioning technique.
    #[serde(default)]
    pub technique: Technique,

    /// Largest fragment, in qubits after wire-cut lowering.
    #[serde(default = "default_max_fragment_size")]
    pub max_fragment_size: usize,

    /// Largest number of gates the partitioner may virtualise.
    #[serde(default = "default_max_gate_cuts")]
    pub max_gate_cuts: usize,

    /// Largest number of wires the partitioner may cut.
    #[serde(default)]
    pub max_wire_cuts: usize,

    /// Exact number of fragments; searched over a small range when unset.
    #[serde(default)]
    pub num_fragments: Option<usize>,

    /// Shots per fragment circuit (0 requests exact distributions).
    #[serde(default)]
    pub shots: u32,

    /// Fold order used by the knitting engine.
    #[serde(default)]
    pub fold_order: FoldOrder,

    /// Distance to the nearest probability distribution tolerated silently.
    #[serde(default = "default_projection_tolerance")]
    pub projection_tolerance: f64,

    /// Worker threads for generation and knitting (rayon default when unset).
    #[serde(default)]
    pub workers: Option<usize>,

    /// Node budget of the exact partition search.
    #[serde(default = "default_search_limit")]
    pub search_limit: u64,
}

// Default value functions
fn default_max_fragment_size() -> usize {
    4
}

fn default_max_gate_cuts() -> usize {
    4
}

fn default_projection_tolerance() -> f64 {
    1e-6
}

fn default_search_limit() -> u64 {
    1_000_000
}

impl Default for CutConfig {
    fn default() -> Self {
        Self {
            technique: Technique::default(),
            max_fragment_size: default_max_fragment_size(),
            max_gate_cuts: default_max_gate_cuts(),
            max_wire_cuts: 0,
            num_fragments: None,
            shots: 0,
            fold_order: FoldOrder::default(),
            projection_tolerance: default_projection_tolerance(),
            workers: None,
            search_limit: default_search_limit(),
        }
    }
}

impl CutConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> CutResult<Self> {
        let config: CutConfig = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> CutResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&contents)
    }

    /// Set the partitioning technique.
    pub fn with_technique(mut self, technique: Technique) -> Self {
        self.technique = technique;
        self
    }

    /// Set the fragment size limit.
    pub fn with_max_fragment_size(mut self, size: usize) -> Self {
        self.max_fragment_size = size;
        self
    }

    /// Set the gate cut budget.
    pub fn with_max_gate_cuts(mut self, cuts: usize) -> Self {
        self.max_gate_cuts = cuts;
        self
    }

    /// Set the wire cut budget.
    pub fn with_max_wire_cuts(mut self, cuts: usize) -> Self {
        self.max_wire_cuts = cuts;
        self
    }

    /// Require an exact number of fragments.
    pub fn with_num_fragments(mut self, k: usize) -> Self {
        self.num_fragments = Some(k);
        self
    }

    /// Set shots per fragment circuit.
    pub fn with_shots(mut self, shots: u32) -> Self {
        self.shots = shots;
        self
    }

    /// Set the fold order.
    pub fn with_fold_order(mut self, order: FoldOrder) -> Self {
        self.fold_order = order;
        self
    }

    /// Set the projection tolerance.
    pub fn with_projection_tolerance(mut self, tolerance: f64) -> Self {
        self.projection_tolerance = tolerance;
        self
    }

    /// Set the number of worker threads.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Set the exact search node budget.
    pub fn with_search_limit(mut self, limit: u64) -> Self {
        self.search_limit = limit;
        self
    }

    /// Reject inconsistent settings.
    ///
    /// Fragment size and cut budgets are checked by the partitioner, which
    /// reports unsatisfiable limits as infeasible partitions.
    pub fn validate(&self) -> CutResult<()> {
        if !self.projection_tolerance.is_finite() || self.projection_tolerance < 0.0 {
            return Err(CutError::InvalidConfig(format!(
                "projection_tolerance must be a non-negative number, got {}",
                self.projection_tolerance
            )));
        }
        if self.num_fragments == Some(0) {
            return Err(CutError::InvalidConfig(
                "num_fragments must be at least 1".into(),
            ));
        }
        if self.num_fragments.is_some() && self.technique == Technique::Bisection {
            return Err(CutError::InvalidConfig(
                "num_fragments requires technique 'optimal' or 'metis'".into(),
            ));
        }
        if self.workers == Some(0) {
            return Err(CutError::InvalidConfig("workers must be at least 1".into()));
        }
        if self.search_limit == 0 {
            return Err(CutError::InvalidConfig(
                "search_limit must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
