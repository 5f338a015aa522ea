//! Reconstruction of the uncut distribution from fragment results.

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tracing::{debug, instrument, warn};

use qknit_hal::Distribution;

use crate::error::{CutError, CutResult};
use crate::instantiation::{FragmentBatch, InstantiationGenerator, LocalLabel};
use crate::pool::WorkerPool;

/// Weights at or below this magnitude are dropped after knitting.
const PRUNE_EPSILON: f64 = 1e-14;

/// Output of a knit.
#[derive(Debug, Clone, PartialEq)]
pub struct Knitted {
    /// The reconstructed quasi-distribution, as computed.
    pub quasi_distribution: Distribution,
    /// Nearest probability distribution.
    pub distribution: Distribution,
    /// L2 distance between the normalised quasi-distribution and
    /// `distribution`.
    pub projection_distance: f64,
}

/// Combines fragment results into the distribution of the uncut circuit.
#[derive(Debug)]
pub struct KnitEngine<'g, 'p> {
    generator: &'g InstantiationGenerator<'p>,
    tolerance: f64,
}

impl<'g, 'p> KnitEngine<'g, 'p> {
    /// Create an engine for the labels of `generator`.
    pub fn new(generator: &'g InstantiationGenerator<'p>, tolerance: f64) -> Self {
        Self {
            generator,
            tolerance,
        }
    }

    /// Knit `results[f][i]`, the outcome of `batches[f].circuits[i]`.
    #[instrument(skip_all, fields(fragments = batches.len()))]
    pub fn knit(
        &self,
        batches: &[FragmentBatch],
        results: &[Vec<Distribution>],
        pool: &WorkerPool,
    ) -> CutResult<Knitted> {
        let plan = self.generator.plan();
        if batches.len() != plan.num_fragments() || results.len() != batches.len() {
            return Err(CutError::InstantiationMismatch {
                expected: plan.num_fragments(),
                got: results.len().min(batches.len()),
                context: "fragment result sets".into(),
            });
        }
        for (batch, result) in batches.iter().zip(results) {
            if result.len() != batch.labels.len() {
                return Err(CutError::InstantiationMismatch {
                    expected: batch.labels.len(),
                    got: result.len(),
                    context: format!("results of fragment {}", batch.fragment),
                });
            }
            check_outcome_width(batch, result)?;
        }

        let merged = pool.install(|| self.merge(batches, results))?;
        let folded = pool.install(|| self.fold(merged))?;

        let mut quasi = folded;
        quasi.prune(PRUNE_EPSILON);
        let (distribution, distance) = nearest_probability(&quasi);
        if distance > self.tolerance {
            let e = CutError::NumericalInstability {
                distance,
                tolerance: self.tolerance,
            };
            warn!("{e}; using the nearest probability distribution");
        }
        debug!(
            "Knitted {} outcomes, projection distance {distance:.3e}",
            quasi.len()
        );

        Ok(Knitted {
            quasi_distribution: quasi,
            distribution,
            projection_distance: distance,
        })
    }

    /// Product of the fragment results selected by every global label,
    /// in global label order.
    fn merge(&self, batches: &[FragmentBatch], results: &[Vec<Distribution>]) -> CutResult<Vec<Distribution>> {
        let scattered: Vec<Vec<Distribution>> = batches
            .par_iter()
            .zip(results)
            .map(|(batch, result)| result.iter().map(|d| d.scatter(&batch.clbit_map)).collect())
            .collect();
        let lookup: Vec<FxHashMap<&LocalLabel, usize>> = batches
            .iter()
            .map(|batch| batch.labels.iter().enumerate().map(|(i, l)| (l, i)).collect())
            .collect();

        (0..self.generator.overhead())
            .into_par_iter()
            .map(|index| -> CutResult<Distribution> {
                let label = self.generator.global_label(index);
                let mut product = Distribution::delta(0);
                for (f, batch) in batches.iter().enumerate() {
                    let local = self.generator.project(&label, batch.fragment);
                    let i = *lookup[f].get(&local).ok_or_else(|| CutError::InstantiationMismatch {
                        expected: self.generator.overhead(),
                        got: batch.labels.len(),
                        context: format!("fragment {} has no result for label {label:?}", batch.fragment),
                    })?;
                    product = product.tensor(&scattered[f][i]);
                }
                Ok(product)
            })
            .collect()
    }

    /// Fold each virtual operation over contiguous chunks, in fold order.
    fn fold(&self, mut current: Vec<Distribution>) -> CutResult<Distribution> {
        let plan = self.generator.plan();
        for &j in self.generator.fold_order() {
            let op = &plan.virtual_ops[j];
            let n = op.num_instantiations();
            if current.len() % n != 0 {
                return Err(CutError::InstantiationMismatch {
                    expected: n,
                    got: current.len(),
                    context: format!("fold of virtual operation {j}"),
                });
            }
            current = current
                .par_chunks(n)
                .map(|chunk| op.knit(chunk))
                .collect::<CutResult<Vec<_>>>()?;
        }

        match <[Distribution; 1]>::try_from(current) {
            Ok([single]) => Ok(single),
            Err(rest) => Err(CutError::InstantiationMismatch {
                expected: 1,
                got: rest.len(),
                context: "distributions left after folding".into(),
            }),
        }
    }
}

/// Every outcome must fit in the classical register of its fragment
/// circuit; higher bits would otherwise be dropped by the scatter.
fn check_outcome_width(batch: &FragmentBatch, result: &[Distribution]) -> CutResult<()> {
    let width = batch.clbit_map.len();
    if width >= u64::BITS as usize {
        return Ok(());
    }
    let stray = result
        .iter()
        .flat_map(|d| d.iter())
        .find(|&(outcome, _)| outcome >> width != 0);
    match stray {
        Some((outcome, _)) => Err(CutError::InstantiationMismatch {
            expected: width,
            got: (u64::BITS - outcome.leading_zeros()) as usize,
            context: format!("outcome width of fragment {}", batch.fragment),
        }),
        None => Ok(()),
    }
}

/// Nearest probability distribution in L2 norm, and the distance to it.
///
/// The quasi-distribution is first normalised by its total. Negative mass
/// is then spread over the remaining outcomes from the smallest weight up
/// (Smolin, Gambetta and Smith, 2012).
///
/// A quasi-distribution without positive total mass has no normalisation;
/// all probability then goes to its largest weight, ties to the lowest
/// outcome.
pub fn nearest_probability(quasi: &Distribution) -> (Distribution, f64) {
    let total = quasi.total();
    if !(total > 0.0 && total.is_finite()) {
        return largest_weight(quasi);
    }
    let scale = 1.0 / total;

    let mut entries: Vec<(u64, f64)> = quasi.iter().map(|(k, w)| (k, w * scale)).collect();
    entries.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

    let n = entries.len();
    let mut accumulated = 0.0;
    let mut cut = 0;
    while cut < n && entries[cut].1 + accumulated / ((n - cut) as f64) < 0.0 {
        accumulated += entries[cut].1;
        cut += 1;
    }

    let mut out = Distribution::new();
    let mut distance_sq = 0.0;
    for (i, &(outcome, w)) in entries.iter().enumerate() {
        let p = if i < cut {
            0.0
        } else {
            w + accumulated / ((n - cut) as f64)
        };
        distance_sq += (w - p) * (w - p);
        if p > 0.0 {
            out.add(outcome, p);
        }
    }
    (out, distance_sq.sqrt())
}

fn largest_weight(quasi: &Distribution) -> (Distribution, f64) {
    let Some((best, _)) = quasi
        .iter()
        .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(&a.0)))
    else {
        return (Distribution::new(), 0.0);
    };
    let distance_sq: f64 = quasi
        .iter()
        .map(|(k, w)| {
            let p = if k == best { 1.0 } else { 0.0 };
            (w - p) * (w - p)
        })
        .sum();
    (Distribution::delta(best), distance_sq.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_keeps_probabilities() {
        let dist: Distribution = [(0, 0.25), (3, 0.75)].into_iter().collect();
        let (p, distance) = nearest_probability(&dist);
        assert!(distance < 1e-15);
        assert!(p.max_abs_diff(&dist) < 1e-15);
    }

    #[test]
    fn test_projection_clips_negative_mass() {
        // -0.1 is clipped and its mass taken from the other two equally.
        let dist: Distribution = [(0, 0.6), (1, 0.5), (2, -0.1)].into_iter().collect();
        let (p, distance) = nearest_probability(&dist);
        assert_eq!(p.get(2), 0.0);
        assert!((p.get(0) - 0.55).abs() < 1e-12);
        assert!((p.get(1) - 0.45).abs() < 1e-12);
        assert!((p.total() - 1.0).abs() < 1e-12);
        let expected = (0.05f64 * 0.05 * 2.0 + 0.01).sqrt();
        assert!((distance - expected).abs() < 1e-12);
    }

    #[test]
    fn test_projection_without_positive_mass() {
        let dist: Distribution = [(0, 0.5), (1, -0.5)].into_iter().collect();
        let (p, distance) = nearest_probability(&dist);
        assert_eq!(p, Distribution::delta(0));
        assert!((distance - 0.5f64.sqrt()).abs() < 1e-12);

        // Equal weights go to the lowest outcome.
        let tied: Distribution = [(5, -0.2), (2, 0.1), (7, 0.1)].into_iter().collect();
        assert_eq!(nearest_probability(&tied).0, Distribution::delta(2));

        let (empty, distance) = nearest_probability(&Distribution::new());
        assert!(empty.is_empty());
        assert_eq!(distance, 0.0);
    }

    #[test]
    fn test_projection_renormalises() {
        let dist: Distribution = [(0, 1.0), (1, 1.0)].into_iter().collect();
        let (p, distance) = nearest_probability(&dist);
        assert!((p.get(0) - 0.5).abs() < 1e-12);
        assert!(distance < 1e-12);
    }
}
