//! Direct k-way partitioning: METIS k-way, size repair and boundary
//! refinement.

use tracing::debug;

use super::split::{PartitioningStrategy, find_partitioning};
use crate::error::{CutError, CutResult};
use crate::graph::CircuitGraph;

/// Refinement passes after repair.
const MAX_REFINEMENT_PASSES: usize = 16;

const GAIN_EPSILON: f64 = 1e-9;

/// Partition a graph into exactly `num_fragments` vertex sets of at most
/// `max_fragment_size` vertices each.
///
/// METIS k-way gives the initial assignment. Parts over the size limit
/// then hand vertices to the part they are most strongly connected to,
/// and empty parts take the loosest vertex of the largest part.
/// Refinement moves single vertices, then swaps pairs across parts,
/// whenever that lowers the cut weight without breaking the limits.
pub fn multiway_partition(
    graph: &CircuitGraph,
    num_fragments: usize,
    max_fragment_size: usize,
) -> CutResult<Vec<Vec<usize>>> {
    let n = graph.num_vertices();
    let k = num_fragments;
    if k == 0 || k > n || k.saturating_mul(max_fragment_size) < n {
        return Err(CutError::InfeasiblePartition(format!(
            "cannot split {n} vertices into {k} fragments of at most {max_fragment_size}"
        )));
    }

    let adjacency = graph.weighted_adjacency();
    let vertices: Vec<usize> = (0..n).collect();
    let mut assignment = Assignment::new(
        &adjacency,
        find_partitioning(&adjacency, &vertices, k, PartitioningStrategy::KWay)?,
        k,
    );
    assignment.repair(max_fragment_size)?;

    for pass in 0..MAX_REFINEMENT_PASSES {
        let moved = assignment.move_pass(max_fragment_size);
        let swapped = assignment.swap_pass();
        debug!("Refinement pass {pass} moved {moved} and swapped {swapped} vertices");
        if moved + swapped == 0 {
            break;
        }
    }

    let mut parts = vec![vec![]; k];
    for (v, &p) in assignment.part_of.iter().enumerate() {
        parts[p].push(v);
    }
    parts.sort_by_key(|part| part[0]);
    Ok(parts)
}

struct Assignment<'a> {
    adjacency: &'a [Vec<(usize, f64)>],
    part_of: Vec<usize>,
    sizes: Vec<usize>,
}

impl<'a> Assignment<'a> {
    fn new(adjacency: &'a [Vec<(usize, f64)>], part_of: Vec<usize>, k: usize) -> Self {
        let mut sizes = vec![0; k];
        for &p in &part_of {
            sizes[p] += 1;
        }
        Self {
            adjacency,
            part_of,
            sizes,
        }
    }

    /// Edge weight from `v` into every part.
    fn connection(&self, v: usize) -> Vec<f64> {
        let mut connection = vec![0.0; self.sizes.len()];
        for &(u, w) in &self.adjacency[v] {
            if u != v {
                connection[self.part_of[u]] += w;
            }
        }
        connection
    }

    fn weight(&self, a: usize, b: usize) -> f64 {
        self.adjacency[a]
            .iter()
            .filter(|&&(u, _)| u == b)
            .map(|&(_, w)| w)
            .sum()
    }

    fn relocate(&mut self, v: usize, to: usize) {
        self.sizes[self.part_of[v]] -= 1;
        self.sizes[to] += 1;
        self.part_of[v] = to;
    }

    /// Bring every part to between one and `max_size` vertices.
    fn repair(&mut self, max_size: usize) -> CutResult<()> {
        let k = self.sizes.len();
        while let Some(from) = (0..k).find(|&p| self.sizes[p] > max_size) {
            let mut best: Option<(f64, usize, usize)> = None;
            for v in (0..self.part_of.len()).filter(|&v| self.part_of[v] == from) {
                let connection = self.connection(v);
                for to in (0..k).filter(|&to| to != from && self.sizes[to] < max_size) {
                    let gain = connection[to] - connection[from];
                    if best.is_none_or(|(g, _, _)| gain > g + GAIN_EPSILON) {
                        best = Some((gain, v, to));
                    }
                }
            }
            let Some((_, v, to)) = best else {
                return Err(CutError::InfeasiblePartition(format!(
                    "no room to shrink part {from} to {max_size} vertices"
                )));
            };
            self.relocate(v, to);
        }

        while let Some(to) = (0..k).find(|&p| self.sizes[p] == 0) {
            let from = (0..k)
                .max_by(|&a, &b| self.sizes[a].cmp(&self.sizes[b]).then(b.cmp(&a)))
                .filter(|&p| self.sizes[p] > 1);
            let Some(from) = from else {
                return Err(CutError::InfeasiblePartition(format!(
                    "no vertex left to fill part {to}"
                )));
            };
            let loosest = (0..self.part_of.len())
                .filter(|&v| self.part_of[v] == from)
                .min_by(|&a, &b| {
                    let wa = self.connection(a)[from];
                    let wb = self.connection(b)[from];
                    wa.total_cmp(&wb).then(a.cmp(&b))
                });
            if let Some(v) = loosest {
                self.relocate(v, to);
            }
        }
        Ok(())
    }

    /// Move single vertices to the part with the highest positive gain.
    fn move_pass(&mut self, max_size: usize) -> usize {
        let k = self.sizes.len();
        let mut moved = 0;
        for v in 0..self.part_of.len() {
            let from = self.part_of[v];
            if self.sizes[from] <= 1 {
                continue;
            }
            let connection = self.connection(v);
            let mut best: Option<(f64, usize)> = None;
            for to in (0..k).filter(|&to| to != from && self.sizes[to] < max_size) {
                let gain = connection[to] - connection[from];
                if gain > GAIN_EPSILON && best.is_none_or(|(g, _)| gain > g + GAIN_EPSILON) {
                    best = Some((gain, to));
                }
            }
            if let Some((_, to)) = best {
                self.relocate(v, to);
                moved += 1;
            }
        }
        moved
    }

    /// Swap pairs in different parts when that lowers the cut; sizes are
    /// unchanged.
    fn swap_pass(&mut self) -> usize {
        let n = self.part_of.len();
        let mut swapped = 0;
        for v in 0..n {
            let mut best: Option<(f64, usize)> = None;
            let cv = self.connection(v);
            for u in (v + 1..n).filter(|&u| self.part_of[u] != self.part_of[v]) {
                let (pv, pu) = (self.part_of[v], self.part_of[u]);
                let cu = self.connection(u);
                let gain = (cv[pu] - cv[pv]) + (cu[pv] - cu[pu]) - 2.0 * self.weight(v, u);
                if gain > GAIN_EPSILON && best.is_none_or(|(g, _)| gain > g + GAIN_EPSILON) {
                    best = Some((gain, u));
                }
            }
            if let Some((_, u)) = best {
                let (pv, pu) = (self.part_of[v], self.part_of[u]);
                self.relocate(v, pu);
                self.relocate(u, pv);
                swapped += 2;
            }
        }
        swapped
    }
}
