//! Graph partitioning with METIS.

use metis::{Graph, Idx};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{CutError, CutResult};

/// Scale applied to real edge weights before rounding them to the integer
/// weights METIS accepts. Two gate cuts (`2·ln 6`) and one wire cut
/// (`ln 8`) stay distinguishable at this resolution.
const WEIGHT_SCALE_FACTOR: f64 = 1e3;

/// Largest integer edge weight, so that the weighted degree of a vertex
/// cannot overflow an `Idx`.
const MAX_EDGE_WEIGHT: Idx = 1 << 20;

/// The METIS routine to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitioningStrategy {
    /// Multilevel recursive bisection.
    Recursive,
    /// Multilevel direct k-way partitioning.
    KWay,
}

/// Split the subgraph induced by `vertices` into `k` parts with a small
/// total edge weight between them.
///
/// `adjacency[v]` lists `(neighbour, weight)` pairs; neighbours outside
/// `vertices` are ignored. Returns the part of every entry of `vertices`,
/// in the same order. METIS runs with its fixed default seed, so equal
/// inputs give equal outputs. A subgraph without edges is cut into
/// contiguous blocks.
pub fn find_partitioning(
    adjacency: &[Vec<(usize, f64)>],
    vertices: &[usize],
    k: usize,
    strategy: PartitioningStrategy,
) -> CutResult<Vec<usize>> {
    let n = vertices.len();
    if k == 0 || k > n.max(1) {
        return Err(CutError::InfeasiblePartition(format!(
            "cannot split {n} vertices into {k} parts"
        )));
    }
    if k == 1 {
        return Ok(vec![0; n]);
    }

    let local: FxHashMap<usize, usize> = vertices.iter().enumerate().map(|(i, &v)| (v, i)).collect();
    let mut xadj: Vec<Idx> = Vec::with_capacity(n + 1);
    let mut adjncy: Vec<Idx> = vec![];
    let mut adjwgt: Vec<Idx> = vec![];
    xadj.push(0);
    for (i, &v) in vertices.iter().enumerate() {
        let mut row: FxHashMap<usize, f64> = FxHashMap::default();
        for &(u, w) in &adjacency[v] {
            if let Some(&j) = local.get(&u) {
                if i != j && w > 0.0 {
                    *row.entry(j).or_insert(0.0) += w;
                }
            }
        }
        let mut row: Vec<(usize, f64)> = row.into_iter().collect();
        row.sort_unstable_by_key(|&(j, _)| j);
        for (j, w) in row {
            adjncy.push(to_idx(j)?);
            adjwgt.push(scale_weight(w));
        }
        xadj.push(to_idx(adjncy.len())?);
    }

    if adjncy.is_empty() {
        return Ok((0..n).map(|i| i * k / n).collect());
    }

    let nparts = to_idx(k)?;
    let mut part: Vec<Idx> = vec![0; n];
    let edge_cut = match strategy {
        PartitioningStrategy::Recursive => {
            metis_graph(nparts, &xadj, &adjncy, &adjwgt)?.part_recursive(&mut part)
        }
        PartitioningStrategy::KWay => metis_graph(nparts, &xadj, &adjncy, &adjwgt)?.part_kway(&mut part),
    }
    .map_err(|e| CutError::GraphPartitioning(e.to_string()))?;
    debug!("METIS {strategy:?} split {n} vertices into {k} parts, edge cut {edge_cut}");

    part.into_iter()
        .map(|p| {
            usize::try_from(p)
                .ok()
                .filter(|&p| p < k)
                .ok_or_else(|| CutError::GraphPartitioning(format!("part {p} out of range")))
        })
        .collect()
}

fn metis_graph<'a>(
    nparts: Idx,
    xadj: &'a [Idx],
    adjncy: &'a [Idx],
    adjwgt: &'a [Idx],
) -> CutResult<Graph<'a>> {
    let graph = Graph::new(1, nparts, xadj, adjncy)
        .map_err(|e| CutError::GraphPartitioning(e.to_string()))?;
    Ok(graph.set_adjwgt(adjwgt))
}

fn to_idx(value: usize) -> CutResult<Idx> {
    Idx::try_from(value)
        .map_err(|_| CutError::GraphPartitioning(format!("{value} exceeds the METIS index range")))
}

fn scale_weight(weight: f64) -> Idx {
    let scaled = (WEIGHT_SCALE_FACTOR * weight).round();
    if scaled >= MAX_EDGE_WEIGHT as f64 {
        MAX_EDGE_WEIGHT
    } else {
        (scaled as Idx).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(adjacency: &mut [Vec<(usize, f64)>], a: usize, b: usize, w: f64) {
        adjacency[a].push((b, w));
        adjacency[b].push((a, w));
    }

    #[test]
    fn test_single_part() {
        let adjacency = vec![vec![]; 3];
        let parts = find_partitioning(&adjacency, &[0, 1, 2], 1, PartitioningStrategy::KWay).unwrap();
        assert_eq!(parts, vec![0, 0, 0]);
    }

    #[test]
    fn test_edgeless_blocks() {
        let adjacency = vec![vec![]; 5];
        let parts =
            find_partitioning(&adjacency, &[0, 1, 2, 3, 4], 2, PartitioningStrategy::Recursive).unwrap();
        assert_eq!(parts, vec![0, 0, 0, 1, 1]);
    }

    #[test]
    fn test_two_cliques_separate() {
        // Two heavy 4-cliques joined by one light edge.
        let mut adjacency = vec![vec![]; 8];
        for base in [0, 4] {
            for a in base..base + 4 {
                for b in a + 1..base + 4 {
                    link(&mut adjacency, a, b, 10.0);
                }
            }
        }
        link(&mut adjacency, 3, 4, 1.0);
        let vertices: Vec<usize> = (0..8).collect();
        for strategy in [PartitioningStrategy::Recursive, PartitioningStrategy::KWay] {
            let parts = find_partitioning(&adjacency, &vertices, 2, strategy).unwrap();
            assert!(parts[..4].iter().all(|&p| p == parts[0]), "{strategy:?}: {parts:?}");
            assert!(parts[4..].iter().all(|&p| p == parts[4]), "{strategy:?}: {parts:?}");
            assert_ne!(parts[0], parts[4]);
        }
    }

    #[test]
    fn test_outside_neighbours_ignored() {
        let mut adjacency = vec![vec![]; 4];
        link(&mut adjacency, 0, 1, 1.0);
        link(&mut adjacency, 2, 3, 1.0);
        link(&mut adjacency, 0, 3, 5.0);
        let parts = find_partitioning(&adjacency, &[1, 2], 2, PartitioningStrategy::Recursive).unwrap();
        assert_eq!(parts, vec![0, 1]);
    }

    #[test]
    fn test_too_many_parts() {
        let adjacency = vec![vec![]; 2];
        assert!(matches!(
            find_partitioning(&adjacency, &[0, 1], 3, PartitioningStrategy::KWay),
            Err(CutError::InfeasiblePartition(_))
        ));
    }

    #[test]
    fn test_weight_scaling() {
        assert_eq!(scale_weight(1e-9), 1);
        assert_eq!(scale_weight(6f64.ln()), 1792);
        assert_eq!(scale_weight(1e6), MAX_EDGE_WEIGHT);
    }
}
