//! Balanced bisection and recursive partitioning.
//!
//! METIS proposes a two-way split, which is balanced to sizes `⌈n/2⌉` and
//! `⌊n/2⌋` and then refined by Kernighan–Lin passes.

use rustc_hash::FxHashMap;
use tracing::debug;

use super::split::{PartitioningStrategy, find_partitioning};
use crate::error::{CutError, CutResult};
use crate::graph::CircuitGraph;

/// Gains at or below this are treated as zero.
const GAIN_EPSILON: f64 = 1e-9;

/// Split `vertices` into two halves of sizes `⌈n/2⌉` and `⌊n/2⌋` with a
/// small total edge weight between them.
///
/// `adjacency[v]` lists `(neighbour, weight)` pairs; neighbours outside
/// `vertices` are ignored. Ties are broken by lowest index, so the result
/// is deterministic; with an even count the lowest vertex lands in the
/// first half. Both halves are sorted.
pub fn bisect_vertices(
    adjacency: &[Vec<(usize, f64)>],
    vertices: &[usize],
) -> CutResult<(Vec<usize>, Vec<usize>)> {
    let sorted = sorted_set(vertices);
    if sorted.len() < 2 {
        return Ok((sorted, vec![]));
    }
    let parts = find_partitioning(adjacency, &sorted, 2, PartitioningStrategy::Recursive)?;
    // Side A (`false`) is the one holding the lowest vertex.
    let mut side: Vec<bool> = parts.iter().map(|&p| p != parts[0]).collect();
    let weight = dense_weights(adjacency, &sorted);
    balance(&weight, &mut side);
    refine(&weight, &mut side);
    if side.len() % 2 == 0 && side[0] {
        side.iter_mut().for_each(|s| *s = !*s);
    }
    Ok(split_sides(&sorted, &side))
}

/// Improve the split `a | b` by Kernighan–Lin passes, keeping the size of
/// each side. Both halves are returned sorted.
pub fn kernighan_lin(adjacency: &[Vec<(usize, f64)>], a: &[usize], b: &[usize]) -> (Vec<usize>, Vec<usize>) {
    let b = sorted_set(b);
    let sorted = sorted_set(&[a, b.as_slice()].concat());
    let mut side: Vec<bool> = sorted.iter().map(|v| b.binary_search(v).is_ok()).collect();
    let weight = dense_weights(adjacency, &sorted);
    refine(&weight, &mut side);
    split_sides(&sorted, &side)
}

fn sorted_set(vertices: &[usize]) -> Vec<usize> {
    let mut sorted = vertices.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted
}

fn dense_weights(adjacency: &[Vec<(usize, f64)>], sorted: &[usize]) -> Vec<Vec<f64>> {
    let n = sorted.len();
    let local: FxHashMap<usize, usize> = sorted.iter().enumerate().map(|(i, &v)| (v, i)).collect();
    let mut weight = vec![vec![0.0; n]; n];
    for (i, &v) in sorted.iter().enumerate() {
        for &(u, w) in &adjacency[v] {
            if let Some(&j) = local.get(&u) {
                if i != j {
                    weight[i][j] += w;
                }
            }
        }
    }
    weight
}

fn split_sides(sorted: &[usize], side: &[bool]) -> (Vec<usize>, Vec<usize>) {
    let mut a = vec![];
    let mut b = vec![];
    for (&v, &s) in sorted.iter().zip(side) {
        if s {
            b.push(v);
        } else {
            a.push(v);
        }
    }
    (a, b)
}

/// External minus internal connection weight of every vertex.
fn external_gains(weight: &[Vec<f64>], side: &[bool]) -> Vec<f64> {
    let n = weight.len();
    (0..n)
        .map(|v| {
            (0..n)
                .map(|u| if side[u] != side[v] { weight[v][u] } else { -weight[v][u] })
                .sum()
        })
        .collect()
}

/// Move single vertices until side A (`false`) holds `⌈n/2⌉` of them,
/// always the one whose move lowers the cut most, ties to lowest index.
fn balance(weight: &[Vec<f64>], side: &mut [bool]) {
    let n = side.len();
    let target = n.div_ceil(2);
    loop {
        let in_a = side.iter().filter(|&&s| !s).count();
        if in_a == target {
            break;
        }
        let from = in_a < target;
        let d = external_gains(weight, side);
        let Some(v) = (0..n)
            .filter(|&v| side[v] == from)
            .max_by(|&x, &y| d[x].total_cmp(&d[y]).then(y.cmp(&x)))
        else {
            break;
        };
        side[v] = !from;
    }
}

fn refine(weight: &[Vec<f64>], side: &mut [bool]) {
    for _ in 0..side.len() {
        if !improve(weight, side) {
            break;
        }
    }
}

/// One Kernighan–Lin pass. Returns whether the cut improved.
fn improve(weight: &[Vec<f64>], side: &mut [bool]) -> bool {
    let n = weight.len();

    let mut d = external_gains(weight, side);

    let mut locked = vec![false; n];
    let mut swaps = vec![];
    let mut gains = vec![];
    let pairs = side.iter().filter(|&&s| s).count().min(side.iter().filter(|&&s| !s).count());

    for _ in 0..pairs {
        let mut best: Option<(f64, usize, usize)> = None;
        for a in (0..n).filter(|&a| !side[a] && !locked[a]) {
            for b in (0..n).filter(|&b| side[b] && !locked[b]) {
                let g = d[a] + d[b] - 2.0 * weight[a][b];
                if best.is_none_or(|(bg, _, _)| g > bg + GAIN_EPSILON) {
                    best = Some((g, a, b));
                }
            }
        }
        let Some((g, a, b)) = best else {
            break;
        };
        locked[a] = true;
        locked[b] = true;
        for x in 0..n {
            if locked[x] {
                continue;
            }
            if side[x] == side[a] {
                d[x] += 2.0 * weight[x][a] - 2.0 * weight[x][b];
            } else {
                d[x] += 2.0 * weight[x][b] - 2.0 * weight[x][a];
            }
        }
        swaps.push((a, b));
        gains.push(g);
    }

    let mut best_k = 0;
    let mut best_total = 0.0;
    let mut total = 0.0;
    for (k, g) in gains.iter().enumerate() {
        total += g;
        if total > best_total + GAIN_EPSILON {
            best_total = total;
            best_k = k + 1;
        }
    }
    if best_k == 0 {
        return false;
    }
    for &(a, b) in &swaps[..best_k] {
        side[a] = true;
        side[b] = false;
    }
    true
}

/// Balanced bisection of a whole graph.
pub fn bisect(graph: &CircuitGraph) -> CutResult<(Vec<usize>, Vec<usize>)> {
    let vertices: Vec<usize> = (0..graph.num_vertices()).collect();
    bisect_vertices(&graph.weighted_adjacency(), &vertices)
}

/// Split a graph into vertex sets of at most `max_fragment_size`.
///
/// Connected components are split by repeated bisection of the largest
/// set, then small sets are packed together first-fit decreasing. Sets
/// are sorted and ordered by their smallest vertex.
pub fn recursive_partition(graph: &CircuitGraph, max_fragment_size: usize) -> CutResult<Vec<Vec<usize>>> {
    if max_fragment_size < 1 {
        return Err(CutError::InfeasiblePartition(
            "max_fragment_size must be at least 1".into(),
        ));
    }

    let adjacency = graph.weighted_adjacency();
    let mut parts = graph.components();

    loop {
        let Some(largest) = parts
            .iter()
            .enumerate()
            .filter(|(_, p)| p.len() > max_fragment_size)
            .max_by(|(_, x), (_, y)| x.len().cmp(&y.len()).then(y[0].cmp(&x[0])))
            .map(|(i, _)| i)
        else {
            break;
        };
        let part = parts.swap_remove(largest);
        let (a, b) = bisect_vertices(&adjacency, &part)?;
        debug!("Bisected {} vertices into {} + {}", part.len(), a.len(), b.len());
        parts.push(a);
        parts.push(b);
    }

    // First-fit decreasing, ties by smallest vertex.
    parts.sort_by(|x, y| y.len().cmp(&x.len()).then(x[0].cmp(&y[0])));
    let mut bins: Vec<Vec<usize>> = vec![];
    for part in parts {
        match bins.iter_mut().find(|bin| bin.len() + part.len() <= max_fragment_size) {
            Some(bin) => bin.extend(part),
            None => bins.push(part),
        }
    }
    for bin in &mut bins {
        bin.sort_unstable();
    }
    bins.sort_by_key(|bin| bin[0]);
    Ok(bins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qknit_ir::{Circuit, QubitId};

    fn dumbbell() -> Circuit {
        // Two triangles joined by a single gate.
        let mut circuit = Circuit::with_size("dumbbell", 6, 0);
        for (a, b) in [(0, 1), (1, 2), (0, 2), (3, 4), (4, 5), (3, 5), (2, 3)] {
            circuit.cz(QubitId(a), QubitId(b)).unwrap();
        }
        circuit
    }

    #[test]
    fn test_bisect_finds_bridge() {
        let graph = CircuitGraph::from_qubits(&dumbbell());
        let (a, b) = bisect(&graph).unwrap();
        assert_eq!(a, vec![0, 1, 2]);
        assert_eq!(b, vec![3, 4, 5]);
    }

    #[test]
    fn test_kl_improves_bad_start() {
        // {0, 1} | {2, 3} splits both heavy pairs.
        let mut adjacency = vec![vec![]; 4];
        let mut link = |a: usize, b: usize, w: f64| {
            adjacency[a].push((b, w));
            adjacency[b].push((a, w));
        };
        link(0, 3, 5.0);
        link(1, 2, 5.0);
        link(0, 1, 1.0);
        link(2, 3, 1.0);
        let (a, b) = kernighan_lin(&adjacency, &[0, 1], &[2, 3]);
        assert_eq!(a, vec![1, 2]);
        assert_eq!(b, vec![0, 3]);

        let (a, b) = bisect_vertices(&adjacency, &[0, 1, 2, 3]).unwrap();
        assert_eq!(a, vec![0, 3]);
        assert_eq!(b, vec![1, 2]);
    }

    #[test]
    fn test_bisect_trivial_sets() {
        let adjacency = vec![vec![]; 3];
        assert_eq!(bisect_vertices(&adjacency, &[2]).unwrap(), (vec![2], vec![]));
        assert_eq!(bisect_vertices(&adjacency, &[]).unwrap(), (vec![], vec![]));
    }

    #[test]
    fn test_bisect_balances_sides() {
        // A heavy triangle plus two loose vertices: sizes stay 3 and 2.
        let mut adjacency = vec![vec![]; 5];
        for (a, b) in [(0, 1), (1, 2), (0, 2)] {
            adjacency[a].push((b, 4.0));
            adjacency[b].push((a, 4.0));
        }
        adjacency[2].push((3, 1.0));
        adjacency[3].push((2, 1.0));
        let (a, b) = bisect_vertices(&adjacency, &[0, 1, 2, 3, 4]).unwrap();
        assert_eq!(a, vec![0, 1, 2]);
        assert_eq!(b, vec![3, 4]);
    }

    #[test]
    fn test_balance_moves_cheapest_vertex() {
        // Everything starts on side B; 3 is the loosest, then 0.
        let mut weight = vec![vec![0.0; 4]; 4];
        for (a, b, w) in [(0, 1, 1.0), (1, 2, 3.0), (2, 3, 0.5)] {
            weight[a][b] = w;
            weight[b][a] = w;
        }
        let mut side = vec![true; 4];
        balance(&weight, &mut side);
        assert_eq!(side, vec![false, true, true, false]);
    }

    #[test]
    fn test_recursive_partition_respects_limit() {
        let graph = CircuitGraph::from_qubits(&dumbbell());
        for max in 1..=6 {
            let parts = recursive_partition(&graph, max).unwrap();
            let mut all: Vec<usize> = parts.iter().flatten().copied().collect();
            all.sort_unstable();
            assert_eq!(all, (0..6).collect::<Vec<_>>());
            assert!(parts.iter().all(|p| !p.is_empty() && p.len() <= max));
        }
    }

    #[test]
    fn test_recursive_partition_packs_components() {
        let mut circuit = Circuit::with_size("pairs", 4, 0);
        circuit.cz(QubitId(0), QubitId(1)).unwrap();
        circuit.cz(QubitId(2), QubitId(3)).unwrap();
        let graph = CircuitGraph::from_qubits(&circuit);

        let parts = recursive_partition(&graph, 4).unwrap();
        assert_eq!(parts, vec![vec![0, 1, 2, 3]]);
        let parts = recursive_partition(&graph, 3).unwrap();
        assert_eq!(parts, vec![vec![0, 1], vec![2, 3]]);
    }

    #[test]
    fn test_zero_size_is_infeasible() {
        let graph = CircuitGraph::from_qubits(&dumbbell());
        assert!(matches!(
            recursive_partition(&graph, 0),
            Err(CutError::InfeasiblePartition(_))
        ));
    }
}
