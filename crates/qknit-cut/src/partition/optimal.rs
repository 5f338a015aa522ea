//! Exact partition search by branch and bound.
//!
//! Vertices are assigned in index order. A vertex may join any part that
//! is already open or open the next one, which removes part relabelings
//! from the search. The incumbent's cost bounds every branch.

use tracing::{debug, warn};

use crate::error::{CutError, CutResult};
use crate::graph::{CircuitGraph, Coupling};

const COST_EPSILON: f64 = 1e-9;

/// Upper bounds on the cuts a partition may introduce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CutBudget {
    /// Gates that may be virtualised.
    pub gates: usize,
    /// Wires that may be cut.
    pub wires: usize,
}

struct Search<'a> {
    graph: &'a CircuitGraph,
    /// Neighbours with a smaller index, which are assigned first.
    earlier: Vec<Vec<(usize, Coupling)>>,
    k: usize,
    max_size: usize,
    budget: CutBudget,
    limit: u64,
    nodes: u64,
    exhausted: bool,
    part_of: Vec<usize>,
    sizes: Vec<usize>,
    best: Option<(f64, Vec<usize>)>,
}

impl Search<'_> {
    fn best_cost(&self) -> f64 {
        self.best.as_ref().map_or(f64::INFINITY, |(c, _)| *c)
    }

    fn visit(&mut self, v: usize, used: usize, cost: f64, gates: usize, wires: usize) {
        self.nodes += 1;
        if self.nodes > self.limit {
            self.exhausted = true;
            return;
        }

        let n = self.part_of.len();
        if v == n {
            if used == self.k && cost < self.best_cost() - COST_EPSILON {
                self.best = Some((cost, self.part_of.clone()));
            }
            return;
        }
        if self.k - used > n - v {
            return;
        }

        let mut connection = vec![0.0; used];
        for &(u, c) in &self.earlier[v] {
            connection[self.part_of[u]] += c.cost();
        }
        let mut candidates: Vec<usize> = (0..used).collect();
        candidates.sort_by(|&a, &b| {
            connection[b]
                .partial_cmp(&connection[a])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });
        if used < self.k {
            candidates.push(used);
        }

        for p in candidates {
            let grows = match self.graph.wire_predecessor(v) {
                Some(u) => self.part_of[u] != p,
                None => true,
            };
            let size = self.sizes[p] + usize::from(grows);
            if size > self.max_size {
                continue;
            }

            let mut added = Coupling::default();
            for &(u, c) in &self.earlier[v] {
                if self.part_of[u] != p {
                    added.gates += c.gates;
                    added.wires += c.wires;
                    added.rigid += c.rigid;
                }
            }
            if added.rigid > 0
                || gates + added.gates > self.budget.gates
                || wires + added.wires > self.budget.wires
            {
                continue;
            }
            let next_cost = cost + added.cost();
            if next_cost >= self.best_cost() - COST_EPSILON {
                continue;
            }

            let previous = self.sizes[p];
            self.part_of[v] = p;
            self.sizes[p] = size;
            self.visit(
                v + 1,
                used.max(p + 1),
                next_cost,
                gates + added.gates,
                wires + added.wires,
            );
            self.sizes[p] = previous;
            self.part_of[v] = usize::MAX;

            if self.exhausted {
                return;
            }
        }
    }
}

/// Minimum-overhead partition into exactly `num_fragments` parts.
///
/// Part sizes are counted with [`CircuitGraph::part_size`], so on an
/// occurrence graph they are wire segments. Cuts through rigid edges are
/// never taken. When `search_limit` nodes have been expanded the best
/// partition found so far is returned.
pub fn optimal_partition(
    graph: &CircuitGraph,
    num_fragments: usize,
    max_fragment_size: usize,
    budget: CutBudget,
    search_limit: u64,
) -> CutResult<Vec<Vec<usize>>> {
    let n = graph.num_vertices();
    let k = num_fragments;
    if k == 0 || k > n || max_fragment_size == 0 {
        return Err(CutError::InfeasiblePartition(format!(
            "cannot split {n} vertices into {k} fragments of at most {max_fragment_size}"
        )));
    }

    let mut earlier = vec![vec![]; n];
    for (a, b, c) in graph.edges() {
        earlier[b].push((a, c));
    }
    for list in &mut earlier {
        list.sort_by_key(|&(u, _)| u);
    }

    let mut search = Search {
        graph,
        earlier,
        k,
        max_size: max_fragment_size,
        budget,
        limit: search_limit,
        nodes: 0,
        exhausted: false,
        part_of: vec![usize::MAX; n],
        sizes: vec![0; k],
        best: None,
    };
    search.visit(0, 0, 0.0, 0, 0);

    debug!(
        "Exact search over {n} vertices into {k} parts expanded {} nodes",
        search.nodes
    );

    let Some((cost, part_of)) = search.best else {
        let reason = if search.exhausted {
            format!("search budget of {search_limit} nodes exhausted before a feasible partition was found")
        } else {
            format!(
                "no split into {k} fragments of at most {max_fragment_size} within {} gate and {} wire cuts",
                budget.gates, budget.wires
            )
        };
        return Err(CutError::InfeasiblePartition(reason));
    };
    if search.exhausted {
        warn!(
            "Exact search budget of {search_limit} nodes exhausted; using best partition found (cost {cost:.3})"
        );
    }

    let mut parts = vec![vec![]; k];
    for (v, &p) in part_of.iter().enumerate() {
        parts[p].push(v);
    }
    parts.sort_by_key(|part| part[0]);
    Ok(parts)
}
