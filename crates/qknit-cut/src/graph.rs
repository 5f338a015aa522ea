//! Interaction graphs built from circuits.
//!
//! Two granularities are supported:
//!
//! - [`CircuitGraph::from_qubits`]: one vertex per qubit. Cutting an edge
//!   means virtualising the gates it counts.
//! - [`CircuitGraph::from_occurrences`]: one vertex per (qubit, two-qubit
//!   gate) occurrence. Gate edges join the two operands of a gate; wire
//!   edges join consecutive occurrences on a qubit, so cutting one is a
//!   wire cut.

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use std::f64::consts::LN_2;

use qknit_ir::{Circuit, InstructionKind, QubitId, StandardGate};

use crate::virtual_gate::VirtualGate;

/// Natural log of the instantiation count of a gate cut.
pub const GATE_CUT_COST: f64 = 2.584_962_500_721_156 * LN_2; // ln 6
/// Natural log of the instantiation count of a wire cut.
pub const WIRE_CUT_COST: f64 = 3.0 * LN_2; // ln 8
/// Penalty that keeps gates without a decomposition out of any cut.
pub const RIGID_CUT_COST: f64 = 1e6;

/// What a vertex stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vertex {
    /// A whole qubit.
    Qubit(QubitId),
    /// A qubit at one of its two-qubit gates.
    Occurrence {
        /// The qubit.
        qubit: QubitId,
        /// Instruction index of the gate.
        instruction: usize,
    },
    /// A qubit with no two-qubit gate, in an occurrence graph.
    Idle(QubitId),
}

impl Vertex {
    /// The qubit this vertex belongs to.
    pub fn qubit(&self) -> QubitId {
        match *self {
            Vertex::Qubit(q) | Vertex::Idle(q) => q,
            Vertex::Occurrence { qubit, .. } => qubit,
        }
    }
}

/// Multiplicity of an edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Coupling {
    /// Two-qubit gates with a decomposition.
    pub gates: usize,
    /// Consecutive occurrences on one qubit.
    pub wires: usize,
    /// Two-qubit gates that cannot be virtualised.
    pub rigid: usize,
}

impl Coupling {
    /// Log sampling overhead of cutting this edge.
    pub fn cost(&self) -> f64 {
        self.gates as f64 * GATE_CUT_COST
            + self.wires as f64 * WIRE_CUT_COST
            + self.rigid as f64 * RIGID_CUT_COST
    }

    fn add(&mut self, other: Coupling) {
        self.gates += other.gates;
        self.wires += other.wires;
        self.rigid += other.rigid;
    }
}

/// Undirected weighted interaction graph of a circuit.
#[derive(Debug, Clone)]
pub struct CircuitGraph {
    graph: UnGraph<Vertex, Coupling>,
    /// Wire predecessor of each vertex (occurrence graphs only).
    wire_pred: Vec<Option<usize>>,
}

fn gate_coupling(gate: &StandardGate) -> Coupling {
    match VirtualGate::from_standard(gate) {
        Ok(VirtualGate::Move) | Err(_) => Coupling {
            rigid: 1,
            ..Coupling::default()
        },
        Ok(_) => Coupling {
            gates: 1,
            ..Coupling::default()
        },
    }
}

impl CircuitGraph {
    /// One vertex per qubit, edges weighted by shared two-qubit gates.
    ///
    /// Gates already marked virtual contribute no edge.
    pub fn from_qubits(circuit: &Circuit) -> Self {
        let mut graph = UnGraph::with_capacity(circuit.num_qubits(), 0);
        for q in circuit.qubits() {
            graph.add_node(Vertex::Qubit(q));
        }
        let mut this = Self {
            wire_pred: vec![None; graph.node_count()],
            graph,
        };
        for inst in circuit.instructions() {
            if let InstructionKind::Gate(gate) = &inst.kind {
                if gate.num_qubits() == 2 {
                    this.couple(
                        inst.qubits[0].index(),
                        inst.qubits[1].index(),
                        gate_coupling(gate),
                    );
                }
            }
        }
        this
    }

    /// One vertex per two-qubit gate operand, plus one per idle qubit.
    ///
    /// Vertices are numbered in circuit order, so a vertex's wire
    /// predecessor always has a smaller index.
    pub fn from_occurrences(circuit: &Circuit) -> Self {
        let mut graph: UnGraph<Vertex, Coupling> = UnGraph::default();
        let mut wire_pred = vec![];
        let mut last: Vec<Option<NodeIndex>> = vec![None; circuit.num_qubits()];
        let mut pending = vec![];

        for (idx, inst) in circuit.instructions().iter().enumerate() {
            let InstructionKind::Gate(gate) = &inst.kind else {
                continue;
            };
            if gate.num_qubits() != 2 {
                continue;
            }
            let mut nodes = [NodeIndex::new(0); 2];
            for (slot, q) in inst.qubits.iter().enumerate() {
                let node = graph.add_node(Vertex::Occurrence {
                    qubit: *q,
                    instruction: idx,
                });
                wire_pred.push(last[q.index()].map(NodeIndex::index));
                if let Some(prev) = last[q.index()] {
                    pending.push((
                        prev,
                        node,
                        Coupling {
                            wires: 1,
                            ..Coupling::default()
                        },
                    ));
                }
                last[q.index()] = Some(node);
                nodes[slot] = node;
            }
            pending.push((nodes[0], nodes[1], gate_coupling(gate)));
        }

        for q in circuit.qubits() {
            if last[q.index()].is_none() {
                graph.add_node(Vertex::Idle(q));
                wire_pred.push(None);
            }
        }

        let mut this = Self { graph, wire_pred };
        for (a, b, coupling) in pending {
            this.couple(a.index(), b.index(), coupling);
        }
        this
    }

    fn couple(&mut self, a: usize, b: usize, coupling: Coupling) {
        let (na, nb) = (NodeIndex::new(a), NodeIndex::new(b));
        match self.graph.find_edge(na, nb) {
            Some(e) => self.graph[e].add(coupling),
            None => {
                self.graph.add_edge(na, nb, coupling);
            }
        }
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.graph.node_count()
    }

    /// Whether vertices are gate occurrences rather than qubits.
    pub fn is_occurrence_graph(&self) -> bool {
        self.graph
            .node_weights()
            .any(|v| !matches!(v, Vertex::Qubit(_)))
    }

    /// The vertex with index `v`.
    pub fn vertex(&self, v: usize) -> Vertex {
        self.graph[NodeIndex::new(v)]
    }

    /// Previous occurrence on the same qubit.
    pub fn wire_predecessor(&self, v: usize) -> Option<usize> {
        self.wire_pred[v]
    }

    /// Neighbours of `v` with the coupling to each.
    pub fn neighbors(&self, v: usize) -> impl Iterator<Item = (usize, Coupling)> + '_ {
        self.graph.edges(NodeIndex::new(v)).map(move |e| {
            let other = if e.source().index() == v {
                e.target()
            } else {
                e.source()
            };
            (other.index(), *e.weight())
        })
    }

    /// All edges as `(a, b, coupling)` with `a < b`.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize, Coupling)> + '_ {
        self.graph.edge_references().map(|e| {
            let (a, b) = (e.source().index(), e.target().index());
            (a.min(b), a.max(b), *e.weight())
        })
    }

    /// Adjacency lists with edge costs, for the local-search partitioners.
    pub fn weighted_adjacency(&self) -> Vec<Vec<(usize, f64)>> {
        let mut adj = vec![vec![]; self.num_vertices()];
        for (a, b, c) in self.edges() {
            adj[a].push((b, c.cost()));
            adj[b].push((a, c.cost()));
        }
        for list in &mut adj {
            list.sort_by_key(|&(v, _)| v);
        }
        adj
    }

    /// Connected components, each sorted, ordered by smallest vertex.
    pub fn components(&self) -> Vec<Vec<usize>> {
        let n = self.num_vertices();
        let mut uf = UnionFind::new(n);
        for (a, b, _) in self.edges() {
            uf.union(a, b);
        }
        let labels = uf.into_labeling();
        let mut groups: Vec<Vec<usize>> = vec![];
        let mut slot = vec![usize::MAX; n];
        for v in 0..n {
            let root = labels[v];
            if slot[root] == usize::MAX {
                slot[root] = groups.len();
                groups.push(vec![]);
            }
            groups[slot[root]].push(v);
        }
        groups
    }

    /// Total coupling across parts of an assignment.
    pub fn cut_coupling(&self, part_of: &[usize]) -> Coupling {
        let mut total = Coupling::default();
        for (a, b, c) in self.edges() {
            if part_of[a] != part_of[b] {
                total.add(c);
            }
        }
        total
    }

    /// Size of a vertex set: qubits, or wire segments on an occurrence graph.
    ///
    /// A segment is a maximal run of consecutive occurrences of one qubit
    /// inside the set; every segment becomes one qubit after lowering.
    pub fn part_size(&self, part: &[usize], part_of: &[usize]) -> usize {
        part.iter()
            .filter(|&&v| match self.wire_pred[v] {
                Some(p) => part_of[p] != part_of[v],
                None => true,
            })
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(n: u32) -> Circuit {
        let mut circuit = Circuit::with_size("chain", n, 0);
        for i in 0..n - 1 {
            circuit.cz(QubitId(i), QubitId(i + 1)).unwrap();
        }
        circuit
    }

    #[test]
    fn test_cut_costs() {
        assert!((GATE_CUT_COST - 6f64.ln()).abs() < 1e-12);
        assert!((WIRE_CUT_COST - 8f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_qubit_graph_weights() {
        let mut circuit = chain(3);
        circuit.cx(QubitId(0), QubitId(1)).unwrap();
        circuit
            .virtual_gate(StandardGate::CZ, QubitId(1), QubitId(2))
            .unwrap();

        let graph = CircuitGraph::from_qubits(&circuit);
        assert_eq!(graph.num_vertices(), 3);
        assert!(!graph.is_occurrence_graph());

        let edges: Vec<_> = graph.edges().collect();
        assert_eq!(edges.len(), 2);
        let e01 = edges.iter().find(|e| (e.0, e.1) == (0, 1)).unwrap();
        assert_eq!(e01.2.gates, 2);
        let e12 = edges.iter().find(|e| (e.0, e.1) == (1, 2)).unwrap();
        assert_eq!(e12.2.gates, 1);
    }

    #[test]
    fn test_unsupported_gates_are_rigid() {
        let mut circuit = Circuit::with_size("swap", 2, 0);
        circuit.swap(QubitId(0), QubitId(1)).unwrap();
        let graph = CircuitGraph::from_qubits(&circuit);
        let (_, _, c) = graph.edges().next().unwrap();
        assert_eq!(c.rigid, 1);
        assert!(c.cost() >= RIGID_CUT_COST);
    }

    #[test]
    fn test_occurrence_graph() {
        // q1 takes part in both gates, q3 is idle.
        let circuit = {
            let mut c = chain(3);
            c.add_qubit();
            c
        };
        let graph = CircuitGraph::from_occurrences(&circuit);
        assert!(graph.is_occurrence_graph());
        // 2 gates x 2 operands + 1 idle qubit
        assert_eq!(graph.num_vertices(), 5);
        assert_eq!(graph.vertex(4), Vertex::Idle(QubitId(3)));

        // Vertex 1 is q1 at gate 0, vertex 2 is q1 at gate 1.
        assert_eq!(graph.vertex(2).qubit(), QubitId(1));
        assert_eq!(graph.wire_predecessor(2), Some(1));
        assert_eq!(graph.wire_predecessor(1), None);

        let wires: usize = graph.edges().map(|(_, _, c)| c.wires).sum();
        let gates: usize = graph.edges().map(|(_, _, c)| c.gates).sum();
        assert_eq!(wires, 1);
        assert_eq!(gates, 2);
    }

    #[test]
    fn test_components() {
        let mut circuit = Circuit::with_size("two", 4, 0);
        circuit.cz(QubitId(0), QubitId(2)).unwrap();
        circuit.cz(QubitId(1), QubitId(3)).unwrap();
        let graph = CircuitGraph::from_qubits(&circuit);
        assert_eq!(graph.components(), vec![vec![0, 2], vec![1, 3]]);
    }

    #[test]
    fn test_segments() {
        let graph = CircuitGraph::from_occurrences(&chain(3));
        // Cut the wire of q1 between its two gates.
        let part_of = vec![0, 0, 1, 1];
        assert_eq!(graph.part_size(&[0, 1], &part_of), 2);
        assert_eq!(graph.part_size(&[2, 3], &part_of), 2);
        let cut = graph.cut_coupling(&part_of);
        assert_eq!((cut.gates, cut.wires), (0, 1));

        // Keep q1 whole: one segment.
        let part_of = vec![0, 0, 0, 1];
        assert_eq!(graph.part_size(&[0, 1, 2], &part_of), 2);
    }
}
