//! Schedule analysis over a committed graph
//!
//! Derives everything the executor needs for one run: per-node indegree and
//! fanout over the data edges, the authoritative source of each input slot,
//! the control edges implied by conditional nodes, and a proof that the edge
//! set is acyclic (Kahn's algorithm).

use log::{debug, trace};
use std::collections::{HashMap, VecDeque};

use crate::errors::{GraphError, Result};
use crate::graph::{Graph, NodeId};

/// A data edge that also gates its target because its source is conditional
///
/// `condition` is true for edges leaving port 0 (the `then` port): the target
/// runs only when the controlling node's first output is true.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlEdge {
    pub if_node: NodeId,
    pub port: usize,
    pub target: NodeId,
    pub condition: bool,
}

/// Derived per-run schedule data, indexed densely
///
/// `ids` fixes the dense index of every node for this run; all other fields
/// are keyed by that index. Tie order in the topological frontier follows the
/// iteration order of the node map and carries no contract.
#[derive(Debug)]
pub struct Schedule {
    pub ids: Vec<NodeId>,
    pub index_of: HashMap<NodeId, usize>,
    pub indegree: Vec<usize>,
    pub fanout: Vec<Vec<usize>>,
    /// `input_map[node][slot]` = (source index, source output), last write
    /// wins; `None` means the slot keeps its pre-seeded zero.
    pub input_map: Vec<Vec<Option<(usize, usize)>>>,
    /// First conditional binding per node in input-slot order:
    /// (conditional's index, required value of its `then` output).
    pub gates: Vec<Option<(usize, bool)>>,
    pub control_edges: Vec<ControlEdge>,
}

impl Schedule {
    /// Analyze the committed edge set, refusing cyclic graphs
    pub fn analyze(graph: &Graph) -> Result<Self> {
        let ids: Vec<NodeId> = graph.nodes.keys().copied().collect();
        let index_of: HashMap<NodeId, usize> =
            ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        let n = ids.len();

        let mut indegree = vec![0usize; n];
        let mut fanout: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut input_map: Vec<Vec<Option<(usize, usize)>>> = ids
            .iter()
            .map(|id| vec![None; graph.nodes[id].ty.inputs.len()])
            .collect();
        let mut control_edges = Vec::new();

        for edge in &graph.edges {
            let from = index_of[&edge.from];
            let to = index_of[&edge.to];
            indegree[to] += 1;
            fanout[from].push(to);
            input_map[to][edge.to_in] = Some((from, edge.from_out));

            if graph.nodes[&edge.from].ty.is_conditional() {
                let control = ControlEdge {
                    if_node: edge.from,
                    port: edge.from_out,
                    target: edge.to,
                    condition: edge.from_out == 0,
                };
                trace!(
                    "control edge: {} port {} gates {} (condition {})",
                    control.if_node,
                    control.port,
                    control.target,
                    control.condition
                );
                control_edges.push(control);
            }
        }

        let mut gates = vec![None; n];
        for idx in 0..n {
            for slot in &input_map[idx] {
                if let Some((src, port)) = *slot {
                    if graph.nodes[&ids[src]].ty.is_conditional() {
                        gates[idx] = Some((src, port == 0));
                        break;
                    }
                }
            }
        }

        // Kahn's algorithm: any node left with unmet dependencies after the
        // queue drains sits on a cycle.
        let mut remaining = indegree.clone();
        let mut queue: VecDeque<usize> = (0..n).filter(|&i| remaining[i] == 0).collect();
        let mut visited = 0usize;
        while let Some(idx) = queue.pop_front() {
            visited += 1;
            for &dep in &fanout[idx] {
                remaining[dep] -= 1;
                if remaining[dep] == 0 {
                    queue.push_back(dep);
                }
            }
        }
        if visited != n {
            return Err(GraphError::CycleDetected {
                unresolved: n - visited,
            });
        }

        debug!(
            "schedule: {} node(s), {} control edge(s)",
            n,
            control_edges.len()
        );
        Ok(Self {
            ids,
            index_of,
            indegree,
            fanout,
            input_map,
            gates,
            control_edges,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indegree_and_input_map() {
        let mut graph = Graph::new();
        graph.add_node(1, "Number", None).unwrap();
        graph.add_node(2, "Number", None).unwrap();
        graph.add_node(3, "AddNumber", None).unwrap();
        graph.connect(1, 0, 3, 0).unwrap();
        graph.connect(2, 0, 3, 1).unwrap();

        let schedule = Schedule::analyze(&graph).unwrap();
        let add = schedule.index_of[&3];
        let one = schedule.index_of[&1];
        let two = schedule.index_of[&2];
        assert_eq!(schedule.indegree[add], 2);
        assert_eq!(schedule.indegree[one], 0);
        assert_eq!(schedule.input_map[add][0], Some((one, 0)));
        assert_eq!(schedule.input_map[add][1], Some((two, 0)));
        assert!(schedule.control_edges.is_empty());
        assert_eq!(schedule.gates[add], None);
    }

    #[test]
    fn test_rebinding_a_slot_is_last_write_wins() {
        let mut graph = Graph::new();
        graph.add_node(1, "Number", None).unwrap();
        graph.add_node(2, "Number", None).unwrap();
        graph.add_node(3, "OutputNumber", None).unwrap();
        graph.connect(1, 0, 3, 0).unwrap();
        graph.connect(2, 0, 3, 0).unwrap();

        let schedule = Schedule::analyze(&graph).unwrap();
        let sink = schedule.index_of[&3];
        let second = schedule.index_of[&2];
        assert_eq!(schedule.input_map[sink][0], Some((second, 0)));
        // Both edges still count toward precedence.
        assert_eq!(schedule.indegree[sink], 2);
    }

    #[test]
    fn test_unbound_slots_stay_unbound() {
        let mut graph = Graph::new();
        graph.add_node(1, "Number", None).unwrap();
        graph.add_node(2, "AddNumber", None).unwrap();
        graph.connect(1, 0, 2, 1).unwrap();

        let schedule = Schedule::analyze(&graph).unwrap();
        let add = schedule.index_of[&2];
        assert_eq!(schedule.input_map[add][0], None);
        assert!(schedule.input_map[add][1].is_some());
    }

    #[test]
    fn test_control_edges_derive_from_conditional_source() {
        let mut graph = Graph::new();
        graph.add_node(1, "Bool", None).unwrap();
        graph.add_node(2, "If", None).unwrap();
        graph.add_node(3, "AddNumber", None).unwrap();
        graph.add_node(4, "Multiply", None).unwrap();
        graph.connect(1, 0, 2, 0).unwrap();
        graph.connect(2, 0, 3, 0).unwrap();
        graph.connect(2, 1, 4, 0).unwrap();

        let schedule = Schedule::analyze(&graph).unwrap();
        assert_eq!(schedule.control_edges.len(), 2);
        let then_edge = schedule
            .control_edges
            .iter()
            .find(|c| c.target == 3)
            .unwrap();
        assert!(then_edge.condition);
        let else_edge = schedule
            .control_edges
            .iter()
            .find(|c| c.target == 4)
            .unwrap();
        assert!(!else_edge.condition);

        assert_eq!(
            schedule.gates[schedule.index_of[&3]],
            Some((schedule.index_of[&2], true))
        );
        assert_eq!(
            schedule.gates[schedule.index_of[&4]],
            Some((schedule.index_of[&2], false))
        );
        // The If itself is gated by nothing.
        assert_eq!(schedule.gates[schedule.index_of[&2]], None);
    }

    #[test]
    fn test_cycle_is_refused() {
        let mut graph = Graph::new();
        graph.add_node(1, "AddNumber", None).unwrap();
        graph.add_node(2, "AddNumber", None).unwrap();
        graph.connect(1, 0, 2, 0).unwrap();
        graph.connect(2, 0, 1, 0).unwrap();

        let err = Schedule::analyze(&graph).unwrap_err();
        assert_eq!(err, GraphError::CycleDetected { unresolved: 2 });
    }

    #[test]
    fn test_empty_graph_schedules_cleanly() {
        let graph = Graph::new();
        let schedule = Schedule::analyze(&graph).unwrap();
        assert!(schedule.ids.is_empty());
    }
}
