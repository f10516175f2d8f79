//! Combinational-loop (SCC) detection and deterministic loop-breaking (§4.9).
//!
//! Runs Tarjan's algorithm over the graph's *enabled* edges via
//! [`petgraph::algo::tarjan_scc`], matching the source's
//! `identify_strongly_connected_components` (`base/loop_detect.hpp`). Any
//! strongly connected component of two or more nodes is a combinational
//! loop (§3.1 invariant 2): [`levelize_with_policy`] either reports it as a
//! fatal [`TimingError::Cycle`] or disables a deterministic feedback edge
//! per SCC (smallest edge id) and retries, matching §4.1's "fails if cycles
//! remain after loop-breaking policy has run".

use crate::error::TimingError;
use crate::graph::TimingGraph;
use crate::ids::{Idx, TimingEdgeId, TimingNodeId};
use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use std::collections::HashSet;

/// What [`levelize_with_policy`] does when [`TimingGraph::levelize`] leaves
/// nodes unordered (a combinational loop).
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum LoopBreakPolicy {
    /// Report the cycle as a fatal [`TimingError::Cycle`] and leave the
    /// graph unmodified.
    #[default]
    Fatal,
    /// Disable one edge per offending strongly connected component
    /// (smallest edge id, §4.1) and retry until the graph levelizes or no
    /// further progress can be made.
    Break,
}

/// The minimum strongly-connected-component size considered a
/// combinational loop (§4.9 default).
pub const DEFAULT_MIN_LOOP_SIZE: usize = 2;

/// Builds a throwaway [`DiGraphMap`] over `graph`'s enabled edges and runs
/// Tarjan's algorithm on it, returning every strongly connected component
/// with at least `min_size` nodes. Node order within each SCC is sorted by
/// dense id for determinism; the order of SCCs themselves follows
/// petgraph's reverse-topological discovery order.
pub fn find_loops(graph: &TimingGraph, min_size: usize) -> Vec<Vec<TimingNodeId>> {
    let mut g: DiGraphMap<u32, ()> = DiGraphMap::with_capacity(graph.node_count(), graph.edge_count());
    for node in graph.nodes() {
        g.add_node(node.as_raw());
    }
    for edge in graph.edges() {
        if graph.edge_disabled(edge) {
            continue;
        }
        g.add_edge(
            graph.edge_src_node(edge).as_raw(),
            graph.edge_sink_node(edge).as_raw(),
            (),
        );
    }

    tarjan_scc(&g)
        .into_iter()
        .filter(|scc| scc.len() >= min_size)
        .map(|scc| {
            let mut nodes: Vec<TimingNodeId> = scc.into_iter().map(TimingNodeId::from_raw).collect();
            nodes.sort_by_key(|n| n.as_raw());
            nodes
        })
        .collect()
}

/// The smallest-id enabled edge with both endpoints inside `scc`, the
/// deterministic feedback edge §4.1 disables to break one loop.
fn smallest_internal_edge(graph: &TimingGraph, scc: &[TimingNodeId]) -> Option<TimingEdgeId> {
    let members: HashSet<TimingNodeId> = scc.iter().copied().collect();
    let mut best: Option<TimingEdgeId> = None;
    for &node in scc {
        for &edge in graph.node_out_edges(node) {
            if graph.edge_disabled(edge) {
                continue;
            }
            let is_smaller = match best {
                Some(b) => edge.as_raw() < b.as_raw(),
                None => true,
            };
            if members.contains(&graph.edge_sink_node(edge)) && is_smaller {
                best = Some(edge);
            }
        }
    }
    best
}

fn cycle_error(graph: &TimingGraph, sccs: &[Vec<TimingNodeId>]) -> TimingError {
    let total_nodes: usize = sccs.iter().map(|s| s.len()).sum();
    let mut edges = Vec::new();
    for scc in sccs {
        let members: HashSet<TimingNodeId> = scc.iter().copied().collect();
        for &node in scc {
            for &edge in graph.node_out_edges(node) {
                if !graph.edge_disabled(edge) && members.contains(&graph.edge_sink_node(edge)) {
                    edges.push(edge);
                }
            }
        }
    }
    edges.sort_by_key(|e| e.as_raw());
    edges.dedup();
    TimingError::Cycle(total_nodes, edges)
}

/// Levelizes `graph` under a [`LoopBreakPolicy`], returning the edges
/// disabled to break loops (empty if the graph was already acyclic).
///
/// Iterates detect-and-break rounds until the graph levelizes cleanly,
/// bounded by `graph.edge_count() + 1` rounds (each round disables at least
/// one edge, so this always terminates).
pub fn levelize_with_policy(
    graph: &mut TimingGraph,
    policy: LoopBreakPolicy,
) -> Result<Vec<TimingEdgeId>, TimingError> {
    let mut disabled = Vec::new();
    let max_rounds = graph.edge_count() + 1;

    for _ in 0..=max_rounds {
        let unlevelized = graph.levelize();
        if unlevelized.is_empty() {
            return Ok(disabled);
        }

        let sccs = find_loops(graph, DEFAULT_MIN_LOOP_SIZE);
        if sccs.is_empty() {
            return Err(TimingError::Structural(
                "levelize left unordered nodes but no strongly connected component was found".into(),
            ));
        }

        match policy {
            LoopBreakPolicy::Fatal => return Err(cycle_error(graph, &sccs)),
            LoopBreakPolicy::Break => {
                let mut progressed = false;
                for scc in &sccs {
                    if let Some(edge) = smallest_internal_edge(graph, scc) {
                        graph.disable_edge(edge, true);
                        disabled.push(edge);
                        progressed = true;
                    }
                }
                if !progressed {
                    return Err(cycle_error(graph, &sccs));
                }
            }
        }
    }

    Err(TimingError::Structural(
        "loop-break policy did not converge within the edge-count bound".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{TimingEdgeType, TimingNodeType};

    fn triangle_loop() -> TimingGraph {
        let mut g = TimingGraph::new();
        let a = g.add_node(TimingNodeType::Ipin);
        let b = g.add_node(TimingNodeType::Ipin);
        let c = g.add_node(TimingNodeType::Ipin);
        g.add_edge(TimingEdgeType::PrimitiveCombinational, a, b);
        g.add_edge(TimingEdgeType::PrimitiveCombinational, b, c);
        g.add_edge(TimingEdgeType::PrimitiveCombinational, c, a);
        g
    }

    #[test]
    fn acyclic_graph_has_no_loops() {
        let mut g = TimingGraph::new();
        let a = g.add_node(TimingNodeType::Source);
        let b = g.add_node(TimingNodeType::Sink);
        g.add_edge(TimingEdgeType::PrimitiveCombinational, a, b);
        assert!(find_loops(&g, 2).is_empty());
    }

    #[test]
    fn triangle_is_one_scc_of_three() {
        let g = triangle_loop();
        let sccs = find_loops(&g, 2);
        assert_eq!(sccs.len(), 1);
        assert_eq!(sccs[0].len(), 3);
    }

    #[test]
    fn fatal_policy_reports_cycle_and_leaves_graph_untouched() {
        let mut g = triangle_loop();
        let err = levelize_with_policy(&mut g, LoopBreakPolicy::Fatal).unwrap_err();
        match err {
            TimingError::Cycle(n, edges) => {
                assert_eq!(n, 3);
                assert_eq!(edges.len(), 3);
            }
            other => panic!("expected Cycle, got {other:?}"),
        }
        assert!(!g.edge_disabled(TimingEdgeId::from_raw(0)));
    }

    #[test]
    fn break_policy_disables_smallest_edge_and_levelizes() {
        let mut g = triangle_loop();
        let disabled = levelize_with_policy(&mut g, LoopBreakPolicy::Break).unwrap();
        assert_eq!(disabled, vec![TimingEdgeId::from_raw(0)]);
        assert!(g.edge_disabled(TimingEdgeId::from_raw(0)));
        assert!(g.is_levelized());
    }

    #[test]
    fn break_policy_is_idempotent_on_already_acyclic_graph() {
        let mut g = TimingGraph::new();
        let a = g.add_node(TimingNodeType::Source);
        let b = g.add_node(TimingNodeType::Sink);
        g.add_edge(TimingEdgeType::PrimitiveCombinational, a, b);
        let disabled = levelize_with_policy(&mut g, LoopBreakPolicy::Break).unwrap();
        assert!(disabled.is_empty());
    }
}
