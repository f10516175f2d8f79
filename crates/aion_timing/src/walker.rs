//! Level-barrier graph walkers: serial and parallel implementations
//! orchestrating the six profiled traversal phases per §4.6 (reset, arrival
//! pre-traversal, arrival traversal, required pre-traversal, required
//! traversal, slack update — matching the source's `TimingGraphWalker`'s six
//! `do_*` methods one-for-one).

use crate::constraints::TimingConstraints;
use crate::delay::DelayCalculator;
use crate::error::TimingError;
use crate::graph::TimingGraph;
use crate::ids::{IdVec, TimingEdgeId, TimingNodeId};
use crate::ops::{self, AnalysisOps};
use crate::tag::{MergeOp, TimingTags};
use rayon::prelude::*;
use std::collections::HashMap;
use std::time::Instant;

/// Per-node tag storage plus node/edge slack storage for one analysis
/// variant (one `Ops` specialization).
#[derive(Clone, Debug, Default)]
pub struct AnalysisState {
    pub tags: IdVec<TimingNodeId, TimingTags>,
    pub node_slacks: IdVec<TimingNodeId, TimingTags>,
    pub edge_slacks: IdVec<TimingEdgeId, TimingTags>,
}

impl AnalysisState {
    /// Allocates empty tag/slack storage sized to `graph`.
    pub fn for_graph(graph: &TimingGraph) -> Self {
        Self {
            tags: IdVec::with_len_filled(graph.node_count(), TimingTags::new),
            node_slacks: IdVec::with_len_filled(graph.node_count(), TimingTags::new),
            edge_slacks: IdVec::with_len_filled(graph.edge_count(), TimingTags::new),
        }
    }
}

/// Wall-clock time spent in each of the six profiled traversal phases of the
/// most recent `update`, queryable by name rather than printed (§9 — no
/// logging framework is used for this; the data is exposed as a structured
/// result instead).
#[derive(Clone, Debug, Default)]
pub struct WalkerProfile {
    data: HashMap<&'static str, f64>,
}

impl WalkerProfile {
    fn record(&mut self, phase: &'static str, started: Instant) {
        self.data.insert(phase, started.elapsed().as_secs_f64());
    }

    /// Seconds spent in `phase` during the last run, or `NaN` if `phase`
    /// was never recorded (unknown key).
    pub fn seconds(&self, phase: &str) -> f64 {
        self.data.get(phase).copied().unwrap_or(f64::NAN)
    }
}

/// The six profiled phase names, in traversal order.
pub const PHASES: [&str; 6] = [
    "reset_sec",
    "arrival_pre_traversal_sec",
    "arrival_traversal_sec",
    "required_pre_traversal_sec",
    "required_traversal_sec",
    "slack_sec",
];

fn apply<K: crate::ids::Idx>(tags: &mut IdVec<K, TimingTags>, id: K, candidates: Vec<crate::tag::TimingTag>, merge: MergeOp) {
    for tag in candidates {
        tags[id].insert_or_merge(tag, merge);
    }
}

/// Orchestrates a level-wise forward (arrival) and reverse (required)
/// traversal of a [`TimingGraph`], invoking [`AnalysisOps`] per node/edge.
pub trait GraphWalker: Default {
    /// Runs the full six-phase update, recording phase timings in `profile`.
    /// Returns the first fatal error encountered (a non-finite delay from
    /// the delay calculator on a live edge).
    fn update<Ops: AnalysisOps>(
        graph: &TimingGraph,
        constraints: &TimingConstraints,
        dc: &dyn DelayCalculator,
        state: &mut AnalysisState,
        profile: &mut WalkerProfile,
    ) -> Result<(), TimingError>;
}

/// Single-threaded baseline walker: visits nodes in dense id order within
/// each level.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialWalker;

impl GraphWalker for SerialWalker {
    fn update<Ops: AnalysisOps>(
        graph: &TimingGraph,
        constraints: &TimingConstraints,
        dc: &dyn DelayCalculator,
        state: &mut AnalysisState,
        profile: &mut WalkerProfile,
    ) -> Result<(), TimingError> {
        let t = Instant::now();
        for tags in state.tags.as_mut_slice() {
            ops::reset_node(tags);
        }
        for s in state.node_slacks.as_mut_slice() {
            s.clear();
        }
        for s in state.edge_slacks.as_mut_slice() {
            s.clear();
        }
        profile.record("reset_sec", t);

        let t = Instant::now();
        for node in graph.nodes() {
            let c = ops::compute_arrival_pre_traverse::<Ops>(node, graph, constraints);
            apply(&mut state.tags, node, c, Ops::ARRIVAL_MERGE);
        }
        profile.record("arrival_pre_traversal_sec", t);

        let t = Instant::now();
        for level in graph.levels() {
            for &node in graph.level_nodes(level) {
                let c = ops::compute_arrival_traverse::<Ops>(node, graph, dc, &state.tags)?;
                apply(&mut state.tags, node, c, Ops::ARRIVAL_MERGE);
            }
        }
        profile.record("arrival_traversal_sec", t);

        let t = Instant::now();
        for node in graph.nodes() {
            let c = ops::compute_required_pre_traverse::<Ops>(node, graph, constraints, dc, &state.tags)?;
            apply(&mut state.tags, node, c, Ops::REQUIRED_MERGE);
        }
        profile.record("required_pre_traversal_sec", t);

        let t = Instant::now();
        let levels: Vec<_> = graph.levels().collect();
        for &level in levels.iter().rev() {
            for &node in graph.level_nodes(level) {
                let c = ops::compute_required_traverse::<Ops>(node, graph, dc, &state.tags)?;
                apply(&mut state.tags, node, c, Ops::REQUIRED_MERGE);
            }
        }
        profile.record("required_traversal_sec", t);

        let t = Instant::now();
        for node in graph.nodes() {
            let c = ops::compute_node_slack::<Ops>(node, &state.tags);
            apply(&mut state.node_slacks, node, c, MergeOp::Min);
        }
        for edge in graph.edges() {
            let c = ops::compute_edge_slack::<Ops>(edge, graph, dc, &state.tags)?;
            apply(&mut state.edge_slacks, edge, c, MergeOp::Min);
        }
        profile.record("slack_sec", t);

        Ok(())
    }
}

/// Rayon-backed walker: within each level, nodes (or, for the whole-graph
/// phases, all nodes/edges) are processed concurrently; synchronization is
/// at level boundaries only, matching the per-level barrier the algorithm
/// requires (a node's traversal needs every predecessor's tags finalized,
/// which level order alone guarantees).
#[derive(Clone, Copy, Debug, Default)]
pub struct ParallelWalker;

impl GraphWalker for ParallelWalker {
    fn update<Ops: AnalysisOps>(
        graph: &TimingGraph,
        constraints: &TimingConstraints,
        dc: &dyn DelayCalculator,
        state: &mut AnalysisState,
        profile: &mut WalkerProfile,
    ) -> Result<(), TimingError> {
        let t = Instant::now();
        state.tags.as_mut_slice().par_iter_mut().for_each(ops::reset_node);
        state.node_slacks.as_mut_slice().par_iter_mut().for_each(|s| s.clear());
        state.edge_slacks.as_mut_slice().par_iter_mut().for_each(|s| s.clear());
        profile.record("reset_sec", t);

        let t = Instant::now();
        let all_nodes: Vec<TimingNodeId> = graph.nodes().collect();
        let pending: Vec<_> = all_nodes
            .par_iter()
            .map(|&node| (node, ops::compute_arrival_pre_traverse::<Ops>(node, graph, constraints)))
            .collect();
        for (node, c) in pending {
            apply(&mut state.tags, node, c, Ops::ARRIVAL_MERGE);
        }
        profile.record("arrival_pre_traversal_sec", t);

        let t = Instant::now();
        for level in graph.levels() {
            let nodes = graph.level_nodes(level);
            let pending: Vec<_> = nodes
                .par_iter()
                .map(|&node| (node, ops::compute_arrival_traverse::<Ops>(node, graph, dc, &state.tags)))
                .collect();
            for (node, c) in pending {
                apply(&mut state.tags, node, c?, Ops::ARRIVAL_MERGE);
            }
        }
        profile.record("arrival_traversal_sec", t);

        let t = Instant::now();
        let pending: Vec<_> = all_nodes
            .par_iter()
            .map(|&node| (node, ops::compute_required_pre_traverse::<Ops>(node, graph, constraints, dc, &state.tags)))
            .collect();
        for (node, c) in pending {
            apply(&mut state.tags, node, c?, Ops::REQUIRED_MERGE);
        }
        profile.record("required_pre_traversal_sec", t);

        let t = Instant::now();
        let levels: Vec<_> = graph.levels().collect();
        for &level in levels.iter().rev() {
            let nodes = graph.level_nodes(level);
            let pending: Vec<_> = nodes
                .par_iter()
                .map(|&node| (node, ops::compute_required_traverse::<Ops>(node, graph, dc, &state.tags)))
                .collect();
            for (node, c) in pending {
                apply(&mut state.tags, node, c?, Ops::REQUIRED_MERGE);
            }
        }
        profile.record("required_traversal_sec", t);

        let t = Instant::now();
        let pending: Vec<_> = all_nodes
            .par_iter()
            .map(|&node| (node, ops::compute_node_slack::<Ops>(node, &state.tags)))
            .collect();
        for (node, c) in pending {
            apply(&mut state.node_slacks, node, c, MergeOp::Min);
        }
        let all_edges: Vec<TimingEdgeId> = graph.edges().collect();
        let pending: Vec<_> = all_edges
            .par_iter()
            .map(|&edge| (edge, ops::compute_edge_slack::<Ops>(edge, graph, dc, &state.tags)))
            .collect();
        for (edge, c) in pending {
            apply(&mut state.edge_slacks, edge, c?, MergeOp::Min);
        }
        profile.record("slack_sec", t);

        Ok(())
    }
}

/// Finds every node reachable backward from `from` along enabled edges (the
/// transitive fan-in), used by incremental invalidation to scope which
/// nodes a dirty edge/node can affect on the arrival side. Supplemented from
/// `find_transitive_fanin_nodes` (`base/sta_util.hpp`).
pub fn find_transitive_fanin_nodes(graph: &TimingGraph, from: TimingNodeId) -> Vec<TimingNodeId> {
    let mut visited = vec![false; graph.node_count()];
    let mut stack = vec![from];
    let mut result = Vec::new();
    while let Some(node) = stack.pop() {
        let idx = node.as_raw() as usize;
        if visited[idx] {
            continue;
        }
        visited[idx] = true;
        result.push(node);
        for &edge in graph.node_in_edges(node) {
            if graph.edge_disabled(edge) {
                continue;
            }
            stack.push(graph.edge_src_node(edge));
        }
    }
    result
}

/// Finds every node reachable forward from `from` along enabled edges (the
/// transitive fan-out), used to scope the required-side dirty set.
pub fn find_transitive_fanout_nodes(graph: &TimingGraph, from: TimingNodeId) -> Vec<TimingNodeId> {
    let mut visited = vec![false; graph.node_count()];
    let mut stack = vec![from];
    let mut result = Vec::new();
    while let Some(node) = stack.pop() {
        let idx = node.as_raw() as usize;
        if visited[idx] {
            continue;
        }
        visited[idx] = true;
        result.push(node);
        for &edge in graph.node_out_edges(node) {
            if graph.edge_disabled(edge) {
                continue;
            }
            stack.push(graph.edge_sink_node(edge));
        }
    }
    result
}
