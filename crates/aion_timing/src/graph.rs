//! The timing graph: a typed DAG of pins and edges, with levelization,
//! validation, and cache-friendly layout optimization.

use crate::error::TimingError;
use crate::ids::{Idx, IdVec, LevelId, TimingEdgeId, TimingNodeId};
use serde::{Deserialize, Serialize};

/// The five node kinds the engine recognizes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum TimingNodeType {
    /// Origin of a data or clock signal (primary input, flop Q).
    Source,
    /// Terminus where a timing check applies (primary output, flop D).
    Sink,
    /// Intermediate data input pin.
    Ipin,
    /// Intermediate data output pin.
    Opin,
    /// Clock-network input pin of a sequential element.
    Cpin,
}

/// The four edge kinds the engine recognizes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum TimingEdgeType {
    /// A combinational path inside a cell.
    PrimitiveCombinational,
    /// `CPIN -> SOURCE` inside a flop: converts clock-launch tags to data arrival.
    PrimitiveClockLaunch,
    /// `CPIN -> SINK` inside a flop: collects capture tags.
    PrimitiveClockCapture,
    /// A net between cells.
    Interconnect,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct NodeData {
    node_type: TimingNodeType,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct EdgeData {
    edge_type: TimingEdgeType,
    src: TimingNodeId,
    sink: TimingNodeId,
    disabled: bool,
}

/// A permutation of node ids, mapping an old id to its new id after
/// [`TimingGraph::optimize_layout`].
#[derive(Clone, Debug)]
pub struct NodeIdMap(IdVec<TimingNodeId, TimingNodeId>);

impl NodeIdMap {
    /// Looks up the new id for an old id.
    pub fn new_id(&self, old: TimingNodeId) -> TimingNodeId {
        self.0[old]
    }
}

/// A permutation of edge ids, mapping an old id to its new id after
/// [`TimingGraph::optimize_layout`].
#[derive(Clone, Debug)]
pub struct EdgeIdMap(IdVec<TimingEdgeId, TimingEdgeId>);

impl EdgeIdMap {
    /// Looks up the new id for an old id.
    pub fn new_id(&self, old: TimingEdgeId) -> TimingEdgeId {
        self.0[old]
    }
}

/// A directed, levelizable graph of timing pins and delay-annotated edges.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TimingGraph {
    nodes: IdVec<TimingNodeId, NodeData>,
    edges: IdVec<TimingEdgeId, EdgeData>,
    node_in_edges: IdVec<TimingNodeId, Vec<TimingEdgeId>>,
    node_out_edges: IdVec<TimingNodeId, Vec<TimingEdgeId>>,
    #[serde(skip)]
    node_level: IdVec<TimingNodeId, LevelId>,
    #[serde(skip)]
    levels: Vec<Vec<TimingNodeId>>,
    #[serde(skip)]
    levelized: bool,
}

impl TimingGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node of the given type, returning its id.
    pub fn add_node(&mut self, node_type: TimingNodeType) -> TimingNodeId {
        let id = self.nodes.push(NodeData { node_type });
        self.node_in_edges.push(Vec::new());
        self.node_out_edges.push(Vec::new());
        self.levelized = false;
        id
    }

    /// Adds a directed edge `src -> sink` of the given type, returning its id.
    ///
    /// # Panics
    /// Panics if `src` or `sink` does not refer to an existing node (a
    /// [`TimingError::Structural`] condition caught here rather than
    /// deferred, since the caller controls graph construction directly).
    pub fn add_edge(
        &mut self,
        edge_type: TimingEdgeType,
        src: TimingNodeId,
        sink: TimingNodeId,
    ) -> TimingEdgeId {
        assert!(self.nodes.get(src).is_some(), "add_edge: unknown src node");
        assert!(
            self.nodes.get(sink).is_some(),
            "add_edge: unknown sink node"
        );
        let id = self.edges.push(EdgeData {
            edge_type,
            src,
            sink,
            disabled: false,
        });
        self.node_out_edges[src].push(id);
        self.node_in_edges[sink].push(id);
        self.levelized = false;
        id
    }

    /// Enables or disables an edge; disabled edges are skipped by levelization
    /// and traversal.
    pub fn disable_edge(&mut self, edge: TimingEdgeId, disabled: bool) {
        self.edges[edge].disabled = disabled;
        self.levelized = false;
    }

    /// `true` if the edge is currently disabled.
    pub fn edge_disabled(&self, edge: TimingEdgeId) -> bool {
        self.edges[edge].disabled
    }

    /// The type of a node.
    pub fn node_type(&self, node: TimingNodeId) -> TimingNodeType {
        self.nodes[node].node_type
    }

    /// The type of an edge.
    pub fn edge_type(&self, edge: TimingEdgeId) -> TimingEdgeType {
        self.edges[edge].edge_type
    }

    /// The source node of an edge.
    pub fn edge_src_node(&self, edge: TimingEdgeId) -> TimingNodeId {
        self.edges[edge].src
    }

    /// The sink node of an edge.
    pub fn edge_sink_node(&self, edge: TimingEdgeId) -> TimingNodeId {
        self.edges[edge].sink
    }

    /// Number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges in the graph.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// All node ids, in dense id order.
    pub fn nodes(&self) -> impl Iterator<Item = TimingNodeId> + '_ {
        self.nodes.ids()
    }

    /// All edge ids, in dense id order.
    pub fn edges(&self) -> impl Iterator<Item = TimingEdgeId> + '_ {
        self.edges.ids()
    }

    /// Incoming edges of a node (enabled and disabled alike).
    pub fn node_in_edges(&self, node: TimingNodeId) -> &[TimingEdgeId] {
        &self.node_in_edges[node]
    }

    /// Outgoing edges of a node (enabled and disabled alike).
    pub fn node_out_edges(&self, node: TimingNodeId) -> &[TimingEdgeId] {
        &self.node_out_edges[node]
    }

    /// Finds the edge `src -> sink`, if one exists.
    pub fn find_edge(&self, src: TimingNodeId, sink: TimingNodeId) -> Option<TimingEdgeId> {
        self.node_out_edges[src]
            .iter()
            .copied()
            .find(|&e| self.edges[e].sink == sink)
    }

    /// The level assigned to `node` after [`TimingGraph::levelize`].
    pub fn node_level(&self, node: TimingNodeId) -> LevelId {
        self.node_level[node]
    }

    /// All level ids, from 0 (sources) to the deepest level.
    pub fn levels(&self) -> impl Iterator<Item = LevelId> {
        (0..self.levels.len()).map(|i| LevelId::from_raw(i as u32))
    }

    /// The nodes assigned to a given level, in dense node-id order.
    pub fn level_nodes(&self, level: LevelId) -> &[TimingNodeId] {
        &self.levels[level.index()]
    }

    /// Number of levels.
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    fn enabled_in_edges(&self, node: TimingNodeId) -> impl Iterator<Item = TimingEdgeId> + '_ {
        self.node_in_edges[node]
            .iter()
            .copied()
            .filter(move |&e| !self.edges[e].disabled)
    }

    fn enabled_out_edges(&self, node: TimingNodeId) -> impl Iterator<Item = TimingEdgeId> + '_ {
        self.node_out_edges[node]
            .iter()
            .copied()
            .filter(move |&e| !self.edges[e].disabled)
    }

    /// Assigns an integer level to every node using Kahn's algorithm over
    /// enabled edges, run in O(|V|+|E|). Returns the ids of any nodes that
    /// could not be levelized (i.e. participate in a combinational loop)
    /// rather than erroring directly — loop handling policy is the caller's.
    pub fn levelize(&mut self) -> Vec<TimingNodeId> {
        let n = self.nodes.len();
        let mut remaining_fanin: Vec<usize> = (0..n)
            .map(|i| {
                let node = TimingNodeId::from_index(i);
                self.enabled_in_edges(node).count()
            })
            .collect();

        let mut frontier: Vec<TimingNodeId> = (0..n)
            .map(TimingNodeId::from_index)
            .filter(|&node| remaining_fanin[node.index()] == 0)
            .collect();
        frontier.sort_by_key(|n| n.as_raw());

        let mut node_level: IdVec<TimingNodeId, LevelId> =
            IdVec::with_len_filled(n, || LevelId::from_raw(0));
        let mut levels: Vec<Vec<TimingNodeId>> = Vec::new();
        let mut visited = vec![false; n];

        let mut current = frontier;
        let mut level_idx = 0usize;
        while !current.is_empty() {
            for &node in &current {
                visited[node.index()] = true;
                node_level[node] = LevelId::from_raw(level_idx as u32);
            }
            levels.push(current.clone());

            let mut next: Vec<TimingNodeId> = Vec::new();
            for &node in &current {
                for edge in self.enabled_out_edges(node) {
                    let sink = self.edges[edge].sink;
                    let idx = sink.index();
                    remaining_fanin[idx] -= 1;
                    if remaining_fanin[idx] == 0 {
                        next.push(sink);
                    }
                }
            }
            next.sort_by_key(|n| n.as_raw());
            next.dedup();
            current = next;
            level_idx += 1;
        }

        let unlevelized: Vec<TimingNodeId> = (0..n)
            .map(TimingNodeId::from_index)
            .filter(|n| !visited[n.index()])
            .collect();

        if unlevelized.is_empty() {
            self.node_level = node_level;
            self.levels = levels;
            self.levelized = true;
        }
        unlevelized
    }

    /// `true` once [`TimingGraph::levelize`] has completed without leftover
    /// (cyclic) nodes.
    pub fn is_levelized(&self) -> bool {
        self.levelized
    }

    /// Structural and type-consistency invariants of §3.1/§4.1. Returns the
    /// first violation found, if any.
    pub fn validate(&self) -> Result<(), TimingError> {
        for edge in self.edges() {
            let data = &self.edges[edge];
            if self.nodes.get(data.src).is_none() || self.nodes.get(data.sink).is_none() {
                return Err(TimingError::Structural(format!(
                    "edge {:?} references a non-existent node",
                    edge
                )));
            }
        }

        for node in self.nodes() {
            match self.node_type(node) {
                TimingNodeType::Source => {
                    let has_data_fanin = self.enabled_in_edges(node).any(|e| {
                        !matches!(self.edge_type(e), TimingEdgeType::PrimitiveClockLaunch)
                    });
                    if has_data_fanin {
                        return Err(TimingError::Structural(format!(
                            "SOURCE node {:?} has non-clock-launch fan-in",
                            node
                        )));
                    }
                }
                TimingNodeType::Sink => {
                    if self.enabled_out_edges(node).next().is_some() {
                        return Err(TimingError::Structural(format!(
                            "SINK node {:?} has fan-out",
                            node
                        )));
                    }
                }
                TimingNodeType::Cpin => {
                    let ok = self.enabled_out_edges(node).any(|e| {
                        matches!(
                            self.edge_type(e),
                            TimingEdgeType::PrimitiveClockLaunch
                                | TimingEdgeType::PrimitiveClockCapture
                        )
                    });
                    if !ok {
                        return Err(TimingError::Structural(format!(
                            "CPIN node {:?} has no clock-launch/capture out-edge",
                            node
                        )));
                    }
                }
                TimingNodeType::Ipin | TimingNodeType::Opin => {}
            }
        }
        Ok(())
    }

    /// Reorders node and edge storage by level (then original id) for cache
    /// locality, returning the permutations applied so external
    /// collaborators (constraints, delay-calculator data) can remap their
    /// own id references.
    ///
    /// # Panics
    /// Panics if the graph has not been successfully levelized.
    pub fn optimize_layout(&mut self) -> (NodeIdMap, EdgeIdMap) {
        assert!(self.levelized, "optimize_layout requires a levelized graph");

        let mut order: Vec<TimingNodeId> = Vec::with_capacity(self.nodes.len());
        for level in &self.levels {
            order.extend(level.iter().copied());
        }

        let mut old_to_new: IdVec<TimingNodeId, TimingNodeId> =
            IdVec::with_len_filled(self.nodes.len(), || TimingNodeId::from_raw(0));
        for (new_idx, &old_id) in order.iter().enumerate() {
            old_to_new[old_id] = TimingNodeId::from_index(new_idx);
        }

        let mut new_nodes: IdVec<TimingNodeId, NodeData> = IdVec::new();
        for &old_id in &order {
            new_nodes.push(self.nodes[old_id].clone());
        }

        let mut edge_order: Vec<TimingEdgeId> = self.edges.ids().collect();
        edge_order.sort_by_key(|&e| {
            let src = self.edges[e].src;
            (old_to_new[src].as_raw(), e.as_raw())
        });

        let mut old_to_new_edge: IdVec<TimingEdgeId, TimingEdgeId> =
            IdVec::with_len_filled(self.edges.len(), || TimingEdgeId::from_raw(0));
        for (new_idx, &old_id) in edge_order.iter().enumerate() {
            old_to_new_edge[old_id] = TimingEdgeId::from_index(new_idx);
        }

        let mut new_edges: IdVec<TimingEdgeId, EdgeData> = IdVec::new();
        for &old_id in &edge_order {
            let d = &self.edges[old_id];
            new_edges.push(EdgeData {
                edge_type: d.edge_type,
                src: old_to_new[d.src],
                sink: old_to_new[d.sink],
                disabled: d.disabled,
            });
        }

        let mut new_in: IdVec<TimingNodeId, Vec<TimingEdgeId>> =
            IdVec::with_len_filled(self.nodes.len(), Vec::new);
        let mut new_out: IdVec<TimingNodeId, Vec<TimingEdgeId>> =
            IdVec::with_len_filled(self.nodes.len(), Vec::new);
        for new_edge_id in new_edges.ids() {
            let d = &new_edges[new_edge_id];
            new_out[d.src].push(new_edge_id);
            new_in[d.sink].push(new_edge_id);
        }

        self.nodes = new_nodes;
        self.edges = new_edges;
        self.node_in_edges = new_in;
        self.node_out_edges = new_out;

        let new_levels: Vec<Vec<TimingNodeId>> = self
            .levels
            .iter()
            .map(|lvl| {
                let mut mapped: Vec<TimingNodeId> =
                    lvl.iter().map(|&n| old_to_new[n]).collect();
                mapped.sort_by_key(|n| n.as_raw());
                mapped
            })
            .collect();
        self.levels = new_levels;

        let mut node_level: IdVec<TimingNodeId, LevelId> =
            IdVec::with_len_filled(self.nodes.len(), || LevelId::from_raw(0));
        for (level_idx, level_nodes) in self.levels.iter().enumerate() {
            for &n in level_nodes {
                node_level[n] = LevelId::from_raw(level_idx as u32);
            }
        }
        self.node_level = node_level;

        (NodeIdMap(old_to_new), EdgeIdMap(old_to_new_edge))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_graph() -> TimingGraph {
        let mut g = TimingGraph::new();
        let src = g.add_node(TimingNodeType::Source);
        let opin = g.add_node(TimingNodeType::Opin);
        let ipin = g.add_node(TimingNodeType::Ipin);
        let sink = g.add_node(TimingNodeType::Sink);
        g.add_edge(TimingEdgeType::PrimitiveCombinational, src, opin);
        g.add_edge(TimingEdgeType::Interconnect, opin, ipin);
        g.add_edge(TimingEdgeType::PrimitiveCombinational, ipin, sink);
        g
    }

    #[test]
    fn empty_graph() {
        let g = TimingGraph::new();
        assert_eq!(g.node_count(), 0);
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn add_nodes_and_edges() {
        let g = chain_graph();
        assert_eq!(g.node_count(), 4);
        assert_eq!(g.edge_count(), 3);
    }

    #[test]
    fn levelize_linear_chain() {
        let mut g = chain_graph();
        let unlevelized = g.levelize();
        assert!(unlevelized.is_empty());
        assert_eq!(g.num_levels(), 4);
        for level in g.levels() {
            assert_eq!(g.level_nodes(level).len(), 1);
        }
    }

    #[test]
    fn levelize_detects_cycle() {
        let mut g = TimingGraph::new();
        let a = g.add_node(TimingNodeType::Ipin);
        let b = g.add_node(TimingNodeType::Opin);
        g.add_edge(TimingEdgeType::PrimitiveCombinational, a, b);
        g.add_edge(TimingEdgeType::PrimitiveCombinational, b, a);
        let unlevelized = g.levelize();
        assert_eq!(unlevelized.len(), 2);
        assert!(!g.is_levelized());
    }

    #[test]
    fn disabling_edge_breaks_cycle() {
        let mut g = TimingGraph::new();
        let a = g.add_node(TimingNodeType::Ipin);
        let b = g.add_node(TimingNodeType::Opin);
        let e1 = g.add_edge(TimingEdgeType::PrimitiveCombinational, a, b);
        g.add_edge(TimingEdgeType::PrimitiveCombinational, b, a);
        g.disable_edge(e1, true);
        let unlevelized = g.levelize();
        assert!(unlevelized.is_empty());
    }

    #[test]
    fn find_edge_works() {
        let g = chain_graph();
        let src = TimingNodeId::from_raw(0);
        let opin = TimingNodeId::from_raw(1);
        assert!(g.find_edge(src, opin).is_some());
        assert!(g.find_edge(opin, src).is_none());
    }

    #[test]
    fn validate_accepts_well_formed_chain() {
        let g = chain_graph();
        assert!(g.validate().is_ok());
    }

    #[test]
    fn validate_rejects_sink_with_fanout() {
        let mut g = chain_graph();
        let sink = TimingNodeId::from_raw(3);
        let extra = g.add_node(TimingNodeType::Ipin);
        g.add_edge(TimingEdgeType::Interconnect, sink, extra);
        assert!(g.validate().is_err());
    }

    #[test]
    fn validate_rejects_cpin_without_clock_edge() {
        let mut g = TimingGraph::new();
        let cpin = g.add_node(TimingNodeType::Cpin);
        let other = g.add_node(TimingNodeType::Ipin);
        g.add_edge(TimingEdgeType::Interconnect, cpin, other);
        assert!(g.validate().is_err());
    }

    #[test]
    fn optimize_layout_preserves_topology() {
        let mut g = chain_graph();
        g.levelize();
        let (node_map, _edge_map) = g.optimize_layout();

        // Original node 0 (SOURCE, level 0) must map to new id 0.
        let new_src = node_map.new_id(TimingNodeId::from_raw(0));
        assert_eq!(new_src, TimingNodeId::from_raw(0));
        assert_eq!(g.node_type(new_src), TimingNodeType::Source);

        // Topology: still a 4-node chain with levels 0..3.
        assert_eq!(g.num_levels(), 4);
        for level in g.levels() {
            assert_eq!(g.level_nodes(level).len(), 1);
        }
    }

    #[test]
    fn multi_fanout_graph() {
        let mut g = TimingGraph::new();
        let src = g.add_node(TimingNodeType::Source);
        let a = g.add_node(TimingNodeType::Ipin);
        let b = g.add_node(TimingNodeType::Ipin);
        g.add_edge(TimingEdgeType::PrimitiveCombinational, src, a);
        g.add_edge(TimingEdgeType::PrimitiveCombinational, src, b);
        assert_eq!(g.node_out_edges(src).len(), 2);
        let unlevelized = g.levelize();
        assert!(unlevelized.is_empty());
        assert_eq!(g.num_levels(), 2);
        assert_eq!(g.level_nodes(g.levels().nth(1).unwrap()).len(), 2);
    }

    #[test]
    fn diamond_graph() {
        let mut g = TimingGraph::new();
        let src = g.add_node(TimingNodeType::Source);
        let a = g.add_node(TimingNodeType::Ipin);
        let b = g.add_node(TimingNodeType::Ipin);
        let sink = g.add_node(TimingNodeType::Sink);
        g.add_edge(TimingEdgeType::PrimitiveCombinational, src, a);
        g.add_edge(TimingEdgeType::PrimitiveCombinational, src, b);
        g.add_edge(TimingEdgeType::PrimitiveCombinational, a, sink);
        g.add_edge(TimingEdgeType::PrimitiveCombinational, b, sink);
        let unlevelized = g.levelize();
        assert!(unlevelized.is_empty());
        assert_eq!(g.node_level(sink).as_raw(), 2);
    }

    #[test]
    fn graph_serde_roundtrip() {
        let g = chain_graph();
        let json = serde_json::to_string(&g).unwrap();
        let back: TimingGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(back.node_count(), g.node_count());
        assert_eq!(back.edge_count(), g.edge_count());
    }
}
