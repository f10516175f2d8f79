//! Critical-path tracing (§4.8): reconstructs the clock-launch, data, and
//! clock-capture chains that produced a node's worst slack by walking
//! [`TimingTag::origin_node`] links backward through the stored arrival
//! tags. Purely a read over [`AnalysisState`] — it neither mutates tags nor
//! re-runs any traversal.

use crate::analyzer::TimingAnalyzer;
use crate::graph::TimingGraph;
use crate::ids::{DomainId, IdVec, TimingNodeId};
use crate::ops::AnalysisOps;
use crate::tag::{TagType, TimingTag, TimingTags};
use crate::time::Time;
use crate::walker::GraphWalker;

/// One hop of a traced path: the node it passes through and the tag whose
/// value is attributed to that node.
#[derive(Clone, Copy, Debug)]
pub struct PathElement {
    /// The node this hop passes through.
    pub node: TimingNodeId,
    /// The tag recorded at `node` for this chain.
    pub tag: TimingTag,
}

/// A fully reconstructed timing path ending at one sink, covering the
/// launching clock tree, the data path, and the capturing clock tree.
#[derive(Clone, Debug)]
pub struct TimingPath {
    /// The domain that launched this transfer.
    pub launch_domain: DomainId,
    /// The domain that captured this transfer.
    pub capture_domain: DomainId,
    /// The endpoint (`SINK`) node this path ends at.
    pub endpoint: TimingNodeId,
    /// Clock tree from the launch domain's source to the launching register,
    /// oldest hop first.
    pub clock_launch_path: Vec<PathElement>,
    /// Data path from the launching register's output to the endpoint,
    /// oldest hop first.
    pub data_path: Vec<PathElement>,
    /// Clock tree from the capture domain's source to the capturing
    /// register, oldest hop first.
    pub clock_capture_path: Vec<PathElement>,
    /// The data-required time this transfer was checked against.
    pub data_required: Time,
    /// The slack tag this path corresponds to.
    pub slack: TimingTag,
}

/// Walks a tag chain backward through `origin_node` links, matching
/// `tag_type` and a fixed domain (selected by `domain_of`) at each
/// predecessor, starting from `(start_node, start_tag)`. Returns the chain
/// oldest-first (reversing the natural backward walk order).
fn walk_chain(
    tags: &IdVec<TimingNodeId, TimingTags>,
    start_node: TimingNodeId,
    start_tag: TimingTag,
    tag_type: TagType,
    domain: Option<DomainId>,
    domain_of: impl Fn(&TimingTag) -> Option<DomainId>,
) -> Vec<PathElement> {
    let mut elements = vec![PathElement { node: start_node, tag: start_tag }];
    let mut origin = start_tag.origin_node();
    while let Some(node) = origin {
        if node == start_node && elements.len() == 1 {
            // A self-originating tag (the chain's true root) has no further
            // predecessor to walk to.
            break;
        }
        let Some(tag) = tags[node].range(tag_type).find(|t| domain_of(t) == domain).copied() else {
            break;
        };
        let next_origin = tag.origin_node();
        elements.push(PathElement { node, tag });
        if next_origin == Some(node) {
            break;
        }
        origin = next_origin;
    }
    elements.reverse();
    elements
}

/// Traces up to `npaths` worst-slack paths ending at `sink`, one per
/// `(launch, capture)` domain pair with a recorded slack at that node,
/// sorted from worst (most negative) slack first.
pub fn trace_paths<Ops: AnalysisOps, W: GraphWalker>(
    graph: &TimingGraph,
    analyzer: &TimingAnalyzer<Ops, W>,
    sink: TimingNodeId,
    npaths: usize,
) -> Vec<TimingPath> {
    let state = analyzer.state();
    let _ = graph;

    let mut slacks: Vec<&TimingTag> = state.node_slacks[sink].all().collect();
    slacks.sort_by(|a, b| a.time().value().partial_cmp(&b.time().value()).unwrap());

    let mut paths = Vec::new();
    for slack in slacks.into_iter().take(npaths) {
        let (Some(launch_domain), Some(capture_domain)) = (slack.launch_domain(), slack.capture_domain()) else {
            continue;
        };

        let Some(data_required) = state.tags[sink]
            .find_one(TagType::DataRequired, Some(launch_domain), Some(capture_domain))
            .copied()
        else {
            continue;
        };

        let Some(data_arrival) = state.tags[sink]
            .find_one(TagType::DataArrival, Some(launch_domain), None)
            .copied()
        else {
            continue;
        };

        let data_path = walk_chain(
            &state.tags,
            sink,
            data_arrival,
            TagType::DataArrival,
            Some(launch_domain),
            |t| t.launch_domain(),
        );

        let clock_launch_path = data_path.first().and_then(|first| {
            let root = first.tag.origin_node()?;
            let root_tag = state.tags[root].range(TagType::ClockLaunch).find(|t| t.launch_domain() == Some(launch_domain)).copied()?;
            Some(walk_chain(&state.tags, root, root_tag, TagType::ClockLaunch, Some(launch_domain), |t| t.launch_domain()))
        }).unwrap_or_default();

        // The SINK's ClockCapture tag already represents the clock edge as
        // it arrives at the capturing register (the CPIN -> SINK edge folds
        // in the register's clock-pin delay); everything upstream of that,
        // back to the domain's source, was still typed ClockLaunch.
        let clock_capture_path = state.tags[sink]
            .range(TagType::ClockCapture)
            .find(|t| t.capture_domain() == Some(capture_domain))
            .copied()
            .map(|capture_tag| {
                let mut chain = match capture_tag.origin_node() {
                    Some(origin) => state.tags[origin]
                        .range(TagType::ClockLaunch)
                        .find(|t| t.launch_domain() == Some(capture_domain))
                        .copied()
                        .map(|root_tag| {
                            walk_chain(&state.tags, origin, root_tag, TagType::ClockLaunch, Some(capture_domain), |t| t.launch_domain())
                        })
                        .unwrap_or_default(),
                    None => Vec::new(),
                };
                chain.push(PathElement { node: sink, tag: capture_tag });
                chain
            })
            .unwrap_or_default();

        paths.push(TimingPath {
            launch_domain,
            capture_domain,
            endpoint: sink,
            clock_launch_path,
            data_path,
            clock_capture_path,
            data_required: data_required.time(),
            slack: *slack,
        });
    }

    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::AnalyzerFactory;
    use crate::constraints::TimingConstraints;
    use crate::delay::FixedDelayCalculator;
    use crate::graph::{TimingEdgeType, TimingGraph, TimingNodeType};
    use crate::ops::SetupOps;
    use crate::walker::SerialWalker;
    use aion_common::Interner;

    fn ff_chain() -> (TimingGraph, TimingConstraints, FixedDelayCalculator, TimingNodeId) {
        let mut g = TimingGraph::new();
        let launch_cpin = g.add_node(TimingNodeType::Cpin);
        let source = g.add_node(TimingNodeType::Source);
        let mid = g.add_node(TimingNodeType::Ipin);
        let sink = g.add_node(TimingNodeType::Sink);
        let capture_cpin = g.add_node(TimingNodeType::Cpin);
        g.add_edge(TimingEdgeType::PrimitiveClockLaunch, launch_cpin, source);
        g.add_edge(TimingEdgeType::PrimitiveCombinational, source, mid);
        g.add_edge(TimingEdgeType::PrimitiveCombinational, mid, sink);
        // Collapsed clock network: the capturing register's CPIN is reached
        // from the same domain source as the launching one, one hop away.
        g.add_edge(TimingEdgeType::Interconnect, launch_cpin, capture_cpin);
        g.add_edge(TimingEdgeType::PrimitiveClockCapture, capture_cpin, sink);
        g.levelize();

        let interner = Interner::new();
        let mut tc = TimingConstraints::new();
        let clk = tc.add_clock_domain(interner.get_or_intern("clk"));
        tc.set_clock_source(clk, Some(launch_cpin));
        tc.set_setup_constraint(clk, clk, 1.0);
        tc.set_hold_constraint(clk, clk, 0.0);

        let dc = FixedDelayCalculator::uniform(0.1, 0.05, 0.02);
        (g, tc, dc, sink)
    }

    #[test]
    fn traces_one_path_through_the_data_chain() {
        let (g, tc, dc, sink) = ff_chain();
        let mut analyzer = AnalyzerFactory::make_setup::<SerialWalker>(&g);
        analyzer.update_timing(&g, &tc, &dc).unwrap();

        let paths = trace_paths::<SetupOps, SerialWalker>(&g, &analyzer, sink, 1);
        assert_eq!(paths.len(), 1);
        let p = &paths[0];
        assert_eq!(p.endpoint, sink);
        // source -> mid -> sink, oldest first
        assert_eq!(p.data_path.len(), 3);
        assert_eq!(p.data_path.first().unwrap().node, TimingNodeId::from_raw(1));
        assert_eq!(p.data_path.last().unwrap().node, sink);
    }

    #[test]
    fn npaths_zero_returns_empty() {
        let (g, tc, dc, sink) = ff_chain();
        let mut analyzer = AnalyzerFactory::make_setup::<SerialWalker>(&g);
        analyzer.update_timing(&g, &tc, &dc).unwrap();
        let paths = trace_paths::<SetupOps, SerialWalker>(&g, &analyzer, sink, 0);
        assert!(paths.is_empty());
    }

    #[test]
    fn node_with_no_slack_yields_no_paths() {
        let (g, tc, dc, _sink) = ff_chain();
        let mut analyzer = AnalyzerFactory::make_setup::<SerialWalker>(&g);
        analyzer.update_timing(&g, &tc, &dc).unwrap();
        let source = TimingNodeId::from_raw(1);
        let paths = trace_paths::<SetupOps, SerialWalker>(&g, &analyzer, source, 5);
        assert!(paths.is_empty());
    }
}
