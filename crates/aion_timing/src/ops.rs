//! Per-node analysis operations specializing merge direction, edge-delay
//! selection, and check sign for one analysis variant (§4.5).
//!
//! [`AnalysisOps`] is the monomorphized stand-in for the source's CRTP
//! `CommonAnalysisVisitor<Ops>` pattern: a trait implemented by zero-sized
//! marker types ([`SetupOps`], [`HoldOps`]) and specialized at compile time
//! rather than dispatched through a vtable. Every free function below is
//! generic over `Ops` and is called once per node per traversal phase by a
//! [`crate::walker::GraphWalker`].
//!
//! Each `compute_*` function is a pure read over already-finalized upstream
//! state, returning the candidate tags for one node rather than writing them
//! in place; this lets both [`crate::walker::SerialWalker`] and
//! [`crate::walker::ParallelWalker`] share the same logic; the walker applies
//! the returned candidates via [`crate::tag::TimingTags::insert_or_merge`].

use crate::constraints::{IoBound, TimingConstraints};
use crate::delay::DelayCalculator;
use crate::error::TimingError;
use crate::graph::{TimingEdgeType, TimingGraph, TimingNodeType};
use crate::ids::{DomainId, IdVec, TimingEdgeId, TimingNodeId};
use crate::tag::{MergeOp, TagType, TimingTag, TimingTags};
use crate::time::Time;

/// Specializes merge direction, edge-delay selection, and check sign for one
/// analysis variant. Implemented by zero-sized marker types; every method is
/// an associated function so it monomorphizes to a direct call, never a
/// vtable lookup.
pub trait AnalysisOps: Copy + Send + Sync + 'static {
    /// `Max` for setup arrival / hold required; `Min` for hold arrival / setup required.
    const ARRIVAL_MERGE: MergeOp;
    /// The merge direction for `DATA_REQUIRED` tags: the opposite sense of arrival.
    const REQUIRED_MERGE: MergeOp;
    /// `Max` for setup I/O constraints (worst late value), `Min` for hold.
    const IO_BOUND: IoBound;

    /// `max_edge_delay` for setup, `min_edge_delay` for hold.
    fn edge_delay(dc: &dyn DelayCalculator, graph: &TimingGraph, edge: TimingEdgeId) -> Time;

    /// `setup_time` for setup, `hold_time` for hold, at a `CPIN -> SINK` edge.
    fn check_time(dc: &dyn DelayCalculator, graph: &TimingGraph, edge: TimingEdgeId) -> Time;

    /// Late source latency for setup, early for hold.
    fn source_latency(constraints: &TimingConstraints, domain: DomainId) -> Time;

    /// Clock uncertainty applied on the capture side of a transfer.
    fn uncertainty(constraints: &TimingConstraints, launch: DomainId, capture: DomainId) -> Time;

    /// The period-like clock-to-clock term added to the capture clock's
    /// arrival when forming a `DATA_REQUIRED` time for this variant, or
    /// `None` if this variant does not analyze this (launch, capture) pair.
    /// Setup reads the setup-constraint matrix; hold's transfer is
    /// independent of period, so it always returns `Some(Time::ZERO)` once
    /// [`TimingConstraints::should_analyze`] has already gated the pair.
    fn pair_constraint(constraints: &TimingConstraints, launch: DomainId, capture: DomainId) -> Option<Time>;

    /// The constant-generator sentinel for this variant's arrival tags.
    fn constant_generator_tag(launch_domain: Option<DomainId>) -> TimingTag;

    /// Combines a capture-clock-edge arrival and the check time/uncertainty
    /// into a data-required time.
    fn required_at_check(capture_clock_arrival: Time, check_time: Time, uncertainty: Time) -> Time;

    /// `required - arrival` for setup, `arrival - required` for hold.
    fn slack(required: Time, arrival: Time) -> Time;
}

/// Worst-case-late (setup) analysis: arrival is the latest possible value,
/// required is the earliest deadline it must beat.
#[derive(Clone, Copy, Debug, Default)]
pub struct SetupOps;

impl AnalysisOps for SetupOps {
    const ARRIVAL_MERGE: MergeOp = MergeOp::Max;
    const REQUIRED_MERGE: MergeOp = MergeOp::Min;
    const IO_BOUND: IoBound = IoBound::Max;

    fn edge_delay(dc: &dyn DelayCalculator, graph: &TimingGraph, edge: TimingEdgeId) -> Time {
        dc.max_edge_delay(graph, edge)
    }

    fn check_time(dc: &dyn DelayCalculator, graph: &TimingGraph, edge: TimingEdgeId) -> Time {
        dc.setup_time(graph, edge)
    }

    fn source_latency(constraints: &TimingConstraints, domain: DomainId) -> Time {
        Time::new(constraints.source_latency_late(domain))
    }

    fn uncertainty(constraints: &TimingConstraints, launch: DomainId, capture: DomainId) -> Time {
        Time::new(constraints.setup_uncertainty(launch, capture))
    }

    fn pair_constraint(constraints: &TimingConstraints, launch: DomainId, capture: DomainId) -> Option<Time> {
        constraints.setup_constraint(launch, capture).map(Time::new)
    }

    fn constant_generator_tag(launch_domain: Option<DomainId>) -> TimingTag {
        TimingTag::constant_generator_setup_arrival(launch_domain)
    }

    fn required_at_check(capture_clock_arrival: Time, check_time: Time, uncertainty: Time) -> Time {
        capture_clock_arrival - check_time + uncertainty
    }

    fn slack(required: Time, arrival: Time) -> Time {
        required - arrival
    }
}

/// Worst-case-early (hold) analysis: arrival is the earliest possible value,
/// required is the latest deadline it must clear. Hold transfers are
/// independent of clock period (`HoldAnalysisOps`'s documented behaviour), so
/// [`AnalysisOps::pair_constraint`] contributes nothing beyond gating on
/// [`TimingConstraints::should_analyze`].
#[derive(Clone, Copy, Debug, Default)]
pub struct HoldOps;

impl AnalysisOps for HoldOps {
    const ARRIVAL_MERGE: MergeOp = MergeOp::Min;
    const REQUIRED_MERGE: MergeOp = MergeOp::Max;
    const IO_BOUND: IoBound = IoBound::Min;

    fn edge_delay(dc: &dyn DelayCalculator, graph: &TimingGraph, edge: TimingEdgeId) -> Time {
        dc.min_edge_delay(graph, edge)
    }

    fn check_time(dc: &dyn DelayCalculator, graph: &TimingGraph, edge: TimingEdgeId) -> Time {
        dc.hold_time(graph, edge)
    }

    fn source_latency(constraints: &TimingConstraints, domain: DomainId) -> Time {
        Time::new(constraints.source_latency_early(domain))
    }

    fn uncertainty(constraints: &TimingConstraints, launch: DomainId, capture: DomainId) -> Time {
        Time::new(constraints.hold_uncertainty(launch, capture))
    }

    fn pair_constraint(_constraints: &TimingConstraints, _launch: DomainId, _capture: DomainId) -> Option<Time> {
        Some(Time::ZERO)
    }

    fn constant_generator_tag(launch_domain: Option<DomainId>) -> TimingTag {
        TimingTag::constant_generator_hold_arrival(launch_domain)
    }

    fn required_at_check(capture_clock_arrival: Time, check_time: Time, uncertainty: Time) -> Time {
        capture_clock_arrival + check_time - uncertainty
    }

    fn slack(required: Time, arrival: Time) -> Time {
        arrival - required
    }
}

/// Clears every propagated tag type at a node ahead of a fresh update,
/// leaving slack storage (owned separately by the walker) untouched.
pub fn reset_node(tags: &mut TimingTags) {
    tags.clear_type(TagType::ClockLaunch);
    tags.clear_type(TagType::ClockCapture);
    tags.clear_type(TagType::DataArrival);
    tags.clear_type(TagType::DataRequired);
}

/// Seeds a node's arrival tags from constraints alone: a clock domain's
/// physical source gets a `ClockLaunch` tag at its latency; a constant
/// generator gets the sentinel that always loses a merge; a primary input
/// with a matching I/O constraint gets a `DataArrival` tag. A node matching
/// none of these is a no-op (most nodes).
pub fn compute_arrival_pre_traverse<Ops: AnalysisOps>(
    node: TimingNodeId,
    graph: &TimingGraph,
    constraints: &TimingConstraints,
) -> Vec<TimingTag> {
    let mut pending = Vec::new();

    for domain in constraints.clock_domains() {
        if domain.source_node() == Some(node) {
            let latency = Ops::source_latency(constraints, domain.id());
            pending.push(TimingTag::new(latency, TagType::ClockLaunch, Some(domain.id()), None).with_origin(node));
        }
    }

    if constraints.is_constant_generator(node) {
        pending.push(Ops::constant_generator_tag(None).with_origin(node));
    }

    if matches!(graph.node_type(node), TimingNodeType::Source) {
        for domain in constraints.clock_domains() {
            if let Some(c) = constraints.io_constraint(node, domain.id(), Ops::IO_BOUND) {
                let latency = Ops::source_latency(constraints, domain.id());
                let t = TimingTag::new(Time::new(c) + latency, TagType::DataArrival, Some(domain.id()), None)
                    .with_origin(node);
                pending.push(t);
            }
        }
    }

    pending
}

/// Propagates `ClockLaunch`/`ClockCapture`/`DataArrival` tags from enabled
/// predecessors, advancing each by the edge's delay. At a `CPIN -> SOURCE`
/// clock-launch edge, `ClockLaunch` tags are converted into `DataArrival`
/// tags (the flop's clock-to-Q delay folds into the edge delay). At a
/// `CPIN -> SINK` clock-capture edge, `ClockLaunch` tags are converted into
/// `ClockCapture` tags, swapping the domain from launch-role to capture-role.
pub fn compute_arrival_traverse<Ops: AnalysisOps>(
    node: TimingNodeId,
    graph: &TimingGraph,
    dc: &dyn DelayCalculator,
    tags: &IdVec<TimingNodeId, TimingTags>,
) -> Result<Vec<TimingTag>, TimingError> {
    let mut pending = Vec::new();
    let node_type = graph.node_type(node);

    for &edge in graph.node_in_edges(node) {
        if graph.edge_disabled(edge) {
            continue;
        }
        let delay = Ops::edge_delay(dc, graph, edge);
        if !delay.is_finite() {
            return Err(TimingError::MissingDelay(edge));
        }
        let u = graph.edge_src_node(edge);
        let edge_type = graph.edge_type(edge);

        match (edge_type, node_type) {
            (TimingEdgeType::PrimitiveClockLaunch, TimingNodeType::Source) => {
                for tag in tags[u].range(TagType::ClockLaunch) {
                    let launch = tag.launch_domain();
                    pending.push(tag.advanced(delay, u).retyped(TagType::DataArrival, launch, None));
                }
            }
            (TimingEdgeType::PrimitiveClockCapture, TimingNodeType::Sink) => {
                for tag in tags[u].range(TagType::ClockLaunch) {
                    let capture = tag.launch_domain();
                    pending.push(tag.advanced(delay, u).retyped(TagType::ClockCapture, None, capture));
                }
            }
            _ => {
                for tag_type in [TagType::ClockLaunch, TagType::ClockCapture, TagType::DataArrival] {
                    for tag in tags[u].range(tag_type) {
                        pending.push(tag.advanced(delay, u));
                    }
                }
            }
        }
    }

    Ok(pending)
}

/// Seeds a sink's `DataRequired` tags: at a flop's `D` pin (fed by its own
/// `ClockCapture` tags, produced by [`compute_arrival_traverse`] on this same
/// node one phase earlier), one tag per launch domain analyzed against the
/// capture domain; at a primary output with an I/O required-time constraint,
/// one tag directly from that constraint.
pub fn compute_required_pre_traverse<Ops: AnalysisOps>(
    node: TimingNodeId,
    graph: &TimingGraph,
    constraints: &TimingConstraints,
    dc: &dyn DelayCalculator,
    tags: &IdVec<TimingNodeId, TimingTags>,
) -> Result<Vec<TimingTag>, TimingError> {
    if !matches!(graph.node_type(node), TimingNodeType::Sink) {
        return Ok(Vec::new());
    }

    let mut pending = Vec::new();

    let capture_edge = graph
        .node_in_edges(node)
        .iter()
        .copied()
        .find(|&e| !graph.edge_disabled(e) && graph.edge_type(e) == TimingEdgeType::PrimitiveClockCapture);

    if let Some(edge) = capture_edge {
        let check_time = Ops::check_time(dc, graph, edge);
        if !check_time.is_finite() {
            return Err(TimingError::MissingDelay(edge));
        }
        for capture_tag in tags[node].range(TagType::ClockCapture) {
            let Some(capture_domain) = capture_tag.capture_domain() else {
                continue;
            };
            for launch in constraints.clock_domains() {
                let launch_domain = launch.id();
                if !constraints.should_analyze(launch_domain, capture_domain) {
                    continue;
                }
                let Some(period_term) = Ops::pair_constraint(constraints, launch_domain, capture_domain) else {
                    continue;
                };
                let uncertainty = Ops::uncertainty(constraints, launch_domain, capture_domain);
                let capture_arrival = capture_tag.time() + period_term;
                let required = Ops::required_at_check(capture_arrival, check_time, uncertainty);
                pending.push(
                    TimingTag::new(required, TagType::DataRequired, Some(launch_domain), Some(capture_domain))
                        .with_origin(node),
                );
            }
        }
    } else {
        for domain in constraints.clock_domains() {
            if let Some(c) = constraints.io_constraint(node, domain.id(), Ops::IO_BOUND) {
                let latency = Ops::source_latency(constraints, domain.id());
                let required = Time::new(c) - latency;
                // Seed one required tag per launch domain already arriving at this
                // node (mirroring the capture-edge branch above), rather than a
                // single `launch = None` tag: a `None` launch would only ever match
                // the constant-generator sentinel (the one arrival tag with no
                // launch domain), never a real data arrival.
                for arr in tags[node].range(TagType::DataArrival) {
                    let Some(launch_domain) = arr.launch_domain() else {
                        continue;
                    };
                    pending.push(
                        TimingTag::new(required, TagType::DataRequired, Some(launch_domain), Some(domain.id()))
                            .with_origin(node),
                    );
                }
            }
        }
    }

    Ok(pending)
}

/// Pulls `DataRequired` tags back from enabled successors, subtracting each
/// edge's delay. Clock-launch/clock-capture edges are skipped: required
/// times only flow along the data path, never back through a CPIN
/// conversion.
pub fn compute_required_traverse<Ops: AnalysisOps>(
    node: TimingNodeId,
    graph: &TimingGraph,
    dc: &dyn DelayCalculator,
    tags: &IdVec<TimingNodeId, TimingTags>,
) -> Result<Vec<TimingTag>, TimingError> {
    if matches!(graph.node_type(node), TimingNodeType::Sink) {
        return Ok(Vec::new());
    }

    let mut pending = Vec::new();
    for &edge in graph.node_out_edges(node) {
        if graph.edge_disabled(edge) {
            continue;
        }
        if matches!(
            graph.edge_type(edge),
            TimingEdgeType::PrimitiveClockLaunch | TimingEdgeType::PrimitiveClockCapture
        ) {
            continue;
        }
        let delay = Ops::edge_delay(dc, graph, edge);
        if !delay.is_finite() {
            return Err(TimingError::MissingDelay(edge));
        }
        let sink = graph.edge_sink_node(edge);
        for req in tags[sink].range(TagType::DataRequired) {
            pending.push(req.advanced(-delay, sink));
        }
    }

    Ok(pending)
}

/// Derives node slack for every `(launch, capture)` pair that has both a
/// `DataRequired` tag and a matching (by launch domain) `DataArrival` tag at
/// `node`.
pub fn compute_node_slack<Ops: AnalysisOps>(node: TimingNodeId, tags: &IdVec<TimingNodeId, TimingTags>) -> Vec<TimingTag> {
    let mut pending = Vec::new();
    for req in tags[node].range(TagType::DataRequired) {
        if let Some(arr) = tags[node].find_one(TagType::DataArrival, req.launch_domain(), None) {
            let s = Ops::slack(req.time(), arr.time());
            pending.push(
                TimingTag::new(s, TagType::Slack, req.launch_domain(), req.capture_domain()).with_origin(node),
            );
        }
    }
    pending
}

/// Derives the slack an edge would contribute: the downstream sink's
/// required time against this edge's upstream arrival advanced by its own
/// delay (rather than the node's already-merged arrival, which may have won
/// via a different edge).
pub fn compute_edge_slack<Ops: AnalysisOps>(
    edge: TimingEdgeId,
    graph: &TimingGraph,
    dc: &dyn DelayCalculator,
    tags: &IdVec<TimingNodeId, TimingTags>,
) -> Result<Vec<TimingTag>, TimingError> {
    if graph.edge_disabled(edge) {
        return Ok(Vec::new());
    }
    let delay = Ops::edge_delay(dc, graph, edge);
    if !delay.is_finite() {
        return Err(TimingError::MissingDelay(edge));
    }
    let u = graph.edge_src_node(edge);
    let n = graph.edge_sink_node(edge);

    let mut pending = Vec::new();
    for req in tags[n].range(TagType::DataRequired) {
        if let Some(arr) = tags[u].find_one(TagType::DataArrival, req.launch_domain(), None) {
            let edge_arrival = arr.time() + delay;
            let s = Ops::slack(req.time(), edge_arrival);
            pending.push(TimingTag::new(s, TagType::Slack, req.launch_domain(), req.capture_domain()));
        }
    }
    Ok(pending)
}
