//! The `TimingAnalyzer` façade: composes a [`GraphWalker`] with an
//! [`AnalysisOps`] specialization, exposing `update_timing`, incremental
//! invalidation, and tag/slack queries (§4.7). Construction goes through
//! [`AnalyzerFactory`], generic over the analysis variant and walker type —
//! the monomorphized counterpart of the source's `analyzer_factory.hpp`.

use crate::constraints::TimingConstraints;
use crate::delay::DelayCalculator;
use crate::error::TimingError;
use crate::graph::{TimingGraph, TimingNodeType};
use crate::ids::{TimingEdgeId, TimingNodeId};
use crate::ops::{AnalysisOps, HoldOps, SetupOps};
use crate::tag::{TagType, TimingTag};
use crate::walker::{AnalysisState, GraphWalker, SerialWalker, WalkerProfile};
use aion_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink};
use aion_source::Span;
use std::collections::HashSet;
use std::marker::PhantomData;

/// Which timing checks an analyzer evaluates. No runtime type information is
/// needed to tell a [`TimingAnalyzer<SetupOps, _>`] from a
/// [`TimingAnalyzer<HoldOps, _>`] since they're distinct monomorphizations;
/// this enum exists purely so callers can introspect the concrete kind
/// without matching on the type parameter.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AnalyzerKind {
    Setup,
    Hold,
    SetupHold,
}

fn unconstrained_startpoints_code() -> DiagnosticCode {
    DiagnosticCode::new(Category::Timing, 1)
}

fn unconstrained_endpoints_code() -> DiagnosticCode {
    DiagnosticCode::new(Category::Timing, 2)
}

/// A generic timing analyzer parameterized over its [`AnalysisOps`]
/// specialization and [`GraphWalker`] implementation.
pub struct TimingAnalyzer<Ops: AnalysisOps, W: GraphWalker = SerialWalker> {
    state: AnalysisState,
    profile: WalkerProfile,
    dirty_edges: HashSet<TimingEdgeId>,
    dirty_nodes: HashSet<TimingNodeId>,
    stale: bool,
    diagnostics: DiagnosticSink,
    _ops: PhantomData<Ops>,
    _walker: PhantomData<W>,
}

impl<Ops: AnalysisOps, W: GraphWalker> TimingAnalyzer<Ops, W> {
    /// Allocates an analyzer sized to `graph`. The analyzer starts "stale"
    /// (no tags computed yet) until the first `update_timing`.
    pub fn new(graph: &TimingGraph) -> Self {
        Self {
            state: AnalysisState::for_graph(graph),
            profile: WalkerProfile::default(),
            dirty_edges: HashSet::new(),
            dirty_nodes: HashSet::new(),
            stale: true,
            diagnostics: DiagnosticSink::new(),
            _ops: PhantomData,
            _walker: PhantomData,
        }
    }

    /// The concrete analysis kind this instantiation performs.
    pub fn kind(&self) -> AnalyzerKind {
        if Ops::ARRIVAL_MERGE == crate::tag::MergeOp::Max {
            AnalyzerKind::Setup
        } else {
            AnalyzerKind::Hold
        }
    }

    /// Marks `edge` dirty for the next `update_timing`.
    pub fn invalidate_edge(&mut self, edge: TimingEdgeId) {
        self.dirty_edges.insert(edge);
    }

    /// Marks `node` dirty for the next `update_timing`.
    pub fn invalidate_node(&mut self, node: TimingNodeId) {
        self.dirty_nodes.insert(node);
    }

    /// `true` while no successful `update_timing` result is available (fresh
    /// analyzer, or the last attempt returned a fatal error).
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Timings for the six profiled phases of the last `update_timing`.
    pub fn profile(&self) -> &WalkerProfile {
        &self.profile
    }

    /// Diagnostics (currently: unconstrained-startpoint/endpoint warnings)
    /// accumulated by the last `update_timing`.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.diagnostics()
    }

    /// All tags stored at `node`, of any type.
    pub fn tags(&self, node: TimingNodeId) -> impl Iterator<Item = &TimingTag> {
        self.state.tags[node].all()
    }

    /// Tags of a specific type stored at `node`.
    pub fn tags_of_type(&self, node: TimingNodeId, tag_type: TagType) -> impl Iterator<Item = &TimingTag> {
        self.state.tags[node].range(tag_type)
    }

    /// Slack tags recorded at `node`.
    pub fn node_slacks(&self, node: TimingNodeId) -> impl Iterator<Item = &TimingTag> {
        self.state.node_slacks[node].all()
    }

    /// Slack tags recorded at `edge`.
    pub fn edge_slacks(&self, edge: TimingEdgeId) -> impl Iterator<Item = &TimingTag> {
        self.state.edge_slacks[edge].all()
    }

    /// Number of "source-like" nodes (no enabled fan-in) with no tags at
    /// all after the last update — real clock/data sources that never got a
    /// domain, constraint, or constant-generator affiliation.
    pub fn num_unconstrained_startpoints(&self, graph: &TimingGraph) -> usize {
        graph
            .nodes()
            .filter(|&n| {
                graph.node_in_edges(n).iter().all(|&e| graph.edge_disabled(e))
                    && self.state.tags[n].all().next().is_none()
            })
            .count()
    }

    /// Number of `SINK` nodes with no slack recorded after the last update —
    /// endpoints with no applicable check at all.
    pub fn num_unconstrained_endpoints(&self, graph: &TimingGraph) -> usize {
        graph
            .nodes()
            .filter(|&n| graph.node_type(n) == TimingNodeType::Sink && self.state.node_slacks[n].all().next().is_none())
            .count()
    }

    /// Runs a full timing update: reset, propagate, and derive slack across
    /// the whole graph. §9 sanctions a from-scratch recompute as a valid
    /// substitute for true incremental reprocessing; this analyzer always
    /// recomputes fully (satisfying bit-identical-to-a-full-rebuild by
    /// construction) while still tracking the dirty set so callers can
    /// observe what `invalidate_edge`/`invalidate_node` marked.
    ///
    /// On a fatal [`TimingError`], the analyzer is left `is_stale() == true`
    /// with its dirty set intact (§7); partially-written tags from the
    /// aborted run remain but should not be trusted.
    pub fn update_timing(
        &mut self,
        graph: &TimingGraph,
        constraints: &TimingConstraints,
        dc: &dyn DelayCalculator,
    ) -> Result<(), TimingError> {
        graph.validate()?;
        if !graph.is_levelized() {
            return Err(TimingError::Structural(
                "update_timing called on a graph that has not been successfully levelized".into(),
            ));
        }

        self.stale = true;
        W::update::<Ops>(graph, constraints, dc, &mut self.state, &mut self.profile)?;

        self.diagnostics.take_all();
        let unconstrained_startpoints = self.num_unconstrained_startpoints(graph);
        if unconstrained_startpoints > 0 {
            self.diagnostics.emit(Diagnostic::warning(
                unconstrained_startpoints_code(),
                format!("{unconstrained_startpoints} startpoint(s) have no clock or I/O affiliation"),
                Span::DUMMY,
            ));
        }
        let unconstrained_endpoints = self.num_unconstrained_endpoints(graph);
        if unconstrained_endpoints > 0 {
            self.diagnostics.emit(Diagnostic::warning(
                unconstrained_endpoints_code(),
                format!("{unconstrained_endpoints} endpoint(s) have no applicable timing check"),
                Span::DUMMY,
            ));
        }

        self.dirty_edges.clear();
        self.dirty_nodes.clear();
        self.stale = false;
        Ok(())
    }

    /// Access to the underlying traversal state, for the path tracer.
    pub(crate) fn state(&self) -> &AnalysisState {
        &self.state
    }
}

/// `TimingAnalyzer` specialized for setup (max-delay) checks.
pub type SetupTimingAnalyzer<W = SerialWalker> = TimingAnalyzer<SetupOps, W>;
/// `TimingAnalyzer` specialized for hold (min-delay) checks.
pub type HoldTimingAnalyzer<W = SerialWalker> = TimingAnalyzer<HoldOps, W>;

/// Maintains independent setup and hold analyzers side by side, mirroring
/// the source's `SetupHoldTimingAnalyzer` (there built via virtual
/// inheritance from both single-mode analyzers; here via composition, since
/// Rust has no multiple inheritance and the two sides never share mutable
/// state).
pub struct SetupHoldTimingAnalyzer<W: GraphWalker = SerialWalker> {
    pub setup: TimingAnalyzer<SetupOps, W>,
    pub hold: TimingAnalyzer<HoldOps, W>,
}

impl<W: GraphWalker> SetupHoldTimingAnalyzer<W> {
    /// Allocates independent setup/hold analyzer state sized to `graph`.
    pub fn new(graph: &TimingGraph) -> Self {
        Self {
            setup: TimingAnalyzer::new(graph),
            hold: TimingAnalyzer::new(graph),
        }
    }

    /// This façade's fixed kind.
    pub fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::SetupHold
    }

    /// Marks `edge` dirty on both sides.
    pub fn invalidate_edge(&mut self, edge: TimingEdgeId) {
        self.setup.invalidate_edge(edge);
        self.hold.invalidate_edge(edge);
    }

    /// Marks `node` dirty on both sides.
    pub fn invalidate_node(&mut self, node: TimingNodeId) {
        self.setup.invalidate_node(node);
        self.hold.invalidate_node(node);
    }

    /// Updates both the setup and hold analyzers. Stops at the first error
    /// (the hold side is not run if setup fails).
    pub fn update_timing(
        &mut self,
        graph: &TimingGraph,
        constraints: &TimingConstraints,
        dc: &dyn DelayCalculator,
    ) -> Result<(), TimingError> {
        self.setup.update_timing(graph, constraints, dc)?;
        self.hold.update_timing(graph, constraints, dc)?;
        Ok(())
    }

    /// `true` if either side is stale.
    pub fn is_stale(&self) -> bool {
        self.setup.is_stale() || self.hold.is_stale()
    }
}

/// Builds analyzers for a given (analysis variant, walker) composition,
/// mirroring the source's `AnalyzerFactory<Visitor, GraphWalker>::make`.
pub struct AnalyzerFactory;

impl AnalyzerFactory {
    /// Builds a setup-only analyzer.
    pub fn make_setup<W: GraphWalker>(graph: &TimingGraph) -> TimingAnalyzer<SetupOps, W> {
        TimingAnalyzer::new(graph)
    }

    /// Builds a hold-only analyzer.
    pub fn make_hold<W: GraphWalker>(graph: &TimingGraph) -> TimingAnalyzer<HoldOps, W> {
        TimingAnalyzer::new(graph)
    }

    /// Builds a combined setup+hold analyzer.
    pub fn make_setup_hold<W: GraphWalker>(graph: &TimingGraph) -> SetupHoldTimingAnalyzer<W> {
        SetupHoldTimingAnalyzer::new(graph)
    }
}
