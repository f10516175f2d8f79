//! Timing constraints: clock domains, constant generators, I/O constraints,
//! setup/hold constraint matrices, clock uncertainty, and source latency.
//!
//! Unlike the timing graph, constraints are not dense enough over the full
//! (node, domain) space to justify `IdVec` storage, so lookups use
//! `HashMap`s keyed by the relevant id tuple; absence of a key carries
//! meaning (see `should_analyze`) and is never conflated with a stored zero.

use crate::graph::NodeIdMap;
use crate::ids::{DomainId, Idx, IdVec, TimingNodeId};
use aion_common::Ident;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Whether an I/O constraint bounds the earliest (`Min`) or latest (`Max`)
/// arrival/required time.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum IoBound {
    /// Latest allowed value (used for setup-side analysis).
    Max,
    /// Earliest allowed value (used for hold-side analysis).
    Min,
}

/// A clock domain: a dense id, a human-readable (interned) name, and an
/// optional source node. A domain with no source node is *virtual*.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ClockDomain {
    id: DomainId,
    name: Ident,
    source_node: Option<TimingNodeId>,
}

impl ClockDomain {
    /// The dense id of this domain.
    pub fn id(&self) -> DomainId {
        self.id
    }

    /// The interned name of this domain.
    pub fn name(&self) -> Ident {
        self.name
    }

    /// The clock-generating node, if this is not a virtual domain.
    pub fn source_node(&self) -> Option<TimingNodeId> {
        self.source_node
    }

    /// `true` if this domain has no physical clock source.
    pub fn is_virtual(&self) -> bool {
        self.source_node.is_none()
    }
}

type DomainPair = (DomainId, DomainId);
type IoKey = (TimingNodeId, DomainId, IoBound);

/// Clock domains, constant generators, I/O constraints, setup/hold
/// constraint matrices, clock uncertainty, and source latency for a
/// [`crate::graph::TimingGraph`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TimingConstraints {
    domains: IdVec<DomainId, ClockDomain>,
    constant_generators: HashSet<TimingNodeId>,
    io_constraints: HashMap<IoKey, f64>,
    setup_constraints: HashMap<DomainPair, f64>,
    hold_constraints: HashMap<DomainPair, f64>,
    setup_uncertainty: HashMap<DomainPair, f64>,
    hold_uncertainty: HashMap<DomainPair, f64>,
    source_latency_early: HashMap<DomainId, f64>,
    source_latency_late: HashMap<DomainId, f64>,
}

impl TimingConstraints {
    /// Creates an empty constraint set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new clock domain with the given name, initially virtual
    /// (no source node). Returns the dense [`DomainId`] assigned.
    pub fn add_clock_domain(&mut self, name: Ident) -> DomainId {
        let id = DomainId::from_index(self.domains.len());
        self.domains.push(ClockDomain {
            id,
            name,
            source_node: None,
        });
        id
    }

    /// Sets (or clears) the physical source node for a domain, making it
    /// non-virtual (or virtual again if `None`).
    pub fn set_clock_source(&mut self, domain: DomainId, node: Option<TimingNodeId>) {
        self.domains[domain].source_node = node;
    }

    /// Looks up a clock domain by id.
    pub fn clock_domain(&self, domain: DomainId) -> &ClockDomain {
        &self.domains[domain]
    }

    /// Iterates over all registered clock domains.
    pub fn clock_domains(&self) -> impl Iterator<Item = &ClockDomain> {
        self.domains.as_slice().iter()
    }

    /// Marks `node` as a constant generator: tags originating from it are
    /// suppressed during analysis (no meaningful path runs through it).
    pub fn add_constant_generator(&mut self, node: TimingNodeId) {
        self.constant_generators.insert(node);
    }

    /// `true` if `node` was marked a constant generator.
    pub fn is_constant_generator(&self, node: TimingNodeId) -> bool {
        self.constant_generators.contains(&node)
    }

    /// Records an I/O constraint (arrival offset at a primary input, or
    /// required offset at a primary output) for `(node, domain, bound)`.
    pub fn set_io_constraint(
        &mut self,
        node: TimingNodeId,
        domain: DomainId,
        bound: IoBound,
        value: f64,
    ) {
        self.io_constraints.insert((node, domain, bound), value);
    }

    /// Looks up an I/O constraint; `None` means unconstrained.
    pub fn io_constraint(&self, node: TimingNodeId, domain: DomainId, bound: IoBound) -> Option<f64> {
        self.io_constraints.get(&(node, domain, bound)).copied()
    }

    /// Sets the setup constraint (max transfer time) for a (launch, capture)
    /// domain pair.
    pub fn set_setup_constraint(&mut self, launch: DomainId, capture: DomainId, value: f64) {
        self.setup_constraints.insert((launch, capture), value);
    }

    /// The setup constraint for a (launch, capture) pair, or `None` if this
    /// transfer is not analyzed for setup.
    pub fn setup_constraint(&self, launch: DomainId, capture: DomainId) -> Option<f64> {
        self.setup_constraints.get(&(launch, capture)).copied()
    }

    /// Sets the hold constraint (min transfer time) for a (launch, capture)
    /// domain pair.
    pub fn set_hold_constraint(&mut self, launch: DomainId, capture: DomainId, value: f64) {
        self.hold_constraints.insert((launch, capture), value);
    }

    /// The hold constraint for a (launch, capture) pair, or `None` if this
    /// transfer is not analyzed for hold.
    pub fn hold_constraint(&self, launch: DomainId, capture: DomainId) -> Option<f64> {
        self.hold_constraints.get(&(launch, capture)).copied()
    }

    /// Whether the (launch, capture) transfer should be analyzed at all:
    /// `true` iff a setup or hold constraint is present for the pair.
    pub fn should_analyze(&self, launch: DomainId, capture: DomainId) -> bool {
        self.setup_constraint(launch, capture).is_some()
            || self.hold_constraint(launch, capture).is_some()
    }

    /// Sets the setup-side clock uncertainty (pessimism subtracted from the
    /// capture side) for a (launch, capture) pair.
    pub fn set_setup_uncertainty(&mut self, launch: DomainId, capture: DomainId, value: f64) {
        self.setup_uncertainty.insert((launch, capture), value);
    }

    /// The setup-side clock uncertainty for a (launch, capture) pair,
    /// defaulting to `0.0` if unset.
    pub fn setup_uncertainty(&self, launch: DomainId, capture: DomainId) -> f64 {
        self.setup_uncertainty
            .get(&(launch, capture))
            .copied()
            .unwrap_or(0.0)
    }

    /// Sets the hold-side clock uncertainty for a (launch, capture) pair.
    pub fn set_hold_uncertainty(&mut self, launch: DomainId, capture: DomainId, value: f64) {
        self.hold_uncertainty.insert((launch, capture), value);
    }

    /// The hold-side clock uncertainty for a (launch, capture) pair,
    /// defaulting to `0.0` if unset.
    pub fn hold_uncertainty(&self, launch: DomainId, capture: DomainId) -> f64 {
        self.hold_uncertainty
            .get(&(launch, capture))
            .copied()
            .unwrap_or(0.0)
    }

    /// Sets the early source latency for a domain's clock source.
    pub fn set_source_latency_early(&mut self, domain: DomainId, value: f64) {
        self.source_latency_early.insert(domain, value);
    }

    /// The early source latency for a domain, defaulting to `0.0` if unset.
    pub fn source_latency_early(&self, domain: DomainId) -> f64 {
        self.source_latency_early.get(&domain).copied().unwrap_or(0.0)
    }

    /// Sets the late source latency for a domain's clock source.
    pub fn set_source_latency_late(&mut self, domain: DomainId, value: f64) {
        self.source_latency_late.insert(domain, value);
    }

    /// The late source latency for a domain, defaulting to `0.0` if unset.
    pub fn source_latency_late(&self, domain: DomainId) -> f64 {
        self.source_latency_late.get(&domain).copied().unwrap_or(0.0)
    }

    /// Rewrites every node id held by this constraint set according to
    /// `map`, following [`crate::graph::TimingGraph::optimize_layout`].
    pub fn remap_nodes(&mut self, map: &NodeIdMap) {
        for domain in self.domains.as_slice().iter().map(|d| d.id).collect::<Vec<_>>() {
            let old_source = self.domains[domain].source_node;
            self.domains[domain].source_node = old_source.map(|n| map.new_id(n));
        }

        self.constant_generators = self
            .constant_generators
            .drain()
            .map(|n| map.new_id(n))
            .collect();

        self.io_constraints = self
            .io_constraints
            .drain()
            .map(|((node, domain, bound), value)| ((map.new_id(node), domain, bound), value))
            .collect();
    }
}
