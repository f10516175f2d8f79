//! The delay-calculator interface: a pure, thread-safe contract for
//! per-edge delays and setup/hold checks. Implementations are out of scope
//! for this crate (§1) — it consumes the trait only.

use crate::graph::TimingGraph;
use crate::ids::TimingEdgeId;
use crate::time::Time;

/// Supplies edge delays and flip-flop setup/hold check times.
///
/// All methods must be pure (no interior mutability observable across
/// calls) and safe to invoke concurrently on distinct edges — the
/// [`crate::walker::ParallelWalker`] calls these from multiple threads with
/// no synchronization of its own.
pub trait DelayCalculator: Sync {
    /// The minimum (shortest-path / hold-relevant) delay of `edge`.
    fn min_edge_delay(&self, graph: &TimingGraph, edge: TimingEdgeId) -> Time;

    /// The maximum (longest-path / setup-relevant) delay of `edge`.
    fn max_edge_delay(&self, graph: &TimingGraph, edge: TimingEdgeId) -> Time;

    /// The setup time at the sink of `edge`, applicable when `edge` is a
    /// `CPIN -> SINK` clock-capture edge.
    fn setup_time(&self, graph: &TimingGraph, edge: TimingEdgeId) -> Time;

    /// The hold time at the sink of `edge`, applicable when `edge` is a
    /// `CPIN -> SINK` clock-capture edge.
    fn hold_time(&self, graph: &TimingGraph, edge: TimingEdgeId) -> Time;
}

/// A trivial [`DelayCalculator`] returning the same fixed delay/setup/hold
/// values for every edge. Useful for tests and as a minimal reference
/// implementation; not intended for production delay modeling.
#[derive(Clone, Copy, Debug)]
pub struct FixedDelayCalculator {
    /// Minimum edge delay returned for every edge.
    pub min_delay: Time,
    /// Maximum edge delay returned for every edge.
    pub max_delay: Time,
    /// Setup time returned for every edge.
    pub setup: Time,
    /// Hold time returned for every edge.
    pub hold: Time,
}

impl FixedDelayCalculator {
    /// Creates a calculator with identical min/max delay (no derating) and
    /// the given setup/hold times.
    pub fn uniform(delay: f64, setup: f64, hold: f64) -> Self {
        Self {
            min_delay: Time::new(delay),
            max_delay: Time::new(delay),
            setup: Time::new(setup),
            hold: Time::new(hold),
        }
    }
}

impl DelayCalculator for FixedDelayCalculator {
    fn min_edge_delay(&self, _graph: &TimingGraph, _edge: TimingEdgeId) -> Time {
        self.min_delay
    }

    fn max_edge_delay(&self, _graph: &TimingGraph, _edge: TimingEdgeId) -> Time {
        self.max_delay
    }

    fn setup_time(&self, _graph: &TimingGraph, _edge: TimingEdgeId) -> Time {
        self.setup
    }

    fn hold_time(&self, _graph: &TimingGraph, _edge: TimingEdgeId) -> Time {
        self.hold
    }
}
