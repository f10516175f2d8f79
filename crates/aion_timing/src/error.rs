//! Fatal error conditions that abort a timing update.
//!
//! Per §7, `StructuralError`/`CycleError`/`MissingDelayError` are fatal and
//! abort [`crate::analyzer::TimingAnalyzer::update_timing`], leaving the
//! analyzer in a well-defined "stale" state (tags cleared, dirty set
//! intact). `UnconstrainedWarning`/`NumericWarning` are non-fatal and are
//! surfaced through [`aion_diagnostics::DiagnosticSink`] instead of this
//! enum — see [`crate::analyzer::TimingAnalyzer::diagnostics`].

use crate::ids::{TimingEdgeId, TimingNodeId};
use thiserror::Error;

/// A fatal error that aborts `update_timing`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TimingError {
    /// Invalid id, duplicate edge, mismatched endpoints, or any other
    /// graph-shape inconsistency caught by [`crate::graph::TimingGraph::validate`].
    #[error("structural error: {0}")]
    Structural(String),

    /// A strongly-connected component of size >= 2 remained after
    /// levelization and the loop-break policy was not enabled (or could not
    /// fully resolve it).
    #[error("combinational loop detected across {0} node(s) (edges {1:?})")]
    Cycle(usize, Vec<TimingEdgeId>),

    /// The delay calculator returned a non-finite time for a live
    /// (enabled) edge.
    #[error("delay calculator returned a non-finite delay for edge {0:?}")]
    MissingDelay(TimingEdgeId),

    /// A node id referenced by a query or constraint does not exist in the
    /// graph.
    #[error("unknown node id {0:?}")]
    UnknownNode(TimingNodeId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_structural() {
        let e = TimingError::Structural("bad edge".into());
        assert!(format!("{e}").contains("bad edge"));
    }

    #[test]
    fn display_cycle() {
        let e = TimingError::Cycle(3, vec![TimingEdgeId::from_raw(0)]);
        assert!(format!("{e}").contains('3'));
    }

    #[test]
    fn display_missing_delay() {
        let e = TimingError::MissingDelay(TimingEdgeId::from_raw(7));
        assert!(format!("{e}").contains("delay"));
    }
}
