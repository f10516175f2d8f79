//! Echo I/O: a fixed four-section text dump of a timing graph, its
//! constraints, its delay model, and (optionally) an analysis result (§6.1).
//!
//! Grounded in the source's `echo_writer`: one dump holds everything needed
//! to replay an analysis bit-for-bit without recomputing a netlist-to-graph
//! lowering, which makes it the crate's regression-test fixture format. The
//! reader is a natural companion the source never wrote (it only ever wrote
//! echoes, for humans to read); reading them back lets a test assert a dump
//! round-trips losslessly.
//!
//! # Format
//!
//! Four sections appear in order, each introduced by an unindented header
//! line (`timing_graph:`, `timing_constraints:`, `delay_model:`,
//! `analysis_result:`). Records are indented by one space; a record may
//! span several physical lines by ending each non-final line with a
//! trailing `\`, which the reader joins back into one logical line before
//! parsing fields. A domain field of `-1` means "no domain" (`None`).

use crate::analyzer::AnalyzerKind;
use crate::constraints::{IoBound, TimingConstraints};
use crate::delay::DelayCalculator;
use crate::graph::{TimingEdgeType, TimingGraph, TimingNodeType};
use crate::ids::{DomainId, Idx, TimingEdgeId, TimingNodeId};
use crate::ops::AnalysisOps;
use crate::tag::{TagType, TimingTag};
use crate::time::Time;
use crate::walker::GraphWalker;
use aion_common::{Ident, Interner};
use std::fmt::Write as _;
use thiserror::Error;

/// Failures reading a previously written echo back into its parts.
#[derive(Debug, Error)]
pub enum EchoError {
    /// A line did not match the expected grammar for its section.
    #[error("malformed echo line: {0}")]
    Malformed(String),
    /// A numeric or id field failed to parse.
    #[error("invalid field {field:?} in line: {line}")]
    InvalidField {
        /// The field text that failed to parse.
        field: String,
        /// The full line it came from.
        line: String,
    },
}

fn node_type_name(t: TimingNodeType) -> &'static str {
    match t {
        TimingNodeType::Source => "SOURCE",
        TimingNodeType::Sink => "SINK",
        TimingNodeType::Ipin => "IPIN",
        TimingNodeType::Opin => "OPIN",
        TimingNodeType::Cpin => "CPIN",
    }
}

fn parse_node_type(s: &str) -> Option<TimingNodeType> {
    match s {
        "SOURCE" => Some(TimingNodeType::Source),
        "SINK" => Some(TimingNodeType::Sink),
        "IPIN" => Some(TimingNodeType::Ipin),
        "OPIN" => Some(TimingNodeType::Opin),
        "CPIN" => Some(TimingNodeType::Cpin),
        _ => None,
    }
}

fn edge_type_name(t: TimingEdgeType) -> &'static str {
    match t {
        TimingEdgeType::PrimitiveCombinational => "PRIMITIVE_COMBINATIONAL",
        TimingEdgeType::PrimitiveClockLaunch => "PRIMITIVE_CLOCK_LAUNCH",
        TimingEdgeType::PrimitiveClockCapture => "PRIMITIVE_CLOCK_CAPTURE",
        TimingEdgeType::Interconnect => "INTERCONNECT",
    }
}

fn parse_edge_type(s: &str) -> Option<TimingEdgeType> {
    match s {
        "PRIMITIVE_COMBINATIONAL" => Some(TimingEdgeType::PrimitiveCombinational),
        "PRIMITIVE_CLOCK_LAUNCH" => Some(TimingEdgeType::PrimitiveClockLaunch),
        "PRIMITIVE_CLOCK_CAPTURE" => Some(TimingEdgeType::PrimitiveClockCapture),
        "INTERCONNECT" => Some(TimingEdgeType::Interconnect),
        _ => None,
    }
}

/// Name of the `type:` record an I/O constraint writes, per §6.1: the four
/// names distinguish bound (`MAX`/`MIN`) and node role (`INPUT`/`OUTPUT`);
/// the role comes from the node's type, not a separate stored dimension.
fn io_constraint_type_name(bound: IoBound, node_type: TimingNodeType) -> &'static str {
    match (bound, node_type) {
        (IoBound::Max, TimingNodeType::Sink) => "MAX_OUTPUT_CONSTRAINT",
        (IoBound::Min, TimingNodeType::Sink) => "MIN_OUTPUT_CONSTRAINT",
        (IoBound::Max, _) => "MAX_INPUT_CONSTRAINT",
        (IoBound::Min, _) => "MIN_INPUT_CONSTRAINT",
    }
}

/// Reverses [`io_constraint_type_name`]: the INPUT/OUTPUT half of the name is
/// cosmetic on read, since [`TimingConstraints`] stores a single
/// `(node, domain, bound)` table regardless of the node's role.
fn parse_io_constraint_type(s: &str) -> Option<IoBound> {
    match s {
        "MAX_INPUT_CONSTRAINT" | "MAX_OUTPUT_CONSTRAINT" => Some(IoBound::Max),
        "MIN_INPUT_CONSTRAINT" | "MIN_OUTPUT_CONSTRAINT" => Some(IoBound::Min),
        _ => None,
    }
}

/// Name of the `type:` record an `analysis_result:` tag or slack writes:
/// a `SETUP_`/`HOLD_` prefix (the analyzer's [`AnalyzerKind`]) followed by
/// the tag's role, per §6.1's ten-name table.
fn result_type_name(kind: AnalyzerKind, tag_type: TagType) -> &'static str {
    use AnalyzerKind::{Hold, Setup, SetupHold};
    use TagType::{ClockCapture, ClockLaunch, DataArrival, DataRequired, Slack};
    match (kind, tag_type) {
        (Setup, DataArrival) => "SETUP_DATA_ARRIVAL",
        (Setup, DataRequired) => "SETUP_DATA_REQUIRED",
        (Setup, ClockLaunch) => "SETUP_LAUNCH_CLOCK",
        (Setup, ClockCapture) => "SETUP_CAPTURE_CLOCK",
        (Setup, Slack) => "SETUP_SLACK",
        (Hold, DataArrival) => "HOLD_DATA_ARRIVAL",
        (Hold, DataRequired) => "HOLD_DATA_REQUIRED",
        (Hold, ClockLaunch) => "HOLD_LAUNCH_CLOCK",
        (Hold, ClockCapture) => "HOLD_CAPTURE_CLOCK",
        (Hold, Slack) => "HOLD_SLACK",
        (SetupHold, _) => unreachable!("write_result_section is only called on a single-mode analyzer"),
    }
}

/// Reverses [`result_type_name`].
fn parse_result_type(s: &str) -> Option<(AnalyzerKind, TagType)> {
    use AnalyzerKind::{Hold, Setup};
    use TagType::{ClockCapture, ClockLaunch, DataArrival, DataRequired, Slack};
    match s {
        "SETUP_DATA_ARRIVAL" => Some((Setup, DataArrival)),
        "SETUP_DATA_REQUIRED" => Some((Setup, DataRequired)),
        "SETUP_LAUNCH_CLOCK" => Some((Setup, ClockLaunch)),
        "SETUP_CAPTURE_CLOCK" => Some((Setup, ClockCapture)),
        "SETUP_SLACK" => Some((Setup, Slack)),
        "HOLD_DATA_ARRIVAL" => Some((Hold, DataArrival)),
        "HOLD_DATA_REQUIRED" => Some((Hold, DataRequired)),
        "HOLD_LAUNCH_CLOCK" => Some((Hold, ClockLaunch)),
        "HOLD_CAPTURE_CLOCK" => Some((Hold, ClockCapture)),
        "HOLD_SLACK" => Some((Hold, Slack)),
        _ => None,
    }
}

/// The keyed field name a result record's value is stored under: `slack:`
/// for a `Slack` tag, `time:` for any other tag type.
fn result_value_key(tag_type: TagType) -> &'static str {
    if tag_type == TagType::Slack { "slack" } else { "time" }
}

fn domain_field(d: Option<DomainId>) -> i64 {
    d.map_or(-1, |d| d.as_raw() as i64)
}

fn parse_domain_field(s: &str, line: &str) -> Result<Option<DomainId>, EchoError> {
    let raw: i64 = s.parse().map_err(|_| EchoError::InvalidField {
        field: s.to_string(),
        line: line.to_string(),
    })?;
    if raw < 0 {
        Ok(None)
    } else {
        Ok(Some(DomainId::from_raw(raw as u16)))
    }
}

// ---------------------------------------------------------------- writer --

/// Writes a `timing_graph:` section: one ` node:` record per node (its
/// type and in/out edge ids) followed by one ` edge:` record per edge (its
/// type, endpoints, and disabled flag).
fn write_graph_section(out: &mut String, graph: &TimingGraph) {
    out.push_str("timing_graph:\n");
    for node in graph.nodes() {
        let in_edges = graph
            .node_in_edges(node)
            .iter()
            .map(|e| e.as_raw().to_string())
            .collect::<Vec<_>>()
            .join(" ");
        let out_edges = graph
            .node_out_edges(node)
            .iter()
            .map(|e| e.as_raw().to_string())
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(
            out,
            " node: {} \\\n   type: {} \\\n   in_edges: {} \\\n   out_edges: {}",
            node.as_raw(),
            node_type_name(graph.node_type(node)),
            in_edges,
            out_edges,
        );
    }
    for edge in graph.edges() {
        let _ = writeln!(
            out,
            " edge: {} \\\n   type: {} \\\n   src_node: {} \\\n   sink_node: {} \\\n   disabled: {}",
            edge.as_raw(),
            edge_type_name(graph.edge_type(edge)),
            graph.edge_src_node(edge).as_raw(),
            graph.edge_sink_node(edge).as_raw(),
            graph.edge_disabled(edge),
        );
    }
}

/// Writes a `timing_constraints:` section. Every record kind is emitted
/// only for the (node, domain) pairs actually present in `constraints`
/// (absence, not a zero record, is how "unconstrained" is represented).
fn write_constraints_section(out: &mut String, graph: &TimingGraph, constraints: &TimingConstraints, interner: &Interner) {
    out.push_str("timing_constraints:\n");
    for domain in constraints.clock_domains() {
        let _ = writeln!(
            out,
            " type: CLOCK domain: {} name: \"{}\"",
            domain.id().as_raw(),
            interner.resolve(domain.name()),
        );
        if let Some(src) = domain.source_node() {
            let _ = writeln!(out, " type: CLOCK_SOURCE node: {} domain: {}", src.as_raw(), domain.id().as_raw());
        }
    }
    for node in graph.nodes() {
        if constraints.is_constant_generator(node) {
            let _ = writeln!(out, " type: CONSTANT_GENERATOR node: {}", node.as_raw());
        }
        for domain in constraints.clock_domains() {
            let d = domain.id();
            for bound in [IoBound::Max, IoBound::Min] {
                if let Some(v) = constraints.io_constraint(node, d, bound) {
                    let _ = writeln!(
                        out,
                        " type: {} node: {} domain: {} constraint: {}",
                        io_constraint_type_name(bound, graph.node_type(node)),
                        node.as_raw(),
                        d.as_raw(),
                        v,
                    );
                }
            }
        }
    }
    let domains: Vec<DomainId> = constraints.clock_domains().map(|d| d.id()).collect();
    for &launch in &domains {
        for &capture in &domains {
            if let Some(v) = constraints.setup_constraint(launch, capture) {
                let _ = writeln!(
                    out,
                    " type: SETUP_CONSTRAINT launch_domain: {} capture_domain: {} constraint: {}",
                    launch.as_raw(),
                    capture.as_raw(),
                    v,
                );
            }
            if let Some(v) = constraints.hold_constraint(launch, capture) {
                let _ = writeln!(
                    out,
                    " type: HOLD_CONSTRAINT launch_domain: {} capture_domain: {} constraint: {}",
                    launch.as_raw(),
                    capture.as_raw(),
                    v,
                );
            }
            let su = constraints.setup_uncertainty(launch, capture);
            if su != 0.0 {
                let _ = writeln!(
                    out,
                    " type: SETUP_UNCERTAINTY launch_domain: {} capture_domain: {} constraint: {}",
                    launch.as_raw(),
                    capture.as_raw(),
                    su,
                );
            }
            let hu = constraints.hold_uncertainty(launch, capture);
            if hu != 0.0 {
                let _ = writeln!(
                    out,
                    " type: HOLD_UNCERTAINTY launch_domain: {} capture_domain: {} constraint: {}",
                    launch.as_raw(),
                    capture.as_raw(),
                    hu,
                );
            }
        }
    }
    for &domain in &domains {
        let early = constraints.source_latency_early(domain);
        if early != 0.0 {
            let _ = writeln!(out, " type: EARLY_SOURCE_LATENCY domain: {} latency: {}", domain.as_raw(), early);
        }
        let late = constraints.source_latency_late(domain);
        if late != 0.0 {
            let _ = writeln!(out, " type: LATE_SOURCE_LATENCY domain: {} latency: {}", domain.as_raw(), late);
        }
    }
}

/// Writes a `delay_model:` section: for each edge, either `min_delay:`/
/// `max_delay:` (the common case) or, for a `CPIN -> SINK` clock-capture
/// edge, `setup_time:`/`hold_time:` instead.
fn write_delay_section(out: &mut String, graph: &TimingGraph, dc: &dyn DelayCalculator) {
    out.push_str("delay_model:\n");
    for edge in graph.edges() {
        if matches!(graph.edge_type(edge), TimingEdgeType::PrimitiveClockCapture) {
            let _ = writeln!(
                out,
                " edge: {} \\\n   setup_time: {} \\\n   hold_time: {}",
                edge.as_raw(),
                dc.setup_time(graph, edge),
                dc.hold_time(graph, edge),
            );
        } else {
            let _ = writeln!(
                out,
                " edge: {} \\\n   min_delay: {} \\\n   max_delay: {}",
                edge.as_raw(),
                dc.min_edge_delay(graph, edge),
                dc.max_edge_delay(graph, edge),
            );
        }
    }
}

fn write_node_result_record(out: &mut String, kind: AnalyzerKind, node: TimingNodeId, tag: &TimingTag) {
    let _ = writeln!(
        out,
        " type: {} node: {} launch_domain: {} capture_domain: {} {}: {}",
        result_type_name(kind, tag.tag_type()),
        node.as_raw(),
        domain_field(tag.launch_domain()),
        domain_field(tag.capture_domain()),
        result_value_key(tag.tag_type()),
        tag.time(),
    );
}

fn write_edge_result_record(out: &mut String, kind: AnalyzerKind, edge: TimingEdgeId, tag: &TimingTag) {
    let _ = writeln!(
        out,
        " type: {} edge: {} launch_domain: {} capture_domain: {} {}: {}",
        result_type_name(kind, tag.tag_type()),
        edge.as_raw(),
        domain_field(tag.launch_domain()),
        domain_field(tag.capture_domain()),
        result_value_key(tag.tag_type()),
        tag.time(),
    );
}

/// Writes an `analysis_result:` section from a completed [`TimingAnalyzer`]:
/// per-node tags and slacks, then one record per edge with a recorded
/// edge-level slack.
///
/// [`TimingAnalyzer`]: crate::analyzer::TimingAnalyzer
fn write_result_section<Ops: AnalysisOps, W: GraphWalker>(
    out: &mut String,
    graph: &TimingGraph,
    analyzer: &crate::analyzer::TimingAnalyzer<Ops, W>,
) {
    out.push_str("analysis_result:\n");
    let kind = analyzer.kind();
    for node in graph.nodes() {
        for tag in analyzer.tags(node) {
            write_node_result_record(out, kind, node, tag);
        }
        for slack in analyzer.node_slacks(node) {
            write_node_result_record(out, kind, node, slack);
        }
    }
    for edge in graph.edges() {
        for slack in analyzer.edge_slacks(edge) {
            write_edge_result_record(out, kind, edge, slack);
        }
    }
}

/// Serializes `graph`/`constraints`/`dc` (and, if given, a completed
/// analyzer's tags and slacks) into the four-section echo format.
pub fn write_echo<Ops: AnalysisOps, W: GraphWalker>(
    graph: &TimingGraph,
    constraints: &TimingConstraints,
    interner: &Interner,
    dc: &dyn DelayCalculator,
    analyzer: Option<&crate::analyzer::TimingAnalyzer<Ops, W>>,
) -> String {
    let mut out = String::new();
    write_graph_section(&mut out, graph);
    out.push('\n');
    write_constraints_section(&mut out, graph, constraints, interner);
    out.push('\n');
    write_delay_section(&mut out, graph, dc);
    if let Some(analyzer) = analyzer {
        out.push('\n');
        write_result_section(&mut out, graph, analyzer);
    }
    out
}

// ---------------------------------------------------------------- reader --

/// One parsed `delay_model:` record: either the min/max pair or the
/// setup/hold pair, depending on which fields the line carried.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EchoDelayRecord {
    /// The edge this record describes.
    pub edge: TimingEdgeId,
    /// Minimum edge delay, for non-clock-capture edges.
    pub min_delay: Option<Time>,
    /// Maximum edge delay, for non-clock-capture edges.
    pub max_delay: Option<Time>,
    /// Setup time, for clock-capture edges.
    pub setup_time: Option<Time>,
    /// Hold time, for clock-capture edges.
    pub hold_time: Option<Time>,
}

/// One parsed `analysis_result:` tag or slack record: keyed by a node for
/// per-node tags/slacks, or by an edge for an edge-level slack (never both).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EchoTagRecord {
    /// Which analyzer produced this record.
    pub kind: AnalyzerKind,
    /// The node this record was recorded at, for a node-level record.
    pub node: Option<TimingNodeId>,
    /// The edge this record was recorded at, for an edge-level slack.
    pub edge: Option<TimingEdgeId>,
    /// The tag's type (`Slack` for a slack record).
    pub tag_type: TagType,
    /// The launch-side domain, if any.
    pub launch_domain: Option<DomainId>,
    /// The capture-side domain, if any.
    pub capture_domain: Option<DomainId>,
    /// The recorded time or slack value.
    pub time: Time,
}

/// The fully parsed contents of an echo dump: a rebuilt graph and
/// constraints, plus the raw delay and analysis-result records (these are
/// left as flat tables rather than re-wrapped in a [`DelayCalculator`] impl
/// or analyzer state, since the reader's job is comparison, not replay).
#[derive(Debug)]
pub struct EchoDocument {
    /// The rebuilt timing graph.
    pub graph: TimingGraph,
    /// The rebuilt constraint set.
    pub constraints: TimingConstraints,
    /// Per-edge delay/setup/hold records from the `delay_model:` section.
    pub delays: Vec<EchoDelayRecord>,
    /// Tag and slack records from the `analysis_result:` section, if present.
    pub tags: Vec<EchoTagRecord>,
}

/// Joins backslash-continued physical lines into logical lines, stripping
/// section headers and blank lines along the way. Returns `(header,
/// logical_line)` pairs in file order, where `header` is the most recently
/// seen section name.
fn logical_lines(input: &str) -> Vec<(String, String)> {
    let mut result = Vec::new();
    let mut current_header = String::new();
    let mut pending = String::new();
    let mut lines = input.lines().peekable();

    while let Some(raw) = lines.next() {
        let trimmed = raw.trim_end();
        if trimmed.trim().is_empty() {
            continue;
        }
        if !trimmed.starts_with(' ') && trimmed.ends_with(':') {
            current_header = trimmed.trim_end_matches(':').to_string();
            continue;
        }
        if let Some(stripped) = trimmed.strip_suffix('\\') {
            pending.push_str(stripped.trim());
            pending.push(' ');
            continue;
        }
        pending.push_str(trimmed.trim());
        result.push((current_header.clone(), std::mem::take(&mut pending)));
    }
    result
}

fn parse_u32_field(s: &str, line: &str) -> Result<u32, EchoError> {
    s.parse().map_err(|_| EchoError::InvalidField {
        field: s.to_string(),
        line: line.to_string(),
    })
}

fn parse_time_field(s: &str, line: &str) -> Result<Time, EchoError> {
    s.parse::<f64>()
        .map(Time::new)
        .map_err(|_| EchoError::InvalidField {
            field: s.to_string(),
            line: line.to_string(),
        })
}

/// Splits a logical line into whitespace tokens, locating the value that
/// follows each `key:` marker (a run of tokens up to the next `key:`).
fn keyed_fields(line: &str) -> Vec<(String, String)> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let mut fields = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        if let Some(key) = tokens[i].strip_suffix(':') {
            let mut j = i + 1;
            while j < tokens.len() && !tokens[j].ends_with(':') {
                j += 1;
            }
            fields.push((key.to_string(), tokens[i + 1..j].join(" ")));
            i = j;
        } else {
            i += 1;
        }
    }
    fields
}

fn parse_graph_section(lines: &[&str]) -> Result<TimingGraph, EchoError> {
    let mut graph = TimingGraph::new();
    let mut node_types: Vec<(u32, TimingNodeType)> = Vec::new();
    let mut edge_recs: Vec<(u32, TimingEdgeType, u32, u32, bool)> = Vec::new();

    for &line in lines {
        let fields = keyed_fields(line);
        if line.trim_start().starts_with("node:") {
            let id = parse_u32_field(&fields[0].1, line)?;
            let node_type = fields
                .iter()
                .find(|(k, _)| k == "type")
                .and_then(|(_, v)| parse_node_type(v))
                .ok_or_else(|| EchoError::Malformed(line.to_string()))?;
            node_types.push((id, node_type));
        } else if line.trim_start().starts_with("edge:") {
            let id = parse_u32_field(&fields[0].1, line)?;
            let edge_type = fields
                .iter()
                .find(|(k, _)| k == "type")
                .and_then(|(_, v)| parse_edge_type(v))
                .ok_or_else(|| EchoError::Malformed(line.to_string()))?;
            let src = fields
                .iter()
                .find(|(k, _)| k == "src_node")
                .ok_or_else(|| EchoError::Malformed(line.to_string()))?;
            let sink = fields
                .iter()
                .find(|(k, _)| k == "sink_node")
                .ok_or_else(|| EchoError::Malformed(line.to_string()))?;
            let disabled = fields
                .iter()
                .find(|(k, _)| k == "disabled")
                .map(|(_, v)| v == "true")
                .unwrap_or(false);
            edge_recs.push((
                id,
                edge_type,
                parse_u32_field(&src.1, line)?,
                parse_u32_field(&sink.1, line)?,
                disabled,
            ));
        } else {
            return Err(EchoError::Malformed(line.to_string()));
        }
    }

    node_types.sort_by_key(|(id, _)| *id);
    let mut id_map = std::collections::HashMap::new();
    for (old_id, node_type) in node_types {
        let new_id = graph.add_node(node_type);
        id_map.insert(old_id, new_id);
    }

    edge_recs.sort_by_key(|(id, ..)| *id);
    for (_, edge_type, src, sink, disabled) in edge_recs {
        let src = *id_map
            .get(&src)
            .ok_or_else(|| EchoError::Malformed(format!("unknown src node {src}")))?;
        let sink = *id_map
            .get(&sink)
            .ok_or_else(|| EchoError::Malformed(format!("unknown sink node {sink}")))?;
        let edge = graph.add_edge(edge_type, src, sink);
        if disabled {
            graph.disable_edge(edge, true);
        }
    }

    Ok(graph)
}

fn required_keyed_field(fields: &[(String, String)], key: &str, line: &str) -> Result<String, EchoError> {
    fields
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.clone())
        .ok_or_else(|| EchoError::Malformed(line.to_string()))
}

fn parse_constraints_section(
    lines: &[&str],
    interner: &Interner,
) -> Result<TimingConstraints, EchoError> {
    let mut constraints = TimingConstraints::new();
    let mut domain_idents: std::collections::HashMap<u16, Ident> = std::collections::HashMap::new();
    let mut domain_ids: std::collections::HashMap<u16, DomainId> = std::collections::HashMap::new();

    for &line in lines {
        let fields = keyed_fields(line);
        if required_keyed_field(&fields, "type", line)? == "CLOCK" {
            let raw: u16 = required_keyed_field(&fields, "domain", line)?
                .parse()
                .map_err(|_| EchoError::Malformed(line.to_string()))?;
            let name = required_keyed_field(&fields, "name", line)?;
            let ident = interner.get_or_intern(name.trim_matches('"'));
            domain_idents.insert(raw, ident);
        }
    }

    let mut ordered: Vec<u16> = domain_idents.keys().copied().collect();
    ordered.sort_unstable();
    for raw in ordered {
        let id = constraints.add_clock_domain(domain_idents[&raw]);
        domain_ids.insert(raw, id);
    }

    let resolve_domain = |raw: &str, line: &str| -> Result<DomainId, EchoError> {
        let raw: u16 = raw.parse().map_err(|_| EchoError::InvalidField {
            field: raw.to_string(),
            line: line.to_string(),
        })?;
        domain_ids
            .get(&raw)
            .copied()
            .ok_or_else(|| EchoError::Malformed(format!("unknown domain {raw} in line: {line}")))
    };

    for &line in lines {
        let fields = keyed_fields(line);
        let type_name = required_keyed_field(&fields, "type", line)?;
        match type_name.as_str() {
            "CLOCK" => {}
            "CLOCK_SOURCE" => {
                let node = TimingNodeId::from_raw(parse_u32_field(&required_keyed_field(&fields, "node", line)?, line)?);
                let domain = resolve_domain(&required_keyed_field(&fields, "domain", line)?, line)?;
                constraints.set_clock_source(domain, Some(node));
            }
            "CONSTANT_GENERATOR" => {
                let node = TimingNodeId::from_raw(parse_u32_field(&required_keyed_field(&fields, "node", line)?, line)?);
                constraints.add_constant_generator(node);
            }
            "MAX_INPUT_CONSTRAINT" | "MAX_OUTPUT_CONSTRAINT" | "MIN_INPUT_CONSTRAINT" | "MIN_OUTPUT_CONSTRAINT" => {
                let bound = parse_io_constraint_type(&type_name).expect("matched above");
                let node = TimingNodeId::from_raw(parse_u32_field(&required_keyed_field(&fields, "node", line)?, line)?);
                let domain = resolve_domain(&required_keyed_field(&fields, "domain", line)?, line)?;
                let value = parse_time_field(&required_keyed_field(&fields, "constraint", line)?, line)?;
                constraints.set_io_constraint(node, domain, bound, value.value());
            }
            "SETUP_CONSTRAINT" => {
                let launch = resolve_domain(&required_keyed_field(&fields, "launch_domain", line)?, line)?;
                let capture = resolve_domain(&required_keyed_field(&fields, "capture_domain", line)?, line)?;
                let value = parse_time_field(&required_keyed_field(&fields, "constraint", line)?, line)?;
                constraints.set_setup_constraint(launch, capture, value.value());
            }
            "HOLD_CONSTRAINT" => {
                let launch = resolve_domain(&required_keyed_field(&fields, "launch_domain", line)?, line)?;
                let capture = resolve_domain(&required_keyed_field(&fields, "capture_domain", line)?, line)?;
                let value = parse_time_field(&required_keyed_field(&fields, "constraint", line)?, line)?;
                constraints.set_hold_constraint(launch, capture, value.value());
            }
            "SETUP_UNCERTAINTY" => {
                let launch = resolve_domain(&required_keyed_field(&fields, "launch_domain", line)?, line)?;
                let capture = resolve_domain(&required_keyed_field(&fields, "capture_domain", line)?, line)?;
                let value = parse_time_field(&required_keyed_field(&fields, "constraint", line)?, line)?;
                constraints.set_setup_uncertainty(launch, capture, value.value());
            }
            "HOLD_UNCERTAINTY" => {
                let launch = resolve_domain(&required_keyed_field(&fields, "launch_domain", line)?, line)?;
                let capture = resolve_domain(&required_keyed_field(&fields, "capture_domain", line)?, line)?;
                let value = parse_time_field(&required_keyed_field(&fields, "constraint", line)?, line)?;
                constraints.set_hold_uncertainty(launch, capture, value.value());
            }
            "EARLY_SOURCE_LATENCY" => {
                let domain = resolve_domain(&required_keyed_field(&fields, "domain", line)?, line)?;
                let value = parse_time_field(&required_keyed_field(&fields, "latency", line)?, line)?;
                constraints.set_source_latency_early(domain, value.value());
            }
            "LATE_SOURCE_LATENCY" => {
                let domain = resolve_domain(&required_keyed_field(&fields, "domain", line)?, line)?;
                let value = parse_time_field(&required_keyed_field(&fields, "latency", line)?, line)?;
                constraints.set_source_latency_late(domain, value.value());
            }
            _ => return Err(EchoError::Malformed(line.to_string())),
        }
    }

    Ok(constraints)
}

fn parse_delay_section(lines: &[&str]) -> Result<Vec<EchoDelayRecord>, EchoError> {
    let mut out = Vec::new();
    for &line in lines {
        let fields = keyed_fields(line);
        let edge = fields
            .first()
            .filter(|(k, _)| k == "edge")
            .ok_or_else(|| EchoError::Malformed(line.to_string()))?;
        let edge_id = TimingEdgeId::from_raw(parse_u32_field(&edge.1, line)?);
        let get = |key: &str| -> Result<Option<Time>, EchoError> {
            match fields.iter().find(|(k, _)| k == key) {
                Some((_, v)) => Ok(Some(parse_time_field(v, line)?)),
                None => Ok(None),
            }
        };
        out.push(EchoDelayRecord {
            edge: edge_id,
            min_delay: get("min_delay")?,
            max_delay: get("max_delay")?,
            setup_time: get("setup_time")?,
            hold_time: get("hold_time")?,
        });
    }
    Ok(out)
}

fn parse_result_section(lines: &[&str]) -> Result<Vec<EchoTagRecord>, EchoError> {
    let mut out = Vec::new();
    for &line in lines {
        let fields = keyed_fields(line);
        let type_name = required_keyed_field(&fields, "type", line)?;
        let (kind, tag_type) = parse_result_type(&type_name).ok_or_else(|| EchoError::Malformed(line.to_string()))?;

        let node = fields
            .iter()
            .find(|(k, _)| k == "node")
            .map(|(_, v)| parse_u32_field(v, line))
            .transpose()?
            .map(TimingNodeId::from_raw);
        let edge = fields
            .iter()
            .find(|(k, _)| k == "edge")
            .map(|(_, v)| parse_u32_field(v, line))
            .transpose()?
            .map(TimingEdgeId::from_raw);
        if node.is_none() && edge.is_none() {
            return Err(EchoError::Malformed(line.to_string()));
        }

        let launch_domain = parse_domain_field(&required_keyed_field(&fields, "launch_domain", line)?, line)?;
        let capture_domain = parse_domain_field(&required_keyed_field(&fields, "capture_domain", line)?, line)?;
        let value = required_keyed_field(&fields, result_value_key(tag_type), line)?;
        let time = parse_time_field(&value, line)?;

        out.push(EchoTagRecord {
            kind,
            node,
            edge,
            tag_type,
            launch_domain,
            capture_domain,
            time,
        });
    }
    Ok(out)
}

/// Parses a dump produced by [`write_echo`] back into its graph,
/// constraints, delay-model records, and (if present) analysis-result
/// records.
pub fn read_echo(input: &str, interner: &Interner) -> Result<EchoDocument, EchoError> {
    let joined = logical_lines(input);

    let mut graph_lines = Vec::new();
    let mut constraints_lines = Vec::new();
    let mut delay_lines = Vec::new();
    let mut result_lines = Vec::new();

    for (header, line) in &joined {
        match header.as_str() {
            "timing_graph" => graph_lines.push(line.as_str()),
            "timing_constraints" => constraints_lines.push(line.as_str()),
            "delay_model" => delay_lines.push(line.as_str()),
            "analysis_result" => result_lines.push(line.as_str()),
            other => return Err(EchoError::Malformed(format!("unknown section {other:?}"))),
        }
    }

    Ok(EchoDocument {
        graph: parse_graph_section(&graph_lines)?,
        constraints: parse_constraints_section(&constraints_lines, interner)?,
        delays: parse_delay_section(&delay_lines)?,
        tags: parse_result_section(&result_lines)?,
    })
}
