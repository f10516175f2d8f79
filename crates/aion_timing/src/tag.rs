//! Timing tags and their per-node container.
//!
//! A [`TimingTag`] is a compact record carrying one kind of timing value at
//! a node, keyed by a `(tag_type, launch_domain, capture_domain)` triple.
//! [`TimingTags`] is the small dynamic per-node array that holds at most one
//! tag per key (for non-`Slack` types).

use crate::ids::DomainId;
use crate::ids::TimingNodeId;
use crate::time::Time;
use serde::{Deserialize, Serialize};

/// The kind of timing value a [`TimingTag`] carries.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum TagType {
    /// Clock arrival time at a launching flip-flop's clock pin.
    ClockLaunch,
    /// Clock arrival time at a capturing flip-flop's clock pin.
    ClockCapture,
    /// Data arrival time.
    DataArrival,
    /// Data required time.
    DataRequired,
    /// Derived slack (required - arrival, or arrival - required).
    Slack,
}

/// The direction used to merge two tags that share a key: larger time wins
/// (`Max`, used by setup arrival / hold required) or smaller time wins
/// (`Min`, used by hold arrival / setup required).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MergeOp {
    /// Keep the tag with the larger time.
    Max,
    /// Keep the tag with the smaller time.
    Min,
}

/// A single timing value at a node: `(time, origin_node, launch_domain,
/// capture_domain, tag_type)`.
///
/// `launch_domain`/`capture_domain` are `None` until the corresponding side
/// of the transfer is known (e.g. a `ClockLaunch` tag has no capture domain
/// until it reaches a capturing flip-flop). `origin_node` is the upstream
/// node whose value dominated the most recent merge; the path tracer
/// follows it in reverse.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimingTag {
    time: Time,
    origin_node: Option<TimingNodeId>,
    launch_domain: Option<DomainId>,
    capture_domain: Option<DomainId>,
    tag_type: TagType,
}

impl TimingTag {
    /// Creates a new tag with no recorded origin node.
    pub fn new(
        time: Time,
        tag_type: TagType,
        launch_domain: Option<DomainId>,
        capture_domain: Option<DomainId>,
    ) -> Self {
        Self {
            time,
            origin_node: None,
            launch_domain,
            capture_domain,
            tag_type,
        }
    }

    /// The constant-generator sentinel for setup-side arrival tags: loses
    /// every `Max` merge (`time = -inf`).
    pub fn constant_generator_setup_arrival(launch_domain: Option<DomainId>) -> Self {
        Self::new(Time::new(f64::NEG_INFINITY), TagType::DataArrival, launch_domain, None)
    }

    /// The constant-generator sentinel for hold-side arrival tags: loses
    /// every `Min` merge (`time = +inf`).
    pub fn constant_generator_hold_arrival(launch_domain: Option<DomainId>) -> Self {
        Self::new(Time::new(f64::INFINITY), TagType::DataArrival, launch_domain, None)
    }

    /// Sets the origin node (builder style).
    pub fn with_origin(mut self, node: TimingNodeId) -> Self {
        self.origin_node = Some(node);
        self
    }

    /// The tag's time value.
    pub fn time(&self) -> Time {
        self.time
    }

    /// The upstream node whose value dominated the last merge, if any.
    pub fn origin_node(&self) -> Option<TimingNodeId> {
        self.origin_node
    }

    /// The launch-side clock domain, if known.
    pub fn launch_domain(&self) -> Option<DomainId> {
        self.launch_domain
    }

    /// The capture-side clock domain, if known.
    pub fn capture_domain(&self) -> Option<DomainId> {
        self.capture_domain
    }

    /// This tag's type.
    pub fn tag_type(&self) -> TagType {
        self.tag_type
    }

    /// Returns a copy of this tag advanced by an edge delay and re-targeted
    /// at `origin`, the node the new value is attributed to.
    pub fn advanced(&self, delay: Time, new_origin: TimingNodeId) -> Self {
        Self {
            time: self.time + delay,
            origin_node: Some(new_origin),
            launch_domain: self.launch_domain,
            capture_domain: self.capture_domain,
            tag_type: self.tag_type,
        }
    }

    /// Returns a copy of this tag re-keyed to a new type and/or capture
    /// domain, used at the CPIN-to-SOURCE/SINK conversion points.
    pub fn retyped(
        &self,
        tag_type: TagType,
        launch_domain: Option<DomainId>,
        capture_domain: Option<DomainId>,
    ) -> Self {
        Self {
            time: self.time,
            origin_node: self.origin_node,
            launch_domain,
            capture_domain,
            tag_type,
        }
    }

    fn key(&self) -> (TagType, Option<DomainId>, Option<DomainId>) {
        (self.tag_type, self.launch_domain, self.capture_domain)
    }
}

/// The small dynamic per-node array of [`TimingTag`]s.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TimingTags {
    tags: Vec<TimingTag>,
}

impl TimingTags {
    /// Creates an empty tag set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tags currently stored.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// `true` if no tags are stored.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Inserts `tag`, or merges it into an existing tag sharing its
    /// `(tag_type, launch_domain, capture_domain)` key according to `op`.
    /// On an exact tie the incumbent is kept (stability, spec §4.5).
    pub fn insert_or_merge(&mut self, tag: TimingTag, op: MergeOp) {
        if let Some(existing) = self.tags.iter_mut().find(|t| t.key() == tag.key()) {
            let better = match op {
                MergeOp::Max => tag.time.value() > existing.time.value(),
                MergeOp::Min => tag.time.value() < existing.time.value(),
            };
            if better {
                *existing = tag;
            }
        } else {
            self.tags.push(tag);
        }
    }

    /// All tags of a given type, in insertion order.
    pub fn range(&self, tag_type: TagType) -> impl Iterator<Item = &TimingTag> {
        self.tags.iter().filter(move |t| t.tag_type == tag_type)
    }

    /// All tags, of any type.
    pub fn all(&self) -> impl Iterator<Item = &TimingTag> {
        self.tags.iter()
    }

    /// Tags matching a specific (launch, capture) domain pair.
    pub fn find(
        &self,
        launch: Option<DomainId>,
        capture: Option<DomainId>,
    ) -> impl Iterator<Item = &TimingTag> {
        self.tags
            .iter()
            .filter(move |t| t.launch_domain == launch && t.capture_domain == capture)
    }

    /// Finds the single tag of `tag_type` for `(launch, capture)`, if any.
    pub fn find_one(
        &self,
        tag_type: TagType,
        launch: Option<DomainId>,
        capture: Option<DomainId>,
    ) -> Option<&TimingTag> {
        self.tags
            .iter()
            .find(|t| t.tag_type == tag_type && t.launch_domain == launch && t.capture_domain == capture)
    }

    /// Removes all tags.
    pub fn clear(&mut self) {
        self.tags.clear();
    }

    /// Removes all tags of a given type.
    pub fn clear_type(&mut self, tag_type: TagType) {
        self.tags.retain(|t| t.tag_type != tag_type);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(i: u16) -> Option<DomainId> {
        Some(DomainId::from_raw(i))
    }

    #[test]
    fn insert_creates_new_entry() {
        let mut tags = TimingTags::new();
        let t = TimingTag::new(Time::new(1.0), TagType::DataArrival, d(0), None);
        tags.insert_or_merge(t, MergeOp::Max);
        assert_eq!(tags.len(), 1);
    }

    #[test]
    fn max_merge_keeps_larger() {
        let mut tags = TimingTags::new();
        tags.insert_or_merge(
            TimingTag::new(Time::new(1.0), TagType::DataArrival, d(0), None),
            MergeOp::Max,
        );
        tags.insert_or_merge(
            TimingTag::new(Time::new(2.0), TagType::DataArrival, d(0), None),
            MergeOp::Max,
        );
        assert_eq!(tags.len(), 1);
        assert_eq!(tags.all().next().unwrap().time().value(), 2.0);
    }

    #[test]
    fn max_merge_rejects_smaller() {
        let mut tags = TimingTags::new();
        tags.insert_or_merge(
            TimingTag::new(Time::new(2.0), TagType::DataArrival, d(0), None),
            MergeOp::Max,
        );
        tags.insert_or_merge(
            TimingTag::new(Time::new(1.0), TagType::DataArrival, d(0), None),
            MergeOp::Max,
        );
        assert_eq!(tags.all().next().unwrap().time().value(), 2.0);
    }

    #[test]
    fn min_merge_keeps_smaller() {
        let mut tags = TimingTags::new();
        tags.insert_or_merge(
            TimingTag::new(Time::new(2.0), TagType::DataArrival, d(0), None),
            MergeOp::Min,
        );
        tags.insert_or_merge(
            TimingTag::new(Time::new(1.0), TagType::DataArrival, d(0), None),
            MergeOp::Min,
        );
        assert_eq!(tags.all().next().unwrap().time().value(), 1.0);
    }

    #[test]
    fn tie_keeps_incumbent_origin() {
        let mut tags = TimingTags::new();
        let first = TimingTag::new(Time::new(1.0), TagType::DataArrival, d(0), None)
            .with_origin(TimingNodeId::from_raw(1));
        let second = TimingTag::new(Time::new(1.0), TagType::DataArrival, d(0), None)
            .with_origin(TimingNodeId::from_raw(2));
        tags.insert_or_merge(first, MergeOp::Max);
        tags.insert_or_merge(second, MergeOp::Max);
        assert_eq!(
            tags.all().next().unwrap().origin_node(),
            Some(TimingNodeId::from_raw(1))
        );
    }

    #[test]
    fn different_keys_coexist() {
        let mut tags = TimingTags::new();
        tags.insert_or_merge(
            TimingTag::new(Time::new(1.0), TagType::DataArrival, d(0), None),
            MergeOp::Max,
        );
        tags.insert_or_merge(
            TimingTag::new(Time::new(1.0), TagType::DataArrival, d(1), None),
            MergeOp::Max,
        );
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn range_filters_by_type() {
        let mut tags = TimingTags::new();
        tags.insert_or_merge(
            TimingTag::new(Time::new(1.0), TagType::DataArrival, d(0), None),
            MergeOp::Max,
        );
        tags.insert_or_merge(
            TimingTag::new(Time::new(1.0), TagType::DataRequired, d(0), None),
            MergeOp::Min,
        );
        assert_eq!(tags.range(TagType::DataArrival).count(), 1);
        assert_eq!(tags.range(TagType::DataRequired).count(), 1);
    }

    #[test]
    fn clear_type_only_removes_matching() {
        let mut tags = TimingTags::new();
        tags.insert_or_merge(
            TimingTag::new(Time::new(1.0), TagType::DataArrival, d(0), None),
            MergeOp::Max,
        );
        tags.insert_or_merge(
            TimingTag::new(Time::new(1.0), TagType::DataRequired, d(0), None),
            MergeOp::Min,
        );
        tags.clear_type(TagType::DataArrival);
        assert_eq!(tags.len(), 1);
        assert_eq!(tags.range(TagType::DataRequired).count(), 1);
    }

    #[test]
    fn constant_generator_sentinels() {
        let setup = TimingTag::constant_generator_setup_arrival(None);
        assert_eq!(setup.time().value(), f64::NEG_INFINITY);
        let hold = TimingTag::constant_generator_hold_arrival(None);
        assert_eq!(hold.time().value(), f64::INFINITY);
    }

    #[test]
    fn serde_roundtrip() {
        let t = TimingTag::new(Time::new(1.5), TagType::DataArrival, d(0), d(1))
            .with_origin(TimingNodeId::from_raw(4));
        let json = serde_json::to_string(&t).unwrap();
        let back: TimingTag = serde_json::from_str(&json).unwrap();
        assert_eq!(back.time().value(), 1.5);
        assert_eq!(back.origin_node(), Some(TimingNodeId::from_raw(4)));
    }
}
