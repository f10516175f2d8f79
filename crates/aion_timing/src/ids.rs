//! Opaque ID newtypes for timing graph entities, plus the dense `IdVec`
//! "linear map" used for all per-id storage in this crate.
//!
//! [`TimingNodeId`], [`TimingEdgeId`], [`DomainId`] and [`LevelId`] are thin
//! integer wrappers used as arena indices. They are `Copy`, `Hash`, and
//! `Serialize`/`Deserialize`. `DomainId` is deliberately narrower than the
//! node/edge ids since clock domain counts are small, keeping tag records
//! tightly packed.

use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident($repr:ty)) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
        pub struct $name($repr);

        impl $name {
            /// Creates an ID from a raw index.
            pub fn from_raw(index: $repr) -> Self {
                Self(index)
            }

            /// Returns the raw index.
            pub fn as_raw(self) -> $repr {
                self.0
            }
        }

        impl Idx for $name {
            fn index(self) -> usize {
                self.0 as usize
            }

            fn from_index(i: usize) -> Self {
                Self(i as $repr)
            }
        }
    };
}

/// Anything that can address a dense [`IdVec`].
pub trait Idx: Copy {
    /// Converts this id to a dense `usize` index.
    fn index(self) -> usize;
    /// Reconstructs an id from a dense `usize` index.
    fn from_index(i: usize) -> Self;
}

define_id!(
    /// Opaque, copyable ID for a node in the timing graph.
    TimingNodeId(u32)
);

define_id!(
    /// Opaque, copyable ID for an edge in the timing graph.
    TimingEdgeId(u32)
);

define_id!(
    /// Opaque, copyable ID for a clock domain. Narrower than node/edge ids
    /// because domain counts are small, keeping [`crate::tag::TimingTag`] tight.
    DomainId(u16)
);

define_id!(
    /// Opaque, copyable ID for a levelization level.
    LevelId(u32)
);

/// A dense, `Vec`-backed map from a strongly-typed id to a value.
///
/// This is the "linear map" utility referenced throughout the component
/// design: every per-node, per-edge, or per-domain table in this crate is
/// one of these rather than a `HashMap`, since ids are dense integers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IdVec<K, V> {
    data: Vec<V>,
    #[serde(skip)]
    _marker: PhantomData<fn(K)>,
}

impl<K: Idx, V> IdVec<K, V> {
    /// Creates an empty `IdVec`.
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Creates an `IdVec` with `n` elements, each produced by `f`.
    pub fn with_len_filled(n: usize, mut f: impl FnMut() -> V) -> Self {
        Self {
            data: (0..n).map(|_| f()).collect(),
            _marker: PhantomData,
        }
    }

    /// Number of elements stored.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// `true` if no elements are stored.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Appends a value, returning the id it was stored under.
    pub fn push(&mut self, value: V) -> K {
        let id = K::from_index(self.data.len());
        self.data.push(value);
        id
    }

    /// Grows the vector (if needed) so that `id` is a valid index, filling
    /// new slots with `default()`.
    pub fn ensure(&mut self, id: K, mut default: impl FnMut() -> V) {
        let idx = id.index();
        if idx >= self.data.len() {
            self.data.resize_with(idx + 1, &mut default);
        }
    }

    /// Returns a reference to the value at `id`, if present.
    pub fn get(&self, id: K) -> Option<&V> {
        self.data.get(id.index())
    }

    /// Returns a mutable reference to the value at `id`, if present.
    pub fn get_mut(&mut self, id: K) -> Option<&mut V> {
        self.data.get_mut(id.index())
    }

    /// Iterates over `(id, &value)` pairs in dense id order.
    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> {
        self.data
            .iter()
            .enumerate()
            .map(|(i, v)| (K::from_index(i), v))
    }

    /// Iterates over ids in dense order.
    pub fn ids(&self) -> impl Iterator<Item = K> + '_ {
        (0..self.data.len()).map(K::from_index)
    }

    /// Clears all elements, retaining allocated capacity.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Raw slice access.
    pub fn as_slice(&self) -> &[V] {
        &self.data
    }

    /// Raw mutable slice access, e.g. for whole-array parallel iteration
    /// where every element is independently owned by its id (no cross-id
    /// aliasing, so element-wise `par_iter_mut` is always sound here).
    pub fn as_mut_slice(&mut self) -> &mut [V] {
        &mut self.data
    }
}

impl<K: Idx, V> Default for IdVec<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Idx, V> Index<K> for IdVec<K, V> {
    type Output = V;
    fn index(&self, id: K) -> &V {
        &self.data[id.index()]
    }
}

impl<K: Idx, V> IndexMut<K> for IdVec<K, V> {
    fn index_mut(&mut self, id: K) -> &mut V {
        &mut self.data[id.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn node_id_roundtrip() {
        let id = TimingNodeId::from_raw(42);
        assert_eq!(id.as_raw(), 42);
    }

    #[test]
    fn edge_id_roundtrip() {
        let id = TimingEdgeId::from_raw(99);
        assert_eq!(id.as_raw(), 99);
    }

    #[test]
    fn domain_id_is_u16() {
        let id = DomainId::from_raw(3);
        assert_eq!(id.as_raw(), 3u16);
    }

    #[test]
    fn node_id_equality() {
        let a = TimingNodeId::from_raw(7);
        let b = TimingNodeId::from_raw(7);
        let c = TimingNodeId::from_raw(8);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn node_id_hash_in_set() {
        let mut set = HashSet::new();
        set.insert(TimingNodeId::from_raw(1));
        set.insert(TimingNodeId::from_raw(2));
        set.insert(TimingNodeId::from_raw(1));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn node_id_serde_roundtrip() {
        let id = TimingNodeId::from_raw(99);
        let json = serde_json::to_string(&id).unwrap();
        let restored: TimingNodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, restored);
    }

    #[test]
    fn edge_id_serde_roundtrip() {
        let id = TimingEdgeId::from_raw(55);
        let json = serde_json::to_string(&id).unwrap();
        let restored: TimingEdgeId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, restored);
    }

    #[test]
    fn id_zero_and_max() {
        let zero = TimingNodeId::from_raw(0);
        let max = TimingNodeId::from_raw(u32::MAX);
        assert_eq!(zero.as_raw(), 0);
        assert_eq!(max.as_raw(), u32::MAX);
        assert_ne!(zero, max);
    }

    #[test]
    fn id_debug_format() {
        let id = TimingEdgeId::from_raw(42);
        let debug = format!("{id:?}");
        assert!(debug.contains("42"));
    }

    #[test]
    fn id_vec_push_and_index() {
        let mut v: IdVec<TimingNodeId, &str> = IdVec::new();
        let a = v.push("first");
        let b = v.push("second");
        assert_eq!(v[a], "first");
        assert_eq!(v[b], "second");
        assert_eq!(v.len(), 2);
    }

    #[test]
    fn id_vec_ensure_grows() {
        let mut v: IdVec<TimingNodeId, i32> = IdVec::new();
        v.ensure(TimingNodeId::from_raw(3), || 0);
        assert_eq!(v.len(), 4);
    }

    #[test]
    fn id_vec_iter_order() {
        let mut v: IdVec<TimingNodeId, i32> = IdVec::new();
        v.push(10);
        v.push(20);
        let collected: Vec<_> = v.iter().map(|(id, val)| (id.as_raw(), *val)).collect();
        assert_eq!(collected, vec![(0, 10), (1, 20)]);
    }

    #[test]
    fn id_vec_with_len_filled() {
        let v: IdVec<TimingNodeId, i32> = IdVec::with_len_filled(5, || 7);
        assert_eq!(v.len(), 5);
        assert_eq!(v[TimingNodeId::from_raw(4)], 7);
    }
}
