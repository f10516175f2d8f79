//! Scalar time values used throughout the timing graph.
//!
//! NaN means "no value yet"; `+inf`/`-inf` are legitimate sentinels (used by
//! constant-generator tags, see [`crate::tag`]). Comparisons follow IEEE-754
//! `f64` semantics directly rather than a total-order wrapper, since the
//! engine never needs to put a `Time` in a `BTreeMap`/sorted container key.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};

/// Relative tolerance for "close enough" comparisons (spec §4.5).
pub const REL_TOLERANCE: f64 = 1e-5;
/// Absolute tolerance for "close enough" comparisons (spec §4.5).
pub const ABS_TOLERANCE: f64 = 1e-13;

/// A single scalar timing value, in nanoseconds.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Time(pub f64);

impl Time {
    /// The additive identity.
    pub const ZERO: Time = Time(0.0);

    /// `NaN` sentinel meaning "no value has been computed yet".
    pub fn unresolved() -> Time {
        Time(f64::NAN)
    }

    /// `true` if this is the "no value yet" sentinel.
    pub fn is_unresolved(self) -> bool {
        self.0.is_nan()
    }

    /// `true` if this is a finite, resolved value.
    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }

    /// Constructs a `Time` from a raw value.
    pub fn new(value: f64) -> Time {
        Time(value)
    }

    /// The raw scalar value.
    pub fn value(self) -> f64 {
        self.0
    }

    /// Approximate equality within spec §4.5 tolerance (relative ≤1e-5 or
    /// absolute ≤1e-13).
    pub fn approx_eq(self, other: Time) -> bool {
        if self.0.is_nan() && other.0.is_nan() {
            return true;
        }
        if self.0 == other.0 {
            return true;
        }
        let diff = (self.0 - other.0).abs();
        if diff <= ABS_TOLERANCE {
            return true;
        }
        let scale = self.0.abs().max(other.0.abs());
        scale > 0.0 && diff / scale <= REL_TOLERANCE
    }
}

impl fmt::Debug for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Time({})", self.0)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for Time {
    type Output = Time;
    fn add(self, rhs: Time) -> Time {
        Time(self.0 + rhs.0)
    }
}

impl Sub for Time {
    type Output = Time;
    fn sub(self, rhs: Time) -> Time {
        Time(self.0 - rhs.0)
    }
}

impl Neg for Time {
    type Output = Time;
    fn neg(self) -> Time {
        Time(-self.0)
    }
}

impl PartialOrd for Time {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.0.partial_cmp(&other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_is_nan() {
        assert!(Time::unresolved().is_unresolved());
        assert!(!Time::ZERO.is_unresolved());
    }

    #[test]
    fn arithmetic() {
        let a = Time::new(1.0);
        let b = Time::new(0.5);
        assert_eq!((a + b).value(), 1.5);
        assert_eq!((a - b).value(), 0.5);
        assert_eq!((-a).value(), -1.0);
    }

    #[test]
    fn approx_eq_within_tolerance() {
        let a = Time::new(1.0);
        let b = Time::new(1.0 + 1e-14);
        assert!(a.approx_eq(b));
    }

    #[test]
    fn approx_eq_rejects_large_diff() {
        let a = Time::new(1.0);
        let b = Time::new(1.1);
        assert!(!a.approx_eq(b));
    }

    #[test]
    fn infinities_are_finite_sentinel_not_unresolved() {
        let inf = Time::new(f64::INFINITY);
        assert!(!inf.is_unresolved());
        assert!(!inf.is_finite());
    }

    #[test]
    fn ordering() {
        assert!(Time::new(1.0) < Time::new(2.0));
        assert!(Time::new(f64::NEG_INFINITY) < Time::new(0.0));
    }
}
