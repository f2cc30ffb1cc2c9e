//! Miscellaneous utility structs and functions.

use std::fmt::Debug;

use cgmath::num_traits::Float;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An interval on the real number line.
#[derive(Copy, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Interval<T> {
    pub min: T,
    pub max: T,
}

impl<T> Interval<T> {
    /// Creates a new interval.
    pub const fn new(min: T, max: T) -> Self {
        Self { min, max }
    }
}

impl<T: std::cmp::PartialOrd> Interval<T> {
    /// Returns true if this interval overlaps with the other.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.max > other.min && other.max > self.min
    }

    /// Returns true if this interval contains the value.
    pub fn contains(&self, value: T) -> bool {
        value >= self.min && value <= self.max
    }
}

impl<T: Float> Interval<T> {
    /// Creates an interval with the given centre and radius.
    pub fn disc(centre: T, radius: T) -> Self {
        Self {
            min: centre - radius,
            max: centre + radius,
        }
    }

    /// Returns the overlapping part of two intervals, if there is one.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let min = T::max(self.min, other.min);
        let max = T::min(self.max, other.max);
        (min <= max).then_some(Self { min, max })
    }
}

impl<T: Debug> Debug for Interval<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Interval({:?}, {:?})", &self.min, &self.max)
    }
}

#[cfg(test)]
mod test {
    use super::Interval;

    #[test]
    fn intersections() {
        let a = Interval::new(0.0, 4.0);
        assert_eq!(a.intersect(&Interval::new(2.0, 6.0)), Some(Interval::new(2.0, 4.0)));
        assert_eq!(a.intersect(&Interval::new(5.0, 6.0)), None);
        assert!(a.overlaps(&Interval::new(3.0, 6.0)));
        assert!(!a.overlaps(&Interval::new(4.0, 6.0)));
    }
}
