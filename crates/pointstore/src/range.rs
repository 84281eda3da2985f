//! Inclusive time intervals for range queries.

use std::ops::Bound;

/// An optionally-bounded, inclusive range of timestamps.
///
/// A missing lower bound is treated as 0 and a missing upper bound as
/// `i64::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeRange {
    start: Option<i64>,
    end: Option<i64>,
}

impl TimeRange {
    /// The unbounded range.
    pub fn all() -> Self {
        Self::default()
    }

    /// All samples at or after `start`.
    pub fn since(start: i64) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    /// All samples at or before `end`.
    pub fn until(end: i64) -> Self {
        Self {
            start: None,
            end: Some(end),
        }
    }

    /// All samples in `[start, end]`.
    pub fn between(start: i64, end: i64) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// The lower bound, if one was given.
    pub fn lower(&self) -> Option<i64> {
        self.start
    }

    /// The upper bound, if one was given.
    pub fn upper(&self) -> Option<i64> {
        self.end
    }

    /// The effective lower bound.
    pub fn lower_or_zero(&self) -> i64 {
        self.start.unwrap_or(0)
    }

    /// The effective upper bound.
    pub fn upper_or_max(&self) -> i64 {
        self.end.unwrap_or(i64::MAX)
    }

    /// True if `timestamp` falls inside the range.
    pub fn contains(&self, timestamp: i64) -> bool {
        self.start.map_or(true, |s| timestamp >= s) && self.end.map_or(true, |e| timestamp <= e)
    }

    /// The range as inclusive bounds usable with `BTreeMap::range`.
    pub fn as_bounds(&self) -> (Bound<i64>, Bound<i64>) {
        (
            Bound::Included(self.lower_or_zero()),
            Bound::Included(self.upper_or_max()),
        )
    }
}
