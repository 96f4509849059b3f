//! Half-open ranges over one value domain
//!
//! A `RangeValue` is `[lower, upper)` with both bounds in the same
//! `RangeDomain`. Construction enforces `lower <= upper`; whether zero-width
//! ranges are acceptable for spans and segments is decided by configuration
//! at validation time, not here.
//!
//! Adjacency uses exact equality on the shared boundary. Discrete domains
//! additionally offer `touches_discretely`, which uses the domain's smallest
//! step.

use crate::bound::{BoundValue, DeltaValue, RangeDomain};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Which end of a range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Boundary {
    /// Inclusive lower bound
    Lower,
    /// Exclusive upper bound
    Upper,
}

/// Relation between two ranges, seen from the left operand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeRelation {
    /// No shared points and no shared boundary
    Disjoint,
    /// No shared points; one range ends exactly where the other starts
    Adjacent,
    /// Shared points, neither contains the other
    Overlapping,
    /// Left operand contains the right one
    Contains,
    /// Left operand is contained by the right one
    ContainedBy,
    /// Identical bounds
    Equal,
}

/// Half-open range `[lower, upper)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRange", into = "RawRange")]
pub struct RangeValue {
    lower: BoundValue,
    upper: BoundValue,
}

#[derive(Serialize, Deserialize)]
struct RawRange {
    lower: BoundValue,
    upper: BoundValue,
}

impl TryFrom<RawRange> for RangeValue {
    type Error = Error;

    fn try_from(raw: RawRange) -> Result<Self> {
        RangeValue::new(raw.lower, raw.upper)
    }
}

impl From<RangeValue> for RawRange {
    fn from(r: RangeValue) -> Self {
        RawRange {
            lower: r.lower,
            upper: r.upper,
        }
    }
}

impl RangeValue {
    /// Create a range, checking domains and bound order
    ///
    /// # Errors
    /// - `DomainMismatch` if the bounds belong to different domains
    /// - `InvalidRange` if `lower > upper`
    pub fn new(lower: impl Into<BoundValue>, upper: impl Into<BoundValue>) -> Result<Self> {
        let lower = lower.into();
        let upper = upper.into();
        if lower.try_cmp(&upper)? == Ordering::Greater {
            return Err(Error::invalid_range(
                lower,
                upper,
                "lower bound above upper bound",
            ));
        }
        Ok(Self { lower, upper })
    }

    /// Create a range from an inclusive upper bound
    ///
    /// Only defined for discrete domains: `[lower, upper]` becomes
    /// `[lower, upper + step)`.
    pub fn from_inclusive(
        lower: impl Into<BoundValue>,
        upper_inclusive: impl Into<BoundValue>,
    ) -> Result<Self> {
        let upper_inclusive = upper_inclusive.into();
        let step = upper_inclusive.domain().step().ok_or_else(|| {
            Error::invalid_operation(format!(
                "inclusive bounds need a discrete domain, got {}",
                upper_inclusive.domain()
            ))
        })?;
        Self::new(lower, upper_inclusive.checked_add(&step)?)
    }

    /// Inclusive lower bound
    pub fn lower(&self) -> &BoundValue {
        &self.lower
    }

    /// Exclusive upper bound
    pub fn upper(&self) -> &BoundValue {
        &self.upper
    }

    /// Bound at one end
    pub fn bound(&self, end: Boundary) -> &BoundValue {
        match end {
            Boundary::Lower => &self.lower,
            Boundary::Upper => &self.upper,
        }
    }

    /// Domain of both bounds
    pub fn domain(&self) -> RangeDomain {
        self.lower.domain()
    }

    /// True for a zero-width range
    pub fn is_empty(&self) -> bool {
        self.lower == self.upper
    }

    /// Same range with a different lower bound
    pub fn with_lower(&self, lower: BoundValue) -> Result<Self> {
        Self::new(lower, self.upper)
    }

    /// Same range with a different upper bound
    pub fn with_upper(&self, upper: BoundValue) -> Result<Self> {
        Self::new(self.lower, upper)
    }

    /// Same range with one end replaced
    pub fn with_bound(&self, end: Boundary, value: BoundValue) -> Result<Self> {
        match end {
            Boundary::Lower => self.with_lower(value),
            Boundary::Upper => self.with_upper(value),
        }
    }

    /// Range moved by `delta`
    pub fn shift(&self, delta: &DeltaValue) -> Result<Self> {
        Self::new(self.lower.checked_add(delta)?, self.upper.checked_add(delta)?)
    }

    fn ensure_same_domain(&self, other: &RangeValue) -> Result<()> {
        self.lower.ensure_same_domain(&other.lower)
    }

    /// Whether `value` lies in `[lower, upper)`
    pub fn contains_value(&self, value: &BoundValue) -> Result<bool> {
        Ok(self.lower.try_cmp(value)? != Ordering::Greater
            && value.try_cmp(&self.upper)? == Ordering::Less)
    }

    /// Whether `value` lies strictly between the bounds
    pub fn strictly_contains(&self, value: &BoundValue) -> Result<bool> {
        Ok(self.lower.try_cmp(value)? == Ordering::Less
            && value.try_cmp(&self.upper)? == Ordering::Less)
    }

    /// Whether `other` is a subset of `self`
    pub fn contains_range(&self, other: &RangeValue) -> Result<bool> {
        self.ensure_same_domain(other)?;
        Ok(self.lower <= other.lower && other.upper <= self.upper)
    }

    /// Whether the two ranges share at least one point
    ///
    /// A zero-width range has no points, so it overlaps nothing.
    pub fn overlaps(&self, other: &RangeValue) -> Result<bool> {
        self.ensure_same_domain(other)?;
        Ok(!self.is_empty()
            && !other.is_empty()
            && self.lower < other.upper
            && other.lower < self.upper)
    }

    /// Whether one range ends exactly where the other starts
    pub fn is_adjacent(&self, other: &RangeValue) -> Result<bool> {
        self.ensure_same_domain(other)?;
        Ok(self.upper == other.lower || other.upper == self.lower)
    }

    /// Touching test using the domain's smallest step
    ///
    /// True when the gap between the ranges is non-negative and smaller than
    /// one step. Bounds of a discrete domain are whole steps apart, so under
    /// half-open bounds that is a gap of zero: `[1,5)` touches `[5,10)` but
    /// not `[6,10)`. Continuous domains use exact adjacency as well.
    pub fn touches_discretely(&self, other: &RangeValue) -> Result<bool> {
        self.ensure_same_domain(other)?;
        let (first, second) = if self.lower <= other.lower {
            (self, other)
        } else {
            (other, self)
        };
        Ok(second.lower == first.upper)
    }

    /// Relation of `self` to `other`
    pub fn relate(&self, other: &RangeValue) -> Result<RangeRelation> {
        self.ensure_same_domain(other)?;
        if self == other {
            return Ok(RangeRelation::Equal);
        }
        if self.contains_range(other)? {
            return Ok(RangeRelation::Contains);
        }
        if other.contains_range(self)? {
            return Ok(RangeRelation::ContainedBy);
        }
        if self.overlaps(other)? {
            return Ok(RangeRelation::Overlapping);
        }
        if self.is_adjacent(other)? {
            return Ok(RangeRelation::Adjacent);
        }
        Ok(RangeRelation::Disjoint)
    }

    /// Smallest range containing both
    pub fn hull(&self, other: &RangeValue) -> Result<RangeValue> {
        self.ensure_same_domain(other)?;
        let lower = if self.lower <= other.lower {
            self.lower
        } else {
            other.lower
        };
        let upper = if self.upper >= other.upper {
            self.upper
        } else {
            other.upper
        };
        Self::new(lower, upper)
    }

    /// Shared part of both ranges, if any
    pub fn intersection(&self, other: &RangeValue) -> Result<Option<RangeValue>> {
        if !self.overlaps(other)? {
            return Ok(None);
        }
        let lower = if self.lower >= other.lower {
            self.lower
        } else {
            other.lower
        };
        let upper = if self.upper <= other.upper {
            self.upper
        } else {
            other.upper
        };
        Self::new(lower, upper).map(Some)
    }
}

impl fmt::Display for RangeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.lower, self.upper)
    }
}
