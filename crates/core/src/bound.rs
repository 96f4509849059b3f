//! Range value domains
//!
//! Every range in spanline is built from two `BoundValue`s of the same
//! `RangeDomain`. Each domain carries its own delta type (`DeltaValue`) so
//! that `bound - bound -> delta` and `bound + delta -> bound` are defined.
//!
//! ## Comparison
//!
//! Bounds are comparable **within the same domain**. Cross-domain comparison
//! is undefined: `partial_cmp` returns `None` and `try_cmp` fails with
//! `Error::DomainMismatch`.
//!
//! ## Discrete domains
//!
//! `Integer`, `BigInteger` and `Date` have a smallest representable step
//! (1, 1 and one day). `Decimal` and `Timestamp` are treated as continuous.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Supported value domains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeDomain {
    /// 32-bit integers
    Integer,
    /// 64-bit integers
    BigInteger,
    /// Arbitrary precision decimals
    Decimal,
    /// Calendar dates
    Date,
    /// UTC timestamps
    Timestamp,
}

impl RangeDomain {
    /// Whether the domain has a smallest step
    pub fn is_discrete(&self) -> bool {
        matches!(
            self,
            RangeDomain::Integer | RangeDomain::BigInteger | RangeDomain::Date
        )
    }

    /// Smallest representable delta, for discrete domains
    pub fn step(&self) -> Option<DeltaValue> {
        match self {
            RangeDomain::Integer | RangeDomain::BigInteger => Some(DeltaValue::Integer(1)),
            RangeDomain::Date => Some(DeltaValue::Duration(TimeDelta::days(1))),
            RangeDomain::Decimal | RangeDomain::Timestamp => None,
        }
    }

    /// Name used in messages and configuration
    pub fn name(&self) -> &'static str {
        match self {
            RangeDomain::Integer => "integer",
            RangeDomain::BigInteger => "big_integer",
            RangeDomain::Decimal => "decimal",
            RangeDomain::Date => "date",
            RangeDomain::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for RangeDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Deltas
// ============================================================================

/// Difference between two bounds of one domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeltaValue {
    /// Delta for `Integer` and `BigInteger`
    Integer(i64),
    /// Delta for `Decimal`
    Decimal(Decimal),
    /// Delta for `Date` (whole days) and `Timestamp`
    Duration(TimeDelta),
}

impl DeltaValue {
    /// Whether this delta may be applied to bounds of `domain`
    pub fn fits(&self, domain: RangeDomain) -> bool {
        matches!(
            (self, domain),
            (DeltaValue::Integer(_), RangeDomain::Integer)
                | (DeltaValue::Integer(_), RangeDomain::BigInteger)
                | (DeltaValue::Decimal(_), RangeDomain::Decimal)
                | (DeltaValue::Duration(_), RangeDomain::Date)
                | (DeltaValue::Duration(_), RangeDomain::Timestamp)
        )
    }

    /// Representative domain, used when reporting a mismatch
    pub fn domain_hint(&self) -> RangeDomain {
        match self {
            DeltaValue::Integer(_) => RangeDomain::BigInteger,
            DeltaValue::Decimal(_) => RangeDomain::Decimal,
            DeltaValue::Duration(_) => RangeDomain::Timestamp,
        }
    }

    /// True for a zero delta
    pub fn is_zero(&self) -> bool {
        match self {
            DeltaValue::Integer(v) => *v == 0,
            DeltaValue::Decimal(v) => v.is_zero(),
            DeltaValue::Duration(v) => v.is_zero(),
        }
    }

    /// True for a strictly negative delta
    pub fn is_negative(&self) -> bool {
        match self {
            DeltaValue::Integer(v) => *v < 0,
            DeltaValue::Decimal(v) => v.is_sign_negative() && !v.is_zero(),
            DeltaValue::Duration(v) => *v < TimeDelta::zero(),
        }
    }

    /// Negated delta
    pub fn checked_neg(&self) -> Result<DeltaValue> {
        let overflow = || Error::Overflow {
            value: "0".to_string(),
            delta: format!("-({})", self),
        };
        Ok(match self {
            DeltaValue::Integer(v) => DeltaValue::Integer(v.checked_neg().ok_or_else(overflow)?),
            DeltaValue::Decimal(v) => DeltaValue::Decimal(-*v),
            DeltaValue::Duration(v) => {
                DeltaValue::Duration(TimeDelta::zero().checked_sub(v).ok_or_else(overflow)?)
            }
        })
    }
}

impl fmt::Display for DeltaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeltaValue::Integer(v) => write!(f, "{}", v),
            DeltaValue::Decimal(v) => write!(f, "{}", v),
            DeltaValue::Duration(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for DeltaValue {
    fn from(v: i64) -> Self {
        DeltaValue::Integer(v)
    }
}

impl From<i32> for DeltaValue {
    fn from(v: i32) -> Self {
        DeltaValue::Integer(v as i64)
    }
}

impl From<Decimal> for DeltaValue {
    fn from(v: Decimal) -> Self {
        DeltaValue::Decimal(v)
    }
}

impl From<TimeDelta> for DeltaValue {
    fn from(v: TimeDelta) -> Self {
        DeltaValue::Duration(v)
    }
}

// ============================================================================
// Bounds
// ============================================================================

/// One boundary value of a range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "domain", content = "value", rename_all = "snake_case")]
pub enum BoundValue {
    /// 32-bit integer bound
    Integer(i32),
    /// 64-bit integer bound
    BigInteger(i64),
    /// Decimal bound
    Decimal(Decimal),
    /// Date bound
    Date(NaiveDate),
    /// Timestamp bound
    Timestamp(DateTime<Utc>),
}

impl BoundValue {
    /// Domain of this bound
    pub fn domain(&self) -> RangeDomain {
        match self {
            BoundValue::Integer(_) => RangeDomain::Integer,
            BoundValue::BigInteger(_) => RangeDomain::BigInteger,
            BoundValue::Decimal(_) => RangeDomain::Decimal,
            BoundValue::Date(_) => RangeDomain::Date,
            BoundValue::Timestamp(_) => RangeDomain::Timestamp,
        }
    }

    /// Compare two bounds, failing across domains
    pub fn try_cmp(&self, other: &BoundValue) -> Result<Ordering> {
        self.partial_cmp(other).ok_or(Error::DomainMismatch {
            expected: self.domain(),
            found: other.domain(),
        })
    }

    /// Ensure `other` belongs to the same domain as `self`
    pub fn ensure_same_domain(&self, other: &BoundValue) -> Result<()> {
        if self.domain() == other.domain() {
            Ok(())
        } else {
            Err(Error::DomainMismatch {
                expected: self.domain(),
                found: other.domain(),
            })
        }
    }

    /// `self + delta`
    pub fn checked_add(&self, delta: &DeltaValue) -> Result<BoundValue> {
        if !delta.fits(self.domain()) {
            return Err(Error::DomainMismatch {
                expected: self.domain(),
                found: delta.domain_hint(),
            });
        }
        let overflow = || Error::Overflow {
            value: self.to_string(),
            delta: delta.to_string(),
        };
        match (self, delta) {
            (BoundValue::Integer(v), DeltaValue::Integer(d)) => {
                let sum = (*v as i64).checked_add(*d).ok_or_else(overflow)?;
                let narrowed = i32::try_from(sum).map_err(|_| overflow())?;
                Ok(BoundValue::Integer(narrowed))
            }
            (BoundValue::BigInteger(v), DeltaValue::Integer(d)) => {
                Ok(BoundValue::BigInteger(v.checked_add(*d).ok_or_else(overflow)?))
            }
            (BoundValue::Decimal(v), DeltaValue::Decimal(d)) => {
                Ok(BoundValue::Decimal(v.checked_add(*d).ok_or_else(overflow)?))
            }
            (BoundValue::Date(v), DeltaValue::Duration(d)) => {
                if *d != TimeDelta::days(d.num_days()) {
                    return Err(Error::invalid_operation(format!(
                        "date bounds move in whole days, got {}",
                        d
                    )));
                }
                Ok(BoundValue::Date(v.checked_add_signed(*d).ok_or_else(overflow)?))
            }
            (BoundValue::Timestamp(v), DeltaValue::Duration(d)) => {
                Ok(BoundValue::Timestamp(v.checked_add_signed(*d).ok_or_else(overflow)?))
            }
            _ => Err(Error::DomainMismatch {
                expected: self.domain(),
                found: delta.domain_hint(),
            }),
        }
    }

    /// `self - delta`
    pub fn checked_sub(&self, delta: &DeltaValue) -> Result<BoundValue> {
        self.checked_add(&delta.checked_neg()?)
    }

    /// `other - self`
    pub fn delta_to(&self, other: &BoundValue) -> Result<DeltaValue> {
        self.ensure_same_domain(other)?;
        let overflow = || Error::Overflow {
            value: other.to_string(),
            delta: format!("-({})", self),
        };
        match (self, other) {
            (BoundValue::Integer(a), BoundValue::Integer(b)) => {
                Ok(DeltaValue::Integer(*b as i64 - *a as i64))
            }
            (BoundValue::BigInteger(a), BoundValue::BigInteger(b)) => {
                Ok(DeltaValue::Integer(b.checked_sub(*a).ok_or_else(overflow)?))
            }
            (BoundValue::Decimal(a), BoundValue::Decimal(b)) => {
                Ok(DeltaValue::Decimal(b.checked_sub(*a).ok_or_else(overflow)?))
            }
            (BoundValue::Date(a), BoundValue::Date(b)) => {
                Ok(DeltaValue::Duration(b.signed_duration_since(*a)))
            }
            (BoundValue::Timestamp(a), BoundValue::Timestamp(b)) => {
                Ok(DeltaValue::Duration(b.signed_duration_since(*a)))
            }
            _ => Err(Error::DomainMismatch {
                expected: self.domain(),
                found: other.domain(),
            }),
        }
    }
}

impl PartialOrd for BoundValue {
    /// Cross-domain comparison returns `None`
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (BoundValue::Integer(a), BoundValue::Integer(b)) => a.partial_cmp(b),
            (BoundValue::BigInteger(a), BoundValue::BigInteger(b)) => a.partial_cmp(b),
            (BoundValue::Decimal(a), BoundValue::Decimal(b)) => a.partial_cmp(b),
            (BoundValue::Date(a), BoundValue::Date(b)) => a.partial_cmp(b),
            (BoundValue::Timestamp(a), BoundValue::Timestamp(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl fmt::Display for BoundValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundValue::Integer(v) => write!(f, "{}", v),
            BoundValue::BigInteger(v) => write!(f, "{}", v),
            BoundValue::Decimal(v) => write!(f, "{}", v),
            BoundValue::Date(v) => write!(f, "{}", v),
            BoundValue::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
        }
    }
}

impl From<i32> for BoundValue {
    fn from(v: i32) -> Self {
        BoundValue::Integer(v)
    }
}

impl From<i64> for BoundValue {
    fn from(v: i64) -> Self {
        BoundValue::BigInteger(v)
    }
}

impl From<Decimal> for BoundValue {
    fn from(v: Decimal) -> Self {
        BoundValue::Decimal(v)
    }
}

impl From<NaiveDate> for BoundValue {
    fn from(v: NaiveDate) -> Self {
        BoundValue::Date(v)
    }
}

impl From<DateTime<Utc>> for BoundValue {
    fn from(v: DateTime<Utc>) -> Self {
        BoundValue::Timestamp(v)
    }
}
