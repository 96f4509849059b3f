//! Error types for spanline
//!
//! This module defines the error taxonomy shared by every layer. All kinds are
//! reported to the caller; none are fatal to the process and none are
//! swallowed. We use `thiserror` for automatic `Display` and `Error` trait
//! implementations.
//!
//! ## Retry Semantics
//!
//! `ConcurrencyConflict` is the only kind a caller is expected to retry.
//! Every other kind describes an invalid request and must not be retried
//! unchanged.

use crate::bound::RangeDomain;
use crate::types::{EntityRef, SegmentId, SpanId};
use thiserror::Error;

/// Result type alias for spanline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for spanline
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Two range values from different domains were compared or combined
    #[error("Domain mismatch: expected {expected}, found {found}")]
    DomainMismatch {
        /// Domain of the left-hand operand (or of the owning span)
        expected: RangeDomain,
        /// Domain of the offending operand
        found: RangeDomain,
    },

    /// A segment range is not a subset of its span's range
    #[error("Segment {segment} range {segment_range} is not contained in span {span} range {span_range}")]
    Containment {
        /// Owning span
        span: SpanId,
        /// Offending segment
        segment: SegmentId,
        /// Rendered span range
        span_range: String,
        /// Rendered segment range
        segment_range: String,
    },

    /// Two active segments of the same span overlap
    #[error("Segments {first} and {second} overlap")]
    Overlap {
        /// Lower of the two overlapping segments (or the proposed one)
        first: SegmentId,
        /// Upper of the two overlapping segments
        second: SegmentId,
    },

    /// Contiguity required by policy is violated between two active segments
    #[error("Gap between segments {before} and {after}: {upper} != {lower}")]
    Gap {
        /// Segment ordered first
        before: SegmentId,
        /// Segment ordered second
        after: SegmentId,
        /// Upper bound of `before`
        upper: String,
        /// Lower bound of `after`
        lower: String,
    },

    /// Span range is not fully covered by its active segments
    #[error("Span {span} is not covered by its segments: {reason}")]
    SpanCoverage {
        /// The span
        span: SpanId,
        /// Which end (or which hole) is uncovered
        reason: String,
    },

    /// A range's lower bound is not below (or equal to) its upper bound
    #[error("Invalid range [{lower}, {upper}): {reason}")]
    InvalidRange {
        /// Rendered lower bound
        lower: String,
        /// Rendered upper bound
        upper: String,
        /// Why the range is rejected
        reason: String,
    },

    /// A `previous` reference is dangling, foreign, out of order, or cyclic
    #[error("Chain integrity violated at segment {segment}: {reason}")]
    ChainIntegrity {
        /// Segment holding the bad reference
        segment: SegmentId,
        /// Description of the violation
        reason: String,
    },

    /// The transaction could not be serialized against a concurrent mutation
    #[error("Concurrency conflict: {reason}")]
    ConcurrencyConflict {
        /// Description of the conflict
        reason: String,
    },

    /// Entity does not exist (or is not visible to the transaction)
    #[error("Not found: {0}")]
    NotFound(EntityRef),

    /// Operation preconditions are not met
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Bound arithmetic left the representable domain
    #[error("Arithmetic overflow: {value} + {delta}")]
    Overflow {
        /// Rendered bound
        value: String,
        /// Rendered delta
        delta: String,
    },

    /// Configuration or policy mapping is malformed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Transaction is not in a state that accepts the call
    #[error("Transaction not active: {state}")]
    TransactionNotActive {
        /// Current state, rendered
        state: String,
    },

    /// Storage layer error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Build a conflict error
    pub fn conflict(reason: impl Into<String>) -> Self {
        Error::ConcurrencyConflict {
            reason: reason.into(),
        }
    }

    /// Build an invalid-operation error
    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Error::InvalidOperation(msg.into())
    }

    /// Build an invalid-config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Error::InvalidConfig(msg.into())
    }

    /// Build an invalid-range error from any displayable bounds
    pub fn invalid_range(
        lower: impl std::fmt::Display,
        upper: impl std::fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidRange {
            lower: lower.to_string(),
            upper: upper.to_string(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by a concurrent transaction
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::ConcurrencyConflict { .. })
    }

    /// True if retrying the same request may succeed
    ///
    /// Identical to [`Error::is_conflict`]: validation failures describe the
    /// request itself and will fail again.
    pub fn is_retryable(&self) -> bool {
        self.is_conflict()
    }

    /// True for the invariant violations detected by chain validation
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::DomainMismatch { .. }
                | Error::Containment { .. }
                | Error::Overlap { .. }
                | Error::Gap { .. }
                | Error::SpanCoverage { .. }
                | Error::InvalidRange { .. }
                | Error::ChainIntegrity { .. }
        )
    }
}
