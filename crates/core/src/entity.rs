//! Span and Segment records
//!
//! These are the values stored under `Key`s. They are plain data: changes go
//! through the mutation operations in `spanline-primitives`, which validate
//! the whole chain before anything is written. Editing a loaded record does
//! not touch the store.

use crate::policy::Policy;
use crate::range::RangeValue;
use crate::types::{EntityRef, Key, SegmentId, SpanId, SpanKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outer range owning an ordered chain of segments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// Identity
    pub id: SpanId,
    /// Span type, used for policy resolution
    pub kind: SpanKind,
    /// Current range
    pub range: RangeValue,
    /// Range the span was created with
    pub initial_range: RangeValue,
    /// Policy resolved at creation
    pub policy: Policy,
    /// Soft-delete marker
    pub deleted_at: Option<DateTime<Utc>>,
    /// Incremented by every committed mutation of the span or its segments
    pub revision: u64,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Span {
    /// New span at revision 0
    pub fn new(kind: SpanKind, range: RangeValue, policy: Policy) -> Self {
        Self {
            id: SpanId::new(),
            kind,
            range,
            initial_range: range,
            policy,
            deleted_at: None,
            revision: 0,
            created_at: Utc::now(),
        }
    }

    /// Not soft-deleted
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Storage key
    pub fn key(&self) -> Key {
        Key::span(self.id)
    }
}

/// Sub-range belonging to exactly one span
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Identity
    pub id: SegmentId,
    /// Owning span, fixed for the segment's lifetime
    pub span: SpanId,
    /// Current range
    pub range: RangeValue,
    /// Chain predecessor (by lower bound) among active segments
    pub previous: Option<SegmentId>,
    /// Soft-delete marker
    pub deleted_at: Option<DateTime<Utc>>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Segment {
    /// New unlinked segment
    pub fn new(span: SpanId, range: RangeValue) -> Self {
        Self {
            id: SegmentId::new(),
            span,
            range,
            previous: None,
            deleted_at: None,
            created_at: Utc::now(),
        }
    }

    /// Not soft-deleted
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Storage key
    pub fn key(&self) -> Key {
        Key::segment(self.span, self.id)
    }
}

/// Stored value: either a span header or a segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Record {
    /// Span header
    Span(Span),
    /// Segment
    Segment(Segment),
}

impl Record {
    /// Storage key of this record
    pub fn key(&self) -> Key {
        match self {
            Record::Span(s) => s.key(),
            Record::Segment(s) => s.key(),
        }
    }

    /// Entity reference of this record
    pub fn entity_ref(&self) -> EntityRef {
        match self {
            Record::Span(s) => EntityRef::Span(s.id),
            Record::Segment(s) => EntityRef::Segment(s.id),
        }
    }

    /// Span header, if this is one
    pub fn as_span(&self) -> Option<&Span> {
        match self {
            Record::Span(s) => Some(s),
            Record::Segment(_) => None,
        }
    }

    /// Segment, if this is one
    pub fn as_segment(&self) -> Option<&Segment> {
        match self {
            Record::Segment(s) => Some(s),
            Record::Span(_) => None,
        }
    }

    /// Whether the entity is not soft-deleted
    pub fn is_active(&self) -> bool {
        match self {
            Record::Span(s) => s.is_active(),
            Record::Segment(s) => s.is_active(),
        }
    }
}

impl From<Span> for Record {
    fn from(s: Span) -> Self {
        Record::Span(s)
    }
}

impl From<Segment> for Record {
    fn from(s: Segment) -> Self {
        Record::Segment(s)
    }
}

/// Record with the commit version that wrote it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedRecord {
    /// Stored record
    pub record: Record,
    /// Commit version of the last write
    pub version: u64,
}

impl VersionedRecord {
    /// Wrap a record
    pub fn new(record: Record, version: u64) -> Self {
        Self { record, version }
    }
}
