//! Core identifier and key types
//!
//! This module defines the foundational types:
//! - SpanId / SegmentId: Unique identifiers for spans and segments
//! - SpanKind: The span "type" name used for policy resolution
//! - Key: Composite storage key (span + entity)
//! - EntityRef: Reference to a span or segment, used in errors and notifications

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a span
///
/// A SpanId is a wrapper around a UUID v4. It scopes every segment the span
/// owns and is the unit of commit serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpanId(Uuid);

impl SpanId {
    /// Create a new random SpanId using UUID v4
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a SpanId from raw bytes
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Parse a SpanId from a string representation
    ///
    /// Returns None if the string is not a valid UUID.
    pub fn from_string(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }

    /// Get the raw bytes of this SpanId
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for SpanId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a segment
///
/// Segment ids are stable for the lifetime of the segment, including across
/// resize and split (the lower half of a split keeps the original id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentId(Uuid);

impl SegmentId {
    /// Create a new random SegmentId using UUID v4
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a SegmentId from raw bytes
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Parse a SegmentId from a string representation
    pub fn from_string(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for SegmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Span type name
///
/// Spans of the same kind share a resolved policy (see `PolicyRegistry`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpanKind(String);

impl SpanKind {
    /// Create a new span kind
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Kind name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SpanKind {
    fn default() -> Self {
        Self("default".to_string())
    }
}

impl fmt::Display for SpanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SpanKind {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// ============================================================================
// Storage keys
// ============================================================================

/// Entity part of a storage key
///
/// `Span` sorts before every `Segment`, so a prefix scan over one span yields
/// the span header first and its segments after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKey {
    /// The span header record
    Span,
    /// One segment record
    Segment(SegmentId),
}

/// Composite storage key: owning span + entity
///
/// Ordering clusters all records of one span together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key {
    /// Owning span
    pub span: SpanId,
    /// Entity within the span
    pub entity: EntityKey,
}

impl Key {
    /// Key of a span header record
    pub fn span(span: SpanId) -> Self {
        Self {
            span,
            entity: EntityKey::Span,
        }
    }

    /// Key of a segment record
    pub fn segment(span: SpanId, segment: SegmentId) -> Self {
        Self {
            span,
            entity: EntityKey::Segment(segment),
        }
    }

    /// Segment id if this key addresses a segment
    pub fn segment_id(&self) -> Option<SegmentId> {
        match self.entity {
            EntityKey::Span => None,
            EntityKey::Segment(id) => Some(id),
        }
    }

    /// Entity reference for this key
    pub fn entity_ref(&self) -> EntityRef {
        match self.entity {
            EntityKey::Span => EntityRef::Span(self.span),
            EntityKey::Segment(id) => EntityRef::Segment(id),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.entity {
            EntityKey::Span => write!(f, "span/{}", self.span),
            EntityKey::Segment(id) => write!(f, "span/{}/segment/{}", self.span, id),
        }
    }
}

/// Reference to a span or a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityRef {
    /// A span
    Span(SpanId),
    /// A segment
    Segment(SegmentId),
}

impl EntityRef {
    /// Entity kind of this reference
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRef::Span(_) => EntityKind::Span,
            EntityRef::Segment(_) => EntityKind::Segment,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Span(id) => write!(f, "span {}", id),
            EntityRef::Segment(id) => write!(f, "segment {}", id),
        }
    }
}

/// Entity type discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Span
    Span,
    /// Segment
    Segment,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Span => f.write_str("span"),
            EntityKind::Segment => f.write_str("segment"),
        }
    }
}
