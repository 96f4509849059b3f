//! Core types and traits for spanline
//!
//! This crate defines the foundational types used throughout the system:
//! - SpanId / SegmentId / SpanKind: identifiers
//! - Key: Composite storage key (span + entity)
//! - BoundValue / DeltaValue / RangeDomain: range value domains
//! - RangeValue: Half-open range with relation queries
//! - Policy: Per-span rules, resolved through PolicyRegistry
//! - Span / Segment / Record: Stored entities
//! - Error: Error type hierarchy
//! - Traits: Core trait definitions (Storage, SnapshotView)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bound;
pub mod entity;
pub mod error;
pub mod policy;
pub mod range;
pub mod traits;
pub mod types;

pub use bound::{BoundValue, DeltaValue, RangeDomain};
pub use entity::{Record, Segment, Span, VersionedRecord};
pub use error::{Error, Result};
pub use policy::{DeleteMode, Policy, PolicyOverrides, PolicyRegistry, PreviousOnDelete};
pub use range::{Boundary, RangeRelation, RangeValue};
pub use traits::{SnapshotView, Storage};
pub use types::{EntityKey, EntityKind, EntityRef, Key, SegmentId, SpanId, SpanKind};
