//! Spanline - transactional engine for hierarchical interval data
//!
//! A **span** is an outer range that owns an ordered chain of **segments**.
//! Every mutation validates the whole chain before anything is written:
//! segments stay inside their span, never overlap, and (depending on the
//! span's policy) leave no gaps between each other or inside the span.
//!
//! # Quick Start
//!
//! ```ignore
//! use spanline::{PolicyOverrides, RangeValue, SpanKind, SpanStore};
//!
//! let store = SpanStore::ephemeral();
//! let span = store.create_span(
//!     SpanKind::new("booking"),
//!     RangeValue::new(0, 100)?,
//!     PolicyOverrides::none().allow_segment_gaps(false),
//! )?;
//! let first = store.create_segment(span.id, RangeValue::new(0, 40)?)?;
//! store.create_segment(span.id, RangeValue::new(40, 100)?)?;
//!
//! // Sticky boundaries: the second segment now starts at 50
//! store.resize_segment(first.id, RangeValue::new(0, 50)?)?;
//! ```
//!
//! # Architecture
//!
//! - `spanline-core`: ranges, policies, entities, errors
//! - `spanline-storage`: versioned in-memory store with an exclusion constraint
//! - `spanline-concurrency`: optimistic transactions and span commit locks
//! - `spanline-engine`: `Database`, retry and `spanline.toml` configuration
//! - `spanline-primitives`: chains, propagation, operations and hooks

pub use spanline_core::{
    BoundValue, Boundary, DeleteMode, DeltaValue, EntityKind, EntityRef, Error, Policy,
    PolicyOverrides, PolicyRegistry, PreviousOnDelete, RangeDomain, RangeRelation, RangeValue,
    Record, Result, Segment, SegmentId, Span, SpanId, SpanKind,
};
pub use spanline_engine::{Database, EngineConfig, RetryConfig, TransactionMetrics, CONFIG_FILE_NAME};
pub use spanline_primitives::{
    AppendTo, DeleteOptions, Extent, GapHeal, Listener, ListenerFilter, ListenerId,
    ListenerRegistry, Notification, OperationKind, Phase, SegmentChain, SpanStore,
    SpanTransaction,
};
