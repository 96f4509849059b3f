//! Secondary index for segment ownership
//!
//! Segment records are keyed by `(span, segment)`, so resolving a bare
//! `SegmentId` would otherwise need a full scan. OwnerIndex maps every stored
//! segment to its owning span and doubles as the exclusive-membership check:
//! a segment id can be registered under one span only.

use std::collections::HashMap;

use spanline_core::{SegmentId, SpanId};

/// Secondary index: SegmentId → owning SpanId
#[derive(Debug, Default, Clone)]
pub struct OwnerIndex {
    index: HashMap<SegmentId, SpanId>,
}

impl OwnerIndex {
    /// Create a new empty OwnerIndex
    pub fn new() -> Self {
        Self {
            index: HashMap::new(),
        }
    }

    /// Record that `segment` belongs to `span`
    ///
    /// Returns the previous owner if it differs from `span`, leaving the
    /// index unchanged in that case.
    pub fn insert(&mut self, segment: SegmentId, span: SpanId) -> Option<SpanId> {
        match self.index.get(&segment) {
            Some(owner) if *owner != span => Some(*owner),
            _ => {
                self.index.insert(segment, span);
                None
            }
        }
    }

    /// Forget a segment
    pub fn remove(&mut self, segment: &SegmentId) {
        self.index.remove(segment);
    }

    /// Owner of a segment
    pub fn get(&self, segment: &SegmentId) -> Option<SpanId> {
        self.index.get(segment).copied()
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of indexed segments
    pub fn len(&self) -> usize {
        self.index.len()
    }
}
