//! SegmentChain: one span with its segments, ordered by lower bound
//!
//! ## Design
//!
//! A chain is an in-memory working copy loaded from one prefix scan. Every
//! mutation operation edits a copy of the chain freely and then calls
//! [`SegmentChain::validate`] exactly once on the final state. Checking the
//! whole chain at the end (rather than per edit) lets propagation move
//! several boundaries through states that are only transiently invalid.
//!
//! ## Buckets
//!
//! - `active`: live segments, sorted by `(lower, upper, id)`
//! - `inactive`: soft-deleted segments, kept for history, never validated
//! - `removed`: hard-deleted segments of a pending change, staged as deletes

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use spanline_core::{
    BoundValue, DeleteMode, EntityRef, Error, RangeValue, Result, Segment, SegmentId, Span,
};

/// Order two bounds already known to share a domain
fn bound_order(a: &BoundValue, b: &BoundValue) -> Ordering {
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

/// Chain order: lower bound, then upper bound, then id
pub(crate) fn chain_order(a: &Segment, b: &Segment) -> Ordering {
    bound_order(a.range.lower(), b.range.lower())
        .then_with(|| bound_order(a.range.upper(), b.range.upper()))
        .then_with(|| a.id.cmp(&b.id))
}

/// A span with its ordered segments
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentChain {
    span: Span,
    active: Vec<Segment>,
    inactive: Vec<Segment>,
    removed: Vec<Segment>,
}

impl SegmentChain {
    /// Chain of a span with no segments
    pub fn new(span: Span) -> Self {
        Self {
            span,
            active: Vec::new(),
            inactive: Vec::new(),
            removed: Vec::new(),
        }
    }

    /// Build a chain from stored records
    ///
    /// # Errors
    ///
    /// `ChainIntegrity` if a segment belongs to another span,
    /// `DomainMismatch` if a segment range is in another domain.
    pub fn from_records(span: Span, segments: Vec<Segment>) -> Result<Self> {
        let mut chain = Self::new(span);
        for segment in segments {
            if segment.span != chain.span.id {
                return Err(Error::ChainIntegrity {
                    segment: segment.id,
                    reason: format!(
                        "belongs to span {}, loaded under span {}",
                        segment.span, chain.span.id
                    ),
                });
            }
            chain
                .span
                .range
                .lower()
                .ensure_same_domain(segment.range.lower())?;
            if segment.is_active() {
                chain.active.push(segment);
            } else {
                chain.inactive.push(segment);
            }
        }
        chain.sort();
        Ok(chain)
    }

    // ========== Accessors ==========

    /// The owning span
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub(crate) fn span_mut(&mut self) -> &mut Span {
        &mut self.span
    }

    /// Active segments in chain order
    pub fn active(&self) -> &[Segment] {
        &self.active
    }

    /// Soft-deleted segments
    pub fn inactive(&self) -> &[Segment] {
        &self.inactive
    }

    /// Segments hard-deleted by the pending change
    pub(crate) fn removed(&self) -> &[Segment] {
        &self.removed
    }

    /// Every stored segment: active first, then soft-deleted
    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.active.iter().chain(self.inactive.iter())
    }

    /// Number of active segments
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// True if the span has no active segments
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Lowest active segment
    pub fn first(&self) -> Option<&Segment> {
        self.active.first()
    }

    /// Highest active segment
    pub fn last(&self) -> Option<&Segment> {
        self.active.last()
    }

    /// Any stored segment (active or soft-deleted) by id
    pub fn get(&self, id: SegmentId) -> Option<&Segment> {
        self.segments().find(|s| s.id == id)
    }

    /// Active segment by id
    pub fn get_active(&self, id: SegmentId) -> Option<&Segment> {
        self.active.iter().find(|s| s.id == id)
    }

    /// Chain position of an active segment
    pub fn position(&self, id: SegmentId) -> Option<usize> {
        self.active.iter().position(|s| s.id == id)
    }

    /// Chain successor of an active segment
    pub fn next_of(&self, id: SegmentId) -> Option<&Segment> {
        self.position(id).and_then(|i| self.active.get(i + 1))
    }

    /// Chain predecessor of an active segment
    pub fn previous_of(&self, id: SegmentId) -> Option<&Segment> {
        match self.position(id) {
            Some(i) if i > 0 => self.active.get(i - 1),
            _ => None,
        }
    }

    /// True if `id` is the lowest active segment
    pub fn is_first(&self, id: SegmentId) -> bool {
        self.first().is_some_and(|s| s.id == id)
    }

    /// True if `id` is the highest active segment
    pub fn is_last(&self, id: SegmentId) -> bool {
        self.last().is_some_and(|s| s.id == id)
    }

    /// True if `id` is active with a predecessor and a successor
    pub fn is_internal(&self, id: SegmentId) -> bool {
        self.position(id).is_some() && !self.is_first(id) && !self.is_last(id)
    }

    // ========== Coverage queries ==========

    /// Active segment containing `point`
    pub fn segment_at(&self, point: &BoundValue) -> Result<Option<&Segment>> {
        self.span.range.lower().ensure_same_domain(point)?;
        for segment in &self.active {
            if segment.range.contains_value(point)? {
                return Ok(Some(segment));
            }
        }
        Ok(None)
    }

    /// True if the union of active segments covers `range`
    pub fn covers(&self, range: &RangeValue) -> Result<bool> {
        self.span.range.lower().ensure_same_domain(range.lower())?;
        let mut cursor = *range.lower();
        if cursor >= *range.upper() {
            return Ok(true);
        }
        for segment in &self.active {
            if *segment.range.upper() <= cursor {
                continue;
            }
            if *segment.range.lower() > cursor {
                return Ok(false);
            }
            cursor = *segment.range.upper();
            if cursor >= *range.upper() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Parts of the span range not covered by any active segment
    pub fn gaps(&self) -> Result<Vec<RangeValue>> {
        let mut gaps = Vec::new();
        let mut cursor = *self.span.range.lower();
        let end = *self.span.range.upper();
        for segment in &self.active {
            let lower = *segment.range.lower();
            if lower > cursor && cursor < end {
                let upper = if lower < end { lower } else { end };
                gaps.push(RangeValue::new(cursor, upper)?);
            }
            if *segment.range.upper() > cursor {
                cursor = *segment.range.upper();
            }
        }
        if cursor < end {
            gaps.push(RangeValue::new(cursor, end)?);
        }
        Ok(gaps)
    }

    // ========== Validation ==========

    /// Check every invariant of the chain in one pass
    ///
    /// Order of checks: range shape, domain, containment, overlap, segment
    /// contiguity (`allow_segment_gaps = false`), span coverage
    /// (`allow_span_gaps = false`), then `previous` links.
    pub fn validate(&self, allow_empty: bool) -> Result<()> {
        let span = &self.span;
        check_shape(&span.range, allow_empty)?;

        for segment in &self.active {
            span.range.lower().ensure_same_domain(segment.range.lower())?;
            check_shape(&segment.range, allow_empty)?;
            if !span.range.contains_range(&segment.range)? {
                return Err(Error::Containment {
                    span: span.id,
                    segment: segment.id,
                    span_range: span.range.to_string(),
                    segment_range: segment.range.to_string(),
                });
            }
        }

        // Sorted by lower bound, so an overlap always involves the segment
        // reaching furthest so far. Zero-width segments overlap nothing.
        let mut reach: Option<&Segment> = None;
        for segment in &self.active {
            if let Some(prev) = reach {
                if segment.range.overlaps(&prev.range)? {
                    return Err(Error::Overlap {
                        first: prev.id,
                        second: segment.id,
                    });
                }
                if segment.range.upper() <= prev.range.upper() {
                    continue;
                }
            }
            reach = Some(segment);
        }

        if !span.policy.allow_segment_gaps {
            for pair in self.active.windows(2) {
                if pair[0].range.upper() != pair[1].range.lower() {
                    return Err(Error::Gap {
                        before: pair[0].id,
                        after: pair[1].id,
                        upper: pair[0].range.upper().to_string(),
                        lower: pair[1].range.lower().to_string(),
                    });
                }
            }
        }

        if !span.policy.allow_span_gaps {
            if let Some(gap) = self.gaps()?.first() {
                let reason = if self.active.is_empty() {
                    format!("no active segments cover {}", gap)
                } else {
                    format!("{} is uncovered", gap)
                };
                return Err(Error::SpanCoverage {
                    span: span.id,
                    reason,
                });
            }
        }

        self.verify_links()
    }

    /// Check `previous` links against chain order
    ///
    /// # Errors
    ///
    /// `ChainIntegrity` on a dangling, cyclic, foreign or out-of-order link,
    /// or on a soft-deleted segment that still holds a link.
    pub fn verify_links(&self) -> Result<()> {
        let by_id: HashMap<SegmentId, &Segment> = self.segments().map(|s| (s.id, s)).collect();

        for segment in self.segments() {
            let mut seen = HashSet::from([segment.id]);
            let mut cursor = segment;
            while let Some(prev) = cursor.previous {
                if !seen.insert(prev) {
                    return Err(Error::ChainIntegrity {
                        segment: segment.id,
                        reason: format!("previous links form a cycle through {}", prev),
                    });
                }
                match by_id.get(&prev) {
                    Some(next) => cursor = next,
                    None => break,
                }
            }
        }

        for segment in &self.inactive {
            if let Some(prev) = segment.previous {
                return Err(Error::ChainIntegrity {
                    segment: segment.id,
                    reason: format!("deleted segment still links to {}", prev),
                });
            }
        }

        for (i, segment) in self.active.iter().enumerate() {
            let expected = i.checked_sub(1).map(|p| self.active[p].id);
            let reason = match (segment.previous, expected) {
                (actual, expected) if actual == expected => continue,
                (None, Some(expected)) => format!("missing link to predecessor {}", expected),
                (Some(prev), _) => match by_id.get(&prev) {
                    None => format!("previous {} does not exist in this span", prev),
                    Some(p) if !p.is_active() => format!("previous {} is deleted", prev),
                    Some(_) => match expected {
                        Some(expected) => {
                            format!("previous {} is out of order, expected {}", prev, expected)
                        }
                        None => format!("first segment links to {}", prev),
                    },
                },
                (None, None) => continue,
            };
            return Err(Error::ChainIntegrity {
                segment: segment.id,
                reason,
            });
        }
        Ok(())
    }

    // ========== Mutation helpers ==========

    /// Point every `previous` at the chain predecessor
    ///
    /// Returns the ids whose link changed.
    pub(crate) fn relink(&mut self) -> Vec<SegmentId> {
        let mut changed = Vec::new();
        let mut expected: Option<SegmentId> = None;
        for segment in &mut self.active {
            if segment.previous != expected {
                segment.previous = expected;
                changed.push(segment.id);
            }
            expected = Some(segment.id);
        }
        for segment in &mut self.inactive {
            if segment.previous.take().is_some() {
                changed.push(segment.id);
            }
        }
        changed
    }

    /// Insert an active segment at its sorted position
    pub(crate) fn insert(&mut self, segment: Segment) {
        let at = self
            .active
            .partition_point(|s| chain_order(s, &segment) == Ordering::Less);
        self.active.insert(at, segment);
    }

    /// Replace the range of an active segment
    pub(crate) fn set_range(&mut self, id: SegmentId, range: RangeValue) -> Result<()> {
        let segment = self
            .active
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(Error::NotFound(EntityRef::Segment(id)))?;
        segment.range = range;
        self.sort();
        Ok(())
    }

    /// Take an active segment out of the chain
    ///
    /// Soft removal stamps `deleted_at` and clears `previous`. Successor
    /// links are left for [`SegmentChain::relink`].
    pub(crate) fn remove(
        &mut self,
        id: SegmentId,
        mode: DeleteMode,
        at: DateTime<Utc>,
    ) -> Result<Segment> {
        let pos = self
            .position(id)
            .ok_or(Error::NotFound(EntityRef::Segment(id)))?;
        let mut segment = self.active.remove(pos);
        match mode {
            DeleteMode::Soft => {
                segment.deleted_at = Some(at);
                segment.previous = None;
                self.inactive.push(segment.clone());
            }
            DeleteMode::Hard => self.removed.push(segment.clone()),
        }
        Ok(segment)
    }

    /// Move every soft-deleted segment to `removed`
    pub(crate) fn purge_inactive(&mut self) {
        self.removed.append(&mut self.inactive);
    }

    pub(crate) fn sort(&mut self) {
        self.active.sort_by(chain_order);
        self.inactive.sort_by(chain_order);
    }
}

fn check_shape(range: &RangeValue, allow_empty: bool) -> Result<()> {
    if !allow_empty && range.is_empty() {
        return Err(Error::invalid_range(
            range.lower(),
            range.upper(),
            "zero-width ranges are not allowed",
        ));
    }
    Ok(())
}
