//! Span-level mutation operations
//!
//! Span bounds changes go through one path (`resize_span_as`) which, in
//! order: deletes segments left wholly outside the new range, moves sticky
//! edge segments, clamps segments partially outside, and, for spans that
//! must stay covered, stretches the edge segments to the new bounds.

use std::cmp::Ordering;

use chrono::Utc;
use spanline_core::{
    BoundValue, DeleteMode, DeltaValue, EntityRef, Error, PolicyOverrides, RangeValue, Result,
    Segment, SegmentId, Span, SpanId, SpanKind,
};

use crate::chain::SegmentChain;
use crate::hooks::OperationKind;
use crate::propagation::plan_span_resize;
use crate::txn::{Proposal, SpanTransaction};

/// What `extend_span` grows the span to include
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extent {
    /// A single bound value
    Value(BoundValue),
    /// A whole range
    Range(RangeValue),
}

impl From<BoundValue> for Extent {
    fn from(value: BoundValue) -> Self {
        Extent::Value(value)
    }
}

impl From<RangeValue> for Extent {
    fn from(range: RangeValue) -> Self {
        Extent::Range(range)
    }
}

/// Where `append_segment` ends the new segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendTo {
    /// Absolute upper bound
    Value(BoundValue),
    /// Current span upper bound plus a delta
    Delta(DeltaValue),
}

impl SpanTransaction<'_> {
    // ========== Create ==========

    /// Create a span of `kind`
    ///
    /// The policy is resolved once here: built-in defaults, then the
    /// configured default and per-kind overrides, then `overrides`. A span
    /// that may not have gaps gets one segment covering its whole range.
    pub fn create_span(
        &mut self,
        kind: SpanKind,
        range: RangeValue,
        overrides: &PolicyOverrides,
    ) -> Result<Span> {
        let policy = self.config().policy.resolve(&kind, overrides);
        let span = Span::new(kind, range, policy);
        let id = span.id;
        let mut after = SegmentChain::new(span);
        if !policy.allow_span_gaps {
            after.insert(Segment::new(id, range));
        }

        let after = self.stage(Proposal {
            operation: OperationKind::CreateSpan,
            entity: EntityRef::Span(id),
            before: None,
            after,
            span_removed: false,
        })?;
        Ok(after.span().clone())
    }

    // ========== Bounds ==========

    /// Change a span's range
    pub fn resize_span(&mut self, span: SpanId, new_range: RangeValue) -> Result<Span> {
        self.resize_span_as(span, new_range, OperationKind::ResizeSpan)
    }

    /// Set a span's lower bound
    pub fn shift_span_lower_to(
        &mut self,
        span: SpanId,
        value: impl Into<BoundValue>,
    ) -> Result<Span> {
        let current = self.span(span)?;
        self.resize_span(span, current.range.with_lower(value.into())?)
    }

    /// Move a span's lower bound by `delta`
    pub fn shift_span_lower_by(&mut self, span: SpanId, delta: &DeltaValue) -> Result<Span> {
        let current = self.span(span)?;
        let lower = current.range.lower().checked_add(delta)?;
        self.resize_span(span, current.range.with_lower(lower)?)
    }

    /// Set a span's upper bound
    pub fn shift_span_upper_to(
        &mut self,
        span: SpanId,
        value: impl Into<BoundValue>,
    ) -> Result<Span> {
        let current = self.span(span)?;
        self.resize_span(span, current.range.with_upper(value.into())?)
    }

    /// Move a span's upper bound by `delta`
    pub fn shift_span_upper_by(&mut self, span: SpanId, delta: &DeltaValue) -> Result<Span> {
        let current = self.span(span)?;
        let upper = current.range.upper().checked_add(delta)?;
        self.resize_span(span, current.range.with_upper(upper)?)
    }

    /// Grow a span to include a value or a range; never shrinks
    pub fn extend_span(&mut self, span: SpanId, extent: impl Into<Extent>) -> Result<Span> {
        let current = self.span(span)?.range;
        let target = match extent.into() {
            Extent::Range(range) => current.hull(&range)?,
            Extent::Value(value) => {
                let lower = match value.try_cmp(current.lower())? {
                    Ordering::Less => value,
                    _ => *current.lower(),
                };
                let upper = match value.try_cmp(current.upper())? {
                    Ordering::Greater => value,
                    _ => *current.upper(),
                };
                RangeValue::new(lower, upper)?
            }
        };
        self.resize_span_as(span, target, OperationKind::ExtendSpan)
    }

    fn resize_span_as(
        &mut self,
        span: SpanId,
        new_range: RangeValue,
        operation: OperationKind,
    ) -> Result<Span> {
        let before = self.live_chain(span)?;
        before.span().range.lower().ensure_same_domain(new_range.lower())?;
        let policy = before.span().policy;
        let mut after = before.clone();

        let outside: Vec<SegmentId> = after
            .active()
            .iter()
            .filter(|s| s.range.upper() <= new_range.lower() || s.range.lower() >= new_range.upper())
            .map(|s| s.id)
            .collect();
        let now = Utc::now();
        for id in outside {
            after.remove(id, policy.segment_delete_mode(), now)?;
        }

        plan_span_resize(&after, &new_range)?.apply(&mut after)?;
        after.span_mut().range = new_range;

        let mut clamped = Vec::new();
        for segment in after.active() {
            if let Some(inside) = segment.range.intersection(&new_range)? {
                if inside != segment.range {
                    clamped.push((segment.id, inside));
                }
            }
        }
        for (id, range) in clamped {
            after.set_range(id, range)?;
        }

        if !policy.allow_span_gaps {
            if let Some(first) = after.first().cloned() {
                if first.range.lower() > new_range.lower() {
                    after.set_range(first.id, first.range.with_lower(*new_range.lower())?)?;
                }
            }
            if let Some(last) = after.last().cloned() {
                if last.range.upper() < new_range.upper() {
                    after.set_range(last.id, last.range.with_upper(*new_range.upper())?)?;
                }
            }
        }

        let after = self.stage(Proposal::update(
            operation,
            EntityRef::Span(span),
            before,
            after,
        ))?;
        Ok(after.span().clone())
    }

    /// Move a span and every active segment by `delta`
    pub fn shift_span(&mut self, span: SpanId, delta: &DeltaValue) -> Result<Span> {
        let before = self.live_chain(span)?;
        let mut after = before.clone();
        after.span_mut().range = before.span().range.shift(delta)?;
        for segment in before.active() {
            after.set_range(segment.id, segment.range.shift(delta)?)?;
        }

        let after = self.stage(Proposal::update(
            OperationKind::ShiftSpan,
            EntityRef::Span(span),
            before,
            after,
        ))?;
        Ok(after.span().clone())
    }

    /// Add a segment after the last one
    ///
    /// The segment starts at the last segment's upper bound (or the span's
    /// lower bound when there are none) and ends at the target, which must
    /// lie beyond that start. The span grows when the target is past its
    /// upper bound.
    pub fn append_segment(&mut self, span: SpanId, to: AppendTo) -> Result<Segment> {
        let before = self.live_chain(span)?;
        let span_range = before.span().range;
        let to = match to {
            AppendTo::Value(value) => value,
            AppendTo::Delta(delta) => span_range.upper().checked_add(&delta)?,
        };
        span_range.lower().ensure_same_domain(&to)?;

        let start = before
            .last()
            .map(|s| *s.range.upper())
            .unwrap_or(*span_range.lower());
        if to <= start {
            return Err(Error::invalid_operation(format!(
                "cannot append up to {}: the chain already reaches {}",
                to, start
            )));
        }

        let mut after = before.clone();
        if to > *span_range.upper() {
            after.span_mut().range = span_range.with_upper(to)?;
        }
        let segment = Segment::new(span, RangeValue::new(start, to)?);
        let id = segment.id;
        after.insert(segment);

        let after = self.stage(Proposal::update(
            OperationKind::AppendSegment,
            EntityRef::Segment(id),
            before,
            after,
        ))?;
        after
            .get(id)
            .cloned()
            .ok_or(Error::NotFound(EntityRef::Segment(id)))
    }

    // ========== Delete ==========

    /// Delete a span and all of its segments
    ///
    /// `mode` defaults to the span policy. Segments are deleted first, in
    /// chain order, each with its own nested notification. A soft span
    /// delete uses `segment_soft_delete` for the segments when configured;
    /// a hard span delete removes every segment row, including segments
    /// soft-deleted earlier.
    pub fn delete_span(&mut self, span: SpanId, mode: Option<DeleteMode>) -> Result<()> {
        let before = self.chain(span)?;
        let policy = before.span().policy;
        let mode = mode.unwrap_or_else(|| policy.span_delete_mode());
        if mode == DeleteMode::Soft && !before.span().is_active() {
            return Err(Error::invalid_operation(format!(
                "span {} is already deleted",
                span
            )));
        }
        let segment_mode = match mode {
            DeleteMode::Soft => policy
                .segment_soft_delete
                .map(DeleteMode::from_soft)
                .unwrap_or(DeleteMode::Soft),
            DeleteMode::Hard => DeleteMode::Hard,
        };

        let now = Utc::now();
        let mut after = before.clone();
        let ids: Vec<SegmentId> = after.active().iter().map(|s| s.id).collect();
        for id in ids {
            after.remove(id, segment_mode, now)?;
        }
        match mode {
            DeleteMode::Soft => after.span_mut().deleted_at = Some(now),
            DeleteMode::Hard => after.purge_inactive(),
        }

        self.stage(Proposal {
            operation: OperationKind::DeleteSpan,
            entity: EntityRef::Span(span),
            before: Some(before),
            after,
            span_removed: mode == DeleteMode::Hard,
        })?;
        Ok(())
    }

    // ========== Chain maintenance ==========

    /// Recompute every `previous` link from lower-bound order
    ///
    /// Returns the number of links changed. The repaired chain must still
    /// pass full validation.
    pub fn repair_chain(&mut self, span: SpanId) -> Result<usize> {
        let before = self.live_chain(span)?;
        let mut after = before.clone();
        let repaired = after.relink().len();
        if repaired == 0 {
            after.validate(self.config().allow_empty_ranges)?;
            return Ok(0);
        }

        self.stage(Proposal::update(
            OperationKind::RepairChain,
            EntityRef::Span(span),
            before,
            after,
        ))?;
        Ok(repaired)
    }

    /// Check `previous` links without changing anything
    pub fn verify_chain(&mut self, span: SpanId) -> Result<()> {
        self.chain(span)?.verify_links()
    }
}
