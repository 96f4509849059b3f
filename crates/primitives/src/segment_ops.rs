//! Segment-level mutation operations
//!
//! - `create_segment`, `resize_segment` (+ shift sugar)
//! - `split_segment`, `merge_segments` (+ `merge_with_next/previous`)
//! - `delete_segment` with explicit gap healing

use chrono::Utc;
use spanline_core::{
    BoundValue, DeleteMode, DeltaValue, EntityRef, Error, PreviousOnDelete, RangeValue, Result,
    Segment, SegmentId, SpanId,
};

use crate::chain::SegmentChain;
use crate::hooks::OperationKind;
use crate::propagation::plan_segment_resize;
use crate::txn::{Proposal, SpanTransaction};

/// How `delete_segment` closes the hole left by the removed segment
///
/// Healing only matters when the span's policy forbids the hole
/// (`allow_segment_gaps = false` or `allow_span_gaps = false`). With
/// `Reject` such a delete fails validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum GapHeal {
    /// Leave the hole; validation decides
    #[default]
    Reject,
    /// Grow the chain predecessor up to the next surviving segment (or span end)
    ExtendPredecessor,
    /// Grow the chain successor down to the previous segment (or span start)
    ExtendSuccessor,
}

/// Options of `delete_segment`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    /// Removal mode; `None` uses the span policy
    pub mode: Option<DeleteMode>,
    /// Gap healing strategy
    pub heal: GapHeal,
}

impl DeleteOptions {
    /// Policy mode, no healing
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a soft delete
    pub fn soft() -> Self {
        Self {
            mode: Some(DeleteMode::Soft),
            ..Self::default()
        }
    }

    /// Force a hard delete
    pub fn hard() -> Self {
        Self {
            mode: Some(DeleteMode::Hard),
            ..Self::default()
        }
    }

    /// Set the healing strategy
    pub fn with_heal(mut self, heal: GapHeal) -> Self {
        self.heal = heal;
        self
    }
}

fn staged_segment(chain: &SegmentChain, id: SegmentId) -> Result<Segment> {
    chain
        .get(id)
        .cloned()
        .ok_or(Error::NotFound(EntityRef::Segment(id)))
}

impl SpanTransaction<'_> {
    /// Active segment by id
    pub fn active_segment(&mut self, segment: SegmentId) -> Result<Segment> {
        let chain = self.chain_of_segment(segment)?;
        staged_segment(&chain, segment)
    }

    // ========== Create / Resize ==========

    /// Add a segment to a span
    ///
    /// The segment is linked to its predecessor by lower bound. Fails with
    /// `Containment` outside the span and `Overlap` on an active sibling.
    pub fn create_segment(&mut self, span: SpanId, range: RangeValue) -> Result<Segment> {
        let before = self.live_chain(span)?;
        before.span().range.lower().ensure_same_domain(range.lower())?;

        let segment = Segment::new(span, range);
        let id = segment.id;
        let mut after = before.clone();
        after.insert(segment);

        let after = self.stage(Proposal::update(
            OperationKind::CreateSegment,
            EntityRef::Segment(id),
            before,
            after,
        ))?;
        staged_segment(&after, id)
    }

    /// Change a segment's range, moving sticky neighbours with it
    ///
    /// If propagation would invert any moved range the call fails with
    /// `InvalidRange` and nothing changes.
    pub fn resize_segment(&mut self, segment: SegmentId, new_range: RangeValue) -> Result<Segment> {
        let before = self.chain_of_segment(segment)?;
        let plan = plan_segment_resize(&before, segment, &new_range)?;
        let mut after = before.clone();
        plan.apply(&mut after)?;

        let after = self.stage(Proposal::update(
            OperationKind::ResizeSegment,
            EntityRef::Segment(segment),
            before,
            after,
        ))?;
        staged_segment(&after, segment)
    }

    /// Move a segment by `delta`
    pub fn shift_segment(&mut self, segment: SegmentId, delta: &DeltaValue) -> Result<Segment> {
        let current = self.active_segment(segment)?;
        self.resize_segment(segment, current.range.shift(delta)?)
    }

    /// Set a segment's lower bound
    pub fn shift_segment_lower_to(
        &mut self,
        segment: SegmentId,
        value: impl Into<BoundValue>,
    ) -> Result<Segment> {
        let current = self.active_segment(segment)?;
        self.resize_segment(segment, current.range.with_lower(value.into())?)
    }

    /// Move a segment's lower bound by `delta`
    pub fn shift_segment_lower_by(
        &mut self,
        segment: SegmentId,
        delta: &DeltaValue,
    ) -> Result<Segment> {
        let current = self.active_segment(segment)?;
        let lower = current.range.lower().checked_add(delta)?;
        self.resize_segment(segment, current.range.with_lower(lower)?)
    }

    /// Set a segment's upper bound
    pub fn shift_segment_upper_to(
        &mut self,
        segment: SegmentId,
        value: impl Into<BoundValue>,
    ) -> Result<Segment> {
        let current = self.active_segment(segment)?;
        self.resize_segment(segment, current.range.with_upper(value.into())?)
    }

    /// Move a segment's upper bound by `delta`
    pub fn shift_segment_upper_by(
        &mut self,
        segment: SegmentId,
        delta: &DeltaValue,
    ) -> Result<Segment> {
        let current = self.active_segment(segment)?;
        let upper = current.range.upper().checked_add(delta)?;
        self.resize_segment(segment, current.range.with_upper(upper)?)
    }

    // ========== Split / Merge ==========

    /// Cut a segment in two at `point`
    ///
    /// The lower half keeps the segment's id and predecessor; the upper half
    /// is a new segment that takes over the successor. `point` must lie
    /// strictly inside the range.
    pub fn split_segment(
        &mut self,
        segment: SegmentId,
        point: impl Into<BoundValue>,
    ) -> Result<(Segment, Segment)> {
        let point = point.into();
        let before = self.chain_of_segment(segment)?;
        let original = staged_segment(&before, segment)?;
        if !original.range.strictly_contains(&point)? {
            return Err(Error::invalid_operation(format!(
                "split point {} is not strictly inside {}",
                point, original.range
            )));
        }

        let upper = Segment::new(original.span, original.range.with_lower(point)?);
        let upper_id = upper.id;
        let mut after = before.clone();
        after.set_range(segment, original.range.with_upper(point)?)?;
        after.insert(upper);

        let after = self.stage(Proposal::update(
            OperationKind::SplitSegment,
            EntityRef::Segment(segment),
            before,
            after,
        ))?;
        Ok((
            staged_segment(&after, segment)?,
            staged_segment(&after, upper_id)?,
        ))
    }

    /// Join two chain-adjacent, touching segments
    ///
    /// The earlier segment survives with the combined range. The later one is
    /// removed with the policy's delete mode and its successor is relinked
    /// to the survivor.
    pub fn merge_segments(&mut self, a: SegmentId, b: SegmentId) -> Result<Segment> {
        if a == b {
            return Err(Error::invalid_operation(format!(
                "cannot merge segment {} with itself",
                a
            )));
        }
        let before = self.chain_of_segment(a)?;
        let span = before.span().id;
        if self.owner(b)? != span {
            return Err(Error::invalid_operation(format!(
                "segments {} and {} belong to different spans",
                a, b
            )));
        }
        let position = |id: SegmentId| {
            before
                .position(id)
                .ok_or_else(|| Error::invalid_operation(format!("segment {} is deleted", id)))
        };
        let (pa, pb) = (position(a)?, position(b)?);
        let (first, second) = if pa < pb {
            (&before.active()[pa], &before.active()[pb])
        } else {
            (&before.active()[pb], &before.active()[pa])
        };
        if pa.abs_diff(pb) != 1 {
            return Err(Error::invalid_operation(format!(
                "segments {} and {} are not chain-adjacent",
                first.id, second.id
            )));
        }
        if first.range.upper() != second.range.lower() {
            return Err(Error::invalid_operation(format!(
                "segments {} and {} do not touch: {} != {}",
                first.id,
                second.id,
                first.range.upper(),
                second.range.lower()
            )));
        }

        let survivor = first.id;
        let hull = first.range.hull(&second.range)?;
        let mode = before.span().policy.segment_delete_mode();
        let mut after = before.clone();
        after.remove(second.id, mode, Utc::now())?;
        after.set_range(survivor, hull)?;

        let after = self.stage(Proposal::update(
            OperationKind::MergeSegments,
            EntityRef::Segment(survivor),
            before,
            after,
        ))?;
        staged_segment(&after, survivor)
    }

    /// Merge a segment with its chain successor
    pub fn merge_with_next(&mut self, segment: SegmentId) -> Result<Segment> {
        let chain = self.chain_of_segment(segment)?;
        let next = chain.next_of(segment).map(|s| s.id).ok_or_else(|| {
            Error::invalid_operation(format!("segment {} has no successor", segment))
        })?;
        self.merge_segments(segment, next)
    }

    /// Merge a segment with its chain predecessor
    pub fn merge_with_previous(&mut self, segment: SegmentId) -> Result<Segment> {
        let chain = self.chain_of_segment(segment)?;
        let prev = chain.previous_of(segment).map(|s| s.id).ok_or_else(|| {
            Error::invalid_operation(format!("segment {} has no predecessor", segment))
        })?;
        self.merge_segments(prev, segment)
    }

    // ========== Delete ==========

    /// Delete a segment
    ///
    /// With `previous_on_delete = cascade` every chain successor is deleted
    /// too; with `relink` the successor is linked to the deleted segment's
    /// predecessor. Returns the ids of all deleted segments, in chain order.
    pub fn delete_segment(
        &mut self,
        segment: SegmentId,
        options: DeleteOptions,
    ) -> Result<Vec<SegmentId>> {
        let before = self.chain_of_segment(segment)?;
        let policy = before.span().policy;
        let mode = options
            .mode
            .unwrap_or_else(|| policy.segment_delete_mode());
        let pos = before
            .position(segment)
            .ok_or(Error::NotFound(EntityRef::Segment(segment)))?;

        let doomed: Vec<SegmentId> = match policy.previous_on_delete {
            PreviousOnDelete::Cascade => before.active()[pos..].iter().map(|s| s.id).collect(),
            PreviousOnDelete::Relink => vec![segment],
        };
        let predecessor = before.previous_of(segment).cloned();
        let successor = before.next_of(segment).cloned();

        let now = Utc::now();
        let mut after = before.clone();
        for id in &doomed {
            after.remove(*id, mode, now)?;
        }

        match options.heal {
            GapHeal::Reject => {}
            GapHeal::ExtendPredecessor => {
                if let Some(prev) = predecessor {
                    let reach = after
                        .next_of(prev.id)
                        .map(|s| *s.range.lower())
                        .unwrap_or(*after.span().range.upper());
                    after.set_range(prev.id, prev.range.with_upper(reach)?)?;
                }
            }
            GapHeal::ExtendSuccessor => {
                if let Some(next) = successor.filter(|s| after.get_active(s.id).is_some()) {
                    let reach = after
                        .previous_of(next.id)
                        .map(|s| *s.range.upper())
                        .unwrap_or(*after.span().range.lower());
                    after.set_range(next.id, next.range.with_lower(reach)?)?;
                }
            }
        }

        self.stage(Proposal::update(
            OperationKind::DeleteSegment,
            EntityRef::Segment(segment),
            before,
            after,
        ))?;
        Ok(doomed)
    }
}
