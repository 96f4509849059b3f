//! Boundary propagation for sticky boundaries
//!
//! When a boundary moves and the span's policy has `sticky_boundaries`, every
//! other boundary currently equal to the old value moves with it:
//!
//! - a segment's lower bound is tied to its chain predecessor's upper bound
//!   when they are equal, or to the span's lower bound when it is the first
//!   segment and the two are equal
//! - a segment's upper bound is tied symmetrically to its successor's lower
//!   bound, or to the span's upper bound when it is the last segment
//! - a span bound is tied to the edge segment bound equal to it
//!
//! A [`PropagationPlan`] lists the moves. Applying it is all-or-nothing:
//! every moved entity's final range is computed first, and the chain is only
//! touched if all of them are valid ranges.

use smallvec::SmallVec;
use spanline_core::{
    BoundValue, Boundary, EntityRef, Error, RangeValue, Result, SegmentId,
};

use crate::chain::SegmentChain;

/// One boundary of one entity moving from `from` to `to`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryMove {
    /// Entity whose boundary moves
    pub entity: EntityRef,
    /// Which end
    pub end: Boundary,
    /// Value before the move
    pub from: BoundValue,
    /// Value after the move
    pub to: BoundValue,
}

/// Set of boundary moves applied as one unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagationPlan {
    moves: SmallVec<[BoundaryMove; 4]>,
}

impl PropagationPlan {
    /// Empty plan
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, entity: EntityRef, end: Boundary, from: BoundValue, to: BoundValue) {
        self.moves.push(BoundaryMove {
            entity,
            end,
            from,
            to,
        });
    }

    /// Planned moves, requested entity first
    pub fn moves(&self) -> &[BoundaryMove] {
        &self.moves
    }

    /// True if nothing moves
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// Entities touched by the plan, in first-move order
    pub fn affected(&self) -> Vec<EntityRef> {
        let mut out: Vec<EntityRef> = Vec::with_capacity(self.moves.len());
        for m in &self.moves {
            if !out.contains(&m.entity) {
                out.push(m.entity);
            }
        }
        out
    }

    /// Apply every move to `chain`, or none of them
    ///
    /// # Errors
    ///
    /// `InvalidRange` if any moved entity would end with `lower > upper`;
    /// the chain is unchanged in that case.
    pub fn apply(&self, chain: &mut SegmentChain) -> Result<()> {
        let mut finals: Vec<(EntityRef, BoundValue, BoundValue)> = Vec::new();
        for m in &self.moves {
            let slot = match finals.iter().position(|(e, _, _)| *e == m.entity) {
                Some(i) => i,
                None => {
                    let current = current_range(chain, m.entity)?;
                    finals.push((m.entity, *current.lower(), *current.upper()));
                    finals.len() - 1
                }
            };
            match m.end {
                Boundary::Lower => finals[slot].1 = m.to,
                Boundary::Upper => finals[slot].2 = m.to,
            }
        }

        let mut ranges = Vec::with_capacity(finals.len());
        for (entity, lower, upper) in finals {
            let range = RangeValue::new(lower, upper).map_err(|e| match e {
                Error::InvalidRange { lower, upper, .. } => Error::InvalidRange {
                    lower,
                    upper,
                    reason: format!("boundary propagation would invert {}", entity),
                },
                other => other,
            })?;
            ranges.push((entity, range));
        }

        for (entity, range) in ranges {
            match entity {
                EntityRef::Span(_) => chain.span_mut().range = range,
                EntityRef::Segment(id) => chain.set_range(id, range)?,
            }
        }
        Ok(())
    }
}

fn current_range(chain: &SegmentChain, entity: EntityRef) -> Result<RangeValue> {
    match entity {
        EntityRef::Span(id) if id == chain.span().id => Ok(chain.span().range),
        EntityRef::Segment(id) => chain
            .get_active(id)
            .map(|s| s.range)
            .ok_or(Error::NotFound(entity)),
        EntityRef::Span(_) => Err(Error::NotFound(entity)),
    }
}

/// Plan moving segment `id` to `new_range`
///
/// Without sticky boundaries only the segment itself moves.
pub fn plan_segment_resize(
    chain: &SegmentChain,
    id: SegmentId,
    new_range: &RangeValue,
) -> Result<PropagationPlan> {
    let segment = chain
        .get_active(id)
        .ok_or(Error::NotFound(EntityRef::Segment(id)))?;
    segment.range.lower().ensure_same_domain(new_range.lower())?;

    let span = chain.span();
    let sticky = span.policy.sticky_boundaries;
    let mut plan = PropagationPlan::new();

    for end in [Boundary::Lower, Boundary::Upper] {
        let from = *segment.range.bound(end);
        let to = *new_range.bound(end);
        if from == to {
            continue;
        }
        plan.push(EntityRef::Segment(id), end, from, to);
        if !sticky {
            continue;
        }
        match end {
            Boundary::Lower => match chain.previous_of(id) {
                Some(prev) if *prev.range.upper() == from => {
                    plan.push(EntityRef::Segment(prev.id), Boundary::Upper, from, to)
                }
                Some(_) => {}
                None if *span.range.lower() == from => {
                    plan.push(EntityRef::Span(span.id), Boundary::Lower, from, to)
                }
                None => {}
            },
            Boundary::Upper => match chain.next_of(id) {
                Some(next) if *next.range.lower() == from => {
                    plan.push(EntityRef::Segment(next.id), Boundary::Lower, from, to)
                }
                Some(_) => {}
                None if *span.range.upper() == from => {
                    plan.push(EntityRef::Span(span.id), Boundary::Upper, from, to)
                }
                None => {}
            },
        }
    }
    Ok(plan)
}

/// Plan moving the span to `new_range`
///
/// With sticky boundaries the first (last) active segment follows when its
/// lower (upper) bound equals the old span bound.
pub fn plan_span_resize(chain: &SegmentChain, new_range: &RangeValue) -> Result<PropagationPlan> {
    let span = chain.span();
    span.range.lower().ensure_same_domain(new_range.lower())?;

    let mut plan = PropagationPlan::new();
    for end in [Boundary::Lower, Boundary::Upper] {
        let from = *span.range.bound(end);
        let to = *new_range.bound(end);
        if from == to {
            continue;
        }
        plan.push(EntityRef::Span(span.id), end, from, to);
        if !span.policy.sticky_boundaries {
            continue;
        }
        let edge = match end {
            Boundary::Lower => chain.first(),
            Boundary::Upper => chain.last(),
        };
        if let Some(edge) = edge {
            if *edge.range.bound(end) == from {
                plan.push(EntityRef::Segment(edge.id), end, from, to);
            }
        }
    }
    Ok(plan)
}
