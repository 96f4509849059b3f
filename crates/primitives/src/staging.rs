//! Diff between a loaded chain and its proposed successor
//!
//! Produces one [`Change`] per entity whose stored record differs, in
//! notification order: the span first, then segments by lower bound.

use std::cmp::Ordering;
use std::collections::HashMap;

use spanline_core::{BoundValue, EntityRef, Key, Record, Segment, SegmentId};

use crate::chain::SegmentChain;
use crate::hooks::OperationKind;

/// Pending write of one entity
#[derive(Debug, Clone)]
pub(crate) struct Change {
    pub(crate) entity: EntityRef,
    pub(crate) key: Key,
    pub(crate) operation: OperationKind,
    pub(crate) before: Option<Record>,
    pub(crate) after: Option<Record>,
    /// Staged but not reported (purge of already soft-deleted rows)
    pub(crate) silent: bool,
}

fn segment_operation(before: Option<&Segment>, after: Option<&Segment>) -> Option<OperationKind> {
    match (before, after) {
        (None, Some(_)) => Some(OperationKind::CreateSegment),
        (Some(_), None) => Some(OperationKind::DeleteSegment),
        (Some(b), Some(a)) if b.is_active() && !a.is_active() => Some(OperationKind::DeleteSegment),
        (Some(b), Some(a)) if b.range != a.range => Some(OperationKind::ResizeSegment),
        (Some(b), Some(a)) if b.previous != a.previous => Some(OperationKind::RelinkSegment),
        (Some(b), Some(a)) if b != a => Some(OperationKind::ResizeSegment),
        _ => None,
    }
}

/// Changes turning `before` into `after`
///
/// `before` is `None` for a span that does not exist yet. When
/// `span_removed` is set the span header is deleted as well.
pub(crate) fn diff(
    before: Option<&SegmentChain>,
    after: &SegmentChain,
    span_removed: bool,
) -> Vec<Change> {
    let mut changes = Vec::new();
    let span = after.span();

    let old_span = before.map(|c| c.span());
    let span_operation = match old_span {
        None => Some(OperationKind::CreateSpan),
        Some(_) if span_removed => Some(OperationKind::DeleteSpan),
        Some(old) if old.is_active() && !span.is_active() => Some(OperationKind::DeleteSpan),
        Some(old) if old.range != span.range => Some(OperationKind::ResizeSpan),
        _ => None,
    };
    if let Some(operation) = span_operation {
        changes.push(Change {
            entity: EntityRef::Span(span.id),
            key: span.key(),
            operation,
            before: old_span.cloned().map(Record::Span),
            after: (!span_removed).then(|| Record::Span(span.clone())),
            silent: false,
        });
    }

    let old: HashMap<SegmentId, &Segment> = before
        .map(|c| c.segments().map(|s| (s.id, s)).collect())
        .unwrap_or_default();

    let mut segment_changes: Vec<(BoundValue, Change)> = Vec::new();
    for segment in after.segments() {
        let previous = old.get(&segment.id).copied();
        if let Some(operation) = segment_operation(previous, Some(segment)) {
            segment_changes.push((
                *previous.unwrap_or(segment).range.lower(),
                Change {
                    entity: EntityRef::Segment(segment.id),
                    key: segment.key(),
                    operation,
                    before: previous.cloned().map(Record::Segment),
                    after: Some(Record::Segment(segment.clone())),
                    silent: false,
                },
            ));
        }
    }
    for segment in after.removed() {
        let previous = old.get(&segment.id).copied();
        // A segment created and dropped within one proposal never existed
        let Some(previous) = previous else { continue };
        segment_changes.push((
            *previous.range.lower(),
            Change {
                entity: EntityRef::Segment(segment.id),
                key: segment.key(),
                operation: OperationKind::DeleteSegment,
                before: Some(Record::Segment(previous.clone())),
                after: None,
                silent: !previous.is_active(),
            },
        ));
    }

    segment_changes.sort_by(|(a, ca), (b, cb)| {
        a.partial_cmp(b)
            .unwrap_or(Ordering::Equal)
            .then_with(|| ca.key.cmp(&cb.key))
    });
    changes.extend(segment_changes.into_iter().map(|(_, c)| c));
    changes
}
