//! Validation, sticky boundaries and delete repair through the store

use crate::common::*;
use spanline::{DeleteOptions, Error, GapHeal, PolicyOverrides, PreviousOnDelete};

// ============================================================================
// Overlap and containment
// ============================================================================

#[test]
fn test_overlapping_create_is_rejected_without_change() {
    let store = store();
    let (span, segs) = span_with(&store, (0, 100), contiguous(), &[(0, 40), (40, 100)]);
    let revision = store.span(span).unwrap().revision;

    let err = store.create_segment(span, range(30, 50)).unwrap_err();
    assert!(matches!(err, Error::Overlap { .. }), "got {:?}", err);

    assert_eq!(active_ranges(&store, span), vec![(0, 40), (40, 100)]);
    assert_eq!(store.span(span).unwrap().revision, revision);
    assert_eq!(store.segment(segs[1].id).unwrap().previous, Some(segs[0].id));
}

#[test]
fn test_segment_outside_span_is_containment_error() {
    let store = store();
    let (span, _) = span_with(&store, (10, 20), PolicyOverrides::none(), &[]);
    let err = store.create_segment(span, range(5, 15)).unwrap_err();
    assert!(matches!(err, Error::Containment { .. }));
}

#[test]
fn test_hole_between_segments_is_gap_error() {
    let store = store();
    let (span, _) = span_with(&store, (0, 100), contiguous(), &[(0, 40)]);
    let err = store.create_segment(span, range(50, 100)).unwrap_err();
    assert!(matches!(err, Error::Gap { .. }), "got {:?}", err);
}

#[test]
fn test_gaps_allowed_by_default() {
    let store = store();
    let (span, _) = span_with(
        &store,
        (0, 100),
        PolicyOverrides::none(),
        &[(0, 10), (50, 60)],
    );
    let holes: Vec<_> = store.gaps(span).unwrap().iter().map(bounds).collect();
    assert_eq!(holes, vec![(10, 50), (60, 100)]);
}

#[test]
fn test_strict_span_starts_with_covering_segment() {
    let store = store();
    let (span, _) = span_with(&store, (0, 100), strict(), &[]);
    assert_eq!(active_ranges(&store, span), vec![(0, 100)]);
    assert!(store.gaps(span).unwrap().is_empty());
}

// ============================================================================
// Sticky boundaries
// ============================================================================

#[test]
fn test_resize_moves_shared_boundary() {
    let store = store();
    let (span, segs) = span_with(&store, (0, 100), contiguous(), &[(0, 40), (40, 100)]);

    store.resize_segment(segs[0].id, range(0, 50)).unwrap();
    assert_eq!(active_ranges(&store, span), vec![(0, 50), (50, 100)]);
}

#[test]
fn test_shrink_pulls_successor_down() {
    let store = store();
    let (span, _) = span_with(&store, (0, 100), strict(), &[]);
    let first = store.segments(span).unwrap()[0].id;
    let (_, upper) = store.split_segment(first, 40).unwrap();

    store.shift_segment_upper_to(first, 30).unwrap();
    assert_eq!(active_ranges(&store, span), vec![(0, 30), (30, 100)]);
    assert_eq!(store.segment(upper.id).unwrap().previous, Some(first));
}

#[test]
fn test_propagation_that_would_invert_neighbor_is_rejected() {
    let store = store();
    let (span, segs) = span_with(
        &store,
        (0, 100),
        contiguous(),
        &[(0, 40), (40, 50), (50, 100)],
    );

    let err = store.resize_segment(segs[0].id, range(0, 60)).unwrap_err();
    assert!(matches!(err, Error::InvalidRange { .. }), "got {:?}", err);
    assert_eq!(active_ranges(&store, span), vec![(0, 40), (40, 50), (50, 100)]);
}

#[test]
fn test_non_sticky_resize_leaves_neighbor() {
    let store = store();
    let (span, segs) = span_with(
        &store,
        (0, 100),
        PolicyOverrides::none().sticky_boundaries(false),
        &[(0, 40), (40, 100)],
    );

    store.resize_segment(segs[0].id, range(0, 30)).unwrap();
    assert_eq!(active_ranges(&store, span), vec![(0, 30), (40, 100)]);

    let err = store.resize_segment(segs[0].id, range(0, 50)).unwrap_err();
    assert!(matches!(err, Error::Overlap { .. }));
}

// ============================================================================
// Split and merge
// ============================================================================

#[test]
fn test_split_then_merge_restores_chain() {
    let store = store();
    let (span, _) = span_with(&store, (0, 100), strict(), &[]);
    let whole = store.segments(span).unwrap()[0].clone();

    let (lower, upper) = store.split_segment(whole.id, 25).unwrap();
    assert_eq!(lower.id, whole.id);
    assert_eq!(bounds(&lower.range), (0, 25));
    assert_eq!(bounds(&upper.range), (25, 100));
    assert_eq!(upper.previous, Some(whole.id));

    let merged = store.merge_with_next(whole.id).unwrap();
    assert_eq!(merged.id, whole.id);
    assert_eq!(bounds(&merged.range), (0, 100));
    assert_eq!(active_ranges(&store, span), vec![(0, 100)]);
}

#[test]
fn test_split_at_boundary_is_rejected() {
    let store = store();
    let (_, segs) = span_with(&store, (0, 100), PolicyOverrides::none(), &[(10, 20)]);
    assert!(store.split_segment(segs[0].id, 10).is_err());
    assert!(store.split_segment(segs[0].id, 20).is_err());
}

#[test]
fn test_merge_requires_touching_neighbors() {
    let store = store();
    let (_, segs) = span_with(
        &store,
        (0, 100),
        PolicyOverrides::none(),
        &[(0, 10), (20, 30)],
    );
    let err = store.merge_segments(segs[0].id, segs[1].id).unwrap_err();
    assert!(matches!(err, Error::InvalidOperation(_)));
}

// ============================================================================
// Delete repair
// ============================================================================

#[test]
fn test_soft_delete_first_segment_relinks_successor() {
    let store = store();
    let (span, segs) = span_with(&store, (0, 100), relinking(), &[(0, 40), (40, 100)]);

    let deleted = store
        .delete_segment(segs[0].id, DeleteOptions::soft())
        .unwrap();
    assert_eq!(deleted, vec![segs[0].id]);

    let gone = store.segment(segs[0].id).unwrap();
    assert!(gone.deleted_at.is_some());
    assert_eq!(gone.previous, None);
    assert_eq!(store.segment(segs[1].id).unwrap().previous, None);
    assert_eq!(active_ranges(&store, span), vec![(40, 100)]);
}

#[test]
fn test_relink_skips_deleted_middle() {
    let store = store();
    let (span, segs) = span_with(
        &store,
        (0, 100),
        PolicyOverrides::none().previous_on_delete(PreviousOnDelete::Relink),
        &[(0, 10), (10, 20), (20, 30)],
    );

    store
        .delete_segment(segs[1].id, DeleteOptions::hard())
        .unwrap();
    assert_eq!(store.segment(segs[2].id).unwrap().previous, Some(segs[0].id));
    assert!(store.segment(segs[1].id).is_err());
    store.verify_chain(span).unwrap();
}

#[test]
fn test_cascade_deletes_every_successor() {
    let store = store();
    let (span, segs) = span_with(
        &store,
        (0, 100),
        PolicyOverrides::none(),
        &[(0, 10), (10, 20), (20, 30)],
    );

    let deleted = store
        .delete_segment(segs[1].id, DeleteOptions::new())
        .unwrap();
    assert_eq!(deleted, vec![segs[1].id, segs[2].id]);
    assert_eq!(active_ranges(&store, span), vec![(0, 10)]);
}

#[test]
fn test_delete_leaving_hole_needs_heal() {
    let store = store();
    let (span, segs) = span_with(
        &store,
        (0, 100),
        relinking(),
        &[(0, 30), (30, 60), (60, 100)],
    );

    let err = store
        .delete_segment(segs[1].id, DeleteOptions::new())
        .unwrap_err();
    assert!(matches!(err, Error::Gap { .. }), "got {:?}", err);
    assert_eq!(active_ranges(&store, span).len(), 3);

    store
        .delete_segment(
            segs[1].id,
            DeleteOptions::new().with_heal(GapHeal::ExtendPredecessor),
        )
        .unwrap();
    assert_eq!(active_ranges(&store, span), vec![(0, 60), (60, 100)]);
}
