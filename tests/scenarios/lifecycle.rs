//! Span lifecycle, multi-operation transactions and hook delivery

use crate::common::*;
use spanline::{
    AppendTo, BoundValue, DeleteMode, DeltaValue, EntityKind, EntityRef, Error, ListenerFilter,
    OperationKind, Phase, PolicyOverrides,
};

// ============================================================================
// Notifications
// ============================================================================

#[test]
fn test_hard_span_delete_nests_segment_notifications() {
    let store = store();
    let (span, segs) = span_with(&store, (0, 100), contiguous(), &[(0, 40), (40, 100)]);
    let recorder = Recorder::attach(&store, ListenerFilter::all());

    store.delete_span(span, Some(DeleteMode::Hard)).unwrap();

    let s = EntityRef::Span(span);
    let a = EntityRef::Segment(segs[0].id);
    let b = EntityRef::Segment(segs[1].id);
    assert_eq!(
        recorder.trace(),
        vec![
            (Phase::Pre, s),
            (Phase::Pre, a),
            (Phase::Post, a),
            (Phase::Pre, b),
            (Phase::Post, b),
            (Phase::Post, s),
        ]
    );
    let events = recorder.events();
    assert!(!events[0].nested);
    assert!(events[1..5].iter().all(|n| n.nested));
    assert!(events[1..5]
        .iter()
        .all(|n| n.operation == OperationKind::DeleteSegment));

    assert!(matches!(store.span(span), Err(Error::NotFound(_))));
    assert!(matches!(store.segment(segs[0].id), Err(Error::NotFound(_))));
}

#[test]
fn test_sticky_resize_reports_neighbor_as_nested() {
    let store = store();
    let (_, segs) = span_with(&store, (0, 100), contiguous(), &[(0, 40), (40, 100)]);
    let recorder = Recorder::attach(&store, ListenerFilter::all());

    store.resize_segment(segs[0].id, range(0, 50)).unwrap();

    let events = recorder.events();
    let a = EntityRef::Segment(segs[0].id);
    let b = EntityRef::Segment(segs[1].id);
    assert_eq!(
        recorder.trace(),
        vec![
            (Phase::Pre, a),
            (Phase::Pre, b),
            (Phase::Post, b),
            (Phase::Post, a),
        ]
    );
    assert_eq!(events[0].affected, vec![a, b]);
    assert_eq!(events[0].operation, OperationKind::ResizeSegment);

    let moved = events[2].after.as_ref().and_then(|r| r.as_segment()).unwrap();
    assert_eq!(bounds(&moved.range), (50, 100));
    let old = events[2].before.as_ref().and_then(|r| r.as_segment()).unwrap();
    assert_eq!(bounds(&old.range), (40, 100));
}

#[test]
fn test_rejected_operation_emits_failed() {
    let store = store();
    let (span, _) = span_with(&store, (0, 100), contiguous(), &[(0, 40), (40, 100)]);
    let recorder = Recorder::attach(&store, ListenerFilter::all());

    assert!(store.create_segment(span, range(30, 50)).is_err());

    let phases: Vec<_> = recorder.events().iter().map(|n| n.phase).collect();
    assert_eq!(phases, vec![Phase::Pre, Phase::Failed]);
}

#[test]
fn test_precondition_failure_emits_nothing() {
    let store = store();
    let (_, segs) = span_with(&store, (0, 100), PolicyOverrides::none(), &[(0, 10)]);
    let recorder = Recorder::attach(&store, ListenerFilter::all());

    assert!(store.split_segment(segs[0].id, 50).is_err());
    assert!(recorder.events().is_empty());
}

#[test]
fn test_filtered_listener_and_unregister() {
    let store = store();
    let (span, segs) = span_with(&store, (0, 100), PolicyOverrides::none(), &[(0, 10)]);
    let splits = Recorder::attach(
        &store,
        ListenerFilter::all()
            .operation(OperationKind::SplitSegment)
            .phase(Phase::Post),
    );
    let spans = Recorder::attach(&store, ListenerFilter::all().entity(EntityKind::Span));

    store.create_segment(span, range(20, 30)).unwrap();
    store.split_segment(segs[0].id, 5).unwrap();
    store.extend_span(span, BoundValue::from(150)).unwrap();

    assert_eq!(splits.events().len(), 1);
    assert_eq!(
        spans.events().iter().map(|n| n.phase).collect::<Vec<_>>(),
        vec![Phase::Pre, Phase::Post]
    );

    assert_eq!(store.hooks().len(), 2);
    store.hooks().register(ListenerFilter::all(), |_: &spanline::Notification| {});
    assert_eq!(store.hooks().len(), 3);
}

// ============================================================================
// Transactions
// ============================================================================

#[test]
fn test_multi_operation_transaction_is_atomic() {
    let store = store();
    let recorder = Recorder::attach(&store, ListenerFilter::all());

    let result: Result<(), Error> = store.transaction(|tx| {
        let span = tx.create_span(kind(), range(0, 100), &PolicyOverrides::none())?;
        tx.create_segment(span.id, range(0, 50))?;
        Err(Error::invalid_operation("caller gave up"))
    });
    assert!(matches!(result, Err(Error::InvalidOperation(_))));
    assert!(store.list_spans().unwrap().is_empty());

    let phases: Vec<_> = recorder.events().iter().map(|n| n.phase).collect();
    assert_eq!(
        phases,
        vec![Phase::Pre, Phase::Pre, Phase::Failed, Phase::Failed]
    );
    let failed: Vec<_> = recorder.events()[2..].iter().map(|n| n.operation).collect();
    assert_eq!(
        failed,
        vec![OperationKind::CreateSegment, OperationKind::CreateSpan]
    );
}

#[test]
fn test_transaction_builds_chain_in_one_commit() {
    let store = store();
    let version = store.database().current_version();

    let span = store
        .transaction(|tx| {
            let span = tx.create_span(kind(), range(0, 90), &strict())?;
            let whole = tx.active_segments(span.id)?[0].id;
            let (_, rest) = tx.split_segment(whole, 30)?;
            tx.split_segment(rest.id, 60)?;
            Ok(span.id)
        })
        .unwrap();

    assert_eq!(store.database().current_version(), version + 1);
    assert_eq!(active_ranges(&store, span), vec![(0, 30), (30, 60), (60, 90)]);
    assert_eq!(store.span(span).unwrap().revision, 2);
}

// ============================================================================
// Span operations
// ============================================================================

#[test]
fn test_resize_strict_span_moves_edge_segments() {
    let store = store();
    let (span, _) = span_with(&store, (0, 100), strict(), &[]);
    let first = store.segments(span).unwrap()[0].id;
    store.split_segment(first, 50).unwrap();

    store.resize_span(span, range(-10, 120)).unwrap();
    assert_eq!(active_ranges(&store, span), vec![(-10, 50), (50, 120)]);

    store.shift_span_upper_to(span, 80).unwrap();
    assert_eq!(active_ranges(&store, span), vec![(-10, 50), (50, 80)]);
}

#[test]
fn test_shrinking_span_drops_segments_outside() {
    let store = store();
    let (span, segs) = span_with(
        &store,
        (0, 100),
        PolicyOverrides::none(),
        &[(0, 10), (20, 30), (80, 90)],
    );

    store.resize_span(span, range(5, 50)).unwrap();
    assert_eq!(active_ranges(&store, span), vec![(5, 10), (20, 30)]);
    assert!(store.segment(segs[2].id).unwrap().deleted_at.is_some());
    store.verify_chain(span).unwrap();
}

#[test]
fn test_shift_span_moves_everything() {
    let store = store();
    let (span, _) = span_with(&store, (0, 100), PolicyOverrides::none(), &[(10, 20)]);

    let shifted = store.shift_span(span, &DeltaValue::from(5)).unwrap();
    assert_eq!(bounds(&shifted.range), (5, 105));
    assert_eq!(active_ranges(&store, span), vec![(15, 25)]);
}

#[test]
fn test_extend_span_never_shrinks() {
    let store = store();
    let (span, _) = span_with(&store, (0, 100), strict(), &[]);

    store.extend_span(span, BoundValue::from(50)).unwrap();
    assert_eq!(bounds(&store.span(span).unwrap().range), (0, 100));

    store.extend_span(span, range(-20, 10)).unwrap();
    assert_eq!(active_ranges(&store, span), vec![(-20, 100)]);
}

#[test]
fn test_append_segment_grows_chain_and_span() {
    let store = store();
    let (span, segs) = span_with(&store, (0, 100), contiguous(), &[(0, 40)]);

    let next = store
        .append_segment(span, AppendTo::Value(60.into()))
        .unwrap();
    assert_eq!(bounds(&next.range), (40, 60));
    assert_eq!(next.previous, Some(segs[0].id));

    let tail = store
        .append_segment(span, AppendTo::Delta(20.into()))
        .unwrap();
    assert_eq!(bounds(&tail.range), (60, 120));
    assert_eq!(bounds(&store.span(span).unwrap().range), (0, 120));

    assert!(store.append_segment(span, AppendTo::Value(110.into())).is_err());
}

#[test]
fn test_soft_span_delete_keeps_rows() {
    let store = store();
    let (span, segs) = span_with(&store, (0, 100), PolicyOverrides::none(), &[(0, 10)]);

    store.delete_span(span, None).unwrap();
    assert!(store.span(span).unwrap().deleted_at.is_some());
    assert!(store.segment(segs[0].id).unwrap().deleted_at.is_some());

    let err = store.create_segment(span, range(20, 30)).unwrap_err();
    assert!(matches!(err, Error::InvalidOperation(_)));
    assert!(store.delete_span(span, None).is_err());

    store.delete_span(span, Some(DeleteMode::Hard)).unwrap();
    assert!(matches!(store.span(span), Err(Error::NotFound(_))));
    assert!(store.list_spans().unwrap().is_empty());
}

#[test]
fn test_soft_span_delete_with_hard_segment_override() {
    let store = store();
    let (span, segs) = span_with(
        &store,
        (0, 100),
        PolicyOverrides::none().segment_soft_delete(false),
        &[(0, 10)],
    );

    store.delete_span(span, None).unwrap();
    assert!(store.span(span).unwrap().deleted_at.is_some());
    assert!(matches!(store.segment(segs[0].id), Err(Error::NotFound(_))));
}

#[test]
fn test_repair_on_healthy_chain_is_noop() {
    let store = store();
    let (span, _) = span_with(&store, (0, 100), contiguous(), &[(0, 40), (40, 100)]);
    let revision = store.span(span).unwrap().revision;

    assert_eq!(store.repair_chain(span).unwrap(), 0);
    assert_eq!(store.span(span).unwrap().revision, revision);
}
