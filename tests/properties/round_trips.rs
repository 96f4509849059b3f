//! Operations with an exact inverse

use crate::common::*;
use proptest::prelude::*;
use spanline::DeltaValue;

fn chain_view(store: &spanline::SpanStore, span: spanline::SpanId) -> Vec<(i32, i32)> {
    active_ranges(store, span)
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 48, .. ProptestConfig::default() })]

    #[test]
    fn prop_split_then_merge_is_identity(
        cuts in prop::collection::btree_set(1i32..100, 0..5),
        at in 1i32..100,
    ) {
        let store = store();
        let (span, _) = span_with(&store, (0, 100), strict(), &[]);
        for cut in &cuts {
            let target = store
                .segments(span)
                .unwrap()
                .into_iter()
                .find(|s| bounds(&s.range).0 < *cut && *cut < bounds(&s.range).1);
            if let Some(segment) = target {
                store.split_segment(segment.id, *cut).unwrap();
            }
        }
        let before = store.segments(span).unwrap();

        let Some(target) = before
            .iter()
            .find(|s| bounds(&s.range).0 < at && at < bounds(&s.range).1)
            .cloned()
        else {
            return Ok(());
        };
        let (lower, upper) = store.split_segment(target.id, at).unwrap();
        prop_assert_eq!(lower.id, target.id);
        prop_assert_eq!(upper.previous, Some(target.id));

        let merged = store.merge_segments(lower.id, upper.id).unwrap();
        prop_assert_eq!(merged.id, target.id);

        let after = store.segments(span).unwrap();
        let strip = |v: &[spanline::Segment]| {
            v.iter()
                .map(|s| (s.id, s.range, s.previous))
                .collect::<Vec<_>>()
        };
        prop_assert_eq!(strip(&after), strip(&before));
    }

    #[test]
    fn prop_shift_span_there_and_back(
        segments in prop::collection::btree_set(0i32..10, 1..5),
        delta in -50i32..50,
    ) {
        let store = store();
        let ranges: Vec<(i32, i32)> = segments.iter().map(|k| (k * 10, k * 10 + 5)).collect();
        let (span, _) = span_with(&store, (0, 100), spanline::PolicyOverrides::none(), &ranges);
        let before = chain_view(&store, span);

        store.shift_span(span, &DeltaValue::from(delta)).unwrap();
        let shifted = chain_view(&store, span);
        prop_assert!(shifted
            .iter()
            .zip(&before)
            .all(|(s, b)| s.0 == b.0 + delta && s.1 == b.1 + delta));

        store.shift_span(span, &DeltaValue::from(-delta)).unwrap();
        prop_assert_eq!(chain_view(&store, span), before);
        prop_assert_eq!(bounds(&store.span(span).unwrap().range), (0, 100));
    }

    #[test]
    fn prop_sticky_resize_is_reversible(cut in 10i32..90, moved in 1i32..99) {
        let store = store();
        let (span, _) = span_with(&store, (0, 100), strict(), &[]);
        let first = store.segments(span).unwrap()[0].id;
        store.split_segment(first, cut).unwrap();

        store.shift_segment_upper_to(first, moved).unwrap();
        prop_assert_eq!(chain_view(&store, span), vec![(0, moved), (moved, 100)]);

        store.shift_segment_upper_to(first, cut).unwrap();
        prop_assert_eq!(chain_view(&store, span), vec![(0, cut), (cut, 100)]);
    }
}
