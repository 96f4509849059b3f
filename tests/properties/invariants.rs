//! Random operation sequences against random policies

use crate::common::*;
use proptest::prelude::*;
use spanline::{
    DeleteOptions, GapHeal, PolicyOverrides, PreviousOnDelete, SegmentId, SpanId, SpanStore,
};

#[derive(Debug, Clone)]
enum Op {
    Create { lower: i32, len: i32 },
    Resize { pick: usize, lower: i32, len: i32 },
    Split { pick: usize, at: i32 },
    MergeNext { pick: usize },
    Delete { pick: usize, soft: bool, heal: GapHeal },
    ResizeSpan { lower: i32, upper: i32 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let heal = prop_oneof![
        Just(GapHeal::Reject),
        Just(GapHeal::ExtendPredecessor),
        Just(GapHeal::ExtendSuccessor),
    ];
    prop_oneof![
        3 => (-10i32..110, 1i32..40).prop_map(|(lower, len)| Op::Create { lower, len }),
        3 => (any::<usize>(), -10i32..110, 1i32..60)
            .prop_map(|(pick, lower, len)| Op::Resize { pick, lower, len }),
        2 => (any::<usize>(), 1i32..100).prop_map(|(pick, at)| Op::Split { pick, at }),
        1 => any::<usize>().prop_map(|pick| Op::MergeNext { pick }),
        1 => (any::<usize>(), any::<bool>(), heal)
            .prop_map(|(pick, soft, heal)| Op::Delete { pick, soft, heal }),
        1 => (-20i32..20, 80i32..130).prop_map(|(lower, upper)| Op::ResizeSpan { lower, upper }),
    ]
}

fn policy_strategy() -> impl Strategy<Value = PolicyOverrides> {
    (any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>()).prop_map(
        |(span_gaps, segment_gaps, relink, sticky)| {
            PolicyOverrides::none()
                .allow_span_gaps(span_gaps)
                .allow_segment_gaps(segment_gaps)
                .sticky_boundaries(sticky)
                .previous_on_delete(if relink {
                    PreviousOnDelete::Relink
                } else {
                    PreviousOnDelete::Cascade
                })
        },
    )
}

/// Observable state of a chain, revision excluded
type Snapshot = (
    (i32, i32),
    Vec<(SegmentId, (i32, i32), Option<SegmentId>)>,
    usize,
);

fn snapshot(store: &SpanStore, span: SpanId) -> Snapshot {
    let chain = store.chain(span).unwrap();
    (
        bounds(&chain.span().range),
        chain
            .active()
            .iter()
            .map(|s| (s.id, bounds(&s.range), s.previous))
            .collect(),
        chain.inactive().len(),
    )
}

fn pick(store: &SpanStore, span: SpanId, index: usize) -> Option<SegmentId> {
    let active = store.segments(span).unwrap();
    if active.is_empty() {
        None
    } else {
        Some(active[index % active.len()].id)
    }
}

/// Apply one operation; `Ok(false)` when there was nothing to act on
fn apply(store: &SpanStore, span: SpanId, op: &Op) -> spanline::Result<bool> {
    match *op {
        Op::Create { lower, len } => store
            .create_segment(span, range(lower, lower + len))
            .map(|_| true),
        Op::Resize { pick: i, lower, len } => match pick(store, span, i) {
            Some(id) => store
                .resize_segment(id, range(lower, lower + len))
                .map(|_| true),
            None => Ok(false),
        },
        Op::Split { pick: i, at } => match pick(store, span, i) {
            Some(id) => store.split_segment(id, at).map(|_| true),
            None => Ok(false),
        },
        Op::MergeNext { pick: i } => match pick(store, span, i) {
            Some(id) => store.merge_with_next(id).map(|_| true),
            None => Ok(false),
        },
        Op::Delete { pick: i, soft, heal } => match pick(store, span, i) {
            Some(id) => {
                let options = if soft {
                    DeleteOptions::soft()
                } else {
                    DeleteOptions::hard()
                };
                store
                    .delete_segment(id, options.with_heal(heal))
                    .map(|_| true)
            }
            None => Ok(false),
        },
        Op::ResizeSpan { lower, upper } => {
            store.resize_span(span, range(lower, upper)).map(|_| true)
        }
    }
}

fn check_invariants(
    store: &SpanStore,
    span: SpanId,
    overrides: &PolicyOverrides,
) -> Result<(), TestCaseError> {
    let chain = store.chain(span).unwrap();
    prop_assert!(chain.validate(false).is_ok(), "{:?}", chain.validate(false));
    prop_assert!(chain.verify_links().is_ok());

    let (span_lower, span_upper) = bounds(&chain.span().range);
    let mut previous: Option<(SegmentId, i32)> = None;
    for segment in chain.active() {
        let (lower, upper) = bounds(&segment.range);
        prop_assert!(span_lower <= lower && upper <= span_upper);
        prop_assert!(lower < upper);
        match previous {
            Some((id, prev_upper)) => {
                prop_assert_eq!(segment.previous, Some(id));
                prop_assert!(prev_upper <= lower);
                if overrides.allow_segment_gaps == Some(false) {
                    prop_assert_eq!(prev_upper, lower);
                }
            }
            None => prop_assert_eq!(segment.previous, None),
        }
        previous = Some((segment.id, upper));
    }
    for segment in chain.inactive() {
        prop_assert!(segment.deleted_at.is_some());
        prop_assert_eq!(segment.previous, None);
    }

    if overrides.allow_span_gaps == Some(false) {
        let covered: i64 = chain
            .active()
            .iter()
            .map(|s| {
                let (l, u) = bounds(&s.range);
                i64::from(u - l)
            })
            .sum();
        prop_assert_eq!(covered, i64::from(span_upper - span_lower));
        prop_assert!(store.gaps(span).unwrap().is_empty());
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    #[test]
    fn prop_chain_stays_valid(
        overrides in policy_strategy(),
        ops in prop::collection::vec(op_strategy(), 1..24),
    ) {
        let store = store();
        let (span, _) = span_with(&store, (0, 100), overrides, &[]);
        check_invariants(&store, span, &overrides)?;

        for op in &ops {
            let before = snapshot(&store, span);
            match apply(&store, span, op) {
                Ok(_) => {}
                Err(e) => {
                    prop_assert!(!e.is_retryable(), "unexpected conflict: {}", e);
                    prop_assert_eq!(snapshot(&store, span), before, "{:?} failed with {} but changed the chain", op, e);
                }
            }
            check_invariants(&store, span, &overrides)?;
        }
    }

    #[test]
    fn prop_rejected_propagation_changes_nothing(
        cuts in prop::collection::btree_set(1i32..100, 1..6),
        pick in any::<usize>(),
        lower in -10i32..110,
        len in 1i32..80,
    ) {
        let store = store();
        let (span, _) = span_with(&store, (0, 100), strict(), &[]);
        for cut in &cuts {
            let target = store
                .segments(span)
                .unwrap()
                .into_iter()
                .find(|s| bounds(&s.range).0 < *cut && *cut < bounds(&s.range).1)
                .map(|s| s.id);
            if let Some(id) = target {
                store.split_segment(id, *cut).unwrap();
            }
        }

        let before = snapshot(&store, span);
        let Some(id) = self::pick(&store, span, pick) else {
            return Ok(());
        };
        if store.resize_segment(id, range(lower, lower + len)).is_err() {
            prop_assert_eq!(snapshot(&store, span), before);
        }
        check_invariants(&store, span, &strict())?;
    }
}
