//! Writers racing on one span

use std::sync::{Arc, Barrier};
use std::thread;

use crate::common::*;
use spanline::{EngineConfig, ListenerFilter, OperationKind, Phase, PolicyOverrides, RetryConfig};

fn patient() -> EngineConfig {
    EngineConfig {
        retry: RetryConfig::default()
            .with_max_retries(200)
            .with_base_delay_ms(1)
            .with_max_delay_ms(5),
        ..EngineConfig::default()
    }
}

#[test]
fn test_racing_creates_all_commit_with_retry() {
    let store = store_with(patient());
    let (span, _) = span_with(&store, (0, 100), PolicyOverrides::none(), &[]);

    let num_threads = 8;
    let barrier = Arc::new(Barrier::new(num_threads));
    let handles: Vec<_> = (0..num_threads)
        .map(|i| {
            let store = store.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let lower = i as i32 * 10;
                store.create_segment(span, range(lower, lower + 5)).unwrap()
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(active_ranges(&store, span).len(), num_threads);
    assert_eq!(store.span(span).unwrap().revision, num_threads as u64);
    store.verify_chain(span).unwrap();
}

#[test]
fn test_racing_overlapping_creates_admit_one() {
    let store = store_with(patient());
    let (span, _) = span_with(&store, (0, 100), PolicyOverrides::none(), &[]);

    let num_threads = 4;
    let barrier = Arc::new(Barrier::new(num_threads));
    let handles: Vec<_> = (0..num_threads)
        .map(|i| {
            let store = store.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.create_segment(span, range(i as i32, 50 + i as i32))
            })
        })
        .collect();
    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|r| r.is_ok())
        .count();

    assert_eq!(winners, 1);
    assert_eq!(active_ranges(&store, span).len(), 1);
}

#[test]
fn test_retried_attempts_fail_their_notifications() {
    let store = store_with(patient());
    let (span, segs) = span_with(&store, (0, 100), contiguous(), &[(0, 50), (50, 100)]);
    let recorder = Recorder::attach(
        &store,
        ListenerFilter::all().operation(OperationKind::ResizeSegment),
    );

    let num_threads = 4;
    let barrier = Arc::new(Barrier::new(num_threads));
    let first = segs[0].id;
    let handles: Vec<_> = (0..num_threads)
        .map(|i| {
            let store = store.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store
                    .shift_segment_upper_to(first, 40 + i as i32)
                    .unwrap()
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let outer: Vec<_> = recorder
        .events()
        .into_iter()
        .filter(|n| !n.nested)
        .collect();
    let pres = outer.iter().filter(|n| n.phase == Phase::Pre).count();
    let posts = outer.iter().filter(|n| n.phase == Phase::Post).count();
    let failed = outer.iter().filter(|n| n.phase == Phase::Failed).count();
    assert_eq!(posts, num_threads);
    assert_eq!(pres, posts + failed);

    let (_, upper) = bounds(&store.segment(first).unwrap().range);
    assert_eq!(active_ranges(&store, span)[1].0, upper);
}
