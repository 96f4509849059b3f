//! Writers on disjoint spans

use std::sync::{Arc, Barrier};
use std::thread;

use crate::common::*;
use spanline::{EngineConfig, RetryConfig};

#[test]
fn test_disjoint_spans_never_conflict() {
    let store = store_with(EngineConfig {
        retry: RetryConfig::no_retry(),
        ..EngineConfig::default()
    });

    let num_threads = 4;
    let ops_per_thread = 25;
    let spans: Vec<_> = (0..num_threads)
        .map(|_| span_with(&store, (0, 1000), strict(), &[]).0)
        .collect();

    let barrier = Arc::new(Barrier::new(num_threads));
    let handles: Vec<_> = spans
        .iter()
        .map(|&span| {
            let store = store.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for k in 1..=ops_per_thread {
                    let last = store.segments(span).unwrap().last().unwrap().id;
                    store.split_segment(last, k * 10).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for span in spans {
        assert_eq!(active_ranges(&store, span).len(), ops_per_thread as usize + 1);
        assert_eq!(store.span(span).unwrap().revision, ops_per_thread as u64);
    }
    assert_eq!(store.database().metrics().total_aborted(), 0);
}
