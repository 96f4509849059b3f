//! Shared helpers for the integration suites
#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use spanline::{
    BoundValue, Database, EngineConfig, EntityRef, ListenerFilter, Notification, Phase,
    PolicyOverrides, PreviousOnDelete, RangeValue, Segment, SpanId, SpanKind, SpanStore,
};

/// Route `tracing` output through the test harness
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Fresh in-memory store
pub fn store() -> SpanStore {
    init_tracing();
    SpanStore::ephemeral()
}

/// Store over a database with `config`
pub fn store_with(config: EngineConfig) -> SpanStore {
    init_tracing();
    SpanStore::new(Arc::new(Database::new(config).unwrap()))
}

pub fn range(lower: i32, upper: i32) -> RangeValue {
    RangeValue::new(lower, upper).unwrap()
}

pub fn kind() -> SpanKind {
    SpanKind::new("booking")
}

/// Contiguous segments, gaps inside the span allowed
pub fn contiguous() -> PolicyOverrides {
    PolicyOverrides::none().allow_segment_gaps(false)
}

/// Contiguous segments covering the whole span
pub fn strict() -> PolicyOverrides {
    PolicyOverrides::none()
        .allow_segment_gaps(false)
        .allow_span_gaps(false)
}

/// `contiguous` with relinking deletes
pub fn relinking() -> PolicyOverrides {
    contiguous().previous_on_delete(PreviousOnDelete::Relink)
}

pub fn int(value: &BoundValue) -> i32 {
    match value {
        BoundValue::Integer(v) => *v,
        other => panic!("expected an integer bound, got {:?}", other),
    }
}

pub fn bounds(range: &RangeValue) -> (i32, i32) {
    (int(range.lower()), int(range.upper()))
}

/// Active segment ranges in chain order
pub fn active_ranges(store: &SpanStore, span: SpanId) -> Vec<(i32, i32)> {
    store
        .segments(span)
        .unwrap()
        .iter()
        .map(|s| bounds(&s.range))
        .collect()
}

/// Create a span and one segment per range
pub fn span_with(
    store: &SpanStore,
    span_range: (i32, i32),
    overrides: PolicyOverrides,
    segments: &[(i32, i32)],
) -> (SpanId, Vec<Segment>) {
    let span = store
        .create_span(kind(), range(span_range.0, span_range.1), overrides)
        .unwrap();
    let created = segments
        .iter()
        .map(|&(l, u)| store.create_segment(span.id, range(l, u)).unwrap())
        .collect();
    (span.id, created)
}

// ============================================================================
// Listener recording
// ============================================================================

/// Captures every notification delivered to one listener
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl Recorder {
    /// Register a recorder on `store` for notifications matching `filter`
    pub fn attach(store: &SpanStore, filter: ListenerFilter) -> Self {
        let recorder = Self::default();
        let sink = Arc::clone(&recorder.events);
        store
            .hooks()
            .register(filter, move |n: &Notification| sink.lock().push(n.clone()));
        recorder
    }

    pub fn events(&self) -> Vec<Notification> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// `(phase, entity)` pairs in delivery order
    pub fn trace(&self) -> Vec<(Phase, EntityRef)> {
        self.events
            .lock()
            .iter()
            .map(|n| (n.phase, n.entity))
            .collect()
    }
}
