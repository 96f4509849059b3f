//! SpanStore: spans and their segment chains
//!
//! ## Design
//!
//! SpanStore is a stateless facade over the Database engine. It holds an
//! `Arc<Database>` and the listener registry; every span and segment lives
//! in storage.
//!
//! ## API
//!
//! - **Single-Operation API**: `create_span`, `resize_segment`,
//!   `delete_span`, ... Each operation runs in its own transaction.
//!
//! - **Multi-Operation API**: `transaction` with `SpanTransaction`.
//!   Multiple operations commit or fail together.
//!
//! Both retry on `ConcurrencyConflict` with the database's retry schedule.
//! Any other error is returned on the first attempt.
//!
//! ## Thread Safety
//!
//! SpanStore is `Send + Sync`. Clones share the database and listeners.

use std::sync::Arc;

use spanline_core::{
    BoundValue, DeleteMode, DeltaValue, PolicyOverrides, RangeValue, Result, Segment, SegmentId,
    Span, SpanId, SpanKind,
};
use spanline_engine::Database;

use crate::chain::SegmentChain;
use crate::hooks::{ListenerRegistry, NotificationScope};
use crate::segment_ops::DeleteOptions;
use crate::span_ops::{AppendTo, Extent};
use crate::txn::SpanTransaction;

/// Spans with validated segment chains
///
/// # Example
///
/// ```ignore
/// use spanline_primitives::SpanStore;
/// use spanline_core::{PolicyOverrides, RangeValue, SpanKind};
///
/// let store = SpanStore::ephemeral();
/// let span = store.create_span(SpanKind::default(), RangeValue::new(0, 100)?, PolicyOverrides::none())?;
/// let first = store.create_segment(span.id, RangeValue::new(0, 40)?)?;
/// store.split_segment(first.id, 20)?;
/// ```
#[derive(Clone)]
pub struct SpanStore {
    db: Arc<Database>,
    hooks: Arc<ListenerRegistry>,
}

impl SpanStore {
    /// Create a SpanStore over `db` with no listeners
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            hooks: Arc::new(ListenerRegistry::new()),
        }
    }

    /// SpanStore over a fresh in-memory database
    pub fn ephemeral() -> Self {
        Self::new(Arc::new(Database::ephemeral()))
    }

    /// Get the underlying database reference
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Listener registry of this store
    pub fn hooks(&self) -> &Arc<ListenerRegistry> {
        &self.hooks
    }

    // ========== Multi-Operation API ==========

    /// Run `f` as one atomic transaction
    ///
    /// `f` may be called more than once: on `ConcurrencyConflict` at commit
    /// the transaction is retried from scratch with exponential backoff.
    /// `Post` notifications are delivered once the commit has landed. If it
    /// fails, every operation staged by the attempt is reported as `Failed`.
    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: Fn(&mut SpanTransaction<'_>) -> Result<T>,
    {
        let config = self.db.config();
        self.db.retry_with(config.retry, || {
            let mut txn = self.db.begin_transaction();
            let mut scope = NotificationScope::new(Arc::clone(&self.hooks));
            let result = {
                let mut tx = SpanTransaction::new(&mut txn, &mut scope, &config);
                f(&mut tx)
            };
            match self.db.finish_attempt(&mut txn, result) {
                Ok((value, _)) => {
                    scope.committed();
                    Ok(value)
                }
                Err(e) => {
                    scope.aborted();
                    Err(e)
                }
            }
        })
    }

    // ========== Reads ==========

    /// Span header (deleted spans included)
    pub fn span(&self, span: SpanId) -> Result<Span> {
        self.transaction(|tx| tx.span(span))
    }

    /// Span with all of its segments
    pub fn chain(&self, span: SpanId) -> Result<SegmentChain> {
        self.transaction(|tx| tx.chain(span))
    }

    /// Segment by id, active or soft-deleted
    pub fn segment(&self, segment: SegmentId) -> Result<Segment> {
        self.transaction(|tx| tx.segment(segment))
    }

    /// Active segments of a span in chain order
    pub fn segments(&self, span: SpanId) -> Result<Vec<Segment>> {
        self.transaction(|tx| tx.active_segments(span))
    }

    /// Ids of all stored spans
    pub fn list_spans(&self) -> Result<Vec<SpanId>> {
        self.transaction(|tx| tx.list_spans())
    }

    /// Active segment containing `point`
    pub fn segment_at(&self, span: SpanId, point: impl Into<BoundValue>) -> Result<Option<Segment>> {
        let point = point.into();
        let chain = self.chain(span)?;
        Ok(chain.segment_at(&point)?.cloned())
    }

    /// Parts of a span not covered by active segments
    pub fn gaps(&self, span: SpanId) -> Result<Vec<RangeValue>> {
        self.chain(span)?.gaps()
    }

    // ========== Span operations ==========

    /// Create a span; see [`SpanTransaction::create_span`]
    pub fn create_span(
        &self,
        kind: SpanKind,
        range: RangeValue,
        overrides: PolicyOverrides,
    ) -> Result<Span> {
        self.transaction(|tx| tx.create_span(kind.clone(), range, &overrides))
    }

    /// Change a span's range
    pub fn resize_span(&self, span: SpanId, new_range: RangeValue) -> Result<Span> {
        self.transaction(|tx| tx.resize_span(span, new_range))
    }

    /// Set a span's lower bound
    pub fn shift_span_lower_to(&self, span: SpanId, value: impl Into<BoundValue>) -> Result<Span> {
        let value = value.into();
        self.transaction(|tx| tx.shift_span_lower_to(span, value))
    }

    /// Move a span's lower bound by `delta`
    pub fn shift_span_lower_by(&self, span: SpanId, delta: &DeltaValue) -> Result<Span> {
        self.transaction(|tx| tx.shift_span_lower_by(span, delta))
    }

    /// Set a span's upper bound
    pub fn shift_span_upper_to(&self, span: SpanId, value: impl Into<BoundValue>) -> Result<Span> {
        let value = value.into();
        self.transaction(|tx| tx.shift_span_upper_to(span, value))
    }

    /// Move a span's upper bound by `delta`
    pub fn shift_span_upper_by(&self, span: SpanId, delta: &DeltaValue) -> Result<Span> {
        self.transaction(|tx| tx.shift_span_upper_by(span, delta))
    }

    /// Move a span and its active segments by `delta`
    pub fn shift_span(&self, span: SpanId, delta: &DeltaValue) -> Result<Span> {
        self.transaction(|tx| tx.shift_span(span, delta))
    }

    /// Grow a span to include a value or range
    pub fn extend_span(&self, span: SpanId, extent: impl Into<Extent>) -> Result<Span> {
        let extent = extent.into();
        self.transaction(|tx| tx.extend_span(span, extent))
    }

    /// Append a segment after the last one
    pub fn append_segment(&self, span: SpanId, to: AppendTo) -> Result<Segment> {
        self.transaction(|tx| tx.append_segment(span, to))
    }

    /// Delete a span and its segments; `None` uses the span policy
    pub fn delete_span(&self, span: SpanId, mode: Option<DeleteMode>) -> Result<()> {
        self.transaction(|tx| tx.delete_span(span, mode))
    }

    /// Recompute `previous` links; returns how many changed
    pub fn repair_chain(&self, span: SpanId) -> Result<usize> {
        self.transaction(|tx| tx.repair_chain(span))
    }

    /// Check `previous` links
    pub fn verify_chain(&self, span: SpanId) -> Result<()> {
        self.transaction(|tx| tx.verify_chain(span))
    }

    // ========== Segment operations ==========

    /// Add a segment to a span
    pub fn create_segment(&self, span: SpanId, range: RangeValue) -> Result<Segment> {
        self.transaction(|tx| tx.create_segment(span, range))
    }

    /// Change a segment's range with sticky propagation
    pub fn resize_segment(&self, segment: SegmentId, new_range: RangeValue) -> Result<Segment> {
        self.transaction(|tx| tx.resize_segment(segment, new_range))
    }

    /// Move a segment by `delta`
    pub fn shift_segment(&self, segment: SegmentId, delta: &DeltaValue) -> Result<Segment> {
        self.transaction(|tx| tx.shift_segment(segment, delta))
    }

    /// Set a segment's lower bound
    pub fn shift_segment_lower_to(
        &self,
        segment: SegmentId,
        value: impl Into<BoundValue>,
    ) -> Result<Segment> {
        let value = value.into();
        self.transaction(|tx| tx.shift_segment_lower_to(segment, value))
    }

    /// Move a segment's lower bound by `delta`
    pub fn shift_segment_lower_by(&self, segment: SegmentId, delta: &DeltaValue) -> Result<Segment> {
        self.transaction(|tx| tx.shift_segment_lower_by(segment, delta))
    }

    /// Set a segment's upper bound
    pub fn shift_segment_upper_to(
        &self,
        segment: SegmentId,
        value: impl Into<BoundValue>,
    ) -> Result<Segment> {
        let value = value.into();
        self.transaction(|tx| tx.shift_segment_upper_to(segment, value))
    }

    /// Move a segment's upper bound by `delta`
    pub fn shift_segment_upper_by(&self, segment: SegmentId, delta: &DeltaValue) -> Result<Segment> {
        self.transaction(|tx| tx.shift_segment_upper_by(segment, delta))
    }

    /// Cut a segment in two at `point`
    pub fn split_segment(
        &self,
        segment: SegmentId,
        point: impl Into<BoundValue>,
    ) -> Result<(Segment, Segment)> {
        let point = point.into();
        self.transaction(|tx| tx.split_segment(segment, point))
    }

    /// Join two chain-adjacent, touching segments
    pub fn merge_segments(&self, a: SegmentId, b: SegmentId) -> Result<Segment> {
        self.transaction(|tx| tx.merge_segments(a, b))
    }

    /// Merge a segment with its successor
    pub fn merge_with_next(&self, segment: SegmentId) -> Result<Segment> {
        self.transaction(|tx| tx.merge_with_next(segment))
    }

    /// Merge a segment with its predecessor
    pub fn merge_with_previous(&self, segment: SegmentId) -> Result<Segment> {
        self.transaction(|tx| tx.merge_with_previous(segment))
    }

    /// Delete a segment; returns every deleted id
    pub fn delete_segment(
        &self,
        segment: SegmentId,
        options: DeleteOptions,
    ) -> Result<Vec<SegmentId>> {
        self.transaction(|tx| tx.delete_segment(segment, options))
    }
}
