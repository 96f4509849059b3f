//! SpanTransaction: mutation operations inside one engine transaction
//!
//! ## Operation lifecycle
//!
//! Every operation follows the same steps:
//!
//! 1. load the span's chain through the transaction (tracked in the read set)
//! 2. check the operation's own preconditions; failures return early and
//!    emit nothing
//! 3. build the proposed chain on a copy
//! 4. [`SpanTransaction::stage`]: relink, emit `Pre`, validate the whole
//!    chain once, then write every changed record with nested notifications
//!    and emit `Post`
//!
//! A validation failure emits `Failed` and buffers nothing, so the enclosing
//! transaction is free to continue or abort.
//!
//! Each staged change bumps the span's `revision`, so two transactions
//! touching the same span always conflict at commit.

use spanline_concurrency::TransactionContext;
use spanline_core::{
    EntityKind, EntityRef, Error, Key, Record, Result, Segment, SegmentId, Span, SpanId,
};
use spanline_engine::EngineConfig;
use tracing::debug;

use crate::chain::SegmentChain;
use crate::hooks::{Notification, NotificationScope, OperationKind, Phase};
use crate::staging::{self, Change};

/// Proposed new state of one span, produced by an operation
pub(crate) struct Proposal {
    pub(crate) operation: OperationKind,
    pub(crate) entity: EntityRef,
    pub(crate) before: Option<SegmentChain>,
    pub(crate) after: SegmentChain,
    pub(crate) span_removed: bool,
}

impl Proposal {
    /// Change to an existing span
    pub(crate) fn update(
        operation: OperationKind,
        entity: EntityRef,
        before: SegmentChain,
        after: SegmentChain,
    ) -> Self {
        Self {
            operation,
            entity,
            before: Some(before),
            after,
            span_removed: false,
        }
    }
}

/// Transaction handle for span and segment operations
///
/// Obtained from [`SpanStore::transaction`](crate::SpanStore::transaction).
/// All operations called on one handle commit or fail together.
pub struct SpanTransaction<'a> {
    txn: &'a mut TransactionContext,
    scope: &'a mut NotificationScope,
    config: &'a EngineConfig,
}

impl<'a> SpanTransaction<'a> {
    pub(crate) fn new(
        txn: &'a mut TransactionContext,
        scope: &'a mut NotificationScope,
        config: &'a EngineConfig,
    ) -> Self {
        Self { txn, scope, config }
    }

    /// Engine configuration in effect for this transaction
    pub fn config(&self) -> &EngineConfig {
        self.config
    }

    // ========== Reads ==========

    /// Load a span with all its segments, deleted ones included
    pub fn chain(&mut self, span: SpanId) -> Result<SegmentChain> {
        let mut header: Option<Span> = None;
        let mut segments = Vec::new();
        for record in self.txn.scan_span(span)? {
            match record {
                Record::Span(s) => header = Some(s),
                Record::Segment(s) => segments.push(s),
            }
        }
        let header = header.ok_or(Error::NotFound(EntityRef::Span(span)))?;
        SegmentChain::from_records(header, segments)
    }

    /// Span header
    pub fn span(&mut self, span: SpanId) -> Result<Span> {
        match self.txn.get(&Key::span(span))? {
            Some(Record::Span(s)) => Ok(s),
            _ => Err(Error::NotFound(EntityRef::Span(span))),
        }
    }

    /// Segment by id, active or soft-deleted
    pub fn segment(&mut self, segment: SegmentId) -> Result<Segment> {
        let span = self.owner(segment)?;
        match self.txn.get(&Key::segment(span, segment))? {
            Some(Record::Segment(s)) => Ok(s),
            _ => Err(Error::NotFound(EntityRef::Segment(segment))),
        }
    }

    /// Active segments of a span in chain order
    pub fn active_segments(&mut self, span: SpanId) -> Result<Vec<Segment>> {
        Ok(self.chain(span)?.active().to_vec())
    }

    /// Soft-deleted segments of a span
    pub fn inactive_segments(&mut self, span: SpanId) -> Result<Vec<Segment>> {
        Ok(self.chain(span)?.inactive().to_vec())
    }

    /// Ids of all spans, deleted ones included
    pub fn list_spans(&mut self) -> Result<Vec<SpanId>> {
        self.txn.list_spans()
    }

    /// Owning span of a segment
    pub(crate) fn owner(&mut self, segment: SegmentId) -> Result<SpanId> {
        self.txn
            .owner_of(segment)?
            .ok_or(Error::NotFound(EntityRef::Segment(segment)))
    }

    /// Chain of a span that is not deleted
    pub(crate) fn live_chain(&mut self, span: SpanId) -> Result<SegmentChain> {
        let chain = self.chain(span)?;
        if !chain.span().is_active() {
            return Err(Error::invalid_operation(format!("span {} is deleted", span)));
        }
        Ok(chain)
    }

    /// Chain owning an active segment
    pub(crate) fn chain_of_segment(&mut self, segment: SegmentId) -> Result<SegmentChain> {
        let span = self.owner(segment)?;
        let chain = self.live_chain(span)?;
        match chain.get(segment) {
            Some(s) if s.is_active() => Ok(chain),
            Some(_) => Err(Error::invalid_operation(format!(
                "segment {} is deleted",
                segment
            ))),
            None => Err(Error::NotFound(EntityRef::Segment(segment))),
        }
    }

    // ========== Staging ==========

    /// Validate a proposal and buffer its writes, with notifications
    pub(crate) fn stage(&mut self, proposal: Proposal) -> Result<SegmentChain> {
        let Proposal {
            operation,
            entity,
            before,
            mut after,
            span_removed,
        } = proposal;

        after.relink();
        if let Some(prior) = &before {
            after.span_mut().revision = prior.span().revision + 1;
        }
        let span = after.span().id;
        let changes = staging::diff(before.as_ref(), &after, span_removed);

        let mut affected = vec![entity];
        affected.extend(
            changes
                .iter()
                .filter(|c| !c.silent && c.entity != entity)
                .map(|c| c.entity),
        );
        let (outer_before, outer_after) = match changes.iter().find(|c| c.entity == entity) {
            Some(change) => (change.before.clone(), change.after.clone()),
            None => (
                before.as_ref().and_then(|c| record_of(c, entity)),
                record_of(&after, entity),
            ),
        };
        let outer = Notification {
            phase: Phase::Pre,
            operation,
            entity,
            span,
            affected,
            before: outer_before,
            after: outer_after,
            nested: false,
        };
        self.scope.emit(outer.clone());

        let checked = if span_removed || !after.span().is_active() {
            Ok(())
        } else {
            after.validate(self.config.allow_empty_ranges)
        };
        if let Err(e) = checked {
            log_rejected(operation, span, &e);
            self.scope.emit(outer.with_phase(Phase::Failed));
            return Err(e);
        }

        for change in &changes {
            if change.entity == entity || change.silent {
                self.write(change)?;
                continue;
            }
            let nested = Notification {
                phase: Phase::Pre,
                operation: change.operation,
                entity: change.entity,
                span,
                affected: vec![change.entity],
                before: change.before.clone(),
                after: change.after.clone(),
                nested: true,
            };
            self.scope.emit(nested.clone());
            self.write(change)?;
            self.scope.emit(nested.with_phase(Phase::Post));
        }
        if !span_removed {
            self.txn.put(Record::Span(after.span().clone()))?;
        }

        log_staged(operation, span, changes.len());
        self.scope.emit(outer.with_phase(Phase::Post));
        Ok(after)
    }

    fn write(&mut self, change: &Change) -> Result<()> {
        match &change.after {
            Some(record) => self.txn.put(record.clone()),
            None => self.txn.delete(change.key),
        }
    }
}

fn record_of(chain: &SegmentChain, entity: EntityRef) -> Option<Record> {
    match entity {
        EntityRef::Span(_) => Some(Record::Span(chain.span().clone())),
        EntityRef::Segment(id) => chain.get(id).cloned().map(Record::Segment),
    }
}

fn log_staged(operation: OperationKind, span: SpanId, changes: usize) {
    match operation.entity_kind() {
        EntityKind::Span => {
            debug!(target: "spanline::span", %operation, %span, changes, "operation staged")
        }
        EntityKind::Segment => {
            debug!(target: "spanline::segment", %operation, %span, changes, "operation staged")
        }
    }
}

fn log_rejected(operation: OperationKind, span: SpanId, error: &Error) {
    match operation.entity_kind() {
        EntityKind::Span => {
            debug!(target: "spanline::span", %operation, %span, %error, "operation rejected")
        }
        EntityKind::Segment => {
            debug!(target: "spanline::segment", %operation, %span, %error, "operation rejected")
        }
    }
}
