//! Transaction coordinator: begin, commit and abort with outcome accounting
//!
//! Wraps the `TransactionManager` and classifies every finished transaction:
//! committed, lost a read-set conflict, timed out on a span commit lock,
//! refused by storage, or rolled back by its caller. Commit failures are
//! converted into the crate-wide `Error` here.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use spanline_concurrency::{CommitError, TransactionContext, TransactionManager};
use spanline_core::{Error, Result, SnapshotView};
use spanline_storage::UnifiedStore;
use tracing::{debug, warn};

/// How a transaction ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Committed,
    Conflict,
    LockTimeout,
    Rejected,
    RolledBack,
}

impl Outcome {
    fn of(error: &CommitError) -> Self {
        match error {
            CommitError::ValidationFailed(_) => Outcome::Conflict,
            CommitError::LockTimeout { .. } => Outcome::LockTimeout,
            CommitError::Rejected(_) | CommitError::InvalidState(_) => Outcome::Rejected,
        }
    }
}

/// Begins and finishes transactions against one store
///
/// Counters are observational and use Relaxed ordering.
pub struct TransactionCoordinator {
    manager: TransactionManager,
    active: AtomicU64,
    started: AtomicU64,
    committed: AtomicU64,
    conflicts: AtomicU64,
    lock_timeouts: AtomicU64,
    rejected: AtomicU64,
    rolled_back: AtomicU64,
}

impl TransactionCoordinator {
    /// Coordinator starting at `initial_version` with the given span lock wait
    pub fn new(initial_version: u64, lock_timeout: Duration) -> Self {
        Self {
            manager: TransactionManager::with_lock_timeout(initial_version, lock_timeout),
            active: AtomicU64::new(0),
            started: AtomicU64::new(0),
            committed: AtomicU64::new(0),
            conflicts: AtomicU64::new(0),
            lock_timeouts: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            rolled_back: AtomicU64::new(0),
        }
    }

    /// Begin a transaction over a fresh snapshot of `storage`
    pub fn start_transaction(&self, storage: &UnifiedStore) -> TransactionContext {
        let txn_id = self.manager.next_txn_id();
        let snapshot = storage.create_snapshot();
        self.active.fetch_add(1, Ordering::Relaxed);
        self.started.fetch_add(1, Ordering::Relaxed);
        debug!(
            target: "spanline::txn",
            txn_id,
            start_version = snapshot.version(),
            "transaction started"
        );
        TransactionContext::with_snapshot(txn_id, Box::new(snapshot))
    }

    /// Validate, lock and apply `txn`
    ///
    /// Read-set conflicts and lock timeouts come back as
    /// `ConcurrencyConflict`; a storage refusal keeps its own error.
    pub fn commit(&self, txn: &mut TransactionContext, store: &UnifiedStore) -> Result<u64> {
        match self.manager.commit(txn, store) {
            Ok(version) => {
                self.finish(Outcome::Committed);
                debug!(target: "spanline::txn", txn_id = txn.txn_id, version, "transaction committed");
                Ok(version)
            }
            Err(e) => {
                let outcome = Outcome::of(&e);
                self.finish(outcome);
                warn!(
                    target: "spanline::txn",
                    txn_id = txn.txn_id,
                    ?outcome,
                    error = %e,
                    "transaction aborted"
                );
                Err(Error::from(e))
            }
        }
    }

    /// Roll back an active transaction, discarding its buffered writes
    pub fn abort(&self, txn: &mut TransactionContext, reason: String) -> Result<()> {
        self.manager.abort(txn, reason)?;
        self.finish(Outcome::RolledBack);
        debug!(target: "spanline::txn", txn_id = txn.txn_id, "transaction rolled back");
        Ok(())
    }

    fn finish(&self, outcome: Outcome) {
        let _ = self
            .active
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_sub(1))
            });
        let counter = match outcome {
            Outcome::Committed => &self.committed,
            Outcome::Conflict => &self.conflicts,
            Outcome::LockTimeout => &self.lock_timeouts,
            Outcome::Rejected => &self.rejected,
            Outcome::RolledBack => &self.rolled_back,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Latest committed version
    pub fn current_version(&self) -> u64 {
        self.manager.current_version()
    }

    /// Span lock wait used by commits
    pub fn lock_timeout(&self) -> Duration {
        self.manager.lock_timeout()
    }

    /// Snapshot of the outcome counters
    pub fn metrics(&self) -> TransactionMetrics {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        TransactionMetrics {
            active: load(&self.active),
            started: load(&self.started),
            committed: load(&self.committed),
            conflicts: load(&self.conflicts),
            lock_timeouts: load(&self.lock_timeouts),
            rejected: load(&self.rejected),
            rolled_back: load(&self.rolled_back),
        }
    }
}

/// Transaction outcome counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionMetrics {
    /// Begun and not yet finished
    pub active: u64,
    /// Begun since startup
    pub started: u64,
    /// Committed
    pub committed: u64,
    /// Lost read-set validation against a concurrent commit
    pub conflicts: u64,
    /// Gave up waiting for a span commit lock
    pub lock_timeouts: u64,
    /// Refused by storage, e.g. by the exclusion constraint
    pub rejected: u64,
    /// Rolled back by the caller
    pub rolled_back: u64,
}

impl TransactionMetrics {
    /// Every transaction that finished without committing
    pub fn total_aborted(&self) -> u64 {
        self.conflicts + self.lock_timeouts + self.rejected + self.rolled_back
    }

    /// Failures a retry may fix
    pub fn retryable(&self) -> u64 {
        self.conflicts + self.lock_timeouts
    }

    /// Share of started transactions that finished without committing
    pub fn abort_rate(&self) -> f64 {
        if self.started == 0 {
            return 0.0;
        }
        self.total_aborted() as f64 / self.started as f64
    }
}
