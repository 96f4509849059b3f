//! Transaction manager for coordinating commit operations
//!
//! Provides atomic commit by orchestrating:
//! 1. Span commit locks (bounded wait)
//! 2. Validation (first-committer-wins)
//! 3. Storage application (visibility)
//!
//! ## Commit Sequence
//!
//! ```text
//! 1. Lock every span the write-set touches, in SpanId order, each with a
//!    bounded wait; a timeout aborts with CommitError::LockTimeout
//! 2. validate the read-set; conflicts abort
//! 3. Allocate commit_version (increment global version)
//! 4. apply_writes() to storage as one batch; a refused batch aborts
//! 5. Release locks, return Ok(commit_version)
//! ```
//!
//! Commits touching disjoint span sets never wait for each other.

use crate::{CommitError, TransactionContext, TransactionStatus};
use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use spanline_core::{Result, SpanId, Storage};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default bounded wait for one span commit lock
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(50);

/// Manages transaction lifecycle and atomic commits
///
/// Global version counter is incremented once per committed transaction; all
/// records in a transaction get the same commit version.
pub struct TransactionManager {
    /// Global version counter
    version: AtomicU64,

    /// Next transaction ID
    next_txn_id: AtomicU64,

    /// Per-span commit locks
    ///
    /// Entries are created on first use and kept for the manager's lifetime.
    span_locks: DashMap<SpanId, Arc<Mutex<()>>>,

    /// Bounded wait for each span lock
    lock_timeout: Duration,
}

impl TransactionManager {
    /// Create a new transaction manager
    ///
    /// # Arguments
    /// * `initial_version` - Starting version (typically the store's current version)
    pub fn new(initial_version: u64) -> Self {
        Self::with_lock_timeout(initial_version, DEFAULT_LOCK_TIMEOUT)
    }

    /// Create a new transaction manager with a specific lock timeout
    pub fn with_lock_timeout(initial_version: u64, lock_timeout: Duration) -> Self {
        TransactionManager {
            version: AtomicU64::new(initial_version),
            next_txn_id: AtomicU64::new(1),
            span_locks: DashMap::new(),
            lock_timeout,
        }
    }

    /// Get current global version
    pub fn current_version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Allocate next transaction ID
    pub fn next_txn_id(&self) -> u64 {
        self.next_txn_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Allocate next commit version (increment global version)
    pub fn allocate_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Bounded wait used for span locks
    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// Number of spans that have a commit lock entry
    pub fn lock_count(&self) -> usize {
        self.span_locks.len()
    }

    fn span_lock(&self, span: SpanId) -> Arc<Mutex<()>> {
        Arc::clone(
            self.span_locks
                .entry(span)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }

    /// Commit a transaction atomically
    ///
    /// # Returns
    /// - Ok(commit_version) on success
    /// - Err(CommitError) if a lock times out, validation fails, or the
    ///   store refuses the write-set; the transaction is Aborted and storage
    ///   is unchanged in every error case
    pub fn commit<S: Storage + ?Sized>(
        &self,
        txn: &mut TransactionContext,
        store: &S,
    ) -> std::result::Result<u64, CommitError> {
        if !txn.is_active() {
            return Err(CommitError::InvalidState(format!(
                "Cannot commit transaction {} from {:?} state - must be Active",
                txn.txn_id, txn.status
            )));
        }

        // Step 1: span locks in id order (touched_spans is a BTreeSet)
        let spans = txn.touched_spans();
        let locks: Vec<(SpanId, Arc<Mutex<()>>)> =
            spans.iter().map(|s| (*s, self.span_lock(*s))).collect();
        let mut guards: Vec<MutexGuard<'_, ()>> = Vec::with_capacity(locks.len());
        for (span, lock) in &locks {
            match lock.try_lock_for(self.lock_timeout) {
                Some(guard) => guards.push(guard),
                None => {
                    warn!(
                        target: "spanline::txn",
                        txn_id = txn.txn_id,
                        span = %span,
                        timeout_ms = self.lock_timeout.as_millis() as u64,
                        "span commit lock timed out"
                    );
                    txn.status = TransactionStatus::Aborted {
                        reason: format!("commit lock on span {} timed out", span),
                    };
                    return Err(CommitError::LockTimeout { span: *span });
                }
            }
        }

        // Step 2: validate (Active → Validating → Committed | Aborted)
        txn.commit(store)?;

        if txn.is_read_only() {
            return Ok(self.current_version());
        }

        // Step 3: allocate commit version
        let commit_version = self.allocate_version();

        // Step 4: apply to storage
        if let Err(e) = txn.apply_writes(store, commit_version) {
            txn.status = TransactionStatus::Aborted {
                reason: format!("write-set rejected: {}", e),
            };
            return Err(CommitError::Rejected(e));
        }

        debug!(
            target: "spanline::txn",
            txn_id = txn.txn_id,
            commit_version,
            spans = spans.len(),
            writes = txn.write_count(),
            deletes = txn.delete_count(),
            "transaction applied"
        );

        drop(guards);
        Ok(commit_version)
    }

    /// Explicitly abort a transaction
    ///
    /// All buffered operations are discarded and nothing reaches storage.
    pub fn abort(&self, txn: &mut TransactionContext, reason: String) -> Result<()> {
        txn.mark_aborted(reason)
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new(0)
    }
}
