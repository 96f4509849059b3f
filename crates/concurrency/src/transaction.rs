//! Transaction context for OCC
//!
//! TransactionContext tracks all reads, writes and deletes of one unit of
//! work, enabling validation at commit time. Reads come from a snapshot taken
//! at begin; writes are buffered and become visible to other transactions only
//! when the whole set is applied at commit.

use crate::validation::{validate_transaction, ValidationResult};
use spanline_core::{
    EntityKey, Error, Key, Record, Result, SegmentId, SnapshotView, SpanId, Storage,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Error type for commit failures
///
/// - All-or-nothing commit: transaction either commits or aborts entirely
/// - First-committer-wins: conflicts are detected based on read-set
#[derive(Debug, Clone)]
pub enum CommitError {
    /// Transaction aborted due to validation conflicts
    ValidationFailed(ValidationResult),

    /// Transaction was not in correct state for commit
    InvalidState(String),

    /// A span commit lock could not be acquired within the bounded wait
    LockTimeout {
        /// Span whose lock timed out
        span: SpanId,
    },

    /// Storage refused the write-set (constraint violation or storage failure)
    Rejected(Error),
}

impl std::fmt::Display for CommitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommitError::ValidationFailed(result) => {
                write!(f, "Commit failed: {}", result)
            }
            CommitError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            CommitError::LockTimeout { span } => {
                write!(f, "Timed out waiting for commit lock on span {}", span)
            }
            CommitError::Rejected(e) => write!(f, "Write-set rejected: {}", e),
        }
    }
}

impl std::error::Error for CommitError {}

// Conversion to the crate-wide error
impl From<CommitError> for Error {
    fn from(e: CommitError) -> Self {
        match e {
            CommitError::ValidationFailed(result) => {
                Error::conflict(format!("validation failed: {}", result))
            }
            CommitError::InvalidState(msg) => Error::TransactionNotActive { state: msg },
            CommitError::LockTimeout { span } => {
                Error::conflict(format!("commit lock on span {} timed out", span))
            }
            CommitError::Rejected(e) => e,
        }
    }
}

/// Status of a transaction in its lifecycle
///
/// State transitions:
/// - `Active` → `Validating` (begin commit)
/// - `Validating` → `Committed` (validation passed)
/// - `Validating` → `Aborted` (conflict detected)
/// - `Active` → `Aborted` (user abort or error)
///
/// Terminal states (no transitions allowed):
/// - `Committed`
/// - `Aborted`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Transaction is executing, can read/write
    Active,
    /// Transaction is being validated for conflicts
    Validating,
    /// Transaction committed successfully
    Committed,
    /// Transaction was aborted
    Aborted {
        /// Human-readable reason for abort
        reason: String,
    },
}

/// Transaction context for OCC
///
/// # Lifecycle
///
/// 1. **BEGIN**: Create with `with_snapshot()`, status is `Active`
/// 2. **READ/WRITE**: Use `get()`, `scan_span()`, `put()`, `delete()`
/// 3. **VALIDATE**: `commit()` checks the read-set against storage
/// 4. **APPLY**: `apply_writes()` hands the write-set to storage as one batch
pub struct TransactionContext {
    /// Unique transaction ID
    pub txn_id: u64,

    /// Version at transaction start (snapshot version)
    pub start_version: u64,

    /// Snapshot view for this transaction
    snapshot: Option<Box<dyn SnapshotView>>,

    /// Keys read and their versions (for validation)
    ///
    /// Version 0 means the key did not exist when read.
    pub read_set: HashMap<Key, u64>,

    /// Records written (buffered), ordered by key
    pub write_set: BTreeMap<Key, Record>,

    /// Keys to delete (buffered)
    pub delete_set: BTreeSet<Key>,

    /// Current transaction status
    pub status: TransactionStatus,

}

impl TransactionContext {
    /// Create a new transaction context without a snapshot
    ///
    /// Primarily for testing or for write-only transactions.
    ///
    /// # Example
    ///
    /// ```
    /// use spanline_concurrency::TransactionContext;
    ///
    /// let txn = TransactionContext::new(1, 100);
    /// assert!(txn.is_active());
    /// ```
    pub fn new(txn_id: u64, start_version: u64) -> Self {
        TransactionContext {
            txn_id,
            start_version,
            snapshot: None,
            read_set: HashMap::new(),
            write_set: BTreeMap::new(),
            delete_set: BTreeSet::new(),
            status: TransactionStatus::Active,
        }
    }

    /// Create a new transaction context with a snapshot
    ///
    /// The snapshot provides a consistent point-in-time view for every read.
    pub fn with_snapshot(txn_id: u64, snapshot: Box<dyn SnapshotView>) -> Self {
        let start_version = snapshot.version();
        let mut txn = Self::new(txn_id, start_version);
        txn.snapshot = Some(snapshot);
        txn
    }

    fn snapshot(&self) -> Result<&dyn SnapshotView> {
        self.snapshot
            .as_deref()
            .ok_or_else(|| Error::Storage("transaction has no snapshot for reads".to_string()))
    }

    // === Read Operations ===

    /// Get a record from the transaction
    ///
    /// Read-your-writes:
    /// 1. write_set (no read_set entry)
    /// 2. delete_set (no read_set entry)
    /// 3. snapshot (tracked in read_set; absent keys tracked as version 0)
    pub fn get(&mut self, key: &Key) -> Result<Option<Record>> {
        self.ensure_active()?;

        if let Some(record) = self.write_set.get(key) {
            return Ok(Some(record.clone()));
        }
        if self.delete_set.contains(key) {
            return Ok(None);
        }

        let versioned = self.snapshot()?.get(key)?;
        match versioned {
            Some(vr) => {
                self.read_set.insert(*key, vr.version);
                Ok(Some(vr.record))
            }
            None => {
                self.read_set.insert(*key, 0);
                Ok(None)
            }
        }
    }

    /// All records of one span in key order, with read-your-writes
    ///
    /// The span header (if present) comes first. Snapshot rows are tracked in
    /// the read_set; the header key is tracked even when absent.
    pub fn scan_span(&mut self, span: SpanId) -> Result<Vec<Record>> {
        self.ensure_active()?;

        let rows = self.snapshot()?.scan_span(span)?;
        let mut results: BTreeMap<Key, Record> = BTreeMap::new();

        let header = Key::span(span);
        if !rows.iter().any(|(k, _)| *k == header) {
            self.read_set.entry(header).or_insert(0);
        }
        for (key, vr) in rows {
            if !self.delete_set.contains(&key) {
                self.read_set.insert(key, vr.version);
                results.insert(key, vr.record);
            }
        }

        for (key, record) in self
            .write_set
            .range(Key::span(span)..)
            .take_while(|(k, _)| k.span == span)
        {
            results.insert(*key, record.clone());
        }

        Ok(results.into_values().collect())
    }

    /// Owning span of a segment as seen by this transaction
    pub fn owner_of(&mut self, segment: SegmentId) -> Result<Option<SpanId>> {
        self.ensure_active()?;

        if let Some(key) = self
            .write_set
            .keys()
            .find(|k| k.entity == EntityKey::Segment(segment))
        {
            return Ok(Some(key.span));
        }
        let owner = self.snapshot()?.owner_of(segment)?;
        match owner {
            Some(span) if !self.delete_set.contains(&Key::segment(span, segment)) => Ok(Some(span)),
            _ => Ok(None),
        }
    }

    /// Ids of every span visible to this transaction
    pub fn list_spans(&mut self) -> Result<Vec<SpanId>> {
        self.ensure_active()?;

        let mut spans: BTreeSet<SpanId> = self.snapshot()?.list_spans()?.into_iter().collect();
        for key in &self.delete_set {
            if key.entity == EntityKey::Span {
                spans.remove(&key.span);
            }
        }
        for key in self.write_set.keys() {
            if key.entity == EntityKey::Span {
                spans.insert(key.span);
            }
        }
        Ok(spans.into_iter().collect())
    }

    /// Get the version that was read for a key (from read_set)
    pub fn get_read_version(&self, key: &Key) -> Option<u64> {
        self.read_set.get(key).copied()
    }

    // === Write Operations ===

    /// Buffer a write of `record` under its own key
    pub fn put(&mut self, record: Record) -> Result<()> {
        self.ensure_active()?;

        let key = record.key();
        self.delete_set.remove(&key);
        self.write_set.insert(key, record);
        Ok(())
    }

    /// Buffer a delete
    pub fn delete(&mut self, key: Key) -> Result<()> {
        self.ensure_active()?;

        self.write_set.remove(&key);
        self.delete_set.insert(key);
        Ok(())
    }

    /// Spans with buffered writes or deletes, in id order
    pub fn touched_spans(&self) -> BTreeSet<SpanId> {
        self.write_set
            .keys()
            .chain(self.delete_set.iter())
            .map(|k| k.span)
            .collect()
    }

    // === State Management ===

    /// Check if transaction is in Active state
    pub fn is_active(&self) -> bool {
        matches!(self.status, TransactionStatus::Active)
    }

    /// Check if transaction is committed
    pub fn is_committed(&self) -> bool {
        matches!(self.status, TransactionStatus::Committed)
    }

    /// Check if transaction is aborted
    pub fn is_aborted(&self) -> bool {
        matches!(self.status, TransactionStatus::Aborted { .. })
    }

    /// Check if transaction can accept operations
    ///
    /// # Errors
    /// Returns `Error::TransactionNotActive` if not in `Active` state.
    pub fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Error::TransactionNotActive {
                state: format!("transaction {} is {:?}", self.txn_id, self.status),
            })
        }
    }

    /// Abort the transaction and discard buffered operations
    ///
    /// # Errors
    /// Returns `Error::TransactionNotActive` if already `Committed` or `Aborted`.
    pub fn mark_aborted(&mut self, reason: String) -> Result<()> {
        match &self.status {
            TransactionStatus::Committed | TransactionStatus::Aborted { .. } => {
                Err(Error::TransactionNotActive {
                    state: format!(
                        "cannot abort transaction {} from {:?}",
                        self.txn_id, self.status
                    ),
                })
            }
            _ => {
                self.status = TransactionStatus::Aborted { reason };
                self.write_set.clear();
                self.delete_set.clear();
                // read_set is kept for diagnostics
                Ok(())
            }
        }
    }

    // === Commit Operation ===

    /// Validate and transition to Committed (or Aborted)
    ///
    /// Performs validation and state transitions only; writes are applied by
    /// `apply_writes`. Callers serialize this with other commits touching the
    /// same spans (see `TransactionManager`).
    pub fn commit<S: Storage + ?Sized>(
        &mut self,
        store: &S,
    ) -> std::result::Result<(), CommitError> {
        if !self.is_active() {
            return Err(CommitError::InvalidState(format!(
                "Cannot commit transaction {} from {:?} state - must be Active",
                self.txn_id, self.status
            )));
        }
        self.status = TransactionStatus::Validating;

        let validation_result = match validate_transaction(self, store) {
            Ok(result) => result,
            Err(e) => {
                self.status = TransactionStatus::Aborted {
                    reason: format!("Validation error: {}", e),
                };
                return Err(CommitError::Rejected(e));
            }
        };

        if !validation_result.is_valid() {
            self.status = TransactionStatus::Aborted {
                reason: format!("Commit failed: {}", validation_result),
            };
            return Err(CommitError::ValidationFailed(validation_result));
        }

        self.status = TransactionStatus::Committed;
        Ok(())
    }

    /// Apply all buffered writes to storage as one batch
    ///
    /// All records in the batch get the same commit version.
    ///
    /// # Errors
    /// - `TransactionNotActive` if the transaction is not Committed
    /// - whatever the store reports if it refuses the batch
    pub fn apply_writes<S: Storage + ?Sized>(&self, store: &S, commit_version: u64) -> Result<()> {
        if !self.is_committed() {
            return Err(Error::TransactionNotActive {
                state: format!(
                    "cannot apply writes: transaction {} is {:?}, must be Committed",
                    self.txn_id, self.status
                ),
            });
        }
        store.apply_batch(
            self.write_set.values().cloned().collect(),
            self.delete_set.iter().copied().collect(),
            commit_version,
        )
    }

    /// Number of keys read from the snapshot
    pub fn read_count(&self) -> usize {
        self.read_set.len()
    }

    /// Number of buffered writes
    pub fn write_count(&self) -> usize {
        self.write_set.len()
    }

    /// Number of buffered deletes
    pub fn delete_count(&self) -> usize {
        self.delete_set.len()
    }

    /// Check if the transaction has buffered writes or deletes
    pub fn has_pending_operations(&self) -> bool {
        !self.write_set.is_empty() || !self.delete_set.is_empty()
    }

    /// Check if the transaction is read-only
    pub fn is_read_only(&self) -> bool {
        !self.has_pending_operations()
    }

    /// Abort reason, if aborted
    pub fn abort_reason(&self) -> Option<&str> {
        match &self.status {
            TransactionStatus::Aborted { reason } => Some(reason),
            _ => None,
        }
    }
}

impl std::fmt::Debug for TransactionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionContext")
            .field("txn_id", &self.txn_id)
            .field("start_version", &self.start_version)
            .field("status", &self.status)
            .field("reads", &self.read_set.len())
            .field("writes", &self.write_set.len())
            .field("deletes", &self.delete_set.len())
            .finish()
    }
}
