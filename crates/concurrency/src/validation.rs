//! Read-set validation
//!
//! A transaction commits only if nothing it read has changed since. Every
//! span mutation rewrites the span header (its `revision` moves), so two
//! transactions mutating the same span always fail here. Blind writes are
//! not checked and read-only transactions always pass.

use crate::transaction::TransactionContext;
use spanline_core::{Error, Key, Result, SpanId, Storage};
use std::collections::{BTreeSet, HashMap};

/// A record that changed between the transaction's read and its commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaleRead {
    /// Record that moved
    pub key: Key,
    /// Version seen by the transaction, 0 when it saw nothing
    pub read_version: u64,
    /// Version in storage at commit, 0 when the record is gone
    pub current_version: u64,
}

/// Stale reads found while validating one transaction, ordered by key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    /// Every stale read, empty when the transaction may commit
    pub stale: Vec<StaleRead>,
}

impl ValidationResult {
    /// Whether the transaction may commit
    pub fn is_valid(&self) -> bool {
        self.stale.is_empty()
    }

    /// Number of stale reads
    pub fn len(&self) -> usize {
        self.stale.len()
    }

    /// Whether there are no stale reads
    pub fn is_empty(&self) -> bool {
        self.stale.is_empty()
    }

    /// Spans owning a stale record
    pub fn spans(&self) -> BTreeSet<SpanId> {
        self.stale.iter().map(|s| s.key.span).collect()
    }
}

impl std::fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} stale read(s) on span(s)", self.len())?;
        for span in self.spans() {
            write!(f, " {}", span)?;
        }
        Ok(())
    }
}

/// Compare every recorded read version with storage
///
/// # Errors
///
/// `Error::Storage` if storage cannot be read. Validation stops there so a
/// half-checked transaction never commits.
pub fn validate_read_set<S: Storage + ?Sized>(
    read_set: &HashMap<Key, u64>,
    store: &S,
) -> Result<ValidationResult> {
    let mut stale = Vec::new();
    for (&key, &read_version) in read_set {
        let current_version = store
            .get(&key)
            .map_err(|e| Error::Storage(format!("validating read of {}: {}", key, e)))?
            .map_or(0, |vr| vr.version);
        if current_version != read_version {
            stale.push(StaleRead {
                key,
                read_version,
                current_version,
            });
        }
    }
    stale.sort_by_key(|s| s.key);
    Ok(ValidationResult { stale })
}

/// Validate a transaction about to commit
pub fn validate_transaction<S: Storage + ?Sized>(
    txn: &TransactionContext,
    store: &S,
) -> Result<ValidationResult> {
    if txn.is_read_only() {
        return Ok(ValidationResult::default());
    }
    validate_read_set(&txn.read_set, store)
}
