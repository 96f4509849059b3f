//! UnifiedStore: in-memory record store with version management
//!
//! This module implements the Storage trait using:
//! - `BTreeMap<Key, VersionedRecord>` for ordered storage; a span header and
//!   its segments are contiguous in key order
//! - `parking_lot::RwLock` for thread-safe access
//! - `AtomicU64` for monotonically increasing commit versions
//! - `OwnerIndex` for resolving a bare `SegmentId` to its span
//!
//! # Design Notes
//!
//! - **No version history**: Each key stores only its latest record
//! - **Batch atomicity**: `apply_batch` checks and applies a whole write-set
//!   under one write lock; a refused batch leaves the store untouched
//! - **Range exclusion**: every span touched by a batch is re-checked for
//!   overlapping active segments before anything is applied

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

use spanline_core::{
    EntityKey, Error, Key, Record, Result, Segment, SegmentId, SpanId, Storage, VersionedRecord,
};

use crate::exclusion::check_exclusion;
use crate::index::OwnerIndex;
use crate::snapshot::ClonedSnapshotView;

/// Unified storage backend using BTreeMap with RwLock
///
/// Thread-safe through `parking_lot::RwLock` and `AtomicU64`. The owner index
/// is updated within the same write lock as the main data.
#[derive(Debug)]
pub struct UnifiedStore {
    /// The main data store: ordered map from Key to VersionedRecord
    data: Arc<RwLock<StoreState>>,
    /// Global version counter for monotonically increasing versions
    version: AtomicU64,
}

#[derive(Debug, Default, Clone)]
struct StoreState {
    records: BTreeMap<Key, VersionedRecord>,
    owners: OwnerIndex,
}

impl StoreState {
    fn span_rows(&self, span: SpanId) -> impl Iterator<Item = (&Key, &VersionedRecord)> {
        self.records
            .range(Key::span(span)..)
            .take_while(move |(k, _)| k.span == span)
    }
}

impl UnifiedStore {
    /// Create a new empty UnifiedStore
    ///
    /// Initial version is 0 (no writes have occurred).
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(StoreState::default())),
            version: AtomicU64::new(0),
        }
    }

    /// Allocate the next version atomically
    pub fn next_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Number of stored records (span headers and segments)
    pub fn len(&self) -> usize {
        self.data.read().records.len()
    }

    /// Check if the store holds no records
    pub fn is_empty(&self) -> bool {
        self.data.read().records.is_empty()
    }

    /// Create a snapshot of the current state
    ///
    /// Deep clones the map. The snapshot is immutable and never observes
    /// later commits.
    pub fn create_snapshot(&self) -> ClonedSnapshotView {
        // Read lock before reading the version: a commit that finishes between
        // the two would otherwise leave records newer than the snapshot version.
        let state = self.data.read();
        let version = self.current_version();
        ClonedSnapshotView::new(version, state.records.clone(), state.owners.clone())
    }

    /// Check a batch against the current state without applying it
    fn check_batch(state: &StoreState, writes: &[Record], deletes: &[Key]) -> Result<()> {
        let mut touched: BTreeSet<SpanId> = BTreeSet::new();
        for record in writes {
            if let Record::Segment(seg) = record {
                if let Some(owner) = state.owners.get(&seg.id) {
                    if owner != seg.span {
                        return Err(Error::Storage(format!(
                            "segment {} already belongs to span {}",
                            seg.id, owner
                        )));
                    }
                }
                touched.insert(seg.span);
            }
        }
        for key in deletes {
            if key.segment_id().is_some() {
                touched.insert(key.span);
            }
        }

        for span in touched {
            // Post-batch segment set for this span
            let mut segments: BTreeMap<SegmentId, &Segment> = state
                .span_rows(span)
                .filter_map(|(_, v)| v.record.as_segment())
                .map(|s| (s.id, s))
                .collect();
            for key in deletes.iter().filter(|k| k.span == span) {
                if let EntityKey::Segment(id) = key.entity {
                    segments.remove(&id);
                }
            }
            for seg in writes.iter().filter_map(Record::as_segment) {
                if seg.span == span {
                    segments.insert(seg.id, seg);
                }
            }
            check_exclusion(segments.values().copied())?;
        }
        Ok(())
    }

    fn apply_locked(state: &mut StoreState, writes: Vec<Record>, deletes: Vec<Key>, version: u64) {
        for record in writes {
            let key = record.key();
            if let Some(seg) = key.segment_id() {
                state.owners.insert(seg, key.span);
            }
            state.records.insert(key, VersionedRecord::new(record, version));
        }
        for key in deletes {
            if state.records.remove(&key).is_some() {
                if let Some(seg) = key.segment_id() {
                    state.owners.remove(&seg);
                }
            }
        }
    }
}

impl Default for UnifiedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for UnifiedStore {
    fn get(&self, key: &Key) -> Result<Option<VersionedRecord>> {
        Ok(self.data.read().records.get(key).cloned())
    }

    fn scan_span(&self, span: SpanId) -> Result<Vec<(Key, VersionedRecord)>> {
        let state = self.data.read();
        Ok(state
            .span_rows(span)
            .map(|(k, v)| (*k, v.clone()))
            .collect())
    }

    fn owner_of(&self, segment: SegmentId) -> Result<Option<SpanId>> {
        Ok(self.data.read().owners.get(&segment))
    }

    fn list_spans(&self) -> Result<Vec<SpanId>> {
        let state = self.data.read();
        Ok(state
            .records
            .keys()
            .filter(|k| k.entity == EntityKey::Span)
            .map(|k| k.span)
            .collect())
    }

    fn current_version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Apply a batch of writes and deletes atomically
    ///
    /// Holds the write lock for the check and for every write and delete, so
    /// no snapshot can see a partial batch.
    fn apply_batch(&self, writes: Vec<Record>, deletes: Vec<Key>, version: u64) -> Result<()> {
        let mut state = self.data.write();

        if let Err(e) = Self::check_batch(&state, &writes, &deletes) {
            warn!(
                target: "spanline::storage",
                version,
                error = %e,
                "batch refused by store constraint"
            );
            return Err(e);
        }

        Self::apply_locked(&mut state, writes, deletes, version);

        // Keep current_version() at the max applied version
        self.version.fetch_max(version, Ordering::SeqCst);
        Ok(())
    }
}
