//! ClonedSnapshotView: snapshot implementation via deep clone
//!
//! Transactions read through a snapshot taken at begin time, so every read in
//! one transaction sees the same committed state.
//!
//! # Design Notes
//!
//! - **Deep clone**: the whole record map and owner index are copied
//! - **Immutable**: Once created, the snapshot never changes
//! - **Thread-safe**: Can be safely shared across threads (Arc-wrapped data)

use std::collections::BTreeMap;
use std::sync::Arc;

use spanline_core::{EntityKey, Key, Result, SegmentId, SnapshotView, SpanId, VersionedRecord};

use crate::index::OwnerIndex;

/// A snapshot view that clones the entire BTreeMap
///
/// # Example
///
/// ```ignore
/// let store = UnifiedStore::new();
/// // ... commit a span ...
/// let snapshot = store.create_snapshot();
///
/// // Commits after snapshot creation are not visible
/// store.apply_batch(vec![segment.into()], vec![], 2)?;
/// assert!(snapshot.get(&segment_key)?.is_none());
/// ```
#[derive(Debug, Clone)]
pub struct ClonedSnapshotView {
    /// The version at which this snapshot was created
    version: u64,
    /// Deep clone of the storage data at snapshot time
    data: Arc<BTreeMap<Key, VersionedRecord>>,
    /// Deep clone of the owner index at snapshot time
    owners: Arc<OwnerIndex>,
}

impl ClonedSnapshotView {
    /// Create a new ClonedSnapshotView from existing data
    ///
    /// This is typically called by `UnifiedStore::create_snapshot()`, not directly.
    pub fn new(version: u64, data: BTreeMap<Key, VersionedRecord>, owners: OwnerIndex) -> Self {
        Self {
            version,
            data: Arc::new(data),
            owners: Arc::new(owners),
        }
    }

    /// Empty snapshot at version 0
    pub fn empty() -> Self {
        Self::new(0, BTreeMap::new(), OwnerIndex::new())
    }

    /// Number of records in the snapshot
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the snapshot is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl SnapshotView for ClonedSnapshotView {
    fn get(&self, key: &Key) -> Result<Option<VersionedRecord>> {
        match self.data.get(key) {
            Some(v) if v.version <= self.version => Ok(Some(v.clone())),
            _ => Ok(None),
        }
    }

    fn scan_span(&self, span: SpanId) -> Result<Vec<(Key, VersionedRecord)>> {
        Ok(self
            .data
            .range(Key::span(span)..)
            .take_while(|(k, _)| k.span == span)
            .filter(|(_, v)| v.version <= self.version)
            .map(|(k, v)| (*k, v.clone()))
            .collect())
    }

    fn owner_of(&self, segment: SegmentId) -> Result<Option<SpanId>> {
        Ok(self.owners.get(&segment))
    }

    fn list_spans(&self) -> Result<Vec<SpanId>> {
        Ok(self
            .data
            .keys()
            .filter(|k| k.entity == EntityKey::Span)
            .map(|k| k.span)
            .collect())
    }

    fn version(&self) -> u64 {
        self.version
    }
}
