//! Core traits for storage and snapshot abstraction
//!
//! This module defines the Storage and SnapshotView traits that let the
//! concurrency and engine layers run against any record store that offers
//! versioned reads and atomic batch application.

use crate::entity::{Record, VersionedRecord};
use crate::error::Result;
use crate::types::{Key, SegmentId, SpanId};

/// Storage abstraction for the record store
///
/// Thread safety: All methods must be safe to call concurrently from
/// multiple threads (requires Send + Sync).
pub trait Storage: Send + Sync {
    /// Get the latest record for key
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn get(&self, key: &Key) -> Result<Option<VersionedRecord>>;

    /// All records of one span, span header first, segments in key order
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn scan_span(&self, span: SpanId) -> Result<Vec<(Key, VersionedRecord)>>;

    /// Owning span of a segment, if the segment is stored
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn owner_of(&self, segment: SegmentId) -> Result<Option<SpanId>>;

    /// Ids of every stored span, in id order
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn list_spans(&self) -> Result<Vec<SpanId>>;

    /// Get current global version
    ///
    /// Returns the highest commit version applied so far.
    fn current_version(&self) -> u64;

    /// Apply one transaction's writes and deletes atomically at `version`
    ///
    /// Either every write and delete is applied or none is. Implementations
    /// may refuse a batch that violates a store-level constraint.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch is refused or the operation fails.
    fn apply_batch(&self, writes: Vec<Record>, deletes: Vec<Key>, version: u64) -> Result<()>;
}

/// Snapshot view abstraction for snapshot isolation
///
/// Provides a read view of storage frozen at one version.
///
/// Thread safety: Must be safe to pass between threads (Send + Sync).
pub trait SnapshotView: Send + Sync {
    /// Get record from snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn get(&self, key: &Key) -> Result<Option<VersionedRecord>>;

    /// All records of one span as of the snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn scan_span(&self, span: SpanId) -> Result<Vec<(Key, VersionedRecord)>>;

    /// Owning span of a segment as of the snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn owner_of(&self, segment: SegmentId) -> Result<Option<SpanId>>;

    /// Ids of every span in the snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn list_spans(&self) -> Result<Vec<SpanId>>;

    /// Get snapshot version
    fn version(&self) -> u64;
}
