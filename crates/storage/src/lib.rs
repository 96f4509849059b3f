//! Storage layer for spanline
//!
//! This crate implements the record store backend with:
//! - UnifiedStore: BTreeMap-based storage with RwLock
//! - OwnerIndex: SegmentId → SpanId secondary index
//! - Range-exclusion constraint checked on every batch
//! - Version management with AtomicU64
//! - ClonedSnapshotView implementation

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod exclusion;
pub mod index;
pub mod snapshot;
pub mod unified;

pub use exclusion::check_exclusion;
pub use index::OwnerIndex;
pub use snapshot::ClonedSnapshotView;
pub use unified::UnifiedStore;
