//! Concurrency layer for spanline
//!
//! This crate implements optimistic concurrency control (OCC) with:
//! - TransactionContext: Read/write set tracking with read-your-writes
//! - Snapshot isolation
//! - Conflict detection at commit time (first-committer-wins)
//! - Per-span commit locks with a bounded wait
//!
//! Transactions on different spans never contend. Transactions on the same
//! span are serialized: the second committer either waits briefly for the
//! span lock or fails validation, and the engine retries it.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod manager;
pub mod transaction;
pub mod validation;

pub use manager::{TransactionManager, DEFAULT_LOCK_TIMEOUT};
pub use transaction::{CommitError, TransactionContext, TransactionStatus};
pub use validation::{validate_read_set, validate_transaction, StaleRead, ValidationResult};
