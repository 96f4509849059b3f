//! Primitives layer for spanline
//!
//! Provides the interval engine as a stateless facade over the Database:
//! - **SegmentChain**: a span with its ordered segments and the invariant check
//! - **Propagation**: sticky boundary planning, applied all-or-nothing
//! - **SpanTransaction**: mutation operations inside one transaction
//! - **SpanStore**: single-operation API, retry on conflict, listeners
//! - **Hooks**: lifecycle notifications with nested per-entity events
//!
//! ## Design Principle: Validate Once
//!
//! Operations build the complete proposed state of a span on a copy of its
//! chain, then validate the whole chain a single time. Nothing is written
//! unless the final state holds every invariant, so intermediate states
//! during propagation never cause false rejections.
//!
//! ## Multi-Operation Transactions
//!
//! ```rust,ignore
//! use spanline_primitives::SpanStore;
//!
//! store.transaction(|tx| {
//!     let (a, b) = tx.split_segment(segment, 50)?;
//!     tx.resize_segment(b.id, RangeValue::new(50, 80)?)?;
//!     Ok(())
//! })?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chain;
pub mod hooks;
pub mod propagation;
pub mod segment_ops;
pub mod span_ops;
pub mod span_store;
mod staging;
pub mod txn;

pub use chain::SegmentChain;
pub use hooks::{
    Listener, ListenerFilter, ListenerId, ListenerRegistry, Notification, OperationKind, Phase,
};
pub use propagation::{plan_segment_resize, plan_span_resize, BoundaryMove, PropagationPlan};
pub use segment_ops::{DeleteOptions, GapHeal};
pub use span_ops::{AppendTo, Extent};
pub use span_store::SpanStore;
pub use txn::SpanTransaction;
