//! Concurrent span operations across threads
//!
//! - Writers on one span conflict and retry until all commit
//! - Writers on different spans never conflict
//! - Listeners only ever see the final attempt succeed

#[path = "../common/mod.rs"]
mod common;

mod same_span;
mod separate_spans;
