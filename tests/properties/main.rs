//! Property tests: chain invariants hold after any sequence of operations

#[path = "../common/mod.rs"]
mod common;

mod invariants;
mod round_trips;
