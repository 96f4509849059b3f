//! Database engine for spanline
//!
//! This crate orchestrates the lower layers:
//! - Database: versioned store, transaction API, configuration
//! - Transaction coordination and metrics
//! - Conflict retry with exponential backoff
//!
//! The interval operations themselves live in `spanline-primitives` and run
//! inside the transactions this crate hands out.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod coordinator;
pub mod database;

pub use coordinator::{TransactionCoordinator, TransactionMetrics};
pub use database::{Database, EngineConfig, RetryConfig, CONFIG_FILE_NAME};
