//! Retry policy for transactions that lose a commit race

use serde::{Deserialize, Serialize};
use spanline_core::{Error, Result};
use std::time::Duration;

/// How often, and how patiently, a conflicting transaction is re-run
///
/// Read from the `[retry]` table of `spanline.toml`. Only
/// `ConcurrencyConflict` is retried: a chain that fails validation fails
/// the same way on every attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Re-runs after the first attempt; 0 disables retrying
    pub max_retries: usize,
    /// Wait before the first re-run, doubled on each later one
    pub base_delay_ms: u64,
    /// Ceiling for the doubled wait
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 10,
            max_delay_ms: 100,
        }
    }
}

impl RetryConfig {
    /// Single attempt, conflicts surface immediately
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Replace the retry count
    pub fn with_max_retries(self, max_retries: usize) -> Self {
        Self {
            max_retries,
            ..self
        }
    }

    /// Replace the initial wait
    pub fn with_base_delay_ms(self, base_delay_ms: u64) -> Self {
        Self {
            base_delay_ms,
            ..self
        }
    }

    /// Replace the wait ceiling
    pub fn with_max_delay_ms(self, max_delay_ms: u64) -> Self {
        Self {
            max_delay_ms,
            ..self
        }
    }

    /// Reject a ceiling below the initial wait
    pub fn validate(&self) -> Result<()> {
        if self.max_delay_ms < self.base_delay_ms {
            return Err(Error::invalid_config(format!(
                "retry.max_delay_ms ({}) is below retry.base_delay_ms ({})",
                self.max_delay_ms, self.base_delay_ms
            )));
        }
        Ok(())
    }

    /// Wait before re-running after `error` ended attempt number `attempt`
    ///
    /// `None` means give up and return `error`: it is not a conflict, or
    /// the retries are spent.
    pub fn next_delay(&self, attempt: usize, error: &Error) -> Option<Duration> {
        if !error.is_retryable() || attempt >= self.max_retries {
            return None;
        }
        let factor = 1u64.checked_shl(attempt as u32).unwrap_or(u64::MAX);
        let wait = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Some(Duration::from_millis(wait))
    }
}
