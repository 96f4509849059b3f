//! Engine configuration via `spanline.toml`
//!
//! A config file holds the retry schedule, the span lock wait, whether
//! zero-width ranges are legal, and the policy overrides per span kind.
//! Every field is optional; a missing field takes its default.

use crate::database::transactions::RetryConfig;
use serde::{Deserialize, Serialize};
use spanline_core::{Error, PolicyRegistry, Result};
use std::path::Path;
use std::time::Duration;

/// Config file name
pub const CONFIG_FILE_NAME: &str = "spanline.toml";

fn default_lock_timeout_ms() -> u64 {
    50
}

/// Engine configuration loaded from `spanline.toml`.
///
/// # Example
///
/// ```toml
/// lock_timeout_ms = 50
/// allow_empty_ranges = false
///
/// [retry]
/// max_retries = 3
///
/// [policy.default]
/// soft_delete = true
///
/// [policy.kinds.rental]
/// allow_segment_gaps = false
/// previous_on_delete = "relink"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Bounded wait for one span commit lock, in milliseconds
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    /// Whether spans and segments may have `lower == upper`
    #[serde(default)]
    pub allow_empty_ranges: bool,
    /// Conflict retry schedule
    #[serde(default)]
    pub retry: RetryConfig,
    /// Policy overrides: `[policy.default]` and `[policy.kinds.<kind>]`
    #[serde(default)]
    pub policy: PolicyRegistry,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
            allow_empty_ranges: false,
            retry: RetryConfig::default(),
            policy: PolicyRegistry::default(),
        }
    }
}

impl EngineConfig {
    /// Span commit lock wait as a `Duration`
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Check values serde cannot check
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for a zero lock wait or a max delay below the base delay.
    pub fn validate(&self) -> Result<()> {
        if self.lock_timeout_ms == 0 {
            return Err(Error::invalid_config(
                "lock_timeout_ms must be greater than zero",
            ));
        }
        self.retry.validate()
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Spanline engine configuration
#
# Bounded wait for a span commit lock, in milliseconds. A commit that cannot
# lock every span it touches within this wait fails with a concurrency
# conflict and is retried.
lock_timeout_ms = 50

# Allow zero-width ranges (lower == upper) for spans and segments.
allow_empty_ranges = false

# Conflict retry schedule (exponential backoff, capped at max_delay_ms).
[retry]
max_retries = 3
base_delay_ms = 10
max_delay_ms = 100

# Policy applied to every new span, before any per-kind override.
# Options: allow_span_gaps, allow_segment_gaps, soft_delete,
# sticky_boundaries, previous_on_delete ("cascade" | "relink"),
# segment_soft_delete.
[policy.default]

# Per-kind overrides, e.g.
# [policy.kinds.rental]
# allow_segment_gaps = false
# previous_on_delete = "relink"
"#
    }

    /// Parse and validate config from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)
            .map_err(|e| Error::invalid_config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::invalid_config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            Error::InvalidConfig(msg) => {
                Error::InvalidConfig(format!("{} ({})", msg, path.display()))
            }
            other => other,
        })
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::Storage(format!(
                    "failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::invalid_config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::Storage(format!(
                "failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
