//! Database struct and transaction API
//!
//! The Database owns the versioned store, the transaction coordinator and
//! the engine configuration.
//!
//! ## Transaction API
//!
//! 1. **Closure API**: `db.transaction(|txn| { ... })`
//!    - Automatic commit on success, abort on error
//!    - `transaction_with_retry` re-runs it on `ConcurrencyConflict`
//!
//! 2. **Attempt API**: `begin_transaction()` + `finish_attempt()`, wrapped
//!    in `retry_with()`
//!    - For callers that act on the outcome of each attempt, like
//!      `SpanStore` delivering or failing its notifications
//!
//! 3. **Manual API**: `begin_transaction()` + `commit_transaction()`

pub mod config;
mod transactions;

pub use config::{EngineConfig, CONFIG_FILE_NAME};
pub use transactions::RetryConfig;

use crate::coordinator::{TransactionCoordinator, TransactionMetrics};
use parking_lot::RwLock;
use spanline_concurrency::TransactionContext;
use spanline_core::{Error, Result, Storage};
use spanline_storage::UnifiedStore;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

// ============================================================================
// Database Struct
// ============================================================================

/// Main database struct with transaction support
///
/// Records live in memory. A database created with `from_config_dir` reads
/// its `spanline.toml` from that directory and writes config updates back.
///
/// # Example
///
/// ```text
/// use spanline_engine::Database;
///
/// let db = Database::ephemeral();
/// let version = db.transaction(|txn| {
///     txn.put(span.into())?;
///     Ok(())
/// })?;
/// ```
pub struct Database {
    /// Versioned record store (thread-safe)
    storage: Arc<UnifiedStore>,

    /// Transaction lifecycle, version allocation and metrics
    coordinator: TransactionCoordinator,

    /// Engine configuration (mirrors spanline.toml when loaded from a file)
    config: RwLock<EngineConfig>,

    /// Config file backing `config`, if any
    config_path: Option<PathBuf>,
}

impl Database {
    /// Create an in-memory database with the given configuration
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the configuration does not validate.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, None))
    }

    /// In-memory database with the default configuration
    pub fn ephemeral() -> Self {
        Self::build(EngineConfig::default(), None)
    }

    /// Database configured from `<dir>/spanline.toml`
    ///
    /// Creates the directory and a default config file if missing.
    pub fn from_config_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| {
            Error::Storage(format!(
                "failed to create config directory '{}': {}",
                dir.display(),
                e
            ))
        })?;
        let path = dir.join(CONFIG_FILE_NAME);
        EngineConfig::write_default_if_missing(&path)?;
        let config = EngineConfig::from_file(&path)?;
        info!(target: "spanline::txn", path = %path.display(), "loaded engine configuration");
        Ok(Self::build(config, Some(path)))
    }

    fn build(config: EngineConfig, config_path: Option<PathBuf>) -> Self {
        let storage = Arc::new(UnifiedStore::new());
        let coordinator =
            TransactionCoordinator::new(storage.current_version(), config.lock_timeout());
        Self {
            storage,
            coordinator,
            config: RwLock::new(config),
            config_path,
        }
    }

    /// Underlying store
    pub fn storage(&self) -> &Arc<UnifiedStore> {
        &self.storage
    }

    /// Current configuration (cloned)
    pub fn config(&self) -> EngineConfig {
        self.config.read().clone()
    }

    /// Retry schedule from the current configuration
    pub fn retry_config(&self) -> RetryConfig {
        self.config.read().retry
    }

    /// Path of the backing config file, if any
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Modify the configuration and persist it to the backing file
    ///
    /// `lock_timeout_ms` is fixed when the database is built; changing it here
    /// takes effect on the next `from_config_dir`. Policy changes apply to
    /// spans created afterwards.
    pub fn update_config<F: FnOnce(&mut EngineConfig)>(&self, f: F) -> Result<()> {
        let mut guard = self.config.write();
        let mut updated = guard.clone();
        f(&mut updated);
        updated.validate()?;
        if let Some(path) = &self.config_path {
            updated.write_to_file(path)?;
        }
        *guard = updated;
        Ok(())
    }

    /// Current committed version
    pub fn current_version(&self) -> u64 {
        self.coordinator.current_version()
    }

    /// Transaction statistics
    pub fn metrics(&self) -> TransactionMetrics {
        self.coordinator.metrics()
    }

    // ========================================================================
    // Transaction API
    // ========================================================================

    /// Commit `txn` if `result` is Ok; otherwise abort it and return the error
    ///
    /// Returns the value with its commit version. The building block of one
    /// transaction attempt for every caller, `SpanStore` included.
    pub fn finish_attempt<T>(
        &self,
        txn: &mut TransactionContext,
        result: Result<T>,
    ) -> Result<(T, u64)> {
        match result {
            Ok(value) => {
                let commit_version = self.commit_transaction(txn)?;
                Ok((value, commit_version))
            }
            Err(e) => {
                if let Err(abort) = self.coordinator.abort(txn, format!("closure error: {}", e)) {
                    warn!(
                        target: "spanline::txn",
                        txn_id = txn.txn_id,
                        error = %abort,
                        "abort after closure error failed"
                    );
                }
                Err(e)
            }
        }
    }

    /// Re-run `attempt` while it fails with a conflict and `config` allows
    ///
    /// Each call of `attempt` must begin and finish its own transaction.
    /// Errors a retry cannot fix, and the last conflict once retries are
    /// spent, are returned as they are.
    pub fn retry_with<T, A>(&self, config: RetryConfig, mut attempt: A) -> Result<T>
    where
        A: FnMut() -> Result<T>,
    {
        let mut retries = 0;
        loop {
            let e = match attempt() {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            let Some(delay) = config.next_delay(retries, &e) else {
                return Err(e);
            };
            debug!(
                target: "spanline::txn",
                attempt = retries + 1,
                delay_ms = delay.as_millis() as u64,
                error = %e,
                "retrying transaction after conflict"
            );
            std::thread::sleep(delay);
            retries += 1;
        }
    }

    /// Run `f` as one transaction: commit on success, abort on error
    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut TransactionContext) -> Result<T>,
    {
        let mut txn = self.begin_transaction();
        let result = f(&mut txn);
        self.finish_attempt(&mut txn, result).map(|(value, _)| value)
    }

    /// `transaction` re-run on conflict per `config`
    pub fn transaction_with_retry<F, T>(&self, config: RetryConfig, f: F) -> Result<T>
    where
        F: Fn(&mut TransactionContext) -> Result<T>,
    {
        self.retry_with(config, || self.transaction(&f))
    }

    /// Begin a new transaction (for manual control)
    ///
    /// The returned context must be passed to `commit_transaction()` or
    /// `abort_transaction()`.
    pub fn begin_transaction(&self) -> TransactionContext {
        self.coordinator.start_transaction(&self.storage)
    }

    /// Commit a transaction
    ///
    /// # Errors
    /// - `ConcurrencyConflict` - read-set conflict or span lock timeout
    /// - `Overlap` - the store's exclusion constraint refused the write-set
    /// - `TransactionNotActive` - transaction not in Active state
    pub fn commit_transaction(&self, txn: &mut TransactionContext) -> Result<u64> {
        self.coordinator.commit(txn, self.storage.as_ref())
    }

    /// Abort a transaction; nothing it buffered reaches the store
    pub fn abort_transaction(&self, txn: &mut TransactionContext, reason: &str) -> Result<()> {
        self.coordinator.abort(txn, reason.to_string())
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("version", &self.current_version())
            .field("config_path", &self.config_path)
            .field("metrics", &self.metrics())
            .finish_non_exhaustive()
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::ephemeral()
    }
}
