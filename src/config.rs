//! Configuration for blobfs
//!
//! Centralized configuration with sensible defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{BlobError, Result};

/// Configuration for one opened store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Backing file of the store. Sibling files are derived from it:
    ///   {path}        (SQLite database)
    ///   {path}.lock   (cross-process lock)
    ///   {path}.sql    (text dump)
    pub path: PathBuf,

    /// Compress payloads of records built through `Store::create`
    pub compress: bool,

    /// Open without write access; the store must already exist
    ///
    /// Only the database is opened read-only. Locking still opens (and if
    /// missing, creates) `{path}.lock` for writing, so the directory must be
    /// writable even for a read-only store.
    pub read_only: bool,

    /// Reserved for payload encryption. Stored but not acted on.
    pub encrypt_passphrase: Option<String>,

    // -------------------------------------------------------------------------
    // Locking Configuration
    // -------------------------------------------------------------------------
    /// Give up acquiring the store lock after this long
    pub lock_timeout: Duration,

    /// Sleep between lock attempts
    pub lock_poll_interval: Duration,

    /// How long SQLite itself waits on its own file locks
    pub busy_timeout: Duration,
}

impl StoreConfig {
    /// Create a config for `path` with default settings
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            compress: false,
            read_only: false,
            encrypt_passphrase: None,
            lock_timeout: Duration::from_secs(30),
            lock_poll_interval: Duration::from_millis(1),
            busy_timeout: Duration::from_secs(5),
        }
    }

    /// Create a new config builder
    pub fn builder(path: impl Into<PathBuf>) -> StoreConfigBuilder {
        StoreConfigBuilder {
            config: Self::new(path),
        }
    }

    /// Path of the lock file guarding this store
    pub fn lock_path(&self) -> PathBuf {
        sibling(&self.path, "lock")
    }

    /// Path the text dump is written to
    pub fn dump_path(&self) -> PathBuf {
        sibling(&self.path, "sql")
    }

    /// Check the settings once, before anything touches the filesystem
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(BlobError::InvalidArgument(
                "store must have a path".to_string(),
            ));
        }
        if self.lock_poll_interval.is_zero() {
            return Err(BlobError::InvalidArgument(
                "lock_poll_interval must be non-zero".to_string(),
            ));
        }
        if self.lock_poll_interval > self.lock_timeout {
            return Err(BlobError::InvalidArgument(format!(
                "lock_poll_interval {:?} exceeds lock_timeout {:?}",
                self.lock_poll_interval, self.lock_timeout
            )));
        }
        if self.read_only && !self.path.exists() {
            return Err(BlobError::InvalidArgument(format!(
                "cannot open {} read-only: it does not exist",
                self.path.display()
            )));
        }
        Ok(())
    }
}

/// `store.db` -> `store.db.<ext>`
fn sibling(path: &Path, ext: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// Builder for StoreConfig
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    /// Turn payload compression on or off
    pub fn compress(mut self, compress: bool) -> Self {
        self.config.compress = compress;
        self
    }

    /// Open the store read-only
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.config.read_only = read_only;
        self
    }

    /// Set the (currently inert) encryption passphrase
    pub fn encrypt_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.config.encrypt_passphrase = Some(passphrase.into());
        self
    }

    /// Set the lock acquisition timeout
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.config.lock_timeout = timeout;
        self
    }

    /// Set the lock polling interval
    pub fn lock_poll_interval(mut self, interval: Duration) -> Self {
        self.config.lock_poll_interval = interval;
        self
    }

    /// Set the SQLite busy timeout
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.config.busy_timeout = timeout;
        self
    }

    pub fn build(self) -> StoreConfig {
        self.config
    }
}
