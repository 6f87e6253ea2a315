//! Transaction lifecycle
//!
//! A `Transaction` value is the InTransaction state: it exists only while the
//! lock is held and the handle is open.

use std::time::Duration;

use rusqlite::{Connection, OpenFlags};

use crate::config::StoreConfig;
use crate::error::{BlobError, Result};
use crate::lock::{LockFile, LockGuard, LockMode};

use super::schema;

/// What a transaction is going to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Only reads; takes the shared lock
    Read,

    /// Mutates the store; takes the exclusive lock
    Write,
}

impl Intent {
    fn lock_mode(self) -> LockMode {
        match self {
            Intent::Read => LockMode::Shared,
            Intent::Write => LockMode::Exclusive,
        }
    }
}

/// Starts transactions against one store path
///
/// Cloned into every pipeline thread; holds configuration only.
#[derive(Debug, Clone)]
pub struct Coordinator {
    config: StoreConfig,
    lock: LockFile,
}

impl Coordinator {
    pub fn new(config: StoreConfig) -> Self {
        let lock = LockFile::new(config.lock_path(), config.lock_poll_interval);
        Self { config, lock }
    }

    /// Lock, open, and (for a brand new file) bootstrap the schema
    pub fn begin(&self, intent: Intent) -> Result<Transaction> {
        Transaction::begin(&self.config, &self.lock, intent)
    }

    /// Run `body` inside a transaction, ending it on every exit path
    ///
    /// A failure in `body` wins over a failure while ending; the latter is
    /// only logged in that case.
    pub fn run<T>(
        &self,
        intent: Intent,
        body: impl FnOnce(&mut Connection) -> Result<T>,
    ) -> Result<T> {
        let mut txn = self.begin(intent)?;
        let outcome = txn.connection().and_then(body);
        match outcome {
            Ok(value) => {
                txn.end()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(end_err) = txn.end() {
                    tracing::warn!("error ending failed transaction: {}", end_err);
                }
                Err(e)
            }
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn lock(&self) -> &LockFile {
        &self.lock
    }
}

/// An open handle plus the lock protecting it
pub struct Transaction {
    intent: Intent,
    /// `None` once ended
    conn: Option<Connection>,
    lock: Option<LockGuard>,
}

impl Transaction {
    fn begin(config: &StoreConfig, lock: &LockFile, intent: Intent) -> Result<Self> {
        let guard = lock.acquire(intent.lock_mode(), config.lock_timeout)?;

        // Checked under the lock so only one writer ever bootstraps
        let fresh = !config.path.exists();
        let conn = open_connection(config, intent)?;
        if fresh && intent == Intent::Write {
            schema::initialize(&conn)?;
        }

        Ok(Self {
            intent,
            conn: Some(conn),
            lock: Some(guard),
        })
    }

    /// The open handle
    pub fn connection(&mut self) -> Result<&mut Connection> {
        self.conn.as_mut().ok_or(BlobError::Closed)
    }

    pub fn intent(&self) -> Intent {
        self.intent
    }

    /// Close the handle, then release the lock
    pub fn end(mut self) -> Result<()> {
        self.finish()
    }

    fn finish(&mut self) -> Result<()> {
        let closed = match self.conn.take() {
            Some(conn) => conn.close().map_err(|(_, e)| BlobError::storage("close", e)),
            None => Ok(()),
        };
        let released = match self.lock.take() {
            Some(mut guard) => guard.release(),
            None => Ok(()),
        };
        closed.and(released)
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            tracing::warn!(intent = ?self.intent, "error ending transaction: {}", e);
        }
    }
}

fn open_connection(config: &StoreConfig, intent: Intent) -> Result<Connection> {
    let flags = if config.read_only {
        OpenFlags::SQLITE_OPEN_READ_ONLY
    } else if intent == Intent::Write {
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
    } else {
        OpenFlags::SQLITE_OPEN_READ_WRITE
    };
    let conn = Connection::open_with_flags(&config.path, flags | OpenFlags::SQLITE_OPEN_NO_MUTEX)
        .map_err(|e| BlobError::storage("open", e))?;
    apply_busy_timeout(&conn, config.busy_timeout)?;
    Ok(conn)
}

fn apply_busy_timeout(conn: &Connection, timeout: Duration) -> Result<()> {
    conn.busy_timeout(timeout)
        .map_err(|e| BlobError::storage("open", e))
}
