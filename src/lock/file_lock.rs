//! File-based lock
//!
//! Polling acquisition with a timeout, released by guard drop.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::{BlobError, Result};

use super::LockOwner;

/// How a lock is held
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Any number of holders at once; excludes `Exclusive`
    Shared,

    /// A single holder; excludes everything else
    Exclusive,
}

/// A named lock resource on disk
///
/// Cheap to clone. Holds no OS resources itself; every call to
/// [`LockFile::acquire`] opens its own handle, which lives in the returned guard.
#[derive(Debug, Clone)]
pub struct LockFile {
    /// Path of the lock file (`<store>.lock`)
    path: PathBuf,

    /// Sleep between attempts
    poll_interval: Duration,
}

impl LockFile {
    /// Describe a lock at `path`. Nothing is touched until acquisition.
    pub fn new(path: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            path: path.into(),
            poll_interval,
        }
    }

    /// Block until the lock is held in `mode` or `timeout` elapses
    ///
    /// Returns [`BlobError::LockTimeout`] on timeout. There is no other way
    /// to abort an acquisition in progress.
    pub fn acquire(&self, mode: LockMode, timeout: Duration) -> Result<LockGuard> {
        let mut file = self.open()?;
        let started = Instant::now();

        loop {
            if try_lock(&file, mode)? {
                break;
            }

            let waited = started.elapsed();
            if waited >= timeout {
                tracing::warn!(
                    path = %self.path.display(),
                    ?mode,
                    waited_ms = waited.as_millis() as u64,
                    "lock acquisition timed out"
                );
                return Err(BlobError::LockTimeout {
                    path: self.path.clone(),
                    waited,
                    holder: LockOwner::read_from(&mut file).map(|o| o.pid),
                });
            }

            thread::sleep(self.poll_interval.min(timeout - waited));
        }

        if mode == LockMode::Exclusive {
            LockOwner::current().write_to(&mut file)?;
        }

        tracing::debug!(
            path = %self.path.display(),
            ?mode,
            waited_ms = started.elapsed().as_millis() as u64,
            "lock acquired"
        );

        Ok(LockGuard {
            path: self.path.clone(),
            mode,
            file: Some(file),
        })
    }

    /// Single non-blocking attempt
    pub fn try_acquire(&self, mode: LockMode) -> Result<Option<LockGuard>> {
        let mut file = self.open()?;
        if !try_lock(&file, mode)? {
            return Ok(None);
        }
        if mode == LockMode::Exclusive {
            LockOwner::current().write_to(&mut file)?;
        }
        Ok(Some(LockGuard {
            path: self.path.clone(),
            mode,
            file: Some(file),
        }))
    }

    /// Last exclusive holder recorded in the lock file, if any
    pub fn holder(&self) -> Option<LockOwner> {
        let mut file = File::open(&self.path).ok()?;
        LockOwner::read_from(&mut file)
    }

    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Polling interval between attempts
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    fn open(&self) -> Result<File> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        Ok(file)
    }
}

/// Ok(true) when claimed, Ok(false) when someone else holds it.
///
/// Called through the trait path: newer std has inherent `File` lock methods
/// with the same names and different signatures.
fn try_lock(file: &File, mode: LockMode) -> Result<bool> {
    let attempt = match mode {
        LockMode::Shared => FileExt::try_lock_shared(file),
        LockMode::Exclusive => FileExt::try_lock_exclusive(file),
    };
    match attempt {
        Ok(()) => Ok(true),
        Err(e) if is_contended(&e) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// A held lock. Dropping it releases the lock.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    mode: LockMode,
    /// `None` once released
    file: Option<File>,
}

impl LockGuard {
    /// Mode the lock is held in
    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// Whether the guard still holds the lock
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Give the lock up. Safe to call any number of times.
    ///
    /// The handle is closed even if the explicit unlock fails, and closing the
    /// last handle drops the OS lock, so the claim is always relinquished.
    pub fn release(&mut self) -> Result<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        let unlocked = FileExt::unlock(&file);
        drop(file);

        tracing::debug!(path = %self.path.display(), mode = ?self.mode, "lock released");
        unlocked.map_err(BlobError::from)
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!(path = %self.path.display(), "error releasing lock: {}", e);
        }
    }
}
