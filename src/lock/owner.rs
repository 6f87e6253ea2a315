//! Lock owner stamp
//!
//! Who last held the lock exclusively. Informational only: correctness never
//! depends on it, since the OS lock is the source of truth.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Identity of an exclusive lock holder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockOwner {
    /// Process id of the holder
    pub pid: u32,

    /// Unix millis at which the lock was taken
    pub acquired_ms: u64,
}

impl LockOwner {
    /// Stamp for the current process, now
    pub fn current() -> Self {
        // Clocks before 1970 stamp as 0
        let acquired_ms = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        Self {
            pid: std::process::id(),
            acquired_ms,
        }
    }

    /// Overwrite the lock file content with this stamp
    pub(crate) fn write_to(&self, file: &mut File) -> Result<()> {
        let bytes = bincode::serialize(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&bytes)?;
        Ok(())
    }

    /// Read a stamp back; `None` for an empty or foreign file
    pub(crate) fn read_from(file: &mut File) -> Option<Self> {
        let mut bytes = Vec::new();
        file.seek(SeekFrom::Start(0)).ok()?;
        file.read_to_end(&mut bytes).ok()?;
        if bytes.is_empty() {
            return None;
        }
        bincode::deserialize(&bytes).ok()
    }
}
