//! Record definitions
//!
//! The unit of storage: one named blob and its metadata.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::{BlobError, Result};

/// Permissions given to new records
pub const DEFAULT_PERMISSIONS: u32 = 0o644;

/// A named blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unique key, never empty
    pub name: String,

    /// Advisory metadata, not enforced
    pub permissions: u32,
    pub owner_id: i64,
    pub group_id: i64,

    /// Byte length of `data` as stored; the logical length once read back
    pub size: usize,

    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,

    pub data: Vec<u8>,

    /// How `data` must be interpreted
    pub is_compressed: bool,
    /// Reserved, always false
    pub is_encrypted: bool,
}

impl Record {
    /// Build a record in memory, compressing the payload when asked
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>, compress: bool) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(BlobError::InvalidArgument(
                "record name must not be empty".to_string(),
            ));
        }

        let mut data = data.into();
        if compress {
            data = codec::compress(&data)?;
        }

        let now = Utc::now();
        Ok(Self {
            name,
            permissions: DEFAULT_PERMISSIONS,
            owner_id: 0,
            group_id: 0,
            size: data.len(),
            created: now,
            modified: now,
            data,
            is_compressed: compress,
            is_encrypted: false,
        })
    }

    /// Decode a row laid out as `FS_COLUMNS`, exactly as stored
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let size: i64 = row.get(4)?;
        Ok(Self {
            name: row.get(0)?,
            permissions: row.get(1)?,
            owner_id: row.get(2)?,
            group_id: row.get(3)?,
            size: usize::try_from(size).unwrap_or(0),
            created: row.get(5)?,
            modified: row.get(6)?,
            data: row.get(7)?,
            is_compressed: row.get(8)?,
            is_encrypted: row.get(9)?,
        })
    }

    /// Turn a stored record into what callers see: decompressed, with the
    /// logical size
    ///
    /// The flags keep describing `data`, so a record read back can be saved
    /// again unchanged.
    pub(crate) fn into_logical(mut self) -> Result<Self> {
        if self.is_compressed {
            self.data = codec::decompress(&self.data)?;
            self.size = self.data.len();
            self.is_compressed = false;
        }
        Ok(self)
    }

    /// Payload as UTF-8, if it is valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }
}
