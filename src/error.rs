//! Error types for blobfs
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias using BlobError
pub type Result<T> = std::result::Result<T, BlobError>;

/// Unified error type for blobfs operations
#[derive(Debug, Error)]
pub enum BlobError {
    // -------------------------------------------------------------------------
    // Locking Errors
    // -------------------------------------------------------------------------
    #[error("Timed out after {waited:?} waiting for lock {path:?}{}", holder_suffix(.holder))]
    LockTimeout {
        path: PathBuf,
        waited: Duration,
        /// Pid of the last exclusive holder, if the owner stamp was readable
        holder: Option<u32>,
    },

    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    #[error("Not found: {0}")]
    NotFound(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage fault during {op}: {source}")]
    StorageFault {
        op: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    // -------------------------------------------------------------------------
    // Codec Errors
    // -------------------------------------------------------------------------
    #[error("Malformed compressed payload: {0}")]
    CodecFault(#[source] std::io::Error),

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Usage Errors
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Store is closed")]
    Closed,
}

impl BlobError {
    /// Wrap a SQLite error with the name of the operation that hit it
    pub fn storage(op: &'static str, source: rusqlite::Error) -> Self {
        BlobError::StorageFault { op, source }
    }

    /// True for the expected "nothing there" outcome
    pub fn is_not_found(&self) -> bool {
        matches!(self, BlobError::NotFound(_))
    }
}

fn holder_suffix(holder: &Option<u32>) -> String {
    match holder {
        Some(pid) => format!(" (last held by pid {})", pid),
        None => String::new(),
    }
}
