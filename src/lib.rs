//! # blobfs
//!
//! An embedded, single-file store of named binary blobs with:
//! - Upsert-by-name records with advisory metadata
//! - Transparent DEFLATE compression
//! - Cross-process locking through a sibling lock file
//! - Cancelable streaming queries on a background producer
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Store                                 │
//! │     create / save / get / exists / count / get_all / dump    │
//! └──────────────┬──────────────────────────────┬───────────────┘
//!                │ per call                     │ per stream
//! ┌──────────────▼──────────────┐      ┌────────▼──────────────┐
//! │   Transaction Coordinator   │◀─────│   Streaming Pipeline  │
//! │  begin(intent) ... end()    │      │  producer thread      │
//! └──────┬───────────────┬──────┘      └────────┬──────────────┘
//!        │               │                      │
//!        ▼               ▼                      ▼
//!   ┌──────────┐   ┌────────────┐         ┌──────────┐
//!   │   Lock   │   │  SQLite    │         │  Codec   │
//!   │ <p>.lock │   │  <p>       │         │ DEFLATE  │
//!   └──────────┘   └────────────┘         └──────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use blobfs::{Store, StoreConfig};
//!
//! # fn main() -> blobfs::Result<()> {
//! let store = Store::open(StoreConfig::builder("files.db").compress(true).build())?;
//! let record = store.create("notes/today.txt", b"hello".to_vec())?;
//! store.save(&record)?;
//! assert_eq!(store.get("notes/today.txt")?.data, b"hello");
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod codec;
pub mod lock;
pub mod txn;
pub mod store;
mod pipeline;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{BlobError, Result};
pub use config::{StoreConfig, StoreConfigBuilder};
pub use lock::{LockFile, LockGuard, LockMode};
pub use store::{Record, Store};

/// Bound query argument for `get_all` and `stream`
pub use rusqlite::types::Value;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of blobfs
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
