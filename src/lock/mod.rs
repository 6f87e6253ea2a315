//! Cross-process Lock Module
//!
//! Mutual exclusion between independent processes using only the filesystem.
//!
//! ## Responsibilities
//! - Claim `<store>.lock` in shared (readers) or exclusive (writers) mode
//! - Poll at a fixed interval until claimed or timed out
//! - Release on every exit path (guard drop)
//! - Leave a small owner stamp behind for diagnostics
//!
//! ## Mechanism
//! Each acquisition opens its own handle on the lock file and places an OS
//! advisory lock on it. Advisory locks belong to the open file description,
//! so two handles in the same process exclude each other exactly like two
//! processes do. The kernel drops the lock when the holder exits, so a lock
//! file left behind by a crashed process is inert and is never deleted.
//!
//! ## Lock File Content
//! ```text
//! ┌────────────┬──────────────────────┐
//! │ pid (u32)  │ acquired_ms (u64)    │   bincode, written by exclusive holders
//! └────────────┴──────────────────────┘
//! ```

mod file_lock;
mod owner;

pub use file_lock::{LockFile, LockGuard, LockMode};
pub use owner::LockOwner;
