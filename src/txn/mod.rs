//! Transaction Coordinator Module
//!
//! Pairs lock acquisition with opening and closing the storage handle.
//!
//! ## Lifecycle
//! ```text
//!   Idle ──begin(intent)──▶ InTransaction ──end() / drop──▶ Idle
//!          │ 1. lock (shared for reads, exclusive for writes)
//!          │ 2. open SQLite handle
//!          │ 3. bootstrap schema if the file is new (writes only)
//! ```
//!
//! `end` and `Drop` run the same cleanup, so an early `?` return or a panic
//! still closes the handle and releases the lock.

pub(crate) mod schema;
mod transaction;

pub use schema::{FS_COLUMNS, SCHEMA};
pub use transaction::{Coordinator, Intent, Transaction};
