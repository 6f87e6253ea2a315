//! Record Store Module
//!
//! The schema-backed CRUD surface of the engine.
//!
//! ## Responsibilities
//! - Build records in memory (optionally compressed)
//! - Upsert, fetch, test and count records, each in its own transaction
//! - Enumerate synchronously (`get_all`) or through a pipeline (`stream`)
//! - Dump the whole store as SQL text
//!
//! ## Table Layout
//! ```text
//! ┌──────┬──────┬─────┬─────┬──────┬─────────┬──────────┬──────┬──────┬──────┐
//! │ name │ perm │ uid │ gid │ size │ created │ modified │ data │ comp │ encr │
//! └──────┴──────┴─────┴─────┴──────┴─────────┴──────────┴──────┴──────┴──────┘
//!   PK                        stored                       blob   flags
//! ```

mod dump;
mod handle;
mod record;

pub use handle::{Store, COUNT_SQL};
pub use record::{Record, DEFAULT_PERMISSIONS};
