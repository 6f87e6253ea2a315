//! Streaming Pipeline Module
//!
//! Runs a query on a background producer and hands records over one at a time.
//!
//! ## Channels
//! ```text
//!   producer ──records (rendezvous)──────▶ consumer
//!   producer ──errors (capacity 1)───────▶ consumer
//!   producer ◀──done (message or drop)──── consumer
//! ```
//!
//! ## Rules
//! - Cancellation is checked before every emission and raced against it
//! - On cancellation nothing more is emitted, not even an error
//! - On a fault exactly one error is sent, then both channels close
//! - The producer owns its handle, cursor and shared lock; all are released
//!   when it exits

mod producer;

pub(crate) use producer::spawn;
