//! Persisted schema
//!
//! One primary table plus two reserved tables for owner and group names.

use rusqlite::{Connection, OptionalExtension};

use crate::error::{BlobError, Result};

/// DDL run when a store file is created
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS fs (
    name TEXT NOT NULL PRIMARY KEY,
    permissions INTEGER,
    user_id INTEGER,
    group_id INTEGER,
    size INTEGER,
    created TIMESTAMP,
    modified TIMESTAMP,
    data BLOB,
    compressed INTEGER,
    encrypted INTEGER
);
CREATE TABLE IF NOT EXISTS users (
    id INTEGER NOT NULL PRIMARY KEY,
    name TEXT
);
CREATE TABLE IF NOT EXISTS groups (
    id INTEGER NOT NULL PRIMARY KEY,
    name TEXT
);
";

/// Column list of `fs` in declaration order; rows are decoded by position
pub const FS_COLUMNS: &str =
    "name, permissions, user_id, group_id, size, created, modified, data, compressed, encrypted";

/// Create all tables (idempotent)
pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)
        .map_err(|e| BlobError::storage("initialize schema", e))?;
    tracing::debug!("schema initialized");
    Ok(())
}

/// Whether the primary table is present
pub fn has_fs_table(conn: &Connection) -> Result<bool> {
    let found: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'fs'",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| BlobError::storage("inspect schema", e))?;
    Ok(found.is_some())
}
