//! Text dump
//!
//! Writes the store as SQL statements that rebuild it when fed to `sqlite3`.
//!
//! ```text
//! PRAGMA foreign_keys=OFF;
//! BEGIN TRANSACTION;
//! CREATE TABLE fs (...);
//! INSERT INTO "fs" VALUES('a.txt',420,0,0,5,'2024-..',..,X'68656c6c6f',0,0);
//! ...
//! COMMIT;
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::Connection;

use crate::error::{BlobError, Result};

/// Dump every user table of `conn` to `target`, replacing it
pub(crate) fn write_dump(conn: &Connection, target: &Path) -> Result<()> {
    let mut out = BufWriter::new(File::create(target)?);

    writeln!(out, "PRAGMA foreign_keys=OFF;")?;
    writeln!(out, "BEGIN TRANSACTION;")?;

    for (table, create_sql) in tables(conn)? {
        writeln!(out, "{};", create_sql)?;
        dump_rows(conn, &table, &mut out)?;
    }

    // Indexes, views and triggers after the data they depend on
    for create_sql in secondary_objects(conn)? {
        writeln!(out, "{};", create_sql)?;
    }

    writeln!(out, "COMMIT;")?;
    out.flush()?;
    Ok(())
}

fn tables(conn: &Connection) -> Result<Vec<(String, String)>> {
    let mut stmt = conn
        .prepare(
            "SELECT name, sql FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND sql IS NOT NULL \
             ORDER BY rowid",
        )
        .map_err(|e| BlobError::storage("dump", e))?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(|e| BlobError::storage("dump", e))?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| BlobError::storage("dump", e))
}

fn secondary_objects(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT sql FROM sqlite_master \
             WHERE type IN ('index', 'view', 'trigger') AND sql IS NOT NULL \
             ORDER BY rowid",
        )
        .map_err(|e| BlobError::storage("dump", e))?;
    let rows = stmt
        .query_map([], |row| row.get(0))
        .map_err(|e| BlobError::storage("dump", e))?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| BlobError::storage("dump", e))
}

fn dump_rows(conn: &Connection, table: &str, out: &mut impl Write) -> Result<()> {
    let quoted = quote_identifier(table);
    let mut stmt = conn
        .prepare(&format!("SELECT * FROM {}", quoted))
        .map_err(|e| BlobError::storage("dump", e))?;
    let columns = stmt.column_count();
    let mut rows = stmt.query([]).map_err(|e| BlobError::storage("dump", e))?;

    while let Some(row) = rows.next().map_err(|e| BlobError::storage("dump", e))? {
        let mut values = Vec::with_capacity(columns);
        for i in 0..columns {
            let value = row.get_ref(i).map_err(|e| BlobError::storage("dump", e))?;
            values.push(sql_literal(value));
        }
        writeln!(out, "INSERT INTO {} VALUES({});", quoted, values.join(","))?;
    }
    Ok(())
}

/// Render one value as an SQL literal
fn sql_literal(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => format!("{:?}", f),
        ValueRef::Text(bytes) => quote_text(&String::from_utf8_lossy(bytes)),
        ValueRef::Blob(bytes) => format!("X'{}'", hex::encode(bytes)),
    }
}

fn quote_text(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_literals() {
        assert_eq!(sql_literal(ValueRef::Blob(b"")), "X''");
        assert_eq!(sql_literal(ValueRef::Blob(&[0x00, 0x0f, 0xab, 0xff])), "X'000fabff'");
    }

    #[test]
    fn test_text_quoting_doubles_single_quotes() {
        assert_eq!(quote_text("it's"), "'it''s'");
        assert_eq!(quote_text(""), "''");
    }

    #[test]
    fn test_identifier_quoting() {
        assert_eq!(quote_identifier("fs"), "\"fs\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_literals() {
        assert_eq!(sql_literal(ValueRef::Null), "NULL");
        assert_eq!(sql_literal(ValueRef::Integer(-7)), "-7");
        assert_eq!(sql_literal(ValueRef::Real(1.0)), "1.0");
        assert_eq!(sql_literal(ValueRef::Text(b"a'b")), "'a''b'");
        assert_eq!(sql_literal(ValueRef::Blob(b"hi")), "X'6869'");
    }
}
