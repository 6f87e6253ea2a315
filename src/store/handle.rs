//! Store handle
//!
//! The public entry point: open a store file, then save, fetch and enumerate
//! records through short per-call transactions.

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension};

use crate::config::StoreConfig;
use crate::error::{BlobError, Result};
use crate::pipeline;
use crate::txn::{schema, Coordinator, Intent};

use super::{dump, Record};

const INSERT_SQL: &str = "INSERT OR REPLACE INTO fs (
    name, permissions, user_id, group_id, size, created, modified, data, compressed, encrypted
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)";

const SELECT_BY_NAME_SQL: &str = "SELECT name, permissions, user_id, group_id, size, created, \
     modified, data, compressed, encrypted FROM fs WHERE name = ?1";

const SELECT_BY_ORDINAL_SQL: &str = "SELECT name, permissions, user_id, group_id, size, \
     created, modified, data, compressed, encrypted FROM fs LIMIT 1 OFFSET ?1";

const EXISTS_SQL: &str = "SELECT 1 FROM fs WHERE name = ?1 LIMIT 1";

/// Default query behind [`Store::count`]
pub const COUNT_SQL: &str = "SELECT COUNT(name) FROM fs";

/// An opened store
///
/// ## Concurrency
/// - Every call runs in its own transaction: shared lock for reads,
///   exclusive lock for writes. The lock lives on disk, so other processes
///   opening the same path are serialized too.
/// - `&self` everywhere; share across threads with `Arc<Store>`.
/// - Pipelines run on their own threads and are stopped by `close`.
pub struct Store {
    coordinator: Coordinator,

    /// Cloned into every pipeline; fires (by disconnecting) on close
    shutdown_rx: Receiver<()>,

    /// Shutdown sender plus live pipeline threads. `signal` is `None` once closed.
    shutdown: Mutex<Shutdown>,
}

struct Shutdown {
    signal: Option<Sender<()>>,
    workers: Vec<JoinHandle<()>>,
}

impl Store {
    /// Open or create a store with the given config
    ///
    /// On open:
    /// 1. Validate the config
    /// 2. Create the schema if missing (exclusive lock), or check it exists
    ///    when opening read-only (shared lock)
    pub fn open(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        if config.encrypt_passphrase.is_some() {
            tracing::warn!(
                path = %config.path.display(),
                "encryption is not implemented; payloads are stored unencrypted"
            );
        }

        let coordinator = Coordinator::new(config);
        if coordinator.config().read_only {
            let has_schema = coordinator.run(Intent::Read, |conn| schema::has_fs_table(conn))?;
            if !has_schema {
                return Err(BlobError::InvalidArgument(format!(
                    "{} is not a blob store",
                    coordinator.config().path.display()
                )));
            }
        } else {
            coordinator.run(Intent::Write, |conn| schema::initialize(conn))?;
        }

        let (signal, shutdown_rx) = channel::bounded(0);
        tracing::debug!(
            path = %coordinator.config().path.display(),
            compress = coordinator.config().compress,
            read_only = coordinator.config().read_only,
            "store opened"
        );

        Ok(Self {
            coordinator,
            shutdown_rx,
            shutdown: Mutex::new(Shutdown {
                signal: Some(signal),
                workers: Vec::new(),
            }),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config for the specified file
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(StoreConfig::new(path.as_ref()))
    }

    // =========================================================================
    // Records
    // =========================================================================

    /// Build a record using the store's compression setting. Touches nothing on disk.
    pub fn create(&self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> Result<Record> {
        Record::new(name, data, self.coordinator.config().compress)
    }

    /// Insert or replace the row named `record.name`
    pub fn save(&self, record: &Record) -> Result<()> {
        self.ensure_open()?;
        if record.name.is_empty() {
            return Err(BlobError::InvalidArgument(
                "record name must not be empty".to_string(),
            ));
        }

        self.coordinator.run(Intent::Write, |conn| {
            let tx = conn.transaction().map_err(|e| BlobError::storage("save", e))?;
            tx.execute(
                INSERT_SQL,
                params![
                    record.name,
                    record.permissions,
                    record.owner_id,
                    record.group_id,
                    // size always describes the bytes actually written
                    record.data.len() as i64,
                    record.created,
                    record.modified,
                    record.data,
                    record.is_compressed,
                    record.is_encrypted,
                ],
            )
            .map_err(|e| BlobError::storage("save", e))?;
            tx.commit().map_err(|e| BlobError::storage("save", e))
        })?;

        tracing::trace!(name = %record.name, size = record.data.len(), "record saved");
        Ok(())
    }

    /// Fetch a record by name, decompressed
    pub fn get(&self, name: &str) -> Result<Record> {
        self.ensure_open()?;
        let stored = self.coordinator.run(Intent::Read, |conn| {
            conn.query_row(SELECT_BY_NAME_SQL, params![name], Record::from_row)
                .optional()
                .map_err(|e| BlobError::storage("get", e))
        })?;

        match stored {
            Some(record) => record.into_logical(),
            None => Err(BlobError::NotFound(format!("no record named {:?}", name))),
        }
    }

    /// Whether a record named `name` exists. Absence is `Ok(false)`.
    pub fn exists(&self, name: &str) -> Result<bool> {
        self.ensure_open()?;
        self.coordinator.run(Intent::Read, |conn| {
            let found: Option<i64> = conn
                .query_row(EXISTS_SQL, params![name], |row| row.get(0))
                .optional()
                .map_err(|e| BlobError::storage("exists", e))?;
            Ok(found.is_some())
        })
    }

    /// Fetch the `index`-th record
    ///
    /// Ordering is whatever the storage engine yields and may change after
    /// any write; use it only to walk a quiescent store.
    pub fn get_by_ordinal(&self, index: usize) -> Result<Record> {
        self.ensure_open()?;
        // SQLite reads a negative OFFSET as 0, so never let the cast wrap
        let offset = i64::try_from(index)
            .map_err(|_| BlobError::NotFound(format!("no record at ordinal {}", index)))?;
        let stored = self.coordinator.run(Intent::Read, |conn| {
            conn.query_row(SELECT_BY_ORDINAL_SQL, params![offset], Record::from_row)
                .optional()
                .map_err(|e| BlobError::storage("get_by_ordinal", e))
        })?;

        match stored {
            Some(record) => record.into_logical(),
            None => Err(BlobError::NotFound(format!("no record at ordinal {}", index))),
        }
    }

    /// Total number of records
    pub fn count(&self) -> Result<usize> {
        let count = self.count_query(COUNT_SQL)?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Run a query yielding one integer, e.g.
    /// `SELECT COUNT(name) FROM fs WHERE name LIKE 'img/%'`
    ///
    /// A query returning no rows counts as 0.
    pub fn count_query(&self, query: &str) -> Result<i64> {
        self.ensure_open()?;
        self.coordinator.run(Intent::Read, |conn| {
            let count: Option<i64> = conn
                .query_row(query, [], |row| row.get(0))
                .optional()
                .map_err(|e| BlobError::storage("count", e))?;
            Ok(count.unwrap_or(0))
        })
    }

    /// Feed every record matched by `query` to `visit` until it breaks
    ///
    /// `query` must select `fs` rows in column order (`SELECT * FROM fs ...`).
    /// The shared lock is held until `visit` breaks or rows run out.
    pub fn get_all<F>(&self, query: &str, args: &[Value], mut visit: F) -> Result<()>
    where
        F: FnMut(Record) -> ControlFlow<()>,
    {
        self.ensure_open()?;
        self.coordinator.run(Intent::Read, |conn| {
            let mut stmt = conn
                .prepare(query)
                .map_err(|e| BlobError::storage("get_all", e))?;
            let mut rows = stmt
                .query(params_from_iter(args.iter()))
                .map_err(|e| BlobError::storage("get_all", e))?;

            while let Some(row) = rows.next().map_err(|e| BlobError::storage("get_all", e))? {
                let record = Record::from_row(row)
                    .map_err(|e| BlobError::storage("get_all", e))?
                    .into_logical()?;
                if visit(record).is_break() {
                    break;
                }
            }
            Ok(())
        })
    }

    // =========================================================================
    // Streaming
    // =========================================================================

    /// Run `query` on a background producer, emitting records one at a time
    ///
    /// Send on (or drop the sender of) `done` to stop early; pass
    /// `crossbeam::channel::never()` to run to completion. Query faults arrive
    /// as a single message on the error receiver. The outer `Result` only
    /// fails when the store is closed or the thread cannot be spawned.
    ///
    /// The producer holds the shared lock until it stops, so a `save` (or any
    /// other write) issued while a stream is live waits and then fails with
    /// `LockTimeout`; finish or cancel the stream before writing.
    pub fn stream(
        &self,
        done: Receiver<()>,
        query: &str,
        args: Vec<Value>,
    ) -> Result<(Receiver<Record>, Receiver<BlobError>)> {
        let mut shutdown = self.shutdown.lock();
        if shutdown.signal.is_none() {
            return Err(BlobError::Closed);
        }

        // Forget producers that already finished
        shutdown.workers.retain(|worker| !worker.is_finished());

        let spawned = pipeline::spawn(
            self.coordinator.clone(),
            done,
            self.shutdown_rx.clone(),
            query.to_string(),
            args,
        )?;
        shutdown.workers.push(spawned.worker);
        Ok((spawned.records, spawned.errors))
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Write a textual SQL dump of the whole store to `<path>.sql`
    ///
    /// Holds the exclusive lock for the duration. Returns the path written.
    pub fn dump_to_text(&self) -> Result<PathBuf> {
        self.ensure_open()?;
        let target = self.coordinator.config().dump_path();
        self.coordinator
            .run(Intent::Write, |conn| dump::write_dump(conn, &target))?;
        tracing::debug!(target = %target.display(), "store dumped");
        Ok(target)
    }

    /// Stop live pipelines and refuse further calls
    ///
    /// Waits for every pipeline thread to release its cursor and lock.
    /// Idempotent; also runs on drop.
    pub fn close(&self) -> Result<()> {
        let workers = {
            let mut shutdown = self.shutdown.lock();
            // Dropping the sender disconnects every pipeline's shutdown receiver
            if shutdown.signal.take().is_none() {
                return Ok(());
            }
            std::mem::take(&mut shutdown.workers)
        };

        for worker in workers {
            if worker.join().is_err() {
                tracing::warn!("pipeline thread panicked");
            }
        }

        tracing::debug!(path = %self.path().display(), "store closed");
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Backing file path
    pub fn path(&self) -> &Path {
        &self.coordinator.config().path
    }

    /// Lock file path
    pub fn lock_path(&self) -> &Path {
        self.coordinator.lock().path()
    }

    /// Get the configuration
    pub fn config(&self) -> &StoreConfig {
        self.coordinator.config()
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.lock().signal.is_none()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(BlobError::Closed);
        }
        Ok(())
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("error closing store: {}", e);
        }
    }
}
