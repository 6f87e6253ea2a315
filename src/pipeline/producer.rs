//! Pipeline producer
//!
//! One thread per stream. It owns the transaction for its whole life, so the
//! cursor never outlives the lock that protects it.

use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, select, Receiver, Sender, TryRecvError};
use rusqlite::params_from_iter;
use rusqlite::types::Value;

use crate::error::{BlobError, Result};
use crate::store::Record;
use crate::txn::{Coordinator, Intent};

/// Consumer-side ends of a started pipeline
pub(crate) struct Spawned {
    pub records: Receiver<Record>,
    pub errors: Receiver<BlobError>,
    pub worker: JoinHandle<()>,
}

/// How a producer stopped without a fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Finish {
    /// Ran out of rows
    Exhausted,
    /// `done` or store shutdown fired
    Canceled,
    /// Consumer dropped the record receiver
    Abandoned,
}

/// State moved into the producer thread
struct Producer {
    coordinator: Coordinator,
    done: Receiver<()>,
    shutdown: Receiver<()>,
    query: String,
    args: Vec<Value>,
    records: Sender<Record>,
    errors: Sender<BlobError>,
}

/// Start a producer for `query`
pub(crate) fn spawn(
    coordinator: Coordinator,
    done: Receiver<()>,
    shutdown: Receiver<()>,
    query: String,
    args: Vec<Value>,
) -> Result<Spawned> {
    let (records_tx, records_rx) = channel::bounded(0);
    let (errors_tx, errors_rx) = channel::bounded(1);

    let producer = Producer {
        coordinator,
        done,
        shutdown,
        query,
        args,
        records: records_tx,
        errors: errors_tx,
    };

    let worker = thread::Builder::new()
        .name("blobfs-pipeline".to_string())
        .spawn(move || producer.run())?;

    Ok(Spawned {
        records: records_rx,
        errors: errors_rx,
        worker,
    })
}

impl Producer {
    /// Thread body. Dropping `self` at the end closes both output channels.
    fn run(self) {
        tracing::debug!(query = %self.query, "pipeline started");

        match self.emit_all() {
            Ok(finish) => {
                tracing::debug!(query = %self.query, ?finish, "pipeline stopped");
            }
            // A fault racing a cancellation stays silent
            Err(_) if self.is_canceled() => {
                tracing::debug!(query = %self.query, "pipeline canceled during fault");
            }
            Err(e) => {
                tracing::error!(query = %self.query, "pipeline fault: {}", e);
                // Capacity 1 and the only send: never blocks
                let _ = self.errors.try_send(e);
            }
        }
    }

    fn emit_all(&self) -> Result<Finish> {
        let mut txn = self.coordinator.begin(Intent::Read)?;
        let conn = txn.connection()?;

        let mut stmt = conn
            .prepare(&self.query)
            .map_err(|e| BlobError::storage("stream prepare", e))?;
        let mut rows = stmt
            .query(params_from_iter(self.args.iter()))
            .map_err(|e| BlobError::storage("stream query", e))?;

        let (records, done, shutdown) = (&self.records, &self.done, &self.shutdown);
        let mut emitted = 0usize;
        loop {
            if self.is_canceled() {
                return Ok(Finish::Canceled);
            }

            let Some(row) = rows.next().map_err(|e| BlobError::storage("stream scan", e))? else {
                break;
            };
            let record = Record::from_row(row)
                .map_err(|e| BlobError::storage("stream scan", e))?
                .into_logical()?;

            let name = record.name.clone();
            select! {
                send(records, record) -> sent => {
                    if sent.is_err() {
                        return Ok(Finish::Abandoned);
                    }
                    emitted += 1;
                    tracing::trace!(%name, emitted, "record emitted");
                }
                recv(done) -> _ => return Ok(Finish::Canceled),
                recv(shutdown) -> _ => return Ok(Finish::Canceled),
            }
        }

        drop(rows);
        drop(stmt);
        txn.end()?;
        Ok(Finish::Exhausted)
    }

    /// A pending message or a dropped sender both mean stop
    fn is_canceled(&self) -> bool {
        fired(&self.done) || fired(&self.shutdown)
    }
}

fn fired(signal: &Receiver<()>) -> bool {
    !matches!(signal.try_recv(), Err(TryRecvError::Empty))
}
