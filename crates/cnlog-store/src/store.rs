//! The sequence store: owner of the open log handle and of the
//! close/clear/shutdown protocol.
//!
//! Hot data paths (append, count, boundary lookups) never raise: when the
//! store is closed they return their documented safe defaults, and engine
//! faults are absorbed and reported through the [`ErrorSink`] so the
//! replication log cannot wedge the wider server. Cursor construction and
//! trimming surface typed errors instead, since their callers must react.

use std::sync::Arc;

use rusqlite::{params, Connection, OptionalExtension};

use cnlog_core::{
    codec::{decode_record, decode_seq_key, encode_record, encode_seq_key},
    ChangeId, DomainId, LogRecord,
};

use crate::cursor::{DeleteCursor, ReadCursor};
use crate::env::{ChangelogEnv, LogHandle};
use crate::error::Result;
use crate::guard::HandleLock;
use crate::sink::ErrorSink;

/// Durable, ordered (sequence number → change record) log.
///
/// One instance owns one named log inside a [`ChangelogEnv`]. Any number of
/// appenders and read cursors plus one trimming pass may operate
/// concurrently; `clear` and `shutdown` serialize against all of them
/// through the lifecycle guard.
pub struct SequenceStore {
    env: Arc<ChangelogEnv>,
    name: String,
    lock: HandleLock,
    sink: Arc<dyn ErrorSink>,
}

impl SequenceStore {
    /// Open or create the named log inside the environment.
    ///
    /// A failure to open the handle is fatal to construction.
    pub fn open(
        env: Arc<ChangelogEnv>,
        name: impl Into<String>,
        sink: Arc<dyn ErrorSink>,
    ) -> Result<Self> {
        let name = name.into();
        let handle = env.get_or_create_handle(&name)?;
        Ok(Self {
            env,
            name,
            lock: HandleLock::new(handle),
            sink,
        })
    }

    /// Name of the log this store owns.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store a record under the given sequence number (upsert).
    ///
    /// The write is committed with the environment's relaxed durability
    /// policy. On a closed store this is a silent no-op: the caller is
    /// racing a shutdown, not misusing the API. Engine faults are reported
    /// through the error sink, never raised.
    pub fn append(&self, seq: u64, value: &str, domain_id: &DomainId, change_id: &ChangeId) {
        let guard = self.lock.acquire_shared();
        let Some(handle) = guard.handle() else {
            return;
        };

        let record = LogRecord::new(value, domain_id.clone(), change_id.clone());
        if let Err(err) = put_record(handle, seq, &record) {
            self.sink.unexpected_storage_failure(&err);
        }
    }

    /// Number of records currently held, 0 if closed.
    ///
    /// Engine faults are logged and degrade to 0.
    pub fn count(&self) -> u64 {
        let guard = self.lock.acquire_shared();
        let Some(handle) = guard.handle() else {
            return 0;
        };

        match handle.with_conn(|conn| query_count(conn, handle.name())) {
            Ok(n) => n,
            Err(err) => {
                tracing::warn!("failed to count records of {}: {}", self.name, err);
                0
            }
        }
    }

    /// Smallest sequence number in the log, 0 if empty or closed.
    pub fn read_first_key(&self) -> u64 {
        self.boundary_key(Boundary::First)
    }

    /// Largest sequence number in the log, 0 if empty or closed.
    pub fn read_last_key(&self) -> u64 {
        self.boundary_key(Boundary::Last)
    }

    fn boundary_key(&self, boundary: Boundary) -> u64 {
        let guard = self.lock.acquire_shared();
        let Some(handle) = guard.handle() else {
            return 0;
        };

        match handle.with_conn(|conn| query_boundary_key(conn, handle.name(), boundary)) {
            Ok(Some(seq)) => seq,
            Ok(None) => 0,
            Err(err) => {
                self.sink.unexpected_storage_failure(&err);
                0
            }
        }
    }

    /// Open a forward cursor positioned at or after `start`.
    ///
    /// A negative `start` positions before the first record. If no record
    /// at or after `start` exists the construction fails with
    /// [`StoreError::NotAvailable`]; a closed store instead yields a
    /// harmless, immediately exhausted cursor.
    ///
    /// [`StoreError::NotAvailable`]: crate::error::StoreError::NotAvailable
    pub fn open_read_cursor(&self, start: i64) -> Result<ReadCursor<'_>> {
        ReadCursor::new(self, start)
    }

    /// Open a trimming cursor over a dedicated transaction.
    pub fn open_delete_cursor(&self) -> Result<DeleteCursor<'_>> {
        DeleteCursor::new(self)
    }

    /// Remove every record, leaving the store open and empty.
    ///
    /// Blocks new operations and waits for current shared holders, then
    /// destroys the handle, truncates the log, and recreates the handle.
    /// Failures are reported through the sink; if recreation fails the
    /// store is left closed and data operations degrade to safe defaults.
    pub fn clear(&self) {
        let mut guard = self.lock.acquire_exclusive();
        if guard.is_closed() {
            return;
        }

        // Closed from here until the fresh handle is installed.
        if let Some(handle) = guard.take_handle() {
            self.close_handle(handle);
        }

        if let Err(err) = self.env.truncate(&self.name) {
            tracing::error!("failed to clear log {}: {}", self.name, err);
            self.sink.unexpected_storage_failure(&err);
            return;
        }

        match self.env.get_or_create_handle(&self.name) {
            Ok(handle) => guard.install_handle(handle),
            Err(err) => {
                tracing::error!("failed to reopen log {} after clear: {}", self.name, err);
                self.sink.unexpected_storage_failure(&err);
            }
        }
    }

    /// Close the store permanently. Idempotent.
    pub fn shutdown(&self) {
        let mut guard = self.lock.acquire_exclusive();
        if let Some(handle) = guard.take_handle() {
            self.close_handle(handle);
        }
    }

    fn close_handle(&self, handle: Arc<LogHandle>) {
        // Exclusive mode guarantees no shared holder still clones the Arc.
        if let Ok(handle) = Arc::try_unwrap(handle) {
            if let Err(err) = handle.close() {
                tracing::warn!("error closing log {}: {}", self.name, err);
            }
        }
    }

    pub(crate) fn lock(&self) -> &HandleLock {
        &self.lock
    }

    pub(crate) fn env(&self) -> &ChangelogEnv {
        &self.env
    }

    pub(crate) fn sink(&self) -> &dyn ErrorSink {
        self.sink.as_ref()
    }
}

#[derive(Clone, Copy)]
enum Boundary {
    First,
    Last,
}

fn put_record(handle: &LogHandle, seq: u64, record: &LogRecord) -> Result<()> {
    let key = encode_seq_key(seq);
    let bytes = encode_record(record)?;
    handle.with_conn(|conn| {
        // A failed statement rolls the transaction back on drop.
        let txn = conn.unchecked_transaction()?;
        txn.execute(
            &format!(
                "INSERT INTO \"{}\" (key, record) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET record = excluded.record",
                handle.name()
            ),
            params![&key[..], bytes],
        )?;
        txn.commit()?;
        Ok(())
    })
}

fn query_count(conn: &Connection, log: &str) -> Result<u64> {
    let n: i64 = conn
        .prepare_cached(&format!("SELECT COUNT(*) FROM \"{log}\""))?
        .query_row([], |row| row.get(0))?;
    Ok(n as u64)
}

fn query_boundary_key(conn: &Connection, log: &str, boundary: Boundary) -> Result<Option<u64>> {
    let order = match boundary {
        Boundary::First => "ASC",
        Boundary::Last => "DESC",
    };
    let key: Option<Vec<u8>> = conn
        .prepare_cached(&format!(
            "SELECT key FROM \"{log}\" ORDER BY key {order} LIMIT 1"
        ))?
        .query_row([], |row| row.get(0))
        .optional()?;
    match key {
        Some(bytes) => Ok(Some(decode_seq_key(&bytes)?)),
        None => Ok(None),
    }
}

fn decode_row(key: Vec<u8>, record: Vec<u8>) -> Result<(u64, LogRecord)> {
    Ok((decode_seq_key(&key)?, decode_record(&record)?))
}

/// Record stored under exactly `seq`, if any.
pub(crate) fn fetch_exact(conn: &Connection, log: &str, seq: u64) -> Result<Option<LogRecord>> {
    let key = encode_seq_key(seq);
    let record: Option<Vec<u8>> = conn
        .prepare_cached(&format!("SELECT record FROM \"{log}\" WHERE key = ?1"))?
        .query_row(params![&key[..]], |row| row.get(0))
        .optional()?;
    match record {
        Some(bytes) => Ok(Some(decode_record(&bytes)?)),
        None => Ok(None),
    }
}

/// First record in key order.
pub(crate) fn fetch_first(conn: &Connection, log: &str) -> Result<Option<(u64, LogRecord)>> {
    let row: Option<(Vec<u8>, Vec<u8>)> = conn
        .prepare_cached(&format!(
            "SELECT key, record FROM \"{log}\" ORDER BY key LIMIT 1"
        ))?
        .query_row([], |row| Ok((row.get(0)?, row.get(1)?)))
        .optional()?;
    row.map(|(k, r)| decode_row(k, r)).transpose()
}

/// Smallest record with key ≥ `seq`.
pub(crate) fn fetch_at_or_after(
    conn: &Connection,
    log: &str,
    seq: u64,
) -> Result<Option<(u64, LogRecord)>> {
    let key = encode_seq_key(seq);
    let row: Option<(Vec<u8>, Vec<u8>)> = conn
        .prepare_cached(&format!(
            "SELECT key, record FROM \"{log}\" WHERE key >= ?1 ORDER BY key LIMIT 1"
        ))?
        .query_row(params![&key[..]], |row| Ok((row.get(0)?, row.get(1)?)))
        .optional()?;
    row.map(|(k, r)| decode_row(k, r)).transpose()
}

/// Smallest record with key > `seq`.
pub(crate) fn fetch_after(
    conn: &Connection,
    log: &str,
    seq: u64,
) -> Result<Option<(u64, LogRecord)>> {
    let key = encode_seq_key(seq);
    let row: Option<(Vec<u8>, Vec<u8>)> = conn
        .prepare_cached(&format!(
            "SELECT key, record FROM \"{log}\" WHERE key > ?1 ORDER BY key LIMIT 1"
        ))?
        .query_row(params![&key[..]], |row| Ok((row.get(0)?, row.get(1)?)))
        .optional()?;
    row.map(|(k, r)| decode_row(k, r)).transpose()
}

/// Delete the record stored under `seq`.
pub(crate) fn delete_key(conn: &Connection, log: &str, seq: u64) -> Result<()> {
    let key = encode_seq_key(seq);
    conn.prepare_cached(&format!("DELETE FROM \"{log}\" WHERE key = ?1"))?
        .execute(params![&key[..]])?;
    Ok(())
}
