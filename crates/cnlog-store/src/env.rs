//! Storage environment: the durable, ordered, transactional engine.
//!
//! The environment wraps a single SQLite database file. Each named log is a
//! `WITHOUT ROWID` table keyed by the encoded sequence number, so the
//! engine's clustered b-tree order is the numeric order of the keys.
//!
//! Connections are opened in WAL mode with `synchronous=NORMAL`: a commit
//! is durable to the write-ahead log but the media is not forced to sync on
//! every commit. This is the relaxed durability policy the index runs with,
//! trading a bounded crash-loss window for write throughput. Readers never
//! block writers under WAL; concurrent writers serialize on the WAL write
//! lock and wait out short conflicts via the busy timeout.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// How long a connection waits on the WAL write lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// The storage environment owning the database file.
///
/// Handles and trim transactions each get their own connection, so a trim
/// pass can hold its transaction open while appenders keep committing
/// through the shared handle.
pub struct ChangelogEnv {
    path: PathBuf,
}

impl ChangelogEnv {
    /// Open or create the environment at the given database file path.
    ///
    /// Fails if the file cannot be created or configured; construction of
    /// anything on top of a broken environment is pointless.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let env = Self { path: path.into() };
        // Establish the file and verify the journal configuration sticks.
        env.connect()?;
        Ok(env)
    }

    /// Path of the underlying database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open or create the named log and return an open handle to it.
    pub fn get_or_create_handle(&self, name: &str) -> Result<LogHandle> {
        validate_log_name(name)?;
        let conn = self.connect()?;
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS \"{name}\" (
                key BLOB PRIMARY KEY,
                record BLOB NOT NULL
            ) WITHOUT ROWID"
        ))?;
        Ok(LogHandle {
            name: name.to_string(),
            conn: Mutex::new(conn),
        })
    }

    /// Begin a dedicated transaction for a trim pass.
    ///
    /// The transaction owns its own connection so it can stay open across
    /// the whole pass without wedging the shared handle.
    pub fn begin_transaction(&self) -> Result<TrimTxn> {
        TrimTxn::begin(self.connect()?)
    }

    /// Delete every record of the named log.
    pub fn truncate(&self, name: &str) -> Result<()> {
        validate_log_name(name)?;
        let conn = self.connect()?;
        conn.execute(&format!("DELETE FROM \"{name}\""), [])?;
        Ok(())
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        // journal_mode returns the resulting mode as a row.
        conn.query_row("PRAGMA journal_mode=WAL", [], |_row| Ok(()))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(conn)
    }
}

/// Log names are spliced into DDL, so they must be plain identifiers.
fn validate_log_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidLogName(name.to_string()))
    }
}

/// An open handle to one named log.
///
/// The connection is shared by appenders and read cursors; access is
/// serialized per statement by the internal mutex while the engine's own
/// transaction isolation covers record-level concurrency.
pub struct LogHandle {
    name: String,
    conn: Mutex<Connection>,
}

impl LogHandle {
    /// Name of the log this handle is open on.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run a statement-scoped operation on the handle's connection.
    pub(crate) fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        f(&conn)
    }

    /// Close the handle's connection, surfacing any close-time fault.
    pub(crate) fn close(self) -> Result<()> {
        let conn = self.conn.into_inner().map_err(|_| StoreError::Poisoned)?;
        conn.close().map_err(|(_conn, err)| StoreError::Database(err))
    }
}

/// A transaction dedicated to one trim pass.
///
/// Commits or rolls back exactly once; dropping an undecided transaction
/// rolls it back.
pub struct TrimTxn {
    conn: Connection,
    open: bool,
}

impl TrimTxn {
    fn begin(conn: Connection) -> Result<Self> {
        conn.execute_batch("BEGIN DEFERRED")?;
        Ok(Self { conn, open: true })
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Make the pass durable.
    pub(crate) fn commit(mut self) -> Result<()> {
        self.open = false;
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    /// Discard the pass.
    pub(crate) fn rollback(mut self) -> Result<()> {
        self.open = false;
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }
}

impl Drop for TrimTxn {
    fn drop(&mut self) {
        if self.open {
            let _ = self.conn.execute_batch("ROLLBACK");
        }
    }
}
