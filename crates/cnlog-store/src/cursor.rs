//! Forward cursors over the sequence store.
//!
//! Both cursors hold the lifecycle guard in shared mode for their whole
//! lifetime, so a `clear` or `shutdown` cannot tear the handle down under
//! them; conversely, a cursor held open indefinitely stalls those
//! operations, so callers must close promptly.
//!
//! [`ReadCursor`] is non-transactional and favors availability: a fault
//! while advancing is reported to the error sink and the cursor reports
//! exhaustion. [`DeleteCursor`] runs a dedicated transaction and raises
//! faults, because trimming must distinguish "no more records" from a
//! storage fault. Close/abort consume the cursor, so double-close and
//! use-after-close are unrepresentable.

use cnlog_core::{ChangeId, DomainId, LogRecord};

use crate::env::TrimTxn;
use crate::error::{Result, StoreError};
use crate::guard::SharedGuard;
use crate::store::{
    delete_key, fetch_after, fetch_at_or_after, fetch_exact, fetch_first, SequenceStore,
};

/// Iteration state. `Pending` means the next advance must land exactly on
/// the recorded key: the nearest-following-record contract for callers
/// whose requested start was trimmed away.
enum Position {
    /// Before the first record; no lower bound.
    Start,
    /// The next advance yields exactly this key.
    Pending(u64),
    /// Positioned on a record.
    At { key: u64, record: LogRecord },
    /// Exhausted or closed.
    Done,
}

/// Read-only forward cursor starting at or after a chosen sequence number.
pub struct ReadCursor<'db> {
    store: &'db SequenceStore,
    guard: Option<SharedGuard<'db>>,
    pos: Position,
}

impl<'db> ReadCursor<'db> {
    pub(crate) fn new(store: &'db SequenceStore, start: i64) -> Result<Self> {
        let guard = store.lock().acquire_shared();
        let Some(handle) = guard.handle().cloned() else {
            // Closed store: an immediately exhausted cursor holding nothing.
            return Ok(Self {
                store,
                guard: None,
                pos: Position::Done,
            });
        };

        if start < 0 {
            return Ok(Self {
                store,
                guard: Some(guard),
                pos: Position::Start,
            });
        }

        let start = start as u64;
        // Exact hit becomes the initial current record; otherwise the
        // nearest following key is served by the first advance. The guard
        // is released by drop on every error path.
        let pos = match handle.with_conn(|conn| fetch_exact(conn, handle.name(), start))? {
            Some(record) => Position::At { key: start, record },
            None => {
                match handle.with_conn(|conn| fetch_at_or_after(conn, handle.name(), start))? {
                    Some((key, _)) => Position::Pending(key),
                    None => return Err(StoreError::NotAvailable { seq: start }),
                }
            }
        };

        Ok(Self {
            store,
            guard: Some(guard),
            pos,
        })
    }

    /// Move to the next record in key order.
    ///
    /// Returns `false` when exhausted or closed; an engine fault is
    /// reported to the error sink and also ends the iteration.
    pub fn advance(&mut self) -> bool {
        let Some(handle) = self.guard.as_ref().and_then(|g| g.handle()).cloned() else {
            self.pos = Position::Done;
            return false;
        };

        let next = match &self.pos {
            Position::Done => return false,
            Position::Start => handle.with_conn(|conn| fetch_first(conn, handle.name())),
            Position::Pending(key) => {
                let key = *key;
                handle.with_conn(|conn| fetch_at_or_after(conn, handle.name(), key))
            }
            Position::At { key, .. } => {
                let key = *key;
                handle.with_conn(|conn| fetch_after(conn, handle.name(), key))
            }
        };

        match next {
            Ok(Some((key, record))) => {
                self.pos = Position::At { key, record };
                true
            }
            Ok(None) => {
                self.pos = Position::Done;
                false
            }
            Err(err) => {
                self.store.sink().unexpected_storage_failure(&err);
                self.pos = Position::Done;
                false
            }
        }
    }

    /// Sequence number of the current record.
    pub fn current_key(&self) -> Option<u64> {
        match &self.pos {
            Position::At { key, .. } => Some(*key),
            _ => None,
        }
    }

    /// Value field of the current record.
    pub fn current_value(&self) -> Option<&str> {
        self.current_record().map(|r| r.value.as_str())
    }

    /// Domain of the current record.
    pub fn current_domain_id(&self) -> Option<&DomainId> {
        self.current_record().map(|r| &r.domain_id)
    }

    /// Replication change identifier of the current record.
    pub fn current_change_id(&self) -> Option<&ChangeId> {
        self.current_record().map(|r| &r.change_id)
    }

    fn current_record(&self) -> Option<&LogRecord> {
        match &self.pos {
            Position::At { record, .. } => Some(record),
            _ => None,
        }
    }

    /// Release the cursor and its shared hold on the store.
    ///
    /// Dropping the cursor does the same; `close` exists so call sites can
    /// make the release explicit.
    pub fn close(self) {}
}

/// Forward cursor that deletes records under a dedicated transaction.
pub struct DeleteCursor<'db> {
    store: &'db SequenceStore,
    guard: Option<SharedGuard<'db>>,
    txn: Option<TrimTxn>,
    log: String,
    pos: Position,
}

impl<'db> DeleteCursor<'db> {
    pub(crate) fn new(store: &'db SequenceStore) -> Result<Self> {
        let guard = store.lock().acquire_shared();
        let Some(handle) = guard.handle().cloned() else {
            return Ok(Self {
                store,
                guard: None,
                txn: None,
                log: String::new(),
                pos: Position::Done,
            });
        };

        // A begin failure releases the shared hold before surfacing.
        let txn = store.env().begin_transaction()?;
        Ok(Self {
            store,
            guard: Some(guard),
            txn: Some(txn),
            log: handle.name().to_string(),
            pos: Position::Start,
        })
    }

    /// Move to the next record in key order.
    ///
    /// Unlike the read cursor, engine faults are raised: the trimming
    /// caller must be able to tell exhaustion from a storage fault.
    pub fn advance(&mut self) -> Result<bool> {
        let Some(txn) = self.txn.as_ref() else {
            return Ok(false);
        };

        let next = match &self.pos {
            Position::Done => return Ok(false),
            Position::Start => fetch_first(txn.conn(), &self.log)?,
            Position::Pending(key) => fetch_at_or_after(txn.conn(), &self.log, *key)?,
            Position::At { key, .. } => fetch_after(txn.conn(), &self.log, *key)?,
        };

        match next {
            Some((key, record)) => {
                self.pos = Position::At { key, record };
                Ok(true)
            }
            None => {
                self.pos = Position::Done;
                Ok(false)
            }
        }
    }

    /// Delete the record at the current position within the cursor's
    /// transaction.
    pub fn delete(&mut self) -> Result<()> {
        let Some(txn) = self.txn.as_ref() else {
            return Err(StoreError::CursorClosed);
        };
        let Position::At { key, .. } = &self.pos else {
            return Err(StoreError::NotPositioned);
        };
        delete_key(txn.conn(), &self.log, *key)
    }

    /// Sequence number of the current record.
    pub fn current_key(&self) -> Option<u64> {
        match &self.pos {
            Position::At { key, .. } => Some(*key),
            _ => None,
        }
    }

    /// Value field of the current record.
    pub fn current_value(&self) -> Option<&str> {
        self.current_record().map(|r| r.value.as_str())
    }

    /// Domain of the current record.
    pub fn current_domain_id(&self) -> Option<&DomainId> {
        self.current_record().map(|r| &r.domain_id)
    }

    /// Replication change identifier of the current record.
    pub fn current_change_id(&self) -> Option<&ChangeId> {
        self.current_record().map(|r| &r.change_id)
    }

    fn current_record(&self) -> Option<&LogRecord> {
        match &self.pos {
            Position::At { record, .. } => Some(record),
            _ => None,
        }
    }

    /// Commit the trim and release the cursor.
    ///
    /// The shared hold is released first, then the transaction commits;
    /// commit faults are reported through the error sink.
    pub fn close(mut self) {
        self.guard.take();
        if let Some(txn) = self.txn.take() {
            if let Err(err) = txn.commit() {
                self.store.sink().unexpected_storage_failure(&err);
            }
        }
    }

    /// Discard the trim and release the cursor.
    ///
    /// For use after any fault signaled by the transaction layer during
    /// active use; partial progress is rolled back. Dropping an unclosed
    /// cursor rolls back as well.
    pub fn abort(mut self) {
        self.guard.take();
        if let Some(txn) = self.txn.take() {
            if let Err(err) = txn.rollback() {
                self.store.sink().unexpected_storage_failure(&err);
            }
        }
    }
}
