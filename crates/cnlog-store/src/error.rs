//! Error types for the store.

use thiserror::Error;

/// Errors that can occur while operating the sequence store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Key or record codec error.
    #[error("codec error: {0}")]
    Codec(#[from] cnlog_core::CodecError),

    /// No record exists at or after the requested sequence number.
    #[error("change number {seq} is not available")]
    NotAvailable { seq: u64 },

    /// A delete cursor was used after it reported closed.
    #[error("cursor is already closed")]
    CursorClosed,

    /// A delete was requested while the cursor holds no current record.
    #[error("cursor is not positioned on a record")]
    NotPositioned,

    /// A log name is not a valid identifier.
    #[error("invalid log name: {0:?}")]
    InvalidLogName(String),

    /// A connection lock was poisoned by a panicking holder.
    #[error("connection lock poisoned")]
    Poisoned,
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
