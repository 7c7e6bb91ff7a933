//! # cnlog Store
//!
//! Durable sequence-number store for the cnlog change-number index: an
//! ordered, transactional (sequence number → change record) log that
//! external directory clients page through with gap-tolerant cursors.
//!
//! ## Overview
//!
//! The replication server constructs one [`SequenceStore`] per index,
//! passing the shared [`ChangelogEnv`] and an [`ErrorSink`]. Writers call
//! [`SequenceStore::append`]; readers open a [`ReadCursor`] at a starting
//! sequence number and iterate; the trimming process opens a
//! [`DeleteCursor`], deletes records behind its retention threshold, and
//! commits by closing it. `clear` and `shutdown` wait for in-flight
//! operations (including open cursors) before tearing the handle down, so
//! no operation ever observes a handle mid-destruction.
//!
//! ## Key Types
//!
//! - [`SequenceStore`] - Append, count, boundary lookups, cursor factories,
//!   and the close/clear/shutdown protocol
//! - [`ReadCursor`] - Non-transactional forward iterator with nearest-key
//!   fallback
//! - [`DeleteCursor`] - Transactional forward iterator for trimming
//! - [`ChangelogEnv`] - The SQLite-backed storage environment
//! - [`ErrorSink`] - The owning server's callback for absorbed faults
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cnlog_core::{ChangeId, DomainId};
//! use cnlog_store::{ChangelogEnv, LogSink, SequenceStore};
//!
//! fn example() -> cnlog_store::Result<()> {
//!     let env = Arc::new(ChangelogEnv::open("changelog.db")?);
//!     let store = SequenceStore::open(env, "draft_cn", Arc::new(LogSink))?;
//!
//!     store.append(1, "cookie", &DomainId::from("o=test"), &ChangeId::from("0152"));
//!
//!     let mut cursor = store.open_read_cursor(1)?;
//!     while cursor.advance() {
//!         // process cursor.current_key() / cursor.current_change_id()
//!     }
//!     cursor.close();
//!     store.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Availability over strictness**: append, count, and boundary lookups
//!   never raise; a closed store yields safe defaults and engine faults go
//!   to the [`ErrorSink`].
//! - **Relaxed durability**: appends commit durably to the write-ahead log
//!   without forcing a media sync, bounding crash loss instead of paying a
//!   sync per write.
//! - **Cursor discipline**: cursors hold the lifecycle guard shared for
//!   their lifetime and must be closed promptly; close/abort consume the
//!   cursor so misuse does not compile.

pub mod cursor;
pub mod env;
pub mod error;
mod guard;
pub mod sink;
pub mod store;

pub use cursor::{DeleteCursor, ReadCursor};
pub use env::ChangelogEnv;
pub use error::{Result, StoreError};
pub use sink::{ErrorSink, LogSink};
pub use store::SequenceStore;
