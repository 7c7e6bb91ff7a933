//! # cnlog Core
//!
//! Core primitives for the cnlog change-number index: the record types
//! stored per sequence number and the codecs that turn them into ordered
//! keys and durable bytes.
//!
//! ## Key Types
//!
//! - [`DomainId`] - Identifier of a replicated naming context
//! - [`ChangeId`] - Opaque token for one replicated change within its domain
//! - [`LogRecord`] - The `(value, domain, change)` tuple stored per sequence number
//! - [`CodecError`] - Typed encode/decode failures
//!
//! ## Design Notes
//!
//! - Sequence keys are fixed-width big-endian, so the store's raw byte
//!   ordering is the numeric ordering of the sequence numbers.
//! - Records are CBOR; encode/decode round-trips exactly.
//! - This crate performs no I/O.

pub mod codec;
pub mod error;
pub mod types;

pub use codec::{decode_record, decode_seq_key, encode_record, encode_seq_key, SEQ_KEY_LEN};
pub use error::CodecError;
pub use types::{ChangeId, DomainId, LogRecord};
