//! Key and record codecs for the change-number index.
//!
//! The underlying store orders entries by raw key bytes, so the sequence
//! number is encoded big-endian at a fixed width: byte order then equals
//! numeric order for every pair of keys, including across digit-count
//! boundaries where a decimal text encoding would mis-sort (99 vs 100).
//!
//! Records are encoded as CBOR. The encoding must round-trip exactly; a
//! record that fails to decode is surfaced as a typed error, never a panic.

use crate::error::{CodecError, Result};
use crate::types::LogRecord;

/// Fixed width of an encoded sequence key.
pub const SEQ_KEY_LEN: usize = 8;

/// Encode a sequence number as an order-preserving key.
pub fn encode_seq_key(seq: u64) -> [u8; SEQ_KEY_LEN] {
    seq.to_be_bytes()
}

/// Decode a sequence key back to its sequence number.
pub fn decode_seq_key(bytes: &[u8]) -> Result<u64> {
    let arr: [u8; SEQ_KEY_LEN] = bytes.try_into().map_err(|_| CodecError::MalformedKey {
        expected: SEQ_KEY_LEN,
        actual: bytes.len(),
    })?;
    Ok(u64::from_be_bytes(arr))
}

/// Encode a record for storage.
pub fn encode_record(record: &LogRecord) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(record, &mut buf).map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(buf)
}

/// Decode a stored record.
pub fn decode_record(bytes: &[u8]) -> Result<LogRecord> {
    ciborium::from_reader(bytes).map_err(|e| CodecError::Decode(e.to_string()))
}
