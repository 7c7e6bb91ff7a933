//! Error types for the core primitives.

use thiserror::Error;

/// Errors raised by the key and record codecs.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A stored key does not have the fixed encoded width.
    #[error("malformed sequence key: expected {expected} bytes, got {actual}")]
    MalformedKey { expected: usize, actual: usize },

    /// Record encoding failed.
    #[error("record encoding error: {0}")]
    Encode(String),

    /// Record decoding failed.
    #[error("record decoding error: {0}")]
    Decode(String),
}

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;
