//! Error sink: the owning server's callback for unexpected storage faults.
//!
//! The hot data paths (append, boundary lookups) favor availability over
//! strict error surfacing: an engine fault degrades the operation to a safe
//! default and is reported here instead of being raised to the caller. The
//! owning server decides whether a report is logged, alarmed, or escalated
//! to a broader shutdown.

use crate::error::StoreError;

/// Receiver for storage faults that were absorbed on an availability path.
pub trait ErrorSink: Send + Sync {
    /// Called with every absorbed engine fault.
    fn unexpected_storage_failure(&self, error: &StoreError);
}

/// Default sink: reports through the tracing subscriber.
#[derive(Debug, Default)]
pub struct LogSink;

impl ErrorSink for LogSink {
    fn unexpected_storage_failure(&self, error: &StoreError) {
        tracing::error!("unexpected storage failure: {}", error);
    }
}
