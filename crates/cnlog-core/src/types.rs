//! Strong type definitions for the change-number index.
//!
//! All identifiers are newtypes to prevent misuse at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a replicated naming context (a domain subtree).
///
/// Every record in the index remembers which domain its change belongs to,
/// so that external clients paging through the log can route follow-up
/// queries to the right domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainId(String);

impl DomainId {
    /// Create a new DomainId.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DomainId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DomainId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Opaque identifier of one replicated change within its domain.
///
/// The replication engine mints these as sortable tokens; the index stores
/// and returns them without interpreting their internals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeId(String);

impl ChangeId {
    /// Create a new ChangeId from the engine's token.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChangeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ChangeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The record stored under one sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Caller-supplied payload associated with the change.
    pub value: String,
    /// The domain the change belongs to.
    pub domain_id: DomainId,
    /// The replicated change this sequence number maps to.
    pub change_id: ChangeId,
}

impl LogRecord {
    /// Build a record from its three fields.
    pub fn new(
        value: impl Into<String>,
        domain_id: impl Into<DomainId>,
        change_id: impl Into<ChangeId>,
    ) -> Self {
        Self {
            value: value.into(),
            domain_id: domain_id.into(),
            change_id: change_id.into(),
        }
    }
}
