//! Snapshot store error types.

use crate::snapshot::{RepoKey, SourceKind};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while reading from or appending to a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be read.
    #[error("Snapshot store unavailable while reading {kind}: {message}")]
    Unavailable { kind: SourceKind, message: String },

    /// A read did not complete in time.
    #[error("Timed out after {after:?} reading {kind}")]
    Timeout { kind: SourceKind, after: Duration },

    /// The payload does not belong to the source it was appended to.
    #[error("{kind} does not accept {found} payloads")]
    PayloadMismatch {
        kind: SourceKind,
        found: &'static str,
    },

    /// The record cannot be stored in the source's layout.
    #[error("Invalid {kind} record: {message}")]
    InvalidRecord { kind: SourceKind, message: String },

    /// The database could not be opened for reading.
    #[error("Snapshot store unavailable at '{path}': {source}")]
    Unreachable {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    /// SQLite error while opening or writing the database.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    /// Whether the caller may retry the same query later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable { .. } | Self::Timeout { .. } | Self::Unreachable { .. }
        )
    }
}

/// A stored row that could not be decoded.
///
/// Reported per record alongside the query result; it never fails the read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Malformed {kind} row {row}: {message}")]
pub struct MalformedRecord {
    pub kind: SourceKind,

    /// Row identifier in the store.
    pub row: i64,

    /// Repository the row names, when that much could be read.
    pub repo: Option<RepoKey>,

    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_errors_are_retryable() {
        assert!(StoreError::Timeout {
            kind: SourceKind::Coverage,
            after: Duration::from_secs(1),
        }
        .is_retryable());
        assert!(StoreError::Unavailable {
            kind: SourceKind::Coverage,
            message: "gone".to_string(),
        }
        .is_retryable());
        assert!(!StoreError::PayloadMismatch {
            kind: SourceKind::Coverage,
            found: "alerts",
        }
        .is_retryable());
    }
}
