//! Snapshot store access.
//!
//! The store is owned by the ingestion side: records are appended by
//! adapters and never changed afterwards. The engine only ever reads it,
//! one source at a time, through [`SnapshotStore::fetch`].

mod error;
mod memory;
mod sqlite;

pub use error::{MalformedRecord, StoreError};
pub use memory::MemoryStore;
pub use sqlite::{init_schema, SqliteStore};

use crate::snapshot::{Payload, RepoKey, SnapshotRecord, SourceKind};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Every record of one source, plus the rows that could not be decoded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceRecords {
    pub records: Vec<SnapshotRecord>,
    pub malformed: Vec<MalformedRecord>,
}

impl From<Vec<SnapshotRecord>> for SourceRecords {
    fn from(records: Vec<SnapshotRecord>) -> Self {
        Self {
            records,
            malformed: Vec::new(),
        }
    }
}

/// Read access to an append-only snapshot store.
pub trait SnapshotStore: Send + Sync {
    /// Returns every record of one source.
    ///
    /// Each record carries the ingestion sequence number the store assigned
    /// when it was appended. Rows that exist but cannot be decoded go to
    /// [`SourceRecords::malformed`] instead of failing the read.
    fn fetch(
        &self,
        source: SourceKind,
    ) -> impl Future<Output = Result<SourceRecords, StoreError>> + Send;
}

impl<T: SnapshotStore> SnapshotStore for Arc<T> {
    fn fetch(
        &self,
        source: SourceKind,
    ) -> impl Future<Output = Result<SourceRecords, StoreError>> + Send {
        self.as_ref().fetch(source)
    }
}

/// Reads one source, giving up after `timeout`.
///
/// # Errors
///
/// Returns [`StoreError::Timeout`] if the read does not finish in time, or
/// whatever error the store reported.
pub async fn fetch_with_timeout<T: SnapshotStore>(
    store: &T,
    source: SourceKind,
    timeout: Duration,
) -> Result<SourceRecords, StoreError> {
    match tokio::time::timeout(timeout, store.fetch(source)).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout {
            kind: source,
            after: timeout,
        }),
    }
}

/// A reading to append; the store assigns its sequence number.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSnapshot {
    pub repo: RepoKey,
    pub branch: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub payload: Payload,
}

impl NewSnapshot {
    /// A repository-wide reading.
    pub fn repo(repo: RepoKey, timestamp: DateTime<Utc>, payload: Payload) -> Self {
        Self {
            repo,
            branch: None,
            timestamp,
            payload,
        }
    }

    /// A reading for one branch.
    pub fn branch(
        repo: RepoKey,
        branch: impl Into<String>,
        timestamp: DateTime<Utc>,
        payload: Payload,
    ) -> Self {
        Self {
            repo,
            branch: Some(branch.into()),
            timestamp,
            payload,
        }
    }

    fn into_record(self, sequence: u64) -> SnapshotRecord {
        SnapshotRecord {
            org: self.repo.org,
            repo: self.repo.repo,
            branch: self.branch,
            timestamp: self.timestamp,
            sequence,
            payload: self.payload,
        }
    }
}

/// Checks that a payload belongs to the source it is appended to.
fn check_payload(source: SourceKind, snapshot: &NewSnapshot) -> Result<(), StoreError> {
    if source.accepts(&snapshot.payload) {
        Ok(())
    } else {
        Err(StoreError::PayloadMismatch {
            kind: source,
            found: snapshot.payload.kind(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future;

    struct StalledStore;

    impl SnapshotStore for StalledStore {
        fn fetch(
            &self,
            _source: SourceKind,
        ) -> impl Future<Output = Result<SourceRecords, StoreError>> + Send {
            future::pending()
        }
    }

    #[tokio::test]
    async fn slow_reads_time_out() {
        let result = fetch_with_timeout(
            &StalledStore,
            SourceKind::Coverage,
            Duration::from_millis(10),
        )
        .await;

        let err = result.unwrap_err();
        assert!(matches!(err, StoreError::Timeout { .. }));
        assert!(err.is_retryable());
    }
}
