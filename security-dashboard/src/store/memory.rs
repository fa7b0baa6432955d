//! In-memory snapshot store.

use super::{check_payload, NewSnapshot, SnapshotStore, SourceRecords, StoreError};
use crate::snapshot::{SnapshotRecord, SourceKind};
use std::collections::HashMap;
use std::future::{self, Future};
use std::sync::{Arc, RwLock};

/// Append-only store held in memory.
///
/// Clones share the same records. Sequence numbers start at 1 and count
/// appends per source.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<HashMap<SourceKind, Vec<SnapshotRecord>>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a reading to a source, returning its sequence number.
    ///
    /// Only the payload kind is checked. Branch presence is left to the
    /// readers, which report records that do not fit the source's scope.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PayloadMismatch`] if the payload belongs to
    /// another source.
    pub fn append(&self, source: SourceKind, snapshot: NewSnapshot) -> Result<u64, StoreError> {
        check_payload(source, &snapshot)?;

        let mut records = self.records.write().map_err(|_| StoreError::Unavailable {
            kind: source,
            message: "store lock poisoned".to_string(),
        })?;
        let entries = records.entry(source).or_default();
        let sequence = entries.len() as u64 + 1;
        entries.push(snapshot.into_record(sequence));
        Ok(sequence)
    }

    fn read(&self, source: SourceKind) -> Result<SourceRecords, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::Unavailable {
            kind: source,
            message: "store lock poisoned".to_string(),
        })?;
        Ok(records.get(&source).cloned().unwrap_or_default().into())
    }
}

impl SnapshotStore for MemoryStore {
    fn fetch(
        &self,
        source: SourceKind,
    ) -> impl Future<Output = Result<SourceRecords, StoreError>> + Send {
        future::ready(self.read(source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{Payload, RepoKey, SeverityCounts};
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn assigns_increasing_sequences_per_source() {
        let store = MemoryStore::new();
        let repo = RepoKey::new("orgA", "repoX");
        let at = Utc.timestamp_opt(5, 0).unwrap();

        let first = store
            .append(
                SourceKind::DependencyUpdates,
                NewSnapshot::repo(repo.clone(), at, Payload::DependencyUpdates { count: 1 }),
            )
            .unwrap();
        let second = store
            .append(
                SourceKind::DependencyUpdates,
                NewSnapshot::repo(repo.clone(), at, Payload::DependencyUpdates { count: 2 }),
            )
            .unwrap();
        let other = store
            .append(
                SourceKind::DependencyAlerts,
                NewSnapshot::repo(repo, at, Payload::Alerts(SeverityCounts::default())),
            )
            .unwrap();

        assert_eq!((first, second, other), (1, 2, 1));
        let fetched = store.fetch(SourceKind::DependencyUpdates).await.unwrap();
        assert_eq!(fetched.records.len(), 2);
        assert!(fetched.malformed.is_empty());
    }

    #[test]
    fn rejects_foreign_payload() {
        let store = MemoryStore::new();
        let result = store.append(
            SourceKind::Coverage,
            NewSnapshot::branch(
                RepoKey::new("orgA", "repoX"),
                "main",
                Utc.timestamp_opt(5, 0).unwrap(),
                Payload::DependencyUpdates { count: 1 },
            ),
        );
        assert!(matches!(result, Err(StoreError::PayloadMismatch { .. })));
    }

    #[tokio::test]
    async fn empty_source_reads_as_empty() {
        let store = MemoryStore::new();
        let fetched = store.fetch(SourceKind::TestStatus).await.unwrap();
        assert_eq!(fetched, SourceRecords::default());
    }
}
