//! Latest-value resolution.
//!
//! Every metric in the dashboard is "the most recent snapshot for key K".
//! [`Latest`] is that deduplication, written once over any ordered key.
//!
//! Ties on timestamp are broken by the store-assigned ingestion sequence: the
//! snapshot ingested last wins. Two snapshots with identical timestamp and
//! sequence can only come from merged inputs; the one seen first is kept.

use crate::scope::ScopeError;
use crate::snapshot::{decode, Snapshot, Source, SourceKey};
use crate::store::{fetch_with_timeout, MalformedRecord, SnapshotStore, StoreError};
use std::collections::btree_map::{self, BTreeMap, Entry};
use std::time::Duration;
use tracing::{debug, warn};

/// The most recent snapshot per distinct key.
#[derive(Debug, Clone)]
pub struct Latest<K, V> {
    by_key: BTreeMap<K, Snapshot<K, V>>,
}

impl<K: Ord + Clone, V> Latest<K, V> {
    /// Keeps the latest snapshot of each key.
    pub fn from_snapshots(snapshots: impl IntoIterator<Item = Snapshot<K, V>>) -> Self {
        let mut by_key: BTreeMap<K, Snapshot<K, V>> = BTreeMap::new();

        for snapshot in snapshots {
            match by_key.entry(snapshot.key.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(snapshot);
                }
                Entry::Occupied(mut slot) => {
                    if snapshot.recency() > slot.get().recency() {
                        slot.insert(snapshot);
                    }
                }
            }
        }

        Self { by_key }
    }

    /// The latest snapshot for `key`, or `None` if the source never reported it.
    #[must_use]
    pub fn latest(&self, key: &K) -> Option<&Snapshot<K, V>> {
        self.by_key.get(key)
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    /// Returns true if there are no snapshots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

impl<K, V> Default for Latest<K, V> {
    fn default() -> Self {
        Self {
            by_key: BTreeMap::new(),
        }
    }
}

impl<K, V> IntoIterator for Latest<K, V> {
    type Item = Snapshot<K, V>;
    type IntoIter = btree_map::IntoValues<K, Snapshot<K, V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.by_key.into_values()
    }
}

/// Decoded snapshots of one source plus the records that could not be used.
#[derive(Debug, Clone)]
pub struct Fetched<K, V> {
    pub snapshots: Vec<Snapshot<K, V>>,
    pub rejected: Vec<ScopeError>,
    pub malformed: Vec<MalformedRecord>,
}

/// Latest values of one source plus the records that could not be used.
#[derive(Debug, Clone)]
pub struct Resolved<K, V> {
    pub latest: Latest<K, V>,
    pub rejected: Vec<ScopeError>,
    pub malformed: Vec<MalformedRecord>,
}

/// Reads every snapshot of source `S` and decodes it.
///
/// Records whose shape does not match the source are logged and returned in
/// [`Fetched::rejected`] instead of failing the read; rows the store could
/// not decode end up in [`Fetched::malformed`].
///
/// # Errors
///
/// Returns [`StoreError`] if the store cannot be read within `timeout`.
pub async fn fetch_snapshots<S, T>(
    store: &T,
    timeout: Duration,
) -> Result<Fetched<SourceKey<S>, S::Value>, StoreError>
where
    S: Source,
    T: SnapshotStore,
{
    let fetched = fetch_with_timeout(store, S::KIND, timeout).await?;
    debug!(
        source = %S::KIND,
        count = fetched.records.len(),
        malformed = fetched.malformed.len(),
        "Fetched snapshot records"
    );
    for row in &fetched.malformed {
        warn!(source = %S::KIND, error = %row, "Skipping malformed row");
    }

    let mut snapshots = Vec::with_capacity(fetched.records.len());
    let mut rejected = Vec::new();
    for record in fetched.records {
        match decode::<S>(record) {
            Ok(snapshot) => snapshots.push(snapshot),
            Err(e) => {
                warn!(source = %S::KIND, error = %e, "Excluding inconsistent record");
                rejected.push(e);
            }
        }
    }

    Ok(Fetched {
        snapshots,
        rejected,
        malformed: fetched.malformed,
    })
}

/// Resolves the latest snapshot per key for source `S`.
///
/// # Errors
///
/// Returns [`StoreError`] if the store cannot be read within `timeout`.
pub async fn resolve<S, T>(
    store: &T,
    timeout: Duration,
) -> Result<Resolved<SourceKey<S>, S::Value>, StoreError>
where
    S: Source,
    T: SnapshotStore,
{
    let fetched = fetch_snapshots::<S, T>(store, timeout).await?;
    Ok(Resolved {
        latest: Latest::from_snapshots(fetched.snapshots),
        rejected: fetched.rejected,
        malformed: fetched.malformed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{
        BranchKey, CodeScanSource, Payload, RepoKey, SeverityCounts, SourceKind,
    };
    use crate::store::{MemoryStore, NewSnapshot};
    use chrono::{TimeZone, Utc};

    fn snapshot(branch: &str, secs: i64, sequence: u64, value: u32) -> Snapshot<BranchKey, u32> {
        Snapshot {
            key: BranchKey::new("orgA", "repoX", branch),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            sequence,
            value,
        }
    }

    #[test]
    fn picks_maximum_timestamp() {
        let latest = Latest::from_snapshots([
            snapshot("main", 1, 1, 10),
            snapshot("main", 5, 2, 50),
            snapshot("main", 3, 3, 30),
        ]);

        let key = BranchKey::new("orgA", "repoX", "main");
        assert_eq!(latest.latest(&key).unwrap().value, 50);
        assert_eq!(latest.len(), 1);
    }

    #[test]
    fn later_ingestion_wins_timestamp_ties() {
        let forward =
            Latest::from_snapshots([snapshot("main", 5, 1, 1), snapshot("main", 5, 2, 2)]);
        let backward =
            Latest::from_snapshots([snapshot("main", 5, 2, 2), snapshot("main", 5, 1, 1)]);

        let key = BranchKey::new("orgA", "repoX", "main");
        assert_eq!(forward.latest(&key).unwrap().value, 2);
        assert_eq!(backward.latest(&key).unwrap().value, 2);
    }

    #[test]
    fn keys_are_resolved_independently() {
        let latest = Latest::from_snapshots([
            snapshot("main", 9, 1, 9),
            snapshot("dev", 2, 2, 2),
            snapshot("main", 1, 3, 1),
        ]);

        assert_eq!(latest.len(), 2);
        assert_eq!(
            latest
                .latest(&BranchKey::new("orgA", "repoX", "dev"))
                .unwrap()
                .value,
            2
        );
    }

    #[test]
    fn absent_key_is_none() {
        let latest: Latest<BranchKey, u32> = Latest::from_snapshots([snapshot("main", 1, 1, 1)]);
        assert!(latest
            .latest(&BranchKey::new("orgA", "repoX", "dev"))
            .is_none());
    }

    #[tokio::test]
    async fn resolve_separates_inconsistent_records() {
        let store = MemoryStore::new();
        let at = |secs| Utc.timestamp_opt(secs, 0).unwrap();
        store
            .append(
                SourceKind::CodeScanning,
                NewSnapshot::branch(
                    RepoKey::new("orgA", "repoX"),
                    "main",
                    at(10),
                    Payload::Alerts(SeverityCounts::new(2, 1, 0, 0)),
                ),
            )
            .unwrap();
        store
            .append(
                SourceKind::CodeScanning,
                NewSnapshot::repo(
                    RepoKey::new("orgA", "repoX"),
                    at(11),
                    Payload::Alerts(SeverityCounts::new(9, 9, 9, 9)),
                ),
            )
            .unwrap();

        let resolved = resolve::<CodeScanSource, _>(&store, Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(resolved.latest.len(), 1);
        assert_eq!(resolved.rejected.len(), 1);
    }
}
