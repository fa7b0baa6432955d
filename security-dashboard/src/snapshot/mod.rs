//! Snapshot data model.
//!
//! A snapshot is one timestamped reading from one source for one key. The
//! store hands out untyped [`SnapshotRecord`]s; [`decode`] turns them into
//! typed [`Snapshot`]s whose key shape is fixed by the [`Source`].

mod key;
mod payload;
mod source;

pub use key::{BranchKey, RepoKey};
pub use payload::{Coverage, ImageScan, Payload, SeverityCounts, TestOutcome, TestStatus};
pub use source::{
    CodeScanSource, CoverageSource, DependencyAlertSource, DependencyUpdateSource,
    ImageScanSource, Source, SourceKey, SourceKind, TestStatusSource,
};

use crate::scope::{ScopeError, ScopeShape};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A record as stored, before its scope has been checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub org: String,
    pub repo: String,

    /// Branch the reading applies to; `None` for repository-wide readings.
    pub branch: Option<String>,

    pub timestamp: DateTime<Utc>,

    /// Ingestion sequence number assigned by the store. Strictly increasing
    /// within one source; breaks ties between equal timestamps.
    pub sequence: u64,

    pub payload: Payload,
}

/// A typed snapshot keyed by `K`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot<K, V> {
    pub key: K,
    pub timestamp: DateTime<Utc>,
    pub sequence: u64,
    pub value: V,
}

impl<K, V> Snapshot<K, V> {
    /// Ordering used by latest-wins: timestamp first, then ingestion sequence.
    pub fn recency(&self) -> (DateTime<Utc>, u64) {
        (self.timestamp, self.sequence)
    }

    /// Moves the reading onto another key, keeping its time and value.
    pub fn rekey<K2>(&self, key: K2) -> Snapshot<K2, V>
    where
        V: Clone,
    {
        Snapshot {
            key,
            timestamp: self.timestamp,
            sequence: self.sequence,
            value: self.value.clone(),
        }
    }
}

/// Decodes a stored record as a snapshot of source `S`.
///
/// # Errors
///
/// Returns [`ScopeError`] when the record's branch field does not fit the
/// source's key shape, or when it carries another source's payload.
pub fn decode<S: Source>(
    record: SnapshotRecord,
) -> Result<Snapshot<SourceKey<S>, S::Value>, ScopeError> {
    let SnapshotRecord {
        org,
        repo,
        branch,
        timestamp,
        sequence,
        payload,
    } = record;

    let key = S::Scope::key_for(S::KIND, org, repo, branch)?;
    let found = payload.kind();
    let value = S::extract(payload).ok_or_else(|| ScopeError::WrongPayload {
        kind: S::KIND,
        repo: S::Scope::repo(&key).clone(),
        found,
    })?;

    Ok(Snapshot {
        key,
        timestamp,
        sequence,
        value,
    })
}
