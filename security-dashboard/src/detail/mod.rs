//! Per-source time series.
//!
//! Detail views list every snapshot of one source for the selected
//! repositories, oldest first. Points keep the source's native scope: a
//! repository-wide reading has no branch, a branch reading is labeled with
//! the branch's role.

use crate::registry::{BranchRole, Registry};
use crate::resolver::fetch_snapshots;
use crate::scope::{Placement, ScopeShape};
use crate::snapshot::{Snapshot, Source, SourceKey};
use crate::store::{SnapshotStore, StoreError};
use crate::view::{QueryOptions, Selection, ViewError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info_span, Instrument};

/// One reading in a detail series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailPoint<V> {
    pub org: String,

    #[serde(rename = "repository")]
    pub repo: String,

    /// `None` for repository-wide readings.
    pub branch: Option<String>,

    /// Normalized branch tag, when the reading is branch specific.
    pub branch_role: Option<BranchRole>,

    pub timestamp: DateTime<Utc>,

    #[serde(skip)]
    pub sequence: u64,

    pub value: V,
}

impl<V> DetailPoint<V> {
    fn sort_key(&self) -> (&str, &str, u8, DateTime<Utc>, u64) {
        (
            &self.org,
            &self.repo,
            self.branch_role.map_or(0, |role| role.order()),
            self.timestamp,
            self.sequence,
        )
    }
}

/// Time series of one source.
#[derive(Debug, Clone, PartialEq)]
pub struct History<V> {
    points: Vec<DetailPoint<V>>,
    errors: Vec<ViewError>,
}

impl<V> History<V> {
    /// Points ordered by repository, branch role, then time.
    pub fn points(&self) -> std::slice::Iter<'_, DetailPoint<V>> {
        self.points.iter()
    }

    /// Registry misses, excluded records and undecodable rows.
    pub fn errors(&self) -> &[ViewError] {
        &self.errors
    }
}

fn point<S: Source>(
    snapshot: Snapshot<SourceKey<S>, S::Value>,
    role: Option<BranchRole>,
) -> DetailPoint<S::Value> {
    let repo = S::Scope::repo(&snapshot.key);
    DetailPoint {
        org: repo.org.clone(),
        repo: repo.repo.clone(),
        branch: S::Scope::branch(&snapshot.key).map(str::to_string),
        branch_role: role,
        timestamp: snapshot.timestamp,
        sequence: snapshot.sequence,
        value: snapshot.value,
    }
}

/// Lists every snapshot of source `S` for the selected repositories.
///
/// Snapshots on untracked branches are reported as
/// [`ViewError::InconsistentScope`] and left out of the series. Rows the
/// store could not decode are reported as [`ViewError::Malformed`].
///
/// # Errors
///
/// Returns [`StoreError`] if the source cannot be read.
pub async fn history<S, T>(
    store: &T,
    registry: &Registry,
    selection: &Selection,
    options: &QueryOptions,
) -> Result<History<S::Value>, StoreError>
where
    S: Source,
    T: SnapshotStore,
{
    let span = info_span!("history", source = %S::KIND);

    async {
        let (repos, mut errors) = selection.resolve(registry);
        let selected: BTreeSet<_> = repos.iter().map(|m| &m.key).collect();
        let fetched = fetch_snapshots::<S, T>(store, options.store_timeout()).await?;

        errors.extend(
            fetched
                .rejected
                .into_iter()
                .filter(|e| selected.contains(e.repo()))
                .map(ViewError::InconsistentScope),
        );

        let mut points = Vec::new();
        for snapshot in fetched.snapshots {
            if !selected.contains(S::Scope::repo(&snapshot.key)) {
                continue;
            }
            match S::Scope::place(S::KIND, &snapshot.key, registry) {
                Ok(Placement::Unregistered) => {}
                Ok(Placement::Repo) => points.push(point::<S>(snapshot, None)),
                Ok(Placement::Branch(role)) => points.push(point::<S>(snapshot, Some(role))),
                Err(e) => errors.push(ViewError::InconsistentScope(e)),
            }
        }
        points.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        errors.extend(
            fetched
                .malformed
                .into_iter()
                .filter(|m| m.repo.as_ref().map_or(true, |repo| selected.contains(repo)))
                .map(ViewError::Malformed),
        );

        debug!(points = points.len(), errors = errors.len(), "Built detail series");
        Ok(History { points, errors })
    }
    .instrument(span)
    .await
}
