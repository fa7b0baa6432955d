//! Scope discrimination and normalization.
//!
//! Sources report either per repository ([`RepoScoped`]) or per branch
//! ([`BranchScoped`]). Before values can be joined on the uniform
//! `(org, repo, branch)` key, repository-wide values are broadcast onto both
//! tracked branches and branch values are checked against the registry.

mod error;

pub use error::ScopeError;

use crate::registry::{BranchRole, Registry, TrackedBranches};
use crate::resolver::Latest;
use crate::snapshot::{BranchKey, RepoKey, Snapshot, SourceKind};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

/// Untyped key shape of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// One value per repository.
    Repo,
    /// One value per branch.
    Branch,
}

/// Where a snapshot key lands relative to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// The repository is not tracked; the snapshot is ignored.
    Unregistered,
    /// Applies to the whole repository.
    Repo,
    /// Applies to one tracked branch.
    Branch(BranchRole),
}

/// Values re-keyed onto the branch axis.
#[derive(Debug, Clone)]
pub struct Normalized<V> {
    values: BTreeMap<BranchKey, Snapshot<BranchKey, V>>,
    excluded: Vec<ScopeError>,
}

impl<V> Normalized<V> {
    /// Value for a branch key, if any.
    #[must_use]
    pub fn get(&self, key: &BranchKey) -> Option<&Snapshot<BranchKey, V>> {
        self.values.get(key)
    }

    /// Records that were left out because they reference untracked branches.
    #[must_use]
    pub fn excluded(&self) -> &[ScopeError] {
        &self.excluded
    }

    /// Number of branch keys with a value.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no branch key has a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Consumes the values, returning the excluded records.
    pub fn into_excluded(self) -> Vec<ScopeError> {
        self.excluded
    }
}

/// Compile-time key shape of a source.
pub trait ScopeShape {
    /// Key type of snapshots with this shape.
    type Key: Ord + Clone + fmt::Debug + fmt::Display;

    /// Builds a key from a stored record's fields.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError`] if the presence of `branch` contradicts the shape.
    fn key_for(
        source: SourceKind,
        org: String,
        repo: String,
        branch: Option<String>,
    ) -> Result<Self::Key, ScopeError>;

    /// Repository part of a key.
    fn repo(key: &Self::Key) -> &RepoKey;

    /// Branch part of a key, if the shape has one.
    fn branch(key: &Self::Key) -> Option<&str>;

    /// Places a key relative to the registry.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::UntrackedBranch`] for a tracked repository whose
    /// branch is neither of its tracked branches.
    fn place(
        source: SourceKind,
        key: &Self::Key,
        registry: &Registry,
    ) -> Result<Placement, ScopeError>;

    /// Re-keys latest values onto the `(org, repo, branch)` axis.
    fn normalize<V: Clone>(
        source: SourceKind,
        latest: Latest<Self::Key, V>,
        registry: &Registry,
    ) -> Normalized<V>;
}

/// Marker for sources reporting one value per repository.
#[derive(Debug, Clone, Copy)]
pub struct RepoScoped;

/// Marker for sources reporting one value per branch.
#[derive(Debug, Clone, Copy)]
pub struct BranchScoped;

impl ScopeShape for RepoScoped {
    type Key = RepoKey;

    fn key_for(
        source: SourceKind,
        org: String,
        repo: String,
        branch: Option<String>,
    ) -> Result<Self::Key, ScopeError> {
        let repo = RepoKey { org, repo };
        match branch {
            None => Ok(repo),
            Some(branch) => Err(ScopeError::UnexpectedBranch {
                kind: source,
                repo,
                branch,
            }),
        }
    }

    fn repo(key: &Self::Key) -> &RepoKey {
        key
    }

    fn branch(_key: &Self::Key) -> Option<&str> {
        None
    }

    fn place(
        _source: SourceKind,
        key: &Self::Key,
        registry: &Registry,
    ) -> Result<Placement, ScopeError> {
        if registry.contains(key) {
            Ok(Placement::Repo)
        } else {
            Ok(Placement::Unregistered)
        }
    }

    fn normalize<V: Clone>(
        source: SourceKind,
        latest: Latest<Self::Key, V>,
        registry: &Registry,
    ) -> Normalized<V> {
        let mut values = BTreeMap::new();

        for snapshot in latest {
            match registry.list_tracked_branches(&snapshot.key) {
                Ok(branches) => values.extend(broadcast(&snapshot, branches)),
                Err(_) => {
                    debug!(
                        source = %source,
                        repo = %snapshot.key,
                        "Ignoring unregistered repository"
                    );
                }
            }
        }

        Normalized {
            values,
            excluded: Vec::new(),
        }
    }
}

impl ScopeShape for BranchScoped {
    type Key = BranchKey;

    fn key_for(
        source: SourceKind,
        org: String,
        repo: String,
        branch: Option<String>,
    ) -> Result<Self::Key, ScopeError> {
        let repo = RepoKey { org, repo };
        match branch {
            Some(branch) => Ok(BranchKey { repo, branch }),
            None => Err(ScopeError::MissingBranch { kind: source, repo }),
        }
    }

    fn repo(key: &Self::Key) -> &RepoKey {
        &key.repo
    }

    fn branch(key: &Self::Key) -> Option<&str> {
        Some(&key.branch)
    }

    fn place(
        source: SourceKind,
        key: &Self::Key,
        registry: &Registry,
    ) -> Result<Placement, ScopeError> {
        let Ok(branches) = registry.list_tracked_branches(&key.repo) else {
            return Ok(Placement::Unregistered);
        };
        branches
            .role_of(&key.branch)
            .map(Placement::Branch)
            .ok_or_else(|| ScopeError::UntrackedBranch {
                kind: source,
                key: key.clone(),
            })
    }

    fn normalize<V: Clone>(
        source: SourceKind,
        latest: Latest<Self::Key, V>,
        registry: &Registry,
    ) -> Normalized<V> {
        let mut values = BTreeMap::new();
        let mut excluded = Vec::new();

        for snapshot in latest {
            match Self::place(source, &snapshot.key, registry) {
                Ok(Placement::Branch(_)) => {
                    values.insert(snapshot.key.clone(), snapshot);
                }
                Ok(_) => {
                    debug!(
                        source = %source,
                        key = %snapshot.key,
                        "Ignoring unregistered repository"
                    );
                }
                Err(e) => {
                    warn!(source = %source, error = %e, "Excluding record from aggregation");
                    excluded.push(e);
                }
            }
        }

        Normalized { values, excluded }
    }
}

/// Replicates a repository-wide value onto every tracked branch.
///
/// The same reading appearing on both the primary and secondary row is the
/// intended result, not a duplicate.
pub fn broadcast<V: Clone>(
    snapshot: &Snapshot<RepoKey, V>,
    branches: &TrackedBranches,
) -> BTreeMap<BranchKey, Snapshot<BranchKey, V>> {
    branches
        .iter()
        .map(|(_, name)| {
            let key = snapshot.key.branch(name);
            (key.clone(), snapshot.rekey(key))
        })
        .collect()
}
