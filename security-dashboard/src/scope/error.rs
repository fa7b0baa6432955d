//! Scope mismatch error types.

use crate::snapshot::{BranchKey, RepoKey, SourceKind};
use thiserror::Error;

/// A record that does not fit the scope of its source or the registry.
///
/// These are reported and excluded per record; they never abort a query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    /// A branch-scoped record names a branch that is neither tracked branch.
    #[error("{kind} record for {key} names an untracked branch")]
    UntrackedBranch { kind: SourceKind, key: BranchKey },

    /// A repository-scoped source reported a branch.
    #[error("{kind} is repository-scoped but the record for {repo} names branch '{branch}'")]
    UnexpectedBranch {
        kind: SourceKind,
        repo: RepoKey,
        branch: String,
    },

    /// A branch-scoped source reported no branch.
    #[error("{kind} is branch-scoped but the record for {repo} has no branch")]
    MissingBranch { kind: SourceKind, repo: RepoKey },

    /// The record carries another source's payload.
    #[error("{kind} record for {repo} carries a {found} payload")]
    WrongPayload {
        kind: SourceKind,
        repo: RepoKey,
        found: &'static str,
    },
}

impl ScopeError {
    /// Repository the offending record belongs to.
    #[must_use]
    pub fn repo(&self) -> &RepoKey {
        match self {
            Self::UntrackedBranch { key, .. } => &key.repo,
            Self::UnexpectedBranch { repo, .. }
            | Self::MissingBranch { repo, .. }
            | Self::WrongPayload { repo, .. } => repo,
        }
    }
}
