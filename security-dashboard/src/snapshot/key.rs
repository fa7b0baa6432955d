//! Snapshot keys for the two scoping granularities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a repository: `(org, repo)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RepoKey {
    /// Organization or user that owns the repository.
    pub org: String,

    /// Repository name.
    pub repo: String,
}

impl RepoKey {
    /// Creates a repository key.
    pub fn new(org: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            repo: repo.into(),
        }
    }

    /// Keys a branch of this repository.
    pub fn branch(&self, branch: impl Into<String>) -> BranchKey {
        BranchKey {
            repo: self.clone(),
            branch: branch.into(),
        }
    }
}

impl fmt::Display for RepoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.org, self.repo)
    }
}

/// Identity of one branch of a repository: `(org, repo, branch)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BranchKey {
    /// Repository the branch belongs to.
    pub repo: RepoKey,

    /// Branch name.
    pub branch: String,
}

impl BranchKey {
    /// Creates a branch key.
    pub fn new(
        org: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        RepoKey::new(org, repo).branch(branch)
    }
}

impl fmt::Display for BranchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.repo, self.branch)
    }
}
