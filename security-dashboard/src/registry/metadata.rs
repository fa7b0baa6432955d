//! Repository metadata and tracked branches.

use crate::snapshot::{BranchKey, RepoKey};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which of the two tracked branches a branch is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchRole {
    /// The stable line, e.g. `main`.
    Primary,
    /// The development line, e.g. `develop`.
    Secondary,
}

impl BranchRole {
    /// Sort position within a repository: 1 for primary, 2 for secondary.
    #[must_use]
    pub fn order(&self) -> u8 {
        match self {
            Self::Primary => 1,
            Self::Secondary => 2,
        }
    }

    /// Returns the role as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

impl fmt::Display for BranchRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two branches tracked for a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedBranches {
    pub primary: String,
    pub secondary: String,
}

impl TrackedBranches {
    /// Creates the pair.
    pub fn new(primary: impl Into<String>, secondary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            secondary: secondary.into(),
        }
    }

    /// Name of the branch with the given role.
    #[must_use]
    pub fn name(&self, role: BranchRole) -> &str {
        match role {
            BranchRole::Primary => &self.primary,
            BranchRole::Secondary => &self.secondary,
        }
    }

    /// Role of a branch name, if it is one of the tracked branches.
    #[must_use]
    pub fn role_of(&self, branch: &str) -> Option<BranchRole> {
        if branch == self.primary {
            Some(BranchRole::Primary)
        } else if branch == self.secondary {
            Some(BranchRole::Secondary)
        } else {
            None
        }
    }

    /// Both branches, primary first.
    pub fn iter(&self) -> impl Iterator<Item = (BranchRole, &str)> {
        [BranchRole::Primary, BranchRole::Secondary]
            .into_iter()
            .map(move |role| (role, self.name(role)))
    }
}

/// Registry entry for one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoMetadata {
    pub key: RepoKey,

    pub branches: TrackedBranches,

    /// Free-form category, e.g. "core" or "support".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl RepoMetadata {
    /// Creates metadata for a repository.
    pub fn new(
        org: impl Into<String>,
        repo: impl Into<String>,
        primary_branch: impl Into<String>,
        secondary_branch: impl Into<String>,
    ) -> Self {
        Self {
            key: RepoKey::new(org, repo),
            branches: TrackedBranches::new(primary_branch, secondary_branch),
            category: None,
        }
    }

    /// Sets the category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// The two candidate row keys for this repository, primary first.
    pub fn branch_keys(&self) -> impl Iterator<Item = (BranchRole, BranchKey)> + '_ {
        self.branches
            .iter()
            .map(move |(role, name)| (role, self.key.branch(name)))
    }
}
