//! Repository registry.
//!
//! Maps each tracked `(org, repo)` to its primary and secondary branch. The
//! registry is what synthesizes the branch axis: every registered repository
//! gets two rows, whether or not any snapshot mentions those branches yet.

mod error;
mod metadata;

pub use error::RegistryError;
pub use metadata::{BranchRole, RepoMetadata, TrackedBranches};

use crate::snapshot::RepoKey;
use std::collections::BTreeMap;
use tracing::debug;

/// Immutable set of tracked repositories.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    repos: BTreeMap<RepoKey, RepoMetadata>,
}

impl Registry {
    /// Builds a registry from metadata entries.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] if a repository appears twice and
    /// [`RegistryError::SameBranch`] if its two tracked branches are equal.
    pub fn new(entries: impl IntoIterator<Item = RepoMetadata>) -> Result<Self, RegistryError> {
        let mut repos = BTreeMap::new();

        for entry in entries {
            if entry.branches.primary == entry.branches.secondary {
                return Err(RegistryError::SameBranch {
                    repo: entry.key,
                    branch: entry.branches.primary,
                });
            }
            if repos.contains_key(&entry.key) {
                return Err(RegistryError::Duplicate { repo: entry.key });
            }
            debug!(
                repo = %entry.key,
                primary = %entry.branches.primary,
                secondary = %entry.branches.secondary,
                "Registered repository"
            );
            repos.insert(entry.key.clone(), entry);
        }

        Ok(Self { repos })
    }

    /// Returns the primary and secondary branch of a repository.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the repository is not tracked.
    pub fn list_tracked_branches(
        &self,
        repo: &RepoKey,
    ) -> Result<&TrackedBranches, RegistryError> {
        self.get(repo).map(|metadata| &metadata.branches)
    }

    /// Returns the metadata of a repository.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the repository is not tracked.
    pub fn get(&self, repo: &RepoKey) -> Result<&RepoMetadata, RegistryError> {
        self.repos.get(repo).ok_or_else(|| RegistryError::NotFound {
            repo: repo.clone(),
        })
    }

    /// Whether the repository is tracked.
    #[must_use]
    pub fn contains(&self, repo: &RepoKey) -> bool {
        self.repos.contains_key(repo)
    }

    /// All tracked repositories, ordered by `(org, repo)`.
    pub fn iter(&self) -> impl Iterator<Item = &RepoMetadata> {
        self.repos.values()
    }

    /// Number of tracked repositories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.repos.len()
    }

    /// Returns true if no repositories are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }
}
