//! Which repositories a query covers.

use super::error::ViewError;
use crate::registry::{Registry, RegistryError, RepoMetadata};
use crate::snapshot::RepoKey;
use std::collections::BTreeSet;
use tracing::warn;

/// Repositories to include in a query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    /// Every tracked repository.
    #[default]
    All,

    /// Tracked repositories matching the given org and/or repository name.
    Matching {
        org: Option<String>,
        repo: Option<String>,
    },

    /// An explicit batch of repositories.
    Pairs(Vec<RepoKey>),
}

impl Selection {
    /// Every tracked repository.
    pub fn all() -> Self {
        Self::All
    }

    /// Tracked repositories filtered by org and/or repository name.
    pub fn matching(org: Option<String>, repo: Option<String>) -> Self {
        match (org, repo) {
            (None, None) => Self::All,
            (org, repo) => Self::Matching { org, repo },
        }
    }

    /// An explicit batch of repositories.
    pub fn pairs(repos: impl IntoIterator<Item = RepoKey>) -> Self {
        Self::Pairs(repos.into_iter().collect())
    }

    /// Looks the selection up in the registry.
    ///
    /// Returns the selected repositories in `(org, repo)` order along with a
    /// `NotFound` for every explicitly named repository that is not tracked.
    pub(crate) fn resolve<'a>(
        &self,
        registry: &'a Registry,
    ) -> (Vec<&'a RepoMetadata>, Vec<ViewError>) {
        match self {
            Self::All => (registry.iter().collect(), Vec::new()),
            Self::Matching { org, repo } => {
                let selected: Vec<_> = registry
                    .iter()
                    .filter(|m| org.as_ref().map_or(true, |org| &m.key.org == org))
                    .filter(|m| repo.as_ref().map_or(true, |repo| &m.key.repo == repo))
                    .collect();

                let mut errors = Vec::new();
                if let (Some(org), Some(repo), true) = (org, repo, selected.is_empty()) {
                    errors.push(not_found(RepoKey::new(org.clone(), repo.clone())));
                }
                (selected, errors)
            }
            Self::Pairs(repos) => {
                let mut selected = Vec::new();
                let mut errors = Vec::new();
                let unique: BTreeSet<&RepoKey> = repos.iter().collect();

                for key in unique {
                    match registry.get(key) {
                        Ok(metadata) => selected.push(metadata),
                        Err(e) => {
                            warn!(repo = %key, "Requested repository is not registered");
                            errors.push(ViewError::NotFound(e));
                        }
                    }
                }
                (selected, errors)
            }
        }
    }
}

fn not_found(repo: RepoKey) -> ViewError {
    warn!(repo = %repo, "Requested repository is not registered");
    ViewError::NotFound(RegistryError::NotFound { repo })
}
