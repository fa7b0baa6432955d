//! Registry error types.

use crate::snapshot::RepoKey;
use thiserror::Error;

/// Errors that can occur during registry lookups and construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The repository is not tracked.
    #[error("Repository {repo} is not registered")]
    NotFound { repo: RepoKey },

    /// The same repository was registered twice.
    #[error("Repository {repo} is registered more than once")]
    Duplicate { repo: RepoKey },

    /// Both tracked branches have the same name.
    #[error("Repository {repo} tracks '{branch}' as both primary and secondary branch")]
    SameBranch { repo: RepoKey, branch: String },
}
