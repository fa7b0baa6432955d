//! Per-key view errors.

use crate::registry::RegistryError;
use crate::scope::ScopeError;
use crate::store::MalformedRecord;
use thiserror::Error;

/// A problem with one key that did not stop the rest of the query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    /// A requested repository is not in the registry.
    #[error(transparent)]
    NotFound(#[from] RegistryError),

    /// A record was excluded because it does not fit its scope.
    #[error(transparent)]
    InconsistentScope(#[from] ScopeError),

    /// A stored row could not be decoded and was skipped.
    #[error(transparent)]
    Malformed(#[from] MalformedRecord),
}
