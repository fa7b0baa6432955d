//! Query options.

use std::time::Duration;

/// Default bound on each store read.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(30);

/// Options applied to one query.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Maximum time to wait for each source read.
    store_timeout: Duration,
}

impl QueryOptions {
    /// Creates options with the given store timeout.
    pub fn new(store_timeout: Duration) -> Self {
        Self { store_timeout }
    }

    /// Returns the store timeout.
    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::new(DEFAULT_STORE_TIMEOUT)
    }
}
