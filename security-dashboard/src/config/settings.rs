//! Configuration file deserialization.

use serde::Deserialize;
use std::path::PathBuf;

/// Snapshot store settings, the `[store]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StoreSettings {
    /// Path to the SQLite snapshot database. Relative paths are resolved
    /// against the configuration file's directory.
    pub path: PathBuf,

    /// Upper bound on each store read, in seconds (defaults to 30).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// One `[[repos]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RepoEntry {
    pub org: String,
    pub repo: String,

    /// Primary branch (defaults to "main").
    #[serde(default = "default_main_branch")]
    pub main_branch: String,

    /// Secondary branch (defaults to "develop").
    #[serde(default = "default_dev_branch")]
    pub dev_branch: String,

    /// Free-form category such as `core` or `support`.
    #[serde(rename = "type")]
    pub category: Option<String>,
}

pub(crate) fn default_timeout_secs() -> u64 {
    crate::view::DEFAULT_STORE_TIMEOUT.as_secs()
}

pub(crate) fn default_main_branch() -> String {
    "main".to_string()
}

pub(crate) fn default_dev_branch() -> String {
    "develop".to_string()
}
