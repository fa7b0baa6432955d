//! Configuration loading.
//!
//! The dashboard is configured through a single TOML file naming the snapshot
//! database and the tracked repositories:
//!
//! ```toml
//! [store]
//! path = "snapshots.db"
//! timeout-secs = 30
//!
//! [[repos]]
//! org = "acme"
//! repo = "api"
//! main-branch = "main"
//! dev-branch = "develop"
//! type = "core"
//! ```
//!
//! Nothing here is global: the loaded file is turned into a [`Registry`] and
//! [`QueryOptions`] that callers pass into each query.

mod error;
mod settings;

pub use error::ConfigError;
pub use settings::{RepoEntry, StoreSettings};

use crate::registry::{Registry, RepoMetadata};
use crate::snapshot::RepoKey;
use crate::view::QueryOptions;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// A parsed and validated configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DashboardConfig {
    pub store: StoreSettings,

    #[serde(default)]
    pub repos: Vec<RepoEntry>,

    /// Directory the file was loaded from.
    #[serde(skip)]
    base_dir: PathBuf,
}

impl DashboardConfig {
    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is missing, cannot be parsed, or
    /// fails validation.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading configuration");

        if !path.exists() {
            return Err(ConfigError::MissingFile {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        let config = Self::parse(&content, path)?;
        info!(
            path = %path.display(),
            repos = config.repos.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parses and validates configuration text; `path` is used for error
    /// messages and to resolve a relative store path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the text cannot be parsed or fails
    /// validation.
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content).map_err(|e| ConfigError::TomlError {
            path: path.display().to_string(),
            source: e,
        })?;
        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::ValidationError {
            path: path.display().to_string(),
            message,
        };

        if self.store.timeout_secs == 0 {
            return Err(invalid("store.timeout-secs must be positive".to_string()));
        }

        if self.store.path.as_os_str().is_empty() {
            return Err(invalid("store.path must not be empty".to_string()));
        }

        if self.repos.is_empty() {
            return Err(invalid("at least one [[repos]] entry is required".to_string()));
        }

        let mut seen = BTreeSet::new();
        for entry in &self.repos {
            let fields = [
                ("org", &entry.org),
                ("repo", &entry.repo),
                ("main-branch", &entry.main_branch),
                ("dev-branch", &entry.dev_branch),
            ];
            if let Some((name, _)) = fields.iter().find(|(_, value)| value.trim().is_empty()) {
                return Err(invalid(format!("{name} must not be empty")));
            }

            let key = RepoKey::new(entry.org.as_str(), entry.repo.as_str());
            if entry.main_branch == entry.dev_branch {
                return Err(invalid(format!(
                    "{key}: main-branch and dev-branch must be different"
                )));
            }
            if !seen.insert(key.clone()) {
                return Err(invalid(format!("{key} is listed more than once")));
            }
        }

        Ok(())
    }

    /// Builds the repository registry.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Registry`] if the entries are inconsistent.
    /// A validated configuration always builds.
    pub fn registry(&self) -> Result<Registry, ConfigError> {
        let entries = self.repos.iter().map(|entry| {
            let metadata = RepoMetadata::new(
                entry.org.as_str(),
                entry.repo.as_str(),
                entry.main_branch.as_str(),
                entry.dev_branch.as_str(),
            );
            match &entry.category {
                Some(category) => metadata.with_category(category.as_str()),
                None => metadata,
            }
        });
        Ok(Registry::new(entries)?)
    }

    /// Query options derived from the `[store]` table.
    #[must_use]
    pub fn query_options(&self) -> QueryOptions {
        QueryOptions::new(Duration::from_secs(self.store.timeout_secs))
    }

    /// Snapshot database path, resolved against the file's directory.
    #[must_use]
    pub fn store_path(&self) -> PathBuf {
        self.base_dir.join(&self.store.path)
    }
}
