//! Source identifiers and the typed source descriptors.

use super::payload::{Coverage, ImageScan, Payload, SeverityCounts, TestStatus};
use crate::scope::{BranchScoped, RepoScoped, ScopeKind, ScopeShape};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The external data sources the engine reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// CI test workflow results.
    TestStatus,
    /// Coverage service history.
    Coverage,
    /// Outstanding dependency update requests.
    DependencyUpdates,
    /// Dependency vulnerability alerts.
    DependencyAlerts,
    /// Static code scanner alerts.
    CodeScanning,
    /// Container image vulnerability scans.
    ImageScanning,
}

impl SourceKind {
    /// Every source, in a stable order.
    pub const ALL: [SourceKind; 6] = [
        SourceKind::TestStatus,
        SourceKind::Coverage,
        SourceKind::DependencyUpdates,
        SourceKind::DependencyAlerts,
        SourceKind::CodeScanning,
        SourceKind::ImageScanning,
    ];

    /// Returns the source as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TestStatus => "test_status",
            Self::Coverage => "coverage",
            Self::DependencyUpdates => "dependency_updates",
            Self::DependencyAlerts => "dependency_alerts",
            Self::CodeScanning => "code_scanning",
            Self::ImageScanning => "image_scanning",
        }
    }

    /// The native key shape of the source.
    #[must_use]
    pub fn scope(&self) -> ScopeKind {
        match self {
            Self::DependencyUpdates | Self::DependencyAlerts => ScopeKind::Repo,
            Self::TestStatus | Self::Coverage | Self::CodeScanning | Self::ImageScanning => {
                ScopeKind::Branch
            }
        }
    }

    /// Whether a payload is the kind this source reports.
    #[must_use]
    pub fn accepts(&self, payload: &Payload) -> bool {
        matches!(
            (self, payload),
            (Self::TestStatus, Payload::TestStatus(_))
                | (Self::Coverage, Payload::Coverage(_))
                | (Self::DependencyUpdates, Payload::DependencyUpdates { .. })
                | (Self::DependencyAlerts, Payload::Alerts(_))
                | (Self::CodeScanning, Payload::Alerts(_))
                | (Self::ImageScanning, Payload::ImageScan(_))
        )
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed view over one [`SourceKind`].
///
/// The key shape is fixed by [`Source::Scope`], so a repository-scoped source
/// can only ever be resolved into [`RepoKey`](super::RepoKey)s and has to go
/// through the normalizer before it can be joined with branch data.
pub trait Source {
    /// Key shape of the source.
    type Scope: ScopeShape;

    /// Value carried by each snapshot.
    type Value: Clone + fmt::Debug + fmt::Display + Serialize;

    /// The untyped source identifier.
    const KIND: SourceKind;

    /// Pulls the typed value out of a stored payload.
    fn extract(payload: Payload) -> Option<Self::Value>;
}

/// Key type of a source.
pub type SourceKey<S> = <<S as Source>::Scope as ScopeShape>::Key;

/// CI test status, per branch.
#[derive(Debug, Clone, Copy)]
pub struct TestStatusSource;

impl Source for TestStatusSource {
    type Scope = BranchScoped;
    type Value = TestStatus;
    const KIND: SourceKind = SourceKind::TestStatus;

    fn extract(payload: Payload) -> Option<Self::Value> {
        match payload {
            Payload::TestStatus(status) => Some(status),
            _ => None,
        }
    }
}

/// Coverage percentage, per branch.
#[derive(Debug, Clone, Copy)]
pub struct CoverageSource;

impl Source for CoverageSource {
    type Scope = BranchScoped;
    type Value = Coverage;
    const KIND: SourceKind = SourceKind::Coverage;

    fn extract(payload: Payload) -> Option<Self::Value> {
        match payload {
            Payload::Coverage(coverage) => Some(coverage),
            _ => None,
        }
    }
}

/// Outstanding dependency updates, per repository.
#[derive(Debug, Clone, Copy)]
pub struct DependencyUpdateSource;

impl Source for DependencyUpdateSource {
    type Scope = RepoScoped;
    type Value = u32;
    const KIND: SourceKind = SourceKind::DependencyUpdates;

    fn extract(payload: Payload) -> Option<Self::Value> {
        match payload {
            Payload::DependencyUpdates { count } => Some(count),
            _ => None,
        }
    }
}

/// Dependency vulnerability alerts, per repository.
#[derive(Debug, Clone, Copy)]
pub struct DependencyAlertSource;

impl Source for DependencyAlertSource {
    type Scope = RepoScoped;
    type Value = SeverityCounts;
    const KIND: SourceKind = SourceKind::DependencyAlerts;

    fn extract(payload: Payload) -> Option<Self::Value> {
        match payload {
            Payload::Alerts(counts) => Some(counts),
            _ => None,
        }
    }
}

/// Static code scanner alerts, per branch.
#[derive(Debug, Clone, Copy)]
pub struct CodeScanSource;

impl Source for CodeScanSource {
    type Scope = BranchScoped;
    type Value = SeverityCounts;
    const KIND: SourceKind = SourceKind::CodeScanning;

    fn extract(payload: Payload) -> Option<Self::Value> {
        match payload {
            Payload::Alerts(counts) => Some(counts),
            _ => None,
        }
    }
}

/// Container image scans, per branch.
#[derive(Debug, Clone, Copy)]
pub struct ImageScanSource;

impl Source for ImageScanSource {
    type Scope = BranchScoped;
    type Value = ImageScan;
    const KIND: SourceKind = SourceKind::ImageScanning;

    fn extract(payload: Payload) -> Option<Self::Value> {
        match payload {
            Payload::ImageScan(scan) => Some(scan),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes_match_source_granularity() {
        assert_eq!(SourceKind::DependencyAlerts.scope(), ScopeKind::Repo);
        assert_eq!(SourceKind::DependencyUpdates.scope(), ScopeKind::Repo);
        assert_eq!(SourceKind::CodeScanning.scope(), ScopeKind::Branch);
        assert_eq!(SourceKind::ImageScanning.scope(), ScopeKind::Branch);
        assert_eq!(SourceKind::TestStatus.scope(), ScopeKind::Branch);
        assert_eq!(SourceKind::Coverage.scope(), ScopeKind::Branch);
    }

    #[test]
    fn alert_payloads_are_shared_by_two_sources() {
        let payload = Payload::Alerts(SeverityCounts::default());
        assert!(SourceKind::DependencyAlerts.accepts(&payload));
        assert!(SourceKind::CodeScanning.accepts(&payload));
        assert!(!SourceKind::ImageScanning.accepts(&payload));
    }

    #[test]
    fn extract_rejects_foreign_payloads() {
        let payload = Payload::DependencyUpdates { count: 3 };
        assert_eq!(DependencyUpdateSource::extract(payload.clone()), Some(3));
        assert!(CodeScanSource::extract(payload).is_none());
    }
}
