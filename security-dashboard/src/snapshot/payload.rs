//! Snapshot payloads reported by each kind of source.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-severity alert counts from one scanner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
}

impl SeverityCounts {
    /// Creates a set of counts.
    pub fn new(critical: u32, high: u32, medium: u32, low: u32) -> Self {
        Self {
            critical,
            high,
            medium,
            low,
        }
    }
}

impl fmt::Display for SeverityCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "critical={} high={} medium={} low={}",
            self.critical, self.high, self.medium, self.low
        )
    }
}

/// Pass/fail label derived from a CI run's success flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestOutcome {
    Pass,
    Fail,
}

impl TestOutcome {
    /// Returns the label as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "Pass",
            Self::Fail => "Fail",
        }
    }
}

impl From<bool> for TestOutcome {
    fn from(success: bool) -> Self {
        if success {
            Self::Pass
        } else {
            Self::Fail
        }
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Test status reading for a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestStatus {
    /// Whether every tracked test workflow succeeded.
    pub success: bool,

    /// Workflow files that were considered for this reading.
    #[serde(default)]
    pub workflow_paths: Vec<String>,
}

impl TestStatus {
    /// The derived Pass/Fail label.
    #[must_use]
    pub fn outcome(&self) -> TestOutcome {
        TestOutcome::from(self.success)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.outcome().as_str())
    }
}

/// Coverage reading for a branch at one commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coverage {
    /// Line coverage percentage.
    pub percent: f64,

    /// Commit the coverage was measured at, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

impl fmt::Display for Coverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}%", self.percent)
    }
}

/// Container image scan reading for a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageScan {
    /// Image tags that were scanned.
    #[serde(default)]
    pub image_tags: Vec<String>,

    /// Vulnerability counts across the scanned images.
    pub counts: SeverityCounts,
}

impl fmt::Display for ImageScan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.counts, f)
    }
}

/// Payload of a stored snapshot record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    TestStatus(TestStatus),
    Coverage(Coverage),
    /// Number of outstanding dependency update requests.
    DependencyUpdates { count: u32 },
    Alerts(SeverityCounts),
    ImageScan(ImageScan),
}

impl Payload {
    /// Short name of the payload variant, for diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TestStatus(_) => "test_status",
            Self::Coverage(_) => "coverage",
            Self::DependencyUpdates { .. } => "dependency_updates",
            Self::Alerts(_) => "alerts",
            Self::ImageScan(_) => "image_scan",
        }
    }
}
