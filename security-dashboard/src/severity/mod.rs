//! Severity aggregation across alert sources.
//!
//! Three scanners report alert counts: dependency alerts (per repository),
//! code scanning and container image scans (per branch). After the
//! repository-wide source has been broadcast onto branches, the critical and
//! high counts of the three are summed per branch.
//!
//! A source with no data for a key adds 0 to the sum. Which sources actually
//! reported is kept in [`AlertBreakdown`] so callers can still tell "no
//! scanner data at all" apart from a clean result.

use crate::scope::{Normalized, ScopeError};
use crate::snapshot::{BranchKey, ImageScan, SeverityCounts};
use serde::Serialize;

/// Critical and high totals for one branch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityTotals {
    pub critical: u64,
    pub high: u64,
}

/// Latest counts of each alert source for one branch.
///
/// Medium and low are kept per source; only critical and high are summed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlertBreakdown {
    pub dependency_alerts: Option<SeverityCounts>,
    pub code_scanning: Option<SeverityCounts>,
    pub image_scanning: Option<SeverityCounts>,
}

impl AlertBreakdown {
    fn sources(&self) -> [Option<&SeverityCounts>; 3] {
        [
            self.dependency_alerts.as_ref(),
            self.code_scanning.as_ref(),
            self.image_scanning.as_ref(),
        ]
    }

    /// Sums critical and high, counting missing sources as 0.
    #[must_use]
    pub fn totals(&self) -> SeverityTotals {
        let [dependency, code, image] = self.sources();
        aggregate(dependency, code, image)
    }

    /// Number of sources that have reported for this branch.
    #[must_use]
    pub fn reporting(&self) -> usize {
        self.sources().iter().flatten().count()
    }

    /// Whether at least one source has reported.
    #[must_use]
    pub fn has_data(&self) -> bool {
        self.reporting() > 0
    }
}

/// Sums same-severity counts from the three alert sources.
///
/// Missing sources contribute 0.
#[must_use]
pub fn aggregate(
    dependency: Option<&SeverityCounts>,
    code_scan: Option<&SeverityCounts>,
    image_scan: Option<&SeverityCounts>,
) -> SeverityTotals {
    [dependency, code_scan, image_scan]
        .into_iter()
        .flatten()
        .fold(SeverityTotals::default(), |totals, counts| SeverityTotals {
            critical: totals.critical + u64::from(counts.critical),
            high: totals.high + u64::from(counts.high),
        })
}

/// Normalized latest values of the three alert sources.
#[derive(Debug, Clone)]
pub struct AlertSources {
    dependency_alerts: Normalized<SeverityCounts>,
    code_scanning: Normalized<SeverityCounts>,
    image_scanning: Normalized<ImageScan>,
}

impl AlertSources {
    /// Groups the three sources, all already keyed by branch.
    pub fn new(
        dependency_alerts: Normalized<SeverityCounts>,
        code_scanning: Normalized<SeverityCounts>,
        image_scanning: Normalized<ImageScan>,
    ) -> Self {
        Self {
            dependency_alerts,
            code_scanning,
            image_scanning,
        }
    }

    /// Per-source latest counts for a branch.
    #[must_use]
    pub fn breakdown(&self, key: &BranchKey) -> AlertBreakdown {
        AlertBreakdown {
            dependency_alerts: self.dependency_alerts.get(key).map(|s| s.value),
            code_scanning: self.code_scanning.get(key).map(|s| s.value),
            image_scanning: self.image_scanning.get(key).map(|s| s.value.counts),
        }
    }

    /// Critical and high totals for a branch.
    #[must_use]
    pub fn aggregate(&self, key: &BranchKey) -> SeverityTotals {
        self.breakdown(key).totals()
    }

    /// Records excluded from any of the three sources.
    pub fn into_excluded(self) -> Vec<ScopeError> {
        let mut excluded = self.dependency_alerts.into_excluded();
        excluded.extend(self.code_scanning.into_excluded());
        excluded.extend(self.image_scanning.into_excluded());
        excluded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_critical_and_high_only() {
        let totals = aggregate(
            Some(&SeverityCounts::new(1, 0, 9, 9)),
            Some(&SeverityCounts::new(2, 1, 9, 9)),
            Some(&SeverityCounts::new(1, 3, 9, 9)),
        );

        assert_eq!(totals, SeverityTotals { critical: 4, high: 4 });
    }

    #[test]
    fn missing_sources_contribute_zero() {
        let partial = aggregate(None, Some(&SeverityCounts::new(2, 1, 0, 0)), None);
        assert_eq!(partial, SeverityTotals { critical: 2, high: 1 });

        let none = aggregate(None, None, None);
        assert_eq!(none, SeverityTotals::default());
    }

    #[test]
    fn breakdown_distinguishes_no_data_from_zero() {
        let empty = AlertBreakdown::default();
        let clean = AlertBreakdown {
            code_scanning: Some(SeverityCounts::default()),
            ..Default::default()
        };

        assert_eq!(empty.totals(), clean.totals());
        assert!(!empty.has_data());
        assert!(clean.has_data());
        assert_eq!(clean.reporting(), 1);
    }

    #[test]
    fn totals_do_not_overflow_u32() {
        let big = SeverityCounts::new(u32::MAX, u32::MAX, 0, 0);
        let totals = aggregate(Some(&big), Some(&big), Some(&big));
        assert_eq!(totals.critical, 3 * u64::from(u32::MAX));
    }
}
