//! Aggregated output rows.

use crate::registry::BranchRole;
use crate::severity::AlertBreakdown;
use crate::snapshot::TestOutcome;
use serde::Serialize;
use std::fmt;

/// A metric value, or an explicit marker that no snapshot exists.
///
/// Serializes as the bare value, or `null` for [`Reading::NoData`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reading<T> {
    Value(T),
    NoData,
}

impl<T> Reading<T> {
    /// The value, if present.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Value(value) => Some(value),
            Self::NoData => None,
        }
    }

    /// Returns true if no snapshot was found.
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData)
    }
}

impl<T> From<Option<T>> for Reading<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::NoData, Self::Value)
    }
}

impl<T: fmt::Display> fmt::Display for Reading<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => fmt::Display::fmt(value, f),
            Self::NoData => f.write_str("no data"),
        }
    }
}

/// Current state of one tracked branch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedRow {
    pub org: String,

    #[serde(rename = "repository")]
    pub repo: String,

    pub branch: String,

    /// Whether this is the primary or secondary branch of the repository.
    pub branch_role: BranchRole,

    pub test_status: Reading<TestOutcome>,

    /// Coverage percentage.
    pub coverage: Reading<f64>,

    /// Outstanding dependency updates for the repository.
    pub dependencies: Reading<u32>,

    /// Critical alerts summed across the three scanners.
    pub sec_critical: u64,

    /// High alerts summed across the three scanners.
    pub sec_high: u64,

    /// Latest per-scanner counts behind the two totals.
    pub alerts: AlertBreakdown,
}

impl AggregatedRow {
    /// 1 for the primary branch, 2 for the secondary.
    #[must_use]
    pub fn branch_order(&self) -> u8 {
        self.branch_role.order()
    }

    /// Output ordering: `(org, repo, branch_order)`.
    pub fn sort_key(&self) -> (&str, &str, u8) {
        (&self.org, &self.repo, self.branch_order())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_data_serializes_as_null() {
        let value = serde_json::to_value(Reading::<u32>::NoData).unwrap();
        assert!(value.is_null());

        let value = serde_json::to_value(Reading::Value(3u32)).unwrap();
        assert_eq!(value, 3);
    }

    #[test]
    fn no_data_is_not_zero() {
        assert_ne!(Reading::Value(0u32), Reading::NoData);
        assert_eq!(Reading::<u32>::from(None).to_string(), "no data");
        assert_eq!(Reading::Value(0u32).value(), Some(&0));
        assert_eq!(Reading::<u32>::NoData.value(), None);
    }
}
