//! Summary counts for a composed view.

use super::error::ViewError;
use super::row::AggregatedRow;

/// Counts describing how complete a composed view is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewSummary {
    /// Number of rows.
    pub rows: usize,

    /// Requested repositories missing from the registry.
    pub repositories_missing: usize,

    /// Records excluded for not fitting their scope.
    pub records_excluded: usize,

    /// Stored rows skipped because they could not be decoded.
    pub records_malformed: usize,

    /// Rows without a test status snapshot.
    pub rows_without_tests: usize,

    /// Rows without a coverage snapshot.
    pub rows_without_coverage: usize,

    /// Rows for which none of the alert sources has reported.
    pub rows_without_alert_data: usize,
}

impl ViewSummary {
    /// Tallies rows and per-key errors.
    pub fn tally(rows: &[AggregatedRow], errors: &[ViewError]) -> Self {
        let mut summary = Self {
            rows: rows.len(),
            ..Default::default()
        };

        for row in rows {
            summary.rows_without_tests += usize::from(row.test_status.is_no_data());
            summary.rows_without_coverage += usize::from(row.coverage.is_no_data());
            summary.rows_without_alert_data += usize::from(!row.alerts.has_data());
        }

        for error in errors {
            match error {
                ViewError::NotFound(_) => summary.repositories_missing += 1,
                ViewError::InconsistentScope(_) => summary.records_excluded += 1,
                ViewError::Malformed(_) => summary.records_malformed += 1,
            }
        }

        summary
    }
}
