//! View composition.
//!
//! Builds one [`AggregatedRow`] per `(org, repo, branch)` for every selected
//! repository: test status, coverage, dependency updates and the two summed
//! severity totals. The result is a pure function of the store contents, so
//! composing twice without intervening writes yields identical views.

mod error;
mod options;
mod row;
mod selection;
mod summary;

pub use error::ViewError;
pub use options::{QueryOptions, DEFAULT_STORE_TIMEOUT};
pub use row::{AggregatedRow, Reading};
pub use selection::Selection;
pub use summary::ViewSummary;

use crate::registry::{BranchRole, Registry, RegistryError};
use crate::resolver::{resolve, Resolved};
use crate::scope::{Normalized, ScopeError, ScopeShape};
use crate::severity::AlertSources;
use crate::snapshot::{
    BranchKey, CodeScanSource, Coverage, CoverageSource, DependencyAlertSource,
    DependencyUpdateSource, ImageScanSource, RepoKey, Source, SourceKey, TestStatus,
    TestStatusSource,
};
use crate::store::{MalformedRecord, SnapshotStore, StoreError};
use std::collections::BTreeSet;
use tracing::{debug, info, info_span, Instrument};

/// Rows of a query plus the per-key problems encountered.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedView {
    rows: Vec<AggregatedRow>,
    errors: Vec<ViewError>,
}

impl ComposedView {
    /// Rows ordered by `(org, repo, branch_order)`.
    ///
    /// The iterator can be cloned or requested again to re-enumerate.
    pub fn rows(&self) -> std::slice::Iter<'_, AggregatedRow> {
        self.rows.iter()
    }

    /// Every per-key error: registry misses first, then excluded records, then
    /// rows the store could not decode.
    pub fn errors(&self) -> &[ViewError] {
        &self.errors
    }

    /// Requested repositories that are not registered.
    pub fn missing(&self) -> impl Iterator<Item = &RepoKey> {
        self.errors.iter().filter_map(|e| match e {
            ViewError::NotFound(RegistryError::NotFound { repo }) => Some(repo),
            _ => None,
        })
    }

    /// Records excluded from aggregation.
    pub fn excluded(&self) -> impl Iterator<Item = &ScopeError> {
        self.errors.iter().filter_map(|e| match e {
            ViewError::InconsistentScope(scope) => Some(scope),
            _ => None,
        })
    }

    /// Stored rows skipped because they could not be decoded.
    pub fn malformed(&self) -> impl Iterator<Item = &MalformedRecord> {
        self.errors.iter().filter_map(|e| match e {
            ViewError::Malformed(record) => Some(record),
            _ => None,
        })
    }

    /// Summary counts of the view.
    #[must_use]
    pub fn summary(&self) -> ViewSummary {
        ViewSummary::tally(&self.rows, &self.errors)
    }
}

/// Latest values of every source, normalized onto the branch axis.
struct ViewInputs {
    tests: Normalized<TestStatus>,
    coverage: Normalized<Coverage>,
    dependencies: Normalized<u32>,
    alerts: AlertSources,
}

impl ViewInputs {
    fn row(&self, role: BranchRole, key: &BranchKey) -> AggregatedRow {
        let alerts = self.alerts.breakdown(key);
        let totals = alerts.totals();

        AggregatedRow {
            org: key.repo.org.clone(),
            repo: key.repo.repo.clone(),
            branch: key.branch.clone(),
            branch_role: role,
            test_status: self.tests.get(key).map(|s| s.value.outcome()).into(),
            coverage: self.coverage.get(key).map(|s| s.value.percent).into(),
            dependencies: self.dependencies.get(key).map(|s| s.value).into(),
            sec_critical: totals.critical,
            sec_high: totals.high,
            alerts,
        }
    }

    fn into_excluded(self) -> Vec<ScopeError> {
        let mut excluded = self.tests.into_excluded();
        excluded.extend(self.coverage.into_excluded());
        excluded.extend(self.dependencies.into_excluded());
        excluded.extend(self.alerts.into_excluded());
        excluded
    }
}

/// Records of every source that could not be used.
#[derive(Default)]
struct Unusable {
    rejected: Vec<ScopeError>,
    malformed: Vec<MalformedRecord>,
}

/// Collects unusable records and normalizes the latest values of `S`.
fn normalize<S: Source>(
    resolved: Resolved<SourceKey<S>, S::Value>,
    registry: &Registry,
    unusable: &mut Unusable,
) -> Normalized<S::Value> {
    unusable.rejected.extend(resolved.rejected);
    unusable.malformed.extend(resolved.malformed);
    S::Scope::normalize(S::KIND, resolved.latest, registry)
}

/// Composes the aggregate rows for the selected repositories.
///
/// Every selected repository yields exactly two rows, primary branch first,
/// even when no snapshot references either branch yet. Repositories named in
/// the selection but absent from the registry are reported as
/// [`ViewError::NotFound`] without affecting other rows; records that do not
/// fit their scope are reported as [`ViewError::InconsistentScope`] and left
/// out of the aggregate. Rows the store could not decode are skipped and
/// reported as [`ViewError::Malformed`].
///
/// # Errors
///
/// Returns [`StoreError`] only if a source cannot be read at all, in which
/// case no partial view is produced.
pub async fn compose_rows<T: SnapshotStore>(
    store: &T,
    registry: &Registry,
    selection: &Selection,
    options: &QueryOptions,
) -> Result<ComposedView, StoreError> {
    let span = info_span!("compose_rows", tracked = registry.len());

    async {
        let (repos, mut errors) = selection.resolve(registry);
        let timeout = options.store_timeout();

        let (tests, coverage, dependencies, dependency_alerts, code_scans, image_scans) = futures::try_join!(
            resolve::<TestStatusSource, T>(store, timeout),
            resolve::<CoverageSource, T>(store, timeout),
            resolve::<DependencyUpdateSource, T>(store, timeout),
            resolve::<DependencyAlertSource, T>(store, timeout),
            resolve::<CodeScanSource, T>(store, timeout),
            resolve::<ImageScanSource, T>(store, timeout),
        )?;

        let mut unusable = Unusable::default();
        let inputs = ViewInputs {
            tests: normalize::<TestStatusSource>(tests, registry, &mut unusable),
            coverage: normalize::<CoverageSource>(coverage, registry, &mut unusable),
            dependencies: normalize::<DependencyUpdateSource>(
                dependencies,
                registry,
                &mut unusable,
            ),
            alerts: AlertSources::new(
                normalize::<DependencyAlertSource>(dependency_alerts, registry, &mut unusable),
                normalize::<CodeScanSource>(code_scans, registry, &mut unusable),
                normalize::<ImageScanSource>(image_scans, registry, &mut unusable),
            ),
        };

        let mut rows: Vec<AggregatedRow> = repos
            .iter()
            .flat_map(|metadata| metadata.branch_keys())
            .map(|(role, key)| inputs.row(role, &key))
            .collect();
        rows.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        let selected: BTreeSet<&RepoKey> = repos.iter().map(|m| &m.key).collect();
        unusable.rejected.extend(inputs.into_excluded());
        errors.extend(
            unusable
                .rejected
                .into_iter()
                .filter(|e| selected.contains(e.repo()))
                .map(ViewError::InconsistentScope),
        );
        errors.extend(
            unusable
                .malformed
                .into_iter()
                .filter(|m| m.repo.as_ref().map_or(true, |repo| selected.contains(repo)))
                .map(ViewError::Malformed),
        );

        debug!(rows = rows.len(), errors = errors.len(), "Composed view");
        info!(repositories = repos.len(), rows = rows.len(), "Aggregated dashboard rows");
        Ok(ComposedView { rows, errors })
    }
    .instrument(span)
    .await
}
