#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

pub mod config;
pub mod detail;
pub mod registry;
pub mod resolver;
pub mod scope;
pub mod severity;
pub mod snapshot;
pub mod store;
pub mod view;

pub use config::{ConfigError, DashboardConfig, RepoEntry, StoreSettings};
pub use detail::{history, DetailPoint, History};
pub use registry::{BranchRole, Registry, RegistryError, RepoMetadata, TrackedBranches};
pub use resolver::{resolve, Latest};
pub use scope::{broadcast, BranchScoped, Normalized, RepoScoped, ScopeError, ScopeShape};
pub use severity::{aggregate, AlertBreakdown, AlertSources, SeverityTotals};
pub use snapshot::{
    BranchKey, CodeScanSource, Coverage, CoverageSource, DependencyAlertSource,
    DependencyUpdateSource, ImageScan, ImageScanSource, Payload, RepoKey, SeverityCounts,
    Snapshot, SnapshotRecord, Source, SourceKind, TestOutcome, TestStatus, TestStatusSource,
};
pub use store::{
    init_schema, MalformedRecord, MemoryStore, NewSnapshot, SnapshotStore, SourceRecords,
    SqliteStore, StoreError,
};
pub use view::{
    compose_rows, AggregatedRow, ComposedView, QueryOptions, Reading, Selection, ViewError,
    ViewSummary,
};
