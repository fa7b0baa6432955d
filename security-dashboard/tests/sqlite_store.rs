use chrono::{DateTime, TimeZone, Utc};
use security_dashboard::{
    compose_rows, history, CoverageSource, DashboardConfig, DependencyAlertSource, NewSnapshot,
    Payload, Reading, RepoKey, Selection, SeverityCounts, SourceKind, SqliteStore, StoreError,
    TestOutcome, TestStatus,
};
use rusqlite::Connection;
use std::path::PathBuf;
use tempfile::TempDir;

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/dashboard.toml")
}

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn repo_x() -> RepoKey {
    RepoKey::new("orgA", "repoX")
}

fn seeded_store(dir: &TempDir) -> SqliteStore {
    let store = SqliteStore::open(dir.path().join("snapshots.db")).unwrap();
    let test_status = |success| {
        Payload::TestStatus(TestStatus {
            success,
            workflow_paths: vec![".github/workflows/test.yml".to_string()],
        })
    };

    store
        .append(
            SourceKind::TestStatus,
            NewSnapshot::branch(repo_x(), "main", at(1), test_status(false)),
        )
        .unwrap();
    // Same timestamp, ingested later: wins the tie.
    store
        .append(
            SourceKind::TestStatus,
            NewSnapshot::branch(repo_x(), "main", at(1), test_status(true)),
        )
        .unwrap();
    store
        .append(
            SourceKind::DependencyAlerts,
            NewSnapshot::repo(
                repo_x(),
                at(5),
                Payload::Alerts(SeverityCounts::new(1, 2, 3, 4)),
            ),
        )
        .unwrap();
    store
        .append(
            SourceKind::DependencyAlerts,
            NewSnapshot::repo(
                repo_x(),
                at(2),
                Payload::Alerts(SeverityCounts::new(7, 7, 7, 7)),
            ),
        )
        .unwrap();
    store
}

#[test]
fn fixture_configuration_loads() {
    let config = DashboardConfig::load(fixture()).unwrap();
    let registry = config.registry().unwrap();

    assert_eq!(registry.len(), 3);
    assert_eq!(
        config.store_path(),
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/snapshots.db")
    );
    assert_eq!(config.query_options().store_timeout().as_secs(), 10);
}

#[tokio::test]
async fn composes_rows_from_sqlite() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir);
    let config = DashboardConfig::load(fixture()).unwrap();
    let registry = config.registry().unwrap();

    let view = compose_rows(
        &store,
        &registry,
        &Selection::pairs([repo_x()]),
        &config.query_options(),
    )
    .await
    .unwrap();

    let rows: Vec<_> = view.rows().collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].test_status, Reading::Value(TestOutcome::Pass));
    assert_eq!((rows[0].sec_critical, rows[0].sec_high), (1, 2));
    assert_eq!((rows[1].sec_critical, rows[1].sec_high), (1, 2));
    assert!(rows[1].test_status.is_no_data());
}

#[tokio::test]
async fn concurrent_queries_agree() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir);
    let registry = DashboardConfig::load(fixture())
        .unwrap()
        .registry()
        .unwrap();
    let options = Default::default();
    let selection = Selection::all();

    let (first, second) = tokio::join!(
        compose_rows(&store, &registry, &selection, &options),
        compose_rows(&store, &registry, &selection, &options),
    );
    let (first, second) = (first.unwrap(), second.unwrap());

    assert_eq!(first, second);
    assert_eq!(first.rows().count(), 6);
}

#[tokio::test]
async fn history_lists_repository_series_oldest_first() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir);
    let registry = DashboardConfig::load(fixture())
        .unwrap()
        .registry()
        .unwrap();

    let series = history::<DependencyAlertSource, _>(
        &store,
        &registry,
        &Selection::all(),
        &Default::default(),
    )
    .await
    .unwrap();

    let criticals: Vec<_> = series.points().map(|p| p.value.critical).collect();
    assert_eq!(criticals, vec![7, 1]);
    assert!(series.points().all(|p| p.branch.is_none()));

    let coverage = history::<CoverageSource, _>(
        &store,
        &registry,
        &Selection::all(),
        &Default::default(),
    )
    .await
    .unwrap();
    assert_eq!(coverage.points().count(), 0);
}

#[tokio::test]
async fn unreadable_database_aborts_the_query() {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::open(dir.path().join("snapshots.db")).unwrap();
    let registry = DashboardConfig::load(fixture())
        .unwrap()
        .registry()
        .unwrap();
    drop(dir);

    let result = compose_rows(&store, &registry, &Selection::all(), &Default::default()).await;
    match result {
        Err(e @ StoreError::Unavailable { .. }) => assert!(e.is_retryable()),
        other => panic!("expected unavailable store, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_rows_do_not_fail_the_query() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir);
    let registry = DashboardConfig::load(fixture())
        .unwrap()
        .registry()
        .unwrap();

    let conn = Connection::open(dir.path().join("snapshots.db")).unwrap();
    conn.execute_batch(
        "INSERT INTO trivy_scans
             (org_user, repo, branch, timestamp, image_tags, critical, high, medium, low)
         VALUES ('orgA', 'repoX', 'main', 9, 'not json', 5, 5, 0, 0);
         INSERT INTO trivy_scans
             (org_user, repo, branch, timestamp, image_tags, critical, high, medium, low)
         VALUES ('orgZ', 'unknown', 'main', 9, 'not json', 5, 5, 0, 0);",
    )
    .unwrap();

    let view = compose_rows(&store, &registry, &Selection::all(), &Default::default())
        .await
        .unwrap();

    assert_eq!(view.rows().count(), 6);
    let main = view.rows().next().unwrap();
    assert_eq!(main.test_status, Reading::Value(TestOutcome::Pass));
    assert_eq!((main.sec_critical, main.sec_high), (1, 2));

    let malformed: Vec<_> = view.malformed().collect();
    assert_eq!(malformed.len(), 1);
    assert_eq!(malformed[0].kind, SourceKind::ImageScanning);
    assert_eq!(malformed[0].repo, Some(repo_x()));
    assert_eq!(view.summary().records_malformed, 1);
}

#[tokio::test]
async fn latest_wins_within_the_same_millisecond() {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::open(dir.path().join("snapshots.db")).unwrap();
    let registry = DashboardConfig::load(fixture())
        .unwrap()
        .registry()
        .unwrap();
    let test_status = |success| {
        Payload::TestStatus(TestStatus {
            success,
            workflow_paths: Vec::new(),
        })
    };

    // 1.0009s, stored before the older 1.0001s reading.
    let newer = Utc.timestamp_opt(1, 900_000).unwrap();
    let older = Utc.timestamp_opt(1, 100_000).unwrap();
    store
        .append(
            SourceKind::TestStatus,
            NewSnapshot::branch(repo_x(), "main", newer, test_status(true)),
        )
        .unwrap();
    store
        .append(
            SourceKind::TestStatus,
            NewSnapshot::branch(repo_x(), "main", older, test_status(false)),
        )
        .unwrap();

    let view = compose_rows(
        &store,
        &registry,
        &Selection::pairs([repo_x()]),
        &Default::default(),
    )
    .await
    .unwrap();

    let main = view.rows().next().unwrap();
    assert_eq!(main.branch, "main");
    assert_eq!(main.test_status, Reading::Value(TestOutcome::Pass));
}

#[test]
fn connecting_to_a_missing_database_leaves_no_file_behind() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.db");

    match SqliteStore::connect(&path) {
        Err(e @ StoreError::Unreachable { .. }) => assert!(e.is_retryable()),
        other => panic!("expected unreachable store, got {other:?}"),
    }
    assert!(!path.exists());
}

#[tokio::test]
async fn connected_store_serves_queries() {
    let dir = TempDir::new().unwrap();
    drop(seeded_store(&dir));
    let registry = DashboardConfig::load(fixture())
        .unwrap()
        .registry()
        .unwrap();

    let store = SqliteStore::connect(dir.path().join("snapshots.db")).unwrap();
    let view = compose_rows(&store, &registry, &Selection::all(), &Default::default())
        .await
        .unwrap();

    assert_eq!(view.rows().count(), 6);
    assert!(view.errors().is_empty());
}
