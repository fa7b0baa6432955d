//! SQLite-backed snapshot store.
//!
//! One table per source, laid out the way the ingestion loaders write them.
//! Timestamps are stored as epoch microseconds and the `id` rowid doubles as
//! the ingestion sequence number.
//!
//! The tables are written by external loaders, so a row that cannot be
//! decoded is reported as a [`MalformedRecord`] and the rest of the table is
//! still read.

use super::{
    check_payload, MalformedRecord, NewSnapshot, SnapshotStore, SourceRecords, StoreError,
};
use crate::scope::ScopeKind;
use crate::snapshot::{
    Coverage, ImageScan, Payload, RepoKey, SeverityCounts, SnapshotRecord, SourceKind,
    TestStatus,
};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OpenFlags, Row};
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS test_status (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        org_user       TEXT NOT NULL,
        repo           TEXT NOT NULL,
        branch         TEXT NOT NULL,
        timestamp      INTEGER NOT NULL,
        workflow_paths TEXT NOT NULL DEFAULT '[]',
        success        INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_test_status_date
        ON test_status (org_user, repo, branch, timestamp DESC);

    CREATE TABLE IF NOT EXISTS coverage_history (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        org_user       TEXT NOT NULL,
        repo           TEXT NOT NULL,
        branch         TEXT NOT NULL,
        commit_id      TEXT,
        timestamp      INTEGER NOT NULL,
        coverage       REAL NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_coverage_timestamp
        ON coverage_history (org_user, repo, branch, timestamp);

    CREATE TABLE IF NOT EXISTS dependabot_snapshots (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        org_user       TEXT NOT NULL,
        repo           TEXT NOT NULL,
        timestamp      INTEGER NOT NULL,
        dependencies   INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_dependabot_snapshots_date
        ON dependabot_snapshots (org_user, repo, timestamp DESC);

    CREATE TABLE IF NOT EXISTS dependabot_alerts (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        org_user       TEXT NOT NULL,
        repo           TEXT NOT NULL,
        timestamp      INTEGER NOT NULL,
        critical       INTEGER NOT NULL,
        high           INTEGER NOT NULL,
        medium         INTEGER NOT NULL,
        low            INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_dependabot_alerts_date
        ON dependabot_alerts (org_user, repo, timestamp DESC);

    CREATE TABLE IF NOT EXISTS code_scanning_alerts (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        org_user       TEXT NOT NULL,
        repo           TEXT NOT NULL,
        branch         TEXT NOT NULL,
        timestamp      INTEGER NOT NULL,
        critical       INTEGER NOT NULL,
        high           INTEGER NOT NULL,
        medium         INTEGER NOT NULL,
        low            INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_code_scanning_alerts_date
        ON code_scanning_alerts (org_user, repo, branch, timestamp DESC);

    CREATE TABLE IF NOT EXISTS trivy_scans (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        org_user       TEXT NOT NULL,
        repo           TEXT NOT NULL,
        branch         TEXT NOT NULL,
        timestamp      INTEGER NOT NULL,
        image_tags     TEXT NOT NULL DEFAULT '[]',
        critical       INTEGER NOT NULL,
        high           INTEGER NOT NULL,
        medium         INTEGER NOT NULL,
        low            INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_trivy_scans_date
        ON trivy_scans (org_user, repo, branch, timestamp DESC);
";

/// Creates the snapshot tables if they do not exist.
///
/// # Errors
///
/// Returns the underlying SQLite error.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;",
    )?;
    conn.execute_batch(SCHEMA)
}

/// Snapshot store in a SQLite database file.
///
/// Every read opens its own read-only connection, so concurrent queries do
/// not share any connection state.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path` and its schema.
    ///
    /// This writes to the database; readers should use [`SqliteStore::connect`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if the database cannot be opened.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let conn = Connection::open(&path)?;
        init_schema(&conn)?;
        info!(path = %path.display(), "Opened snapshot database");
        Ok(Self { path })
    }

    /// Connects to an existing database without creating or changing it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unreachable`] if the file is missing or is not a
    /// SQLite database.
    pub fn connect(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let unreachable = |source: rusqlite::Error| StoreError::Unreachable {
            path: path.display().to_string(),
            source,
        };

        let conn = Connection::open_with_flags(&path, read_only()).map_err(unreachable)?;
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
            row.get::<_, i64>(0)
        })
        .map_err(unreachable)?;

        info!(path = %path.display(), "Connected to snapshot database");
        Ok(Self { path })
    }

    /// Appends a reading to a source, returning its sequence number.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PayloadMismatch`] or [`StoreError::InvalidRecord`]
    /// if the reading does not fit the source's table, and
    /// [`StoreError::Sqlite`] if the insert fails.
    pub fn append(&self, source: SourceKind, snapshot: NewSnapshot) -> Result<u64, StoreError> {
        check_payload(source, &snapshot)?;
        check_shape(source, &snapshot)?;

        let conn = Connection::open(&self.path)?;
        insert(&conn, source, &snapshot)?;
        let sequence = conn.last_insert_rowid() as u64;
        debug!(
            source = %source,
            repo = %snapshot.repo,
            branch = snapshot.branch.as_deref().unwrap_or("-"),
            sequence,
            "Appended snapshot"
        );
        Ok(sequence)
    }
}

impl SnapshotStore for SqliteStore {
    fn fetch(
        &self,
        source: SourceKind,
    ) -> impl Future<Output = Result<SourceRecords, StoreError>> + Send {
        let path = self.path.clone();
        async move {
            tokio::task::spawn_blocking(move || read_source(&path, source))
                .await
                .map_err(|e| StoreError::Unavailable {
                    kind: source,
                    message: e.to_string(),
                })?
                .map_err(|e| StoreError::Unavailable {
                    kind: source,
                    message: e.to_string(),
                })
        }
    }
}

/// Tables have a branch column exactly when the source is branch-scoped.
fn check_shape(source: SourceKind, snapshot: &NewSnapshot) -> Result<(), StoreError> {
    let message = match (source.scope(), &snapshot.branch) {
        (ScopeKind::Branch, None) => "branch-scoped reading without a branch",
        (ScopeKind::Repo, Some(_)) => "repository-scoped reading with a branch",
        _ => return Ok(()),
    };
    Err(StoreError::InvalidRecord {
        kind: source,
        message: message.to_string(),
    })
}

fn insert(
    conn: &Connection,
    source: SourceKind,
    snapshot: &NewSnapshot,
) -> Result<(), StoreError> {
    let org = &snapshot.repo.org;
    let repo = &snapshot.repo.repo;
    let branch = snapshot.branch.as_deref();
    let timestamp = snapshot.timestamp.timestamp_micros();

    match (&snapshot.payload, source) {
        (Payload::TestStatus(status), _) => {
            let paths = to_json(source, &status.workflow_paths)?;
            conn.execute(
                "INSERT INTO test_status (org_user, repo, branch, timestamp, workflow_paths, success)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![org, repo, branch, timestamp, paths, status.success],
            )?;
        }
        (Payload::Coverage(coverage), _) => {
            conn.execute(
                "INSERT INTO coverage_history (org_user, repo, branch, commit_id, timestamp, coverage)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![org, repo, branch, coverage.commit, timestamp, coverage.percent],
            )?;
        }
        (Payload::DependencyUpdates { count }, _) => {
            conn.execute(
                "INSERT INTO dependabot_snapshots (org_user, repo, timestamp, dependencies)
                 VALUES (?1, ?2, ?3, ?4)",
                params![org, repo, timestamp, count],
            )?;
        }
        (Payload::Alerts(counts), SourceKind::CodeScanning) => {
            conn.execute(
                "INSERT INTO code_scanning_alerts
                     (org_user, repo, branch, timestamp, critical, high, medium, low)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    org,
                    repo,
                    branch,
                    timestamp,
                    counts.critical,
                    counts.high,
                    counts.medium,
                    counts.low
                ],
            )?;
        }
        (Payload::Alerts(counts), _) => {
            conn.execute(
                "INSERT INTO dependabot_alerts
                     (org_user, repo, timestamp, critical, high, medium, low)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    org,
                    repo,
                    timestamp,
                    counts.critical,
                    counts.high,
                    counts.medium,
                    counts.low
                ],
            )?;
        }
        (Payload::ImageScan(scan), _) => {
            let tags = to_json(source, &scan.image_tags)?;
            conn.execute(
                "INSERT INTO trivy_scans
                     (org_user, repo, branch, timestamp, image_tags, critical, high, medium, low)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    org,
                    repo,
                    branch,
                    timestamp,
                    tags,
                    scan.counts.critical,
                    scan.counts.high,
                    scan.counts.medium,
                    scan.counts.low
                ],
            )?;
        }
    }

    Ok(())
}

fn to_json(source: SourceKind, values: &[String]) -> Result<String, StoreError> {
    serde_json::to_string(values).map_err(|e| StoreError::InvalidRecord {
        kind: source,
        message: e.to_string(),
    })
}

type RowMapper = fn(&Row<'_>) -> rusqlite::Result<SnapshotRecord>;

fn read_only() -> OpenFlags {
    OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX
}

fn read_source(path: &Path, source: SourceKind) -> rusqlite::Result<SourceRecords> {
    let conn = Connection::open_with_flags(path, read_only())?;

    let (sql, map): (&str, RowMapper) = match source {
        SourceKind::TestStatus => (
            "SELECT id, org_user, repo, branch, timestamp, workflow_paths, success
             FROM test_status ORDER BY id",
            test_status_row,
        ),
        SourceKind::Coverage => (
            "SELECT id, org_user, repo, branch, timestamp, commit_id, coverage
             FROM coverage_history ORDER BY id",
            coverage_row,
        ),
        SourceKind::DependencyUpdates => (
            "SELECT id, org_user, repo, timestamp, dependencies
             FROM dependabot_snapshots ORDER BY id",
            dependency_updates_row,
        ),
        SourceKind::DependencyAlerts => (
            "SELECT id, org_user, repo, timestamp, critical, high, medium, low
             FROM dependabot_alerts ORDER BY id",
            dependency_alerts_row,
        ),
        SourceKind::CodeScanning => (
            "SELECT id, org_user, repo, branch, timestamp, critical, high, medium, low
             FROM code_scanning_alerts ORDER BY id",
            code_scanning_row,
        ),
        SourceKind::ImageScanning => (
            "SELECT id, org_user, repo, branch, timestamp, critical, high, medium, low, image_tags
             FROM trivy_scans ORDER BY id",
            image_scan_row,
        ),
    };

    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([])?;
    let mut fetched = SourceRecords::default();
    while let Some(row) = rows.next()? {
        match map(row) {
            Ok(record) => fetched.records.push(record),
            Err(e) => fetched.malformed.push(malformed(source, row, &e)),
        }
    }
    Ok(fetched)
}

fn malformed(source: SourceKind, row: &Row<'_>, error: &rusqlite::Error) -> MalformedRecord {
    let org: Option<String> = row.get(1).ok();
    let repo: Option<String> = row.get(2).ok();
    MalformedRecord {
        kind: source,
        row: row.get(0).unwrap_or_default(),
        repo: org.zip(repo).map(|(org, repo)| RepoKey { org, repo }),
        message: error.to_string(),
    }
}

fn test_status_row(row: &Row<'_>) -> rusqlite::Result<SnapshotRecord> {
    Ok(SnapshotRecord {
        sequence: sequence(row)?,
        org: row.get(1)?,
        repo: row.get(2)?,
        branch: Some(row.get(3)?),
        timestamp: timestamp(row, 4)?,
        payload: Payload::TestStatus(TestStatus {
            workflow_paths: json_list(row, 5)?,
            success: row.get(6)?,
        }),
    })
}

fn coverage_row(row: &Row<'_>) -> rusqlite::Result<SnapshotRecord> {
    Ok(SnapshotRecord {
        sequence: sequence(row)?,
        org: row.get(1)?,
        repo: row.get(2)?,
        branch: Some(row.get(3)?),
        timestamp: timestamp(row, 4)?,
        payload: Payload::Coverage(Coverage {
            commit: row.get(5)?,
            percent: row.get(6)?,
        }),
    })
}

fn dependency_updates_row(row: &Row<'_>) -> rusqlite::Result<SnapshotRecord> {
    Ok(SnapshotRecord {
        sequence: sequence(row)?,
        org: row.get(1)?,
        repo: row.get(2)?,
        branch: None,
        timestamp: timestamp(row, 3)?,
        payload: Payload::DependencyUpdates { count: row.get(4)? },
    })
}

fn dependency_alerts_row(row: &Row<'_>) -> rusqlite::Result<SnapshotRecord> {
    Ok(SnapshotRecord {
        sequence: sequence(row)?,
        org: row.get(1)?,
        repo: row.get(2)?,
        branch: None,
        timestamp: timestamp(row, 3)?,
        payload: Payload::Alerts(counts(row, 4)?),
    })
}

fn code_scanning_row(row: &Row<'_>) -> rusqlite::Result<SnapshotRecord> {
    Ok(SnapshotRecord {
        sequence: sequence(row)?,
        org: row.get(1)?,
        repo: row.get(2)?,
        branch: Some(row.get(3)?),
        timestamp: timestamp(row, 4)?,
        payload: Payload::Alerts(counts(row, 5)?),
    })
}

fn image_scan_row(row: &Row<'_>) -> rusqlite::Result<SnapshotRecord> {
    Ok(SnapshotRecord {
        sequence: sequence(row)?,
        org: row.get(1)?,
        repo: row.get(2)?,
        branch: Some(row.get(3)?),
        timestamp: timestamp(row, 4)?,
        payload: Payload::ImageScan(ImageScan {
            counts: counts(row, 5)?,
            image_tags: json_list(row, 9)?,
        }),
    })
}

fn sequence(row: &Row<'_>) -> rusqlite::Result<u64> {
    let id: i64 = row.get(0)?;
    u64::try_from(id).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(0, id))
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let micros: i64 = row.get(idx)?;
    DateTime::from_timestamp_micros(micros)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, micros))
}

fn counts(row: &Row<'_>, start: usize) -> rusqlite::Result<SeverityCounts> {
    Ok(SeverityCounts {
        critical: row.get(start)?,
        high: row.get(start + 1)?,
        medium: row.get(start + 2)?,
        low: row.get(start + 3)?,
    })
}

fn json_list(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::RepoKey;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn repo() -> RepoKey {
        RepoKey::new("orgA", "repoX")
    }

    #[tokio::test]
    async fn reads_back_every_source() {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::open(temp.path().join("snapshots.db")).unwrap();

        let appends = [
            (
                SourceKind::TestStatus,
                NewSnapshot::branch(
                    repo(),
                    "main",
                    at(1),
                    Payload::TestStatus(TestStatus {
                        success: false,
                        workflow_paths: vec![".github/workflows/test.yml".to_string()],
                    }),
                ),
            ),
            (
                SourceKind::Coverage,
                NewSnapshot::branch(
                    repo(),
                    "main",
                    at(2),
                    Payload::Coverage(Coverage {
                        percent: 75.5,
                        commit: Some("abc123".to_string()),
                    }),
                ),
            ),
            (
                SourceKind::DependencyUpdates,
                NewSnapshot::repo(repo(), at(3), Payload::DependencyUpdates { count: 4 }),
            ),
            (
                SourceKind::DependencyAlerts,
                NewSnapshot::repo(
                    repo(),
                    at(4),
                    Payload::Alerts(SeverityCounts::new(1, 2, 3, 4)),
                ),
            ),
            (
                SourceKind::CodeScanning,
                NewSnapshot::branch(
                    repo(),
                    "dev",
                    at(5),
                    Payload::Alerts(SeverityCounts::new(5, 6, 7, 8)),
                ),
            ),
            (
                SourceKind::ImageScanning,
                NewSnapshot::branch(
                    repo(),
                    "main",
                    at(6),
                    Payload::ImageScan(ImageScan {
                        image_tags: vec!["latest".to_string()],
                        counts: SeverityCounts::new(0, 1, 0, 1),
                    }),
                ),
            ),
        ];

        for (source, snapshot) in appends.clone() {
            store.append(source, snapshot).unwrap();
        }

        for (source, expected) in appends {
            let fetched = store.fetch(source).await.unwrap();
            assert!(fetched.malformed.is_empty(), "{source}");
            assert_eq!(fetched.records.len(), 1, "{source}");
            let record = &fetched.records[0];
            assert_eq!(record.sequence, 1);
            assert_eq!(record.branch, expected.branch);
            assert_eq!(record.timestamp, expected.timestamp);
            assert_eq!(record.payload, expected.payload);
        }
    }

    #[test]
    fn rejects_shape_the_table_cannot_hold() {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::open(temp.path().join("snapshots.db")).unwrap();

        let result = store.append(
            SourceKind::DependencyAlerts,
            NewSnapshot::branch(
                repo(),
                "main",
                at(1),
                Payload::Alerts(SeverityCounts::default()),
            ),
        );
        assert!(matches!(result, Err(StoreError::InvalidRecord { .. })));
    }

    #[tokio::test]
    async fn missing_database_is_unavailable() {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore {
            path: temp.path().join("missing.db"),
        };

        let err = store.fetch(SourceKind::Coverage).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn undecodable_rows_are_reported_not_fatal() {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::open(temp.path().join("snapshots.db")).unwrap();
        let scan = Payload::ImageScan(ImageScan {
            image_tags: vec!["v1".to_string()],
            counts: SeverityCounts::new(1, 0, 0, 0),
        });
        store
            .append(
                SourceKind::ImageScanning,
                NewSnapshot::branch(repo(), "main", at(1), scan),
            )
            .unwrap();

        let conn = Connection::open(store.path.as_path()).unwrap();
        conn.execute_batch(
            "INSERT INTO trivy_scans
                 (org_user, repo, branch, timestamp, image_tags, critical, high, medium, low)
             VALUES ('orgB', 'other', 'main', 2, 'latest', 0, 0, 0, 0);
             INSERT INTO trivy_scans
                 (org_user, repo, branch, timestamp, image_tags, critical, high, medium, low)
             VALUES ('orgA', 'repoX', 'dev', 3, '[]', -4, 0, 0, 0);",
        )
        .unwrap();

        let fetched = store.fetch(SourceKind::ImageScanning).await.unwrap();
        assert_eq!(fetched.records.len(), 1);
        assert_eq!(fetched.malformed.len(), 2);
        assert_eq!(fetched.malformed[0].row, 2);
        assert_eq!(
            fetched.malformed[0].repo,
            Some(RepoKey::new("orgB", "other"))
        );
        assert_eq!(fetched.malformed[1].kind, SourceKind::ImageScanning);
    }

    #[tokio::test]
    async fn keeps_sub_millisecond_precision() {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::open(temp.path().join("snapshots.db")).unwrap();
        let at = Utc.timestamp_opt(1, 900_000).unwrap();

        store
            .append(
                SourceKind::DependencyUpdates,
                NewSnapshot::repo(repo(), at, Payload::DependencyUpdates { count: 1 }),
            )
            .unwrap();

        let fetched = store.fetch(SourceKind::DependencyUpdates).await.unwrap();
        assert_eq!(fetched.records[0].timestamp, at);
    }

    #[test]
    fn connect_does_not_create_the_database() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("typo.db");

        let err = SqliteStore::connect(&path).unwrap_err();
        assert!(matches!(err, StoreError::Unreachable { .. }));
        assert!(err.is_retryable());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn connect_reads_an_existing_database() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("snapshots.db");
        SqliteStore::open(&path)
            .unwrap()
            .append(
                SourceKind::DependencyUpdates,
                NewSnapshot::repo(repo(), at(1), Payload::DependencyUpdates { count: 2 }),
            )
            .unwrap();

        let store = SqliteStore::connect(&path).unwrap();
        let fetched = store.fetch(SourceKind::DependencyUpdates).await.unwrap();
        assert_eq!(fetched.records.len(), 1);
    }
}
