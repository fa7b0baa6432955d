//! CLI for the security dashboard.
//!
//! Reads the snapshot database named in the configuration file and prints the
//! aggregated per-branch rows, or the time series of one source.

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use security_dashboard::{
    compose_rows, history, CodeScanSource, ConfigError, CoverageSource, DashboardConfig,
    DependencyAlertSource, DependencyUpdateSource, ImageScanSource, QueryOptions, Reading,
    Registry, RepoKey, Selection, Source, SqliteStore, StoreError, TestStatusSource, ViewError,
};
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;
use tracing::{error, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Security Dashboard - Current security and quality state of tracked branches.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the dashboard configuration file.
    #[arg(long, env = "SECURITY_DASHBOARD_CONFIG", default_value = "dashboard.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print one aggregated row per tracked branch.
    Rows(Filter),

    /// Print every snapshot of one source.
    History {
        /// Source to list.
        #[arg(value_enum)]
        source: SourceArg,

        #[command(flatten)]
        filter: Filter,
    },
}

#[derive(ClapArgs, Debug)]
struct Filter {
    /// Only repositories of this organization.
    #[arg(long)]
    org: Option<String>,

    /// Only repositories with this name.
    #[arg(long)]
    repo: Option<String>,

    /// Print JSON instead of a table.
    #[arg(long)]
    json: bool,
}

impl Filter {
    fn selection(&self) -> Selection {
        Selection::matching(self.org.clone(), self.repo.clone())
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SourceArg {
    TestStatus,
    Coverage,
    DependencyUpdates,
    DependencyAlerts,
    CodeScanning,
    ImageScanning,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args = Args::parse();

    match run(args).await {
        Ok(problems) if problems.is_empty() => ExitCode::from(0),
        Ok(problems) => {
            print_problems(&problems);
            ExitCode::from(1)
        }
        Err(e) => {
            error!(error = %e, "Critical failure");
            ExitCode::from(2)
        }
    }
}

/// Initializes tracing with environment filter support.
///
/// Logs go to stderr in compact form so that table and JSON output on stdout
/// stay clean. The level is taken from `RUST_LOG` and defaults to "info".
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

/// Main execution logic. Returns the per-key problems of the query.
async fn run(args: Args) -> Result<Vec<ViewError>, CliError> {
    let config = DashboardConfig::load(&args.config)?;
    let registry = config.registry()?;
    let options = config.query_options();
    let store = SqliteStore::connect(config.store_path())?;

    match args.command {
        Command::Rows(filter) => rows(&store, &registry, &filter, &options).await,
        Command::History { source, filter } => {
            let query = Query {
                store: &store,
                registry: &registry,
                filter: &filter,
                options: &options,
            };
            match source {
                SourceArg::TestStatus => query.history::<TestStatusSource>().await,
                SourceArg::Coverage => query.history::<CoverageSource>().await,
                SourceArg::DependencyUpdates => query.history::<DependencyUpdateSource>().await,
                SourceArg::DependencyAlerts => query.history::<DependencyAlertSource>().await,
                SourceArg::CodeScanning => query.history::<CodeScanSource>().await,
                SourceArg::ImageScanning => query.history::<ImageScanSource>().await,
            }
        }
    }
}

async fn rows(
    store: &SqliteStore,
    registry: &Registry,
    filter: &Filter,
    options: &QueryOptions,
) -> Result<Vec<ViewError>, CliError> {
    let view = compose_rows(store, registry, &filter.selection(), options).await?;

    if filter.json {
        let rows: Vec<_> = view.rows().collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        println!(
            "{:<16} {:<24} {:<16} {:<8} {:>9} {:>5} {:>9} {:>5}",
            "ORG", "REPOSITORY", "BRANCH", "TESTS", "COVERAGE", "DEPS", "CRITICAL", "HIGH"
        );
        for row in view.rows() {
            println!(
                "{:<16} {:<24} {:<16} {:<8} {:>9} {:>5} {:>9} {:>5}",
                row.org,
                row.repo,
                row.branch,
                row.test_status.to_string(),
                coverage(&row.coverage),
                row.dependencies.to_string(),
                row.sec_critical,
                row.sec_high,
            );
        }

        let summary = view.summary();
        println!("\nSummary:");
        println!("  Rows: {}", summary.rows);
        println!("  Rows without test data: {}", summary.rows_without_tests);
        println!("  Rows without coverage: {}", summary.rows_without_coverage);
        println!("  Rows without alert data: {}", summary.rows_without_alert_data);
        println!("  Repositories not found: {}", summary.repositories_missing);
        println!("  Records excluded: {}", summary.records_excluded);
        println!("  Malformed rows skipped: {}", summary.records_malformed);
    }

    Ok(view.errors().to_vec())
}

fn coverage(reading: &Reading<f64>) -> String {
    reading
        .value()
        .map_or_else(|| reading.to_string(), |percent| format!("{percent:.2}%"))
}

/// Borrowed inputs of a detail query.
struct Query<'a> {
    store: &'a SqliteStore,
    registry: &'a Registry,
    filter: &'a Filter,
    options: &'a QueryOptions,
}

impl Query<'_> {
    async fn history<S: Source>(&self) -> Result<Vec<ViewError>, CliError> {
        let series = history::<S, _>(
            self.store,
            self.registry,
            &self.filter.selection(),
            self.options,
        )
        .await?;

        if self.filter.json {
            let points: Vec<_> = series.points().collect();
            println!("{}", serde_json::to_string_pretty(&points)?);
        } else {
            for point in series.points() {
                let repo = RepoKey::new(point.org.as_str(), point.repo.as_str());
                let branch = match (&point.branch, point.branch_role) {
                    (Some(branch), Some(role)) => format!("{branch} ({role})"),
                    _ => "(repository)".to_string(),
                };
                println!(
                    "{}  {:<32} {:<24} {}",
                    point.timestamp,
                    repo.to_string(),
                    branch,
                    point.value
                );
            }
        }

        Ok(series.errors().to_vec())
    }
}

/// Prints the per-key problems of a query.
fn print_problems(problems: &[ViewError]) {
    for problem in problems {
        warn!(error = %problem, "Query completed with errors");
    }
}
