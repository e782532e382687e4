//! metacrawl CLI - metadata extraction for heterogeneous databases.

use clap::{Parser, Subcommand};
use metacrawl::{
    test_connection, Config, CrawlError, DataSourceDescriptor, DriverConnector, ExtractionReport,
    ExtractionRunner, HistoryStore, RunMode, SqliteCatalog, SqliteHistoryStore,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "metacrawl")]
#[command(about = "Metadata extraction for MySQL, PostgreSQL, SQL Server, Oracle and StarRocks")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract metadata from a datasource into the catalog
    Run {
        /// Datasource id or name
        #[arg(short, long, conflicts_with = "task")]
        datasource: Option<String>,

        /// Extraction mode: full, incremental, schema_only
        #[arg(short, long, default_value = "full")]
        mode: String,

        /// Only extract tables updated after this time ("YYYY-MM-DD HH:MM:SS")
        #[arg(long)]
        last_sync_time: Option<String>,

        /// Run a configured task by id instead
        #[arg(long)]
        task: Option<i64>,
    },

    /// Test datasource connections
    HealthCheck {
        /// Only check this datasource (id or name)
        #[arg(short, long)]
        datasource: Option<String>,
    },

    /// Show recent extraction runs
    History {
        /// Only show runs of this datasource (id or name)
        #[arg(short, long)]
        datasource: Option<String>,

        /// Maximum number of runs to show
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },

    /// Check the configuration file without connecting anywhere
    ValidateConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), CrawlError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format).map_err(CrawlError::Config)?;

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::ValidateConfig => {
            if cli.output_json {
                let summary = serde_json::json!({
                    "valid": true,
                    "datasources": config.datasources.len(),
                    "tasks": config.tasks.len(),
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!(
                    "Configuration OK: {} datasource(s), {} task(s)",
                    config.datasources.len(),
                    config.tasks.len()
                );
            }
        }

        Commands::Run {
            datasource,
            mode,
            last_sync_time,
            task,
        } => {
            let runner = build_runner(&config).await?;

            let report = match task {
                Some(task_id) => {
                    let task = config
                        .task(task_id)
                        .ok_or_else(|| CrawlError::Config(format!("Unknown task {}", task_id)))?;
                    let ds = config.datasource(task.datasource_id).ok_or_else(|| {
                        CrawlError::Config(format!("Unknown datasource {}", task.datasource_id))
                    })?;
                    runner.run_task(task, ds).await?
                }
                None => {
                    let key = datasource.ok_or_else(|| {
                        CrawlError::Config("Either --datasource or --task is required".into())
                    })?;
                    let ds = lookup_datasource(&config, &key)?;
                    let mode: RunMode = mode.parse()?;
                    runner
                        .run_extraction(ds, mode, last_sync_time.as_deref())
                        .await?
                }
            };

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }

        Commands::HealthCheck { datasource } => {
            let targets: Vec<&DataSourceDescriptor> = match datasource {
                Some(key) => vec![lookup_datasource(&config, &key)?],
                None => config.datasources.iter().collect(),
            };
            if targets.is_empty() {
                return Err(CrawlError::Config("No datasources configured".into()));
            }

            let connector = connector_for(&config);
            let mut checks = Vec::with_capacity(targets.len());
            for ds in targets {
                checks.push(test_connection(&connector, ds).await);
            }
            let healthy = checks.iter().all(|c| c.connected);

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&checks)?);
            } else {
                println!("Health Check Results:");
                for check in &checks {
                    println!(
                        "  {} ({}): {} ({}ms)",
                        check.datasource,
                        check.kind,
                        if check.connected { "OK" } else { "FAILED" },
                        check.latency_ms
                    );
                    if let Some(ref err) = check.error {
                        println!("    Error: {}", err);
                    }
                }
                println!(
                    "\n  Overall: {}",
                    if healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !healthy {
                return Err(CrawlError::connection(
                    "health-check",
                    "one or more datasources are unreachable",
                ));
            }
        }

        Commands::History { datasource, limit } => {
            let datasource_id = match datasource {
                Some(key) => Some(lookup_datasource(&config, &key)?.id),
                None => None,
            };

            let catalog = SqliteCatalog::from_config(&config.catalog).await?;
            let history = SqliteHistoryStore::new(catalog.pool().clone());
            let runs = history.recent_runs(datasource_id, limit).await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&runs)?);
            } else if runs.is_empty() {
                println!("No extraction runs recorded");
            } else {
                println!(
                    "{:>6}  {:>4}  {:<12}  {:<16}  {:>6}  {:>9}  STARTED",
                    "RUN", "DS", "MODE", "STATUS", "TABLES", "SECONDS"
                );
                for run in &runs {
                    println!(
                        "{:>6}  {:>4}  {:<12}  {:<16}  {:>6}  {:>9}  {}",
                        run.id,
                        run.datasource_id,
                        run.mode.as_str(),
                        run.status.as_str(),
                        run.tables_count,
                        run.duration_seconds
                            .map(|d| format!("{:.2}", d))
                            .unwrap_or_else(|| "-".into()),
                        run.started_at.format("%Y-%m-%d %H:%M:%S")
                    );
                }
            }
        }
    }

    Ok(())
}

fn lookup_datasource<'a>(config: &'a Config, key: &str) -> Result<&'a DataSourceDescriptor, CrawlError> {
    config
        .find_datasource(key)
        .ok_or_else(|| CrawlError::Config(format!("Unknown datasource '{}'", key)))
}

fn connector_for(config: &Config) -> DriverConnector {
    DriverConnector::new(Duration::from_secs(config.extraction.connect_timeout_secs))
}

async fn build_runner(config: &Config) -> Result<ExtractionRunner<DriverConnector>, CrawlError> {
    let catalog = Arc::new(SqliteCatalog::from_config(&config.catalog).await?);
    let history = Arc::new(SqliteHistoryStore::new(catalog.pool().clone()));
    Ok(ExtractionRunner::new(connector_for(config), catalog, history)
        .with_policy(config.extraction.partial_success))
}

fn print_report(report: &ExtractionReport) {
    println!("Extraction {} (run {})", report.status, report.run_id);
    println!("  Datasource:    {}", report.datasource_id);
    println!("  Mode:          {}", report.extraction_type);
    println!("  Tables:        {}", report.tables_count);
    println!("  Failed:        {}", report.tables_failed_count);
    println!("  Relationships: {}", report.relationships_count);
    println!("  Duration:      {:.2}s", report.duration_seconds);
    if let Some(ref message) = report.message {
        println!("  Message:       {}", message);
    }
    for failure in &report.failures {
        println!("    {}", failure.error);
    }
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => return Err(format!("Invalid verbosity '{}'", other)),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("Invalid log format '{}'", other)),
    }

    Ok(())
}
