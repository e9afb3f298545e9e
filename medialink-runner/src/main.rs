//! medialink connection runner
//!
//! Runs the connection inference engine against a local SQLite cache:
//! 1. `import` seeds the cache with resource snapshots
//! 2. `run` infers connections once or on an interval
//! 3. `connections` prints what is currently stored
//!
//! Usage:
//!   medialink-runner --config medialink.toml run --interval-secs 60

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use medialink_cache::{unix_now, SqliteCache};
use medialink_connect::{CancelToken, Orchestrator, RuleOutcome, RunReport};
use medialink_runner::{import_snapshots, read_snapshots, RunnerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "medialink-runner")]
#[command(about = "Infers connections between cached media resources")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "MEDIALINK_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite cache file, overriding the configuration
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Infer connections and write them to the cache
    Run {
        /// Run a single time even if an interval is configured
        #[arg(long, conflicts_with = "interval_secs")]
        once: bool,

        /// Seconds between runs
        #[arg(long)]
        interval_secs: Option<u64>,

        /// Stop launching rules this many seconds into a run
        #[arg(long)]
        deadline_secs: Option<u64>,
    },
    /// Load a JSON array of snapshots into the cache
    Import { file: PathBuf },
    /// Print live connection items as JSON
    Connections,
    /// Delete expired resources and connections
    Purge,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = RunnerConfig::load(args.config.as_deref())?;
    if let Some(database) = args.database {
        config.database = database;
    }
    config.validate()?;

    let cache = Arc::new(
        SqliteCache::open(&config.database)
            .with_context(|| format!("Failed to open cache {}", config.database.display()))?,
    );

    match args.command {
        Command::Run {
            once,
            interval_secs,
            deadline_secs,
        } => {
            let interval = if once {
                None
            } else {
                interval_secs.or(config.interval_secs)
            };
            run(cache, config, interval, deadline_secs).await
        }
        Command::Import { file } => {
            let snapshots = read_snapshots(&file)?;
            let count = import_snapshots(
                &cache,
                &snapshots,
                &config.region,
                config.engine.ttl_secs,
                unix_now(),
            )?;
            info!("Imported {} snapshots from {}", count, file.display());
            Ok(())
        }
        Command::Connections => {
            let items = cache
                .connections_at(unix_now())
                .context("Failed to list connections")?;
            println!("{}", serde_json::to_string_pretty(&items)?);
            Ok(())
        }
        Command::Purge => {
            let removed = cache
                .purge_expired(unix_now())
                .context("Failed to purge expired rows")?;
            info!("Purged {} expired rows", removed);
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_str().to_lowercase()));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

async fn run(
    cache: Arc<SqliteCache>,
    config: RunnerConfig,
    interval: Option<u64>,
    deadline_secs: Option<u64>,
) -> Result<()> {
    let engine = Orchestrator::new(cache.clone(), cache, config.engine)
        .context("Invalid engine configuration")?;

    let cancel = CancelToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight rules");
            on_signal.cancel();
        }
    });

    info!(
        "medialink runner starting ({} rules, interval: {})",
        engine.rules().len(),
        interval.map_or_else(|| "once".to_string(), |s| format!("{s}s"))
    );

    loop {
        let deadline = deadline_secs.map(|secs| Instant::now() + Duration::from_secs(secs));
        let report = engine.run_until(&cancel, deadline).await;
        log_report(&report);

        let Some(secs) = interval else { break };
        if cancel.is_cancelled() {
            break;
        }
        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(Duration::from_secs(secs)) => {}
        }
    }
    Ok(())
}

fn log_report(report: &RunReport) {
    for rule in &report.rules {
        if let RuleOutcome::Failed(e) = &rule.outcome {
            warn!("Rule {} failed: {}", rule.name, e);
        }
    }
    for (category, e) in &report.category_failures {
        warn!("Category {} unavailable: {}", category, e);
    }
    if let Some(e) = &report.sink_error {
        warn!("Connection batch not written: {}", e);
    }
    info!(
        "Run {} finished: {} connections, {} written, {} rejected, {} failed rules{}",
        report.run_id,
        report.edges.len(),
        report.written,
        report.failed.len(),
        report.failed_rules(),
        if report.cancelled { " (cancelled)" } else { "" }
    );
}
