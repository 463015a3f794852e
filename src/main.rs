//! Media-Sweep main entry point
//!
//! This is the command-line interface for the Media-Sweep media harvester.

use anyhow::Context;
use clap::Parser;
use media_sweep::api::{self, ApiState};
use media_sweep::config::{load_config_with_hash, Config};
use media_sweep::crawler::{HttpFetcher, WorkerPool};
use media_sweep::gateway::SubmissionGateway;
use media_sweep::output::{load_statistics, print_statistics};
use media_sweep::queue::SqliteQueue;
use media_sweep::storage::SqliteStorage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Media-Sweep: bulk media reference harvester
///
/// Media-Sweep accepts batches of page URLs over HTTP, fetches each page
/// once with a bounded pool of workers, and records the image and video
/// references each page embeds.
#[derive(Parser, Debug)]
#[command(name = "media-sweep")]
#[command(version = "1.0.0")]
#[command(about = "A bulk media reference harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the effective settings without starting
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show queue and result statistics and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

    /// Run only the worker pool, without the HTTP API
    #[arg(long, conflicts_with = "no_workers")]
    no_server: bool,

    /// Run only the HTTP API, without processing tasks
    #[arg(long, conflicts_with = "no_server")]
    no_workers: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config).await?;
    } else {
        handle_run(config, !cli.no_server, !cli.no_workers).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("media_sweep=info,warn"),
            1 => EnvFilter::new("media_sweep=debug,tower_http=debug,info"),
            2 => EnvFilter::new("media_sweep=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows the effective settings
fn handle_dry_run(config: &Config) {
    println!("=== Media-Sweep Dry Run ===\n");

    println!("Workers:");
    println!("  Concurrency: {}", config.worker.concurrency);
    println!("  Fetch timeout: {}s", config.worker.fetch_timeout_secs);

    println!("\nUser Agent:");
    println!("  Header: {}", config.user_agent.header_value());

    println!("\nQueue:");
    println!("  Database: {}", config.queue.database_path);
    println!("  Lease: {}s", config.queue.lease_secs);
    println!("  Poll interval: {}ms", config.queue.poll_interval_ms);

    println!("\nServer:");
    println!("  Bind address: {}", config.server.bind_address);
    println!("  Max batch size: {}", config.server.max_batch_size);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the databases
async fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Queue database: {}", config.queue.database_path);
    println!("Output database: {}\n", config.output.database_path);

    let queue = SqliteQueue::open(Path::new(&config.queue.database_path), &config.queue)
        .context("Failed to open task queue")?;
    let storage = SqliteStorage::new(Path::new(&config.output.database_path))
        .context("Failed to open result database")?;

    let stats = load_statistics(Arc::new(storage), &queue).await?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main operation: serve submissions and process tasks until Ctrl-C
async fn handle_run(config: Config, run_server: bool, run_workers: bool) -> anyhow::Result<()> {
    let queue = Arc::new(
        SqliteQueue::open(Path::new(&config.queue.database_path), &config.queue)
            .context("Failed to open task queue")?,
    );
    let storage = Arc::new(
        SqliteStorage::new(Path::new(&config.output.database_path))
            .context("Failed to open result database")?,
    );

    let pool = if run_workers {
        let fetcher = Arc::new(
            HttpFetcher::new(&config.worker, &config.user_agent)
                .context("Failed to build HTTP client")?,
        );
        Some(WorkerPool::new(&config.worker, queue.clone(), storage.clone(), fetcher).spawn())
    } else {
        tracing::info!("Worker pool disabled");
        None
    };

    let shutdown = CancellationToken::new();
    let server = if run_server {
        let gateway = SubmissionGateway::new(queue.clone(), config.server.max_batch_size);
        let router = api::create_router(ApiState::new(gateway, storage.clone(), queue.clone()));
        let listener = api::bind(config.server.bind_address)
            .await
            .with_context(|| format!("Failed to bind {}", config.server.bind_address))?;

        Some(tokio::spawn(api::serve(listener, router, shutdown.clone())))
    } else {
        tracing::info!("HTTP API disabled");
        None
    };

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!("Shutdown requested");

    shutdown.cancel();
    if let Some(server) = server {
        match server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("API server failed: {}", e),
            Err(e) => tracing::error!("API server task failed: {}", e),
        }
    }

    if let Some(pool) = pool {
        pool.shutdown().await;
    }

    tracing::info!("Media-Sweep stopped");
    Ok(())
}
