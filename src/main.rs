//! Sumi-Capture main entry point
//!
//! This is the command-line interface for the Sumi-Capture site archiver.

use anyhow::{bail, Context};
use clap::Parser;
use std::path::PathBuf;
use sumi_capture::config::{load_config_with_hash, Config};
use sumi_capture::crawler::{crawl, StartOptions};
use sumi_capture::CaptureError;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Sumi-Capture: A polite single-site archiver
///
/// Sumi-Capture fetches every reachable resource of one site, records what
/// each fetch produced, and checkpoints its progress so an interrupted
/// capture can be resumed later.
#[derive(Parser, Debug)]
#[command(name = "sumi-capture")]
#[command(version)]
#[command(about = "A polite single-site archiver", long_about = None)]
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

    /// Start a fresh capture, ignoring an existing checkpoint
    #[arg(long, conflicts_with = "stats")]
    fresh: bool,

    /// Fetch previously failed resources again
    #[arg(long, conflicts_with = "stats")]
    retry_failed: bool,

    /// Stop after this many resources (0 = unlimited)
    #[arg(long, value_name = "N", conflicts_with = "stats")]
    max_pages: Option<u64>,

    /// Show statistics from the checkpoint and exit
    #[arg(long)]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.stats {
        return handle_stats(&config);
    }

    let options = StartOptions {
        fresh: cli.fresh,
        retry_failed: cli.retry_failed,
        max_pages: cli.max_pages,
    };
    handle_crawl(&config, &config_hash, &options).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_capture=info,warn"),
            1 => EnvFilter::new("sumi_capture=debug,info"),
            2 => EnvFilter::new("sumi_capture=trace,debug"),
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

/// Handles the --stats mode: shows statistics from the checkpoint
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    use sumi_capture::output::{load_statistics, print_statistics};
    use sumi_capture::storage::open_checkpointer;

    let path = &config.output.checkpoint_path;
    if !path.exists() {
        bail!("No checkpoint at {}", path.display());
    }
    println!("Checkpoint: {}\n", path.display());

    let checkpointer = open_checkpointer(config.output.body_store_path.as_deref())
        .context("Failed to open the body store")?;
    let stats = load_statistics(path, &checkpointer)
        .with_context(|| format!("Failed to read checkpoint {}", path.display()))?;

    print_statistics(&stats);
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: &Config,
    config_hash: &str,
    options: &StartOptions,
) -> anyhow::Result<()> {
    if options.fresh {
        tracing::info!("Starting fresh capture (ignoring previous checkpoint)");
    } else {
        tracing::info!("Starting capture (will resume if a checkpoint exists)");
    }
    tracing::info!(
        "Target domain: {}, seed: {}",
        config.crawler.target_domain,
        config.crawler.seed
    );

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current step");
            signal_token.cancel();
        }
    });

    match crawl(config, config_hash, options, cancel).await {
        Ok(summary) => {
            if summary.finished {
                tracing::info!(
                    "Capture completed: {} resources captured, {} failed",
                    summary.progress.captured,
                    summary.progress.failed
                );
            } else {
                tracing::info!(
                    "Run ended after {} steps, {} resources remaining",
                    summary.steps,
                    summary.progress.remaining
                );
            }
            Ok(())
        }
        Err(CaptureError::Cancelled) => bail!(
            "Capture interrupted; progress saved to {}",
            config.output.checkpoint_path.display()
        ),
        Err(e) => {
            tracing::error!("Capture failed: {}", e);
            Err(e).context("Capture failed")
        }
    }
}
