//! Crawl driver - runs the engine to completion with periodic checkpoints
//!
//! The driver owns the policies the engine deliberately leaves out:
//! - Starting fresh or resuming from the last checkpoint
//! - Pacing between steps
//! - Checkpointing every N steps and once more on the way out
//! - Stopping after a page budget or on cancellation

use crate::config::Config;
use crate::crawler::engine::{CrawlEngine, CrawlProgress, Step};
use crate::state::CrawlSession;
use crate::storage::Checkpointer;
use crate::CaptureError;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Options for one driver run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Where checkpoints are written
    pub checkpoint_path: PathBuf,
    /// Steps between two periodic checkpoints
    pub checkpoint_interval: u64,
    /// Pause after every step
    pub request_delay: Duration,
    /// Stop after this many steps; None runs until the frontier is empty
    pub max_pages: Option<u64>,
}

impl RunOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            checkpoint_path: config.output.checkpoint_path.clone(),
            checkpoint_interval: config.crawler.checkpoint_interval.max(1),
            request_delay: config.crawler.request_delay(),
            max_pages: match config.crawler.max_pages_per_run {
                0 => None,
                n => Some(n),
            },
        }
    }
}

/// What a driver run did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Steps that captured a resource
    pub steps: u64,
    /// Checkpoints written, including the final one
    pub checkpoints: u64,
    /// True if the frontier was exhausted
    pub finished: bool,
    pub progress: CrawlProgress,
}

/// Loads the session to continue, or starts a new one from the seed
///
/// # Arguments
///
/// * `config` - Run configuration
/// * `config_hash` - Hash of the configuration file, stored in the session
/// * `checkpointer` - Used to read an existing checkpoint
/// * `fresh` - Ignore any existing checkpoint
///
/// # Errors
///
/// An existing checkpoint that cannot be loaded is an error; it is never
/// silently replaced by a new session.
pub fn prepare_session(
    config: &Config,
    config_hash: &str,
    checkpointer: &Checkpointer,
    fresh: bool,
) -> Result<CrawlSession, CaptureError> {
    let path = &config.output.checkpoint_path;

    let mut session = if !fresh && path.exists() {
        let session = checkpointer.load_from_path(path)?;
        info!(
            "Resuming from {}: {} resources, {} remaining",
            path.display(),
            session.registry().len(),
            session.remaining_count()
        );

        if session.scope().target_domain() != config.scope_policy().target_domain() {
            warn!(
                "Checkpoint targets {} but the configuration targets {}; keeping the checkpoint scope",
                session.scope().target_domain(),
                config.crawler.target_domain
            );
        }
        if session.config_hash().is_some_and(|hash| hash != config_hash) {
            warn!("Configuration changed since the checkpoint was written");
        }
        session
    } else {
        if fresh && path.exists() {
            info!("Ignoring existing checkpoint at {}", path.display());
        }
        info!("Starting new crawl at {}", config.crawler.seed);
        CrawlSession::new(&config.crawler.seed, config.scope_policy())?
    };

    session.set_config_hash(config_hash);
    Ok(session)
}

/// Runs the crawl loop
///
/// # Loop
///
/// 1. Stop if the page budget is used up
/// 2. Run one engine step; stop at end of crawl
/// 3. Log progress
/// 4. Checkpoint every `checkpoint_interval` steps
/// 5. Sleep `request_delay` (cancellable)
///
/// A final checkpoint is written however the loop ends, including
/// cancellation and engine errors.
///
/// # Returns
///
/// * `Ok(RunSummary)` - The loop ended normally and the final checkpoint was written
/// * `Err(CaptureError::Cancelled)` - The token fired; the checkpoint was still written
/// * `Err(CaptureError)` - Engine or checkpoint failure
pub async fn run_crawl(
    engine: &mut CrawlEngine,
    checkpointer: &mut Checkpointer,
    options: &RunOptions,
) -> Result<RunSummary, CaptureError> {
    let cancel = engine.cancellation_token().clone();
    let interval = options.checkpoint_interval.max(1);
    let mut steps: u64 = 0;
    let mut checkpoints: u64 = 0;

    let outcome: Result<bool, CaptureError> = loop {
        if options.max_pages.is_some_and(|max| steps >= max) {
            info!("Reached the limit of {} pages for this run", steps);
            break Ok(false);
        }

        let captured = match engine.step().await {
            Ok(Step::Captured(_)) => true,
            Ok(Step::EndOfCrawl) => false,
            Err(e) => break Err(e),
        };

        if !captured {
            info!("Frontier is empty, crawl complete");
            break Ok(true);
        }

        steps += 1;
        let progress = engine.progress();
        info!(
            "Crawled resource {}. {} remaining ({:.2}% done)",
            progress.captured + progress.failed,
            progress.remaining,
            progress.percent_done()
        );

        if steps % interval == 0 {
            if let Err(e) = checkpointer.save_to_path(engine.session(), &options.checkpoint_path)
            {
                break Err(e.into());
            }
            checkpoints += 1;
        }

        if !options.request_delay.is_zero() && !pause(options.request_delay, &cancel).await {
            break Err(CaptureError::Cancelled);
        }
    };

    let saved = checkpointer.save_to_path(engine.session(), &options.checkpoint_path);

    match (outcome, saved) {
        (Ok(finished), Ok(())) => Ok(RunSummary {
            steps,
            checkpoints: checkpoints + 1,
            finished,
            progress: engine.progress(),
        }),
        (Ok(_), Err(e)) => {
            error!("Failed to write final checkpoint: {}", e);
            Err(e.into())
        }
        (Err(e), Ok(())) => {
            if matches!(e, CaptureError::Cancelled) {
                warn!("Crawl interrupted, progress saved after {} steps", steps);
            }
            Err(e)
        }
        (Err(e), Err(save_error)) => {
            error!("Failed to write final checkpoint: {}", save_error);
            Err(e)
        }
    }
}

/// Sleeps for `delay` unless the token fires first
///
/// Returns false if the sleep was cut short by cancellation.
pub async fn pause(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
