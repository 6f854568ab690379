//! Crawler module for fetching and capturing resources
//!
//! This module contains the core crawling logic, including:
//! - The HTTP capability and its reqwest implementation
//! - HTML link extraction
//! - The step-wise crawl engine
//! - The driver that runs the engine with pacing and checkpoints

mod driver;
mod engine;
mod fetcher;
mod parser;

pub use driver::{pause, prepare_session, run_crawl, RunOptions, RunSummary};
pub use engine::{CrawlEngine, CrawlProgress, EngineSettings, Step};
pub use fetcher::{
    build_http_client, classify_error, FetchResponse, Fetcher, ReqwestFetcher, TransportError,
};
pub use parser::{in_scope_links, HtmlLinkExtractor, LinkExtractor};

use crate::config::Config;
use crate::storage::open_checkpointer;
use crate::CaptureError;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Command-line overrides for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartOptions {
    /// Ignore an existing checkpoint
    pub fresh: bool,
    /// Put failed resources back into the frontier before crawling
    pub retry_failed: bool,
    /// Overrides `max-pages-per-run` (0 = unlimited)
    pub max_pages: Option<u64>,
}

/// Runs a complete crawl from a configuration
///
/// Resumes from the configured checkpoint when it exists (unless
/// `options.fresh`), fetches with the real HTTP client and writes checkpoints
/// as it goes.
///
/// # Arguments
///
/// * `config` - The run configuration
/// * `config_hash` - Hash of the configuration file
/// * `options` - Command-line overrides
/// * `cancel` - Token that stops the crawl at the next safe point
pub async fn crawl(
    config: &Config,
    config_hash: &str,
    options: &StartOptions,
    cancel: CancellationToken,
) -> Result<RunSummary, CaptureError> {
    let extractor: Arc<dyn LinkExtractor> = Arc::new(HtmlLinkExtractor);
    let mut checkpointer = open_checkpointer(config.output.body_store_path.as_deref())?
        .with_extractor(Arc::clone(&extractor));
    let mut session = prepare_session(config, config_hash, &checkpointer, options.fresh)?;

    if options.retry_failed {
        let requeued = session.requeue_failed();
        info!("Requeued {} failed resources", requeued);
    }

    let mut run_options = RunOptions::from_config(config);
    if let Some(max) = options.max_pages {
        run_options.max_pages = (max > 0).then_some(max);
    }

    let fetcher = ReqwestFetcher::from_config(&config.user_agent, &config.http)?;
    let mut engine = CrawlEngine::new(
        session,
        Arc::new(fetcher),
        extractor,
        EngineSettings::from_config(config),
        cancel,
    );

    run_crawl(&mut engine, &mut checkpointer, &run_options).await
}
