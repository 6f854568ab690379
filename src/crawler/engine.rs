//! Crawl engine
//!
//! The engine advances a [`CrawlSession`] one resource at a time. Each call to
//! [`CrawlEngine::step`] takes an arbitrary URL out of the frontier, fetches it
//! exactly once, records the outcome and queues newly discovered in-scope
//! links. Between two steps the session is always consistent and can be
//! checkpointed.

use crate::config::Config;
use crate::crawler::fetcher::{FetchResponse, Fetcher, TransportError};
use crate::crawler::parser::{in_scope_links, LinkExtractor};
use crate::state::{Body, Capture, CrawlSession, FailureKind, FetchOutcome, Resource};
use crate::url::CanonicalUrl;
use crate::CaptureError;
use chrono::Utc;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Engine tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Wait imposed on the step after a timed out fetch
    pub timeout_pause: Duration,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout_pause: config.crawler.timeout_pause(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            timeout_pause: Duration::from_secs(60),
        }
    }
}

/// Result of one engine step
#[derive(Debug)]
pub enum Step<'a> {
    /// A resource left `Unfetched`; the reference shows its new state
    Captured(&'a Resource),
    /// The frontier is empty
    EndOfCrawl,
}

/// Snapshot of crawl progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlProgress {
    /// Registered resources
    pub discovered: usize,
    /// Resources fetched successfully (page or opaque)
    pub captured: usize,
    /// Resources whose fetch failed
    pub failed: usize,
    /// Resources waiting in the frontier
    pub remaining: usize,
}

impl CrawlProgress {
    /// Share of known work already attempted, in percent
    pub fn percent_done(&self) -> f64 {
        let attempted = self.captured + self.failed;
        let total = attempted + self.remaining;
        if total == 0 {
            100.0
        } else {
            attempted as f64 / total as f64 * 100.0
        }
    }
}

/// Drives a crawl session through fetch steps
pub struct CrawlEngine {
    session: CrawlSession,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn LinkExtractor>,
    settings: EngineSettings,
    cancel: CancellationToken,
    resume_at: Option<Instant>,
}

impl CrawlEngine {
    /// Creates an engine around a new or restored session
    ///
    /// # Arguments
    ///
    /// * `session` - The session to advance
    /// * `fetcher` - HTTP capability
    /// * `extractor` - HTML link capability
    /// * `settings` - Engine tuning
    /// * `cancel` - Token that interrupts the current or next step
    pub fn new(
        session: CrawlSession,
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn LinkExtractor>,
        settings: EngineSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            session,
            fetcher,
            extractor,
            settings,
            cancel,
            resume_at: None,
        }
    }

    /// Performs one crawl step
    ///
    /// # Returns
    ///
    /// * `Ok(Step::Captured(resource))` - One resource was fetched; its state
    ///   is `FetchedPage`, `FetchedOpaque` or `FetchFailed`
    /// * `Ok(Step::EndOfCrawl)` - Nothing is left to fetch
    /// * `Err(CaptureError::Cancelled)` - The token was cancelled; a resource
    ///   taken for this step is back in the frontier, still `Unfetched`
    ///
    /// A pause left by a timed out fetch delays only the next fetch; an empty
    /// frontier ends the crawl without waiting.
    ///
    /// Fetch failures are recorded on the resource and never returned as
    /// errors.
    pub async fn step(&mut self) -> Result<Step<'_>, CaptureError> {
        if self.cancel.is_cancelled() {
            return Err(CaptureError::Cancelled);
        }

        let Some(url) = self.session.take_next() else {
            debug!("Frontier is empty");
            return Ok(Step::EndOfCrawl);
        };

        if let Err(e) = self.wait_out_pause().await {
            self.session.put_back(url);
            return Err(e);
        }

        let outcome = match url.to_url() {
            Ok(target) => {
                debug!("Fetching {}", url);
                let fetched = self.fetch_cancellable(&url, &target).await?;
                self.classify(&target, fetched)
            }
            Err(e) => FetchOutcome::Failed {
                kind: FailureKind::Other,
                detail: format!("unparseable canonical URL: {}", e),
            },
        };

        let discovered = match &outcome {
            FetchOutcome::Page { links, .. } => Some(links.clone()),
            FetchOutcome::Failed { kind, detail } => {
                warn!("{} failed with reason {}: {}", url, kind, detail);
                if *kind == FailureKind::Timeout {
                    self.resume_at = Some(Instant::now() + self.settings.timeout_pause);
                    warn!(
                        "Timeout recorded, next step waits {:?}",
                        self.settings.timeout_pause
                    );
                }
                None
            }
            FetchOutcome::Opaque(_) => None,
        };

        self.session.record(&url, outcome)?;

        if let Some(links) = discovered {
            let new_urls = self.session.discover(&links);
            info!(
                "Captured page {} ({} links, {} new)",
                url,
                links.len(),
                new_urls
            );
        } else if let Some(resource) = self.session.resource(&url) {
            if let Some(capture) = resource.capture() {
                info!(
                    "Captured {} ({}, {} bytes)",
                    url,
                    capture.content_type.as_deref().unwrap_or("no content type"),
                    capture.body.len()
                );
            }
        }

        self.session
            .resource(&url)
            .map(Step::Captured)
            .ok_or_else(|| CaptureError::InvalidTransition {
                url: url.to_string(),
                from: "unregistered",
            })
    }

    /// Sleeps until a pending timeout pause has elapsed
    async fn wait_out_pause(&mut self) -> Result<(), CaptureError> {
        let Some(deadline) = self.resume_at.take() else {
            return Ok(());
        };

        if deadline <= Instant::now() {
            return Ok(());
        }

        info!("Waiting for timeout pause to end");
        let cancel = self.cancel.clone();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.resume_at = Some(deadline);
                Err(CaptureError::Cancelled)
            }
            _ = tokio::time::sleep_until(deadline) => Ok(()),
        }
    }

    /// Runs the fetch, putting the URL back if the token fires first
    async fn fetch_cancellable(
        &mut self,
        url: &CanonicalUrl,
        target: &Url,
    ) -> Result<Result<FetchResponse, TransportError>, CaptureError> {
        let fetcher = Arc::clone(&self.fetcher);
        let cancel = self.cancel.clone();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Fetch of {} interrupted", url);
                self.session.put_back(url.clone());
                Err(CaptureError::Cancelled)
            }
            fetched = fetcher.fetch(target) => Ok(fetched),
        }
    }

    /// Turns a fetch result into the outcome recorded on the resource
    fn classify(&self, base: &Url, fetched: Result<FetchResponse, TransportError>) -> FetchOutcome {
        let response = match fetched {
            Ok(response) => response,
            Err(e) => {
                return FetchOutcome::Failed {
                    kind: e.kind,
                    detail: e.message,
                }
            }
        };

        if response.status >= 400 {
            return FetchOutcome::Failed {
                kind: FailureKind::HttpError,
                detail: describe_status(response.status),
            };
        }

        let capture = Capture {
            status: response.status,
            content_type: response.content_type,
            body: Body::new(response.body),
            fetched_at: Utc::now(),
        };

        if capture.is_html() {
            let links = in_scope_links(
                self.extractor.as_ref(),
                self.session.scope(),
                base,
                &capture.body,
            );
            FetchOutcome::Page { capture, links }
        } else {
            FetchOutcome::Opaque(capture)
        }
    }

    pub fn remaining_count(&self) -> usize {
        self.session.remaining_count()
    }

    pub fn progress(&self) -> CrawlProgress {
        let counts = self.session.counts();
        CrawlProgress {
            discovered: counts.total(),
            captured: counts.fetched(),
            failed: counts.fetch_failed,
            remaining: self.session.remaining_count(),
        }
    }

    pub fn session(&self) -> &CrawlSession {
        &self.session
    }

    pub fn into_session(self) -> CrawlSession {
        self.session
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Formats an HTTP error status, e.g. "HTTP 404 Not Found"
fn describe_status(status: u16) -> String {
    match StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
    {
        Some(reason) => format!("HTTP {} {}", status, reason),
        None => format!("HTTP {}", status),
    }
}
