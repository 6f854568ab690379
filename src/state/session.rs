//! Crawl session: the registry, the frontier and the crawl parameters

use crate::state::frontier::Frontier;
use crate::state::registry::{Registry, StateCounts};
use crate::state::resource::{FetchOutcome, Resource};
use crate::url::{canonicalize_str, CanonicalUrl, ScopePolicy};
use crate::{CaptureError, UrlError};
use std::collections::BTreeSet;

/// Everything needed to continue a crawl
///
/// A session is created from a seed URL or restored from a checkpoint. It
/// keeps the frontier consistent with the registry: every pending URL is
/// registered and still `Unfetched`.
#[derive(Debug, Clone)]
pub struct CrawlSession {
    start_url: CanonicalUrl,
    scope: ScopePolicy,
    registry: Registry,
    frontier: Frontier,
    config_hash: Option<String>,
}

impl CrawlSession {
    /// Starts a new crawl at `seed`
    ///
    /// The seed is canonicalized, registered and placed in the frontier.
    ///
    /// # Errors
    ///
    /// * `CaptureError::Url` - The seed is malformed or outside the target domain
    pub fn new(seed: &str, scope: ScopePolicy) -> Result<Self, CaptureError> {
        let start_url = canonicalize_str(seed)?;
        if !scope.accepts(start_url.as_str()) {
            return Err(UrlError::OutOfScope(start_url.to_string()).into());
        }

        let mut registry = Registry::new();
        registry.register_if_absent(&start_url);
        let mut frontier = Frontier::new();
        frontier.insert(start_url.clone());

        Ok(Self {
            start_url,
            scope,
            registry,
            frontier,
            config_hash: None,
        })
    }

    /// Assembles a session from restored parts
    ///
    /// The caller is responsible for the frontier/registry consistency.
    pub(crate) fn from_parts(
        start_url: CanonicalUrl,
        scope: ScopePolicy,
        registry: Registry,
        frontier: Frontier,
    ) -> Self {
        Self {
            start_url,
            scope,
            registry,
            frontier,
            config_hash: None,
        }
    }

    pub fn start_url(&self) -> &CanonicalUrl {
        &self.start_url
    }

    pub fn scope(&self) -> &ScopePolicy {
        &self.scope
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    pub fn resource(&self, url: &CanonicalUrl) -> Option<&Resource> {
        self.registry.get(url)
    }

    pub fn remaining_count(&self) -> usize {
        self.frontier.len()
    }

    pub fn is_complete(&self) -> bool {
        self.frontier.is_empty()
    }

    pub fn counts(&self) -> StateCounts {
        self.registry.counts()
    }

    /// Hash of the configuration the session was last run with
    pub fn config_hash(&self) -> Option<&str> {
        self.config_hash.as_deref()
    }

    pub fn set_config_hash(&mut self, hash: impl Into<String>) {
        self.config_hash = Some(hash.into());
    }

    /// Puts every failed resource back into the frontier
    ///
    /// A session never retries on its own; this is for a driver that starts
    /// a new run with retries enabled. Returns the number of requeued URLs.
    pub fn requeue_failed(&mut self) -> usize {
        let reset = self.registry.reset_failures();
        let count = reset.len();
        for url in reset {
            self.frontier.insert(url);
        }
        count
    }

    /// Takes the next URL to fetch out of the frontier
    pub(crate) fn take_next(&mut self) -> Option<CanonicalUrl> {
        self.frontier.pop()
    }

    /// Returns a URL that was taken but not fetched
    pub(crate) fn put_back(&mut self, url: CanonicalUrl) {
        if self.registry.get(&url).is_some_and(Resource::is_unfetched) {
            self.frontier.insert(url);
        }
    }

    /// Applies the outcome of fetching `url`
    pub(crate) fn record(
        &mut self,
        url: &CanonicalUrl,
        outcome: FetchOutcome,
    ) -> Result<&Resource, CaptureError> {
        self.registry.transition(url, outcome)
    }

    /// Registers newly discovered links and queues the unfetched ones
    ///
    /// Returns the number of URLs that were not known before.
    pub(crate) fn discover(&mut self, links: &BTreeSet<CanonicalUrl>) -> usize {
        let mut new_urls = 0;
        for link in links {
            if self.registry.register_if_absent(link) {
                new_urls += 1;
            }
            if self.registry.get(link).is_some_and(Resource::is_unfetched) {
                self.frontier.insert(link.clone());
            }
        }
        new_urls
    }
}
