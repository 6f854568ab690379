//! Registry of every discovered resource, keyed by canonical URL

use crate::state::resource::{FetchOutcome, Resource, ResourceState};
use crate::url::CanonicalUrl;
use crate::CaptureError;
use std::collections::HashMap;

/// Discovered resources, at most one per canonical URL
///
/// Registration is idempotent and resources are never removed. The registry
/// owns every resource; pages refer to their links by canonical URL only, so
/// cyclic link graphs need no shared ownership.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    resources: HashMap<CanonicalUrl, Resource>,
}

/// Number of resources per state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateCounts {
    pub unfetched: usize,
    pub fetch_failed: usize,
    pub fetched_opaque: usize,
    pub fetched_page: usize,
}

impl StateCounts {
    pub fn total(&self) -> usize {
        self.unfetched + self.fetch_failed + self.fetched_opaque + self.fetched_page
    }

    /// Resources that left `Unfetched`, successfully or not
    pub fn attempted(&self) -> usize {
        self.fetch_failed + self.fetched_opaque + self.fetched_page
    }

    pub fn fetched(&self) -> usize {
        self.fetched_opaque + self.fetched_page
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a URL as a new unfetched resource
    ///
    /// Returns true if the URL was not known before. An existing entry is
    /// left untouched whatever its state.
    pub fn register_if_absent(&mut self, url: &CanonicalUrl) -> bool {
        if self.resources.contains_key(url) {
            return false;
        }
        self.resources
            .insert(url.clone(), Resource::new(url.clone()));
        true
    }

    /// Inserts a resource restored from a checkpoint, replacing nothing
    ///
    /// Returns false if a resource with the same URL already exists.
    pub(crate) fn insert_restored(&mut self, resource: Resource) -> bool {
        if self.resources.contains_key(resource.url()) {
            return false;
        }
        self.resources.insert(resource.url().clone(), resource);
        true
    }

    pub fn get(&self, url: &CanonicalUrl) -> Option<&Resource> {
        self.resources.get(url)
    }

    pub fn contains(&self, url: &CanonicalUrl) -> bool {
        self.resources.contains_key(url)
    }

    /// Applies a fetch outcome to a registered resource
    ///
    /// # Errors
    ///
    /// * `CaptureError::InvalidTransition` - The resource is unknown or already fetched
    pub fn transition(
        &mut self,
        url: &CanonicalUrl,
        outcome: FetchOutcome,
    ) -> Result<&Resource, CaptureError> {
        let resource = self
            .resources
            .get_mut(url)
            .ok_or_else(|| CaptureError::InvalidTransition {
                url: url.to_string(),
                from: "unregistered",
            })?;
        resource.complete(outcome)?;
        Ok(resource)
    }

    /// Moves every failed resource back to `Unfetched`, returning their URLs
    pub(crate) fn reset_failures(&mut self) -> Vec<CanonicalUrl> {
        self.resources
            .values_mut()
            .filter_map(|resource| {
                resource
                    .reset_failure()
                    .then(|| resource.url().clone())
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Counts resources per state
    pub fn counts(&self) -> StateCounts {
        let mut counts = StateCounts::default();
        for resource in self.resources.values() {
            match resource.state() {
                ResourceState::Unfetched => counts.unfetched += 1,
                ResourceState::FetchFailed { .. } => counts.fetch_failed += 1,
                ResourceState::FetchedOpaque { .. } => counts.fetched_opaque += 1,
                ResourceState::FetchedPage { .. } => counts.fetched_page += 1,
            }
        }
        counts
    }
}
