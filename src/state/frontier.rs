//! Frontier of resources waiting to be fetched

use crate::url::CanonicalUrl;
use std::collections::HashSet;

/// Set of canonical URLs that are registered, unfetched and not yet taken
///
/// The frontier is a set rather than a queue: `pop` hands out an arbitrary
/// element and callers must not rely on any order. Inserting a URL that is
/// already pending has no effect.
#[derive(Debug, Clone, Default)]
pub struct Frontier {
    pending: HashSet<CanonicalUrl>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a URL, returning false if it was already pending
    pub fn insert(&mut self, url: CanonicalUrl) -> bool {
        self.pending.insert(url)
    }

    /// Removes and returns an arbitrary pending URL
    pub fn pop(&mut self) -> Option<CanonicalUrl> {
        let next = self.pending.iter().next().cloned()?;
        self.pending.remove(&next);
        Some(next)
    }

    pub fn contains(&self, url: &CanonicalUrl) -> bool {
        self.pending.contains(url)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CanonicalUrl> {
        self.pending.iter()
    }

    /// Pending URLs in lexicographic order
    pub fn sorted(&self) -> Vec<CanonicalUrl> {
        let mut urls: Vec<_> = self.pending.iter().cloned().collect();
        urls.sort();
        urls
    }
}

impl FromIterator<CanonicalUrl> for Frontier {
    fn from_iter<I: IntoIterator<Item = CanonicalUrl>>(iter: I) -> Self {
        Self {
            pending: iter.into_iter().collect(),
        }
    }
}
