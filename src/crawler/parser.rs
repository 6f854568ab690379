//! HTML link extraction
//!
//! Extraction returns the raw `href` values of anchors in document order.
//! Resolving and filtering them is the scope policy's job.

use crate::state::Body;
use crate::url::{CanonicalUrl, ScopePolicy};
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use url::Url;

/// Capability to list the raw links of a document
pub trait LinkExtractor: Send + Sync {
    /// Returns the raw href of every anchor that has one, in document order
    fn extract_links(&self, html: &str) -> Vec<String>;
}

/// [`LinkExtractor`] for HTML documents, built on `scraper`
///
/// Malformed markup is parsed leniently; a document without anchors yields
/// an empty list.
///
/// # Example
///
/// ```
/// use sumi_capture::crawler::{HtmlLinkExtractor, LinkExtractor};
///
/// let html = r#"<a href="/a">A</a><a name="x">no href</a><a href="b.html">B</a>"#;
/// let links = HtmlLinkExtractor.extract_links(html);
/// assert_eq!(links, vec!["/a", "b.html"]);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlLinkExtractor;

impl LinkExtractor for HtmlLinkExtractor {
    fn extract_links(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);

        let selector = match Selector::parse("a[href]") {
            Ok(s) => s,
            Err(_) => return Vec::new(),
        };

        document
            .select(&selector)
            .filter_map(|element| element.value().attr("href"))
            .map(str::to_string)
            .collect()
    }
}

/// Extracts the links of an HTML body and keeps the in-scope ones
///
/// Each raw href is resolved against `base` (the URL of the page itself) and
/// canonicalized by the scope policy. Rejected links are dropped; duplicates
/// collapse into one entry.
pub fn in_scope_links(
    extractor: &dyn LinkExtractor,
    scope: &ScopePolicy,
    base: &Url,
    body: &Body,
) -> BTreeSet<CanonicalUrl> {
    let mut links = BTreeSet::new();
    for raw in extractor.extract_links(&body.text()) {
        match scope.resolve(base, &raw) {
            Ok(link) => {
                links.insert(link);
            }
            Err(rejection) => {
                tracing::trace!("Skipping link {:?} on {}: {:?}", raw, base, rejection);
            }
        }
    }
    links
}
