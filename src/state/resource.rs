//! Resource state machine
//!
//! A resource is one canonical URL plus the outcome of fetching it. It starts
//! `Unfetched` and makes exactly one transition into a terminal state.

use crate::url::CanonicalUrl;
use crate::CaptureError;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;

/// Media types that are treated as HTML pages
const HTML_MEDIA_TYPES: &[&str] = &["text/html", "application/xhtml+xml"];

/// Category of a failed fetch
///
/// The category is informational; only `Timeout` changes engine behaviour
/// (it triggers the recovery pause).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The request or the body transfer timed out
    Timeout,
    /// TLS handshake or certificate verification failed
    Tls,
    /// The connection could not be established
    Connection,
    /// The server answered with an error status or a malformed response
    HttpError,
    /// Any other transport failure
    Other,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Tls => "tls",
            Self::Connection => "connection",
            Self::HttpError => "http_error",
            Self::Other => "other",
        }
    }

    pub fn all() -> [Self; 5] {
        [
            Self::Timeout,
            Self::Tls,
            Self::Connection,
            Self::HttpError,
            Self::Other,
        ]
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw response body owned by a fetched resource
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Body(Vec<u8>);

impl Body {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decodes the body as UTF-8, replacing invalid sequences
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }

    /// Hex-encoded SHA-256 digest of the body
    pub fn sha256_hex(&self) -> String {
        hex::encode(Sha256::digest(&self.0))
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Body({} bytes)", self.0.len())
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Self(text.as_bytes().to_vec())
    }
}

/// A successful HTTP response retained on a fetched resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Body,
    pub fetched_at: DateTime<Utc>,
}

impl Capture {
    /// Returns true if the declared content type is an HTML media type
    pub fn is_html(&self) -> bool {
        self.content_type.as_deref().is_some_and(is_html_content_type)
    }
}

/// Checks whether a Content-Type header value declares HTML
///
/// Parameters such as `charset` are ignored and the comparison is
/// case-insensitive.
///
/// # Examples
///
/// ```
/// use sumi_capture::state::is_html_content_type;
///
/// assert!(is_html_content_type("text/html; charset=utf-8"));
/// assert!(!is_html_content_type("application/pdf"));
/// ```
pub fn is_html_content_type(content_type: &str) -> bool {
    let media_type = content_type.split(';').next().unwrap_or("").trim();
    HTML_MEDIA_TYPES
        .iter()
        .any(|html| media_type.eq_ignore_ascii_case(html))
}

/// Result of a fetch attempt, ready to be applied to a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Failed { kind: FailureKind, detail: String },
    Opaque(Capture),
    Page {
        capture: Capture,
        links: BTreeSet<CanonicalUrl>,
    },
}

/// Fetch state of a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState {
    /// Known but not yet fetched
    Unfetched,

    /// The fetch attempt failed
    FetchFailed { kind: FailureKind, detail: String },

    /// Fetched, content is not HTML
    FetchedOpaque { capture: Capture },

    /// Fetched HTML page and the in-scope links found on it
    ///
    /// Links are canonical URLs, i.e. keys into the registry. The page does
    /// not own the resources it links to.
    FetchedPage {
        capture: Capture,
        links: BTreeSet<CanonicalUrl>,
    },
}

impl ResourceState {
    /// Stable snake_case name of the state
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unfetched => "unfetched",
            Self::FetchFailed { .. } => "fetch_failed",
            Self::FetchedOpaque { .. } => "fetched_opaque",
            Self::FetchedPage { .. } => "fetched_page",
        }
    }

    pub fn all_labels() -> [&'static str; 4] {
        ["unfetched", "fetch_failed", "fetched_opaque", "fetched_page"]
    }
}

/// One discovered URL and its fetch state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    url: CanonicalUrl,
    state: ResourceState,
}

impl Resource {
    /// Creates a new unfetched resource
    pub fn new(url: CanonicalUrl) -> Self {
        Self {
            url,
            state: ResourceState::Unfetched,
        }
    }

    /// Rebuilds a resource in an arbitrary state (checkpoint restore)
    pub(crate) fn restored(url: CanonicalUrl, state: ResourceState) -> Self {
        Self { url, state }
    }

    pub fn url(&self) -> &CanonicalUrl {
        &self.url
    }

    pub fn state(&self) -> &ResourceState {
        &self.state
    }

    pub fn label(&self) -> &'static str {
        self.state.label()
    }

    pub fn is_unfetched(&self) -> bool {
        matches!(self.state, ResourceState::Unfetched)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, ResourceState::FetchFailed { .. })
    }

    /// The captured response, for both fetched states
    pub fn capture(&self) -> Option<&Capture> {
        match &self.state {
            ResourceState::FetchedOpaque { capture } | ResourceState::FetchedPage { capture, .. } => {
                Some(capture)
            }
            _ => None,
        }
    }

    pub fn body(&self) -> Option<&Body> {
        self.capture().map(|capture| &capture.body)
    }

    /// Links discovered on the page; None unless this is a fetched page
    pub fn links(&self) -> Option<&BTreeSet<CanonicalUrl>> {
        match &self.state {
            ResourceState::FetchedPage { links, .. } => Some(links),
            _ => None,
        }
    }

    /// Failure category and detail for a failed resource
    pub fn failure(&self) -> Option<(FailureKind, &str)> {
        match &self.state {
            ResourceState::FetchFailed { kind, detail } => Some((*kind, detail.as_str())),
            _ => None,
        }
    }

    /// Applies the outcome of the single fetch attempt
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The resource left `Unfetched`
    /// * `Err(CaptureError::InvalidTransition)` - The resource was already fetched
    pub fn complete(&mut self, outcome: FetchOutcome) -> Result<(), CaptureError> {
        if !self.is_unfetched() {
            return Err(CaptureError::InvalidTransition {
                url: self.url.to_string(),
                from: self.label(),
            });
        }

        self.state = match outcome {
            FetchOutcome::Failed { kind, detail } => ResourceState::FetchFailed { kind, detail },
            FetchOutcome::Opaque(capture) => ResourceState::FetchedOpaque { capture },
            FetchOutcome::Page { capture, links } => ResourceState::FetchedPage { capture, links },
        };
        Ok(())
    }

    /// Moves a failed resource back to `Unfetched`
    ///
    /// Used only by a driver that decides to retry failures in a new session.
    /// Returns false if the resource had not failed.
    pub(crate) fn reset_failure(&mut self) -> bool {
        if self.is_failed() {
            self.state = ResourceState::Unfetched;
            true
        } else {
            false
        }
    }
}
