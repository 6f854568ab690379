//! Checkpoint serialization
//!
//! A checkpoint is one JSON document holding the whole session: every
//! registered resource with its state and body, the frontier and the crawl
//! parameters. Maps and lists are sorted so the same session always produces
//! the same document apart from `saved_at`.
//!
//! # Format
//!
//! ```text
//! {
//!   "format_version": 1,
//!   "saved_at": "2024-05-01T12:00:00Z",
//!   "config_hash": "9f86d0...",
//!   "start_url": "https://target.tld/",
//!   "target_domain": "target.tld",
//!   "resources": {
//!     "https://target.tld/": {
//!       "state": "fetched", "kind": "page", "status": 200,
//!       "content_type": "text/html", "fetched_at": "...",
//!       "body": { "utf8": "<html>..." }, "links": ["https://target.tld/a"]
//!     },
//!     "https://target.tld/a": { "state": "unfetched" }
//!   },
//!   "frontier": ["https://target.tld/a"]
//! }
//! ```

use crate::crawler::{in_scope_links, HtmlLinkExtractor, LinkExtractor};
use crate::state::{
    is_html_content_type, Body, Capture, CrawlSession, FailureKind, Frontier, Registry, Resource,
    ResourceState,
};
use crate::storage::atomic::write_atomically;
use crate::storage::body_store::BodyStore;
use crate::storage::{StorageError, StorageResult};
use crate::url::{canonicalize_str, CanonicalUrl, ScopePolicy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Version written into every checkpoint
pub const CHECKPOINT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Deserialize)]
struct VersionProbe {
    format_version: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointDocument {
    format_version: u32,
    saved_at: DateTime<Utc>,
    #[serde(default)]
    config_hash: Option<String>,
    start_url: CanonicalUrl,
    target_domain: String,
    resources: BTreeMap<CanonicalUrl, ResourceRecord>,
    #[serde(default)]
    frontier: Vec<CanonicalUrl>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
enum ResourceRecord {
    Unfetched,
    FetchFailed {
        kind: FailureKind,
        #[serde(default)]
        detail: String,
    },
    Fetched {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kind: Option<FetchedKind>,
        status: u16,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content_type: Option<String>,
        fetched_at: DateTime<Utc>,
        body: BodyRecord,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        links: Option<Vec<CanonicalUrl>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum FetchedKind {
    Page,
    Opaque,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum BodyRecord {
    Utf8(String),
    Hex(String),
    Stored { sha256: String },
}

/// Saves and restores crawl sessions
///
/// Bodies are written inline unless a [`BodyStore`] is attached, in which
/// case the checkpoint keeps their SHA-256 digest only.
pub struct Checkpointer {
    body_store: Option<Box<dyn BodyStore>>,
    extractor: Arc<dyn LinkExtractor>,
}

impl Default for Checkpointer {
    fn default() -> Self {
        Self::inline()
    }
}

impl Checkpointer {
    /// Checkpointer that keeps bodies inside the checkpoint document
    pub fn inline() -> Self {
        Self {
            body_store: None,
            extractor: Arc::new(HtmlLinkExtractor),
        }
    }

    /// Checkpointer that moves bodies into `store`
    pub fn with_body_store(store: Box<dyn BodyStore>) -> Self {
        Self {
            body_store: Some(store),
            extractor: Arc::new(HtmlLinkExtractor),
        }
    }

    /// Replaces the extractor used to re-derive links of pages saved without them
    pub fn with_extractor(mut self, extractor: Arc<dyn LinkExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn body_store(&self) -> Option<&dyn BodyStore> {
        self.body_store.as_deref()
    }

    /// Serializes a session
    ///
    /// With a body store attached, bodies are written to the store first so a
    /// document never references a body that is not stored.
    pub fn save(&mut self, session: &CrawlSession) -> StorageResult<Vec<u8>> {
        let mut resources = BTreeMap::new();
        for resource in session.registry().iter() {
            let record = self.record_for(resource)?;
            resources.insert(resource.url().clone(), record);
        }

        let document = CheckpointDocument {
            format_version: CHECKPOINT_FORMAT_VERSION,
            saved_at: Utc::now(),
            config_hash: session.config_hash().map(str::to_string),
            start_url: session.start_url().clone(),
            target_domain: session.scope().target_domain().to_string(),
            resources,
            frontier: session.frontier().sorted(),
        };

        Ok(serde_json::to_vec_pretty(&document)?)
    }

    /// Deserializes and validates a session
    ///
    /// # Errors
    ///
    /// * `StorageError::Json` - The document is not valid JSON or misses fields
    /// * `StorageError::UnsupportedVersion` - The document has another format version
    /// * `StorageError::FrontierNotRegistered` / `FrontierNotUnfetched` - The
    ///   frontier is inconsistent with the resources
    /// * `StorageError::MissingBody` / `DigestMismatch` / `InvalidBody` - A
    ///   body cannot be restored exactly
    /// * `StorageError::InvalidRecord` - A resource key or stored link is not
    ///   canonical or lies outside the target domain
    pub fn load(&self, bytes: &[u8]) -> StorageResult<CrawlSession> {
        let probe: VersionProbe = serde_json::from_slice(bytes)?;
        if probe.format_version != CHECKPOINT_FORMAT_VERSION {
            return Err(StorageError::UnsupportedVersion {
                found: probe.format_version,
                supported: CHECKPOINT_FORMAT_VERSION,
            });
        }

        let document: CheckpointDocument = serde_json::from_slice(bytes)?;
        let scope = ScopePolicy::new(&document.target_domain);

        let mut registry = Registry::new();
        let mut pending_links = BTreeSet::new();
        for (url, record) in document.resources {
            ensure_in_scope(&url, &scope, "resource key")?;
            let state = self.restore_state(&url, record, &scope, &mut pending_links)?;
            registry.insert_restored(Resource::restored(url, state));
        }

        if !registry.contains(&document.start_url) {
            return Err(StorageError::InvalidRecord(format!(
                "start URL {} is not a registered resource",
                document.start_url
            )));
        }

        let mut frontier = Frontier::new();
        for url in document.frontier {
            let resource = registry
                .get(&url)
                .ok_or_else(|| StorageError::FrontierNotRegistered(url.to_string()))?;
            if !resource.is_unfetched() {
                return Err(StorageError::FrontierNotUnfetched {
                    url: url.to_string(),
                    state: resource.label(),
                });
            }
            frontier.insert(url);
        }

        let stranded: Vec<CanonicalUrl> = registry
            .iter()
            .filter(|r| r.is_unfetched() && !frontier.contains(r.url()))
            .map(|r| r.url().clone())
            .collect();
        if !stranded.is_empty() {
            warn!(
                "{} unfetched resources were missing from the frontier, requeueing",
                stranded.len()
            );
            for url in stranded {
                frontier.insert(url);
            }
        }

        let mut session = CrawlSession::from_parts(document.start_url, scope, registry, frontier);
        let new_urls = session.discover(&pending_links);
        if new_urls > 0 {
            info!("Registered {} link targets missing from the checkpoint", new_urls);
        }
        if let Some(hash) = document.config_hash {
            session.set_config_hash(hash);
        }

        debug!(
            "Restored session with {} resources, {} pending",
            session.registry().len(),
            session.remaining_count()
        );
        Ok(session)
    }

    /// Saves a session to a file, replacing it atomically
    pub fn save_to_path(&mut self, session: &CrawlSession, path: &Path) -> StorageResult<()> {
        let bytes = self.save(session)?;
        write_atomically(path, &bytes)?;
        info!(
            "Checkpoint saved to {} ({} resources, {} pending)",
            path.display(),
            session.registry().len(),
            session.remaining_count()
        );
        Ok(())
    }

    /// Loads a session from a file
    pub fn load_from_path(&self, path: &Path) -> StorageResult<CrawlSession> {
        let bytes = std::fs::read(path)?;
        self.load(&bytes)
    }

    fn record_for(&mut self, resource: &Resource) -> StorageResult<ResourceRecord> {
        let record = match resource.state() {
            ResourceState::Unfetched => ResourceRecord::Unfetched,
            ResourceState::FetchFailed { kind, detail } => ResourceRecord::FetchFailed {
                kind: *kind,
                detail: detail.clone(),
            },
            ResourceState::FetchedOpaque { capture } => ResourceRecord::Fetched {
                kind: Some(FetchedKind::Opaque),
                status: capture.status,
                content_type: capture.content_type.clone(),
                fetched_at: capture.fetched_at,
                body: self.encode_body(resource.url(), &capture.body)?,
                links: None,
            },
            ResourceState::FetchedPage { capture, links } => ResourceRecord::Fetched {
                kind: Some(FetchedKind::Page),
                status: capture.status,
                content_type: capture.content_type.clone(),
                fetched_at: capture.fetched_at,
                body: self.encode_body(resource.url(), &capture.body)?,
                links: Some(links.iter().cloned().collect()),
            },
        };
        Ok(record)
    }

    fn encode_body(&mut self, url: &CanonicalUrl, body: &Body) -> StorageResult<BodyRecord> {
        if let Some(store) = self.body_store.as_mut() {
            let sha256 = store.put(url, body)?;
            return Ok(BodyRecord::Stored { sha256 });
        }

        Ok(match std::str::from_utf8(body.as_bytes()) {
            Ok(text) => BodyRecord::Utf8(text.to_string()),
            Err(_) => BodyRecord::Hex(hex::encode(body.as_bytes())),
        })
    }

    fn decode_body(&self, url: &CanonicalUrl, record: BodyRecord) -> StorageResult<Body> {
        match record {
            BodyRecord::Utf8(text) => Ok(Body::new(text.into_bytes())),
            BodyRecord::Hex(encoded) => hex::decode(&encoded)
                .map(Body::new)
                .map_err(|e| StorageError::InvalidBody {
                    url: url.to_string(),
                    reason: e.to_string(),
                }),
            BodyRecord::Stored { sha256 } => {
                let store = self
                    .body_store
                    .as_ref()
                    .ok_or_else(|| StorageError::MissingBody(url.to_string()))?;
                let body = store
                    .get(url)?
                    .ok_or_else(|| StorageError::MissingBody(url.to_string()))?;

                let actual = body.sha256_hex();
                if !actual.eq_ignore_ascii_case(&sha256) {
                    return Err(StorageError::DigestMismatch {
                        url: url.to_string(),
                        expected: sha256,
                        actual,
                    });
                }
                Ok(body)
            }
        }
    }

    fn restore_state(
        &self,
        url: &CanonicalUrl,
        record: ResourceRecord,
        scope: &ScopePolicy,
        pending_links: &mut BTreeSet<CanonicalUrl>,
    ) -> StorageResult<ResourceState> {
        let (kind, status, content_type, fetched_at, body, links) = match record {
            ResourceRecord::Unfetched => return Ok(ResourceState::Unfetched),
            ResourceRecord::FetchFailed { kind, detail } => {
                return Ok(ResourceState::FetchFailed { kind, detail })
            }
            ResourceRecord::Fetched {
                kind,
                status,
                content_type,
                fetched_at,
                body,
                links,
            } => (kind, status, content_type, fetched_at, body, links),
        };

        let capture = Capture {
            status,
            content_type,
            body: self.decode_body(url, body)?,
            fetched_at,
        };

        let kind = kind.unwrap_or_else(|| {
            if capture
                .content_type
                .as_deref()
                .is_some_and(is_html_content_type)
            {
                FetchedKind::Page
            } else {
                FetchedKind::Opaque
            }
        });

        if kind == FetchedKind::Opaque {
            return Ok(ResourceState::FetchedOpaque { capture });
        }

        let links: BTreeSet<CanonicalUrl> = match links {
            Some(links) => {
                for link in &links {
                    ensure_in_scope(link, scope, "link")?;
                }
                links.into_iter().collect()
            }
            None => {
                let base = url
                    .to_url()
                    .map_err(|e| StorageError::InvalidRecord(format!("{}: {}", url, e)))?;
                let derived = in_scope_links(self.extractor.as_ref(), scope, &base, &capture.body);
                debug!("Re-derived {} links for {}", derived.len(), url);
                derived
            }
        };
        pending_links.extend(links.iter().cloned());

        Ok(ResourceState::FetchedPage { capture, links })
    }
}

/// Rejects stored URLs that are not canonical or lie outside the scope
fn ensure_in_scope(url: &CanonicalUrl, scope: &ScopePolicy, what: &str) -> StorageResult<()> {
    match canonicalize_str(url.as_str()) {
        Ok(canonical) if &canonical == url => {}
        _ => {
            return Err(StorageError::InvalidRecord(format!(
                "{} {} is not a canonical URL",
                what, url
            )))
        }
    }

    if !scope.accepts(url.as_str()) {
        return Err(StorageError::InvalidRecord(format!(
            "{} {} is outside {}",
            what,
            url,
            scope.target_domain()
        )));
    }
    Ok(())
}
