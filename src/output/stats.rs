//! Statistics generation from a crawl session
//!
//! This module provides functionality for extracting and displaying crawl
//! statistics from a live or checkpointed session.

use crate::state::{CrawlSession, FailureKind, ResourceState};
use crate::storage::Checkpointer;
use crate::url::extract_domain;
use crate::CaptureError;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Crawl statistics summary
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlStatistics {
    /// Seed URL of the crawl
    pub start_url: String,

    /// Number of registered resources
    pub total_resources: usize,

    /// Count of resources by state label
    pub resources_by_state: BTreeMap<&'static str, usize>,

    /// Count of failed resources by failure category
    pub failures_by_kind: BTreeMap<&'static str, usize>,

    /// Count of fetched resources by media type
    pub content_types: BTreeMap<String, usize>,

    /// Number of distinct hosts among registered resources
    pub unique_hosts: usize,

    /// Total number of in-scope links recorded on pages
    pub total_links: usize,

    /// Sum of captured body sizes
    pub bytes_captured: u64,

    /// Resources still in the frontier
    pub remaining: usize,
}

impl CrawlStatistics {
    /// Computes statistics for a session
    pub fn from_session(session: &CrawlSession) -> Self {
        let mut resources_by_state: BTreeMap<&'static str, usize> = ResourceState::all_labels()
            .into_iter()
            .map(|label| (label, 0))
            .collect();
        let mut failures_by_kind = BTreeMap::new();
        let mut content_types = BTreeMap::new();
        let mut hosts = HashSet::new();
        let mut total_links = 0;
        let mut bytes_captured = 0u64;

        for resource in session.registry().iter() {
            *resources_by_state.entry(resource.label()).or_insert(0) += 1;

            if let Some(host) = resource.url().to_url().ok().as_ref().and_then(extract_domain) {
                hosts.insert(host);
            }

            match resource.state() {
                ResourceState::FetchFailed { kind, .. } => {
                    *failures_by_kind.entry(kind.as_str()).or_insert(0) += 1;
                }
                ResourceState::FetchedPage { links, .. } => total_links += links.len(),
                _ => {}
            }

            if let Some(capture) = resource.capture() {
                bytes_captured += capture.body.len() as u64;
                let media_type = capture
                    .content_type
                    .as_deref()
                    .and_then(|ct| ct.split(';').next())
                    .map(|ct| ct.trim().to_lowercase())
                    .filter(|ct| !ct.is_empty())
                    .unwrap_or_else(|| "unknown".to_string());
                *content_types.entry(media_type).or_insert(0) += 1;
            }
        }

        Self {
            start_url: session.start_url().to_string(),
            total_resources: session.registry().len(),
            resources_by_state,
            failures_by_kind,
            content_types,
            unique_hosts: hosts.len(),
            total_links,
            bytes_captured,
            remaining: session.remaining_count(),
        }
    }

    fn state_count(&self, label: &str) -> usize {
        self.resources_by_state.get(label).copied().unwrap_or(0)
    }

    /// Resources fetched successfully
    pub fn captured(&self) -> usize {
        self.state_count("fetched_page") + self.state_count("fetched_opaque")
    }

    pub fn failed(&self) -> usize {
        self.state_count("fetch_failed")
    }
}

/// Loads statistics from a checkpoint file
///
/// # Arguments
///
/// * `path` - The checkpoint to read
/// * `checkpointer` - Must have the body store the checkpoint was written with
pub fn load_statistics(
    path: &Path,
    checkpointer: &Checkpointer,
) -> Result<CrawlStatistics, CaptureError> {
    let session = checkpointer.load_from_path(path)?;
    Ok(CrawlStatistics::from_session(&session))
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Capture Statistics ===\n");

    println!("Overview:");
    println!("  Start URL: {}", stats.start_url);
    println!("  Resources discovered: {}", stats.total_resources);
    println!("  Hosts: {}", stats.unique_hosts);
    println!("  Links recorded: {}", stats.total_links);
    println!("  Bytes captured: {}", stats.bytes_captured);
    println!("  Remaining in frontier: {}", stats.remaining);
    println!();

    println!("Resources by State:");
    let mut state_counts: Vec<_> = stats.resources_by_state.iter().collect();
    state_counts.sort_by(|a, b| b.1.cmp(a.1));

    for (state, count) in state_counts {
        let percentage = if stats.total_resources > 0 {
            (*count as f64 / stats.total_resources as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", state, count, percentage);
    }
    println!();

    if !stats.failures_by_kind.is_empty() {
        println!("Failures by Reason:");
        for kind in FailureKind::all() {
            if let Some(count) = stats.failures_by_kind.get(kind.as_str()) {
                println!("  {}: {}", kind, count);
            }
        }
        println!();
    }

    if !stats.content_types.is_empty() {
        println!("Content Types:");
        let mut types: Vec<_> = stats.content_types.iter().collect();
        types.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (media_type, count) in types {
            println!("  {}: {}", media_type, count);
        }
        println!();
    }

    let attempted = stats.captured() + stats.failed();
    let success_rate = if attempted > 0 {
        (stats.captured() as f64 / attempted as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} fetched resources captured)",
        success_rate,
        stats.captured(),
        attempted
    );
}
