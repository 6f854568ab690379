//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `Resource`: One canonical URL and its fetch state (`ResourceState`)
//! - `Registry`: Every discovered resource, keyed by canonical URL
//! - `Frontier`: Unordered set of resources waiting to be fetched
//! - `CrawlSession`: Registry, frontier and crawl parameters together

mod frontier;
mod registry;
mod resource;
mod session;

// Re-export main types
pub use frontier::Frontier;
pub use registry::{Registry, StateCounts};
pub use resource::{
    is_html_content_type, Body, Capture, FailureKind, FetchOutcome, Resource, ResourceState,
};
pub use session::CrawlSession;
