//! Configuration module for Sumi-Capture
//!
//! Loads the TOML run configuration: target domain and seed, pacing, user
//! agent, HTTP timeouts and output paths.
//!
//! # Example
//!
//! ```no_run
//! use sumi_capture::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("capture.toml")).unwrap();
//! println!("Capturing {} from {}", config.crawler.target_domain, config.crawler.seed);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, HttpConfig, OutputConfig, UserAgentConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
