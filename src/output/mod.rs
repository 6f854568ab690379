//! Output module for crawl statistics
//!
//! This module handles:
//! - Computing statistics from a session or a checkpoint
//! - Printing them for the `--stats` command

pub mod stats;

pub use stats::{load_statistics, print_statistics, CrawlStatistics};
