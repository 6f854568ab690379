use crate::url::ScopePolicy;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Sumi-Capture
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub http: HttpConfig,
    pub output: OutputConfig,
}

impl Config {
    /// Scope policy for the configured target domain
    pub fn scope_policy(&self) -> ScopePolicy {
        ScopePolicy::new(&self.crawler.target_domain)
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Domain whose hosts are in scope (e.g. "target.tld" or "*.target.tld")
    #[serde(rename = "target-domain")]
    pub target_domain: String,

    /// URL the crawl starts from
    pub seed: String,

    /// Pause between two steps (milliseconds)
    #[serde(rename = "request-delay", default = "default_request_delay")]
    pub request_delay: u64,

    /// Recovery wait after a timed out fetch (seconds)
    #[serde(rename = "timeout-pause", default = "default_timeout_pause")]
    pub timeout_pause: u64,

    /// Number of steps between two periodic checkpoints
    #[serde(rename = "checkpoint-interval", default = "default_checkpoint_interval")]
    pub checkpoint_interval: u64,

    /// Maximum number of steps per run (0 = unlimited)
    #[serde(rename = "max-pages-per-run", default)]
    pub max_pages_per_run: u64,
}

impl CrawlerConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay)
    }

    pub fn timeout_pause(&self) -> Duration {
        Duration::from_secs(self.timeout_pause)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// HTTP client timeouts
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Connection timeout (seconds)
    #[serde(rename = "connect-timeout", default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Whole-request timeout including the body (seconds)
    #[serde(rename = "request-timeout", default = "default_request_timeout")]
    pub request_timeout: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the JSON checkpoint file
    #[serde(rename = "checkpoint-path")]
    pub checkpoint_path: PathBuf,

    /// Path to the SQLite body store; bodies are kept inline when absent
    #[serde(rename = "body-store-path", default)]
    pub body_store_path: Option<PathBuf>,
}

fn default_request_delay() -> u64 {
    1000
}

fn default_timeout_pause() -> u64 {
    60
}

fn default_checkpoint_interval() -> u64 {
    100
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    30
}
