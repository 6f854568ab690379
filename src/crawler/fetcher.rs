//! HTTP fetcher
//!
//! The engine only sees the [`Fetcher`] trait: a single GET per URL that
//! either yields a response or a classified [`TransportError`]. HTTP error
//! statuses are responses, not transport errors; the engine decides how to
//! record them.

use crate::config::{HttpConfig, UserAgentConfig};
use crate::state::FailureKind;
use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, redirect::Policy, Client};
use std::error::Error as StdError;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Maximum number of redirects followed for a single fetch
const MAX_REDIRECTS: usize = 10;

/// Response to a single GET request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// HTTP status code
    pub status: u16,
    /// Content-Type header value, if present and valid
    pub content_type: Option<String>,
    /// Raw body bytes
    pub body: Vec<u8>,
}

/// A failed fetch, classified for the resource record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: FailureKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Capability to perform one GET request
///
/// Implementations must not retry; a single failure is final for the
/// resource.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, TransportError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - Crawler identification for the User-Agent header
/// * `http` - Connect and request timeouts
///
/// # Example
///
/// ```no_run
/// use sumi_capture::config::{HttpConfig, UserAgentConfig};
/// use sumi_capture::crawler::build_http_client;
///
/// let user_agent = UserAgentConfig {
///     crawler_name: "SumiCapture".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://target.tld/about".to_string(),
///     contact_email: "ops@target.tld".to_string(),
/// };
///
/// let client = build_http_client(&user_agent, &HttpConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    http: &HttpConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(Duration::from_secs(http.request_timeout))
        .connect_timeout(Duration::from_secs(http.connect_timeout))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`Fetcher`] backed by a shared reqwest client
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds the client from configuration
    pub fn from_config(
        user_agent: &UserAgentConfig,
        http: &HttpConfig,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(user_agent, http)?))
    }
}

#[async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, TransportError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify_error(&e))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .bytes()
            .await
            .map_err(|e| classify_error(&e))?
            .to_vec();

        Ok(FetchResponse {
            status,
            content_type,
            body,
        })
    }
}

/// Maps a reqwest error to a transport error category
///
/// | Condition | Category |
/// |-----------|----------|
/// | Request or body timed out | `Timeout` |
/// | TLS handshake or certificate failure | `Tls` |
/// | Connection refused, DNS failure | `Connection` |
/// | Redirect loop, malformed response body | `HttpError` |
/// | Anything else | `Other` |
pub fn classify_error(error: &reqwest::Error) -> TransportError {
    let kind = if error.is_timeout() {
        FailureKind::Timeout
    } else if is_tls_error(error) {
        FailureKind::Tls
    } else if error.is_connect() {
        FailureKind::Connection
    } else if error.is_redirect() || error.is_decode() || error.is_body() || error.is_status() {
        FailureKind::HttpError
    } else {
        FailureKind::Other
    };

    TransportError::new(kind, describe_error(error))
}

/// Walks the source chain looking for a TLS or certificate failure
fn is_tls_error(error: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = error.source();
    while let Some(err) = source {
        let text = err.to_string().to_lowercase();
        if text.contains("certificate") || text.contains("tls") || text.contains("ssl") {
            return true;
        }
        source = err.source();
    }
    false
}

/// Joins the error and its sources into one line
fn describe_error(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source: Option<&(dyn StdError + 'static)> = error.source();
    while let Some(err) = source {
        message.push_str(": ");
        message.push_str(&err.to_string());
        source = err.source();
    }
    message
}
