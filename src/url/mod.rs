//! URL handling module for Sumi-Capture
//!
//! This module provides the scope policy that decides which links belong to
//! the crawl, together with the canonical URL form used as resource identity.

mod canonical;
mod domain;
mod matcher;
mod normalize;

use url::Url;

// Re-export main functions
pub use canonical::CanonicalUrl;
pub use domain::extract_domain;
pub use matcher::in_scope;
pub use normalize::{canonicalize, canonicalize_str};

/// Reason a link was not accepted by the scope policy
///
/// A rejection is a filtering decision, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The link could not be resolved against the base URL
    Unparseable,
    /// The resolved scheme is not http or https (mailto:, javascript:, ...)
    Scheme(String),
    /// The resolved URL has no host
    MissingHost,
    /// The host lies outside the target domain
    OffDomain(String),
}

/// Decides which links are in scope for the crawl
///
/// The policy is pure: resolving never performs I/O and the same inputs
/// always produce the same output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopePolicy {
    target_domain: String,
}

impl ScopePolicy {
    /// Creates a policy for the given target domain
    ///
    /// The domain is lowercased; a leading `*.` is accepted. Subdomains of the
    /// target are always in scope.
    pub fn new(target_domain: &str) -> Self {
        let lowered = target_domain.trim().to_lowercase();
        let target_domain = lowered
            .strip_prefix("*.")
            .unwrap_or(&lowered)
            .to_string();
        Self { target_domain }
    }

    /// Returns the normalized target domain
    pub fn target_domain(&self) -> &str {
        &self.target_domain
    }

    /// Resolves a raw link found on `base` and canonicalizes it if in scope
    ///
    /// # Arguments
    ///
    /// * `base` - The URL of the page the link was found on
    /// * `raw_link` - The raw `href` value, relative or absolute
    ///
    /// # Returns
    ///
    /// * `Ok(CanonicalUrl)` - The link is in scope
    /// * `Err(Rejection)` - The link is filtered out
    ///
    /// # Examples
    ///
    /// ```
    /// use url::Url;
    /// use sumi_capture::url::{Rejection, ScopePolicy};
    ///
    /// let policy = ScopePolicy::new("target.tld");
    /// let base = Url::parse("https://target.tld/docs/").unwrap();
    ///
    /// let accepted = policy.resolve(&base, "intro?page=2#top").unwrap();
    /// assert_eq!(accepted.as_str(), "https://target.tld/docs/intro");
    ///
    /// assert!(matches!(
    ///     policy.resolve(&base, "mailto:a@b.com"),
    ///     Err(Rejection::Scheme(_))
    /// ));
    /// ```
    pub fn resolve(&self, base: &Url, raw_link: &str) -> Result<CanonicalUrl, Rejection> {
        let resolved = base
            .join(raw_link.trim())
            .map_err(|_| Rejection::Unparseable)?;

        if resolved.scheme() != "http" && resolved.scheme() != "https" {
            return Err(Rejection::Scheme(resolved.scheme().to_string()));
        }

        let host = extract_domain(&resolved).ok_or(Rejection::MissingHost)?;
        if !in_scope(&self.target_domain, &host) {
            return Err(Rejection::OffDomain(host));
        }

        canonicalize(&resolved).map_err(|_| Rejection::MissingHost)
    }

    /// Same as [`ScopePolicy::resolve`] with a string base URL
    pub fn resolve_str(&self, base: &str, raw_link: &str) -> Result<CanonicalUrl, Rejection> {
        let base = Url::parse(base).map_err(|_| Rejection::Unparseable)?;
        self.resolve(&base, raw_link)
    }

    /// Checks whether an absolute URL string is in scope
    pub fn accepts(&self, url: &str) -> bool {
        self.resolve_str(url, "").is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ScopePolicy {
        ScopePolicy::new("target.tld")
    }

    #[test]
    fn test_relative_link_resolves() {
        let url = policy().resolve_str("https://target.tld/a/b", "c").unwrap();
        assert_eq!(url.as_str(), "https://target.tld/a/c");
    }

    #[test]
    fn test_fully_qualified_host_resolves_to_same_resource() {
        let dotted = policy()
            .resolve_str("https://target.tld/", "https://target.tld./x")
            .unwrap();
        let plain = policy().resolve_str("https://target.tld/", "/x").unwrap();
        assert_eq!(dotted, plain);
    }

    #[test]
    fn test_root_relative_link() {
        let url = policy().resolve_str("https://target.tld/a/b", "/x").unwrap();
        assert_eq!(url.as_str(), "https://target.tld/x");
    }

    #[test]
    fn test_protocol_relative_link() {
        let url = policy()
            .resolve_str("https://target.tld/", "//www.target.tld/y")
            .unwrap();
        assert_eq!(url.as_str(), "https://www.target.tld/y");
    }

    #[test]
    fn test_http_link_forced_to_https() {
        let url = policy()
            .resolve_str("https://target.tld/", "http://target.tld/plain")
            .unwrap();
        assert_eq!(url.as_str(), "https://target.tld/plain");
    }

    #[test]
    fn test_query_and_fragment_discarded() {
        let url = policy()
            .resolve_str("https://target.tld/", "/search?q=rust#results")
            .unwrap();
        assert_eq!(url.as_str(), "https://target.tld/search");
    }

    #[test]
    fn test_fragment_only_link_is_page_itself() {
        let url = policy()
            .resolve_str("https://target.tld/page?x=1", "#section")
            .unwrap();
        assert_eq!(url.as_str(), "https://target.tld/page");
    }

    #[test]
    fn test_subdomain_in_scope() {
        let url = policy()
            .resolve_str("https://target.tld/", "https://X.target.tld/z")
            .unwrap();
        assert_eq!(url.as_str(), "https://x.target.tld/z");
    }

    #[test]
    fn test_rejects_mailto() {
        assert_eq!(
            policy().resolve_str("https://target.tld", "mailto:a@b.com"),
            Err(Rejection::Scheme("mailto".to_string()))
        );
    }

    #[test]
    fn test_rejects_javascript() {
        assert_eq!(
            policy().resolve_str("https://target.tld", "javascript:void(0)"),
            Err(Rejection::Scheme("javascript".to_string()))
        );
    }

    #[test]
    fn test_rejects_ftp() {
        assert_eq!(
            policy().resolve_str("https://target.tld", "ftp://target.tld/file.txt"),
            Err(Rejection::Scheme("ftp".to_string()))
        );
    }

    #[test]
    fn test_rejects_tel() {
        assert_eq!(
            policy().resolve_str("https://target.tld", "tel:+49123456"),
            Err(Rejection::Scheme("tel".to_string()))
        );
    }

    #[test]
    fn test_rejects_off_domain() {
        assert_eq!(
            policy().resolve_str("https://target.tld", "https://evil.tld/x"),
            Err(Rejection::OffDomain("evil.tld".to_string()))
        );
    }

    #[test]
    fn test_rejects_lookalike_domain() {
        assert!(matches!(
            policy().resolve_str("https://target.tld", "https://nottarget.tld/"),
            Err(Rejection::OffDomain(_))
        ));
    }

    #[test]
    fn test_unparseable_base() {
        assert_eq!(
            policy().resolve_str("not a base", "/x"),
            Err(Rejection::Unparseable)
        );
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let policy = policy();
        let base = "https://target.tld/dir/page";
        for link in [
            "other",
            "../up",
            "/abs?x=1",
            "http://sub.target.tld/p#frag",
            "https://target.tld:8443/port",
            "",
        ] {
            let once = policy.resolve_str(base, link).unwrap();
            let twice = policy.resolve_str(base, once.as_str()).unwrap();
            assert_eq!(once, twice, "not idempotent for {}", link);
        }
    }

    #[test]
    fn test_wildcard_target_normalized() {
        let policy = ScopePolicy::new("*.Target.TLD");
        assert_eq!(policy.target_domain(), "target.tld");
        assert!(policy.accepts("https://target.tld/"));
    }

    #[test]
    fn test_accepts() {
        assert!(policy().accepts("https://www.target.tld/x"));
        assert!(!policy().accepts("https://other.tld/"));
        assert!(!policy().accepts("mailto:x@target.tld"));
    }
}
