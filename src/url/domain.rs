use url::Url;

/// Extracts the host of a URL in the form used for scope checks
///
/// The host is lowercased and a trailing root dot (`target.tld.`) is removed.
/// Returns None for URLs without a host such as `mailto:` or `data:` URLs.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_capture::url::extract_domain;
///
/// let url = Url::parse("https://Sub.Target.tld./path").unwrap();
/// assert_eq!(extract_domain(&url), Some("sub.target.tld".to_string()));
///
/// let url = Url::parse("mailto:someone@target.tld").unwrap();
/// assert_eq!(extract_domain(&url), None);
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    let host = host.strip_suffix('.').unwrap_or(host);
    if host.is_empty() {
        return None;
    }
    Some(host.to_lowercase())
}
