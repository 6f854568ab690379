use crate::url::canonical::CanonicalUrl;
use crate::{UrlError, UrlResult};
use url::Url;

/// Schemes that may be fetched
const ALLOWED_SCHEMES: &[&str] = &["http", "https"];

/// Canonicalizes an already-resolved absolute URL
///
/// # Canonicalization Steps
///
/// 1. Reject any scheme other than `http`/`https`
/// 2. Reject URLs without a host
/// 3. Force the scheme to `https` (a port that is the https default is dropped)
/// 4. Drop user info, query string and fragment
/// 5. Drop the trailing root dot of a fully qualified host
///
/// The host keeps the lowercase ASCII form produced by URL parsing and the
/// path keeps the form produced by relative resolution (dot segments are
/// already removed). No trailing slash rewriting happens, so `/a` and `/a/`
/// are different resources.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_capture::url::canonicalize;
///
/// let url = Url::parse("http://Target.TLD/a/../b?x=1#top").unwrap();
/// assert_eq!(canonicalize(&url).unwrap().as_str(), "https://target.tld/b");
/// ```
pub fn canonicalize(url: &Url) -> UrlResult<CanonicalUrl> {
    if !ALLOWED_SCHEMES.contains(&url.scheme()) {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingDomain);
    }

    let mut canonical = url.clone();

    // `target.tld.` and `target.tld` name the same host
    let fqdn = canonical
        .host_str()
        .and_then(|host| host.strip_suffix('.'))
        .map(str::to_string);
    if let Some(host) = fqdn {
        canonical
            .set_host(Some(&host))
            .map_err(|e| UrlError::Parse(e.to_string()))?;
    }

    if canonical.scheme() != "https" && canonical.set_scheme("https").is_err() {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    // Both setters only fail for URLs without a host, which is excluded above
    let _ = canonical.set_username("");
    let _ = canonical.set_password(None);
    canonical.set_query(None);
    canonical.set_fragment(None);

    Ok(CanonicalUrl::from_normalized(&canonical))
}

/// Parses and canonicalizes a URL string
///
/// # Examples
///
/// ```
/// use sumi_capture::url::canonicalize_str;
///
/// let url = canonicalize_str("http://target.tld").unwrap();
/// assert_eq!(url.as_str(), "https://target.tld/");
/// ```
pub fn canonicalize_str(url_str: &str) -> UrlResult<CanonicalUrl> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    canonicalize(&url)
}
