/// Checks if a host lies inside the target domain
///
/// A host is in scope when it equals the target domain or is any subdomain
/// of it. The target may be written with a leading `*.`, which means the
/// same thing. A single trailing dot on the host (fully qualified form) is
/// ignored.
///
/// Both arguments are expected in lowercase; the check itself is
/// case-sensitive.
///
/// # Examples
///
/// ```
/// use sumi_capture::url::in_scope;
///
/// assert!(in_scope("target.tld", "target.tld"));
/// assert!(in_scope("target.tld", "www.target.tld"));
/// assert!(in_scope("*.target.tld", "a.b.target.tld"));
/// assert!(!in_scope("target.tld", "nottarget.tld"));
/// ```
pub fn in_scope(target: &str, host: &str) -> bool {
    let base = target.strip_prefix("*.").unwrap_or(target);
    let host = host.strip_suffix('.').unwrap_or(host);

    if base.is_empty() || host.is_empty() {
        return false;
    }

    match host.strip_suffix(base) {
        Some("") => true,
        Some(prefix) => prefix.ends_with('.'),
        None => false,
    }
}
