use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Canonical form of an in-scope URL
///
/// A canonical URL always uses the `https` scheme and carries only a host,
/// an optional non-default port and a path. It is the identity key of a
/// resource in the registry, so two links that canonicalize to the same
/// string refer to the same resource.
///
/// Values are only built by [`crate::url::normalize::canonicalize`] or
/// restored from a checkpoint that was written from such values.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalUrl(String);

impl CanonicalUrl {
    pub(crate) fn from_normalized(url: &Url) -> Self {
        Self(url.as_str().to_string())
    }

    /// Returns the canonical string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the canonical string back into a [`Url`]
    ///
    /// This only fails for values that were hand-edited into a checkpoint.
    pub fn to_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.0)
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
