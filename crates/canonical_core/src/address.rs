use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// An absolute http(s) address with an ASCII host and no fragment.
///
/// Only [`normalize_url`] constructs one, so holding a value means the
/// address already passed validation. Normalizing `as_str()` again yields
/// the same string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedUrl(String);

impl NormalizedUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Host of the address, already lower-cased and IDNA-encoded.
    pub fn host(&self) -> Option<url::Host<String>> {
        Url::parse(&self.0).ok()?.host().map(|host| host.to_owned())
    }
}

impl fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize arbitrary text into a validated address.
///
/// The host is lower-cased and converted to its ASCII-compatible form,
/// non-ASCII characters elsewhere are percent-encoded, and the fragment is
/// dropped. The query string is kept verbatim. Anything that is not an
/// absolute http(s) URL with a host yields `None`.
pub fn normalize_url(raw: &str) -> Option<NormalizedUrl> {
    let mut url = Url::parse(raw.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return None;
    }
    if url.host_str().map_or(true, str::is_empty) {
        return None;
    }
    url.set_fragment(None);
    Some(NormalizedUrl(url.into()))
}

/// Same as [`normalize_url`] for undecoded input; bytes that are not UTF-8
/// are rejected.
pub fn normalize_url_bytes(raw: &[u8]) -> Option<NormalizedUrl> {
    std::str::from_utf8(raw).ok().and_then(normalize_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_whitespace_is_ignored() {
        let url = normalize_url("  https://example.com/a \n").unwrap();
        assert_eq!(url.as_str(), "https://example.com/a");
    }

    #[test]
    fn host_is_exposed_lowercase() {
        let url = normalize_url("https://WWW.Example.COM/").unwrap();
        assert_eq!(
            url.host(),
            Some(url::Host::Domain("www.example.com".to_string()))
        );
    }
}
