//! Cache key derivation.

use std::fmt;

use sha2::{Digest, Sha256};

/// Fingerprint of one cached exchange: the lowercase hex SHA-256 of
/// `"{METHOD}|{URL}"`.
///
/// The method is uppercased first. The URL is hashed exactly as given, so
/// query order, trailing slashes and path casing all produce distinct keys.
///
/// # Examples
///
/// ```
/// use caching_proxy::cache::CacheKey;
///
/// let a = CacheKey::new("get", "http://example.com/x");
/// let b = CacheKey::new("GET", "http://example.com/x");
/// assert_eq!(a, b);
/// assert_eq!(a.as_str().len(), 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(method: &str, url: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(method.to_ascii_uppercase().as_bytes());
        hasher.update(b"|");
        hasher.update(url.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_sha256_of_method_pipe_url() {
        let key = CacheKey::new("GET", "http://example.com/api/v1/items");
        assert_eq!(
            key.as_str(),
            "df1fc7f2eb3aefc30f43b7789aa15b2719585d47b91527bd2f8716bd6001f04a"
        );
    }

    #[test]
    fn deterministic() {
        let url = "https://example.com/a?b=1";
        assert_eq!(CacheKey::new("GET", url), CacheKey::new("GET", url));
    }

    #[test]
    fn method_case_is_normalized() {
        let url = "http://example.com/";
        assert_eq!(CacheKey::new("get", url), CacheKey::new("GET", url));
    }

    #[test]
    fn method_distinguishes_keys() {
        let url = "http://example.com/";
        assert_ne!(CacheKey::new("GET", url), CacheKey::new("HEAD", url));
    }

    #[test]
    fn url_is_not_normalized() {
        let base = CacheKey::new("GET", "http://example.com/a?x=1&y=2");
        for other in [
            "http://example.com/a?y=2&x=1",
            "http://example.com/a/?x=1&y=2",
            "http://example.com/A?x=1&y=2",
        ] {
            assert_ne!(base, CacheKey::new("GET", other), "{other}");
        }
    }

    #[test]
    fn separator_prevents_trivial_collisions() {
        assert_ne!(CacheKey::new("GE", "Thttp://x/"), CacheKey::new("GET", "http://x/"));
    }
}
