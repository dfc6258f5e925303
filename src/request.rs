use std::sync::atomic::{AtomicBool, Ordering};

use http::header::{IF_MATCH, IF_MODIFIED_SINCE, IF_NONE_MATCH, IF_RANGE, IF_UNMODIFIED_SINCE};
use http::{HeaderMap, Method, Uri};

static DEFAULT_USE_CACHES: AtomicBool = AtomicBool::new(true);

/// Set the process-wide default for the per-request use-caches flag. The
/// default is captured when a request is constructed; requests that already
/// exist keep the value they were born with.
pub fn set_default_use_caches(value: bool) {
    DEFAULT_USE_CACHES.store(value, Ordering::Relaxed);
}

pub fn default_use_caches() -> bool {
    DEFAULT_USE_CACHES.load(Ordering::Relaxed)
}

/// The request-side facts the cache consults: method, absolute URI, header
/// block, and whether this particular request may use the cache at all.
#[derive(Debug, Clone)]
pub struct CacheRequest {
    pub uri: Uri,
    pub method: Method,
    pub headers: HeaderMap,
    use_caches: bool,
}

impl CacheRequest {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        Self {
            uri,
            method,
            headers,
            use_caches: default_use_caches(),
        }
    }

    pub fn use_caches(&self) -> bool {
        self.use_caches
    }

    pub fn set_use_caches(&mut self, value: bool) {
        self.use_caches = value;
    }

    pub fn is_secure(&self) -> bool {
        self.uri.scheme_str() == Some("https")
    }

    /// True when the caller supplied its own preconditions; the cache then
    /// stays out of validator synthesis.
    pub fn has_conditions(&self) -> bool {
        [
            IF_MODIFIED_SINCE,
            IF_NONE_MATCH,
            IF_MATCH,
            IF_UNMODIFIED_SINCE,
            IF_RANGE,
        ]
        .iter()
        .any(|name| self.headers.contains_key(name))
    }

    pub(crate) fn key(&self) -> String {
        self.uri.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str) -> CacheRequest {
        CacheRequest::new(Method::GET, uri.parse().unwrap(), HeaderMap::new())
    }

    #[test]
    fn scheme_decides_security() {
        assert!(request("https://example.com/a").is_secure());
        assert!(!request("http://example.com/a").is_secure());
    }

    #[test]
    fn keys_carry_the_full_uri() {
        let with_query = request("http://example.com/a?b=c");
        assert_eq!(with_query.key(), "http://example.com/a?b=c");
        assert_ne!(with_query.key(), request("http://example.com/a").key());
    }

    #[test]
    fn detects_caller_preconditions() {
        let mut conditional = request("http://example.com/a");
        assert!(!conditional.has_conditions());
        conditional.headers.insert(
            IF_NONE_MATCH,
            http::HeaderValue::from_static("\"v1\""),
        );
        assert!(conditional.has_conditions());
    }
}
