use http::header::{AUTHORIZATION, CONTENT_LOCATION, CONTENT_RANGE, VARY};
use http::{HeaderMap, Method, StatusCode};

use crate::cache_control::parse_cache_control;
use crate::headers::ResponseHead;
use crate::request::CacheRequest;

/// Why a response was refused admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MethodNotCacheable,
    StatusNotCacheable,
    NoStore,
    VaryPresent,
    PartialContent,
    AuthorizationNotPermitted,
    ContentLocationMismatch,
}

/// Status codes a full response may be stored under. 301 is the only
/// redirect admitted; 206 is handled separately below.
const CACHEABLE_STATUSES: [u16; 5] = [200, 203, 300, 301, 410];

/// One-time storability decision for a response that just arrived. The
/// per-request use-caches gate and mutating-method invalidation have already
/// been applied by the facade.
pub(crate) fn admit(request: &CacheRequest, response: &ResponseHead) -> Result<(), SkipReason> {
    if request.method != Method::GET {
        return Err(SkipReason::MethodNotCacheable);
    }

    // A partial body must never masquerade as the full resource.
    if response.status == StatusCode::PARTIAL_CONTENT
        || response.headers.contains_key(CONTENT_RANGE)
    {
        return Err(SkipReason::PartialContent);
    }

    if !CACHEABLE_STATUSES.contains(&response.status.as_u16()) {
        return Err(SkipReason::StatusNotCacheable);
    }

    let response_cc = parse_cache_control(&response.headers);
    let request_cc = parse_cache_control(&request.headers);
    if response_cc.no_store || request_cc.no_store {
        return Err(SkipReason::NoStore);
    }

    if has_nonempty_vary(&response.headers) {
        return Err(SkipReason::VaryPresent);
    }

    if request.headers.contains_key(AUTHORIZATION)
        && !(response_cc.public || response_cc.must_revalidate || response_cc.s_maxage.is_some())
    {
        return Err(SkipReason::AuthorizationNotPermitted);
    }

    if content_location_differs(request, response) {
        return Err(SkipReason::ContentLocationMismatch);
    }

    Ok(())
}

fn has_nonempty_vary(headers: &HeaderMap) -> bool {
    headers
        .get_all(VARY)
        .iter()
        .any(|value| value.to_str().map(|s| !s.trim().is_empty()).unwrap_or(true))
}

/// A response advertising an alternate location is not stored against the
/// request URI. Absolute values compare against the full URI, rooted paths
/// against the request's path and query; a relative reference we cannot
/// resolve counts as a mismatch.
fn content_location_differs(request: &CacheRequest, response: &ResponseHead) -> bool {
    let Some(value) = response
        .headers
        .get(CONTENT_LOCATION)
        .and_then(|value| value.to_str().ok())
    else {
        return false;
    };
    let value = value.trim();
    if value.is_empty() {
        return false;
    }
    if value.starts_with('/') {
        let request_path = request
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        return value != request_path;
    }
    if value.contains("://") {
        return value != request.uri.to_string();
    }
    true
}
