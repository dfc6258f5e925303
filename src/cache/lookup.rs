use std::time::SystemTime;

use http::header::{IF_MODIFIED_SINCE, IF_NONE_MATCH};
use http::{HeaderMap, HeaderValue, Method};

use crate::cache_control::{CacheControl, parse_cache_control};
use crate::date::clamp_secs;
use crate::freshness;
use crate::headers::{WARNING_HEURISTIC_EXPIRATION, WARNING_STALE};
use crate::request::CacheRequest;

use super::Entry;

/// Whether a plain entry may satisfy an `https` request. Strict lookups
/// never cross the boundary; the insecure-allowing facade wrapper opts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SecurityMode {
    Strict,
    AllowInsecure,
}

#[derive(Debug)]
pub(crate) enum LookupDecision {
    Miss,
    Fresh { warnings: Vec<&'static str> },
    Revalidate { conditions: HeaderMap },
    Unsatisfiable,
}

/// Decide what to do with the stored entry (or its absence) for this
/// request.
pub(crate) fn evaluate(
    request: &CacheRequest,
    entry: Option<&Entry>,
    security: SecurityMode,
    now: SystemTime,
) -> LookupDecision {
    let request_cc = parse_cache_control(&request.headers);
    let decision = evaluate_entry(request, &request_cc, entry, security, now);
    if request_cc.only_if_cached && !matches!(decision, LookupDecision::Fresh { .. }) {
        return LookupDecision::Unsatisfiable;
    }
    decision
}

fn evaluate_entry(
    request: &CacheRequest,
    request_cc: &CacheControl,
    entry: Option<&Entry>,
    security: SecurityMode,
    now: SystemTime,
) -> LookupDecision {
    if request.method != Method::GET {
        return LookupDecision::Miss;
    }
    let Some(entry) = entry else {
        return LookupDecision::Miss;
    };
    if !security_permits(request, entry, security) {
        return LookupDecision::Miss;
    }
    if request_cc.no_store {
        return LookupDecision::Miss;
    }
    if request.has_conditions() {
        // The caller supplied its own preconditions; they travel with the
        // request as-is and the stored validators stay out of the way.
        return LookupDecision::Revalidate {
            conditions: HeaderMap::new(),
        };
    }

    let response_cc = parse_cache_control(&entry.headers);
    if response_cc.no_cache || request_cc.no_cache {
        return LookupDecision::Revalidate {
            conditions: validators(entry),
        };
    }

    let fresh = freshness::evaluate(entry, &response_cc, now);

    // An entry is fresh while its age stays strictly under the lifetime,
    // which the request may cap with its own max-age and pad with
    // min-fresh.
    let mut lifetime_secs = fresh.lifetime_secs;
    if let Some(limit) = request_cc.max_age.map(clamp_secs) {
        lifetime_secs = lifetime_secs.min(limit);
    }
    let min_fresh = request_cc.min_fresh.map(clamp_secs).unwrap_or(0);
    if fresh.age_secs.saturating_add(min_fresh) < lifetime_secs {
        let mut warnings = Vec::new();
        if fresh.warn_heuristic() {
            warnings.push(WARNING_HEURISTIC_EXPIRATION);
        }
        return LookupDecision::Fresh { warnings };
    }

    if request_cc.max_stale && !response_cc.must_revalidate {
        let staleness = fresh.age_secs.saturating_sub(lifetime_secs).max(0);
        let within_allowance = request_cc
            .max_stale_limit
            .map(clamp_secs)
            .map(|limit| staleness < limit)
            .unwrap_or(true);
        if within_allowance {
            let mut warnings = vec![WARNING_STALE];
            if fresh.warn_heuristic() {
                warnings.push(WARNING_HEURISTIC_EXPIRATION);
            }
            return LookupDecision::Fresh { warnings };
        }
    }

    let conditions = validators(entry);
    if !conditions.is_empty() {
        return LookupDecision::Revalidate { conditions };
    }

    LookupDecision::Miss
}

fn security_permits(request: &CacheRequest, entry: &Entry, security: SecurityMode) -> bool {
    match (request.is_secure(), entry.tls.is_some()) {
        (true, true) | (false, false) => true,
        (true, false) => security == SecurityMode::AllowInsecure,
        (false, true) => false,
    }
}

/// Conditional headers for revalidating this entry; both validators are
/// emitted when the entry carries both.
fn validators(entry: &Entry) -> HeaderMap {
    let mut conditions = HeaderMap::new();
    if let Some(etag) = entry.etag()
        && let Ok(value) = HeaderValue::from_str(etag)
    {
        conditions.insert(IF_NONE_MATCH, value);
    }
    if let Some(last_modified) = entry.last_modified()
        && let Ok(value) = HeaderValue::from_str(last_modified)
    {
        conditions.insert(IF_MODIFIED_SINCE, value);
    }
    conditions
}
