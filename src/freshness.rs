use std::time::SystemTime;

use http::header::{DATE, EXPIRES, LAST_MODIFIED};

use crate::cache::Entry;
use crate::cache_control::CacheControl;
use crate::date;

/// Heuristic lifetimes of a day or more must be flagged to the caller.
pub(crate) const HEURISTIC_WARN_SECS: i64 = 24 * 60 * 60;

/// Divisor for the last-modified heuristic: a tenth of the document's
/// apparent stability.
const HEURISTIC_DIVISOR: i64 = 10;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Freshness {
    pub age_secs: i64,
    pub lifetime_secs: i64,
    /// The lifetime came from the last-modified heuristic rather than an
    /// explicit freshness header.
    pub heuristic: bool,
}

impl Freshness {
    pub fn warn_heuristic(&self) -> bool {
        self.heuristic && self.lifetime_secs >= HEURISTIC_WARN_SECS
    }
}

/// Apply the freshness rules to a stored entry at lookup time. The served
/// moment is the response's `Date` when it has one, otherwise the time the
/// response was received; age never goes negative, but a lifetime derived
/// from an `Expires` in the past does.
pub(crate) fn evaluate(entry: &Entry, response_cc: &CacheControl, now: SystemTime) -> Freshness {
    let served = date::header_date(&entry.headers, DATE).unwrap_or(entry.received_at);
    let age_secs = date::seconds_between(served, now).max(0);

    if let Some(max_age) = response_cc.max_age {
        return Freshness {
            age_secs,
            lifetime_secs: date::clamp_secs(max_age),
            heuristic: false,
        };
    }

    if let Some(expires) = date::header_date(&entry.headers, EXPIRES) {
        return Freshness {
            age_secs,
            lifetime_secs: date::seconds_between(served, expires),
            heuristic: false,
        };
    }

    if entry.uri.query().is_none()
        && let Some(last_modified) = date::header_date(&entry.headers, LAST_MODIFIED)
    {
        let stability = date::seconds_between(last_modified, served);
        if stability > 0 {
            return Freshness {
                age_secs,
                lifetime_secs: stability / HEURISTIC_DIVISOR,
                heuristic: true,
            };
        }
    }

    Freshness {
        age_secs,
        lifetime_secs: 0,
        heuristic: false,
    }
}
