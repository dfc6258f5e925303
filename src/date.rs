use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use http::HeaderMap;
use http::header::HeaderName;
use httpdate::{fmt_http_date, parse_http_date};

/// Parse an HTTP date header value (RFC 1123, with the legacy RFC 850 and
/// asctime forms accepted for compatibility).
pub fn parse(value: &str) -> Option<SystemTime> {
    parse_http_date(value.trim()).ok()
}

/// Format a timestamp as an RFC 1123 date with the `GMT` zone designator.
pub fn format(time: SystemTime) -> String {
    fmt_http_date(time)
}

pub fn header_date(headers: &HeaderMap, name: HeaderName) -> Option<SystemTime> {
    headers.get(name).and_then(|value| value.to_str().ok()).and_then(parse)
}

/// Whole seconds from `earlier` to `later`; negative when `later` precedes
/// `earlier`.
pub fn seconds_between(earlier: SystemTime, later: SystemTime) -> i64 {
    match later.duration_since(earlier) {
        Ok(elapsed) => clamp_secs(elapsed.as_secs()),
        Err(err) => -clamp_secs(err.duration().as_secs()),
    }
}

pub(crate) fn clamp_secs(secs: u64) -> i64 {
    secs.min(i64::MAX as u64) as i64
}

/// Time source for all freshness math. Defaults to the system clock; tests
/// pin it with [`Clock::fixed`].
#[derive(Clone)]
pub struct Clock {
    source: Arc<dyn Fn() -> SystemTime + Send + Sync>,
}

impl Clock {
    pub fn system() -> Self {
        Self {
            source: Arc::new(SystemTime::now),
        }
    }

    pub fn fixed(instant: SystemTime) -> Self {
        Self {
            source: Arc::new(move || instant),
        }
    }

    pub fn now(&self) -> SystemTime {
        (self.source)()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::system()
    }
}

impl fmt::Debug for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Clock")
    }
}
