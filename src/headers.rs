use anyhow::{Context, Result, anyhow, bail};
use http::header::CONTENT_LENGTH;
use http::{HeaderMap, StatusCode};

use crate::tls::TlsMetadata;

/// Warning attached when a stale entry is served under `max-stale`.
pub const WARNING_STALE: &str = "110 HttpURLConnection \"Response is stale\"";

/// Warning attached when an entry is served on a heuristic freshness
/// lifetime of a day or more.
pub const WARNING_HEURISTIC_EXPIRATION: &str =
    "113 HttpURLConnection \"Heuristic expiration\"";

/// The status line and header block of a response, as handed over by the
/// HTTP engine once it has read the head off the wire. The raw status line
/// is kept so a cached response reproduces the origin's version and reason
/// text exactly.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status_line: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Present when the response arrived over TLS.
    pub tls: Option<TlsMetadata>,
}

impl ResponseHead {
    pub fn new(status: StatusCode, headers: HeaderMap) -> Self {
        let status_line = format!(
            "HTTP/1.1 {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("OK")
        );
        Self {
            status_line,
            status,
            headers,
            tls: None,
        }
    }

    pub fn with_status_line(status_line: &str, headers: HeaderMap) -> Result<Self> {
        let trimmed = status_line.trim();
        let status = parse_status_line(trimmed)?;
        Ok(Self {
            status_line: trimmed.to_string(),
            status,
            headers,
            tls: None,
        })
    }

    pub fn with_tls(mut self, tls: TlsMetadata) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(CONTENT_LENGTH)?
            .to_str()
            .ok()?
            .trim()
            .parse()
            .ok()
    }
}

pub(crate) fn parse_status_line(value: &str) -> Result<StatusCode> {
    let mut parts = value.split_whitespace();
    let version = parts
        .next()
        .ok_or_else(|| anyhow!("status line missing HTTP version"))?;
    if version != "HTTP/1.1" && version != "HTTP/1.0" {
        bail!("unsupported HTTP version '{version}'");
    }
    let code = parts
        .next()
        .ok_or_else(|| anyhow!("status line missing status code"))?;
    let code: u16 = code
        .parse()
        .with_context(|| format!("invalid status code '{code}'"))?;
    StatusCode::from_u16(code).map_err(|_| anyhow!("unsupported status code '{code}'"))
}

/// Combine stored headers with those of a 304 revalidation response. Every
/// field named by the 304 replaces the stored field of the same name, except
/// content-defining headers, which keep describing the stored body.
pub fn merge_not_modified(stored: &HeaderMap, update: &HeaderMap) -> HeaderMap {
    let mut merged = stored.clone();
    for name in update.keys() {
        // HeaderName renders lowercase, so a prefix check suffices.
        if name.as_str().starts_with("content-") {
            continue;
        }
        merged.remove(name);
        for value in update.get_all(name) {
            merged.append(name.clone(), value.clone());
        }
    }
    merged
}
