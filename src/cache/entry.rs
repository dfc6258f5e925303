use std::time::SystemTime;

use bytes::Bytes;
use http::header::{ETAG, LAST_MODIFIED};
use http::{HeaderMap, Method, StatusCode, Uri};

use crate::headers;
use crate::tls::TlsMetadata;

/// One committed response. Immutable once it reaches the store; a 304
/// revalidation produces a replacement via [`Entry::merge_not_modified`].
#[derive(Debug, Clone)]
pub struct Entry {
    pub uri: Uri,
    pub method: Method,
    pub status: StatusCode,
    pub status_line: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub tls: Option<TlsMetadata>,
    /// When the response was received; freshness fallback for responses
    /// without a `Date` header.
    pub received_at: SystemTime,
}

impl Entry {
    pub(crate) fn etag(&self) -> Option<&str> {
        self.headers.get(ETAG).and_then(|value| value.to_str().ok())
    }

    pub(crate) fn last_modified(&self) -> Option<&str> {
        self.headers
            .get(LAST_MODIFIED)
            .and_then(|value| value.to_str().ok())
    }

    /// Build the replacement entry for a confirmed revalidation: the 304's
    /// headers overlay the stored ones (content headers excepted) and the
    /// body carries over untouched.
    pub(crate) fn merge_not_modified(&self, update: &HeaderMap, now: SystemTime) -> Entry {
        Entry {
            uri: self.uri.clone(),
            method: self.method.clone(),
            status: self.status,
            status_line: self.status_line.clone(),
            headers: headers::merge_not_modified(&self.headers, update),
            body: self.body.clone(),
            tls: self.tls.clone(),
            received_at: now,
        }
    }
}
