use std::collections::HashSet;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use http::header::WARNING;
use http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use parking_lot::Mutex;
use rustls_pki_types::CertificateDer;
use tracing::{debug, trace};

use crate::date::Clock;
use crate::headers::ResponseHead;
use crate::request::CacheRequest;
use crate::tls::TlsMetadata;

mod admission;
mod entry;
mod lookup;
mod store;
mod writer;

pub use admission::SkipReason;
pub use entry::Entry;
pub use writer::{EntryWriter, RecordingBody};

use lookup::{LookupDecision, SecurityMode};
use store::Store;
use writer::PendingEntry;

/// The two cache hooks an HTTP engine calls around a network exchange:
/// consult before fetching, offer after receiving. Implemented by the core
/// cache and by decorators that adjust its policy.
pub trait ResponseCache {
    /// Consult the cache before performing a network fetch.
    fn get(&self, request: &CacheRequest) -> CacheLookup;

    /// Offer a freshly received response head for storage. A returned
    /// writer is the sink the engine streams the body into; `None` means
    /// nothing will be stored for this exchange.
    fn put(&self, request: &CacheRequest, response: &ResponseHead) -> Option<EntryWriter>;
}

/// Outcome of consulting the cache for a request.
#[derive(Debug)]
pub enum CacheLookup {
    /// Nothing usable; perform the network fetch.
    Miss,
    /// Serve the stored response without touching the network.
    Fresh(CachedResponse),
    /// Issue a conditional request carrying
    /// [`conditions`](CachedResponse::conditions); on 304 the held response
    /// is the one to serve.
    Revalidate(CachedResponse),
    /// `only-if-cached` could not be satisfied. The engine must answer with
    /// a synthesized 504 Gateway Timeout whose error stream is empty.
    Unsatisfiable,
}

/// A stored response as handed back to the engine: origin status line and
/// headers (plus any cache-inserted `Warning`s), the body, and the security
/// details of the original connection.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    status: StatusCode,
    status_line: String,
    headers: HeaderMap,
    body: Bytes,
    tls: Option<TlsMetadata>,
    conditions: HeaderMap,
}

impl CachedResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn status_line(&self) -> &str {
        &self.status_line
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The response body as a readable stream.
    pub fn body(&self) -> Cursor<Bytes> {
        Cursor::new(self.body.clone())
    }

    pub fn body_bytes(&self) -> &Bytes {
        &self.body
    }

    /// Conditional headers the engine must inject into the outgoing request
    /// when revalidating. Empty for fresh hits and for caller-supplied
    /// preconditions.
    pub fn conditions(&self) -> &HeaderMap {
        &self.conditions
    }

    pub fn is_secure(&self) -> bool {
        self.tls.is_some()
    }

    pub fn cipher_suite(&self) -> Option<&str> {
        self.tls.as_ref().map(|tls| tls.cipher_suite.as_str())
    }

    pub fn peer_certificates(&self) -> Option<&[CertificateDer<'static>]> {
        self.tls.as_ref().map(|tls| tls.peer_certificates.as_slice())
    }

    pub fn local_certificates(&self) -> Option<&[CertificateDer<'static>]> {
        self.tls.as_ref().map(|tls| tls.local_certificates.as_slice())
    }

    pub fn peer_principal(&self) -> Option<&str> {
        self.tls.as_ref()?.peer_principal.as_deref()
    }

    pub fn local_principal(&self) -> Option<&str> {
        self.tls.as_ref()?.local_principal.as_deref()
    }
}

/// Point-in-time snapshot of the facade counters. All four are monotonic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests answered from the store, including confirmed revalidations.
    pub hit_count: u64,
    /// Requests that had to go to the network (or failed `only-if-cached`).
    pub miss_count: u64,
    /// Entry writers that committed.
    pub success_count: u64,
    /// Entry writers that aborted.
    pub abort_count: u64,
}

#[derive(Debug)]
pub(crate) struct CacheState {
    pub(crate) store: Store,
    /// URIs whose latest lookup returned cache-driven revalidation
    /// conditions; resolved by the next `put` for the URI.
    pending_revalidation: Mutex<HashSet<String>>,
    pub(crate) clock: Clock,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
    pub(crate) success_count: AtomicU64,
    pub(crate) abort_count: AtomicU64,
}

impl CacheState {
    fn new(clock: Clock) -> Arc<Self> {
        Arc::new(Self {
            store: Store::default(),
            pending_revalidation: Mutex::new(HashSet::new()),
            clock,
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
            success_count: AtomicU64::new(0),
            abort_count: AtomicU64::new(0),
        })
    }

    #[cfg(test)]
    pub(crate) fn new_for_tests() -> Arc<Self> {
        Self::new(Clock::system())
    }
}

/// The cache core. Cheap to clone; clones share the store and counters.
#[derive(Clone)]
pub struct HttpCache {
    state: Arc<CacheState>,
}

impl HttpCache {
    pub fn new() -> Self {
        Self::with_clock(Clock::system())
    }

    /// Build a cache whose freshness math reads the supplied clock.
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            state: CacheState::new(clock),
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hit_count: self.state.hit_count.load(Ordering::Relaxed),
            miss_count: self.state.miss_count.load(Ordering::Relaxed),
            success_count: self.state.success_count.load(Ordering::Relaxed),
            abort_count: self.state.abort_count.load(Ordering::Relaxed),
        }
    }

    /// Every URI currently cached; intended for inspection from tests.
    pub fn uris(&self) -> Vec<Uri> {
        self.state.store.uris()
    }

    /// Drop any stored entry for the URI. Returns whether one existed.
    pub fn invalidate(&self, uri: &Uri) -> bool {
        let key = uri.to_string();
        self.clear_pending(&key);
        self.state.store.remove(&key).is_some()
    }

    fn lookup(&self, request: &CacheRequest, security: SecurityMode) -> CacheLookup {
        if !request.use_caches() {
            self.state.miss_count.fetch_add(1, Ordering::Relaxed);
            return CacheLookup::Miss;
        }

        let key = request.key();
        let entry = self.state.store.get(&key);
        let now = self.state.clock.now();
        let decision = lookup::evaluate(request, entry.as_deref(), security, now);

        match (decision, entry) {
            (LookupDecision::Fresh { warnings }, Some(entry)) => {
                self.clear_pending(&key);
                self.state.hit_count.fetch_add(1, Ordering::Relaxed);
                trace!(uri = %request.uri, "serving fresh cache entry");
                CacheLookup::Fresh(serve(&entry, &warnings, HeaderMap::new()))
            }
            (LookupDecision::Revalidate { conditions }, Some(entry)) => {
                if !request.has_conditions() {
                    self.state.pending_revalidation.lock().insert(key);
                }
                trace!(uri = %request.uri, "cache entry requires revalidation");
                CacheLookup::Revalidate(serve(&entry, &[], conditions))
            }
            (LookupDecision::Unsatisfiable, _) => {
                self.clear_pending(&key);
                self.state.miss_count.fetch_add(1, Ordering::Relaxed);
                debug!(uri = %request.uri, "only-if-cached request has no usable entry");
                CacheLookup::Unsatisfiable
            }
            _ => {
                self.clear_pending(&key);
                self.state.miss_count.fetch_add(1, Ordering::Relaxed);
                trace!(uri = %request.uri, "cache miss");
                CacheLookup::Miss
            }
        }
    }

    fn offer(&self, request: &CacheRequest, response: &ResponseHead) -> Option<EntryWriter> {
        let key = request.key();

        if matches!(request.method, Method::POST | Method::PUT | Method::DELETE) {
            if self.state.store.remove(&key).is_some() {
                trace!(uri = %request.uri, method = %request.method, "invalidated entry after mutating request");
            }
            self.clear_pending(&key);
            return None;
        }

        if !request.use_caches() {
            return None;
        }

        if response.status == StatusCode::NOT_MODIFIED {
            let was_pending = self.clear_pending(&key);
            if was_pending && let Some(existing) = self.state.store.get(&key) {
                let now = self.state.clock.now();
                let merged = existing.merge_not_modified(&response.headers, now);
                self.state.store.insert(key, Arc::new(merged));
                self.state.hit_count.fetch_add(1, Ordering::Relaxed);
                debug!(uri = %request.uri, "revalidation confirmed cached entry");
            }
            // Without a matching entry the 304 is the caller's problem;
            // nothing to merge and nothing to store.
            return None;
        }

        if self.clear_pending(&key) {
            // The revalidation came back as a full response.
            self.state.miss_count.fetch_add(1, Ordering::Relaxed);
        }

        match admission::admit(request, response) {
            Ok(()) => {
                let meta = PendingEntry {
                    key,
                    uri: request.uri.clone(),
                    method: request.method.clone(),
                    status: response.status,
                    status_line: response.status_line.clone(),
                    headers: response.headers.clone(),
                    tls: response.tls.clone(),
                    received_at: self.state.clock.now(),
                };
                Some(EntryWriter::new(
                    self.state.clone(),
                    meta,
                    response.content_length(),
                ))
            }
            Err(reason) => {
                trace!(uri = %request.uri, ?reason, "response not admitted to cache");
                None
            }
        }
    }

    fn clear_pending(&self, key: &str) -> bool {
        self.state.pending_revalidation.lock().remove(key)
    }
}

impl Default for HttpCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseCache for HttpCache {
    fn get(&self, request: &CacheRequest) -> CacheLookup {
        self.lookup(request, SecurityMode::Strict)
    }

    fn put(&self, request: &CacheRequest, response: &ResponseHead) -> Option<EntryWriter> {
        self.offer(request, response)
    }
}

/// Decorator that lets an `https` request be satisfied by an entry recorded
/// without TLS details. Storage behaviour is unchanged; only the lookup
/// security gate is relaxed.
#[derive(Clone)]
pub struct InsecureHttpCache {
    inner: HttpCache,
}

impl InsecureHttpCache {
    pub fn new(inner: HttpCache) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &HttpCache {
        &self.inner
    }
}

impl ResponseCache for InsecureHttpCache {
    fn get(&self, request: &CacheRequest) -> CacheLookup {
        self.inner.lookup(request, SecurityMode::AllowInsecure)
    }

    fn put(&self, request: &CacheRequest, response: &ResponseHead) -> Option<EntryWriter> {
        self.inner.offer(request, response)
    }
}

fn serve(entry: &Entry, warnings: &[&'static str], conditions: HeaderMap) -> CachedResponse {
    let mut headers = entry.headers.clone();
    for &warning in warnings {
        headers.append(WARNING, HeaderValue::from_static(warning));
    }
    CachedResponse {
        status: entry.status,
        status_line: entry.status_line.clone(),
        headers,
        body: entry.body.clone(),
        tls: entry.tls.clone(),
        conditions,
    }
}
