//! In-process HTTP/1.1 response cache. An HTTP engine consults
//! [`ResponseCache::get`] before fetching and offers received responses via
//! [`ResponseCache::put`]; the cache applies RFC 2616 admission, freshness
//! and invalidation rules and streams admitted bodies into the store as the
//! caller reads them.

pub mod cache;
pub mod cache_control;
pub mod date;
pub mod headers;
pub mod request;
pub mod tls;

mod freshness;

pub use cache::{
    CacheLookup, CacheStats, CachedResponse, Entry, EntryWriter, HttpCache, InsecureHttpCache,
    RecordingBody, ResponseCache, SkipReason,
};
pub use date::Clock;
pub use headers::{ResponseHead, WARNING_HEURISTIC_EXPIRATION, WARNING_STALE};
pub use request::{CacheRequest, default_use_caches, set_default_use_caches};
pub use tls::TlsMetadata;
