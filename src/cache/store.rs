use std::collections::HashMap;
use std::sync::Arc;

use http::Uri;
use parking_lot::Mutex;

use super::Entry;

/// URI-keyed entry map. Insertions replace atomically with respect to
/// concurrent lookups: a reader holds either the old `Arc` or the new one.
#[derive(Debug, Default)]
pub(crate) struct Store {
    entries: Mutex<HashMap<String, Arc<Entry>>>,
}

impl Store {
    pub fn get(&self, key: &str) -> Option<Arc<Entry>> {
        self.entries.lock().get(key).cloned()
    }

    pub fn insert(&self, key: String, entry: Arc<Entry>) -> Option<Arc<Entry>> {
        self.entries.lock().insert(key, entry)
    }

    pub fn remove(&self, key: &str) -> Option<Arc<Entry>> {
        self.entries.lock().remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Read-only view of every cached URI, for inspection from tests.
    pub fn uris(&self) -> Vec<Uri> {
        self.entries
            .lock()
            .values()
            .map(|entry| entry.uri.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{HeaderMap, Method, StatusCode};
    use std::time::SystemTime;

    fn entry(uri: &str, body: &'static [u8]) -> Arc<Entry> {
        Arc::new(Entry {
            uri: uri.parse().unwrap(),
            method: Method::GET,
            status: StatusCode::OK,
            status_line: "HTTP/1.1 200 OK".to_string(),
            headers: HeaderMap::new(),
            body: Bytes::from_static(body),
            tls: None,
            received_at: SystemTime::now(),
        })
    }

    #[test]
    fn insert_replaces_prior_entry_for_the_same_key() {
        let store = Store::default();
        let key = "http://example.com/a".to_string();
        assert!(store.insert(key.clone(), entry("http://example.com/a", b"one")).is_none());
        let replaced = store
            .insert(key.clone(), entry("http://example.com/a", b"two"))
            .expect("prior entry returned");
        assert_eq!(replaced.body.as_ref(), b"one");
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&key).unwrap().body.as_ref(), b"two");
    }

    #[test]
    fn remove_is_idempotent() {
        let store = Store::default();
        let key = "http://example.com/a".to_string();
        store.insert(key.clone(), entry("http://example.com/a", b"one"));
        assert!(store.remove(&key).is_some());
        assert!(store.remove(&key).is_none());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn uris_lists_every_cached_key() {
        let store = Store::default();
        store.insert(
            "http://example.com/a".to_string(),
            entry("http://example.com/a", b"a"),
        );
        store.insert(
            "http://example.com/b".to_string(),
            entry("http://example.com/b", b"b"),
        );
        let mut uris: Vec<String> = store.uris().iter().map(|uri| uri.to_string()).collect();
        uris.sort();
        assert_eq!(uris, vec!["http://example.com/a", "http://example.com/b"]);
    }
}
