use http::HeaderMap;
use http::header::{CACHE_CONTROL, PRAGMA};

/// Directives recognised on either side of an exchange. Request and response
/// interpretations differ; the policy modules pick the fields that apply.
#[derive(Debug, Clone, Default)]
pub struct CacheControl {
    pub no_cache: bool,
    pub no_store: bool,
    pub public: bool,
    pub must_revalidate: bool,
    pub only_if_cached: bool,
    pub max_age: Option<u64>,
    pub s_maxage: Option<u64>,
    pub min_fresh: Option<u64>,
    /// `max-stale` was present, with or without a value.
    pub max_stale: bool,
    /// The `max-stale=N` bound, when one was given.
    pub max_stale_limit: Option<u64>,
}

/// Collect directives from every `Cache-Control` occurrence. Unknown
/// directives and unparseable values are ignored. `Pragma: no-cache` is
/// folded in as `no-cache`.
pub fn parse_cache_control(headers: &HeaderMap) -> CacheControl {
    let mut cc = CacheControl::default();

    for value in headers.get_all(CACHE_CONTROL) {
        let Ok(s) = value.to_str() else { continue };
        for part in s.split(',') {
            let part = part.trim();
            if part.eq_ignore_ascii_case("no-cache") {
                cc.no_cache = true;
            } else if part.eq_ignore_ascii_case("no-store") {
                cc.no_store = true;
            } else if part.eq_ignore_ascii_case("public") {
                cc.public = true;
            } else if part.eq_ignore_ascii_case("must-revalidate") {
                cc.must_revalidate = true;
            } else if part.eq_ignore_ascii_case("only-if-cached") {
                cc.only_if_cached = true;
            } else if part.eq_ignore_ascii_case("max-stale") {
                cc.max_stale = true;
            } else if let Some(secs) = directive_seconds(part, "max-age") {
                cc.max_age = Some(secs);
            } else if let Some(secs) = directive_seconds(part, "s-maxage") {
                cc.s_maxage = Some(secs);
            } else if let Some(secs) = directive_seconds(part, "min-fresh") {
                cc.min_fresh = Some(secs);
            } else if let Some(secs) = directive_seconds(part, "max-stale") {
                cc.max_stale = true;
                cc.max_stale_limit = Some(secs);
            }
        }
    }

    for value in headers.get_all(PRAGMA) {
        if let Ok(s) = value.to_str()
            && s.split(',').any(|part| part.trim().eq_ignore_ascii_case("no-cache"))
        {
            cc.no_cache = true;
        }
    }

    cc
}

fn directive_seconds(part: &str, name: &str) -> Option<u64> {
    let (key, value) = part.split_once('=')?;
    if !key.trim().eq_ignore_ascii_case(name) {
        return None;
    }
    value.trim().trim_matches('"').parse().ok()
}
