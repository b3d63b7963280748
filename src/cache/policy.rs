//! Freshness policy.
//!
//! Derives a TTL hint from `Cache-Control` and `Pragma`. The same rule is
//! applied to request and response headers; the response hint wins.

use crate::http::parse::HeaderList;

/// Parsed `Cache-Control` directives that affect storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheControl {
    pub max_age: Option<u64>,
    /// Shared-cache lifetime; overrides `max_age` for this proxy.
    pub s_maxage: Option<u64>,
    pub no_cache: bool,
    pub no_store: bool,
    pub private: bool,
}

impl CacheControl {
    /// Merge every `Cache-Control` value found in `headers`.
    pub fn from_headers(headers: &HeaderList) -> Self {
        let mut cc = Self::default();
        for value in headers.get_all("cache-control") {
            cc.merge(value);
        }
        cc
    }

    fn merge(&mut self, value: &str) {
        for directive in value.split(',') {
            let directive = directive.trim();
            let (name, arg) = match directive.split_once('=') {
                Some((name, arg)) => (name.trim(), Some(arg.trim().trim_matches('"'))),
                None => (directive, None),
            };

            if name.eq_ignore_ascii_case("no-cache") {
                self.no_cache = true;
            } else if name.eq_ignore_ascii_case("no-store") {
                self.no_store = true;
            } else if name.eq_ignore_ascii_case("private") {
                self.private = true;
            } else if name.eq_ignore_ascii_case("max-age") {
                if let Some(secs) = arg.and_then(|a| a.parse().ok()) {
                    self.max_age = Some(secs);
                }
            } else if name.eq_ignore_ascii_case("s-maxage") {
                if let Some(secs) = arg.and_then(|a| a.parse().ok()) {
                    self.s_maxage = Some(secs);
                }
            }
        }
    }

    /// TTL implied by these directives, `None` if they say nothing.
    pub fn ttl(&self) -> Option<u64> {
        if self.no_cache || self.no_store || self.private {
            Some(0)
        } else {
            self.s_maxage.or(self.max_age)
        }
    }
}

/// TTL hint carried by a header set, `None` when no caching directive applies.
pub fn ttl_hint(headers: &HeaderList) -> Option<u64> {
    if headers.contains_token("pragma", "no-cache") {
        return Some(0);
    }
    CacheControl::from_headers(headers).ttl()
}

/// Response hint, else request hint, else the configured default.
pub fn effective_ttl(response_hint: Option<u64>, request_hint: Option<u64>, default_ttl: u64) -> u64 {
    response_hint.or(request_hint).unwrap_or(default_ttl)
}
