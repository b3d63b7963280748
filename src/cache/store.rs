//! Shared response cache.
//!
//! One mutex serializes every lookup and insert. Expiry is lazy: an entry
//! found past its deadline during a lookup is removed on the spot. There
//! is no background eviction.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::cache::fingerprint::Fingerprint;
use crate::observability::metrics;

/// Seconds since the Unix epoch.
pub type Timestamp = u64;

/// Current wall-clock time in whole seconds.
pub fn unix_now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// An immutable cached upstream response.
#[derive(Debug, PartialEq, Eq)]
pub struct CacheEntry {
    fingerprint: Fingerprint,
    payload: Arc<[u8]>,
    expires_at: Timestamp,
}

impl CacheEntry {
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    /// Raw response bytes exactly as received from upstream.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn expires_at(&self) -> Timestamp {
        self.expires_at
    }

    /// Fresh while `expires_at` is strictly in the future.
    pub fn is_fresh(&self, now: Timestamp) -> bool {
        self.expires_at > now
    }
}

/// Mapping from fingerprint to cached response.
///
/// Entries are handed out as `Arc`s so a reader can keep writing a payload
/// to its client after the entry has been replaced or expired.
#[derive(Debug, Default)]
pub struct CacheStore {
    entries: Mutex<HashMap<Fingerprint, Arc<CacheEntry>>>,
}

impl CacheStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // Entries are never mutated in place, so a panic while the lock was
    // held cannot leave a torn entry behind.
    fn lock(&self) -> MutexGuard<'_, HashMap<Fingerprint, Arc<CacheEntry>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the entry for `fingerprint` if it is still fresh at `now`.
    ///
    /// A stale entry is removed as a side effect.
    pub fn lookup(&self, fingerprint: Fingerprint, now: Timestamp) -> Option<Arc<CacheEntry>> {
        let mut entries = self.lock();
        let expires_at = match entries.get(&fingerprint) {
            None => return None,
            Some(entry) if entry.is_fresh(now) => return Some(Arc::clone(entry)),
            Some(entry) => entry.expires_at(),
        };

        entries.remove(&fingerprint);
        metrics::record_cache_size(entries.len());
        tracing::debug!(%fingerprint, expires_at, now, "Evicted expired cache entry");
        None
    }

    /// Store `payload` under `fingerprint` for `ttl_secs` seconds from `now`.
    ///
    /// Does nothing when `ttl_secs` is 0. Replaces any existing entry.
    /// Returns whether an entry was stored.
    pub fn insert(
        &self,
        fingerprint: Fingerprint,
        payload: impl Into<Arc<[u8]>>,
        ttl_secs: u64,
        now: Timestamp,
    ) -> bool {
        if ttl_secs == 0 {
            return false;
        }

        let entry = Arc::new(CacheEntry {
            fingerprint,
            payload: payload.into(),
            expires_at: now.saturating_add(ttl_secs),
        });

        let mut entries = self.lock();
        entries.insert(fingerprint, entry);
        metrics::record_cache_insert();
        metrics::record_cache_size(entries.len());
        true
    }

    /// Number of entries currently held, fresh or not.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(n: u64) -> Fingerprint {
        Fingerprint::from(n)
    }

    #[test]
    fn fresh_until_deadline() {
        let store = CacheStore::new();
        let t0 = 1_000;
        assert!(store.insert(fp(1), b"payload".to_vec(), 60, t0));

        let entry = store.lookup(fp(1), t0 + 59).expect("entry should be fresh");
        assert_eq!(entry.payload(), b"payload");
        assert_eq!(entry.expires_at(), t0 + 60);
        assert_eq!(entry.fingerprint(), fp(1));
    }

    #[test]
    fn expired_lookup_removes_entry() {
        let store = CacheStore::new();
        let t0 = 1_000;
        store.insert(fp(1), b"payload".to_vec(), 60, t0);

        assert!(store.lookup(fp(1), t0 + 61).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn expires_exactly_at_deadline() {
        let store = CacheStore::new();
        store.insert(fp(1), b"x".to_vec(), 1, 10);
        assert!(store.lookup(fp(1), 10).is_some());
        assert!(store.lookup(fp(1), 11).is_none());
    }

    #[test]
    fn zero_ttl_is_not_stored() {
        let store = CacheStore::new();
        assert!(!store.insert(fp(7), b"nope".to_vec(), 0, 1_000));
        assert!(store.lookup(fp(7), 1_000).is_none());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn latest_insert_wins() {
        let store = CacheStore::new();
        store.insert(fp(3), b"first".to_vec(), 60, 1_000);
        store.insert(fp(3), b"second".to_vec(), 60, 1_001);

        assert_eq!(store.len(), 1);
        let entry = store.lookup(fp(3), 1_002).unwrap();
        assert_eq!(entry.payload(), b"second");
        assert_eq!(entry.expires_at(), 1_061);
    }

    #[test]
    fn held_entry_survives_replacement() {
        let store = CacheStore::new();
        store.insert(fp(3), b"first".to_vec(), 60, 1_000);
        let held = store.lookup(fp(3), 1_000).unwrap();
        store.insert(fp(3), b"second".to_vec(), 60, 1_000);
        assert_eq!(held.payload(), b"first");
    }

    #[test]
    fn missing_key_lookup_is_none() {
        let store = CacheStore::new();
        assert!(store.lookup(fp(42), 0).is_none());
    }

    #[test]
    fn concurrent_inserts_keep_one_entry_per_key() {
        let store = Arc::new(CacheStore::new());
        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for key in 0..100u64 {
                        store.insert(fp(key), vec![i], 60, 1_000);
                        store.lookup(fp(key), 1_000);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 100);
    }

    #[test]
    fn recovers_from_poisoned_lock() {
        let store = Arc::new(CacheStore::new());
        store.insert(fp(1), b"kept".to_vec(), 60, 1_000);

        let poisoner = Arc::clone(&store);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.entries.lock().unwrap();
            panic!("worker died holding the cache lock");
        })
        .join();

        assert_eq!(store.lookup(fp(1), 1_000).unwrap().payload(), b"kept");
    }
}
