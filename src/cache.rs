//! Process-wide response cache with a fixed time-to-live.
//!
//! Entries are never swept in the background. A stale entry stays in the map
//! until the next `get` for its key notices the deadline has passed and drops
//! it. There is no size bound and no explicit invalidation; `set` on the same
//! key is the only way to replace a value early.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use parking_lot::RwLock;

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

pub struct ResponseCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    ttl: Duration,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the stored value if it has not expired yet. An expired entry is
    /// removed as a side effect.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => return None,
                Some(entry) if now <= entry.expires_at => return Some(entry.value.clone()),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write();
        // Another writer may have refreshed the key between the two locks.
        if entries
            .get(key)
            .is_some_and(|entry| now > entry.expires_at)
        {
            entries.remove(key);
            tracing::trace!(key, "evicted stale cache entry");
            return None;
        }
        entries.get(key).map(|entry| entry.value.clone())
    }

    /// Stores `value`, replacing any previous entry. The deadline is computed
    /// at write time.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.write().insert(key.into(), entry);
    }

    /// Number of stored entries, including stale ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Builds the cache key for a request. Query pairs are sorted so that
/// `?a=1&b=2` and `?b=2&a=1` share an entry.
pub fn cache_key(method: &str, path: &str, query: &[(String, String)]) -> String {
    let mut pairs: Vec<&(String, String)> = query.iter().collect();
    pairs.sort();
    let query = pairs
        .iter()
        .map(|(name, value)| {
            format!(
                "{}={}",
                urlencoding::encode(name),
                urlencoding::encode(value)
            )
        })
        .collect::<Vec<_>>()
        .join("&");
    format!("{method}:{path}?{query}")
}
