//! Per-load lookup caches for campaign details and audience names.
//! Entries are filled while a load runs and only read afterwards, so there
//! is no expiry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

pub struct LookupCache<V> {
    name: &'static str,
    store: Arc<DashMap<String, V>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> LookupCache<V> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            store: Arc::new(DashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        match self.store.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("email_api.cache_hits", "cache" => self.name).increment(1);
                tracing::trace!(cache = self.name, key, "cache hit");
                Some(entry.value().clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn put(&self, key: impl Into<String>, value: V) {
        self.store.insert(key.into(), value);
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// `(hits, misses)` since creation.
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_and_put() {
        let cache: LookupCache<String> = LookupCache::new("audiences");
        assert!(cache.is_empty());
        assert_eq!(cache.get("L1"), None);

        cache.put("L1", "VIP Customers".to_string());
        assert_eq!(cache.get("L1").as_deref(), Some("VIP Customers"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats(), (1, 1));
    }

    #[test]
    fn test_put_overwrites() {
        let cache: LookupCache<u32> = LookupCache::new("details");
        cache.put("a", 1);
        cache.put("a", 2);
        assert_eq!(cache.get("a"), Some(2));
        assert_eq!(cache.len(), 1);
    }
}
