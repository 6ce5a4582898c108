//! In-process cache store with expiration.
//!
//! Provides a thread-safe key-value store with:
//! - Lazy expiration of items on access, plus a cleanup that visits only
//!   items past their deadline
//! - Memory usage accounting
//! - Hit/miss counters

use super::{CacheStore, EntryInfo};
use crate::resp::Response;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// A single cached response
#[derive(Debug, Clone)]
struct CacheItem {
    value: Response,
    ttl: u64,
    /// Absolute expiration time (None = never expires)
    expires_at: Option<Instant>,
    created_at: DateTime<Utc>,
}

impl CacheItem {
    fn new(value: Response, ttl: u64) -> Self {
        CacheItem {
            value,
            ttl,
            expires_at: (ttl > 0).then(|| Instant::now() + Duration::from_secs(ttl)),
            created_at: Utc::now(),
        }
    }

    /// Approximate memory usage of this item under `key`
    fn memory_size(&self, key: &str) -> usize {
        std::mem::size_of::<Self>() + key.len() + self.value.memory_size()
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| Instant::now() >= expires_at)
    }
}

/// Items plus their expiry deadlines, guarded by one lock.
#[derive(Default)]
struct Entries {
    items: HashMap<String, CacheItem>,
    /// Keys of expiring items ordered by deadline
    deadlines: BTreeSet<(Instant, String)>,
}

impl Entries {
    /// Whether any item has reached its deadline.
    fn has_expired(&self) -> bool {
        self.deadlines
            .first()
            .is_some_and(|(deadline, _)| Instant::now() >= *deadline)
    }
}

/// Thread-safe in-memory cache store
#[derive(Default)]
pub struct MemoryCache {
    data: RwLock<Entries>,
    /// Current memory usage in bytes
    memory_used: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `item`, adjusting memory accounting for any replaced entry.
    fn insert(&self, data: &mut Entries, key: &str, item: CacheItem) {
        let new_size = item.memory_size(key) as u64;
        let expires_at = item.expires_at;
        if let Some(old) = data.items.insert(key.to_string(), item) {
            self.forget(data, key, &old);
        }
        if let Some(expires_at) = expires_at {
            data.deadlines.insert((expires_at, key.to_string()));
        }
        self.memory_used.fetch_add(new_size, Ordering::SeqCst);
    }

    fn remove(&self, data: &mut Entries, key: &str) -> Option<CacheItem> {
        let item = data.items.remove(key)?;
        self.forget(data, key, &item);
        Some(item)
    }

    /// Drop the bookkeeping of an item no longer in the map.
    fn forget(&self, data: &mut Entries, key: &str, item: &CacheItem) {
        if let Some(expires_at) = item.expires_at {
            data.deadlines.remove(&(expires_at, key.to_string()));
        }
        self.memory_used
            .fetch_sub(item.memory_size(key) as u64, Ordering::SeqCst);
    }

    /// Remove all expired items, returning how many were dropped.
    ///
    /// Only items past their deadline are visited.
    pub fn cleanup_expired(&self) -> usize {
        if !self.data.read().has_expired() {
            return 0;
        }

        let mut data = self.data.write();
        let now = Instant::now();
        let mut removed = 0;
        while let Some((deadline, key)) = data.deadlines.first().cloned() {
            if deadline > now {
                break;
            }
            data.deadlines.pop_first();
            if let Some(item) = data.items.remove(&key) {
                self.memory_used
                    .fetch_sub(item.memory_size(&key) as u64, Ordering::SeqCst);
                removed += 1;
            }
        }

        if removed > 0 {
            debug!(count = removed, "Cleaned up expired cache entries");
        }
        removed
    }
}

impl CacheStore for MemoryCache {
    fn add(&self, key: &str, value: Response, ttl: u64) -> bool {
        let mut data = self.data.write();
        if data.items.get(key).is_some_and(|item| !item.is_expired()) {
            return false;
        }
        self.insert(&mut data, key, CacheItem::new(value, ttl));
        trace!(key, ttl, "Cache entry added");
        true
    }

    fn store(&self, key: &str, value: Response, ttl: u64) {
        let mut data = self.data.write();
        self.insert(&mut data, key, CacheItem::new(value, ttl));
        trace!(key, ttl, "Cache entry stored");
    }

    fn read(&self, key: &str) -> Option<Response> {
        {
            let data = self.data.read();
            match data.items.get(key) {
                Some(item) if !item.is_expired() => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(item.value.clone());
                }
                Some(_) => {}
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            }
        }

        trace!(key, "Cache entry expired on access");
        let mut data = self.data.write();
        if data.items.get(key).is_some_and(CacheItem::is_expired) {
            self.remove(&mut data, key);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    fn exists(&self, key: &str) -> bool {
        self.data
            .read()
            .items
            .get(key)
            .is_some_and(|item| !item.is_expired())
    }

    fn delete(&self, key: &str) -> bool {
        let mut data = self.data.write();
        let removed = self.remove(&mut data, key).is_some();
        if removed {
            trace!(key, "Cache entry deleted");
        }
        removed
    }

    fn batch_delete(&self, keys: &[String]) -> usize {
        let mut data = self.data.write();
        keys.iter()
            .filter(|key| self.remove(&mut data, key).is_some())
            .count()
    }

    fn find_matching_keys(&self, pattern: &Regex) -> Vec<String> {
        self.data
            .read()
            .items
            .iter()
            .filter(|(key, item)| !item.is_expired() && pattern.is_match(key))
            .map(|(key, _)| key.clone())
            .collect()
    }

    fn flush(&self) {
        let mut data = self.data.write();
        data.items.clear();
        data.deadlines.clear();
        self.memory_used.store(0, Ordering::SeqCst);
        debug!("Flushed all cache entries");
    }

    fn entry_info(&self, key: &str) -> Option<EntryInfo> {
        let data = self.data.read();
        let item = data.items.get(key).filter(|item| !item.is_expired())?;
        Some(EntryInfo {
            ttl: item.ttl,
            created_at: item.created_at,
            size: item.memory_size(key),
        })
    }

    fn total_count(&self) -> usize {
        self.cleanup_expired();
        self.data.read().items.len()
    }

    fn total_size(&self) -> usize {
        self.cleanup_expired();
        self.memory_used.load(Ordering::SeqCst) as usize
    }

    fn total_hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    fn total_misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn value(s: &'static str) -> Response {
        Response::bulk(s)
    }

    #[test]
    fn test_basic_store_read() {
        let cache = MemoryCache::new();
        cache.store("GET_key1", value("value1"), 0);

        assert_eq!(cache.read("GET_key1"), Some(value("value1")));
        assert!(cache.exists("GET_key1"));
    }

    #[test]
    fn test_read_nonexistent_counts_miss() {
        let cache = MemoryCache::new();
        assert!(cache.read("nonexistent").is_none());
        assert_eq!(cache.total_misses(), 1);
        assert_eq!(cache.total_hits(), 0);
    }

    #[test]
    fn test_hits_and_misses() {
        let cache = MemoryCache::new();
        cache.store("k", value("v"), 0);

        cache.read("k");
        cache.read("k");
        cache.read("other");

        assert_eq!(cache.total_hits(), 2);
        assert_eq!(cache.total_misses(), 1);
    }

    #[test]
    fn test_add_existing() {
        let cache = MemoryCache::new();
        assert!(cache.add("k", value("value1"), 0));
        assert!(!cache.add("k", value("value2"), 0));

        // Value should remain unchanged
        assert_eq!(cache.read("k"), Some(value("value1")));
    }

    #[test]
    fn test_store_overwrites() {
        let cache = MemoryCache::new();
        cache.store("k", value("value1"), 100);
        cache.store("k", value("value2"), 0);

        assert_eq!(cache.read("k"), Some(value("value2")));
        assert_eq!(cache.entry_info("k").map(|info| info.ttl), Some(0));
        assert_eq!(cache.total_count(), 1);
    }

    #[test]
    fn test_delete() {
        let cache = MemoryCache::new();
        cache.store("k", value("v"), 0);

        assert!(cache.delete("k"));
        assert!(cache.read("k").is_none());
        assert!(!cache.delete("k"));
    }

    #[test]
    fn test_batch_delete_ignores_missing() {
        let cache = MemoryCache::new();
        cache.store("a", value("1"), 0);
        cache.store("b", value("2"), 0);

        let removed = cache.batch_delete(&["a".to_string(), "missing".to_string()]);
        assert_eq!(removed, 1);
        assert!(!cache.exists("a"));
        assert!(cache.exists("b"));
    }

    #[test]
    fn test_expiration() {
        let cache = MemoryCache::new();

        // Store with 1 second TTL
        cache.store("k", value("v"), 1);
        assert!(cache.read("k").is_some());

        // Wait for expiration
        thread::sleep(Duration::from_millis(1100));

        assert!(cache.read("k").is_none());
        assert!(!cache.exists("k"));
        assert_eq!(cache.total_count(), 0);
    }

    #[test]
    fn test_add_replaces_expired_entry() {
        let cache = MemoryCache::new();
        cache.store("k", value("old"), 1);
        thread::sleep(Duration::from_millis(1100));

        assert!(cache.add("k", value("new"), 0));
        assert_eq!(cache.read("k"), Some(value("new")));
    }

    #[test]
    fn test_find_matching_keys() {
        let cache = MemoryCache::new();
        cache.store("GET_foo", value("1"), 0);
        cache.store("MGET_foo_bar", value("2"), 0);
        cache.store("GET_baz", value("3"), 0);

        let pattern = Regex::new(&regex::escape("foo")).unwrap();
        let mut keys = cache.find_matching_keys(&pattern);
        keys.sort();
        assert_eq!(keys, ["GET_foo", "MGET_foo_bar"]);
    }

    #[test]
    fn test_flush() {
        let cache = MemoryCache::new();
        cache.store("a", value("1"), 0);
        cache.store("b", value("2"), 0);

        cache.flush();

        assert!(cache.read("a").is_none());
        assert_eq!(cache.total_count(), 0);
        assert_eq!(cache.total_size(), 0);
    }

    #[test]
    fn test_memory_accounting() {
        let cache = MemoryCache::new();
        cache.store("a", Response::bulk(vec![0u8; 100]), 0);
        let one = cache.total_size();
        assert!(one > 100);

        cache.store("a", Response::bulk(vec![0u8; 10]), 0);
        assert!(cache.total_size() < one);

        cache.delete("a");
        assert_eq!(cache.total_size(), 0);
    }

    #[test]
    fn test_batch_defaults() {
        let cache = MemoryCache::new();
        cache.store("a", value("1"), 0);

        let rejected = cache.batch_add(
            vec![("a".to_string(), value("x")), ("b".to_string(), value("2"))],
            0,
        );
        assert_eq!(rejected, ["a"]);

        let keys = ["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(cache.batch_exists(&keys), [true, true, false]);
        assert_eq!(cache.batch_read(&keys).len(), 2);
    }

    #[test]
    fn test_count_ignores_unexpired_deadlines() {
        let cache = MemoryCache::new();
        for i in 0..1000 {
            cache.store(&format!("GET_{i}"), Response::Integer(i), 3600);
        }
        cache.store("GET_short", value("v"), 1);

        assert_eq!(cache.cleanup_expired(), 0);
        assert_eq!(cache.total_count(), 1001);

        thread::sleep(Duration::from_millis(1100));
        assert_eq!(cache.total_count(), 1000);
        assert_eq!(cache.cleanup_expired(), 0);
    }

    #[test]
    fn test_replaced_entry_keeps_new_deadline() {
        let cache = MemoryCache::new();
        cache.store("k", value("short"), 1);
        cache.store("k", value("forever"), 0);

        thread::sleep(Duration::from_millis(1100));
        assert_eq!(cache.cleanup_expired(), 0);
        assert_eq!(cache.read("k"), Some(value("forever")));
        assert_eq!(cache.total_count(), 1);
    }

    #[test]
    fn test_concurrent_access() {
        let cache = Arc::new(MemoryCache::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..100 {
                        cache.store(&format!("GET_{t}_{i}"), Response::Integer(i), 0);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.total_count(), 400);
    }
}
