//! Client-side cache storage and caching policy.
//!
//! The cache proxy talks to storage only through [`CacheStore`], so any
//! backend honoring the contract below can sit behind it. [`MemoryCache`]
//! is the in-process implementation.

mod config;
mod memory;

pub use config::{CacheConfiguration, EXCLUDED_COMMANDS};
pub use memory::MemoryCache;

use crate::resp::Response;
use chrono::{DateTime, Utc};
use regex::Regex;

/// Metadata about one cached entry.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryInfo {
    /// Time-to-live the entry was stored with (0 = never expires)
    pub ttl: u64,
    /// Wall-clock time the entry was stored
    pub created_at: DateTime<Utc>,
    /// Approximate memory footprint in bytes
    pub size: usize,
}

/// Key/value storage used by the cache proxy.
///
/// Entries stored with `ttl > 0` read as absent once `ttl` seconds have
/// elapsed. Missing keys are never an error for deletes.
pub trait CacheStore: Send + Sync {
    /// Insert only if the key is absent. Returns false without side effects
    /// when a live entry already exists.
    fn add(&self, key: &str, value: Response, ttl: u64) -> bool;

    /// Insert or overwrite, replacing value and TTL.
    fn store(&self, key: &str, value: Response, ttl: u64);

    /// Point lookup. Counts a hit when a live entry exists, else a miss.
    fn read(&self, key: &str) -> Option<Response>;

    /// Whether a live entry exists.
    fn exists(&self, key: &str) -> bool;

    fn delete(&self, key: &str) -> bool;

    /// Keys currently stored whose string form matches `pattern`.
    fn find_matching_keys(&self, pattern: &Regex) -> Vec<String>;

    /// Remove everything.
    fn flush(&self);

    fn entry_info(&self, key: &str) -> Option<EntryInfo>;

    /// Number of live entries.
    fn total_count(&self) -> usize;

    /// Approximate bytes held by live entries.
    fn total_size(&self) -> usize;

    fn total_hits(&self) -> u64;

    fn total_misses(&self) -> u64;

    /// Returns the number of entries removed.
    fn batch_delete(&self, keys: &[String]) -> usize {
        keys.iter().filter(|key| self.delete(key)).count()
    }

    /// Returns the keys that were not added because they already existed.
    fn batch_add(&self, entries: Vec<(String, Response)>, ttl: u64) -> Vec<String> {
        entries
            .into_iter()
            .filter_map(|(key, value)| (!self.add(&key, value, ttl)).then_some(key))
            .collect()
    }

    fn batch_store(&self, entries: Vec<(String, Response)>, ttl: u64) {
        for (key, value) in entries {
            self.store(&key, value, ttl);
        }
    }

    fn batch_read(&self, keys: &[String]) -> Vec<(String, Response)> {
        keys.iter()
            .filter_map(|key| self.read(key).map(|value| (key.clone(), value)))
            .collect()
    }

    fn batch_exists(&self, keys: &[String]) -> Vec<bool> {
        keys.iter().map(|key| self.exists(key)).collect()
    }
}

/// Snapshot of cache telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub count: usize,
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn of(store: &dyn CacheStore) -> Self {
        CacheStats {
            count: store.total_count(),
            size: store.total_size(),
            hits: store.total_hits(),
            misses: store.total_misses(),
        }
    }
}
