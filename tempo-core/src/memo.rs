//! Expiring validation cache.
//!
//! A small key→value memo with a fixed expiration window, used to
//! short-circuit repeated expensive lookups (release-tag resolution,
//! change-set extraction). Entries are valid only while younger than the
//! cache's expiration; expired entries are dropped on access.
//!
//! The map is a `DashMap` so concurrent readers and writers are safe without
//! an outer lock.

use dashmap::DashMap;
use std::time::{Duration, Instant};

struct CachedValue<T> {
    value: T,
    cached_at: Instant,
}

/// Thread-safe expiring memo.
pub struct ValidationCache<T> {
    entries: DashMap<String, CachedValue<T>>,
    expiration: Duration,
}

impl<T: Clone> ValidationCache<T> {
    /// Create a cache whose entries expire after `expiration`.
    pub fn new(expiration: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            expiration,
        }
    }

    /// Get a cached value if present and not expired.
    pub fn get(&self, key: &str) -> Option<T> {
        let expired = match self.entries.get(key) {
            Some(entry) => {
                if entry.cached_at.elapsed() <= self.expiration {
                    return Some(entry.value.clone());
                }
                true
            }
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    /// Insert or replace a value under `key`.
    pub fn put(&self, key: impl Into<String>, value: T) {
        self.entries.insert(
            key.into(),
            CachedValue {
                value,
                cached_at: Instant::now(),
            },
        );
    }

    /// Drop every entry.
    pub fn invalidate_all(&self) {
        self.entries.clear();
    }

    /// Drop entries older than `max_age`, returning how many were removed.
    pub fn prune_older_than(&self, max_age: Duration) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.cached_at.elapsed() <= max_age);
        let pruned = before - self.entries.len();
        if pruned > 0 {
            tracing::debug!(pruned, remaining = self.entries.len(), "pruned memo entries");
        }
        pruned
    }

    /// Number of live (possibly expired, not yet collected) entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn get_returns_cached_value() {
        let cache = ValidationCache::new(Duration::from_secs(60));
        cache.put("key", 42u32);
        assert_eq!(cache.get("key"), Some(42));
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn expired_entries_are_dropped_on_access() {
        let cache = ValidationCache::new(Duration::from_millis(20));
        cache.put("key", "value".to_string());
        thread::sleep(Duration::from_millis(50));
        assert_eq!(cache.get("key"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn put_replaces_existing_value() {
        let cache = ValidationCache::new(Duration::from_secs(60));
        cache.put("key", 1u32);
        cache.put("key", 2u32);
        assert_eq!(cache.get("key"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn invalidate_all_clears_entries() {
        let cache = ValidationCache::new(Duration::from_secs(60));
        cache.put("a", 1u32);
        cache.put("b", 2u32);
        cache.invalidate_all();
        assert!(cache.is_empty());
    }

    #[test]
    fn prune_removes_only_old_entries() {
        let cache = ValidationCache::new(Duration::from_secs(60));
        cache.put("old", 1u32);
        thread::sleep(Duration::from_millis(50));
        cache.put("new", 2u32);

        let pruned = cache.prune_older_than(Duration::from_millis(20));
        assert_eq!(pruned, 1);
        assert_eq!(cache.get("old"), None);
        assert_eq!(cache.get("new"), Some(2));
    }
}
