//! Cache store collaborator.
//!
//! Uses DashMap for lock-free concurrent access.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use super::entry::CacheEntry;

/// Key-to-entry store written by dispatch workers.
///
/// Implementations must accept concurrent calls; for a single key the last
/// `put` wins.
pub trait Cache: Send + Sync {
    /// Prepare the store for use (load an index, warm up, ...).
    fn initialize(&self) {}

    fn get(&self, key: &str) -> Option<CacheEntry>;

    fn put(&self, key: &str, entry: CacheEntry);

    /// Force the entry stale; `full_expire` also drops its hard expiry.
    fn invalidate(&self, key: &str, full_expire: bool) {
        if let Some(entry) = self.get(key) {
            self.put(key, entry.invalidated(full_expire));
        }
    }

    fn remove(&self, key: &str);

    fn clear(&self);
}

/// Configuration for the in-memory cache.
#[derive(Debug, Clone)]
pub struct MemoryCacheConfig {
    pub max_entries: usize,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self { max_entries: 512 }
    }
}

struct Slot {
    entry: CacheEntry,
    inserted: u64,
}

/// Bounded in-memory cache; evicts the oldest inserts once over capacity.
///
/// The bound holds after every `put` returns. `max_entries: 0` stores nothing.
pub struct MemoryCache {
    entries: DashMap<String, Slot>,
    clock: AtomicU64,
    config: MemoryCacheConfig,
}

impl MemoryCache {
    pub fn new(config: MemoryCacheConfig) -> Self {
        Self {
            entries: DashMap::with_capacity(config.max_entries),
            clock: AtomicU64::new(0),
            config,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns false when there was nothing to evict.
    fn evict_oldest(&self) -> bool {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|slot| slot.value().inserted)
            .map(|slot| slot.key().clone());
        match oldest {
            Some(key) => {
                self.entries.remove(&key);
                tracing::trace!(%key, "cache: evicted oldest entry");
                true
            }
            None => false,
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(MemoryCacheConfig::default())
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries.get(key).map(|slot| slot.entry.clone())
    }

    fn put(&self, key: &str, entry: CacheEntry) {
        let inserted = self.clock.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(key.to_owned(), Slot { entry, inserted });
        // Concurrent puts may each overshoot; every one trims back down.
        while self.entries.len() > self.config.max_entries {
            if !self.evict_oldest() {
                break;
            }
        }
    }

    fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    fn clear(&self) {
        self.entries.clear();
    }
}
