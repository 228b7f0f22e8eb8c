//! Bounded insertion-ordered cache with optional expiry

use indexmap::{Equivalent, IndexMap};
use serde::Serialize;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// A cached value and the moment it was stored
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub inserted_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, max_age: Option<Duration>) -> bool {
        max_age.is_some_and(|age| self.inserted_at.elapsed() > age)
    }
}

/// Size snapshot of a cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
}

/// Bounded cache evicting the oldest-inserted entry first.
///
/// Reads never refresh an entry's position or age. With a max age set,
/// expired entries are dropped on read and by [`FifoCache::sweep_expired`].
#[derive(Debug, Clone)]
pub struct FifoCache<K, V> {
    entries: IndexMap<K, CacheEntry<V>>,
    max_size: usize,
    max_age: Option<Duration>,
}

impl<K: Hash + Eq, V> FifoCache<K, V> {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: IndexMap::with_capacity(max_size),
            max_size,
            max_age: None,
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        let expired = self.entries.get(key)?.is_expired(self.max_age);
        if expired {
            self.entries.shift_remove(key);
            return None;
        }
        self.entries.get(key).map(|entry| &entry.value)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(self.max_age))
    }

    /// Store a value, returning the key evicted to make room, if any
    pub fn insert(&mut self, key: K, value: V) -> Option<K> {
        if self.max_size == 0 {
            return None;
        }

        let entry = CacheEntry {
            value,
            inserted_at: Instant::now(),
        };

        if let Some(existing) = self.entries.get_mut(&key) {
            *existing = entry;
            return None;
        }

        let evicted = if self.entries.len() >= self.max_size {
            self.entries.shift_remove_index(0).map(|(k, _)| k)
        } else {
            None
        };

        self.entries.insert(key, entry);
        evicted
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.entries.shift_remove(key).map(|entry| entry.value)
    }

    /// Drop every expired entry, returning how many were removed
    pub fn sweep_expired(&mut self) -> usize {
        let before = self.entries.len();
        let max_age = self.max_age;
        self.entries.retain(|_, entry| !entry.is_expired(max_age));
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            max_size: self.max_size,
        }
    }
}
