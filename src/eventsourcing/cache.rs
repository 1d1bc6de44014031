//! Hydrate cache
//!
//! LRU cache with per-entry TTL used by the command handler to skip replays
//! of hot aggregates. The cache is a pure optimization: values are cloned in
//! and out, and disabling it must not change observable behavior.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;

/// Cache construction options.
///
/// `size` 0 means unbounded (LRU eviction off); a zero `ttl` turns expiry
/// off. Disabled by default.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    pub enabled: bool,
    pub size: usize,
    pub ttl: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            size: 0,
            ttl: Duration::ZERO,
        }
    }
}

/// Thread-safe LRU+TTL cache, or a no-op when disabled.
pub enum Cache<K: Hash + Eq, V: Clone> {
    Disabled,
    Lru(Mutex<Inner<K, V>>),
}

pub struct Inner<K: Hash + Eq, V> {
    entries: LruCache<K, (V, Instant)>,
    ttl: Duration,
}

impl<K: Hash + Eq, V: Clone> Cache<K, V> {
    pub fn new(options: CacheOptions) -> Self {
        if !options.enabled {
            tracing::info!("hydrate cache disabled");
            return Cache::Disabled;
        }

        let entries = match NonZeroUsize::new(options.size) {
            Some(size) => LruCache::new(size),
            None => LruCache::unbounded(),
        };

        tracing::info!(
            size = options.size,
            ttl_secs = options.ttl.as_secs(),
            "hydrate cache enabled"
        );

        Cache::Lru(Mutex::new(Inner {
            entries,
            ttl: options.ttl,
        }))
    }

    pub fn add(&self, key: K, value: V) {
        if let Cache::Lru(inner) = self {
            let mut inner = inner.lock();
            inner.entries.put(key, (value, Instant::now()));
        }
    }

    /// Clone out the cached value, dropping it first when its TTL elapsed.
    pub fn get(&self, key: &K) -> Option<V> {
        let Cache::Lru(inner) = self else {
            return None;
        };

        let mut inner = inner.lock();
        let ttl = inner.ttl;

        let expired = match inner.entries.get(key) {
            Some((_, stored_at)) => !ttl.is_zero() && stored_at.elapsed() > ttl,
            None => return None,
        };

        if expired {
            inner.entries.pop(key);
            return None;
        }

        inner.entries.get(key).map(|(value, _)| value.clone())
    }

    pub fn remove(&self, key: &K) {
        if let Cache::Lru(inner) = self {
            inner.lock().entries.pop(key);
        }
    }
}
