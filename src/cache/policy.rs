//! Replacement policies for the response cache.
//!
//! The default policy keeps everything: memory grows with the number of
//! distinct URLs fetched and nothing is ever discarded. `Lru` bounds the
//! entry count for deployments that need it.

use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};

use lru::LruCache;

use super::key::CacheKey;

/// Decides which keys leave the cache.
pub trait EvictionPolicy: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// `key` was just stored. Returns keys that must now be removed.
    fn record_insert(&self, key: &CacheKey) -> Vec<CacheKey>;

    /// `key` was served from the cache.
    fn record_hit(&self, key: &CacheKey);
}

/// Never evicts.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unbounded;

impl EvictionPolicy for Unbounded {
    fn name(&self) -> &'static str {
        "unbounded"
    }

    fn record_insert(&self, _key: &CacheKey) -> Vec<CacheKey> {
        Vec::new()
    }

    fn record_hit(&self, _key: &CacheKey) {}
}

/// Least-recently-used, bounded by entry count.
pub struct Lru {
    order: Mutex<LruCache<CacheKey, ()>>,
}

impl Lru {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            order: Mutex::new(LruCache::new(capacity)),
        }
    }
}

impl EvictionPolicy for Lru {
    fn name(&self) -> &'static str {
        "lru"
    }

    fn record_insert(&self, key: &CacheKey) -> Vec<CacheKey> {
        let mut order = self.order.lock().unwrap_or_else(PoisonError::into_inner);
        match order.push(key.clone(), ()) {
            // `push` also hands back the old slot when the key was already present.
            Some((evicted, ())) if evicted != *key => vec![evicted],
            _ => Vec::new(),
        }
    }

    fn record_hit(&self, key: &CacheKey) {
        let mut order = self.order.lock().unwrap_or_else(PoisonError::into_inner);
        order.promote(key);
    }
}
