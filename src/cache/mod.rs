//! Upstream response cache.
//!
//! # Data Flow
//! ```text
//! proxy handler
//!     → Cache::lookup(key)   hit: independent CacheEntry copy
//!     → Cache::insert(key)   only after a successful upstream fetch
//!     → policy.rs decides what (if anything) leaves
//! ```
//!
//! # Design Decisions
//! - One long-lived store built at startup and shared via `Arc`
//! - Entries are immutable and replaced wholesale (last writer wins)
//! - No freshness validation; with the default policy no eviction either,
//!   so memory grows with every distinct URL fetched

pub mod entry;
pub mod key;
pub mod policy;

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;

use crate::config::CacheConfig;
use crate::observability::metrics;

pub use entry::{CacheEntry, HeaderList};
pub use key::CacheKey;
pub use policy::{EvictionPolicy, Lru, Unbounded};

/// Thread-safe URL → response store.
pub struct Cache {
    entries: DashMap<CacheKey, Arc<CacheEntry>>,
    policy: Box<dyn EvictionPolicy>,
    /// Serialises inserts so the map and the policy's bookkeeping change
    /// together. Lookups never take it.
    writes: Mutex<()>,
}

impl Cache {
    /// Create an unbounded cache.
    pub fn new() -> Self {
        Self::with_policy(Unbounded)
    }

    pub fn with_policy(policy: impl EvictionPolicy + 'static) -> Self {
        Self {
            entries: DashMap::new(),
            policy: Box::new(policy),
            writes: Mutex::new(()),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        match config.max_entries.and_then(NonZeroUsize::new) {
            Some(capacity) => Self::with_policy(Lru::new(capacity)),
            None => Self::new(),
        }
    }

    /// Return a copy of the entry stored under `key`, if any.
    pub fn lookup(&self, key: &CacheKey) -> Option<CacheEntry> {
        // Clone the Arc out so the shard lock is released before the policy runs.
        let found = self.entries.get(key).map(|e| Arc::clone(e.value()));
        metrics::record_cache_lookup(found.is_some());

        let entry = found?;
        self.policy.record_hit(key);
        Some(CacheEntry::clone(&entry))
    }

    /// Store a fully formed entry, replacing any previous one for `key`.
    pub fn insert(&self, key: CacheKey, entry: CacheEntry) {
        tracing::debug!(
            url = %key,
            status = entry.status.as_u16(),
            bytes = entry.body.len(),
            "Caching upstream response"
        );
        let _guard = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
        self.entries.insert(key.clone(), Arc::new(entry));

        for evicted in self.policy.record_insert(&key) {
            if self.entries.remove(&evicted).is_some() {
                tracing::debug!(url = %evicted, policy = self.policy.name(), "Evicted cache entry");
                metrics::record_cache_eviction();
            }
        }
        metrics::record_cache_size(self.entries.len());
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}
