//! Suspension points and single-flight coalescing.
//!
//! A request that misses the cache either becomes the *leader* for its key
//! (it gets a [`Publisher`] to hand to the fetch task plus a [`Waiter`]) or,
//! when a fetch for the same key is already running, a *follower* that only
//! gets a [`Waiter`]. The publisher resolves every waiter exactly once.
//!
//! Slots are removed as soon as the result is published, so a later miss
//! for the same key starts a fresh fetch.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;

type Slot<V> = Arc<watch::Sender<Option<V>>>;

/// Registry of outstanding fetches keyed by `K`.
pub struct Inflight<K, V>
where
    K: Eq + Hash,
{
    slots: Arc<DashMap<K, Slot<V>>>,
    coalesce: bool,
}

/// Outcome of [`Inflight::join`].
pub enum Join<K, V>
where
    K: Eq + Hash + Clone,
{
    /// No fetch was running; the caller must dispatch one.
    Leader(Publisher<K, V>, Waiter<V>),
    /// Another request is already fetching this key.
    Follower(Waiter<V>),
}

impl<K, V> Inflight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// With `coalesce` off every call to `join` yields a leader.
    pub fn new(coalesce: bool) -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
            coalesce,
        }
    }

    pub fn join(&self, key: K) -> Join<K, V> {
        if !self.coalesce {
            let (tx, rx) = watch::channel(None);
            return Join::Leader(
                Publisher {
                    key,
                    slot: Arc::new(tx),
                    registry: None,
                },
                Waiter(rx),
            );
        }

        match self.slots.entry(key.clone()) {
            Entry::Occupied(e) => Join::Follower(Waiter(e.get().subscribe())),
            Entry::Vacant(e) => {
                let (tx, rx) = watch::channel(None);
                let slot = Arc::new(tx);
                e.insert(Arc::clone(&slot));
                Join::Leader(
                    Publisher {
                        key,
                        slot,
                        registry: Some(Arc::clone(&self.slots)),
                    },
                    Waiter(rx),
                )
            }
        }
    }

    /// Number of keys with a fetch outstanding.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Resumes every waiter of one key. Dropping it unpublished abandons them.
pub struct Publisher<K, V>
where
    K: Eq + Hash,
{
    key: K,
    slot: Slot<V>,
    registry: Option<Arc<DashMap<K, Slot<V>>>>,
}

impl<K, V> Publisher<K, V>
where
    K: Eq + Hash,
{
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Resolves once no waiter is left to receive the result.
    pub async fn closed(&self) {
        self.slot.closed().await
    }

    /// Hand `value` to every current waiter.
    pub fn publish(self, value: V) {
        self.slot.send_replace(Some(value));
    }
}

impl<K, V> Drop for Publisher<K, V>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        if let Some(registry) = &self.registry {
            registry.remove_if(&self.key, |_, slot| Arc::ptr_eq(slot, &self.slot));
        }
    }
}

/// The suspended half of a request waiting on an upstream fetch.
pub struct Waiter<V>(watch::Receiver<Option<V>>);

impl<V: Clone> Waiter<V> {
    /// Suspend until the publisher resolves. `None` means it was dropped
    /// without publishing.
    pub async fn wait(mut self) -> Option<V> {
        let value = match self.0.wait_for(Option::is_some).await {
            Ok(value) => value.clone(),
            Err(_) => None,
        };
        value
    }
}
