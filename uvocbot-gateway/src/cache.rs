//! Expiring caches for Census and aggregator lookups.
//!
//! Each cached value carries its own key (a map region its facility id, a
//! population figure its world), so callers store what they fetched and
//! look it up by the id they were asked for.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use uvocbot_core::{MapRegion, WorldId, WorldPopulation};

/// A lookup result that knows which request it answers.
pub trait CacheKeyed: Clone {
    type Key: Eq + Hash + Copy + std::fmt::Debug;

    fn cache_key(&self) -> Self::Key;
}

impl CacheKeyed for MapRegion {
    type Key = u64;

    fn cache_key(&self) -> u64 {
        self.facility_id
    }
}

impl CacheKeyed for WorldPopulation {
    type Key = WorldId;

    fn cache_key(&self) -> WorldId {
        self.world
    }
}

/// Values are served while younger than the TTL. A zero TTL disables the
/// cache.
#[derive(Debug)]
pub struct LookupCache<V: CacheKeyed> {
    ttl: Duration,
    entries: Mutex<HashMap<V::Key, (Instant, V)>>,
}

impl<V: CacheKeyed> LookupCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn fresh(&self, key: V::Key) -> Option<V> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(&key)
            .filter(|(fetched, _)| fetched.elapsed() < self.ttl)
            .map(|(_, value)| value.clone())
    }

    /// Store a fetched value under its own key, pruning stale entries.
    pub fn store(&self, value: &V) {
        if self.ttl.is_zero() {
            return;
        }
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let ttl = self.ttl;
        entries.retain(|_, (fetched, _)| fetched.elapsed() < ttl);
        entries.insert(value.cache_key(), (Instant::now(), value.clone()));
    }
}
