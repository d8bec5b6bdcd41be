//! Generic expiring key-value store used to wrap repository read paths.
//!
//! Every entry carries an absolute expiry stamped at insertion time. Reads
//! check expiry lazily and never delete; a background sweep task wakes once
//! per TTL and physically evicts whatever has expired, so abandoned keys
//! cannot grow memory without bound.
//!
//! All operations are safe for concurrent use. Reads proceed concurrently
//! with each other; writes and the eviction sweep take the map exclusively.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// A TTL cache with a fixed time-to-live set at construction.
///
/// Construction spawns the eviction sweep task, so a Tokio runtime must be
/// current. [`TtlCache::close`] stops the sweeper; it is idempotent and the
/// cache itself stays usable afterwards (reads still expire lazily).
pub struct TtlCache<K, V> {
    entries: Arc<RwLock<HashMap<K, CacheEntry<V>>>>,
    ttl: Duration,
    shutdown: CancellationToken,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache whose entries live for `ttl`, and start the eviction sweep.
    ///
    /// # Panics
    ///
    /// Panics if `ttl` is zero.
    pub fn new(ttl: Duration) -> Self {
        assert!(!ttl.is_zero(), "cache TTL must be non-zero");

        let entries: Arc<RwLock<HashMap<K, CacheEntry<V>>>> = Arc::new(RwLock::new(HashMap::new()));
        let shutdown = CancellationToken::new();

        let sweep_entries = Arc::clone(&entries);
        let sweep_shutdown = shutdown.clone();
        tokio::spawn(async move {
            // First sweep lands one full TTL after construction
            let mut timer = tokio::time::interval_at(Instant::now() + ttl, ttl);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = sweep_shutdown.cancelled() => break,
                    _ = timer.tick() => {
                        let now = Instant::now();
                        let mut entries = write_entries(&sweep_entries);
                        entries.retain(|_, entry| entry.expires_at > now);
                    }
                }
            }
        });

        Self { entries, ttl, shutdown }
    }

    /// Look up `key`, returning `None` if absent or past its expiry.
    ///
    /// Expired entries are left in place for the sweep task to collect.
    pub fn get(&self, key: &K) -> Option<V> {
        let entries = read_entries(&self.entries);
        let entry = entries.get(key)?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some(entry.value.clone())
    }

    /// Insert or overwrite `key`, resetting its expiry to now + TTL.
    pub fn set(&self, key: K, value: V) {
        let expires_at = Instant::now() + self.ttl;
        let mut entries = write_entries(&self.entries);
        entries.insert(key, CacheEntry { value, expires_at });
    }

    /// Remove `key` if present.
    pub fn delete(&self, key: &K) {
        let mut entries = write_entries(&self.entries);
        entries.remove(key);
    }

    /// Remove every entry.
    pub fn clear(&self) {
        let mut entries = write_entries(&self.entries);
        entries.clear();
    }

    /// Number of stored entries, including lazily-expired ones not yet swept.
    pub fn len(&self) -> usize {
        read_entries(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The TTL this cache was constructed with.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Stop the eviction sweep task. Safe to call more than once, and safe
    /// even if no sweep ever ran.
    pub fn close(&self) {
        self.shutdown.cancel();
    }
}

impl<K, V> Drop for TtlCache<K, V> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// Lock poisoning would only happen if a panic occurred mid-operation; the map
// holds plain clonable data, so the inner state is still coherent.
fn read_entries<K, V>(entries: &RwLock<HashMap<K, CacheEntry<V>>>) -> RwLockReadGuard<'_, HashMap<K, CacheEntry<V>>> {
    entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_entries<K, V>(entries: &RwLock<HashMap<K, CacheEntry<V>>>) -> RwLockWriteGuard<'_, HashMap<K, CacheEntry<V>>> {
    entries.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
