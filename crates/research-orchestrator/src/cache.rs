use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Internal cache entry with insertion time
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.stored_at) < ttl
    }
}

/// Key/value store whose entries disappear `ttl` after they were written.
///
/// Expiry is lazy: a stale entry is removed by the `get` that notices it.
/// There is no capacity bound and no background sweep.
pub struct TtlCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Insert or overwrite `key`, restarting its TTL.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Fresh value for `key`, or `None`. A stale entry is removed on the way out.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let stale = match self.entries.get(key) {
            Some(entry) if entry.is_fresh(now, self.ttl) => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };

        if stale {
            // Re-check under the shard lock so a concurrent `set` is never dropped.
            let ttl = self.ttl;
            self.entries
                .remove_if(key, |_, entry| !entry.is_fresh(Instant::now(), ttl));
            tracing::debug!("Cache entry expired: {}", key);
        }
        None
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .map(|entry| entry.is_fresh(Instant::now(), self.ttl))
            .unwrap_or(false)
    }

    /// Remove `key`, returning whether a fresh value was dropped.
    pub fn remove(&self, key: &str) -> bool {
        self.entries
            .remove(key)
            .map(|(_, entry)| entry.is_fresh(Instant::now(), self.ttl))
            .unwrap_or(false)
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of fresh entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| entry.value().is_fresh(now, self.ttl))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored entries, including expired ones not yet reclaimed.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}
