//! Short-lived memoization of computed reports.
//!
//! [`TtlCache`] keeps entries until an absolute expiry computed from an
//! injected [`Clock`]. Expired entries are evicted lazily on lookup. The cache
//! is process-local and starts empty on every boot.
//!
//! Every [`TtlCache::clear`] bumps a generation counter. A reader that
//! computes a value outside the lock takes [`TtlCache::generation`] first and
//! stores with [`TtlCache::set_if_generation`], so a fill that started before
//! a clear is dropped instead of resurrecting pre-clear data.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Source of monotonic time for expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<Mutex<Instant>>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: Instant) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *current += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Instant::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

struct Slots<V> {
    entries: HashMap<String, CacheEntry<V>>,
    generation: u64,
}

/// String-keyed cache with per-entry time-to-live.
pub struct TtlCache<V> {
    slots: Mutex<Slots<V>>,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    #[must_use]
    pub fn new(default_ttl: Duration) -> Self {
        Self::with_clock(default_ttl, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(default_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: Mutex::new(Slots {
                entries: HashMap::new(),
                generation: 0,
            }),
            clock,
            default_ttl,
        }
    }

    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Returns the live value for `key`, evicting it if it has expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut slots = self.lock();
        match slots.entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                slots.entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Stores `value` until `now + ttl`, replacing any previous entry.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let expires_at = self.clock.now() + ttl;
        self.lock()
            .entries
            .insert(key.into(), CacheEntry { value, expires_at });
    }

    /// Current generation. Changes on every [`Self::clear`].
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Stores `value` with the default TTL only if no [`Self::clear`] has
    /// happened since `generation` was read. Returns whether it was stored.
    pub fn set_if_generation(&self, key: impl Into<String>, value: V, generation: u64) -> bool {
        let expires_at = self.clock.now() + self.default_ttl;
        let mut slots = self.lock();
        if slots.generation != generation {
            return false;
        }
        slots
            .entries
            .insert(key.into(), CacheEntry { value, expires_at });
        true
    }

    /// [`Self::set`] with the cache's default TTL.
    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.set(key, value, self.default_ttl);
    }

    /// Drops every entry and starts a new generation.
    pub fn clear(&self) {
        let mut slots = self.lock();
        slots.entries.clear();
        slots.generation = slots.generation.wrapping_add(1);
    }

    /// Number of stored entries, expired ones included until they are looked up.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Slots<V>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V> std::fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with_manual_clock() -> (TtlCache<String>, ManualClock) {
        let clock = ManualClock::default();
        let cache = TtlCache::with_clock(Duration::from_secs(300), Arc::new(clock.clone()));
        (cache, clock)
    }

    #[test]
    fn get_returns_value_before_expiry() {
        let (cache, _clock) = cache_with_manual_clock();
        cache.set("dashboard-1", "X".to_string(), Duration::from_secs(300));
        assert_eq!(cache.get("dashboard-1").as_deref(), Some("X"));
    }

    #[test]
    fn expired_entry_returns_none_and_is_evicted() {
        let (cache, clock) = cache_with_manual_clock();
        cache.set("dashboard-1", "X".to_string(), Duration::from_secs(300));
        assert_eq!(cache.len(), 1);

        clock.advance(Duration::from_secs(300));

        assert!(cache.get("dashboard-1").is_none());
        assert_eq!(cache.len(), 0, "expired entry should be evicted on get");
    }

    #[test]
    fn entry_survives_until_the_last_instant_before_expiry() {
        let (cache, clock) = cache_with_manual_clock();
        cache.set("k", "v".to_string(), Duration::from_secs(10));
        clock.advance(Duration::from_millis(9_999));
        assert!(cache.get("k").is_some());
    }

    #[test]
    fn missing_key_returns_none() {
        let (cache, _clock) = cache_with_manual_clock();
        assert!(cache.get("nope").is_none());
    }

    #[test]
    fn set_overwrites_and_refreshes_expiry() {
        let (cache, clock) = cache_with_manual_clock();
        cache.set("k", "old".to_string(), Duration::from_secs(10));
        clock.advance(Duration::from_secs(8));
        cache.set("k", "new".to_string(), Duration::from_secs(10));
        clock.advance(Duration::from_secs(8));
        assert_eq!(cache.get("k").as_deref(), Some("new"));
    }

    #[test]
    fn insert_uses_default_ttl() {
        let (cache, clock) = cache_with_manual_clock();
        cache.insert("k", "v".to_string());
        clock.advance(Duration::from_secs(299));
        assert!(cache.get("k").is_some());
        clock.advance(Duration::from_secs(1));
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn clear_drops_all_entries() {
        let (cache, _clock) = cache_with_manual_clock();
        cache.insert("a", "1".to_string());
        cache.insert("b", "2".to_string());
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn fill_after_clear_is_dropped() {
        let (cache, _clock) = cache_with_manual_clock();
        let generation = cache.generation();

        cache.clear();

        assert!(!cache.set_if_generation("k", "stale".to_string(), generation));
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn fill_without_intervening_clear_is_stored() {
        let (cache, clock) = cache_with_manual_clock();
        cache.clear();
        let generation = cache.generation();

        assert!(cache.set_if_generation("k", "fresh".to_string(), generation));
        assert_eq!(cache.get("k").as_deref(), Some("fresh"));
        clock.advance(Duration::from_secs(300));
        assert!(cache.get("k").is_none(), "uses the default ttl");
    }
}
