//! Small in-memory TTL cache for API responses.
//!
//! Entries are cloned on the way in and on the way out, so callers can never
//! mutate what the cache holds. Expiry is decided by an injected [`Clock`],
//! which keeps the cache deterministic under test.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tracing::trace;

use crate::defaults;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for tests and simulations.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: DateTime<Utc>,
    ttl: Duration,
}

/// String-keyed cache whose entries expire after a per-entry TTL.
pub struct TtlCache<V: Clone> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache using wall-clock time and the default TTL.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a cache driven by the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            default_ttl: Duration::minutes(defaults::CACHE_TTL_MINUTES),
        }
    }

    /// Override the TTL used by [`TtlCache::set`].
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Store a copy of `value` under `key` with the default TTL.
    pub fn set(&self, key: impl Into<String>, value: &V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Store a copy of `value` under `key` with an explicit TTL.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: &V, ttl: Duration) {
        let entry = CacheEntry {
            value: value.clone(),
            stored_at: self.clock.now(),
            ttl,
        };
        self.lock().insert(key.into(), entry);
    }

    /// Return a copy of the value for `key` unless it has expired.
    ///
    /// Expired entries are evicted on access.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.lock();
        let expired = match entries.get(key) {
            None => return None,
            Some(entry) => now - entry.stored_at > entry.ttl,
        };

        if expired {
            trace!(key, "Cache entry expired");
            entries.remove(key);
            return None;
        }

        entries.get(key).map(|entry| entry.value.clone())
    }

    /// Remove every entry, or only keys containing `pattern`.
    pub fn clear(&self, pattern: Option<&str>) {
        let mut entries = self.lock();
        match pattern {
            None => entries.clear(),
            Some(pattern) => entries.retain(|key, _| !key.contains(pattern)),
        }
    }

    /// Number of stored entries, including ones that have expired but not been evicted.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
