use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::Namespace;

/// Cache-wide settings. Individual writes may override the TTL.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub default_ttl: Duration,
    pub sweep_interval: Duration,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
            max_entries: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

impl CacheStats {
    /// hits / (hits + misses), 0.0 before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Entry {
    value: Value,
    inserted_at: Instant,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

struct Inner {
    namespaces: HashMap<String, HashMap<String, Entry>>,
    generations: HashMap<String, u64>,
    epoch: u64,
    len: usize,
    last_sweep: Instant,
}

impl Inner {
    fn generation(&self, namespace: &str) -> u64 {
        self.epoch + self.generations.get(namespace).copied().unwrap_or(0)
    }

    fn bump(&mut self, namespace: &str) {
        *self.generations.entry(namespace.to_string()).or_insert(0) += 1;
    }

    fn remove(&mut self, namespace: &str, key: &str) -> bool {
        let Some(entries) = self.namespaces.get_mut(namespace) else {
            return false;
        };
        let removed = entries.remove(key).is_some();
        if removed {
            self.len -= 1;
            if entries.is_empty() {
                self.namespaces.remove(namespace);
            }
        }
        removed
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        let mut removed = 0;
        self.namespaces.retain(|_, entries| {
            let before = entries.len();
            entries.retain(|_, entry| !entry.is_expired(now));
            removed += before - entries.len();
            !entries.is_empty()
        });
        self.len -= removed;
        self.last_sweep = now;
        removed
    }

    fn evict_oldest(&mut self) -> bool {
        let oldest = self
            .namespaces
            .iter()
            .flat_map(|(ns, entries)| entries.iter().map(move |(key, e)| (ns, key, e.inserted_at)))
            .min_by_key(|(_, _, inserted_at)| *inserted_at)
            .map(|(ns, key, _)| (ns.clone(), key.clone()));

        match oldest {
            Some((ns, key)) => self.remove(&ns, &key),
            None => false,
        }
    }
}

struct Sweeper {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Thread-safe TTL store partitioned by [`Namespace`].
///
/// One mutex guards the map and no I/O ever happens while it is held.
/// Expired entries are dropped lazily on read, inline on write once per
/// sweep interval, and by the optional background sweeper.
pub struct TtlCache {
    config: CacheConfig,
    inner: Mutex<Inner>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    closed: AtomicBool,
    sweeper: Mutex<Option<Sweeper>>,
}

impl TtlCache {
    pub fn new(config: CacheConfig) -> Self {
        let config = CacheConfig {
            max_entries: config.max_entries.max(1),
            ..config
        };
        Self {
            config,
            inner: Mutex::new(Inner {
                namespaces: HashMap::new(),
                generations: HashMap::new(),
                epoch: 0,
                len: 0,
                last_sweep: Instant::now(),
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            sweeper: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Live value for `key`, or `None` if absent, expired or the cache is closed.
    pub fn get(&self, namespace: &Namespace, key: &str) -> Option<Value> {
        if self.is_closed() {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let now = Instant::now();
        let mut inner = self.lock();
        let lookup = inner
            .namespaces
            .get(namespace.as_str())
            .and_then(|entries| entries.get(key))
            .map(|entry| (entry.is_expired(now), entry.value.clone()));

        match lookup {
            Some((false, value)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Some((true, _)) => {
                inner.remove(namespace.as_str(), key);
                self.expirations.fetch_add(1, Ordering::Relaxed);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store `value`, overwriting any previous entry for `key`.
    pub fn set(&self, namespace: &Namespace, key: &str, value: Value, ttl: Option<Duration>) {
        self.insert(namespace, key, value, ttl, None);
    }

    /// Store `value` only if `namespace` has not been invalidated since
    /// `generation` was read. Returns whether the value was stored.
    pub fn set_if_generation(
        &self,
        namespace: &Namespace,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
        generation: u64,
    ) -> bool {
        self.insert(namespace, key, value, ttl, Some(generation))
    }

    fn insert(
        &self,
        namespace: &Namespace,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
        generation: Option<u64>,
    ) -> bool {
        let now = Instant::now();
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        let mut inner = self.lock();
        if self.is_closed() {
            return false;
        }

        if generation.is_some_and(|g| g != inner.generation(namespace.as_str())) {
            debug!(namespace = %namespace, key, "discarding stale cache fill");
            return false;
        }

        if now.duration_since(inner.last_sweep) >= self.config.sweep_interval {
            let removed = inner.purge_expired(now);
            self.expirations.fetch_add(removed as u64, Ordering::Relaxed);
        }

        let exists = inner
            .namespaces
            .get(namespace.as_str())
            .is_some_and(|entries| entries.contains_key(key));

        if !exists && inner.len >= self.config.max_entries {
            let removed = inner.purge_expired(now);
            self.expirations.fetch_add(removed as u64, Ordering::Relaxed);
            if inner.len >= self.config.max_entries && inner.evict_oldest() {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }

        let entry = Entry {
            value,
            inserted_at: now,
            expires_at: now + ttl,
        };
        let previous = inner
            .namespaces
            .entry(namespace.as_str().to_string())
            .or_default()
            .insert(key.to_string(), entry);
        if previous.is_none() {
            inner.len += 1;
        }
        true
    }

    /// Current invalidation generation of `namespace`.
    pub fn generation(&self, namespace: &Namespace) -> u64 {
        self.lock().generation(namespace.as_str())
    }

    pub fn invalidate(&self, namespace: &Namespace, key: &str) -> bool {
        let mut inner = self.lock();
        inner.bump(namespace.as_str());
        inner.remove(namespace.as_str(), key)
    }

    /// Drop every key in `namespace` starting with `prefix`.
    pub fn invalidate_prefix(&self, namespace: &Namespace, prefix: &str) -> usize {
        let mut inner = self.lock();
        inner.bump(namespace.as_str());

        let Some(entries) = inner.namespaces.get_mut(namespace.as_str()) else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        let removed = before - entries.len();
        if entries.is_empty() {
            inner.namespaces.remove(namespace.as_str());
        }
        inner.len -= removed;

        if removed > 0 {
            debug!(namespace = %namespace, prefix, removed, "cache prefix invalidated");
        }
        removed
    }

    pub fn invalidate_namespace(&self, namespace: &Namespace) -> usize {
        let mut inner = self.lock();
        inner.bump(namespace.as_str());
        let removed = inner
            .namespaces
            .remove(namespace.as_str())
            .map_or(0, |entries| entries.len());
        inner.len -= removed;
        removed
    }

    /// Remove expired entries now. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let removed = self.lock().purge_expired(Instant::now());
        self.expirations.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        let count = inner.len;
        inner.namespaces.clear();
        inner.len = 0;
        inner.epoch += 1;
        info!(count, "cache cleared");
    }

    pub fn len(&self) -> usize {
        self.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.len(),
            max_entries: self.config.max_entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }

    /// Spawn the periodic purge task. No-op if already running or closed.
    ///
    /// The task only holds a weak reference and ends on its own once the
    /// cache is dropped.
    pub fn start_sweeper(self: &Arc<Self>) {
        let mut slot = self.sweeper.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() || self.is_closed() {
            return;
        }

        let period = self.config.sweep_interval.max(Duration::from_millis(1));
        let cache = Arc::downgrade(self);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(cache) = cache.upgrade() else {
                            break;
                        };
                        let removed = cache.purge_expired();
                        if removed > 0 {
                            debug!(removed, "cache sweep");
                        }
                    }
                }
            }
        });

        *slot = Some(Sweeper { cancel, handle });
    }

    pub fn sweeper_running(&self) -> bool {
        self.sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|s| !s.handle.is_finished())
    }

    /// Stop the sweeper and release every entry. Safe to call repeatedly and
    /// when no sweeper was ever started.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(sweeper) = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            sweeper.cancel.cancel();
            sweeper.handle.abort();
        }
        self.clear();
        info!("cache closed");
    }
}

impl Drop for TtlCache {
    fn drop(&mut self) {
        let slot = self.sweeper.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(sweeper) = slot.take() {
            sweeper.cancel.cancel();
        }
    }
}
