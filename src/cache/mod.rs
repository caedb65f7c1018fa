//! Read-through / write-through cache in front of any [`KeyValueStore`].

mod entry_cache;

use crate::config::CacheConfig;
use crate::error::Result;
use crate::iterator::KvIterator;
use crate::{Batch, KeyRange, KeyValueStore};
use entry_cache::{EntryCache, Lookup};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, trace};

type ExclusionPredicate = Arc<dyn Fn(&[u8]) -> bool + Send + Sync>;

#[derive(Debug, Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    bypasses: AtomicU64,
    inserts: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl CacheCounters {
    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }
}

/// Point-in-time view of the cache counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Reads that skipped the cache because it was disabled or the key is excluded.
    pub bypasses: u64,
    pub inserts: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub entries: usize,
    pub bytes: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total > 0 {
            self.hits as f64 / total as f64
        } else {
            0.0
        }
    }
}

struct CacheState {
    enabled: bool,
    entries: EntryCache,
}

/// Caches point reads of a wrapped store, which stays the only source of truth.
///
/// * `get` serves cacheable keys from the cache and fills it on a miss.
///   Absent keys are not cached, and a failed remote read leaves the cache alone.
/// * `put` and `delete` update the cache best-effort and then the remote store,
///   whose result is what the caller sees.
/// * `has`, batches, iterators, `stat`, `compact` and `close` go straight to
///   the remote store. Writes made through a batch do not refresh cached
///   entries; those keys may read stale until their TTL runs out.
///
/// Consistency is eventual: a `get` that misses can race a concurrent `put`
/// of the same key and re-insert the older value it read. The cache lock is
/// never held across a remote call.
pub struct CachedStore<S: KeyValueStore> {
    remote: S,
    state: RwLock<CacheState>,
    exclude: ExclusionPredicate,
    counters: CacheCounters,
}

impl<S: KeyValueStore> CachedStore<S> {
    pub fn new(remote: S, config: CacheConfig) -> Result<Self> {
        config.validate()?;
        let excluded: HashSet<Vec<u8>> = config
            .excluded_keys
            .iter()
            .map(|key| key.as_bytes().to_vec())
            .collect();

        Ok(Self {
            remote,
            state: RwLock::new(CacheState {
                enabled: config.enabled,
                entries: EntryCache::new(config.max_entries, config.max_bytes, config.ttl),
            }),
            exclude: Arc::new(move |key: &[u8]| excluded.contains(key)),
            counters: CacheCounters::default(),
        })
    }

    /// Adds a rule for keys that must always be read from the remote store.
    /// Keys listed in the config stay excluded.
    pub fn with_exclusion<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&[u8]) -> bool + Send + Sync + 'static,
    {
        let previous = self.exclude.clone();
        self.exclude = Arc::new(move |key: &[u8]| previous(key) || predicate(key));
        self
    }

    pub fn remote(&self) -> &S {
        &self.remote
    }

    pub fn into_remote(self) -> S {
        self.remote
    }

    pub fn is_enabled(&self) -> bool {
        self.state.read().enabled
    }

    /// Turning the cache off drops every entry, since writes made while it is
    /// off would otherwise leave stale copies behind.
    pub fn set_enabled(&self, enabled: bool) {
        let mut state = self.state.write();
        state.enabled = enabled;
        if !enabled {
            state.entries.clear();
        }
        info!(enabled, "Read cache toggled");
    }

    /// Whether reads of `key` may be served from the cache right now.
    pub fn is_cacheable(&self, key: &[u8]) -> bool {
        let enabled = self.state.read().enabled;
        enabled && !(self.exclude)(key)
    }

    /// True if a live entry for `key` is cached. Does not count as a read.
    pub fn is_cached(&self, key: &[u8]) -> bool {
        matches!(
            self.state.read().entries.lookup(key, Instant::now()),
            Lookup::Hit(_)
        )
    }

    pub fn stats(&self) -> CacheStats {
        let (entries, bytes) = {
            let state = self.state.read();
            (state.entries.len(), state.entries.bytes())
        };
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            bypasses: self.counters.bypasses.load(Ordering::Relaxed),
            inserts: self.counters.inserts.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            expirations: self.counters.expirations.load(Ordering::Relaxed),
            entries,
            bytes,
        }
    }

    pub fn log_stats(&self) {
        let stats = self.stats();
        info!(
            hits = stats.hits,
            misses = stats.misses,
            bypasses = stats.bypasses,
            evictions = stats.evictions,
            expirations = stats.expirations,
            entries = stats.entries,
            bytes = stats.bytes,
            hit_rate = stats.hit_rate(),
            "Read cache statistics"
        );
    }

    fn cache_lookup(&self, key: &[u8]) -> Option<Vec<u8>> {
        let now = Instant::now();
        let lookup = self.state.read().entries.lookup(key, now);
        match lookup {
            Lookup::Hit(value) => {
                CacheCounters::bump(&self.counters.hits, 1);
                return Some(value);
            }
            Lookup::Expired => {
                if self.state.write().entries.remove_expired(key, now) {
                    CacheCounters::bump(&self.counters.expirations, 1);
                }
            }
            Lookup::Miss => {}
        }
        CacheCounters::bump(&self.counters.misses, 1);
        None
    }

    fn cache_insert(&self, key: &[u8], value: &[u8]) {
        let outcome = {
            let mut state = self.state.write();
            if !state.enabled {
                return;
            }
            state.entries.insert(key, value, Instant::now())
        };
        match outcome {
            Some(evicted) => {
                CacheCounters::bump(&self.counters.inserts, 1);
                CacheCounters::bump(&self.counters.evictions, evicted as u64);
            }
            None => trace!(
                key_len = key.len(),
                value_len = value.len(),
                "Value larger than cache bound, not cached"
            ),
        }
    }

    fn cache_remove(&self, key: &[u8]) {
        self.state.write().entries.remove(key);
    }
}

impl<S: KeyValueStore> KeyValueStore for CachedStore<S> {
    /// Always answered by the remote store: the cache does not track absence.
    fn has(&self, key: &[u8]) -> Result<bool> {
        self.remote.has(key)
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let cacheable = self.is_cacheable(key);
        if cacheable {
            if let Some(value) = self.cache_lookup(key) {
                return Ok(Some(value));
            }
        } else {
            CacheCounters::bump(&self.counters.bypasses, 1);
        }

        let value = self.remote.get(key)?;
        if cacheable {
            if let Some(value) = &value {
                self.cache_insert(key, value);
            }
        }
        Ok(value)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        if self.is_cacheable(key) {
            self.cache_insert(key, value);
        }
        if let Err(err) = self.remote.put(key, value) {
            // The remote store rejected the write, so the cached copy is not the truth.
            self.cache_remove(key);
            return Err(err);
        }
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.cache_remove(key);
        self.remote.delete(key)
    }

    fn new_batch(&self) -> Box<dyn Batch + '_> {
        self.remote.new_batch()
    }

    fn iter_range(&self, range: KeyRange) -> Result<KvIterator<'_>> {
        self.remote.iter_range(range)
    }

    fn stat(&self, property: &str) -> Result<String> {
        self.remote.stat(property)
    }

    fn compact(&self, start: Option<&[u8]>, limit: Option<&[u8]>) -> Result<()> {
        self.remote.compact(start, limit)
    }

    fn close(&self) -> Result<()> {
        self.log_stats();
        self.remote.close()
    }
}
