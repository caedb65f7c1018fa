use lru::LruCache;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct CacheEntry {
    value: Vec<u8>,
    expires_at: Instant,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Lookup {
    Hit(Vec<u8>),
    Expired,
    Miss,
}

/// Entry bookkeeping behind the cache lock: TTL per entry, plus bounds on
/// entry count and on key + value bytes. When a bound is hit the least
/// recently inserted entries are dropped first.
pub(crate) struct EntryCache {
    entries: LruCache<Vec<u8>, CacheEntry>,
    bytes: usize,
    max_bytes: usize,
    ttl: Duration,
}

impl EntryCache {
    pub(crate) fn new(max_entries: usize, max_bytes: usize, ttl: Duration) -> Self {
        Self {
            entries: LruCache::new(NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN)),
            bytes: 0,
            max_bytes,
            ttl,
        }
    }

    /// Read-only probe; does not touch recency so it can run under a read lock.
    pub(crate) fn lookup(&self, key: &[u8], now: Instant) -> Lookup {
        match self.entries.peek(key) {
            Some(entry) if entry.expires_at > now => Lookup::Hit(entry.value.clone()),
            Some(_) => Lookup::Expired,
            None => Lookup::Miss,
        }
    }

    /// Stores `value` and returns how many other entries were evicted, or
    /// `None` when the entry alone exceeds the byte bound. An oversized value
    /// still drops any older copy of the key.
    pub(crate) fn insert(&mut self, key: &[u8], value: &[u8], now: Instant) -> Option<usize> {
        self.remove(key);
        let size = key.len() + value.len();
        if size > self.max_bytes {
            return None;
        }

        let mut evicted = 0;
        let entry = CacheEntry {
            value: value.to_vec(),
            expires_at: now + self.ttl,
        };
        if let Some((old_key, old)) = self.entries.push(key.to_vec(), entry) {
            self.bytes -= old_key.len() + old.value.len();
            evicted += 1;
        }
        self.bytes += size;

        while self.bytes > self.max_bytes {
            match self.entries.pop_lru() {
                Some((old_key, old)) => {
                    self.bytes -= old_key.len() + old.value.len();
                    evicted += 1;
                }
                None => break,
            }
        }
        Some(evicted)
    }

    pub(crate) fn remove(&mut self, key: &[u8]) -> bool {
        match self.entries.pop(key) {
            Some(old) => {
                self.bytes -= key.len() + old.value.len();
                true
            }
            None => false,
        }
    }

    /// Removes `key` only if it is still expired at `now`; a fresh value
    /// written since the caller's lookup is kept.
    pub(crate) fn remove_expired(&mut self, key: &[u8], now: Instant) -> bool {
        let expired = matches!(self.entries.peek(key), Some(entry) if entry.expires_at <= now);
        expired && self.remove(key)
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.bytes = 0;
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn bytes(&self) -> usize {
        self.bytes
    }
}
