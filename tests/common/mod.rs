#![allow(dead_code)]

use shardkv::iterator::KvIterator;
use shardkv::{
    Batch, Error, KeyRange, KeyValueStore, MemoryStore, Result, ShardConfig, ShardManager,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

pub fn setup_sled_shards(disk_groups: usize, shards_per_group: usize) -> (TempDir, ShardManager) {
    let dir = tempdir().unwrap();
    let manager = ShardManager::open(dir.path(), sled_config(disk_groups, shards_per_group)).unwrap();
    (dir, manager)
}

pub fn sled_config(disk_groups: usize, shards_per_group: usize) -> ShardConfig {
    let mut config = ShardConfig::new(disk_groups, shards_per_group);
    config.store.flush_every_ms = None;
    config.store.cache_capacity = 4 * 1024 * 1024;
    config
}

pub fn create_test_data(count: usize, key_prefix: &str) -> Vec<(Vec<u8>, Vec<u8>)> {
    (0..count)
        .map(|i| {
            let key = format!("{}_{:06}", key_prefix, i);
            let value = format!("value_{:06}", i);
            (key.into_bytes(), value.into_bytes())
        })
        .collect()
}

pub fn collect_keys(iter: KvIterator<'_>) -> Vec<Vec<u8>> {
    iter.map(|item| item.unwrap().0).collect()
}

pub fn verify_key_value<S: KeyValueStore>(store: &S, key: &[u8], expected_value: &[u8]) {
    let actual = store.get(key).unwrap();
    assert_eq!(
        actual.as_deref(),
        Some(expected_value),
        "Value mismatch for key {:?}",
        String::from_utf8_lossy(key)
    );
}

/// Calls observed on a [`FlakyStore`], shared so they survive the store itself.
#[derive(Debug, Default)]
pub struct CallLog {
    pub closes: AtomicUsize,
    pub compacts: AtomicUsize,
}

impl CallLog {
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn compacts(&self) -> usize {
        self.compacts.load(Ordering::SeqCst)
    }
}

/// In-memory store whose writes, batch commits, compaction and close can be
/// made to fail on demand.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_writes: AtomicBool,
    pub fail_compact: AtomicBool,
    pub fail_close: AtomicBool,
    pub calls: Arc<CallLog>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(calls: Arc<CallLog>) -> Self {
        Self {
            calls,
            ..Self::default()
        }
    }

    pub fn failing_writes() -> Self {
        let store = Self::new();
        store.fail_writes.store(true, Ordering::SeqCst);
        store
    }

    fn injected(what: &str) -> Error {
        Error::Storage(format!("injected {} failure", what))
    }
}

impl KeyValueStore for FlakyStore {
    fn has(&self, key: &[u8]) -> Result<bool> {
        self.inner.has(key)
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::injected("put"));
        }
        self.inner.put(key, value)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::injected("delete"));
        }
        self.inner.delete(key)
    }

    fn new_batch(&self) -> Box<dyn Batch + '_> {
        Box::new(FlakyBatch {
            inner: self.inner.new_batch(),
            fail: self.fail_writes.load(Ordering::SeqCst),
        })
    }

    fn iter_range(&self, range: KeyRange) -> Result<KvIterator<'_>> {
        self.inner.iter_range(range)
    }

    fn stat(&self, property: &str) -> Result<String> {
        self.inner.stat(property)
    }

    fn compact(&self, start: Option<&[u8]>, limit: Option<&[u8]>) -> Result<()> {
        self.calls.compacts.fetch_add(1, Ordering::SeqCst);
        if self.fail_compact.load(Ordering::SeqCst) {
            return Err(Self::injected("compact"));
        }
        self.inner.compact(start, limit)
    }

    fn close(&self) -> Result<()> {
        self.calls.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(Self::injected("close"));
        }
        self.inner.close()
    }
}

struct FlakyBatch<'a> {
    inner: Box<dyn Batch + 'a>,
    fail: bool,
}

impl Batch for FlakyBatch<'_> {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.inner.put(key, value)
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.inner.delete(key)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn value_size(&self) -> usize {
        self.inner.value_size()
    }

    fn write(&self) -> Result<()> {
        if self.fail {
            return Err(FlakyStore::injected("batch"));
        }
        self.inner.write()
    }

    fn reset(&mut self) {
        self.inner.reset();
    }
}
