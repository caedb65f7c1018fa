//! Sharded key-value storage with a read-through cache in front.
//!
//! A [`ShardManager`] spreads keys over many independent backing stores by
//! CRC-32 of the key, so each shard owns a disjoint slice of the keyspace.
//! A [`CachedStore`] can wrap the manager (or any other [`KeyValueStore`])
//! to absorb hot-key reads.
//!
//! ```no_run
//! use shardkv::{CacheConfig, CachedStore, KeyValueStore, ShardConfig, ShardManager};
//!
//! let shards = ShardManager::open("/var/lib/node/chaindata", ShardConfig::default())?;
//! let store = CachedStore::new(shards, CacheConfig::default())?;
//! store.put(b"block-1", b"header")?;
//! assert_eq!(store.get(b"block-1")?, Some(b"header".to_vec()));
//! # Ok::<(), shardkv::Error>(())
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod iterator;
pub mod logging;
pub mod overrides;
pub mod sharding;
pub mod storage;
pub mod write_batch;

pub use cache::{CacheStats, CachedStore};
pub use config::{CacheConfig, ShardConfig, StoreConfig};
pub use error::{Error, Result};
pub use iterator::{KvIterator, MergedIterator};
pub use overrides::LocalOverrides;
pub use sharding::{route, ShardBatch, ShardManager};
pub use storage::{MemoryStore, SledStore};
pub use write_batch::{BatchOperation, WriteBatch};

/// Key range accepted by [`KeyValueStore::iter_range`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyRange {
    /// Whole keyspace.
    All,
    /// Keys greater than or equal to the start key.
    From(Vec<u8>),
    /// Keys beginning with the prefix.
    Prefix(Vec<u8>),
}

impl KeyRange {
    pub fn contains(&self, key: &[u8]) -> bool {
        match self {
            KeyRange::All => true,
            KeyRange::From(start) => key >= start.as_slice(),
            KeyRange::Prefix(prefix) => key.starts_with(prefix),
        }
    }
}

/// The key-value contract shared by single stores, the shard manager and the cache.
///
/// Every implementation can stand in for any other, so a cache may wrap a
/// shard manager or a single unsharded store.
pub trait KeyValueStore: Send + Sync {
    fn has(&self, key: &[u8]) -> Result<bool>;

    /// `Ok(None)` means the key is absent; errors are reserved for failures.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    fn delete(&self, key: &[u8]) -> Result<()>;

    fn new_batch(&self) -> Box<dyn Batch + '_>;

    /// Ordered cursor over the keys inside `range`.
    fn iter_range(&self, range: KeyRange) -> Result<KvIterator<'_>>;

    fn new_iterator(&self) -> Result<KvIterator<'_>> {
        self.iter_range(KeyRange::All)
    }

    fn new_iterator_with_start(&self, start: &[u8]) -> Result<KvIterator<'_>> {
        self.iter_range(KeyRange::From(start.to_vec()))
    }

    fn new_iterator_with_prefix(&self, prefix: &[u8]) -> Result<KvIterator<'_>> {
        self.iter_range(KeyRange::Prefix(prefix.to_vec()))
    }

    fn stat(&self, property: &str) -> Result<String>;

    /// Compacts `[start, limit)`. `None` start means the first key, `None`
    /// limit means past the last key.
    fn compact(&self, start: Option<&[u8]>, limit: Option<&[u8]>) -> Result<()>;

    fn close(&self) -> Result<()>;
}

/// Write-only buffer that reaches its store on [`Batch::write`].
pub trait Batch: Send {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    fn delete(&mut self, key: &[u8]) -> Result<()>;

    /// Number of buffered operations.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Approximate bytes buffered.
    fn value_size(&self) -> usize;

    fn write(&self) -> Result<()>;

    fn reset(&mut self);
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<T> {
    fn has(&self, key: &[u8]) -> Result<bool> {
        (**self).has(key)
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        (**self).put(key, value)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        (**self).delete(key)
    }

    fn new_batch(&self) -> Box<dyn Batch + '_> {
        (**self).new_batch()
    }

    fn iter_range(&self, range: KeyRange) -> Result<KvIterator<'_>> {
        (**self).iter_range(range)
    }

    fn stat(&self, property: &str) -> Result<String> {
        (**self).stat(property)
    }

    fn compact(&self, start: Option<&[u8]>, limit: Option<&[u8]>) -> Result<()> {
        (**self).compact(start, limit)
    }

    fn close(&self) -> Result<()> {
        (**self).close()
    }
}
