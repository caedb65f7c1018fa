//! Key-partitioned storage over many independent backing stores.

mod batch;
pub mod layout;
mod router;

pub use batch::ShardBatch;
pub use layout::{shard_path, ShardLayout};
pub use router::route;

use crate::config::ShardConfig;
use crate::error::{Error, Result};
use crate::iterator::{KvIterator, MergedIterator};
use crate::storage::{MemoryStore, SledStore};
use crate::{Batch, KeyRange, KeyValueStore};
use rayon::prelude::*;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Owns a fixed set of shards and routes every key to exactly one of them.
///
/// The shard count is fixed for the life of the manager and must match the
/// count used when the data was written.
pub struct ShardManager<S: KeyValueStore = SledStore> {
    shards: Vec<S>,
}

impl ShardManager<SledStore> {
    /// Opens `disk_groups x shards_per_group` sled stores under `path`.
    pub fn open<P: AsRef<Path>>(path: P, config: ShardConfig) -> Result<Self> {
        let store_config = config.store.clone();
        Self::open_with(path, &config, move |shard_path| {
            SledStore::open(shard_path, &store_config)
        })
    }
}

impl ShardManager<MemoryStore> {
    pub fn in_memory(shard_count: usize) -> Result<Self> {
        Self::from_stores((0..shard_count).map(|_| MemoryStore::new()).collect())
    }
}

impl<S: KeyValueStore> ShardManager<S> {
    /// Opens every shard in parallel with `opener`.
    ///
    /// Each open runs as its own task and reports into its own slot; the
    /// slots are inspected only once all tasks are done. If any shard fails,
    /// every shard that did open is closed again and the failure with the
    /// lowest shard index is returned.
    pub fn open_with<P, F>(path: P, config: &ShardConfig, opener: F) -> Result<Self>
    where
        P: AsRef<Path>,
        F: Fn(&Path) -> Result<S> + Sync + Send,
    {
        config.validate()?;
        let root = path.as_ref();
        let layout = ShardLayout::from_config(config);
        layout.check_or_persist(root)?;

        let started = Instant::now();
        let paths = layout.shard_paths(root);
        let results: Vec<Result<S>> = paths.par_iter().map(|path| opener(path.as_path())).collect();

        let shards = Self::collect_opened(paths, results)?;
        info!(
            path = %root.display(),
            shards = shards.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Opened sharded store"
        );
        Ok(Self { shards })
    }

    /// Builds a manager over stores that are already open, in shard order.
    pub fn from_stores(shards: Vec<S>) -> Result<Self> {
        if shards.is_empty() {
            return Err(Error::Config("shard manager needs at least one shard".to_string()));
        }
        Ok(Self { shards })
    }

    fn collect_opened(paths: Vec<PathBuf>, results: Vec<Result<S>>) -> Result<Vec<S>> {
        let mut opened = Vec::with_capacity(results.len());
        let mut failure = None;
        for (index, (path, result)) in paths.into_iter().zip(results).enumerate() {
            match result {
                Ok(store) => opened.push(store),
                Err(err) if failure.is_none() => failure = Some((index, path, err)),
                Err(err) => {
                    warn!(shard = index, path = %path.display(), error = %err, "Shard failed to open")
                }
            }
        }

        let Some((index, path, source)) = failure else {
            return Ok(opened);
        };
        for store in &opened {
            if let Err(err) = store.close() {
                warn!(error = %err, "Failed to release shard after aborted open");
            }
        }
        Err(Error::ShardOpen {
            index,
            path,
            source: Box::new(source),
        })
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Index of the shard that owns `key`.
    pub fn shard_index(&self, key: &[u8]) -> usize {
        route(key, self.shards.len())
    }

    pub fn shard(&self, index: usize) -> Option<&S> {
        self.shards.get(index)
    }

    pub fn shards(&self) -> &[S] {
        &self.shards
    }

    fn shard_at(&self, index: usize) -> &S {
        &self.shards[index]
    }

    fn shard_for(&self, key: &[u8]) -> &S {
        self.shard_at(self.shard_index(key))
    }

    /// Typed batch; [`KeyValueStore::new_batch`] returns the same thing boxed.
    pub fn batch(&self) -> ShardBatch<'_, S> {
        ShardBatch::new(self)
    }

    /// Typed merged iterator over every shard.
    pub fn merged_iter(&self, range: KeyRange) -> Result<MergedIterator<'_>> {
        let sources = self
            .shards
            .iter()
            .map(|shard| shard.iter_range(range.clone()))
            .collect::<Result<Vec<KvIterator<'_>>>>()?;
        Ok(MergedIterator::new(sources))
    }
}

impl<S: KeyValueStore> KeyValueStore for ShardManager<S> {
    fn has(&self, key: &[u8]) -> Result<bool> {
        self.shard_for(key).has(key)
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.shard_for(key).get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.shard_for(key).put(key, value)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.shard_for(key).delete(key)
    }

    fn new_batch(&self) -> Box<dyn Batch + '_> {
        Box::new(self.batch())
    }

    fn iter_range(&self, range: KeyRange) -> Result<KvIterator<'_>> {
        Ok(Box::new(self.merged_iter(range)?))
    }

    /// Every shard's value for `property`, labelled by shard index. The first
    /// failing shard fails the whole call.
    fn stat(&self, property: &str) -> Result<String> {
        let mut out = String::new();
        for (index, shard) in self.shards.iter().enumerate() {
            let value = shard.stat(property)?;
            let _ = writeln!(out, "=== shard {:02} ===", index);
            out.push_str(&value);
            out.push('\n');
        }
        Ok(out)
    }

    /// Compacts the same range on every shard, in order. Stops at the first
    /// error; later shards are left uncompacted.
    fn compact(&self, start: Option<&[u8]>, limit: Option<&[u8]>) -> Result<()> {
        let started = Instant::now();
        for shard in &self.shards {
            shard.compact(start, limit)?;
        }
        info!(
            shards = self.shards.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Compacted sharded store"
        );
        Ok(())
    }

    /// Closes shards in order. Stops at the first error, which leaves the
    /// remaining shards open.
    fn close(&self) -> Result<()> {
        for (index, shard) in self.shards.iter().enumerate() {
            if let Err(err) = shard.close() {
                warn!(shard = index, error = %err, "Shard failed to close, later shards left open");
                return Err(err);
            }
        }
        info!(shards = self.shards.len(), "Closed sharded store");
        Ok(())
    }
}
