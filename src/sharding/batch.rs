use super::ShardManager;
use crate::error::{Error, Result};
use crate::write_batch::{BatchOperation, WriteBatch};
use crate::{Batch, KeyValueStore};
use tracing::{debug, warn};

/// Batch over a [`ShardManager`], split by shard when written.
///
/// Each shard's slice is applied atomically through that shard's own batch,
/// in shard index order. There is no atomicity across shards: if shard `k`
/// fails, the shards before it stay committed, the shards after it are never
/// touched, and the error is [`Error::PartialCommit`] listing what landed.
/// Nothing is rolled back.
pub struct ShardBatch<'a, S: KeyValueStore> {
    manager: &'a ShardManager<S>,
    batch: WriteBatch,
}

impl<'a, S: KeyValueStore> ShardBatch<'a, S> {
    pub(crate) fn new(manager: &'a ShardManager<S>) -> Self {
        Self {
            manager,
            batch: WriteBatch::new(),
        }
    }

    /// Operations grouped by target shard, keeping their recorded order.
    fn partition(&self) -> Vec<Vec<&BatchOperation>> {
        let mut per_shard = vec![Vec::new(); self.manager.shard_count()];
        for op in self.batch.operations() {
            per_shard[self.manager.shard_index(op.key())].push(op);
        }
        per_shard
    }
}

fn apply_to_shard<S: KeyValueStore>(shard: &S, ops: &[&BatchOperation]) -> Result<()> {
    let mut batch = shard.new_batch();
    for op in ops {
        match op {
            BatchOperation::Put { key, value } => batch.put(key, value)?,
            BatchOperation::Delete { key } => batch.delete(key)?,
        }
    }
    batch.write()
}

impl<S: KeyValueStore> Batch for ShardBatch<'_, S> {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.batch.put(key, value);
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.batch.delete(key);
        Ok(())
    }

    fn len(&self) -> usize {
        self.batch.len()
    }

    fn value_size(&self) -> usize {
        self.batch.size_bytes()
    }

    fn write(&self) -> Result<()> {
        let mut committed = Vec::new();
        for (index, ops) in self.partition().iter().enumerate() {
            if ops.is_empty() {
                continue;
            }
            if let Err(err) = apply_to_shard(self.manager.shard_at(index), ops) {
                warn!(
                    shard = index,
                    committed = ?committed,
                    error = %err,
                    "Batch commit failed part way, earlier shards stay committed"
                );
                return Err(Error::PartialCommit {
                    shard: index,
                    committed,
                    source: Box::new(err),
                });
            }
            committed.push(index);
        }

        debug!(
            operations = self.batch.len(),
            bytes = self.batch.size_bytes(),
            shards = committed.len(),
            "Committed sharded batch"
        );
        Ok(())
    }

    fn reset(&mut self) {
        self.batch.clear();
    }
}
