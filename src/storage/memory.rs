use crate::error::{Error, Result};
use crate::iterator::KvIterator;
use crate::storage::check_compact_range;
use crate::write_batch::{BatchOperation, WriteBatch};
use crate::{Batch, KeyRange, KeyValueStore};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Ordered in-memory store. Used for tests and as an unsharded store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        Ok(())
    }

    fn apply(&self, ops: &[BatchOperation]) -> Result<()> {
        self.ensure_open()?;
        let mut data = self.data.write();
        for op in ops {
            match op {
                BatchOperation::Put { key, value } => {
                    data.insert(key.clone(), value.clone());
                }
                BatchOperation::Delete { key } => {
                    data.remove(key);
                }
            }
        }
        Ok(())
    }
}

impl KeyValueStore for MemoryStore {
    fn has(&self, key: &[u8]) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.data.read().contains_key(key))
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.ensure_open()?;
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.ensure_open()?;
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.ensure_open()?;
        self.data.write().remove(key);
        Ok(())
    }

    fn new_batch(&self) -> Box<dyn Batch + '_> {
        Box::new(MemoryBatch {
            store: self,
            batch: WriteBatch::new(),
        })
    }

    fn iter_range(&self, range: KeyRange) -> Result<KvIterator<'_>> {
        self.ensure_open()?;
        // Snapshot so the cursor does not pin the lock.
        let data = self.data.read();
        let entries: Vec<_> = match &range {
            KeyRange::All => data
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            KeyRange::From(start) => data
                .range(start.clone()..)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            KeyRange::Prefix(prefix) => data
                .range(prefix.clone()..)
                .take_while(|(k, _)| k.starts_with(prefix))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        };
        Ok(Box::new(entries.into_iter().map(Ok::<_, Error>)))
    }

    fn stat(&self, property: &str) -> Result<String> {
        self.ensure_open()?;
        let data = self.data.read();
        match property {
            "entries" => Ok(data.len().to_string()),
            "size" => Ok(data
                .iter()
                .map(|(k, v)| k.len() + v.len())
                .sum::<usize>()
                .to_string()),
            other => Err(Error::UnknownProperty(other.to_string())),
        }
    }

    fn compact(&self, start: Option<&[u8]>, limit: Option<&[u8]>) -> Result<()> {
        self.ensure_open()?;
        check_compact_range(start, limit)
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

struct MemoryBatch<'a> {
    store: &'a MemoryStore,
    batch: WriteBatch,
}

impl Batch for MemoryBatch<'_> {
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
        self.store.apply(self.batch.operations())
    }

    fn reset(&mut self) {
        self.batch.clear();
    }
}
