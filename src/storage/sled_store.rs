use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::iterator::KvIterator;
use crate::storage::check_compact_range;
use crate::write_batch::{BatchOperation, WriteBatch};
use crate::{Batch, KeyRange, KeyValueStore};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// On-disk store backed by one sled database.
///
/// `close` flushes and drops the database handle, releasing its file lock;
/// any later call fails with [`Error::Closed`].
pub struct SledStore {
    db: RwLock<Option<sled::Db>>,
    path: PathBuf,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P, config: &StoreConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mode = if config.high_throughput {
            sled::Mode::HighThroughput
        } else {
            sled::Mode::LowSpace
        };
        let db = sled::Config::default()
            .path(&path)
            .cache_capacity(config.cache_capacity)
            .flush_every_ms(config.flush_every_ms)
            .mode(mode)
            .temporary(config.temporary)
            .open()?;
        debug!(path = %path.display(), recovered = db.was_recovered(), "Opened backing store");

        Ok(Self {
            db: RwLock::new(Some(db)),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_db<T>(&self, f: impl FnOnce(&sled::Db) -> Result<T>) -> Result<T> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(Error::Closed)?;
        f(db)
    }
}

impl KeyValueStore for SledStore {
    fn has(&self, key: &[u8]) -> Result<bool> {
        self.with_db(|db| Ok(db.contains_key(key)?))
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.with_db(|db| Ok(db.get(key)?.map(|v| v.to_vec())))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.with_db(|db| {
            db.insert(key, value)?;
            Ok(())
        })
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.with_db(|db| {
            db.remove(key)?;
            Ok(())
        })
    }

    fn new_batch(&self) -> Box<dyn Batch + '_> {
        Box::new(SledBatch {
            store: self,
            batch: WriteBatch::new(),
        })
    }

    fn iter_range(&self, range: KeyRange) -> Result<KvIterator<'_>> {
        let iter = self.with_db(|db| {
            Ok(match range {
                KeyRange::All => db.iter(),
                KeyRange::From(start) => db.range(start..),
                KeyRange::Prefix(prefix) => db.scan_prefix(prefix),
            })
        })?;
        Ok(Box::new(iter.map(|item| {
            item.map(|(k, v)| (k.to_vec(), v.to_vec()))
                .map_err(Error::from)
        })))
    }

    fn stat(&self, property: &str) -> Result<String> {
        self.with_db(|db| match property {
            "entries" => Ok(db.len().to_string()),
            "size_on_disk" => Ok(db.size_on_disk()?.to_string()),
            "checksum" => Ok(format!("{:08x}", db.checksum()?)),
            "recovered" => Ok(db.was_recovered().to_string()),
            other => Err(Error::UnknownProperty(other.to_string())),
        })
    }

    // sled merges and rewrites segments on its own; an explicit compaction
    // only makes the range durable.
    fn compact(&self, start: Option<&[u8]>, limit: Option<&[u8]>) -> Result<()> {
        check_compact_range(start, limit)?;
        self.with_db(|db| {
            let flushed = db.flush()?;
            debug!(path = %self.path.display(), flushed, "Compacted backing store");
            Ok(())
        })
    }

    fn close(&self) -> Result<()> {
        let mut guard = self.db.write();
        if let Some(db) = guard.as_ref() {
            db.flush()?;
        }
        if guard.take().is_some() {
            info!(path = %self.path.display(), "Closed backing store");
        }
        Ok(())
    }
}

struct SledBatch<'a> {
    store: &'a SledStore,
    batch: WriteBatch,
}

impl Batch for SledBatch<'_> {
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
        let mut batch = sled::Batch::default();
        for op in self.batch.operations() {
            match op {
                BatchOperation::Put { key, value } => batch.insert(key.as_slice(), value.as_slice()),
                BatchOperation::Delete { key } => batch.remove(key.as_slice()),
            }
        }
        self.store.with_db(|db| {
            db.apply_batch(batch)?;
            Ok(())
        })
    }

    fn reset(&mut self) {
        self.batch.clear();
    }
}
