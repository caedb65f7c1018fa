use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Key of the chain head pointer. It changes with every block, so it is
/// never served from cache by default.
pub const HEAD_POINTER_KEY: &str = "LastBlock";

/// Tuning applied to every backing store the shard manager opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Page cache of each store, in bytes.
    pub cache_capacity: u64,
    /// Background flush interval. `None` flushes only on close or explicit compaction.
    pub flush_every_ms: Option<u64>,
    /// Favour write throughput over disk space.
    pub high_throughput: bool,
    /// Delete the store's files when it is dropped. Used by tests.
    pub temporary: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 64 << 20,
            flush_every_ms: Some(500),
            high_throughput: true,
            temporary: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardConfig {
    pub disk_groups: usize,
    pub shards_per_group: usize,
    pub store: StoreConfig,
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self {
            disk_groups: 1,
            shards_per_group: 8,
            store: StoreConfig::default(),
        }
    }
}

impl ShardConfig {
    pub fn new(disk_groups: usize, shards_per_group: usize) -> Self {
        Self {
            disk_groups,
            shards_per_group,
            ..Default::default()
        }
    }

    pub fn shard_count(&self) -> usize {
        self.disk_groups * self.shards_per_group
    }

    pub fn validate(&self) -> Result<()> {
        if self.disk_groups == 0 || self.shards_per_group == 0 {
            return Err(Error::Config(format!(
                "shard layout needs at least one shard, got {} disk groups x {} shards",
                self.disk_groups, self.shards_per_group
            )));
        }
        if self.disk_groups > 100 || self.shards_per_group > 100 {
            return Err(Error::Config(
                "disk groups and shards per group are limited to two digits".to_string(),
            ));
        }
        Ok(())
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Lifetime of a cached entry.
    pub ttl: Duration,
    pub max_entries: usize,
    /// Upper bound on cached key and value bytes.
    pub max_bytes: usize,
    /// Keys that are always read from the wrapped store.
    pub excluded_keys: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(10 * 60),
            max_entries: 2000 * 10 * 60,
            max_bytes: 512 << 20,
            excluded_keys: vec![HEAD_POINTER_KEY.to_string()],
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_entries == 0 || self.max_bytes == 0 {
            return Err(Error::Config(
                "cache bounds must be greater than zero".to_string(),
            ));
        }
        if self.ttl.is_zero() {
            return Err(Error::Config("cache ttl must be greater than zero".to_string()));
        }
        Ok(())
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }
}
