use crate::config::ShardConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const LAYOUT_FILE: &str = "SHARDS.json";

/// Shard layout persisted next to the shard directories.
///
/// The router is only stable for a fixed shard count, so reopening with a
/// different layout would silently lose every key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardLayout {
    pub disk_groups: usize,
    pub shards_per_group: usize,
}

impl ShardLayout {
    pub fn from_config(config: &ShardConfig) -> Self {
        Self {
            disk_groups: config.disk_groups,
            shards_per_group: config.shards_per_group,
        }
    }

    pub fn shard_count(&self) -> usize {
        self.disk_groups * self.shards_per_group
    }

    /// Directory of every shard, in shard index order.
    pub fn shard_paths(&self, root: &Path) -> Vec<PathBuf> {
        (0..self.disk_groups)
            .flat_map(|group| (0..self.shards_per_group).map(move |slot| (group, slot)))
            .map(|(group, slot)| shard_path(root, group, slot))
            .collect()
    }

    /// Records the layout on first open and rejects a different one afterwards.
    pub fn check_or_persist(&self, root: &Path) -> Result<()> {
        let path = root.join(LAYOUT_FILE);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            let on_disk: ShardLayout = serde_json::from_str(&contents)?;
            if on_disk != *self {
                return Err(Error::LayoutMismatch {
                    on_disk: on_disk.to_string(),
                    requested: self.to_string(),
                });
            }
            return Ok(());
        }

        std::fs::create_dir_all(root)?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        Ok(())
    }
}

impl std::fmt::Display for ShardLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.disk_groups, self.shards_per_group)
    }
}

/// `root/diskGG/blockSS`, one directory per disk group and one per shard inside it.
pub fn shard_path(root: &Path, group: usize, slot: usize) -> PathBuf {
    root.join(format!("disk{:02}", group))
        .join(format!("block{:02}", slot))
}
