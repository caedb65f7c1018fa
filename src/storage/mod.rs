//! Single backing stores. Each shard owns exactly one of these.

pub mod memory;
pub mod sled_store;

pub use memory::MemoryStore;
pub use sled_store::SledStore;

use crate::error::{Error, Result};

/// Rejects compaction ranges whose start sorts after their limit.
pub(crate) fn check_compact_range(start: Option<&[u8]>, limit: Option<&[u8]>) -> Result<()> {
    if let (Some(start), Some(limit)) = (start, limit) {
        if start > limit {
            return Err(Error::Storage(format!(
                "compaction start {:?} sorts after limit {:?}",
                start, limit
            )));
        }
    }
    Ok(())
}
