/// Maps a key to its shard: CRC-32 (IEEE) of the key bytes modulo `shard_count`.
///
/// Stable across processes and restarts for a fixed shard count. Changing the
/// shard count moves almost every key, so it requires a full re-partition.
/// `shard_count` must be non-zero; [`super::ShardManager`] guarantees this.
pub fn route(key: &[u8], shard_count: usize) -> usize {
    debug_assert!(shard_count > 0, "routing needs at least one shard");
    (crc32fast::hash(key) % shard_count as u32) as usize
}
