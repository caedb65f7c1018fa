mod common;

use common::*;
use proptest::prelude::*;
use rand::seq::SliceRandom;
use shardkv::{route, Batch, Error, KeyValueStore, ShardManager};
use std::collections::BTreeMap;

#[test]
fn test_one_key_per_shard_in_shuffled_order() {
    // With four shards these keys land on shards 3, 1, 0 and 2.
    let mut keys = vec!["a", "b", "d", "e"];
    keys.shuffle(&mut rand::rng());

    let manager = ShardManager::in_memory(4).unwrap();
    for key in &keys {
        manager.put(key.as_bytes(), key.to_uppercase().as_bytes()).unwrap();
    }

    for shard in manager.shards() {
        assert_eq!(shard.len(), 1);
    }
    assert_eq!(manager.shard_index(b"a"), 3);
    assert_eq!(manager.shard_index(b"d"), 0);

    let items: Vec<_> = manager
        .new_iterator()
        .unwrap()
        .map(|item| item.unwrap())
        .collect();
    assert_eq!(
        items,
        vec![
            (b"a".to_vec(), b"A".to_vec()),
            (b"b".to_vec(), b"B".to_vec()),
            (b"d".to_vec(), b"D".to_vec()),
            (b"e".to_vec(), b"E".to_vec()),
        ]
    );
}

#[test]
fn test_any_insert_order_iterates_sorted() {
    let mut keys = vec!["a", "b", "c", "d"];
    let mut rng = rand::rng();
    for _ in 0..8 {
        keys.shuffle(&mut rng);
        let manager = ShardManager::in_memory(4).unwrap();
        for key in &keys {
            manager.put(key.as_bytes(), b"v").unwrap();
        }
        assert_eq!(
            collect_keys(manager.new_iterator().unwrap()),
            vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec(), b"d".to_vec()]
        );
    }
}

#[test]
fn test_sled_shards_end_to_end() {
    let (_dir, manager) = setup_sled_shards(2, 2);
    for key in ["a", "b", "c", "d"] {
        manager.put(key.as_bytes(), b"v").unwrap();
    }

    assert_eq!(
        collect_keys(manager.new_iterator().unwrap()),
        vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec(), b"d".to_vec()]
    );
    for key in ["a", "b", "c", "d"] {
        let owner = manager.shard_index(key.as_bytes());
        assert!(manager.shard(owner).unwrap().has(key.as_bytes()).unwrap());
    }

    manager.delete(b"c").unwrap();
    assert!(!manager.has(b"c").unwrap());
    assert_eq!(manager.get(b"c").unwrap(), None);
    manager.close().unwrap();
}

#[test]
fn test_start_and_prefix_ranges_span_shards() {
    let manager = ShardManager::in_memory(3).unwrap();
    for (key, value) in create_test_data(30, "blk") {
        manager.put(&key, &value).unwrap();
    }
    for (key, value) in create_test_data(5, "tx") {
        manager.put(&key, &value).unwrap();
    }

    let prefixed = collect_keys(manager.new_iterator_with_prefix(b"tx_").unwrap());
    assert_eq!(prefixed.len(), 5);
    assert!(prefixed.windows(2).all(|pair| pair[0] < pair[1]));

    let from = collect_keys(manager.new_iterator_with_start(b"blk_000025").unwrap());
    assert_eq!(from.len(), 5 + 5);
    assert_eq!(from[0], b"blk_000025".to_vec());

    assert!(collect_keys(manager.new_iterator_with_prefix(b"zzz").unwrap()).is_empty());
}

#[test]
fn test_batch_spreads_over_shards() {
    let manager = ShardManager::in_memory(4).unwrap();
    let data = create_test_data(100, "key");

    let mut batch = manager.new_batch();
    for (key, value) in &data {
        batch.put(key, value).unwrap();
    }
    batch.delete(b"key_000007").unwrap();
    assert_eq!(batch.len(), 101);
    batch.write().unwrap();

    assert_eq!(manager.get(b"key_000007").unwrap(), None);
    verify_key_value(&manager, b"key_000042", b"value_000042");
    let total: usize = manager.shards().iter().map(|shard| shard.len()).sum();
    assert_eq!(total, 99);

    batch.reset();
    assert!(batch.is_empty());
    assert_eq!(batch.value_size(), 0);
}

#[test]
fn test_batch_failure_reports_committed_shards() {
    // "d" routes to shard 0 and "a" to shard 1.
    let manager = ShardManager::from_stores(vec![FlakyStore::new(), FlakyStore::failing_writes()]).unwrap();
    let mut batch = manager.batch();
    batch.put(b"a", b"1").unwrap();
    batch.put(b"d", b"2").unwrap();

    match batch.write() {
        Err(Error::PartialCommit { shard, committed, .. }) => {
            assert_eq!(shard, 1);
            assert_eq!(committed, vec![0]);
        }
        other => panic!("expected partial commit, got {:?}", other),
    }
    assert_eq!(manager.get(b"d").unwrap(), Some(b"2".to_vec()));
    assert_eq!(manager.get(b"a").unwrap(), None);
}

#[test]
fn test_batch_failure_on_first_shard_touches_nothing_else() {
    let manager = ShardManager::from_stores(vec![FlakyStore::failing_writes(), FlakyStore::new()]).unwrap();
    let mut batch = manager.batch();
    batch.put(b"a", b"1").unwrap();
    batch.put(b"d", b"2").unwrap();

    let err = batch.write().unwrap_err();
    assert!(matches!(
        err,
        Error::PartialCommit { shard: 0, ref committed, .. } if committed.is_empty()
    ));
    assert_eq!(manager.get(b"a").unwrap(), None);

    // A batch that never reaches the failing shard commits normally.
    let mut batch = manager.batch();
    batch.put(b"a", b"1").unwrap();
    batch.write().unwrap();
    assert_eq!(manager.get(b"a").unwrap(), Some(b"1".to_vec()));
}

#[test]
fn test_compact_stops_at_first_failure() {
    let manager = ShardManager::from_stores(vec![FlakyStore::new(), FlakyStore::new(), FlakyStore::new()]).unwrap();
    manager.shards()[1]
        .fail_compact
        .store(true, std::sync::atomic::Ordering::SeqCst);

    assert!(manager.compact(None, None).is_err());
    let calls: Vec<usize> = manager.shards().iter().map(|s| s.calls.compacts()).collect();
    assert_eq!(calls, vec![1, 1, 0]);
}

#[test]
fn test_compact_rejects_inverted_range() {
    let manager = ShardManager::in_memory(2).unwrap();
    assert!(manager.compact(Some(b"b".as_slice()), Some(b"a".as_slice())).is_err());
    manager.compact(Some(b"a".as_slice()), None).unwrap();
}

#[test]
fn test_close_stops_at_first_failure() {
    let manager = ShardManager::from_stores(vec![FlakyStore::new(), FlakyStore::new(), FlakyStore::new()]).unwrap();
    manager.shards()[1]
        .fail_close
        .store(true, std::sync::atomic::Ordering::SeqCst);

    assert!(manager.close().is_err());
    assert!(manager.shards()[0].inner.is_closed());
    assert!(!manager.shards()[2].inner.is_closed());
    assert_eq!(manager.shards()[2].calls.closes(), 0);
}

#[test]
fn test_closed_shards_reject_operations() {
    let manager = ShardManager::in_memory(2).unwrap();
    manager.close().unwrap();
    assert!(matches!(manager.get(b"a"), Err(Error::Closed)));
    assert!(manager.new_iterator().is_err());
}

proptest! {
    #[test]
    fn prop_merged_iteration_is_sorted_and_complete(
        entries in prop::collection::btree_map(
            prop::collection::vec(any::<u8>(), 1..8),
            prop::collection::vec(any::<u8>(), 0..8),
            0..64,
        ),
        shard_count in 1usize..6,
    ) {
        let manager = ShardManager::in_memory(shard_count).unwrap();
        for (key, value) in &entries {
            manager.put(key, value).unwrap();
        }

        let merged: BTreeMap<Vec<u8>, Vec<u8>> = manager
            .new_iterator()
            .unwrap()
            .map(|item| item.unwrap())
            .collect();
        prop_assert_eq!(&merged, &entries);

        let keys = collect_keys(manager.new_iterator().unwrap());
        prop_assert!(keys.windows(2).all(|pair| pair[0] < pair[1]));
        for key in entries.keys() {
            let owner = route(key, shard_count);
            prop_assert!(manager.shard(owner).unwrap().has(key).unwrap());
        }
    }
}
