//! 状态索引的集合语义、结构共享与遍历.

use std::collections::HashSet;

use pn_verify::ptrie::{EncodedKey, IndexError, KeyCollector, KeyMatcher, StateIndex, traverse};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

fn bits(text: &str) -> EncodedKey {
    EncodedKey::parse_bits(text).unwrap()
}

/// 长度与取值都不规则的键, 含互为前缀的键.
fn ragged_keys(n: u32) -> Vec<EncodedKey> {
    (0..n)
        .map(|i| {
            let mut key = EncodedKey::new();
            for b in 0..(i % 23) {
                key.push_bit((i.wrapping_mul(2654435761) >> (b % 32)) & 1 == 1);
            }
            key
        })
        .collect()
}

#[test]
fn scenario_101_100_101() {
    let mut index = StateIndex::new();
    assert!(!index.insert_or_find(&bits("101")).unwrap().already_present);
    assert!(!index.insert_or_find(&bits("100")).unwrap().already_present);
    let again = index.insert_or_find(&bits("101")).unwrap();
    assert!(again.already_present);
    assert_eq!(index.len(), 2);
    assert_eq!(index.key(again.id), Some(bits("101")));
}

#[test]
fn each_distinct_key_is_new_exactly_once_in_any_order() {
    let keys = ragged_keys(600);
    let distinct: HashSet<EncodedKey> = keys.iter().cloned().collect();

    for seed in [1, 2, 3] {
        let mut order = keys.clone();
        order.extend(keys.iter().cloned());
        order.shuffle(&mut StdRng::seed_from_u64(seed));

        let mut index = StateIndex::new().with_split_threshold(3);
        let mut fresh = HashSet::new();
        for key in &order {
            let lookup = index.insert_or_find(key).unwrap();
            assert_eq!(lookup.already_present, !fresh.insert(key.clone()));
        }
        assert_eq!(fresh, distinct);
        assert_eq!(index.len(), distinct.len());
        index.check_consistency().unwrap();
    }
}

#[test]
fn ids_are_stable_and_reconstruct_keys() {
    let mut index = StateIndex::new().with_split_threshold(2);
    let keys = ragged_keys(300);
    let mut ids = Vec::new();
    for key in &keys {
        ids.push(index.insert_or_find(key).unwrap().id);
    }
    for (key, id) in keys.iter().zip(&ids) {
        assert_eq!(index.find(key).unwrap(), Some(*id));
        assert_eq!(index.key(*id).as_ref(), Some(key));
    }
}

#[test]
fn shared_prefix_walks_the_same_nodes() {
    let mut index = StateIndex::new().with_split_threshold(1);
    let a = bits("1100101011110000");
    let b = bits("1100101011111111");
    for filler in ragged_keys(200) {
        index.insert_or_find(&filler).unwrap();
    }
    index.insert_or_find(&a).unwrap();
    index.insert_or_find(&b).unwrap();

    // 等长键的帧头相同, 再加上 12 位公共前缀
    let common = 32 + 12;
    let pa = index.path(&a).unwrap();
    let pb = index.path(&b).unwrap();
    for (depth, (na, nb)) in pa.iter().zip(&pb).enumerate() {
        if depth > common {
            break;
        }
        assert_eq!(na, nb, "paths diverge at depth {depth}");
    }
    assert!(index.node_count() > 1);
}

#[test]
fn collector_enumerates_every_key() {
    let mut index = StateIndex::new().with_split_threshold(4);
    let keys = ragged_keys(250);
    for key in &keys {
        index.insert_or_find(key).unwrap();
    }
    let mut collector = KeyCollector::new();
    traverse(&index, &mut collector).unwrap();

    let collected: HashSet<EncodedKey> = collector.keys.iter().map(|(_, k)| k.clone()).collect();
    let expected: HashSet<EncodedKey> = keys.into_iter().collect();
    assert_eq!(collected, expected);
    for (id, key) in &collector.keys {
        assert_eq!(index.find(key).unwrap(), Some(*id));
    }
}

#[test]
fn collector_limit_surfaces_as_allocation_failure() {
    let mut index = StateIndex::new();
    for key in ragged_keys(20) {
        index.insert_or_find(&key).unwrap();
    }
    let mut collector = KeyCollector::with_limit(5);
    assert_eq!(
        traverse(&index, &mut collector),
        Err(IndexError::AllocationFailure { resource: "visitor" })
    );
    assert_eq!(collector.keys.len(), 5);
}

#[test]
fn matcher_finds_present_keys_only() {
    let mut index = StateIndex::new().with_split_threshold(2);
    for key in ragged_keys(200) {
        index.insert_or_find(&key).unwrap();
    }
    let target = bits("10110");
    let id = index.insert_or_find(&target).unwrap().id;

    let mut matcher = KeyMatcher::new(&target).unwrap();
    traverse(&index, &mut matcher).unwrap();
    assert_eq!(matcher.found, Some(id));

    let mut absent = KeyMatcher::new(&bits("1111111111111111111111111")).unwrap();
    traverse(&index, &mut absent).unwrap();
    assert_eq!(absent.found, None);
}
