use super::*;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

fn raw_hash<K: Hash>(key: &K) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

/// Checks the structural invariants: directory length matches the global
/// depth, local depths never exceed it, slots sharing a bucket agree on the
/// bucket's low bits, and every stored key hashes into its bucket.
fn check_invariants<K, V>(table: &ExtendibleHashTable<K, V>)
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    assert_eq!(table.directory.len(), 1 << table.global_depth);

    for slot in 0..table.directory.len() {
        let bucket = &table.buckets[table.directory[slot]];
        assert!(bucket.local_depth <= table.global_depth);

        let mask = (1 << bucket.local_depth) - 1;
        for other in 0..table.directory.len() {
            let same_bucket = table.directory[other] == table.directory[slot];
            assert_eq!(same_bucket, other & mask == slot & mask);
        }
        for (key, _) in &bucket.items {
            assert_eq!(raw_hash(key) as usize & mask, slot & mask);
        }
        assert!(bucket.items.len() <= table.bucket_size);
    }
}

#[test]
fn test_starts_with_two_buckets() {
    let table: ExtendibleHashTable<i32, i32> = ExtendibleHashTable::new(4);
    assert_eq!(table.global_depth(), 1);
    assert_eq!(table.num_buckets(), 2);
    assert_eq!(table.local_depth(0), 1);
    assert_eq!(table.local_depth(1), 1);
    assert!(table.is_empty());
}

#[test]
fn test_find_insert_remove() {
    let mut table = ExtendibleHashTable::new(4);
    assert_eq!(table.find(&1), None);

    table.insert(1, "a");
    table.insert(2, "b");
    assert_eq!(table.find(&1), Some("a"));
    assert_eq!(table.find(&2), Some("b"));

    assert!(table.remove(&1));
    assert!(!table.remove(&1));
    assert_eq!(table.find(&1), None);
    assert_eq!(table.len(), 1);
}

#[test]
fn test_insert_overwrites_existing_key() {
    let mut table = ExtendibleHashTable::new(2);
    table.insert(5, 50);
    table.insert(5, 51);
    assert_eq!(table.find(&5), Some(51));
    assert_eq!(table.len(), 1);
}

#[test]
fn test_directory_grows_under_load() {
    let mut table = ExtendibleHashTable::new(2);
    for key in 0..64 {
        table.insert(key, key * 10);
        check_invariants(&table);
    }
    assert!(table.global_depth() > 1);
    assert!(table.num_buckets() > 2);
    for key in 0..64 {
        assert_eq!(table.find(&key), Some(key * 10));
    }
}

#[test]
fn test_recursive_split_on_skewed_keys() {
    // Keys sharing long low-bit runs of their hash force the same bucket to
    // split repeatedly before the pending pair fits.
    let mut table = ExtendibleHashTable::new(1);
    let mut chosen = Vec::new();
    let mut candidate: u64 = 0;
    while chosen.len() < 8 {
        if raw_hash(&candidate) & 0b111 == 0b101 {
            chosen.push(candidate);
        }
        candidate += 1;
    }
    for &key in &chosen {
        table.insert(key, key);
        check_invariants(&table);
    }
    for &key in &chosen {
        assert_eq!(table.find(&key), Some(key));
    }
    assert!(table.global_depth() >= 4);
}

#[test]
fn test_matches_std_hashmap_under_random_workload() {
    use rand::prelude::*;
    use rand_chacha::ChaCha8Rng;

    let mut rng = ChaCha8Rng::seed_from_u64(0xfe11);
    let mut table = ExtendibleHashTable::new(4);
    let mut model: HashMap<u32, u32> = HashMap::new();

    for round in 0..2000 {
        let key = rng.gen_range(0..500);
        if rng.gen_bool(0.7) {
            table.insert(key, round);
            model.insert(key, round);
        } else {
            assert_eq!(table.remove(&key), model.remove(&key).is_some());
        }
        if round % 64 == 0 {
            check_invariants(&table);
        }
    }

    check_invariants(&table);
    assert_eq!(table.len(), model.len());
    for (key, value) in &model {
        assert_eq!(table.find(key), Some(*value));
    }
}
