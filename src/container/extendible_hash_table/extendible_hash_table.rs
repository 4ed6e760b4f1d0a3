use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// An in-memory extendible hash table with map semantics.
///
/// The directory has `2^global_depth` slots, each holding the index of a
/// bucket in the bucket arena. A bucket with local depth `l` owns every
/// directory slot whose low `l` bits match; splitting a full bucket bumps
/// its local depth, doubling the directory first when the local depth would
/// exceed the global one. Keys are unique; inserting an existing key
/// overwrites its value. The directory never shrinks.
///
/// The buffer pool uses this as its page table (`PageId -> FrameId`).
#[derive(Debug)]
pub struct ExtendibleHashTable<K, V> {
    pub(crate) global_depth: usize,
    pub(crate) bucket_size: usize,
    /// Directory slot -> index into `buckets`.
    pub(crate) directory: Vec<usize>,
    pub(crate) buckets: Vec<Bucket<K, V>>,
}

#[derive(Debug)]
pub(crate) struct Bucket<K, V> {
    pub(crate) local_depth: usize,
    pub(crate) items: Vec<(K, V)>,
}

impl<K, V> Bucket<K, V> {
    fn new(local_depth: usize) -> Self {
        Self {
            local_depth,
            items: Vec::new(),
        }
    }
}

impl<K, V> ExtendibleHashTable<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Starts with global depth 1: a two-slot directory over two empty
    /// buckets of local depth 1.
    pub fn new(bucket_size: usize) -> Self {
        assert!(bucket_size > 0, "bucket size must be positive");
        Self {
            global_depth: 1,
            bucket_size,
            directory: vec![0, 1],
            buckets: vec![Bucket::new(1), Bucket::new(1)],
        }
    }

    fn hash_key(&self, key: &K) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) & ((1 << self.global_depth) - 1)
    }

    pub fn find(&self, key: &K) -> Option<V> {
        let bucket = &self.buckets[self.directory[self.hash_key(key)]];
        bucket
            .items
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    /// # Returns
    /// - `true` if the key was present and its entry was removed
    pub fn remove(&mut self, key: &K) -> bool {
        let bucket_index = self.directory[self.hash_key(key)];
        let bucket = &mut self.buckets[bucket_index];
        match bucket.items.iter().position(|(k, _)| k == key) {
            Some(index) => {
                bucket.items.swap_remove(index);
                true
            }
            None => false,
        }
    }

    /// Inserts or overwrites. Splits the target bucket as often as needed
    /// until the pair fits; insertion itself never fails.
    pub fn insert(&mut self, key: K, value: V) {
        loop {
            let bucket_index = self.directory[self.hash_key(&key)];
            let bucket = &mut self.buckets[bucket_index];
            if let Some((_, slot)) = bucket.items.iter_mut().find(|(k, _)| *k == key) {
                *slot = value;
                return;
            }
            if bucket.items.len() < self.bucket_size {
                bucket.items.push((key, value));
                return;
            }
            self.split_bucket(bucket_index);
        }
    }

    /// Splits the full bucket at `bucket_index`: raises its local depth,
    /// doubles the directory if that depth now exceeds the global depth,
    /// points the slots whose bit `local_depth - 1` is set at a fresh pair
    /// bucket, and rehashes the spilled entries.
    fn split_bucket(&mut self, bucket_index: usize) {
        let old_depth = self.buckets[bucket_index].local_depth;
        if old_depth == self.global_depth {
            // Each new slot mirrors its twin in the lower half.
            self.directory.extend_from_within(..);
            self.global_depth += 1;
        }
        let new_depth = old_depth + 1;
        self.buckets[bucket_index].local_depth = new_depth;

        let pair_index = self.buckets.len();
        self.buckets.push(Bucket::new(new_depth));
        for slot in 0..self.directory.len() {
            if self.directory[slot] == bucket_index && (slot >> old_depth) & 1 == 1 {
                self.directory[slot] = pair_index;
            }
        }

        let spilled = std::mem::take(&mut self.buckets[bucket_index].items);
        for (key, value) in spilled {
            let target = self.directory[self.hash_key(&key)];
            self.buckets[target].items.push((key, value));
        }
    }

    pub fn global_depth(&self) -> usize {
        self.global_depth
    }

    /// Local depth of the bucket referenced by directory slot
    /// `directory_index`.
    pub fn local_depth(&self, directory_index: usize) -> usize {
        self.buckets[self.directory[directory_index]].local_depth
    }

    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(|bucket| bucket.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.buckets
            .iter()
            .flat_map(|bucket| bucket.items.iter().map(|(k, v)| (k, v)))
    }
}
