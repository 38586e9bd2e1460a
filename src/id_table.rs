//! An open-addressing table mapping external identifiers to internal indices.
//!
//! Collisions are resolved by double hashing over a prime number of buckets: the probe sequence
//! for a key starts at `h1(key)` and advances by `h2(key)`, where `1 <= h2 < capacity`. Because the
//! capacity is prime, every step size is coprime with it and the sequence visits every bucket.
//!
//! Removal leaves a tombstone so that probe sequences passing through the bucket stay intact.
//! Tombstones are reused by later inserts and dropped whenever the table is rehashed.

use core::{
    hash::{Hash, Hasher},
    mem,
};

use rustc_hash::FxHasher;

use crate::Result;

const INITIAL_CAPACITY: usize = 11;

// Rehash once (live + tombstones) would exceed LOAD_NUM / LOAD_DEN of the buckets.
const LOAD_NUM: usize = 7;
const LOAD_DEN: usize = 10;

enum Bucket<K, V> {
    Empty,
    Occupied(K, V),
    Deleted,
}

/// A double-hashing map from small copyable identifiers to values.
pub struct IdTable<K, V> {
    buckets: Vec<Bucket<K, V>>,
    len: usize,
    tombstones: usize,
}

impl<K: Copy + Eq + Hash, V> IdTable<K, V> {
    /// Creates an empty table. No storage is allocated until the first insert.
    pub const fn new() -> Self {
        IdTable {
            buckets: Vec::new(),
            len: 0,
            tombstones: 0,
        }
    }

    /// Creates an empty table with at least `capacity` buckets.
    ///
    /// The bucket count is rounded up to a prime no smaller than the default of 11.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let mut table = Self::new();
        table.buckets = empty_buckets(next_prime(capacity.max(INITIAL_CAPACITY)))?;
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of buckets.
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Associates `value` with `key`, returning the value previously associated with it.
    ///
    /// Fails with [`Error::AllocationFailure`](crate::Error::AllocationFailure) if the table had
    /// to grow and could not; the table is unchanged in that case.
    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>> {
        if let Some(pos) = self.position(&key) {
            if let Bucket::Occupied(_, old) = &mut self.buckets[pos] {
                return Ok(Some(mem::replace(old, value)));
            }
        }

        if (self.len + self.tombstones + 1) * LOAD_DEN > self.buckets.len() * LOAD_NUM {
            self.rehash()?;
        }

        let pos = self.vacant_position(&key);
        if let Bucket::Deleted = self.buckets[pos] {
            self.tombstones -= 1;
        }

        self.buckets[pos] = Bucket::Occupied(key, value);
        self.len += 1;

        Ok(None)
    }

    /// Returns the value associated with `key`.
    pub fn find(&self, key: &K) -> Option<&V> {
        match &self.buckets[self.position(key)?] {
            Bucket::Occupied(_, value) => Some(value),
            _ => None,
        }
    }

    /// Removes `key` from the table, returning its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let pos = self.position(key)?;

        match mem::replace(&mut self.buckets[pos], Bucket::Deleted) {
            Bucket::Occupied(_, value) => {
                self.len -= 1;
                self.tombstones += 1;
                Some(value)
            }
            other => {
                self.buckets[pos] = other;
                None
            }
        }
    }

    fn probe(&self, key: &K) -> impl Iterator<Item = usize> {
        let capacity = self.buckets.len();
        let hash = hash_of(key);

        let (start, step) = if capacity < 2 {
            (0, 1)
        } else {
            let low = hash & u64::from(u32::MAX);
            let high = hash >> 32;
            (
                (low % capacity as u64) as usize,
                1 + (high % (capacity as u64 - 1)) as usize,
            )
        };

        (0..capacity).map(move |i| (start + i * step) % capacity)
    }

    // Returns the bucket holding `key`, if any.
    fn position(&self, key: &K) -> Option<usize> {
        for pos in self.probe(key) {
            match &self.buckets[pos] {
                Bucket::Empty => return None,
                Bucket::Occupied(k, _) if k == key => return Some(pos),
                _ => {}
            }
        }

        None
    }

    // Returns the first bucket on `key`'s probe sequence that can take a new entry.
    //
    // The load factor guarantees that at least one bucket is empty, so the probe always ends.
    fn vacant_position(&self, key: &K) -> usize {
        self.probe(key)
            .find(|&pos| !matches!(self.buckets[pos], Bucket::Occupied(..)))
            .expect("load factor keeps an empty bucket")
    }

    fn rehash(&mut self) -> Result<()> {
        let capacity = self.buckets.len();
        let new_capacity = if capacity == 0 {
            INITIAL_CAPACITY
        } else if self.len * 2 <= capacity {
            // Mostly tombstones; clearing them is enough.
            capacity
        } else {
            next_prime(capacity * 2)
        };

        let old = mem::replace(&mut self.buckets, empty_buckets(new_capacity)?);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            from = capacity,
            to = new_capacity,
            len = self.len,
            tombstones = self.tombstones,
            "rehashed identifier table"
        );

        self.tombstones = 0;

        for bucket in old {
            if let Bucket::Occupied(key, value) = bucket {
                let pos = self.vacant_position(&key);
                self.buckets[pos] = Bucket::Occupied(key, value);
            }
        }

        Ok(())
    }
}

impl<K: Copy + Eq + Hash, V> Default for IdTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

fn hash_of<K: Hash>(key: &K) -> u64 {
    let mut hasher = FxHasher::default();
    key.hash(&mut hasher);
    hasher.finish()
}

fn empty_buckets<K, V>(capacity: usize) -> Result<Vec<Bucket<K, V>>> {
    let mut buckets = Vec::new();
    buckets.try_reserve_exact(capacity)?;
    buckets.resize_with(capacity, || Bucket::Empty);
    Ok(buckets)
}

fn is_prime(n: usize) -> bool {
    if n < 2 {
        return false;
    }

    let mut d = 2;
    while d * d <= n {
        if n % d == 0 {
            return false;
        }
        d += 1;
    }

    true
}

fn next_prime(mut n: usize) -> usize {
    while !is_prime(n) {
        n += 1;
    }
    n
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use proptest::prelude::*;

    use super::*;

    #[test]
    fn primes() {
        assert_eq!(next_prime(0), 2);
        assert_eq!(next_prime(11), 11);
        assert_eq!(next_prime(22), 23);
        assert_eq!(next_prime(46), 47);
        assert!(!is_prime(91));
    }

    #[test]
    fn insert_find_remove() {
        let mut table = IdTable::new();
        assert_eq!(table.capacity(), 0);
        assert_eq!(table.find(&1), None);
        assert_eq!(table.remove(&1), None);

        assert_eq!(table.insert(1, "one"), Ok(None));
        assert_eq!(table.insert(2, "two"), Ok(None));
        assert_eq!(table.capacity(), 11);

        assert_eq!(table.insert(1, "uno"), Ok(Some("one")));
        assert_eq!(table.len(), 2);
        assert_eq!(table.find(&1), Some(&"uno"));

        assert_eq!(table.remove(&1), Some("uno"));
        assert_eq!(table.remove(&1), None);
        assert_eq!(table.find(&1), None);
        assert_eq!(table.find(&2), Some(&"two"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn grows_through_primes() {
        let mut table = IdTable::new();
        let mut capacities = vec![];

        for id in 0..40 {
            table.insert(id, id * 10).unwrap();
            if capacities.last() != Some(&table.capacity()) {
                capacities.push(table.capacity());
            }
        }

        assert_eq!(capacities, [11, 23, 47, 97]);
        for id in 0..40 {
            assert_eq!(table.find(&id), Some(&(id * 10)));
        }
    }

    #[test]
    fn churn_reuses_capacity() {
        let mut table = IdTable::with_capacity(0).unwrap();
        for id in 0..5 {
            table.insert(id, ()).unwrap();
        }

        for id in 0..1000 {
            assert_eq!(table.remove(&id), Some(()));
            assert_eq!(table.insert(id + 5, ()), Ok(None));
        }

        assert_eq!(table.len(), 5);
        assert_eq!(table.capacity(), 11);
        assert!((1000..1005).all(|id| table.find(&id).is_some()));
    }

    #[derive(Clone, Debug)]
    enum TableOp {
        Insert(i32, u16),
        Find(i32),
        Remove(i32),
    }

    fn table_op_strategy() -> impl Strategy<Value = TableOp> {
        // A narrow key range makes hits, overwrites and tombstone reuse common.
        prop_oneof![
            (-20i32..60, any::<u16>()).prop_map(|(k, v)| TableOp::Insert(k, v)),
            (-20i32..60).prop_map(TableOp::Find),
            (-20i32..60).prop_map(TableOp::Remove),
        ]
    }

    proptest! {
        #[test]
        fn behaves_like_hashmap(ops in proptest::collection::vec(table_op_strategy(), 0..500)) {
            let mut table = IdTable::new();
            let mut model = HashMap::new();

            for op in ops {
                match op {
                    TableOp::Insert(k, v) => {
                        prop_assert_eq!(table.insert(k, v), Ok(model.insert(k, v)));
                    }
                    TableOp::Find(k) => prop_assert_eq!(table.find(&k), model.get(&k)),
                    TableOp::Remove(k) => prop_assert_eq!(table.remove(&k), model.remove(&k)),
                }

                prop_assert_eq!(table.len(), model.len());
                prop_assert!(table.len() * 10 <= table.capacity() * 7);
            }
        }
    }
}
