//! Open-addressing hash table with linear probing.
//!
//! All entries live directly in one slot vector. Collisions are resolved by
//! stepping forward one slot at a time with wraparound. Removal leaves a
//! tombstone in place so that probe chains running through the slot stay
//! intact; tombstones are reused by later inserts and dropped entirely when
//! the table grows.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{BuildHasher, BuildHasherDefault, Hash};
use thiserror::Error;
use tracing::debug;

/// Maximum ratio of live entries to capacity before the table grows.
pub const MAX_LOAD_FACTOR: f64 = 0.7;

/// Capacity allocated on first growth, and the floor for every later one.
pub const MIN_CAPACITY: usize = 16;

/// Deterministic hasher used when no other is supplied.
pub type DefaultBuildHasher = BuildHasherDefault<DefaultHasher>;

/// Errors raised by the table itself.
///
/// Ordinary misses are never errors; this only covers broken internal
/// invariants.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    /// A full probe found neither an empty slot nor a tombstone.
    #[error("hash table exhausted: no free slot among {capacity} slots ({size} live entries)")]
    Exhausted { capacity: usize, size: usize },
}

#[derive(Debug)]
enum Slot<K, V> {
    /// Never written since the slot vector was allocated.
    Empty,
    Live { key: K, value: V },
    /// Logically removed; the value has already been dropped.
    Tombstone,
}

/// Exact-match key/value storage using open addressing.
pub struct OpenAddressingMap<K, V, S = DefaultBuildHasher> {
    slots: Vec<Slot<K, V>>,
    size: usize,
    hasher: S,
}

impl<K, V> OpenAddressingMap<K, V, DefaultBuildHasher> {
    /// Create an unsized table. The first insert allocates `MIN_CAPACITY` slots.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a table with exactly `capacity` empty slots.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, DefaultBuildHasher::default())
    }
}

impl<K, V, S> OpenAddressingMap<K, V, S> {
    /// Create a table with `capacity` empty slots and a custom hasher.
    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self {
            slots: empty_slots(capacity),
            size: 0,
            hasher,
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Current number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of tombstoned slots awaiting the next growth.
    pub fn tombstones(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Tombstone))
            .count()
    }

    /// Iterate over live entries in slot order.
    ///
    /// The order is unrelated to insertion order and changes on growth.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            slots: self.slots.iter(),
        }
    }
}

impl<K, V, S> OpenAddressingMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Insert a new entry.
    ///
    /// Returns `Ok(false)` without touching the table contents if a live entry
    /// with an equal key already exists. The first tombstone met during the
    /// probe is reused in preference to the empty slot that ends it.
    ///
    /// The table grows before probing once it is at the load limit, and again
    /// after the write if the new entry pushed it past the limit, so
    /// `len() <= capacity() * MAX_LOAD_FACTOR` holds whenever this returns `Ok`.
    pub fn insert(&mut self, key: K, value: V) -> Result<bool, TableError> {
        if self.needs_growth() {
            self.rehash();
        }

        let capacity = self.slots.len();
        let start = home_slot(&self.hasher, &key, capacity);
        let mut first_tombstone = None;
        let mut first_empty = None;

        for step in 0..capacity {
            let index = (start + step) % capacity;
            match &self.slots[index] {
                Slot::Live { key: existing, .. } if *existing == key => return Ok(false),
                Slot::Live { .. } => {}
                Slot::Tombstone if first_tombstone.is_none() => first_tombstone = Some(index),
                Slot::Tombstone => {}
                Slot::Empty => {
                    first_empty = Some(index);
                    break;
                }
            }
        }

        // A probe that wrapped the whole table has already ruled out a
        // duplicate, so a tombstone seen along the way is still usable.
        let Some(index) = first_tombstone.or(first_empty) else {
            return Err(TableError::Exhausted {
                capacity,
                size: self.size,
            });
        };

        self.slots[index] = Slot::Live { key, value };
        self.size += 1;

        if self.over_load_limit() {
            self.rehash();
        }
        Ok(true)
    }

    /// Look up the value stored under `key`.
    pub fn find(&self, key: &K) -> Option<&V> {
        let index = self.locate(key)?;
        match &self.slots[index] {
            Slot::Live { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Look up the value stored under `key` for in-place modification.
    pub fn find_mut(&mut self, key: &K) -> Option<&mut V> {
        let index = self.locate(key)?;
        match &mut self.slots[index] {
            Slot::Live { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.locate(key).is_some()
    }

    /// Remove the entry stored under `key`, leaving a tombstone behind.
    pub fn remove(&mut self, key: &K) -> bool {
        match self.locate(key) {
            Some(index) => {
                self.slots[index] = Slot::Tombstone;
                self.size -= 1;
                true
            }
            None => false,
        }
    }

    /// Probe for the slot holding `key`.
    ///
    /// Tombstones are stepped over; only a never-written slot or a full lap
    /// ends the search unsuccessfully.
    fn locate(&self, key: &K) -> Option<usize> {
        let capacity = self.slots.len();
        if capacity == 0 {
            return None;
        }

        let start = home_slot(&self.hasher, key, capacity);
        for step in 0..capacity {
            let index = (start + step) % capacity;
            match &self.slots[index] {
                Slot::Empty => return None,
                Slot::Live { key: existing, .. } if existing == key => return Some(index),
                _ => {}
            }
        }
        None
    }

    fn needs_growth(&self) -> bool {
        self.slots.is_empty() || self.size as f64 >= self.slots.len() as f64 * MAX_LOAD_FACTOR
    }

    fn over_load_limit(&self) -> bool {
        self.size as f64 > self.slots.len() as f64 * MAX_LOAD_FACTOR
    }

    /// Rebuild the slot vector at double capacity, keeping only live entries.
    fn rehash(&mut self) {
        let old_capacity = self.slots.len();
        let new_capacity = (old_capacity * 2).max(MIN_CAPACITY);
        let old_slots = std::mem::replace(&mut self.slots, empty_slots(new_capacity));
        let mut dropped_tombstones = 0usize;

        for slot in old_slots {
            match slot {
                Slot::Live { key, value } => {
                    let mut index = home_slot(&self.hasher, &key, new_capacity);
                    while !matches!(self.slots[index], Slot::Empty) {
                        index = (index + 1) % new_capacity;
                    }
                    self.slots[index] = Slot::Live { key, value };
                }
                Slot::Tombstone => dropped_tombstones += 1,
                Slot::Empty => {}
            }
        }

        debug!(
            "Table grew from {} to {} slots ({} live, {} tombstones reclaimed)",
            old_capacity, new_capacity, self.size, dropped_tombstones
        );
    }
}

impl<K, V> Default for OpenAddressingMap<K, V, DefaultBuildHasher> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: fmt::Debug, V: fmt::Debug, S> fmt::Debug for OpenAddressingMap<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a, K, V, S> IntoIterator for &'a OpenAddressingMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Forward iterator over the live entries of an [`OpenAddressingMap`].
pub struct Iter<'a, K, V> {
    slots: std::slice::Iter<'a, Slot<K, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.slots.find_map(|slot| match slot {
            Slot::Live { key, value } => Some((key, value)),
            _ => None,
        })
    }
}

/// Initial probe position for `key` in a table of `capacity` slots.
///
/// Capacity is passed in rather than read from the table so that rehashing
/// can target the new slot vector.
fn home_slot<K: Hash, S: BuildHasher>(hasher: &S, key: &K, capacity: usize) -> usize {
    (hasher.hash_one(key) % capacity as u64) as usize
}

fn empty_slots<K, V>(capacity: usize) -> Vec<Slot<K, V>> {
    (0..capacity).map(|_| Slot::Empty).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::hash::Hasher;

    /// Sends every key to slot zero.
    #[derive(Debug, Clone, Copy, Default)]
    struct Collide;

    struct CollideHasher;

    impl Hasher for CollideHasher {
        fn finish(&self) -> u64 {
            0
        }

        fn write(&mut self, _bytes: &[u8]) {}
    }

    impl BuildHasher for Collide {
        type Hasher = CollideHasher;

        fn build_hasher(&self) -> CollideHasher {
            CollideHasher
        }
    }

    #[test]
    fn test_insert_and_find() {
        let mut table = OpenAddressingMap::new();
        assert!(table.insert(1, "one").unwrap());
        assert!(table.insert(2, "two").unwrap());

        assert_eq!(table.find(&1), Some(&"one"));
        assert_eq!(table.find(&3), None);
    }

    #[test]
    fn test_unsized_table_grows_on_first_insert() {
        let mut table = OpenAddressingMap::new();
        assert_eq!(table.capacity(), 0);
        assert_eq!(table.find(&7), None);
        assert!(!table.remove(&7));

        table.insert(7, 70).unwrap();
        assert_eq!(table.capacity(), MIN_CAPACITY);
        assert_eq!(table.find(&7), Some(&70));
    }

    #[test]
    fn test_insert_duplicate_leaves_table_unchanged() {
        let mut table = OpenAddressingMap::new();
        assert!(table.insert(1, "one").unwrap());
        assert!(!table.insert(1, "another_one").unwrap());

        assert_eq!(table.len(), 1);
        assert_eq!(table.find(&1), Some(&"one"));
    }

    #[test]
    fn test_remove() {
        let mut table = OpenAddressingMap::new();
        table.insert(1, "one").unwrap();
        table.insert(2, "two").unwrap();

        assert!(table.remove(&1));
        assert_eq!(table.len(), 1);
        assert_eq!(table.find(&1), None);

        assert!(!table.remove(&3));
        assert!(!table.remove(&1));
        assert_eq!(table.len(), 1);
        assert_eq!(table.find(&2), Some(&"two"));
    }

    #[test]
    fn test_find_skips_tombstones_in_collision_chain() {
        let mut table = OpenAddressingMap::with_capacity_and_hasher(4, Collide);
        for key in [1, 2, 3] {
            assert!(table.insert(key, key * 10).unwrap());
        }
        // The third entry crosses 0.7 of four slots.
        assert_eq!(table.capacity(), MIN_CAPACITY);

        assert!(table.remove(&2));
        assert_eq!(table.tombstones(), 1);
        assert_eq!(table.find(&3), Some(&30));
        assert!(table.insert(4, 40).unwrap());
        assert_eq!(table.tombstones(), 0);
        assert_eq!(table.capacity(), MIN_CAPACITY);

        assert_eq!(table.find(&1), Some(&10));
        assert_eq!(table.find(&3), Some(&30));
        assert_eq!(table.find(&4), Some(&40));
        assert_eq!(table.find(&2), None);
    }

    #[test]
    fn test_insert_reuses_first_tombstone() {
        let mut table = OpenAddressingMap::with_capacity_and_hasher(8, Collide);
        for key in 1..=4 {
            table.insert(key, ()).unwrap();
        }
        assert!(table.remove(&2));
        assert!(table.remove(&3));
        assert_eq!(table.tombstones(), 2);

        table.insert(5, ()).unwrap();
        assert_eq!(table.tombstones(), 1);
        assert_eq!(table.len(), 3);

        // The surviving tombstone still must not end a lookup.
        assert!(table.contains_key(&4));
    }

    #[test]
    fn test_duplicate_detected_past_tombstone() {
        let mut table = OpenAddressingMap::with_capacity_and_hasher(8, Collide);
        table.insert(1, "a").unwrap();
        table.insert(2, "b").unwrap();
        table.remove(&1);

        assert!(!table.insert(2, "c").unwrap());
        assert_eq!(table.find(&2), Some(&"b"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_find_mut_updates_in_place() {
        let mut table = OpenAddressingMap::new();
        table.insert("key", 1).unwrap();
        if let Some(value) = table.find_mut(&"key") {
            *value += 41;
        }
        assert_eq!(table.find(&"key"), Some(&42));
        assert!(table.find_mut(&"missing").is_none());
    }

    #[test]
    fn test_load_factor_bound_after_every_insert() {
        let mut table = OpenAddressingMap::with_capacity(16);
        for i in 0..200 {
            table.insert(i, ()).unwrap();
            assert!(
                table.len() as f64 <= table.capacity() as f64 * MAX_LOAD_FACTOR,
                "after insert {}: {} live in {} slots",
                i,
                table.len(),
                table.capacity()
            );
        }

        let mut small = OpenAddressingMap::with_capacity(4);
        small.insert(1, ()).unwrap();
        small.insert(2, ()).unwrap();
        assert_eq!(small.capacity(), 4);
        small.insert(3, ()).unwrap();
        assert_eq!(small.capacity(), MIN_CAPACITY);
    }

    #[test]
    fn test_rehash_small_initial_capacity() {
        let mut table = OpenAddressingMap::with_capacity(4);
        for i in 0..10 {
            assert!(table.insert(i, i * 10).unwrap());
        }
        assert_eq!(table.len(), 10);
        assert!(table.capacity() >= 16);

        for i in 0..10 {
            assert_eq!(table.find(&i), Some(&(i * 10)));
        }
    }

    #[test]
    fn test_resize_preserves_contents_at_scale() {
        let mut table = OpenAddressingMap::with_capacity(16);
        for i in 0..10_000u64 {
            assert!(table.insert(i, i.wrapping_mul(31)).unwrap());
        }
        assert_eq!(table.len(), 10_000);
        assert!(table.len() as f64 <= table.capacity() as f64 * MAX_LOAD_FACTOR);

        for i in 0..10_000u64 {
            assert_eq!(table.find(&i), Some(&i.wrapping_mul(31)));
        }
    }

    #[test]
    fn test_rehash_reclaims_tombstones() {
        let mut table = OpenAddressingMap::with_capacity(16);
        for i in 0..8 {
            table.insert(i, i).unwrap();
        }
        for i in 0..4 {
            table.remove(&i);
        }
        assert_eq!(table.tombstones(), 4);

        // Push past the load threshold to force growth.
        for i in 100..110 {
            table.insert(i, i).unwrap();
        }
        assert!(table.capacity() > 16);
        assert_eq!(table.tombstones(), 0);
        assert_eq!(table.len(), 14);
        for i in 4..8 {
            assert!(table.contains_key(&i));
        }
    }

    #[test]
    fn test_size_accounting_matches_live_keys() {
        let mut table = OpenAddressingMap::with_capacity(4);
        let mut expected = BTreeMap::new();

        for i in 0..500u32 {
            let key = (i * 7) % 97;
            if i % 3 == 0 {
                assert_eq!(table.remove(&key), expected.remove(&key).is_some());
            } else {
                let fresh = !expected.contains_key(&key);
                assert_eq!(table.insert(key, i).unwrap(), fresh);
                expected.entry(key).or_insert(i);
            }
            assert_eq!(table.len(), expected.len());
        }

        let live: BTreeMap<u32, u32> = table.iter().map(|(k, v)| (*k, *v)).collect();
        pretty_assertions::assert_eq!(live, expected);
    }

    #[test]
    fn test_iterator_yields_each_live_entry_once() {
        let mut table = OpenAddressingMap::new();
        table.insert(1, "one").unwrap();
        table.insert(10, "ten").unwrap();
        table.insert(20, "twenty").unwrap();
        table.insert(30, "thirty").unwrap();
        table.remove(&30);

        let mut seen: Vec<(i32, &str)> = (&table).into_iter().map(|(k, v)| (*k, *v)).collect();
        seen.sort();
        assert_eq!(seen, vec![(1, "one"), (10, "ten"), (20, "twenty")]);
    }

    #[test]
    fn test_owned_values_dropped_on_remove() {
        use std::rc::Rc;

        let value = Rc::new("payload".to_string());
        let mut table = OpenAddressingMap::new();
        table.insert(1, Rc::clone(&value)).unwrap();
        assert_eq!(Rc::strong_count(&value), 2);

        table.remove(&1);
        assert_eq!(Rc::strong_count(&value), 1);
    }
}
