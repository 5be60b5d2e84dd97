//! [HashTable] is a chained hash map with block allocated entries.
use crate::{
    block_pool::{BlockPool, Link, SlotRef},
    NotFoundError, DEFAULT_MAX_LOAD,
};
use std::{
    borrow::Borrow,
    fmt,
    hash::{BuildHasher, Hash},
    ops::Index,
};

/// A chained hash map whose entries are recycled through a free list.
///
/// In `HashTable<K, V, S>`, `K: Hash + Eq` is the key type, `V` the value type and
/// `S: BuildHasher` is used for hashing keys.
///
/// See the [crate level documentation][crate] for the allocation and growth strategy.
#[derive(Clone)]
pub struct HashTable<K, V, S> {
    buckets: Box<[Link]>,
    pool: BlockPool<(K, V)>,
    len: usize,
    max_load: f64,
    build_hasher: S,
}

/// Occupancy figures of a [`HashTable`] or [`HashSet`][crate::HashSet].
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct TableStats {
    /// Number of live entries.
    pub entries: usize,
    /// Number of buckets.
    pub buckets: usize,
    /// Number of buckets with a non-empty chain.
    pub nonempty_buckets: usize,
    /// Number of key comparisons needed to look up every entry once.
    ///
    /// A bucket of length `n` contributes `n * (n + 1) / 2`, so this measures how lumpy the hash
    /// distribution is.
    pub path_length: usize,
    /// Number of allocated slots, live or free.
    pub slots: usize,
    /// Number of allocated blocks.
    pub blocks: usize,
}

impl fmt::Display for TableStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries, {}/{} buckets used, path length {}, {} slots in {} blocks",
            self.entries,
            self.nonempty_buckets,
            self.buckets,
            self.path_length,
            self.slots,
            self.blocks
        )
    }
}

impl<K: fmt::Debug, V: fmt::Debug, S> fmt::Debug for HashTable<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S: Default> Default for HashTable<K, V, S> {
    fn default() -> Self {
        Self::with_buckets_and_hasher(1, S::default())
    }
}

impl<K, V, S: Default> HashTable<K, V, S> {
    /// Returns an empty table with a single bucket.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an empty table with the given initial number of buckets.
    pub fn with_buckets(buckets: usize) -> Self {
        Self::with_buckets_and_hasher(buckets, S::default())
    }

    /// Returns an empty table with the given initial number of buckets and load factor.
    ///
    /// The load factor determines how many slots each growth step allocates per added bucket.
    pub fn with_buckets_and_load(buckets: usize, max_load: f64) -> Self {
        Self::with_buckets_load_and_hasher(buckets, max_load, S::default())
    }
}

impl<K, V, S> HashTable<K, V, S> {
    /// Returns an empty table with a single bucket using the provided BuildHasher.
    pub fn with_hasher(build_hasher: S) -> Self {
        Self::with_buckets_and_hasher(1, build_hasher)
    }

    /// Returns an empty table with the given initial number of buckets using the provided
    /// BuildHasher.
    pub fn with_buckets_and_hasher(buckets: usize, build_hasher: S) -> Self {
        Self::with_buckets_load_and_hasher(buckets, DEFAULT_MAX_LOAD, build_hasher)
    }

    /// Returns an empty table with the given initial number of buckets, load factor and
    /// BuildHasher.
    ///
    /// # Panics
    ///
    /// Panics if `max_load` is not a positive finite number.
    pub fn with_buckets_load_and_hasher(buckets: usize, max_load: f64, build_hasher: S) -> Self {
        assert!(
            max_load.is_finite() && max_load > 0.0,
            "load factor {max_load} must be positive and finite"
        );
        let mut table = HashTable {
            buckets: Box::new([]),
            pool: BlockPool::default(),
            len: 0,
            max_load,
            build_hasher,
        };
        table.init(buckets);
        table
    }

    fn init(&mut self, buckets: usize) {
        let buckets = buckets.max(1);
        self.buckets = vec![None; buckets].into_boxed_slice();
        self.pool.allocate_block(self.block_size(buckets));
    }

    fn block_size(&self, added_buckets: usize) -> usize {
        ((added_buckets as f64 * self.max_load) as usize).max(1)
    }

    /// Returns the number of entries in the table.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the table is empty.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the current number of buckets.
    #[inline(always)]
    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Returns the load factor used to size growth blocks.
    #[inline(always)]
    pub fn max_load(&self) -> f64 {
        self.max_load
    }

    /// Removes all entries, returning their slots to the free list.
    ///
    /// Keeps the bucket array and every allocated block.
    pub fn clear(&mut self) {
        for bucket in self.buckets.iter_mut() {
            let mut link = bucket.take();
            while let Some(slot_ref) = link {
                link = self.pool.slot(slot_ref).next;
                drop(self.pool.release(slot_ref));
            }
        }
        self.len = 0;
    }

    /// Same as [`clear`][Self::clear].
    pub fn remove_all(&mut self) {
        self.clear()
    }

    /// Removes all entries and releases all allocated memory, leaving a table with a single
    /// bucket.
    pub fn reset(&mut self) {
        self.pool.free_all();
        self.len = 0;
        self.init(1);
    }

    /// Returns an iterator over all entries, visiting buckets in order and each chain from its
    /// head.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            buckets: &self.buckets,
            pool: &self.pool,
            bucket: 0,
            link: None,
            remaining: self.len,
        }
    }

    /// Returns an iterator over all keys.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(key, _)| key)
    }

    /// Returns an iterator over all values.
    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, value)| value)
    }

    /// Returns an iterator over all entries with mutable value references.
    ///
    /// Entries are visited in storage order, which is unrelated to the order of [`iter`][Self::iter].
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&K, &mut V)> + '_ {
        self.pool.items_mut().map(|(key, value)| (&*key, value))
    }

    /// Returns an iterator over all values, in storage order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> + '_ {
        self.pool.items_mut().map(|(_, value)| value)
    }

    /// Returns occupancy statistics.
    pub fn stats(&self) -> TableStats {
        let mut nonempty_buckets = 0;
        let mut path_length = 0;
        for &head in self.buckets.iter() {
            let mut bucket_size = 0;
            let mut link = head;
            while let Some(slot_ref) = link {
                bucket_size += 1;
                path_length += bucket_size;
                link = self.pool.slot(slot_ref).next;
            }
            if bucket_size > 0 {
                nonempty_buckets += 1;
            }
        }
        TableStats {
            entries: self.len,
            buckets: self.buckets.len(),
            nonempty_buckets,
            path_length,
            slots: self.pool.capacity(),
            blocks: self.pool.num_blocks(),
        }
    }

    /// Keeps only the entries for which `f` returns `true`.
    pub fn retain(&mut self, mut f: impl FnMut(&K, &mut V) -> bool) {
        for bucket in 0..self.buckets.len() {
            let mut prev: Link = None;
            let mut link = self.buckets[bucket];
            while let Some(slot_ref) = link {
                let slot = self.pool.slot_mut(slot_ref);
                let next = slot.next;
                let (key, value) = slot.occupied_mut();
                if f(key, value) {
                    prev = link;
                } else {
                    match prev {
                        None => self.buckets[bucket] = next,
                        Some(prev_ref) => self.pool.slot_mut(prev_ref).next = next,
                    }
                    drop(self.pool.release(slot_ref));
                    self.len -= 1;
                }
                link = next;
            }
        }
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> HashTable<K, V, S> {
    #[inline(always)]
    fn bucket_for<Q: Hash + ?Sized>(&self, key: &Q) -> usize {
        (self.build_hasher.hash_one(key) % self.buckets.len() as u64) as usize
    }

    #[inline]
    fn find_slot<Q>(&self, key: &Q) -> Option<SlotRef>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut link = self.buckets[self.bucket_for(key)];
        while let Some(slot_ref) = link {
            let slot = self.pool.slot(slot_ref);
            if slot.occupied().0.borrow() == key {
                return Some(slot_ref);
            }
            link = slot.next;
        }
        None
    }

    /// Links a new entry without checking for an existing one, growing when the free list is
    /// empty.
    fn link_new(&mut self, key: K, value: V) -> SlotRef {
        if self.pool.is_exhausted() {
            self.grow();
        }
        let bucket = self.bucket_for(&key);
        let Some(slot_ref) = self.pool.acquire((key, value)) else {
            unreachable!("growing always provides a free slot")
        };
        self.pool.slot_mut(slot_ref).next = self.buckets[bucket];
        self.buckets[bucket] = Some(slot_ref);
        self.len += 1;
        slot_ref
    }

    /// Changes the bucket count from `n` to `2n + 1`, relinking all entries in place, and adds a
    /// block of fresh slots.
    fn grow(&mut self) {
        let old_len = self.buckets.len();
        let new_len = old_len * 2 + 1;
        let mut new_buckets: Box<[Link]> = vec![None; new_len].into_boxed_slice();

        for bucket in self.buckets.iter_mut() {
            let mut link = bucket.take();
            while let Some(slot_ref) = link {
                let slot = self.pool.slot_mut(slot_ref);
                link = slot.next;
                let target =
                    (self.build_hasher.hash_one(&slot.occupied().0) % new_len as u64) as usize;
                slot.next = new_buckets[target];
                new_buckets[target] = Some(slot_ref);
            }
        }

        self.buckets = new_buckets;
        self.pool.allocate_block(self.block_size(new_len - old_len));
    }

    /// Grows the table until `num_buckets * max_load >= entries`.
    pub fn reserve(&mut self, entries: usize) {
        while (self.buckets.len() as f64) * self.max_load < entries as f64 {
            self.grow();
        }
    }

    /// Checks the chain and free list structure, panicking on inconsistencies.
    #[cfg(test)]
    pub(crate) fn check(&self) {
        let mut chained = 0;
        for (bucket, &head) in self.buckets.iter().enumerate() {
            let mut link = head;
            while let Some(slot_ref) = link {
                let slot = self.pool.slot(slot_ref);
                assert_eq!(self.bucket_for(&slot.occupied().0), bucket);
                chained += 1;
                link = slot.next;
            }
        }
        assert_eq!(chained, self.len);
        assert_eq!(self.pool.count_free() + self.len, self.pool.capacity());
    }

    /// Returns a reference to the value for `key`, if present.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_key_value(key).map(|(_, value)| value)
    }

    /// Returns the stored key and a reference to the value for `key`, if present.
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot_ref = self.find_slot(key)?;
        let (key, value) = self.pool.slot(slot_ref).occupied();
        Some((key, value))
    }

    /// Returns a mutable reference to the value for `key`, if present.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot_ref = self.find_slot(key)?;
        Some(&mut self.pool.slot_mut(slot_ref).occupied_mut().1)
    }

    /// Returns `true` if the table contains `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find_slot(key).is_some()
    }

    /// Returns a mutable reference to the value for `key`, inserting `V::default()` first if the
    /// key is absent.
    ///
    /// May grow and rehash the whole table.
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        let slot_ref = match self.find_slot(&key) {
            Some(slot_ref) => slot_ref,
            None => self.link_new(key, V::default()),
        };
        &mut self.pool.slot_mut(slot_ref).occupied_mut().1
    }

    /// Inserts an entry unless the table already contains `key`.
    ///
    /// Returns a reference to the stored value and `true` if the entry was inserted. When the key
    /// was already present, the existing value is left untouched and `value` is dropped.
    pub fn insert(&mut self, key: K, value: V) -> (&mut V, bool) {
        let (slot_ref, inserted) = match self.find_slot(&key) {
            Some(slot_ref) => (slot_ref, false),
            None => (self.link_new(key, value), true),
        };
        (&mut self.pool.slot_mut(slot_ref).occupied_mut().1, inserted)
    }

    /// Inserts an entry without checking whether the key is already present.
    ///
    /// The caller must guarantee that `key` is absent. Otherwise the table ends up holding two
    /// entries for the same key, and which one lookups find is unspecified.
    pub fn insert_unique_unchecked(&mut self, key: K, value: V) -> &mut V {
        let slot_ref = self.link_new(key, value);
        &mut self.pool.slot_mut(slot_ref).occupied_mut().1
    }

    /// Removes the entry for `key`, returning the stored key and value.
    ///
    /// The entry's slot goes onto the free list for reuse by later insertions.
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Result<(K, V), NotFoundError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let bucket = self.bucket_for(key);
        let mut prev: Link = None;
        let mut link = self.buckets[bucket];
        while let Some(slot_ref) = link {
            let slot = self.pool.slot(slot_ref);
            let next = slot.next;
            if slot.occupied().0.borrow() == key {
                match prev {
                    None => self.buckets[bucket] = next,
                    Some(prev_ref) => self.pool.slot_mut(prev_ref).next = next,
                }
                self.len -= 1;
                return Ok(self.pool.release(slot_ref));
            }
            prev = link;
            link = next;
        }
        Err(NotFoundError)
    }

    /// Removes the entry for `key`, returning its value.
    ///
    /// Removing an absent key is an error and leaves the table unchanged.
    pub fn remove<Q>(&mut self, key: &Q) -> Result<V, NotFoundError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove_entry(key).map(|(_, value)| value)
    }

    /// Removes the entry for `key` if present and returns the number of removed entries (`0` or
    /// `1`).
    pub fn erase<Q>(&mut self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        usize::from(self.remove_entry(key).is_ok())
    }
}

impl<K, Q, V, S> Index<&Q> for HashTable<K, V, S>
where
    K: Hash + Eq + Borrow<Q>,
    Q: Hash + Eq + ?Sized,
    S: BuildHasher,
{
    type Output = V;

    /// # Panics
    ///
    /// Panics if the key is not present.
    fn index(&self, key: &Q) -> &V {
        self.get(key).expect("key not present in hash table")
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> Extend<(K, V)> for HashTable<K, V, S> {
    /// Inserts all entries, keeping the first value seen for each key.
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K: Hash + Eq, V, S: BuildHasher + Default> FromIterator<(K, V)> for HashTable<K, V, S> {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut table = Self::default();
        table.extend(iter);
        table
    }
}

impl<'a, K, V, S> IntoIterator for &'a HashTable<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the entries of a [`HashTable`], bucket by bucket.
pub struct Iter<'a, K, V> {
    buckets: &'a [Link],
    pool: &'a BlockPool<(K, V)>,
    bucket: usize,
    link: Link,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(slot_ref) = self.link {
                let slot = self.pool.slot(slot_ref);
                self.link = slot.next;
                self.remaining -= 1;
                let (key, value) = slot.occupied();
                return Some((key, value));
            }
            if self.remaining == 0 {
                return None;
            }
            self.link = *self.buckets.get(self.bucket)?;
            self.bucket += 1;
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
