//! [HashSet] is a chained hash set with block allocated entries.
use crate::{
    hash_table::{self, HashTable},
    NotFoundError, TableStats,
};
use std::{
    borrow::Borrow,
    fmt,
    hash::{BuildHasher, Hash},
};

/// A chained hash set whose entries are recycled through a free list.
///
/// This is a [`HashTable`] with `()` values. It additionally provides
/// [`find_singleton`][Self::find_singleton] to obtain the canonical stored instance of a value,
/// which makes it usable as an interner.
#[derive(Clone)]
pub struct HashSet<T, S> {
    table: HashTable<T, (), S>,
}

impl<T: fmt::Debug, S> fmt::Debug for HashSet<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T, S: Default> Default for HashSet<T, S> {
    fn default() -> Self {
        Self {
            table: HashTable::default(),
        }
    }
}

impl<T, S: Default> HashSet<T, S> {
    /// Returns an empty set with a single bucket.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an empty set with the given initial number of buckets.
    pub fn with_buckets(buckets: usize) -> Self {
        Self {
            table: HashTable::with_buckets(buckets),
        }
    }

    /// Returns an empty set with the given initial number of buckets and load factor.
    pub fn with_buckets_and_load(buckets: usize, max_load: f64) -> Self {
        Self {
            table: HashTable::with_buckets_and_load(buckets, max_load),
        }
    }
}

impl<T, S> HashSet<T, S> {
    /// Returns an empty set using the provided BuildHasher.
    pub fn with_hasher(build_hasher: S) -> Self {
        Self {
            table: HashTable::with_hasher(build_hasher),
        }
    }

    /// Returns the number of values in the set.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the set is empty.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the current number of buckets.
    #[inline(always)]
    pub fn num_buckets(&self) -> usize {
        self.table.num_buckets()
    }

    /// Removes all values, keeping the allocated storage for reuse.
    pub fn clear(&mut self) {
        self.table.clear()
    }

    /// Removes all values and releases all storage.
    pub fn reset(&mut self) {
        self.table.reset()
    }

    /// Returns an iterator over all values.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Returns occupancy statistics.
    pub fn stats(&self) -> TableStats {
        self.table.stats()
    }

    /// Keeps only the values for which `f` returns `true`.
    pub fn retain(&mut self, mut f: impl FnMut(&T) -> bool) {
        self.table.retain(|value, _| f(value))
    }

    #[cfg(test)]
    pub(crate) fn check(&self)
    where
        T: Hash + Eq,
        S: BuildHasher,
    {
        self.table.check()
    }
}

impl<T: Hash + Eq, S: BuildHasher> HashSet<T, S> {
    /// Grows the set until it can hold `values` values without allocating.
    pub fn reserve(&mut self, values: usize) {
        self.table.reserve(values)
    }

    /// Adds a value, returning `true` if it was not present before.
    ///
    /// An equal value that is already present is kept and `value` is dropped.
    pub fn insert(&mut self, value: T) -> bool {
        self.table.insert(value, ()).1
    }

    /// Adds a value without checking whether an equal value is already present.
    ///
    /// The caller must guarantee that the value is absent, otherwise the set ends up with two
    /// equal members.
    pub fn insert_without_checking(&mut self, value: T) {
        self.table.insert_unique_unchecked(value, ());
    }

    /// Returns `true` if the set contains `value`.
    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.contains_key(value)
    }

    /// Same as [`contains`][Self::contains].
    pub fn exists<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.contains(value)
    }

    /// Returns the stored instance equal to `value`, if present.
    ///
    /// Together with [`insert_without_checking`][Self::insert_without_checking] this allows
    /// interning values without hashing them twice on the hit path.
    pub fn find_singleton<Q>(&self, value: &Q) -> Option<&T>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.get_key_value(value).map(|(stored, _)| stored)
    }

    /// Removes `value`, returning the stored instance.
    ///
    /// Removing an absent value is an error and leaves the set unchanged.
    pub fn remove<Q>(&mut self, value: &Q) -> Result<T, NotFoundError>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.remove_entry(value).map(|(stored, ())| stored)
    }

    /// Removes `value` if present and returns the number of removed values (`0` or `1`).
    pub fn erase<Q>(&mut self, value: &Q) -> usize
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.erase(value)
    }
}

impl<T: Hash + Eq, S: BuildHasher> Extend<T> for HashSet<T, S> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}

impl<T: Hash + Eq, S: BuildHasher + Default> FromIterator<T> for HashSet<T, S> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::default();
        set.extend(iter);
        set
    }
}

impl<'a, T, S> IntoIterator for &'a HashSet<T, S> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the values of a [`HashSet`].
pub struct Iter<'a, T> {
    inner: hash_table::Iter<'a, T, ()>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(value, _)| value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}
