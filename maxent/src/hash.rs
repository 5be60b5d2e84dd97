//! Hash containers used throughout the crate.
use std::hash::BuildHasherDefault as StdBuildHasherDefault;

use zwohash::ZwoHasher;

/// The default hasher used by all hash containers of this crate.
pub type BuildHasherDefault = StdBuildHasherDefault<ZwoHasher>;

/// [`chain_table::HashTable`] using the default hasher.
pub type HashTable<K, V> = chain_table::HashTable<K, V, BuildHasherDefault>;

/// [`chain_table::HashSet`] using the default hasher.
pub type HashSet<T> = chain_table::HashSet<T, BuildHasherDefault>;
