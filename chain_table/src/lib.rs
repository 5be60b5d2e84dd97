//! [HashTable] and [HashSet] are chained hash containers whose entries live in bulk allocated
//! blocks.
//!
//! Every entry is stored in a slot of a block owned by the container. A slot is linked into exactly
//! one chain at any time: either the chain of the bucket its key hashes to, or the container's free
//! list. Removing an entry splices its slot onto the free list, so erase-then-insert cycles reuse
//! storage instead of allocating. Slots are never freed individually; blocks are only released as a
//! whole when the container is [reset][HashTable::reset] or dropped.
//!
//! The containers grow only when the free list runs dry. Growing changes the bucket count from `n`
//! to `2n + 1`, relinks every live slot into its new bucket (slots never move) and adds one block
//! of `(2n + 1 - n) * max_load` fresh slots.
//!
//! Note that inserting a key that is already present leaves the stored value untouched, which
//! differs from [`std::collections::HashMap::insert`].
#![deny(unsafe_code)]

mod block_pool;

pub mod hash_set;
pub mod hash_table;

pub use hash_set::HashSet;
pub use hash_table::{HashTable, TableStats};

/// Error returned when removing a key that is not present.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct NotFoundError;

impl std::fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("key not present in hash table")
    }
}

impl std::error::Error for NotFoundError {}

/// Load factor used when none is specified.
pub const DEFAULT_MAX_LOAD: f64 = 0.75;

#[cfg(test)]
mod test_set;
#[cfg(test)]
mod test_table;
