//! Interned strings.
use std::{borrow::Borrow, fmt, hash::Hash, num::NonZeroU32, rc::Rc};

use crate::hash::HashSet;

/// Handle of a string interned in a [`SymbolTable`].
///
/// Symbols compare and hash by handle, so they are only meaningful together with the table that
/// issued them.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(NonZeroU32);

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Symbol").field(&self.index()).finish()
    }
}

impl Symbol {
    fn new(index: usize) -> Self {
        assert!(index < u32::MAX as usize, "too many symbols");
        match NonZeroU32::new(index as u32 + 1) {
            Some(id) => Self(id),
            None => unreachable!(),
        }
    }

    /// Position of the symbol in the order of interning.
    #[inline(always)]
    pub fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

struct Interned {
    name: Rc<str>,
    symbol: Symbol,
}

impl PartialEq for Interned {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Interned {}

impl Hash for Interned {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state)
    }
}

impl Borrow<str> for Interned {
    fn borrow(&self) -> &str {
        &self.name
    }
}

/// Interner mapping strings to [`Symbol`]s and back.
#[derive(Default)]
pub struct SymbolTable {
    lookup: HashSet<Interned>,
    names: Vec<Rc<str>>,
}

impl fmt::Debug for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names.iter()).finish()
    }
}

impl SymbolTable {
    /// Returns an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the symbol for `name`, interning it if necessary.
    pub fn intern(&mut self, name: &str) -> Symbol {
        if let Some(interned) = self.lookup.find_singleton(name) {
            return interned.symbol;
        }
        let symbol = Symbol::new(self.names.len());
        let name: Rc<str> = name.into();
        self.names.push(name.clone());
        self.lookup.insert_without_checking(Interned { name, symbol });
        symbol
    }

    /// Returns the symbol for `name` if it was interned before.
    pub fn get(&self, name: &str) -> Option<Symbol> {
        self.lookup.find_singleton(name).map(|interned| interned.symbol)
    }

    /// Returns the string of a symbol issued by this table.
    ///
    /// # Panics
    ///
    /// Panics if the symbol was issued by a different, larger table.
    pub fn name(&self, symbol: Symbol) -> &str {
        &self.names[symbol.index()]
    }

    /// Number of interned strings.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if nothing was interned yet.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let mut table = SymbolTable::new();
        let yes = table.intern("YES");
        let no = table.intern("NO");
        assert_ne!(yes, no);
        assert_eq!(table.intern("YES"), yes);
        assert_eq!(table.get("NO"), Some(no));
        assert_eq!(table.get("MAYBE"), None);
        assert_eq!(table.name(no), "NO");
        assert_eq!(table.len(), 2);
        assert_eq!(yes.index(), 0);
    }

    #[test]
    fn many_symbols_survive_growth() {
        let mut table = SymbolTable::new();
        let symbols: Vec<Symbol> = (0..1000).map(|i| table.intern(&format!("w{i}"))).collect();
        for (i, &symbol) in symbols.iter().enumerate() {
            assert_eq!(table.name(symbol), format!("w{i}"));
            assert_eq!(table.get(&format!("w{i}")), Some(symbol));
        }
    }
}
