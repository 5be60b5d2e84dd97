//! Context predicates.
use std::{borrow::Borrow, fmt, ops::Deref};

use crate::symbol::{Symbol, SymbolTable};

/// Separator between the symbols of a predicate in its text form.
pub const SYMBOL_SEPARATOR: char = '+';

/// An immutable ordered tuple of symbols identifying one instantiated feature template.
///
/// Most predicates consist of a single symbol. The empty predicate is used for prior features.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Predicate(Box<[Symbol]>);

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

impl Predicate {
    /// Returns the symbols of this predicate.
    #[inline(always)]
    pub fn symbols(&self) -> &[Symbol] {
        &self.0
    }

    /// Parses the `+` separated text form, interning every part.
    pub fn parse(text: &str, symbols: &mut SymbolTable) -> Self {
        Self(
            text.split(SYMBOL_SEPARATOR)
                .map(|part| symbols.intern(part))
                .collect(),
        )
    }

    /// Returns a value displaying the `+` separated text form.
    pub fn display<'a>(&'a self, symbols: &'a SymbolTable) -> impl fmt::Display + 'a {
        DisplayPredicate {
            symbols: self.symbols(),
            table: symbols,
        }
    }
}

/// Displays a symbol tuple in its `+` separated text form.
pub(crate) struct DisplayPredicate<'a> {
    pub symbols: &'a [Symbol],
    pub table: &'a SymbolTable,
}

impl fmt::Display for DisplayPredicate<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, &symbol) in self.symbols.iter().enumerate() {
            if i > 0 {
                write!(f, "{SYMBOL_SEPARATOR}")?;
            }
            f.write_str(self.table.name(symbol))?;
        }
        Ok(())
    }
}

impl Deref for Predicate {
    type Target = [Symbol];

    fn deref(&self) -> &[Symbol] {
        &self.0
    }
}

impl Borrow<[Symbol]> for Predicate {
    fn borrow(&self) -> &[Symbol] {
        &self.0
    }
}

impl From<Symbol> for Predicate {
    fn from(symbol: Symbol) -> Self {
        Self(Box::new([symbol]))
    }
}

impl From<&[Symbol]> for Predicate {
    fn from(symbols: &[Symbol]) -> Self {
        Self(symbols.into())
    }
}

impl From<Vec<Symbol>> for Predicate {
    fn from(symbols: Vec<Symbol>) -> Self {
        Self(symbols.into_boxed_slice())
    }
}

impl FromIterator<Symbol> for Predicate {
    fn from_iter<T: IntoIterator<Item = Symbol>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
