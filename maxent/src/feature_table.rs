//! Values keyed by (outcome, predicate) features.
use std::{fmt, ops::AddAssign, str::FromStr};

use flussab::{write::text::ascii_digits, DeferredWriter};

use crate::{
    error::{Error, Result},
    hash::HashTable,
    model_file::TokenReader,
    predicate::{DisplayPredicate, Predicate},
    symbol::{Symbol, SymbolTable},
};

/// Dense id of a feature within a [`FeatureTable`].
pub type FeatureId = usize;

/// A single (outcome, predicate) feature and its value.
#[derive(Clone, Debug, PartialEq)]
pub struct Feature<V> {
    /// Outcome of the feature.
    pub outcome: Symbol,
    /// Context predicate of the feature.
    pub predicate: Predicate,
    /// Accumulated value, a count during training or a weight in a trained model.
    pub value: V,
}

/// Table of values keyed by (outcome, predicate) features.
///
/// Features are numbered densely in insertion order. Looking up a feature that is not present
/// yields the default value, so for counts and weights an absent feature is equivalent to a zero
/// one.
#[derive(Clone, Debug)]
pub struct FeatureTable<V> {
    by_predicate: HashTable<Predicate, Vec<(Symbol, FeatureId)>>,
    features: Vec<Feature<V>>,
}

impl<V> Default for FeatureTable<V> {
    fn default() -> Self {
        Self {
            by_predicate: HashTable::new(),
            features: Vec::new(),
        }
    }
}

impl<V> FeatureTable<V> {
    /// Returns an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an empty table sized for about `features` distinct predicates.
    pub fn with_capacity(features: usize) -> Self {
        Self {
            by_predicate: HashTable::with_buckets(features),
            features: Vec::with_capacity(features),
        }
    }

    /// Number of features.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Returns `true` if the table has no features.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Returns the id of a feature, if present.
    pub fn id(&self, outcome: Symbol, predicate: &[Symbol]) -> Option<FeatureId> {
        self.by_predicate
            .get(predicate)?
            .iter()
            .find(|&&(feature_outcome, _)| feature_outcome == outcome)
            .map(|&(_, id)| id)
    }

    /// Returns the feature with the given id.
    pub fn feature(&self, id: FeatureId) -> Result<&Feature<V>> {
        self.features
            .get(id)
            .ok_or_else(|| Error::index_out_of_bounds("FeatureTable::feature", self.len(), id))
    }

    /// Iterates over all features in id order.
    pub fn iter(&self) -> std::slice::Iter<'_, Feature<V>> {
        self.features.iter()
    }

    fn rebuild_index(&mut self) {
        self.by_predicate.clear();
        for (id, feature) in self.features.iter().enumerate() {
            self.by_predicate
                .get_or_insert_default(feature.predicate.clone())
                .push((feature.outcome, id));
        }
    }
}

impl<V: Copy + Default> FeatureTable<V> {
    /// Returns the value of a feature, or the default value if it is not present.
    pub fn lookup(&self, outcome: Symbol, predicate: &[Symbol]) -> V {
        match self.id(outcome, predicate) {
            Some(id) => self.features[id].value,
            None => V::default(),
        }
    }
}

impl<V: AddAssign> FeatureTable<V> {
    /// Adds `value` to a feature, creating the feature first if it is not present.
    pub fn add(&mut self, outcome: Symbol, predicate: &[Symbol], value: V) -> FeatureId {
        if let Some(id) = self.id(outcome, predicate) {
            self.features[id].value += value;
            return id;
        }
        let id = self.features.len();
        let predicate = Predicate::from(predicate);
        self.by_predicate
            .get_or_insert_default(predicate.clone())
            .push((outcome, id));
        self.features.push(Feature {
            outcome,
            predicate,
            value,
        });
        id
    }
}

impl<V: PartialOrd> FeatureTable<V> {
    /// Removes every feature whose value is below `threshold` and renumbers the remaining ones
    /// densely, keeping their relative order.
    pub fn prune(&mut self, threshold: V) {
        let before = self.features.len();
        self.features.retain(|feature| feature.value >= threshold);
        if self.features.len() != before {
            self.rebuild_index();
        }
    }
}

impl<V: fmt::Display> FeatureTable<V> {
    /// Writes the table in model file format.
    ///
    /// IO errors are deferred to the writer, see [`DeferredWriter`].
    pub fn write_to(&self, writer: &mut DeferredWriter, symbols: &SymbolTable) {
        ascii_digits(writer, self.features.len());
        writer.write_all_defer_err(b"\n");
        for feature in self.features.iter() {
            writer.write_all_defer_err(symbols.name(feature.outcome).as_bytes());
            writer.write_all_defer_err(b" ");
            ascii_digits(writer, feature.predicate.len());
            for &symbol in feature.predicate.iter() {
                writer.write_all_defer_err(b" ");
                writer.write_all_defer_err(symbols.name(symbol).as_bytes());
            }
            writer.write_all_defer_err(b" ");
            writer.write_all_defer_err(feature.value.to_string().as_bytes());
            writer.write_all_defer_err(b"\n");
        }
    }
}

impl<V: AddAssign + FromStr> FeatureTable<V>
where
    V::Err: fmt::Display,
{
    /// Reads a table in model file format.
    pub fn read_from(reader: &mut TokenReader, symbols: &mut SymbolTable) -> Result<Self> {
        let n_features: usize = reader.parse("feature count")?;
        let mut table = Self::with_capacity(n_features);
        let mut predicate = Vec::new();
        for _ in 0..n_features {
            let outcome = symbols.intern(reader.expect_token("feature outcome")?);
            let n_symbols: usize = reader.parse("predicate length")?;
            predicate.clear();
            for _ in 0..n_symbols {
                predicate.push(symbols.intern(reader.expect_token("predicate symbol")?));
            }
            let value: V = reader.parse("feature value")?;
            if table.id(outcome, &predicate).is_some() {
                return Err(Error::input(
                    "FeatureTable::read_from",
                    format!(
                        "duplicate feature {} {}",
                        symbols.name(outcome),
                        DisplayPredicate {
                            symbols: &predicate,
                            table: &*symbols,
                        }
                    ),
                ));
            }
            table.add(outcome, &predicate, value);
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn add_accumulates_and_lookup_defaults() {
        let mut symbols = SymbolTable::new();
        let yes = symbols.intern("YES");
        let no = symbols.intern("NO");
        let kw = symbols.intern("kw");
        let other = symbols.intern("other");

        let mut table: FeatureTable<u64> = FeatureTable::new();
        assert_eq!(table.add(yes, &[kw], 2), 0);
        assert_eq!(table.add(no, &[kw], 1), 1);
        assert_eq!(table.add(yes, &[kw], 3), 0);
        assert_eq!(table.lookup(yes, &[kw]), 5);
        assert_eq!(table.lookup(no, &[kw]), 1);
        assert_eq!(table.lookup(no, &[other]), 0);
        assert_eq!(table.lookup(yes, &[kw, other]), 0);
        assert_eq!(table.id(no, &[kw]), Some(1));
        assert_eq!(table.len(), 2);
        assert!(table.feature(2).is_err());
    }

    #[test]
    fn prune_renumbers_densely() {
        let mut symbols = SymbolTable::new();
        let yes = symbols.intern("YES");
        let predicates: Vec<Symbol> = (0..6).map(|i| symbols.intern(&format!("p{i}"))).collect();

        let mut table: FeatureTable<u64> = FeatureTable::new();
        for (i, &predicate) in predicates.iter().enumerate() {
            table.add(yes, &[predicate], i as u64);
        }
        table.prune(3);
        assert_eq!(table.len(), 3);
        for (id, feature) in table.iter().enumerate() {
            assert_eq!(feature.predicate.symbols(), &[predicates[id + 3]]);
            assert_eq!(table.id(yes, &[predicates[id + 3]]), Some(id));
        }
        assert_eq!(table.id(yes, &[predicates[0]]), None);
    }

    #[test]
    fn file_format_round_trip() {
        let mut symbols = SymbolTable::new();
        let yes = symbols.intern("YES");
        let a = symbols.intern("a");
        let b = symbols.intern("b");

        let mut table: FeatureTable<f64> = FeatureTable::new();
        table.add(yes, &[a, b], 0.1 + 0.2);
        table.add(yes, &[], -1.0 / 3.0);
        table.add(yes, &[b], 1e-300);

        let mut out = Vec::new();
        let mut writer = DeferredWriter::from_write(&mut out);
        table.write_to(&mut writer, &symbols);
        writer.flush().unwrap();
        drop(writer);
        let text = String::from_utf8(out.clone()).unwrap();
        assert!(text.starts_with("3\nYES 2 a b 0.30000000000000004\nYES 0 -0.3333333333333333\n"));

        let mut reloaded_symbols = SymbolTable::new();
        let reloaded: FeatureTable<f64> =
            FeatureTable::read_from(&mut TokenReader::new(&out[..]), &mut reloaded_symbols)
                .unwrap();
        assert_eq!(reloaded.len(), 3);
        for (original, copy) in table.iter().zip(reloaded.iter()) {
            assert_eq!(original.value.to_bits(), copy.value.to_bits());
            assert_eq!(
                original.predicate.display(&symbols).to_string(),
                copy.predicate.display(&reloaded_symbols).to_string()
            );
        }
    }

    #[test]
    fn duplicate_feature_is_rejected() {
        let mut symbols = SymbolTable::new();
        let input = b"2\nYES 1 a 1.5\nYES 1 a 2.5\n";
        let result = FeatureTable::<f64>::read_from(&mut TokenReader::new(&input[..]), &mut symbols);
        assert!(matches!(result, Err(Error::UnexpectedInput { .. })));
    }
}
