//! Aggregation of training events into contexts and feature counts.
//!
//! An [`EventSet`] bins every added event by its exact set of context predicates. Each bin, an
//! [`EventContext`], counts how often each outcome was seen with that set of predicates. In
//! addition the set counts every (outcome, predicate) feature over all events.
use std::io::Write;

use crate::{
    error::{Error, Result},
    event::MaxEntEvent,
    feature_table::{FeatureId, FeatureTable},
    hash::HashTable,
    predicate::Predicate,
    symbol::{Symbol, SymbolTable},
};

/// Number of slots of an [`EventTable`].
pub const EVENT_TABLE_SIZE: usize = 10007;

/// Initial size of the predicate and feature tables.
const INIT_TABLE_SIZE: usize = 100;

/// Dense id of a predicate within an [`EventSet`], assigned in order of first occurrence.
pub type PredicateId = u32;

/// A distinct combination of context predicates together with per outcome counts.
#[derive(Clone, Debug)]
pub struct EventContext {
    predicates: Box<[PredicateId]>,
    outcomes: Vec<(Symbol, u64)>,
    total: u64,
    max_outcomes: usize,
    next: Option<usize>,
}

impl EventContext {
    fn new(max_outcomes: usize, predicates: &[PredicateId]) -> Self {
        Self {
            predicates: predicates.into(),
            outcomes: Vec::with_capacity(max_outcomes),
            total: 0,
            max_outcomes,
            next: None,
        }
    }

    /// Returns `true` if this context consists of exactly `predicates` in this order.
    pub fn same(&self, predicates: &[PredicateId]) -> bool {
        *self.predicates == *predicates
    }

    /// Adds `count` observations of `outcome`.
    pub fn increment(&mut self, outcome: Symbol, count: u64) -> Result<()> {
        self.add_outcome_count("EventContext::increment", outcome, count)?;
        self.total += count;
        Ok(())
    }

    /// Adds all outcome counts of `other` to this context.
    pub fn merge(&mut self, other: &EventContext) -> Result<()> {
        for &(outcome, count) in other.outcomes.iter() {
            self.add_outcome_count("EventContext::merge", outcome, count)?;
        }
        self.total += other.total;
        Ok(())
    }

    fn add_outcome_count(
        &mut self,
        location: &'static str,
        outcome: Symbol,
        count: u64,
    ) -> Result<()> {
        if let Some(entry) = self.outcomes.iter_mut().find(|(seen, _)| *seen == outcome) {
            entry.1 += count;
            return Ok(());
        }
        if self.outcomes.len() == self.max_outcomes {
            return Err(Error::internal(
                location,
                format!("outcomes exceeded the maximum of {}", self.max_outcomes),
            ));
        }
        self.outcomes.push((outcome, count));
        Ok(())
    }

    /// Sorted ids of the context predicates.
    #[inline(always)]
    pub fn predicates(&self) -> &[PredicateId] {
        &self.predicates
    }

    /// Returns the predicate id at `index`.
    pub fn predicate(&self, index: usize) -> Result<PredicateId> {
        self.predicates.get(index).copied().ok_or_else(|| {
            Error::index_out_of_bounds("EventContext::predicate", self.predicates.len(), index)
        })
    }

    /// Outcomes seen with this context and their counts, in order of first occurrence.
    #[inline(always)]
    pub fn outcomes(&self) -> &[(Symbol, u64)] {
        &self.outcomes
    }

    /// Returns the outcome at `index`.
    pub fn outcome(&self, index: usize) -> Result<Symbol> {
        self.outcomes
            .get(index)
            .map(|&(outcome, _)| outcome)
            .ok_or_else(|| {
                Error::index_out_of_bounds("EventContext::outcome", self.outcomes.len(), index)
            })
    }

    /// Returns the count of the outcome at `index`.
    pub fn outcome_count(&self, index: usize) -> Result<u64> {
        self.outcomes
            .get(index)
            .map(|&(_, count)| count)
            .ok_or_else(|| {
                Error::index_out_of_bounds("EventContext::outcome_count", self.outcomes.len(), index)
            })
    }

    /// Returns the count of `outcome`, which is zero for outcomes never seen with this context.
    pub fn count_of(&self, outcome: Symbol) -> u64 {
        self.outcomes
            .iter()
            .find(|&&(seen, _)| seen == outcome)
            .map_or(0, |&(_, count)| count)
    }

    /// Sum of all outcome counts.
    #[inline(always)]
    pub fn total(&self) -> u64 {
        self.total
    }

    fn dump(&self, out: &mut impl Write, set: &EventSet, symbols: &SymbolTable) -> Result<()> {
        write!(out, "* Event entry for context:")?;
        for &id in self.predicates.iter() {
            write!(out, " {};", set.predicate(id)?.display(symbols))?;
        }
        write!(out, "\nOutcome counts:")?;
        for &(outcome, count) in self.outcomes.iter() {
            write!(out, " {}:{count};", symbols.name(outcome))?;
        }
        writeln!(out, " Total: {}", self.total)?;
        Ok(())
    }
}

/// Fixed size chained hash table of [`EventContext`]s keyed by their sorted predicate ids.
///
/// Contexts live in an arena owned by the table and are chained through arena indices.
#[derive(Clone, Debug)]
pub struct EventTable {
    slots: Box<[Option<usize>]>,
    contexts: Vec<EventContext>,
    max_outcomes: usize,
    n_events: u64,
}

impl EventTable {
    /// Returns an empty table for contexts with at most `max_outcomes` distinct outcomes.
    pub fn new(max_outcomes: usize) -> Self {
        Self {
            slots: vec![None; EVENT_TABLE_SIZE].into_boxed_slice(),
            contexts: Vec::new(),
            max_outcomes,
            n_events: 0,
        }
    }

    fn slot(predicates: &[PredicateId]) -> usize {
        let mut val: u32 = 0;
        for &id in predicates {
            val = (val << 2).wrapping_add(id);
        }
        val as usize % EVENT_TABLE_SIZE
    }

    fn find_or_create(&mut self, predicates: &[PredicateId]) -> usize {
        let slot = Self::slot(predicates);
        let mut link = self.slots[slot];
        let mut last = None;
        while let Some(index) = link {
            let context = &self.contexts[index];
            if context.same(predicates) {
                return index;
            }
            last = link;
            link = context.next;
        }
        let index = self.contexts.len();
        self.contexts
            .push(EventContext::new(self.max_outcomes, predicates));
        match last {
            None => self.slots[slot] = Some(index),
            Some(last) => self.contexts[last].next = Some(index),
        }
        index
    }

    /// Adds `count` events with the given outcome and predicates.
    ///
    /// The predicates must be given in a consistent order across all calls, otherwise contexts
    /// that only differ in the order of their predicates are not merged.
    pub fn add(&mut self, outcome: Symbol, predicates: &[PredicateId], count: u64) -> Result<()> {
        let index = self.find_or_create(predicates);
        self.contexts[index].increment(outcome, count)?;
        self.n_events += count;
        Ok(())
    }

    /// Merges the outcome counts of `old` into the context for `predicates`.
    pub fn merge(&mut self, old: &EventContext, predicates: &[PredicateId]) -> Result<()> {
        let index = self.find_or_create(predicates);
        self.contexts[index].merge(old)?;
        self.n_events += old.total;
        Ok(())
    }

    /// Number of distinct contexts.
    #[inline(always)]
    pub fn n_bins(&self) -> usize {
        self.contexts.len()
    }

    /// Total number of events added.
    #[inline(always)]
    pub fn n_events(&self) -> u64 {
        self.n_events
    }

    /// Iterates over all contexts, slot by slot.
    pub fn contexts(&self) -> impl Iterator<Item = &EventContext> + '_ {
        self.slots.iter().flat_map(move |&head| {
            std::iter::successors(head, move |&index| self.contexts[index].next)
                .map(move |index| &self.contexts[index])
        })
    }

    fn dump(&self, out: &mut impl Write, set: &EventSet, symbols: &SymbolTable) -> Result<()> {
        for (slot, &head) in self.slots.iter().enumerate() {
            if head.is_none() {
                continue;
            }
            writeln!(out, "Slot {slot}:")?;
            let mut link = head;
            while let Some(index) = link {
                let context = &self.contexts[index];
                context.dump(out, set, symbols)?;
                link = context.next;
            }
        }
        Ok(())
    }
}

/// Training events aggregated into contexts and feature counts.
#[derive(Clone, Debug)]
pub struct EventSet {
    outcomes: Box<[Symbol]>,
    predicate_ids: HashTable<Predicate, PredicateId>,
    predicates: Vec<Predicate>,
    features: FeatureTable<u64>,
    table: EventTable,
}

impl EventSet {
    /// Returns an empty set for the given outcome vocabulary.
    pub fn new(outcomes: &[Symbol]) -> Self {
        Self {
            outcomes: outcomes.into(),
            predicate_ids: HashTable::with_buckets(INIT_TABLE_SIZE),
            predicates: Vec::new(),
            features: FeatureTable::with_capacity(INIT_TABLE_SIZE),
            table: EventTable::new(outcomes.len()),
        }
    }

    /// Adds a zero count feature for the empty predicate for every outcome.
    pub fn add_prior_features(&mut self) {
        for &outcome in self.outcomes.iter() {
            self.features.add(outcome, &[], 0);
        }
    }

    fn predicate_id(&mut self, predicate: &Predicate) -> PredicateId {
        if let Some(&id) = self.predicate_ids.get(predicate.symbols()) {
            return id;
        }
        let id = self.predicates.len() as PredicateId;
        self.predicates.push(predicate.clone());
        self.predicate_ids.insert_unique_unchecked(predicate.clone(), id);
        id
    }

    /// Adds `count` copies of `event`.
    ///
    /// Predicates are binned by their ids in order of first occurrence, so the order in which an
    /// event lists its predicates does not matter.
    pub fn add_event(&mut self, event: &MaxEntEvent, count: u64) -> Result<()> {
        let mut sorted_ids = Vec::with_capacity(event.len());
        for predicate in event.predicates() {
            sorted_ids.push(self.predicate_id(predicate));
            self.features.add(event.outcome(), predicate, count);
        }
        sorted_ids.sort_unstable();
        self.table.add(event.outcome(), &sorted_ids, count)
    }

    fn has_any_feature(&self, predicate: PredicateId) -> bool {
        let predicate = &self.predicates[predicate as usize];
        self.outcomes
            .iter()
            .any(|&outcome| self.features.lookup(outcome, predicate) != 0)
    }

    /// Removes all features seen fewer than `threshold` times and rebins the contexts.
    ///
    /// Contexts that only differed in removed predicates are merged. A context left without any
    /// predicate, or an observed (context, outcome) pair without any remaining feature, is an
    /// [`Error::UnexpectedInput`]. Thresholds up to 1 leave the set unchanged.
    pub fn prune(&mut self, threshold: u64) -> Result<()> {
        if threshold <= 1 {
            return Ok(());
        }
        let features_before = self.features.len();
        let contexts_before = self.table.n_bins();

        self.features.prune(threshold);

        let mut new_table = EventTable::new(self.outcomes.len());
        let mut new_predicates = Vec::new();
        for context in self.table.contexts() {
            new_predicates.clear();
            new_predicates.extend(
                context
                    .predicates()
                    .iter()
                    .copied()
                    .filter(|&id| self.has_any_feature(id)),
            );
            if new_predicates.is_empty() {
                return Err(Error::input(
                    "EventSet::prune",
                    "no active predicates in training event after pruning",
                ));
            }
            new_table.merge(context, &new_predicates)?;
        }
        self.table = new_table;

        for context in self.table.contexts() {
            for &(outcome, count) in context.outcomes() {
                if count == 0 || count >= threshold {
                    continue;
                }
                let has_feature = context.predicates().iter().any(|&id| {
                    self.features
                        .lookup(outcome, &self.predicates[id as usize])
                        != 0
                });
                if !has_feature {
                    return Err(Error::input(
                        "EventSet::prune",
                        "no active features in training event after pruning",
                    ));
                }
            }
        }

        log::info!(
            "pruned at {threshold}: {features_before} -> {} features, {contexts_before} -> {} contexts",
            self.features.len(),
            self.table.n_bins()
        );
        Ok(())
    }

    /// Number of features of `outcome` that are present for the predicates of `context`.
    pub fn active_features(&self, context: &EventContext, outcome: Symbol) -> usize {
        context
            .predicates()
            .iter()
            .filter(|&&id| {
                self.features
                    .lookup(outcome, &self.predicates[id as usize])
                    != 0
            })
            .count()
    }

    /// Largest number of features present in any observed (context, outcome) pair.
    ///
    /// This is the constant `C` of generalized iterative scaling.
    pub fn max_context_features(&self) -> usize {
        self.table
            .contexts()
            .flat_map(|context| {
                context
                    .outcomes()
                    .iter()
                    .map(move |&(outcome, _)| self.active_features(context, outcome))
            })
            .max()
            .unwrap_or(0)
    }

    /// Returns the id of the feature for `outcome` and the predicate with id `predicate`.
    pub fn feature_id(&self, outcome: Symbol, predicate: PredicateId) -> Option<FeatureId> {
        let predicate = self.predicates.get(predicate as usize)?;
        self.features.id(outcome, predicate)
    }

    /// Returns the predicate with the given id.
    pub fn predicate(&self, id: PredicateId) -> Result<&Predicate> {
        self.predicates.get(id as usize).ok_or_else(|| {
            Error::index_out_of_bounds("EventSet::predicate", self.predicates.len(), id as usize)
        })
    }

    /// Returns the outcome at `index` of the outcome vocabulary.
    pub fn outcome(&self, index: usize) -> Result<Symbol> {
        self.outcomes
            .get(index)
            .copied()
            .ok_or_else(|| Error::index_out_of_bounds("EventSet::outcome", self.outcomes.len(), index))
    }

    /// The outcome vocabulary.
    pub fn outcomes(&self) -> &[Symbol] {
        &self.outcomes
    }

    /// Feature counts.
    pub fn features(&self) -> &FeatureTable<u64> {
        &self.features
    }

    /// Number of features.
    pub fn n_features(&self) -> usize {
        self.features.len()
    }

    /// Number of distinct predicates seen so far, including pruned ones.
    pub fn n_predicates(&self) -> usize {
        self.predicates.len()
    }

    /// Number of distinct contexts.
    pub fn n_contexts(&self) -> usize {
        self.table.n_bins()
    }

    /// Total number of events added.
    pub fn n_events(&self) -> u64 {
        self.table.n_events()
    }

    /// The context bins.
    pub fn table(&self) -> &EventTable {
        &self.table
    }

    /// Iterates over all contexts.
    pub fn contexts(&self) -> impl Iterator<Item = &EventContext> + '_ {
        self.table.contexts()
    }

    /// Writes a human readable description of the whole set.
    pub fn dump(&self, out: &mut impl Write, symbols: &SymbolTable) -> Result<()> {
        writeln!(out, "Predicates (total: {})", self.predicates.len())?;
        for predicate in self.predicates.iter() {
            writeln!(out, "{}", predicate.display(symbols))?;
        }
        writeln!(out, "Event Table:")?;
        writeln!(out, "Number of Bins: {}", self.table.n_bins())?;
        writeln!(out, "Number of Events: {}", self.table.n_events())?;
        self.table.dump(out, self, symbols)?;
        writeln!(out, "Feature Table:")?;
        self.features.write_to(out, symbols)
    }
}
