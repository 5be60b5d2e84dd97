//! Events fed to training and scoring.
use crate::{
    error::{Error, Result},
    predicate::Predicate,
    symbol::Symbol,
};

/// A training or scoring example: an outcome together with the context predicates that hold.
///
/// The number of predicates is bounded by the capacity given at construction.
#[derive(Clone, Debug)]
pub struct MaxEntEvent {
    outcome: Symbol,
    predicates: Vec<Predicate>,
    max_predicates: usize,
}

impl MaxEntEvent {
    /// Returns an event without predicates that can hold up to `max_predicates` predicates.
    pub fn new(outcome: Symbol, max_predicates: usize) -> Self {
        Self {
            outcome,
            predicates: Vec::with_capacity(max_predicates),
            max_predicates,
        }
    }

    /// Returns an event holding exactly the given predicates.
    pub fn with_predicates(outcome: Symbol, predicates: Vec<Predicate>) -> Self {
        let max_predicates = predicates.len();
        Self {
            outcome,
            predicates,
            max_predicates,
        }
    }

    /// The outcome of this event.
    #[inline(always)]
    pub fn outcome(&self) -> Symbol {
        self.outcome
    }

    /// Replaces the outcome, keeping the predicates.
    pub fn set_outcome(&mut self, outcome: Symbol) {
        self.outcome = outcome;
    }

    /// Adds a context predicate.
    ///
    /// Exceeding the capacity is an [`Error::InternalInconsistency`].
    pub fn add_predicate(&mut self, predicate: impl Into<Predicate>) -> Result<()> {
        if self.predicates.len() == self.max_predicates {
            return Err(Error::internal(
                "MaxEntEvent::add_predicate",
                format!(
                    "number of predicates exceeds the maximum of {}",
                    self.max_predicates
                ),
            ));
        }
        self.predicates.push(predicate.into());
        Ok(())
    }

    /// Returns the context predicate at `index`.
    pub fn predicate(&self, index: usize) -> Result<&Predicate> {
        self.predicates.get(index).ok_or_else(|| {
            Error::index_out_of_bounds("MaxEntEvent::predicate", self.predicates.len(), index)
        })
    }

    /// All context predicates, in the order they were added.
    #[inline(always)]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Number of context predicates.
    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    /// Returns `true` if the event has no context predicates.
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Maximum number of context predicates.
    pub fn max_predicates(&self) -> usize {
        self.max_predicates
    }

    /// Removes all predicates.
    pub fn reset(&mut self) {
        self.predicates.clear();
    }
}
