//! Dense per context working arrays for the scaling loops.
use crate::{
    error::Result,
    event_set::EventSet,
    feature_table::{FeatureId, FeatureTable},
    symbol::Symbol,
};

/// Working state for one context of an [`EventSet`].
pub(super) struct ContextRow {
    /// Fraction of all events of the set that have this context.
    pub context_prob: f64,
    n_predicates: usize,
    /// Feature id of each (outcome, predicate) pair, outcome major.
    feature_ids: Box<[Option<FeatureId>]>,
    /// Fraction of all events of the set that have this context and outcome.
    pub observed: Box<[f64]>,
    /// Model probability of each outcome given this context.
    pub predicted: Box<[f64]>,
    /// Last recorded value of `predicted`, for convergence checks.
    pub last_predicted: Box<[f64]>,
    /// Number of active features per outcome.
    pub predicate_counts: Box<[usize]>,
}

impl ContextRow {
    /// Feature ids of the context predicates for the outcome with index `outcome`.
    #[inline(always)]
    pub fn features(&self, outcome: usize) -> &[Option<FeatureId>] {
        let start = outcome * self.n_predicates;
        &self.feature_ids[start..start + self.n_predicates]
    }

    /// Returns `true` if `feature` is one of the features for `outcome`.
    #[inline]
    pub fn has_feature(&self, outcome: usize, feature: FeatureId) -> bool {
        self.features(outcome).contains(&Some(feature))
    }

    /// Number of times `feature` occurs among the features for `outcome`.
    pub fn feature_occurrences(&self, outcome: usize, feature: FeatureId) -> usize {
        self.features(outcome)
            .iter()
            .filter(|&&id| id == Some(feature))
            .count()
    }
}

/// Working state for all contexts of an [`EventSet`].
pub(super) struct Grid {
    pub rows: Vec<ContextRow>,
}

impl Grid {
    /// Denormalizes the contexts of `events`, resolving feature ids in `features`.
    ///
    /// The feature table may belong to a different event set, which is how held-out contexts are
    /// evaluated with the features of the observed set.
    pub fn build(
        events: &EventSet,
        features: &FeatureTable<u64>,
        outcomes: &[Symbol],
        active: &[bool],
    ) -> Result<Self> {
        let n_outcomes = outcomes.len();
        let n_events = events.n_events() as f64;
        let mut rows = Vec::with_capacity(events.n_contexts());

        for context in events.contexts() {
            let n_predicates = context.predicates().len();
            let mut feature_ids = Vec::with_capacity(n_outcomes * n_predicates);
            let mut predicate_counts = vec![0; n_outcomes];
            let mut observed = vec![0.0; n_outcomes];

            for (j, &outcome) in outcomes.iter().enumerate() {
                for &predicate in context.predicates() {
                    let id = features.id(outcome, events.predicate(predicate)?);
                    if let Some(id) = id {
                        if active[id] {
                            predicate_counts[j] += 1;
                        }
                    }
                    feature_ids.push(id);
                }
                observed[j] = context.count_of(outcome) as f64 / n_events;
            }

            rows.push(ContextRow {
                context_prob: context.total() as f64 / n_events,
                n_predicates,
                feature_ids: feature_ids.into_boxed_slice(),
                observed: observed.into_boxed_slice(),
                predicted: vec![0.0; n_outcomes].into_boxed_slice(),
                last_predicted: vec![0.0; n_outcomes].into_boxed_slice(),
                predicate_counts: predicate_counts.into_boxed_slice(),
            });
        }

        Ok(Self { rows })
    }

    /// Counts a newly activated feature in the predicate counts.
    pub fn activate(&mut self, feature: FeatureId, outcome: usize) {
        for row in self.rows.iter_mut() {
            row.predicate_counts[outcome] += row.feature_occurrences(outcome, feature);
        }
    }
}
