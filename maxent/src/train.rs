//! Iterative scaling over aggregated training events.
//!
//! The observed and held-out [`EventSet`]s are first denormalized into dense [`Grid`]s with one
//! row per context. The scaling loop then alternates between updating the feature weights,
//! recomputing the predicted outcome distribution of every context and recomputing the model
//! expectation of every feature, until the configured [`StopCriterion`] is met.
//!
//! In feature selection mode an outer loop starts with no active features and activates the
//! candidates with the largest approximate gain in likelihood after each run of the scaling loop.
use std::time::{Duration, Instant};

use crate::{
    error::{Error, Result},
    event_set::EventSet,
    feature_table::{FeatureId, FeatureTable},
    log_or_zero,
    options::{StopCriterion, TrainMode, TrainOptions},
    symbol::Symbol,
};

use self::grid::{ContextRow, Grid};

mod grid;

/// Upper bound on the iterations of one run of the scaling loop.
pub const MAX_ITERATIONS: usize = 1000;

const MAX_NEWTON_ITERATIONS: usize = 100;
const NEWTON_TOLERANCE: f64 = 0.0001;
const INITIAL_GAMMA: f64 = 1.1;

/// Number of feature selection rounds inspected when deciding convergence.
const LIKELIHOOD_HISTORY: usize = 10;

/// Summary of a finished training run.
#[derive(Clone, Debug, PartialEq)]
pub struct TrainingReport {
    /// Largest number of active features in any observed (context, outcome) pair.
    pub constant_c: usize,
    /// Number of features remaining after pruning.
    pub n_features: usize,
    /// Number of features with a weight in the trained model.
    pub n_active_features: usize,
    /// Number of distinct observed contexts after pruning.
    pub n_contexts: usize,
    /// Number of feature selection rounds, 1 for the other modes.
    pub rounds: usize,
    /// Total number of scaling iterations over all rounds.
    pub iterations: usize,
    /// Log likelihood of the held-out events under the final weights.
    pub held_out_likelihood: f64,
    /// Log likelihood of the observed events under the final weights.
    pub training_likelihood: f64,
    /// Wall clock time spent training.
    pub elapsed: Duration,
}

/// Weights produced by training.
pub(crate) struct Trained {
    pub constant_c: usize,
    pub correction_alpha: f64,
    pub alphas: FeatureTable<f64>,
}

/// Prunes `observed` and estimates feature weights from it.
pub(crate) fn derive_model(
    options: &TrainOptions,
    outcomes: &[Symbol],
    observed: &mut EventSet,
    held_out: &EventSet,
    pruning_threshold: u64,
    threshold: f64,
) -> Result<(Trained, TrainingReport)> {
    let start = Instant::now();

    observed.prune(pruning_threshold)?;
    if observed.n_events() == 0 {
        return Err(Error::input(
            "MaxEntModel::derive_model",
            "no training events were added",
        ));
    }
    if options.stop_criterion == StopCriterion::HeldOutLikelihood && held_out.n_events() == 0 {
        log::warn!("stopping on held-out likelihood without any held-out events");
    }

    let constant_c = observed.max_context_features();
    log::info!(
        "training {} with {} features over {} contexts ({} events), {} held-out events, C = {constant_c}",
        options.mode,
        observed.n_features(),
        observed.n_contexts(),
        observed.n_events(),
        held_out.n_events(),
    );

    let mut trainer = Trainer::new(options, outcomes, observed, held_out, constant_c)?;
    trainer.calculate_observed_probs(observed.features(), observed.n_events());

    let selecting = options.mode == TrainMode::IisFeatureSelection;
    let mut rounds = 0;
    let mut iterations = 0;
    let mut last_held_out = crate::LOG_OF_ZERO;
    let mut held_out_history = [0.0; LIKELIHOOD_HISTORY];

    loop {
        let mut converged = true;
        if selecting && rounds > 0 {
            let added = trainer.add_best_features(options.n_features_to_add);
            log::info!("round {rounds}: activated {added} features");
            if added == 0 {
                log::info!("no feature with a finite gain left to activate");
                break;
            }
        }

        iterations += trainer.scale(threshold);

        let held_out = trainer.held_out_log_likelihood();
        let training = trainer.training_log_likelihood();
        log::info!(
            "round {rounds}: held-out log likelihood {held_out}, training log likelihood {training}"
        );

        if selecting {
            held_out_history.rotate_right(1);
            held_out_history[0] = held_out - last_held_out;
            last_held_out = held_out;
            converged = held_out_history.iter().all(|&diff| diff <= 0.0)
                && rounds >= LIKELIHOOD_HISTORY
                && rounds > 2 * outcomes.len();
        }
        rounds += 1;
        if converged {
            break;
        }
    }

    let held_out_likelihood = trainer.held_out_log_likelihood();
    let training_likelihood = trainer.training_log_likelihood();

    let trained = trainer.build_alpha_table(observed.features());
    let report = TrainingReport {
        constant_c,
        n_features: observed.n_features(),
        n_active_features: trained.alphas.len(),
        n_contexts: observed.n_contexts(),
        rounds,
        iterations,
        held_out_likelihood,
        training_likelihood,
        elapsed: start.elapsed(),
    };
    log::info!(
        "trained {} of {} features in {} iterations, {:.3?}",
        report.n_active_features,
        report.n_features,
        report.iterations,
        report.elapsed,
    );
    Ok((trained, report))
}

/// Subtracts the maximum before exponentiating so large weights cannot overflow.
fn normalize(scores: &mut [f64]) {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for score in scores.iter_mut() {
        *score = (*score - max).exp();
        sum += *score;
    }
    for score in scores.iter_mut() {
        *score /= sum;
    }
}

struct Trainer<'a> {
    options: &'a TrainOptions,
    n_outcomes: usize,
    constant_c: usize,
    inverse_c: f64,
    observed: Grid,
    held_out: Grid,
    /// Outcome index of each feature.
    feature_outcomes: Vec<usize>,
    active: Vec<bool>,
    /// One weight per feature, followed by the correction feature weight.
    log_alphas: Vec<f64>,
    observed_probs: Vec<f64>,
    expectations: Vec<f64>,
}

impl<'a> Trainer<'a> {
    fn new(
        options: &'a TrainOptions,
        outcomes: &[Symbol],
        observed: &EventSet,
        held_out: &EventSet,
        constant_c: usize,
    ) -> Result<Self> {
        let features = observed.features();
        let n_features = features.len();

        let mut feature_outcomes = Vec::with_capacity(n_features);
        for feature in features.iter() {
            let Some(index) = outcomes.iter().position(|&outcome| outcome == feature.outcome)
            else {
                return Err(Error::internal(
                    "Trainer::new",
                    "feature outcome is not a model outcome",
                ));
            };
            feature_outcomes.push(index);
        }

        let active = vec![options.mode != TrainMode::IisFeatureSelection; n_features];
        let observed_grid = Grid::build(observed, features, outcomes, &active)?;
        let held_out_grid = Grid::build(held_out, features, outcomes, &active)?;

        Ok(Self {
            options,
            n_outcomes: outcomes.len(),
            constant_c,
            inverse_c: if constant_c == 0 {
                0.0
            } else {
                1.0 / constant_c as f64
            },
            observed: observed_grid,
            held_out: held_out_grid,
            feature_outcomes,
            active,
            log_alphas: vec![0.0; n_features + 1],
            observed_probs: vec![0.0; n_features + 1],
            expectations: vec![0.0; n_features + 1],
        })
    }

    fn n_features(&self) -> usize {
        self.feature_outcomes.len()
    }

    fn uses_correction(&self) -> bool {
        self.options.mode == TrainMode::Gis
    }

    fn calculate_observed_probs(&mut self, features: &FeatureTable<u64>, n_events: u64) {
        let n_events = n_events as f64;
        for (prob, feature) in self.observed_probs.iter_mut().zip(features.iter()) {
            *prob = feature.value as f64 / n_events;
        }

        let correction = self.n_features();
        self.observed_probs[correction] = 0.0;
        if self.uses_correction() && self.constant_c > 0 {
            let c = self.constant_c as f64;
            let mut sum = 0.0;
            for row in self.observed.rows.iter() {
                for (observed, &count) in row.observed.iter().zip(row.predicate_counts.iter()) {
                    sum += (c - count as f64) * observed;
                }
            }
            self.observed_probs[correction] = sum / c;
        }
    }

    /// Runs the scaling loop until the stop criterion is met and returns the iteration count.
    fn scale(&mut self, threshold: f64) -> usize {
        for row in self.observed.rows.iter_mut() {
            row.last_predicted.fill(0.0);
        }

        let mut last_held_out = crate::LOG_OF_ZERO;
        let mut iter = 0;
        while iter < MAX_ITERATIONS {
            self.find_alphas(iter);
            let probs_moved = self.find_predicted_probs(threshold);
            self.find_expectations();
            let held_out = self.held_out_log_likelihood();
            let held_out_moved = (held_out - last_held_out).abs() > threshold;
            last_held_out = held_out;

            if iter % 100 == 0 {
                log::info!("iteration {iter}, held-out log likelihood {held_out}");
                self.trace_alphas();
            }
            iter += 1;

            let not_converged = match self.options.stop_criterion {
                StopCriterion::ProbsConverge => probs_moved,
                StopCriterion::HeldOutLikelihood => held_out_moved,
            };
            // The first iteration only evaluates the initial weights.
            if iter > 1 && !not_converged {
                break;
            }
        }
        log::debug!("scaling stopped after {iter} iterations");
        iter
    }

    fn trace_alphas(&self) {
        if !log::log_enabled!(log::Level::Trace) {
            return;
        }
        for (id, alpha) in self.log_alphas.iter().enumerate() {
            if id == self.n_features() {
                log::trace!("correction alpha {alpha}");
            } else if self.active[id] {
                log::trace!("alpha[{id}] {alpha}");
            }
        }
    }

    fn find_alphas(&mut self, iter: usize) {
        if iter == 0 {
            return;
        }
        if self.uses_correction() {
            for id in 0..self.log_alphas.len() {
                self.log_alphas[id] += self.inverse_c
                    * (log_or_zero(self.observed_probs[id]) - log_or_zero(self.expectations[id]));
            }
        } else {
            for id in 0..self.n_features() {
                if self.active[id] {
                    let step = self.newtons_method(id);
                    self.log_alphas[id] += step;
                }
            }
        }
    }

    /// Solves for the multiplicative weight update of one feature.
    fn newtons_method(&self, feature: FeatureId) -> f64 {
        let outcome = self.feature_outcomes[feature];
        let observed = self.observed_probs[feature];
        let prior_variance = match self.options.mode {
            TrainMode::IisGaussian if self.options.variance != 0.0 => Some(self.options.variance),
            _ => None,
        };

        let mut gamma = INITIAL_GAMMA;
        for step in 0..MAX_NEWTON_ITERATIONS {
            let mut numerator = 0.0;
            let mut denominator = 0.0;
            for row in self.observed.rows.iter() {
                if !row.has_feature(outcome, feature) {
                    continue;
                }
                let weight = row.context_prob * row.predicted[outcome];
                let count = row.predicate_counts[outcome] as i32;
                numerator += weight * gamma.powi(count);
                denominator += weight * count as f64 * gamma.powi(count - 1);
            }
            if let Some(variance) = prior_variance {
                numerator += (self.log_alphas[feature] + log_or_zero(gamma)) / variance;
                denominator += 1.0 / (variance * gamma);
            }
            if denominator == 0.0 {
                // No context carries the feature, so there is nothing to scale.
                if step == 0 {
                    return 0.0;
                }
                break;
            }

            let next = gamma + (observed - numerator) / denominator;
            if !next.is_finite() || next <= 0.0 {
                break;
            }
            let delta = (next - gamma).abs();
            gamma = next;
            if delta < NEWTON_TOLERANCE {
                break;
            }
        }
        log_or_zero(gamma)
    }

    fn predict(&self, row: &mut ContextRow) {
        let correction_alpha = self.log_alphas[self.n_features()];
        for outcome in 0..self.n_outcomes {
            let mut score: f64 = row
                .features(outcome)
                .iter()
                .flatten()
                .filter(|&&id| self.active[id])
                .take(self.constant_c)
                .map(|&id| self.log_alphas[id])
                .sum();
            if self.uses_correction() {
                let unused = self.constant_c.saturating_sub(row.predicate_counts[outcome]);
                score += unused as f64 * correction_alpha;
            }
            row.predicted[outcome] = score;
        }
        normalize(&mut row.predicted);
    }

    /// Recomputes the predicted distributions and returns whether any moved by more than
    /// `threshold` since it was last recorded.
    fn find_predicted_probs(&mut self, threshold: f64) -> bool {
        let mut rows = std::mem::take(&mut self.observed.rows);
        let mut moved = false;
        for row in rows.iter_mut() {
            self.predict(row);
            for (predicted, last) in row.predicted.iter().zip(row.last_predicted.iter_mut()) {
                if (predicted - *last).abs() > threshold {
                    moved = true;
                    *last = *predicted;
                }
            }
        }
        self.observed.rows = rows;
        moved
    }

    fn find_expectations(&mut self) {
        self.expectations.fill(0.0);
        let correction = self.n_features();
        for row in self.observed.rows.iter() {
            for outcome in 0..self.n_outcomes {
                let weight = row.context_prob * row.predicted[outcome];
                for &id in row.features(outcome).iter().flatten() {
                    self.expectations[id] += weight;
                }
                if self.uses_correction() {
                    let unused = self.constant_c.saturating_sub(row.predicate_counts[outcome]);
                    self.expectations[correction] += unused as f64 * self.inverse_c * weight;
                }
            }
        }
    }

    fn held_out_log_likelihood(&mut self) -> f64 {
        let mut rows = std::mem::take(&mut self.held_out.rows);
        let mut likelihood = 0.0;
        for row in rows.iter_mut() {
            self.predict(row);
            for (&observed, &predicted) in row.observed.iter().zip(row.predicted.iter()) {
                if observed > 0.0 {
                    likelihood += observed * log_or_zero(predicted);
                }
            }
        }
        self.held_out.rows = rows;
        likelihood
    }

    fn training_log_likelihood(&self) -> f64 {
        let mut likelihood = 0.0;
        for row in self.observed.rows.iter() {
            for (&observed, &predicted) in row.observed.iter().zip(row.predicted.iter()) {
                if observed > 0.0 {
                    likelihood += observed * log_or_zero(predicted);
                }
            }
        }
        likelihood
    }

    /// Approximate gain in training log likelihood from giving `feature` the weight `alpha`
    /// while keeping all other weights fixed.
    fn gain(&self, feature: FeatureId, alpha: f64) -> f64 {
        let outcome = self.feature_outcomes[feature];
        let factor = alpha.exp();
        let mut gain = 0.0;
        for row in self.observed.rows.iter() {
            let mut z = 0.0;
            for (index, &predicted) in row.predicted.iter().enumerate() {
                if index == outcome && row.has_feature(outcome, feature) {
                    z += predicted * factor;
                } else {
                    z += predicted;
                }
            }
            gain -= row.context_prob * log_or_zero(z);
        }
        gain + alpha * self.observed_probs[feature]
    }

    /// Activates up to `count` inactive features with the largest gain and returns how many
    /// were activated.
    fn add_best_features(&mut self, count: usize) -> usize {
        let mut candidates = Vec::new();
        for id in 0..self.n_features() {
            if self.active[id] {
                continue;
            }
            let observed = self.observed_probs[id];
            let predicted = self.expectations[id];
            let alpha =
                log_or_zero((observed * (1.0 - predicted)) / (predicted * (1.0 - observed)));
            if !alpha.is_finite() || alpha <= crate::LOG_OF_ZERO {
                continue;
            }
            let gain = self.gain(id, alpha);
            if gain.is_finite() {
                candidates.push((gain, id, alpha));
            }
        }

        candidates.sort_by(|a, b| b.0.total_cmp(&a.0));
        candidates.truncate(count);
        for &(gain, id, alpha) in candidates.iter() {
            log::debug!("activating feature {id} with gain {gain} and alpha {alpha}");
            self.active[id] = true;
            self.log_alphas[id] = alpha;
            let outcome = self.feature_outcomes[id];
            self.observed.activate(id, outcome);
            self.held_out.activate(id, outcome);
        }
        candidates.len()
    }

    fn build_alpha_table(&self, features: &FeatureTable<u64>) -> Trained {
        let n_active = self.active.iter().filter(|&&active| active).count();
        let mut alphas = FeatureTable::with_capacity(n_active);
        for (id, feature) in features.iter().enumerate() {
            if self.active[id] {
                alphas.add(feature.outcome, &feature.predicate, self.log_alphas[id]);
            }
        }
        Trained {
            constant_c: self.constant_c,
            correction_alpha: self.log_alphas[self.n_features()],
            alphas,
        }
    }
}
