//! Maximum entropy model: training front end, scoring and persistence.
use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
};

use flussab::{write::text::ascii_digits, DeferredWriter};

use crate::{
    error::{Error, Result},
    event::MaxEntEvent,
    event_set::EventSet,
    feature_table::FeatureTable,
    model_file::TokenReader,
    options::TrainOptions,
    predicate::Predicate,
    symbol::{Symbol, SymbolTable},
    train::{self, TrainingReport},
};

/// File name extension of saved models.
pub const MODEL_EXTENSION: &str = "maxent";

/// Returns the file a model saved under `prefix` is stored in.
pub fn model_path(prefix: impl AsRef<Path>) -> PathBuf {
    let mut path = prefix.as_ref().as_os_str().to_owned();
    path.push(".");
    path.push(MODEL_EXTENSION);
    PathBuf::from(path)
}

#[derive(Clone, Debug)]
struct Training {
    options: TrainOptions,
    observed: EventSet,
    held_out: EventSet,
    n_added: u64,
}

/// Returns how many of `count` events added after `added` earlier ones are held out.
///
/// Every `100 / percent`-th event is held out, counting across calls.
fn held_out_share(percent: u32, added: u64, count: u64) -> u64 {
    if percent == 0 {
        return 0;
    }
    let n = u64::from(100 / percent);
    let phase = added % n;
    if phase == 0 {
        count.div_ceil(n)
    } else if phase + count > n {
        (phase + count) / n
    } else {
        0
    }
}

/// A conditional maximum entropy model over a fixed set of outcomes.
///
/// A model is either built fresh for training or read from a model file. A fresh model accumulates
/// events with [`add_event`][Self::add_event] until [`derive_model`][Self::derive_model] estimates
/// the feature weights, after which it only answers scoring queries. Loaded models start out
/// trained.
#[derive(Clone, Debug)]
pub struct MaxEntModel {
    outcomes: Box<[Symbol]>,
    constant_c: usize,
    correction_alpha: f64,
    alphas: FeatureTable<f64>,
    training: Option<Box<Training>>,
    trained: bool,
}

impl MaxEntModel {
    /// Returns an untrained model over `outcomes`, ready to accumulate events.
    pub fn new(outcomes: &[Symbol], options: TrainOptions) -> Result<Self> {
        options.validate()?;
        if outcomes.is_empty() {
            return Err(Error::input("MaxEntModel::new", "no outcomes given"));
        }
        for (i, outcome) in outcomes.iter().enumerate() {
            if outcomes[..i].contains(outcome) {
                return Err(Error::input("MaxEntModel::new", "duplicate outcome"));
            }
        }

        Ok(Self {
            outcomes: outcomes.into(),
            constant_c: 0,
            correction_alpha: 0.0,
            alphas: FeatureTable::new(),
            training: Some(Box::new(Training {
                options,
                observed: EventSet::new(outcomes),
                held_out: EventSet::new(outcomes),
                n_added: 0,
            })),
            trained: false,
        })
    }

    fn training_mut(&mut self, location: &'static str) -> Result<&mut Training> {
        match self.training.as_deref_mut() {
            Some(training) => Ok(training),
            None => Err(Error::internal(
                location,
                "model is no longer accumulating events",
            )),
        }
    }

    /// The outcomes of this model, in score order.
    pub fn outcomes(&self) -> &[Symbol] {
        &self.outcomes
    }

    /// Largest number of features that contribute to a score.
    pub fn constant_c(&self) -> usize {
        self.constant_c
    }

    /// Weight of the correction feature.
    pub fn correction_alpha(&self) -> f64 {
        self.correction_alpha
    }

    /// Feature weights of the trained model.
    pub fn alphas(&self) -> &FeatureTable<f64> {
        &self.alphas
    }

    /// Returns `true` once feature weights are available.
    pub fn is_trained(&self) -> bool {
        self.trained
    }

    /// Events accumulated for estimating the weights, while training.
    pub fn observed_events(&self) -> Option<&EventSet> {
        Some(&self.training.as_deref()?.observed)
    }

    /// Events accumulated for measuring the held-out likelihood, while training.
    pub fn held_out_events(&self) -> Option<&EventSet> {
        Some(&self.training.as_deref()?.held_out)
    }

    /// Adds a zero count feature for the empty predicate for every outcome.
    pub fn add_prior_features(&mut self) -> Result<()> {
        self.training_mut("MaxEntModel::add_prior_features")?
            .observed
            .add_prior_features();
        Ok(())
    }

    /// Adds `count` copies of a training event.
    ///
    /// Events are split between the observed and the held-out set following the held-out
    /// percentage of the training options.
    pub fn add_event(&mut self, event: &MaxEntEvent, count: u64) -> Result<()> {
        if !self.outcomes.contains(&event.outcome()) {
            return Err(Error::input(
                "MaxEntModel::add_event",
                format!("unknown outcome {:?}", event.outcome()),
            ));
        }
        let training = self.training_mut("MaxEntModel::add_event")?;

        let held_out = held_out_share(training.options.percent_held_out, training.n_added, count);
        let observed = count - held_out;
        training.n_added += count;

        if observed > 0 {
            training.observed.add_event(event, observed)?;
        }
        if held_out > 0 {
            training.held_out.add_event(event, held_out)?;
        }
        Ok(())
    }

    /// Prunes features seen fewer than `pruning_threshold` times and estimates the weights of
    /// the remaining ones.
    ///
    /// Training stops once the configured stop criterion changes by no more than `threshold`
    /// between iterations. The accumulated events are released afterwards, so this can only be
    /// called once.
    pub fn derive_model(&mut self, pruning_threshold: u64, threshold: f64) -> Result<TrainingReport> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(Error::input(
                "MaxEntModel::derive_model",
                format!("convergence threshold must be finite and non-negative, got {threshold}"),
            ));
        }
        let Some(mut training) = self.training.take() else {
            return Err(Error::internal(
                "MaxEntModel::derive_model",
                "model was already derived",
            ));
        };

        let (trained, report) = train::derive_model(
            &training.options,
            &self.outcomes,
            &mut training.observed,
            &training.held_out,
            pruning_threshold,
            threshold,
        )?;

        self.constant_c = trained.constant_c;
        self.correction_alpha = trained.correction_alpha;
        self.alphas = trained.alphas;
        self.trained = true;
        Ok(report)
    }

    fn outcome_score(&self, outcome: Symbol, predicates: &[Predicate]) -> f64 {
        let mut score = 0.0;
        let mut used = 0;
        for predicate in predicates {
            if used >= self.constant_c {
                break;
            }
            let alpha = self.alphas.lookup(outcome, predicate);
            if alpha != 0.0 {
                score += alpha;
                used += 1;
            }
        }
        if used < self.constant_c {
            score += (self.constant_c - used) as f64 * self.correction_alpha;
        }
        score
    }

    /// Unnormalized log score of the event's outcome given its predicates.
    ///
    /// Predicates without a weight for the outcome do not contribute.
    pub fn score(&self, event: &MaxEntEvent) -> f64 {
        self.outcome_score(event.outcome(), event.predicates())
    }

    /// Probability of every outcome given `predicates`, in [`outcomes`][Self::outcomes] order.
    pub fn probabilities(&self, predicates: &[Predicate]) -> Vec<f64> {
        let mut scores: Vec<f64> = self
            .outcomes
            .iter()
            .map(|&outcome| self.outcome_score(outcome, predicates))
            .collect();
        let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mut sum = 0.0;
        for score in scores.iter_mut() {
            *score = (*score - max).exp();
            sum += *score;
        }
        for score in scores.iter_mut() {
            *score /= sum;
        }
        scores
    }

    /// Probability of the event's outcome given its predicates.
    pub fn probability(&self, event: &MaxEntEvent) -> Result<f64> {
        let Some(index) = self.outcomes.iter().position(|&o| o == event.outcome()) else {
            return Err(Error::input(
                "MaxEntModel::probability",
                format!("unknown outcome {:?}", event.outcome()),
            ));
        };
        Ok(self.probabilities(event.predicates())[index])
    }

    /// Computes [`score`][Self::score] while writing every contribution to `out`.
    pub fn score_and_debug(
        &self,
        event: &MaxEntEvent,
        out: &mut impl Write,
        symbols: &SymbolTable,
    ) -> Result<f64> {
        let outcome = event.outcome();
        writeln!(out, "Calculating score for outcome: {}", symbols.name(outcome))?;

        let mut score = 0.0;
        let mut used = 0;
        for predicate in event.predicates() {
            if used >= self.constant_c {
                break;
            }
            let alpha = self.alphas.lookup(outcome, predicate);
            if alpha != 0.0 {
                writeln!(out, "{} {alpha}", predicate.display(symbols))?;
                score += alpha;
                used += 1;
            }
        }
        if used < self.constant_c {
            let correction = (self.constant_c - used) as f64 * self.correction_alpha;
            writeln!(out, "Correction Alpha Value: {correction}")?;
            score += correction;
        }
        writeln!(out, "FINAL SCORE: {score}")?;
        writeln!(out)?;
        Ok(score)
    }

    /// Writes the model in model file format.
    ///
    /// The format is a sequence of whitespace separated tokens: the constant C, the correction
    /// weight, the outcome count followed by the outcomes, and the weight table, see
    /// [`FeatureTable::write_to`].
    pub fn write_to(&self, write: impl Write, symbols: &SymbolTable) -> Result<()> {
        let mut writer = DeferredWriter::from_write(write);
        self.write_model(&mut writer, symbols);
        writer.flush()?;
        Ok(())
    }

    /// Writes the model to a [`DeferredWriter`], deferring IO errors.
    pub fn write_model(&self, writer: &mut DeferredWriter, symbols: &SymbolTable) {
        ascii_digits(writer, self.constant_c);
        writer.write_all_defer_err(b"\n");
        writer.write_all_defer_err(self.correction_alpha.to_string().as_bytes());
        writer.write_all_defer_err(b"\n");
        ascii_digits(writer, self.outcomes.len());
        writer.write_all_defer_err(b"\n");
        for &outcome in self.outcomes.iter() {
            writer.write_all_defer_err(symbols.name(outcome).as_bytes());
            writer.write_all_defer_err(b"\n");
        }
        self.alphas.write_to(writer, symbols);
    }

    /// Reads a trained model in model file format.
    ///
    /// Reading stops after the last feature, so the stream may continue with further data.
    pub fn read_from(reader: &mut TokenReader, symbols: &mut SymbolTable) -> Result<Self> {
        let constant_c: usize = reader.parse("constant C")?;
        let correction_alpha: f64 = reader.parse("correction alpha")?;
        let n_outcomes: usize = reader.parse("outcome count")?;
        if n_outcomes == 0 {
            return Err(Error::input(
                "MaxEntModel::read_from",
                "model has no outcomes",
            ));
        }
        let mut outcomes = Vec::with_capacity(n_outcomes);
        for _ in 0..n_outcomes {
            outcomes.push(symbols.intern(reader.expect_token("outcome")?));
        }
        let alphas = FeatureTable::read_from(reader, symbols)?;

        Ok(Self {
            outcomes: outcomes.into(),
            constant_c,
            correction_alpha,
            alphas,
            training: None,
            trained: true,
        })
    }

    /// Writes the model to the file for `prefix`, see [`model_path`].
    pub fn save(&self, prefix: impl AsRef<Path>, symbols: &SymbolTable) -> Result<()> {
        let path = model_path(prefix);
        self.write_to(File::create(&path)?, symbols)?;
        log::info!("wrote model to {}", path.display());
        Ok(())
    }

    /// Reads a model from the file for `prefix`, see [`model_path`].
    pub fn load(prefix: impl AsRef<Path>, symbols: &mut SymbolTable) -> Result<Self> {
        let path = model_path(prefix);
        let file = File::open(&path)?;
        let model = Self::read_from(&mut TokenReader::new(file), symbols)?;
        log::debug!(
            "read model with {} features from {}",
            model.alphas.len(),
            path.display()
        );
        Ok(model)
    }
}
