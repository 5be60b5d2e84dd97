//! Training hyper-parameters.
use std::{fmt, str::FromStr};

use crate::error::{Error, Result};

/// Largest number of features feature selection may add per round.
pub const MAX_FEATURES_TO_ADD: usize = 10;

/// Parameter estimation algorithm.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum TrainMode {
    /// Generalized iterative scaling with a correction feature.
    #[default]
    Gis,
    /// Improved iterative scaling.
    Iis,
    /// Improved iterative scaling with a Gaussian prior on the weights.
    IisGaussian,
    /// Improved iterative scaling that greedily activates features by approximate gain.
    IisFeatureSelection,
}

/// Criterion ending the iterative scaling loop.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum StopCriterion {
    /// Stop once no predicted probability moves by more than the threshold.
    #[default]
    ProbsConverge,
    /// Stop once the held-out log likelihood changes by no more than the threshold.
    HeldOutLikelihood,
}

impl TrainMode {
    /// All modes, in parameter file order.
    pub const ALL: [TrainMode; 4] = [
        TrainMode::Gis,
        TrainMode::Iis,
        TrainMode::IisGaussian,
        TrainMode::IisFeatureSelection,
    ];

    /// The parameter spelling of this mode.
    pub fn name(self) -> &'static str {
        match self {
            TrainMode::Gis => "GIS",
            TrainMode::Iis => "IIS",
            TrainMode::IisGaussian => "IIS_GAUSSIAN",
            TrainMode::IisFeatureSelection => "IIS_FEATURE_SELECTION",
        }
    }
}

impl StopCriterion {
    /// All criteria.
    pub const ALL: [StopCriterion; 2] = [
        StopCriterion::ProbsConverge,
        StopCriterion::HeldOutLikelihood,
    ];

    /// The parameter spelling of this criterion.
    pub fn name(self) -> &'static str {
        match self {
            StopCriterion::ProbsConverge => "PROBS_CONVERGE",
            StopCriterion::HeldOutLikelihood => "HELD_OUT_LIKELIHOOD",
        }
    }
}

impl fmt::Display for TrainMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for StopCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TrainMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.name() == s)
            .ok_or_else(|| Error::input("TrainMode::from_str", format!("unknown training mode {s:?}")))
    }
}

impl FromStr for StopCriterion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|criterion| criterion.name() == s)
            .ok_or_else(|| {
                Error::input(
                    "StopCriterion::from_str",
                    format!("unknown stop criterion {s:?}"),
                )
            })
    }
}

/// Settings for training a [`MaxEntModel`][crate::MaxEntModel].
#[derive(Clone, Debug, PartialEq)]
pub struct TrainOptions {
    /// Parameter estimation algorithm.
    pub mode: TrainMode,
    /// When to end the iterative scaling loop.
    pub stop_criterion: StopCriterion,
    /// Percentage of training events withheld for measuring the held-out likelihood.
    pub percent_held_out: u32,
    /// Variance of the Gaussian prior, only used by [`TrainMode::IisGaussian`]. Zero disables
    /// the prior.
    pub variance: f64,
    /// Number of features feature selection activates per round.
    pub n_features_to_add: usize,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            mode: TrainMode::Gis,
            stop_criterion: StopCriterion::ProbsConverge,
            percent_held_out: 0,
            variance: 1.0,
            n_features_to_add: 1,
        }
    }
}

impl TrainOptions {
    /// Checks that all settings are within their valid ranges.
    pub fn validate(&self) -> Result<()> {
        if self.percent_held_out > 100 {
            return Err(Error::input(
                "TrainOptions::validate",
                format!(
                    "percent held out must be between 0 and 100, got {}",
                    self.percent_held_out
                ),
            ));
        }
        if !(1..=MAX_FEATURES_TO_ADD).contains(&self.n_features_to_add) {
            return Err(Error::input(
                "TrainOptions::validate",
                format!(
                    "number of features to add must be between 1 and {MAX_FEATURES_TO_ADD}, got {}",
                    self.n_features_to_add
                ),
            ));
        }
        if !self.variance.is_finite() || self.variance < 0.0 {
            return Err(Error::input(
                "TrainOptions::validate",
                format!("variance must be finite and non-negative, got {}", self.variance),
            ));
        }
        Ok(())
    }
}
