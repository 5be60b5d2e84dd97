//! Conditional maximum entropy models trained by iterative scaling.
//!
//! Training events pair an outcome with the context predicates that hold for it. A
//! [`MaxEntModel`] aggregates them into an [`EventSet`], where events with identical predicates
//! share one [context][event_set::EventContext] and every (outcome, predicate) pair seen in
//! training is a feature. [`MaxEntModel::derive_model`] prunes rare features and estimates one
//! weight per remaining feature using one of the [`TrainMode`]s. A trained model scores outcomes
//! by summing the weights of the features present in an event and turns the scores into
//! probabilities with a softmax over all outcomes.
//!
//! Models are persisted in a whitespace separated text format, see [`MaxEntModel::write_to`].
#![warn(missing_docs)]

pub mod error;
pub mod event;
pub mod event_set;
pub mod feature_table;
pub mod hash;
pub mod model;
pub mod model_file;
pub mod options;
pub mod predicate;
pub mod symbol;

mod train;

pub use error::{Error, Result};
pub use event::MaxEntEvent;
pub use event_set::EventSet;
pub use feature_table::FeatureTable;
pub use model::MaxEntModel;
pub use model_file::TokenReader;
pub use options::{StopCriterion, TrainMode, TrainOptions};
pub use predicate::Predicate;
pub use symbol::{Symbol, SymbolTable};
pub use train::{TrainingReport, MAX_ITERATIONS};

/// Value used in place of the logarithm of zero.
pub const LOG_OF_ZERO: f64 = -10000.0;

/// Natural logarithm that maps zero to [`LOG_OF_ZERO`].
#[inline]
pub fn log_or_zero(x: f64) -> f64 {
    if x == 0.0 {
        LOG_OF_ZERO
    } else {
        x.ln()
    }
}
