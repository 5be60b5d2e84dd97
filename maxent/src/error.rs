//! Error types for training and scoring.

use thiserror::Error;

/// Result type for maxent operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for maxent operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A caller violated an API contract, e.g. by exceeding a capacity or calling operations out
    /// of sequence.
    #[error("internal inconsistency in {location}: {message}")]
    InternalInconsistency {
        /// Operation that detected the violation.
        location: &'static str,
        /// Description of the violation.
        message: String,
    },

    /// The training data, options or a model file are not usable.
    #[error("unexpected input in {location}: {message}")]
    UnexpectedInput {
        /// Operation that rejected the input.
        location: &'static str,
        /// Description of the problem.
        message: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an internal inconsistency error.
    #[must_use]
    pub fn internal(location: &'static str, message: impl Into<String>) -> Self {
        Self::InternalInconsistency {
            location,
            message: message.into(),
        }
    }

    /// Create an unexpected input error.
    #[must_use]
    pub fn input(location: &'static str, message: impl Into<String>) -> Self {
        Self::UnexpectedInput {
            location,
            message: message.into(),
        }
    }

    /// Create the error for an out of bounds index.
    #[must_use]
    pub fn index_out_of_bounds(location: &'static str, len: usize, index: usize) -> Self {
        Self::internal(
            location,
            format!("array index {index} out of bounds for length {len}"),
        )
    }
}
