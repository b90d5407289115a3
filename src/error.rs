//! Error type shared by every entry point of the crate.
//!
//! Input validation happens before any computation starts, so a caller either
//! gets a [`BinningError`] describing the offending argument or a fully
//! computed result. `-∞` in log space is a valid "zero probability" value and
//! is never reported as an error.

use thiserror::Error;

/// Specialized result type for binning operations.
pub type Result<T> = std::result::Result<T, BinningError>;

/// Failure modes of the binning engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BinningError {
    /// A matrix or vector does not have the expected shape.
    #[error("{what} has invalid dimension: expected {expected}, found {found}")]
    Dimension {
        what: String,
        expected: String,
        found: String,
    },

    /// A matrix that must be upper triangular has a nonzero entry below the diagonal.
    #[error("{what} is not upper triangular: nonzero entry at ({row}, {col})")]
    NotUpperTriangular { what: String, row: usize, col: usize },

    /// A matrix entry is negative, NaN or infinite.
    #[error("{what} has invalid entry {value} at ({row}, {col})")]
    InvalidValue {
        what: String,
        row: usize,
        col: usize,
        value: f64,
    },

    /// The selected event index does not exist.
    #[error("invalid event index {which}: data has {events} event type(s)")]
    InvalidEvent { which: usize, events: usize },

    /// Raw algorithm selector outside `0..=2`.
    #[error("invalid algorithm selector {0} (expected 0 = exact, 1 = tree, 2 = sampler)")]
    InvalidAlgorithm(i64),

    /// An option has a value outside its admissible range.
    #[error("invalid option `{option}`: {reason}")]
    InvalidOption {
        option: &'static str,
        reason: String,
    },

    /// `logsub(a, b)` was called with `b > a`.
    #[error("log-space subtraction requires a >= b (a = {a}, b = {b})")]
    NegativeLogDifference { a: f64, b: f64 },

    /// The worker pool could not be created. Retrying with `threads = 1`
    /// runs the same computation sequentially.
    #[error("failed to start worker threads: {0}")]
    ThreadPool(String),

    /// The requested query is not available for the selected algorithm.
    #[error("{query} is not supported by the {algorithm} algorithm")]
    Unsupported {
        query: &'static str,
        algorithm: &'static str,
    },
}

impl BinningError {
    pub(crate) fn dimension(
        what: impl Into<String>,
        expected: impl ToString,
        found: impl ToString,
    ) -> Self {
        Self::Dimension {
            what: what.into(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    pub(crate) fn option(option: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            option,
            reason: reason.into(),
        }
    }
}
