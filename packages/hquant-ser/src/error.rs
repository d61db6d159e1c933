//! Error types shared by the series store, the indicator engine and the
//! neural network core.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Vector arithmetic on operands of different dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// An indicator was asked to compute before a base series was bound.
    #[error("base series not set for indicator {0}")]
    BaseSeriesNotSet(String),

    /// Ingestion is ascending-only; `time` would go before the last row.
    #[error("time {time} is before last occurred time {last}")]
    NonMonotonicTime { time: i64, last: i64 },

    /// A write addressed a time that has no row in the series.
    #[error("no row at time {0}")]
    NoRowAt(i64),

    #[error("cyclic dependency detected: {0}")]
    CyclicDependency(String),

    #[error("unknown var: {0}")]
    UnknownVar(String),

    #[error("unknown series: {0}")]
    UnknownSeries(String),

    #[error("unknown indicator: {0}")]
    UnknownIndicator(String),

    #[error("invalid frequency: {0}")]
    InvalidFrequency(String),

    #[error("invalid opts: {0}")]
    InvalidOpts(String),

    #[error("malformed row {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    /// The data-feed collaborator failed (network, file, ...).
    #[error("source error: {0}")]
    Source(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid training data: {0}")]
    InvalidTrainingData(String),

    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn dimension(expected: usize, actual: usize) -> Self {
        Error::DimensionMismatch { expected, actual }
    }
}
