//! Crate-wide error type.

/// Errors surfaced by constructors, solvers, and the Monte-Carlo evaluator.
///
/// Selection and update never fail: learners prefer untried arms instead of
/// dividing by zero, so every fallible path is a configuration or input problem.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("probability {value} at index {index} is outside [0, 1]")]
    InvalidProbability { index: usize, value: f64 },

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("matrix must be square, got {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },

    #[error("non-finite cost {value} at ({row}, {col})")]
    NonFiniteCost { row: usize, col: usize, value: f64 },

    #[error("index {index} out of range for {len} items")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("{distinct} distinct feature vectors cannot form {clusters} clusters")]
    InsufficientPoints { distinct: usize, clusters: usize },

    #[error("clusterer used before fit")]
    NotFitted,

    #[error("empty input: {0}")]
    Empty(&'static str),

    #[error("all {trials} trials failed; last error: {last}")]
    AllTrialsFailed { trials: usize, last: Box<Error> },
}

impl Error {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Shorthand for results carrying [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Check that `p` is a usable probability, reporting its position on failure.
pub(crate) fn check_probability(index: usize, p: f64) -> Result<()> {
    if p.is_finite() && (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(Error::InvalidProbability { index, value: p })
    }
}
