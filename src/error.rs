//! Error types for the t-SNE engine.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, TsneError>;

/// Errors raised while validating input or configuring a run.
///
/// Numerical degeneracies (unreachable neighbours, a bandwidth search that runs out of
/// tries) are not errors: they are reported through [`crate::BandwidthSearch`] instead.
#[derive(Debug, Error)]
pub enum TsneError {
    /// No points were supplied.
    #[error("empty input: at least two points are required")]
    EmptyInput,

    /// Not enough points to build a neighbour distribution.
    #[error("too few points: got {points}, need at least {required}")]
    TooFewPoints {
        /// Number of points supplied.
        points: usize,
        /// Minimum number of points required.
        required: usize,
    },

    /// A point does not have the same dimensionality as the first one.
    #[error("dimension mismatch at point {index}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Index of the offending point.
        index: usize,
        /// Dimensionality of the first point.
        expected: usize,
        /// Dimensionality of the offending point.
        actual: usize,
    },

    /// Labels and points differ in length.
    #[error("label count mismatch: {points} points but {labels} labels")]
    LabelMismatch {
        /// Number of points.
        points: usize,
        /// Number of labels.
        labels: usize,
    },

    /// Perplexity cannot be reached with this many neighbours.
    #[error("perplexity {perplexity} too large for {points} points (max {max})")]
    PerplexityTooLarge {
        /// Requested perplexity.
        perplexity: f64,
        /// Number of points.
        points: usize,
        /// Largest admissible perplexity, `N - 1`.
        max: f64,
    },

    /// Any other invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Flat input could not be reshaped into a point matrix.
    #[error("shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}
