use thiserror::Error;

/// Errors raised by the scaling engines and their data model.
///
/// Numeric degeneracies (zero-norm vectors, coincident points) are not errors;
/// the engines absorb them and still produce finite output.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MdsError {
    /// A point or target dimension smaller than one was requested
    #[error("invalid dimension {0}, dimension must be at least 1")]
    InvalidDimension(usize),

    /// Matrix shapes passed into an engine do not agree
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Coordinate access outside `[0, dimension)`
    #[error("index {index} out of range for dimension {dimension}")]
    IndexOutOfRange { index: usize, dimension: usize },

    /// Cancellation was observed at a checkpoint
    #[error("execution cancelled")]
    Cancelled,

    /// The same row identifier was inserted twice into an embedding
    #[error("duplicate row identifier: {0}")]
    DuplicateIdentifier(String),

    /// A configuration value lies outside its allowed range
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

pub type MdsResult<T> = Result<T, MdsError>;
