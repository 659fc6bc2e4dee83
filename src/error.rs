//! Error types for clustering measurements.

use thiserror::Error;

/// Measurement error type.
///
/// Fatal conditions only: a bin with zero modes or pairs is not an error,
/// it is surfaced through the per-bin count channel of the measurement
/// result instead.
#[derive(Error, Debug)]
pub enum ClusteringError {
    /// Rejected parameter combination (unknown assignment scheme,
    /// disallowed multipole degrees, bins finer than the sampling
    /// resolution).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Malformed input data (mismatched array lengths, empty catalogue
    /// where one is required).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A mesh grid or sampling table could not be allocated.
    #[error("Allocation failure: {0}")]
    Allocation(String),
}

impl From<std::collections::TryReserveError> for ClusteringError {
    fn from(e: std::collections::TryReserveError) -> Self {
        ClusteringError::Allocation(e.to_string())
    }
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, ClusteringError>;
