//! Error types for the hybrid-sam library.
//!
//! All errors use the `thiserror` crate for automatic trait
//! implementations; module-specific errors convert into the main enum.

use crate::manifold::ManifoldError;
use crate::solver::OptimizerError;
use thiserror::Error;

/// Main result type used throughout the library.
pub type HybridResult<T> = Result<T, HybridError>;

/// Main error type for the hybrid-sam library.
#[derive(Debug, Clone, Error)]
pub enum HybridError {
    /// Continuous solver failures.
    #[error("solver error: {0}")]
    Solver(String),

    /// Discrete engine failures.
    #[error("discrete error: {0}")]
    Discrete(String),

    /// Manifold operation errors.
    #[error("manifold error: {0}")]
    Manifold(String),

    /// Linear algebra errors.
    #[error("linear algebra error: {0}")]
    LinearAlgebra(String),

    /// Invalid input parameters.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<OptimizerError> for HybridError {
    fn from(err: OptimizerError) -> Self {
        HybridError::Solver(err.to_string())
    }
}

impl From<ManifoldError> for HybridError {
    fn from(err: ManifoldError) -> Self {
        HybridError::Manifold(err.to_string())
    }
}
