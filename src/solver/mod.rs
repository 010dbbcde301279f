//! Alternating minimization solver: the incremental continuous back-end
//! and the controller orchestrating it against the discrete engine.

use thiserror::Error;

pub mod marginals;
pub mod optimizer;
pub mod smoother;

pub use marginals::{ContinuousMarginals, HybridMarginals};
pub use optimizer::{IncrementalOptimizer, LevenbergMarquardt, OptimizerConfig, UpdateParams};
pub use smoother::HybridSmoother;

/// Errors surfaced by the continuous optimizer.
#[derive(Debug, Clone, Error)]
pub enum OptimizerError {
    /// The damped normal equations could not be factorized.
    #[error("linear system solve failed: {0}")]
    LinearSolveFailed(String),

    /// NaN or infinity showed up in cost, gradient, or step.
    #[error("numerical instability detected: {0}")]
    NumericalInstability(String),

    /// The information matrix was singular when marginals were requested.
    #[error("marginal covariance unavailable: {0}")]
    SingularInformation(String),
}

/// Result type for optimizer operations.
pub type OptimizerResult<T> = Result<T, OptimizerError>;
