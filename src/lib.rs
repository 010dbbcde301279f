//! # hybrid-sam
//!
//! Alternating discrete-continuous MAP inference over hybrid factor
//! graphs, for problems like semantic SLAM and robust estimation where
//! geometric states live on smooth manifolds and hypothesis variables are
//! categorical.
//!
//! ## How it works
//!
//! Inference alternates between the two variable spaces. Each hybrid
//! factor — a factor whose error depends on both a continuous value and a
//! discrete assignment — is split into two shadows: a continuous-side
//! shadow with the discrete assignment frozen, handed to a nonlinear
//! least-squares smoother, and a discrete-side shadow with the continuous
//! values frozen, handed to a discrete variable-elimination engine. The
//! [`HybridSmoother`] runs one iteration per `update` call and keeps both
//! shadow populations synchronized across incremental updates.
//!
//! ## Mixture factors
//!
//! Four hybrid factor families are provided:
//!
//! - [`MixtureFactor`]: a discrete selector picks one continuous component
//! - [`MaxMixtureFactor`]: minimum weighted component error
//! - [`SumMixtureFactor`]: log-sum-exp mixture with RISE-style residuals
//! - [`EmMixtureFactor`]: expected error with an IRLS stacked Jacobian
//!
//! The result of inference is a local MAP assignment consistent with the
//! initial guess; the alternation makes no global-optimality claim.

pub mod core;
pub mod discrete;
pub mod error;
pub mod factors;
pub mod hybrid;
pub mod logger;
pub mod manifold;
pub mod math;
pub mod solver;

// Re-export the main types for convenience.
pub use crate::core::{
    DiagonalNoise, DiscreteKey, DiscreteValues, HybridValues, Key, LinearFactor, NonlinearFactor,
    Symbol, Values, VariableValue,
};
pub use crate::discrete::{
    DecisionTable, DiscreteFactor, DiscreteFactorGraph, DiscreteMarginalsOrdered,
    DiscretePriorFactor, OrderingType,
};
pub use crate::error::{HybridError, HybridResult};
pub use crate::hybrid::{
    ContinuousShadowFactor, DiscreteShadowFactor, EmMixtureFactor, HybridFactor,
    HybridFactorGraph, MaxMixtureFactor, MixtureFactor, SemanticBearingRangeFactor,
    SumMixtureFactor,
};
pub use crate::logger::{init_logger, init_logger_with_level};
pub use crate::solver::{
    HybridSmoother, IncrementalOptimizer, LevenbergMarquardt, OptimizerConfig, UpdateParams,
};
