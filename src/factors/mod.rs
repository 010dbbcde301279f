//! Geometric factors over continuous variables.
//!
//! These are the measurement models the test scenarios exercise: priors on
//! any variable type, SE(2) relative-pose constraints, and bearing-range
//! observations of planar landmarks. Each factor whitens with a
//! [`DiagonalNoise`](crate::core::DiagonalNoise) model and exposes the
//! analytic Jacobians the optimizer consumes.

pub mod bearing_range_factor;
pub mod between_factor;
pub mod prior_factor;

pub use bearing_range_factor::BearingRangeFactor;
pub use between_factor::BetweenFactor;
pub use prior_factor::PriorFactor;
