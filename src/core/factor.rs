//! Nonlinear factor abstraction and its linearization product.

use crate::core::symbols::Key;
use crate::core::values::Values;
use nalgebra::{DMatrix, DVector};
use std::any::Any;

/// Gaussian (affine) approximation of a factor at a linearization point.
///
/// Carries one whitened Jacobian block per key, in the factor's key order,
/// and the whitened residual. The noise model is already baked in, so the
/// induced least-squares term is `0.5 * || residual + sum_k J_k delta_k ||^2`.
#[derive(Clone, Debug)]
pub struct LinearFactor {
    pub keys: Vec<Key>,
    pub jacobians: Vec<DMatrix<f64>>,
    pub residual: DVector<f64>,
}

impl LinearFactor {
    pub fn new(keys: Vec<Key>, jacobians: Vec<DMatrix<f64>>, residual: DVector<f64>) -> Self {
        debug_assert_eq!(keys.len(), jacobians.len());
        debug_assert!(jacobians.iter().all(|j| j.nrows() == residual.len()));
        Self { keys, jacobians, residual }
    }

    /// Number of residual rows.
    pub fn rows(&self) -> usize {
        self.residual.len()
    }

    /// Scale the whole block row (Jacobians and residual) by a constant.
    pub fn scale(&mut self, factor: f64) {
        for jacobian in &mut self.jacobians {
            *jacobian *= factor;
        }
        self.residual *= factor;
    }
}

/// A factor over continuous variables only: one term of the negative
/// log-likelihood, `error = 0.5 * || whiten(h(x) - z) ||^2`.
pub trait NonlinearFactor: Send + Sync {
    /// Keys of the variables in this factor's scope, in stable order.
    fn keys(&self) -> &[Key];

    /// Number of rows this factor contributes to the stacked Jacobian.
    fn dim(&self) -> usize;

    /// Negative log-likelihood at `values`. Every key of the factor must be
    /// present; a missing key is a caller contract violation.
    fn error(&self, values: &Values) -> f64;

    /// Gaussian approximation at `values`, noise model baked in.
    fn linearize(&self, values: &Values) -> LinearFactor;

    /// `0.5 * (d log 2 pi + log det Sigma)` for factors with a Gaussian
    /// noise model; zero for factors that consider themselves normalized.
    fn log_normalization(&self) -> f64 {
        0.0
    }

    /// Structural equality up to a tolerance on continuous quantities.
    fn equals(&self, other: &dyn NonlinearFactor, tol: f64) -> bool;

    /// Downcasting hook used by the controller to find shadow factors in
    /// the optimizer's factor list.
    fn as_any(&self) -> &dyn Any;
}
