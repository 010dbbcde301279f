//! EM-mixture factor: expected error over softmax component weights and an
//! IRLS-style stacked linearization.

use crate::core::factor::LinearFactor;
use crate::core::symbols::{DiscreteKey, Key};
use crate::core::values::{DiscreteValues, Values};
use crate::discrete::decision_table::DecisionTable;
use crate::hybrid::factor::HybridFactor;
use crate::math::exp_normalize;
use nalgebra::{DMatrix, DVector};
use std::any::Any;
use std::sync::RwLock;

/// Mixture whose error is the expected component error under the softmax
/// responsibilities `w_i = exp_normalize(l_i)`.
///
/// `linearize` stacks every component's whitened Jacobian, each block
/// scaled by `sqrt(w_i)` — one iteratively-reweighted least-squares step
/// for the expected complete-data log-likelihood. Accordingly `dim()` is
/// the sum of the component dims.
pub struct EmMixtureFactor<F: HybridFactor + Clone + 'static> {
    keys: Vec<Key>,
    dkeys: Vec<DiscreteKey>,
    factors: Vec<F>,
    log_weights: RwLock<Vec<f64>>,
    normalized: bool,
}

impl<F: HybridFactor + Clone + 'static> EmMixtureFactor<F> {
    /// Uniform weights (all one).
    pub fn new(
        keys: Vec<Key>,
        dkeys: Vec<DiscreteKey>,
        factors: Vec<F>,
        normalized: bool,
    ) -> Self {
        let count = factors.len();
        Self::with_weights(keys, dkeys, factors, &vec![1.0; count], normalized)
    }

    pub fn with_weights(
        keys: Vec<Key>,
        dkeys: Vec<DiscreteKey>,
        factors: Vec<F>,
        weights: &[f64],
        normalized: bool,
    ) -> Self {
        assert!(!factors.is_empty(), "mixture needs at least one component");
        assert_eq!(weights.len(), factors.len(), "one weight per component");
        assert!(weights.iter().all(|w| *w > 0.0), "weights must be strictly positive");
        let log_weights = weights.iter().map(|w| w.ln()).collect();
        Self { keys, dkeys, factors, log_weights: RwLock::new(log_weights), normalized }
    }

    pub fn components(&self) -> &[F] {
        &self.factors
    }

    pub fn log_weights(&self) -> Vec<f64> {
        self.log_weights.read().unwrap().clone()
    }

    /// Replace the component weights.
    pub fn update_weights(&self, weights: &[f64]) {
        let mut guard = self.log_weights.write().unwrap();
        assert_eq!(weights.len(), guard.len(), "one weight per component");
        assert!(weights.iter().all(|w| *w > 0.0), "weights must be strictly positive");
        for (slot, w) in guard.iter_mut().zip(weights) {
            *slot = w.ln();
        }
    }

    /// Component log-probabilities, as in the sum-mixture.
    pub fn component_log_probs(&self, continuous: &Values, discrete: &DiscreteValues) -> Vec<f64> {
        let log_weights = self.log_weights.read().unwrap();
        self.factors
            .iter()
            .zip(log_weights.iter())
            .map(|(factor, lw)| {
                let mut error = factor.error(continuous, discrete) - lw;
                if !self.normalized {
                    error += factor.log_normalizing_constant(continuous);
                }
                -error
            })
            .collect()
    }

    /// Softmax responsibilities of the components.
    pub fn responsibilities(&self, continuous: &Values, discrete: &DiscreteValues) -> Vec<f64> {
        exp_normalize(&self.component_log_probs(continuous, discrete))
    }
}

impl<F: HybridFactor + Clone + 'static> Clone for EmMixtureFactor<F> {
    fn clone(&self) -> Self {
        Self {
            keys: self.keys.clone(),
            dkeys: self.dkeys.clone(),
            factors: self.factors.clone(),
            log_weights: RwLock::new(self.log_weights()),
            normalized: self.normalized,
        }
    }
}

impl<F: HybridFactor + Clone + 'static> HybridFactor for EmMixtureFactor<F> {
    fn keys(&self) -> &[Key] {
        &self.keys
    }

    fn discrete_keys(&self) -> &[DiscreteKey] {
        &self.dkeys
    }

    fn dim(&self) -> usize {
        self.factors.iter().map(|f| f.dim()).sum()
    }

    fn error(&self, continuous: &Values, discrete: &DiscreteValues) -> f64 {
        let logprobs = self.component_log_probs(continuous, discrete);
        let weights = exp_normalize(&logprobs);
        weights.iter().zip(&logprobs).map(|(w, lp)| w * (-lp)).sum()
    }

    fn linearize(&self, continuous: &Values, discrete: &DiscreteValues) -> LinearFactor {
        let weights = self.responsibilities(continuous, discrete);
        let components: Vec<LinearFactor> =
            self.factors.iter().map(|f| f.linearize(continuous, discrete)).collect();

        // Union of component keys, first appearance order.
        let mut keys: Vec<Key> = Vec::new();
        let mut dims: Vec<usize> = Vec::new();
        for lf in &components {
            for (key, jacobian) in lf.keys.iter().zip(&lf.jacobians) {
                if !keys.contains(key) {
                    keys.push(*key);
                    dims.push(jacobian.ncols());
                }
            }
        }

        let total_rows: usize = components.iter().map(|lf| lf.rows()).sum();
        let mut jacobians: Vec<DMatrix<f64>> =
            dims.iter().map(|d| DMatrix::zeros(total_rows, *d)).collect();
        let mut residual = DVector::zeros(total_rows);

        let mut row = 0;
        for (lf, weight) in components.iter().zip(&weights) {
            let scale = weight.sqrt();
            for (key, jacobian) in lf.keys.iter().zip(&lf.jacobians) {
                let slot = keys.iter().position(|k| k == key).unwrap();
                jacobians[slot]
                    .view_mut((row, 0), (lf.rows(), jacobian.ncols()))
                    .copy_from(&(jacobian * scale));
            }
            residual.rows_mut(row, lf.rows()).copy_from(&(&lf.residual * scale));
            row += lf.rows();
        }

        LinearFactor::new(keys, jacobians, residual)
    }

    fn to_discrete_table(&self, continuous: &Values, discrete: &DiscreteValues) -> DecisionTable {
        // Per-component tables weighted by responsibility, renormalized,
        // multiplied together. Components whose discrete scope is not a
        // single variable are skipped.
        let weights = self.responsibilities(continuous, discrete);
        let mut product = DecisionTable::unit();
        for (factor, weight) in self.factors.iter().zip(&weights) {
            if factor.discrete_keys().len() != 1 {
                continue;
            }
            let table = factor.to_discrete_table(continuous, discrete).scaled(*weight).normalized();
            product = product.multiply(&table);
        }
        product
    }

    fn log_normalizing_constant(&self, _continuous: &Values) -> f64 {
        0.0
    }

    fn equals(&self, other: &dyn HybridFactor, tol: f64) -> bool {
        match other.as_any().downcast_ref::<Self>() {
            Some(f) => {
                self.keys == f.keys
                    && self.dkeys == f.dkeys
                    && self.normalized == f.normalized
                    && self.factors.len() == f.factors.len()
                    && self.factors.iter().zip(&f.factors).all(|(a, b)| a.equals(b, tol))
                    && self
                        .log_weights()
                        .iter()
                        .zip(f.log_weights().iter())
                        .all(|(a, b)| (a - b).abs() <= tol)
            }
            None => false,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
