//! Max-mixture factor (Olson-style): the active component is the one with
//! the smallest weighted error.

use crate::core::factor::LinearFactor;
use crate::core::symbols::{DiscreteKey, Key};
use crate::core::values::{DiscreteValues, Values};
use crate::discrete::decision_table::DecisionTable;
use crate::hybrid::factor::HybridFactor;
use std::any::Any;
use std::sync::RwLock;

/// Mixture whose error is `min_i (f_i.error - log w_i)`, with each
/// component's log normalizing constant added under the unnormalized
/// policy.
///
/// Linearization and the discrete table both follow the active (minimum
/// error) component; the active index is deterministic, taking the first
/// minimum on ties.
pub struct MaxMixtureFactor<F: HybridFactor + Clone + 'static> {
    keys: Vec<Key>,
    dkeys: Vec<DiscreteKey>,
    factors: Vec<F>,
    log_weights: RwLock<Vec<f64>>,
    normalized: bool,
}

impl<F: HybridFactor + Clone + 'static> MaxMixtureFactor<F> {
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

    /// Replace the component weights. The length must match the component
    /// count and weights must be strictly positive.
    pub fn update_weights(&self, weights: &[f64]) {
        let mut guard = self.log_weights.write().unwrap();
        assert_eq!(weights.len(), guard.len(), "one weight per component");
        assert!(weights.iter().all(|w| *w > 0.0), "weights must be strictly positive");
        for (slot, w) in guard.iter_mut().zip(weights) {
            *slot = w.ln();
        }
    }

    fn component_error(
        &self,
        index: usize,
        continuous: &Values,
        discrete: &DiscreteValues,
        log_weights: &[f64],
    ) -> f64 {
        let mut error = self.factors[index].error(continuous, discrete) - log_weights[index];
        if !self.normalized {
            error += self.factors[index].log_normalizing_constant(continuous);
        }
        error
    }

    /// Index of the minimum-error component; first minimum wins on ties.
    pub fn active_factor_index(&self, continuous: &Values, discrete: &DiscreteValues) -> usize {
        let log_weights = self.log_weights.read().unwrap();
        let mut min_error = f64::INFINITY;
        let mut min_index = 0;
        for i in 0..self.factors.len() {
            let error = self.component_error(i, continuous, discrete, &log_weights);
            if error < min_error {
                min_error = error;
                min_index = i;
            }
        }
        min_index
    }

    /// Continuous keys of the active component.
    pub fn association_keys(&self, continuous: &Values, discrete: &DiscreteValues) -> Vec<Key> {
        self.factors[self.active_factor_index(continuous, discrete)].keys().to_vec()
    }
}

impl<F: HybridFactor + Clone + 'static> Clone for MaxMixtureFactor<F> {
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

impl<F: HybridFactor + Clone + 'static> HybridFactor for MaxMixtureFactor<F> {
    fn keys(&self) -> &[Key] {
        &self.keys
    }

    fn discrete_keys(&self) -> &[DiscreteKey] {
        &self.dkeys
    }

    fn dim(&self) -> usize {
        self.factors[0].dim()
    }

    fn error(&self, continuous: &Values, discrete: &DiscreteValues) -> f64 {
        let log_weights = self.log_weights.read().unwrap();
        (0..self.factors.len())
            .map(|i| self.component_error(i, continuous, discrete, &log_weights))
            .fold(f64::INFINITY, f64::min)
    }

    fn linearize(&self, continuous: &Values, discrete: &DiscreteValues) -> LinearFactor {
        self.factors[self.active_factor_index(continuous, discrete)].linearize(continuous, discrete)
    }

    fn to_discrete_table(&self, continuous: &Values, discrete: &DiscreteValues) -> DecisionTable {
        let active = self.active_factor_index(continuous, discrete);
        let mut table = self.factors[active].to_discrete_table(continuous, discrete);
        for (i, factor) in self.factors.iter().enumerate() {
            if i == active {
                continue;
            }
            for dk in factor.discrete_keys() {
                table = table.multiply(&DecisionTable::uniform(*dk));
            }
        }
        table
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
