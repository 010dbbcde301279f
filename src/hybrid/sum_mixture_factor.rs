//! Sum-mixture factor with RISE-style square-root residuals.
//!
//! Follows Rosen et al. 2013 for the residual transform and uses the
//! numerically stable log-sum-exp / softmax forms throughout.

use crate::core::factor::LinearFactor;
use crate::core::symbols::{DiscreteKey, Key};
use crate::core::values::{DiscreteValues, Values};
use crate::discrete::decision_table::DecisionTable;
use crate::hybrid::factor::HybridFactor;
use crate::math::{exp_normalize, log_sum_exp};
use std::any::Any;
use std::sync::RwLock;

/// Mixture `p(z | x) = sum_i w_i eta_i exp(-r_i(x))`.
///
/// Component log-probabilities `l_i = -error_i + log w_i` (minus the
/// component's log normalizing constant under the unnormalized policy) are
/// softmax-weighted; the reported error is the expected component error.
/// `log beta = logsumexp_i(log w_i + log eta_i)` upper-bounds the mixture
/// likelihood and defines the square-root residual
/// `sqrt(log beta - error)` consumed by RISE-style optimizers.
pub struct SumMixtureFactor<F: HybridFactor + Clone + 'static> {
    keys: Vec<Key>,
    dkeys: Vec<DiscreteKey>,
    factors: Vec<F>,
    log_weights: RwLock<Vec<f64>>,
    log_beta: RwLock<f64>,
    normalized: bool,
}

impl<F: HybridFactor + Clone + 'static> SumMixtureFactor<F> {
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
        let log_weights: Vec<f64> = weights.iter().map(|w| w.ln()).collect();
        let log_beta = Self::compute_log_beta(&factors, &log_weights);
        Self {
            keys,
            dkeys,
            factors,
            log_weights: RwLock::new(log_weights),
            log_beta: RwLock::new(log_beta),
            normalized,
        }
    }

    /// `log beta = logsumexp_i(log w_i + log eta_i)`, where `eta_i` is the
    /// component's Gaussian normalizing constant. The constant does not
    /// depend on the linearization point, so an empty value map suffices.
    fn compute_log_beta(factors: &[F], log_weights: &[f64]) -> f64 {
        let empty = Values::new();
        let terms: Vec<f64> = factors
            .iter()
            .zip(log_weights)
            .map(|(f, lw)| lw - f.log_normalizing_constant(&empty))
            .collect();
        log_sum_exp(&terms)
    }

    pub fn components(&self) -> &[F] {
        &self.factors
    }

    pub fn log_beta(&self) -> f64 {
        *self.log_beta.read().unwrap()
    }

    pub fn log_weights(&self) -> Vec<f64> {
        self.log_weights.read().unwrap().clone()
    }

    /// Replace the component weights and refresh `log beta`.
    pub fn update_weights(&self, weights: &[f64]) {
        let mut guard = self.log_weights.write().unwrap();
        assert_eq!(weights.len(), guard.len(), "one weight per component");
        assert!(weights.iter().all(|w| *w > 0.0), "weights must be strictly positive");
        for (slot, w) in guard.iter_mut().zip(weights) {
            *slot = w.ln();
        }
        *self.log_beta.write().unwrap() = Self::compute_log_beta(&self.factors, &guard);
    }

    /// `l_i = -(error_i - log w_i + [log eta term])` for each component.
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

    /// Index of the dominant (max log-prob) component; first winner on
    /// ties.
    pub fn active_factor_index(&self, continuous: &Values, discrete: &DiscreteValues) -> usize {
        let logprobs = self.component_log_probs(continuous, discrete);
        let mut best = 0;
        let mut best_value = f64::NEG_INFINITY;
        for (i, &lp) in logprobs.iter().enumerate() {
            if lp > best_value {
                best_value = lp;
                best = i;
            }
        }
        best
    }

    /// RISE square-root residual `sqrt(log beta - error)`, clamped at zero
    /// since the expected-error form can exceed the bound by the component
    /// entropy near decision boundaries.
    pub fn sqrt_residual(&self, continuous: &Values, discrete: &DiscreteValues) -> f64 {
        (self.log_beta() - self.error(continuous, discrete)).max(0.0).sqrt()
    }
}

impl<F: HybridFactor + Clone + 'static> Clone for SumMixtureFactor<F> {
    fn clone(&self) -> Self {
        Self {
            keys: self.keys.clone(),
            dkeys: self.dkeys.clone(),
            factors: self.factors.clone(),
            log_weights: RwLock::new(self.log_weights()),
            log_beta: RwLock::new(self.log_beta()),
            normalized: self.normalized,
        }
    }
}

impl<F: HybridFactor + Clone + 'static> HybridFactor for SumMixtureFactor<F> {
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
        let logprobs = self.component_log_probs(continuous, discrete);
        let weights = exp_normalize(&logprobs);
        weights.iter().zip(&logprobs).map(|(w, lp)| w * (-lp)).sum()
    }

    fn linearize(&self, continuous: &Values, discrete: &DiscreteValues) -> LinearFactor {
        // Dominant-component linearization; the stacked weighted Jacobian
        // is a future-work hook.
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
                    && (self.log_beta() - f.log_beta()).abs() <= tol
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::noise::DiagonalNoise;
    use crate::core::symbols::Symbol;
    use crate::factors::prior_factor::PriorFactor;
    use crate::hybrid::mixture_factor::MixtureFactor;
    use approx::assert_relative_eq;

    fn x1() -> Key {
        Symbol::new('x', 1).key()
    }

    fn selector(i: u64) -> DiscreteKey {
        DiscreteKey::new(Symbol::new('d', i), 2)
    }

    fn component(dk: DiscreteKey, mean: f64) -> MixtureFactor<PriorFactor> {
        // Both branches identical so the component error is independent of
        // the selector state.
        let f = PriorFactor::new(x1(), mean, DiagonalNoise::isotropic(1, 0.3));
        MixtureFactor::new(vec![x1()], dk, vec![f.clone(), f], true)
    }

    fn two_component_sum() -> SumMixtureFactor<MixtureFactor<PriorFactor>> {
        SumMixtureFactor::new(
            vec![x1()],
            vec![selector(1), selector(2)],
            vec![component(selector(1), 0.0), component(selector(2), 1.0)],
            true,
        )
    }

    fn full_assignment() -> DiscreteValues {
        let mut d = DiscreteValues::new();
        d.insert(selector(1).key, 0);
        d.insert(selector(2).key, 0);
        d
    }

    #[test]
    fn test_log_beta_uniform_normalized_components() {
        // Normalized components have log eta = 0, so beta = sum of weights.
        let mixture = two_component_sum();
        assert_relative_eq!(mixture.log_beta(), 2.0_f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_update_weights_refreshes_log_beta() {
        let mixture = two_component_sum();
        mixture.update_weights(&[3.0, 1.0]);
        assert_relative_eq!(mixture.log_beta(), 4.0_f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_error_bounded_by_log_beta_near_component() {
        let mixture = two_component_sum();
        let mut values = Values::new();
        values.insert(x1(), 0.02);
        let discrete = full_assignment();

        let error = mixture.error(&values, &discrete);
        assert!(error <= mixture.log_beta());
        let sqrt_res = mixture.sqrt_residual(&values, &discrete);
        assert!(sqrt_res.is_finite());
        assert_relative_eq!(
            sqrt_res * sqrt_res,
            mixture.log_beta() - error,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_error_is_softmax_weighted_expected_error() {
        let mixture = two_component_sum();
        let mut values = Values::new();
        values.insert(x1(), 0.0);
        let discrete = full_assignment();

        // Component errors: 0 and 0.5 * (1 / 0.3)^2.
        let e0 = 0.0;
        let e1 = 0.5 * (1.0f64 / 0.3).powi(2);
        let weights = exp_normalize(&[-e0, -e1]);
        let expected = weights[0] * e0 + weights[1] * e1;
        assert_relative_eq!(mixture.error(&values, &discrete), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_linearize_uses_dominant_component() {
        let mixture = two_component_sum();
        let mut values = Values::new();
        values.insert(x1(), 0.95);
        let discrete = full_assignment();

        assert_eq!(mixture.active_factor_index(&values, &discrete), 1);
        let lf = mixture.linearize(&values, &discrete);
        // Residual of the prior at 1.0, whitened by sigma 0.3.
        assert_relative_eq!(lf.residual[0], (0.95 - 1.0) / 0.3, epsilon = 1e-9);
    }

    #[test]
    fn test_sqrt_residual_clamps_at_decision_boundary() {
        let mixture = two_component_sum();
        let mut values = Values::new();
        values.insert(x1(), 0.5); // exactly between the components
        let discrete = full_assignment();
        // The expected-error form exceeds log beta here; the square-root
        // residual must still be real.
        assert!(mixture.sqrt_residual(&values, &discrete).is_finite());
    }
}
