//! Posterior marginals for both variable spaces.

use crate::core::factor::NonlinearFactor;
use crate::core::symbols::Key;
use crate::core::values::Values;
use crate::discrete::marginals::DiscreteMarginalsOrdered;
use crate::solver::optimizer::{assemble, ColumnLayout};
use crate::solver::{OptimizerError, OptimizerResult};
use nalgebra::DMatrix;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Per-variable tangent-space covariances, extracted from the inverse of
/// the dense information matrix at a linearization point.
pub struct ContinuousMarginals {
    covariances: BTreeMap<Key, DMatrix<f64>>,
}

impl ContinuousMarginals {
    pub fn new(
        factors: &[Arc<dyn NonlinearFactor>],
        values: &Values,
    ) -> OptimizerResult<Self> {
        let layout = ColumnLayout::new(values);
        let (jacobian, _) = assemble(factors, values, &layout);
        let information = jacobian.transpose() * &jacobian;
        let covariance = information.try_inverse().ok_or_else(|| {
            OptimizerError::SingularInformation(
                "information matrix is singular at the estimate".to_string(),
            )
        })?;

        let mut covariances = BTreeMap::new();
        let mut offset = 0;
        for (key, value) in values.iter() {
            let dim = value.dim();
            covariances.insert(*key, covariance.view((offset, offset), (dim, dim)).into_owned());
            offset += dim;
        }
        Ok(Self { covariances })
    }

    /// Marginal covariance block of one variable, in its tangent space.
    pub fn marginal_covariance(&self, key: Key) -> Option<&DMatrix<f64>> {
        self.covariances.get(&key)
    }
}

/// Marginals over both sides of a hybrid estimate.
pub struct HybridMarginals {
    pub continuous: ContinuousMarginals,
    pub discrete: DiscreteMarginalsOrdered,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::noise::DiagonalNoise;
    use crate::core::symbols::Symbol;
    use crate::factors::prior_factor::PriorFactor;
    use approx::assert_relative_eq;

    #[test]
    fn test_prior_covariance_matches_noise() {
        let key = Symbol::new('x', 1).key();
        let mut values = Values::new();
        values.insert(key, 0.0);
        let factors: Vec<Arc<dyn NonlinearFactor>> =
            vec![Arc::new(PriorFactor::new(key, 0.0, DiagonalNoise::isotropic(1, 2.0)))];

        let marginals = ContinuousMarginals::new(&factors, &values).unwrap();
        let cov = marginals.marginal_covariance(key).unwrap();
        assert_relative_eq!(cov[(0, 0)], 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_unconstrained_variable_is_singular() {
        let key = Symbol::new('x', 1).key();
        let free = Symbol::new('x', 2).key();
        let mut values = Values::new();
        values.insert(key, 0.0);
        values.insert(free, 0.0);
        let factors: Vec<Arc<dyn NonlinearFactor>> =
            vec![Arc::new(PriorFactor::new(key, 0.0, DiagonalNoise::isotropic(1, 1.0)))];

        assert!(ContinuousMarginals::new(&factors, &values).is_err());
    }
}
