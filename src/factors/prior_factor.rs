//! Prior factor on a single variable.

use crate::core::factor::{LinearFactor, NonlinearFactor};
use crate::core::noise::DiagonalNoise;
use crate::core::symbols::Key;
use crate::core::values::{Values, VariableValue};
use crate::manifold::se2::right_jacobian_inv;
use nalgebra::{DMatrix, DVector, Vector3};
use std::any::Any;

/// Gaussian prior `0.5 * || whiten(x ⊟ prior) ||^2` on one variable.
///
/// Works for any [`VariableValue`]: poses measure the residual in the
/// tangent space at the prior, Euclidean variables by subtraction.
#[derive(Clone, Debug)]
pub struct PriorFactor {
    keys: [Key; 1],
    prior: VariableValue,
    noise: DiagonalNoise,
}

impl PriorFactor {
    pub fn new(key: impl Into<Key>, prior: impl Into<VariableValue>, noise: DiagonalNoise) -> Self {
        let prior = prior.into();
        assert_eq!(noise.dim(), prior.dim(), "noise dimension must match variable dimension");
        Self { keys: [key.into()], prior, noise }
    }

    pub fn prior(&self) -> &VariableValue {
        &self.prior
    }

    fn residual_and_jacobian(&self, values: &Values) -> (DVector<f64>, DMatrix<f64>) {
        let x = values.at(self.keys[0]);
        let residual = self.prior.local_coordinates(x);
        let jacobian = match x {
            VariableValue::Pose2(_) => {
                let tau = Vector3::new(residual[0], residual[1], residual[2]);
                let jr_inv = right_jacobian_inv(&tau);
                DMatrix::from_fn(3, 3, |r, c| jr_inv[(r, c)])
            }
            _ => DMatrix::identity(residual.len(), residual.len()),
        };
        (residual, jacobian)
    }
}

impl NonlinearFactor for PriorFactor {
    fn keys(&self) -> &[Key] {
        &self.keys
    }

    fn dim(&self) -> usize {
        self.noise.dim()
    }

    fn error(&self, values: &Values) -> f64 {
        let (residual, _) = self.residual_and_jacobian(values);
        self.noise.error(&residual)
    }

    fn linearize(&self, values: &Values) -> LinearFactor {
        let (mut residual, mut jacobian) = self.residual_and_jacobian(values);
        self.noise.whiten(&mut residual);
        self.noise.whiten_jacobian(&mut jacobian);
        LinearFactor::new(self.keys.to_vec(), vec![jacobian], residual)
    }

    fn log_normalization(&self) -> f64 {
        self.noise.log_normalization()
    }

    fn equals(&self, other: &dyn NonlinearFactor, tol: f64) -> bool {
        match other.as_any().downcast_ref::<PriorFactor>() {
            Some(f) => {
                self.keys == f.keys
                    && self.prior.dim() == f.prior.dim()
                    && self.prior.local_coordinates(&f.prior).norm() <= tol
                    && self.noise.equals(&f.noise, tol)
            }
            None => false,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
