//! SE(2) relative-pose factor.

use crate::core::factor::{LinearFactor, NonlinearFactor};
use crate::core::noise::DiagonalNoise;
use crate::core::symbols::Key;
use crate::core::values::Values;
use crate::manifold::se2::SE2;
use nalgebra::{DMatrix, DVector, Matrix3, Vector3};
use std::any::Any;

/// Relative pose measurement between two SE(2) variables.
///
/// The residual is `Log((T_j⁻¹ ∘ T_i) ∘ measured)`, zero when the measured
/// transform exactly maps pose `i` onto pose `j`. Jacobians chain the
/// analytic derivatives of inverse, composition, and log.
#[derive(Clone, Debug)]
pub struct BetweenFactor {
    keys: [Key; 2],
    measured: SE2,
    noise: DiagonalNoise,
}

impl BetweenFactor {
    pub fn new(
        key_i: impl Into<Key>,
        key_j: impl Into<Key>,
        measured: SE2,
        noise: DiagonalNoise,
    ) -> Self {
        assert_eq!(noise.dim(), SE2::DOF, "between factor needs a 3-dimensional noise model");
        Self { keys: [key_i.into(), key_j.into()], measured, noise }
    }

    pub fn measured(&self) -> &SE2 {
        &self.measured
    }

    fn residual_and_jacobians(&self, values: &Values) -> (Vector3<f64>, Matrix3<f64>, Matrix3<f64>) {
        let pose_i = values.at_pose2(self.keys[0]);
        let pose_j = values.at_pose2(self.keys[1]);

        // Step 1: T_j⁻¹
        let mut j_inv_wrt_j = Matrix3::zeros();
        let pose_j_inv = pose_j.inverse(Some(&mut j_inv_wrt_j));

        // Step 2: T_j⁻¹ ∘ T_i
        let mut j_temp_wrt_j_inv = Matrix3::zeros();
        let mut j_temp_wrt_i = Matrix3::zeros();
        let temp = pose_j_inv.compose(pose_i, Some(&mut j_temp_wrt_j_inv), Some(&mut j_temp_wrt_i));

        // Step 3: (T_j⁻¹ ∘ T_i) ∘ measured
        let mut j_diff_wrt_temp = Matrix3::zeros();
        let diff = temp.compose(&self.measured, Some(&mut j_diff_wrt_temp), None);

        // Step 4: Log
        let mut j_log_wrt_diff = Matrix3::zeros();
        let residual = diff.log(Some(&mut j_log_wrt_diff));

        let j_diff_wrt_i = j_diff_wrt_temp * j_temp_wrt_i;
        let j_diff_wrt_j = j_diff_wrt_temp * j_temp_wrt_j_inv * j_inv_wrt_j;

        (residual, j_log_wrt_diff * j_diff_wrt_i, j_log_wrt_diff * j_diff_wrt_j)
    }
}

impl NonlinearFactor for BetweenFactor {
    fn keys(&self) -> &[Key] {
        &self.keys
    }

    fn dim(&self) -> usize {
        SE2::DOF
    }

    fn error(&self, values: &Values) -> f64 {
        let (residual, _, _) = self.residual_and_jacobians(values);
        self.noise.error(&DVector::from_column_slice(residual.as_slice()))
    }

    fn linearize(&self, values: &Values) -> LinearFactor {
        let (residual, jac_i, jac_j) = self.residual_and_jacobians(values);
        let mut residual = DVector::from_column_slice(residual.as_slice());
        let mut jac_i = DMatrix::from_fn(3, 3, |r, c| jac_i[(r, c)]);
        let mut jac_j = DMatrix::from_fn(3, 3, |r, c| jac_j[(r, c)]);
        self.noise.whiten(&mut residual);
        self.noise.whiten_jacobian(&mut jac_i);
        self.noise.whiten_jacobian(&mut jac_j);
        LinearFactor::new(self.keys.to_vec(), vec![jac_i, jac_j], residual)
    }

    fn log_normalization(&self) -> f64 {
        self.noise.log_normalization()
    }

    fn equals(&self, other: &dyn NonlinearFactor, tol: f64) -> bool {
        match other.as_any().downcast_ref::<BetweenFactor>() {
            Some(f) => {
                self.keys == f.keys
                    && self.measured.right_minus(&f.measured).norm() <= tol
                    && self.noise.equals(&f.noise, tol)
            }
            None => false,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
