//! Bearing-range observation of a planar landmark from an SE(2) pose.

use crate::core::factor::{LinearFactor, NonlinearFactor};
use crate::core::noise::DiagonalNoise;
use crate::core::symbols::Key;
use crate::core::values::Values;
use crate::manifold::wrap_angle;
use nalgebra::{DMatrix, DVector, RowVector2};
use std::any::Any;

/// Bearing (body frame) and range measurement of a 2D point landmark.
///
/// Residual rows are `[wrap(bearing(x, l) - z_b), range(x, l) - z_r]`.
#[derive(Clone, Debug)]
pub struct BearingRangeFactor {
    keys: [Key; 2],
    measured_bearing: f64,
    measured_range: f64,
    noise: DiagonalNoise,
}

impl BearingRangeFactor {
    pub fn new(
        pose_key: impl Into<Key>,
        point_key: impl Into<Key>,
        measured_bearing: f64,
        measured_range: f64,
        noise: DiagonalNoise,
    ) -> Self {
        assert_eq!(noise.dim(), 2, "bearing-range factor needs a 2-dimensional noise model");
        assert!(measured_range > 0.0, "measured range must be positive");
        Self {
            keys: [pose_key.into(), point_key.into()],
            measured_bearing,
            measured_range,
            noise,
        }
    }

    fn residual_and_jacobians(&self, values: &Values) -> (DVector<f64>, DMatrix<f64>, DMatrix<f64>) {
        let pose = values.at_pose2(self.keys[0]);
        let point = values.at_point2(self.keys[1]);

        let d = point - pose.translation();
        let q = d.norm_squared();
        let range = q.sqrt();
        let bearing = wrap_angle(d.y.atan2(d.x) - pose.theta());

        let residual = DVector::from_column_slice(&[
            wrap_angle(bearing - self.measured_bearing),
            range - self.measured_range,
        ]);

        // Pose perturbation is in the body frame: t' = t + R * drho.
        let rot = pose.rotation().rotation_matrix();
        let d_bearing_d_t = RowVector2::new(d.y / q, -d.x / q);
        let d_range_d_t = RowVector2::new(-d.x / range, -d.y / range);

        let mut jac_pose = DMatrix::zeros(2, 3);
        let bearing_rho = d_bearing_d_t * rot;
        let range_rho = d_range_d_t * rot;
        jac_pose[(0, 0)] = bearing_rho[0];
        jac_pose[(0, 1)] = bearing_rho[1];
        jac_pose[(0, 2)] = -1.0;
        jac_pose[(1, 0)] = range_rho[0];
        jac_pose[(1, 1)] = range_rho[1];

        let mut jac_point = DMatrix::zeros(2, 2);
        jac_point[(0, 0)] = -d.y / q;
        jac_point[(0, 1)] = d.x / q;
        jac_point[(1, 0)] = d.x / range;
        jac_point[(1, 1)] = d.y / range;

        (residual, jac_pose, jac_point)
    }
}

impl NonlinearFactor for BearingRangeFactor {
    fn keys(&self) -> &[Key] {
        &self.keys
    }

    fn dim(&self) -> usize {
        2
    }

    fn error(&self, values: &Values) -> f64 {
        let (residual, _, _) = self.residual_and_jacobians(values);
        self.noise.error(&residual)
    }

    fn linearize(&self, values: &Values) -> LinearFactor {
        let (mut residual, mut jac_pose, mut jac_point) = self.residual_and_jacobians(values);
        self.noise.whiten(&mut residual);
        self.noise.whiten_jacobian(&mut jac_pose);
        self.noise.whiten_jacobian(&mut jac_point);
        LinearFactor::new(self.keys.to_vec(), vec![jac_pose, jac_point], residual)
    }

    fn log_normalization(&self) -> f64 {
        self.noise.log_normalization()
    }

    fn equals(&self, other: &dyn NonlinearFactor, tol: f64) -> bool {
        match other.as_any().downcast_ref::<BearingRangeFactor>() {
            Some(f) => {
                self.keys == f.keys
                    && (self.measured_bearing - f.measured_bearing).abs() <= tol
                    && (self.measured_range - f.measured_range).abs() <= tol
                    && self.noise.equals(&f.noise, tol)
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
    use crate::core::symbols::Symbol;
    use crate::manifold::se2::SE2;
    use approx::assert_relative_eq;
    use nalgebra::{Vector2, Vector3};
    use std::f64::consts::FRAC_PI_2;

    fn keys() -> (Key, Key) {
        (Symbol::new('x', 0).key(), Symbol::new('l', 1).key())
    }

    #[test]
    fn test_zero_residual_at_exact_measurement() {
        let (xk, lk) = keys();
        // Landmark one meter to the robot's left.
        let factor =
            BearingRangeFactor::new(xk, lk, FRAC_PI_2, 1.0, DiagonalNoise::isotropic(2, 0.1));
        let mut values = Values::new();
        values.insert(xk, SE2::identity());
        values.insert(lk, Vector2::new(0.0, 1.0));
        assert_relative_eq!(factor.error(&values), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_bearing_accounts_for_heading() {
        let (xk, lk) = keys();
        let factor = BearingRangeFactor::new(xk, lk, 0.0, 1.0, DiagonalNoise::isotropic(2, 0.1));
        // Robot rotated to face the landmark: bearing in body frame is zero.
        let mut values = Values::new();
        values.insert(xk, SE2::from_xy_theta(0.0, 0.0, FRAC_PI_2));
        values.insert(lk, Vector2::new(0.0, 1.0));
        assert_relative_eq!(factor.error(&values), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_jacobians_match_finite_differences() {
        let (xk, lk) = keys();
        let factor = BearingRangeFactor::new(xk, lk, 0.3, 1.5, DiagonalNoise::isotropic(2, 1.0));
        let mut values = Values::new();
        values.insert(xk, SE2::from_xy_theta(0.2, -0.1, 0.4));
        values.insert(lk, Vector2::new(1.3, 0.8));

        let lf = factor.linearize(&values);
        let eps = 1e-7;

        for i in 0..3 {
            let mut tau = Vector3::zeros();
            tau[i] = eps;
            let mut perturbed = values.clone();
            let pose = *perturbed.at_pose2(xk);
            perturbed.update(xk, pose.right_plus(&tau));
            let fd = (factor.linearize(&perturbed).residual - &lf.residual) / eps;
            for r in 0..2 {
                assert_relative_eq!(lf.jacobians[0][(r, i)], fd[r], epsilon = 1e-5);
            }
        }

        for i in 0..2 {
            let mut perturbed = values.clone();
            let mut point = *perturbed.at_point2(lk);
            point[i] += eps;
            perturbed.update(lk, point);
            let fd = (factor.linearize(&perturbed).residual - &lf.residual) / eps;
            for r in 0..2 {
                assert_relative_eq!(lf.jacobians[1][(r, i)], fd[r], epsilon = 1e-5);
            }
        }
    }
}
