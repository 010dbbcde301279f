//! Gaussian noise models.
//!
//! Factors whiten their residuals and Jacobians with the square-root
//! information of a diagonal Gaussian, so the optimizer only ever sees unit
//! covariance blocks. The log-normalization constant is what the hybrid
//! mixture factors add to component errors under the unnormalized policy.

use nalgebra::{DMatrix, DVector};

/// Diagonal Gaussian noise model parameterized by per-row sigmas.
#[derive(Clone, Debug, PartialEq)]
pub struct DiagonalNoise {
    sigmas: DVector<f64>,
}

impl DiagonalNoise {
    pub fn from_sigmas(sigmas: &[f64]) -> Self {
        assert!(
            sigmas.iter().all(|s| *s > 0.0),
            "noise sigmas must be strictly positive"
        );
        Self { sigmas: DVector::from_column_slice(sigmas) }
    }

    /// Same sigma on every row.
    pub fn isotropic(dim: usize, sigma: f64) -> Self {
        Self::from_sigmas(&vec![sigma; dim])
    }

    pub fn dim(&self) -> usize {
        self.sigmas.len()
    }

    pub fn sigmas(&self) -> &DVector<f64> {
        &self.sigmas
    }

    /// Scale a residual by the square-root information.
    pub fn whiten(&self, residual: &mut DVector<f64>) {
        debug_assert_eq!(residual.len(), self.dim());
        for (r, sigma) in residual.iter_mut().zip(self.sigmas.iter()) {
            *r /= sigma;
        }
    }

    /// Scale Jacobian rows by the square-root information.
    pub fn whiten_jacobian(&self, jacobian: &mut DMatrix<f64>) {
        debug_assert_eq!(jacobian.nrows(), self.dim());
        for (i, sigma) in self.sigmas.iter().enumerate() {
            let mut row = jacobian.row_mut(i);
            row /= *sigma;
        }
    }

    /// Half the squared Mahalanobis norm of a raw residual.
    pub fn error(&self, residual: &DVector<f64>) -> f64 {
        let mut whitened = residual.clone();
        self.whiten(&mut whitened);
        0.5 * whitened.norm_squared()
    }

    /// `0.5 * (d * log(2*pi) + log det Sigma)` — the negative log of the
    /// Gaussian density's peak value.
    pub fn log_normalization(&self) -> f64 {
        let d = self.dim() as f64;
        let log_det: f64 = self.sigmas.iter().map(|s| 2.0 * s.ln()).sum();
        0.5 * (d * (2.0 * std::f64::consts::PI).ln() + log_det)
    }

    pub fn equals(&self, other: &DiagonalNoise, tol: f64) -> bool {
        self.dim() == other.dim()
            && self
                .sigmas
                .iter()
                .zip(other.sigmas.iter())
                .all(|(a, b)| (a - b).abs() <= tol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_whiten_scales_by_inverse_sigma() {
        let noise = DiagonalNoise::from_sigmas(&[2.0, 0.5]);
        let mut r = DVector::from_column_slice(&[4.0, 1.0]);
        noise.whiten(&mut r);
        assert_relative_eq!(r[0], 2.0);
        assert_relative_eq!(r[1], 2.0);
    }

    #[test]
    fn test_error_is_half_mahalanobis() {
        let noise = DiagonalNoise::isotropic(1, 1.0);
        let r = DVector::from_column_slice(&[-2.5]);
        assert_relative_eq!(noise.error(&r), 3.125);
    }

    #[test]
    fn test_log_normalization_unit_sigma() {
        // For d = 1, sigma = 1: 0.5 * log(2 pi).
        let noise = DiagonalNoise::isotropic(1, 1.0);
        assert_relative_eq!(noise.log_normalization(), 0.9189385332046727, epsilon = 1e-12);
    }

    #[test]
    fn test_log_normalization_grows_with_sigma() {
        let narrow = DiagonalNoise::isotropic(1, 1.0);
        let wide = DiagonalNoise::isotropic(1, 8.0);
        assert_relative_eq!(
            wide.log_normalization() - narrow.log_normalization(),
            8.0_f64.ln(),
            epsilon = 1e-12
        );
    }

    #[test]
    #[should_panic]
    fn test_zero_sigma_rejected() {
        DiagonalNoise::from_sigmas(&[0.0]);
    }
}
