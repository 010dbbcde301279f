//! SE(2) — planar rigid transformations.
//!
//! Elements pair an [`SO2`] rotation with a 2D translation. Tangent vectors
//! are `[x, y, theta]` with the translational part first. All Jacobians are
//! with respect to right perturbations: `X ⊕ delta = X ∘ Exp(delta)`.

use crate::manifold::so2::SO2;
use nalgebra::{Matrix2, Matrix3, Vector2, Vector3};
use std::fmt;

/// SE(2) group element representing a rigid transform in the plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SE2 {
    rotation: SO2,
    translation: Vector2<f64>,
}

impl SE2 {
    /// Degrees of freedom of the tangent space.
    pub const DOF: usize = 3;

    pub fn identity() -> Self {
        Self { rotation: SO2::identity(), translation: Vector2::zeros() }
    }

    pub fn new(translation: Vector2<f64>, rotation: SO2) -> Self {
        Self { rotation, translation }
    }

    pub fn from_xy_theta(x: f64, y: f64, theta: f64) -> Self {
        Self::new(Vector2::new(x, y), SO2::from_angle(theta))
    }

    pub fn x(&self) -> f64 {
        self.translation.x
    }

    pub fn y(&self) -> f64 {
        self.translation.y
    }

    pub fn theta(&self) -> f64 {
        self.rotation.angle()
    }

    pub fn translation(&self) -> Vector2<f64> {
        self.translation
    }

    pub fn rotation(&self) -> SO2 {
        self.rotation
    }

    /// Adjoint matrix `Ad(X)` mapping tangent vectors between frames.
    pub fn adjoint(&self) -> Matrix3<f64> {
        let r = self.rotation.rotation_matrix();
        let mut adj = Matrix3::identity();
        adj.fixed_view_mut::<2, 2>(0, 0).copy_from(&r);
        adj[(0, 2)] = self.translation.y;
        adj[(1, 2)] = -self.translation.x;
        adj
    }

    /// Group inverse. The optional Jacobian is `-Ad(X)`.
    pub fn inverse(&self, jacobian: Option<&mut Matrix3<f64>>) -> SE2 {
        if let Some(jac) = jacobian {
            *jac = -self.adjoint();
        }
        let rot_inv = self.rotation.inverse();
        SE2::new(-rot_inv.rotate(&self.translation), rot_inv)
    }

    /// Group composition `self ∘ other` with optional Jacobians.
    ///
    /// The Jacobian with respect to `self` is `Ad(other)⁻¹`; with respect to
    /// `other` it is the identity.
    pub fn compose(
        &self,
        other: &SE2,
        jacobian_self: Option<&mut Matrix3<f64>>,
        jacobian_other: Option<&mut Matrix3<f64>>,
    ) -> SE2 {
        if let Some(jac) = jacobian_self {
            *jac = other.inverse(None).adjoint();
        }
        if let Some(jac) = jacobian_other {
            *jac = Matrix3::identity();
        }
        SE2::new(
            self.translation + self.rotation.rotate(&other.translation),
            self.rotation.compose(&other.rotation),
        )
    }

    /// Logarithmic map. The optional Jacobian is `Jr⁻¹(Log X)`.
    pub fn log(&self, jacobian: Option<&mut Matrix3<f64>>) -> Vector3<f64> {
        let theta = self.rotation.angle();
        let (a, b) = exp_coefficients(theta);
        let v_inv = Matrix2::new(a, b, -b, a) / (a * a + b * b);
        let rho = v_inv * self.translation;
        let tau = Vector3::new(rho.x, rho.y, theta);
        if let Some(jac) = jacobian {
            *jac = right_jacobian_inv(&tau);
        }
        tau
    }

    /// Exponential map. The optional Jacobian is `Jr(tau)`.
    pub fn exp(tangent: &Vector3<f64>, jacobian: Option<&mut Matrix3<f64>>) -> SE2 {
        let theta = tangent.z;
        let (a, b) = exp_coefficients(theta);
        let v = Matrix2::new(a, -b, b, a);
        let rho = Vector2::new(tangent.x, tangent.y);
        if let Some(jac) = jacobian {
            *jac = right_jacobian(tangent);
        }
        SE2::new(v * rho, SO2::from_angle(theta))
    }

    /// Right plus: `self ∘ Exp(tangent)`.
    pub fn right_plus(&self, tangent: &Vector3<f64>) -> SE2 {
        self.compose(&SE2::exp(tangent, None), None, None)
    }

    /// Right minus: `Log(other⁻¹ ∘ self)`, the tangent taking `other` to
    /// `self`.
    pub fn right_minus(&self, other: &SE2) -> Vector3<f64> {
        other.inverse(None).compose(self, None, None).log(None)
    }
}

impl fmt::Display for SE2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SE2(x: {:.4}, y: {:.4}, theta: {:.4})",
            self.translation.x,
            self.translation.y,
            self.rotation.angle()
        )
    }
}

/// `A = sin(theta)/theta` and `B = (1 - cos(theta))/theta`, with Taylor
/// expansions near zero.
fn exp_coefficients(theta: f64) -> (f64, f64) {
    if theta.abs() < 1e-5 {
        let t2 = theta * theta;
        (1.0 - t2 / 6.0, theta / 2.0 - t2 * theta / 24.0)
    } else {
        ((theta.sin()) / theta, (1.0 - theta.cos()) / theta)
    }
}

/// Right Jacobian of the exponential map at `tau = [x, y, theta]`.
pub fn right_jacobian(tau: &Vector3<f64>) -> Matrix3<f64> {
    let (x, y, theta) = (tau.x, tau.y, tau.z);
    let (a, b) = exp_coefficients(theta);
    let (jr02, jr12) = if theta.abs() < 1e-5 {
        // Leading terms of ((theta - sin)/theta^2, (1 - cos)/theta^2).
        (theta * x / 6.0 - y / 2.0, x / 2.0 + theta * y / 6.0)
    } else {
        let t2 = theta * theta;
        (
            ((theta - theta.sin()) * x + (theta.cos() - 1.0) * y) / t2,
            ((1.0 - theta.cos()) * x + (theta - theta.sin()) * y) / t2,
        )
    };
    Matrix3::new(a, b, jr02, -b, a, jr12, 0.0, 0.0, 1.0)
}

/// Inverse of the right Jacobian, computed from the block structure
/// `[[M, c], [0, 1]]⁻¹ = [[M⁻¹, -M⁻¹ c], [0, 1]]`.
pub fn right_jacobian_inv(tau: &Vector3<f64>) -> Matrix3<f64> {
    let jr = right_jacobian(tau);
    let m = jr.fixed_view::<2, 2>(0, 0).into_owned();
    let c = Vector2::new(jr[(0, 2)], jr[(1, 2)]);
    let det = m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)];
    let m_inv = Matrix2::new(m[(1, 1)], -m[(0, 1)], -m[(1, 0)], m[(0, 0)]) / det;
    let c_inv = -m_inv * c;
    let mut out = Matrix3::identity();
    out.fixed_view_mut::<2, 2>(0, 0).copy_from(&m_inv);
    out[(0, 2)] = c_inv.x;
    out[(1, 2)] = c_inv.y;
    out
}
