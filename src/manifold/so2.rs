//! SO(2) — planar rotations.
//!
//! Stored as a wrapped angle. The tangent space is one-dimensional, so most
//! Jacobians degenerate to scalars and are omitted; SE(2) carries the full
//! Jacobian machinery.

use crate::manifold::wrap_angle;
use nalgebra::{Matrix2, Vector2};
use std::fmt;

/// SO(2) group element representing a rotation in the plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SO2 {
    angle: f64,
}

impl SO2 {
    /// Degrees of freedom of the tangent space.
    pub const DOF: usize = 1;

    pub fn identity() -> Self {
        Self { angle: 0.0 }
    }

    pub fn from_angle(angle: f64) -> Self {
        Self { angle: wrap_angle(angle) }
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// 2x2 rotation matrix.
    pub fn rotation_matrix(&self) -> Matrix2<f64> {
        let (s, c) = self.angle.sin_cos();
        Matrix2::new(c, -s, s, c)
    }

    pub fn inverse(&self) -> Self {
        Self { angle: wrap_angle(-self.angle) }
    }

    pub fn compose(&self, other: &SO2) -> Self {
        Self::from_angle(self.angle + other.angle)
    }

    /// Rotate a vector.
    pub fn rotate(&self, v: &Vector2<f64>) -> Vector2<f64> {
        self.rotation_matrix() * v
    }

    /// Rotate a vector by the inverse rotation.
    pub fn unrotate(&self, v: &Vector2<f64>) -> Vector2<f64> {
        self.rotation_matrix().transpose() * v
    }
}

impl fmt::Display for SO2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SO2({:.4})", self.angle)
    }
}
