//! Value containers for continuous and discrete variable assignments.

use crate::core::symbols::Key;
use crate::manifold::se2::SE2;
use nalgebra::{DVector, Vector2, Vector3};
use std::collections::BTreeMap;

/// A single continuous variable: a manifold element tagged by type.
///
/// The tangent dimension and the retract / local-coordinates pair are what
/// the optimizer needs; everything else is accessed through the typed
/// getters on [`Values`].
#[derive(Clone, Debug, PartialEq)]
pub enum VariableValue {
    Pose2(SE2),
    Point2(Vector2<f64>),
    Scalar(f64),
}

impl VariableValue {
    /// Tangent-space dimension of this variable.
    pub fn dim(&self) -> usize {
        match self {
            VariableValue::Pose2(_) => SE2::DOF,
            VariableValue::Point2(_) => 2,
            VariableValue::Scalar(_) => 1,
        }
    }

    /// Apply a tangent-space perturbation (right plus for poses, addition
    /// for Euclidean variables).
    pub fn retract(&self, delta: &[f64]) -> VariableValue {
        debug_assert_eq!(delta.len(), self.dim());
        match self {
            VariableValue::Pose2(pose) => {
                let tau = Vector3::new(delta[0], delta[1], delta[2]);
                VariableValue::Pose2(pose.right_plus(&tau))
            }
            VariableValue::Point2(p) => {
                VariableValue::Point2(p + Vector2::new(delta[0], delta[1]))
            }
            VariableValue::Scalar(s) => VariableValue::Scalar(s + delta[0]),
        }
    }

    /// Tangent vector taking `self` to `other`.
    pub fn local_coordinates(&self, other: &VariableValue) -> DVector<f64> {
        match (self, other) {
            (VariableValue::Pose2(a), VariableValue::Pose2(b)) => {
                let tau = b.right_minus(a);
                DVector::from_column_slice(&[tau.x, tau.y, tau.z])
            }
            (VariableValue::Point2(a), VariableValue::Point2(b)) => {
                DVector::from_column_slice(&[b.x - a.x, b.y - a.y])
            }
            (VariableValue::Scalar(a), VariableValue::Scalar(b)) => {
                DVector::from_column_slice(&[b - a])
            }
            _ => panic!("local_coordinates between mismatched variable types"),
        }
    }

    pub fn is_finite(&self) -> bool {
        match self {
            VariableValue::Pose2(p) => {
                p.x().is_finite() && p.y().is_finite() && p.theta().is_finite()
            }
            VariableValue::Point2(p) => p.x.is_finite() && p.y.is_finite(),
            VariableValue::Scalar(s) => s.is_finite(),
        }
    }
}

impl From<SE2> for VariableValue {
    fn from(pose: SE2) -> Self {
        VariableValue::Pose2(pose)
    }
}

impl From<Vector2<f64>> for VariableValue {
    fn from(point: Vector2<f64>) -> Self {
        VariableValue::Point2(point)
    }
}

impl From<f64> for VariableValue {
    fn from(scalar: f64) -> Self {
        VariableValue::Scalar(scalar)
    }
}

/// Assignment to discrete variables: key to state index.
pub type DiscreteValues = BTreeMap<Key, usize>;

/// Ordered map from continuous key to variable value.
///
/// Iteration order follows key order, which keeps the optimizer's column
/// layout deterministic across runs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Values {
    map: BTreeMap<Key, VariableValue>,
}

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new variable. Panics if the key is already present.
    pub fn insert(&mut self, key: impl Into<Key>, value: impl Into<VariableValue>) {
        let key = key.into();
        let prev = self.map.insert(key, value.into());
        assert!(prev.is_none(), "value for {key} already present");
    }

    /// Overwrite an existing variable. Panics if the key is missing.
    pub fn update(&mut self, key: impl Into<Key>, value: impl Into<VariableValue>) {
        let key = key.into();
        let slot = self.map.get_mut(&key).unwrap_or_else(|| panic!("no value for {key}"));
        *slot = value.into();
    }

    /// Insert the value, overwriting any previous entry.
    pub fn insert_or_update(&mut self, key: impl Into<Key>, value: impl Into<VariableValue>) {
        self.map.insert(key.into(), value.into());
    }

    /// Merge another set of values: update present keys, insert new ones.
    pub fn merge(&mut self, other: &Values) {
        for (key, value) in other.iter() {
            self.map.insert(*key, value.clone());
        }
    }

    pub fn exists(&self, key: Key) -> bool {
        self.map.contains_key(&key)
    }

    pub fn get(&self, key: Key) -> Option<&VariableValue> {
        self.map.get(&key)
    }

    /// Fetch a value, panicking with the key name when absent. Factor
    /// evaluation relies on this as its precondition check.
    pub fn at(&self, key: Key) -> &VariableValue {
        self.map.get(&key).unwrap_or_else(|| panic!("no value for {key}"))
    }

    pub fn at_pose2(&self, key: Key) -> &SE2 {
        match self.at(key) {
            VariableValue::Pose2(pose) => pose,
            other => panic!("{key} holds {other:?}, expected Pose2"),
        }
    }

    pub fn at_point2(&self, key: Key) -> &Vector2<f64> {
        match self.at(key) {
            VariableValue::Point2(p) => p,
            other => panic!("{key} holds {other:?}, expected Point2"),
        }
    }

    pub fn at_scalar(&self, key: Key) -> f64 {
        match self.at(key) {
            VariableValue::Scalar(s) => *s,
            other => panic!("{key} holds {other:?}, expected Scalar"),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.map.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &VariableValue)> {
        self.map.iter()
    }

    /// Sum of tangent dimensions over all variables.
    pub fn total_dim(&self) -> usize {
        self.map.values().map(|v| v.dim()).sum()
    }

    /// Approximate equality: same keys, and every pair of values within
    /// `tol` in local coordinates.
    pub fn equals(&self, other: &Values, tol: f64) -> bool {
        if self.map.len() != other.map.len() {
            return false;
        }
        self.iter().all(|(key, value)| match other.get(*key) {
            Some(o) if o.dim() == value.dim() => value.local_coordinates(o).norm() <= tol,
            _ => false,
        })
    }
}

/// Joint estimate returned by the alternation controller.
#[derive(Clone, Debug, Default)]
pub struct HybridValues {
    pub continuous: Values,
    pub discrete: DiscreteValues,
}
