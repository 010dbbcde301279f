//! Bearing-range measurement fused with a semantic class likelihood.

use crate::core::factor::{LinearFactor, NonlinearFactor};
use crate::core::noise::DiagonalNoise;
use crate::core::symbols::{DiscreteKey, Key};
use crate::core::values::{DiscreteValues, Values};
use crate::discrete::decision_table::DecisionTable;
use crate::factors::bearing_range_factor::BearingRangeFactor;
use crate::hybrid::factor::{table_from_error, HybridFactor};
use std::any::Any;
use std::sync::RwLock;

/// Hybrid factor tying a landmark observation to the landmark's class.
///
/// The error is the sum of the continuous and discrete negative
/// log-likelihoods: `error(x, c) = bearing_range.error(x) - log p[c]`.
/// Class likelihoods can be replaced in place through a shared handle as
/// new semantic measurements arrive.
pub struct SemanticBearingRangeFactor {
    keys: [Key; 2],
    dkeys: [DiscreteKey; 1],
    factor: BearingRangeFactor,
    probs: RwLock<Vec<f64>>,
}

impl SemanticBearingRangeFactor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pose_key: impl Into<Key>,
        point_key: impl Into<Key>,
        class_key: DiscreteKey,
        class_probs: &[f64],
        measured_bearing: f64,
        measured_range: f64,
        noise: DiagonalNoise,
    ) -> Self {
        assert_eq!(
            class_probs.len(),
            class_key.cardinality,
            "class likelihood length must match cardinality"
        );
        assert!(class_probs.iter().all(|p| *p > 0.0), "class likelihoods must be positive");
        let pose_key = pose_key.into();
        let point_key = point_key.into();
        Self {
            keys: [pose_key, point_key],
            dkeys: [class_key],
            factor: BearingRangeFactor::new(
                pose_key,
                point_key,
                measured_bearing,
                measured_range,
                noise,
            ),
            probs: RwLock::new(class_probs.to_vec()),
        }
    }

    pub fn class_probs(&self) -> Vec<f64> {
        self.probs.read().unwrap().clone()
    }

    /// Replace the class likelihoods in place.
    pub fn update_probs(&self, probs: &[f64]) {
        let mut guard = self.probs.write().unwrap();
        assert_eq!(probs.len(), guard.len(), "class likelihood length must match cardinality");
        assert!(probs.iter().all(|p| *p > 0.0), "class likelihoods must be positive");
        guard.copy_from_slice(probs);
    }
}

impl Clone for SemanticBearingRangeFactor {
    fn clone(&self) -> Self {
        Self {
            keys: self.keys,
            dkeys: self.dkeys,
            factor: self.factor.clone(),
            probs: RwLock::new(self.class_probs()),
        }
    }
}

impl HybridFactor for SemanticBearingRangeFactor {
    fn keys(&self) -> &[Key] {
        &self.keys
    }

    fn discrete_keys(&self) -> &[DiscreteKey] {
        &self.dkeys
    }

    fn dim(&self) -> usize {
        self.factor.dim()
    }

    fn error(&self, continuous: &Values, discrete: &DiscreteValues) -> f64 {
        let key = self.dkeys[0].key;
        let class =
            *discrete.get(&key).unwrap_or_else(|| panic!("no assignment for {key}"));
        // -log p(z_continuous, z_class | x, c) splits into the two terms.
        self.factor.error(continuous) - self.probs.read().unwrap()[class].ln()
    }

    fn linearize(&self, continuous: &Values, _discrete: &DiscreteValues) -> LinearFactor {
        self.factor.linearize(continuous)
    }

    fn to_discrete_table(&self, continuous: &Values, discrete: &DiscreteValues) -> DecisionTable {
        table_from_error(self, continuous, discrete)
    }

    fn log_normalizing_constant(&self, _continuous: &Values) -> f64 {
        self.factor.log_normalization()
    }

    fn equals(&self, other: &dyn HybridFactor, tol: f64) -> bool {
        match other.as_any().downcast_ref::<Self>() {
            Some(f) => {
                self.keys == f.keys
                    && self.dkeys == f.dkeys
                    && self.factor.equals(&f.factor, tol)
                    && self
                        .class_probs()
                        .iter()
                        .zip(f.class_probs().iter())
                        .all(|(a, b)| (a - b).abs() <= tol)
            }
            None => false,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
