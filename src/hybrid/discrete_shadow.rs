//! Discrete-side shadow of a hybrid factor.

use crate::core::symbols::DiscreteKey;
use crate::core::values::{DiscreteValues, Values};
use crate::discrete::decision_table::DecisionTable;
use crate::discrete::factor::DiscreteFactor;
use crate::hybrid::factor::HybridFactor;
use std::any::Any;
use std::sync::{Arc, RwLock};

/// Adapter presenting a hybrid factor as a purely discrete factor with
/// frozen continuous values.
///
/// The solver registers one of these per hybrid factor inside the
/// accumulated discrete graph and refreshes the frozen snapshots from the
/// latest continuous estimate before every discrete solve.
pub struct DiscreteShadowFactor {
    hybrid: Arc<dyn HybridFactor>,
    frozen_continuous: RwLock<Values>,
    frozen_discrete: RwLock<DiscreteValues>,
}

impl DiscreteShadowFactor {
    /// Wrap a hybrid factor with initially empty frozen snapshots.
    pub fn new(hybrid: Arc<dyn HybridFactor>) -> Self {
        Self {
            hybrid,
            frozen_continuous: RwLock::new(Values::new()),
            frozen_discrete: RwLock::new(DiscreteValues::new()),
        }
    }

    /// Shared handle to the wrapped hybrid factor.
    pub fn factor(&self) -> &Arc<dyn HybridFactor> {
        &self.hybrid
    }

    pub fn frozen_continuous(&self) -> Values {
        self.frozen_continuous.read().unwrap().clone()
    }

    pub fn frozen_discrete(&self) -> DiscreteValues {
        self.frozen_discrete.read().unwrap().clone()
    }

    /// Overwrite or insert frozen entries for every continuous key of the
    /// wrapped factor that appears in `values`; other keys are left alone.
    pub fn update_continuous(&self, values: &Values) {
        let mut frozen = self.frozen_continuous.write().unwrap();
        for key in self.hybrid.keys() {
            if let Some(value) = values.get(*key) {
                frozen.insert_or_update(*key, value.clone());
            }
        }
    }

    /// Overwrite frozen entries for every discrete key of the wrapped
    /// factor that appears in `values`.
    pub fn update_discrete(&self, values: &DiscreteValues) {
        let mut frozen = self.frozen_discrete.write().unwrap();
        for dk in self.hybrid.discrete_keys() {
            if let Some(assignment) = values.get(&dk.key) {
                frozen.insert(dk.key, *assignment);
            }
        }
    }

    /// True once every continuous key has a frozen value. Table conversion
    /// and evaluation need at least this much.
    pub fn continuous_initialized(&self) -> bool {
        let frozen = self.frozen_continuous.read().unwrap();
        self.hybrid.keys().iter().all(|key| frozen.exists(*key))
    }

    /// True once both frozen snapshots cover the wrapped factor's scope.
    pub fn fully_initialized(&self) -> bool {
        let frozen = self.frozen_discrete.read().unwrap();
        self.continuous_initialized()
            && self.hybrid.discrete_keys().iter().all(|dk| frozen.contains_key(&dk.key))
    }
}

impl DiscreteFactor for DiscreteShadowFactor {
    fn discrete_keys(&self) -> Vec<DiscreteKey> {
        self.hybrid.discrete_keys().to_vec()
    }

    fn value(&self, values: &DiscreteValues) -> f64 {
        assert!(
            self.continuous_initialized(),
            "discrete shadow evaluated before continuous initialization"
        );
        (-self.hybrid.error(&self.frozen_continuous.read().unwrap(), values)).exp()
    }

    fn to_decision_table(&self) -> DecisionTable {
        assert!(
            self.continuous_initialized(),
            "discrete shadow converted before continuous initialization"
        );
        self.hybrid.to_discrete_table(
            &self.frozen_continuous.read().unwrap(),
            &self.frozen_discrete.read().unwrap(),
        )
    }

    fn equals(&self, other: &dyn DiscreteFactor, tol: f64) -> bool {
        match other.as_any().downcast_ref::<DiscreteShadowFactor>() {
            Some(f) => {
                self.hybrid.equals(f.hybrid.as_ref(), tol)
                    && self.frozen_continuous().equals(&f.frozen_continuous(), tol)
                    && self.frozen_discrete() == f.frozen_discrete()
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
    use crate::core::symbols::{Key, Symbol};
    use crate::factors::prior_factor::PriorFactor;
    use crate::hybrid::mixture_factor::MixtureFactor;
    use approx::assert_relative_eq;

    fn x1() -> Key {
        Symbol::new('x', 1).key()
    }

    fn d1() -> DiscreteKey {
        DiscreteKey::new(Symbol::new('d', 1), 2)
    }

    fn shadow() -> DiscreteShadowFactor {
        let tight = PriorFactor::new(x1(), 0.0, DiagonalNoise::isotropic(1, 1.0));
        let broad = PriorFactor::new(x1(), 0.0, DiagonalNoise::isotropic(1, 8.0));
        let mixture = MixtureFactor::new(vec![x1()], d1(), vec![tight, broad], false);
        DiscreteShadowFactor::new(Arc::new(mixture))
    }

    #[test]
    fn test_table_selects_null_hypothesis_when_misinitialized() {
        // Continuous value far from the mean: the broad hypothesis wins.
        let shadow = shadow();
        let mut values = Values::new();
        values.insert(x1(), -2.5);
        shadow.update_continuous(&values);

        let table = shadow.to_decision_table();
        assert_eq!(table.max_assignment()[&d1().key], 1);
    }

    #[test]
    fn test_table_flips_after_continuous_update() {
        let shadow = shadow();
        let mut values = Values::new();
        values.insert(x1(), -2.5);
        shadow.update_continuous(&values);

        let mut solved = Values::new();
        solved.insert(x1(), 0.0);
        shadow.update_continuous(&solved);

        let table = shadow.to_decision_table();
        assert_eq!(table.max_assignment()[&d1().key], 0);
    }

    #[test]
    fn test_value_is_exp_negative_error() {
        let shadow = shadow();
        let mut values = Values::new();
        values.insert(x1(), 0.0);
        shadow.update_continuous(&values);

        let mut assignment = DiscreteValues::new();
        assignment.insert(d1().key, 0);
        // Unnormalized mixture at the mean: error is the tight component's
        // log normalizing constant.
        let expected = (-DiagonalNoise::isotropic(1, 1.0).log_normalization()).exp();
        assert_relative_eq!(shadow.value(&assignment), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_update_continuous_is_idempotent() {
        let shadow = shadow();
        let mut values = Values::new();
        values.insert(x1(), 1.5);
        shadow.update_continuous(&values);
        let once = shadow.frozen_continuous();
        shadow.update_continuous(&values);
        assert!(once.equals(&shadow.frozen_continuous(), 0.0));
    }

    #[test]
    fn test_initialization_tracks_both_sides() {
        let shadow = shadow();
        assert!(!shadow.fully_initialized());

        let mut values = Values::new();
        values.insert(x1(), 0.0);
        shadow.update_continuous(&values);
        assert!(shadow.continuous_initialized());
        assert!(!shadow.fully_initialized());

        let mut assignment = DiscreteValues::new();
        assignment.insert(d1().key, 0);
        shadow.update_discrete(&assignment);
        assert!(shadow.fully_initialized());
    }

    #[test]
    #[should_panic]
    fn test_table_before_continuous_initialization_panics() {
        shadow().to_decision_table();
    }
}
