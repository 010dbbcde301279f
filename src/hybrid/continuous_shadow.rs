//! Continuous-side shadow of a hybrid factor.

use crate::core::factor::{LinearFactor, NonlinearFactor};
use crate::core::symbols::Key;
use crate::core::values::{DiscreteValues, Values};
use crate::hybrid::factor::HybridFactor;
use std::any::Any;
use std::sync::{Arc, RwLock};

/// Adapter presenting a hybrid factor as a purely continuous nonlinear
/// factor with a frozen discrete assignment.
///
/// The solver registers one of these per hybrid factor, hands it to the
/// continuous optimizer, and refreshes the frozen assignment after every
/// discrete solve. Evaluation requires the shadow to be fully initialized:
/// every discrete key of the wrapped factor must have a frozen entry.
pub struct ContinuousShadowFactor {
    hybrid: Arc<dyn HybridFactor>,
    frozen_discrete: RwLock<DiscreteValues>,
}

impl ContinuousShadowFactor {
    /// Wrap a hybrid factor with an initially empty frozen assignment.
    pub fn new(hybrid: Arc<dyn HybridFactor>) -> Self {
        Self { hybrid, frozen_discrete: RwLock::new(DiscreteValues::new()) }
    }

    /// Shared handle to the wrapped hybrid factor.
    pub fn factor(&self) -> &Arc<dyn HybridFactor> {
        &self.hybrid
    }

    /// Copy of the frozen discrete assignment.
    pub fn frozen_discrete(&self) -> DiscreteValues {
        self.frozen_discrete.read().unwrap().clone()
    }

    /// Overwrite frozen entries for every discrete key of the wrapped
    /// factor that appears in `values`; other keys are left unchanged.
    /// Applying the same snapshot twice is a no-op.
    pub fn update_discrete(&self, values: &DiscreteValues) {
        let mut frozen = self.frozen_discrete.write().unwrap();
        for dk in self.hybrid.discrete_keys() {
            if let Some(assignment) = values.get(&dk.key) {
                frozen.insert(dk.key, *assignment);
            }
        }
    }

    /// True once every discrete key of the wrapped factor has a frozen
    /// entry.
    pub fn fully_initialized(&self) -> bool {
        let frozen = self.frozen_discrete.read().unwrap();
        self.hybrid.discrete_keys().iter().all(|dk| frozen.contains_key(&dk.key))
    }
}

impl NonlinearFactor for ContinuousShadowFactor {
    fn keys(&self) -> &[Key] {
        self.hybrid.keys()
    }

    fn dim(&self) -> usize {
        self.hybrid.dim()
    }

    fn error(&self, values: &Values) -> f64 {
        assert!(self.fully_initialized(), "continuous shadow evaluated before initialization");
        self.hybrid.error(values, &self.frozen_discrete.read().unwrap())
    }

    fn linearize(&self, values: &Values) -> LinearFactor {
        assert!(self.fully_initialized(), "continuous shadow linearized before initialization");
        self.hybrid.linearize(values, &self.frozen_discrete.read().unwrap())
    }

    fn equals(&self, other: &dyn NonlinearFactor, tol: f64) -> bool {
        match other.as_any().downcast_ref::<ContinuousShadowFactor>() {
            Some(f) => {
                self.hybrid.equals(f.hybrid.as_ref(), tol)
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
    use crate::core::symbols::{DiscreteKey, Symbol};
    use crate::factors::prior_factor::PriorFactor;
    use crate::hybrid::mixture_factor::MixtureFactor;
    use approx::assert_relative_eq;

    fn x1() -> Key {
        Symbol::new('x', 1).key()
    }

    fn d1() -> DiscreteKey {
        DiscreteKey::new(Symbol::new('d', 1), 2)
    }

    fn shadow() -> ContinuousShadowFactor {
        let tight = PriorFactor::new(x1(), 0.0, DiagonalNoise::isotropic(1, 1.0));
        let broad = PriorFactor::new(x1(), 0.0, DiagonalNoise::isotropic(1, 8.0));
        let mixture = MixtureFactor::new(vec![x1()], d1(), vec![tight, broad], true);
        ContinuousShadowFactor::new(Arc::new(mixture))
    }

    #[test]
    fn test_starts_uninitialized() {
        let shadow = shadow();
        assert!(!shadow.fully_initialized());
        let mut assignment = DiscreteValues::new();
        assignment.insert(d1().key, 1);
        shadow.update_discrete(&assignment);
        assert!(shadow.fully_initialized());
    }

    #[test]
    fn test_error_uses_frozen_assignment() {
        let shadow = shadow();
        let mut values = Values::new();
        values.insert(x1(), -2.5);

        let mut assignment = DiscreteValues::new();
        assignment.insert(d1().key, 0);
        shadow.update_discrete(&assignment);
        assert_relative_eq!(shadow.error(&values), 3.125);

        assignment.insert(d1().key, 1);
        shadow.update_discrete(&assignment);
        assert_relative_eq!(shadow.error(&values), 0.5 * (2.5f64 / 8.0).powi(2));
    }

    #[test]
    fn test_update_discrete_is_idempotent() {
        let shadow = shadow();
        let mut assignment = DiscreteValues::new();
        assignment.insert(d1().key, 1);
        shadow.update_discrete(&assignment);
        let once = shadow.frozen_discrete();
        shadow.update_discrete(&assignment);
        assert_eq!(once, shadow.frozen_discrete());
    }

    #[test]
    fn test_update_with_unrelated_keys_is_a_no_op() {
        let shadow = shadow();
        let mut unrelated = DiscreteValues::new();
        unrelated.insert(Symbol::new('z', 9).key(), 1);
        shadow.update_discrete(&unrelated);
        assert!(!shadow.fully_initialized());
        assert!(shadow.frozen_discrete().is_empty());
    }

    #[test]
    #[should_panic]
    fn test_evaluation_before_initialization_panics() {
        let shadow = shadow();
        let mut values = Values::new();
        values.insert(x1(), 0.0);
        shadow.error(&values);
    }
}
