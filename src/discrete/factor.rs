//! Discrete factor abstraction and the categorical prior factor.

use crate::core::symbols::{DiscreteKey, Key};
use crate::core::values::DiscreteValues;
use crate::discrete::decision_table::DecisionTable;
use std::any::Any;
use std::sync::RwLock;

/// A factor over discrete variables only.
pub trait DiscreteFactor: Send + Sync {
    /// Discrete keys in this factor's scope.
    fn discrete_keys(&self) -> Vec<DiscreteKey>;

    /// Plain keys of the scope.
    fn keys(&self) -> Vec<Key> {
        self.discrete_keys().iter().map(|k| k.key).collect()
    }

    /// Likelihood value at a joint assignment.
    fn value(&self, values: &DiscreteValues) -> f64;

    /// Convert to a decision table over the factor's scope.
    fn to_decision_table(&self) -> DecisionTable;

    fn equals(&self, other: &dyn DiscreteFactor, tol: f64) -> bool;

    /// Downcasting hook; the controller and users reach concrete factor
    /// types through it (e.g. to update prior probabilities in place).
    fn as_any(&self) -> &dyn Any;
}

/// Categorical prior on a single discrete variable.
///
/// `probs[i]` is the (possibly unnormalized) likelihood of state `i`; the
/// vector length must equal the variable's cardinality. The probabilities
/// can be replaced in place through a shared handle, which is how measurement
/// updates reach a factor that already lives in the accumulated graph.
#[derive(Debug)]
pub struct DiscretePriorFactor {
    dk: DiscreteKey,
    probs: RwLock<Vec<f64>>,
}

impl DiscretePriorFactor {
    pub fn new(dk: DiscreteKey, probs: &[f64]) -> Self {
        assert_eq!(probs.len(), dk.cardinality, "probability vector must match cardinality");
        Self { dk, probs: RwLock::new(probs.to_vec()) }
    }

    pub fn discrete_key(&self) -> DiscreteKey {
        self.dk
    }

    pub fn probs(&self) -> Vec<f64> {
        self.probs.read().unwrap().clone()
    }

    /// Replace the stored probabilities. The length must match the
    /// cardinality of the variable.
    pub fn update_probs(&self, probs: &[f64]) {
        let mut guard = self.probs.write().unwrap();
        assert_eq!(probs.len(), guard.len(), "probability vector must match cardinality");
        guard.copy_from_slice(probs);
    }
}

impl Clone for DiscretePriorFactor {
    fn clone(&self) -> Self {
        Self { dk: self.dk, probs: RwLock::new(self.probs()) }
    }
}

impl DiscreteFactor for DiscretePriorFactor {
    fn discrete_keys(&self) -> Vec<DiscreteKey> {
        vec![self.dk]
    }

    fn value(&self, values: &DiscreteValues) -> f64 {
        let assignment = *values
            .get(&self.dk.key)
            .unwrap_or_else(|| panic!("no assignment for {}", self.dk.key));
        self.probs.read().unwrap()[assignment]
    }

    fn to_decision_table(&self) -> DecisionTable {
        DecisionTable::from_key(self.dk, &self.probs())
    }

    fn equals(&self, other: &dyn DiscreteFactor, tol: f64) -> bool {
        match other.as_any().downcast_ref::<DiscretePriorFactor>() {
            Some(f) => {
                self.dk == f.dk
                    && self
                        .probs()
                        .iter()
                        .zip(f.probs().iter())
                        .all(|(a, b)| (a - b).abs() <= tol)
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
    use approx::assert_relative_eq;

    fn d1() -> DiscreteKey {
        DiscreteKey::new(Symbol::new('d', 1), 2)
    }

    #[test]
    fn test_value_indexes_probs() {
        let f = DiscretePriorFactor::new(d1(), &[0.1, 0.9]);
        let mut values = DiscreteValues::new();
        values.insert(d1().key, 1);
        assert_relative_eq!(f.value(&values), 0.9);
    }

    #[test]
    fn test_update_probs_in_place() {
        let f = DiscretePriorFactor::new(d1(), &[0.1, 0.9]);
        f.update_probs(&[0.9, 0.1]);
        assert_relative_eq!(f.to_decision_table().values()[0], 0.9);
    }

    #[test]
    #[should_panic]
    fn test_update_probs_rejects_wrong_length() {
        let f = DiscretePriorFactor::new(d1(), &[0.1, 0.9]);
        f.update_probs(&[0.2, 0.3, 0.5]);
    }

    #[test]
    fn test_equals_compares_probs() {
        let a = DiscretePriorFactor::new(d1(), &[0.1, 0.9]);
        let b = DiscretePriorFactor::new(d1(), &[0.1, 0.9]);
        let c = DiscretePriorFactor::new(d1(), &[0.5, 0.5]);
        assert!(a.equals(&b, 1e-9));
        assert!(!a.equals(&c, 1e-9));
    }
}
