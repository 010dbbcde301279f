//! Discrete-conditional mixture factor.

use crate::core::factor::{LinearFactor, NonlinearFactor};
use crate::core::symbols::{DiscreteKey, Key};
use crate::core::values::{DiscreteValues, Values};
use crate::discrete::decision_table::DecisionTable;
use crate::hybrid::factor::{table_from_error, HybridFactor};
use std::any::Any;

/// A hybrid factor where one discrete variable selects which of K
/// continuous component factors is active.
///
/// `error(x, d) = f_{d}.error(x)`, plus the selected component's log
/// normalizing constant when the factor is declared unnormalized, so that
/// components with different noise models compare on a common scale.
#[derive(Clone)]
pub struct MixtureFactor<F: NonlinearFactor + Clone + 'static> {
    keys: Vec<Key>,
    dkeys: [DiscreteKey; 1],
    factors: Vec<F>,
    normalized: bool,
}

impl<F: NonlinearFactor + Clone + 'static> MixtureFactor<F> {
    /// Build a mixture over `factors`, selected by `dk`. The component
    /// count must equal the cardinality of the selector variable.
    pub fn new(keys: Vec<Key>, dk: DiscreteKey, factors: Vec<F>, normalized: bool) -> Self {
        assert_eq!(
            factors.len(),
            dk.cardinality,
            "component count must match selector cardinality"
        );
        Self { keys, dkeys: [dk], factors, normalized }
    }

    pub fn components(&self) -> &[F] {
        &self.factors
    }

    pub fn normalized(&self) -> bool {
        self.normalized
    }

    fn selected(&self, discrete: &DiscreteValues) -> usize {
        let key = self.dkeys[0].key;
        *discrete.get(&key).unwrap_or_else(|| panic!("no assignment for {key}"))
    }
}

impl<F: NonlinearFactor + Clone + 'static> HybridFactor for MixtureFactor<F> {
    fn keys(&self) -> &[Key] {
        &self.keys
    }

    fn discrete_keys(&self) -> &[DiscreteKey] {
        &self.dkeys
    }

    fn dim(&self) -> usize {
        self.factors[0].dim()
    }

    fn error(&self, continuous: &Values, discrete: &DiscreteValues) -> f64 {
        let component = &self.factors[self.selected(discrete)];
        let error = component.error(continuous);
        if self.normalized {
            error
        } else {
            error + component.log_normalization()
        }
    }

    fn linearize(&self, continuous: &Values, discrete: &DiscreteValues) -> LinearFactor {
        self.factors[self.selected(discrete)].linearize(continuous)
    }

    fn to_discrete_table(&self, continuous: &Values, discrete: &DiscreteValues) -> DecisionTable {
        table_from_error(self, continuous, discrete)
    }

    fn log_normalizing_constant(&self, _continuous: &Values) -> f64 {
        // The error already folds the selected component's constant in
        // under the unnormalized policy.
        0.0
    }

    fn equals(&self, other: &dyn HybridFactor, tol: f64) -> bool {
        match other.as_any().downcast_ref::<Self>() {
            Some(f) => {
                self.keys == f.keys
                    && self.dkeys == f.dkeys
                    && self.normalized == f.normalized
                    && self.factors.len() == f.factors.len()
                    && self
                        .factors
                        .iter()
                        .zip(&f.factors)
                        .all(|(a, b)| a.equals(b, tol))
            }
            None => false,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
