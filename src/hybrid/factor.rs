//! The hybrid factor abstraction.
//!
//! A hybrid factor's scope is the union of an ordered list of continuous
//! keys and an ordered list of discrete keys; its error depends on both a
//! continuous value map and a discrete assignment. The alternation solver
//! never evaluates a hybrid factor directly — it splits each one into a
//! continuous-side and a discrete-side shadow and keeps both in sync.

use crate::core::factor::LinearFactor;
use crate::core::symbols::{DiscreteKey, Key};
use crate::core::values::{DiscreteValues, Values};
use crate::discrete::decision_table::{enumerate_assignments, DecisionTable};
use std::any::Any;

/// A factor over both continuous and discrete variables.
///
/// All evaluation methods require every key of the factor to be present in
/// the corresponding argument; a missing key is a caller contract violation
/// and panics.
pub trait HybridFactor: Send + Sync {
    /// Continuous keys, in stable order.
    fn keys(&self) -> &[Key];

    /// Discrete keys with cardinalities, in stable order.
    fn discrete_keys(&self) -> &[DiscreteKey];

    /// Rows contributed to the stacked Jacobian.
    fn dim(&self) -> usize;

    /// Negative log-likelihood at the joint assignment.
    fn error(&self, continuous: &Values, discrete: &DiscreteValues) -> f64;

    /// Gaussian approximation at `continuous` with the discrete assignment
    /// frozen.
    fn linearize(&self, continuous: &Values, discrete: &DiscreteValues) -> LinearFactor;

    /// Discrete factor over this factor's discrete keys, evaluated at the
    /// frozen continuous values.
    fn to_discrete_table(&self, continuous: &Values, discrete: &DiscreteValues) -> DecisionTable;

    /// `0.5 * (d log 2 pi + log det Sigma)` for factors with a Gaussian
    /// noise model; zero for factors that declare themselves normalized.
    fn log_normalizing_constant(&self, continuous: &Values) -> f64;

    /// Structural equality up to a tolerance.
    fn equals(&self, other: &dyn HybridFactor, tol: f64) -> bool;

    /// Downcasting hook.
    fn as_any(&self) -> &dyn Any;
}

/// Default table conversion: enumerate every joint assignment of the
/// factor's own discrete keys on top of the frozen assignment and store
/// `exp(-error)`.
pub(crate) fn table_from_error(
    factor: &dyn HybridFactor,
    continuous: &Values,
    discrete: &DiscreteValues,
) -> DecisionTable {
    let dkeys = factor.discrete_keys();
    let values: Vec<f64> = enumerate_assignments(dkeys)
        .iter()
        .map(|assignment| {
            let mut joint = discrete.clone();
            for (dk, &a) in dkeys.iter().zip(assignment) {
                joint.insert(dk.key, a);
            }
            (-factor.error(continuous, &joint)).exp()
        })
        .collect();
    DecisionTable::new(dkeys, values)
}
