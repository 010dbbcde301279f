//! Discrete factor graph with stable indices and tolerated removals.

use crate::core::symbols::DiscreteKey;
use crate::core::values::DiscreteValues;
use crate::discrete::decision_table::DecisionTable;
use crate::discrete::elimination::{compute_ordering, eliminate_multifrontal, OrderingType};
use crate::discrete::factor::DiscreteFactor;
use std::sync::Arc;

/// Bag of shared discrete factors.
///
/// Factors keep the index they were inserted at for their whole lifetime;
/// removal leaves a null slot behind, and every consumer silently skips
/// null slots. Removing an index that is already empty or out of range is a
/// no-op.
#[derive(Clone, Default)]
pub struct DiscreteFactorGraph {
    factors: Vec<Option<Arc<dyn DiscreteFactor>>>,
}

impl DiscreteFactorGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an owned factor; returns its stable index.
    pub fn push<F: DiscreteFactor + 'static>(&mut self, factor: F) -> usize {
        self.push_shared(Arc::new(factor))
    }

    /// Add a shared factor handle; returns its stable index.
    pub fn push_shared(&mut self, factor: Arc<dyn DiscreteFactor>) -> usize {
        self.factors.push(Some(factor));
        self.factors.len() - 1
    }

    /// Remove the factor at `index`. Unknown or already-removed indices are
    /// silently tolerated.
    pub fn remove(&mut self, index: usize) {
        if let Some(slot) = self.factors.get_mut(index) {
            *slot = None;
        }
    }

    pub fn get(&self, index: usize) -> Option<&Arc<dyn DiscreteFactor>> {
        self.factors.get(index).and_then(|slot| slot.as_ref())
    }

    /// Number of live factors.
    pub fn len(&self) -> usize {
        self.factors.iter().filter(|slot| slot.is_some()).count()
    }

    /// Number of slots including removed ones.
    pub fn num_slots(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate live factors with their stable indices.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Arc<dyn DiscreteFactor>)> {
        self.factors
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|f| (i, f)))
    }

    /// Union of discrete keys over live factors, sorted by key.
    pub fn discrete_keys(&self) -> Vec<DiscreteKey> {
        let mut keys: Vec<DiscreteKey> = Vec::new();
        for (_, factor) in self.iter() {
            for dk in factor.discrete_keys() {
                match keys.iter().find(|k| k.key == dk.key) {
                    Some(existing) => assert_eq!(
                        existing.cardinality, dk.cardinality,
                        "cardinality mismatch for {}",
                        dk.key
                    ),
                    None => keys.push(dk),
                }
            }
        }
        keys.sort_by_key(|k| k.key);
        keys
    }

    /// Tables of all live factors.
    pub fn tables(&self) -> Vec<DecisionTable> {
        self.iter().map(|(_, f)| f.to_decision_table()).collect()
    }

    /// Product of all live factors into one table.
    pub fn product(&self) -> DecisionTable {
        self.tables()
            .iter()
            .fold(DecisionTable::unit(), |acc, table| acc.multiply(table))
    }

    /// Most probable joint assignment under the natural ordering: eliminate,
    /// then maximize by back-substitution. Empty graphs yield an empty
    /// assignment.
    pub fn optimize(&self) -> DiscreteValues {
        let tables = self.tables();
        if tables.is_empty() {
            return DiscreteValues::new();
        }
        let ordering = compute_ordering(&tables, OrderingType::Natural);
        eliminate_multifrontal(&tables, &ordering).map_assignment()
    }

    pub fn equals(&self, other: &DiscreteFactorGraph, tol: f64) -> bool {
        self.num_slots() == other.num_slots()
            && self.factors.iter().zip(&other.factors).all(|(a, b)| match (a, b) {
                (Some(a), Some(b)) => a.equals(b.as_ref(), tol),
                (None, None) => true,
                _ => false,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::symbols::{DiscreteKey, Symbol};
    use crate::discrete::factor::DiscretePriorFactor;
    use approx::assert_relative_eq;

    fn d1() -> DiscreteKey {
        DiscreteKey::new(Symbol::new('d', 1), 2)
    }

    #[test]
    fn test_optimize_single_prior() {
        let mut graph = DiscreteFactorGraph::new();
        graph.push(DiscretePriorFactor::new(d1(), &[0.1, 0.9]));
        assert_eq!(graph.optimize()[&d1().key], 1);
    }

    #[test]
    fn test_remove_is_silently_tolerated() {
        let mut graph = DiscreteFactorGraph::new();
        let index = graph.push(DiscretePriorFactor::new(d1(), &[0.1, 0.9]));
        graph.remove(index);
        graph.remove(index); // already removed
        graph.remove(17); // never existed
        assert!(graph.is_empty());
        assert_eq!(graph.num_slots(), 1);
        assert!(graph.optimize().is_empty());
    }

    #[test]
    fn test_independent_normalization_quirk() {
        // An unnormalized (45, 5) prior composed with (0.1, 0.9) ties the
        // posterior: 45 * 0.1 == 5 * 0.9. The marginal normalizes to a half
        // each and the MAP falls to index 0 by first-maximum tie-break.
        let mut graph = DiscreteFactorGraph::new();
        graph.push(DiscretePriorFactor::new(d1(), &[0.1, 0.9]));
        graph.push(DiscretePriorFactor::new(d1(), &[45.0, 5.0]));

        let marginal = graph.product().marginal(d1().key);
        assert_relative_eq!(marginal[0], 0.5, epsilon = 1e-7);
        assert_relative_eq!(marginal[1], 0.5, epsilon = 1e-7);
        assert_eq!(graph.optimize()[&d1().key], 0);
    }

    #[test]
    fn test_indices_stay_stable_after_removal() {
        let mut graph = DiscreteFactorGraph::new();
        let first = graph.push(DiscretePriorFactor::new(d1(), &[0.1, 0.9]));
        let second = graph.push(DiscretePriorFactor::new(d1(), &[0.5, 0.5]));
        graph.remove(first);
        assert!(graph.get(first).is_none());
        assert!(graph.get(second).is_some());
        assert_eq!(graph.len(), 1);
    }
}
