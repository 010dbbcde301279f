//! Variable elimination for discrete factor graphs.
//!
//! Elimination proceeds frontal by frontal under a chosen ordering: all
//! tables mentioning the frontal are multiplied, the frontal is summed out
//! to produce the separator factor, and the product is kept as a
//! conditional with the frontal recorded first. The resulting chain of
//! conditionals supports maximizing back-substitution (the MAP assignment)
//! and marginals.

use crate::core::symbols::{DiscreteKey, Key};
use crate::core::values::DiscreteValues;
use crate::discrete::decision_table::DecisionTable;
use std::collections::{BTreeMap, BTreeSet};

/// Elimination orderings. `Natural` is ascending key order; `Colamd` and
/// `Metis` select fill-reducing orderings (served here by a deterministic
/// greedy minimum-degree heuristic on the interaction graph).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OrderingType {
    #[default]
    Natural,
    Colamd,
    Metis,
}

/// Compute an elimination ordering over the keys of the given tables.
pub fn compute_ordering(tables: &[DecisionTable], ordering_type: OrderingType) -> Vec<Key> {
    let mut keys: BTreeSet<Key> = BTreeSet::new();
    for table in tables {
        for dk in table.keys() {
            keys.insert(dk.key);
        }
    }
    match ordering_type {
        OrderingType::Natural => keys.into_iter().collect(),
        OrderingType::Colamd | OrderingType::Metis => min_degree_ordering(&keys, tables),
    }
}

/// Greedy minimum-degree ordering: repeatedly eliminate the variable with
/// the fewest neighbors, connecting its remaining neighbors. Ties go to the
/// smaller key, so the result is deterministic.
fn min_degree_ordering(keys: &BTreeSet<Key>, tables: &[DecisionTable]) -> Vec<Key> {
    let mut adjacency: BTreeMap<Key, BTreeSet<Key>> =
        keys.iter().map(|k| (*k, BTreeSet::new())).collect();
    for table in tables {
        for a in table.keys() {
            for b in table.keys() {
                if a.key != b.key {
                    adjacency.get_mut(&a.key).unwrap().insert(b.key);
                }
            }
        }
    }

    let mut ordering = Vec::with_capacity(keys.len());
    while !adjacency.is_empty() {
        let next = *adjacency
            .iter()
            .min_by_key(|(key, neighbors)| (neighbors.len(), **key))
            .map(|(key, _)| key)
            .unwrap();
        let neighbors = adjacency.remove(&next).unwrap();
        for a in &neighbors {
            if let Some(set) = adjacency.get_mut(a) {
                set.remove(&next);
                for b in &neighbors {
                    if a != b {
                        set.insert(*b);
                    }
                }
            }
        }
        ordering.push(next);
    }
    ordering
}

/// Conditional `p(frontal | separator)` produced by one elimination step.
/// The stored table is the (unnormalized) product over frontal and
/// separator; the frontal key is recorded explicitly so it stays first.
#[derive(Clone, Debug)]
pub struct DiscreteConditional {
    pub frontal: DiscreteKey,
    pub separator: Vec<DiscreteKey>,
    table: DecisionTable,
}

impl DiscreteConditional {
    pub fn table(&self) -> &DecisionTable {
        &self.table
    }

    /// Maximizing assignment of the frontal given assignments to the
    /// separator. First maximum wins on ties.
    pub fn solve(&self, parents: &DiscreteValues) -> usize {
        let mut best = 0;
        let mut best_value = f64::NEG_INFINITY;
        for a in 0..self.frontal.cardinality {
            let mut joint = parents.clone();
            joint.insert(self.frontal.key, a);
            let v = self.table.value(&joint);
            if v > best_value {
                best_value = v;
                best = a;
            }
        }
        best
    }
}

/// Elimination result: conditionals in elimination order.
#[derive(Clone, Debug, Default)]
pub struct DiscreteBayesTree {
    pub conditionals: Vec<DiscreteConditional>,
}

impl DiscreteBayesTree {
    /// Most probable assignment by maximizing back-substitution in reverse
    /// elimination order.
    pub fn map_assignment(&self) -> DiscreteValues {
        let mut assignment = DiscreteValues::new();
        for conditional in self.conditionals.iter().rev() {
            let a = conditional.solve(&assignment);
            assignment.insert(conditional.frontal.key, a);
        }
        assignment
    }
}

/// Eliminate all variables of `tables` under `ordering`.
///
/// Each step multiplies the tables that mention the frontal, sums the
/// frontal out to form the separator factor, and keeps the product as the
/// conditional. Unknown ordering keys (no table mentions them) are skipped.
pub fn eliminate_multifrontal(tables: &[DecisionTable], ordering: &[Key]) -> DiscreteBayesTree {
    let mut remaining: Vec<DecisionTable> = tables.to_vec();
    let mut conditionals = Vec::new();

    for &frontal in ordering {
        let (involved, rest): (Vec<DecisionTable>, Vec<DecisionTable>) =
            remaining.into_iter().partition(|t| t.contains(frontal));
        remaining = rest;
        if involved.is_empty() {
            continue;
        }

        let product = involved
            .iter()
            .fold(DecisionTable::unit(), |acc, table| acc.multiply(table));
        let separator = product.sum_out(&[frontal]);
        let frontal_key = *product.keys().iter().find(|k| k.key == frontal).unwrap();

        conditionals.push(DiscreteConditional {
            frontal: frontal_key,
            separator: separator.keys().to_vec(),
            table: product,
        });

        if !separator.keys().is_empty() {
            remaining.push(separator);
        }
    }

    DiscreteBayesTree { conditionals }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::symbols::Symbol;

    fn dk(c: char, i: u64, card: usize) -> DiscreteKey {
        DiscreteKey::new(Symbol::new(c, i), card)
    }

    #[test]
    fn test_single_variable_map() {
        let a = dk('a', 0, 2);
        let tables = vec![DecisionTable::from_key(a, &[0.1, 0.9])];
        let ordering = compute_ordering(&tables, OrderingType::Natural);
        let tree = eliminate_multifrontal(&tables, &ordering);
        assert_eq!(tree.map_assignment()[&a.key], 1);
    }

    #[test]
    fn test_chain_map_matches_brute_force() {
        // p(a) * p(b | a) with a strong coupling.
        let a = dk('a', 0, 2);
        let b = dk('b', 0, 2);
        let prior = DecisionTable::from_key(a, &[0.4, 0.6]);
        let coupling = DecisionTable::new(&[a, b], vec![0.9, 0.1, 0.2, 0.8]);

        let tables = vec![prior.clone(), coupling.clone()];
        let ordering = compute_ordering(&tables, OrderingType::Natural);
        let tree = eliminate_multifrontal(&tables, &ordering);
        let map = tree.map_assignment();

        // Brute force over all four assignments.
        let joint = prior.multiply(&coupling);
        let brute = joint.max_assignment();
        assert_eq!(map, brute);
    }

    #[test]
    fn test_min_degree_ordering_is_deterministic() {
        let a = dk('a', 0, 2);
        let b = dk('b', 0, 2);
        let c = dk('c', 0, 2);
        let tables = vec![
            DecisionTable::new(&[a, b], vec![1.0; 4]),
            DecisionTable::new(&[b, c], vec![1.0; 4]),
        ];
        let o1 = compute_ordering(&tables, OrderingType::Colamd);
        let o2 = compute_ordering(&tables, OrderingType::Colamd);
        assert_eq!(o1, o2);
        assert_eq!(o1.len(), 3);
    }

    #[test]
    fn test_ordering_key_without_factor_is_skipped() {
        let a = dk('a', 0, 2);
        let tables = vec![DecisionTable::from_key(a, &[0.3, 0.7])];
        let phantom = Symbol::new('z', 0).key();
        let tree = eliminate_multifrontal(&tables, &[phantom, a.key]);
        assert_eq!(tree.conditionals.len(), 1);
    }
}
