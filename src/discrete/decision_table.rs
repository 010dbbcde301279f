//! Dense decision tables over discrete variables.
//!
//! A [`DecisionTable`] stores one nonnegative value per joint assignment of
//! its keys. Keys are kept sorted, values row-major with the last key
//! fastest, which makes products and marginalization a matter of index
//! arithmetic. This is the currency of the discrete side: every discrete
//! factor converts to a table, and elimination works on tables alone.

use crate::core::symbols::{DiscreteKey, Key};
use crate::core::values::DiscreteValues;

/// Factor table over a set of discrete keys.
#[derive(Clone, Debug, PartialEq)]
pub struct DecisionTable {
    keys: Vec<DiscreteKey>,
    values: Vec<f64>,
}

/// Row-major enumeration of joint assignments (last key fastest). The
/// enumeration order matches the value layout of [`DecisionTable`].
pub(crate) fn enumerate_assignments(keys: &[DiscreteKey]) -> Vec<Vec<usize>> {
    let total: usize = keys.iter().map(|k| k.cardinality).product();
    let mut out = Vec::with_capacity(total);
    let mut current = vec![0usize; keys.len()];
    for _ in 0..total {
        out.push(current.clone());
        for pos in (0..keys.len()).rev() {
            current[pos] += 1;
            if current[pos] < keys[pos].cardinality {
                break;
            }
            current[pos] = 0;
        }
    }
    out
}

impl DecisionTable {
    /// The empty table: no keys, single value one. Neutral element of
    /// [`DecisionTable::multiply`].
    pub fn unit() -> Self {
        Self { keys: Vec::new(), values: vec![1.0] }
    }

    /// Build a table from keys and row-major values (last listed key
    /// fastest). Keys are canonicalized to ascending order internally.
    pub fn new(keys: &[DiscreteKey], values: Vec<f64>) -> Self {
        let total: usize = keys.iter().map(|k| k.cardinality).product();
        assert_eq!(values.len(), total, "table size must match joint cardinality");
        let mut sorted = keys.to_vec();
        sorted.sort_by_key(|k| k.key);
        sorted.dedup_by_key(|k| k.key);
        assert_eq!(sorted.len(), keys.len(), "table keys must be distinct");

        if sorted.iter().map(|k| k.key).eq(keys.iter().map(|k| k.key)) {
            return Self { keys: sorted, values };
        }

        // Permute values into the canonical key order.
        let mut canonical = vec![0.0; total];
        for (i, assignment) in enumerate_assignments(keys).iter().enumerate() {
            let mut index = 0;
            for target in &sorted {
                let source = keys.iter().position(|k| k.key == target.key).unwrap();
                index = index * target.cardinality + assignment[source];
            }
            canonical[index] = values[i];
        }
        Self { keys: sorted, values: canonical }
    }

    /// Table over a single key.
    pub fn from_key(key: DiscreteKey, values: &[f64]) -> Self {
        Self::new(&[key], values.to_vec())
    }

    /// Uniform table over one key.
    pub fn uniform(key: DiscreteKey) -> Self {
        Self::from_key(key, &vec![1.0 / key.cardinality as f64; key.cardinality])
    }

    pub fn keys(&self) -> &[DiscreteKey] {
        &self.keys
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn contains(&self, key: Key) -> bool {
        self.keys.iter().any(|k| k.key == key)
    }

    fn index_of(&self, assignment: &[usize]) -> usize {
        debug_assert_eq!(assignment.len(), self.keys.len());
        let mut index = 0;
        for (key, &a) in self.keys.iter().zip(assignment) {
            debug_assert!(a < key.cardinality, "assignment exceeds cardinality of {key}");
            index = index * key.cardinality + a;
        }
        index
    }

    /// Value at a joint assignment given as a key-indexed map. Every key of
    /// the table must be present.
    pub fn value(&self, values: &DiscreteValues) -> f64 {
        let assignment: Vec<usize> = self
            .keys
            .iter()
            .map(|k| *values.get(&k.key).unwrap_or_else(|| panic!("no assignment for {}", k.key)))
            .collect();
        self.values[self.index_of(&assignment)]
    }

    /// Pointwise product on the union of key sets.
    pub fn multiply(&self, other: &DecisionTable) -> DecisionTable {
        let mut keys = self.keys.clone();
        for key in &other.keys {
            match keys.iter().find(|k| k.key == key.key) {
                Some(existing) => assert_eq!(
                    existing.cardinality, key.cardinality,
                    "cardinality mismatch for {}",
                    key.key
                ),
                None => keys.push(*key),
            }
        }
        keys.sort_by_key(|k| k.key);

        let values = enumerate_assignments(&keys)
            .iter()
            .map(|assignment| {
                let joint: DiscreteValues =
                    keys.iter().zip(assignment).map(|(k, &a)| (k.key, a)).collect();
                let a = if self.keys.is_empty() { self.values[0] } else { self.value(&joint) };
                let b = if other.keys.is_empty() { other.values[0] } else { other.value(&joint) };
                a * b
            })
            .collect();
        DecisionTable { keys, values }
    }

    /// Sum out the given keys. Keys not present are ignored.
    pub fn sum_out(&self, out: &[Key]) -> DecisionTable {
        let kept: Vec<DiscreteKey> =
            self.keys.iter().filter(|k| !out.contains(&k.key)).copied().collect();
        let total: usize = kept.iter().map(|k| k.cardinality).product();
        let mut values = vec![0.0; total];
        for (i, assignment) in enumerate_assignments(&self.keys).iter().enumerate() {
            let mut index = 0;
            for key in &kept {
                let source = self.keys.iter().position(|k| k.key == key.key).unwrap();
                index = index * key.cardinality + assignment[source];
            }
            values[index] += self.values[i];
        }
        DecisionTable { keys: kept, values }
    }

    /// Scale every entry by a constant.
    pub fn scaled(&self, factor: f64) -> DecisionTable {
        DecisionTable {
            keys: self.keys.clone(),
            values: self.values.iter().map(|v| v * factor).collect(),
        }
    }

    /// Normalize entries to sum to one. A table summing to zero is returned
    /// unchanged.
    pub fn normalized(&self) -> DecisionTable {
        let total: f64 = self.values.iter().sum();
        if total <= 0.0 {
            return self.clone();
        }
        self.scaled(1.0 / total)
    }

    /// Maximizing joint assignment, deterministic toward the lowest joint
    /// index on ties (first maximum wins).
    pub fn max_assignment(&self) -> DiscreteValues {
        let mut best_index = 0;
        let mut best_value = f64::NEG_INFINITY;
        for (i, &v) in self.values.iter().enumerate() {
            if v > best_value {
                best_value = v;
                best_index = i;
            }
        }
        let assignments = enumerate_assignments(&self.keys);
        self.keys.iter().zip(&assignments[best_index]).map(|(k, &a)| (k.key, a)).collect()
    }

    /// Normalized marginal distribution over one key.
    pub fn marginal(&self, key: Key) -> Vec<f64> {
        let others: Vec<Key> =
            self.keys.iter().map(|k| k.key).filter(|k| *k != key).collect();
        self.sum_out(&others).normalized().values.clone()
    }

    pub fn equals(&self, other: &DecisionTable, tol: f64) -> bool {
        self.keys == other.keys
            && self.values.len() == other.values.len()
            && self.values.iter().zip(&other.values).all(|(a, b)| (a - b).abs() <= tol)
    }
}
