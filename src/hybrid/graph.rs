//! Container holding continuous, discrete, and hybrid factors side by side.

use crate::core::factor::NonlinearFactor;
use crate::core::symbols::Key;
use crate::discrete::factor::DiscreteFactor;
use crate::hybrid::factor::HybridFactor;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Three parallel bags of factors, each preserving insertion order.
///
/// This is the unit of input to the alternation solver: one update call
/// consumes one graph. Factors are held by shared handles so a caller can
/// keep a handle for in-place updates (mixture weights, prior
/// probabilities) after the graph has been absorbed.
#[derive(Clone, Default)]
pub struct HybridFactorGraph {
    continuous: Vec<Arc<dyn NonlinearFactor>>,
    discrete: Vec<Arc<dyn DiscreteFactor>>,
    hybrid: Vec<Arc<dyn HybridFactor>>,
}

impl HybridFactorGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an owned continuous factor.
    pub fn push_continuous<F: NonlinearFactor + 'static>(&mut self, factor: F) {
        self.continuous.push(Arc::new(factor));
    }

    /// Add a shared continuous factor.
    pub fn push_continuous_shared(&mut self, factor: Arc<dyn NonlinearFactor>) {
        self.continuous.push(factor);
    }

    /// Add an owned discrete factor.
    pub fn push_discrete<F: DiscreteFactor + 'static>(&mut self, factor: F) {
        self.discrete.push(Arc::new(factor));
    }

    /// Add a shared discrete factor.
    pub fn push_discrete_shared(&mut self, factor: Arc<dyn DiscreteFactor>) {
        self.discrete.push(factor);
    }

    /// Add an owned hybrid factor.
    pub fn push_hybrid<F: HybridFactor + 'static>(&mut self, factor: F) {
        self.hybrid.push(Arc::new(factor));
    }

    /// Add a shared hybrid factor.
    pub fn push_hybrid_shared(&mut self, factor: Arc<dyn HybridFactor>) {
        self.hybrid.push(factor);
    }

    pub fn continuous_factors(&self) -> &[Arc<dyn NonlinearFactor>] {
        &self.continuous
    }

    pub fn discrete_factors(&self) -> &[Arc<dyn DiscreteFactor>] {
        &self.discrete
    }

    pub fn hybrid_factors(&self) -> &[Arc<dyn HybridFactor>] {
        &self.hybrid
    }

    /// Union of keys over all three bags, continuous and discrete alike.
    pub fn keys(&self) -> BTreeSet<Key> {
        let mut keys = BTreeSet::new();
        for factor in &self.continuous {
            keys.extend(factor.keys().iter().copied());
        }
        for factor in &self.discrete {
            keys.extend(factor.keys());
        }
        for factor in &self.hybrid {
            keys.extend(factor.keys().iter().copied());
            keys.extend(factor.discrete_keys().iter().map(|dk| dk.key));
        }
        keys
    }

    pub fn len(&self) -> usize {
        self.continuous.len() + self.discrete.len() + self.hybrid.len()
    }

    pub fn len_continuous(&self) -> usize {
        self.continuous.len()
    }

    pub fn len_discrete(&self) -> usize {
        self.discrete.len()
    }

    pub fn len_hybrid(&self) -> usize {
        self.hybrid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.continuous.clear();
        self.discrete.clear();
        self.hybrid.clear();
    }

    /// Structural equality: same factors, bag by bag, in order.
    pub fn equals(&self, other: &HybridFactorGraph, tol: f64) -> bool {
        self.continuous.len() == other.continuous.len()
            && self.discrete.len() == other.discrete.len()
            && self.hybrid.len() == other.hybrid.len()
            && self
                .continuous
                .iter()
                .zip(&other.continuous)
                .all(|(a, b)| a.equals(b.as_ref(), tol))
            && self
                .discrete
                .iter()
                .zip(&other.discrete)
                .all(|(a, b)| a.equals(b.as_ref(), tol))
            && self
                .hybrid
                .iter()
                .zip(&other.hybrid)
                .all(|(a, b)| a.equals(b.as_ref(), tol))
    }
}
