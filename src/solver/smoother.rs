//! The alternation controller.
//!
//! One `update` call performs one alternating-minimization iteration: new
//! hybrid factors are split into a discrete-side and a continuous-side
//! shadow, the discrete graph is solved with continuous values frozen, the
//! continuous graph is re-optimized with discrete assignments frozen, and
//! every shadow is re-synchronized so the next iteration starts from
//! consistent state.

use crate::core::factor::NonlinearFactor;
use crate::core::symbols::Key;
use crate::core::values::{DiscreteValues, HybridValues, Values};
use crate::discrete::factor::DiscreteFactor;
use crate::discrete::graph::DiscreteFactorGraph;
use crate::discrete::marginals::DiscreteMarginalsOrdered;
use crate::discrete::elimination::OrderingType;
use crate::error::HybridResult;
use crate::hybrid::continuous_shadow::ContinuousShadowFactor;
use crate::hybrid::discrete_shadow::DiscreteShadowFactor;
use crate::hybrid::graph::HybridFactorGraph;
use crate::solver::marginals::{ContinuousMarginals, HybridMarginals};
use crate::solver::optimizer::{
    IncrementalOptimizer, LevenbergMarquardt, OptimizerConfig, UpdateParams,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

/// Alternating discrete-continuous MAP smoother.
///
/// Owns the continuous optimizer, the accumulated discrete factor graph,
/// the current estimates for both variable spaces, and the two parallel
/// shadow registries. The `i`-th entry of each registry wraps the same
/// hybrid factor.
pub struct HybridSmoother<O: IncrementalOptimizer = LevenbergMarquardt> {
    optimizer: O,
    discrete_graph: DiscreteFactorGraph,
    current_continuous: Values,
    current_discrete: DiscreteValues,
    continuous_shadows: Vec<Arc<ContinuousShadowFactor>>,
    discrete_shadows: Vec<Arc<DiscreteShadowFactor>>,
}

impl HybridSmoother<LevenbergMarquardt> {
    pub fn new() -> Self {
        Self::with_optimizer(LevenbergMarquardt::new())
    }

    pub fn with_config(config: OptimizerConfig) -> Self {
        Self::with_optimizer(LevenbergMarquardt::with_config(config))
    }
}

impl Default for HybridSmoother<LevenbergMarquardt> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: IncrementalOptimizer> HybridSmoother<O> {
    /// Build a smoother over a caller-supplied continuous back-end.
    pub fn with_optimizer(optimizer: O) -> Self {
        Self {
            optimizer,
            discrete_graph: DiscreteFactorGraph::new(),
            current_continuous: Values::new(),
            current_discrete: DiscreteValues::new(),
            continuous_shadows: Vec::new(),
            discrete_shadows: Vec::new(),
        }
    }

    /// One alternation iteration over the factors of `graph`.
    pub fn update(
        &mut self,
        graph: &HybridFactorGraph,
        initial_continuous: &Values,
        initial_discrete: &DiscreteValues,
    ) -> HybridResult<()> {
        self.update_removing(graph, initial_continuous, initial_discrete, &[], &[])
    }

    /// One alternation iteration, additionally dropping previously added
    /// factors by index. Unknown indices are silently tolerated.
    pub fn update_removing(
        &mut self,
        graph: &HybridFactorGraph,
        initial_continuous: &Values,
        initial_discrete: &DiscreteValues,
        removed_continuous_indices: &[usize],
        removed_discrete_indices: &[usize],
    ) -> HybridResult<()> {
        debug!(
            new_continuous = graph.len_continuous(),
            new_discrete = graph.len_discrete(),
            new_hybrid = graph.len_hybrid(),
            removed_continuous = removed_continuous_indices.len(),
            removed_discrete = removed_discrete_indices.len(),
            "alternation update"
        );

        // Apply discrete removals up front; continuous removals ride along
        // with the optimizer update below.
        for &index in removed_discrete_indices {
            self.discrete_graph.remove(index);
        }

        // Merge initial guesses into the persistent estimates.
        self.current_continuous.merge(initial_continuous);
        for (key, assignment) in initial_discrete {
            self.current_discrete.insert(*key, *assignment);
        }

        // Append new discrete factors, then split each hybrid factor into
        // its two shadows. Graph insertion and registration happen
        // together so no factor is left half-registered.
        for factor in graph.discrete_factors() {
            self.discrete_graph.push_shared(factor.clone());
        }
        let first_new_shadow = self.continuous_shadows.len();
        for hybrid in graph.hybrid_factors() {
            let discrete_shadow = Arc::new(DiscreteShadowFactor::new(hybrid.clone()));
            self.discrete_graph.push_shared(discrete_shadow.clone());
            self.discrete_shadows.push(discrete_shadow);
            self.continuous_shadows.push(Arc::new(ContinuousShadowFactor::new(hybrid.clone())));
        }

        // Refresh every discrete-side view of the continuous state.
        self.sync_discrete_shadows();

        // Solve the discrete graph, unless this call carries only
        // continuous factors (a pure odometry step) and the discrete
        // estimate cannot have changed.
        let pure_odometry = graph.len_discrete() == 0
            && graph.len_hybrid() == 0
            && graph.len_continuous() > 0;
        if !pure_odometry && !self.discrete_graph.is_empty() {
            self.current_discrete = self.discrete_graph.optimize();
            debug!(assignments = self.current_discrete.len(), "discrete solve");
        }

        // Prime the freshly created continuous shadows and collect the
        // combined continuous factor batch.
        let mut combined: Vec<Arc<dyn NonlinearFactor>> = graph.continuous_factors().to_vec();
        for shadow in &self.continuous_shadows[first_new_shadow..] {
            shadow.update_discrete(&self.current_discrete);
            combined.push(shadow.clone());
        }

        // Refresh the shadows already inside the optimizer and mark their
        // keys affected so the incremental update relinearizes them.
        let mut affected: BTreeMap<usize, BTreeSet<Key>> = BTreeMap::new();
        for (index, slot) in self.optimizer.factors().iter().enumerate() {
            if removed_continuous_indices.contains(&index) {
                continue;
            }
            let Some(factor) = slot else { continue };
            if let Some(shadow) = factor.as_any().downcast_ref::<ContinuousShadowFactor>() {
                shadow.update_discrete(&self.current_discrete);
                affected.insert(index, shadow.keys().iter().copied().collect());
            }
        }

        self.optimizer.update(
            combined,
            initial_continuous,
            UpdateParams {
                new_affected_keys: affected,
                remove_factor_indices: removed_continuous_indices.to_vec(),
            },
        )?;
        self.current_continuous = self.optimizer.calculate_estimate();

        // Leave the discrete graph's view of the continuous state current
        // for the next iteration.
        self.sync_discrete_shadows();
        Ok(())
    }

    /// Advance one alternation iteration with no new factors.
    pub fn iterate(&mut self) -> HybridResult<()> {
        self.update(&HybridFactorGraph::new(), &Values::new(), &DiscreteValues::new())
    }

    /// MAP assignment of the accumulated discrete graph at the frozen
    /// continuous estimate.
    pub fn solve_discrete(&self) -> DiscreteValues {
        self.discrete_graph.optimize()
    }

    /// Joint estimate: the optimizer's continuous estimate and a fresh
    /// discrete solve.
    pub fn calculate_estimate(&self) -> HybridValues {
        HybridValues {
            continuous: self.optimizer.calculate_estimate(),
            discrete: self.discrete_graph.optimize(),
        }
    }

    /// Marginals for a supplied factor list, estimate, and discrete graph.
    pub fn marginals(
        &self,
        factors: &[Arc<dyn NonlinearFactor>],
        estimate: &Values,
        discrete_graph: &DiscreteFactorGraph,
    ) -> HybridResult<HybridMarginals> {
        Ok(HybridMarginals {
            continuous: ContinuousMarginals::new(factors, estimate)?,
            discrete: DiscreteMarginalsOrdered::new(discrete_graph, OrderingType::Natural),
        })
    }

    /// Accumulated discrete factor graph (shadows included).
    pub fn discrete_factor_graph(&self) -> &DiscreteFactorGraph {
        &self.discrete_graph
    }

    /// Ordered continuous factor list inside the optimizer, removed slots
    /// included.
    pub fn nonlinear_factors(&self) -> &[Option<Arc<dyn NonlinearFactor>>] {
        self.optimizer.factors()
    }

    /// Registered continuous-side shadows, one per hybrid factor.
    pub fn continuous_shadows(&self) -> &[Arc<ContinuousShadowFactor>] {
        &self.continuous_shadows
    }

    /// Registered discrete-side shadows, one per hybrid factor.
    pub fn discrete_shadows(&self) -> &[Arc<DiscreteShadowFactor>] {
        &self.discrete_shadows
    }

    fn sync_discrete_shadows(&self) {
        if self.current_continuous.is_empty() {
            return;
        }
        for (_, factor) in self.discrete_graph.iter() {
            if let Some(shadow) = factor.as_any().downcast_ref::<DiscreteShadowFactor>() {
                shadow.update_continuous(&self.current_continuous);
                shadow.update_discrete(&self.current_discrete);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::noise::DiagonalNoise;
    use crate::core::symbols::{DiscreteKey, Symbol};
    use crate::factors::prior_factor::PriorFactor;
    use crate::hybrid::mixture_factor::MixtureFactor;

    fn x1() -> Key {
        Symbol::new('x', 1).key()
    }

    fn d1() -> DiscreteKey {
        DiscreteKey::new(Symbol::new('d', 1), 2)
    }

    fn mixture() -> MixtureFactor<PriorFactor> {
        let tight = PriorFactor::new(x1(), 0.0, DiagonalNoise::isotropic(1, 1.0));
        let broad = PriorFactor::new(x1(), 0.0, DiagonalNoise::isotropic(1, 8.0));
        MixtureFactor::new(vec![x1()], d1(), vec![tight, broad], false)
    }

    #[test]
    fn test_shadow_registries_stay_paired() {
        let mut smoother = HybridSmoother::new();
        let mut graph = HybridFactorGraph::new();
        graph.push_hybrid(mixture());
        let mut initial = Values::new();
        initial.insert(x1(), -2.5);
        smoother.update(&graph, &initial, &DiscreteValues::new()).unwrap();

        assert_eq!(smoother.continuous_shadows().len(), 1);
        assert_eq!(smoother.discrete_shadows().len(), 1);
        for (c, d) in smoother.continuous_shadows().iter().zip(smoother.discrete_shadows()) {
            assert!(Arc::ptr_eq(c.factor(), d.factor()));
        }
    }

    #[test]
    fn test_shadows_initialized_after_update() {
        let mut smoother = HybridSmoother::new();
        let mut graph = HybridFactorGraph::new();
        graph.push_hybrid(mixture());
        let mut initial = Values::new();
        initial.insert(x1(), -2.5);
        smoother.update(&graph, &initial, &DiscreteValues::new()).unwrap();

        for shadow in smoother.continuous_shadows() {
            assert!(shadow.fully_initialized());
        }
        for shadow in smoother.discrete_shadows() {
            assert!(shadow.fully_initialized());
        }
    }

    #[test]
    fn test_empty_update_is_valid() {
        let mut smoother = HybridSmoother::new();
        smoother.iterate().unwrap();
        let estimate = smoother.calculate_estimate();
        assert!(estimate.continuous.is_empty());
        assert!(estimate.discrete.is_empty());
    }
}
