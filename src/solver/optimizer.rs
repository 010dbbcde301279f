//! Incremental continuous back-end.
//!
//! [`IncrementalOptimizer`] is the seam between the alternation controller
//! and the nonlinear least-squares engine: a persistent factor list with
//! stable indices, an update call carrying new factors, initial values,
//! affected-key markers and removals, and an estimate query.
//!
//! [`LevenbergMarquardt`] is the shipped implementation: dense normal
//! equations with adaptive damping, relinearizing the full graph on every
//! update. Full relinearization subsumes the affected-keys contract — a
//! factor whose frozen discrete assignment changed is re-linearized like
//! everything else — so the marker map is accepted and logged rather than
//! used for selective invalidation.

use crate::core::factor::NonlinearFactor;
use crate::core::symbols::Key;
use crate::core::values::Values;
use crate::solver::{OptimizerError, OptimizerResult};
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, trace};

const MIN_DAMPING: f64 = 1e-12;
const MAX_DAMPING: f64 = 1e12;

/// Extra instructions for one update call.
#[derive(Clone, Debug, Default)]
pub struct UpdateParams {
    /// Factor index to the set of keys whose linearization must be
    /// refreshed because the factor's parameters changed.
    pub new_affected_keys: BTreeMap<usize, BTreeSet<Key>>,
    /// Indices of previously added factors to drop. Unknown or
    /// already-removed indices are silently tolerated.
    pub remove_factor_indices: Vec<usize>,
}

/// Operations the alternation controller consumes from the continuous
/// solver.
pub trait IncrementalOptimizer {
    /// Absorb new factors and initial values, apply removals and
    /// affected-key markers, and re-optimize.
    fn update(
        &mut self,
        new_factors: Vec<Arc<dyn NonlinearFactor>>,
        new_values: &Values,
        params: UpdateParams,
    ) -> OptimizerResult<()>;

    /// Current estimate.
    fn calculate_estimate(&self) -> Values;

    /// The ordered factor list, removed slots included.
    fn factors(&self) -> &[Option<Arc<dyn NonlinearFactor>>];

    /// Total error of the active factors at `values`.
    fn error(&self, values: &Values) -> f64;
}

/// Convergence and iteration limits for [`LevenbergMarquardt`].
#[derive(Clone, Debug)]
pub struct OptimizerConfig {
    pub max_iterations: usize,
    pub cost_tolerance: f64,
    pub parameter_tolerance: f64,
    pub gradient_tolerance: f64,
    pub initial_damping: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            cost_tolerance: 1e-10,
            parameter_tolerance: 1e-10,
            gradient_tolerance: 1e-8,
            initial_damping: 1e-4,
        }
    }
}

/// Column layout of the stacked Jacobian: one contiguous block of tangent
/// columns per variable, in key order.
pub(crate) struct ColumnLayout {
    entries: Vec<(Key, usize, usize)>,
    total: usize,
}

impl ColumnLayout {
    pub(crate) fn new(values: &Values) -> Self {
        let mut entries = Vec::with_capacity(values.len());
        let mut offset = 0;
        for (key, value) in values.iter() {
            entries.push((*key, offset, value.dim()));
            offset += value.dim();
        }
        Self { entries, total: offset }
    }

    pub(crate) fn total_cols(&self) -> usize {
        self.total
    }

    fn offset_of(&self, key: Key) -> (usize, usize) {
        self.entries
            .iter()
            .find(|(k, _, _)| *k == key)
            .map(|(_, offset, dim)| (*offset, *dim))
            .unwrap_or_else(|| panic!("no column block for {key}"))
    }

    /// Apply a stacked tangent step to the values.
    pub(crate) fn retract(&self, values: &Values, step: &DVector<f64>) -> Values {
        debug_assert_eq!(step.len(), self.total);
        let mut out = Values::new();
        for (key, offset, dim) in &self.entries {
            let delta = &step.as_slice()[*offset..*offset + *dim];
            out.insert(*key, values.at(*key).retract(delta));
        }
        out
    }
}

/// Linearize every factor and stack the whitened blocks into one dense
/// system. Linearization runs factor-parallel.
pub(crate) fn assemble(
    factors: &[Arc<dyn NonlinearFactor>],
    values: &Values,
    layout: &ColumnLayout,
) -> (DMatrix<f64>, DVector<f64>) {
    let linearized: Vec<_> = factors.par_iter().map(|f| f.linearize(values)).collect();

    let total_rows: usize = linearized.iter().map(|lf| lf.rows()).sum();
    let mut jacobian = DMatrix::zeros(total_rows, layout.total_cols());
    let mut residual = DVector::zeros(total_rows);

    let mut row = 0;
    for lf in &linearized {
        for (key, block) in lf.keys.iter().zip(&lf.jacobians) {
            let (offset, dim) = layout.offset_of(*key);
            debug_assert_eq!(block.ncols(), dim);
            jacobian.view_mut((row, offset), (lf.rows(), dim)).copy_from(block);
        }
        residual.rows_mut(row, lf.rows()).copy_from(&lf.residual);
        row += lf.rows();
    }
    (jacobian, residual)
}

/// Levenberg-Marquardt smoother over a persistent factor list.
#[derive(Default)]
pub struct LevenbergMarquardt {
    config: OptimizerConfig,
    factors: Vec<Option<Arc<dyn NonlinearFactor>>>,
    values: Values,
}

impl LevenbergMarquardt {
    pub fn new() -> Self {
        Self::with_config(OptimizerConfig::default())
    }

    pub fn with_config(config: OptimizerConfig) -> Self {
        Self { config, factors: Vec::new(), values: Values::new() }
    }

    fn active_factors(&self) -> Vec<Arc<dyn NonlinearFactor>> {
        self.factors.iter().flatten().cloned().collect()
    }

    fn total_error(factors: &[Arc<dyn NonlinearFactor>], values: &Values) -> f64 {
        factors.iter().map(|f| f.error(values)).sum()
    }

    fn optimize(&mut self) -> OptimizerResult<()> {
        let active = self.active_factors();
        if active.is_empty() || self.values.is_empty() {
            return Ok(());
        }
        let layout = ColumnLayout::new(&self.values);
        let mut damping = self.config.initial_damping;
        let mut current_cost = Self::total_error(&active, &self.values);
        if !current_cost.is_finite() {
            return Err(OptimizerError::NumericalInstability(format!(
                "initial cost is {current_cost}"
            )));
        }
        debug!(factors = active.len(), cost = current_cost, "continuous solve");

        for iteration in 0..self.config.max_iterations {
            let (jacobian, residual) = assemble(&active, &self.values, &layout);
            let gradient = jacobian.transpose() * &residual;
            if gradient.norm() < self.config.gradient_tolerance {
                break;
            }
            let hessian = jacobian.transpose() * &jacobian;

            // Factorize, bumping damping until positive definite.
            let step = loop {
                let mut damped = hessian.clone();
                for i in 0..damped.nrows() {
                    damped[(i, i)] += damping;
                }
                match damped.cholesky() {
                    Some(factorization) => break factorization.solve(&(-&gradient)),
                    None => {
                        damping *= 10.0;
                        if damping > MAX_DAMPING {
                            return Err(OptimizerError::LinearSolveFailed(
                                "damped normal equations are not positive definite".to_string(),
                            ));
                        }
                    }
                }
            };
            if !step.iter().all(|v| v.is_finite()) {
                return Err(OptimizerError::NumericalInstability(
                    "non-finite step from linear solve".to_string(),
                ));
            }

            let candidate = layout.retract(&self.values, &step);
            let new_cost = Self::total_error(&active, &candidate);

            let predicted = -step.dot(&gradient) - 0.5 * step.dot(&(&hessian * &step));
            let actual = current_cost - new_cost;
            let rho = if predicted.abs() < 1e-15 {
                if actual > 0.0 { 1.0 } else { 0.0 }
            } else {
                actual / predicted
            };

            if new_cost.is_finite() && new_cost < current_cost {
                let step_norm = step.norm();
                self.values = candidate;
                current_cost = new_cost;
                let tmp = 2.0 * rho - 1.0;
                damping = (damping * (1.0_f64 / 3.0).max(1.0 - tmp * tmp * tmp)).max(MIN_DAMPING);
                trace!(iteration, cost = current_cost, step_norm, "step accepted");
                if actual < self.config.cost_tolerance
                    || step_norm < self.config.parameter_tolerance
                {
                    break;
                }
            } else {
                damping = (damping * 2.0).min(MAX_DAMPING);
                trace!(iteration, damping, "step rejected");
                if damping >= MAX_DAMPING {
                    break;
                }
            }
        }
        debug!(cost = current_cost, "continuous solve finished");
        Ok(())
    }
}

impl IncrementalOptimizer for LevenbergMarquardt {
    fn update(
        &mut self,
        new_factors: Vec<Arc<dyn NonlinearFactor>>,
        new_values: &Values,
        params: UpdateParams,
    ) -> OptimizerResult<()> {
        for &index in &params.remove_factor_indices {
            if let Some(slot) = self.factors.get_mut(index) {
                *slot = None;
            }
        }
        if !params.new_affected_keys.is_empty() {
            // Full relinearization covers these; record them for tracing.
            trace!(affected = params.new_affected_keys.len(), "affected factors marked");
        }
        for (key, value) in new_values.iter() {
            if !self.values.exists(*key) {
                self.values.insert(*key, value.clone());
            }
        }
        for factor in new_factors {
            self.factors.push(Some(factor));
        }
        self.optimize()
    }

    fn calculate_estimate(&self) -> Values {
        self.values.clone()
    }

    fn factors(&self) -> &[Option<Arc<dyn NonlinearFactor>>] {
        &self.factors
    }

    fn error(&self, values: &Values) -> f64 {
        Self::total_error(&self.active_factors(), values)
    }
}
