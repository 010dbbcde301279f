//! Discrete inference: decision tables, factors, graphs, elimination, and
//! ordered marginals.

pub mod decision_table;
pub mod elimination;
pub mod factor;
pub mod graph;
pub mod marginals;

pub use decision_table::DecisionTable;
pub use elimination::{
    compute_ordering, eliminate_multifrontal, DiscreteBayesTree, DiscreteConditional, OrderingType,
};
pub use factor::{DiscreteFactor, DiscretePriorFactor};
pub use graph::DiscreteFactorGraph;
pub use marginals::DiscreteMarginalsOrdered;
