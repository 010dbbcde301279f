//! Core types: variable keys, value containers, noise models, and the
//! nonlinear factor abstraction.

pub mod factor;
pub mod noise;
pub mod symbols;
pub mod values;

pub use factor::{LinearFactor, NonlinearFactor};
pub use noise::DiagonalNoise;
pub use symbols::{DiscreteKey, Key, Symbol};
pub use values::{DiscreteValues, HybridValues, Values, VariableValue};
