//! Hybrid factors: the joint discrete-continuous factor abstraction, its
//! mixture variants, the shadow adapters, and the hybrid graph container.

pub mod continuous_shadow;
pub mod discrete_shadow;
pub mod em_factor;
pub mod factor;
pub mod graph;
pub mod max_mixture_factor;
pub mod mixture_factor;
pub mod semantic_factor;
pub mod sum_mixture_factor;

pub use continuous_shadow::ContinuousShadowFactor;
pub use discrete_shadow::DiscreteShadowFactor;
pub use em_factor::EmMixtureFactor;
pub use factor::HybridFactor;
pub use graph::HybridFactorGraph;
pub use max_mixture_factor::MaxMixtureFactor;
pub use mixture_factor::MixtureFactor;
pub use semantic_factor::SemanticBearingRangeFactor;
pub use sum_mixture_factor::SumMixtureFactor;
