//! Heatmap-driven UI optimization
//!
//! - **state**: optimization lifecycle, cooldowns and last-known states
//! - **prompt**: generation request built from site artifacts and interaction signals
//! - **orchestrator**: the `Optimizer` tying guards, generation, repair and persistence together

pub mod orchestrator;
pub mod prompt;
pub mod state;

pub use orchestrator::{is_threshold_hit, OptimizationOutcome, Optimizer};
pub use prompt::OptimizationRequest;
pub use state::{CooldownTracker, OptimizationState, SkipReason, StatusBoard};
