//! Hybrid optimization control.
//!
//! [`ProblemAnalysis`] sizes up a problem and picks the first engine;
//! [`HybridOrchestrator`] then alternates local search and genetic phases,
//! switching when a phase stops improving the best timetable and tuning
//! engine parameters between phases.

mod analysis;
mod orchestrator;
mod params;

pub use analysis::{Difficulty, EngineKind, ProblemAnalysis};
pub use orchestrator::{
    BestTracker, EngineContext, HybridOrchestrator, OrchestratorConfig, OrchestratorResult, PhaseReport,
};
pub use params::SchedulingParameters;
