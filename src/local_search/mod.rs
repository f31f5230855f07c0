//! Simulated-annealing local search.
//!
//! Starting from a feasible timetable, repeatedly proposes a single
//! assignment change (teacher, classroom or time slot) that keeps hard
//! constraints intact, fully re-evaluates the candidate, and accepts it
//! by the Metropolis criterion.
//!
//! # References
//!
//! - Kirkpatrick, Gelatt & Vecchi (1983), "Optimization by Simulated Annealing"
//! - Lundy & Mees (1986), "Convergence of an Annealing Algorithm"

mod config;
mod generator;
mod moves;
mod runner;

pub use config::{CoolingSchedule, LocalSearchConfig};
pub use generator::MoveGenerator;
pub use moves::Move;
pub use runner::{LocalSearchOptimizer, LocalSearchResult};
