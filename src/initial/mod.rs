//! Initial-solution generation.
//!
//! Builds a boolean model with one variable per admissible
//! (unit, teacher, classroom, slot) candidate, lets the active hard
//! constraints add their rules, and searches it with a
//! propagation-based depth-first solver.
//!
//! # Key Components
//!
//! - [`AssignmentModel`]: variables, candidates and rules
//! - [`CpSolver`] / [`PropagationSolver`]: search over the model
//! - [`InitialSolutionGenerator`]: problem → model → verified solutions
//!
//! # References
//!
//! Rossi, van Beek & Walsh (2006), "Handbook of Constraint Programming"

mod generator;
mod model;
mod solver;

pub use generator::{InfeasibilityReason, InitialOutcome, InitialSolutionGenerator};
pub use model::{AssignmentModel, BoolVar, Candidate, ModelRule};
pub use solver::{CpSolver, PropagationSolver, SearchConfig, SearchResult, SolverStatus};
