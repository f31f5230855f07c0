//! Genetic search over timetables.
//!
//! A population of feasible timetables evolves through selection,
//! uniform per-unit crossover with clash repair, and mutation by a
//! single local search move. Elites carry over unchanged, so the best
//! score never decreases between generations.
//!
//! # References
//!
//! - Holland (1975), "Adaptation in Natural and Artificial Systems"
//! - Burke, Elliman & Weare (1994), "A Genetic Algorithm Based University
//!   Timetabling System"

mod config;
mod operators;
mod runner;
mod selection;

pub use config::GeneticConfig;
pub use operators::{mutate, uniform_crossover};
pub use runner::{GeneticOptimizer, GeneticResult, Individual};
pub use selection::Selection;
