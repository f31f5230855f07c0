//! Course timetabling engine.
//!
//! Assigns course sections to teachers, classrooms and weekly time slots
//! under hard and soft constraints:
//!
//! - **Model**: problem entities, assignments, solutions, conflicts and
//!   evaluations, plus input validation.
//! - **Constraints**: fourteen built-in rules in four tiers, managed by a
//!   [`constraint::ConstraintManager`] with activation, weights and
//!   application levels.
//! - **Initial generation**: a boolean assignment model solved by
//!   propagation and depth-first search to find feasible timetables.
//! - **Local search**: simulated annealing over reassignment moves with an
//!   intelligent, conflict-focused move generator.
//! - **Genetic search**: population search with uniform crossover and
//!   move-based mutation.
//! - **Hybrid control**: problem analysis, engine selection and phase
//!   switching with parameter adaptation.
//! - **Conflict resolution**: ranked remediation options per conflict.
//!
//! # Architecture
//!
//! [`engine::TimetableEngine`] is the entry point. Every long-running phase
//! accepts a [`cancel::StopSignal`] and returns its best result so far when
//! stopped. The problem is shared read-only behind an `Arc`; solutions are
//! plain values that are cloned before modification.

pub mod cancel;
pub mod conflict;
pub mod constraint;
pub mod diversify;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod genetic;
pub mod hybrid;
pub mod initial;
pub mod local_search;
pub mod model;
pub mod placement;

#[cfg(test)]
mod testutil;
