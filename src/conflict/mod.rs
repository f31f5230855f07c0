//! Conflict remediation.
//!
//! [`ConflictResolver`] turns the conflicts of an evaluation into ranked
//! [`ResolutionOption`]s. Options are suggestions; [`apply`] runs one
//! against a copy of the timetable.

mod resolver;

pub use resolver::{apply, ConflictResolver, ResolutionAction, ResolutionKind, ResolutionOption};
