//! Timetabling domain model.
//!
//! | Type | Role |
//! |------|------|
//! | [`SchedulingProblem`] | Immutable sections, teachers, rooms, slots, matrices |
//! | [`SchedulingSolution`] | Owned assignments over a shared problem |
//! | [`SchedulingConflict`] | One detected violation |
//! | [`SchedulingEvaluation`] | Aggregate scores and merged conflicts |

mod conflict;
mod evaluation;
mod problem;
mod solution;
mod validation;

pub use conflict::{ConflictType, EntityKind, SchedulingConflict, Severity};
pub use evaluation::{ConstraintEvaluation, SchedulingEvaluation};
pub use problem::{
    Classroom, ClassroomId, CourseId, CourseSection, ProblemBuilder, SchedulingProblem, SectionId,
    Teacher, TeacherId, TimeSlot, TimeSlotId, Unit,
};
pub use solution::{AssignmentId, SchedulingAssignment, SchedulingSolution};
pub use validation::{validate_factor, validate_problem, ValidationError, ValidationErrorKind, ValidationResult};
