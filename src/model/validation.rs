//! Input validation for timetabling problems.
//!
//! Checks structural integrity before any search starts. Detects:
//! - Duplicate IDs
//! - References to unknown teachers, classrooms, or time slots
//! - Non-positive capacities, malformed or overlapping time slots
//! - Prerequisites naming courses no section belongs to
//! - Out-of-range preference levels and session counts
//!
//! All problems are collected; nothing short-circuits on the first error.

use super::problem::{CourseId, SchedulingProblem};
use std::collections::HashSet;

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ValidationErrorKind {
    /// Two entities share the same ID.
    DuplicateId,
    /// An entity references an ID that doesn't exist.
    UnknownReference,
    /// A classroom has zero capacity.
    InvalidCapacity,
    /// A time slot has an invalid day or an empty/negative span.
    InvalidTimeSlot,
    /// A preference level outside 1..=5.
    InvalidPreference,
    /// Two distinct time slots overlap on the same day.
    OverlappingTimeSlots,
    /// A section with zero weekly sessions.
    InvalidSessions,
    /// A course declared as its own prerequisite.
    SelfPrerequisite,
    /// A numeric argument outside its allowed range.
    OutOfRange,
}

impl ValidationError {
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Validates a fully populated problem.
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_problem(problem: &SchedulingProblem) -> ValidationResult {
    let mut errors = Vec::new();

    check_unique(&mut errors, "section", problem.sections.iter().map(|s| s.id));
    check_unique(&mut errors, "teacher", problem.teachers.iter().map(|t| t.id));
    check_unique(&mut errors, "classroom", problem.classrooms.iter().map(|c| c.id));
    check_unique(&mut errors, "time slot", problem.time_slots.iter().map(|s| s.id));

    for section in &problem.sections {
        if section.sessions_per_week == 0 {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidSessions,
                format!("Section {} has zero weekly sessions", section.id),
            ));
        }
        if let Some(t) = section.teacher_id {
            if problem.teacher(t).is_none() {
                errors.push(ValidationError::new(
                    ValidationErrorKind::UnknownReference,
                    format!("Section {} references unknown teacher {t}", section.id),
                ));
            }
        }
    }

    for room in &problem.classrooms {
        if room.capacity == 0 {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidCapacity,
                format!("Classroom {} has zero capacity", room.id),
            ));
        }
    }

    for slot in &problem.time_slots {
        if !(1..=7).contains(&slot.day) || slot.end_minute <= slot.start_minute {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidTimeSlot,
                format!(
                    "Time slot {} is malformed (day {}, {}-{})",
                    slot.id, slot.day, slot.start_minute, slot.end_minute
                ),
            ));
        }
    }

    // Exclusivity is checked per slot id, so slots must not share time.
    for (i, a) in problem.time_slots.iter().enumerate() {
        for b in &problem.time_slots[i + 1..] {
            if a.id != b.id && a.overlaps(b) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::OverlappingTimeSlots,
                    format!(
                        "Time slots {} ({}-{}) and {} ({}-{}) overlap on day {}",
                        a.id, a.start_minute, a.end_minute, b.id, b.start_minute, b.end_minute, a.day
                    ),
                ));
            }
        }
    }

    for &(teacher, slot) in problem.teacher_availability.keys() {
        check_teacher_slot(problem, &mut errors, "availability", teacher, slot);
    }
    for (&(teacher, slot), &level) in &problem.teacher_preferences {
        check_teacher_slot(problem, &mut errors, "preference", teacher, slot);
        if !(1..=5).contains(&level) {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidPreference,
                format!("Preference of teacher {teacher} at slot {slot} is {level}, expected 1-5"),
            ));
        }
    }
    for &(room, slot) in problem.classroom_availability.keys() {
        if problem.classroom(room).is_none() {
            errors.push(ValidationError::new(
                ValidationErrorKind::UnknownReference,
                format!("Availability references unknown classroom {room}"),
            ));
        }
        if problem.time_slot(slot).is_none() {
            errors.push(ValidationError::new(
                ValidationErrorKind::UnknownReference,
                format!("Availability references unknown time slot {slot}"),
            ));
        }
    }

    let courses: HashSet<CourseId> = problem.sections.iter().map(|s| s.course_id).collect();
    for &(course, prereq) in &problem.prerequisites {
        if course == prereq {
            errors.push(ValidationError::new(
                ValidationErrorKind::SelfPrerequisite,
                format!("Course {course} is listed as its own prerequisite"),
            ));
        }
        for id in [course, prereq] {
            if !courses.contains(&id) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::UnknownReference,
                    format!("Prerequisite references unknown course {id}"),
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validates a diversity or mutation factor in `[0, 1]`.
pub fn validate_factor(name: &str, value: f64) -> Result<(), ValidationError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::new(
            ValidationErrorKind::OutOfRange,
            format!("{name} must be in [0, 1], got {value}"),
        ))
    }
}

fn check_unique(
    errors: &mut Vec<ValidationError>,
    what: &str,
    ids: impl Iterator<Item = u32>,
) {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate {what} ID: {id}"),
            ));
        }
    }
}

fn check_teacher_slot(
    problem: &SchedulingProblem,
    errors: &mut Vec<ValidationError>,
    what: &str,
    teacher: u32,
    slot: u32,
) {
    if problem.teacher(teacher).is_none() {
        errors.push(ValidationError::new(
            ValidationErrorKind::UnknownReference,
            format!("Teacher {what} references unknown teacher {teacher}"),
        ));
    }
    if problem.time_slot(slot).is_none() {
        errors.push(ValidationError::new(
            ValidationErrorKind::UnknownReference,
            format!("Teacher {what} references unknown time slot {slot}"),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TimetableError;
    use crate::model::{Classroom, CourseSection, Teacher, TimeSlot};

    fn kinds(err: TimetableError) -> Vec<ValidationErrorKind> {
        match err {
            TimetableError::Validation(errors) => errors.into_iter().map(|e| e.kind).collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_problem() {
        let result = SchedulingProblem::builder()
            .section(CourseSection::new(1, 10, 20))
            .teacher(Teacher::new(1))
            .classroom(Classroom::new(1, 30))
            .time_slot(TimeSlot::new(1, 1, 480, 540))
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn test_duplicate_ids() {
        let err = SchedulingProblem::builder()
            .teacher(Teacher::new(1))
            .teacher(Teacher::new(1))
            .build()
            .unwrap_err();
        assert_eq!(kinds(err), vec![ValidationErrorKind::DuplicateId]);
    }

    #[test]
    fn test_unknown_teacher_reference() {
        let err = SchedulingProblem::builder()
            .section(CourseSection::new(1, 10, 20).with_teacher(7))
            .build()
            .unwrap_err();
        assert!(kinds(err).contains(&ValidationErrorKind::UnknownReference));
    }

    #[test]
    fn test_zero_capacity_and_bad_slot() {
        let err = SchedulingProblem::builder()
            .classroom(Classroom::new(1, 0))
            .time_slot(TimeSlot::new(1, 9, 600, 540))
            .build()
            .unwrap_err();
        let k = kinds(err);
        assert!(k.contains(&ValidationErrorKind::InvalidCapacity));
        assert!(k.contains(&ValidationErrorKind::InvalidTimeSlot));
    }

    #[test]
    fn test_bad_preference_and_availability_refs() {
        let err = SchedulingProblem::builder()
            .teacher(Teacher::new(1))
            .time_slot(TimeSlot::new(1, 1, 480, 540))
            .preference(1, 1, 9)
            .classroom_availability(4, 1, false)
            .build()
            .unwrap_err();
        let k = kinds(err);
        assert!(k.contains(&ValidationErrorKind::InvalidPreference));
        assert!(k.contains(&ValidationErrorKind::UnknownReference));
    }

    #[test]
    fn test_self_prerequisite() {
        let err = SchedulingProblem::builder()
            .section(CourseSection::new(1, 5, 20))
            .prerequisite(5, 5)
            .build()
            .unwrap_err();
        assert_eq!(kinds(err), vec![ValidationErrorKind::SelfPrerequisite]);
    }

    #[test]
    fn test_unknown_prerequisite_course() {
        let err = SchedulingProblem::builder()
            .section(CourseSection::new(1, 10, 20))
            .prerequisite(10, 99)
            .build()
            .unwrap_err();
        assert_eq!(kinds(err), vec![ValidationErrorKind::UnknownReference]);
    }

    #[test]
    fn test_overlapping_slots_rejected() {
        let err = SchedulingProblem::builder()
            .time_slot(TimeSlot::new(1, 1, 540, 630))
            .time_slot(TimeSlot::new(2, 1, 600, 690))
            .build()
            .unwrap_err();
        assert_eq!(kinds(err), vec![ValidationErrorKind::OverlappingTimeSlots]);
    }

    #[test]
    fn test_adjacent_and_other_day_slots_accepted() {
        let ok = SchedulingProblem::builder()
            .time_slot(TimeSlot::new(1, 1, 540, 600))
            .time_slot(TimeSlot::new(2, 1, 600, 660))
            .time_slot(TimeSlot::new(3, 2, 540, 630))
            .build();
        assert!(ok.is_ok());
    }

    #[test]
    fn test_factor_range() {
        assert!(validate_factor("factor", 0.0).is_ok());
        assert!(validate_factor("factor", 1.0).is_ok());
        assert!(validate_factor("factor", 1.2).is_err());
        assert!(validate_factor("factor", f64::NAN).is_err());
    }
}
