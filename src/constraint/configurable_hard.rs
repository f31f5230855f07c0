//! Configurable-hard tier.
//!
//! Availability windows, room capacity, prerequisite separation and
//! teacher workload limits. Hard by policy; the manager can switch any of
//! them off.

use super::types::{meta_accessors, Constraint, ConstraintCategory, ConstraintMeta, ConstraintOutcome, ConstraintTier};
use crate::initial::{AssignmentModel, Candidate};
use crate::model::{
    ConflictType, EntityKind, SchedulingAssignment, SchedulingConflict, SchedulingProblem,
    SchedulingSolution, Severity,
};
use std::collections::BTreeMap;

/// Teachers only teach in slots where they are available.
#[derive(Debug, Clone)]
pub struct TeacherAvailabilityConstraint {
    meta: ConstraintMeta,
}

impl TeacherAvailabilityConstraint {
    pub const ID: u32 = 3;

    pub fn new() -> Self {
        Self {
            meta: ConstraintMeta::new(
                Self::ID,
                "Teacher availability",
                ConstraintTier::ConfigurableHard,
                ConstraintCategory::Availability,
            )
            .with_description("Assignments fall inside the teacher's availability"),
        }
    }
}

impl Default for TeacherAvailabilityConstraint {
    fn default() -> Self {
        Self::new()
    }
}

impl Constraint for TeacherAvailabilityConstraint {
    meta_accessors!();

    fn evaluate(&self, solution: &SchedulingSolution) -> ConstraintOutcome {
        let problem = solution.problem();
        let conflicts = solution
            .assignments()
            .iter()
            .filter(|a| !problem.is_teacher_available(a.teacher_id, a.time_slot_id))
            .map(|a| {
                SchedulingConflict::new(
                    self.meta.id,
                    ConflictType::TeacherAvailability,
                    Severity::Critical,
                    format!("Teacher {} is unavailable in slot {}", a.teacher_id, a.time_slot_id),
                )
                .with_entities(EntityKind::Teacher, [a.teacher_id])
                .with_entities(EntityKind::Assignment, [a.id])
                .with_entities(EntityKind::Section, [a.section_id])
                .with_time_slots([a.time_slot_id])
            })
            .collect();
        ConstraintOutcome::hard(conflicts)
    }

    fn admits(&self, problem: &SchedulingProblem, candidate: &Candidate) -> bool {
        problem.is_teacher_available(candidate.teacher_id, candidate.time_slot_id)
    }
}

/// Classrooms are only used in slots where they are available.
#[derive(Debug, Clone)]
pub struct ClassroomAvailabilityConstraint {
    meta: ConstraintMeta,
}

impl ClassroomAvailabilityConstraint {
    pub const ID: u32 = 4;

    pub fn new() -> Self {
        Self {
            meta: ConstraintMeta::new(
                Self::ID,
                "Classroom availability",
                ConstraintTier::ConfigurableHard,
                ConstraintCategory::Availability,
            )
            .with_description("Assignments fall inside the classroom's availability"),
        }
    }
}

impl Default for ClassroomAvailabilityConstraint {
    fn default() -> Self {
        Self::new()
    }
}

impl Constraint for ClassroomAvailabilityConstraint {
    meta_accessors!();

    fn evaluate(&self, solution: &SchedulingSolution) -> ConstraintOutcome {
        let problem = solution.problem();
        let conflicts = solution
            .assignments()
            .iter()
            .filter(|a| !problem.is_classroom_available(a.classroom_id, a.time_slot_id))
            .map(|a| {
                SchedulingConflict::new(
                    self.meta.id,
                    ConflictType::ClassroomAvailability,
                    Severity::Critical,
                    format!("Classroom {} is unavailable in slot {}", a.classroom_id, a.time_slot_id),
                )
                .with_entities(EntityKind::Classroom, [a.classroom_id])
                .with_entities(EntityKind::Assignment, [a.id])
                .with_entities(EntityKind::Section, [a.section_id])
                .with_time_slots([a.time_slot_id])
            })
            .collect();
        ConstraintOutcome::hard(conflicts)
    }

    fn admits(&self, problem: &SchedulingProblem, candidate: &Candidate) -> bool {
        problem.is_classroom_available(candidate.classroom_id, candidate.time_slot_id)
    }
}

/// Classroom capacity covers the section's enrollment.
#[derive(Debug, Clone)]
pub struct ClassroomCapacityConstraint {
    meta: ConstraintMeta,
}

impl ClassroomCapacityConstraint {
    pub const ID: u32 = 5;

    pub fn new() -> Self {
        Self {
            meta: ConstraintMeta::new(
                Self::ID,
                "Classroom capacity",
                ConstraintTier::ConfigurableHard,
                ConstraintCategory::Capacity,
            )
            .with_description("Classroom capacity is at least the expected enrollment"),
        }
    }
}

impl Default for ClassroomCapacityConstraint {
    fn default() -> Self {
        Self::new()
    }
}

impl Constraint for ClassroomCapacityConstraint {
    meta_accessors!();

    fn evaluate(&self, solution: &SchedulingSolution) -> ConstraintOutcome {
        let problem = solution.problem();
        let mut conflicts = Vec::new();
        for a in solution.assignments() {
            let (Some(section), Some(room)) =
                (problem.section(a.section_id), problem.classroom(a.classroom_id))
            else {
                continue;
            };
            if !problem.fits_capacity(section, room) {
                conflicts.push(
                    SchedulingConflict::new(
                        self.meta.id,
                        ConflictType::Capacity,
                        Severity::Critical,
                        format!(
                            "Classroom {} holds {} but section {} enrolls {}",
                            room.id, room.capacity, section.id, section.enrollment
                        ),
                    )
                    .with_entities(EntityKind::Classroom, [room.id])
                    .with_entities(EntityKind::Assignment, [a.id])
                    .with_entities(EntityKind::Section, [section.id])
                    .with_time_slots([a.time_slot_id]),
                );
            }
        }
        ConstraintOutcome::hard(conflicts)
    }

    fn admits(&self, problem: &SchedulingProblem, candidate: &Candidate) -> bool {
        match (
            problem.section(candidate.unit.section_id),
            problem.classroom(candidate.classroom_id),
        ) {
            (Some(section), Some(room)) => problem.fits_capacity(section, room),
            _ => false,
        }
    }
}

/// A course and its prerequisite never meet in the same slot.
#[derive(Debug, Clone)]
pub struct PrerequisiteSeparationConstraint {
    meta: ConstraintMeta,
}

impl PrerequisiteSeparationConstraint {
    pub const ID: u32 = 6;

    pub fn new() -> Self {
        Self {
            meta: ConstraintMeta::new(
                Self::ID,
                "Prerequisite separation",
                ConstraintTier::ConfigurableHard,
                ConstraintCategory::Curriculum,
            )
            .with_description("A course and its prerequisite are not scheduled in the same slot"),
        }
    }
}

impl Default for PrerequisiteSeparationConstraint {
    fn default() -> Self {
        Self::new()
    }
}

impl Constraint for PrerequisiteSeparationConstraint {
    meta_accessors!();

    fn evaluate(&self, solution: &SchedulingSolution) -> ConstraintOutcome {
        let problem = solution.problem();
        let course_of = |section_id| problem.section(section_id).map(|s| s.course_id);
        let list = solution.assignments();
        let mut conflicts = Vec::new();
        for (i, a) in list.iter().enumerate() {
            for b in &list[i + 1..] {
                if a.time_slot_id != b.time_slot_id {
                    continue;
                }
                let (Some(ca), Some(cb)) = (course_of(a.section_id), course_of(b.section_id)) else {
                    continue;
                };
                if problem.are_prerequisite_related(ca, cb) {
                    conflicts.push(
                        SchedulingConflict::new(
                            self.meta.id,
                            ConflictType::Prerequisite,
                            Severity::Critical,
                            format!(
                                "Courses {ca} and {cb} are prerequisite-related but share slot {}",
                                a.time_slot_id
                            ),
                        )
                        .with_entities(EntityKind::Course, [ca, cb])
                        .with_entities(EntityKind::Assignment, [a.id, b.id])
                        .with_entities(EntityKind::Section, [a.section_id, b.section_id])
                        .with_time_slots([a.time_slot_id]),
                    );
                }
            }
        }
        ConstraintOutcome::hard(conflicts)
    }

    fn contribute(&self, model: &mut AssignmentModel) {
        let problem_pairs = model.problem().prerequisites.clone();
        if problem_pairs.is_empty() {
            return;
        }
        let by_slot_course = model.group_by(|c| Some((c.time_slot_id, c.course_id)));
        let mut per_slot: BTreeMap<u32, BTreeMap<u32, Vec<usize>>> = BTreeMap::new();
        for ((slot, course), vars) in by_slot_course {
            per_slot.entry(slot).or_default().insert(course, vars);
        }
        for courses in per_slot.values() {
            for &(course, prereq) in &problem_pairs {
                if let (Some(left), Some(right)) = (courses.get(&course), courses.get(&prereq)) {
                    model.add_disjoint(left.clone(), right.clone());
                }
            }
        }
    }
}

/// Weekly and daily teaching-hour limits per teacher.
#[derive(Debug, Clone)]
pub struct TeacherWorkloadLimitConstraint {
    meta: ConstraintMeta,
}

impl TeacherWorkloadLimitConstraint {
    pub const ID: u32 = 7;

    pub fn new() -> Self {
        Self {
            meta: ConstraintMeta::new(
                Self::ID,
                "Teacher workload limit",
                ConstraintTier::ConfigurableHard,
                ConstraintCategory::Workload,
            )
            .with_description("Teachers stay within their weekly and daily hour limits"),
        }
    }
}

impl Default for TeacherWorkloadLimitConstraint {
    fn default() -> Self {
        Self::new()
    }
}

impl Constraint for TeacherWorkloadLimitConstraint {
    meta_accessors!();

    fn evaluate(&self, solution: &SchedulingSolution) -> ConstraintOutcome {
        let problem = solution.problem();
        let mut conflicts = Vec::new();
        let mut by_teacher: Vec<_> = solution.by_teacher().into_iter().collect();
        by_teacher.sort_by_key(|(t, _)| *t);

        for (teacher_id, list) in by_teacher {
            let Some(teacher) = problem.teacher(teacher_id) else {
                continue;
            };
            if let Some(max) = teacher.max_weekly_hours {
                let total: u32 = list.iter().map(|a| teaching_minutes(a)).sum();
                if total > max.saturating_mul(60) {
                    conflicts.push(
                        SchedulingConflict::new(
                            self.meta.id,
                            ConflictType::Workload,
                            Severity::Critical,
                            format!("Teacher {teacher_id} teaches {total} min/week, limit {max} h"),
                        )
                        .with_entities(EntityKind::Teacher, [teacher_id])
                        .with_entities(EntityKind::Assignment, list.iter().map(|a| a.id)),
                    );
                }
            }
            if let Some(max) = teacher.max_daily_hours {
                let mut per_day: BTreeMap<u8, Vec<&SchedulingAssignment>> = BTreeMap::new();
                for a in &list {
                    per_day.entry(a.day).or_default().push(*a);
                }
                for (day, day_list) in per_day {
                    let total: u32 = day_list.iter().map(|a| teaching_minutes(a)).sum();
                    if total > max.saturating_mul(60) {
                        conflicts.push(
                            SchedulingConflict::new(
                                self.meta.id,
                                ConflictType::Workload,
                                Severity::Critical,
                                format!("Teacher {teacher_id} teaches {total} min on day {day}, limit {max} h"),
                            )
                            .with_entities(EntityKind::Teacher, [teacher_id])
                            .with_entities(EntityKind::Assignment, day_list.iter().map(|a| a.id))
                            .with_time_slots(day_list.iter().map(|a| a.time_slot_id)),
                        );
                    }
                }
            }
        }
        ConstraintOutcome::hard(conflicts)
    }

    fn contribute(&self, model: &mut AssignmentModel) {
        let problem = model.problem().clone();
        for teacher in &problem.teachers {
            let id = teacher.id;
            if let Some(max) = teacher.max_weekly_hours {
                for (_, vars) in model.group_by(|c| (c.teacher_id == id).then_some(())) {
                    model.add_capacity(vars, |c| i64::from(c.minutes), i64::from(max) * 60);
                }
            }
            if let Some(max) = teacher.max_daily_hours {
                for (_, vars) in model.group_by(|c| (c.teacher_id == id).then_some(c.day)) {
                    model.add_capacity(vars, |c| i64::from(c.minutes), i64::from(max) * 60);
                }
            }
        }
    }
}

fn teaching_minutes(a: &SchedulingAssignment) -> u32 {
    u32::from(a.end_minute.saturating_sub(a.start_minute))
}
