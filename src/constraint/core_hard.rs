//! Core-hard tier: resource exclusivity.
//!
//! A teacher or classroom may hold at most one assignment per time slot.

use super::types::{meta_accessors, Constraint, ConstraintCategory, ConstraintMeta, ConstraintOutcome, ConstraintTier};
use crate::initial::AssignmentModel;
use crate::model::{
    ConflictType, EntityKind, SchedulingAssignment, SchedulingConflict, SchedulingSolution, Severity,
};
use std::collections::BTreeMap;

/// Groups assignments by `key` and returns the groups holding more than
/// one assignment, in key order.
fn collisions<K: Ord>(
    solution: &SchedulingSolution,
    key: impl Fn(&SchedulingAssignment) -> K,
) -> Vec<(K, Vec<&SchedulingAssignment>)> {
    let mut groups: BTreeMap<K, Vec<&SchedulingAssignment>> = BTreeMap::new();
    for a in solution.assignments() {
        groups.entry(key(a)).or_default().push(a);
    }
    groups.into_iter().filter(|(_, g)| g.len() > 1).collect()
}

/// No teacher teaches two assignments in the same slot.
#[derive(Debug, Clone)]
pub struct TeacherConflictConstraint {
    meta: ConstraintMeta,
}

impl TeacherConflictConstraint {
    pub const ID: u32 = 1;

    pub fn new() -> Self {
        Self {
            meta: ConstraintMeta::new(
                Self::ID,
                "Teacher conflict",
                ConstraintTier::CoreHard,
                ConstraintCategory::Resource,
            )
            .with_description("A teacher cannot be double-booked in one time slot"),
        }
    }
}

impl Default for TeacherConflictConstraint {
    fn default() -> Self {
        Self::new()
    }
}

impl Constraint for TeacherConflictConstraint {
    meta_accessors!();

    fn evaluate(&self, solution: &SchedulingSolution) -> ConstraintOutcome {
        let conflicts = collisions(solution, |a| (a.teacher_id, a.time_slot_id))
            .into_iter()
            .map(|((teacher, slot), group)| {
                SchedulingConflict::new(
                    self.meta.id,
                    ConflictType::TeacherConflict,
                    Severity::Critical,
                    format!("Teacher {teacher} has {} assignments in slot {slot}", group.len()),
                )
                .with_entities(EntityKind::Teacher, [teacher])
                .with_entities(EntityKind::Assignment, group.iter().map(|a| a.id))
                .with_entities(EntityKind::Section, group.iter().map(|a| a.section_id))
                .with_time_slots([slot])
            })
            .collect();
        ConstraintOutcome::hard(conflicts)
    }

    fn contribute(&self, model: &mut AssignmentModel) {
        for (_, vars) in model.group_by(|c| Some((c.teacher_id, c.time_slot_id))) {
            model.add_at_most_one(vars);
        }
    }
}

/// No classroom hosts two assignments in the same slot.
#[derive(Debug, Clone)]
pub struct ClassroomConflictConstraint {
    meta: ConstraintMeta,
}

impl ClassroomConflictConstraint {
    pub const ID: u32 = 2;

    pub fn new() -> Self {
        Self {
            meta: ConstraintMeta::new(
                Self::ID,
                "Classroom conflict",
                ConstraintTier::CoreHard,
                ConstraintCategory::Resource,
            )
            .with_description("A classroom cannot be double-booked in one time slot"),
        }
    }
}

impl Default for ClassroomConflictConstraint {
    fn default() -> Self {
        Self::new()
    }
}

impl Constraint for ClassroomConflictConstraint {
    meta_accessors!();

    fn evaluate(&self, solution: &SchedulingSolution) -> ConstraintOutcome {
        let conflicts = collisions(solution, |a| (a.classroom_id, a.time_slot_id))
            .into_iter()
            .map(|((room, slot), group)| {
                SchedulingConflict::new(
                    self.meta.id,
                    ConflictType::ClassroomConflict,
                    Severity::Critical,
                    format!("Classroom {room} has {} assignments in slot {slot}", group.len()),
                )
                .with_entities(EntityKind::Classroom, [room])
                .with_entities(EntityKind::Assignment, group.iter().map(|a| a.id))
                .with_entities(EntityKind::Section, group.iter().map(|a| a.section_id))
                .with_time_slots([slot])
            })
            .collect();
        ConstraintOutcome::hard(conflicts)
    }

    fn contribute(&self, model: &mut AssignmentModel) {
        for (_, vars) in model.group_by(|c| Some((c.classroom_id, c.time_slot_id))) {
            model.add_at_most_one(vars);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{assignment, tiny_problem};

    #[test]
    fn test_teacher_double_booking_detected() {
        let p = tiny_problem();
        let sol = SchedulingSolution::from_assignments(
            p.clone(),
            vec![assignment(&p, 1, 1, 1, 1, 1), assignment(&p, 2, 2, 1, 2, 1)],
        );
        let out = TeacherConflictConstraint::new().evaluate(&sol);
        assert_eq!(out.score, 0.0);
        assert_eq!(out.conflicts.len(), 1);
        let c = &out.conflicts[0];
        assert_eq!(c.conflict_type, ConflictType::TeacherConflict);
        assert_eq!(c.entity_ids(EntityKind::Assignment), &[1, 2]);
        assert_eq!(c.time_slots, vec![1]);
    }

    #[test]
    fn test_classroom_clean_solution_scores_one() {
        let p = tiny_problem();
        let sol = SchedulingSolution::from_assignments(
            p.clone(),
            vec![assignment(&p, 1, 1, 1, 1, 1), assignment(&p, 2, 2, 2, 1, 2)],
        );
        let c = ClassroomConflictConstraint::new();
        let out = c.evaluate(&sol);
        assert_eq!(out.score, 1.0);
        assert!(c.is_satisfied(out.score));
    }

    #[test]
    fn test_classroom_double_booking_detected() {
        let p = tiny_problem();
        let sol = SchedulingSolution::from_assignments(
            p.clone(),
            vec![assignment(&p, 1, 1, 1, 2, 3), assignment(&p, 2, 2, 2, 2, 3)],
        );
        let out = ClassroomConflictConstraint::new().evaluate(&sol);
        assert_eq!(out.conflicts.len(), 1);
        assert_eq!(out.conflicts[0].entity_ids(EntityKind::Classroom), &[2]);
    }
}
