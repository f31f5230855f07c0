//! Placement checks shared by every solution transformation.
//!
//! A placement is feasible when it respects teacher eligibility and the
//! enforced [`PlacementRules`] (availability, classroom capacity, resource
//! exclusivity, prerequisite separation, workload limits) against the rest
//! of the solution. Equipment and room type are soft and not checked here.

use crate::constraint::{
    ClassroomAvailabilityConstraint, ClassroomCapacityConstraint, ClassroomConflictConstraint,
    ConstraintManager, PrerequisiteSeparationConstraint, TeacherAvailabilityConstraint,
    TeacherConflictConstraint, TeacherWorkloadLimitConstraint,
};
use crate::model::{
    AssignmentId, ClassroomId, SchedulingAssignment, SchedulingSolution, SectionId, TeacherId,
    TimeSlotId,
};
use std::collections::HashSet;

/// Where one assignment would go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Placement {
    pub section_id: SectionId,
    pub teacher_id: TeacherId,
    pub classroom_id: ClassroomId,
    pub time_slot_id: TimeSlotId,
}

impl Placement {
    pub fn of(a: &SchedulingAssignment) -> Self {
        Self {
            section_id: a.section_id,
            teacher_id: a.teacher_id,
            classroom_id: a.classroom_id,
            time_slot_id: a.time_slot_id,
        }
    }

    pub fn with_teacher(self, teacher_id: TeacherId) -> Self {
        Self { teacher_id, ..self }
    }

    pub fn with_classroom(self, classroom_id: ClassroomId) -> Self {
        Self {
            classroom_id,
            ..self
        }
    }

    pub fn with_time_slot(self, time_slot_id: TimeSlotId) -> Self {
        Self {
            time_slot_id,
            ..self
        }
    }
}

/// Hard rules enforced by placement checks.
///
/// Teacher eligibility is always enforced. The default enforces every
/// rule; [`PlacementRules::from_manager`] follows the active hard
/// constraints of a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementRules {
    pub teacher_conflict: bool,
    pub classroom_conflict: bool,
    pub teacher_availability: bool,
    pub classroom_availability: bool,
    pub capacity: bool,
    pub prerequisites: bool,
    pub workload: bool,
}

impl Default for PlacementRules {
    fn default() -> Self {
        Self {
            teacher_conflict: true,
            classroom_conflict: true,
            teacher_availability: true,
            classroom_availability: true,
            capacity: true,
            prerequisites: true,
            workload: true,
        }
    }
}

impl PlacementRules {
    /// Rules of the hard constraints active in `manager` at its level.
    pub fn from_manager(manager: &ConstraintManager) -> Self {
        let active: HashSet<u32> = manager.active_hard().iter().map(|c| c.meta().id).collect();
        Self {
            teacher_conflict: active.contains(&TeacherConflictConstraint::ID),
            classroom_conflict: active.contains(&ClassroomConflictConstraint::ID),
            teacher_availability: active.contains(&TeacherAvailabilityConstraint::ID),
            classroom_availability: active.contains(&ClassroomAvailabilityConstraint::ID),
            capacity: active.contains(&ClassroomCapacityConstraint::ID),
            prerequisites: active.contains(&PrerequisiteSeparationConstraint::ID),
            workload: active.contains(&TeacherWorkloadLimitConstraint::ID),
        }
    }

    /// Whether `p` is feasible against every assignment except `except`.
    pub fn is_feasible(&self, solution: &SchedulingSolution, except: Option<AssignmentId>, p: &Placement) -> bool {
        let problem = solution.problem();
        let (Some(section), Some(room), Some(slot)) = (
            problem.section(p.section_id),
            problem.classroom(p.classroom_id),
            problem.time_slot(p.time_slot_id),
        ) else {
            return false;
        };
        let Some(teacher) = problem.teacher(p.teacher_id) else {
            return false;
        };
        if !problem.candidate_teachers(section).contains(&p.teacher_id)
            || (self.teacher_availability && !problem.is_teacher_available(p.teacher_id, p.time_slot_id))
            || (self.classroom_availability && !problem.is_classroom_available(p.classroom_id, p.time_slot_id))
            || (self.capacity && !problem.fits_capacity(section, room))
            || (self.teacher_conflict && solution.is_teacher_busy(p.teacher_id, p.time_slot_id, except))
            || (self.classroom_conflict && solution.is_classroom_busy(p.classroom_id, p.time_slot_id, except))
        {
            return false;
        }

        let others = solution
            .assignments()
            .iter()
            .filter(|a| Some(a.id) != except);

        if self.prerequisites {
            let clashes = others.clone().any(|a| {
                a.time_slot_id == p.time_slot_id
                    && problem
                        .section(a.section_id)
                        .is_some_and(|s| problem.are_prerequisite_related(s.course_id, section.course_id))
            });
            if clashes {
                return false;
            }
        }

        if self.workload && (teacher.max_weekly_hours.is_some() || teacher.max_daily_hours.is_some()) {
            let mut weekly = slot.duration_minutes();
            let mut daily = slot.duration_minutes();
            for a in others.filter(|a| a.teacher_id == p.teacher_id) {
                let m = u32::from(a.end_minute.saturating_sub(a.start_minute));
                weekly = weekly.saturating_add(m);
                if a.day == slot.day {
                    daily = daily.saturating_add(m);
                }
            }
            if teacher.max_weekly_hours.is_some_and(|h| weekly > h.saturating_mul(60))
                || teacher.max_daily_hours.is_some_and(|h| daily > h.saturating_mul(60))
            {
                return false;
            }
        }
        true
    }

    /// Slots other than the current one the assignment could move to.
    pub fn alternative_slots(&self, solution: &SchedulingSolution, a: &SchedulingAssignment) -> Vec<TimeSlotId> {
        let base = Placement::of(a);
        solution
            .problem()
            .time_slots
            .iter()
            .map(|s| s.id)
            .filter(|&id| id != a.time_slot_id && self.is_feasible(solution, Some(a.id), &base.with_time_slot(id)))
            .collect()
    }

    /// Teachers other than the current one who could take the assignment.
    pub fn alternative_teachers(&self, solution: &SchedulingSolution, a: &SchedulingAssignment) -> Vec<TeacherId> {
        let base = Placement::of(a);
        solution
            .problem()
            .teachers
            .iter()
            .map(|t| t.id)
            .filter(|&id| id != a.teacher_id && self.is_feasible(solution, Some(a.id), &base.with_teacher(id)))
            .collect()
    }

    /// Classrooms other than the current one that could host the assignment.
    pub fn alternative_classrooms(&self, solution: &SchedulingSolution, a: &SchedulingAssignment) -> Vec<ClassroomId> {
        let base = Placement::of(a);
        solution
            .problem()
            .classrooms
            .iter()
            .map(|c| c.id)
            .filter(|&id| id != a.classroom_id && self.is_feasible(solution, Some(a.id), &base.with_classroom(id)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::ApplicationLevel;
    use crate::model::{Classroom, CourseSection, SchedulingProblem, Teacher, TimeSlot};
    use crate::testutil::{assignment, tiny_problem};
    use std::sync::Arc;

    #[test]
    fn test_busy_slot_rejected() {
        let p = tiny_problem();
        let sol = SchedulingSolution::from_assignments(
            p.clone(),
            vec![assignment(&p, 1, 1, 1, 1, 1), assignment(&p, 2, 2, 2, 2, 2)],
        );
        let moved = Placement::of(&sol.assignments()[1]).with_time_slot(1).with_teacher(1);
        assert!(!PlacementRules::default().is_feasible(&sol, Some(2), &moved));
        let ok = Placement::of(&sol.assignments()[1]).with_time_slot(3);
        assert!(PlacementRules::default().is_feasible(&sol, Some(2), &ok));
    }

    #[test]
    fn test_alternatives_exclude_current() {
        let p = tiny_problem();
        let sol = SchedulingSolution::from_assignments(p.clone(), vec![assignment(&p, 1, 1, 1, 1, 1)]);
        let a = &sol.assignments()[0];
        let rules = PlacementRules::default();
        assert_eq!(rules.alternative_slots(&sol, a), vec![2, 3]);
        assert_eq!(rules.alternative_teachers(&sol, a), vec![2]);
        assert_eq!(rules.alternative_classrooms(&sol, a), vec![2]);
    }

    #[test]
    fn test_unknown_ids_infeasible() {
        let p = tiny_problem();
        let sol = SchedulingSolution::new(p);
        let bogus = Placement {
            section_id: 1,
            teacher_id: 9,
            classroom_id: 1,
            time_slot_id: 1,
        };
        assert!(!PlacementRules::default().is_feasible(&sol, None, &bogus));
    }

    #[test]
    fn test_rules_follow_active_constraints() {
        let p = Arc::new(
            SchedulingProblem::builder()
                .section(CourseSection::new(1, 10, 20))
                .teacher(Teacher::new(1))
                .classroom(Classroom::new(1, 30))
                .time_slot(TimeSlot::new(1, 1, 540, 600))
                .time_slot(TimeSlot::new(2, 1, 600, 660))
                .teacher_availability(1, 2, false)
                .build()
                .expect("valid"),
        );
        let sol = SchedulingSolution::from_assignments(p.clone(), vec![assignment(&p, 1, 1, 1, 1, 1)]);
        let a = &sol.assignments()[0];

        let mut manager = ConstraintManager::with_defaults();
        assert_eq!(PlacementRules::from_manager(&manager), PlacementRules::default());
        assert!(PlacementRules::default().alternative_slots(&sol, a).is_empty());

        manager
            .set_active(TeacherAvailabilityConstraint::ID, false)
            .expect("registered");
        let relaxed = PlacementRules::from_manager(&manager);
        assert!(!relaxed.teacher_availability);
        assert_eq!(relaxed.alternative_slots(&sol, a), vec![2]);
    }

    #[test]
    fn test_level_filters_rules() {
        let mut manager = ConstraintManager::with_defaults();
        manager.set_level(ApplicationLevel::Minimal);
        let rules = PlacementRules::from_manager(&manager);
        assert!(rules.teacher_conflict && rules.classroom_conflict);
        assert!(!rules.capacity && !rules.workload && !rules.prerequisites);
    }
}
