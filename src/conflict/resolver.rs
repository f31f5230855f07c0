//! Ranked remediation options for detected conflicts.

use crate::error::{Result, TimetableError};
use crate::evaluator::SolutionEvaluator;
use crate::model::{
    AssignmentId, ClassroomId, ConflictType, EntityKind, SchedulingAssignment, SchedulingConflict,
    SchedulingEvaluation, SchedulingSolution, SectionId, Severity, TeacherId, TimeSlotId, Unit,
    ValidationError, ValidationErrorKind,
};
use crate::placement::{Placement, PlacementRules};
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One atomic edit of a timetable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ResolutionAction {
    ReassignTeacher {
        assignment_id: AssignmentId,
        teacher_id: TeacherId,
    },
    ReassignClassroom {
        assignment_id: AssignmentId,
        classroom_id: ClassroomId,
    },
    ReassignTimeSlot {
        assignment_id: AssignmentId,
        time_slot_id: TimeSlotId,
    },
    RemoveAssignment {
        assignment_id: AssignmentId,
    },
    AddAssignment {
        section_id: SectionId,
        session: u32,
        teacher_id: TeacherId,
        classroom_id: ClassroomId,
        time_slot_id: TimeSlotId,
    },
}

/// The remedy an option applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ResolutionKind {
    ReassignTeacher,
    ReassignClassroom,
    ReassignTimeSlot,
    /// Remove and re-add a unit with a new teacher, room and slot.
    Relocate,
    RemoveAssignment,
}

impl ResolutionKind {
    /// Starting compatibility before the score impact is known.
    fn base_compatibility(self) -> f64 {
        match self {
            ResolutionKind::ReassignClassroom => 80.0,
            ResolutionKind::ReassignTimeSlot => 70.0,
            ResolutionKind::ReassignTeacher => 60.0,
            ResolutionKind::Relocate => 40.0,
            ResolutionKind::RemoveAssignment => 10.0,
        }
    }
}

/// A proposed, not yet applied, fix for one conflict.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ResolutionOption {
    pub conflict: SchedulingConflict,
    pub kind: ResolutionKind,
    pub description: String,
    /// 0 to 100, higher is less disruptive.
    pub compatibility: u8,
    pub warnings: Vec<String>,
    pub actions: Vec<ResolutionAction>,
}

/// Builds resolution options from an evaluation.
#[derive(Debug)]
pub struct ConflictResolver<'a> {
    evaluator: &'a SolutionEvaluator,
    rules: PlacementRules,
    candidates_per_action: usize,
    max_options_per_conflict: usize,
}

impl<'a> ConflictResolver<'a> {
    pub fn new(evaluator: &'a SolutionEvaluator) -> Self {
        Self {
            evaluator,
            rules: PlacementRules::from_manager(evaluator.manager()),
            candidates_per_action: 3,
            max_options_per_conflict: 5,
        }
    }

    /// Alternatives tried per assignment and action kind.
    pub fn with_candidates_per_action(mut self, n: usize) -> Self {
        self.candidates_per_action = n.max(1);
        self
    }

    pub fn with_max_options_per_conflict(mut self, n: usize) -> Self {
        self.max_options_per_conflict = n.max(1);
        self
    }

    /// Options for every conflict of `evaluation`, most severe conflicts
    /// first and, within a conflict, most compatible first. Nothing is
    /// applied.
    pub fn resolve(&self, solution: &SchedulingSolution, evaluation: &SchedulingEvaluation) -> Vec<ResolutionOption> {
        let mut conflicts: Vec<&SchedulingConflict> = evaluation.conflicts.iter().collect();
        conflicts.sort_by(|a, b| b.severity.cmp(&a.severity));

        let mut options = Vec::new();
        for conflict in conflicts {
            let mut found = self.options_for(solution, evaluation, conflict);
            found.sort_by(|a, b| b.compatibility.cmp(&a.compatibility));
            found.truncate(self.max_options_per_conflict);
            debug!(conflict = %conflict.conflict_type, options = found.len(), "resolution options");
            options.extend(found);
        }
        options
    }

    fn options_for(
        &self,
        solution: &SchedulingSolution,
        evaluation: &SchedulingEvaluation,
        conflict: &SchedulingConflict,
    ) -> Vec<ResolutionOption> {
        let (teachers, rooms, slots) = remedies(conflict.conflict_type);
        let mut options = Vec::new();
        let n = self.candidates_per_action;

        for &id in conflict.entity_ids(EntityKind::Assignment) {
            let Some(a) = solution.assignment(id) else {
                continue;
            };
            if teachers {
                for t in self.rules.alternative_teachers(solution, a).into_iter().take(n) {
                    options.extend(self.option(
                        solution,
                        evaluation,
                        conflict,
                        ResolutionKind::ReassignTeacher,
                        format!("Reassign section {} to teacher {t}", a.section_id),
                        vec![ResolutionAction::ReassignTeacher {
                            assignment_id: id,
                            teacher_id: t,
                        }],
                    ));
                }
            }
            if rooms {
                for r in self.rules.alternative_classrooms(solution, a).into_iter().take(n) {
                    options.extend(self.option(
                        solution,
                        evaluation,
                        conflict,
                        ResolutionKind::ReassignClassroom,
                        format!("Move section {} to classroom {r}", a.section_id),
                        vec![ResolutionAction::ReassignClassroom {
                            assignment_id: id,
                            classroom_id: r,
                        }],
                    ));
                }
            }
            if slots {
                for s in self.rules.alternative_slots(solution, a).into_iter().take(n) {
                    options.extend(self.option(
                        solution,
                        evaluation,
                        conflict,
                        ResolutionKind::ReassignTimeSlot,
                        format!("Move section {} to time slot {s}", a.section_id),
                        vec![ResolutionAction::ReassignTimeSlot {
                            assignment_id: id,
                            time_slot_id: s,
                        }],
                    ));
                }
            }
        }

        if options.is_empty() && conflict.severity == Severity::Critical {
            for &id in conflict.entity_ids(EntityKind::Assignment) {
                let Some(a) = solution.assignment(id) else {
                    continue;
                };
                if let Some(target) = relocation(&self.rules, solution, a) {
                    options.extend(self.option(
                        solution,
                        evaluation,
                        conflict,
                        ResolutionKind::Relocate,
                        format!(
                            "Reschedule section {} with teacher {}, classroom {} at slot {}",
                            a.section_id, target.teacher_id, target.classroom_id, target.time_slot_id
                        ),
                        vec![
                            ResolutionAction::RemoveAssignment { assignment_id: id },
                            ResolutionAction::AddAssignment {
                                section_id: a.section_id,
                                session: a.session,
                                teacher_id: target.teacher_id,
                                classroom_id: target.classroom_id,
                                time_slot_id: target.time_slot_id,
                            },
                        ],
                    ));
                }
                options.extend(self.option(
                    solution,
                    evaluation,
                    conflict,
                    ResolutionKind::RemoveAssignment,
                    format!("Unschedule section {} session {}", a.section_id, a.session),
                    vec![ResolutionAction::RemoveAssignment { assignment_id: id }],
                ));
            }
        }
        options
    }

    /// Scores an option by applying it to a copy. Options that do not
    /// clear the conflict are dropped.
    fn option(
        &self,
        solution: &SchedulingSolution,
        before: &SchedulingEvaluation,
        conflict: &SchedulingConflict,
        kind: ResolutionKind,
        description: String,
        actions: Vec<ResolutionAction>,
    ) -> Option<ResolutionOption> {
        let mut option = ResolutionOption {
            conflict: conflict.clone(),
            kind,
            description,
            compatibility: 0,
            warnings: Vec::new(),
            actions,
        };
        let applied = apply(&option, solution).ok()?;
        let after = self.evaluator.evaluate(&applied);
        let key = conflict.dedup_key();
        if after.conflicts.iter().any(|c| c.dedup_key() == key) {
            return None;
        }

        let delta = after.soft_satisfaction - before.soft_satisfaction;
        let compatibility = kind.base_compatibility() + (delta * 100.0).clamp(-20.0, 20.0);
        option.compatibility = compatibility.round().clamp(0.0, 100.0) as u8;

        let new_hard = after.hard_conflicts().count();
        let old_hard = before.hard_conflicts().count();
        if new_hard >= old_hard && new_hard > 0 {
            option
                .warnings
                .push(format!("{new_hard} hard conflicts remain after this change"));
        }
        if delta < -0.01 {
            option.warnings.push(format!(
                "soft satisfaction drops from {:.3} to {:.3}",
                before.soft_satisfaction, after.soft_satisfaction
            ));
        }
        if kind == ResolutionKind::RemoveAssignment {
            option
                .warnings
                .push("a scheduled meeting is dropped and must be placed manually".into());
        }
        for action in &option.actions {
            if let ResolutionAction::ReassignTeacher { assignment_id, teacher_id } = *action {
                let slot = solution.assignment(assignment_id).map(|a| a.time_slot_id);
                if let Some(p) = slot.and_then(|s| solution.problem().preference(teacher_id, s)) {
                    if p <= 2 {
                        option
                            .warnings
                            .push(format!("teacher {teacher_id} rates this slot {p}/5"));
                    }
                }
            }
        }
        Some(option)
    }
}

/// Which single-field changes can address a conflict type:
/// (teacher, classroom, time slot).
fn remedies(ty: ConflictType) -> (bool, bool, bool) {
    match ty {
        ConflictType::TeacherConflict => (true, false, true),
        ConflictType::ClassroomConflict => (false, true, true),
        ConflictType::TeacherAvailability => (true, false, true),
        ConflictType::ClassroomAvailability => (false, true, true),
        ConflictType::Capacity | ConflictType::Equipment | ConflictType::RoomType => (false, true, false),
        ConflictType::Prerequisite => (false, false, true),
        ConflictType::Workload | ConflictType::WorkloadBalance => (true, false, false),
        ConflictType::Travel | ConflictType::Mobility => (false, true, true),
        ConflictType::Preference => (true, false, true),
        ConflictType::Compactness => (false, false, true),
    }
}

/// First fully new feasible placement for the assignment's unit.
fn relocation(rules: &PlacementRules, solution: &SchedulingSolution, a: &SchedulingAssignment) -> Option<Placement> {
    let problem = solution.problem();
    let section = problem.section(a.section_id)?;
    for teacher_id in problem.candidate_teachers(section) {
        for slot in &problem.time_slots {
            for room in &problem.classrooms {
                let p = Placement {
                    section_id: a.section_id,
                    teacher_id,
                    classroom_id: room.id,
                    time_slot_id: slot.id,
                };
                if p != Placement::of(a) && rules.is_feasible(solution, Some(a.id), &p) {
                    return Some(p);
                }
            }
        }
    }
    None
}

fn unknown(what: &str, id: impl std::fmt::Display) -> TimetableError {
    TimetableError::validation(ValidationError::new(
        ValidationErrorKind::UnknownReference,
        format!("unknown {what} {id}"),
    ))
}

/// Executes `option` against a copy of `solution`.
///
/// # Errors
///
/// Unknown ids are validation errors. A result with duplicate units or
/// assignment ids is an invariant violation.
pub fn apply(option: &ResolutionOption, solution: &SchedulingSolution) -> Result<SchedulingSolution> {
    let problem = solution.problem_arc().clone();
    let mut next = solution.clone();
    for action in &option.actions {
        match *action {
            ResolutionAction::ReassignTeacher {
                assignment_id,
                teacher_id,
            } => {
                problem.teacher(teacher_id).ok_or_else(|| unknown("teacher", teacher_id))?;
                let a = next
                    .assignment_mut(assignment_id)
                    .ok_or_else(|| unknown("assignment", assignment_id))?;
                a.teacher_id = teacher_id;
                a.score = 0.0;
            }
            ResolutionAction::ReassignClassroom {
                assignment_id,
                classroom_id,
            } => {
                problem
                    .classroom(classroom_id)
                    .ok_or_else(|| unknown("classroom", classroom_id))?;
                let a = next
                    .assignment_mut(assignment_id)
                    .ok_or_else(|| unknown("assignment", assignment_id))?;
                a.classroom_id = classroom_id;
                a.score = 0.0;
            }
            ResolutionAction::ReassignTimeSlot {
                assignment_id,
                time_slot_id,
            } => {
                let slot = problem
                    .time_slot(time_slot_id)
                    .ok_or_else(|| unknown("time slot", time_slot_id))?;
                let a = next
                    .assignment_mut(assignment_id)
                    .ok_or_else(|| unknown("assignment", assignment_id))?;
                a.set_time_slot(slot);
                a.score = 0.0;
            }
            ResolutionAction::RemoveAssignment { assignment_id } => {
                next.remove(assignment_id)
                    .ok_or_else(|| unknown("assignment", assignment_id))?;
            }
            ResolutionAction::AddAssignment {
                section_id,
                session,
                teacher_id,
                classroom_id,
                time_slot_id,
            } => {
                problem.section(section_id).ok_or_else(|| unknown("section", section_id))?;
                problem.teacher(teacher_id).ok_or_else(|| unknown("teacher", teacher_id))?;
                problem
                    .classroom(classroom_id)
                    .ok_or_else(|| unknown("classroom", classroom_id))?;
                let slot = problem
                    .time_slot(time_slot_id)
                    .ok_or_else(|| unknown("time slot", time_slot_id))?;
                let id = next.next_assignment_id();
                next.push(SchedulingAssignment::new(
                    id,
                    Unit { section_id, session },
                    teacher_id,
                    classroom_id,
                    slot,
                ));
            }
        }
    }
    next.check_invariants()?;
    Ok(next)
}
