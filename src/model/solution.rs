//! Mutable solution representation.
//!
//! Solutions are values: engines clone a solution, edit the clone, and
//! hand it back. The referenced [`SchedulingProblem`] is shared and never
//! touched.

use super::problem::{ClassroomId, SchedulingProblem, SectionId, TeacherId, TimeSlot, TimeSlotId, Unit};
use crate::error::{Result, TimetableError};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub type AssignmentId = u64;

/// One scheduled meeting of one section.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SchedulingAssignment {
    pub id: AssignmentId,
    pub section_id: SectionId,
    pub session: u32,
    pub teacher_id: TeacherId,
    pub classroom_id: ClassroomId,
    pub time_slot_id: TimeSlotId,
    pub day: u8,
    pub start_minute: u16,
    pub end_minute: u16,
    /// Assignment-level quality in [0, 1], filled by the evaluator.
    pub score: f64,
}

impl SchedulingAssignment {
    pub fn new(
        id: AssignmentId,
        unit: Unit,
        teacher_id: TeacherId,
        classroom_id: ClassroomId,
        slot: &TimeSlot,
    ) -> Self {
        Self {
            id,
            section_id: unit.section_id,
            session: unit.session,
            teacher_id,
            classroom_id,
            time_slot_id: slot.id,
            day: slot.day,
            start_minute: slot.start_minute,
            end_minute: slot.end_minute,
            score: 0.0,
        }
    }

    pub fn unit(&self) -> Unit {
        Unit {
            section_id: self.section_id,
            session: self.session,
        }
    }

    /// Moves the assignment to `slot`, refreshing the derived time fields.
    pub(crate) fn set_time_slot(&mut self, slot: &TimeSlot) {
        self.time_slot_id = slot.id;
        self.day = slot.day;
        self.start_minute = slot.start_minute;
        self.end_minute = slot.end_minute;
    }

    /// Same placement, ignoring the id and score.
    pub fn same_placement(&self, other: &SchedulingAssignment) -> bool {
        self.section_id == other.section_id
            && self.session == other.session
            && self.teacher_id == other.teacher_id
            && self.classroom_id == other.classroom_id
            && self.time_slot_id == other.time_slot_id
    }
}

/// An ordered set of assignments over a shared problem.
#[derive(Debug, Clone)]
pub struct SchedulingSolution {
    problem: Arc<SchedulingProblem>,
    assignments: Vec<SchedulingAssignment>,
}

impl SchedulingSolution {
    pub fn new(problem: Arc<SchedulingProblem>) -> Self {
        Self {
            problem,
            assignments: Vec::new(),
        }
    }

    pub fn from_assignments(
        problem: Arc<SchedulingProblem>,
        assignments: Vec<SchedulingAssignment>,
    ) -> Self {
        Self {
            problem,
            assignments,
        }
    }

    pub fn problem(&self) -> &SchedulingProblem {
        &self.problem
    }

    pub fn problem_arc(&self) -> &Arc<SchedulingProblem> {
        &self.problem
    }

    pub fn assignments(&self) -> &[SchedulingAssignment] {
        &self.assignments
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn assignment(&self, id: AssignmentId) -> Option<&SchedulingAssignment> {
        self.assignments.iter().find(|a| a.id == id)
    }

    pub(crate) fn assignment_mut(&mut self, id: AssignmentId) -> Option<&mut SchedulingAssignment> {
        self.assignments.iter_mut().find(|a| a.id == id)
    }

    pub(crate) fn assignments_mut(&mut self) -> &mut [SchedulingAssignment] {
        &mut self.assignments
    }

    pub(crate) fn push(&mut self, assignment: SchedulingAssignment) {
        self.assignments.push(assignment);
    }

    pub(crate) fn remove(&mut self, id: AssignmentId) -> Option<SchedulingAssignment> {
        let pos = self.assignments.iter().position(|a| a.id == id)?;
        Some(self.assignments.remove(pos))
    }

    /// An id not used by any current assignment.
    pub fn next_assignment_id(&self) -> AssignmentId {
        self.assignments.iter().map(|a| a.id).max().map_or(1, |m| m + 1)
    }

    /// Sections with at least one assignment.
    pub fn covered_sections(&self) -> BTreeSet<SectionId> {
        self.assignments.iter().map(|a| a.section_id).collect()
    }

    /// Whether `teacher` already teaches in `slot`, ignoring `except`.
    pub fn is_teacher_busy(
        &self,
        teacher: TeacherId,
        slot: TimeSlotId,
        except: Option<AssignmentId>,
    ) -> bool {
        self.assignments.iter().any(|a| {
            Some(a.id) != except && a.teacher_id == teacher && a.time_slot_id == slot
        })
    }

    /// Whether `classroom` is already used in `slot`, ignoring `except`.
    pub fn is_classroom_busy(
        &self,
        classroom: ClassroomId,
        slot: TimeSlotId,
        except: Option<AssignmentId>,
    ) -> bool {
        self.assignments.iter().any(|a| {
            Some(a.id) != except && a.classroom_id == classroom && a.time_slot_id == slot
        })
    }

    /// Assignments grouped by teacher, each group sorted by (day, start).
    pub fn by_teacher(&self) -> HashMap<TeacherId, Vec<&SchedulingAssignment>> {
        let mut groups: HashMap<TeacherId, Vec<&SchedulingAssignment>> = HashMap::new();
        for a in &self.assignments {
            groups.entry(a.teacher_id).or_default().push(a);
        }
        for group in groups.values_mut() {
            group.sort_by_key(|a| (a.day, a.start_minute));
        }
        groups
    }

    /// Compares placements with another solution, ignoring ids and scores.
    pub fn same_assignments(&self, other: &SchedulingSolution) -> bool {
        let key = |a: &SchedulingAssignment| (a.section_id, a.session);
        let mut mine: Vec<&SchedulingAssignment> = self.assignments.iter().collect();
        let mut theirs: Vec<&SchedulingAssignment> = other.assignments.iter().collect();
        mine.sort_by_key(|a| key(a));
        theirs.sort_by_key(|a| key(a));
        mine.len() == theirs.len()
            && mine.iter().zip(theirs.iter()).all(|(a, b)| a.same_placement(b))
    }

    /// Checks structural invariants: unique assignment ids, unique
    /// (section, session) units, and foreign ids that resolve in the
    /// owning problem.
    pub fn check_invariants(&self) -> Result<()> {
        let mut ids = HashSet::new();
        let mut units = HashSet::new();
        for a in &self.assignments {
            if !ids.insert(a.id) {
                return Err(TimetableError::InvariantViolation(format!(
                    "duplicate assignment id {}",
                    a.id
                )));
            }
            if !units.insert(a.unit()) {
                return Err(TimetableError::InvariantViolation(format!(
                    "section {} session {} assigned twice",
                    a.section_id, a.session
                )));
            }
            let p = &self.problem;
            let dangling = if p.section(a.section_id).is_none() {
                Some(("section", a.section_id))
            } else if p.teacher(a.teacher_id).is_none() {
                Some(("teacher", a.teacher_id))
            } else if p.classroom(a.classroom_id).is_none() {
                Some(("classroom", a.classroom_id))
            } else if p.time_slot(a.time_slot_id).is_none() {
                Some(("time slot", a.time_slot_id))
            } else {
                None
            };
            if let Some((kind, id)) = dangling {
                return Err(TimetableError::InvariantViolation(format!(
                    "assignment {} references unknown {kind} {id}",
                    a.id
                )));
            }
        }
        Ok(())
    }
}

impl PartialEq for SchedulingSolution {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.problem, &other.problem) && self.assignments == other.assignments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{assignment, tiny_problem};

    #[test]
    fn test_next_assignment_id() {
        let problem = tiny_problem();
        let mut sol = SchedulingSolution::new(problem.clone());
        assert_eq!(sol.next_assignment_id(), 1);
        sol.push(assignment(&problem, 7, 1, 1, 1, 1));
        assert_eq!(sol.next_assignment_id(), 8);
    }

    #[test]
    fn test_busy_checks_ignore_self() {
        let problem = tiny_problem();
        let sol = SchedulingSolution::from_assignments(
            problem.clone(),
            vec![assignment(&problem, 1, 1, 1, 1, 1)],
        );
        assert!(sol.is_teacher_busy(1, 1, None));
        assert!(!sol.is_teacher_busy(1, 1, Some(1)));
        assert!(sol.is_classroom_busy(1, 1, None));
        assert!(!sol.is_classroom_busy(1, 2, None));
    }

    #[test]
    fn test_duplicate_id_is_invariant_violation() {
        let problem = tiny_problem();
        let sol = SchedulingSolution::from_assignments(
            problem.clone(),
            vec![
                assignment(&problem, 1, 1, 1, 1, 1),
                assignment(&problem, 1, 2, 2, 2, 2),
            ],
        );
        assert!(matches!(
            sol.check_invariants(),
            Err(TimetableError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_dangling_reference_is_invariant_violation() {
        let problem = tiny_problem();
        let mut a = assignment(&problem, 1, 1, 1, 1, 1);
        a.classroom_id = 99;
        let sol = SchedulingSolution::from_assignments(problem, vec![a]);
        let err = sol.check_invariants().unwrap_err();
        assert!(err.to_string().contains("classroom 99"));
    }

    #[test]
    fn test_same_assignments_ignores_order_and_ids() {
        let problem = tiny_problem();
        let a = SchedulingSolution::from_assignments(
            problem.clone(),
            vec![assignment(&problem, 1, 1, 1, 1, 1), assignment(&problem, 2, 2, 2, 2, 2)],
        );
        let b = SchedulingSolution::from_assignments(
            problem.clone(),
            vec![assignment(&problem, 9, 2, 2, 2, 2), assignment(&problem, 8, 1, 1, 1, 1)],
        );
        assert!(a.same_assignments(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_set_time_slot_updates_derived_fields() {
        let problem = tiny_problem();
        let mut a = assignment(&problem, 1, 1, 1, 1, 1);
        let slot = problem.time_slot(2).cloned().expect("slot 2");
        a.set_time_slot(&slot);
        assert_eq!(a.time_slot_id, 2);
        assert_eq!(a.start_minute, slot.start_minute);
        assert_eq!(a.end_minute, slot.end_minute);
    }
}
