//! Neighborhood moves.

use crate::model::{AssignmentId, ClassroomId, SchedulingSolution, TeacherId, TimeSlotId};

/// A single-assignment change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Move {
    ChangeTeacher {
        assignment_id: AssignmentId,
        teacher_id: TeacherId,
    },
    ChangeClassroom {
        assignment_id: AssignmentId,
        classroom_id: ClassroomId,
    },
    ChangeTimeSlot {
        assignment_id: AssignmentId,
        time_slot_id: TimeSlotId,
    },
}

impl Move {
    pub fn assignment_id(&self) -> AssignmentId {
        match *self {
            Move::ChangeTeacher { assignment_id, .. }
            | Move::ChangeClassroom { assignment_id, .. }
            | Move::ChangeTimeSlot { assignment_id, .. } => assignment_id,
        }
    }

    /// Applies the move to a clone of `solution`. The input is never
    /// modified. Returns `None` if the assignment or the target id does
    /// not exist.
    pub fn apply(&self, solution: &SchedulingSolution) -> Option<SchedulingSolution> {
        let problem = solution.problem_arc().clone();
        let mut next = solution.clone();
        let a = next.assignment_mut(self.assignment_id())?;
        match *self {
            Move::ChangeTeacher { teacher_id, .. } => {
                problem.teacher(teacher_id)?;
                a.teacher_id = teacher_id;
            }
            Move::ChangeClassroom { classroom_id, .. } => {
                problem.classroom(classroom_id)?;
                a.classroom_id = classroom_id;
            }
            Move::ChangeTimeSlot { time_slot_id, .. } => {
                let slot = problem.time_slot(time_slot_id)?;
                a.set_time_slot(slot);
            }
        }
        a.score = 0.0;
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{assignment, tiny_problem};

    #[test]
    fn test_apply_leaves_input_untouched() {
        let p = tiny_problem();
        let sol = SchedulingSolution::from_assignments(p.clone(), vec![assignment(&p, 1, 1, 1, 1, 1)]);
        let before = sol.clone();
        let m = Move::ChangeTimeSlot {
            assignment_id: 1,
            time_slot_id: 3,
        };
        let next = m.apply(&sol).expect("valid move");
        assert_eq!(sol, before);
        let a = next.assignment(1).expect("assignment");
        assert_eq!(a.time_slot_id, 3);
        assert_eq!(a.start_minute, 660);
    }

    #[test]
    fn test_apply_teacher_and_classroom() {
        let p = tiny_problem();
        let sol = SchedulingSolution::from_assignments(p.clone(), vec![assignment(&p, 1, 1, 1, 1, 1)]);
        let next = Move::ChangeTeacher {
            assignment_id: 1,
            teacher_id: 2,
        }
        .apply(&sol)
        .and_then(|s| {
            Move::ChangeClassroom {
                assignment_id: 1,
                classroom_id: 2,
            }
            .apply(&s)
        })
        .expect("valid moves");
        let a = next.assignment(1).expect("assignment");
        assert_eq!((a.teacher_id, a.classroom_id), (2, 2));
    }

    #[test]
    fn test_unknown_target_rejected() {
        let p = tiny_problem();
        let sol = SchedulingSolution::from_assignments(p.clone(), vec![assignment(&p, 1, 1, 1, 1, 1)]);
        let m = Move::ChangeClassroom {
            assignment_id: 1,
            classroom_id: 42,
        };
        assert!(m.apply(&sol).is_none());
        let m = Move::ChangeTeacher {
            assignment_id: 9,
            teacher_id: 1,
        };
        assert!(m.apply(&sol).is_none());
    }
}
