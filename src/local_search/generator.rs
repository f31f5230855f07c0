//! Feasibility-preserving move proposals.

use super::moves::Move;
use crate::model::{AssignmentId, EntityKind, SchedulingEvaluation, SchedulingSolution};
use crate::placement::PlacementRules;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;

/// How many troubled assignments the intelligent picker draws from.
const FOCUS_POOL: usize = 5;

/// Proposes moves that keep the solution free of new hard violations.
///
/// With `intelligent` set, the assignment to change is drawn with
/// probability `bias` from the few assignments involved in the most
/// severe conflicts (or, without conflicts, the lowest assignment
/// scores).
#[derive(Debug, Clone, Copy)]
pub struct MoveGenerator {
    pub intelligent: bool,
    pub bias: f64,
    /// Hard rules a proposed move must keep.
    pub rules: PlacementRules,
}

impl Default for MoveGenerator {
    fn default() -> Self {
        Self {
            intelligent: true,
            bias: 0.7,
            rules: PlacementRules::default(),
        }
    }
}

impl MoveGenerator {
    pub fn new(intelligent: bool, bias: f64) -> Self {
        Self {
            intelligent,
            bias: bias.clamp(0.0, 1.0),
            rules: PlacementRules::default(),
        }
    }

    pub fn with_rules(mut self, rules: PlacementRules) -> Self {
        self.rules = rules;
        self
    }

    /// Proposes one move, or `None` if no assignment has a feasible
    /// alternative.
    pub fn propose<R: Rng>(
        &self,
        solution: &SchedulingSolution,
        evaluation: Option<&SchedulingEvaluation>,
        rng: &mut R,
    ) -> Option<Move> {
        if solution.is_empty() {
            return None;
        }
        let focus = match evaluation {
            Some(e) if self.intelligent => focus_pool(solution, e),
            _ => Vec::new(),
        };

        let mut order: Vec<AssignmentId> = solution.assignments().iter().map(|a| a.id).collect();
        order.shuffle(rng);
        if !focus.is_empty() && rng.random_bool(self.bias) {
            if let Some(&id) = focus.choose(rng) {
                order.retain(|&x| x != id);
                order.insert(0, id);
            }
        }

        for id in order {
            if let Some(m) = self.move_for(solution, id, rng) {
                return Some(m);
            }
        }
        None
    }

    /// A random feasible move of `assignment_id`, trying the three move
    /// kinds in random order.
    pub fn move_for<R: Rng>(
        &self,
        solution: &SchedulingSolution,
        assignment_id: AssignmentId,
        rng: &mut R,
    ) -> Option<Move> {
        let a = solution.assignment(assignment_id)?;
        let mut kinds = [0u8, 1, 2];
        kinds.shuffle(rng);
        for kind in kinds {
            let m = match kind {
                0 => self.rules.alternative_slots(solution, a).choose(rng).map(|&time_slot_id| Move::ChangeTimeSlot {
                    assignment_id,
                    time_slot_id,
                }),
                1 => self.rules.alternative_teachers(solution, a).choose(rng).map(|&teacher_id| Move::ChangeTeacher {
                    assignment_id,
                    teacher_id,
                }),
                _ => self.rules.alternative_classrooms(solution, a)
                    .choose(rng)
                    .map(|&classroom_id| Move::ChangeClassroom {
                        assignment_id,
                        classroom_id,
                    }),
            };
            if m.is_some() {
                return m;
            }
        }
        None
    }
}

/// Assignments from the most severe conflicts first, then the lowest
/// assignment scores.
fn focus_pool(solution: &SchedulingSolution, evaluation: &SchedulingEvaluation) -> Vec<AssignmentId> {
    let mut conflicts: Vec<_> = evaluation.conflicts.iter().collect();
    conflicts.sort_by(|a, b| b.severity.cmp(&a.severity));
    let mut pool: Vec<AssignmentId> = Vec::new();
    for c in conflicts {
        for &id in c.entity_ids(EntityKind::Assignment) {
            if !pool.contains(&id) {
                pool.push(id);
            }
        }
        if pool.len() >= FOCUS_POOL {
            break;
        }
    }
    if pool.is_empty() {
        let mut scored: Vec<_> = solution.assignments().iter().collect();
        scored.sort_by(|a, b| a.score.total_cmp(&b.score));
        pool = scored.iter().map(|a| a.id).collect();
    }
    pool.truncate(FOCUS_POOL);
    pool
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::SolutionEvaluator;
    use crate::placement::Placement;
    use crate::testutil::{assignment, tiny_problem};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_proposals_stay_feasible() {
        let p = tiny_problem();
        let sol = SchedulingSolution::from_assignments(
            p.clone(),
            vec![assignment(&p, 1, 1, 1, 1, 1), assignment(&p, 2, 2, 2, 2, 1)],
        );
        let gen = MoveGenerator::new(false, 0.0);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let m = gen.propose(&sol, None, &mut rng).expect("a move exists");
            let next = m.apply(&sol).expect("valid move");
            let moved = next.assignment(m.assignment_id()).expect("assignment");
            assert!(gen.rules.is_feasible(&next, Some(moved.id), &Placement::of(moved)));
        }
    }

    #[test]
    fn test_intelligent_targets_conflicting_assignment() {
        let p = tiny_problem();
        let sol = SchedulingSolution::from_assignments(
            p.clone(),
            vec![assignment(&p, 1, 1, 1, 1, 1), assignment(&p, 2, 2, 1, 2, 1)],
        );
        let e = SolutionEvaluator::default().evaluate(&sol);
        let pool = focus_pool(&sol, &e);
        assert_eq!(&pool[..2], &[1, 2]);
        let gen = MoveGenerator::new(true, 1.0);
        let mut rng = StdRng::seed_from_u64(3);
        assert!(gen.propose(&sol, Some(&e), &mut rng).is_some());
    }

    #[test]
    fn test_empty_solution_has_no_moves() {
        let sol = SchedulingSolution::new(tiny_problem());
        let mut rng = StdRng::seed_from_u64(1);
        assert!(MoveGenerator::default().propose(&sol, None, &mut rng).is_none());
    }
}
