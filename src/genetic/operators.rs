//! Crossover and mutation on timetables.

use crate::local_search::MoveGenerator;
use crate::model::{AssignmentId, SchedulingAssignment, SchedulingSolution, Unit};
use crate::placement::{Placement, PlacementRules};
use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::HashMap;

/// Uniform per-unit crossover.
///
/// The child starts as a copy of `left`; each unit takes `right`'s
/// teacher, classroom and slot with probability one half. Inherited
/// placements that clash with the rest of the child are relocated to a
/// feasible slot under `rules`. Returns `None` when some clash cannot be
/// repaired.
pub fn uniform_crossover<R: Rng>(
    left: &SchedulingSolution,
    right: &SchedulingSolution,
    rules: &PlacementRules,
    rng: &mut R,
) -> Option<SchedulingSolution> {
    let donors: HashMap<Unit, &SchedulingAssignment> =
        right.assignments().iter().map(|a| (a.unit(), a)).collect();
    let problem = left.problem_arc().clone();
    let mut child = left.clone();

    let mut inherited: Vec<AssignmentId> = Vec::new();
    for a in child.assignments_mut() {
        let Some(donor) = donors.get(&a.unit()) else {
            continue;
        };
        if a.same_placement(donor) || !rng.random_bool(0.5) {
            continue;
        }
        let slot = problem.time_slot(donor.time_slot_id)?;
        a.teacher_id = donor.teacher_id;
        a.classroom_id = donor.classroom_id;
        a.set_time_slot(slot);
        a.score = 0.0;
        inherited.push(a.id);
    }

    for id in inherited {
        let current = child.assignment(id)?;
        if rules.is_feasible(&child, Some(id), &Placement::of(current)) {
            continue;
        }
        let slot_id = *rules.alternative_slots(&child, current).choose(rng)?;
        let slot = problem.time_slot(slot_id)?;
        child.assignment_mut(id)?.set_time_slot(slot);
    }
    Some(child)
}

/// Applies one feasible local search move, or returns a plain copy when
/// none exists.
pub fn mutate<R: Rng>(solution: &SchedulingSolution, moves: &MoveGenerator, rng: &mut R) -> SchedulingSolution {
    moves
        .propose(solution, None, rng)
        .and_then(|m| m.apply(solution))
        .unwrap_or_else(|| solution.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diversify::diversify_with_rng;
    use crate::evaluator::SolutionEvaluator;
    use crate::testutil::campus_start;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_crossover_children_feasible() {
        let ev = SolutionEvaluator::default();
        let start = campus_start(&ev);
        let mut rng = StdRng::seed_from_u64(5);
        let other = diversify_with_rng(&start, 1.0, &mut rng).expect("valid factor");
        let mut produced = 0;
        for _ in 0..30 {
            if let Some(child) = uniform_crossover(&start, &other, &PlacementRules::default(), &mut rng) {
                produced += 1;
                assert_eq!(child.len(), start.len());
                assert_eq!(child.covered_sections(), start.covered_sections());
                assert!(child.check_invariants().is_ok());
                assert!(ev.evaluate(&child).is_feasible);
            }
        }
        assert!(produced > 0);
    }

    #[test]
    fn test_crossover_of_identical_parents() {
        let ev = SolutionEvaluator::default();
        let start = campus_start(&ev);
        let mut rng = StdRng::seed_from_u64(1);
        let child = uniform_crossover(&start, &start, &PlacementRules::default(), &mut rng).expect("nothing to repair");
        assert!(child.same_assignments(&start));
    }

    #[test]
    fn test_mutation_changes_one_assignment() {
        let ev = SolutionEvaluator::default();
        let start = campus_start(&ev);
        let mut rng = StdRng::seed_from_u64(2);
        let mutant = mutate(&start, &MoveGenerator::new(false, 0.0), &mut rng);
        let changed = start
            .assignments()
            .iter()
            .zip(mutant.assignments())
            .filter(|(a, b)| !a.same_placement(b))
            .count();
        assert_eq!(changed, 1);
    }
}
