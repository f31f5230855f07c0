//! Solution diversification.
//!
//! Produces a perturbed copy of a timetable by moving a fraction of its
//! assignments to other feasible time slots. Teacher and classroom stay
//! put; coverage and assignment count never change.

use crate::error::{Result, TimetableError};
use crate::model::{validate_factor, AssignmentId, SchedulingSolution};
use crate::placement::PlacementRules;
use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Perturbs `round(n * factor)` random assignments of `solution`.
///
/// # Errors
///
/// `factor` outside `[0, 1]` is a validation error.
pub fn diversify(solution: &SchedulingSolution, factor: f64) -> Result<SchedulingSolution> {
    let mut rng = StdRng::seed_from_u64(rand::random());
    diversify_with_rng(solution, factor, &mut rng)
}

/// [`diversify`] with a caller-supplied random source.
pub fn diversify_with_rng<R: Rng>(
    solution: &SchedulingSolution,
    factor: f64,
    rng: &mut R,
) -> Result<SchedulingSolution> {
    diversify_with_rules(solution, factor, &PlacementRules::default(), rng)
}

/// [`diversify_with_rng`] that only enforces `rules` on moved slots.
pub fn diversify_with_rules<R: Rng>(
    solution: &SchedulingSolution,
    factor: f64,
    rules: &PlacementRules,
    rng: &mut R,
) -> Result<SchedulingSolution> {
    validate_factor("diversity factor", factor).map_err(TimetableError::validation)?;

    let mut next = solution.clone();
    let target = (solution.len() as f64 * factor).round() as usize;
    if target == 0 {
        return Ok(next);
    }

    let mut ids: Vec<AssignmentId> = solution.assignments().iter().map(|a| a.id).collect();
    ids.shuffle(rng);

    let problem = solution.problem_arc().clone();
    let mut moved = 0usize;
    for id in ids.into_iter().take(target) {
        let Some(current) = next.assignment(id) else {
            continue;
        };
        let Some(&slot_id) = rules.alternative_slots(&next, current).choose(rng) else {
            continue;
        };
        let Some(slot) = problem.time_slot(slot_id) else {
            continue;
        };
        if let Some(a) = next.assignment_mut(id) {
            a.set_time_slot(slot);
            a.score = 0.0;
            moved += 1;
        }
    }
    debug!(target, moved, "diversified solution");
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::SolutionEvaluator;
    use crate::testutil::campus_start;
    use proptest::prelude::*;

    #[test]
    fn test_zero_factor_is_identity() {
        let ev = SolutionEvaluator::default();
        let start = campus_start(&ev);
        let out = diversify(&start, 0.0).expect("valid factor");
        assert!(out.same_assignments(&start));
    }

    #[test]
    fn test_full_factor_keeps_count_and_coverage() {
        let ev = SolutionEvaluator::default();
        let start = campus_start(&ev);
        let out = diversify(&start, 1.0).expect("valid factor");
        assert_eq!(out.len(), start.len());
        assert_eq!(out.covered_sections(), start.covered_sections());
        assert!(!out.same_assignments(&start));
        assert!(ev.evaluate(&out).is_feasible);
    }

    #[test]
    fn test_factor_out_of_range() {
        let ev = SolutionEvaluator::default();
        let start = campus_start(&ev);
        assert!(matches!(diversify(&start, 1.5), Err(TimetableError::Validation(_))));
        assert!(matches!(diversify(&start, -0.1), Err(TimetableError::Validation(_))));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_diversify_stays_feasible(factor in 0.0f64..=1.0, seed in any::<u64>()) {
            let ev = SolutionEvaluator::default();
            let start = campus_start(&ev);
            let mut rng = StdRng::seed_from_u64(seed);
            let out = diversify_with_rng(&start, factor, &mut rng).expect("valid factor");
            prop_assert_eq!(out.len(), start.len());
            prop_assert_eq!(out.covered_sections(), start.covered_sections());
            prop_assert!(out.check_invariants().is_ok());
            prop_assert!(ev.evaluate(&out).is_feasible);
        }
    }
}
