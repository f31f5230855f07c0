//! Solution scoring.
//!
//! Runs the active constraint set once, folds the per-constraint scores
//! into hard and soft satisfaction levels, and blends them into a single
//! ranking score through a [`ScorePolicy`].

use crate::constraint::ConstraintManager;
use crate::model::{AssignmentId, EntityKind, SchedulingEvaluation, SchedulingSolution};
use std::collections::{HashMap, HashSet};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How hard and soft levels combine into the ranking score.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ScorePolicy {
    /// Feasible solutions score their soft level in [0, 1]. Infeasible
    /// ones score `(hard + soft) / 2 - 1`, always below zero, so every
    /// feasible solution outranks every infeasible one.
    #[default]
    SoftWhenFeasible,

    /// Weighted mean of the two levels.
    WeightedBlend { hard_weight: f64, soft_weight: f64 },
}

impl ScorePolicy {
    pub fn validate(&self) -> Result<(), String> {
        match *self {
            ScorePolicy::SoftWhenFeasible => Ok(()),
            ScorePolicy::WeightedBlend {
                hard_weight,
                soft_weight,
            } => {
                if hard_weight < 0.0 || soft_weight < 0.0 {
                    return Err("blend weights must be non-negative".into());
                }
                if hard_weight + soft_weight <= 0.0 {
                    return Err("blend weights must not both be zero".into());
                }
                Ok(())
            }
        }
    }

    pub fn combine(&self, feasible: bool, hard: f64, soft: f64) -> f64 {
        match *self {
            ScorePolicy::SoftWhenFeasible => {
                if feasible {
                    soft
                } else {
                    (hard + soft) / 2.0 - 1.0
                }
            }
            ScorePolicy::WeightedBlend {
                hard_weight,
                soft_weight,
            } => (hard_weight * hard + soft_weight * soft) / (hard_weight + soft_weight),
        }
    }
}

/// Scores solutions against a constraint set.
#[derive(Debug, Clone)]
pub struct SolutionEvaluator {
    manager: ConstraintManager,
    policy: ScorePolicy,
}

impl Default for SolutionEvaluator {
    fn default() -> Self {
        Self::new(ConstraintManager::with_defaults())
    }
}

impl SolutionEvaluator {
    pub fn new(manager: ConstraintManager) -> Self {
        Self {
            manager,
            policy: ScorePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ScorePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> ScorePolicy {
        self.policy
    }

    pub fn manager(&self) -> &ConstraintManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut ConstraintManager {
        &mut self.manager
    }

    /// Fresh evaluation of `solution`. Pure: the solution is not touched.
    pub fn evaluate(&self, solution: &SchedulingSolution) -> SchedulingEvaluation {
        self.evaluate_with_scores(solution).0
    }

    /// Ranking score only.
    pub fn score(&self, solution: &SchedulingSolution) -> f64 {
        self.evaluate(solution).score
    }

    /// Evaluates and returns a copy of `solution` whose assignments carry
    /// their assignment-level score: 0 for assignments involved in a
    /// critical conflict, otherwise the weighted mean of their soft
    /// sub-scores.
    pub fn annotate(&self, solution: &SchedulingSolution) -> (SchedulingSolution, SchedulingEvaluation) {
        let (evaluation, scores) = self.evaluate_with_scores(solution);
        let blocked: HashSet<AssignmentId> = evaluation
            .hard_conflicts()
            .flat_map(|c| c.entity_ids(EntityKind::Assignment).iter().copied())
            .collect();
        let mut annotated = solution.clone();
        for a in annotated.assignments_mut() {
            a.score = if blocked.contains(&a.id) {
                0.0
            } else {
                scores.get(&a.id).copied().unwrap_or(1.0)
            };
        }
        (annotated, evaluation)
    }

    fn evaluate_with_scores(
        &self,
        solution: &SchedulingSolution,
    ) -> (SchedulingEvaluation, HashMap<AssignmentId, f64>) {
        let batch = self.manager.evaluate_all(solution);

        let hard: Vec<f64> = batch
            .evaluations
            .iter()
            .filter(|e| e.is_hard())
            .map(|e| e.score)
            .collect();
        let hard_satisfaction = if hard.is_empty() {
            1.0
        } else {
            hard.iter().sum::<f64>() / hard.len() as f64
        };

        let (weighted, total_weight) = batch
            .evaluations
            .iter()
            .filter(|e| !e.is_hard())
            .fold((0.0, 0.0), |(s, w), e| (s + e.score * e.weight, w + e.weight));
        let soft_satisfaction = if total_weight > 0.0 {
            weighted / total_weight
        } else {
            1.0
        };

        let is_feasible = hard_satisfaction >= 1.0;
        let score = self
            .policy
            .combine(is_feasible, hard_satisfaction, soft_satisfaction);

        let evaluation = SchedulingEvaluation {
            is_feasible,
            hard_satisfaction,
            soft_satisfaction,
            score,
            constraint_evaluations: batch.evaluations,
            conflicts: batch.conflicts,
        };
        (evaluation, batch.assignment_scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::ApplicationLevel;
    use crate::testutil::{assignment, tiny_problem};
    use proptest::prelude::*;

    #[test]
    fn test_feasible_scores_soft_level() {
        let p = tiny_problem();
        let sol = SchedulingSolution::from_assignments(
            p.clone(),
            vec![assignment(&p, 1, 1, 1, 1, 1), assignment(&p, 2, 2, 2, 2, 1)],
        );
        let e = SolutionEvaluator::default().evaluate(&sol);
        assert!(e.is_feasible);
        assert_eq!(e.hard_satisfaction, 1.0);
        assert_eq!(e.score, e.soft_satisfaction);
        assert!(e.score >= 0.0 && e.score <= 1.0);
    }

    #[test]
    fn test_infeasible_always_below_feasible() {
        let p = tiny_problem();
        let bad = SchedulingSolution::from_assignments(
            p.clone(),
            vec![assignment(&p, 1, 1, 1, 1, 1), assignment(&p, 2, 2, 1, 2, 1)],
        );
        let ev = SolutionEvaluator::default();
        let e = ev.evaluate(&bad);
        assert!(!e.is_feasible);
        assert!(e.score < 0.0);
        assert!(e.hard_conflicts().count() >= 1);
    }

    #[test]
    fn test_weighted_blend() {
        let policy = ScorePolicy::WeightedBlend {
            hard_weight: 3.0,
            soft_weight: 1.0,
        };
        assert!(policy.validate().is_ok());
        assert!((policy.combine(false, 0.5, 1.0) - 0.625).abs() < 1e-12);
        let zero = ScorePolicy::WeightedBlend {
            hard_weight: 0.0,
            soft_weight: 0.0,
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_annotate_zeroes_conflicting_assignments() {
        let p = tiny_problem();
        let sol = SchedulingSolution::from_assignments(
            p.clone(),
            vec![
                assignment(&p, 1, 1, 1, 1, 1),
                assignment(&p, 2, 2, 1, 2, 1),
            ],
        );
        let (annotated, _) = SolutionEvaluator::default().annotate(&sol);
        assert!(annotated.assignments().iter().all(|a| a.score == 0.0));
    }

    #[test]
    fn test_annotate_leaves_input_untouched() {
        let p = tiny_problem();
        let sol = SchedulingSolution::from_assignments(p.clone(), vec![assignment(&p, 1, 1, 1, 1, 1)]);
        let (annotated, e) = SolutionEvaluator::default().annotate(&sol);
        assert!(e.is_feasible);
        assert!(annotated.assignments()[0].score > 0.0);
        assert_eq!(sol.assignments()[0].score, 0.0);
    }

    #[test]
    fn test_minimal_level_ignores_soft() {
        let mut manager = ConstraintManager::with_defaults();
        manager.set_level(ApplicationLevel::Minimal);
        let ev = SolutionEvaluator::new(manager);
        let p = tiny_problem();
        let sol = SchedulingSolution::from_assignments(p.clone(), vec![assignment(&p, 1, 1, 1, 1, 1)]);
        let e = ev.evaluate(&sol);
        assert_eq!(e.constraint_evaluations.len(), 2);
        assert_eq!(e.soft_satisfaction, 1.0);
        assert_eq!(e.score, 1.0);
    }

    proptest! {
        #[test]
        fn prop_evaluation_is_idempotent(
            picks in proptest::collection::vec((1u32..=2, 1u32..=2, 1u32..=3), 0..4)
        ) {
            let p = tiny_problem();
            let assignments = picks
                .iter()
                .enumerate()
                .map(|(i, &(t, r, s))| assignment(&p, i as u64 + 1, (i % 2) as u32 + 1, t, r, s))
                .collect();
            let sol = SchedulingSolution::from_assignments(p.clone(), assignments);
            let ev = SolutionEvaluator::default();
            let first = ev.evaluate(&sol);
            let second = ev.evaluate(&sol);
            prop_assert_eq!(first, second);
        }
    }
}
