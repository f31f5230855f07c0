//! Evaluation records.
//!
//! Both types are produced fresh on every evaluation and never patched
//! afterwards; re-score a solution to get a new record.

use super::conflict::{ConflictType, SchedulingConflict, Severity};
use crate::constraint::ConstraintTier;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Outcome of evaluating one constraint.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConstraintEvaluation {
    pub constraint_id: u32,
    pub name: String,
    pub tier: ConstraintTier,
    pub weight: f64,
    /// Score in [0, 1].
    pub score: f64,
    pub satisfied: bool,
    pub conflicts: Vec<SchedulingConflict>,
}

impl ConstraintEvaluation {
    pub fn is_hard(&self) -> bool {
        self.tier.is_hard()
    }
}

/// Aggregate score of one solution.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SchedulingEvaluation {
    pub is_feasible: bool,
    /// Mean hard-constraint score.
    pub hard_satisfaction: f64,
    /// Weighted mean soft-constraint score.
    pub soft_satisfaction: f64,
    /// Final ranking score (higher is better).
    pub score: f64,
    pub constraint_evaluations: Vec<ConstraintEvaluation>,
    /// Merged, de-duplicated conflicts in tier order.
    pub conflicts: Vec<SchedulingConflict>,
}

impl SchedulingEvaluation {
    pub fn constraint(&self, id: u32) -> Option<&ConstraintEvaluation> {
        self.constraint_evaluations
            .iter()
            .find(|e| e.constraint_id == id)
    }

    pub fn conflicts_of_type(&self, ty: ConflictType) -> impl Iterator<Item = &SchedulingConflict> {
        self.conflicts.iter().filter(move |c| c.conflict_type == ty)
    }

    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.conflicts
            .iter()
            .filter(|c| c.severity == severity)
            .count()
    }

    /// Conflicts that block feasibility.
    pub fn hard_conflicts(&self) -> impl Iterator<Item = &SchedulingConflict> {
        self.conflicts.iter().filter(|c| c.severity == Severity::Critical)
    }
}
