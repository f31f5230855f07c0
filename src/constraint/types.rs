//! Core constraint trait and metadata.

use crate::initial::{AssignmentModel, Candidate};
use crate::model::{
    AssignmentId, SchedulingAssignment, SchedulingConflict, SchedulingProblem, SchedulingSolution,
    TeacherId,
};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Priority tier. Declaration order is evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConstraintTier {
    /// Resource exclusivity. Violations are categorically infeasible.
    CoreHard,
    /// Availability, capacity, curriculum and workload rules that are hard
    /// by policy but can be switched off.
    ConfigurableHard,
    /// Resource-fit quality: penalized, not forbidden.
    PhysicalSoft,
    /// Preferences and ergonomics: score shaping only.
    QualitySoft,
}

impl ConstraintTier {
    pub const ALL: [ConstraintTier; 4] = [
        ConstraintTier::CoreHard,
        ConstraintTier::ConfigurableHard,
        ConstraintTier::PhysicalSoft,
        ConstraintTier::QualitySoft,
    ];

    pub fn is_hard(self) -> bool {
        matches!(self, ConstraintTier::CoreHard | ConstraintTier::ConfigurableHard)
    }

    /// Soft sub-scores below this value are reported as diagnostic
    /// conflicts. Hard tiers report every violation.
    pub fn diagnostic_threshold(self) -> f64 {
        match self {
            ConstraintTier::CoreHard | ConstraintTier::ConfigurableHard => 1.0,
            ConstraintTier::PhysicalSoft => 1.0,
            ConstraintTier::QualitySoft => 0.5,
        }
    }
}

/// Broad grouping used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConstraintCategory {
    Resource,
    Availability,
    Capacity,
    Curriculum,
    Workload,
    Facility,
    Travel,
    Preference,
    Compactness,
}

/// Identity and configuration shared by every constraint.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConstraintMeta {
    pub id: u32,
    pub name: String,
    pub description: String,
    pub category: ConstraintCategory,
    pub tier: ConstraintTier,
    /// External definition identifier used to activate constraints by name.
    pub definition_id: String,
    pub basic_rule_id: String,
    pub is_active: bool,
    /// Soft weight in [0, 1]. Always 1.0 for hard constraints.
    pub weight: f64,
}

impl ConstraintMeta {
    pub fn new(
        id: u32,
        name: impl Into<String>,
        tier: ConstraintTier,
        category: ConstraintCategory,
    ) -> Self {
        let name = name.into();
        Self {
            id,
            definition_id: name.to_uppercase().replace(' ', "_"),
            basic_rule_id: format!("BR-{id:02}"),
            description: String::new(),
            name,
            category,
            tier,
            is_active: true,
            weight: 1.0,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_definition_id(mut self, definition_id: impl Into<String>) -> Self {
        self.definition_id = definition_id.into();
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight.clamp(0.0, 1.0);
        self
    }
}

/// Raw result of one constraint's evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintOutcome {
    /// Score in [0, 1].
    pub score: f64,
    pub conflicts: Vec<SchedulingConflict>,
    /// Per-assignment sub-scores (soft constraints only).
    pub assignment_scores: Vec<(AssignmentId, f64)>,
}

impl ConstraintOutcome {
    /// Hard outcome: 1.0 with no conflicts, otherwise 0.0.
    pub fn hard(conflicts: Vec<SchedulingConflict>) -> Self {
        Self {
            score: if conflicts.is_empty() { 1.0 } else { 0.0 },
            conflicts,
            assignment_scores: Vec::new(),
        }
    }

    /// Soft outcome: mean of the per-assignment sub-scores (1.0 if empty).
    pub fn soft(assignment_scores: Vec<(AssignmentId, f64)>, conflicts: Vec<SchedulingConflict>) -> Self {
        let score = if assignment_scores.is_empty() {
            1.0
        } else {
            assignment_scores.iter().map(|(_, s)| s).sum::<f64>() / assignment_scores.len() as f64
        };
        Self {
            score: score.clamp(0.0, 1.0),
            conflicts,
            assignment_scores,
        }
    }
}

/// A timetabling constraint.
///
/// Implementors provide metadata and an evaluation over a full solution.
/// Hard constraints may additionally prune candidate placements and push
/// rules into the initial-solution model.
pub trait Constraint: Send + Sync + fmt::Debug {
    fn meta(&self) -> &ConstraintMeta;

    fn meta_mut(&mut self) -> &mut ConstraintMeta;

    /// Scores the solution and lists the violations found.
    fn evaluate(&self, solution: &SchedulingSolution) -> ConstraintOutcome;

    fn is_hard(&self) -> bool {
        self.meta().tier.is_hard()
    }

    fn is_satisfied(&self, score: f64) -> bool {
        if self.is_hard() {
            score >= 1.0
        } else {
            score > 0.0
        }
    }

    /// Whether a candidate placement survives static pruning. Rejected
    /// candidates are fixed to 0 and never enter the model.
    fn admits(&self, _problem: &SchedulingProblem, _candidate: &Candidate) -> bool {
        true
    }

    /// Adds this constraint's relational rules to the model.
    fn contribute(&self, _model: &mut AssignmentModel) {}

    /// Boxed copy, so registries can be cloned.
    fn clone_box(&self) -> Box<dyn Constraint>;
}

impl Clone for Box<dyn Constraint> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

macro_rules! meta_accessors {
    () => {
        fn meta(&self) -> &$crate::constraint::ConstraintMeta {
            &self.meta
        }

        fn meta_mut(&mut self) -> &mut $crate::constraint::ConstraintMeta {
            &mut self.meta
        }

        fn clone_box(&self) -> Box<dyn $crate::constraint::Constraint> {
            Box::new(self.clone())
        }
    };
}

pub(crate) use meta_accessors;

/// Each teacher's assignments per day, ordered by start time. Keys are
/// (teacher, day).
pub(crate) fn daily_sequences(
    solution: &SchedulingSolution,
) -> BTreeMap<(TeacherId, u8), Vec<&SchedulingAssignment>> {
    let mut days: BTreeMap<(TeacherId, u8), Vec<&SchedulingAssignment>> = BTreeMap::new();
    for a in solution.assignments() {
        days.entry((a.teacher_id, a.day)).or_default().push(a);
    }
    for seq in days.values_mut() {
        seq.sort_by_key(|a| (a.start_minute, a.id));
    }
    days
}

/// Lays per-assignment scores out in solution order. Assignments missing
/// from `scores` get 1.0.
pub(crate) fn in_solution_order(
    solution: &SchedulingSolution,
    scores: &HashMap<AssignmentId, f64>,
) -> Vec<(AssignmentId, f64)> {
    solution
        .assignments()
        .iter()
        .map(|a| (a.id, scores.get(&a.id).copied().unwrap_or(1.0)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_order_and_hardness() {
        assert!(ConstraintTier::CoreHard < ConstraintTier::QualitySoft);
        assert!(ConstraintTier::ConfigurableHard.is_hard());
        assert!(!ConstraintTier::PhysicalSoft.is_hard());
    }

    #[test]
    fn test_soft_outcome_mean() {
        let o = ConstraintOutcome::soft(vec![(1, 1.0), (2, 0.5)], Vec::new());
        assert!((o.score - 0.75).abs() < 1e-12);
        assert_eq!(ConstraintOutcome::soft(Vec::new(), Vec::new()).score, 1.0);
    }

    #[test]
    fn test_meta_defaults() {
        let m = ConstraintMeta::new(3, "Teacher availability", ConstraintTier::ConfigurableHard, ConstraintCategory::Availability)
            .with_weight(4.0);
        assert_eq!(m.definition_id, "TEACHER_AVAILABILITY");
        assert_eq!(m.basic_rule_id, "BR-03");
        assert_eq!(m.weight, 1.0);
    }
}
