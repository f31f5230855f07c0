//! Constraint registry.
//!
//! Owns every registered constraint, filters them by activation flag and
//! application level, and evaluates the active set in tier order.

use super::configurable_hard::{
    ClassroomAvailabilityConstraint, ClassroomCapacityConstraint,
    PrerequisiteSeparationConstraint, TeacherAvailabilityConstraint,
    TeacherWorkloadLimitConstraint,
};
use super::core_hard::{ClassroomConflictConstraint, TeacherConflictConstraint};
use super::physical_soft::{CampusTravelConstraint, EquipmentMatchConstraint, RoomTypeMatchConstraint};
use super::quality_soft::{
    ScheduleCompactnessConstraint, TeacherMobilityConstraint, TeacherPreferenceConstraint,
    WorkloadBalanceConstraint,
};
use super::types::{Constraint, ConstraintTier};
use crate::error::{Result, TimetableError};
use crate::initial::{AssignmentModel, Candidate};
use crate::model::{
    AssignmentId, ConstraintEvaluation, SchedulingConflict, SchedulingProblem, SchedulingSolution,
    ValidationError, ValidationErrorKind,
};
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which tiers take part in evaluation.
///
/// Changing the level filters constraints without touching their
/// activation flags or weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ApplicationLevel {
    /// Core-hard only.
    Minimal,
    /// All hard tiers.
    Basic,
    /// Hard tiers plus physical-soft.
    Standard,
    /// Every tier.
    #[default]
    Full,
}

impl ApplicationLevel {
    pub fn includes(self, tier: ConstraintTier) -> bool {
        match self {
            ApplicationLevel::Minimal => tier == ConstraintTier::CoreHard,
            ApplicationLevel::Basic => tier.is_hard(),
            ApplicationLevel::Standard => tier != ConstraintTier::QualitySoft,
            ApplicationLevel::Full => true,
        }
    }
}

/// Result of evaluating every active constraint once.
#[derive(Debug, Clone, Default)]
pub struct BatchEvaluation {
    /// One entry per active constraint, in tier then id order.
    pub evaluations: Vec<ConstraintEvaluation>,
    /// Conflicts of all constraints with duplicates removed.
    pub conflicts: Vec<SchedulingConflict>,
    /// Weighted mean of the soft sub-scores each assignment received.
    pub assignment_scores: HashMap<AssignmentId, f64>,
}

/// Registry of constraints.
#[derive(Debug, Clone, Default)]
pub struct ConstraintManager {
    constraints: Vec<Box<dyn Constraint>>,
    level: ApplicationLevel,
}

impl ConstraintManager {
    /// Empty registry at [`ApplicationLevel::Full`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the full built-in catalog (ids 1-14).
    pub fn with_defaults() -> Self {
        let constraints: Vec<Box<dyn Constraint>> = vec![
            Box::new(TeacherConflictConstraint::new()),
            Box::new(ClassroomConflictConstraint::new()),
            Box::new(TeacherAvailabilityConstraint::new()),
            Box::new(ClassroomAvailabilityConstraint::new()),
            Box::new(ClassroomCapacityConstraint::new()),
            Box::new(PrerequisiteSeparationConstraint::new()),
            Box::new(TeacherWorkloadLimitConstraint::new()),
            Box::new(EquipmentMatchConstraint::new()),
            Box::new(RoomTypeMatchConstraint::new()),
            Box::new(CampusTravelConstraint::new()),
            Box::new(TeacherPreferenceConstraint::new()),
            Box::new(WorkloadBalanceConstraint::new()),
            Box::new(ScheduleCompactnessConstraint::new()),
            Box::new(TeacherMobilityConstraint::new()),
        ];
        Self {
            constraints,
            level: ApplicationLevel::Full,
        }
    }

    /// Adds a constraint. Ids must be unique.
    pub fn register(&mut self, constraint: Box<dyn Constraint>) -> Result<()> {
        let id = constraint.meta().id;
        if self.get(id).is_some() {
            return Err(TimetableError::validation(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("constraint {id} is already registered"),
            )));
        }
        self.constraints.push(constraint);
        Ok(())
    }

    /// Removes and returns the constraint with `id`.
    pub fn unregister(&mut self, id: u32) -> Option<Box<dyn Constraint>> {
        let pos = self.constraints.iter().position(|c| c.meta().id == id)?;
        Some(self.constraints.remove(pos))
    }

    pub fn get(&self, id: u32) -> Option<&dyn Constraint> {
        self.constraints
            .iter()
            .find(|c| c.meta().id == id)
            .map(|c| c.as_ref())
    }

    fn get_mut(&mut self, id: u32) -> Result<&mut Box<dyn Constraint>> {
        self.constraints
            .iter_mut()
            .find(|c| c.meta().id == id)
            .ok_or_else(|| unknown_constraint(format!("constraint {id}")))
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn set_active(&mut self, id: u32, active: bool) -> Result<()> {
        self.get_mut(id)?.meta_mut().is_active = active;
        Ok(())
    }

    /// Activates exactly the constraints whose definition id is listed and
    /// deactivates the rest. Unknown definition ids are rejected and
    /// nothing changes.
    pub fn activate_only<S: AsRef<str>>(&mut self, definition_ids: &[S]) -> Result<()> {
        let wanted: HashSet<&str> = definition_ids.iter().map(|d| d.as_ref()).collect();
        let known: HashSet<&str> = self
            .constraints
            .iter()
            .map(|c| c.meta().definition_id.as_str())
            .collect();
        let errors: Vec<ValidationError> = wanted
            .iter()
            .filter(|d| !known.contains(*d))
            .map(|d| {
                ValidationError::new(
                    ValidationErrorKind::UnknownReference,
                    format!("unknown constraint definition {d}"),
                )
            })
            .collect();
        if !errors.is_empty() {
            return Err(TimetableError::Validation(errors));
        }
        for c in &mut self.constraints {
            let on = wanted.contains(c.meta().definition_id.as_str());
            c.meta_mut().is_active = on;
        }
        Ok(())
    }

    /// Sets a soft constraint's weight, clamped to [0, 1]. Hard
    /// constraints carry no weight and are rejected.
    pub fn set_weight(&mut self, id: u32, weight: f64) -> Result<()> {
        let c = self.get_mut(id)?;
        if c.is_hard() {
            return Err(TimetableError::Config(format!(
                "constraint {id} is hard and has no weight"
            )));
        }
        if !weight.is_finite() {
            return Err(TimetableError::Config(format!(
                "weight for constraint {id} must be finite"
            )));
        }
        c.meta_mut().weight = weight.clamp(0.0, 1.0);
        Ok(())
    }

    pub fn set_level(&mut self, level: ApplicationLevel) {
        self.level = level;
    }

    pub fn level(&self) -> ApplicationLevel {
        self.level
    }

    /// Active constraints admitted by the level, in tier then id order.
    pub fn active(&self) -> Vec<&dyn Constraint> {
        let mut list: Vec<&dyn Constraint> = self
            .constraints
            .iter()
            .filter(|c| c.meta().is_active && self.level.includes(c.meta().tier))
            .map(|c| c.as_ref())
            .collect();
        list.sort_by_key(|c| (c.meta().tier, c.meta().id));
        list
    }

    /// Active hard constraints.
    pub fn active_hard(&self) -> Vec<&dyn Constraint> {
        self.active().into_iter().filter(|c| c.is_hard()).collect()
    }

    /// Whether every active hard constraint admits the candidate.
    pub fn admits(&self, problem: &SchedulingProblem, candidate: &Candidate) -> bool {
        self.active_hard()
            .iter()
            .all(|c| c.admits(problem, candidate))
    }

    /// Lets every active hard constraint add its model rules.
    pub fn contribute_all(&self, model: &mut AssignmentModel) {
        for c in self.active_hard() {
            c.contribute(model);
        }
    }

    /// Evaluates the active set, hard tiers first.
    pub fn evaluate_all(&self, solution: &SchedulingSolution) -> BatchEvaluation {
        let mut batch = BatchEvaluation::default();
        let mut seen = HashSet::new();
        let mut weighted: HashMap<AssignmentId, (f64, f64)> = HashMap::new();

        for c in self.active() {
            let meta = c.meta();
            let outcome = c.evaluate(solution);
            if !c.is_hard() && meta.weight > 0.0 {
                for &(id, s) in &outcome.assignment_scores {
                    let e = weighted.entry(id).or_insert((0.0, 0.0));
                    e.0 += s * meta.weight;
                    e.1 += meta.weight;
                }
            }
            for conflict in &outcome.conflicts {
                if seen.insert(conflict.dedup_key()) {
                    batch.conflicts.push(conflict.clone());
                }
            }
            batch.evaluations.push(ConstraintEvaluation {
                constraint_id: meta.id,
                name: meta.name.clone(),
                tier: meta.tier,
                weight: meta.weight,
                score: outcome.score,
                satisfied: c.is_satisfied(outcome.score),
                conflicts: outcome.conflicts,
            });
        }

        batch.assignment_scores = weighted
            .into_iter()
            .map(|(id, (sum, w))| (id, if w > 0.0 { sum / w } else { 1.0 }))
            .collect();
        debug!(
            constraints = batch.evaluations.len(),
            conflicts = batch.conflicts.len(),
            "evaluated constraint set"
        );
        batch
    }
}

fn unknown_constraint(what: String) -> TimetableError {
    TimetableError::validation(ValidationError::new(
        ValidationErrorKind::UnknownReference,
        format!("unknown {what}"),
    ))
}
