//! Caller-supplied run parameters.

use crate::constraint::{ApplicationLevel, ConstraintManager};
use crate::error::{Result, TimetableError};
use crate::evaluator::ScorePolicy;
use crate::model::validate_factor;
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Per-run settings for the timetabling engine.
///
/// # Examples
///
/// ```
/// use u_timetable::constraint::ApplicationLevel;
/// use u_timetable::hybrid::SchedulingParameters;
///
/// let params = SchedulingParameters::default()
///     .with_active_constraints(["TEACHER_CONFLICT", "CLASSROOM_CONFLICT", "TEACHER_PREFERENCE"])
///     .with_weight(11, 0.9)
///     .with_level(ApplicationLevel::Full)
///     .with_time_budget_ms(5_000)
///     .with_seed(3);
/// assert!(params.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SchedulingParameters {
    /// Definition ids to activate. `None` keeps every constraint active.
    pub active_constraints: Option<Vec<String>>,

    /// Soft weight per constraint id.
    pub weight_overrides: BTreeMap<u32, f64>,

    /// Application level for the run. `None` keeps the evaluator's level.
    pub application_level: Option<ApplicationLevel>,

    /// Ranking policy for the run. `None` keeps the evaluator's policy.
    pub score_policy: Option<ScorePolicy>,

    /// Local search iterations per phase.
    pub max_iterations: usize,

    /// Wall-clock budget for the whole run.
    pub time_budget_ms: u64,

    /// Timetables returned by a full solve.
    pub solution_count: usize,

    /// Perturbation used to derive alternative timetables.
    pub diversity_factor: f64,

    pub seed: Option<u64>,
}

impl Default for SchedulingParameters {
    fn default() -> Self {
        Self {
            active_constraints: None,
            weight_overrides: BTreeMap::new(),
            application_level: None,
            score_policy: None,
            max_iterations: 1000,
            time_budget_ms: 30_000,
            solution_count: 3,
            diversity_factor: 0.3,
            seed: None,
        }
    }
}

impl SchedulingParameters {
    pub fn with_active_constraints<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.active_constraints = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_weight(mut self, constraint_id: u32, weight: f64) -> Self {
        self.weight_overrides.insert(constraint_id, weight);
        self
    }

    pub fn with_level(mut self, level: ApplicationLevel) -> Self {
        self.application_level = Some(level);
        self
    }

    pub fn with_score_policy(mut self, policy: ScorePolicy) -> Self {
        self.score_policy = Some(policy);
        self
    }

    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn with_time_budget_ms(mut self, ms: u64) -> Self {
        self.time_budget_ms = ms;
        self
    }

    pub fn with_solution_count(mut self, n: usize) -> Self {
        self.solution_count = n;
        self
    }

    pub fn with_diversity_factor(mut self, factor: f64) -> Self {
        self.diversity_factor = factor;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_factor("diversity factor", self.diversity_factor).map_err(TimetableError::validation)?;
        if self.solution_count == 0 {
            return Err(TimetableError::Config("solution_count must be at least 1".into()));
        }
        if self.time_budget_ms == 0 {
            return Err(TimetableError::Config("time_budget_ms must be positive".into()));
        }
        if let Some(policy) = &self.score_policy {
            policy.validate().map_err(TimetableError::Config)?;
        }
        Ok(())
    }

    /// Applies activation, weights and level to `manager`. Nothing is
    /// changed if an id is unknown. Settings left unset keep the
    /// manager's own.
    pub fn configure(&self, manager: &mut ConstraintManager) -> Result<()> {
        for &id in self.weight_overrides.keys() {
            if manager.get(id).is_none() {
                return Err(TimetableError::Config(format!("unknown constraint id {id}")));
            }
        }
        if let Some(ids) = &self.active_constraints {
            manager.activate_only(ids)?;
        }
        for (&id, &weight) in &self.weight_overrides {
            manager.set_weight(id, weight)?;
        }
        if let Some(level) = self.application_level {
            manager.set_level(level);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::TeacherPreferenceConstraint;

    #[test]
    fn test_defaults_valid() {
        assert!(SchedulingParameters::default().validate().is_ok());
    }

    #[test]
    fn test_bad_factor_is_validation_error() {
        let p = SchedulingParameters::default().with_diversity_factor(1.2);
        assert!(matches!(p.validate(), Err(TimetableError::Validation(_))));
        let p = SchedulingParameters::default().with_solution_count(0);
        assert!(matches!(p.validate(), Err(TimetableError::Config(_))));
    }

    #[test]
    fn test_configure_manager() {
        let mut m = ConstraintManager::with_defaults();
        let params = SchedulingParameters::default()
            .with_active_constraints(["TEACHER_CONFLICT", "TEACHER_PREFERENCE"])
            .with_weight(TeacherPreferenceConstraint::ID, 0.25)
            .with_level(ApplicationLevel::Standard);
        params.configure(&mut m).expect("known ids");
        assert_eq!(m.level(), ApplicationLevel::Standard);
        let pref = m.get(TeacherPreferenceConstraint::ID).expect("registered");
        assert_eq!(pref.meta().weight, 0.25);
        assert!(pref.meta().is_active);
        assert!(!m.get(2).expect("registered").meta().is_active);
    }

    #[test]
    fn test_unset_level_keeps_manager_level() {
        let mut m = ConstraintManager::with_defaults();
        m.set_level(ApplicationLevel::Minimal);
        SchedulingParameters::default().configure(&mut m).expect("no overrides");
        assert_eq!(m.level(), ApplicationLevel::Minimal);
    }

    #[test]
    fn test_unknown_weight_id_rejected() {
        let mut m = ConstraintManager::with_defaults();
        let params = SchedulingParameters::default().with_weight(99, 0.5);
        assert!(params.configure(&mut m).is_err());
    }
}
