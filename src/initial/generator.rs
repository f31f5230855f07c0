//! Initial feasible timetables.

use super::model::{AssignmentModel, Candidate};
use super::solver::{CpSolver, PropagationSolver, SearchConfig, SolverStatus};
use crate::cancel::StopSignal;
use crate::evaluator::SolutionEvaluator;
use crate::model::{SchedulingAssignment, SchedulingProblem, SchedulingSolution, SectionId};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Why no initial timetable was produced.
#[derive(Debug, Clone, PartialEq)]
pub enum InfeasibilityReason {
    /// A unit lost every candidate to static pruning.
    NoCandidates { section_id: SectionId, session: u32 },
    /// The search explored the whole model without a solution.
    Proven,
    /// The node budget ran out first.
    BudgetExhausted,
    /// Cancelled or out of time.
    Stopped,
    /// Every model solution broke a hard constraint that has no model
    /// rule (for example a custom registered constraint).
    HardViolations { rejected: usize },
    /// The model or search configuration was malformed.
    InvalidModel,
}

impl fmt::Display for InfeasibilityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InfeasibilityReason::NoCandidates {
                section_id,
                session,
            } => write!(
                f,
                "section {section_id} session {session} has no admissible teacher, room and slot"
            ),
            InfeasibilityReason::Proven => f.write_str("no assignment satisfies the hard constraints"),
            InfeasibilityReason::BudgetExhausted => f.write_str("search budget exhausted"),
            InfeasibilityReason::Stopped => f.write_str("search stopped"),
            InfeasibilityReason::HardViolations { rejected } => {
                write!(f, "{rejected} candidate solutions violated hard constraints")
            }
            InfeasibilityReason::InvalidModel => f.write_str("invalid model or search configuration"),
        }
    }
}

/// Result of initial generation. Infeasibility is an outcome, not an
/// error.
#[derive(Debug, Clone)]
pub enum InitialOutcome {
    /// Feasible solutions, best score first.
    Found(Vec<SchedulingSolution>),
    Infeasible { reason: InfeasibilityReason },
}

impl InitialOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, InitialOutcome::Found(list) if !list.is_empty())
    }

    pub fn solutions(&self) -> &[SchedulingSolution] {
        match self {
            InitialOutcome::Found(list) => list,
            InitialOutcome::Infeasible { .. } => &[],
        }
    }

    pub fn into_solutions(self) -> Vec<SchedulingSolution> {
        match self {
            InitialOutcome::Found(list) => list,
            InitialOutcome::Infeasible { .. } => Vec::new(),
        }
    }
}

/// Builds the assignment model for a problem and searches it.
///
/// Equipment is pruned strictly first; if that leaves the problem
/// infeasible the model is rebuilt without equipment pruning and the
/// mismatch is left to the soft equipment constraint.
pub struct InitialSolutionGenerator<'a, S: CpSolver = PropagationSolver> {
    evaluator: &'a SolutionEvaluator,
    solver: S,
}

impl<'a> InitialSolutionGenerator<'a, PropagationSolver> {
    pub fn new(evaluator: &'a SolutionEvaluator) -> Self {
        Self {
            evaluator,
            solver: PropagationSolver::new(),
        }
    }
}

impl<'a, S: CpSolver> InitialSolutionGenerator<'a, S> {
    pub fn with_solver(evaluator: &'a SolutionEvaluator, solver: S) -> Self {
        Self { evaluator, solver }
    }

    /// Enumerates admissible candidates and collects model rules.
    pub fn build_model(&self, problem: &Arc<SchedulingProblem>, strict_equipment: bool) -> AssignmentModel {
        let manager = self.evaluator.manager();
        let mut model = AssignmentModel::new("initial", problem.clone());
        let units: Vec<_> = model.units().to_vec();
        for unit in units {
            let Some(section) = problem.section(unit.section_id) else {
                continue;
            };
            for teacher_id in problem.candidate_teachers(section) {
                for room in &problem.classrooms {
                    if strict_equipment && !room.has_equipment(&section.required_equipment) {
                        continue;
                    }
                    for slot in &problem.time_slots {
                        let candidate = Candidate::new(unit, section.course_id, teacher_id, room.id, slot);
                        if manager.admits(problem, &candidate) {
                            model.add_candidate(candidate);
                        }
                    }
                }
            }
        }
        model.add_unit_rules();
        manager.contribute_all(&mut model);
        debug!(
            vars = model.vars().len(),
            rules = model.rules().len(),
            strict_equipment,
            "assignment model built"
        );
        model
    }

    /// Searches for up to `config.max_solutions` feasible timetables.
    #[tracing::instrument(skip_all, fields(units = problem.unit_count()))]
    pub fn generate(
        &self,
        problem: &Arc<SchedulingProblem>,
        config: &SearchConfig,
        stop: &StopSignal,
    ) -> InitialOutcome {
        if config.validate().is_err() {
            return InitialOutcome::Infeasible {
                reason: InfeasibilityReason::InvalidModel,
            };
        }
        let passes: &[bool] = if config.strict_equipment { &[true, false] } else { &[false] };
        let mut reason = InfeasibilityReason::Proven;

        for &strict in passes {
            let model = self.build_model(problem, strict);
            if let Some(unit) = model.empty_units().first() {
                reason = InfeasibilityReason::NoCandidates {
                    section_id: unit.section_id,
                    session: unit.session,
                };
                if strict {
                    warn!(%reason, "strict equipment pruning left no candidates, relaxing");
                }
                continue;
            }

            let result = self.solver.solve(&model, config, stop);
            match result.status {
                SolverStatus::Feasible => return self.materialize(problem, &model, &result.solutions),
                SolverStatus::Infeasible => reason = InfeasibilityReason::Proven,
                SolverStatus::BudgetExhausted => reason = InfeasibilityReason::BudgetExhausted,
                SolverStatus::Stopped => {
                    reason = InfeasibilityReason::Stopped;
                    break;
                }
                SolverStatus::ModelInvalid => {
                    reason = InfeasibilityReason::InvalidModel;
                    break;
                }
            }
            if strict {
                warn!(%reason, "no timetable with strict equipment matching, relaxing");
            }
        }

        warn!(%reason, "initial generation infeasible");
        InitialOutcome::Infeasible { reason }
    }

    fn materialize(
        &self,
        problem: &Arc<SchedulingProblem>,
        model: &AssignmentModel,
        solutions: &[Vec<usize>],
    ) -> InitialOutcome {
        let mut found = Vec::with_capacity(solutions.len());
        let mut rejected = 0;
        for chosen in solutions {
            let assignments = chosen
                .iter()
                .zip(1..)
                .filter_map(|(&v, id)| {
                    let c = model.var(v).candidate;
                    let slot = problem.time_slot(c.time_slot_id)?;
                    Some(SchedulingAssignment::new(id, c.unit, c.teacher_id, c.classroom_id, slot))
                })
                .collect();
            let raw = SchedulingSolution::from_assignments(problem.clone(), assignments);
            let (solution, evaluation) = self.evaluator.annotate(&raw);
            if evaluation.is_feasible {
                found.push((evaluation.score, solution));
            } else {
                rejected += 1;
            }
        }
        if found.is_empty() {
            return InitialOutcome::Infeasible {
                reason: InfeasibilityReason::HardViolations { rejected },
            };
        }
        found.sort_by(|a, b| b.0.total_cmp(&a.0));
        info!(solutions = found.len(), best = found[0].0, "initial timetables found");
        InitialOutcome::Found(found.into_iter().map(|(_, s)| s).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Classroom, CourseSection, SchedulingProblem, Teacher, TimeSlot};
    use crate::testutil::campus_problem;
    use std::collections::HashSet;

    #[test]
    fn test_campus_scenario_fully_covered() {
        let p = campus_problem();
        let ev = SolutionEvaluator::default();
        let out = InitialSolutionGenerator::new(&ev).generate(&p, &SearchConfig::default(), &StopSignal::never());
        assert!(out.is_found());
        let sol = &out.solutions()[0];
        assert_eq!(sol.len(), 10);
        assert_eq!(sol.covered_sections().len(), 10);
        assert!(sol.check_invariants().is_ok());
        let e = ev.evaluate(sol);
        assert!(e.is_feasible);
        assert_eq!(e.hard_conflicts().count(), 0);
    }

    #[test]
    fn test_no_double_booking() {
        let p = campus_problem();
        let ev = SolutionEvaluator::default();
        let cfg = SearchConfig::default().with_max_solutions(3);
        let out = InitialSolutionGenerator::new(&ev).generate(&p, &cfg, &StopSignal::never());
        for sol in out.solutions() {
            let mut teacher_slots = HashSet::new();
            let mut room_slots = HashSet::new();
            for a in sol.assignments() {
                assert!(teacher_slots.insert((a.teacher_id, a.time_slot_id)));
                assert!(room_slots.insert((a.classroom_id, a.time_slot_id)));
                let section = p.section(a.section_id).expect("section");
                let room = p.classroom(a.classroom_id).expect("room");
                assert!(room.capacity >= section.enrollment);
            }
        }
    }

    #[test]
    fn test_prerequisite_sections_never_share_slot() {
        let p = campus_problem();
        let ev = SolutionEvaluator::default();
        let cfg = SearchConfig::default().with_max_solutions(3);
        let out = InitialSolutionGenerator::new(&ev).generate(&p, &cfg, &StopSignal::never());
        assert!(out.is_found());
        for sol in out.solutions() {
            let slot_of = |section| {
                sol.assignments()
                    .iter()
                    .find(|a| a.section_id == section)
                    .map(|a| a.time_slot_id)
            };
            // Sections 2 and 3 teach courses 102 and 103.
            assert_ne!(slot_of(2), slot_of(3));
        }
    }

    #[test]
    fn test_too_small_room_is_no_candidates() {
        let p = Arc::new(
            SchedulingProblem::builder()
                .section(CourseSection::new(1, 10, 100))
                .teacher(Teacher::new(1))
                .classroom(Classroom::new(1, 20))
                .time_slot(TimeSlot::new(1, 1, 480, 540))
                .build()
                .expect("valid"),
        );
        let ev = SolutionEvaluator::default();
        let out = InitialSolutionGenerator::new(&ev).generate(&p, &SearchConfig::default(), &StopSignal::never());
        assert!(matches!(
            out,
            InitialOutcome::Infeasible {
                reason: InfeasibilityReason::NoCandidates { section_id: 1, session: 0 }
            }
        ));
    }

    #[test]
    fn test_equipment_relaxed_when_strict_fails() {
        let p = Arc::new(
            SchedulingProblem::builder()
                .section(CourseSection::new(1, 10, 10).with_equipment(&["kiln"]))
                .teacher(Teacher::new(1))
                .classroom(Classroom::new(1, 20))
                .time_slot(TimeSlot::new(1, 1, 480, 540))
                .build()
                .expect("valid"),
        );
        let ev = SolutionEvaluator::default();
        let out = InitialSolutionGenerator::new(&ev).generate(&p, &SearchConfig::default(), &StopSignal::never());
        assert!(out.is_found());
        let e = ev.evaluate(&out.solutions()[0]);
        assert!(e.is_feasible);
        assert!(e.conflicts.iter().any(|c| c.constraint_id == 8));
    }

    #[test]
    fn test_overloaded_slots_proven_infeasible() {
        let p = Arc::new(
            SchedulingProblem::builder()
                .section(CourseSection::new(1, 10, 10))
                .section(CourseSection::new(2, 20, 10))
                .teacher(Teacher::new(1))
                .classroom(Classroom::new(1, 20))
                .classroom(Classroom::new(2, 20))
                .time_slot(TimeSlot::new(1, 1, 480, 540))
                .build()
                .expect("valid"),
        );
        let ev = SolutionEvaluator::default();
        let out = InitialSolutionGenerator::new(&ev).generate(&p, &SearchConfig::default(), &StopSignal::never());
        assert!(matches!(
            out,
            InitialOutcome::Infeasible {
                reason: InfeasibilityReason::Proven
            }
        ));
    }
}
