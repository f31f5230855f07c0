//! High-level entry point.
//!
//! [`TimetableEngine`] owns a validated problem and runs the full pipeline:
//! initial generation, hybrid optimization over several trajectories,
//! evaluation and conflict resolution of the final candidates.

use crate::cancel::StopSignal;
use crate::conflict::{ConflictResolver, ResolutionOption};
use crate::diversify::diversify_with_rules;
use crate::error::{Result, TimetableError};
use crate::evaluator::SolutionEvaluator;
use crate::hybrid::{BestTracker, EngineContext, HybridOrchestrator, OrchestratorConfig, SchedulingParameters};
use crate::initial::{InfeasibilityReason, InitialOutcome, InitialSolutionGenerator, SearchConfig};
use crate::model::{validate_problem, SchedulingEvaluation, SchedulingProblem, SchedulingSolution};
use crate::placement::PlacementRules;
use rand::rngs::StdRng;
use rand::SeedableRng;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Share of the run budget the initial search may use.
const INITIAL_SHARE: f64 = 0.25;

/// Seed stride between parallel trajectories.
const TRAJECTORY_STRIDE: u64 = 1_000;

/// A final timetable with its evaluation and suggested fixes.
#[derive(Debug, Clone)]
pub struct RankedSolution {
    pub solution: SchedulingSolution,
    pub evaluation: SchedulingEvaluation,
    pub resolutions: Vec<ResolutionOption>,
}

/// Aggregate figures for one solve.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RunSummary {
    pub count: usize,
    pub feasible: usize,
    pub best: f64,
    pub average: f64,
    pub elapsed_ms: u64,
}

impl RunSummary {
    fn from_ranked(ranked: &[RankedSolution], elapsed: Duration) -> Self {
        let count = ranked.len();
        let best = ranked.first().map_or(0.0, |r| r.evaluation.score);
        let average = if count == 0 {
            0.0
        } else {
            ranked.iter().map(|r| r.evaluation.score).sum::<f64>() / count as f64
        };
        Self {
            count,
            feasible: ranked.iter().filter(|r| r.evaluation.is_feasible).count(),
            best,
            average,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }
}

/// Result of [`TimetableEngine::solve`].
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    /// Best score first, no two with identical assignments.
    pub ranked: Vec<RankedSolution>,
    pub summary: RunSummary,
    /// Set when no initial timetable exists.
    pub infeasible: Option<InfeasibilityReason>,
    pub cancelled: bool,
}

impl SolveOutcome {
    pub fn best(&self) -> Option<&RankedSolution> {
        self.ranked.first()
    }
}

/// Timetabling engine bound to one problem.
///
/// # Examples
///
/// ```
/// use u_timetable::cancel::StopSignal;
/// use u_timetable::engine::TimetableEngine;
/// use u_timetable::hybrid::SchedulingParameters;
/// use u_timetable::model::{Classroom, CourseSection, SchedulingProblem, Teacher, TimeSlot};
///
/// let problem = SchedulingProblem::builder()
///     .section(CourseSection::new(1, 10, 20))
///     .section(CourseSection::new(2, 11, 25))
///     .teacher(Teacher::new(1))
///     .teacher(Teacher::new(2))
///     .classroom(Classroom::new(1, 30))
///     .time_slot(TimeSlot::new(1, 1, 540, 600))
///     .time_slot(TimeSlot::new(2, 1, 600, 660))
///     .build()
///     .unwrap();
///
/// let engine = TimetableEngine::new(problem).unwrap();
/// let params = SchedulingParameters::default()
///     .with_solution_count(1)
///     .with_max_iterations(50)
///     .with_time_budget_ms(2_000)
///     .with_seed(7);
/// let outcome = engine.solve(&params, &StopSignal::never()).unwrap();
/// let best = outcome.best().unwrap();
/// assert!(best.evaluation.is_feasible);
/// assert_eq!(best.solution.len(), 2);
/// ```
#[derive(Debug)]
pub struct TimetableEngine {
    problem: Arc<SchedulingProblem>,
    evaluator: SolutionEvaluator,
    search: SearchConfig,
    orchestrator: OrchestratorConfig,
}

impl TimetableEngine {
    /// Validates `problem` and binds an engine with default settings.
    pub fn new(problem: impl Into<Arc<SchedulingProblem>>) -> Result<Self> {
        let problem = problem.into();
        validate_problem(&problem).map_err(TimetableError::Validation)?;
        Ok(Self {
            problem,
            evaluator: SolutionEvaluator::default(),
            search: SearchConfig::default(),
            orchestrator: OrchestratorConfig::default(),
        })
    }

    /// Evaluator for every operation. Per-run [`SchedulingParameters`]
    /// are applied to a copy of it.
    pub fn with_evaluator(mut self, evaluator: SolutionEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_search_config(mut self, config: SearchConfig) -> Self {
        self.search = config;
        self
    }

    pub fn with_orchestrator_config(mut self, config: OrchestratorConfig) -> Self {
        self.orchestrator = config;
        self
    }

    pub fn problem(&self) -> &Arc<SchedulingProblem> {
        &self.problem
    }

    pub fn evaluator(&self) -> &SolutionEvaluator {
        &self.evaluator
    }

    /// The engine's evaluator with `params` applied on top.
    fn evaluator_for(&self, params: &SchedulingParameters) -> Result<SolutionEvaluator> {
        params.validate()?;
        let mut evaluator = self.evaluator.clone();
        if let Some(policy) = params.score_policy {
            evaluator = evaluator.with_policy(policy);
        }
        params.configure(evaluator.manager_mut())?;
        Ok(evaluator)
    }

    fn search_config(&self, params: &SchedulingParameters, count: usize) -> SearchConfig {
        let mut config = self.search.clone().with_max_solutions(count);
        if let Some(seed) = params.seed {
            config = config.with_seed(seed);
        }
        let share = (params.time_budget_ms as f64 * INITIAL_SHARE) as u64;
        let limit = config.time_limit_ms.map_or(share, |ms| ms.min(share));
        config.with_time_limit_ms(limit.max(1))
    }

    /// Searches for up to `params.solution_count` feasible timetables.
    ///
    /// # Errors
    ///
    /// Invalid parameters. Infeasibility is reported through the outcome.
    pub fn generate_initial_solution(
        &self,
        params: &SchedulingParameters,
        stop: &StopSignal,
    ) -> Result<InitialOutcome> {
        let evaluator = self.evaluator_for(params)?;
        let config = self.search_config(params, params.solution_count);
        let outcome = InitialSolutionGenerator::new(&evaluator).generate(&self.problem, &config, stop);
        if let InitialOutcome::Infeasible { reason } = &outcome {
            warn!(%reason, "no initial timetable");
        }
        Ok(outcome)
    }

    /// Runs the hybrid orchestrator from `solution`. The result never
    /// scores below `solution`.
    pub fn optimize(
        &self,
        solution: &SchedulingSolution,
        params: &SchedulingParameters,
        stop: &StopSignal,
    ) -> Result<SchedulingSolution> {
        let evaluator = self.evaluator_for(params)?;
        let ctx = EngineContext::new(self.problem.clone(), &evaluator, params);
        let orchestrator = HybridOrchestrator::new(&ctx, self.orchestrator.clone())?;
        Ok(orchestrator.run(solution, stop).best)
    }

    pub fn evaluate(&self, solution: &SchedulingSolution) -> SchedulingEvaluation {
        self.evaluator.evaluate(solution)
    }

    /// Ranked options for the conflicts in `evaluation`. Nothing is applied.
    pub fn resolve_conflicts(
        &self,
        solution: &SchedulingSolution,
        evaluation: &SchedulingEvaluation,
    ) -> Vec<ResolutionOption> {
        ConflictResolver::new(&self.evaluator).resolve(solution, evaluation)
    }

    /// Perturbed copy of `solution` that keeps the hard constraints active
    /// in the engine's evaluator. See [`crate::diversify::diversify`].
    pub fn diversify(&self, solution: &SchedulingSolution, factor: f64) -> Result<SchedulingSolution> {
        let rules = PlacementRules::from_manager(self.evaluator.manager());
        let mut rng = StdRng::seed_from_u64(rand::random());
        diversify_with_rules(solution, factor, &rules, &mut rng)
    }

    /// Full pipeline: initial generation, one optimization trajectory per
    /// wanted timetable, then ranking and conflict resolution.
    ///
    /// # Errors
    ///
    /// Invalid parameters, or a produced timetable that breaks a
    /// structural invariant.
    #[tracing::instrument(skip_all, fields(units = self.problem.unit_count(), wanted = params.solution_count))]
    pub fn solve(&self, params: &SchedulingParameters, stop: &StopSignal) -> Result<SolveOutcome> {
        let started = Instant::now();
        let evaluator = self.evaluator_for(params)?;
        let stop = stop.child(Some(Duration::from_millis(params.time_budget_ms)));
        info!("solve started");

        let config = self.search_config(params, params.solution_count);
        let outcome = InitialSolutionGenerator::new(&evaluator).generate(&self.problem, &config, &stop);
        let mut starts = match outcome {
            InitialOutcome::Found(list) if !list.is_empty() => list,
            InitialOutcome::Found(_) => {
                return Ok(self.infeasible(InfeasibilityReason::Proven, started, &stop));
            }
            InitialOutcome::Infeasible { reason } => {
                warn!(%reason, "solve found no initial timetable");
                return Ok(self.infeasible(reason, started, &stop));
            }
        };

        // Too few distinct initial timetables: derive the rest by
        // perturbing the best one.
        let mut rng = StdRng::seed_from_u64(params.seed.unwrap_or_else(rand::random));
        let rules = PlacementRules::from_manager(evaluator.manager());
        while starts.len() < params.solution_count {
            let derived = diversify_with_rules(&starts[0], params.diversity_factor, &rules, &mut rng)?;
            starts.push(derived);
        }
        debug!(trajectories = starts.len(), "initial timetables ready");

        let (first, first_eval) = evaluator.annotate(&starts[0]);
        let tracker = BestTracker::new(first, first_eval);
        let finished = self.run_trajectories(&evaluator, params, &starts, &stop, &tracker);

        let resolver = ConflictResolver::new(&evaluator);
        let mut ranked: Vec<RankedSolution> = Vec::with_capacity(finished.len());
        for (solution, evaluation) in finished {
            solution.check_invariants()?;
            if ranked.iter().any(|r| r.solution.same_assignments(&solution)) {
                continue;
            }
            let resolutions = resolver.resolve(&solution, &evaluation);
            ranked.push(RankedSolution {
                solution,
                evaluation,
                resolutions,
            });
        }
        ranked.sort_by(|a, b| b.evaluation.score.total_cmp(&a.evaluation.score));

        let summary = RunSummary::from_ranked(&ranked, started.elapsed());
        info!(
            count = summary.count,
            best = summary.best,
            average = summary.average,
            tracked = tracker.score(),
            elapsed_ms = summary.elapsed_ms,
            "solve finished"
        );
        Ok(SolveOutcome {
            ranked,
            summary,
            infeasible: None,
            cancelled: stop.is_cancelled(),
        })
    }

    fn infeasible(&self, reason: InfeasibilityReason, started: Instant, stop: &StopSignal) -> SolveOutcome {
        SolveOutcome {
            ranked: Vec::new(),
            summary: RunSummary::from_ranked(&[], started.elapsed()),
            infeasible: Some(reason),
            cancelled: stop.is_cancelled(),
        }
    }

    /// One orchestrator run per start. Each trajectory gets its own seed;
    /// the tracker sees every result.
    fn run_trajectories(
        &self,
        evaluator: &SolutionEvaluator,
        params: &SchedulingParameters,
        starts: &[SchedulingSolution],
        stop: &StopSignal,
        tracker: &BestTracker,
    ) -> Vec<(SchedulingSolution, SchedulingEvaluation)> {
        let parallel = cfg!(feature = "parallel") && starts.len() > 1;
        let remaining_ms = stop
            .remaining()
            .map_or(params.time_budget_ms, |r| r.as_millis() as u64);
        // Sequential trajectories share the budget.
        let budget_ms = if parallel {
            remaining_ms
        } else {
            remaining_ms / starts.len().max(1) as u64
        }
        .max(1);

        let run = |(k, start): (usize, &SchedulingSolution)| {
            let mut local = params.clone().with_time_budget_ms(budget_ms);
            local.seed = params
                .seed
                .map(|s| s.wrapping_add(k as u64 * TRAJECTORY_STRIDE));
            let ctx = EngineContext::new(self.problem.clone(), evaluator, &local);
            let result = match HybridOrchestrator::new(&ctx, self.orchestrator.clone()) {
                Ok(orchestrator) => {
                    let r = orchestrator.run(start, stop);
                    debug!(trajectory = k, score = r.best_evaluation.score, phases = r.phases.len(), "trajectory done");
                    (r.best, r.best_evaluation)
                }
                Err(e) => {
                    warn!(trajectory = k, error = %e, "orchestrator config rejected");
                    evaluator.annotate(start)
                }
            };
            tracker.offer(&result.0, &result.1);
            result
        };

        #[cfg(feature = "parallel")]
        {
            if parallel {
                return starts.par_iter().enumerate().map(run).collect();
            }
        }
        starts.iter().enumerate().map(run).collect()
    }
}
