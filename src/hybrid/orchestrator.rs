//! Phase control loop over the optimization engines.

use super::analysis::{EngineKind, ProblemAnalysis};
use super::params::SchedulingParameters;
use crate::cancel::StopSignal;
use crate::error::{Result, TimetableError};
use crate::evaluator::SolutionEvaluator;
use crate::genetic::{GeneticConfig, GeneticOptimizer};
use crate::local_search::{CoolingSchedule, LocalSearchConfig, LocalSearchOptimizer};
use crate::model::{SchedulingEvaluation, SchedulingProblem, SchedulingSolution};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Control-loop settings.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Upper bound on optimization phases.
    pub max_phases: usize,
    /// A phase gaining no more than this counts as a plateau.
    pub plateau_epsilon: f64,
    /// Consecutive plateaus (across both engines) that end the run.
    pub plateau_limit: usize,
    /// Adjust engine parameters between phases.
    pub adapt: bool,
    pub local_search: LocalSearchConfig,
    pub genetic: GeneticConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_phases: 6,
            plateau_epsilon: 1e-4,
            plateau_limit: 2,
            adapt: true,
            local_search: LocalSearchConfig::default(),
            genetic: GeneticConfig::fast(),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_max_phases(mut self, n: usize) -> Self {
        self.max_phases = n;
        self
    }

    pub fn with_plateau_epsilon(mut self, eps: f64) -> Self {
        self.plateau_epsilon = eps;
        self
    }

    pub fn with_plateau_limit(mut self, n: usize) -> Self {
        self.plateau_limit = n;
        self
    }

    pub fn with_adapt(mut self, adapt: bool) -> Self {
        self.adapt = adapt;
        self
    }

    pub fn with_local_search(mut self, config: LocalSearchConfig) -> Self {
        self.local_search = config;
        self
    }

    pub fn with_genetic(mut self, config: GeneticConfig) -> Self {
        self.genetic = config;
        self
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.max_phases == 0 {
            return Err("max_phases must be at least 1".into());
        }
        if self.plateau_limit == 0 {
            return Err("plateau_limit must be at least 1".into());
        }
        if self.plateau_epsilon.is_nan() || self.plateau_epsilon < 0.0 {
            return Err("plateau_epsilon must be non-negative".into());
        }
        self.local_search.validate()?;
        self.genetic.validate()
    }
}

/// Everything one run needs, built once and passed explicitly.
#[derive(Debug)]
pub struct EngineContext<'a> {
    pub problem: Arc<SchedulingProblem>,
    pub evaluator: &'a SolutionEvaluator,
    pub params: &'a SchedulingParameters,
    pub analysis: ProblemAnalysis,
}

impl<'a> EngineContext<'a> {
    pub fn new(
        problem: Arc<SchedulingProblem>,
        evaluator: &'a SolutionEvaluator,
        params: &'a SchedulingParameters,
    ) -> Self {
        let analysis = ProblemAnalysis::analyze(&problem);
        Self {
            problem,
            evaluator,
            params,
            analysis,
        }
    }

    /// Seed for phase `n`, if the run is seeded.
    pub fn phase_seed(&self, n: usize) -> Option<u64> {
        self.params.seed.map(|s| s.wrapping_add(n as u64))
    }
}

/// Best timetable seen so far. The only state written by more than one
/// phase or trajectory.
#[derive(Debug)]
pub struct BestTracker {
    best: Mutex<(SchedulingSolution, SchedulingEvaluation)>,
}

impl BestTracker {
    pub fn new(solution: SchedulingSolution, evaluation: SchedulingEvaluation) -> Self {
        Self {
            best: Mutex::new((solution, evaluation)),
        }
    }

    /// Replaces the best if `evaluation` scores strictly higher.
    pub fn offer(&self, solution: &SchedulingSolution, evaluation: &SchedulingEvaluation) -> bool {
        let mut best = self.best.lock();
        if evaluation.score > best.1.score {
            *best = (solution.clone(), evaluation.clone());
            true
        } else {
            false
        }
    }

    pub fn score(&self) -> f64 {
        self.best.lock().1.score
    }

    pub fn snapshot(&self) -> (SchedulingSolution, SchedulingEvaluation) {
        self.best.lock().clone()
    }

    pub fn into_inner(self) -> (SchedulingSolution, SchedulingEvaluation) {
        self.best.into_inner()
    }
}

/// Statistics of one phase.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseReport {
    pub engine: EngineKind,
    pub score_before: f64,
    pub score_after: f64,
    /// Local search iterations or genetic generations.
    pub work: usize,
    pub elapsed_ms: u64,
    pub plateaued: bool,
}

/// Outcome of an orchestrated run.
#[derive(Debug, Clone)]
pub struct OrchestratorResult {
    pub best: SchedulingSolution,
    pub best_evaluation: SchedulingEvaluation,
    pub analysis: ProblemAnalysis,
    pub phases: Vec<PhaseReport>,
    pub cancelled: bool,
}

impl OrchestratorResult {
    pub fn engine_switches(&self) -> usize {
        self.phases.windows(2).filter(|w| w[0].engine != w[1].engine).count()
    }
}

/// Runs local search and genetic phases, switching engines on plateaus
/// and adapting their parameters between phases.
pub struct HybridOrchestrator<'a> {
    ctx: &'a EngineContext<'a>,
    config: OrchestratorConfig,
}

impl<'a> HybridOrchestrator<'a> {
    pub fn new(ctx: &'a EngineContext<'a>, config: OrchestratorConfig) -> Result<Self> {
        config.validate().map_err(TimetableError::Config)?;
        Ok(Self { ctx, config })
    }

    /// Improves `start` until the phase budget, the time budget or the
    /// stop signal runs out. Never returns a timetable scoring below
    /// `start`.
    #[tracing::instrument(skip_all, fields(difficulty = ?self.ctx.analysis.difficulty))]
    pub fn run(&self, start: &SchedulingSolution, stop: &StopSignal) -> OrchestratorResult {
        let ctx = self.ctx;
        let stop = stop.child(Some(Duration::from_millis(ctx.params.time_budget_ms)));
        let (annotated, evaluation) = ctx.evaluator.annotate(start);
        let tracker = BestTracker::new(annotated, evaluation);

        let mut ls_config = self.config.local_search.clone().with_max_iterations(ctx.params.max_iterations);
        let mut ga_config = self.config.genetic.clone();
        let mut engine = ctx.analysis.first_engine();
        let mut phases = Vec::new();
        let mut plateaus = 0usize;

        info!(?engine, start = tracker.score(), "hybrid optimization started");

        for n in 0..self.config.max_phases {
            if stop.should_stop() {
                break;
            }
            let budget = stop
                .remaining()
                .map(|r| r.mul_f64(ctx.analysis.phase_share()));
            let phase_stop = stop.child(budget);
            let (current, _) = tracker.snapshot();
            let before = tracker.score();
            let t0 = Instant::now();

            let work = match engine {
                EngineKind::LocalSearch => {
                    let mut config = ls_config.clone();
                    config.seed = ctx.phase_seed(n);
                    match LocalSearchOptimizer::new(ctx.evaluator, config) {
                        Ok(opt) => {
                            let r = opt.run(&current, &phase_stop);
                            tracker.offer(&r.best, &r.best_evaluation);
                            r.iterations
                        }
                        Err(e) => {
                            warn!(error = %e, "local search config rejected");
                            0
                        }
                    }
                }
                EngineKind::Genetic => {
                    let mut config = ga_config.clone();
                    config.seed = ctx.phase_seed(n);
                    match GeneticOptimizer::new(ctx.evaluator, config) {
                        Ok(opt) => {
                            let r = opt.run(&current, &phase_stop);
                            tracker.offer(&r.best.solution, &r.best.evaluation);
                            r.generations
                        }
                        Err(e) => {
                            warn!(error = %e, "genetic config rejected");
                            0
                        }
                    }
                }
            };

            let after = tracker.score();
            let plateaued = after - before <= self.config.plateau_epsilon;
            let report = PhaseReport {
                engine,
                score_before: before,
                score_after: after,
                work,
                elapsed_ms: t0.elapsed().as_millis() as u64,
                plateaued,
            };
            debug!(phase = n, ?report, "phase finished");
            phases.push(report);

            if plateaued {
                plateaus += 1;
                if self.config.adapt {
                    adapt_on_plateau(engine, &mut ls_config, &mut ga_config);
                }
                if plateaus >= self.config.plateau_limit {
                    warn!(phases = n + 1, "score plateaued on both engines, stopping");
                    break;
                }
                let next = engine.other();
                info!(from = ?engine, to = ?next, "switching engine");
                engine = next;
            } else {
                plateaus = 0;
                if self.config.adapt {
                    adapt_on_progress(engine, &mut ls_config);
                }
            }
        }

        let cancelled = stop.is_cancelled();
        let (best, best_evaluation) = tracker.into_inner();
        info!(
            best = best_evaluation.score,
            phases = phases.len(),
            cancelled,
            "hybrid optimization finished"
        );
        OrchestratorResult {
            best,
            best_evaluation,
            analysis: ctx.analysis.clone(),
            phases,
            cancelled,
        }
    }
}

/// Slower cooling and less focused moves for local search; a larger and
/// more mutated population for genetic search.
fn adapt_on_plateau(engine: EngineKind, ls: &mut LocalSearchConfig, ga: &mut GeneticConfig) {
    match engine {
        EngineKind::LocalSearch => {
            let alpha = match ls.cooling {
                CoolingSchedule::Geometric { alpha } | CoolingSchedule::Adaptive { alpha, .. } => alpha,
                _ => 0.95,
            };
            ls.cooling = ls.cooling.with_alpha(alpha.sqrt().min(0.995));
            ls.intelligent_bias = (ls.intelligent_bias - 0.2).max(0.3);
        }
        EngineKind::Genetic => {
            ga.population_size = (ga.population_size * 3 / 2).min(120);
            ga.mutation_rate = (ga.mutation_rate + 0.1).min(0.5);
        }
    }
}

/// More focused moves while local search keeps improving.
fn adapt_on_progress(engine: EngineKind, ls: &mut LocalSearchConfig) {
    if engine == EngineKind::LocalSearch {
        ls.intelligent_bias = (ls.intelligent_bias + 0.1).min(0.9);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::campus_start;
    use std::sync::atomic::AtomicBool;

    fn quick() -> OrchestratorConfig {
        OrchestratorConfig::default()
            .with_local_search(LocalSearchConfig::default().with_no_improvement_limit(50))
            .with_genetic(GeneticConfig::fast().with_population_size(6).with_max_generations(5))
    }

    #[test]
    fn test_never_below_start() {
        let ev = SolutionEvaluator::default();
        let start = campus_start(&ev);
        let params = SchedulingParameters::default().with_max_iterations(200).with_seed(7);
        let ctx = EngineContext::new(start.problem_arc().clone(), &ev, &params);
        let result = HybridOrchestrator::new(&ctx, quick()).expect("valid").run(&start, &StopSignal::never());
        assert!(result.best_evaluation.score >= ev.score(&start));
        assert!(result.best_evaluation.is_feasible);
        assert!(!result.phases.is_empty());
        assert_eq!(result.phases[0].engine, EngineKind::LocalSearch);
        for p in &result.phases {
            assert!(p.score_after >= p.score_before);
        }
    }

    #[test]
    fn test_switches_engine_on_plateau() {
        let ev = SolutionEvaluator::default();
        let start = campus_start(&ev);
        let params = SchedulingParameters::default().with_seed(1);
        let ctx = EngineContext::new(start.problem_arc().clone(), &ev, &params);
        // An impossible gain threshold turns every phase into a plateau.
        let config = quick().with_plateau_epsilon(10.0).with_plateau_limit(2);
        let result = HybridOrchestrator::new(&ctx, config).expect("valid").run(&start, &StopSignal::never());
        assert_eq!(result.phases.len(), 2);
        assert_eq!(result.engine_switches(), 1);
        assert_eq!(result.phases[1].engine, EngineKind::Genetic);
    }

    #[test]
    fn test_cancelled_run_returns_start() {
        let ev = SolutionEvaluator::default();
        let start = campus_start(&ev);
        let params = SchedulingParameters::default();
        let ctx = EngineContext::new(start.problem_arc().clone(), &ev, &params);
        let stop = StopSignal::from_flag(Arc::new(AtomicBool::new(true)));
        let result = HybridOrchestrator::new(&ctx, quick()).expect("valid").run(&start, &stop);
        assert!(result.cancelled);
        assert!(result.phases.is_empty());
        assert!(result.best.same_assignments(&start));
    }

    #[test]
    fn test_tracker_keeps_strictly_better() {
        let ev = SolutionEvaluator::default();
        let start = campus_start(&ev);
        let (sol, eval) = ev.annotate(&start);
        let tracker = BestTracker::new(sol.clone(), eval.clone());
        assert!(!tracker.offer(&sol, &eval));
        let mut better = eval.clone();
        better.score += 0.1;
        assert!(tracker.offer(&sol, &better));
        assert!((tracker.score() - better.score).abs() < 1e-12);
    }

    #[test]
    fn test_plateau_adaptation() {
        let mut ls = LocalSearchConfig::default();
        let mut ga = GeneticConfig::fast();
        adapt_on_plateau(EngineKind::LocalSearch, &mut ls, &mut ga);
        assert_eq!(ls.cooling, CoolingSchedule::Geometric { alpha: 0.95f64.sqrt() });
        assert!((ls.intelligent_bias - 0.5).abs() < 1e-12);
        adapt_on_plateau(EngineKind::Genetic, &mut ls, &mut ga);
        assert_eq!(ga.population_size, 24);
        assert!((ga.mutation_rate - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_config_validation() {
        assert!(OrchestratorConfig::default().validate().is_ok());
        assert!(OrchestratorConfig::default().with_max_phases(0).validate().is_err());
    }
}
