//! Simulated-annealing loop over timetables.

use super::config::{CoolingSchedule, LocalSearchConfig};
use super::generator::MoveGenerator;
use crate::cancel::StopSignal;
use crate::error::{Result, TimetableError};
use crate::evaluator::SolutionEvaluator;
use crate::model::{SchedulingEvaluation, SchedulingSolution};
use crate::placement::PlacementRules;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

/// Improvements smaller than this do not reset the stagnation counter.
const IMPROVEMENT_EPS: f64 = 1e-9;

/// Result of a local search run.
#[derive(Debug, Clone)]
pub struct LocalSearchResult {
    /// Best timetable found, with assignment scores filled in.
    pub best: SchedulingSolution,

    pub best_evaluation: SchedulingEvaluation,

    pub best_score: f64,

    /// Candidate moves evaluated.
    pub iterations: usize,

    pub final_temperature: f64,

    /// Accepted moves, improving ones included.
    pub accepted_moves: usize,

    pub improving_moves: usize,

    /// Stopped by the stop signal.
    pub cancelled: bool,

    /// Stopped by the no-improvement limit.
    pub stagnated: bool,

    /// Best score sampled at regular intervals.
    pub score_history: Vec<f64>,
}

/// Simulated annealing over feasibility-preserving moves. Scores are
/// maximized; a worse candidate is accepted with probability
/// `exp(-(current - candidate) / T)`.
pub struct LocalSearchOptimizer<'a> {
    evaluator: &'a SolutionEvaluator,
    config: LocalSearchConfig,
}

impl<'a> LocalSearchOptimizer<'a> {
    pub fn new(evaluator: &'a SolutionEvaluator, config: LocalSearchConfig) -> Result<Self> {
        config.validate().map_err(TimetableError::Config)?;
        Ok(Self { evaluator, config })
    }

    pub fn config(&self) -> &LocalSearchConfig {
        &self.config
    }

    /// Improves `start`. The returned best never scores below `start`.
    #[tracing::instrument(skip_all, fields(assignments = start.len()))]
    pub fn run(&self, start: &SchedulingSolution, stop: &StopSignal) -> LocalSearchResult {
        let config = &self.config;
        let mut rng = StdRng::seed_from_u64(config.seed.unwrap_or_else(rand::random));
        let moves = MoveGenerator::new(config.intelligent, config.intelligent_bias)
            .with_rules(PlacementRules::from_manager(self.evaluator.manager()));

        let (mut current, mut current_eval) = self.evaluator.annotate(start);
        let mut best = current.clone();
        let mut best_eval = current_eval.clone();

        let mut temperature = config.initial_temperature;
        let mut iterations = 0usize;
        let mut accepted_moves = 0usize;
        let mut improving_moves = 0usize;
        let mut since_best = 0usize;
        let mut cancelled = false;
        let mut stagnated = false;
        let mut exhausted = false;

        let linear_steps = linear_steps(config);
        let history_interval = 100.max(config.iterations_per_temperature);
        let mut score_history = vec![best_eval.score];
        let mut step = 0usize;

        'outer: while temperature > config.min_temperature {
            let inner = match config.cooling {
                CoolingSchedule::LundyMees { .. } => 1,
                _ => config.iterations_per_temperature,
            };
            let mut level_accepted = 0usize;
            let mut level_tried = 0usize;

            for _ in 0..inner {
                if stop.should_stop() {
                    cancelled = true;
                    break 'outer;
                }
                if config.max_iterations > 0 && iterations >= config.max_iterations {
                    exhausted = true;
                    break 'outer;
                }

                let Some(candidate) = moves
                    .propose(&current, Some(&current_eval), &mut rng)
                    .and_then(|m| m.apply(&current))
                else {
                    debug!("no feasible move left");
                    break 'outer;
                };
                let (candidate, candidate_eval) = self.evaluator.annotate(&candidate);
                iterations += 1;
                level_tried += 1;

                let delta = candidate_eval.score - current_eval.score;
                let accept = if delta > 0.0 {
                    improving_moves += 1;
                    true
                } else {
                    rng.random_range(0.0..1.0) < (delta / temperature).exp()
                };

                if accept {
                    current = candidate;
                    current_eval = candidate_eval;
                    accepted_moves += 1;
                    level_accepted += 1;
                }

                if current_eval.score > best_eval.score + IMPROVEMENT_EPS {
                    best = current.clone();
                    best_eval = current_eval.clone();
                    since_best = 0;
                } else {
                    since_best += 1;
                }

                if iterations.is_multiple_of(history_interval) {
                    score_history.push(best_eval.score);
                }

                if config.no_improvement_limit > 0 && since_best >= config.no_improvement_limit {
                    stagnated = true;
                    break 'outer;
                }
            }

            let acceptance = if level_tried == 0 {
                0.0
            } else {
                level_accepted as f64 / level_tried as f64
            };
            trace!(temperature, acceptance, best = best_eval.score, "temperature level done");
            temperature = cool(temperature, config, step, linear_steps, acceptance);
            step += 1;
        }

        if score_history
            .last()
            .is_none_or(|&last| (last - best_eval.score).abs() > 1e-15)
        {
            score_history.push(best_eval.score);
        }

        debug!(
            iterations,
            accepted_moves,
            improving_moves,
            best = best_eval.score,
            cancelled,
            stagnated,
            exhausted,
            "local search finished"
        );

        LocalSearchResult {
            best_score: best_eval.score,
            best,
            best_evaluation: best_eval,
            iterations,
            final_temperature: temperature,
            accepted_moves,
            improving_moves,
            cancelled,
            stagnated,
            score_history,
        }
    }
}

/// Next temperature under the configured schedule.
fn cool(temperature: f64, config: &LocalSearchConfig, step: usize, linear_steps: usize, acceptance: f64) -> f64 {
    match config.cooling {
        CoolingSchedule::Geometric { alpha } => temperature * alpha,
        CoolingSchedule::Linear => {
            let t = config.initial_temperature
                - (step + 1) as f64 * (config.initial_temperature - config.min_temperature)
                    / linear_steps as f64;
            t.max(config.min_temperature)
        }
        CoolingSchedule::LundyMees { beta } => temperature / (1.0 + beta * temperature),
        CoolingSchedule::Adaptive {
            alpha,
            target_acceptance,
        } => {
            let factor = if acceptance > target_acceptance {
                alpha * alpha
            } else if acceptance < target_acceptance / 2.0 {
                alpha.sqrt()
            } else {
                alpha
            };
            temperature * factor
        }
    }
}

/// Temperature levels for linear cooling.
fn linear_steps(config: &LocalSearchConfig) -> usize {
    if config.max_iterations > 0 {
        (config.max_iterations / config.iterations_per_temperature).max(1)
    } else {
        1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{campus_start, disliked_start};
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    #[test]
    fn test_never_worse_than_start() {
        let ev = SolutionEvaluator::default();
        let start = campus_start(&ev);
        let start_score = ev.score(&start);
        let config = LocalSearchConfig::default()
            .with_max_iterations(150)
            .with_no_improvement_limit(0)
            .with_min_temperature(1e-9)
            .with_seed(42);
        let result = LocalSearchOptimizer::new(&ev, config).expect("valid").run(&start, &StopSignal::never());
        assert!(result.iterations >= 100, "only {} iterations", result.iterations);
        assert!(result.best_score >= start_score);
        assert!(result.best_evaluation.is_feasible);
        assert_eq!(result.best.covered_sections().len(), 10);
        assert!(result.best.check_invariants().is_ok());
    }

    #[test]
    fn test_escapes_disliked_slot() {
        let ev = SolutionEvaluator::default();
        let start = disliked_start();
        let start_score = ev.score(&start);
        let config = LocalSearchConfig::default()
            .with_max_iterations(150)
            .with_no_improvement_limit(0)
            .with_seed(42);
        let result = LocalSearchOptimizer::new(&ev, config).expect("valid").run(&start, &StopSignal::never());
        assert!(
            result.best_score > start_score,
            "best {} not above start {start_score}",
            result.best_score
        );
        assert_eq!(result.best.assignments()[0].time_slot_id, 3);
        assert!(result.improving_moves > 0);
    }

    #[test]
    fn test_history_non_decreasing() {
        let ev = SolutionEvaluator::default();
        let start = campus_start(&ev);
        let config = LocalSearchConfig::default()
            .with_max_iterations(300)
            .with_iterations_per_temperature(10)
            .with_seed(1);
        let result = LocalSearchOptimizer::new(&ev, config).expect("valid").run(&start, &StopSignal::never());
        for w in result.score_history.windows(2) {
            assert!(w[1] >= w[0] - 1e-12);
        }
    }

    #[test]
    fn test_cancellation_returns_start() {
        let ev = SolutionEvaluator::default();
        let start = campus_start(&ev);
        let stop = StopSignal::from_flag(Arc::new(AtomicBool::new(true)));
        let result = LocalSearchOptimizer::new(&ev, LocalSearchConfig::default().with_seed(3))
            .expect("valid")
            .run(&start, &stop);
        assert!(result.cancelled);
        assert_eq!(result.iterations, 0);
        assert!(result.best.same_assignments(&start));
    }

    #[test]
    fn test_stagnation_stops_early() {
        let ev = SolutionEvaluator::default();
        let start = campus_start(&ev);
        let config = LocalSearchConfig::default()
            .with_max_iterations(0)
            .with_no_improvement_limit(5)
            .with_min_temperature(1e-12)
            .with_cooling(CoolingSchedule::Geometric { alpha: 0.999 })
            .with_seed(9);
        let result = LocalSearchOptimizer::new(&ev, config).expect("valid").run(&start, &StopSignal::never());
        assert!(result.stagnated);
    }

    #[test]
    fn test_adaptive_cooling_reacts_to_acceptance() {
        let config = LocalSearchConfig::default().with_cooling(CoolingSchedule::Adaptive {
            alpha: 0.9,
            target_acceptance: 0.4,
        });
        let hot = cool(1.0, &config, 0, 1, 0.9);
        let cold = cool(1.0, &config, 0, 1, 0.1);
        let mid = cool(1.0, &config, 0, 1, 0.3);
        assert!((hot - 0.81).abs() < 1e-12);
        assert!((cold - 0.9f64.sqrt()).abs() < 1e-12);
        assert!((mid - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let ev = SolutionEvaluator::default();
        let bad = LocalSearchConfig::default().with_initial_temperature(0.0);
        assert!(matches!(LocalSearchOptimizer::new(&ev, bad), Err(TimetableError::Config(_))));
    }
}
