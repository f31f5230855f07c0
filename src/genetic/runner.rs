//! Evolutionary loop over timetables.
//!
//! [`GeneticOptimizer`] seeds a population from diversified copies of a
//! feasible timetable, then repeats selection, crossover, mutation and
//! evaluation until a budget, plateau or stop signal ends the run.

use super::config::GeneticConfig;
use super::operators::{mutate, uniform_crossover};
use crate::cancel::StopSignal;
use crate::diversify::diversify_with_rules;
use crate::error::{Result, TimetableError};
use crate::evaluator::SolutionEvaluator;
use crate::local_search::MoveGenerator;
use crate::model::{SchedulingEvaluation, SchedulingSolution};
use crate::placement::PlacementRules;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use std::time::Duration;
use tracing::{debug, trace};

/// An evaluated timetable.
#[derive(Debug, Clone)]
pub struct Individual {
    pub solution: SchedulingSolution,
    pub evaluation: SchedulingEvaluation,
}

impl Individual {
    pub fn fitness(&self) -> f64 {
        self.evaluation.score
    }
}

/// Result of a genetic search run.
#[derive(Debug, Clone)]
pub struct GeneticResult {
    /// Best individual of the whole run.
    pub best: Individual,

    pub best_score: f64,

    pub generations: usize,

    pub stagnated: bool,

    pub cancelled: bool,

    /// Crossovers whose clashes could not be repaired.
    pub rejected_children: usize,

    /// Best score at the end of each generation.
    pub fitness_history: Vec<f64>,
}

/// Genetic search over feasible timetables. Fitness is the evaluator
/// score, maximized.
pub struct GeneticOptimizer<'a> {
    evaluator: &'a SolutionEvaluator,
    config: GeneticConfig,
}

impl<'a> GeneticOptimizer<'a> {
    pub fn new(evaluator: &'a SolutionEvaluator, config: GeneticConfig) -> Result<Self> {
        config.validate().map_err(TimetableError::Config)?;
        Ok(Self { evaluator, config })
    }

    pub fn config(&self) -> &GeneticConfig {
        &self.config
    }

    /// Evolves a population seeded from `start`. The best individual
    /// never scores below `start`.
    #[tracing::instrument(skip_all, fields(population = self.config.population_size))]
    pub fn run(&self, start: &SchedulingSolution, stop: &StopSignal) -> GeneticResult {
        let config = &self.config;
        let stop = stop.child(config.time_limit_ms.map(Duration::from_millis));
        let mut rng = StdRng::seed_from_u64(config.seed.unwrap_or_else(rand::random));
        let rules = PlacementRules::from_manager(self.evaluator.manager());
        let moves = MoveGenerator::new(false, 0.0).with_rules(rules);

        // The unperturbed start is always part of the first generation.
        let mut seeds = Vec::with_capacity(config.population_size);
        seeds.push(start.clone());
        while seeds.len() < config.population_size {
            let seeded = diversify_with_rules(start, config.seed_diversity, &rules, &mut rng)
                .unwrap_or_else(|_| start.clone());
            seeds.push(seeded);
        }
        let mut population = self.evaluate_all(seeds);
        sort_best_first(&mut population);

        let mut best = population[0].clone();
        let mut fitness_history = Vec::with_capacity(config.max_generations + 1);
        fitness_history.push(best.fitness());

        let elite_count = config.elite_count();
        let mut stagnation = 0usize;
        let mut generations = 0usize;
        let mut rejected_children = 0usize;
        let mut cancelled = false;
        let mut stagnated = false;

        while generations < config.max_generations {
            if stop.should_stop() {
                cancelled = true;
                break;
            }

            let fitness: Vec<f64> = population.iter().map(Individual::fitness).collect();
            let mut offspring = Vec::with_capacity(config.population_size - elite_count);
            while offspring.len() < config.population_size - elite_count {
                let (Some(i), Some(j)) = (
                    config.selection.select(&fitness, &mut rng),
                    config.selection.select(&fitness, &mut rng),
                ) else {
                    break;
                };
                let left = &population[i].solution;
                let right = &population[j].solution;

                let mut child = if rng.random_bool(config.crossover_rate) {
                    match uniform_crossover(left, right, &rules, &mut rng) {
                        Some(c) => c,
                        None => {
                            rejected_children += 1;
                            left.clone()
                        }
                    }
                } else {
                    left.clone()
                };
                if rng.random_bool(config.mutation_rate) {
                    child = mutate(&child, &moves, &mut rng);
                }
                offspring.push(child);
            }

            let mut next_gen: Vec<Individual> = population.drain(..elite_count).collect();
            next_gen.extend(self.evaluate_all(offspring));
            sort_best_first(&mut next_gen);
            population = next_gen;
            generations += 1;

            let gen_best = &population[0];
            let gain = gen_best.fitness() - best.fitness();
            if gain > 0.0 {
                best = gen_best.clone();
            }
            if gain > config.convergence_threshold {
                stagnation = 0;
            } else {
                stagnation += 1;
            }
            fitness_history.push(best.fitness());
            trace!(generation = generations, best = best.fitness(), "generation done");

            if config.stagnation_limit > 0 && stagnation >= config.stagnation_limit {
                stagnated = true;
                break;
            }
        }

        debug!(
            generations,
            best = best.fitness(),
            rejected_children,
            stagnated,
            cancelled,
            "genetic search finished"
        );

        GeneticResult {
            best_score: best.fitness(),
            best,
            generations,
            stagnated,
            cancelled,
            rejected_children,
            fitness_history,
        }
    }

    fn evaluate_all(&self, solutions: Vec<SchedulingSolution>) -> Vec<Individual> {
        let eval = |s: SchedulingSolution| {
            let (solution, evaluation) = self.evaluator.annotate(&s);
            Individual {
                solution,
                evaluation,
            }
        };
        #[cfg(feature = "parallel")]
        {
            if self.config.parallel {
                return solutions.into_par_iter().map(eval).collect();
            }
        }
        solutions.into_iter().map(eval).collect()
    }
}

fn sort_best_first(population: &mut [Individual]) {
    population.sort_by(|a, b| b.fitness().total_cmp(&a.fitness()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genetic::Selection;
    use crate::testutil::{campus_start, disliked_start};
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn small() -> GeneticConfig {
        GeneticConfig::fast()
            .with_population_size(8)
            .with_max_generations(10)
            .with_seed(42)
    }

    #[test]
    fn test_best_never_below_start() {
        let ev = SolutionEvaluator::default();
        let start = campus_start(&ev);
        let start_score = ev.score(&start);
        let result = GeneticOptimizer::new(&ev, small()).expect("valid").run(&start, &StopSignal::never());
        assert!(result.best_score >= start_score);
        assert!(result.best.evaluation.is_feasible);
        assert_eq!(result.best.solution.covered_sections().len(), 10);
        assert!(result.best.solution.check_invariants().is_ok());
    }

    #[test]
    fn test_escapes_disliked_slot() {
        let ev = SolutionEvaluator::default();
        let start = disliked_start();
        let start_score = ev.score(&start);
        let config = small()
            .with_max_generations(20)
            .with_seed_diversity(1.0)
            .with_mutation_rate(0.5)
            .with_parallel(false);
        let result = GeneticOptimizer::new(&ev, config).expect("valid").run(&start, &StopSignal::never());
        assert!(
            result.best_score > start_score,
            "best {} not above start {start_score}",
            result.best_score
        );
        assert_eq!(result.best.solution.assignments()[0].time_slot_id, 3);
    }

    #[test]
    fn test_history_non_decreasing() {
        let ev = SolutionEvaluator::default();
        let start = campus_start(&ev);
        for sel in [Selection::Tournament(2), Selection::Roulette, Selection::Rank] {
            let config = small().with_selection(sel).with_parallel(false);
            let result = GeneticOptimizer::new(&ev, config).expect("valid").run(&start, &StopSignal::never());
            assert_eq!(result.fitness_history.len(), result.generations + 1);
            for w in result.fitness_history.windows(2) {
                assert!(w[1] >= w[0]);
            }
        }
    }

    #[test]
    fn test_stagnation_stops_run() {
        let ev = SolutionEvaluator::default();
        let start = campus_start(&ev);
        let config = small()
            .with_max_generations(500)
            .with_stagnation_limit(3)
            .with_convergence_threshold(10.0);
        let result = GeneticOptimizer::new(&ev, config).expect("valid").run(&start, &StopSignal::never());
        assert!(result.stagnated);
        assert_eq!(result.generations, 3);
    }

    #[test]
    fn test_cancelled_before_first_generation() {
        let ev = SolutionEvaluator::default();
        let start = campus_start(&ev);
        let stop = StopSignal::from_flag(Arc::new(AtomicBool::new(true)));
        let result = GeneticOptimizer::new(&ev, small()).expect("valid").run(&start, &stop);
        assert!(result.cancelled);
        assert_eq!(result.generations, 0);
        assert!(result.best_score >= ev.score(&start));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let ev = SolutionEvaluator::default();
        let bad = GeneticConfig::default().with_population_size(1);
        assert!(GeneticOptimizer::new(&ev, bad).is_err());
    }
}
