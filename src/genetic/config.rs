//! Genetic search configuration.
//!
//! [`GeneticConfig`] holds every parameter that controls the evolutionary
//! loop over timetables.

use super::selection::Selection;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for the genetic search.
///
/// # Defaults
///
/// ```
/// use u_timetable::genetic::GeneticConfig;
///
/// let config = GeneticConfig::default();
/// assert_eq!(config.population_size, 30);
/// assert_eq!(config.max_generations, 100);
/// ```
///
/// # Builder Pattern
///
/// ```
/// use u_timetable::genetic::{GeneticConfig, Selection};
///
/// let config = GeneticConfig::balanced()
///     .with_selection(Selection::Rank)
///     .with_mutation_rate(0.3)
///     .with_seed(11);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeneticConfig {
    /// Number of timetables per generation.
    pub population_size: usize,

    pub max_generations: usize,

    pub selection: Selection,

    /// Fraction of the population copied unchanged into the next
    /// generation. At least one elite is always kept.
    pub elite_ratio: f64,

    /// Probability of crossing two parents. Otherwise a parent clone is
    /// used.
    pub crossover_rate: f64,

    /// Probability of applying one local search move to an offspring.
    pub mutation_rate: f64,

    /// Fraction of assignments perturbed in each seeded individual.
    pub seed_diversity: f64,

    /// Generations without significant improvement before stopping.
    /// 0 disables the check.
    pub stagnation_limit: usize,

    /// Minimum absolute score gain that resets the stagnation counter.
    pub convergence_threshold: f64,

    /// Evaluate offspring on the rayon pool. Has no effect without the
    /// `parallel` feature.
    pub parallel: bool,

    pub seed: Option<u64>,

    /// Optional wall-clock limit, combined with the caller's stop signal.
    pub time_limit_ms: Option<u64>,
}

impl Default for GeneticConfig {
    fn default() -> Self {
        Self {
            population_size: 30,
            max_generations: 100,
            selection: Selection::default(),
            elite_ratio: 0.1,
            crossover_rate: 0.8,
            mutation_rate: 0.2,
            seed_diversity: 0.3,
            stagnation_limit: 20,
            convergence_threshold: 0.0,
            parallel: true,
            seed: None,
            time_limit_ms: None,
        }
    }
}

impl GeneticConfig {
    pub fn with_population_size(mut self, n: usize) -> Self {
        self.population_size = n;
        self
    }

    pub fn with_max_generations(mut self, n: usize) -> Self {
        self.max_generations = n;
        self
    }

    pub fn with_selection(mut self, sel: Selection) -> Self {
        self.selection = sel;
        self
    }

    pub fn with_elite_ratio(mut self, ratio: f64) -> Self {
        self.elite_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn with_crossover_rate(mut self, rate: f64) -> Self {
        self.crossover_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_seed_diversity(mut self, factor: f64) -> Self {
        self.seed_diversity = factor;
        self
    }

    /// Sets the stagnation limit (0 to disable).
    pub fn with_stagnation_limit(mut self, limit: usize) -> Self {
        self.stagnation_limit = limit;
        self
    }

    pub fn with_convergence_threshold(mut self, threshold: f64) -> Self {
        self.convergence_threshold = threshold.max(0.0);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_time_limit_ms(mut self, ms: u64) -> Self {
        self.time_limit_ms = Some(ms);
        self
    }

    /// Small population, few generations.
    ///
    /// - Population: 16, Generations: 40, Time limit: 5s
    /// - Stagnation limit: 10
    pub fn fast() -> Self {
        Self {
            population_size: 16,
            max_generations: 40,
            stagnation_limit: 10,
            time_limit_ms: Some(5_000),
            ..Self::default()
        }
    }

    /// Moderate population and generations.
    ///
    /// - Population: 40, Generations: 150, Time limit: 30s
    /// - Stagnation limit: 30, Convergence threshold: 0.0005
    pub fn balanced() -> Self {
        Self {
            population_size: 40,
            max_generations: 150,
            stagnation_limit: 30,
            convergence_threshold: 0.0005,
            time_limit_ms: Some(30_000),
            ..Self::default()
        }
    }

    /// Picks a preset from the number of scheduling units.
    pub fn auto_select(unit_count: usize) -> Self {
        if unit_count < 50 {
            Self::fast()
        } else {
            Self::balanced()
        }
    }

    pub fn with_tournament_size(self, k: usize) -> Self {
        self.with_selection(Selection::Tournament(k))
    }

    /// Number of individuals carried over unchanged.
    pub fn elite_count(&self) -> usize {
        ((self.population_size as f64 * self.elite_ratio) as usize).max(1)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.population_size < 2 {
            return Err("population_size must be at least 2".into());
        }
        if self.max_generations == 0 {
            return Err("max_generations must be at least 1".into());
        }
        if self.elite_count() >= self.population_size {
            return Err("elite_ratio too high: elites fill entire population".into());
        }
        for (name, rate) in [
            ("crossover_rate", self.crossover_rate),
            ("mutation_rate", self.mutation_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(format!("{name} must be in [0, 1], got {rate}"));
            }
        }
        if !(0.0..=1.0).contains(&self.seed_diversity) {
            return Err(format!(
                "seed_diversity must be in [0, 1], got {}",
                self.seed_diversity
            ));
        }
        if let Selection::Tournament(0) = self.selection {
            return Err("tournament size must be at least 1".into());
        }
        if self.time_limit_ms == Some(0) {
            return Err("time_limit_ms must be positive or None".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GeneticConfig::default();
        assert_eq!(config.selection, Selection::Tournament(3));
        assert_eq!(config.elite_count(), 3);
        assert!(config.parallel);
        assert!(config.seed.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets_valid() {
        assert!(GeneticConfig::fast().validate().is_ok());
        assert!(GeneticConfig::balanced().validate().is_ok());
        assert_eq!(GeneticConfig::auto_select(10), GeneticConfig::fast());
        assert_eq!(GeneticConfig::auto_select(120), GeneticConfig::balanced());
    }

    #[test]
    fn test_at_least_one_elite() {
        let config = GeneticConfig::default().with_population_size(4).with_elite_ratio(0.0);
        assert_eq!(config.elite_count(), 1);
    }

    #[test]
    fn test_validation_errors() {
        assert!(GeneticConfig::default().with_population_size(1).validate().is_err());
        assert!(GeneticConfig::default().with_max_generations(0).validate().is_err());
        assert!(GeneticConfig::default().with_elite_ratio(1.0).validate().is_err());
        assert!(GeneticConfig::default().with_seed_diversity(2.0).validate().is_err());
        assert!(GeneticConfig::default().with_tournament_size(0).validate().is_err());
    }
}
