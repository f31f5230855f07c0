//! Local search configuration and cooling schedules.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Cooling schedule for temperature reduction.
///
/// # References
///
/// - Geometric: standard textbook approach
/// - Linear: fixed-duration cooling
/// - LundyMees: Lundy & Mees (1986), with convergence proof
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CoolingSchedule {
    /// Geometric cooling: `T_{k+1} = alpha * T_k`.
    Geometric {
        /// Cooling factor in (0, 1). Higher = slower cooling.
        alpha: f64,
    },

    /// Linear cooling from `T_0` to `T_min` over the iteration budget.
    Linear,

    /// Lundy-Mees cooling: `T_{k+1} = T_k / (1 + beta * T_k)`, one
    /// iteration per temperature step.
    LundyMees { beta: f64 },

    /// Geometric cooling whose factor reacts to the acceptance rate of
    /// the last temperature level: `alpha²` above `target_acceptance`,
    /// `√alpha` below half of it, `alpha` otherwise.
    Adaptive { alpha: f64, target_acceptance: f64 },
}

impl Default for CoolingSchedule {
    fn default() -> Self {
        CoolingSchedule::Geometric { alpha: 0.95 }
    }
}

impl CoolingSchedule {
    /// Same schedule with the cooling factor replaced, where it has one.
    pub fn with_alpha(self, alpha: f64) -> Self {
        match self {
            CoolingSchedule::Geometric { .. } => CoolingSchedule::Geometric { alpha },
            CoolingSchedule::Adaptive {
                target_acceptance, ..
            } => CoolingSchedule::Adaptive {
                alpha,
                target_acceptance,
            },
            other => other,
        }
    }
}

/// Configuration for the simulated-annealing local search.
///
/// Scores are in roughly [-1, 1], so temperatures are small.
///
/// # Examples
///
/// ```
/// use u_timetable::local_search::{CoolingSchedule, LocalSearchConfig};
///
/// let config = LocalSearchConfig::default()
///     .with_initial_temperature(0.2)
///     .with_cooling(CoolingSchedule::Geometric { alpha: 0.9 })
///     .with_max_iterations(500)
///     .with_seed(7);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LocalSearchConfig {
    pub initial_temperature: f64,

    /// The run stops once the temperature falls below this.
    pub min_temperature: f64,

    pub cooling: CoolingSchedule,

    /// Ignored for `LundyMees` (one iteration per level).
    pub iterations_per_temperature: usize,

    /// Hard budget. 0 = no limit.
    pub max_iterations: usize,

    /// Stop after this many iterations without a new best. 0 = no limit.
    pub no_improvement_limit: usize,

    /// Bias move selection toward troubled assignments.
    pub intelligent: bool,

    /// Probability of picking a troubled assignment when `intelligent`.
    pub intelligent_bias: f64,

    pub seed: Option<u64>,
}

impl Default for LocalSearchConfig {
    fn default() -> Self {
        Self {
            initial_temperature: 0.1,
            min_temperature: 1e-4,
            cooling: CoolingSchedule::default(),
            iterations_per_temperature: 20,
            max_iterations: 1000,
            no_improvement_limit: 200,
            intelligent: true,
            intelligent_bias: 0.7,
            seed: None,
        }
    }
}

impl LocalSearchConfig {
    pub fn with_initial_temperature(mut self, t: f64) -> Self {
        self.initial_temperature = t;
        self
    }

    pub fn with_min_temperature(mut self, t: f64) -> Self {
        self.min_temperature = t;
        self
    }

    pub fn with_cooling(mut self, cooling: CoolingSchedule) -> Self {
        self.cooling = cooling;
        self
    }

    pub fn with_iterations_per_temperature(mut self, n: usize) -> Self {
        self.iterations_per_temperature = n;
        self
    }

    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn with_no_improvement_limit(mut self, n: usize) -> Self {
        self.no_improvement_limit = n;
        self
    }

    pub fn with_intelligent(mut self, enabled: bool) -> Self {
        self.intelligent = enabled;
        self
    }

    pub fn with_intelligent_bias(mut self, bias: f64) -> Self {
        self.intelligent_bias = bias;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.initial_temperature <= 0.0 {
            return Err("initial_temperature must be positive".into());
        }
        if self.min_temperature <= 0.0 {
            return Err("min_temperature must be positive".into());
        }
        if self.min_temperature >= self.initial_temperature {
            return Err("min_temperature must be less than initial_temperature".into());
        }
        if self.iterations_per_temperature == 0 {
            return Err("iterations_per_temperature must be at least 1".into());
        }
        if !(0.0..=1.0).contains(&self.intelligent_bias) {
            return Err(format!(
                "intelligent_bias must be in [0, 1], got {}",
                self.intelligent_bias
            ));
        }
        match self.cooling {
            CoolingSchedule::Geometric { alpha } | CoolingSchedule::Adaptive { alpha, .. }
                if alpha <= 0.0 || alpha >= 1.0 =>
            {
                Err(format!("cooling alpha must be in (0, 1), got {alpha}"))
            }
            CoolingSchedule::Adaptive {
                target_acceptance, ..
            } if target_acceptance <= 0.0 || target_acceptance >= 1.0 => Err(format!(
                "target_acceptance must be in (0, 1), got {target_acceptance}"
            )),
            CoolingSchedule::LundyMees { beta } if beta <= 0.0 => {
                Err(format!("lundy-mees beta must be positive, got {beta}"))
            }
            _ => Ok(()),
        }
    }
}
