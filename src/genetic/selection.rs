//! Parent selection.
//!
//! All strategies work on a slice of fitness values and assume
//! **maximization** (higher score = better).
//!
//! # References
//!
//! - Blickle & Thiele (1996), "A Comparison of Selection Schemes used in
//!   Evolutionary Algorithms"
//! - Baker (1985), "Adaptive Selection Methods for Genetic Algorithms"

use rand::Rng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Selection strategy for choosing parents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Selection {
    /// Pick `k` individuals at random, keep the best.
    Tournament(usize),

    /// Fitness-proportionate, on scores shifted so the worst is near zero.
    Roulette,

    /// Linear ranking: weight `n - rank`, best first.
    Rank,
}

impl Default for Selection {
    fn default() -> Self {
        Selection::Tournament(3)
    }
}

impl Selection {
    /// Index of the chosen parent, or `None` for an empty population.
    pub fn select<R: Rng>(&self, fitness: &[f64], rng: &mut R) -> Option<usize> {
        if fitness.is_empty() {
            return None;
        }
        Some(match self {
            Selection::Tournament(k) => tournament(fitness, *k, rng),
            Selection::Roulette => roulette(fitness, rng),
            Selection::Rank => rank(fitness, rng),
        })
    }
}

fn tournament<R: Rng>(fitness: &[f64], k: usize, rng: &mut R) -> usize {
    let n = fitness.len();
    let mut best = rng.random_range(0..n);
    for _ in 1..k.max(1) {
        let idx = rng.random_range(0..n);
        if fitness[idx] > fitness[best] {
            best = idx;
        }
    }
    best
}

fn roulette<R: Rng>(fitness: &[f64], rng: &mut R) -> usize {
    let n = fitness.len();
    if n == 1 {
        return 0;
    }
    let min = fitness.iter().copied().fold(f64::INFINITY, f64::min);
    let epsilon = 1e-10;
    let weights: Vec<f64> = fitness.iter().map(|&f| (f - min).max(0.0) + epsilon).collect();
    let total: f64 = weights.iter().sum();

    let threshold = rng.random_range(0.0..total);
    let mut cumulative = 0.0;
    for (i, &w) in weights.iter().enumerate() {
        cumulative += w;
        if cumulative > threshold {
            return i;
        }
    }
    n - 1
}

fn rank<R: Rng>(fitness: &[f64], rng: &mut R) -> usize {
    let n = fitness.len();
    if n == 1 {
        return 0;
    }
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| fitness[b].total_cmp(&fitness[a]));

    let total = (n * (n + 1)) as f64 / 2.0;
    let threshold = rng.random_range(0.0..total);
    let mut cumulative = 0.0;
    for (rank, &idx) in order.iter().enumerate() {
        cumulative += (n - rank) as f64;
        if cumulative > threshold {
            return idx;
        }
    }
    order[n - 1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const FITNESS: [f64; 4] = [0.2, 0.5, 0.9, -0.4];

    fn counts(sel: Selection) -> [u32; 4] {
        let mut rng = StdRng::seed_from_u64(42);
        let mut counts = [0u32; 4];
        for _ in 0..10_000 {
            let idx = sel.select(&FITNESS, &mut rng).expect("non-empty");
            counts[idx] += 1;
        }
        counts
    }

    #[test]
    fn test_tournament_favors_best() {
        let c = counts(Selection::Tournament(4));
        assert!(c[2] > 6000, "got {c:?}");
    }

    #[test]
    fn test_tournament_size_1_is_random() {
        let c = counts(Selection::Tournament(1));
        for &n in &c {
            assert!(n > 1500, "expected uniform, got {c:?}");
        }
    }

    #[test]
    fn test_roulette_favors_best() {
        let c = counts(Selection::Roulette);
        assert!(c[2] > c[0] && c[2] > c[3], "got {c:?}");
        assert!(c[3] < 100, "worst should be nearly never picked, got {c:?}");
    }

    #[test]
    fn test_rank_order() {
        let c = counts(Selection::Rank);
        assert!(c[2] > c[1] && c[1] > c[0] && c[0] > c[3], "got {c:?}");
    }

    #[test]
    fn test_empty_population() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(Selection::Rank.select(&[], &mut rng), None);
    }
}
