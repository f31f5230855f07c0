//! Problem difficulty analysis.

use crate::model::SchedulingProblem;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Coarse difficulty class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Difficulty {
    Easy,
    Moderate,
    Hard,
}

/// Optimization engine run by one orchestrator phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EngineKind {
    LocalSearch,
    Genetic,
}

impl EngineKind {
    pub fn other(self) -> Self {
        match self {
            EngineKind::LocalSearch => EngineKind::Genetic,
            EngineKind::Genetic => EngineKind::LocalSearch,
        }
    }
}

/// Size and tightness figures for one problem.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProblemAnalysis {
    pub sections: usize,
    pub teachers: usize,
    pub classrooms: usize,
    pub time_slots: usize,
    /// Sessions to place.
    pub units: usize,
    /// Statically feasible (teacher, classroom, slot) candidates per unit
    /// over all combinations, averaged over units.
    pub candidate_density: f64,
    /// Units per (classroom, slot) pair.
    pub slot_pressure: f64,
    /// Units per (teacher, slot) pair.
    pub teacher_pressure: f64,
    pub difficulty: Difficulty,
}

impl ProblemAnalysis {
    pub fn analyze(problem: &SchedulingProblem) -> Self {
        let teachers = problem.teachers.len();
        let classrooms = problem.classrooms.len();
        let time_slots = problem.time_slots.len();
        let units = problem.unit_count();
        let combinations = (teachers * classrooms * time_slots) as f64;

        let mut density_sum = 0.0;
        for section in &problem.sections {
            // Rooms able to host this section, per slot.
            let rooms_per_slot: Vec<usize> = problem
                .time_slots
                .iter()
                .map(|slot| {
                    problem
                        .classrooms
                        .iter()
                        .filter(|c| problem.fits_capacity(section, c) && problem.is_classroom_available(c.id, slot.id))
                        .count()
                })
                .collect();
            let feasible: usize = problem
                .candidate_teachers(section)
                .into_iter()
                .map(|t| {
                    problem
                        .time_slots
                        .iter()
                        .zip(&rooms_per_slot)
                        .filter(|(slot, _)| problem.is_teacher_available(t, slot.id))
                        .map(|(_, &rooms)| rooms)
                        .sum::<usize>()
                })
                .sum();
            if combinations > 0.0 {
                density_sum += section.sessions_per_week as f64 * feasible as f64 / combinations;
            }
        }
        let candidate_density = if units == 0 { 1.0 } else { density_sum / units as f64 };

        let slot_pressure = ratio(units, classrooms * time_slots);
        let teacher_pressure = ratio(units, teachers * time_slots);
        let pressure = slot_pressure.max(teacher_pressure);

        let difficulty = if pressure > 0.7 || candidate_density < 0.05 {
            Difficulty::Hard
        } else if pressure > 0.4 || candidate_density < 0.2 || units > 200 {
            Difficulty::Moderate
        } else {
            Difficulty::Easy
        };

        Self {
            sections: problem.sections.len(),
            teachers,
            classrooms,
            time_slots,
            units,
            candidate_density,
            slot_pressure,
            teacher_pressure,
            difficulty,
        }
    }

    /// Local search for easy and moderate problems, genetic search for
    /// hard ones.
    pub fn first_engine(&self) -> EngineKind {
        match self.difficulty {
            Difficulty::Easy | Difficulty::Moderate => EngineKind::LocalSearch,
            Difficulty::Hard => EngineKind::Genetic,
        }
    }

    /// Share of the optimization budget given to one phase.
    pub fn phase_share(&self) -> f64 {
        match self.difficulty {
            Difficulty::Easy => 0.5,
            Difficulty::Moderate => 0.3,
            Difficulty::Hard => 0.2,
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        f64::INFINITY
    } else {
        num as f64 / den as f64
    }
}
