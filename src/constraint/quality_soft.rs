//! Quality-soft tier: preferences and day-shape ergonomics.
//!
//! These constraints only shape the score. Diagnostic conflicts are
//! emitted for sub-scores below the tier threshold.

use super::types::{
    daily_sequences, in_solution_order, meta_accessors, Constraint, ConstraintCategory,
    ConstraintMeta, ConstraintOutcome, ConstraintTier,
};
use crate::model::{
    ConflictType, EntityKind, SchedulingAssignment, SchedulingConflict, SchedulingSolution,
    Severity, TeacherId,
};
use std::collections::HashMap;

/// Sub-score used when a teacher stated no preference for a slot.
pub const NEUTRAL_PREFERENCE: f64 = 0.5;

/// Two classes closer than this many minutes count as back-to-back.
pub const BACK_TO_BACK_MINUTES: u32 = 15;

/// Idle time at which compactness bottoms out.
pub const MAX_IDLE_MINUTES: u32 = 240;

/// Teachers teach in slots they prefer.
///
/// Preference level `p` in 1..=5 maps to `(p - 1) / 4`.
#[derive(Debug, Clone)]
pub struct TeacherPreferenceConstraint {
    meta: ConstraintMeta,
}

impl TeacherPreferenceConstraint {
    pub const ID: u32 = 11;

    pub fn new() -> Self {
        Self {
            meta: ConstraintMeta::new(
                Self::ID,
                "Teacher preference",
                ConstraintTier::QualitySoft,
                ConstraintCategory::Preference,
            )
            .with_description("Assignments land in slots the teacher prefers")
            .with_weight(0.8),
        }
    }
}

impl Default for TeacherPreferenceConstraint {
    fn default() -> Self {
        Self::new()
    }
}

impl Constraint for TeacherPreferenceConstraint {
    meta_accessors!();

    fn evaluate(&self, solution: &SchedulingSolution) -> ConstraintOutcome {
        let problem = solution.problem();
        let threshold = self.meta.tier.diagnostic_threshold();
        let mut scores = Vec::with_capacity(solution.len());
        let mut conflicts = Vec::new();

        for a in solution.assignments() {
            let score = match problem.preference(a.teacher_id, a.time_slot_id) {
                Some(level) => f64::from(level.clamp(1, 5) - 1) / 4.0,
                None => NEUTRAL_PREFERENCE,
            };
            scores.push((a.id, score));
            if score < threshold {
                conflicts.push(
                    SchedulingConflict::new(
                        self.meta.id,
                        ConflictType::Preference,
                        Severity::Minor,
                        format!("Teacher {} dislikes slot {}", a.teacher_id, a.time_slot_id),
                    )
                    .with_entities(EntityKind::Teacher, [a.teacher_id])
                    .with_entities(EntityKind::Assignment, [a.id])
                    .with_time_slots([a.time_slot_id]),
                );
            }
        }
        ConstraintOutcome::soft(scores, conflicts)
    }
}

/// Teaching load is spread evenly and nobody teaches too long without a
/// break.
///
/// A teacher's assignments score `min(load, mean) / max(load, mean)`
/// against the mean load over all teachers. Assignments inside a
/// back-to-back run longer than the teacher's consecutive-hours limit are
/// halved.
#[derive(Debug, Clone)]
pub struct WorkloadBalanceConstraint {
    meta: ConstraintMeta,
}

impl WorkloadBalanceConstraint {
    pub const ID: u32 = 12;

    pub fn new() -> Self {
        Self {
            meta: ConstraintMeta::new(
                Self::ID,
                "Workload balance",
                ConstraintTier::QualitySoft,
                ConstraintCategory::Workload,
            )
            .with_description("Teaching load is balanced and consecutive hours stay bounded")
            .with_weight(0.6),
        }
    }

    fn overlong_runs<'a>(
        &self,
        seq: &[&'a SchedulingAssignment],
        limit_minutes: u32,
    ) -> Vec<Vec<&'a SchedulingAssignment>> {
        let mut runs = Vec::new();
        let mut run: Vec<&SchedulingAssignment> = Vec::new();
        let mut run_minutes = 0;
        for &a in seq {
            let joins = run.last().is_some_and(|prev| {
                a.start_minute >= prev.end_minute
                    && u32::from(a.start_minute - prev.end_minute) <= BACK_TO_BACK_MINUTES
            });
            if !joins {
                if run_minutes > limit_minutes {
                    runs.push(std::mem::take(&mut run));
                }
                run.clear();
                run_minutes = 0;
            }
            run_minutes += u32::from(a.end_minute.saturating_sub(a.start_minute));
            run.push(a);
        }
        if run_minutes > limit_minutes {
            runs.push(run);
        }
        runs
    }
}

impl Default for WorkloadBalanceConstraint {
    fn default() -> Self {
        Self::new()
    }
}

impl Constraint for WorkloadBalanceConstraint {
    meta_accessors!();

    fn evaluate(&self, solution: &SchedulingSolution) -> ConstraintOutcome {
        let problem = solution.problem();
        let threshold = self.meta.tier.diagnostic_threshold();
        let mut conflicts = Vec::new();

        let mut load: HashMap<TeacherId, u32> = HashMap::new();
        for a in solution.assignments() {
            *load.entry(a.teacher_id).or_default() +=
                u32::from(a.end_minute.saturating_sub(a.start_minute));
        }
        let teacher_count = problem.teachers.len().max(1);
        let mean = f64::from(load.values().sum::<u32>()) / teacher_count as f64;

        let mut teacher_ids: Vec<TeacherId> = load.keys().copied().collect();
        teacher_ids.sort_unstable();
        let mut ratio: HashMap<TeacherId, f64> = HashMap::new();
        for t in teacher_ids {
            let l = f64::from(load[&t]);
            let r = if l <= 0.0 || mean <= 0.0 { 1.0 } else { l.min(mean) / l.max(mean) };
            ratio.insert(t, r);
            if r < threshold {
                conflicts.push(
                    SchedulingConflict::new(
                        self.meta.id,
                        ConflictType::WorkloadBalance,
                        Severity::Minor,
                        format!("Teacher {t} teaches {l:.0} min against a mean of {mean:.0}"),
                    )
                    .with_entities(EntityKind::Teacher, [t]),
                );
            }
        }

        let mut by_id: HashMap<_, f64> = solution
            .assignments()
            .iter()
            .map(|a| (a.id, ratio.get(&a.teacher_id).copied().unwrap_or(1.0)))
            .collect();

        for ((teacher_id, day), seq) in daily_sequences(solution) {
            let Some(limit) = problem.teacher(teacher_id).and_then(|t| t.max_consecutive_hours) else {
                continue;
            };
            for run in self.overlong_runs(&seq, limit.saturating_mul(60)) {
                for a in &run {
                    if let Some(s) = by_id.get_mut(&a.id) {
                        *s *= 0.5;
                    }
                }
                conflicts.push(
                    SchedulingConflict::new(
                        self.meta.id,
                        ConflictType::WorkloadBalance,
                        Severity::Moderate,
                        format!(
                            "Teacher {teacher_id} teaches {} classes back-to-back on day {day}, limit {limit} h",
                            run.len()
                        ),
                    )
                    .with_entities(EntityKind::Teacher, [teacher_id])
                    .with_entities(EntityKind::Assignment, run.iter().map(|a| a.id))
                    .with_time_slots(run.iter().map(|a| a.time_slot_id)),
                );
            }
        }

        ConstraintOutcome::soft(in_solution_order(solution, &by_id), conflicts)
    }
}

/// Teachers' days have few idle gaps.
///
/// The later assignment of each same-day pair scores
/// `1 - min(gap, MAX_IDLE_MINUTES) / MAX_IDLE_MINUTES`.
#[derive(Debug, Clone)]
pub struct ScheduleCompactnessConstraint {
    meta: ConstraintMeta,
}

impl ScheduleCompactnessConstraint {
    pub const ID: u32 = 13;

    pub fn new() -> Self {
        Self {
            meta: ConstraintMeta::new(
                Self::ID,
                "Schedule compactness",
                ConstraintTier::QualitySoft,
                ConstraintCategory::Compactness,
            )
            .with_description("Teachers' daily schedules avoid long idle gaps")
            .with_weight(0.5),
        }
    }
}

impl Default for ScheduleCompactnessConstraint {
    fn default() -> Self {
        Self::new()
    }
}

impl Constraint for ScheduleCompactnessConstraint {
    meta_accessors!();

    fn evaluate(&self, solution: &SchedulingSolution) -> ConstraintOutcome {
        let threshold = self.meta.tier.diagnostic_threshold();
        let mut by_id = HashMap::new();
        let mut conflicts = Vec::new();

        for ((teacher, day), seq) in daily_sequences(solution) {
            for pair in seq.windows(2) {
                let (prev, next) = (pair[0], pair[1]);
                let gap = u32::from(next.start_minute.saturating_sub(prev.end_minute));
                let score = 1.0 - f64::from(gap.min(MAX_IDLE_MINUTES)) / f64::from(MAX_IDLE_MINUTES);
                by_id.insert(next.id, score);
                if score < threshold {
                    conflicts.push(
                        SchedulingConflict::new(
                            self.meta.id,
                            ConflictType::Compactness,
                            Severity::Minor,
                            format!("Teacher {teacher} idles {gap} min on day {day}"),
                        )
                        .with_entities(EntityKind::Teacher, [teacher])
                        .with_entities(EntityKind::Assignment, [prev.id, next.id])
                        .with_time_slots([prev.time_slot_id, next.time_slot_id]),
                    );
                }
            }
        }
        ConstraintOutcome::soft(in_solution_order(solution, &by_id), conflicts)
    }
}

/// Teachers stay in one building (then one campus) between classes.
#[derive(Debug, Clone)]
pub struct TeacherMobilityConstraint {
    meta: ConstraintMeta,
}

impl TeacherMobilityConstraint {
    pub const ID: u32 = 14;
    pub const SAME_CAMPUS: f64 = 0.7;
    pub const OTHER_CAMPUS: f64 = 0.4;

    pub fn new() -> Self {
        Self {
            meta: ConstraintMeta::new(
                Self::ID,
                "Teacher mobility",
                ConstraintTier::QualitySoft,
                ConstraintCategory::Travel,
            )
            .with_description("Consecutive classes of a teacher stay close together")
            .with_weight(0.4),
        }
    }
}

impl Default for TeacherMobilityConstraint {
    fn default() -> Self {
        Self::new()
    }
}

impl Constraint for TeacherMobilityConstraint {
    meta_accessors!();

    fn evaluate(&self, solution: &SchedulingSolution) -> ConstraintOutcome {
        let problem = solution.problem();
        let threshold = self.meta.tier.diagnostic_threshold();
        let mut by_id = HashMap::new();
        let mut conflicts = Vec::new();

        for ((teacher, day), seq) in daily_sequences(solution) {
            for pair in seq.windows(2) {
                let (prev, next) = (pair[0], pair[1]);
                let (Some(from), Some(to)) =
                    (problem.classroom(prev.classroom_id), problem.classroom(next.classroom_id))
                else {
                    continue;
                };
                let score = if from.campus != to.campus {
                    Self::OTHER_CAMPUS
                } else if from.building != to.building {
                    Self::SAME_CAMPUS
                } else {
                    1.0
                };
                by_id.insert(next.id, score);
                if score < threshold {
                    conflicts.push(
                        SchedulingConflict::new(
                            self.meta.id,
                            ConflictType::Mobility,
                            Severity::Minor,
                            format!(
                                "Teacher {teacher} moves from {} to {} on day {day}",
                                from.campus, to.campus
                            ),
                        )
                        .with_entities(EntityKind::Teacher, [teacher])
                        .with_entities(EntityKind::Assignment, [prev.id, next.id]),
                    );
                }
            }
        }
        ConstraintOutcome::soft(in_solution_order(solution, &by_id), conflicts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Classroom, CourseSection, SchedulingProblem, Teacher, TimeSlot};
    use crate::testutil::{assignment, tiny_problem};
    use std::sync::Arc;

    #[test]
    fn test_preference_levels() {
        let base = tiny_problem();
        let p = Arc::new(
            SchedulingProblem::builder()
                .section(base.sections[0].clone())
                .section(base.sections[1].clone())
                .teacher(Teacher::new(1))
                .teacher(Teacher::new(2))
                .classroom(Classroom::new(1, 30))
                .classroom(Classroom::new(2, 30))
                .time_slot(TimeSlot::new(1, 1, 540, 600))
                .time_slot(TimeSlot::new(2, 1, 600, 660))
                .preference(1, 1, 5)
                .preference(2, 2, 1)
                .build()
                .expect("valid"),
        );
        let sol = SchedulingSolution::from_assignments(
            p.clone(),
            vec![assignment(&p, 1, 1, 1, 1, 1), assignment(&p, 2, 2, 2, 2, 2)],
        );
        let out = TeacherPreferenceConstraint::new().evaluate(&sol);
        assert_eq!(out.assignment_scores, vec![(1, 1.0), (2, 0.0)]);
        assert_eq!(out.conflicts.len(), 1);
        assert_eq!(out.conflicts[0].severity, Severity::Minor);
    }

    #[test]
    fn test_missing_preference_is_neutral() {
        let p = tiny_problem();
        let sol = SchedulingSolution::from_assignments(p.clone(), vec![assignment(&p, 1, 1, 1, 1, 1)]);
        let out = TeacherPreferenceConstraint::new().evaluate(&sol);
        assert_eq!(out.score, NEUTRAL_PREFERENCE);
        assert!(out.conflicts.is_empty());
    }

    #[test]
    fn test_balance_even_vs_skewed() {
        let p = tiny_problem();
        let even = SchedulingSolution::from_assignments(
            p.clone(),
            vec![assignment(&p, 1, 1, 1, 1, 1), assignment(&p, 2, 2, 2, 2, 1)],
        );
        let skewed = SchedulingSolution::from_assignments(
            p.clone(),
            vec![assignment(&p, 1, 1, 1, 1, 1), assignment(&p, 2, 2, 1, 2, 2)],
        );
        let c = WorkloadBalanceConstraint::new();
        assert_eq!(c.evaluate(&even).score, 1.0);
        assert!((c.evaluate(&skewed).score - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_consecutive_limit_halves_run() {
        let p = Arc::new(
            SchedulingProblem::builder()
                .section(CourseSection::new(1, 10, 10))
                .section(CourseSection::new(2, 20, 10))
                .teacher(Teacher::new(1).with_max_consecutive_hours(1))
                .classroom(Classroom::new(1, 30))
                .time_slot(TimeSlot::new(1, 1, 540, 600))
                .time_slot(TimeSlot::new(2, 1, 605, 665))
                .build()
                .expect("valid"),
        );
        let sol = SchedulingSolution::from_assignments(
            p.clone(),
            vec![assignment(&p, 1, 1, 1, 1, 1), assignment(&p, 2, 2, 1, 1, 2)],
        );
        let out = WorkloadBalanceConstraint::new().evaluate(&sol);
        assert_eq!(out.assignment_scores, vec![(1, 0.5), (2, 0.5)]);
        assert!(out
            .conflicts
            .iter()
            .any(|c| c.severity == Severity::Moderate));
    }

    #[test]
    fn test_compactness_penalizes_gap() {
        let p = tiny_problem();
        let sol = SchedulingSolution::from_assignments(
            p.clone(),
            vec![assignment(&p, 1, 1, 1, 1, 1), assignment(&p, 2, 2, 1, 2, 3)],
        );
        let out = ScheduleCompactnessConstraint::new().evaluate(&sol);
        assert_eq!(out.assignment_scores, vec![(1, 1.0), (2, 0.75)]);
        assert!(out.conflicts.is_empty());
    }

    #[test]
    fn test_mobility_across_campus() {
        let p = Arc::new(
            SchedulingProblem::builder()
                .section(CourseSection::new(1, 10, 10))
                .section(CourseSection::new(2, 20, 10))
                .teacher(Teacher::new(1))
                .classroom(Classroom::new(1, 30).with_location("A", "north"))
                .classroom(Classroom::new(2, 30).with_location("B", "south"))
                .time_slot(TimeSlot::new(1, 1, 540, 600))
                .time_slot(TimeSlot::new(2, 1, 600, 660))
                .build()
                .expect("valid"),
        );
        let sol = SchedulingSolution::from_assignments(
            p.clone(),
            vec![assignment(&p, 1, 1, 1, 1, 1), assignment(&p, 2, 2, 1, 2, 2)],
        );
        let out = TeacherMobilityConstraint::new().evaluate(&sol);
        assert_eq!(
            out.assignment_scores,
            vec![(1, 1.0), (2, TeacherMobilityConstraint::OTHER_CAMPUS)]
        );
        assert_eq!(out.conflicts.len(), 1);
    }
}
