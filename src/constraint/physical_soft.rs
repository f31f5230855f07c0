//! Physical-soft tier: how well the assigned room and route fit.

use super::types::{
    daily_sequences, in_solution_order, meta_accessors, Constraint, ConstraintCategory,
    ConstraintMeta, ConstraintOutcome, ConstraintTier,
};
use crate::model::{ConflictType, EntityKind, SchedulingConflict, SchedulingSolution, Severity};
use std::collections::HashMap;

/// Rooms carry the equipment their section requires.
///
/// Sub-score is the fraction of required items present in the room.
#[derive(Debug, Clone)]
pub struct EquipmentMatchConstraint {
    meta: ConstraintMeta,
}

impl EquipmentMatchConstraint {
    pub const ID: u32 = 8;

    pub fn new() -> Self {
        Self {
            meta: ConstraintMeta::new(
                Self::ID,
                "Equipment match",
                ConstraintTier::PhysicalSoft,
                ConstraintCategory::Facility,
            )
            .with_description("Classroom provides the section's required equipment"),
        }
    }
}

impl Default for EquipmentMatchConstraint {
    fn default() -> Self {
        Self::new()
    }
}

impl Constraint for EquipmentMatchConstraint {
    meta_accessors!();

    fn evaluate(&self, solution: &SchedulingSolution) -> ConstraintOutcome {
        let problem = solution.problem();
        let threshold = self.meta.tier.diagnostic_threshold();
        let mut scores = Vec::with_capacity(solution.len());
        let mut conflicts = Vec::new();

        for a in solution.assignments() {
            let (Some(section), Some(room)) =
                (problem.section(a.section_id), problem.classroom(a.classroom_id))
            else {
                scores.push((a.id, 1.0));
                continue;
            };
            let required = &section.required_equipment;
            if required.is_empty() {
                scores.push((a.id, 1.0));
                continue;
            }
            let missing: Vec<&str> = required
                .iter()
                .filter(|r| !room.equipment.contains(r))
                .map(String::as_str)
                .collect();
            let score = 1.0 - missing.len() as f64 / required.len() as f64;
            scores.push((a.id, score));
            if score < threshold {
                conflicts.push(
                    SchedulingConflict::new(
                        self.meta.id,
                        ConflictType::Equipment,
                        Severity::Moderate,
                        format!("Classroom {} lacks {}", room.id, missing.join(", ")),
                    )
                    .with_entities(EntityKind::Assignment, [a.id])
                    .with_entities(EntityKind::Section, [a.section_id])
                    .with_entities(EntityKind::Classroom, [room.id])
                    .with_time_slots([a.time_slot_id]),
                );
            }
        }
        ConstraintOutcome::soft(scores, conflicts)
    }
}

/// Rooms match the section's requested room type.
#[derive(Debug, Clone)]
pub struct RoomTypeMatchConstraint {
    meta: ConstraintMeta,
}

impl RoomTypeMatchConstraint {
    pub const ID: u32 = 9;

    pub fn new() -> Self {
        Self {
            meta: ConstraintMeta::new(
                Self::ID,
                "Room type match",
                ConstraintTier::PhysicalSoft,
                ConstraintCategory::Facility,
            )
            .with_description("Classroom type matches the section's requested room type"),
        }
    }
}

impl Default for RoomTypeMatchConstraint {
    fn default() -> Self {
        Self::new()
    }
}

impl Constraint for RoomTypeMatchConstraint {
    meta_accessors!();

    fn evaluate(&self, solution: &SchedulingSolution) -> ConstraintOutcome {
        let problem = solution.problem();
        let mut scores = Vec::with_capacity(solution.len());
        let mut conflicts = Vec::new();

        for a in solution.assignments() {
            let wanted = problem
                .section(a.section_id)
                .and_then(|s| s.room_type.as_deref());
            let actual = problem
                .classroom(a.classroom_id)
                .and_then(|c| c.room_type.as_deref());
            match wanted {
                Some(w) if actual != Some(w) => {
                    scores.push((a.id, 0.0));
                    conflicts.push(
                        SchedulingConflict::new(
                            self.meta.id,
                            ConflictType::RoomType,
                            Severity::Moderate,
                            format!(
                                "Section {} wants a {w} room, classroom {} is {}",
                                a.section_id,
                                a.classroom_id,
                                actual.unwrap_or("untyped")
                            ),
                        )
                        .with_entities(EntityKind::Assignment, [a.id])
                        .with_entities(EntityKind::Section, [a.section_id])
                        .with_entities(EntityKind::Classroom, [a.classroom_id])
                        .with_time_slots([a.time_slot_id]),
                    );
                }
                _ => scores.push((a.id, 1.0)),
            }
        }
        ConstraintOutcome::soft(scores, conflicts)
    }
}

/// Back-to-back classes leave enough time to travel between campuses.
///
/// For each same-day transition of a teacher, the later assignment scores
/// `gap / travel` (capped at 1) when the rooms are on different campuses.
#[derive(Debug, Clone)]
pub struct CampusTravelConstraint {
    meta: ConstraintMeta,
}

impl CampusTravelConstraint {
    pub const ID: u32 = 10;

    pub fn new() -> Self {
        Self {
            meta: ConstraintMeta::new(
                Self::ID,
                "Campus travel",
                ConstraintTier::PhysicalSoft,
                ConstraintCategory::Travel,
            )
            .with_description("Teachers have enough time to move between campuses"),
        }
    }
}

impl Default for CampusTravelConstraint {
    fn default() -> Self {
        Self::new()
    }
}

impl Constraint for CampusTravelConstraint {
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
                let travel = problem.travel_minutes(&from.campus, &to.campus);
                if travel == 0 {
                    continue;
                }
                let gap = u32::from(next.start_minute.saturating_sub(prev.end_minute));
                let score = (f64::from(gap) / f64::from(travel)).min(1.0);
                let entry = by_id.entry(next.id).or_insert(1.0_f64);
                *entry = entry.min(score);
                if score < threshold {
                    conflicts.push(
                        SchedulingConflict::new(
                            self.meta.id,
                            ConflictType::Travel,
                            Severity::Moderate,
                            format!(
                                "Teacher {teacher} has {gap} min to travel {} -> {} on day {day}, needs {travel}",
                                from.campus, to.campus
                            ),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Classroom, CourseSection, SchedulingProblem, Teacher, TimeSlot};
    use crate::testutil::assignment;
    use std::sync::Arc;

    fn lab_problem() -> Arc<SchedulingProblem> {
        Arc::new(
            SchedulingProblem::builder()
                .section(
                    CourseSection::new(1, 10, 10)
                        .with_equipment(&["projector", "fume hood"])
                        .with_room_type("lab"),
                )
                .section(CourseSection::new(2, 20, 10))
                .teacher(Teacher::new(1))
                .classroom(
                    Classroom::new(1, 30)
                        .with_equipment(&["projector"])
                        .with_location("A", "north"),
                )
                .classroom(
                    Classroom::new(2, 30)
                        .with_room_type("lab")
                        .with_equipment(&["projector", "fume hood"])
                        .with_location("B", "south"),
                )
                .time_slot(TimeSlot::new(1, 1, 540, 600))
                .time_slot(TimeSlot::new(2, 1, 610, 670))
                .travel("north", "south", 40)
                .build()
                .expect("valid"),
        )
    }

    #[test]
    fn test_equipment_partial_match() {
        let p = lab_problem();
        let sol = SchedulingSolution::from_assignments(p.clone(), vec![assignment(&p, 1, 1, 1, 1, 1)]);
        let out = EquipmentMatchConstraint::new().evaluate(&sol);
        assert!((out.score - 0.5).abs() < 1e-12);
        assert_eq!(out.conflicts.len(), 1);
        assert_eq!(out.conflicts[0].conflict_type, ConflictType::Equipment);
    }

    #[test]
    fn test_equipment_full_match_no_conflict() {
        let p = lab_problem();
        let sol = SchedulingSolution::from_assignments(p.clone(), vec![assignment(&p, 1, 1, 1, 2, 1)]);
        let c = EquipmentMatchConstraint::new();
        let out = c.evaluate(&sol);
        assert_eq!(out.score, 1.0);
        assert!(out.conflicts.is_empty());
        assert!(c.is_satisfied(out.score));
    }

    #[test]
    fn test_room_type_mismatch() {
        let p = lab_problem();
        let sol = SchedulingSolution::from_assignments(
            p.clone(),
            vec![assignment(&p, 1, 1, 1, 1, 1), assignment(&p, 2, 2, 1, 2, 2)],
        );
        let out = RoomTypeMatchConstraint::new().evaluate(&sol);
        assert!((out.score - 0.5).abs() < 1e-12);
        assert_eq!(out.conflicts.len(), 1);
        assert_eq!(out.conflicts[0].entity_ids(EntityKind::Assignment), &[1]);
    }

    #[test]
    fn test_travel_gap_too_short() {
        let p = lab_problem();
        let sol = SchedulingSolution::from_assignments(
            p.clone(),
            vec![assignment(&p, 1, 1, 1, 1, 1), assignment(&p, 2, 2, 1, 2, 2)],
        );
        let out = CampusTravelConstraint::new().evaluate(&sol);
        // 10 minute gap against 40 minutes of travel.
        assert_eq!(out.assignment_scores, vec![(1, 1.0), (2, 0.25)]);
        assert_eq!(out.conflicts.len(), 1);
        assert_eq!(out.conflicts[0].conflict_type, ConflictType::Travel);
    }

    #[test]
    fn test_travel_same_campus_is_free() {
        let p = lab_problem();
        let sol = SchedulingSolution::from_assignments(
            p.clone(),
            vec![assignment(&p, 1, 1, 1, 1, 1), assignment(&p, 2, 2, 1, 1, 2)],
        );
        assert_eq!(CampusTravelConstraint::new().evaluate(&sol).score, 1.0);
    }
}
