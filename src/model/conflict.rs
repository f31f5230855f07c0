//! Constraint violations surfaced by evaluation.

use super::problem::TimeSlotId;
use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What kind of rule a conflict breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConflictType {
    TeacherConflict,
    ClassroomConflict,
    TeacherAvailability,
    ClassroomAvailability,
    Capacity,
    Prerequisite,
    Workload,
    Equipment,
    RoomType,
    Travel,
    Preference,
    WorkloadBalance,
    Compactness,
    Mobility,
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConflictType::TeacherConflict => "teacher conflict",
            ConflictType::ClassroomConflict => "classroom conflict",
            ConflictType::TeacherAvailability => "teacher availability",
            ConflictType::ClassroomAvailability => "classroom availability",
            ConflictType::Capacity => "capacity",
            ConflictType::Prerequisite => "prerequisite",
            ConflictType::Workload => "workload",
            ConflictType::Equipment => "equipment",
            ConflictType::RoomType => "room type",
            ConflictType::Travel => "travel",
            ConflictType::Preference => "preference",
            ConflictType::WorkloadBalance => "workload balance",
            ConflictType::Compactness => "compactness",
            ConflictType::Mobility => "mobility",
        };
        f.write_str(name)
    }
}

/// Conflict severity. Ordered so that `Critical` is the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Severity {
    Minor,
    Moderate,
    Critical,
}

/// Kinds of entity a conflict can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EntityKind {
    Assignment,
    Section,
    Course,
    Teacher,
    Classroom,
}

/// A single detected violation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SchedulingConflict {
    pub constraint_id: u32,
    pub conflict_type: ConflictType,
    pub severity: Severity,
    pub description: String,
    pub entities: BTreeMap<EntityKind, Vec<u64>>,
    pub time_slots: Vec<TimeSlotId>,
}

impl SchedulingConflict {
    pub fn new(
        constraint_id: u32,
        conflict_type: ConflictType,
        severity: Severity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            constraint_id,
            conflict_type,
            severity,
            description: description.into(),
            entities: BTreeMap::new(),
            time_slots: Vec::new(),
        }
    }

    pub fn with_entities<I, T>(mut self, kind: EntityKind, ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<u64>,
    {
        let entry = self.entities.entry(kind).or_default();
        entry.extend(ids.into_iter().map(Into::into));
        entry.sort_unstable();
        entry.dedup();
        self
    }

    pub fn with_time_slots(mut self, slots: impl IntoIterator<Item = TimeSlotId>) -> Self {
        self.time_slots.extend(slots);
        self.time_slots.sort_unstable();
        self.time_slots.dedup();
        self
    }

    /// Ids of the given kind involved in this conflict.
    pub fn entity_ids(&self, kind: EntityKind) -> &[u64] {
        self.entities.get(&kind).map_or(&[], Vec::as_slice)
    }

    /// Identity used to merge duplicates reported by several constraints
    /// or several passes.
    pub fn dedup_key(&self) -> (u32, ConflictType, Vec<(EntityKind, Vec<u64>)>, Vec<TimeSlotId>) {
        (
            self.constraint_id,
            self.conflict_type,
            self.entities
                .iter()
                .map(|(k, v)| (*k, v.clone()))
                .collect(),
            self.time_slots.clone(),
        )
    }
}
