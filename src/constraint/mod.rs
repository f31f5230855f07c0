//! Constraint subsystem.
//!
//! Fourteen built-in constraints in four tiers, evaluated in tier order:
//!
//! | Tier | Constraints |
//! |------|-------------|
//! | Core-hard | teacher conflict, classroom conflict |
//! | Configurable-hard | teacher / classroom availability, capacity, prerequisite separation, workload limit |
//! | Physical-soft | equipment, room type, campus travel |
//! | Quality-soft | preference, workload balance, compactness, mobility |
//!
//! Custom constraints implement [`Constraint`] and are added through
//! [`ConstraintManager::register`].

mod configurable_hard;
mod core_hard;
mod manager;
mod physical_soft;
mod quality_soft;
mod types;

pub use configurable_hard::{
    ClassroomAvailabilityConstraint, ClassroomCapacityConstraint,
    PrerequisiteSeparationConstraint, TeacherAvailabilityConstraint,
    TeacherWorkloadLimitConstraint,
};
pub use core_hard::{ClassroomConflictConstraint, TeacherConflictConstraint};
pub use manager::{ApplicationLevel, BatchEvaluation, ConstraintManager};
pub use physical_soft::{CampusTravelConstraint, EquipmentMatchConstraint, RoomTypeMatchConstraint};
pub use quality_soft::{
    ScheduleCompactnessConstraint, TeacherMobilityConstraint, TeacherPreferenceConstraint,
    WorkloadBalanceConstraint, BACK_TO_BACK_MINUTES, MAX_IDLE_MINUTES, NEUTRAL_PREFERENCE,
};
pub use types::{Constraint, ConstraintCategory, ConstraintMeta, ConstraintOutcome, ConstraintTier};
