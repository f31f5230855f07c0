//! Immutable problem description.
//!
//! A [`SchedulingProblem`] is built once per run through [`ProblemBuilder`],
//! validated, indexed by id, and then shared read-only (behind an `Arc`)
//! by every solution and engine.

use super::validation::validate_problem;
use crate::error::{Result, TimetableError};
use std::collections::{HashMap, HashSet};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub type SectionId = u32;
pub type CourseId = u32;
pub type TeacherId = u32;
pub type ClassroomId = u32;
pub type TimeSlotId = u32;

/// A schedulable unit of a course.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CourseSection {
    pub id: SectionId,
    pub course_id: CourseId,
    pub name: String,
    /// Expected number of students.
    pub enrollment: u32,
    pub required_equipment: Vec<String>,
    /// Preferred room type (e.g. "lab", "lecture").
    pub room_type: Option<String>,
    /// Weekly meetings. Each meeting becomes one assignment.
    pub sessions_per_week: u32,
    /// Teacher fixed in advance; `None` lets the engine choose.
    pub teacher_id: Option<TeacherId>,
    /// Restricts teacher choice to this department when not pre-bound.
    pub department: Option<String>,
}

impl CourseSection {
    pub fn new(id: SectionId, course_id: CourseId, enrollment: u32) -> Self {
        Self {
            id,
            course_id,
            name: format!("S{id}"),
            enrollment,
            required_equipment: Vec::new(),
            room_type: None,
            sessions_per_week: 1,
            teacher_id: None,
            department: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_equipment(mut self, equipment: &[&str]) -> Self {
        self.required_equipment = equipment.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn with_room_type(mut self, room_type: impl Into<String>) -> Self {
        self.room_type = Some(room_type.into());
        self
    }

    pub fn with_sessions(mut self, sessions: u32) -> Self {
        self.sessions_per_week = sessions;
        self
    }

    pub fn with_teacher(mut self, teacher_id: TeacherId) -> Self {
        self.teacher_id = Some(teacher_id);
        self
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }
}

/// A teacher and their workload limits.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Teacher {
    pub id: TeacherId,
    pub name: String,
    pub department: Option<String>,
    pub max_weekly_hours: Option<u32>,
    pub max_daily_hours: Option<u32>,
    pub max_consecutive_hours: Option<u32>,
}

impl Teacher {
    pub fn new(id: TeacherId) -> Self {
        Self {
            id,
            name: format!("T{id}"),
            department: None,
            max_weekly_hours: None,
            max_daily_hours: None,
            max_consecutive_hours: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    pub fn with_max_weekly_hours(mut self, hours: u32) -> Self {
        self.max_weekly_hours = Some(hours);
        self
    }

    pub fn with_max_daily_hours(mut self, hours: u32) -> Self {
        self.max_daily_hours = Some(hours);
        self
    }

    pub fn with_max_consecutive_hours(mut self, hours: u32) -> Self {
        self.max_consecutive_hours = Some(hours);
        self
    }
}

/// A room.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Classroom {
    pub id: ClassroomId,
    pub name: String,
    pub capacity: u32,
    pub room_type: Option<String>,
    pub equipment: Vec<String>,
    pub building: String,
    pub campus: String,
}

impl Classroom {
    pub fn new(id: ClassroomId, capacity: u32) -> Self {
        Self {
            id,
            name: format!("R{id}"),
            capacity,
            room_type: None,
            equipment: Vec::new(),
            building: "main".into(),
            campus: "main".into(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_room_type(mut self, room_type: impl Into<String>) -> Self {
        self.room_type = Some(room_type.into());
        self
    }

    pub fn with_equipment(mut self, equipment: &[&str]) -> Self {
        self.equipment = equipment.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn with_location(mut self, building: impl Into<String>, campus: impl Into<String>) -> Self {
        self.building = building.into();
        self.campus = campus.into();
        self
    }

    /// Whether every item in `required` is present in this room.
    pub fn has_equipment(&self, required: &[String]) -> bool {
        required.iter().all(|r| self.equipment.contains(r))
    }
}

/// A weekly time slot. Times are minutes since midnight.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimeSlot {
    pub id: TimeSlotId,
    /// Day of week, 1 = Monday ... 7 = Sunday.
    pub day: u8,
    pub start_minute: u16,
    pub end_minute: u16,
}

impl TimeSlot {
    pub fn new(id: TimeSlotId, day: u8, start_minute: u16, end_minute: u16) -> Self {
        Self {
            id,
            day,
            start_minute,
            end_minute,
        }
    }

    pub fn duration_minutes(&self) -> u32 {
        u32::from(self.end_minute.saturating_sub(self.start_minute))
    }

    /// Whether the two half-open `[start, end)` ranges intersect on the
    /// same day.
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.day == other.day && self.start_minute < other.end_minute && other.start_minute < self.end_minute
    }

    /// Minutes between the end of `self` and the start of `next` on the
    /// same day, or `None` when they are on different days or overlap.
    pub fn gap_before(&self, next: &TimeSlot) -> Option<u32> {
        if self.day != next.day || next.start_minute < self.end_minute {
            return None;
        }
        Some(u32::from(next.start_minute - self.end_minute))
    }
}

/// One weekly meeting of a section. The initial model places exactly one
/// assignment per unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Unit {
    pub section_id: SectionId,
    pub session: u32,
}

/// Immutable description of one scheduling run.
#[derive(Debug, Clone)]
pub struct SchedulingProblem {
    pub sections: Vec<CourseSection>,
    pub teachers: Vec<Teacher>,
    pub classrooms: Vec<Classroom>,
    pub time_slots: Vec<TimeSlot>,
    pub teacher_availability: HashMap<(TeacherId, TimeSlotId), bool>,
    pub classroom_availability: HashMap<(ClassroomId, TimeSlotId), bool>,
    /// Teacher time preference, 1 (avoid) to 5 (prefer).
    pub teacher_preferences: HashMap<(TeacherId, TimeSlotId), u8>,
    /// (course, prerequisite course) pairs.
    pub prerequisites: Vec<(CourseId, CourseId)>,
    /// Travel minutes between campuses, stored in one direction.
    pub travel_minutes: HashMap<(String, String), u32>,
    section_index: HashMap<SectionId, usize>,
    teacher_index: HashMap<TeacherId, usize>,
    classroom_index: HashMap<ClassroomId, usize>,
    slot_index: HashMap<TimeSlotId, usize>,
    related_courses: HashSet<(CourseId, CourseId)>,
}

impl SchedulingProblem {
    pub fn builder() -> ProblemBuilder {
        ProblemBuilder::default()
    }

    pub fn section(&self, id: SectionId) -> Option<&CourseSection> {
        self.section_index.get(&id).map(|&i| &self.sections[i])
    }

    pub fn teacher(&self, id: TeacherId) -> Option<&Teacher> {
        self.teacher_index.get(&id).map(|&i| &self.teachers[i])
    }

    pub fn classroom(&self, id: ClassroomId) -> Option<&Classroom> {
        self.classroom_index.get(&id).map(|&i| &self.classrooms[i])
    }

    pub fn time_slot(&self, id: TimeSlotId) -> Option<&TimeSlot> {
        self.slot_index.get(&id).map(|&i| &self.time_slots[i])
    }

    /// A missing availability record counts as available.
    pub fn is_teacher_available(&self, teacher: TeacherId, slot: TimeSlotId) -> bool {
        self.teacher_availability
            .get(&(teacher, slot))
            .copied()
            .unwrap_or(true)
    }

    /// A missing availability record counts as available.
    pub fn is_classroom_available(&self, classroom: ClassroomId, slot: TimeSlotId) -> bool {
        self.classroom_availability
            .get(&(classroom, slot))
            .copied()
            .unwrap_or(true)
    }

    pub fn preference(&self, teacher: TeacherId, slot: TimeSlotId) -> Option<u8> {
        self.teacher_preferences.get(&(teacher, slot)).copied()
    }

    /// Travel minutes between two campuses (symmetric, 0 for same campus
    /// or unknown pairs).
    pub fn travel_minutes(&self, from: &str, to: &str) -> u32 {
        if from == to {
            return 0;
        }
        self.travel_minutes
            .get(&(from.to_string(), to.to_string()))
            .or_else(|| self.travel_minutes.get(&(to.to_string(), from.to_string())))
            .copied()
            .unwrap_or(0)
    }

    /// Whether one course is a prerequisite of the other, in either
    /// direction.
    pub fn are_prerequisite_related(&self, a: CourseId, b: CourseId) -> bool {
        self.related_courses.contains(&(a, b))
    }

    /// All meeting units, ordered by section then session.
    pub fn units(&self) -> Vec<Unit> {
        self.sections
            .iter()
            .flat_map(|s| {
                (0..s.sessions_per_week).map(move |session| Unit {
                    section_id: s.id,
                    session,
                })
            })
            .collect()
    }

    pub fn unit_count(&self) -> usize {
        self.sections
            .iter()
            .map(|s| s.sessions_per_week as usize)
            .sum()
    }

    /// Teachers eligible to teach `section`: the pre-bound teacher, else
    /// teachers of the section's department, else everyone.
    pub fn candidate_teachers(&self, section: &CourseSection) -> Vec<TeacherId> {
        if let Some(t) = section.teacher_id {
            return vec![t];
        }
        match &section.department {
            Some(dept) => self
                .teachers
                .iter()
                .filter(|t| t.department.as_deref() == Some(dept.as_str()))
                .map(|t| t.id)
                .collect(),
            None => self.teachers.iter().map(|t| t.id).collect(),
        }
    }

    /// Capacity fit for a section in a room.
    pub fn fits_capacity(&self, section: &CourseSection, classroom: &Classroom) -> bool {
        classroom.capacity >= section.enrollment
    }
}

/// Collects problem data and validates it on [`build`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct ProblemBuilder {
    sections: Vec<CourseSection>,
    teachers: Vec<Teacher>,
    classrooms: Vec<Classroom>,
    time_slots: Vec<TimeSlot>,
    teacher_availability: HashMap<(TeacherId, TimeSlotId), bool>,
    classroom_availability: HashMap<(ClassroomId, TimeSlotId), bool>,
    teacher_preferences: HashMap<(TeacherId, TimeSlotId), u8>,
    prerequisites: Vec<(CourseId, CourseId)>,
    travel_minutes: HashMap<(String, String), u32>,
}

impl ProblemBuilder {
    pub fn section(mut self, section: CourseSection) -> Self {
        self.sections.push(section);
        self
    }

    pub fn teacher(mut self, teacher: Teacher) -> Self {
        self.teachers.push(teacher);
        self
    }

    pub fn classroom(mut self, classroom: Classroom) -> Self {
        self.classrooms.push(classroom);
        self
    }

    pub fn time_slot(mut self, slot: TimeSlot) -> Self {
        self.time_slots.push(slot);
        self
    }

    pub fn teacher_availability(mut self, teacher: TeacherId, slot: TimeSlotId, available: bool) -> Self {
        self.teacher_availability.insert((teacher, slot), available);
        self
    }

    pub fn classroom_availability(
        mut self,
        classroom: ClassroomId,
        slot: TimeSlotId,
        available: bool,
    ) -> Self {
        self.classroom_availability.insert((classroom, slot), available);
        self
    }

    pub fn preference(mut self, teacher: TeacherId, slot: TimeSlotId, level: u8) -> Self {
        self.teacher_preferences.insert((teacher, slot), level);
        self
    }

    /// Declares `prerequisite` as a prerequisite of `course`.
    pub fn prerequisite(mut self, course: CourseId, prerequisite: CourseId) -> Self {
        self.prerequisites.push((course, prerequisite));
        self
    }

    pub fn travel(mut self, from: impl Into<String>, to: impl Into<String>, minutes: u32) -> Self {
        self.travel_minutes.insert((from.into(), to.into()), minutes);
        self
    }

    /// Validates and indexes the problem.
    pub fn build(self) -> Result<SchedulingProblem> {
        let problem = SchedulingProblem {
            section_index: index_by(&self.sections, |s| s.id),
            teacher_index: index_by(&self.teachers, |t| t.id),
            classroom_index: index_by(&self.classrooms, |c| c.id),
            slot_index: index_by(&self.time_slots, |s| s.id),
            related_courses: self
                .prerequisites
                .iter()
                .flat_map(|&(a, b)| [(a, b), (b, a)])
                .collect(),
            sections: self.sections,
            teachers: self.teachers,
            classrooms: self.classrooms,
            time_slots: self.time_slots,
            teacher_availability: self.teacher_availability,
            classroom_availability: self.classroom_availability,
            teacher_preferences: self.teacher_preferences,
            prerequisites: self.prerequisites,
            travel_minutes: self.travel_minutes,
        };
        validate_problem(&problem).map_err(TimetableError::Validation)?;
        Ok(problem)
    }
}

fn index_by<T, K: std::hash::Hash + Eq>(items: &[T], key: impl Fn(&T) -> K) -> HashMap<K, usize> {
    items.iter().enumerate().map(|(i, item)| (key(item), i)).collect()
}
