//! Shared test fixtures.

use crate::model::{
    AssignmentId, Classroom, ClassroomId, CourseSection, SchedulingAssignment, SchedulingProblem,
    SectionId, Teacher, TeacherId, TimeSlot, TimeSlotId, Unit,
};
use crate::cancel::StopSignal;
use crate::evaluator::SolutionEvaluator;
use crate::initial::{InitialSolutionGenerator, SearchConfig};
use crate::model::SchedulingSolution;
use std::sync::Arc;

/// Two sections, two teachers, two rooms of 30 seats, three morning slots
/// on Monday.
pub fn tiny_problem() -> Arc<SchedulingProblem> {
    Arc::new(
        SchedulingProblem::builder()
            .section(CourseSection::new(1, 10, 20))
            .section(CourseSection::new(2, 20, 25))
            .teacher(Teacher::new(1))
            .teacher(Teacher::new(2))
            .classroom(Classroom::new(1, 30))
            .classroom(Classroom::new(2, 30))
            .time_slot(TimeSlot::new(1, 1, 540, 600))
            .time_slot(TimeSlot::new(2, 1, 600, 660))
            .time_slot(TimeSlot::new(3, 1, 660, 720))
            .build()
            .expect("tiny problem is valid"),
    )
}

/// Ten sections, five teachers, eight rooms and fifteen slots (three per
/// weekday). Sections 2 and 3 belong to courses in a prerequisite chain.
pub fn campus_problem() -> Arc<SchedulingProblem> {
    let mut b = SchedulingProblem::builder();
    for id in 1..=10u32 {
        b = b.section(CourseSection::new(id, 100 + id, 15 + id * 2));
    }
    for id in 1..=5u32 {
        b = b.teacher(Teacher::new(id).with_max_weekly_hours(10));
    }
    for id in 1..=8u32 {
        let campus = if id <= 4 { "north" } else { "south" };
        b = b.classroom(
            Classroom::new(id, 25 + id * 5).with_location(format!("B{}", (id + 1) / 2), campus),
        );
    }
    let mut slot = 1;
    for day in 1..=5u8 {
        for start in [540u16, 660, 780] {
            b = b.time_slot(TimeSlot::new(slot, day, start, start + 90));
            slot += 1;
        }
    }
    Arc::new(
        b.prerequisite(103, 102)
            .preference(1, 1, 5)
            .preference(2, 4, 1)
            .travel("north", "south", 30)
            .build()
            .expect("campus problem is valid"),
    )
}

/// First-session assignment built from problem ids.
pub fn assignment(
    problem: &Arc<SchedulingProblem>,
    id: AssignmentId,
    section: SectionId,
    teacher: TeacherId,
    classroom: ClassroomId,
    slot: TimeSlotId,
) -> SchedulingAssignment {
    let s = problem.time_slot(slot).expect("slot exists in fixture");
    SchedulingAssignment::new(
        id,
        Unit {
            section_id: section,
            session: 0,
        },
        teacher,
        classroom,
        s,
    )
}

/// First feasible timetable of [`campus_problem`].
pub fn campus_start(evaluator: &SolutionEvaluator) -> SchedulingSolution {
    InitialSolutionGenerator::new(evaluator)
        .generate(&campus_problem(), &SearchConfig::default(), &StopSignal::never())
        .into_solutions()
        .into_iter()
        .next()
        .expect("campus problem is feasible")
}

/// One section taught by a teacher who dislikes slots 1 and 2 and prefers
/// slot 3, placed in slot 1.
pub fn disliked_start() -> SchedulingSolution {
    let problem = Arc::new(
        SchedulingProblem::builder()
            .section(CourseSection::new(1, 10, 20))
            .teacher(Teacher::new(1))
            .classroom(Classroom::new(1, 30))
            .time_slot(TimeSlot::new(1, 1, 540, 600))
            .time_slot(TimeSlot::new(2, 1, 600, 660))
            .time_slot(TimeSlot::new(3, 1, 660, 720))
            .preference(1, 1, 1)
            .preference(1, 2, 1)
            .preference(1, 3, 5)
            .build()
            .expect("preference problem is valid"),
    );
    SchedulingSolution::from_assignments(problem.clone(), vec![assignment(&problem, 1, 1, 1, 1, 1)])
}
