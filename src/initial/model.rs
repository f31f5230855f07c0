//! Boolean assignment model.
//!
//! One [`BoolVar`] per surviving (unit, teacher, classroom, slot)
//! candidate, plus relational [`ModelRule`]s contributed by the hard
//! constraints. Candidates rejected by static pruning never become
//! variables.

use crate::model::{
    ClassroomId, CourseId, SchedulingProblem, TeacherId, TimeSlot, TimeSlotId, Unit,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One possible placement of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Candidate {
    pub unit: Unit,
    pub course_id: CourseId,
    pub teacher_id: TeacherId,
    pub classroom_id: ClassroomId,
    pub time_slot_id: TimeSlotId,
    pub day: u8,
    /// Length of the slot in minutes.
    pub minutes: u32,
}

impl Candidate {
    pub fn new(
        unit: Unit,
        course_id: CourseId,
        teacher_id: TeacherId,
        classroom_id: ClassroomId,
        slot: &TimeSlot,
    ) -> Self {
        Self {
            unit,
            course_id,
            teacher_id,
            classroom_id,
            time_slot_id: slot.id,
            day: slot.day,
            minutes: slot.duration_minutes(),
        }
    }
}

/// A 0/1 decision: is `candidate` part of the timetable?
#[derive(Debug, Clone)]
pub struct BoolVar {
    pub name: String,
    pub candidate: Candidate,
}

impl BoolVar {
    pub fn new(candidate: Candidate) -> Self {
        Self {
            name: format!(
                "x_s{}_{}_t{}_r{}_ts{}",
                candidate.unit.section_id,
                candidate.unit.session,
                candidate.teacher_id,
                candidate.classroom_id,
                candidate.time_slot_id
            ),
            candidate,
        }
    }
}

/// A rule over variable indices.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelRule {
    /// Exactly one variable is true.
    ExactlyOne { vars: Vec<usize> },

    /// At most one variable is true.
    AtMostOne { vars: Vec<usize> },

    /// Variables of `left` and variables of `right` are never true
    /// together.
    Disjoint { left: Vec<usize>, right: Vec<usize> },

    /// Sum of demands of true variables stays within `capacity`.
    Capacity {
        vars: Vec<usize>,
        /// Demand of each variable (parallel to `vars`).
        demands: Vec<i64>,
        capacity: i64,
    },
}

/// Variables and rules of one initial-solution search.
#[derive(Debug, Clone)]
pub struct AssignmentModel {
    pub name: String,
    problem: Arc<SchedulingProblem>,
    units: Vec<Unit>,
    vars: Vec<BoolVar>,
    /// Variable indices per unit (parallel to `units`).
    unit_vars: Vec<Vec<usize>>,
    rules: Vec<ModelRule>,
}

impl AssignmentModel {
    /// Empty model covering every unit of `problem`, units sorted.
    pub fn new(name: impl Into<String>, problem: Arc<SchedulingProblem>) -> Self {
        let mut units = problem.units();
        units.sort_unstable();
        Self {
            name: name.into(),
            unit_vars: vec![Vec::new(); units.len()],
            units,
            problem,
            vars: Vec::new(),
            rules: Vec::new(),
        }
    }

    pub fn problem(&self) -> &Arc<SchedulingProblem> {
        &self.problem
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn vars(&self) -> &[BoolVar] {
        &self.vars
    }

    pub fn var(&self, index: usize) -> &BoolVar {
        &self.vars[index]
    }

    pub fn rules(&self) -> &[ModelRule] {
        &self.rules
    }

    /// Variable indices of the unit at position `unit_index`.
    pub fn unit_vars(&self, unit_index: usize) -> &[usize] {
        &self.unit_vars[unit_index]
    }

    /// Units without any surviving candidate.
    pub fn empty_units(&self) -> Vec<Unit> {
        self.units
            .iter()
            .zip(&self.unit_vars)
            .filter(|(_, vars)| vars.is_empty())
            .map(|(u, _)| *u)
            .collect()
    }

    /// Adds a variable for `candidate` and returns its index. Candidates of
    /// units outside the model are ignored.
    pub fn add_candidate(&mut self, candidate: Candidate) -> Option<usize> {
        let unit_index = self.units.binary_search(&candidate.unit).ok()?;
        let index = self.vars.len();
        self.vars.push(BoolVar::new(candidate));
        self.unit_vars[unit_index].push(index);
        Some(index)
    }

    /// Adds an exactly-one rule over each unit's variables.
    pub fn add_unit_rules(&mut self) {
        let groups: Vec<Vec<usize>> = self.unit_vars.clone();
        for vars in groups {
            self.rules.push(ModelRule::ExactlyOne { vars });
        }
    }

    /// Groups variable indices by `key`, skipping candidates mapped to
    /// `None`.
    pub fn group_by<K: Ord>(&self, key: impl Fn(&Candidate) -> Option<K>) -> BTreeMap<K, Vec<usize>> {
        let mut groups: BTreeMap<K, Vec<usize>> = BTreeMap::new();
        for (i, v) in self.vars.iter().enumerate() {
            if let Some(k) = key(&v.candidate) {
                groups.entry(k).or_default().push(i);
            }
        }
        groups
    }

    /// At-most-one rule; groups of size one or less are dropped.
    pub fn add_at_most_one(&mut self, vars: Vec<usize>) {
        if vars.len() > 1 {
            self.rules.push(ModelRule::AtMostOne { vars });
        }
    }

    pub fn add_disjoint(&mut self, left: Vec<usize>, right: Vec<usize>) {
        if !left.is_empty() && !right.is_empty() {
            self.rules.push(ModelRule::Disjoint { left, right });
        }
    }

    /// Capacity rule. Skipped when even all variables together fit.
    pub fn add_capacity(&mut self, vars: Vec<usize>, demand: impl Fn(&Candidate) -> i64, capacity: i64) {
        let demands: Vec<i64> = vars.iter().map(|&i| demand(&self.vars[i].candidate)).collect();
        if demands.iter().sum::<i64>() <= capacity {
            return;
        }
        self.rules.push(ModelRule::Capacity {
            vars,
            demands,
            capacity,
        });
    }

    /// Checks rule indices and shapes.
    pub fn validate(&self) -> Result<(), String> {
        let n = self.vars.len();
        let check = |vars: &[usize]| -> Result<(), String> {
            match vars.iter().find(|&&i| i >= n) {
                Some(i) => Err(format!("rule references unknown variable {i}")),
                None => Ok(()),
            }
        };
        for rule in &self.rules {
            match rule {
                ModelRule::ExactlyOne { vars } | ModelRule::AtMostOne { vars } => check(vars)?,
                ModelRule::Disjoint { left, right } => {
                    check(left)?;
                    check(right)?;
                }
                ModelRule::Capacity {
                    vars,
                    demands,
                    capacity,
                } => {
                    check(vars)?;
                    if vars.len() != demands.len() {
                        return Err("capacity demands must parallel variables".into());
                    }
                    if *capacity < 0 {
                        return Err(format!("capacity {capacity} is negative"));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::tiny_problem;

    fn full_model() -> AssignmentModel {
        let p = tiny_problem();
        let mut m = AssignmentModel::new("tiny", p.clone());
        for unit in p.units() {
            let course = p.section(unit.section_id).map(|s| s.course_id).unwrap_or(0);
            for t in &p.teachers {
                for r in &p.classrooms {
                    for s in &p.time_slots {
                        m.add_candidate(Candidate::new(unit, course, t.id, r.id, s));
                    }
                }
            }
        }
        m
    }

    #[test]
    fn test_candidates_indexed_by_unit() {
        let m = full_model();
        assert_eq!(m.vars().len(), 24);
        assert_eq!(m.unit_vars(0).len(), 12);
        assert!(m.empty_units().is_empty());
        assert!(m.var(0).name.starts_with("x_s1_0_"));
    }

    #[test]
    fn test_group_by_and_rules() {
        let mut m = full_model();
        m.add_unit_rules();
        for (_, vars) in m.group_by(|c| Some((c.teacher_id, c.time_slot_id))) {
            m.add_at_most_one(vars);
        }
        // 2 unit rules + 2 teachers x 3 slots
        assert_eq!(m.rules().len(), 8);
        assert!(m.validate().is_ok());
    }

    #[test]
    fn test_trivial_capacity_is_skipped() {
        let mut m = full_model();
        let vars: Vec<usize> = (0..4).collect();
        m.add_capacity(vars.clone(), |c| i64::from(c.minutes), 10_000);
        assert!(m.rules().is_empty());
        m.add_capacity(vars, |c| i64::from(c.minutes), 60);
        assert_eq!(m.rules().len(), 1);
    }

    #[test]
    fn test_invalid_rule_detected() {
        let mut m = full_model();
        m.add_at_most_one(vec![0, 999]);
        assert!(m.validate().is_err());
    }
}
