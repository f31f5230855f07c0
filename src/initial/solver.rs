//! Propagation and depth-first search over an [`AssignmentModel`].

use super::model::{AssignmentModel, ModelRule};
use crate::cancel::StopSignal;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Status of the solver after execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    /// At least one solution found.
    Feasible,
    /// The full search tree was explored without a solution.
    Infeasible,
    /// Node budget exhausted before any solution.
    BudgetExhausted,
    /// Stopped by cancellation or deadline before any solution.
    Stopped,
    /// Model is invalid or malformed.
    ModelInvalid,
}

/// Solver configuration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SearchConfig {
    /// Maximum search nodes per restart.
    pub node_limit: u64,
    /// Wall-clock budget for the whole solve, in milliseconds.
    pub time_limit_ms: Option<u64>,
    /// Number of distinct solutions wanted.
    pub max_solutions: usize,
    /// Restarts allowed per wanted solution.
    pub restarts_per_solution: usize,
    /// Seed for value ordering.
    pub seed: u64,
    /// Prune candidates whose room lacks required equipment on the first
    /// attempt.
    pub strict_equipment: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            node_limit: 200_000,
            time_limit_ms: Some(10_000),
            max_solutions: 1,
            restarts_per_solution: 3,
            seed: 42,
            strict_equipment: true,
        }
    }
}

impl SearchConfig {
    pub fn with_node_limit(mut self, n: u64) -> Self {
        self.node_limit = n;
        self
    }

    pub fn with_time_limit_ms(mut self, ms: u64) -> Self {
        self.time_limit_ms = Some(ms);
        self
    }

    pub fn with_max_solutions(mut self, n: usize) -> Self {
        self.max_solutions = n;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_strict_equipment(mut self, strict: bool) -> Self {
        self.strict_equipment = strict;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.node_limit == 0 {
            return Err("node_limit must be positive".into());
        }
        if self.max_solutions == 0 {
            return Err("max_solutions must be at least 1".into());
        }
        if self.restarts_per_solution == 0 {
            return Err("restarts_per_solution must be at least 1".into());
        }
        Ok(())
    }
}

/// Solutions found by a solve. Each solution holds the chosen variable
/// index per unit, parallel to [`AssignmentModel::units`].
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub status: SolverStatus,
    pub solutions: Vec<Vec<usize>>,
    /// Search nodes visited over all restarts.
    pub nodes: u64,
    pub solve_time_ms: u64,
}

impl SearchResult {
    pub fn empty(status: SolverStatus) -> Self {
        Self {
            status,
            solutions: Vec::new(),
            nodes: 0,
            solve_time_ms: 0,
        }
    }

    pub fn is_solution_found(&self) -> bool {
        !self.solutions.is_empty()
    }
}

/// Trait for assignment-model solvers.
pub trait CpSolver {
    fn solve(&self, model: &AssignmentModel, config: &SearchConfig, stop: &StopSignal) -> SearchResult;
}

/// Forward-checking depth-first solver.
///
/// - Units are branched in minimum-remaining-values order.
/// - Assigning a variable immediately falsifies every variable it
///   excludes; a unit left with one live variable is forced.
/// - Changes are recorded on a trail and undone on backtrack.
/// - Each restart shuffles value order with a fresh seed so repeated
///   restarts yield different solutions.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropagationSolver;

impl PropagationSolver {
    pub fn new() -> Self {
        Self
    }
}

impl CpSolver for PropagationSolver {
    fn solve(&self, model: &AssignmentModel, config: &SearchConfig, stop: &StopSignal) -> SearchResult {
        if model.validate().is_err() || config.validate().is_err() {
            return SearchResult::empty(SolverStatus::ModelInvalid);
        }
        let start = Instant::now();
        let stop = stop.child(config.time_limit_ms.map(Duration::from_millis));
        let index = RuleIndex::new(model);

        let mut result = SearchResult::empty(SolverStatus::Infeasible);
        let mut budget_hit = false;
        let mut stopped = false;
        let attempts = config.max_solutions * config.restarts_per_solution;

        for restart in 0..attempts {
            let mut search = Search::new(
                model,
                &index,
                &stop,
                config.node_limit,
                config.seed.wrapping_add(restart as u64),
            );
            let step = search.run();
            result.nodes += search.nodes;
            trace!(restart, nodes = search.nodes, ?step, "restart finished");
            match step {
                Step::Found => {
                    let chosen = search.solution();
                    if !result.solutions.contains(&chosen) {
                        result.solutions.push(chosen);
                    }
                    if result.solutions.len() >= config.max_solutions {
                        break;
                    }
                }
                // Complete tree explored: nothing else to find.
                Step::Failed => break,
                Step::Budget => budget_hit = true,
                Step::Stopped => {
                    stopped = true;
                    break;
                }
            }
        }

        result.status = if result.is_solution_found() {
            SolverStatus::Feasible
        } else if stopped {
            SolverStatus::Stopped
        } else if budget_hit {
            SolverStatus::BudgetExhausted
        } else {
            SolverStatus::Infeasible
        };
        result.solve_time_ms = start.elapsed().as_millis() as u64;
        debug!(
            status = ?result.status,
            solutions = result.solutions.len(),
            nodes = result.nodes,
            "assignment search finished"
        );
        result
    }
}

/// Static lookup tables shared by every restart.
struct RuleIndex {
    var_unit: Vec<usize>,
    var_rules: Vec<Vec<usize>>,
}

impl RuleIndex {
    fn new(model: &AssignmentModel) -> Self {
        let n = model.vars().len();
        let mut var_unit = vec![0; n];
        for u in 0..model.units().len() {
            for &v in model.unit_vars(u) {
                var_unit[v] = u;
            }
        }
        let mut var_rules = vec![Vec::new(); n];
        for (r, rule) in model.rules().iter().enumerate() {
            let mut touch = |vars: &[usize]| {
                for &v in vars {
                    var_rules[v].push(r);
                }
            };
            match rule {
                ModelRule::ExactlyOne { vars }
                | ModelRule::AtMostOne { vars }
                | ModelRule::Capacity { vars, .. } => touch(vars),
                ModelRule::Disjoint { left, right } => {
                    touch(left);
                    touch(right);
                }
            }
        }
        Self { var_unit, var_rules }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Found,
    Failed,
    Budget,
    Stopped,
}

enum Trail {
    Var(usize),
    Load(usize, i64),
}

struct Search<'a> {
    model: &'a AssignmentModel,
    index: &'a RuleIndex,
    stop: &'a StopSignal,
    node_limit: u64,
    nodes: u64,
    rng: StdRng,
    value: Vec<Option<bool>>,
    /// Live (not falsified) variables per unit.
    alive: Vec<usize>,
    chosen: Vec<Option<usize>>,
    load: Vec<i64>,
    trail: Vec<Trail>,
    forced: Vec<usize>,
}

impl<'a> Search<'a> {
    fn new(
        model: &'a AssignmentModel,
        index: &'a RuleIndex,
        stop: &'a StopSignal,
        node_limit: u64,
        seed: u64,
    ) -> Self {
        let units = model.units().len();
        Self {
            model,
            index,
            stop,
            node_limit,
            nodes: 0,
            rng: StdRng::seed_from_u64(seed),
            value: vec![None; model.vars().len()],
            alive: (0..units).map(|u| model.unit_vars(u).len()).collect(),
            chosen: vec![None; units],
            load: vec![0; model.rules().len()],
            trail: Vec::new(),
            forced: Vec::new(),
        }
    }

    fn run(&mut self) -> Step {
        if self.alive.iter().any(|&a| a == 0) {
            return Step::Failed;
        }
        self.forced = (0..self.alive.len()).filter(|&u| self.alive[u] == 1).collect();
        if !self.propagate_forced() {
            return Step::Failed;
        }
        self.dfs()
    }

    fn solution(&self) -> Vec<usize> {
        self.chosen.iter().flatten().copied().collect()
    }

    fn dfs(&mut self) -> Step {
        if self.stop.should_stop() {
            return Step::Stopped;
        }
        if self.nodes >= self.node_limit {
            return Step::Budget;
        }
        self.nodes += 1;

        let Some(unit) = self.pick_unit() else {
            return Step::Found;
        };
        let model = self.model;
        let mut options: Vec<usize> = model
            .unit_vars(unit)
            .iter()
            .copied()
            .filter(|&v| self.value[v].is_none())
            .collect();
        options.shuffle(&mut self.rng);

        for v in options {
            let mark = self.trail.len();
            if self.assign(v) {
                match self.dfs() {
                    Step::Failed => {}
                    other => return other,
                }
            }
            self.undo(mark);
        }
        Step::Failed
    }

    /// Unassigned unit with the fewest live variables.
    fn pick_unit(&self) -> Option<usize> {
        (0..self.alive.len())
            .filter(|&u| self.chosen[u].is_none())
            .min_by_key(|&u| (self.alive[u], u))
    }

    fn assign(&mut self, v: usize) -> bool {
        self.forced.clear();
        self.set_true(v) && self.propagate_forced()
    }

    fn propagate_forced(&mut self) -> bool {
        while let Some(u) = self.forced.pop() {
            if self.chosen[u].is_some() {
                continue;
            }
            let model = self.model;
            let Some(&v) = model.unit_vars(u).iter().find(|&&v| self.value[v].is_none()) else {
                return false;
            };
            if !self.set_true(v) {
                return false;
            }
        }
        true
    }

    fn set_false(&mut self, v: usize) -> bool {
        match self.value[v] {
            Some(false) => return true,
            Some(true) => return false,
            None => {}
        }
        self.value[v] = Some(false);
        self.trail.push(Trail::Var(v));
        let u = self.index.var_unit[v];
        self.alive[u] -= 1;
        if self.chosen[u].is_none() {
            match self.alive[u] {
                0 => return false,
                1 => self.forced.push(u),
                _ => {}
            }
        }
        true
    }

    fn set_true(&mut self, v: usize) -> bool {
        match self.value[v] {
            Some(true) => return true,
            Some(false) => return false,
            None => {}
        }
        self.value[v] = Some(true);
        self.trail.push(Trail::Var(v));
        self.chosen[self.index.var_unit[v]] = Some(v);

        let model = self.model;
        let index = self.index;
        for &r in &index.var_rules[v] {
            match &model.rules()[r] {
                ModelRule::ExactlyOne { vars } | ModelRule::AtMostOne { vars } => {
                    for &o in vars {
                        if o != v && !self.set_false(o) {
                            return false;
                        }
                    }
                }
                ModelRule::Disjoint { left, right } => {
                    let other = if left.contains(&v) { right } else { left };
                    for &o in other {
                        if !self.set_false(o) {
                            return false;
                        }
                    }
                }
                ModelRule::Capacity {
                    vars,
                    demands,
                    capacity,
                } => {
                    let Some(pos) = vars.iter().position(|&x| x == v) else {
                        continue;
                    };
                    let demand = demands[pos];
                    self.load[r] += demand;
                    self.trail.push(Trail::Load(r, demand));
                    if self.load[r] > *capacity {
                        return false;
                    }
                    for (&o, &d) in vars.iter().zip(demands) {
                        if self.value[o].is_none() && self.load[r] + d > *capacity && !self.set_false(o) {
                            return false;
                        }
                    }
                }
            }
        }
        true
    }

    fn undo(&mut self, mark: usize) {
        while self.trail.len() > mark {
            match self.trail.pop() {
                Some(Trail::Var(v)) => {
                    let u = self.index.var_unit[v];
                    match self.value[v] {
                        Some(false) => self.alive[u] += 1,
                        Some(true) => self.chosen[u] = None,
                        None => {}
                    }
                    self.value[v] = None;
                }
                Some(Trail::Load(r, d)) => self.load[r] -= d,
                None => break,
            }
        }
        self.forced.clear();
    }
}
