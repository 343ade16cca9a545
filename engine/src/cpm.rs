//! Critical path computation via forward and backward passes.
//!
//! All timing arithmetic happens in integer working-day offsets from the
//! project start; the calendar converts to dates at the boundary. Finish
//! offsets are exclusive, so `EF = ES + duration` holds exactly and
//! criticality is the exact integer test `total_float == 0`.

use chrono::NaiveDate;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use thiserror::Error;

use crate::calendar::WorkCalendar;
use crate::config::ScheduleOptions;
use crate::graph::{DependencyGraph, GraphError};
use crate::models::{Constraint, Dependency, DependencyKind, Schedule, ScheduleEntry, Task};
use crate::{log_pass, log_step};

/// Errors that can occur while computing a schedule.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScheduleError {
    #[error("Dependency references unknown task: {task}")]
    UnknownTask { task: String },
    #[error("Duplicate task id: {task}")]
    DuplicateTask { task: String },
    #[error("Dependency cycle among tasks: {}", tasks.join(", "))]
    Cycle { tasks: Vec<String> },
    #[error("Task {task} has negative duration {duration}")]
    InvalidDuration { task: String, duration: i64 },
    #[error("Summary task {task} cannot appear in the precedence graph")]
    SummaryTaskInGraph { task: String },
    #[error("Summary task {task} cannot carry a date constraint")]
    SummaryConstraint { task: String },
    #[error(
        "Date constraint on task {task} contradicts its dependencies: \
         constrained to {constraint_date}, computed {computed_date}"
    )]
    ConstraintViolated {
        task: String,
        constraint_date: NaiveDate,
        computed_date: NaiveDate,
    },
    #[error(
        "Schedule is infeasible (worst float {worst_float}); negative float on: {}",
        tasks.join(", ")
    )]
    Infeasible { tasks: Vec<String>, worst_float: i64 },
}

impl From<GraphError> for ScheduleError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::UnknownTask { task } => ScheduleError::UnknownTask { task },
            GraphError::Cycle { path, .. } => ScheduleError::Cycle { tasks: path },
        }
    }
}

/// Per-task offsets computed by the passes.
#[derive(Clone, Copy, Debug, Default)]
struct Timing {
    es: i64,
    ef: i64,
    ls: i64,
    lf: i64,
}

/// One scheduling pass over an input snapshot.
pub struct CpmScheduler<'a> {
    tasks: &'a [Task],
    calendar: &'a WorkCalendar,
    options: &'a ScheduleOptions,
    graph: DependencyGraph,
    /// Children by parent id; a task with children is a summary task.
    children: FxHashMap<&'a str, Vec<&'a str>>,
    /// Leaf task durations by id.
    durations: FxHashMap<&'a str, i64>,
    /// First working day on or after the requested project start.
    project_start: NaiveDate,
}

impl<'a> CpmScheduler<'a> {
    /// Validate the snapshot and build the precedence graph.
    pub fn new(
        tasks: &'a [Task],
        dependencies: &'a [Dependency],
        calendar: &'a WorkCalendar,
        options: &'a ScheduleOptions,
    ) -> Result<Self, ScheduleError> {
        let mut children: FxHashMap<&str, Vec<&str>> = FxHashMap::default();
        let mut seen: FxHashSet<&str> =
            FxHashSet::with_capacity_and_hasher(tasks.len(), Default::default());
        for task in tasks {
            if !seen.insert(task.id.as_str()) {
                return Err(ScheduleError::DuplicateTask {
                    task: task.id.clone(),
                });
            }
            if task.duration < 0 {
                return Err(ScheduleError::InvalidDuration {
                    task: task.id.clone(),
                    duration: task.duration,
                });
            }
            if let Some(parent) = &task.parent {
                children.entry(parent.as_str()).or_default().push(&task.id);
            }
        }

        let mut durations: FxHashMap<&str, i64> = FxHashMap::default();
        for task in tasks {
            let is_summary = children.contains_key(task.id.as_str());
            if is_summary {
                // Summary spans are derived from descendants, so a date
                // constraint on the summary itself has nothing to bind to.
                if task.constraint != Constraint::AsSoonAsPossible {
                    return Err(ScheduleError::SummaryConstraint {
                        task: task.id.clone(),
                    });
                }
            } else {
                durations.insert(task.id.as_str(), task.duration);
            }
        }

        for dep in dependencies {
            for endpoint in [&dep.predecessor, &dep.successor] {
                if children.contains_key(endpoint.as_str()) {
                    return Err(ScheduleError::SummaryTaskInGraph {
                        task: endpoint.clone(),
                    });
                }
            }
        }

        let graph =
            DependencyGraph::from_dependencies(durations.keys().map(|id| id.to_string()), dependencies)?;

        Ok(Self {
            tasks,
            calendar,
            options,
            graph,
            children,
            durations,
            project_start: calendar.next_working_day(options.project_start),
        })
    }

    /// Run both passes and assemble the schedule.
    pub fn compute(&self) -> Result<Schedule, ScheduleError> {
        let verbosity = self.options.verbosity;
        let order = self.topological_order()?;

        let mut timings: FxHashMap<&str, Timing> =
            FxHashMap::with_capacity_and_hasher(order.len(), Default::default());

        self.forward_pass(&order, &mut timings)?;
        let project_duration = order
            .iter()
            .map(|id| timings[id.as_str()].ef)
            .max()
            .unwrap_or(0);
        log_pass!(
            verbosity,
            "Forward pass complete: {} tasks, project duration {} working days",
            order.len(),
            project_duration
        );

        self.backward_pass(&order, project_duration, &mut timings);
        log_pass!(verbosity, "Backward pass complete");

        // Negative float means dependencies and date constraints are
        // jointly unsatisfiable; report, never clamp.
        let mut negative: Vec<String> = order
            .iter()
            .filter(|id| {
                let t = &timings[id.as_str()];
                t.ls - t.es < 0
            })
            .cloned()
            .collect();
        if !negative.is_empty() {
            negative.sort();
            let worst_float = order
                .iter()
                .map(|id| {
                    let t = &timings[id.as_str()];
                    t.ls - t.es
                })
                .min()
                .unwrap_or(0);
            return Err(ScheduleError::Infeasible {
                tasks: negative,
                worst_float,
            });
        }

        Ok(self.assemble(&timings, project_duration))
    }

    /// Kahn's algorithm over the leaf tasks, in deterministic input order.
    ///
    /// The graph already rejects cycles at insertion; this re-checks the
    /// assembled edge set as defense in depth.
    fn topological_order(&self) -> Result<Vec<String>, ScheduleError> {
        let leaves: Vec<&str> = self
            .tasks
            .iter()
            .map(|t| t.id.as_str())
            .filter(|id| self.durations.contains_key(id))
            .collect();

        let mut in_degree: FxHashMap<&str, usize> =
            leaves.iter().map(|&id| (id, 0)).collect();
        for &id in &leaves {
            for _ in self.graph.predecessors(id) {
                if let Some(degree) = in_degree.get_mut(id) {
                    *degree += 1;
                }
            }
        }

        let mut queue: VecDeque<&str> = leaves
            .iter()
            .filter(|&&id| in_degree[id] == 0)
            .copied()
            .collect();

        let mut result: Vec<String> = Vec::with_capacity(leaves.len());
        while let Some(task_id) = queue.pop_front() {
            result.push(task_id.to_string());
            for edge in self.graph.successors(task_id) {
                if let Some(degree) = in_degree.get_mut(edge.successor.as_str()) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(edge.successor.as_str());
                    }
                }
            }
        }

        if result.len() != leaves.len() {
            let scheduled: FxHashSet<&str> = result.iter().map(String::as_str).collect();
            let mut remaining: Vec<String> = leaves
                .iter()
                .filter(|id| !scheduled.contains(**id))
                .map(|id| id.to_string())
                .collect();
            remaining.sort();
            return Err(ScheduleError::Cycle { tasks: remaining });
        }

        Ok(result)
    }

    fn forward_pass(
        &self,
        order: &[String],
        timings: &mut FxHashMap<&'a str, Timing>,
    ) -> Result<(), ScheduleError> {
        let verbosity = self.options.verbosity;
        let by_id: FxHashMap<&str, &Task> =
            self.tasks.iter().map(|t| (t.id.as_str(), t)).collect();

        for task_id in order {
            let task = by_id[task_id.as_str()];
            let duration = self.durations[task_id.as_str()];

            // Earliest start is the tightest incoming edge bound, never
            // before the project start (offset 0).
            let mut es: i64 = 0;
            for edge in self.graph.predecessors(task_id) {
                let pred = &timings[edge.predecessor.as_str()];
                let bound = match edge.kind {
                    DependencyKind::FinishToStart => pred.ef + edge.lag,
                    DependencyKind::StartToStart => pred.es + edge.lag,
                    DependencyKind::FinishToFinish => pred.ef + edge.lag - duration,
                    DependencyKind::StartToFinish => pred.es + edge.lag - duration,
                };
                if bound > es {
                    es = bound;
                }
            }

            match task.constraint {
                Constraint::AsSoonAsPossible | Constraint::AsLateAsPossible => {}
                Constraint::MustStartOn(date) => {
                    let pinned = self.calendar.start_offset_of(self.project_start, date);
                    if es > pinned {
                        return Err(self.constraint_violated(task_id, date, es));
                    }
                    es = pinned;
                }
                Constraint::StartNoEarlierThan(date) => {
                    let floor = self.calendar.start_offset_of(self.project_start, date);
                    if floor > es {
                        es = floor;
                    }
                }
                Constraint::StartNoLaterThan(date) => {
                    let cap = self.calendar.start_offset_of(self.project_start, date);
                    if es > cap {
                        return Err(self.constraint_violated(task_id, date, es));
                    }
                }
                Constraint::MustFinishOn(date) | Constraint::FinishNoEarlierThan(date) => {
                    // Pull the start out so the finish reaches the date; a
                    // dependency-forced later finish surfaces as negative
                    // float once the backward pass caps LF.
                    let floor = self.calendar.finish_offset_of(self.project_start, date) - duration;
                    if floor > es {
                        es = floor;
                    }
                }
                Constraint::FinishNoLaterThan(date) => {
                    let cap = self.calendar.finish_offset_of(self.project_start, date);
                    if es + duration > cap {
                        return Err(self.constraint_violated(task_id, date, es + duration - 1));
                    }
                }
            }

            log_step!(
                verbosity,
                "  {}: ES={} EF={}",
                task_id,
                es,
                es + duration
            );
            timings.insert(
                task.id.as_str(),
                Timing {
                    es,
                    ef: es + duration,
                    ls: 0,
                    lf: 0,
                },
            );
        }
        Ok(())
    }

    fn backward_pass(
        &self,
        order: &[String],
        project_duration: i64,
        timings: &mut FxHashMap<&'a str, Timing>,
    ) {
        let by_id: FxHashMap<&str, &Task> =
            self.tasks.iter().map(|t| (t.id.as_str(), t)).collect();

        // Every task must finish by the project end: the computed finish,
        // or the explicit target when the caller is compressing.
        let end_boundary = match self.options.finish_no_later_than {
            Some(date) => self.calendar.finish_offset_of(self.project_start, date),
            None => project_duration,
        };

        for task_id in order.iter().rev() {
            let task = by_id[task_id.as_str()];
            let duration = self.durations[task_id.as_str()];

            let mut lf = end_boundary;
            for edge in self.graph.successors(task_id) {
                let succ = &timings[edge.successor.as_str()];
                let bound = match edge.kind {
                    DependencyKind::FinishToStart => succ.ls - edge.lag,
                    DependencyKind::StartToStart => succ.ls - edge.lag + duration,
                    DependencyKind::FinishToFinish => succ.lf - edge.lag,
                    DependencyKind::StartToFinish => succ.lf - edge.lag + duration,
                };
                if bound < lf {
                    lf = bound;
                }
            }

            match task.constraint {
                Constraint::MustStartOn(date) => {
                    let pinned = self.calendar.start_offset_of(self.project_start, date);
                    lf = lf.min(pinned + duration);
                }
                Constraint::StartNoLaterThan(date) => {
                    let cap = self.calendar.start_offset_of(self.project_start, date);
                    lf = lf.min(cap + duration);
                }
                Constraint::MustFinishOn(date) | Constraint::FinishNoLaterThan(date) => {
                    let cap = self.calendar.finish_offset_of(self.project_start, date);
                    lf = lf.min(cap);
                }
                Constraint::AsSoonAsPossible
                | Constraint::AsLateAsPossible
                | Constraint::StartNoEarlierThan(_)
                | Constraint::FinishNoEarlierThan(_) => {}
            }

            let timing = timings
                .get_mut(task_id.as_str())
                .expect("forward pass visited every task");
            timing.lf = lf;
            timing.ls = lf - duration;
        }
    }

    /// Build the entry list: leaf entries from the passes, summary entries
    /// rolled up from leaf descendants, all in input order.
    fn assemble(&self, timings: &FxHashMap<&str, Timing>, project_duration: i64) -> Schedule {
        let mut entries: Vec<ScheduleEntry> = Vec::with_capacity(self.tasks.len());

        for task in self.tasks {
            if let Some(&duration) = self.durations.get(task.id.as_str()) {
                let timing = timings[task.id.as_str()];
                let free_float = self.free_float(&task.id, &timing, timings);
                entries.push(self.leaf_entry(task, duration, timing, free_float));
            } else if let Some(entry) = self.summary_entry(&task.id, timings) {
                entries.push(entry);
            }
        }

        let project_finish = if project_duration > 0 {
            self.calendar.date_at(self.project_start, project_duration - 1)
        } else {
            self.project_start
        };

        Schedule {
            entries,
            project_start: self.project_start,
            project_finish,
            duration: project_duration,
        }
    }

    fn leaf_entry(
        &self,
        task: &Task,
        duration: i64,
        timing: Timing,
        free_float: i64,
    ) -> ScheduleEntry {
        let total_float = timing.ls - timing.es;

        // As-Late-As-Possible tasks are placed at their late offsets; the
        // float math is untouched.
        let (sched_start, sched_finish) = if task.constraint == Constraint::AsLateAsPossible {
            (timing.ls, timing.lf)
        } else {
            (timing.es, timing.ef)
        };
        let start_date = self.calendar.date_at(self.project_start, sched_start);
        let finish_date = if duration > 0 {
            self.calendar.date_at(self.project_start, sched_finish - 1)
        } else {
            start_date
        };

        ScheduleEntry {
            task_id: task.id.clone(),
            early_start: timing.es,
            early_finish: timing.ef,
            late_start: timing.ls,
            late_finish: timing.lf,
            total_float,
            free_float,
            is_critical: total_float == 0,
            start_date,
            finish_date,
        }
    }

    /// Slack against immediate successors; total float when there are none.
    fn free_float(&self, task_id: &str, timing: &Timing, timings: &FxHashMap<&str, Timing>) -> i64 {
        let edges = self.graph.successors(task_id);
        if edges.is_empty() {
            return timing.ls - timing.es;
        }
        edges
            .iter()
            .map(|edge| {
                let succ = &timings[edge.successor.as_str()];
                match edge.kind {
                    DependencyKind::FinishToStart => succ.es - (timing.ef + edge.lag),
                    DependencyKind::StartToStart => succ.es - (timing.es + edge.lag),
                    DependencyKind::FinishToFinish => succ.ef - (timing.ef + edge.lag),
                    DependencyKind::StartToFinish => succ.ef - (timing.es + edge.lag),
                }
            })
            .min()
            .unwrap_or(0)
    }

    /// Roll a summary task up from its leaf descendants.
    ///
    /// Hierarchy validity (missing parents, parent cycles) is the WBS
    /// generator's concern; a summary with no reachable leaves yields no
    /// entry here.
    fn summary_entry(
        &self,
        task_id: &str,
        timings: &FxHashMap<&str, Timing>,
    ) -> Option<ScheduleEntry> {
        let mut visited: FxHashSet<&str> = FxHashSet::default();
        let mut stack: Vec<&str> = vec![task_id];
        let mut leaves: Vec<&str> = Vec::new();
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            match self.children.get(current) {
                Some(kids) => stack.extend(kids.iter().copied()),
                None => leaves.push(current),
            }
        }

        let mut es = i64::MAX;
        let mut ef = i64::MIN;
        let mut ls = i64::MAX;
        let mut lf = i64::MIN;
        let mut any = false;
        for leaf in leaves {
            let Some(timing) = timings.get(leaf) else {
                continue;
            };
            any = true;
            es = es.min(timing.es);
            ef = ef.max(timing.ef);
            ls = ls.min(timing.ls);
            lf = lf.max(timing.lf);
        }
        if !any {
            return None;
        }

        let duration = ef - es;
        let total_float = ls - es;
        let start_date = self.calendar.date_at(self.project_start, es);
        let finish_date = if duration > 0 {
            self.calendar.date_at(self.project_start, ef - 1)
        } else {
            start_date
        };

        Some(ScheduleEntry {
            task_id: task_id.to_string(),
            early_start: es,
            early_finish: ef,
            late_start: ls,
            late_finish: lf,
            total_float,
            free_float: total_float,
            is_critical: total_float == 0,
            start_date,
            finish_date,
        })
    }

    fn constraint_violated(
        &self,
        task_id: &str,
        constraint_date: NaiveDate,
        computed_offset: i64,
    ) -> ScheduleError {
        ScheduleError::ConstraintViolated {
            task: task_id.to_string(),
            constraint_date,
            computed_date: self.calendar.date_at(self.project_start, computed_offset),
        }
    }
}

/// Compute a schedule for an input snapshot.
///
/// Pure function of its inputs: identical snapshots yield identical
/// schedules, and the inputs are never mutated.
pub fn compute_schedule(
    tasks: &[Task],
    dependencies: &[Dependency],
    calendar: &WorkCalendar,
    options: &ScheduleOptions,
) -> Result<Schedule, ScheduleError> {
    CpmScheduler::new(tasks, dependencies, calendar, options)?.compute()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Task;

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn t(id: &str, duration: i64) -> Task {
        Task::new(id, id, duration)
    }

    fn constrained(id: &str, duration: i64, constraint: Constraint) -> Task {
        Task {
            constraint,
            ..Task::new(id, id, duration)
        }
    }

    fn fs(pred: &str, succ: &str) -> Dependency {
        Dependency::finish_to_start(pred, succ)
    }

    fn edge(pred: &str, succ: &str, kind: DependencyKind, lag: i64) -> Dependency {
        Dependency {
            kind,
            lag,
            ..Dependency::finish_to_start(pred, succ)
        }
    }

    fn opts() -> ScheduleOptions {
        // Monday
        ScheduleOptions::new(d(2025, 1, 6))
    }

    fn schedule(tasks: &[Task], deps: &[Dependency]) -> Schedule {
        compute_schedule(tasks, deps, &WorkCalendar::default(), &opts()).unwrap()
    }

    #[test]
    fn test_single_chain_all_critical() {
        let tasks = vec![t("a", 5), t("b", 3), t("c", 2)];
        let deps = vec![fs("a", "b"), fs("b", "c")];
        let result = schedule(&tasks, &deps);

        assert_eq!(result.duration, 10);
        for entry in &result.entries {
            assert_eq!(entry.total_float, 0);
            assert!(entry.is_critical);
        }
        let b = result.entry("b").unwrap();
        assert_eq!((b.early_start, b.early_finish), (5, 8));
    }

    #[test]
    fn test_redundant_edge_and_branch_float() {
        // a feeds c directly and through b; the direct edge is redundant.
        // A short branch d off a floats by the path-length difference.
        let tasks = vec![t("a", 5), t("b", 10), t("c", 2), t("d", 3)];
        let deps = vec![fs("a", "c"), fs("a", "b"), fs("b", "c"), fs("a", "d")];
        let result = schedule(&tasks, &deps);

        assert_eq!(result.duration, 17);
        for id in ["a", "b", "c"] {
            assert!(result.entry(id).unwrap().is_critical, "{} not critical", id);
        }
        let branch = result.entry("d").unwrap();
        assert_eq!(branch.total_float, 9);
        assert!(!branch.is_critical);
    }

    #[test]
    fn test_parallel_paths_free_float() {
        let tasks = vec![t("a", 2), t("b", 5), t("end", 1)];
        let deps = vec![fs("a", "end"), fs("b", "end")];
        let result = schedule(&tasks, &deps);

        let a = result.entry("a").unwrap();
        assert_eq!(a.total_float, 3);
        assert_eq!(a.free_float, 3);
        let b = result.entry("b").unwrap();
        assert_eq!(b.total_float, 0);
        assert_eq!(b.free_float, 0);
    }

    #[test]
    fn test_lag_and_lead() {
        let tasks = vec![t("a", 2), t("b", 1), t("c", 4), t("d", 1)];
        let deps = vec![
            edge("a", "b", DependencyKind::FinishToStart, 3),
            edge("c", "d", DependencyKind::FinishToStart, -2),
        ];
        let result = schedule(&tasks, &deps);

        assert_eq!(result.entry("b").unwrap().early_start, 5); // 2 + 3 lag
        assert_eq!(result.entry("d").unwrap().early_start, 2); // 4 - 2 lead
    }

    #[test]
    fn test_start_to_start_and_finish_to_finish() {
        let tasks = vec![t("a", 6), t("b", 2), t("c", 3)];
        let deps = vec![
            edge("a", "b", DependencyKind::StartToStart, 2),
            edge("a", "c", DependencyKind::FinishToFinish, 1),
        ];
        let result = schedule(&tasks, &deps);

        let b = result.entry("b").unwrap();
        assert_eq!(b.early_start, 2);
        let c = result.entry("c").unwrap();
        // c must finish one day after a: EF = 6 + 1 = 7, ES = 4
        assert_eq!((c.early_start, c.early_finish), (4, 7));
    }

    #[test]
    fn test_start_to_finish() {
        let tasks = vec![t("a", 4), t("b", 2)];
        let deps = vec![edge("a", "b", DependencyKind::StartToFinish, 3)];
        let result = schedule(&tasks, &deps);

        // b must finish 3 days after a starts: EF >= 3
        let b = result.entry("b").unwrap();
        assert_eq!(b.early_finish, 3);
        assert_eq!(b.early_start, 1);
    }

    #[test]
    fn test_milestone_zero_duration() {
        let tasks = vec![t("a", 5), t("done", 0)];
        let deps = vec![fs("a", "done")];
        let result = schedule(&tasks, &deps);

        let milestone = result.entry("done").unwrap();
        assert_eq!(milestone.early_start, 5);
        assert_eq!(milestone.early_finish, 5);
        assert_eq!(milestone.start_date, milestone.finish_date);
        assert!(milestone.is_critical);
    }

    #[test]
    fn test_calendar_dates_skip_weekend() {
        let tasks = vec![t("a", 5), t("b", 3)];
        let deps = vec![fs("a", "b")];
        let result = schedule(&tasks, &deps);

        let a = result.entry("a").unwrap();
        assert_eq!(a.start_date, d(2025, 1, 6)); // Monday
        assert_eq!(a.finish_date, d(2025, 1, 10)); // Friday
        let b = result.entry("b").unwrap();
        assert_eq!(b.start_date, d(2025, 1, 13)); // next Monday
        assert_eq!(result.project_finish, d(2025, 1, 15));
    }

    #[test]
    fn test_start_no_earlier_than_pushes_start() {
        let tasks = vec![
            t("a", 2),
            constrained("b", 3, Constraint::StartNoEarlierThan(d(2025, 1, 13))),
        ];
        let deps = vec![fs("a", "b")];
        let result = schedule(&tasks, &deps);

        let b = result.entry("b").unwrap();
        assert_eq!(b.early_start, 5);
        assert_eq!(b.start_date, d(2025, 1, 13));
        // a now floats against b's constrained start
        assert_eq!(result.entry("a").unwrap().total_float, 3);
    }

    #[test]
    fn test_must_start_on_pins_and_is_critical() {
        let tasks = vec![constrained("a", 4, Constraint::MustStartOn(d(2025, 1, 8)))];
        let result = schedule(&tasks, &[]);

        let a = result.entry("a").unwrap();
        assert_eq!(a.early_start, 2);
        assert_eq!(a.late_start, 2);
        assert!(a.is_critical);
    }

    #[test]
    fn test_must_start_on_violated_by_dependencies() {
        let tasks = vec![
            t("a", 5),
            constrained("b", 2, Constraint::MustStartOn(d(2025, 1, 8))),
        ];
        let deps = vec![fs("a", "b")];
        let result = compute_schedule(&tasks, &deps, &WorkCalendar::default(), &opts());

        assert!(matches!(
            result,
            Err(ScheduleError::ConstraintViolated { ref task, constraint_date, .. })
                if task == "b" && constraint_date == d(2025, 1, 8)
        ));
    }

    #[test]
    fn test_start_no_later_than_rejected() {
        let tasks = vec![
            t("a", 5),
            constrained("b", 2, Constraint::StartNoLaterThan(d(2025, 1, 9))),
        ];
        let deps = vec![fs("a", "b")];
        let result = compute_schedule(&tasks, &deps, &WorkCalendar::default(), &opts());

        assert!(matches!(
            result,
            Err(ScheduleError::ConstraintViolated { ref task, .. }) if task == "b"
        ));
    }

    #[test]
    fn test_must_finish_on_before_forced_finish_is_infeasible() {
        // a(5) -> b(2): b cannot finish before working day 7, but is
        // required to finish by day 3. Reported, never clamped.
        let tasks = vec![
            t("a", 5),
            constrained("b", 2, Constraint::MustFinishOn(d(2025, 1, 8))),
        ];
        let deps = vec![fs("a", "b")];
        let result = compute_schedule(&tasks, &deps, &WorkCalendar::default(), &opts());

        match result {
            Err(ScheduleError::Infeasible { tasks, worst_float }) => {
                assert!(tasks.contains(&"a".to_string()));
                assert!(tasks.contains(&"b".to_string()));
                assert_eq!(worst_float, -4); // required EF 3, forced EF 7
            }
            other => panic!("expected infeasible schedule, got {:?}", other),
        }
    }

    #[test]
    fn test_must_finish_on_waits_for_date() {
        let tasks = vec![constrained("a", 2, Constraint::MustFinishOn(d(2025, 1, 10)))];
        let result = schedule(&tasks, &[]);

        let a = result.entry("a").unwrap();
        // Finish pinned to Friday: start Thursday
        assert_eq!((a.early_start, a.early_finish), (3, 5));
        assert!(a.is_critical);
    }

    #[test]
    fn test_finish_deadline_option_infeasible() {
        let tasks = vec![t("a", 5)];
        let mut options = opts();
        options.finish_no_later_than = Some(d(2025, 1, 8));
        let result = compute_schedule(&tasks, &[], &WorkCalendar::default(), &options);
        assert!(matches!(result, Err(ScheduleError::Infeasible { .. })));
    }

    #[test]
    fn test_as_late_as_possible_schedules_late() {
        let tasks = vec![
            t("a", 2),
            constrained("b", 1, Constraint::AsLateAsPossible),
            t("end", 1),
        ];
        let deps = vec![fs("a", "end"), fs("b", "end")];
        let result = schedule(&tasks, &deps);

        let b = result.entry("b").unwrap();
        assert_eq!(b.early_start, 0);
        assert_eq!(b.late_start, 1);
        // Scheduled dates come from the late offsets
        assert_eq!(b.start_date, d(2025, 1, 7));
        assert_eq!(b.total_float, 1);
    }

    #[test]
    fn test_summary_rollup() {
        let foundation = t("foundation", 0);
        let mut footings = t("footings", 3);
        footings.parent = Some("foundation".to_string());
        let mut slab = t("slab", 4);
        slab.parent = Some("foundation".to_string());

        let tasks = vec![foundation, footings, slab];
        let deps = vec![fs("footings", "slab")];
        let result = schedule(&tasks, &deps);

        let summary = result.entry("foundation").unwrap();
        assert_eq!(summary.early_start, 0);
        assert_eq!(summary.early_finish, 7);
        assert!(summary.is_critical);
        assert_eq!(result.duration, 7);
    }

    #[test]
    fn test_summary_in_graph_rejected() {
        let mut child = t("child", 2);
        child.parent = Some("parent".to_string());
        let tasks = vec![t("parent", 0), child, t("other", 1)];
        let deps = vec![fs("parent", "other")];
        let result = compute_schedule(&tasks, &deps, &WorkCalendar::default(), &opts());

        assert_eq!(
            result,
            Err(ScheduleError::SummaryTaskInGraph {
                task: "parent".to_string(),
            })
        );
    }

    #[test]
    fn test_summary_constraint_rejected() {
        let mut child = t("child", 2);
        child.parent = Some("parent".to_string());
        let tasks = vec![
            constrained("parent", 0, Constraint::MustStartOn(d(2025, 1, 8))),
            child,
        ];
        let result = compute_schedule(&tasks, &[], &WorkCalendar::default(), &opts());

        assert_eq!(
            result,
            Err(ScheduleError::SummaryConstraint {
                task: "parent".to_string(),
            })
        );
    }

    #[test]
    fn test_cycle_rejected() {
        // Caught at graph construction; Kahn's sort backstops the same
        // condition if an edge set ever arrives by another path.
        let tasks = vec![t("a", 1), t("b", 1)];
        let deps = vec![fs("a", "b"), fs("b", "a")];
        let result = compute_schedule(&tasks, &deps, &WorkCalendar::default(), &opts());

        assert!(matches!(result, Err(ScheduleError::Cycle { .. })));
    }

    #[test]
    fn test_negative_duration_rejected() {
        let tasks = vec![t("a", -1)];
        let result = compute_schedule(&tasks, &[], &WorkCalendar::default(), &opts());
        assert_eq!(
            result,
            Err(ScheduleError::InvalidDuration {
                task: "a".to_string(),
                duration: -1,
            })
        );
    }

    #[test]
    fn test_unknown_dependency_task_rejected() {
        let tasks = vec![t("a", 1)];
        let deps = vec![fs("a", "ghost")];
        let result = compute_schedule(&tasks, &deps, &WorkCalendar::default(), &opts());
        assert_eq!(
            result,
            Err(ScheduleError::UnknownTask {
                task: "ghost".to_string(),
            })
        );
    }

    #[test]
    fn test_entry_invariants() {
        let tasks = vec![t("a", 5), t("b", 10), t("c", 2), t("d", 3), t("e", 0)];
        let deps = vec![
            fs("a", "b"),
            fs("a", "d"),
            fs("b", "c"),
            fs("d", "c"),
            fs("c", "e"),
        ];
        let result = schedule(&tasks, &deps);

        for entry in &result.entries {
            assert!(entry.early_start <= entry.late_start, "{}", entry.task_id);
            assert!(entry.early_finish <= entry.late_finish, "{}", entry.task_id);
            assert_eq!(
                entry.total_float,
                entry.late_start - entry.early_start,
                "{}",
                entry.task_id
            );
            assert_eq!(
                entry.total_float,
                entry.late_finish - entry.early_finish,
                "{}",
                entry.task_id
            );
            assert!(entry.total_float >= 0);
            assert!(entry.free_float <= entry.total_float, "{}", entry.task_id);
            assert_eq!(entry.is_critical, entry.total_float == 0);
        }
        // At least one critical task exists
        assert!(result.entries.iter().any(|e| e.is_critical));
    }

    #[test]
    fn test_idempotent() {
        let tasks = vec![t("a", 5), t("b", 3), t("c", 2)];
        let deps = vec![fs("a", "b"), fs("a", "c")];
        let first = schedule(&tasks, &deps);
        let second = schedule(&tasks, &deps);
        assert_eq!(first, second);
    }
}
