//! Resource leveling: over-allocation detection and float-bounded repair.
//!
//! Allocation is bucketed per resource per working day across the
//! scheduled spans. A day whose summed allocation exceeds capacity is a
//! conflict; the preferred repair is delaying the lower-priority
//! conflicting task within its own total float, applied as a
//! start-no-earlier-than override followed by a full re-pass so the
//! output stays precedence-consistent. Tasks with zero float are never
//! delayed; they get a substitute suggestion or an overtime flag instead.

use chrono::{Days, NaiveDate};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calendar::WorkCalendar;
use crate::config::{LevelingConfig, ScheduleOptions};
use crate::cpm::{compute_schedule, ScheduleError};
use crate::models::{
    Constraint, Dependency, Resource, ResourceAssignment, Schedule, Task,
};
use crate::{log_pass, log_step};

/// Tolerance for float noise when summing allocation fractions.
const CAPACITY_EPSILON: f64 = 1e-9;

/// Leveling victim selection falls back to this when a task has no
/// explicit priority.
const DEFAULT_PRIORITY: i32 = 50;

/// Errors that can occur during leveling.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LevelingError {
    #[error("Assignment references unknown task: {task}")]
    UnknownTask { task: String },
    #[error("Assignment references unknown resource: {resource}")]
    UnknownResource { resource: String },
    #[error("Assignment references summary task: {task}")]
    SummaryAssignment { task: String },
    #[error("Resource {resource} has non-positive capacity {capacity}")]
    InvalidCapacity { resource: String, capacity: f64 },
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

/// How a conflict was (or was not) resolved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ConflictResolution {
    /// Task delayed within its total float; the conflict cleared without
    /// extending the critical path.
    Delayed { task: String, working_days: i64 },
    /// No conflicting task had usable float; a same-kind resource with
    /// spare capacity over the conflict window is suggested instead.
    SubstituteSuggested { task: String, candidate: String },
    /// No float and no substitute; flagged for overtime/cost review.
    OvertimeFlagged { task: String },
}

/// One over-allocation found during leveling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceConflict {
    pub resource: String,
    /// First over-allocated day at detection time.
    pub first_day: NaiveDate,
    /// Last over-allocated day at detection time.
    pub last_day: NaiveDate,
    /// Highest summed allocation across the conflict days.
    pub peak_demand: f64,
    pub capacity: f64,
    /// Tasks contributing allocation on the conflict days.
    pub tasks: Vec<String>,
    pub resolution: ConflictResolution,
}

/// Leveled schedule plus everything that happened along the way.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelingResult {
    pub schedule: Schedule,
    pub conflicts: Vec<ResourceConflict>,
}

/// Level resource usage across a project.
pub fn level_resources(
    tasks: &[Task],
    dependencies: &[Dependency],
    assignments: &[ResourceAssignment],
    resources: &[Resource],
    calendar: &WorkCalendar,
    options: &ScheduleOptions,
    config: &LevelingConfig,
) -> Result<LevelingResult, LevelingError> {
    let verbosity = config.verbosity;
    validate(tasks, assignments, resources)?;

    let by_resource: FxHashMap<&str, &Resource> =
        resources.iter().map(|r| (r.id.as_str(), r)).collect();

    let mut tasks = tasks.to_vec();
    let mut schedule = compute_schedule(&tasks, dependencies, calendar, options)?;
    let mut conflicts: Vec<ResourceConflict> = Vec::new();
    // Resources already reported unresolved; re-detecting them every
    // round would spin forever.
    let mut flagged: FxHashSet<String> = FxHashSet::default();

    let max_iterations = if config.max_iterations > 0 {
        config.max_iterations
    } else {
        tasks.len().max(1) * 100
    };

    for round in 0..max_iterations {
        let usage = bucket_usage(&tasks, assignments, &schedule, calendar);

        let Some(found) = find_conflict(resources, &usage, &flagged) else {
            log_pass!(verbosity, "Leveling complete after {} rounds", round);
            break;
        };

        // Only tasks whose assignment tracks the scheduled span can be
        // moved out of the way; an explicit date range stays put no
        // matter where the task goes.
        let delayable: Vec<String> = found
            .tasks
            .iter()
            .filter(|id| {
                assignments
                    .iter()
                    .any(|a| a.resource == found.resource && &a.task == *id && a.span.is_none())
            })
            .cloned()
            .collect();

        let resource = by_resource[found.resource.as_str()];

        let mut applied: Option<ConflictResolution> = None;
        if let Some(victim_id) = pick_victim(&tasks, &schedule, &delayable, true) {
            let entry = schedule
                .entry(&victim_id)
                .expect("conflicting task is scheduled");
            let delay = smallest_fitting_delay(
                &victim_id,
                entry.start_date,
                entry.finish_date,
                entry.total_float,
                resource,
                assignments,
                &usage,
                calendar,
            );
            if let Some(delay) = delay {
                let new_start = calendar.add_working_days(entry.start_date, delay);
                log_step!(
                    verbosity,
                    "  Delay {} by {} working days for {}",
                    victim_id,
                    delay,
                    found.resource
                );

                let task = tasks
                    .iter_mut()
                    .find(|t| t.id == victim_id)
                    .expect("victim comes from the task list");
                task.constraint = match task.constraint {
                    Constraint::StartNoEarlierThan(existing) if existing > new_start => {
                        Constraint::StartNoEarlierThan(existing)
                    }
                    _ => Constraint::StartNoEarlierThan(new_start),
                };

                // Delay stays within total float, so the critical path
                // cannot extend; the re-pass keeps successors consistent.
                schedule = compute_schedule(&tasks, dependencies, calendar, options)?;
                applied = Some(ConflictResolution::Delayed {
                    task: victim_id,
                    working_days: delay,
                });
            }
        }

        let resolution = match applied {
            Some(resolution) => resolution,
            None => {
                // Nothing can move: suggest a substitute, else overtime.
                let subject = pick_victim(&tasks, &schedule, &found.tasks, false)
                    .unwrap_or_else(|| found.tasks[0].clone());
                let resolution =
                    match find_substitute(resource, resources, assignments, &subject, &found, &usage)
                    {
                        Some(candidate) => {
                            log_step!(
                                verbosity,
                                "  Suggest substitute {} for {} on {}",
                                candidate,
                                subject,
                                found.resource
                            );
                            ConflictResolution::SubstituteSuggested {
                                task: subject,
                                candidate,
                            }
                        }
                        None => {
                            log_step!(
                                verbosity,
                                "  Flag {} for overtime review on {}",
                                subject,
                                found.resource
                            );
                            ConflictResolution::OvertimeFlagged { task: subject }
                        }
                    };
                flagged.insert(found.resource.clone());
                resolution
            }
        };

        conflicts.push(ResourceConflict {
            resource: found.resource,
            first_day: found.first_day,
            last_day: found.last_day,
            peak_demand: found.peak_demand,
            capacity: found.capacity,
            tasks: found.tasks,
            resolution,
        });
    }

    Ok(LevelingResult {
        schedule,
        conflicts,
    })
}

/// Smallest shift within total float whose shifted span fits the
/// resource's remaining capacity.
///
/// The victim's own contribution is subtracted from the buckets before
/// probing, so a task can slide past itself. Returns `None` when no
/// in-float shift clears the conflict.
#[allow(clippy::too_many_arguments)]
fn smallest_fitting_delay(
    victim: &str,
    start: NaiveDate,
    finish: NaiveDate,
    total_float: i64,
    resource: &Resource,
    assignments: &[ResourceAssignment],
    usage: &UsageMap,
    calendar: &WorkCalendar,
) -> Option<i64> {
    let allocation: f64 = assignments
        .iter()
        .filter(|a| a.task == victim && a.resource == resource.id && a.span.is_none())
        .map(|a| a.allocation.fraction())
        .sum();
    if allocation <= 0.0 {
        return None;
    }

    let mut current_days: FxHashSet<NaiveDate> = FxHashSet::default();
    let mut day = start;
    while day <= finish {
        if calendar.is_working_day(day) {
            current_days.insert(day);
        }
        day = day
            .checked_add_days(Days::new(1))
            .expect("date overflow while collecting span days");
    }
    let span_len = current_days.len() as i64;
    let buckets = usage.get(resource.id.as_str());

    (1..=total_float).find(|&shift| {
        let new_start = calendar.add_working_days(start, shift);
        (0..span_len).all(|i| {
            let probe = calendar.add_working_days(new_start, i);
            let existing = buckets
                .and_then(|b| b.get(&probe))
                .map(|(demand, _)| *demand)
                .unwrap_or(0.0);
            let without_victim = if current_days.contains(&probe) {
                existing - allocation
            } else {
                existing
            };
            without_victim + allocation <= resource.capacity_per_day + CAPACITY_EPSILON
        })
    })
}

/// Over-allocation as detected, before a resolution is chosen.
struct FoundConflict {
    resource: String,
    first_day: NaiveDate,
    last_day: NaiveDate,
    peak_demand: f64,
    capacity: f64,
    tasks: Vec<String>,
}

fn validate(
    tasks: &[Task],
    assignments: &[ResourceAssignment],
    resources: &[Resource],
) -> Result<(), LevelingError> {
    for resource in resources {
        if resource.capacity_per_day <= 0.0 {
            return Err(LevelingError::InvalidCapacity {
                resource: resource.id.clone(),
                capacity: resource.capacity_per_day,
            });
        }
    }

    let task_ids: FxHashSet<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
    let resource_ids: FxHashSet<&str> = resources.iter().map(|r| r.id.as_str()).collect();
    let summaries: FxHashSet<&str> = tasks
        .iter()
        .filter_map(|t| t.parent.as_deref())
        .collect();

    for assignment in assignments {
        if !task_ids.contains(assignment.task.as_str()) {
            return Err(LevelingError::UnknownTask {
                task: assignment.task.clone(),
            });
        }
        if summaries.contains(assignment.task.as_str()) {
            return Err(LevelingError::SummaryAssignment {
                task: assignment.task.clone(),
            });
        }
        if !resource_ids.contains(assignment.resource.as_str()) {
            return Err(LevelingError::UnknownResource {
                resource: assignment.resource.clone(),
            });
        }
    }
    Ok(())
}

/// Per-resource, per-working-day summed allocation with contributors.
type UsageMap = FxHashMap<String, FxHashMap<NaiveDate, (f64, Vec<String>)>>;

fn bucket_usage(
    tasks: &[Task],
    assignments: &[ResourceAssignment],
    schedule: &Schedule,
    calendar: &WorkCalendar,
) -> UsageMap {
    let durations: FxHashMap<&str, i64> =
        tasks.iter().map(|t| (t.id.as_str(), t.duration)).collect();

    let mut usage: UsageMap = FxHashMap::default();
    for assignment in assignments {
        // Milestones occupy no working time.
        if durations
            .get(assignment.task.as_str())
            .is_some_and(|&d| d == 0)
        {
            continue;
        }
        let Some(entry) = schedule.entry(&assignment.task) else {
            continue;
        };
        let (first, last) = assignment
            .span
            .unwrap_or((entry.start_date, entry.finish_date));

        let buckets = usage.entry(assignment.resource.clone()).or_default();
        let mut day = first;
        while day <= last {
            if calendar.is_working_day(day) {
                let bucket = buckets.entry(day).or_insert((0.0, Vec::new()));
                bucket.0 += assignment.allocation.fraction();
                bucket.1.push(assignment.task.clone());
            }
            day = day
                .checked_add_days(Days::new(1))
                .expect("date overflow while bucketing");
        }
    }
    usage
}

/// First over-allocated resource in input order, with its conflict window.
fn find_conflict(
    resources: &[Resource],
    usage: &UsageMap,
    flagged: &FxHashSet<String>,
) -> Option<FoundConflict> {
    for resource in resources {
        if flagged.contains(resource.id.as_str()) {
            continue;
        }
        let Some(buckets) = usage.get(resource.id.as_str()) else {
            continue;
        };

        let mut over_days: Vec<NaiveDate> = buckets
            .iter()
            .filter(|(_, (demand, _))| *demand > resource.capacity_per_day + CAPACITY_EPSILON)
            .map(|(day, _)| *day)
            .collect();
        if over_days.is_empty() {
            continue;
        }
        over_days.sort();

        let mut peak_demand: f64 = 0.0;
        let mut contributors: Vec<String> = Vec::new();
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        for day in &over_days {
            let (demand, tasks) = &buckets[day];
            if *demand > peak_demand {
                peak_demand = *demand;
            }
            for task in tasks {
                if seen.insert(task.as_str()) {
                    contributors.push(task.clone());
                }
            }
        }
        contributors.sort();

        return Some(FoundConflict {
            resource: resource.id.clone(),
            first_day: over_days[0],
            last_day: *over_days.last().expect("over_days is non-empty"),
            peak_demand,
            capacity: resource.capacity_per_day,
            tasks: contributors,
        });
    }
    None
}

/// Choose which conflicting task to move: lowest priority first, then the
/// later-starting, then id. With `require_float` the pick is limited to
/// tasks that can actually be delayed (positive float, not critical, not
/// date-pinned).
fn pick_victim(
    tasks: &[Task],
    schedule: &Schedule,
    conflicting: &[String],
    require_float: bool,
) -> Option<String> {
    let by_id: FxHashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();

    let mut candidates: Vec<&String> = conflicting
        .iter()
        .filter(|id| {
            if !require_float {
                return true;
            }
            let Some(task) = by_id.get(id.as_str()) else {
                return false;
            };
            let Some(entry) = schedule.entry(id) else {
                return false;
            };
            let movable = matches!(
                task.constraint,
                Constraint::AsSoonAsPossible | Constraint::StartNoEarlierThan(_)
            );
            movable && !entry.is_critical && entry.total_float > 0
        })
        .collect();

    candidates.sort_by(|a, b| {
        let pa = by_id
            .get(a.as_str())
            .and_then(|t| t.priority)
            .unwrap_or(DEFAULT_PRIORITY);
        let pb = by_id
            .get(b.as_str())
            .and_then(|t| t.priority)
            .unwrap_or(DEFAULT_PRIORITY);
        let sa = schedule.entry(a).map(|e| e.start_date);
        let sb = schedule.entry(b).map(|e| e.start_date);
        pa.cmp(&pb).then(sb.cmp(&sa)).then(a.cmp(b))
    });

    candidates.first().map(|id| (*id).to_string())
}

/// Same-kind resource with room for the subject's allocation across the
/// conflict window.
fn find_substitute(
    overloaded: &Resource,
    resources: &[Resource],
    assignments: &[ResourceAssignment],
    subject: &str,
    conflict: &FoundConflict,
    usage: &UsageMap,
) -> Option<String> {
    let allocation = assignments
        .iter()
        .find(|a| a.task == subject && a.resource == overloaded.id)
        .map(|a| a.allocation.fraction())?;

    resources
        .iter()
        .filter(|candidate| candidate.id != overloaded.id && candidate.kind == overloaded.kind)
        .find(|candidate| {
            let buckets = usage.get(candidate.id.as_str());
            let mut day = conflict.first_day;
            loop {
                if day > conflict.last_day {
                    return true;
                }
                let used = buckets
                    .and_then(|b| b.get(&day))
                    .map(|(demand, _)| *demand)
                    .unwrap_or(0.0);
                if used + allocation > candidate.capacity_per_day + CAPACITY_EPSILON {
                    return false;
                }
                day = day
                    .checked_add_days(Days::new(1))
                    .expect("date overflow while probing substitute");
            }
        })
        .map(|candidate| candidate.id.clone())
}
