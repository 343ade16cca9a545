//! Schedule compression via crashing and fast-tracking.
//!
//! Only tasks on the current critical path can shorten the project, so
//! each round picks the cheapest critical crash candidate (or, once
//! crashing is exhausted, a critical finish-to-start edge marked safe to
//! overlap), applies one working day of change, and re-runs the full
//! pass. Every round ends on a complete, valid schedule, which is what
//! makes the cancellation flag safe to honor between rounds.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::calendar::WorkCalendar;
use crate::config::{CompressionConfig, CostSlope, ScheduleOptions};
use crate::cpm::{compute_schedule, ScheduleError};
use crate::models::{Dependency, DependencyKind, Schedule, Task};
use crate::{log_pass, log_step};

/// Cooperative cancellation handle.
///
/// Cloned into the caller's timeout machinery; the compression loop
/// checks it between rounds and returns the best schedule reached so far.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A single applied compression decision.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CompressionAction {
    /// One working day removed from a task's duration.
    Crash {
        task: String,
        new_duration: i64,
        cost: f64,
    },
    /// Finish-to-start edge converted to a start-to-start overlap.
    FastTrack {
        predecessor: String,
        successor: String,
        lag: i64,
    },
}

/// Why the compression loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionStop {
    ReachedTarget,
    Cancelled,
    /// No critical task could be crashed and no edge fast-tracked.
    Exhausted,
}

/// Result of a compression run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompressedSchedule {
    pub schedule: Schedule,
    pub actions: Vec<CompressionAction>,
    /// Summed crash cost of all applied actions.
    pub total_cost: f64,
    pub initial_duration: i64,
    pub achieved_duration: i64,
    pub target_duration: i64,
    pub stopped: CompressionStop,
}

/// Errors that can occur during compression.
#[derive(Error, Debug)]
pub enum CompressionError {
    /// Target unreachable. Non-fatal by design: the best-achieved result
    /// rides along so the caller can still use it.
    #[error("Compression exhausted at {achieved} working days (target {target})")]
    Exhausted {
        achieved: i64,
        target: i64,
        best: Box<CompressedSchedule>,
    },
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

/// Compress a project toward a target duration in working days.
pub fn compress_schedule(
    tasks: &[Task],
    dependencies: &[Dependency],
    calendar: &WorkCalendar,
    options: &ScheduleOptions,
    target_duration: i64,
    cost_slopes: &[CostSlope],
    config: &CompressionConfig,
    cancel: Option<&CancelFlag>,
) -> Result<CompressedSchedule, CompressionError> {
    let verbosity = config.verbosity;
    let mut tasks = tasks.to_vec();
    let mut dependencies = dependencies.to_vec();

    let mut schedule = compute_schedule(&tasks, &dependencies, calendar, options)?;
    let initial_duration = schedule.duration;
    let mut actions: Vec<CompressionAction> = Vec::new();
    let mut total_cost = 0.0;

    let max_iterations = if config.max_iterations > 0 {
        config.max_iterations
    } else {
        tasks.len() * 100
    };

    let finish = |schedule: Schedule,
                  actions: Vec<CompressionAction>,
                  total_cost: f64,
                  stopped: CompressionStop| {
        let achieved_duration = schedule.duration;
        CompressedSchedule {
            schedule,
            actions,
            total_cost,
            initial_duration,
            achieved_duration,
            target_duration,
            stopped,
        }
    };

    for round in 0..max_iterations {
        if schedule.duration <= target_duration {
            log_pass!(
                verbosity,
                "Compression reached target {} in {} rounds",
                target_duration,
                round
            );
            return Ok(finish(
                schedule,
                actions,
                total_cost,
                CompressionStop::ReachedTarget,
            ));
        }
        if cancel.is_some_and(CancelFlag::is_cancelled) {
            log_pass!(verbosity, "Compression cancelled after {} rounds", round);
            return Ok(finish(
                schedule,
                actions,
                total_cost,
                CompressionStop::Cancelled,
            ));
        }

        // The critical set shifts as durations change; recompute the
        // candidate pool from the latest schedule every round.
        let critical: FxHashSet<&str> = schedule.critical_tasks().collect();

        if let Some((index, cost)) = pick_crash_candidate(&tasks, &critical, cost_slopes) {
            let task = &mut tasks[index];
            task.duration -= 1;
            total_cost += cost;
            log_step!(
                verbosity,
                "  Crash {} to {} days (cost {})",
                task.id,
                task.duration,
                cost
            );
            actions.push(CompressionAction::Crash {
                task: task.id.clone(),
                new_duration: task.duration,
                cost,
            });
        } else if let Some(index) =
            config
                .fast_track
                .then(|| pick_fast_track_edge(&tasks, &dependencies, &critical))
                .flatten()
        {
            let pred_duration = tasks
                .iter()
                .find(|t| t.id == dependencies[index].predecessor)
                .map(|t| t.duration)
                .unwrap_or(0);
            let edge = &mut dependencies[index];
            edge.kind = DependencyKind::StartToStart;
            edge.lag = (pred_duration - config.overlap_days).max(0);
            edge.overlap_allowed = false;
            log_step!(
                verbosity,
                "  Fast-track {} -> {} with start-to-start lag {}",
                edge.predecessor,
                edge.successor,
                edge.lag
            );
            actions.push(CompressionAction::FastTrack {
                predecessor: edge.predecessor.clone(),
                successor: edge.successor.clone(),
                lag: edge.lag,
            });
        } else {
            log_pass!(
                verbosity,
                "Compression exhausted at {} working days (target {})",
                schedule.duration,
                target_duration
            );
            let achieved = schedule.duration;
            return Err(CompressionError::Exhausted {
                achieved,
                target: target_duration,
                best: Box::new(finish(
                    schedule,
                    actions,
                    total_cost,
                    CompressionStop::Exhausted,
                )),
            });
        }

        schedule = compute_schedule(&tasks, &dependencies, calendar, options)?;
    }

    // Iteration cap: same contract as running out of levers.
    let achieved = schedule.duration;
    Err(CompressionError::Exhausted {
        achieved,
        target: target_duration,
        best: Box::new(finish(
            schedule,
            actions,
            total_cost,
            CompressionStop::Exhausted,
        )),
    })
}

/// Cheapest critical task with crashable duration remaining.
///
/// Ties break on task id for determinism.
fn pick_crash_candidate(
    tasks: &[Task],
    critical: &FxHashSet<&str>,
    cost_slopes: &[CostSlope],
) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for slope in cost_slopes {
        let Some(index) = tasks.iter().position(|t| t.id == slope.task) else {
            continue;
        };
        let task = &tasks[index];
        if !critical.contains(task.id.as_str()) {
            continue;
        }
        if task.duration <= slope.min_duration.max(0) {
            continue;
        }
        let better = match best {
            None => true,
            Some((best_index, best_cost)) => {
                slope.cost_per_day < best_cost
                    || (slope.cost_per_day == best_cost && task.id < tasks[best_index].id)
            }
        };
        if better {
            best = Some((index, slope.cost_per_day));
        }
    }
    best
}

/// First convertible finish-to-start edge joining two critical tasks.
fn pick_fast_track_edge(
    tasks: &[Task],
    dependencies: &[Dependency],
    critical: &FxHashSet<&str>,
) -> Option<usize> {
    dependencies.iter().position(|dep| {
        dep.kind == DependencyKind::FinishToStart
            && dep.overlap_allowed
            && critical.contains(dep.predecessor.as_str())
            && critical.contains(dep.successor.as_str())
            && tasks
                .iter()
                .find(|t| t.id == dep.predecessor)
                .map(|t| t.duration > 0)
                .unwrap_or(false)
    })
}
