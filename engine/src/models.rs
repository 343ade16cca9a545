//! Core data types for the scheduling engine.
//!
//! These are the plain records the host application hands in (tasks,
//! dependencies, resources, assignments) and the computed records it gets
//! back (schedule entries). The engine treats inputs as an immutable
//! snapshot and never mutates caller-owned state.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Date constraint on a task.
///
/// Closed set: every scheduling decision matches exhaustively, so an
/// unknown constraint kind cannot slip through as a string.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Constraint {
    /// Schedule at the earliest dates the network allows (default).
    #[default]
    AsSoonAsPossible,
    /// Schedule at the latest dates the network allows without slipping
    /// the project finish.
    AsLateAsPossible,
    /// Start exactly on this date.
    MustStartOn(NaiveDate),
    /// Finish exactly on this date (inclusive last day of work).
    MustFinishOn(NaiveDate),
    /// Start on or after this date.
    StartNoEarlierThan(NaiveDate),
    /// Start on or before this date.
    StartNoLaterThan(NaiveDate),
    /// Finish on or after this date (inclusive).
    FinishNoEarlierThan(NaiveDate),
    /// Finish on or before this date (inclusive).
    FinishNoLaterThan(NaiveDate),
}

/// A task to be scheduled.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    /// Parent task id in the work breakdown hierarchy. A task that other
    /// tasks name as parent is a summary task: its span is derived from its
    /// descendants and it never carries its own duration, constraint,
    /// dependencies, or assignments.
    #[serde(default)]
    pub parent: Option<String>,
    /// Duration in working days. Zero marks a milestone.
    pub duration: i64,
    /// Estimated effort in person-days. Carried for the caller; not used
    /// in timeline math.
    #[serde(default)]
    pub effort: Option<f64>,
    #[serde(default)]
    pub constraint: Constraint,
    /// Leveling victim selection prefers delaying lower priorities (0-100).
    #[serde(default)]
    pub priority: Option<i32>,
}

impl Task {
    /// Plain leaf task with no constraint, parent, or priority.
    pub fn new(id: impl Into<String>, name: impl Into<String>, duration: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent: None,
            duration,
            effort: None,
            constraint: Constraint::AsSoonAsPossible,
            priority: None,
        }
    }
}

/// Precedence relationship kind between two tasks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DependencyKind {
    /// Successor starts after predecessor finishes (the common case).
    #[default]
    FinishToStart,
    /// Successor starts after predecessor starts.
    StartToStart,
    /// Successor finishes after predecessor finishes.
    FinishToFinish,
    /// Successor finishes after predecessor starts.
    StartToFinish,
}

/// A typed precedence edge with optional lag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub predecessor: String,
    pub successor: String,
    #[serde(default)]
    pub kind: DependencyKind,
    /// Lag in working days; negative values are leads.
    #[serde(default)]
    pub lag: i64,
    /// Whether fast-tracking may convert this edge into a controlled
    /// overlap. Defaults to false; the planner opts edges in explicitly.
    #[serde(default)]
    pub overlap_allowed: bool,
}

impl Dependency {
    /// Finish-to-start edge with no lag.
    pub fn finish_to_start(predecessor: impl Into<String>, successor: impl Into<String>) -> Self {
        Self {
            predecessor: predecessor.into(),
            successor: successor.into(),
            kind: DependencyKind::FinishToStart,
            lag: 0,
            overlap_allowed: false,
        }
    }
}

/// What a resource fundamentally is, for substitution purposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceKind {
    Human,
    Equipment,
    Material,
}

/// A schedulable resource with a daily capacity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub kind: ResourceKind,
    /// Unit-less daily allocation capacity; 1.0 = 100%.
    pub capacity_per_day: f64,
}

/// Allocation fraction in (0, 1].
///
/// The host historically stored utilization both as 0-100 percentages and
/// 0-1 fractions; this newtype pins the engine to fractions at the type
/// level. Construction rejects anything outside (0, 1].
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Allocation(f64);

impl Allocation {
    /// Full-time allocation.
    pub const FULL: Allocation = Allocation(1.0);

    pub fn new(fraction: f64) -> Result<Self, InvalidAllocation> {
        if fraction > 0.0 && fraction <= 1.0 {
            Ok(Self(fraction))
        } else {
            Err(InvalidAllocation(fraction))
        }
    }

    pub fn fraction(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Allocation {
    type Error = InvalidAllocation;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Allocation::new(value)
    }
}

impl From<Allocation> for f64 {
    fn from(value: Allocation) -> f64 {
        value.0
    }
}

/// Rejected allocation value (outside the (0, 1] fraction range).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvalidAllocation(pub f64);

impl std::fmt::Display for InvalidAllocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Allocation must be a fraction in (0, 1], got {}",
            self.0
        )
    }
}

impl std::error::Error for InvalidAllocation {}

/// Assignment of a resource to a task at some allocation fraction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceAssignment {
    pub task: String,
    pub resource: String,
    pub allocation: Allocation,
    /// Inclusive effective date range. `None` means the task's scheduled
    /// span.
    #[serde(default)]
    pub span: Option<(NaiveDate, NaiveDate)>,
}

/// Computed timing for a single task.
///
/// Start/finish offsets are integer working days from the project start;
/// finish offsets are exclusive boundaries, so `early_finish = early_start
/// + duration` holds exactly. `start_date`/`finish_date` are the scheduled
/// calendar dates (inclusive) the caller renders.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub task_id: String,
    pub early_start: i64,
    pub early_finish: i64,
    pub late_start: i64,
    pub late_finish: i64,
    /// `late_start - early_start`; negative only in infeasible inputs,
    /// which are reported as errors instead of entries.
    pub total_float: i64,
    /// Slack against immediate successors; equals `total_float` for tasks
    /// with no successors.
    pub free_float: i64,
    /// Exact integer test: `total_float == 0`.
    pub is_critical: bool,
    pub start_date: NaiveDate,
    pub finish_date: NaiveDate,
}

/// A fully computed schedule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub entries: Vec<ScheduleEntry>,
    pub project_start: NaiveDate,
    pub project_finish: NaiveDate,
    /// Project duration in working days (max early finish over all tasks).
    pub duration: i64,
}

impl Schedule {
    /// Entry for a task id, if present.
    pub fn entry(&self, task_id: &str) -> Option<&ScheduleEntry> {
        self.entries.iter().find(|e| e.task_id == task_id)
    }

    /// Task ids on the critical path.
    pub fn critical_tasks(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|e| e.is_critical)
            .map(|e| e.task_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_range() {
        assert!(Allocation::new(0.5).is_ok());
        assert!(Allocation::new(1.0).is_ok());
        assert_eq!(Allocation::new(0.0), Err(InvalidAllocation(0.0)));
        assert_eq!(Allocation::new(1.5), Err(InvalidAllocation(1.5)));
        assert_eq!(Allocation::new(-0.2), Err(InvalidAllocation(-0.2)));
    }

    #[test]
    fn test_allocation_serde_rejects_percentage() {
        let ok: Allocation = serde_json::from_str("0.6").unwrap();
        assert_eq!(ok.fraction(), 0.6);
        // A 0-100 percentage fails to deserialize instead of sliding through
        assert!(serde_json::from_str::<Allocation>("60.0").is_err());
    }

    #[test]
    fn test_constraint_default() {
        let task = Task::new("t1", "Excavate", 5);
        assert_eq!(task.constraint, Constraint::AsSoonAsPossible);
        assert_eq!(task.parent, None);
    }

    #[test]
    fn test_task_json_shape() {
        let json = r#"{
            "id": "t1",
            "name": "Pour foundation",
            "duration": 3,
            "constraint": {"StartNoEarlierThan": "2025-03-10"},
            "priority": 70
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(
            task.constraint,
            Constraint::StartNoEarlierThan(NaiveDate::from_ymd_opt(2025, 3, 10).unwrap())
        );
        assert_eq!(task.priority, Some(70));
    }
}
