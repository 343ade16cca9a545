//! Scheduling engine for construction project plans.
//!
//! Computes critical-path timelines over task networks, assigns WBS codes,
//! compresses schedules toward target durations (crashing and
//! fast-tracking), and levels resource over-allocation. The host
//! application owns persistence, editing, and presentation; this crate is
//! a pure computation over an in-memory snapshot and never mutates
//! caller-owned records.
//!
//! The four entry points compose as a fixed pipeline driven by the caller:
//!
//! 1. [`generate_wbs`] — hierarchical codes for the task tree
//! 2. [`compute_schedule`] — forward/backward pass, float, critical path
//! 3. [`compress_schedule`] — optional duration compression
//! 4. [`level_resources`] — optional over-allocation repair
//!
//! There is no event wiring between the stages: each consumes plain
//! records and returns plain records.

pub mod calendar;
pub mod compress;
pub mod config;
pub mod cpm;
pub mod graph;
pub mod leveling;
pub mod logging;
pub mod models;
pub mod wbs;

pub use calendar::{CalendarError, WorkCalendar};
pub use compress::{
    compress_schedule, CancelFlag, CompressedSchedule, CompressionAction, CompressionError,
    CompressionStop,
};
pub use config::{CompressionConfig, CostSlope, LevelingConfig, ScheduleOptions};
pub use cpm::{compute_schedule, CpmScheduler, ScheduleError};
pub use graph::{DependencyGraph, GraphError};
pub use leveling::{
    level_resources, ConflictResolution, LevelingError, LevelingResult, ResourceConflict,
};
pub use models::{
    Allocation, Constraint, Dependency, DependencyKind, InvalidAllocation, Resource,
    ResourceAssignment, ResourceKind, Schedule, ScheduleEntry, Task,
};
pub use wbs::{generate_wbs, WbsError};
