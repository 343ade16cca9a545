//! Configuration records for the scheduling engine.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Options for a scheduling pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduleOptions {
    /// First day work may be placed (rolled forward to a working day).
    pub project_start: NaiveDate,
    /// Optional project finish cap (inclusive). When set, the backward
    /// pass anchors on this date instead of the computed finish; tasks that
    /// cannot meet it surface as negative float.
    #[serde(default)]
    pub finish_no_later_than: Option<NaiveDate>,
    /// Verbosity level: 0=silent, 1=passes, 2=steps, 3=trace.
    #[serde(default)]
    pub verbosity: u8,
}

impl ScheduleOptions {
    pub fn new(project_start: NaiveDate) -> Self {
        Self {
            project_start,
            finish_no_later_than: None,
            verbosity: 0,
        }
    }
}

/// Cost of shortening a task by one working day, and how far it can go.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CostSlope {
    pub task: String,
    /// Cost increase per working day removed.
    pub cost_per_day: f64,
    /// Duration floor; crashing never reduces below this.
    pub min_duration: i64,
}

/// Configuration for schedule compression.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Whether to fall back to fast-tracking once crashing is exhausted.
    pub fast_track: bool,
    /// Working days of overlap introduced per fast-tracked edge.
    pub overlap_days: i64,
    /// Hard cap on compression rounds; 0 means `tasks * 100`.
    pub max_iterations: usize,
    /// Verbosity level: 0=silent, 1=passes, 2=steps, 3=trace.
    pub verbosity: u8,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            fast_track: true,
            overlap_days: 1,
            max_iterations: 0,
            verbosity: 0,
        }
    }
}

/// Configuration for resource leveling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelingConfig {
    /// Hard cap on leveling rounds; 0 means `tasks * 100`.
    pub max_iterations: usize,
    /// Verbosity level: 0=silent, 1=passes, 2=steps, 3=trace.
    pub verbosity: u8,
}

impl Default for LevelingConfig {
    fn default() -> Self {
        Self {
            max_iterations: 0,
            verbosity: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_defaults() {
        let config = CompressionConfig::default();
        assert!(config.fast_track);
        assert_eq!(config.overlap_days, 1);
        assert_eq!(config.max_iterations, 0);
    }

    #[test]
    fn test_schedule_options() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        let options = ScheduleOptions::new(start);
        assert_eq!(options.project_start, start);
        assert_eq!(options.finish_no_later_than, None);
    }
}
