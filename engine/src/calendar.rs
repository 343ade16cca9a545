//! Working-day calendar used to convert dates to working durations and back.
//!
//! All scheduling arithmetic runs in integer working-day offsets from the
//! project start; this module owns the boundary between those offsets and
//! calendar dates. Weekends are whichever weekdays the calendar excludes,
//! holidays are explicit dates on top of that.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use rustc_hash::FxHashSet;

/// Error types for calendar construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    /// Every weekday is non-working, so no duration can ever be placed.
    NoWorkingDays,
}

impl std::fmt::Display for CalendarError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalendarError::NoWorkingDays => {
                write!(f, "Calendar has no working weekdays")
            }
        }
    }
}

impl std::error::Error for CalendarError {}

/// Working-weekday/holiday model.
///
/// A date is a working day iff its weekday is in the working set and it is
/// not listed as a holiday.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkCalendar {
    /// Indexed by `Weekday::num_days_from_monday()`.
    working: [bool; 7],
    holidays: FxHashSet<NaiveDate>,
}

impl Default for WorkCalendar {
    /// Monday through Friday, no holidays.
    fn default() -> Self {
        Self {
            working: [true, true, true, true, true, false, false],
            holidays: FxHashSet::default(),
        }
    }
}

impl WorkCalendar {
    /// Create a calendar working on exactly the given weekdays.
    pub fn new(weekdays: &[Weekday]) -> Result<Self, CalendarError> {
        if weekdays.is_empty() {
            return Err(CalendarError::NoWorkingDays);
        }
        let mut working = [false; 7];
        for wd in weekdays {
            working[wd.num_days_from_monday() as usize] = true;
        }
        Ok(Self {
            working,
            holidays: FxHashSet::default(),
        })
    }

    /// Add holidays to the calendar.
    pub fn with_holidays(mut self, holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.holidays.extend(holidays);
        self
    }

    /// Whether work can be performed on this date.
    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        self.working[date.weekday().num_days_from_monday() as usize]
            && !self.holidays.contains(&date)
    }

    /// First working day at or after `date`.
    pub fn next_working_day(&self, date: NaiveDate) -> NaiveDate {
        let mut current = date;
        while !self.is_working_day(current) {
            current = current
                .checked_add_days(Days::new(1))
                .expect("date overflow while rolling forward");
        }
        current
    }

    /// First working day at or before `date`.
    pub fn prev_working_day(&self, date: NaiveDate) -> NaiveDate {
        let mut current = date;
        while !self.is_working_day(current) {
            current = current
                .checked_sub_days(Days::new(1))
                .expect("date underflow while rolling backward");
        }
        current
    }

    /// The working day `offset` working days away from `date`.
    ///
    /// `date` is first rolled forward to a working day; offset 0 returns the
    /// rolled date, positive offsets step forward, negative offsets step
    /// backward, always landing on working days.
    pub fn add_working_days(&self, date: NaiveDate, offset: i64) -> NaiveDate {
        let mut current = self.next_working_day(date);
        let mut remaining = offset;
        while remaining > 0 {
            current = self.next_working_day(
                current
                    .checked_add_days(Days::new(1))
                    .expect("date overflow while adding working days"),
            );
            remaining -= 1;
        }
        while remaining < 0 {
            current = self.prev_working_day(
                current
                    .checked_sub_days(Days::new(1))
                    .expect("date underflow while subtracting working days"),
            );
            remaining += 1;
        }
        current
    }

    /// Signed count of working days in `[from, to)`.
    ///
    /// Negative when `to` is before `from`.
    pub fn working_days_between(&self, from: NaiveDate, to: NaiveDate) -> i64 {
        if to < from {
            return -self.working_days_between(to, from);
        }
        let mut count = 0;
        let mut current = from;
        while current < to {
            if self.is_working_day(current) {
                count += 1;
            }
            current = current
                .checked_add_days(Days::new(1))
                .expect("date overflow while counting working days");
        }
        count
    }

    /// Working-day offset of a start-type constraint date.
    ///
    /// Non-working dates roll forward: "start no earlier than Saturday"
    /// means the following Monday on a weekday calendar.
    pub fn start_offset_of(&self, project_start: NaiveDate, date: NaiveDate) -> i64 {
        let origin = self.next_working_day(project_start);
        self.working_days_between(origin, self.next_working_day(date))
    }

    /// Exclusive finish boundary of a finish-type constraint date.
    ///
    /// The constraint date is the inclusive last day work may occupy, so the
    /// boundary is the count of working days in `[project_start, date]`.
    pub fn finish_offset_of(&self, project_start: NaiveDate, date: NaiveDate) -> i64 {
        let origin = self.next_working_day(project_start);
        let day_after = date
            .checked_add_days(Days::new(1))
            .expect("date overflow at finish boundary");
        self.working_days_between(origin, day_after)
    }

    /// Calendar date of a working-day offset from the project start.
    pub fn date_at(&self, project_start: NaiveDate, offset: i64) -> NaiveDate {
        self.add_working_days(project_start, offset)
    }
}
