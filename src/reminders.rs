//! Follow-up timing in the office's local time
//!
//! The office runs on a fixed UTC offset (+5 by default). Reminders fire at
//! a fixed local hour N days ahead and are only sent inside working hours.

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike, Utc};

use crate::error::{LeadEngineError, Result};

/// Local clock used for reminder scheduling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderClock {
    offset: TimeDelta,
    reminder_time: NaiveTime,
    working_start: u32,
    working_end: u32,
}

impl ReminderClock {
    /// Create a clock.
    ///
    /// # Arguments
    ///
    /// * `utc_offset_hours` - Local offset from UTC, in -12..=14
    /// * `reminder_hour` - Local hour reminders are scheduled at
    /// * `working_start` - First local working hour
    /// * `working_end` - Local hour working time ends (exclusive)
    pub fn new(
        utc_offset_hours: i32,
        reminder_hour: u32,
        working_start: u32,
        working_end: u32,
    ) -> Result<Self> {
        if !(-12..=14).contains(&utc_offset_hours) {
            return Err(LeadEngineError::InvalidConfig(format!(
                "UTC offset out of range: {utc_offset_hours}"
            )));
        }
        let reminder_time = NaiveTime::from_hms_opt(reminder_hour, 0, 0).ok_or_else(|| {
            LeadEngineError::InvalidConfig(format!("Invalid reminder hour: {reminder_hour}"))
        })?;
        if working_start >= working_end || working_end > 24 {
            return Err(LeadEngineError::InvalidConfig(format!(
                "Invalid working hours: {working_start}..{working_end}"
            )));
        }

        Ok(Self {
            offset: TimeDelta::hours(i64::from(utc_offset_hours)),
            reminder_time,
            working_start,
            working_end,
        })
    }

    /// Local wall-clock time for a UTC instant
    #[must_use]
    pub fn local(&self, now: DateTime<Utc>) -> NaiveDateTime {
        now.naive_utc() + self.offset
    }

    /// UTC time of the reminder hour, `days` local days after `now`
    #[must_use]
    pub fn reminder_at(&self, now: DateTime<Utc>, days: u32) -> NaiveDateTime {
        let local_date = self.local(now).date();
        let target = local_date
            .checked_add_days(Days::new(u64::from(days)))
            .unwrap_or(NaiveDate::MAX);
        target.and_time(self.reminder_time) - self.offset
    }

    /// Whether `now` falls inside local working hours
    #[must_use]
    pub fn is_working_hours(&self, now: DateTime<Utc>) -> bool {
        let hour = self.local(now).hour();
        (self.working_start..self.working_end).contains(&hour)
    }
}

impl Default for ReminderClock {
    fn default() -> Self {
        Self {
            offset: TimeDelta::hours(5),
            reminder_time: NaiveTime::MIN + TimeDelta::hours(10),
            working_start: 9,
            working_end: 22,
        }
    }
}
