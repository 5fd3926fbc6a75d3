//! On-shift evaluation over weekly availability windows.
//!
//! A window is a recurring weekly range: a day of week (0 = Sunday .. 6 = Saturday) and an
//! `HH:mm` start and end. When the end is earlier than the start the window runs overnight: it
//! starts on its own day and finishes on the following morning. Rather than storing two rows for
//! such a window, evaluation checks each window under two hypotheses, "the window started today"
//! and "the window started yesterday".
//!
//! Evaluation works on the caller's wall-clock date and time. There is no timezone parameter; a
//! caller in a different timezone from the roster gets the roster's windows read in its own local
//! time.
//!
//! The evaluator is total: a window whose day is out of range or whose times do not parse simply
//! does not match.
//!
//! Times must be exactly `HH:mm`, zero padded, `00:00` to `23:59`. `9:00` is rejected rather than
//! read as `09:00`, and `24:00` is not accepted as an end of day; a window running to midnight
//! ends at `23:59`, which is inclusive.

use crate::clock::Clock;
use crate::{CoreError, CoreResult};
use chrono::{Datelike, NaiveDateTime, NaiveTime, Timelike};
use hms_uuid::ShardableUuid;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Whether a window counts towards being on shift.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WindowStatus {
    #[default]
    Active,
    Inactive,
}

impl WindowStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
        }
    }
}

impl fmt::Display for WindowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WindowStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(Self::Active),
            "INACTIVE" => Ok(Self::Inactive),
            other => Err(CoreError::InvalidInput(format!(
                "unknown window status '{other}'"
            ))),
        }
    }
}

/// Doctor availability rows carry an `is_available` flag; nurse shifts carry a status.
impl From<bool> for WindowStatus {
    fn from(is_available: bool) -> Self {
        if is_available {
            Self::Active
        } else {
            Self::Inactive
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub owner_id: ShardableUuid,
    /// 0 = Sunday .. 6 = Saturday.
    pub day_of_week: u8,
    /// `HH:mm`, zero padded.
    pub start_time: String,
    /// `HH:mm`, zero padded. Earlier than `start_time` for an overnight window.
    pub end_time: String,
    #[serde(default)]
    pub status: WindowStatus,
}

impl AvailabilityWindow {
    /// True when the end time is earlier than the start time.
    ///
    /// Malformed times are never overnight.
    pub fn is_overnight(&self) -> bool {
        match (minute_of_day(&self.start_time), minute_of_day(&self.end_time)) {
            (Some(start), Some(end)) => end < start,
            _ => false,
        }
    }

    /// Rejects windows that could never match: day out of range or unparsable times.
    ///
    /// Evaluation tolerates such windows; this is for rejecting them at write time.
    pub fn validate(&self) -> CoreResult<()> {
        if self.day_of_week > 6 {
            return Err(CoreError::InvalidInput(format!(
                "day_of_week must be 0..=6, got {}",
                self.day_of_week
            )));
        }
        for (field, value) in [("start_time", &self.start_time), ("end_time", &self.end_time)] {
            if minute_of_day(value).is_none() {
                return Err(CoreError::InvalidInput(format!(
                    "{field} must be HH:mm, got '{value}'"
                )));
            }
        }
        Ok(())
    }
}

/// Zero-sized namespace for on-shift evaluation.
///
/// This is the single definition of "on shift now"; the KPI aggregate and the per-member badge
/// both call it.
pub struct ShiftAvailabilityEvaluator;

impl ShiftAvailabilityEvaluator {
    /// True if any active window covers `now`.
    pub fn is_on_shift_at<'a, I>(windows: I, now: NaiveDateTime) -> bool
    where
        I: IntoIterator<Item = &'a AvailabilityWindow>,
    {
        windows
            .into_iter()
            .any(|window| Self::window_is_active(window, now))
    }

    /// [`is_on_shift_at`](Self::is_on_shift_at) evaluated at the clock's local wall time.
    pub fn is_on_shift_now<'a, I>(windows: I, clock: &dyn Clock) -> bool
    where
        I: IntoIterator<Item = &'a AvailabilityWindow>,
    {
        Self::is_on_shift_at(windows, clock.local_now())
    }

    /// Whether a single window covers `now`, to the minute.
    pub fn window_is_active(window: &AvailabilityWindow, now: NaiveDateTime) -> bool {
        if !window.status.is_active() || window.day_of_week > 6 {
            return false;
        }
        let (Some(start), Some(end)) = (
            minute_of_day(&window.start_time),
            minute_of_day(&window.end_time),
        ) else {
            return false;
        };

        let current_day = day_index(now);
        let previous_day = (current_day + 6) % 7;
        let current_time = now.hour() * 60 + now.minute();
        let day = u32::from(window.day_of_week);

        if end < start {
            if day == current_day {
                current_time >= start
            } else if day == previous_day {
                current_time <= end
            } else {
                false
            }
        } else {
            day == current_day && start <= current_time && current_time <= end
        }
    }
}

/// Day of week with Sunday = 0.
pub fn day_index(at: NaiveDateTime) -> u32 {
    at.weekday().num_days_from_sunday()
}

/// Minutes since midnight for a zero-padded `HH:mm` string, or `None` otherwise.
fn minute_of_day(value: &str) -> Option<u32> {
    let value = value.trim();
    let padded = value.len() == 5
        && value
            .bytes()
            .enumerate()
            .all(|(i, b)| if i == 2 { b == b':' } else { b.is_ascii_digit() });
    if !padded {
        return None;
    }
    NaiveTime::parse_from_str(value, "%H:%M")
        .ok()
        .map(|t| t.hour() * 60 + t.minute())
}
