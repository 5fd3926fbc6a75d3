//! Time source abstraction.
//!
//! Log timestamps use UTC; the on-shift evaluation uses the local wall clock. Both come from a
//! [`Clock`] so tests can pin "now".

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Wall-clock date and time in the process's local timezone.
    fn local_now(&self) -> NaiveDateTime {
        self.now().with_timezone(&Local).naive_local()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at a given wall-clock instant.
///
/// The same naive value is reported as both the local time and (interpreted as UTC) the UTC time,
/// which keeps test expectations independent of the host timezone.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock {
    at: NaiveDateTime,
}

impl FixedClock {
    pub fn new(at: NaiveDateTime) -> Self {
        Self { at }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.at)
    }

    fn local_now(&self) -> NaiveDateTime {
        self.at
    }
}
