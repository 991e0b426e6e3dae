//! Clock port and local calendar
//!
//! Site identifiers embed the month and year of the local calendar date.
//! Abstracting "now" behind [`Clock`] keeps that deterministic in tests,
//! and [`LocalCalendar`] pins which timezone "local" means.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::error::CoreError;

/// Provides the current time
pub trait Clock: Send + Sync {
    /// Returns the current UTC time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at a single instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Converts instants into calendar dates of the business timezone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalCalendar {
    tz: Tz,
}

impl LocalCalendar {
    /// The timezone the console operates in unless configured otherwise
    pub const DEFAULT_TIMEZONE: &'static str = "Asia/Kolkata";

    /// Creates a calendar for the given timezone
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Parses an IANA timezone name such as `Asia/Kolkata`
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Configuration` for unknown timezone names
    pub fn parse(name: &str) -> Result<Self, CoreError> {
        name.trim()
            .parse::<Tz>()
            .map(Self::new)
            .map_err(|_| CoreError::configuration(format!("Unknown timezone: {}", name)))
    }

    /// Returns the configured timezone
    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Returns the local calendar date of an instant
    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.tz).date_naive()
    }

    /// Returns today's local date according to the clock
    pub fn today(&self, clock: &dyn Clock) -> NaiveDate {
        self.date_of(clock.now())
    }
}

impl Default for LocalCalendar {
    fn default() -> Self {
        Self::new(chrono_tz::Asia::Kolkata)
    }
}
