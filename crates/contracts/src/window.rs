//! Time-of-day eligibility window
//!
//! A sink may restrict delivery to records whose timestamp falls inside a
//! daily `[from, to]` window. Only the time-of-day component is compared, and
//! a window with `from > to` spans midnight.

use chrono::{NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a time-of-day bound cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid time of day '{input}': {reason}")]
pub struct TimeOfDayError {
    pub input: String,
    pub reason: &'static str,
}

impl TimeOfDayError {
    fn new(input: impl Into<String>, reason: &'static str) -> Self {
        Self {
            input: input.into(),
            reason,
        }
    }
}

/// Wall-clock time used as a window bound.
///
/// Accepts `H`, `HH`, `HH:MM` and `HH:MM:SS` on a 24-hour clock. In TOML or
/// JSON a bare integer is read as a whole hour.
///
/// # Examples
/// ```
/// use contracts::TimeOfDay;
///
/// let t: TimeOfDay = "09:30".parse().unwrap();
/// assert_eq!(t.to_string(), "09:30");
/// assert!("25:00".parse::<TimeOfDay>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTimeOfDay", into = "String")]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    /// Build from hour/minute/second, `None` if out of range
    pub fn from_hms(hour: u32, minute: u32, second: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, second).map(Self)
    }

    /// Underlying chrono time
    #[inline]
    pub fn as_naive(&self) -> NaiveTime {
        self.0
    }
}

impl From<NaiveTime> for TimeOfDay {
    fn from(time: NaiveTime) -> Self {
        Self(time)
    }
}

impl FromStr for TimeOfDay {
    type Err = TimeOfDayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let parts: Vec<&str> = trimmed.split(':').collect();
        if parts.len() > 3 {
            return Err(TimeOfDayError::new(s, "expected H, HH:MM or HH:MM:SS"));
        }

        let mut values = [0u32; 3];
        for (slot, part) in values.iter_mut().zip(&parts) {
            if part.is_empty() || part.len() > 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(TimeOfDayError::new(s, "components must be 1-2 digits"));
            }
            *slot = part
                .parse()
                .map_err(|_| TimeOfDayError::new(s, "components must be 1-2 digits"))?;
        }

        Self::from_hms(values[0], values[1], values[2])
            .ok_or_else(|| TimeOfDayError::new(s, "out of range for a 24-hour clock"))
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.second() == 0 {
            write!(f, "{}", self.0.format("%H:%M"))
        } else {
            write!(f, "{}", self.0.format("%H:%M:%S"))
        }
    }
}

impl From<TimeOfDay> for String {
    fn from(time: TimeOfDay) -> Self {
        time.to_string()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimeOfDay {
    Hour(u32),
    Text(String),
}

impl TryFrom<RawTimeOfDay> for TimeOfDay {
    type Error = TimeOfDayError;

    fn try_from(raw: RawTimeOfDay) -> Result<Self, Self::Error> {
        match raw {
            RawTimeOfDay::Hour(hour) => Self::from_hms(hour, 0, 0)
                .ok_or_else(|| TimeOfDayError::new(hour.to_string(), "hour must be 0-23")),
            RawTimeOfDay::Text(text) => text.parse(),
        }
    }
}

/// Daily eligibility window, inclusive at both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub from: TimeOfDay,
    pub to: TimeOfDay,
}

impl TimeWindow {
    pub fn new(from: TimeOfDay, to: TimeOfDay) -> Self {
        Self { from, to }
    }

    /// True when the window crosses midnight (`from > to`)
    pub fn wraps_midnight(&self) -> bool {
        self.from > self.to
    }

    /// Whether a time of day is eligible for delivery
    pub fn contains(&self, t: NaiveTime) -> bool {
        let from = self.from.as_naive();
        let to = self.to.as_naive();
        if from <= to {
            from <= t && t <= to
        } else {
            t >= from || t <= to
        }
    }

    /// Whether a timestamp's time-of-day is eligible for delivery
    pub fn contains_timestamp(&self, timestamp: &NaiveDateTime) -> bool {
        self.contains(timestamp.time())
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.from, self.to)
    }
}
