// crates/reprocess-gate-core/src/core/time.rs
// ============================================================================
// Module: Reprocess Gate Time Model
// Description: Canonical timestamp and analysis-date representations.
// Purpose: Provide deterministic, replayable time values across attempt records.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! The gate works with two notions of time: the calendar date a unit of work
//! analyses ([`AnalysisDate`]) and the instant an attempt happened
//! ([`Timestamp`]). The core engine never reads wall-clock time directly;
//! hosts supply it through a [`crate::interfaces::Clock`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use thiserror::Error;
use time::Date;
use time::Duration;
use time::macros::format_description;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Milliseconds in one hour.
pub const MILLIS_PER_HOUR: i64 = 60 * 60 * 1_000;
/// Milliseconds in one day.
pub const MILLIS_PER_DAY: i64 = 24 * MILLIS_PER_HOUR;

// ============================================================================
// SECTION: Timestamps
// ============================================================================

/// Canonical timestamp used in attempt records and breaker cooldowns.
///
/// # Invariants
/// - Values are unix epoch milliseconds supplied by a clock; the core never
///   reads wall-clock time itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix epoch milliseconds.
    #[must_use]
    pub const fn from_unix_millis(value: i64) -> Self {
        Self(value)
    }

    /// Returns the timestamp as unix epoch milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Returns a timestamp shifted forward by `millis`, saturating at the bounds.
    #[must_use]
    pub const fn saturating_add_millis(self, millis: i64) -> Self {
        Self(self.0.saturating_add(millis))
    }

    /// Returns the milliseconds elapsed since `earlier` (negative if `earlier` is later).
    #[must_use]
    pub const fn millis_since(self, earlier: Self) -> i64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Analysis Dates
// ============================================================================

/// Errors raised when parsing analysis dates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid analysis date `{value}`: expected YYYY-MM-DD")]
pub struct DateParseError {
    /// Rejected input.
    pub value: String,
}

/// Calendar date a unit of work analyses; serialized as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AnalysisDate(Date);

impl AnalysisDate {
    /// Wraps a calendar date.
    #[must_use]
    pub const fn new(date: Date) -> Self {
        Self(date)
    }

    /// Builds a date from year, month (1-12), and day components.
    ///
    /// # Errors
    ///
    /// Returns [`DateParseError`] when the components do not form a valid date.
    pub fn from_ymd(year: i32, month: u8, day: u8) -> Result<Self, DateParseError> {
        let invalid = || DateParseError {
            value: format!("{year:04}-{month:02}-{day:02}"),
        };
        let month = time::Month::try_from(month).map_err(|_| invalid())?;
        Date::from_calendar_date(year, month, day).map(Self).map_err(|_| invalid())
    }

    /// Returns the underlying calendar date.
    #[must_use]
    pub const fn date(self) -> Date {
        self.0
    }

    /// Returns the date `days` days earlier, or `None` on calendar underflow.
    #[must_use]
    pub fn checked_sub_days(self, days: u32) -> Option<Self> {
        self.0.checked_sub(Duration::days(i64::from(days))).map(Self)
    }

    /// Returns the date `days` days later, or `None` on calendar overflow.
    #[must_use]
    pub fn checked_add_days(self, days: u32) -> Option<Self> {
        self.0.checked_add(Duration::days(i64::from(days))).map(Self)
    }

    /// Returns the whole days elapsed since `earlier` (negative if `earlier` is later).
    #[must_use]
    pub fn days_since(self, earlier: Self) -> i64 {
        (self.0 - earlier.0).whole_days()
    }
}

impl fmt::Display for AnalysisDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.0.year(), u8::from(self.0.month()), self.0.day())
    }
}

impl FromStr for AnalysisDate {
    type Err = DateParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Date::parse(value.trim(), format_description!("[year]-[month]-[day]")).map(Self).map_err(
            |_| DateParseError {
                value: value.to_string(),
            },
        )
    }
}

impl Serialize for AnalysisDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AnalysisDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
