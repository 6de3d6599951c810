//! The logical test date and the shapes a test author may hand us
//!
//! `LogicalDate` is the single authoritative "current test time". It is kept
//! at millisecond precision because that is the resolution of the browser's
//! `Date` and therefore of everything the page can observe.

use chrono::{
    DateTime, Days, FixedOffset, Local, NaiveDate, NaiveDateTime, Offset, SubsecRound, TimeDelta,
    TimeZone, Utc,
};
use nutype::nutype;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::node_timestamp::NodeTimestamp;

/// A calendar instant at millisecond precision
#[nutype(
    sanitize(with = truncate_to_millis),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Serialize,
        Deserialize,
        AsRef
    )
)]
pub struct LogicalDate(DateTime<Utc>);

fn truncate_to_millis(value: DateTime<Utc>) -> DateTime<Utc> {
    value.trunc_subsecs(3)
}

impl LogicalDate {
    /// The real wall-clock time, used as the starting point of every test
    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    /// Build from milliseconds since the Unix epoch
    pub fn from_epoch_millis(millis: i64) -> Result<Self, DateParseError> {
        DateTime::from_timestamp_millis(millis)
            .map(Self::new)
            .ok_or(DateParseError::OutOfRange { millis })
    }

    /// Parse the textual forms a browser's `Date` constructor would accept
    /// for fixture input.
    ///
    /// Strings without an offset are read as UTC, which is what browsers do
    /// for date-only ISO strings. We extend that to naive date-times so the
    /// result never depends on the host time zone.
    pub fn parse(text: &str) -> Result<Self, DateParseError> {
        let trimmed = text.trim();

        if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(Self::new(parsed.with_timezone(&Utc)));
        }
        if let Ok(parsed) = DateTime::parse_from_rfc2822(trimmed) {
            return Ok(Self::new(parsed.with_timezone(&Utc)));
        }
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Ok(Self::new(naive.and_utc()));
            }
        }
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
                return Ok(Self::new(midnight.and_utc()));
            }
        }

        Err(DateParseError::Unparseable {
            input: text.to_string(),
        })
    }

    /// Milliseconds since the Unix epoch, the value a browser `Date` holds
    pub fn epoch_millis(&self) -> i64 {
        self.into_inner().timestamp_millis()
    }

    /// The instant as the node sees it
    pub fn node_timestamp(&self) -> Option<NodeTimestamp> {
        NodeTimestamp::from_epoch_millis(self.epoch_millis())
    }

    /// Move by whole calendar days as observed in `zone`.
    ///
    /// Wall-clock time of day is preserved in `zone`, so crossing a
    /// daylight-saving change shifts the UTC instant by 23 or 25 hours. A
    /// wall-clock time that occurs twice resolves to the earlier instant; one
    /// that falls in a gap is read with the offset in force before the gap,
    /// which lands past it, as a browser's `Date.setDate` does.
    pub fn checked_add_days_in<Tz: TimeZone>(&self, days: i64, zone: &Tz) -> Option<Self> {
        let wall_clock = self.into_inner().with_timezone(zone).naive_local();
        let shifted = if days >= 0 {
            wall_clock.checked_add_days(Days::new(days.unsigned_abs()))
        } else {
            wall_clock.checked_sub_days(Days::new(days.unsigned_abs()))
        }?;

        let instant = match zone.from_local_datetime(&shifted).earliest() {
            Some(resolved) => resolved.with_timezone(&Utc),
            None => resolve_in_gap(&shifted, zone)?,
        };
        Some(Self::new(instant))
    }
}

/// Longest stretch of wall-clock time a zone transition can skip
const MAX_GAP_HOURS: i64 = 24;

fn resolve_in_gap<Tz: TimeZone>(wall_clock: &NaiveDateTime, zone: &Tz) -> Option<DateTime<Utc>> {
    let offset = (1..=MAX_GAP_HOURS).find_map(|hours| {
        let before = wall_clock.checked_sub_signed(TimeDelta::hours(hours))?;
        zone.offset_from_local_datetime(&before)
            .earliest()
            .map(|offset| offset.fix())
    })?;
    let utc = wall_clock.checked_sub_signed(TimeDelta::seconds(i64::from(
        offset.local_minus_utc(),
    )))?;
    Some(utc.and_utc())
}

impl fmt::Display for LogicalDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.into_inner()
                .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
        )
    }
}

/// Calendar used when adding days to the logical date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarZone {
    /// The host's time zone, which is also the browser's calendar
    #[default]
    Local,
    /// Plain UTC days, always 24 hours long
    Utc,
}

impl CalendarZone {
    pub fn add_days(&self, date: &LogicalDate, days: i64) -> Result<LogicalDate, DateParseError> {
        let shifted = match self {
            CalendarZone::Local => date.checked_add_days_in(days, &Local),
            CalendarZone::Utc => date.checked_add_days_in(days, &Utc),
        };
        shifted.ok_or(DateParseError::DayOverflow { from: *date, days })
    }
}

/// Everything `set` accepts from a test author
#[derive(Debug, Clone, PartialEq)]
pub enum DateInput {
    EpochMillis(i64),
    Text(String),
    Instant(DateTime<Utc>),
    Logical(LogicalDate),
}

impl From<i64> for DateInput {
    fn from(millis: i64) -> Self {
        DateInput::EpochMillis(millis)
    }
}

impl From<&str> for DateInput {
    fn from(text: &str) -> Self {
        DateInput::Text(text.to_string())
    }
}

impl From<String> for DateInput {
    fn from(text: String) -> Self {
        DateInput::Text(text)
    }
}

impl From<DateTime<Utc>> for DateInput {
    fn from(instant: DateTime<Utc>) -> Self {
        DateInput::Instant(instant)
    }
}

impl From<DateTime<FixedOffset>> for DateInput {
    fn from(instant: DateTime<FixedOffset>) -> Self {
        DateInput::Instant(instant.with_timezone(&Utc))
    }
}

impl From<LogicalDate> for DateInput {
    fn from(date: LogicalDate) -> Self {
        DateInput::Logical(date)
    }
}

impl TryFrom<DateInput> for LogicalDate {
    type Error = DateParseError;

    fn try_from(input: DateInput) -> Result<Self, Self::Error> {
        match input {
            DateInput::EpochMillis(millis) => LogicalDate::from_epoch_millis(millis),
            DateInput::Text(text) => LogicalDate::parse(&text),
            DateInput::Instant(instant) => Ok(LogicalDate::new(instant)),
            DateInput::Logical(date) => Ok(date),
        }
    }
}

/// Errors turning author input into a `LogicalDate`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateParseError {
    #[error("Unrecognised date: {input:?}")]
    Unparseable { input: String },

    #[error("Epoch milliseconds out of range: {millis}")]
    OutOfRange { millis: i64 },

    #[error("Adding {days} days to {from} leaves the supported calendar range")]
    DayOverflow { from: LogicalDate, days: i64 },
}
