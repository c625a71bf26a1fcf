//! Normalize date and timestamp inputs and validate them against a calendar.
//!
//! Every public calendar method accepts any value convertible into a [`TimestampInput`] and
//! passes it through one of the functions here, in one of two roles:
//!
//! - **date**: must normalize to a UTC (or naive) midnight; see [`parse_date`].
//! - **minute**: any instant, reduced to minute resolution; see [`parse_timestamp`]. Sub-minute
//!   precision is only accepted when a `side` determines the rounding direction, `Side::Left`
//!   flooring and `Side::Right` ceiling.
//!
//! Naive inputs are read as UTC. The `*_in` variants, and [`parse_session`] /
//! [`parse_trading_minute`], additionally check the value against anything implementing
//! [`CalendarBounds`].
//!
//! ### Example
//! ```rust
//! # use trading_calendars::parsing::{parse_date, parse_timestamp};
//! # use trading_calendars::scheduling::{nd, utc, Side};
//! assert_eq!(parse_date("2021-01-04", "date").unwrap(), nd(2021, 1, 4));
//! assert!(parse_date("2021-01-04 10:30", "date").is_err());
//! let minute = parse_timestamp("2021-01-04 14:30:45", "minute", Some(Side::Right)).unwrap();
//! assert_eq!(minute, utc(2021, 1, 4, 14, 31));
//! ```

use chrono::prelude::*;
use chrono_tz::Tz;
use std::fmt;

use crate::errors::{BoundKind, CalendarError, Violation};
use crate::scheduling::utils::{nanos_to_date, nanos_to_utc, NANOS_PER_MINUTE};
use crate::scheduling::Side;

/// A date or time-like value accepted by parsing functions.
#[derive(Debug, Clone, PartialEq)]
pub enum TimestampInput {
    /// A string in ISO 8601 / RFC 3339 or a common date format.
    Str(String),
    /// Nanoseconds since the UNIX epoch.
    Nanos(i64),
    /// A calendar date, equivalent to naive midnight.
    Date(NaiveDate),
    /// A timezone naive date and time, read as UTC.
    Naive(NaiveDateTime),
    /// A timezone aware date and time.
    Aware(DateTime<FixedOffset>),
}

impl fmt::Display for TimestampInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestampInput::Str(s) => write!(f, "{}", s),
            TimestampInput::Nanos(n) => write!(f, "{}", n),
            TimestampInput::Date(d) => write!(f, "{}", d),
            TimestampInput::Naive(d) => write!(f, "{}", d),
            TimestampInput::Aware(d) => write!(f, "{}", d),
        }
    }
}

impl From<&str> for TimestampInput {
    fn from(item: &str) -> Self {
        TimestampInput::Str(item.to_string())
    }
}

impl From<String> for TimestampInput {
    fn from(item: String) -> Self {
        TimestampInput::Str(item)
    }
}

impl From<&String> for TimestampInput {
    fn from(item: &String) -> Self {
        TimestampInput::Str(item.clone())
    }
}

impl From<i64> for TimestampInput {
    fn from(item: i64) -> Self {
        TimestampInput::Nanos(item)
    }
}

impl From<NaiveDate> for TimestampInput {
    fn from(item: NaiveDate) -> Self {
        TimestampInput::Date(item)
    }
}

impl From<&NaiveDate> for TimestampInput {
    fn from(item: &NaiveDate) -> Self {
        TimestampInput::Date(*item)
    }
}

impl From<NaiveDateTime> for TimestampInput {
    fn from(item: NaiveDateTime) -> Self {
        TimestampInput::Naive(item)
    }
}

impl From<DateTime<Utc>> for TimestampInput {
    fn from(item: DateTime<Utc>) -> Self {
        TimestampInput::Aware(item.fixed_offset())
    }
}

impl From<&DateTime<Utc>> for TimestampInput {
    fn from(item: &DateTime<Utc>) -> Self {
        TimestampInput::Aware(item.fixed_offset())
    }
}

impl From<DateTime<FixedOffset>> for TimestampInput {
    fn from(item: DateTime<FixedOffset>) -> Self {
        TimestampInput::Aware(item)
    }
}

impl From<DateTime<Tz>> for TimestampInput {
    fn from(item: DateTime<Tz>) -> Self {
        TimestampInput::Aware(item.fixed_offset())
    }
}

/// Bounds and membership of a calendar, as required to validate parsed values.
pub trait CalendarBounds {
    /// Name used in error messages.
    fn calendar_name(&self) -> &str;

    /// Side used to round sub-minute inputs in the minute role.
    fn calendar_side(&self) -> Side;

    fn first_session_nanos(&self) -> i64;
    fn last_session_nanos(&self) -> i64;
    fn first_minute_nanos(&self) -> i64;
    fn last_minute_nanos(&self) -> i64;

    /// Returns whether the UTC midnight `nanos` is a session.
    fn is_session_nanos(&self, nanos: i64) -> bool;

    /// Returns whether `nanos` is a trading minute.
    fn is_trading_minute_nanos(&self, nanos: i64) -> bool;
}

// A normalized value: UTC wall time plus the offset it was given in, if any.
struct Normalized {
    utc: NaiveDateTime,
    offset_secs: Option<i32>,
    display: String,
}

impl Normalized {
    fn nanos(&self, param: &str) -> Result<i64, CalendarError> {
        self.utc
            .and_utc()
            .timestamp_nanos_opt()
            .ok_or_else(|| CalendarError::Parse {
                param: param.to_string(),
                value: self.display.clone(),
                reason: "The value is outside the range representable at nanosecond resolution."
                    .to_string(),
            })
    }
}

const AWARE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M%:z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d", "%Y/%m/%d"];

fn parse_str(s: &str) -> Option<(NaiveDateTime, Option<i32>)> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some((dt.naive_utc(), Some(dt.offset().local_minus_utc())));
    }
    for fmt in AWARE_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some((dt.naive_utc(), Some(dt.offset().local_minus_utc())));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some((dt, None));
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some((d.and_time(NaiveTime::MIN), None));
        }
    }
    None
}

fn normalize(value: TimestampInput, param: &str) -> Result<Normalized, CalendarError> {
    let display = value.to_string();
    let (utc, offset_secs) = match value {
        TimestampInput::Str(s) => parse_str(&s).ok_or_else(|| CalendarError::Parse {
            param: param.to_string(),
            value: display.clone(),
            reason: "The value could not be parsed as a timestamp.".to_string(),
        })?,
        TimestampInput::Nanos(n) => (DateTime::from_timestamp_nanos(n).naive_utc(), None),
        TimestampInput::Date(d) => (d.and_time(NaiveTime::MIN), None),
        TimestampInput::Naive(d) => (d, None),
        TimestampInput::Aware(d) => (d.naive_utc(), Some(d.offset().local_minus_utc())),
    };
    Ok(Normalized {
        utc,
        offset_secs,
        display,
    })
}

/// Parse a value in the minute role and return it as UTC epoch nanoseconds.
pub(crate) fn parse_timestamp_nanos(
    value: impl Into<TimestampInput>,
    param: &str,
    side: Option<Side>,
) -> Result<i64, CalendarError> {
    let normalized = normalize(value.into(), param)?;
    let nanos = normalized.nanos(param)?;
    let rem = nanos.rem_euclid(NANOS_PER_MINUTE);
    if rem == 0 {
        return Ok(nanos);
    }
    match side {
        Some(Side::Left) => Ok(nanos - rem),
        Some(Side::Right) => (nanos - rem)
            .checked_add(NANOS_PER_MINUTE)
            .ok_or_else(|| CalendarError::Parse {
                param: param.to_string(),
                value: normalized.display.clone(),
                reason: "The value is outside the range representable at nanosecond resolution."
                    .to_string(),
            }),
        _ => Err(CalendarError::Range(format!(
            "`{}` cannot have a non-zero second (or more accurate) component for `side` '{}', \
             although received as '{}'.",
            param,
            side.map(|s| s.to_string()).unwrap_or_else(|| "None".to_string()),
            normalized.display
        ))),
    }
}

/// Parse a value as an exact instant, without rounding to minute resolution.
pub(crate) fn parse_instant_nanos(
    value: impl Into<TimestampInput>,
    param: &str,
) -> Result<i64, CalendarError> {
    normalize(value.into(), param)?.nanos(param)
}

/// Parse a value in the minute role.
///
/// Timezone aware inputs are converted to UTC, naive inputs are read as UTC. An input with a
/// non-zero second (or finer) component is floored for `Side::Left`, ceiled for `Side::Right`
/// and rejected otherwise.
pub fn parse_timestamp(
    value: impl Into<TimestampInput>,
    param: &str,
    side: Option<Side>,
) -> Result<DateTime<Utc>, CalendarError> {
    parse_timestamp_nanos(value, param, side).map(nanos_to_utc)
}

/// Parse a value in the date role and return its UTC midnight as epoch nanoseconds.
pub(crate) fn parse_date_nanos(
    value: impl Into<TimestampInput>,
    param: &str,
) -> Result<i64, CalendarError> {
    let normalized = normalize(value.into(), param)?;
    if let Some(offset) = normalized.offset_secs {
        if offset != 0 {
            return Err(CalendarError::Range(format!(
                "Parameter `{}` received with timezone defined as offset {} seconds although \
                 a Date must be timezone naive or have timezone as 'UTC'. Received '{}'.",
                param, offset, normalized.display
            )));
        }
    }
    if normalized.utc.time() != NaiveTime::MIN {
        return Err(CalendarError::Range(format!(
            "Parameter `{}` parsed as '{}' although a Date must have a time component of \
             00:00.",
            param, normalized.display
        )));
    }
    normalized.nanos(param)
}

/// Parse a value in the date role.
///
/// The value must be timezone naive or UTC and must not carry a time component.
pub fn parse_date(
    value: impl Into<TimestampInput>,
    param: &str,
) -> Result<NaiveDate, CalendarError> {
    parse_date_nanos(value, param).map(nanos_to_date)
}

pub(crate) fn parse_date_nanos_in<C: CalendarBounds + ?Sized>(
    calendar: &C,
    value: impl Into<TimestampInput>,
    param: &str,
    raise_oob: bool,
) -> Result<i64, CalendarError> {
    let nanos = parse_date_nanos(value, param)?;
    if raise_oob {
        let (first, last) = (calendar.first_session_nanos(), calendar.last_session_nanos());
        let violated = if nanos < first {
            Some((Violation::Earliest, first))
        } else if nanos > last {
            Some((Violation::Latest, last))
        } else {
            None
        };
        if let Some((violation, bound)) = violated {
            return Err(CalendarError::OutOfBounds {
                kind: BoundKind::Date,
                calendar: calendar.calendar_name().to_string(),
                param: param.to_string(),
                value: nanos_to_date(nanos).to_string(),
                bound: nanos_to_date(bound).to_string(),
                violation,
            });
        }
    }
    Ok(nanos)
}

/// Parse a value in the date role, optionally raising if it falls outside the calendar's
/// first and last sessions.
pub fn parse_date_in<C: CalendarBounds + ?Sized>(
    calendar: &C,
    value: impl Into<TimestampInput>,
    param: &str,
    raise_oob: bool,
) -> Result<NaiveDate, CalendarError> {
    parse_date_nanos_in(calendar, value, param, raise_oob).map(nanos_to_date)
}

pub(crate) fn parse_minute_nanos_in<C: CalendarBounds + ?Sized>(
    calendar: &C,
    value: impl Into<TimestampInput>,
    param: &str,
    raise_oob: bool,
) -> Result<i64, CalendarError> {
    let nanos = parse_timestamp_nanos(value, param, Some(calendar.calendar_side()))?;
    if raise_oob {
        let (first, last) = (calendar.first_minute_nanos(), calendar.last_minute_nanos());
        let violated = if nanos < first {
            Some((Violation::Earliest, first))
        } else if nanos > last {
            Some((Violation::Latest, last))
        } else {
            None
        };
        if let Some((violation, bound)) = violated {
            return Err(CalendarError::OutOfBounds {
                kind: BoundKind::Minute,
                calendar: calendar.calendar_name().to_string(),
                param: param.to_string(),
                value: nanos_to_utc(nanos).to_string(),
                bound: nanos_to_utc(bound).to_string(),
                violation,
            });
        }
    }
    Ok(nanos)
}

/// Parse a value in the minute role using the calendar's side, optionally raising if it falls
/// outside the calendar's first and last minutes.
pub fn parse_minute_in<C: CalendarBounds + ?Sized>(
    calendar: &C,
    value: impl Into<TimestampInput>,
    param: &str,
    raise_oob: bool,
) -> Result<DateTime<Utc>, CalendarError> {
    parse_minute_nanos_in(calendar, value, param, raise_oob).map(nanos_to_utc)
}

pub(crate) fn parse_session_nanos<C: CalendarBounds + ?Sized>(
    calendar: &C,
    value: impl Into<TimestampInput>,
    param: &str,
) -> Result<i64, CalendarError> {
    let nanos = parse_date_nanos_in(calendar, value, param, true)?;
    if !calendar.is_session_nanos(nanos) {
        return Err(CalendarError::NotSession {
            calendar: calendar.calendar_name().to_string(),
            param: param.to_string(),
            value: nanos_to_date(nanos).to_string(),
        });
    }
    Ok(nanos)
}

/// Parse a value that must be a session of `calendar`.
pub fn parse_session<C: CalendarBounds + ?Sized>(
    calendar: &C,
    value: impl Into<TimestampInput>,
    param: &str,
) -> Result<NaiveDate, CalendarError> {
    parse_session_nanos(calendar, value, param).map(nanos_to_date)
}

pub(crate) fn parse_trading_minute_nanos<C: CalendarBounds + ?Sized>(
    calendar: &C,
    value: impl Into<TimestampInput>,
    param: &str,
) -> Result<i64, CalendarError> {
    let nanos = parse_minute_nanos_in(calendar, value, param, true)?;
    if !calendar.is_trading_minute_nanos(nanos) {
        return Err(CalendarError::NotTradingMinute {
            calendar: calendar.calendar_name().to_string(),
            param: param.to_string(),
            value: nanos_to_utc(nanos).to_string(),
        });
    }
    Ok(nanos)
}

/// Parse a value that must be a trading minute of `calendar`.
pub fn parse_trading_minute<C: CalendarBounds + ?Sized>(
    calendar: &C,
    value: impl Into<TimestampInput>,
    param: &str,
) -> Result<DateTime<Utc>, CalendarError> {
    parse_trading_minute_nanos(calendar, value, param).map(nanos_to_utc)
}
