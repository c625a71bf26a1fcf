//! Error types returned by calendar construction, parsing and queries.

use std::fmt;
use thiserror::Error;

/// Which bound of a calendar a value was checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundKind {
    /// A date checked against the first / last session.
    Date,
    /// A minute checked against the first / last trading minute.
    Minute,
    /// An instant checked against the first open / last close.
    Time,
    /// A construction `start` checked against the configured `bound_min`.
    Start,
    /// A construction `end` checked against the configured `bound_max`.
    End,
    /// A session navigation that would leave the calendar.
    Session,
}

/// Whether a value fell before the earliest or after the latest bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    Earliest,
    Latest,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Earliest => write!(f, "earlier"),
            Violation::Latest => write!(f, "later"),
        }
    }
}

impl BoundKind {
    fn describe(&self, violation: Violation) -> &'static str {
        match (self, violation) {
            (BoundKind::Date, Violation::Earliest) => "first session",
            (BoundKind::Date, Violation::Latest) => "last session",
            (BoundKind::Minute, Violation::Earliest) => "first minute",
            (BoundKind::Minute, Violation::Latest) => "last minute",
            (BoundKind::Time, Violation::Earliest) => "first open",
            (BoundKind::Time, Violation::Latest) => "last close",
            (BoundKind::Start, _) => "earliest date from which calendar can be constructed",
            (BoundKind::End, _) => "latest date to which calendar can be constructed",
            (BoundKind::Session, Violation::Earliest) => "first session",
            (BoundKind::Session, Violation::Latest) => "last session",
        }
    }
}

/// The single error type of the crate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalendarError {
    /// The input could not be interpreted as a timestamp at all.
    #[error("Parameter `{param}` received as '{value}' although a Date or Minute-like value is required. {reason}")]
    Parse {
        param: String,
        value: String,
        reason: String,
    },

    /// The input parsed but breaks a structural rule (time component on a date, timezone,
    /// ambiguous sub-minute precision, invalid argument combination).
    #[error("{0}")]
    Range(String),

    /// The input is a valid date or minute but falls outside the calendar.
    #[error("{}", out_of_bounds_message(.kind, .calendar, .param, .value, .bound, .violation))]
    OutOfBounds {
        kind: BoundKind,
        calendar: String,
        param: String,
        value: String,
        bound: String,
        violation: Violation,
    },

    /// The input is within bounds but is not a session of the calendar.
    #[error("Parameter `{param}` takes a session of calendar '{calendar}' although received input that parsed to '{value}' which is not a session.")]
    NotSession {
        calendar: String,
        param: String,
        value: String,
    },

    /// The input is within bounds but is not a trading minute of the calendar.
    #[error("Parameter `{param}` takes a trading minute of calendar '{calendar}' although received input that parsed to '{value}' which is not a trading minute.")]
    NotTradingMinute {
        calendar: String,
        param: String,
        value: String,
    },

    /// The calendar configuration or a schedule table is malformed.
    #[error("Invalid calendar configuration: {0}")]
    Configuration(String),

    /// A points trading index would place an index later than the index that follows it.
    #[error("Unable to create trading index as an index would fall to the right of (later than) the subsequent index. This can occur if `period` is longer than a break or the gap between one session's close and the next session's open. Set `force_close` and/or `force_break_close` to shorten the indices that would otherwise overlap.")]
    IndicesOverlap,

    /// An intervals trading index would contain overlapping intervals.
    #[error("Unable to create trading index as intervals would overlap. This can occur if `period` is longer than a break or the gap between one session's close and the next session's open. Set `curtail_overlaps` to curtail the right side of intervals that would otherwise overlap, or `force_close` and/or `force_break_close` to shorten intervals at the close or break start.")]
    IntervalsOverlap,

    /// A registry lookup or registration failed.
    #[error("{0}")]
    Registry(String),
}

fn out_of_bounds_message(
    kind: &BoundKind,
    calendar: &str,
    param: &str,
    value: &str,
    bound: &str,
    violation: &Violation,
) -> String {
    match kind {
        BoundKind::Session => format!(
            "Requested session would fall {} than the {} of calendar '{}' ('{}'); navigation began from '{}' (`{}`).",
            violation,
            kind.describe(*violation),
            calendar,
            bound,
            value,
            param
        ),
        _ => format!(
            "Parameter `{}` cannot be {} than the {} of calendar '{}' ('{}') although received as '{}'.",
            param,
            violation,
            kind.describe(*violation),
            calendar,
            bound,
            value
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_bounds_message_names_calendar_and_bound() {
        let err = CalendarError::OutOfBounds {
            kind: BoundKind::Date,
            calendar: "XTST".to_string(),
            param: "date".to_string(),
            value: "2020-12-31".to_string(),
            bound: "2021-01-04".to_string(),
            violation: Violation::Earliest,
        };
        let msg = err.to_string();
        assert!(msg.contains("XTST"));
        assert!(msg.contains("first session"));
        assert!(msg.contains("2021-01-04"));
        assert!(msg.contains("earlier"));
    }

    #[test]
    fn test_construction_bound_message() {
        let err = CalendarError::OutOfBounds {
            kind: BoundKind::End,
            calendar: "XTST".to_string(),
            param: "end".to_string(),
            value: "2031-01-01".to_string(),
            bound: "2030-12-31".to_string(),
            violation: Violation::Latest,
        };
        assert!(err.to_string().contains("latest date to which calendar can be constructed"));
    }
}
