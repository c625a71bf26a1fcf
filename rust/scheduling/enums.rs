use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::CalendarError;

/// Which boundary instants of a session, or of a trading index span, are included.
///
/// As a calendar `side` it determines whether the open, close and break edges are themselves
/// trading minutes. As a trading index `closed` argument it determines whether the span start
/// and end are indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Include the left (open) boundary only.
    #[default]
    Left,
    /// Include the right (close) boundary only.
    Right,
    /// Include both boundaries.
    Both,
    /// Include neither boundary.
    Neither,
}

impl Side {
    /// Returns whether the left boundary is included.
    pub fn includes_left(&self) -> bool {
        matches!(self, Side::Left | Side::Both)
    }

    /// Returns whether the right boundary is included.
    pub fn includes_right(&self) -> bool {
        matches!(self, Side::Right | Side::Both)
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Side::Left => "left",
            Side::Right => "right",
            Side::Both => "both",
            Side::Neither => "neither",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Side {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "left" => Ok(Side::Left),
            "right" => Ok(Side::Right),
            "both" => Ok(Side::Both),
            "neither" => Ok(Side::Neither),
            _ => Err(CalendarError::Range(format!(
                "`side` must be one of 'left', 'right', 'both' or 'neither', got '{}'.",
                s
            ))),
        }
    }
}

/// How to resolve a value that is not itself a session or trading minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Resolve to the next session or minute.
    Next,
    /// Resolve to the previous session or minute.
    Previous,
    /// Do not resolve; return an error.
    None,
}

/// A column of the session schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleColumn {
    Open,
    BreakStart,
    BreakEnd,
    Close,
}

impl fmt::Display for ScheduleColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScheduleColumn::Open => "open",
            ScheduleColumn::BreakStart => "break_start",
            ScheduleColumn::BreakEnd => "break_end",
            ScheduleColumn::Close => "close",
        };
        write!(f, "{}", s)
    }
}

// UNIT TESTS
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_includes() {
        assert!(Side::Left.includes_left() && !Side::Left.includes_right());
        assert!(!Side::Right.includes_left() && Side::Right.includes_right());
        assert!(Side::Both.includes_left() && Side::Both.includes_right());
        assert!(!Side::Neither.includes_left() && !Side::Neither.includes_right());
    }

    #[test]
    fn test_side_from_str() {
        assert_eq!(Side::from_str("LEFT").unwrap(), Side::Left);
        assert_eq!(Side::from_str("neither").unwrap(), Side::Neither);
        assert!(Side::from_str("middle").is_err());
    }

    #[test]
    fn test_side_serde() {
        let s = serde_json::to_string(&Side::Both).unwrap();
        assert_eq!(s, "\"both\"");
        let side: Side = serde_json::from_str("\"right\"").unwrap();
        assert_eq!(side, Side::Right);
    }
}
