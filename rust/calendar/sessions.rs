use chrono::prelude::*;
use std::ops::Range;

use crate::calendar::ExchangeCalendar;
use crate::errors::{BoundKind, CalendarError, Violation};
use crate::parsing::{
    parse_date_nanos, parse_date_nanos_in, parse_session_nanos, CalendarBounds, TimestampInput,
};
use crate::scheduling::utils::{nanos_to_date, nanos_to_utc};
use crate::scheduling::Direction;
use crate::search::{index_at_or_after, index_at_or_before, next_divider_idx, previous_divider_idx};

impl ExchangeCalendar {
    fn session_position(&self, session: i64) -> usize {
        let sessions = self.schedule.sessions_nanos();
        sessions.binary_search(&session).unwrap_or_else(|i| i)
    }

    fn session_position_of(
        &self,
        session: impl Into<TimestampInput>,
        param: &str,
    ) -> Result<usize, CalendarError> {
        parse_session_nanos(self, session, param).map(|s| self.session_position(s))
    }

    // Error for a session navigation that leaves the calendar.
    pub(crate) fn session_oob(
        &self,
        param: &str,
        from: i64,
        violation: Violation,
    ) -> CalendarError {
        let bound = match violation {
            Violation::Earliest => self.first_session(),
            Violation::Latest => self.last_session(),
        };
        CalendarError::OutOfBounds {
            kind: BoundKind::Session,
            calendar: self.name.clone(),
            param: param.to_string(),
            value: nanos_to_date(from).to_string(),
            bound: bound.to_string(),
            violation,
        }
    }

    pub(crate) fn session_at_offset(
        &self,
        idx: usize,
        count: i64,
        param: &str,
    ) -> Result<usize, CalendarError> {
        let from = self.schedule.sessions_nanos()[idx];
        match (idx as i64).checked_add(count) {
            Some(target) if (0..self.schedule.len() as i64).contains(&target) => {
                Ok(target as usize)
            }
            _ => {
                let violation = match count < 0 {
                    true => Violation::Earliest,
                    false => Violation::Latest,
                };
                Err(self.session_oob(param, from, violation))
            }
        }
    }

    /// Positions of the sessions from `start` through `end`, which must be within the calendar.
    pub(crate) fn sessions_range(
        &self,
        start: impl Into<TimestampInput>,
        end: impl Into<TimestampInput>,
    ) -> Result<Range<usize>, CalendarError> {
        let sessions = self.schedule.sessions_nanos();
        let start = parse_date_nanos_in(self, start, "start", true)?;
        let end = parse_date_nanos_in(self, end, "end", true)?;
        let lo = index_at_or_after(sessions, start).unwrap_or(sessions.len());
        let hi = index_at_or_before(sessions, end).map_or(0, |i| i + 1);
        Ok(lo..hi.max(lo))
    }

    /// Returns whether `date` is a session.
    pub fn is_session(&self, date: impl Into<TimestampInput>) -> Result<bool, CalendarError> {
        parse_date_nanos_in(self, date, "date", true).map(|d| self.is_session_nanos(d))
    }

    /// The session following `session`.
    pub fn next_session(
        &self,
        session: impl Into<TimestampInput>,
    ) -> Result<NaiveDate, CalendarError> {
        self.session_offset(session, 1)
    }

    /// The session preceding `session`.
    pub fn previous_session(
        &self,
        session: impl Into<TimestampInput>,
    ) -> Result<NaiveDate, CalendarError> {
        self.session_offset(session, -1)
    }

    /// The session `count` sessions after (or, if negative, before) `session`.
    pub fn session_offset(
        &self,
        session: impl Into<TimestampInput>,
        count: i64,
    ) -> Result<NaiveDate, CalendarError> {
        let idx = self.session_position_of(session, "session")?;
        let target = self.session_at_offset(idx, count, "session")?;
        Ok(nanos_to_date(self.schedule.sessions_nanos()[target]))
    }

    /// Resolve a date to a session.
    ///
    /// A date that is a session is returned unchanged. Otherwise the next or previous session
    /// is returned per `direction`, or `Direction::None` raises `NotSession`.
    pub fn date_to_session(
        &self,
        date: impl Into<TimestampInput>,
        direction: Direction,
    ) -> Result<NaiveDate, CalendarError> {
        let date = parse_date_nanos(date, "date")?;
        if self.is_session_nanos(date) {
            return Ok(nanos_to_date(date));
        }
        let sessions = self.schedule.sessions_nanos();
        let oob = |bound: i64, violation| CalendarError::OutOfBounds {
            kind: BoundKind::Date,
            calendar: self.name.clone(),
            param: "date".to_string(),
            value: nanos_to_date(date).to_string(),
            bound: nanos_to_date(bound).to_string(),
            violation,
        };
        match direction {
            Direction::Next => next_divider_idx(sessions, date)
                .map(|i| nanos_to_date(sessions[i]))
                .ok_or_else(|| oob(self.last_session_nanos(), Violation::Latest)),
            Direction::Previous => previous_divider_idx(sessions, date)
                .map(|i| nanos_to_date(sessions[i]))
                .ok_or_else(|| oob(self.first_session_nanos(), Violation::Earliest)),
            Direction::None => Err(CalendarError::NotSession {
                calendar: self.name.clone(),
                param: "date".to_string(),
                value: nanos_to_date(date).to_string(),
            }),
        }
    }

    pub fn session_open(
        &self,
        session: impl Into<TimestampInput>,
    ) -> Result<DateTime<Utc>, CalendarError> {
        let idx = self.session_position_of(session, "session")?;
        Ok(nanos_to_utc(self.schedule.opens_nanos()[idx]))
    }

    pub fn session_close(
        &self,
        session: impl Into<TimestampInput>,
    ) -> Result<DateTime<Utc>, CalendarError> {
        let idx = self.session_position_of(session, "session")?;
        Ok(nanos_to_utc(self.schedule.closes_nanos()[idx]))
    }

    /// The break start of `session`, `None` if the session has no break.
    pub fn session_break_start(
        &self,
        session: impl Into<TimestampInput>,
    ) -> Result<Option<DateTime<Utc>>, CalendarError> {
        let idx = self.session_position_of(session, "session")?;
        Ok(self.schedule.break_starts_nanos()[idx].map(nanos_to_utc))
    }

    /// The break end of `session`, `None` if the session has no break.
    pub fn session_break_end(
        &self,
        session: impl Into<TimestampInput>,
    ) -> Result<Option<DateTime<Utc>>, CalendarError> {
        let idx = self.session_position_of(session, "session")?;
        Ok(self.schedule.break_ends_nanos()[idx].map(nanos_to_utc))
    }

    pub fn session_open_close(
        &self,
        session: impl Into<TimestampInput>,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>), CalendarError> {
        let idx = self.session_position_of(session, "session")?;
        Ok((
            nanos_to_utc(self.schedule.opens_nanos()[idx]),
            nanos_to_utc(self.schedule.closes_nanos()[idx]),
        ))
    }

    pub fn session_first_minute(
        &self,
        session: impl Into<TimestampInput>,
    ) -> Result<DateTime<Utc>, CalendarError> {
        let idx = self.session_position_of(session, "session")?;
        Ok(nanos_to_utc(self.edges.first[idx]))
    }

    pub fn session_last_minute(
        &self,
        session: impl Into<TimestampInput>,
    ) -> Result<DateTime<Utc>, CalendarError> {
        let idx = self.session_position_of(session, "session")?;
        Ok(nanos_to_utc(self.edges.last[idx]))
    }

    pub fn session_last_am_minute(
        &self,
        session: impl Into<TimestampInput>,
    ) -> Result<Option<DateTime<Utc>>, CalendarError> {
        let idx = self.session_position_of(session, "session")?;
        Ok(self.edges.last_am[idx].map(nanos_to_utc))
    }

    pub fn session_first_pm_minute(
        &self,
        session: impl Into<TimestampInput>,
    ) -> Result<Option<DateTime<Utc>>, CalendarError> {
        let idx = self.session_position_of(session, "session")?;
        Ok(self.edges.first_pm[idx].map(nanos_to_utc))
    }

    pub fn session_first_last_minute(
        &self,
        session: impl Into<TimestampInput>,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>), CalendarError> {
        let idx = self.session_position_of(session, "session")?;
        Ok((
            nanos_to_utc(self.edges.first[idx]),
            nanos_to_utc(self.edges.last[idx]),
        ))
    }

    pub fn session_has_break(
        &self,
        session: impl Into<TimestampInput>,
    ) -> Result<bool, CalendarError> {
        let idx = self.session_position_of(session, "session")?;
        Ok(self.schedule.break_starts_nanos()[idx].is_some())
    }

    /// Every trading minute of `session`.
    pub fn session_minutes(
        &self,
        session: impl Into<TimestampInput>,
    ) -> Result<Vec<DateTime<Utc>>, CalendarError> {
        let idx = self.session_position_of(session, "session")?;
        Ok(self
            .edges
            .slice(idx..idx + 1)
            .minutes()
            .into_iter()
            .map(nanos_to_utc)
            .collect())
    }

    /// Sessions from `start` through `end`, inclusive.
    pub fn sessions_in_range(
        &self,
        start: impl Into<TimestampInput>,
        end: impl Into<TimestampInput>,
    ) -> Result<Vec<NaiveDate>, CalendarError> {
        let range = self.sessions_range(start, end)?;
        Ok(self.schedule.sessions_nanos()[range]
            .iter()
            .map(|s| nanos_to_date(*s))
            .collect())
    }

    /// A window of `count.abs() + 1` sessions starting from `session`, going forwards if `count`
    /// is positive or backwards if negative.
    pub fn sessions_window(
        &self,
        session: impl Into<TimestampInput>,
        count: i64,
    ) -> Result<Vec<NaiveDate>, CalendarError> {
        let idx = self.session_position_of(session, "session")?;
        let target = self.session_at_offset(idx, count, "session")?;
        let (lo, hi) = (idx.min(target), idx.max(target));
        Ok(self.schedule.sessions_nanos()[lo..=hi]
            .iter()
            .map(|s| nanos_to_date(*s))
            .collect())
    }

    /// The number of sessions from `start` through `end`, inclusive.
    ///
    /// Negative if `start` is later than `end`.
    pub fn sessions_distance(
        &self,
        start: impl Into<TimestampInput>,
        end: impl Into<TimestampInput>,
    ) -> Result<i64, CalendarError> {
        let start = parse_date_nanos_in(self, start, "start", true)?;
        let end = parse_date_nanos_in(self, end, "end", true)?;
        let (lo, hi, sign) = match start > end {
            true => (end, start, -1),
            false => (start, end, 1),
        };
        Ok(sign * self.sessions_range(lo, hi)?.len() as i64)
    }

    /// Every trading minute of the sessions from `start` through `end`.
    pub fn sessions_minutes(
        &self,
        start: impl Into<TimestampInput>,
        end: impl Into<TimestampInput>,
    ) -> Result<Vec<DateTime<Utc>>, CalendarError> {
        let range = self.sessions_range(start, end)?;
        Ok(self
            .edges
            .slice(range)
            .minutes()
            .into_iter()
            .map(nanos_to_utc)
            .collect())
    }

    pub fn sessions_opens(
        &self,
        start: impl Into<TimestampInput>,
        end: impl Into<TimestampInput>,
    ) -> Result<Vec<DateTime<Utc>>, CalendarError> {
        let range = self.sessions_range(start, end)?;
        Ok(self.schedule.opens_nanos()[range]
            .iter()
            .map(|v| nanos_to_utc(*v))
            .collect())
    }

    pub fn sessions_closes(
        &self,
        start: impl Into<TimestampInput>,
        end: impl Into<TimestampInput>,
    ) -> Result<Vec<DateTime<Utc>>, CalendarError> {
        let range = self.sessions_range(start, end)?;
        Ok(self.schedule.closes_nanos()[range]
            .iter()
            .map(|v| nanos_to_utc(*v))
            .collect())
    }

    /// The number of trading minutes of the sessions from `start` through `end`.
    pub fn sessions_minutes_count(
        &self,
        start: impl Into<TimestampInput>,
        end: impl Into<TimestampInput>,
    ) -> Result<i64, CalendarError> {
        let range = self.sessions_range(start, end)?;
        Ok(self.minutes_per_session.slice(ndarray::s![range]).sum())
    }

    /// Returns whether any session from `start` through `end` has a break.
    pub fn sessions_has_break(
        &self,
        start: impl Into<TimestampInput>,
        end: impl Into<TimestampInput>,
    ) -> Result<bool, CalendarError> {
        let range = self.sessions_range(start, end)?;
        Ok(self.schedule.break_starts_nanos()[range]
            .iter()
            .any(|b| b.is_some()))
    }
}

// UNIT TESTS
#[cfg(test)]
mod tests {
    use crate::calendar::ExchangeCalendar;
    use crate::errors::{BoundKind, CalendarError, Violation};
    use crate::scheduling::{nd, utc, CalendarConfig, Direction, Side};
    use chrono::NaiveTime;
    use chrono_tz::Tz;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    // Sessions 2021-01-04 to 2021-01-15, with a break, 2021-01-08 an ad hoc holiday.
    fn fixture_calendar() -> ExchangeCalendar {
        let config = CalendarConfig::new("XBRK", Tz::Asia__Hong_Kong, t(9, 30), t(16, 0))
            .with_break(t(12, 0), t(13, 0))
            .with_adhoc_holidays(vec![nd(2021, 1, 8)]);
        ExchangeCalendar::try_new(&config, "2021-01-04", "2021-01-15", Side::Left).unwrap()
    }

    #[test]
    fn test_is_session() {
        let cal = fixture_calendar();
        assert!(cal.is_session("2021-01-04").unwrap());
        assert!(!cal.is_session("2021-01-08").unwrap());
        assert!(!cal.is_session("2021-01-09").unwrap());
        assert!(cal.is_session("2021-01-04 10:00").is_err());
        assert!(cal.is_session("2021-01-20").is_err());
    }

    #[test]
    fn test_next_previous_session() {
        let cal = fixture_calendar();
        assert_eq!(cal.next_session("2021-01-07").unwrap(), nd(2021, 1, 11));
        assert_eq!(cal.previous_session("2021-01-11").unwrap(), nd(2021, 1, 7));
        assert!(matches!(
            cal.next_session("2021-01-15"),
            Err(CalendarError::OutOfBounds {
                kind: BoundKind::Session,
                violation: Violation::Latest,
                ..
            })
        ));
        assert!(cal.previous_session("2021-01-04").is_err());
        assert!(matches!(
            cal.next_session("2021-01-08"),
            Err(CalendarError::NotSession { .. })
        ));
    }

    #[test]
    fn test_session_offset() {
        let cal = fixture_calendar();
        assert_eq!(cal.session_offset("2021-01-05", 3).unwrap(), nd(2021, 1, 11));
        assert_eq!(cal.session_offset("2021-01-11", -3).unwrap(), nd(2021, 1, 5));
        assert_eq!(cal.session_offset("2021-01-11", 0).unwrap(), nd(2021, 1, 11));
        assert!(cal.session_offset("2021-01-11", 10).is_err());
    }

    #[test]
    fn test_session_offset_extreme_count() {
        let cal = fixture_calendar();
        assert!(matches!(
            cal.session_offset("2021-01-11", i64::MAX),
            Err(CalendarError::OutOfBounds {
                violation: Violation::Latest,
                ..
            })
        ));
        assert!(matches!(
            cal.session_offset("2021-01-11", i64::MIN),
            Err(CalendarError::OutOfBounds {
                violation: Violation::Earliest,
                ..
            })
        ));
    }

    #[test]
    fn test_date_to_session() {
        let cal = fixture_calendar();
        assert_eq!(
            cal.date_to_session("2021-01-08", Direction::Next).unwrap(),
            nd(2021, 1, 11)
        );
        assert_eq!(
            cal.date_to_session("2021-01-08", Direction::Previous).unwrap(),
            nd(2021, 1, 7)
        );
        assert_eq!(
            cal.date_to_session("2021-01-07", Direction::None).unwrap(),
            nd(2021, 1, 7)
        );
        assert!(matches!(
            cal.date_to_session("2021-01-08", Direction::None),
            Err(CalendarError::NotSession { .. })
        ));
        assert!(matches!(
            cal.date_to_session("2021-01-16", Direction::Next),
            Err(CalendarError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_session_times() {
        let cal = fixture_calendar();
        let s = "2021-01-04";
        assert_eq!(cal.session_open(s).unwrap(), utc(2021, 1, 4, 1, 30));
        assert_eq!(cal.session_close(s).unwrap(), utc(2021, 1, 4, 8, 0));
        assert_eq!(
            cal.session_break_start(s).unwrap(),
            Some(utc(2021, 1, 4, 4, 0))
        );
        assert_eq!(cal.session_break_end(s).unwrap(), Some(utc(2021, 1, 4, 5, 0)));
        assert_eq!(
            cal.session_open_close(s).unwrap(),
            (utc(2021, 1, 4, 1, 30), utc(2021, 1, 4, 8, 0))
        );
        assert!(cal.session_has_break(s).unwrap());
        assert!(cal.session_open("2021-01-08").is_err());
    }

    #[test]
    fn test_session_minute_edges() {
        let cal = fixture_calendar();
        let s = "2021-01-04";
        assert_eq!(cal.session_first_minute(s).unwrap(), utc(2021, 1, 4, 1, 30));
        assert_eq!(cal.session_last_minute(s).unwrap(), utc(2021, 1, 4, 7, 59));
        assert_eq!(
            cal.session_last_am_minute(s).unwrap(),
            Some(utc(2021, 1, 4, 3, 59))
        );
        assert_eq!(
            cal.session_first_pm_minute(s).unwrap(),
            Some(utc(2021, 1, 4, 5, 0))
        );
        assert_eq!(
            cal.session_first_last_minute(s).unwrap(),
            (utc(2021, 1, 4, 1, 30), utc(2021, 1, 4, 7, 59))
        );
        let minutes = cal.session_minutes(s).unwrap();
        assert_eq!(minutes.len(), 330);
        assert_eq!(minutes[149], utc(2021, 1, 4, 3, 59));
        assert_eq!(minutes[150], utc(2021, 1, 4, 5, 0));
    }

    #[test]
    fn test_sessions_in_range_and_window() {
        let cal = fixture_calendar();
        assert_eq!(
            cal.sessions_in_range("2021-01-06", "2021-01-10").unwrap(),
            vec![nd(2021, 1, 6), nd(2021, 1, 7)]
        );
        assert!(cal.sessions_in_range("2021-01-09", "2021-01-10").unwrap().is_empty());
        assert_eq!(
            cal.sessions_window("2021-01-07", 2).unwrap(),
            vec![nd(2021, 1, 7), nd(2021, 1, 11), nd(2021, 1, 12)]
        );
        assert_eq!(
            cal.sessions_window("2021-01-07", -1).unwrap(),
            vec![nd(2021, 1, 6), nd(2021, 1, 7)]
        );
        assert!(cal.sessions_window("2021-01-14", 5).is_err());
    }

    #[test]
    fn test_sessions_distance() {
        let cal = fixture_calendar();
        assert_eq!(cal.sessions_distance("2021-01-04", "2021-01-15").unwrap(), 9);
        assert_eq!(cal.sessions_distance("2021-01-15", "2021-01-04").unwrap(), -9);
        assert_eq!(cal.sessions_distance("2021-01-09", "2021-01-10").unwrap(), 0);
    }

    #[test]
    fn test_sessions_range_queries() {
        let cal = fixture_calendar();
        let (start, end) = ("2021-01-06", "2021-01-07");
        assert_eq!(
            cal.sessions_opens(start, end).unwrap(),
            vec![utc(2021, 1, 6, 1, 30), utc(2021, 1, 7, 1, 30)]
        );
        assert_eq!(
            cal.sessions_closes(start, end).unwrap(),
            vec![utc(2021, 1, 6, 8, 0), utc(2021, 1, 7, 8, 0)]
        );
        assert_eq!(cal.sessions_minutes(start, end).unwrap().len(), 660);
        assert_eq!(cal.sessions_minutes_count(start, end).unwrap(), 660);
        assert_eq!(cal.sessions_minutes_count("2021-01-09", "2021-01-10").unwrap(), 0);
        assert!(cal.sessions_has_break(start, end).unwrap());
    }
}
