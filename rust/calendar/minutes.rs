use chrono::prelude::*;

use crate::calendar::ExchangeCalendar;
use crate::errors::{BoundKind, CalendarError, Violation};
use crate::parsing::{
    parse_instant_nanos, parse_minute_nanos_in, parse_trading_minute_nanos, CalendarBounds,
    TimestampInput,
};
use crate::scheduling::utils::{nanos_to_date, nanos_to_utc};
use crate::scheduling::{Direction, Side};
use crate::search::{index_at_or_after, index_at_or_before, next_divider_idx, previous_divider_idx};

// Returns whether `ts` lies within `[a, b]` with the boundaries included per `side`.
fn within(ts: i64, a: i64, b: i64, side: Side) -> bool {
    let after_left = if side.includes_left() { ts >= a } else { ts > a };
    let before_right = if side.includes_right() { ts <= b } else { ts < b };
    after_left && before_right
}

impl ExchangeCalendar {
    fn minute_oob(&self, param: &str, value: i64, violation: Violation) -> CalendarError {
        let bound = match violation {
            Violation::Earliest => self.first_minute_nanos(),
            Violation::Latest => self.last_minute_nanos(),
        };
        self.instant_oob(BoundKind::Minute, param, value, bound, violation)
    }

    fn instant_oob(
        &self,
        kind: BoundKind,
        param: &str,
        value: i64,
        bound: i64,
        violation: Violation,
    ) -> CalendarError {
        CalendarError::OutOfBounds {
            kind,
            calendar: self.name.clone(),
            param: param.to_string(),
            value: nanos_to_utc(value).to_string(),
            bound: nanos_to_utc(bound).to_string(),
            violation,
        }
    }

    fn not_trading_minute(&self, param: &str, value: i64) -> CalendarError {
        CalendarError::NotTradingMinute {
            calendar: self.name.clone(),
            param: param.to_string(),
            value: nanos_to_utc(value).to_string(),
        }
    }

    // Position of the session that `minute` falls within, breaks included.
    fn session_idx_of_minute(&self, minute: i64) -> Option<usize> {
        self.session_idx_at_or_before_minute(minute)
            .filter(|i| minute <= self.edges.last[*i])
    }

    fn minute_position(&self, minute: i64) -> Option<usize> {
        self.minutes_nanos().binary_search(&minute).ok()
    }

    fn is_open_on_minute_nanos(&self, minute: i64, ignore_breaks: bool) -> bool {
        self.is_trading_minute_nanos(minute)
            || (ignore_breaks && self.is_break_minute_nanos(minute))
    }

    /// Returns whether `minute` is a trading minute.
    pub fn is_trading_minute(
        &self,
        minute: impl Into<TimestampInput>,
    ) -> Result<bool, CalendarError> {
        parse_minute_nanos_in(self, minute, "minute", true).map(|m| self.is_trading_minute_nanos(m))
    }

    /// Returns whether `minute` falls within a session's break.
    pub fn is_break_minute(
        &self,
        minute: impl Into<TimestampInput>,
    ) -> Result<bool, CalendarError> {
        parse_minute_nanos_in(self, minute, "minute", true).map(|m| self.is_break_minute_nanos(m))
    }

    /// Returns whether the exchange is open on `minute`.
    ///
    /// Break minutes are considered open if `ignore_breaks`.
    pub fn is_open_on_minute(
        &self,
        minute: impl Into<TimestampInput>,
        ignore_breaks: bool,
    ) -> Result<bool, CalendarError> {
        parse_minute_nanos_in(self, minute, "minute", true)
            .map(|m| self.is_open_on_minute_nanos(m, ignore_breaks))
    }

    /// Returns whether the exchange is open at the exact instant `timestamp`.
    ///
    /// `side` determines whether the open and close (and break bounds, unless `ignore_breaks`)
    /// are considered open. `timestamp` is not restricted to minute resolution.
    pub fn is_open_at_time(
        &self,
        timestamp: impl Into<TimestampInput>,
        side: Side,
        ignore_breaks: bool,
    ) -> Result<bool, CalendarError> {
        let ts = parse_instant_nanos(timestamp, "timestamp")?;
        let opens = self.schedule.opens_nanos();
        let closes = self.schedule.closes_nanos();
        let (first_open, last_close) = (opens[0], closes[closes.len() - 1]);
        if ts < first_open {
            let kind = BoundKind::Time;
            return Err(self.instant_oob(kind, "timestamp", ts, first_open, Violation::Earliest));
        }
        if ts > last_close {
            let kind = BoundKind::Time;
            return Err(self.instant_oob(kind, "timestamp", ts, last_close, Violation::Latest));
        }
        let Some(idx) = index_at_or_before(opens, ts) else {
            return Ok(false);
        };
        let break_starts = self.schedule.break_starts_nanos();
        let break_ends = self.schedule.break_ends_nanos();
        let open_in = |i: usize| match (break_starts[i], break_ends[i], ignore_breaks) {
            (Some(bs), Some(be), false) => {
                within(ts, opens[i], bs, side) || within(ts, be, closes[i], side)
            }
            _ => within(ts, opens[i], closes[i], side),
        };
        Ok(open_in(idx) || (idx > 0 && open_in(idx - 1)))
    }

    /// The first session open after `minute`.
    pub fn next_open(
        &self,
        minute: impl Into<TimestampInput>,
    ) -> Result<DateTime<Utc>, CalendarError> {
        let m = parse_minute_nanos_in(self, minute, "minute", false)?;
        let opens = self.schedule.opens_nanos();
        next_divider_idx(opens, m)
            .map(|i| nanos_to_utc(opens[i]))
            .ok_or_else(|| self.minute_oob("minute", m, Violation::Latest))
    }

    /// The first session close after `minute`.
    pub fn next_close(
        &self,
        minute: impl Into<TimestampInput>,
    ) -> Result<DateTime<Utc>, CalendarError> {
        let m = parse_minute_nanos_in(self, minute, "minute", false)?;
        let closes = self.schedule.closes_nanos();
        next_divider_idx(closes, m)
            .map(|i| nanos_to_utc(closes[i]))
            .ok_or_else(|| self.minute_oob("minute", m, Violation::Latest))
    }

    /// The last session open before `minute`.
    pub fn previous_open(
        &self,
        minute: impl Into<TimestampInput>,
    ) -> Result<DateTime<Utc>, CalendarError> {
        let m = parse_minute_nanos_in(self, minute, "minute", false)?;
        let opens = self.schedule.opens_nanos();
        previous_divider_idx(opens, m)
            .map(|i| nanos_to_utc(opens[i]))
            .ok_or_else(|| self.minute_oob("minute", m, Violation::Earliest))
    }

    /// The last session close before `minute`.
    pub fn previous_close(
        &self,
        minute: impl Into<TimestampInput>,
    ) -> Result<DateTime<Utc>, CalendarError> {
        let m = parse_minute_nanos_in(self, minute, "minute", false)?;
        let closes = self.schedule.closes_nanos();
        previous_divider_idx(closes, m)
            .map(|i| nanos_to_utc(closes[i]))
            .ok_or_else(|| self.minute_oob("minute", m, Violation::Earliest))
    }

    /// The first trading minute after `minute`.
    pub fn next_minute(
        &self,
        minute: impl Into<TimestampInput>,
    ) -> Result<DateTime<Utc>, CalendarError> {
        let m = parse_minute_nanos_in(self, minute, "minute", false)?;
        let minutes = self.minutes_nanos();
        next_divider_idx(minutes, m)
            .map(|i| nanos_to_utc(minutes[i]))
            .ok_or_else(|| self.minute_oob("minute", m, Violation::Latest))
    }

    /// The last trading minute before `minute`.
    pub fn previous_minute(
        &self,
        minute: impl Into<TimestampInput>,
    ) -> Result<DateTime<Utc>, CalendarError> {
        let m = parse_minute_nanos_in(self, minute, "minute", false)?;
        let minutes = self.minutes_nanos();
        previous_divider_idx(minutes, m)
            .map(|i| nanos_to_utc(minutes[i]))
            .ok_or_else(|| self.minute_oob("minute", m, Violation::Earliest))
    }

    fn minute_to_session_idx(
        &self,
        minute: i64,
        direction: Direction,
        param: &str,
    ) -> Result<usize, CalendarError> {
        if let Some(idx) = self.session_idx_of_minute(minute) {
            return Ok(idx);
        }
        let before = self.session_idx_at_or_before_minute(minute);
        match direction {
            Direction::Next => {
                let idx = before.map_or(0, |i| i + 1);
                match idx < self.schedule.len() {
                    true => Ok(idx),
                    false => Err(self.minute_oob(param, minute, Violation::Latest)),
                }
            }
            Direction::Previous => {
                before.ok_or_else(|| self.minute_oob(param, minute, Violation::Earliest))
            }
            Direction::None => Err(self.not_trading_minute(param, minute)),
        }
    }

    /// The session that `minute` falls within.
    ///
    /// A minute of a session's break is considered to fall within that session. Otherwise the
    /// next or previous session is returned per `direction`, or `Direction::None` raises
    /// `NotTradingMinute`.
    pub fn minute_to_session(
        &self,
        minute: impl Into<TimestampInput>,
        direction: Direction,
    ) -> Result<NaiveDate, CalendarError> {
        let m = parse_minute_nanos_in(self, minute, "minute", false)?;
        let idx = self.minute_to_session_idx(m, direction, "minute")?;
        Ok(nanos_to_date(self.schedule.sessions_nanos()[idx]))
    }

    /// Resolve `minute` to a trading minute.
    ///
    /// A trading minute is returned unchanged. Otherwise the next or previous trading minute is
    /// returned per `direction`, or `Direction::None` raises `NotTradingMinute`.
    pub fn minute_to_trading_minute(
        &self,
        minute: impl Into<TimestampInput>,
        direction: Direction,
    ) -> Result<DateTime<Utc>, CalendarError> {
        let m = parse_minute_nanos_in(self, minute, "minute", false)?;
        if self.is_trading_minute_nanos(m) {
            return Ok(nanos_to_utc(m));
        }
        match direction {
            Direction::Next => self.next_minute(m),
            Direction::Previous => self.previous_minute(m),
            Direction::None => Err(self.not_trading_minute("minute", m)),
        }
    }

    fn minute_to_offset_session(
        &self,
        minute: impl Into<TimestampInput>,
        count: usize,
        direction: Direction,
    ) -> Result<NaiveDate, CalendarError> {
        if count == 0 {
            return Err(CalendarError::Range("`count` must be higher than 0.".to_string()));
        }
        let m = parse_minute_nanos_in(self, minute, "minute", false)?;
        let sign: i64 = if direction == Direction::Next { 1 } else { -1 };
        let count = i64::try_from(count).unwrap_or(i64::MAX);
        let (base, offset) = match self.is_open_on_minute_nanos(m, true) {
            true => (self.minute_to_session_idx(m, Direction::None, "minute")?, count),
            false => (self.minute_to_session_idx(m, direction, "minute")?, count - 1),
        };
        let idx = self.session_at_offset(base, sign * offset, "count")?;
        Ok(nanos_to_date(self.schedule.sessions_nanos()[idx]))
    }

    /// The session `count` sessions before `minute`.
    ///
    /// With `count` 1, this is the last session to have closed before `minute`.
    pub fn minute_to_past_session(
        &self,
        minute: impl Into<TimestampInput>,
        count: usize,
    ) -> Result<NaiveDate, CalendarError> {
        self.minute_to_offset_session(minute, count, Direction::Previous)
    }

    /// The session `count` sessions after `minute`.
    ///
    /// With `count` 1, this is the first session to open after `minute`.
    pub fn minute_to_future_session(
        &self,
        minute: impl Into<TimestampInput>,
        count: usize,
    ) -> Result<NaiveDate, CalendarError> {
        self.minute_to_offset_session(minute, count, Direction::Next)
    }

    /// The trading minute `count` trading minutes after (or, if negative, before) `minute`.
    pub fn minute_offset(
        &self,
        minute: impl Into<TimestampInput>,
        count: i64,
    ) -> Result<DateTime<Utc>, CalendarError> {
        let m = parse_trading_minute_nanos(self, minute, "minute")?;
        let minutes = self.minutes_nanos();
        let idx = self
            .minute_position(m)
            .ok_or_else(|| self.not_trading_minute("minute", m))?;
        match (idx as i64).checked_add(count) {
            Some(target) if (0..minutes.len() as i64).contains(&target) => {
                Ok(nanos_to_utc(minutes[target as usize]))
            }
            _ => {
                let violation = match count < 0 {
                    true => Violation::Earliest,
                    false => Violation::Latest,
                };
                Err(self.minute_oob("count", m, violation))
            }
        }
    }

    /// The minute at the same UTC time of day as `minute`, `count` sessions later (or earlier).
    ///
    /// If that time is not a trading minute of the target session, the result is its first
    /// minute when earlier, its last minute when later, or its last minute before the break
    /// when within the break.
    pub fn minute_offset_by_sessions(
        &self,
        minute: impl Into<TimestampInput>,
        count: i64,
    ) -> Result<DateTime<Utc>, CalendarError> {
        let m = parse_minute_nanos_in(self, minute, "minute", true)?;
        let base = self.minute_to_session_idx(m, Direction::None, "minute")?;
        let target = self.session_at_offset(base, count, "count")?;
        let sessions = self.schedule.sessions_nanos();
        let candidate = m + (sessions[target] - sessions[base]);
        let edges = &self.edges;
        let result = if candidate < edges.first[target] {
            edges.first[target]
        } else if candidate > edges.last[target] {
            edges.last[target]
        } else {
            match (edges.last_am[target], edges.first_pm[target]) {
                (Some(am), Some(pm)) if candidate > am && candidate < pm => am,
                _ => candidate,
            }
        };
        Ok(nanos_to_utc(result))
    }

    fn minutes_range(
        &self,
        start: impl Into<TimestampInput>,
        end: impl Into<TimestampInput>,
    ) -> Result<std::ops::Range<usize>, CalendarError> {
        let start = parse_minute_nanos_in(self, start, "start", true)?;
        let end = parse_minute_nanos_in(self, end, "end", true)?;
        let minutes = self.minutes_nanos();
        let lo = index_at_or_after(minutes, start).unwrap_or(minutes.len());
        let hi = index_at_or_before(minutes, end).map_or(0, |i| i + 1);
        Ok(lo..hi.max(lo))
    }

    /// Trading minutes from `start` through `end`, inclusive.
    pub fn minutes_in_range(
        &self,
        start: impl Into<TimestampInput>,
        end: impl Into<TimestampInput>,
    ) -> Result<Vec<DateTime<Utc>>, CalendarError> {
        let range = self.minutes_range(start, end)?;
        Ok(self.minutes_nanos()[range]
            .iter()
            .map(|m| nanos_to_utc(*m))
            .collect())
    }

    /// A window of `count.abs()` trading minutes starting (or, if `count` is negative,
    /// ending) with `minute`.
    pub fn minutes_window(
        &self,
        minute: impl Into<TimestampInput>,
        count: i64,
    ) -> Result<Vec<DateTime<Utc>>, CalendarError> {
        if count == 0 {
            return Err(CalendarError::Range("`count` cannot be 0.".to_string()));
        }
        let m = parse_trading_minute_nanos(self, minute, "minute")?;
        let minutes = self.minutes_nanos();
        let idx = self
            .minute_position(m)
            .ok_or_else(|| self.not_trading_minute("minute", m))? as i64;
        let (lo, hi) = match count > 0 {
            true => (idx, idx.saturating_add(count)),
            false => (idx + count + 1, idx + 1),
        };
        if lo < 0 {
            return Err(self.minute_oob("count", m, Violation::Earliest));
        }
        if hi as usize > minutes.len() {
            return Err(self.minute_oob("count", m, Violation::Latest));
        }
        Ok(minutes[lo as usize..hi as usize]
            .iter()
            .map(|v| nanos_to_utc(*v))
            .collect())
    }

    /// The number of trading minutes from `start` through `end`, inclusive.
    ///
    /// Negative if `start` is later than `end`.
    pub fn minutes_distance(
        &self,
        start: impl Into<TimestampInput>,
        end: impl Into<TimestampInput>,
    ) -> Result<i64, CalendarError> {
        let start = parse_minute_nanos_in(self, start, "start", true)?;
        let end = parse_minute_nanos_in(self, end, "end", true)?;
        let (lo, hi, sign) = match start > end {
            true => (end, start, -1),
            false => (start, end, 1),
        };
        Ok(sign * self.minutes_range(lo, hi)?.len() as i64)
    }

    /// The session of each of `minutes`, each of which must be a trading minute.
    pub fn minutes_to_sessions<I, T>(&self, minutes: I) -> Result<Vec<NaiveDate>, CalendarError>
    where
        I: IntoIterator<Item = T>,
        T: Into<TimestampInput>,
    {
        let sessions = self.schedule.sessions_nanos();
        minutes
            .into_iter()
            .map(|minute| {
                let m = parse_trading_minute_nanos(self, minute, "minutes")?;
                let idx = self.minute_to_session_idx(m, Direction::None, "minutes")?;
                Ok(nanos_to_date(sessions[idx]))
            })
            .collect()
    }
}
