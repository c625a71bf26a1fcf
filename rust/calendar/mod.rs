//! Query the sessions and trading minutes of an exchange.
//!
//! An [`ExchangeCalendar`] is constructed once from a [`CalendarConfig`], a date range and a
//! [`Side`], and is thereafter an immutable query surface over its [`Schedule`].
//!
//! ### Example
//! ```rust
//! # use trading_calendars::calendar::ExchangeCalendar;
//! # use trading_calendars::scheduling::{nd, utc, CalendarConfig, Direction, Side};
//! # use chrono::NaiveTime;
//! let config = CalendarConfig::new(
//!     "XNYS",
//!     chrono_tz::Tz::America__New_York,
//!     NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
//!     NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
//! );
//! let cal = ExchangeCalendar::try_new(&config, "2021-01-04", "2021-01-29", Side::Left).unwrap();
//! assert_eq!(cal.next_session("2021-01-08").unwrap(), nd(2021, 1, 11));
//! assert_eq!(
//!     cal.date_to_session("2021-01-09", Direction::Previous).unwrap(),
//!     nd(2021, 1, 8)
//! );
//! assert!(cal.is_trading_minute(utc(2021, 1, 4, 14, 30)).unwrap());
//! assert!(!cal.is_trading_minute(utc(2021, 1, 4, 21, 0)).unwrap());
//! ```

mod minutes;
pub mod registry;
mod sessions;

pub use crate::calendar::registry::CalendarRegistry;

use chrono::prelude::*;
use chrono::TimeDelta;
use chrono_tz::Tz;
use itertools::Itertools;
use ndarray::Array1;
use std::sync::OnceLock;
use tracing::debug;

use crate::errors::{BoundKind, CalendarError, Violation};
use crate::parsing::{parse_date_nanos, CalendarBounds, TimestampInput};
use crate::scheduling::utils::{nanos_to_date, nanos_to_utc, NANOS_PER_DAY, NANOS_PER_MINUTE};
use crate::scheduling::{CalendarConfig, Schedule, ScheduleBuilder, Side};
use crate::search::{index_at_or_before, session_minute_edges, SessionMinuteEdges};
use crate::trading_index::{period_nanos, Interval, TradingIndex, TradingIndexOptions};

/// The sessions, schedule and trading minutes of an exchange over a date range.
#[derive(Debug)]
pub struct ExchangeCalendar {
    name: String,
    tz: Tz,
    side: Side,
    bound_min: Option<NaiveDate>,
    bound_max: Option<NaiveDate>,
    schedule: Schedule,
    edges: SessionMinuteEdges,
    minutes_per_session: Array1<i64>,
    minutes: OnceLock<Vec<i64>>,
}

impl ExchangeCalendar {
    /// Create a calendar of the sessions between `start` and `end`, inclusive.
    ///
    /// `start` and `end` are parsed as dates and must lie within the configuration's
    /// `bound_min` and `bound_max`.
    pub fn try_new(
        config: &CalendarConfig,
        start: impl Into<TimestampInput>,
        end: impl Into<TimestampInput>,
        side: Side,
    ) -> Result<Self, CalendarError> {
        let start = nanos_to_date(parse_date_nanos(start, "start")?);
        let end = nanos_to_date(parse_date_nanos(end, "end")?);
        if let Some(bound) = config.bound_min.filter(|b| start < *b) {
            return Err(CalendarError::OutOfBounds {
                kind: BoundKind::Start,
                calendar: config.name.clone(),
                param: "start".to_string(),
                value: start.to_string(),
                bound: bound.to_string(),
                violation: Violation::Earliest,
            });
        }
        if let Some(bound) = config.bound_max.filter(|b| end > *b) {
            return Err(CalendarError::OutOfBounds {
                kind: BoundKind::End,
                calendar: config.name.clone(),
                param: "end".to_string(),
                value: end.to_string(),
                bound: bound.to_string(),
                violation: Violation::Latest,
            });
        }
        let schedule = ScheduleBuilder::new(config).build(&start, &end)?;
        Self::from_schedule(config, schedule, side)
    }

    /// Create a calendar from a schedule already built from `config`.
    pub fn from_schedule(
        config: &CalendarConfig,
        schedule: Schedule,
        side: Side,
    ) -> Result<Self, CalendarError> {
        if schedule.is_empty() {
            return Err(CalendarError::Configuration(format!(
                "calendar '{}' cannot be created from an empty schedule.",
                config.name
            )));
        }
        let edges = session_minute_edges(
            schedule.opens_nanos(),
            schedule.break_starts_nanos(),
            schedule.break_ends_nanos(),
            schedule.closes_nanos(),
            side,
        );
        let minutes_per_session = edges.counts();

        let sessions = schedule.sessions_nanos();
        let listed = |idx: Vec<usize>| idx.iter().map(|i| nanos_to_date(sessions[*i])).join(", ");
        let without_minutes: Vec<usize> = (0..sessions.len())
            .filter(|i| minutes_per_session[*i] < 1)
            .collect();
        if !without_minutes.is_empty() {
            return Err(CalendarError::Configuration(format!(
                "every session must have at least one trading minute with side '{}', although \
                 this is not the case for sessions: {}.",
                side,
                listed(without_minutes)
            )));
        }
        if side == Side::Both {
            let opens = schedule.opens_nanos();
            let closes = schedule.closes_nanos();
            let shared: Vec<usize> = (0..sessions.len().saturating_sub(1))
                .filter(|i| closes[*i] == opens[*i + 1])
                .collect();
            if !shared.is_empty() {
                return Err(CalendarError::Configuration(format!(
                    "side 'both' cannot be used when a session closes on the following session's \
                     open, although this is the case for sessions: {}.",
                    listed(shared)
                )));
            }
        }

        debug!(
            calendar = %config.name,
            sessions = schedule.len(),
            %side,
            "created calendar"
        );
        Ok(Self {
            name: config.name.clone(),
            tz: config.tz,
            side,
            bound_min: config.bound_min,
            bound_max: config.bound_max,
            schedule,
            edges,
            minutes_per_session,
            minutes: OnceLock::new(),
        })
    }

    // PROPERTIES

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn bound_min(&self) -> Option<NaiveDate> {
        self.bound_min
    }

    pub fn bound_max(&self) -> Option<NaiveDate> {
        self.bound_max
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn sessions(&self) -> Vec<NaiveDate> {
        self.schedule.sessions()
    }

    pub fn first_session(&self) -> NaiveDate {
        nanos_to_date(self.first_session_nanos())
    }

    pub fn last_session(&self) -> NaiveDate {
        nanos_to_date(self.last_session_nanos())
    }

    pub fn opens(&self) -> Vec<DateTime<Utc>> {
        self.schedule.opens()
    }

    pub fn closes(&self) -> Vec<DateTime<Utc>> {
        self.schedule.closes()
    }

    pub fn break_starts(&self) -> Vec<Option<DateTime<Utc>>> {
        self.schedule.break_starts()
    }

    pub fn break_ends(&self) -> Vec<Option<DateTime<Utc>>> {
        self.schedule.break_ends()
    }

    pub fn first_session_open(&self) -> DateTime<Utc> {
        nanos_to_utc(self.schedule.opens_nanos()[0])
    }

    pub fn last_session_close(&self) -> DateTime<Utc> {
        nanos_to_utc(self.schedule.closes_nanos()[self.schedule.len() - 1])
    }

    pub fn first_minute(&self) -> DateTime<Utc> {
        nanos_to_utc(self.first_minute_nanos())
    }

    pub fn last_minute(&self) -> DateTime<Utc> {
        nanos_to_utc(self.last_minute_nanos())
    }

    /// Every trading minute of the calendar.
    pub fn minutes(&self) -> Vec<DateTime<Utc>> {
        self.minutes_nanos().iter().map(|m| nanos_to_utc(*m)).collect()
    }

    /// The first trading minute of each session.
    pub fn first_minutes(&self) -> Vec<DateTime<Utc>> {
        self.edges.first.iter().map(|m| nanos_to_utc(*m)).collect()
    }

    /// The last trading minute of each session.
    pub fn last_minutes(&self) -> Vec<DateTime<Utc>> {
        self.edges.last.iter().map(|m| nanos_to_utc(*m)).collect()
    }

    /// The last trading minute before the break of each session.
    pub fn last_am_minutes(&self) -> Vec<Option<DateTime<Utc>>> {
        self.edges.last_am.iter().map(|m| m.map(nanos_to_utc)).collect()
    }

    /// The first trading minute after the break of each session.
    pub fn first_pm_minutes(&self) -> Vec<Option<DateTime<Utc>>> {
        self.edges.first_pm.iter().map(|m| m.map(nanos_to_utc)).collect()
    }

    /// Sessions that open later than the regular open.
    pub fn late_opens(&self) -> Vec<NaiveDate> {
        self.schedule.late_opens()
    }

    /// Sessions that close earlier than the regular close.
    pub fn early_closes(&self) -> Vec<NaiveDate> {
        self.schedule.early_closes()
    }

    /// The total number of trading minutes.
    pub fn minutes_count(&self) -> i64 {
        self.minutes_per_session.sum()
    }

    // TRADING INDEX

    /// Return a trading index of the sessions from `start` through `end`.
    ///
    /// Indices are evaluated at `period` from each session open, and from each break end, per
    /// the `options`. A `period` of one day returns the sessions.
    pub fn trading_index(
        &self,
        start: impl Into<TimestampInput>,
        end: impl Into<TimestampInput>,
        period: TimeDelta,
        options: TradingIndexOptions,
    ) -> Result<Vec<DateTime<Utc>>, CalendarError> {
        let period = period_nanos(&period)?;
        let range = self.sessions_range(start, end)?;
        if period == NANOS_PER_DAY {
            return Ok(self.schedule.sessions_nanos()[range]
                .iter()
                .map(|s| nanos_to_utc(*s))
                .collect());
        }
        self.trading_indexer(range, period, options)
            .points()
            .map(|points| points.into_iter().map(nanos_to_utc).collect())
    }

    /// Return a trading index of the sessions from `start` through `end` as intervals.
    ///
    /// `options.closed` must be `Side::Left` or `Side::Right`. A `period` of one day returns an
    /// interval for each session spanning the session date.
    pub fn trading_index_intervals(
        &self,
        start: impl Into<TimestampInput>,
        end: impl Into<TimestampInput>,
        period: TimeDelta,
        options: TradingIndexOptions,
    ) -> Result<Vec<Interval>, CalendarError> {
        let period = period_nanos(&period)?;
        let range = self.sessions_range(start, end)?;
        let closed = options.closed;
        if period == NANOS_PER_DAY && matches!(closed, Side::Left | Side::Right) {
            return Ok(self.schedule.sessions_nanos()[range]
                .iter()
                .map(|s| Interval::from_nanos(*s, s + NANOS_PER_DAY, closed))
                .collect());
        }
        let (left, right) = self.trading_indexer(range, period, options).intervals()?;
        Ok(left
            .into_iter()
            .zip(right)
            .map(|(l, r)| Interval::from_nanos(l, r, closed))
            .collect())
    }

    fn trading_indexer(
        &self,
        range: std::ops::Range<usize>,
        period: i64,
        options: TradingIndexOptions,
    ) -> TradingIndex<'_> {
        TradingIndex::new(
            &self.schedule.opens_nanos()[range.clone()],
            &self.schedule.break_starts_nanos()[range.clone()],
            &self.schedule.break_ends_nanos()[range.clone()],
            &self.schedule.closes_nanos()[range],
            period,
            options,
        )
    }

    // INTERNALS

    pub(crate) fn minutes_nanos(&self) -> &[i64] {
        self.minutes.get_or_init(|| {
            let minutes = self.edges.minutes();
            debug!(calendar = %self.name, minutes = minutes.len(), "computed trading minutes");
            minutes
        })
    }

    // Position of the session whose first minute is at or before `minute`.
    pub(crate) fn session_idx_at_or_before_minute(&self, minute: i64) -> Option<usize> {
        index_at_or_before(&self.edges.first, minute)
    }

    pub(crate) fn is_break_minute_nanos(&self, minute: i64) -> bool {
        match self.session_idx_at_or_before_minute(minute) {
            Some(idx) => match (self.edges.last_am[idx], self.edges.first_pm[idx]) {
                (Some(am), Some(pm)) => minute > am && minute < pm,
                _ => false,
            },
            None => false,
        }
    }
}

impl CalendarBounds for ExchangeCalendar {
    fn calendar_name(&self) -> &str {
        &self.name
    }

    fn calendar_side(&self) -> Side {
        self.side
    }

    fn first_session_nanos(&self) -> i64 {
        self.schedule.sessions_nanos()[0]
    }

    fn last_session_nanos(&self) -> i64 {
        self.schedule.sessions_nanos()[self.schedule.len() - 1]
    }

    fn first_minute_nanos(&self) -> i64 {
        self.edges.first[0]
    }

    fn last_minute_nanos(&self) -> i64 {
        self.edges.last[self.edges.len() - 1]
    }

    fn is_session_nanos(&self, nanos: i64) -> bool {
        self.schedule.sessions_nanos().binary_search(&nanos).is_ok()
    }

    fn is_trading_minute_nanos(&self, nanos: i64) -> bool {
        let Some(idx) = self.session_idx_at_or_before_minute(nanos) else {
            return false;
        };
        if nanos > self.edges.last[idx] || (nanos - self.edges.first[idx]) % NANOS_PER_MINUTE != 0
        {
            return false;
        }
        !self.is_break_minute_nanos(nanos)
    }
}
