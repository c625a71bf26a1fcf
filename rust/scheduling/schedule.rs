use chrono::prelude::*;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::errors::CalendarError;
use crate::scheduling::utils::{nanos_to_date, nanos_to_utc, NANOS_PER_DAY};

/// One row of a [`Schedule`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRow {
    pub session: NaiveDate,
    pub open: DateTime<Utc>,
    pub break_start: Option<DateTime<Utc>>,
    pub break_end: Option<DateTime<Utc>>,
    pub close: DateTime<Utc>,
}

/// The validated per-session schedule of a calendar.
///
/// Sessions are held as UTC midnight epoch nanoseconds and all times as UTC epoch nanoseconds.
/// A schedule can only be created through [`Schedule::try_new`] and is immutable thereafter.
#[derive(Clone, Debug, PartialEq)]
pub struct Schedule {
    sessions: Vec<i64>,
    opens: Vec<i64>,
    break_starts: Vec<Option<i64>>,
    break_ends: Vec<Option<i64>>,
    closes: Vec<i64>,
    late_opens: Vec<i64>,
    early_closes: Vec<i64>,
}

fn list_sessions(sessions: &[i64], idx: &[usize]) -> String {
    idx.iter()
        .map(|i| nanos_to_date(sessions[*i]).to_string())
        .join(", ")
}

impl Schedule {
    /// Create a schedule, validating that:
    ///
    /// - all columns have one entry per session,
    /// - sessions are UTC midnights, strictly ascending,
    /// - break starts and break ends are both present or both absent for each session,
    /// - `open < close`, and `open < break_start < break_end < close` where a break exists,
    /// - no session overlaps the following session (`close <= next open`).
    ///
    /// Errors list the offending sessions.
    pub fn try_new(
        sessions: Vec<i64>,
        opens: Vec<i64>,
        break_starts: Vec<Option<i64>>,
        break_ends: Vec<Option<i64>>,
        closes: Vec<i64>,
    ) -> Result<Self, CalendarError> {
        let n = sessions.len();
        if [opens.len(), break_starts.len(), break_ends.len(), closes.len()]
            .iter()
            .any(|l| *l != n)
        {
            return Err(CalendarError::Configuration(format!(
                "schedule columns must each have one entry per session ({} sessions), got opens: \
                 {}, break_starts: {}, break_ends: {}, closes: {}.",
                n,
                opens.len(),
                break_starts.len(),
                break_ends.len(),
                closes.len()
            )));
        }
        if sessions.iter().any(|s| s.rem_euclid(NANOS_PER_DAY) != 0) {
            return Err(CalendarError::Configuration(
                "sessions must be UTC midnights.".to_string(),
            ));
        }
        if sessions.iter().tuple_windows().any(|(a, b)| a >= b) {
            return Err(CalendarError::Configuration(
                "sessions must be unique and strictly ascending.".to_string(),
            ));
        }

        let mismatched: Vec<usize> = (0..n)
            .filter(|i| break_starts[*i].is_some() != break_ends[*i].is_some())
            .collect();
        if !mismatched.is_empty() {
            return Err(CalendarError::Configuration(format!(
                "break starts and break ends must both be defined or both be absent, although \
                 they differ for sessions: {}.",
                list_sessions(&sessions, &mismatched)
            )));
        }

        let disordered: Vec<usize> = (0..n)
            .filter(|i| {
                let i = *i;
                match (break_starts[i], break_ends[i]) {
                    (Some(bs), Some(be)) => !(opens[i] < bs && bs < be && be < closes[i]),
                    _ => opens[i] >= closes[i],
                }
            })
            .collect();
        if !disordered.is_empty() {
            return Err(CalendarError::Configuration(format!(
                "sessions must satisfy `open < close` and, with a break, \
                 `open < break_start < break_end < close`, although this is not the case for \
                 sessions: {}.",
                list_sessions(&sessions, &disordered)
            )));
        }

        let overlapping: Vec<usize> = (0..n.saturating_sub(1))
            .filter(|i| closes[*i] > opens[*i + 1])
            .collect();
        if !overlapping.is_empty() {
            return Err(CalendarError::Configuration(format!(
                "a session cannot close later than the following session opens, although this \
                 is the case for sessions: {}.",
                list_sessions(&sessions, &overlapping)
            )));
        }

        Ok(Self {
            sessions,
            opens,
            break_starts,
            break_ends,
            closes,
            late_opens: vec![],
            early_closes: vec![],
        })
    }

    /// Record the sessions that open later, or close earlier, than regular hours.
    pub(crate) fn with_deviations(mut self, late_opens: Vec<i64>, early_closes: Vec<i64>) -> Self {
        self.late_opens = late_opens;
        self.early_closes = early_closes;
        self
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Returns whether any session has a break.
    pub fn has_breaks(&self) -> bool {
        self.break_starts.iter().any(|b| b.is_some())
    }

    /// Return the row of the session at position `idx`.
    pub fn row(&self, idx: usize) -> Option<ScheduleRow> {
        if idx >= self.len() {
            return None;
        }
        Some(ScheduleRow {
            session: nanos_to_date(self.sessions[idx]),
            open: nanos_to_utc(self.opens[idx]),
            break_start: self.break_starts[idx].map(nanos_to_utc),
            break_end: self.break_ends[idx].map(nanos_to_utc),
            close: nanos_to_utc(self.closes[idx]),
        })
    }

    /// Return every row of the schedule.
    pub fn rows(&self) -> Vec<ScheduleRow> {
        (0..self.len()).filter_map(|i| self.row(i)).collect()
    }

    pub fn sessions(&self) -> Vec<NaiveDate> {
        self.sessions.iter().map(|s| nanos_to_date(*s)).collect()
    }

    pub fn opens(&self) -> Vec<DateTime<Utc>> {
        self.opens.iter().map(|v| nanos_to_utc(*v)).collect()
    }

    pub fn closes(&self) -> Vec<DateTime<Utc>> {
        self.closes.iter().map(|v| nanos_to_utc(*v)).collect()
    }

    pub fn break_starts(&self) -> Vec<Option<DateTime<Utc>>> {
        self.break_starts.iter().map(|v| v.map(nanos_to_utc)).collect()
    }

    pub fn break_ends(&self) -> Vec<Option<DateTime<Utc>>> {
        self.break_ends.iter().map(|v| v.map(nanos_to_utc)).collect()
    }

    /// Sessions that open later than the regular open time.
    pub fn late_opens(&self) -> Vec<NaiveDate> {
        self.late_opens.iter().map(|s| nanos_to_date(*s)).collect()
    }

    /// Sessions that close earlier than the regular close time.
    pub fn early_closes(&self) -> Vec<NaiveDate> {
        self.early_closes.iter().map(|s| nanos_to_date(*s)).collect()
    }

    pub(crate) fn sessions_nanos(&self) -> &[i64] {
        &self.sessions
    }

    pub(crate) fn opens_nanos(&self) -> &[i64] {
        &self.opens
    }

    pub(crate) fn closes_nanos(&self) -> &[i64] {
        &self.closes
    }

    pub(crate) fn break_starts_nanos(&self) -> &[Option<i64>] {
        &self.break_starts
    }

    pub(crate) fn break_ends_nanos(&self) -> &[Option<i64>] {
        &self.break_ends
    }
}
