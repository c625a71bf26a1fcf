//! Generate indices, or intervals, of a fixed period within each session.
//!
//! Each session is split into spans: `[open, close]` for sessions without a break, otherwise an
//! AM span `[open, break_start]` and a PM span `[break_end, close]`. Every span is divided into
//! `ceil(duration / period)` sub-intervals from the span start. The `closed` side of the
//! [`TradingIndexOptions`] determines which sub-interval boundaries are returned as indices.
//!
//! Where a span is not an exact multiple of the period the final sub-interval overruns the span
//! end. Forcing (`force_close` for the session close, `force_break_close` for the break start)
//! replaces the overrunning boundary with the span end.

use chrono::prelude::*;
use chrono::TimeDelta;
use itertools::Itertools;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::CalendarError;
use crate::scheduling::utils::{nanos_to_utc, NANOS_PER_DAY};
use crate::scheduling::Side;

/// Options for generating a trading index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingIndexOptions {
    /// Which side of each sub-interval is closed.
    pub closed: Side,
    /// Shorten the last interval of each session so that it ends on the close.
    pub force_close: bool,
    /// Shorten the last interval before each break so that it ends on the break start.
    pub force_break_close: bool,
    /// Curtail the right side of intervals that would otherwise overlap the next interval.
    pub curtail_overlaps: bool,
    /// Treat sessions with a break as if trading through the break.
    pub ignore_breaks: bool,
}

impl TradingIndexOptions {
    pub fn new(closed: Side) -> Self {
        Self {
            closed,
            ..Self::default()
        }
    }

    /// Set both `force_close` and `force_break_close`.
    pub fn force(mut self, force: bool) -> Self {
        self.force_close = force;
        self.force_break_close = force;
        self
    }

    pub fn with_force_close(mut self, force_close: bool) -> Self {
        self.force_close = force_close;
        self
    }

    pub fn with_force_break_close(mut self, force_break_close: bool) -> Self {
        self.force_break_close = force_break_close;
        self
    }

    pub fn with_curtail_overlaps(mut self, curtail_overlaps: bool) -> Self {
        self.curtail_overlaps = curtail_overlaps;
        self
    }

    pub fn with_ignore_breaks(mut self, ignore_breaks: bool) -> Self {
        self.ignore_breaks = ignore_breaks;
        self
    }
}

/// An interval of a trading index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub left: DateTime<Utc>,
    pub right: DateTime<Utc>,
    pub closed: Side,
}

impl Interval {
    pub(crate) fn from_nanos(left: i64, right: i64, closed: Side) -> Self {
        Self {
            left: nanos_to_utc(left),
            right: nanos_to_utc(right),
            closed,
        }
    }

    /// Returns whether `timestamp` falls within the interval.
    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        let after_left = match self.closed.includes_left() {
            true => timestamp >= &self.left,
            false => timestamp > &self.left,
        };
        let before_right = match self.closed.includes_right() {
            true => timestamp <= &self.right,
            false => timestamp < &self.right,
        };
        after_left && before_right
    }

    pub fn length(&self) -> TimeDelta {
        self.right - self.left
    }
}

/// Validate a period and return it in nanoseconds.
///
/// The period must be positive and no longer than one day.
pub(crate) fn period_nanos(period: &TimeDelta) -> Result<i64, CalendarError> {
    let nanos = period.num_nanoseconds().unwrap_or(i64::MAX);
    if nanos <= 0 || nanos > NANOS_PER_DAY {
        return Err(CalendarError::Range(format!(
            "`period` must be positive and cannot be longer than one day, although received as \
             {}.",
            period
        )));
    }
    Ok(nanos)
}

fn ceil_div(numerator: i64, denominator: i64) -> i64 {
    numerator.div_euclid(denominator) + i64::from(numerator.rem_euclid(denominator) > 0)
}

// Spans of one kind: AM, PM or full day.
struct Group {
    starts: Array1<i64>,
    ends: Array1<i64>,
    // start of the span that follows each span, if within range
    next_starts: Vec<Option<i64>>,
    force: bool,
}

impl Group {
    fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    fn materialize(&self, period: i64, closed: Side, force: bool) -> Vec<i64> {
        if self.is_empty() {
            return vec![];
        }
        let force = force && closed.includes_right();
        let mut num = (&self.ends - &self.starts).mapv(|d| ceil_div(d, period));
        if force {
            num -= 1;
        }
        match closed {
            Side::Both => num += 1,
            Side::Neither => num -= 1,
            _ => {}
        }
        let first = match closed.includes_left() {
            true => self.starts.clone(),
            false => &self.starts + period,
        };
        let mut points: Vec<i64> =
            Vec::with_capacity(num.iter().map(|n| n.max(&0)).sum::<i64>() as usize + num.len());
        for ((start, n), end) in first.iter().zip(num.iter()).zip(self.ends.iter()) {
            points.extend((0..*n.max(&0)).map(|k| start + k * period));
            if force {
                points.push(*end);
            }
        }
        points
    }

    // Raise if the last index of a span would be later than the following span start. With
    // both sides closed, a last index on the following span start is also a duplicate.
    fn verify_non_overlapping(&self, period: i64, closed: Side) -> Result<(), CalendarError> {
        let overlaps = self
            .starts
            .iter()
            .zip(self.ends.iter())
            .zip(self.next_starts.iter())
            .any(|((start, end), next)| {
                let Some(next) = next else {
                    return false;
                };
                let last = match self.force {
                    true => *end,
                    false => start + ceil_div(end - start, period) * period,
                };
                match closed {
                    Side::Both => last >= *next,
                    _ => last > *next,
                }
            });
        match overlaps {
            true => Err(CalendarError::IndicesOverlap),
            false => Ok(()),
        }
    }
}

/// Generator of the trading index of a contiguous run of sessions.
pub(crate) struct TradingIndex<'a> {
    opens: &'a [i64],
    break_starts: &'a [Option<i64>],
    break_ends: &'a [Option<i64>],
    closes: &'a [i64],
    period: i64,
    options: TradingIndexOptions,
}

impl<'a> TradingIndex<'a> {
    pub(crate) fn new(
        opens: &'a [i64],
        break_starts: &'a [Option<i64>],
        break_ends: &'a [Option<i64>],
        closes: &'a [i64],
        period: i64,
        options: TradingIndexOptions,
    ) -> Self {
        Self {
            opens,
            break_starts,
            break_ends,
            closes,
            period,
            options,
        }
    }

    fn break_of(&self, i: usize) -> Option<(i64, i64)> {
        if self.options.ignore_breaks {
            return None;
        }
        match (self.break_starts[i], self.break_ends[i]) {
            (Some(bs), Some(be)) => Some((bs, be)),
            _ => None,
        }
    }

    // AM, PM and full day groups, in that order.
    fn groups(&self) -> [Group; 3] {
        let n = self.opens.len();
        let next_open = |i: usize| if i + 1 < n { Some(self.opens[i + 1]) } else { None };
        let (mut am, mut pm, mut day) = (
            (vec![], vec![], vec![]),
            (vec![], vec![], vec![]),
            (vec![], vec![], vec![]),
        );
        for i in 0..n {
            match self.break_of(i) {
                Some((bs, be)) => {
                    am.0.push(self.opens[i]);
                    am.1.push(bs);
                    am.2.push(Some(be));
                    pm.0.push(be);
                    pm.1.push(self.closes[i]);
                    pm.2.push(next_open(i));
                }
                None => {
                    day.0.push(self.opens[i]);
                    day.1.push(self.closes[i]);
                    day.2.push(next_open(i));
                }
            }
        }
        let group = |(starts, ends, next_starts): (Vec<i64>, Vec<i64>, Vec<Option<i64>>),
                     force: bool| Group {
            starts: Array1::from(starts),
            ends: Array1::from(ends),
            next_starts,
            force,
        };
        [
            group(am, self.options.force_break_close),
            group(pm, self.options.force_close),
            group(day, self.options.force_close),
        ]
    }

    /// Return the trading index as sorted epoch nanoseconds.
    pub(crate) fn points(&self) -> Result<Vec<i64>, CalendarError> {
        let groups = self.groups();
        let closed = self.options.closed;
        if closed.includes_right() {
            groups
                .iter()
                .try_for_each(|g| g.verify_non_overlapping(self.period, closed))?;
        }
        // AM and PM indices interleave across sessions
        let mut points: Vec<i64> = groups
            .iter()
            .flat_map(|g| g.materialize(self.period, closed, g.force))
            .collect();
        points.sort_unstable();
        debug!(points = points.len(), period = self.period, "generated trading index");
        Ok(points)
    }

    /// Return the left and right sides of the trading index intervals as epoch nanoseconds.
    pub(crate) fn intervals(&self) -> Result<(Vec<i64>, Vec<i64>), CalendarError> {
        let closed = self.options.closed;
        if !matches!(closed, Side::Left | Side::Right) {
            return Err(CalendarError::Range(format!(
                "`closed` must be 'left' or 'right' for an intervals trading index, although \
                 received as '{}'.",
                closed
            )));
        }
        let forcing = self.options.force_close || self.options.force_break_close;
        let groups = self.groups();
        let mut left: Vec<i64> = vec![];
        let mut right: Vec<i64> = vec![];
        for g in groups.iter() {
            let lefts = g.materialize(self.period, Side::Left, false);
            let rights = match forcing {
                true => g.materialize(self.period, Side::Right, g.force),
                false => lefts.iter().map(|l| l + self.period).collect(),
            };
            left.extend(lefts);
            right.extend(rights);
        }

        if !groups[0].is_empty() {
            let order: Vec<usize> = (0..left.len()).sorted_by_key(|i| left[*i]).collect();
            left = order.iter().map(|i| left[*i]).collect();
            right = order.iter().map(|i| right[*i]).collect();
        }

        for i in 1..left.len() {
            if right[i - 1] > left[i] {
                if !self.options.curtail_overlaps {
                    return Err(CalendarError::IntervalsOverlap);
                }
                right[i - 1] = left[i];
            }
        }
        debug!(
            intervals = left.len(),
            period = self.period,
            "generated trading index intervals"
        );
        Ok((left, right))
    }
}

// UNIT TESTS
#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduling::utils::NANOS_PER_MINUTE;

    const M: i64 = NANOS_PER_MINUTE;
    const H: i64 = 60 * M;

    // 09:30 to 16:00 on two consecutive days
    fn fixture_day_sessions() -> (Vec<i64>, Vec<Option<i64>>, Vec<Option<i64>>, Vec<i64>) {
        (
            vec![570 * M, NANOS_PER_DAY + 570 * M],
            vec![None, None],
            vec![None, None],
            vec![960 * M, NANOS_PER_DAY + 960 * M],
        )
    }

    // 09:00 to 15:00 with a break 12:00 to 13:00
    fn fixture_break_session() -> (Vec<i64>, Vec<Option<i64>>, Vec<Option<i64>>, Vec<i64>) {
        (vec![9 * H], vec![Some(12 * H)], vec![Some(13 * H)], vec![15 * H])
    }

    fn points(
        bounds: &(Vec<i64>, Vec<Option<i64>>, Vec<Option<i64>>, Vec<i64>),
        period: i64,
        options: TradingIndexOptions,
    ) -> Result<Vec<i64>, CalendarError> {
        TradingIndex::new(&bounds.0, &bounds.1, &bounds.2, &bounds.3, period, options).points()
    }

    fn intervals(
        bounds: &(Vec<i64>, Vec<Option<i64>>, Vec<Option<i64>>, Vec<i64>),
        period: i64,
        options: TradingIndexOptions,
    ) -> Result<(Vec<i64>, Vec<i64>), CalendarError> {
        TradingIndex::new(&bounds.0, &bounds.1, &bounds.2, &bounds.3, period, options).intervals()
    }

    fn first_session(points: &[i64]) -> Vec<i64> {
        points
            .iter()
            .filter(|p| **p <= NANOS_PER_DAY)
            .map(|p| p / M)
            .collect()
    }

    #[test]
    fn test_points_closed_left() {
        let result =
            points(&fixture_day_sessions(), H, TradingIndexOptions::new(Side::Left)).unwrap();
        assert_eq!(
            first_session(&result),
            vec![570, 630, 690, 750, 810, 870, 930]
        );
        assert_eq!(result.len(), 14);
        // forcing has no effect on a left closed index
        let forced = points(
            &fixture_day_sessions(),
            H,
            TradingIndexOptions::new(Side::Left).force(true),
        )
        .unwrap();
        assert_eq!(forced, result);
    }

    #[test]
    fn test_points_closed_right_overruns_close() {
        let result =
            points(&fixture_day_sessions(), H, TradingIndexOptions::new(Side::Right)).unwrap();
        assert_eq!(
            first_session(&result),
            vec![630, 690, 750, 810, 870, 930, 990]
        );
    }

    #[test]
    fn test_points_force_close() {
        let options = TradingIndexOptions::new(Side::Right).with_force_close(true);
        let result = points(&fixture_day_sessions(), H, options).unwrap();
        assert_eq!(
            first_session(&result),
            vec![630, 690, 750, 810, 870, 930, 960]
        );
        let options = TradingIndexOptions::new(Side::Both).with_force_close(true);
        let result = points(&fixture_day_sessions(), H, options).unwrap();
        assert_eq!(
            first_session(&result),
            vec![570, 630, 690, 750, 810, 870, 930, 960]
        );
    }

    #[test]
    fn test_points_both_and_neither() {
        let both =
            points(&fixture_day_sessions(), H, TradingIndexOptions::new(Side::Both)).unwrap();
        assert_eq!(first_session(&both).len(), 8);
        let neither =
            points(&fixture_day_sessions(), H, TradingIndexOptions::new(Side::Neither)).unwrap();
        assert_eq!(
            first_session(&neither),
            vec![630, 690, 750, 810, 870, 930]
        );
    }

    #[test]
    fn test_points_with_break() {
        let bounds = fixture_break_session();
        let result = points(&bounds, 2 * H, TradingIndexOptions::new(Side::Left)).unwrap();
        assert_eq!(result, vec![9 * H, 11 * H, 13 * H]);
        let result = points(&bounds, 2 * H, TradingIndexOptions::new(Side::Right)).unwrap();
        assert_eq!(result, vec![11 * H, 13 * H, 15 * H]);
        let options = TradingIndexOptions::new(Side::Right).with_force_break_close(true);
        let result = points(&bounds, 2 * H, options).unwrap();
        assert_eq!(result, vec![11 * H, 12 * H, 15 * H]);
        let options = TradingIndexOptions::new(Side::Left).with_ignore_breaks(true);
        let result = points(&bounds, 2 * H, options).unwrap();
        assert_eq!(result, vec![9 * H, 11 * H, 13 * H]);
    }

    #[test]
    fn test_points_break_overlap_raises() {
        // a 150 minute period overruns the AM span by more than the break
        let bounds = fixture_break_session();
        let result = points(&bounds, 150 * M, TradingIndexOptions::new(Side::Right));
        assert_eq!(result, Err(CalendarError::IndicesOverlap));
        let options = TradingIndexOptions::new(Side::Right).with_force_break_close(true);
        assert!(points(&bounds, 150 * M, options).is_ok());
        // a left closed index is never verified
        assert!(points(&bounds, 150 * M, TradingIndexOptions::new(Side::Left)).is_ok());
    }

    #[test]
    fn test_points_closed_both_on_break_end_raises() {
        // the last AM index at 13:00 would repeat the first PM index
        let bounds = fixture_break_session();
        let result = points(&bounds, 2 * H, TradingIndexOptions::new(Side::Both));
        assert_eq!(result, Err(CalendarError::IndicesOverlap));
        let options = TradingIndexOptions::new(Side::Both).with_force_break_close(true);
        let result = points(&bounds, 2 * H, options).unwrap();
        assert_eq!(result, vec![9 * H, 11 * H, 12 * H, 13 * H, 15 * H]);
        // closed right ends exactly on the break end without a duplicate
        assert!(points(&bounds, 2 * H, TradingIndexOptions::new(Side::Right)).is_ok());
    }

    #[test]
    fn test_points_closed_both_back_to_back_sessions_raises() {
        let bounds = (
            vec![0, NANOS_PER_DAY],
            vec![None, None],
            vec![None, None],
            vec![NANOS_PER_DAY, 2 * NANOS_PER_DAY],
        );
        let result = points(&bounds, 6 * H, TradingIndexOptions::new(Side::Both));
        assert_eq!(result, Err(CalendarError::IndicesOverlap));
        let options = TradingIndexOptions::new(Side::Both).with_force_close(true);
        let result = points(&bounds, 6 * H, options);
        assert_eq!(result, Err(CalendarError::IndicesOverlap));
        let result = points(&bounds, 6 * H, TradingIndexOptions::new(Side::Right)).unwrap();
        assert_eq!(result.len(), 8);
        assert!(result.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_intervals_overrun_past_break_start() {
        let bounds = fixture_break_session();
        let (left, right) =
            intervals(&bounds, 2 * H, TradingIndexOptions::new(Side::Right)).unwrap();
        assert_eq!(left, vec![9 * H, 11 * H, 13 * H]);
        assert_eq!(right, vec![11 * H, 13 * H, 15 * H]);
    }

    #[test]
    fn test_intervals_force_break_close() {
        let bounds = fixture_break_session();
        let options = TradingIndexOptions::new(Side::Right).with_force_break_close(true);
        let (left, right) = intervals(&bounds, 2 * H, options).unwrap();
        assert_eq!(left, vec![9 * H, 11 * H, 13 * H]);
        assert_eq!(right, vec![11 * H, 12 * H, 15 * H]);
    }

    #[test]
    fn test_intervals_closed_both_raises() {
        let bounds = fixture_break_session();
        let result = intervals(&bounds, H, TradingIndexOptions::new(Side::Both));
        assert!(matches!(result, Err(CalendarError::Range(_))));
        let result = intervals(&bounds, H, TradingIndexOptions::new(Side::Neither));
        assert!(matches!(result, Err(CalendarError::Range(_))));
    }

    #[test]
    fn test_intervals_overlap_and_curtail() {
        // sessions of 23 hours with a one hour gap
        let bounds = (
            vec![0, NANOS_PER_DAY],
            vec![None, None],
            vec![None, None],
            vec![23 * H, NANOS_PER_DAY + 23 * H],
        );
        let result = intervals(&bounds, 5 * H, TradingIndexOptions::new(Side::Left));
        assert_eq!(result, Err(CalendarError::IntervalsOverlap));
        let result = points(&bounds, 5 * H, TradingIndexOptions::new(Side::Right));
        assert_eq!(result, Err(CalendarError::IndicesOverlap));

        let options = TradingIndexOptions::new(Side::Left).with_curtail_overlaps(true);
        let (left, right) = intervals(&bounds, 5 * H, options).unwrap();
        assert_eq!(left.len(), 10);
        assert_eq!(right[4], NANOS_PER_DAY);
        assert!(left.iter().skip(1).zip(right.iter()).all(|(l, r)| r <= l));
        assert_eq!(right[9], NANOS_PER_DAY + 25 * H);

        let options = TradingIndexOptions::new(Side::Left).with_force_close(true);
        let (_, right) = intervals(&bounds, 5 * H, options).unwrap();
        assert_eq!(right[4], 23 * H);
    }

    #[test]
    fn test_period_nanos() {
        assert_eq!(period_nanos(&TimeDelta::minutes(5)).unwrap(), 5 * M);
        assert!(period_nanos(&TimeDelta::zero()).is_err());
        assert!(period_nanos(&TimeDelta::minutes(-5)).is_err());
        assert!(period_nanos(&TimeDelta::hours(25)).is_err());
        assert_eq!(period_nanos(&TimeDelta::days(1)).unwrap(), NANOS_PER_DAY);
    }

    #[test]
    fn test_interval_contains() {
        let interval = Interval::from_nanos(9 * H, 11 * H, Side::Right);
        assert!(!interval.contains(&nanos_to_utc(9 * H)));
        assert!(interval.contains(&nanos_to_utc(11 * H)));
        assert_eq!(interval.length(), TimeDelta::hours(2));
    }
}
