use ndarray::Array1;
use std::ops::Range;

use crate::scheduling::utils::NANOS_PER_MINUTE;
use crate::scheduling::Side;

/// The first and last trading minute of each session, and of each side of a break.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionMinuteEdges {
    pub first: Vec<i64>,
    pub last: Vec<i64>,
    /// The last minute before the break, `None` for sessions without a break.
    pub last_am: Vec<Option<i64>>,
    /// The first minute after the break, `None` for sessions without a break.
    pub first_pm: Vec<Option<i64>>,
}

/// Compute the minute edges of each session.
///
/// The open and break end are trading minutes if `side` includes the left boundary, the close
/// and break start are trading minutes if `side` includes the right boundary.
pub fn session_minute_edges(
    opens: &[i64],
    break_starts: &[Option<i64>],
    break_ends: &[Option<i64>],
    closes: &[i64],
    side: Side,
) -> SessionMinuteEdges {
    let left = if side.includes_left() { 0 } else { NANOS_PER_MINUTE };
    let right = if side.includes_right() { 0 } else { NANOS_PER_MINUTE };
    let first = Array1::from(opens.to_vec()) + left;
    let last = Array1::from(closes.to_vec()) - right;
    SessionMinuteEdges {
        first: first.to_vec(),
        last: last.to_vec(),
        last_am: break_starts.iter().map(|b| b.map(|v| v - right)).collect(),
        first_pm: break_ends.iter().map(|b| b.map(|v| v + left)).collect(),
    }
}

impl SessionMinuteEdges {
    pub fn len(&self) -> usize {
        self.first.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_empty()
    }

    /// The edges of the sessions at positions `range`.
    pub fn slice(&self, range: Range<usize>) -> SessionMinuteEdges {
        SessionMinuteEdges {
            first: self.first[range.clone()].to_vec(),
            last: self.last[range.clone()].to_vec(),
            last_am: self.last_am[range.clone()].to_vec(),
            first_pm: self.first_pm[range].to_vec(),
        }
    }

    /// The number of trading minutes of each session.
    pub fn counts(&self) -> Array1<i64> {
        let first = Array1::from(self.first.clone());
        let last = Array1::from(self.last.clone());
        let gaps: Array1<i64> = self
            .last_am
            .iter()
            .zip(self.first_pm.iter())
            .map(|(am, pm)| match (am, pm) {
                (Some(am), Some(pm)) => (pm - am) / NANOS_PER_MINUTE - 1,
                _ => 0,
            })
            .collect();
        let mut counts = (&last - &first) / NANOS_PER_MINUTE + 1 - gaps;
        counts.mapv_inplace(|c| c.max(0));
        counts
    }

    // Contiguous minute ranges `[start, end]` in session order, AM before PM.
    fn spans(&self) -> (Array1<i64>, Array1<i64>) {
        let mut starts: Vec<i64> = Vec::with_capacity(self.len() * 2);
        let mut ends: Vec<i64> = Vec::with_capacity(self.len() * 2);
        for i in 0..self.len() {
            match (self.last_am[i], self.first_pm[i]) {
                (Some(am), Some(pm)) => {
                    starts.extend([self.first[i], pm]);
                    ends.extend([am, self.last[i]]);
                }
                _ => {
                    starts.push(self.first[i]);
                    ends.push(self.last[i]);
                }
            }
        }
        (Array1::from(starts), Array1::from(ends))
    }

    /// Every trading minute, ascending.
    pub fn minutes(&self) -> Vec<i64> {
        let (starts, ends) = self.spans();
        let mut counts = (&ends - &starts) / NANOS_PER_MINUTE + 1;
        counts.mapv_inplace(|c| c.max(0));
        let mut minutes: Vec<i64> = Vec::with_capacity(counts.sum() as usize);
        for (start, n) in starts.iter().zip(counts.iter()) {
            minutes.extend((0..*n).map(|k| start + k * NANOS_PER_MINUTE));
        }
        minutes
    }
}

/// Compute every trading minute of the sessions defined by the given bounds.
pub fn compute_minutes(
    opens: &[i64],
    break_starts: &[Option<i64>],
    break_ends: &[Option<i64>],
    closes: &[i64],
    side: Side,
) -> Vec<i64> {
    session_minute_edges(opens, break_starts, break_ends, closes, side).minutes()
}
