//! Binary search over sorted divider arrays and trading minute enumeration.
//!
//! A divider array is a sorted array of boundary instants (sessions, opens, closes or trading
//! minutes) as epoch nanoseconds.

pub mod minutes;

pub use crate::search::minutes::{compute_minutes, session_minute_edges, SessionMinuteEdges};

/// Return the index of the smallest divider strictly later than `value`.
///
/// Returns `None` if `value` is at or beyond the last divider.
///
/// # Examples
/// ```rust
/// # use trading_calendars::search::next_divider_idx;
/// let dividers = [10_i64, 20, 30];
/// assert_eq!(next_divider_idx(&dividers, 5), Some(0));
/// assert_eq!(next_divider_idx(&dividers, 20), Some(2));
/// assert_eq!(next_divider_idx(&dividers, 30), None);
/// ```
pub fn next_divider_idx(dividers: &[i64], value: i64) -> Option<usize> {
    let idx = dividers.partition_point(|d| *d <= value);
    if idx < dividers.len() {
        Some(idx)
    } else {
        None
    }
}

/// Return the index of the greatest divider strictly earlier than `value`.
///
/// Returns `None` if `value` is at or before the first divider.
pub fn previous_divider_idx(dividers: &[i64], value: i64) -> Option<usize> {
    let idx = dividers.partition_point(|d| *d < value);
    idx.checked_sub(1)
}

/// Return the index of the greatest divider at or earlier than `value`.
pub(crate) fn index_at_or_before(dividers: &[i64], value: i64) -> Option<usize> {
    dividers.partition_point(|d| *d <= value).checked_sub(1)
}

/// Return the index of the smallest divider at or later than `value`.
pub(crate) fn index_at_or_after(dividers: &[i64], value: i64) -> Option<usize> {
    let idx = dividers.partition_point(|d| *d < value);
    if idx < dividers.len() {
        Some(idx)
    } else {
        None
    }
}

// UNIT TESTS
#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_dividers() -> Vec<i64> {
        vec![100, 200, 300, 400]
    }

    #[test]
    fn test_next_divider_idx() {
        let d = fixture_dividers();
        let options: Vec<(i64, Option<usize>)> = vec![
            (50, Some(0)),
            (100, Some(1)),
            (150, Some(1)),
            (399, Some(3)),
            (400, None),
            (500, None),
        ];
        for (value, expected) in options.iter() {
            assert_eq!(next_divider_idx(&d, *value), *expected);
        }
    }

    #[test]
    fn test_previous_divider_idx() {
        let d = fixture_dividers();
        let options: Vec<(i64, Option<usize>)> = vec![
            (50, None),
            (100, None),
            (101, Some(0)),
            (300, Some(1)),
            (301, Some(2)),
            (1000, Some(3)),
        ];
        for (value, expected) in options.iter() {
            assert_eq!(previous_divider_idx(&d, *value), *expected);
        }
    }

    #[test]
    fn test_dividers_are_inverse_consistent() {
        // for any value not itself a divider, stepping forward then back returns to the
        // greatest divider below the value
        let d = fixture_dividers();
        for value in [150_i64, 250, 350] {
            let next = next_divider_idx(&d, value).unwrap();
            let prev = previous_divider_idx(&d, d[next]).unwrap();
            assert!(d[prev] < value && value < d[next]);
            assert_eq!(prev + 1, next);
        }
    }

    #[test]
    fn test_empty_dividers() {
        assert_eq!(next_divider_idx(&[], 0), None);
        assert_eq!(previous_divider_idx(&[], 0), None);
        assert_eq!(index_at_or_before(&[], 0), None);
        assert_eq!(index_at_or_after(&[], 0), None);
    }

    #[test]
    fn test_inclusive_indexes() {
        let d = fixture_dividers();
        assert_eq!(index_at_or_before(&d, 200), Some(1));
        assert_eq!(index_at_or_before(&d, 199), Some(0));
        assert_eq!(index_at_or_before(&d, 99), None);
        assert_eq!(index_at_or_after(&d, 200), Some(1));
        assert_eq!(index_at_or_after(&d, 201), Some(2));
        assert_eq!(index_at_or_after(&d, 401), None);
    }
}
