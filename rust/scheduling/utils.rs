use chrono::prelude::*;
use chrono::LocalResult;
use chrono_tz::Tz;

use crate::errors::CalendarError;

pub(crate) const NANOS_PER_SECOND: i64 = 1_000_000_000;
pub(crate) const NANOS_PER_MINUTE: i64 = 60 * NANOS_PER_SECOND;
pub(crate) const NANOS_PER_DAY: i64 = 1_440 * NANOS_PER_MINUTE;

/// Create a `NaiveDate`.
///
/// Panics if date values are invalid.
pub fn nd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("`year`, `month` `day` are invalid.")
}

/// Create a UTC `DateTime` at minute resolution.
///
/// Panics if date or time values are invalid.
pub fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    nd(year, month, day)
        .and_hms_opt(hour, minute, 0)
        .expect("`hour`, `minute` are invalid.")
        .and_utc()
}

/// Nanoseconds since the epoch of UTC midnight of `date`.
///
/// Dates beyond the nanosecond range saturate; parsed inputs are range checked before reaching
/// here.
pub(crate) fn date_to_nanos(date: &NaiveDate) -> i64 {
    let days = date
        .signed_duration_since(NaiveDate::default())
        .num_days();
    days.saturating_mul(NANOS_PER_DAY)
}

pub(crate) fn nanos_to_date(nanos: i64) -> NaiveDate {
    DateTime::from_timestamp_nanos(nanos).date_naive()
}

pub(crate) fn nanos_to_utc(nanos: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_nanos(nanos)
}

pub(crate) fn utc_to_nanos(dt: &DateTime<Utc>) -> Option<i64> {
    dt.timestamp_nanos_opt()
}

/// Localize a wall-clock time in `tz` and return the UTC instant as epoch nanoseconds.
///
/// An ambiguous local time (clocks going back) resolves to the earliest instant. A local time
/// that does not exist (clocks going forward) is a configuration error.
pub(crate) fn local_to_utc_nanos(
    tz: &Tz,
    date: &NaiveDate,
    time: &NaiveTime,
) -> Result<i64, CalendarError> {
    let local = date.and_time(*time);
    let instant = match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            return Err(CalendarError::Configuration(format!(
                "local time {} does not exist in timezone {}.",
                local, tz
            )))
        }
    };
    instant.timestamp_nanos_opt().ok_or_else(|| {
        CalendarError::Configuration(format!(
            "local time {} in timezone {} is outside the nanosecond range.",
            local, tz
        ))
    })
}

/// Easter Sunday of the Gregorian `year` (anonymous Gregorian algorithm).
pub(crate) fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}
