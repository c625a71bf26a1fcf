//! Crate level tests against fixture calendars.


use crate::calendar::ExchangeCalendar;
use crate::scheduling::{
    CalendarConfig, DateRule, HolidayCalendar, HolidayOffset, HolidayRule, Observance, Side,
    SpecialTime,
};
use chrono::{NaiveTime, Weekday};
use chrono_tz::Tz;

pub(crate) fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn nth_weekday(name: &str, month: u32, weekday: Weekday, n: i32) -> HolidayRule {
    let day = if n > 0 { 1 } else { 31 };
    HolidayRule::new(name, month, day).with_offset(HolidayOffset::Weekday { weekday, n })
}

fn fixture_us_holidays() -> HolidayCalendar {
    HolidayCalendar::new(vec![
        HolidayRule::new("New Year's Day", 1, 1).with_observance(Observance::SundayToMonday),
        nth_weekday("Martin Luther King Jr. Day", 1, Weekday::Mon, 3),
        nth_weekday("Presidents Day", 2, Weekday::Mon, 3),
        HolidayRule::new("Good Friday", 1, 1)
            .with_offset(HolidayOffset::Easter)
            .with_offset(HolidayOffset::Days(-2)),
        nth_weekday("Memorial Day", 5, Weekday::Mon, -1),
        HolidayRule::new("Independence Day", 7, 4).with_observance(Observance::NearestWorkday),
        nth_weekday("Labor Day", 9, Weekday::Mon, 1),
        nth_weekday("Thanksgiving", 11, Weekday::Thu, 4),
        HolidayRule::new("Christmas", 12, 25).with_observance(Observance::NearestWorkday),
    ])
}

/// New York, 09:30 to 16:00, US holidays and an early close after Thanksgiving.
pub(crate) fn fixture_xnys_config() -> CalendarConfig {
    let day_after_thanksgiving = nth_weekday("Day after Thanksgiving", 11, Weekday::Thu, 4)
        .with_offset(HolidayOffset::Days(1));
    CalendarConfig::new("XNYS", Tz::America__New_York, t(9, 30), t(16, 0))
        .with_regular_holidays(fixture_us_holidays())
        .with_special_close(SpecialTime {
            time: t(13, 0),
            rule: DateRule::Recurring(HolidayCalendar::new(vec![day_after_thanksgiving])),
        })
}

pub(crate) fn fixture_xnys() -> ExchangeCalendar {
    ExchangeCalendar::try_new(&fixture_xnys_config(), "2021-01-01", "2021-12-31", Side::Left)
        .unwrap()
}

/// UTC, 09:00 to 15:00 with a break 12:00 to 13:00.
pub(crate) fn fixture_break_config() -> CalendarConfig {
    CalendarConfig::new("XBRK", Tz::UTC, t(9, 0), t(15, 0)).with_break(t(12, 0), t(13, 0))
}

pub(crate) fn fixture_break(side: Side) -> ExchangeCalendar {
    ExchangeCalendar::try_new(&fixture_break_config(), "2021-01-04", "2021-01-29", side).unwrap()
}
