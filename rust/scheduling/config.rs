use chrono::prelude::*;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::errors::CalendarError;
use crate::scheduling::enums::ScheduleColumn;
use crate::scheduling::holidays::HolidayCalendar;
use crate::scheduling::weekmask::{SpecialWeekmask, Weekmask};

/// A local time of day in force from an effective date onwards.
///
/// An `effective` of `None` is in force from the beginning of time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlice {
    pub effective: Option<NaiveDate>,
    pub time: NaiveTime,
}

/// A local time of day that changes on given effective dates.
///
/// For example, an open of 09:00 before 2011-03-07 and 09:30 thereafter is represented by the
/// slices `[(None, 09:00), (2011-03-07, 09:30)]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatedTimes(pub Vec<TimeSlice>);

impl DatedTimes {
    /// A time that has never changed.
    pub fn fixed(time: NaiveTime) -> Self {
        Self(vec![TimeSlice {
            effective: None,
            time,
        }])
    }

    /// Add a time that comes into force on `effective`.
    pub fn then(mut self, effective: NaiveDate, time: NaiveTime) -> Self {
        self.0.push(TimeSlice {
            effective: Some(effective),
            time,
        });
        self
    }

    /// Check that the first slice has no effective date and the rest are strictly ascending.
    pub fn validate(&self, label: &str) -> Result<(), CalendarError> {
        let first = self.0.first().ok_or_else(|| {
            CalendarError::Configuration(format!("`{}` must contain at least one time.", label))
        })?;
        if first.effective.is_some() {
            return Err(CalendarError::Configuration(format!(
                "the first time of `{}` must not have an effective date.",
                label
            )));
        }
        let dates: Vec<Option<NaiveDate>> = self.0.iter().skip(1).map(|s| s.effective).collect();
        if dates.iter().any(|d| d.is_none()) {
            return Err(CalendarError::Configuration(format!(
                "only the first time of `{}` may omit an effective date.",
                label
            )));
        }
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(CalendarError::Configuration(format!(
                "effective dates of `{}` must be strictly ascending.",
                label
            )));
        }
        Ok(())
    }

    /// The time in force on `date`.
    pub fn time_for(&self, date: &NaiveDate) -> Option<NaiveTime> {
        self.0
            .iter()
            .rev()
            .find(|s| match s.effective {
                Some(d) => d <= *date,
                None => true,
            })
            .map(|s| s.time)
    }
}

/// A set of dates on which a special time or offset applies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateRule {
    /// Dates generated by recurring holiday rules.
    Recurring(HolidayCalendar),
    /// An explicit list of dates.
    AdHoc(Vec<NaiveDate>),
    /// Every occurrence of a weekday. Only dates which are sessions are taken.
    Weekday(Weekday),
}

impl DateRule {
    /// Return the dates of the rule between `start` and `end` inclusive, ascending.
    pub fn dates(&self, start: &NaiveDate, end: &NaiveDate) -> Vec<NaiveDate> {
        match self {
            DateRule::Recurring(cal) => cal.holidays(start, end),
            DateRule::AdHoc(dates) => {
                let mut v: Vec<NaiveDate> = dates
                    .iter()
                    .filter(|d| *d >= start && *d <= end)
                    .copied()
                    .collect();
                v.sort();
                v.dedup();
                v
            }
            DateRule::Weekday(weekday) => start
                .iter_days()
                .take_while(|d| d <= end)
                .filter(|d| d.weekday() == *weekday)
                .collect(),
        }
    }

    /// Whether dates of this rule that are not sessions should be silently skipped.
    pub(crate) fn skips_non_sessions(&self) -> bool {
        matches!(self, DateRule::Weekday(_))
    }
}

/// A local time replacing the regular open or close on the dates of a rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialTime {
    pub time: NaiveTime,
    pub rule: DateRule,
}

/// A number of minutes added to a schedule column on the dates of a rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialOffset {
    pub minutes: i64,
    pub rule: DateRule,
    pub column: ScheduleColumn,
    /// Re-apply the offset on top of a special open or close falling on the same date.
    #[serde(default)]
    pub apply_to_special: bool,
}

/// The data defining an exchange calendar.
///
/// Regular times are local times in `tz`. Opens are localized on `session + open_offset` days
/// and closes on `session + close_offset` days, e.g. an `open_offset` of `-1` for an exchange
/// whose session opens on the evening of the previous day.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalendarConfig {
    pub name: String,
    pub tz: Tz,
    pub open_times: DatedTimes,
    pub close_times: DatedTimes,
    #[serde(default)]
    pub break_start_times: Option<DatedTimes>,
    #[serde(default)]
    pub break_end_times: Option<DatedTimes>,
    #[serde(default)]
    pub open_offset: i64,
    #[serde(default)]
    pub close_offset: i64,
    #[serde(default)]
    pub weekmask: Weekmask,
    #[serde(default)]
    pub special_weekmasks: Vec<SpecialWeekmask>,
    #[serde(default)]
    pub regular_holidays: HolidayCalendar,
    #[serde(default)]
    pub adhoc_holidays: Vec<NaiveDate>,
    #[serde(default)]
    pub special_opens: Vec<SpecialTime>,
    #[serde(default)]
    pub special_closes: Vec<SpecialTime>,
    #[serde(default)]
    pub special_offsets: Vec<SpecialOffset>,
    /// Earliest date from which the calendar can be constructed.
    #[serde(default)]
    pub bound_min: Option<NaiveDate>,
    /// Latest date to which the calendar can be constructed.
    #[serde(default)]
    pub bound_max: Option<NaiveDate>,
}

impl CalendarConfig {
    /// Create a Monday to Friday configuration with fixed open and close times and no holidays.
    pub fn new(name: &str, tz: Tz, open: NaiveTime, close: NaiveTime) -> Self {
        Self {
            name: name.to_string(),
            tz,
            open_times: DatedTimes::fixed(open),
            close_times: DatedTimes::fixed(close),
            break_start_times: None,
            break_end_times: None,
            open_offset: 0,
            close_offset: 0,
            weekmask: Weekmask::default(),
            special_weekmasks: vec![],
            regular_holidays: HolidayCalendar::default(),
            adhoc_holidays: vec![],
            special_opens: vec![],
            special_closes: vec![],
            special_offsets: vec![],
            bound_min: None,
            bound_max: None,
        }
    }

    pub fn with_open_times(mut self, times: DatedTimes) -> Self {
        self.open_times = times;
        self
    }

    pub fn with_close_times(mut self, times: DatedTimes) -> Self {
        self.close_times = times;
        self
    }

    /// Add a fixed intraday break.
    pub fn with_break(mut self, start: NaiveTime, end: NaiveTime) -> Self {
        self.break_start_times = Some(DatedTimes::fixed(start));
        self.break_end_times = Some(DatedTimes::fixed(end));
        self
    }

    pub fn with_offsets(mut self, open_offset: i64, close_offset: i64) -> Self {
        self.open_offset = open_offset;
        self.close_offset = close_offset;
        self
    }

    pub fn with_weekmask(mut self, weekmask: Weekmask) -> Self {
        self.weekmask = weekmask;
        self
    }

    pub fn with_special_weekmask(mut self, special: SpecialWeekmask) -> Self {
        self.special_weekmasks.push(special);
        self
    }

    pub fn with_regular_holidays(mut self, holidays: HolidayCalendar) -> Self {
        self.regular_holidays = holidays;
        self
    }

    pub fn with_adhoc_holidays(mut self, dates: Vec<NaiveDate>) -> Self {
        self.adhoc_holidays = dates;
        self
    }

    pub fn with_special_open(mut self, special: SpecialTime) -> Self {
        self.special_opens.push(special);
        self
    }

    pub fn with_special_close(mut self, special: SpecialTime) -> Self {
        self.special_closes.push(special);
        self
    }

    pub fn with_special_offset(mut self, offset: SpecialOffset) -> Self {
        self.special_offsets.push(offset);
        self
    }

    pub fn with_bounds(
        mut self,
        bound_min: Option<NaiveDate>,
        bound_max: Option<NaiveDate>,
    ) -> Self {
        self.bound_min = bound_min;
        self.bound_max = bound_max;
        self
    }

    /// Returns whether regular sessions have an intraday break.
    pub fn has_breaks(&self) -> bool {
        self.break_start_times.is_some()
    }

    /// Check the structural consistency of the configuration.
    pub fn validate(&self) -> Result<(), CalendarError> {
        if self.name.trim().is_empty() {
            return Err(CalendarError::Configuration(
                "calendar name cannot be empty.".to_string(),
            ));
        }
        self.open_times.validate("open_times")?;
        self.close_times.validate("close_times")?;
        match (&self.break_start_times, &self.break_end_times) {
            (Some(bs), Some(be)) => {
                bs.validate("break_start_times")?;
                be.validate("break_end_times")?;
            }
            (None, None) => {}
            _ => {
                return Err(CalendarError::Configuration(format!(
                    "calendar '{}' must define both or neither of `break_start_times` and \
                     `break_end_times`.",
                    self.name
                )))
            }
        }
        self.regular_holidays.validate()?;
        for special in self.special_opens.iter().chain(self.special_closes.iter()) {
            if let DateRule::Recurring(cal) = &special.rule {
                cal.validate()?;
            }
        }
        for offset in self.special_offsets.iter() {
            if let DateRule::Recurring(cal) = &offset.rule {
                cal.validate()?;
            }
            let targets_break = matches!(
                offset.column,
                ScheduleColumn::BreakStart | ScheduleColumn::BreakEnd
            );
            if targets_break && !self.has_breaks() {
                return Err(CalendarError::Configuration(format!(
                    "calendar '{}' has no breaks although a special offset targets the `{}` \
                     column.",
                    self.name, offset.column
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.bound_min, self.bound_max) {
            if min > max {
                return Err(CalendarError::Configuration(format!(
                    "calendar '{}' has `bound_min` {} later than `bound_max` {}.",
                    self.name, min, max
                )));
            }
        }
        Ok(())
    }
}

// UNIT TESTS
#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduling::holidays::HolidayRule;
    use crate::scheduling::nd;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn fixture_config() -> CalendarConfig {
        CalendarConfig::new("XTST", Tz::America__New_York, t(9, 30), t(16, 0))
    }

    #[test]
    fn test_dated_times_time_for() {
        let times = DatedTimes::fixed(t(9, 0)).then(nd(2011, 3, 7), t(9, 30));
        assert_eq!(times.time_for(&nd(2011, 3, 4)), Some(t(9, 0)));
        assert_eq!(times.time_for(&nd(2011, 3, 7)), Some(t(9, 30)));
        assert_eq!(times.time_for(&nd(2020, 1, 1)), Some(t(9, 30)));
        assert!(times.validate("open_times").is_ok());
    }

    #[test]
    fn test_dated_times_validate() {
        let unordered = DatedTimes::fixed(t(9, 0))
            .then(nd(2012, 1, 1), t(9, 30))
            .then(nd(2011, 1, 1), t(10, 0));
        assert!(unordered.validate("open_times").is_err());
        assert!(DatedTimes(vec![]).validate("open_times").is_err());
        let dated_first = DatedTimes(vec![TimeSlice {
            effective: Some(nd(2011, 1, 1)),
            time: t(9, 0),
        }]);
        assert!(dated_first.validate("open_times").is_err());
    }

    #[test]
    fn test_date_rule_dates() {
        let adhoc = DateRule::AdHoc(vec![nd(2021, 3, 1), nd(2020, 1, 1), nd(2021, 1, 5)]);
        assert_eq!(
            adhoc.dates(&nd(2021, 1, 1), &nd(2021, 12, 31)),
            vec![nd(2021, 1, 5), nd(2021, 3, 1)]
        );
        let fridays = DateRule::Weekday(Weekday::Fri);
        assert_eq!(
            fridays.dates(&nd(2021, 1, 1), &nd(2021, 1, 15)),
            vec![nd(2021, 1, 1), nd(2021, 1, 8), nd(2021, 1, 15)]
        );
        let recurring = DateRule::Recurring(HolidayCalendar::new(vec![HolidayRule::new(
            "Christmas Eve",
            12,
            24,
        )]));
        assert_eq!(
            recurring.dates(&nd(2020, 1, 1), &nd(2021, 12, 31)),
            vec![nd(2020, 12, 24), nd(2021, 12, 24)]
        );
    }

    #[test]
    fn test_validate_break_pairing() {
        let mut config = fixture_config();
        config.break_start_times = Some(DatedTimes::fixed(t(12, 0)));
        assert!(config.validate().is_err());
        let config = fixture_config().with_break(t(12, 0), t(13, 0));
        assert!(config.validate().is_ok());
        assert!(config.has_breaks());
    }

    #[test]
    fn test_validate_break_offset_without_breaks() {
        let config = fixture_config().with_special_offset(SpecialOffset {
            minutes: 30,
            rule: DateRule::AdHoc(vec![nd(2021, 1, 4)]),
            column: ScheduleColumn::BreakEnd,
            apply_to_special: false,
        });
        assert!(matches!(
            config.validate(),
            Err(CalendarError::Configuration(_))
        ));
    }

    #[test]
    fn test_validate_bounds() {
        let config = fixture_config().with_bounds(Some(nd(2021, 1, 1)), Some(nd(2020, 1, 1)));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serde_defaults() {
        let js = r#"{
            "name": "XTST",
            "tz": "America/New_York",
            "open_times": [{"effective": null, "time": "09:30:00"}],
            "close_times": [{"effective": null, "time": "16:00:00"}]
        }"#;
        let config: CalendarConfig = serde_json::from_str(js).unwrap();
        assert_eq!(config, fixture_config());
    }
}
