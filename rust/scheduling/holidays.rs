//! Recurring holiday rules and rule calendars.
//!
//! A [`HolidayRule`] describes a date that recurs every year: a fixed month and day,
//! optionally moved by [`HolidayOffset`]s (e.g. "third Monday of January", "two days before
//! Easter") or by an [`Observance`] (e.g. "if on a Sunday, observed on the Monday").

use chrono::prelude::*;
use chrono::Days;
use indexmap::set::IndexSet;
use serde::{Deserialize, Serialize};

use crate::errors::CalendarError;
use crate::scheduling::utils::easter_sunday;

/// A shift applied to the unadjusted date of a [`HolidayRule`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HolidayOffset {
    /// A number of calendar days, positive or negative.
    Days(i64),
    /// The `n`th `weekday` on or after the date when `n > 0`, or on or before the date when
    /// `n < 0`.
    Weekday { weekday: Weekday, n: i32 },
    /// Easter Sunday of the date's year.
    Easter,
}

/// An adjustment for a holiday falling on a weekend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Observance {
    /// Saturday to Friday, Sunday to Monday.
    NearestWorkday,
    /// Sunday to Monday.
    SundayToMonday,
    /// Saturday or Sunday to Monday.
    NextMonday,
    /// Saturday to Monday, Sunday or Monday to Tuesday. Used for the second of two adjacent
    /// holidays.
    NextMondayOrTuesday,
    /// Saturday or Sunday to Friday.
    PreviousFriday,
    /// Saturday or Sunday to Monday.
    WeekendToMonday,
    /// The next Monday to Friday day after the date.
    NextWorkday,
    /// The last Monday to Friday day before the date.
    PreviousWorkday,
}

fn is_weekend(date: &NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn add_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    if days < 0 {
        date.checked_sub_days(Days::new(days.unsigned_abs()))
    } else {
        date.checked_add_days(Days::new(days as u64))
    }
}

impl Observance {
    /// Apply the observance to a date.
    pub fn apply(&self, date: NaiveDate) -> Option<NaiveDate> {
        let weekday = date.weekday();
        match self {
            Observance::NearestWorkday => match weekday {
                Weekday::Sat => add_days(date, -1),
                Weekday::Sun => add_days(date, 1),
                _ => Some(date),
            },
            Observance::SundayToMonday => match weekday {
                Weekday::Sun => add_days(date, 1),
                _ => Some(date),
            },
            Observance::NextMonday | Observance::WeekendToMonday => match weekday {
                Weekday::Sat => add_days(date, 2),
                Weekday::Sun => add_days(date, 1),
                _ => Some(date),
            },
            Observance::NextMondayOrTuesday => match weekday {
                Weekday::Sat | Weekday::Sun => add_days(date, 2),
                Weekday::Mon => add_days(date, 1),
                _ => Some(date),
            },
            Observance::PreviousFriday => match weekday {
                Weekday::Sat => add_days(date, -1),
                Weekday::Sun => add_days(date, -2),
                _ => Some(date),
            },
            Observance::NextWorkday => {
                let mut d = add_days(date, 1)?;
                while is_weekend(&d) {
                    d = add_days(d, 1)?;
                }
                Some(d)
            }
            Observance::PreviousWorkday => {
                let mut d = add_days(date, -1)?;
                while is_weekend(&d) {
                    d = add_days(d, -1)?;
                }
                Some(d)
            }
        }
    }
}

impl HolidayOffset {
    /// Apply the offset to a date.
    pub fn apply(&self, date: NaiveDate) -> Option<NaiveDate> {
        match self {
            HolidayOffset::Days(n) => add_days(date, *n),
            HolidayOffset::Easter => easter_sunday(date.year()),
            HolidayOffset::Weekday { weekday, n } => {
                if *n == 0 {
                    return Some(date);
                }
                let current = date.weekday().num_days_from_monday() as i64;
                let target = weekday.num_days_from_monday() as i64;
                if *n > 0 {
                    let ahead = (target - current).rem_euclid(7);
                    add_days(date, ahead + 7 * (*n as i64 - 1))
                } else {
                    let behind = (current - target).rem_euclid(7);
                    add_days(date, -(behind + 7 * (n.unsigned_abs() as i64 - 1)))
                }
            }
        }
    }
}

/// A rule defining a holiday that recurs annually.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidayRule {
    pub name: String,
    pub month: u32,
    pub day: u32,
    /// Restrict the rule to a single year.
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub offsets: Vec<HolidayOffset>,
    #[serde(default)]
    pub observance: Option<Observance>,
    /// The first date on which the (adjusted) holiday can fall.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    /// The last date on which the (adjusted) holiday can fall.
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    /// Only years in which the unadjusted date falls on one of these weekdays.
    #[serde(default)]
    pub days_of_week: Option<Vec<Weekday>>,
}

impl HolidayRule {
    /// Create a rule for a fixed month and day.
    pub fn new(name: &str, month: u32, day: u32) -> Self {
        Self {
            name: name.to_string(),
            month,
            day,
            year: None,
            offsets: vec![],
            observance: None,
            start_date: None,
            end_date: None,
            days_of_week: None,
        }
    }

    /// Add an offset, applied after any previously added offsets.
    pub fn with_offset(mut self, offset: HolidayOffset) -> Self {
        self.offsets.push(offset);
        self
    }

    pub fn with_observance(mut self, observance: Observance) -> Self {
        self.observance = Some(observance);
        self
    }

    pub fn with_start_date(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self
    }

    pub fn with_end_date(mut self, date: NaiveDate) -> Self {
        self.end_date = Some(date);
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_days_of_week(mut self, days: Vec<Weekday>) -> Self {
        self.days_of_week = Some(days);
        self
    }

    /// Check the rule is well formed.
    pub fn validate(&self) -> Result<(), CalendarError> {
        if !(1..=12).contains(&self.month) || !(1..=31).contains(&self.day) {
            return Err(CalendarError::Configuration(format!(
                "holiday rule '{}' has invalid month {} / day {}.",
                self.name, self.month, self.day
            )));
        }
        if !self.offsets.is_empty() && self.observance.is_some() {
            return Err(CalendarError::Configuration(format!(
                "holiday rule '{}' cannot define both offsets and an observance.",
                self.name
            )));
        }
        Ok(())
    }

    fn adjust(&self, date: NaiveDate) -> Option<NaiveDate> {
        if let Some(observance) = &self.observance {
            return observance.apply(date);
        }
        self.offsets
            .iter()
            .try_fold(date, |d, offset| offset.apply(d))
    }

    /// Return the dates of the holiday between `start` and `end`, inclusive, ascending.
    pub fn dates(&self, start: &NaiveDate, end: &NaiveDate) -> Vec<NaiveDate> {
        // observances and offsets can move a date across a year end
        let years: Vec<i32> = match self.year {
            Some(y) => vec![y],
            None => ((start.year() - 1)..=(end.year() + 1)).collect(),
        };
        let lower = match self.start_date {
            Some(d) if d > *start => d,
            _ => *start,
        };
        let upper = match self.end_date {
            Some(d) if d < *end => d,
            _ => *end,
        };
        let mut dates: Vec<NaiveDate> = years
            .into_iter()
            .filter_map(|y| NaiveDate::from_ymd_opt(y, self.month, self.day))
            .filter(|d| match &self.days_of_week {
                Some(days) => days.contains(&d.weekday()),
                None => true,
            })
            .filter_map(|d| self.adjust(d))
            .filter(|d| *d >= lower && *d <= upper)
            .collect();
        dates.sort();
        dates.dedup();
        dates
    }
}

/// A collection of holiday rules.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HolidayCalendar {
    pub rules: Vec<HolidayRule>,
}

impl HolidayCalendar {
    pub fn new(rules: Vec<HolidayRule>) -> Self {
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Check every rule is well formed.
    pub fn validate(&self) -> Result<(), CalendarError> {
        self.rules.iter().try_for_each(|r| r.validate())
    }

    /// Return the de-duplicated dates of all rules between `start` and `end`, inclusive,
    /// ascending.
    pub fn holidays(&self, start: &NaiveDate, end: &NaiveDate) -> Vec<NaiveDate> {
        let set: IndexSet<NaiveDate> = self
            .rules
            .iter()
            .flat_map(|r| r.dates(start, end))
            .collect();
        let mut dates: Vec<NaiveDate> = set.into_iter().collect();
        dates.sort();
        dates
    }
}
