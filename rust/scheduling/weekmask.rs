use chrono::prelude::*;
use indexmap::set::IndexSet;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::errors::CalendarError;

/// The days of the week on which an exchange regularly trades.
///
/// Represented as a seven character string of `'1'` (open) and `'0'` (closed), Monday first.
/// A Monday to Friday week is `"1111100"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Weekmask([bool; 7]);

impl Weekmask {
    /// Create a weekmask from a seven character `'0'`/`'1'` string.
    pub fn try_new(mask: &str) -> Result<Self, CalendarError> {
        let chars: Vec<char> = mask.trim().chars().collect();
        if chars.len() != 7 || chars.iter().any(|c| *c != '0' && *c != '1') {
            return Err(CalendarError::Configuration(format!(
                "weekmask must be seven '0'/'1' characters, Monday first, got '{}'.",
                mask
            )));
        }
        let mut days = [false; 7];
        for (i, c) in chars.iter().enumerate() {
            days[i] = *c == '1';
        }
        if !days.iter().any(|d| *d) {
            return Err(CalendarError::Configuration(
                "weekmask must include at least one trading day.".to_string(),
            ));
        }
        Ok(Self(days))
    }

    /// Returns whether the exchange regularly trades on `weekday`.
    pub fn is_open(&self, weekday: Weekday) -> bool {
        self.0[weekday.num_days_from_monday() as usize]
    }
}

impl Default for Weekmask {
    fn default() -> Self {
        Self([true, true, true, true, true, false, false])
    }
}

impl FromStr for Weekmask {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Weekmask::try_new(s)
    }
}

impl TryFrom<String> for Weekmask {
    type Error = CalendarError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Weekmask::try_new(&value)
    }
}

impl From<Weekmask> for String {
    fn from(item: Weekmask) -> Self {
        item.0.iter().map(|d| if *d { '1' } else { '0' }).collect()
    }
}

/// A weekmask that replaces the default weekmask over an inclusive date range.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialWeekmask {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub weekmask: Weekmask,
}

/// Business day determination from a working week and holidays.
pub trait DateRoll {
    /// Returns whether the date is part of the working week in force on that date.
    fn is_weekday(&self, date: &NaiveDate) -> bool;

    /// Returns whether the date is a specific holiday excluded from the working week.
    fn is_holiday(&self, date: &NaiveDate) -> bool;

    /// Returns whether the date is a business day, i.e. part of the working week and not a holiday.
    fn is_bus_day(&self, date: &NaiveDate) -> bool {
        self.is_weekday(date) && !self.is_holiday(date)
    }

    /// Returns whether the date is not a business day.
    fn is_non_bus_day(&self, date: &NaiveDate) -> bool {
        !self.is_bus_day(date)
    }

    /// Return a vector of business dates between a start and end, inclusive.
    fn bus_date_range(&self, start: &NaiveDate, end: &NaiveDate) -> Vec<NaiveDate> {
        start
            .iter_days()
            .take_while(|d| d <= end)
            .filter(|d| self.is_bus_day(d))
            .collect()
    }
}

/// A business day calendar with a default weekmask, date-ranged special weekmasks and a set
/// of holidays.
#[derive(Clone, Debug, PartialEq)]
pub struct BusinessDays {
    pub(crate) weekmask: Weekmask,
    pub(crate) special_weekmasks: Vec<SpecialWeekmask>,
    pub(crate) holidays: IndexSet<NaiveDate>,
}

impl BusinessDays {
    /// Create a business day calendar.
    ///
    /// Special weekmask ranges must be ordered (`start <= end`) and must not overlap one
    /// another.
    pub fn try_new(
        weekmask: Weekmask,
        special_weekmasks: Vec<SpecialWeekmask>,
        holidays: Vec<NaiveDate>,
    ) -> Result<Self, CalendarError> {
        let mut special_weekmasks = special_weekmasks;
        special_weekmasks.sort_by_key(|s| s.start);
        for s in special_weekmasks.iter() {
            if s.start > s.end {
                return Err(CalendarError::Configuration(format!(
                    "special weekmask start {} is later than its end {}.",
                    s.start, s.end
                )));
            }
        }
        for pair in special_weekmasks.windows(2) {
            if pair[1].start <= pair[0].end {
                return Err(CalendarError::Configuration(format!(
                    "special weekmask ranges overlap: [{}, {}] and [{}, {}].",
                    pair[0].start, pair[0].end, pair[1].start, pair[1].end
                )));
            }
        }
        Ok(Self {
            weekmask,
            special_weekmasks,
            holidays: IndexSet::from_iter(holidays),
        })
    }

    /// The weekmask in force on `date`.
    pub fn weekmask_for(&self, date: &NaiveDate) -> &Weekmask {
        let idx = self.special_weekmasks.partition_point(|s| s.start <= *date);
        if idx > 0 && self.special_weekmasks[idx - 1].end >= *date {
            &self.special_weekmasks[idx - 1].weekmask
        } else {
            &self.weekmask
        }
    }
}

impl DateRoll for BusinessDays {
    fn is_weekday(&self, date: &NaiveDate) -> bool {
        self.weekmask_for(date).is_open(date.weekday())
    }

    fn is_holiday(&self, date: &NaiveDate) -> bool {
        self.holidays.contains(date)
    }
}
