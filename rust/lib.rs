//! Exchange trading calendars: sessions, trading minutes and trading indexes.
//!
//! A calendar is defined as data with a [`CalendarConfig`](scheduling::CalendarConfig), from
//! which a [`ScheduleBuilder`](scheduling::ScheduleBuilder) derives the UTC open, close and
//! break times of every session in a date range. An [`ExchangeCalendar`] wraps that schedule
//! and answers session, minute and trading index queries. Calendars may be shared by name
//! through a [`CalendarRegistry`].
//!
//! ### Example
//! ```rust
//! # use trading_calendars::{ExchangeCalendar, TradingIndexOptions};
//! # use trading_calendars::scheduling::{utc, CalendarConfig, Side};
//! # use chrono::{NaiveTime, TimeDelta};
//! let config = CalendarConfig::new(
//!     "XNYS",
//!     chrono_tz::Tz::America__New_York,
//!     NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
//!     NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
//! );
//! let cal = ExchangeCalendar::try_new(&config, "2021-01-04", "2021-01-08", Side::Left).unwrap();
//! let index = cal
//!     .trading_index(
//!         "2021-01-04",
//!         "2021-01-04",
//!         TimeDelta::hours(1),
//!         TradingIndexOptions::new(Side::Left),
//!     )
//!     .unwrap();
//! assert_eq!(index.len(), 7);
//! assert_eq!(index[0], utc(2021, 1, 4, 14, 30));
//! ```

#[cfg(test)]
mod tests;

pub mod calendar;
pub mod errors;
pub mod json;
pub mod parsing;
pub mod scheduling;
pub mod search;
pub mod trading_index;

pub use crate::calendar::{CalendarRegistry, ExchangeCalendar};
pub use crate::errors::CalendarError;
pub use crate::json::JSON;
pub use crate::trading_index::{Interval, TradingIndexOptions};
