//! Define exchange calendars as data and build their per-session [`Schedule`].
//!
//! An exchange is described by a [`CalendarConfig`]: its timezone, regular (possibly date-sliced)
//! open, close and break times, a [`Weekmask`] of regular trading days with optional
//! [`SpecialWeekmask`] ranges, recurring [`HolidayRule`]s, ad hoc holidays and irregular
//! schedule changes (special opens / closes and special offsets).
//!
//! # Business days
//!
//! [`BusinessDays`] implements the [`DateRoll`] trait which determines whether a date is a
//! business day under the weekmask in force on that date and the holiday set.
//!
//! ### Example
//! ```rust
//! # use trading_calendars::scheduling::{nd, BusinessDays, DateRoll, Weekmask};
//! let cal = BusinessDays::try_new(Weekmask::default(), vec![], vec![nd(2017, 5, 1)]).unwrap();
//! assert!(!cal.is_bus_day(&nd(2017, 4, 29)));
//! assert!(!cal.is_bus_day(&nd(2017, 5, 1)));
//! assert!(cal.is_bus_day(&nd(2017, 5, 2)));
//! ```
//!
//! # Schedules
//!
//! A [`ScheduleBuilder`] turns a configuration into a validated [`Schedule`] of UTC opens,
//! closes and breaks for every session in a date range:
//!
//! 1. Sessions are the business days of the range.
//! 2. Regular times are localized in the calendar timezone and converted to UTC.
//! 3. Special offsets are added to their column.
//! 4. Special opens and closes replace the regular time.
//! 5. Breaks are removed from sessions that close before the break ends or open after it
//!    starts.

mod builder;
mod config;
mod enums;
mod holidays;
mod schedule;
mod serde;
pub(crate) mod utils;
mod weekmask;

pub use crate::scheduling::{
    builder::ScheduleBuilder,
    config::{CalendarConfig, DateRule, DatedTimes, SpecialOffset, SpecialTime, TimeSlice},
    enums::{Direction, ScheduleColumn, Side},
    holidays::{HolidayCalendar, HolidayOffset, HolidayRule, Observance},
    schedule::{Schedule, ScheduleRow},
    utils::{nd, utc},
    weekmask::{BusinessDays, DateRoll, SpecialWeekmask, Weekmask},
};
