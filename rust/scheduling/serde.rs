use crate::json::JSON;
use crate::scheduling::{CalendarConfig, HolidayCalendar, HolidayRule, ScheduleRow, Weekmask};
use crate::trading_index::TradingIndexOptions;

impl JSON for CalendarConfig {}
impl JSON for HolidayRule {}
impl JSON for HolidayCalendar {}
impl JSON for ScheduleRow {}
impl JSON for Weekmask {}
impl JSON for TradingIndexOptions {}
