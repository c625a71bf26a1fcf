use chrono::prelude::*;
use chrono::Days;
use tracing::{debug, trace, warn};

use crate::errors::CalendarError;
use crate::scheduling::config::{CalendarConfig, DatedTimes, SpecialOffset, SpecialTime};
use crate::scheduling::enums::ScheduleColumn;
use crate::scheduling::schedule::Schedule;
use crate::scheduling::utils::{date_to_nanos, local_to_utc_nanos, NANOS_PER_MINUTE};
use crate::scheduling::weekmask::{BusinessDays, DateRoll};

/// Builds a [`Schedule`] from a [`CalendarConfig`].
///
/// # Examples
/// ```rust
/// # use trading_calendars::scheduling::{nd, CalendarConfig, ScheduleBuilder};
/// # use chrono::NaiveTime;
/// let config = CalendarConfig::new(
///     "XTST",
///     chrono_tz::Tz::America__New_York,
///     NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
///     NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
/// );
/// let schedule = ScheduleBuilder::new(&config)
///     .build(&nd(2021, 1, 4), &nd(2021, 1, 8))
///     .unwrap();
/// assert_eq!(schedule.len(), 5);
/// ```
pub struct ScheduleBuilder<'a> {
    config: &'a CalendarConfig,
    tolerant_offsets: bool,
}

// Mutable columns during construction, frozen into a `Schedule` once complete.
struct Columns {
    sessions: Vec<NaiveDate>,
    opens: Vec<i64>,
    break_starts: Vec<Option<i64>>,
    break_ends: Vec<Option<i64>>,
    closes: Vec<i64>,
}

impl Columns {
    fn position(&self, date: &NaiveDate) -> Option<usize> {
        self.sessions.binary_search(date).ok()
    }

    fn apply_offset(&mut self, idx: usize, column: ScheduleColumn, minutes: i64) {
        let delta = minutes * NANOS_PER_MINUTE;
        match column {
            ScheduleColumn::Open => self.opens[idx] += delta,
            ScheduleColumn::Close => self.closes[idx] += delta,
            ScheduleColumn::BreakStart => {
                self.break_starts[idx] = self.break_starts[idx].map(|v| v + delta)
            }
            ScheduleColumn::BreakEnd => {
                self.break_ends[idx] = self.break_ends[idx].map(|v| v + delta)
            }
        }
    }
}

fn shift_days(date: &NaiveDate, days: i64) -> Result<NaiveDate, CalendarError> {
    let shifted = if days < 0 {
        date.checked_sub_days(Days::new(days.unsigned_abs()))
    } else {
        date.checked_add_days(Days::new(days as u64))
    };
    shifted.ok_or_else(|| {
        CalendarError::Configuration(format!("day offset {} from {} is out of range.", days, date))
    })
}

impl<'a> ScheduleBuilder<'a> {
    pub fn new(config: &'a CalendarConfig) -> Self {
        Self {
            config,
            tolerant_offsets: false,
        }
    }

    /// Drop, with a warning, special offset dates that are not sessions instead of failing.
    pub fn tolerant_offsets(mut self, tolerant: bool) -> Self {
        self.tolerant_offsets = tolerant;
        self
    }

    /// Build the schedule of every session between `start` and `end`, inclusive.
    pub fn build(&self, start: &NaiveDate, end: &NaiveDate) -> Result<Schedule, CalendarError> {
        let config = self.config;
        config.validate()?;
        if start > end {
            return Err(CalendarError::Range(format!(
                "`start` ({}) cannot be later than `end` ({}).",
                start, end
            )));
        }

        let mut holidays = config.regular_holidays.holidays(start, end);
        holidays.extend(config.adhoc_holidays.iter().copied());
        let bus_days = BusinessDays::try_new(
            config.weekmask,
            config.special_weekmasks.clone(),
            holidays,
        )?;
        let sessions = bus_days.bus_date_range(start, end);
        if sessions.is_empty() {
            return Err(CalendarError::Range(format!(
                "calendar '{}' has no sessions between {} and {}.",
                config.name, start, end
            )));
        }

        let mut cols = self.regular_columns(sessions)?;
        let regular_opens = cols.opens.clone();
        let regular_closes = cols.closes.clone();

        for offset in config.special_offsets.iter() {
            self.apply_special_offset(&mut cols, offset, start, end)?;
        }
        let special_open_idx = self.apply_special_times(
            &mut cols,
            &config.special_opens,
            ScheduleColumn::Open,
            start,
            end,
        )?;
        let special_close_idx = self.apply_special_times(
            &mut cols,
            &config.special_closes,
            ScheduleColumn::Close,
            start,
            end,
        )?;
        for offset in config.special_offsets.iter().filter(|o| o.apply_to_special) {
            let specials = match offset.column {
                ScheduleColumn::Open => &special_open_idx,
                ScheduleColumn::Close => &special_close_idx,
                _ => continue,
            };
            for date in offset.rule.dates(start, end) {
                if let Some(idx) = cols.position(&date) {
                    if specials.contains(&idx) {
                        trace!(
                            %date,
                            column = %offset.column,
                            minutes = offset.minutes,
                            "re-applying offset to special time"
                        );
                        cols.apply_offset(idx, offset.column, offset.minutes);
                    }
                }
            }
        }

        remove_lapsed_breaks(&mut cols);

        let session_nanos: Vec<i64> = cols.sessions.iter().map(date_to_nanos).collect();
        let late_opens: Vec<i64> = (0..session_nanos.len())
            .filter(|i| cols.opens[*i] > regular_opens[*i])
            .map(|i| session_nanos[i])
            .collect();
        let early_closes: Vec<i64> = (0..session_nanos.len())
            .filter(|i| cols.closes[*i] < regular_closes[*i])
            .map(|i| session_nanos[i])
            .collect();

        debug!(
            calendar = %config.name,
            %start,
            %end,
            sessions = session_nanos.len(),
            late_opens = late_opens.len(),
            early_closes = early_closes.len(),
            "built schedule"
        );
        Schedule::try_new(
            session_nanos,
            cols.opens,
            cols.break_starts,
            cols.break_ends,
            cols.closes,
        )
        .map(|s| s.with_deviations(late_opens, early_closes))
    }

    fn localize(
        &self,
        times: &DatedTimes,
        session: &NaiveDate,
        day_offset: i64,
    ) -> Result<i64, CalendarError> {
        let time = times.time_for(session).ok_or_else(|| {
            CalendarError::Configuration(format!("no time defined for session {}.", session))
        })?;
        let local_date = shift_days(session, day_offset)?;
        local_to_utc_nanos(&self.config.tz, &local_date, &time)
    }

    fn regular_columns(&self, sessions: Vec<NaiveDate>) -> Result<Columns, CalendarError> {
        let config = self.config;
        let opens = sessions
            .iter()
            .map(|s| self.localize(&config.open_times, s, config.open_offset))
            .collect::<Result<Vec<_>, _>>()?;
        let closes = sessions
            .iter()
            .map(|s| self.localize(&config.close_times, s, config.close_offset))
            .collect::<Result<Vec<_>, _>>()?;
        let (break_starts, break_ends) = match (&config.break_start_times, &config.break_end_times)
        {
            (Some(bs), Some(be)) => {
                let starts = sessions
                    .iter()
                    .map(|s| self.localize(bs, s, 0).map(Some))
                    .collect::<Result<Vec<_>, _>>()?;
                let ends = sessions
                    .iter()
                    .map(|s| self.localize(be, s, 0).map(Some))
                    .collect::<Result<Vec<_>, _>>()?;
                (starts, ends)
            }
            _ => (vec![None; sessions.len()], vec![None; sessions.len()]),
        };
        Ok(Columns {
            sessions,
            opens,
            break_starts,
            break_ends,
            closes,
        })
    }

    fn apply_special_offset(
        &self,
        cols: &mut Columns,
        offset: &SpecialOffset,
        start: &NaiveDate,
        end: &NaiveDate,
    ) -> Result<(), CalendarError> {
        let mut missing: Vec<NaiveDate> = vec![];
        for date in offset.rule.dates(start, end) {
            match cols.position(&date) {
                Some(idx) => {
                    trace!(
                        %date,
                        column = %offset.column,
                        minutes = offset.minutes,
                        "applying special offset"
                    );
                    cols.apply_offset(idx, offset.column, offset.minutes);
                }
                None if offset.rule.skips_non_sessions() => {}
                None => missing.push(date),
            }
        }
        if missing.is_empty() {
            return Ok(());
        }
        let listed = missing
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        if self.tolerant_offsets {
            warn!(
                calendar = %self.config.name,
                column = %offset.column,
                dates = %listed,
                "dropping special offset dates that are not sessions"
            );
            Ok(())
        } else {
            Err(CalendarError::Configuration(format!(
                "special offset of {} minutes to `{}` of calendar '{}' falls on dates that are \
                 not sessions: {}.",
                offset.minutes, offset.column, self.config.name, listed
            )))
        }
    }

    // Returns the positions of the sessions that received a special time.
    fn apply_special_times(
        &self,
        cols: &mut Columns,
        specials: &[SpecialTime],
        column: ScheduleColumn,
        start: &NaiveDate,
        end: &NaiveDate,
    ) -> Result<Vec<usize>, CalendarError> {
        let day_offset = match column {
            ScheduleColumn::Open => self.config.open_offset,
            _ => self.config.close_offset,
        };
        let mut applied: Vec<usize> = vec![];
        for special in specials.iter() {
            for date in special.rule.dates(start, end) {
                let Some(idx) = cols.position(&date) else {
                    continue;
                };
                let local_date = shift_days(&date, day_offset)?;
                let value = local_to_utc_nanos(&self.config.tz, &local_date, &special.time)?;
                trace!(%date, %column, time = %special.time, "applying special time");
                match column {
                    ScheduleColumn::Open => cols.opens[idx] = value,
                    _ => cols.closes[idx] = value,
                }
                applied.push(idx);
            }
        }
        applied.sort_unstable();
        applied.dedup();
        Ok(applied)
    }
}

// A session closing at or before the break end, or opening at or after the break start, has no
// break.
fn remove_lapsed_breaks(cols: &mut Columns) {
    for i in 0..cols.sessions.len() {
        if let (Some(bs), Some(be)) = (cols.break_starts[i], cols.break_ends[i]) {
            if cols.closes[i] <= be || cols.opens[i] >= bs {
                trace!(session = %cols.sessions[i], "removing break");
                cols.break_starts[i] = None;
                cols.break_ends[i] = None;
            }
        }
    }
}

// UNIT TESTS
#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduling::config::DateRule;
    use crate::scheduling::holidays::{HolidayCalendar, HolidayRule, Observance};
    use crate::scheduling::weekmask::{SpecialWeekmask, Weekmask};
    use crate::scheduling::{nd, utc};
    use chrono_tz::Tz;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn fixture_ny_config() -> CalendarConfig {
        CalendarConfig::new("XTST", Tz::America__New_York, t(9, 30), t(16, 0))
            .with_regular_holidays(HolidayCalendar::new(vec![HolidayRule::new(
                "New Year's Day",
                1,
                1,
            )
            .with_observance(Observance::SundayToMonday)]))
            .with_adhoc_holidays(vec![nd(2021, 1, 6)])
    }

    fn fixture_break_config() -> CalendarConfig {
        CalendarConfig::new("XBRK", Tz::Asia__Shanghai, t(9, 30), t(15, 0))
            .with_break(t(11, 30), t(13, 0))
    }

    #[test]
    fn test_regular_sessions_and_times() {
        let config = fixture_ny_config();
        let sched = ScheduleBuilder::new(&config)
            .build(&nd(2020, 12, 31), &nd(2021, 1, 8))
            .unwrap();
        assert_eq!(
            sched.sessions(),
            vec![
                nd(2020, 12, 31),
                nd(2021, 1, 4),
                nd(2021, 1, 5),
                nd(2021, 1, 7),
                nd(2021, 1, 8)
            ]
        );
        assert_eq!(sched.opens()[1], utc(2021, 1, 4, 14, 30));
        assert_eq!(sched.closes()[1], utc(2021, 1, 4, 21, 0));
        assert!(!sched.has_breaks());
    }

    #[test]
    fn test_dst_transition() {
        let config = fixture_ny_config();
        let sched = ScheduleBuilder::new(&config)
            .build(&nd(2021, 3, 12), &nd(2021, 3, 15))
            .unwrap();
        assert_eq!(sched.opens()[0], utc(2021, 3, 12, 14, 30));
        assert_eq!(sched.opens()[1], utc(2021, 3, 15, 13, 30));
    }

    #[test]
    fn test_dated_times() {
        let config = fixture_ny_config().with_open_times(
            DatedTimes::fixed(t(10, 0)).then(nd(2021, 1, 7), t(9, 30)),
        );
        let sched = ScheduleBuilder::new(&config)
            .build(&nd(2021, 1, 4), &nd(2021, 1, 8))
            .unwrap();
        assert_eq!(sched.opens()[0], utc(2021, 1, 4, 15, 0));
        assert_eq!(sched.opens()[3], utc(2021, 1, 8, 14, 30));
    }

    #[test]
    fn test_open_offset_previous_evening() {
        let config = CalendarConfig::new("XEVE", Tz::UTC, t(22, 0), t(21, 0)).with_offsets(-1, 0);
        let sched = ScheduleBuilder::new(&config)
            .build(&nd(2021, 1, 4), &nd(2021, 1, 5))
            .unwrap();
        assert_eq!(sched.opens()[0], utc(2021, 1, 3, 22, 0));
        assert_eq!(sched.closes()[0], utc(2021, 1, 4, 21, 0));
    }

    #[test]
    fn test_special_weekmask() {
        let config = fixture_ny_config().with_special_weekmask(SpecialWeekmask {
            start: nd(2021, 1, 9),
            end: nd(2021, 1, 9),
            weekmask: Weekmask::try_new("1111110").unwrap(),
        });
        let sched = ScheduleBuilder::new(&config)
            .build(&nd(2021, 1, 8), &nd(2021, 1, 16))
            .unwrap();
        assert!(sched.sessions().contains(&nd(2021, 1, 9)));
        assert!(!sched.sessions().contains(&nd(2021, 1, 16)));
    }

    #[test]
    fn test_special_close_and_early_closes() {
        let config = fixture_ny_config()
            .with_special_close(SpecialTime {
                time: t(13, 0),
                rule: DateRule::AdHoc(vec![nd(2021, 1, 5), nd(2021, 1, 9)]),
            })
            .with_special_close(SpecialTime {
                time: t(14, 0),
                rule: DateRule::AdHoc(vec![nd(2021, 1, 5)]),
            });
        let sched = ScheduleBuilder::new(&config)
            .build(&nd(2021, 1, 4), &nd(2021, 1, 8))
            .unwrap();
        // later entries take precedence, non-session dates ignored
        assert_eq!(sched.closes()[1], utc(2021, 1, 5, 19, 0));
        assert_eq!(sched.early_closes(), vec![nd(2021, 1, 5)]);
        assert!(sched.late_opens().is_empty());
    }

    #[test]
    fn test_special_offset() {
        let config = fixture_ny_config().with_special_offset(SpecialOffset {
            minutes: 60,
            rule: DateRule::AdHoc(vec![nd(2021, 1, 4)]),
            column: ScheduleColumn::Open,
            apply_to_special: false,
        });
        let sched = ScheduleBuilder::new(&config)
            .build(&nd(2021, 1, 4), &nd(2021, 1, 8))
            .unwrap();
        assert_eq!(sched.opens()[0], utc(2021, 1, 4, 15, 30));
        assert_eq!(sched.late_opens(), vec![nd(2021, 1, 4)]);
    }

    #[test]
    fn test_special_offset_on_non_session() {
        let config = fixture_ny_config().with_special_offset(SpecialOffset {
            minutes: 60,
            rule: DateRule::AdHoc(vec![nd(2021, 1, 4), nd(2021, 1, 6)]),
            column: ScheduleColumn::Open,
            apply_to_special: false,
        });
        let strict = ScheduleBuilder::new(&config).build(&nd(2021, 1, 4), &nd(2021, 1, 8));
        match strict {
            Err(CalendarError::Configuration(msg)) => assert!(msg.contains("2021-01-06")),
            _ => panic!("expected configuration error"),
        }
        let tolerant = ScheduleBuilder::new(&config)
            .tolerant_offsets(true)
            .build(&nd(2021, 1, 4), &nd(2021, 1, 8))
            .unwrap();
        assert_eq!(tolerant.opens()[0], utc(2021, 1, 4, 15, 30));
    }

    #[test]
    fn test_offset_reapplied_to_special() {
        let special = SpecialTime {
            time: t(10, 0),
            rule: DateRule::AdHoc(vec![nd(2021, 1, 4)]),
        };
        let offset = |apply_to_special| SpecialOffset {
            minutes: 15,
            rule: DateRule::AdHoc(vec![nd(2021, 1, 4)]),
            column: ScheduleColumn::Open,
            apply_to_special,
        };
        let config = fixture_ny_config()
            .with_special_open(special.clone())
            .with_special_offset(offset(false));
        let sched = ScheduleBuilder::new(&config)
            .build(&nd(2021, 1, 4), &nd(2021, 1, 5))
            .unwrap();
        assert_eq!(sched.opens()[0], utc(2021, 1, 4, 15, 0));
        let config = fixture_ny_config()
            .with_special_open(special)
            .with_special_offset(offset(true));
        let sched = ScheduleBuilder::new(&config)
            .build(&nd(2021, 1, 4), &nd(2021, 1, 5))
            .unwrap();
        assert_eq!(sched.opens()[0], utc(2021, 1, 4, 15, 15));
    }

    #[test]
    fn test_breaks_and_half_day_removes_break() {
        let config = fixture_break_config().with_special_close(SpecialTime {
            time: t(12, 0),
            rule: DateRule::AdHoc(vec![nd(2021, 1, 5)]),
        });
        let sched = ScheduleBuilder::new(&config)
            .build(&nd(2021, 1, 4), &nd(2021, 1, 6))
            .unwrap();
        assert_eq!(sched.break_starts()[0], Some(utc(2021, 1, 4, 3, 30)));
        assert_eq!(sched.break_ends()[0], Some(utc(2021, 1, 4, 5, 0)));
        assert_eq!(sched.break_starts()[1], None);
        assert_eq!(sched.break_ends()[1], None);
        assert_eq!(sched.closes()[1], utc(2021, 1, 5, 4, 0));
    }

    #[test]
    fn test_late_open_after_break_start_removes_break() {
        let config = fixture_break_config().with_special_open(SpecialTime {
            time: t(13, 0),
            rule: DateRule::AdHoc(vec![nd(2021, 1, 5)]),
        });
        let sched = ScheduleBuilder::new(&config)
            .build(&nd(2021, 1, 4), &nd(2021, 1, 6))
            .unwrap();
        assert_eq!(sched.break_starts()[1], None);
        assert_eq!(sched.late_opens(), vec![nd(2021, 1, 5)]);
    }

    #[test]
    fn test_weekday_rule_skips_non_sessions() {
        let config = fixture_ny_config().with_special_offset(SpecialOffset {
            minutes: -30,
            rule: DateRule::Weekday(Weekday::Wed),
            column: ScheduleColumn::Close,
            apply_to_special: false,
        });
        // 2021-01-06 is a Wednesday ad hoc holiday
        let sched = ScheduleBuilder::new(&config)
            .build(&nd(2021, 1, 4), &nd(2021, 1, 15))
            .unwrap();
        assert_eq!(sched.early_closes(), vec![nd(2021, 1, 13)]);
    }

    #[test]
    fn test_no_sessions_raises() {
        let config = fixture_ny_config();
        let result = ScheduleBuilder::new(&config).build(&nd(2021, 1, 9), &nd(2021, 1, 10));
        assert!(matches!(result, Err(CalendarError::Range(_))));
        let result = ScheduleBuilder::new(&config).build(&nd(2021, 1, 10), &nd(2021, 1, 9));
        assert!(result.is_err());
    }
}
