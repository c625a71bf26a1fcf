//! Register calendar configurations by name and share the calendars built from them.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use crate::calendar::ExchangeCalendar;
use crate::errors::CalendarError;
use crate::parsing::{parse_date, TimestampInput};
use crate::scheduling::{CalendarConfig, Side};

type CacheKey = (String, NaiveDate, NaiveDate, Side);

// Names are case-insensitive and ignore surrounding whitespace.
fn normalize_name(name: &str) -> String {
    name.trim().to_uppercase()
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// A registry of calendar configurations, aliases and constructed calendars.
///
/// Calendars are constructed on first request and shared for subsequent requests of the same
/// name, date range and side.
///
/// ### Example
/// ```rust
/// # use trading_calendars::calendar::CalendarRegistry;
/// # use trading_calendars::scheduling::{CalendarConfig, Side};
/// # use chrono::NaiveTime;
/// let registry = CalendarRegistry::new();
/// let config = CalendarConfig::new(
///     "XNYS",
///     chrono_tz::Tz::America__New_York,
///     NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
///     NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
/// );
/// registry.register(config, false).unwrap();
/// registry.register_alias("NYSE", "XNYS", false).unwrap();
/// let cal = registry.get_calendar("nyse", "2021-01-04", "2021-01-29", Side::Left).unwrap();
/// assert_eq!(cal.name(), "XNYS");
/// ```
#[derive(Debug, Default)]
pub struct CalendarRegistry {
    configs: RwLock<HashMap<String, Arc<CalendarConfig>>>,
    aliases: RwLock<HashMap<String, String>>,
    cache: RwLock<HashMap<CacheKey, Arc<ExchangeCalendar>>>,
}

impl CalendarRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a calendar configuration under its name.
    ///
    /// An existing registration of the same name is replaced only if `force`, in which case
    /// calendars cached from the replaced configuration are dropped.
    pub fn register(&self, mut config: CalendarConfig, force: bool) -> Result<(), CalendarError> {
        config.validate()?;
        let name = normalize_name(&config.name);
        config.name = name.clone();
        if read(&self.aliases).contains_key(&name) {
            return Err(CalendarError::Registry(format!(
                "'{}' is already registered as an alias and cannot be the name of a calendar.",
                name
            )));
        }
        let mut configs = write(&self.configs);
        if configs.contains_key(&name) {
            if !force {
                return Err(CalendarError::Registry(format!(
                    "a calendar named '{}' is already registered. Use `force` to overwrite.",
                    name
                )));
            }
            self.clear_cache(&name);
        }
        debug!(calendar = %name, "registered calendar");
        configs.insert(name, Arc::new(config));
        Ok(())
    }

    /// Register `alias` as another name for the calendar `target`.
    ///
    /// `target` may itself be an alias. An existing alias is replaced only if `force`.
    pub fn register_alias(
        &self,
        alias: &str,
        target: &str,
        force: bool,
    ) -> Result<(), CalendarError> {
        let alias = normalize_name(alias);
        let target = normalize_name(target);
        if read(&self.configs).contains_key(&alias) {
            return Err(CalendarError::Registry(format!(
                "'{}' is the name of a registered calendar and cannot be an alias.",
                alias
            )));
        }
        let mut aliases = write(&self.aliases);
        if aliases.contains_key(&alias) && !force {
            return Err(CalendarError::Registry(format!(
                "alias '{}' is already registered. Use `force` to overwrite.",
                alias
            )));
        }
        let mut current = target.clone();
        while let Some(next) = aliases.get(&current) {
            if *next == alias || current == alias {
                return Err(CalendarError::Registry(format!(
                    "aliasing '{}' to '{}' would create a cycle.",
                    alias, target
                )));
            }
            current = next.clone();
        }
        if current == alias {
            return Err(CalendarError::Registry(format!(
                "aliasing '{}' to '{}' would create a cycle.",
                alias, target
            )));
        }
        if !read(&self.configs).contains_key(&current) {
            return Err(CalendarError::Registry(format!(
                "cannot alias '{}' to '{}' which is not a registered calendar.",
                alias, target
            )));
        }
        aliases.insert(alias, target);
        Ok(())
    }

    /// Return the name of the calendar that `name` refers to, following aliases.
    pub fn resolve_alias(&self, name: &str) -> Result<String, CalendarError> {
        let aliases = read(&self.aliases);
        let mut current = normalize_name(name);
        for _ in 0..=aliases.len() {
            match aliases.get(&current) {
                Some(next) => current = next.clone(),
                None => break,
            }
        }
        match read(&self.configs).contains_key(&current) {
            true => Ok(current),
            false => Err(CalendarError::Registry(format!(
                "'{}' is not a registered calendar or alias.",
                normalize_name(name)
            ))),
        }
    }

    /// Names of registered calendars, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = read(&self.configs).keys().cloned().collect();
        names.sort();
        names
    }

    /// Registered aliases with their targets, sorted by alias.
    pub fn aliases(&self) -> Vec<(String, String)> {
        let mut aliases: Vec<(String, String)> = read(&self.aliases)
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        aliases.sort();
        aliases
    }

    /// Returns whether `name` is a registered calendar or an alias of one.
    pub fn has(&self, name: &str) -> bool {
        self.resolve_alias(name).is_ok()
    }

    /// Remove a calendar or an alias.
    ///
    /// Removing a calendar also removes every alias that refers to it, and drops its cached
    /// calendars.
    pub fn deregister(&self, name: &str) -> Result<(), CalendarError> {
        let name = normalize_name(name);
        if write(&self.aliases).remove(&name).is_some() {
            return Ok(());
        }
        if write(&self.configs).remove(&name).is_none() {
            return Err(CalendarError::Registry(format!(
                "'{}' is not a registered calendar or alias.",
                name
            )));
        }
        self.clear_cache(&name);
        let remaining: Vec<String> = read(&self.aliases).keys().cloned().collect();
        let orphaned: Vec<String> = remaining
            .into_iter()
            .filter(|alias| self.resolve_alias(alias).is_err())
            .collect();
        let mut aliases = write(&self.aliases);
        for alias in orphaned {
            aliases.remove(&alias);
        }
        debug!(calendar = %name, "deregistered calendar");
        Ok(())
    }

    /// Return the calendar `name` over `start` to `end`, constructing it on first request.
    pub fn get_calendar(
        &self,
        name: &str,
        start: impl Into<TimestampInput>,
        end: impl Into<TimestampInput>,
        side: Side,
    ) -> Result<Arc<ExchangeCalendar>, CalendarError> {
        let name = self.resolve_alias(name)?;
        let start = parse_date(start, "start")?;
        let end = parse_date(end, "end")?;
        let key: CacheKey = (name.clone(), start, end, side);
        if let Some(calendar) = read(&self.cache).get(&key) {
            return Ok(Arc::clone(calendar));
        }
        let config = read(&self.configs)
            .get(&name)
            .cloned()
            .ok_or_else(|| CalendarError::Registry(format!("'{}' is not registered.", name)))?;
        let calendar = Arc::new(ExchangeCalendar::try_new(&config, start, end, side)?);
        debug!(calendar = %name, %start, %end, %side, "cached calendar");
        let mut cache = write(&self.cache);
        Ok(Arc::clone(cache.entry(key).or_insert(calendar)))
    }

    fn clear_cache(&self, name: &str) {
        write(&self.cache).retain(|(cached, ..), _| cached != name);
    }
}
