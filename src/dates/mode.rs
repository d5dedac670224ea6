use super::parse::singapore;
use crate::errors::{AppError, AppResult};
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Weekday};
use std::fmt;
use std::str::FromStr;

/// A named date range used to filter collected records by publish date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateMode {
    /// Rolling 24 hours.
    Today,
    Last24Hours,
    Yesterday,
    Last3Days,
    Last7Days,
    Last14Days,
    Last31Days,
    Last90Days,
    Last365Days,
    /// From Monday of the current week.
    ThisWeek,
    /// From the previous working day through the end of today.
    LastWorkingDay,
    SpecificDate(NaiveDate),
    Custom {
        start: NaiveDate,
        end: Option<NaiveDate>,
    },
    All,
}

/// Inclusive bounds of a date mode. `None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: Option<DateTime<FixedOffset>>,
    pub end: Option<DateTime<FixedOffset>>,
}

impl DateWindow {
    pub const UNBOUNDED: DateWindow = DateWindow {
        start: None,
        end: None,
    };

    /// Whether `instant` falls inside the window.
    pub fn contains(&self, instant: DateTime<FixedOffset>) -> bool {
        if let Some(start) = self.start {
            if instant < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if instant > end {
                return false;
            }
        }
        true
    }

    /// Whether `day` (taken at 00:00 Singapore time) falls inside the window.
    pub fn contains_day(&self, day: NaiveDate) -> bool {
        match start_of_day(day) {
            Some(instant) => self.contains(instant),
            None => false,
        }
    }
}

impl DateMode {
    /// Snake-case name used on the command line and in run files.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Last24Hours => "last_24_hours",
            Self::Yesterday => "yesterday",
            Self::Last3Days => "last_3_days",
            Self::Last7Days => "last_7_days",
            Self::Last14Days => "last_14_days",
            Self::Last31Days => "last_31_days",
            Self::Last90Days => "last_90_days",
            Self::Last365Days => "last_365_days",
            Self::ThisWeek => "this_week",
            Self::LastWorkingDay => "last_working_day",
            Self::SpecificDate(_) => "specific_date",
            Self::Custom { .. } => "custom",
            Self::All => "all",
        }
    }

    /// Resolves a mode name together with optional `YYYY-MM-DD` bounds.
    ///
    /// `specific_date` becomes a one-day custom range. A start date given with
    /// any other name turns the run into a custom range, except for the
    /// rolling presets (`today`, `last_working_day` and `last_N_days` from 7 up).
    pub fn resolve(name: &str, start: Option<&str>, end: Option<&str>) -> AppResult<Self> {
        let start = start.map(parse_bound).transpose()?;
        let end = end.map(parse_bound).transpose()?;
        let name = name.trim().to_lowercase();

        match name.as_str() {
            "specific_date" => {
                let day = start.ok_or_else(|| {
                    AppError::DateError("specific_date requires a start date".into())
                })?;
                Ok(Self::Custom {
                    start: day,
                    end: Some(day),
                })
            }
            "custom" => {
                let start = start
                    .ok_or_else(|| AppError::DateError("custom requires a start date".into()))?;
                Self::custom(start, end)
            }
            _ => match (name.parse::<DateMode>(), start) {
                (Ok(mode), Some(_)) if mode.keeps_preset_with_bounds() => Ok(mode),
                (Ok(mode), None) => Ok(mode),
                (_, Some(start)) => Self::custom(start, end),
                (Err(e), None) => Err(e),
            },
        }
    }

    /// Presets that stay presets when explicit bounds are also given.
    fn keeps_preset_with_bounds(&self) -> bool {
        matches!(
            self,
            Self::LastWorkingDay
                | Self::Today
                | Self::Last7Days
                | Self::Last14Days
                | Self::Last31Days
                | Self::Last90Days
                | Self::Last365Days
        )
    }

    fn custom(start: NaiveDate, end: Option<NaiveDate>) -> AppResult<Self> {
        if let Some(end) = end {
            if end < start {
                return Err(AppError::DateError(format!(
                    "End date {end} is before start date {start}"
                )));
            }
        }
        Ok(Self::Custom { start, end })
    }

    /// Computes the window bounds relative to `now` (Singapore time).
    pub fn window(&self, now: DateTime<FixedOffset>) -> DateWindow {
        let today = now.date_naive();
        let today_start = start_of_day(today);
        let days_back = |days: i64| start_of_day(today - Duration::days(days));

        match self {
            Self::Today | Self::Last24Hours => DateWindow {
                start: Some(now - Duration::hours(24)),
                end: None,
            },
            Self::Yesterday => DateWindow {
                start: days_back(1),
                end: today_start.map(|t| t - Duration::seconds(1)),
            },
            Self::Last3Days => open_from(days_back(3)),
            Self::Last7Days => open_from(days_back(7)),
            Self::Last14Days => open_from(days_back(14)),
            Self::Last31Days => open_from(days_back(31)),
            Self::Last90Days => open_from(days_back(90)),
            Self::Last365Days => open_from(days_back(365)),
            Self::ThisWeek => {
                open_from(days_back(i64::from(today.weekday().num_days_from_monday())))
            }
            Self::LastWorkingDay => {
                let back = match today.weekday() {
                    Weekday::Mon => 3,
                    Weekday::Sun => 2,
                    _ => 1,
                };
                DateWindow {
                    start: days_back(back),
                    end: end_of_day(today),
                }
            }
            Self::SpecificDate(day) => DateWindow {
                start: start_of_day(*day),
                end: end_of_day(*day),
            },
            Self::Custom { start, end } => DateWindow {
                start: start_of_day(*start),
                end: end.and_then(end_of_day),
            },
            Self::All => DateWindow::UNBOUNDED,
        }
    }

    /// First and last calendar day covered by the mode, used to name exports.
    /// Open bounds fall back to `now`'s date.
    pub fn export_range(&self, now: DateTime<FixedOffset>) -> (NaiveDate, NaiveDate) {
        let today = now.date_naive();
        let window = self.window(now);
        let start = window
            .start
            .map(|s| s.with_timezone(&singapore()).date_naive())
            .unwrap_or(today);
        let end = window
            .end
            .map(|e| e.with_timezone(&singapore()).date_naive())
            .unwrap_or(today);
        (start, end)
    }
}

impl FromStr for DateMode {
    type Err = AppError;

    fn from_str(value: &str) -> AppResult<Self> {
        match value.trim().to_lowercase().replace('-', "_").as_str() {
            "today" => Ok(Self::Today),
            "last_24_hours" | "24h" => Ok(Self::Last24Hours),
            "yesterday" => Ok(Self::Yesterday),
            "last_3_days" => Ok(Self::Last3Days),
            "last_7_days" => Ok(Self::Last7Days),
            "last_14_days" => Ok(Self::Last14Days),
            "last_31_days" => Ok(Self::Last31Days),
            "last_90_days" => Ok(Self::Last90Days),
            "last_365_days" => Ok(Self::Last365Days),
            "this_week" => Ok(Self::ThisWeek),
            "last_working_day" => Ok(Self::LastWorkingDay),
            "all" => Ok(Self::All),
            other => Err(AppError::DateError(format!("Unknown date mode '{other}'"))),
        }
    }
}

impl fmt::Display for DateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpecificDate(day) => write!(f, "specific_date ({day})"),
            Self::Custom {
                start,
                end: Some(end),
            } => write!(f, "custom ({start} to {end})"),
            Self::Custom { start, end: None } => write!(f, "custom (from {start})"),
            other => f.write_str(other.name()),
        }
    }
}

fn open_from(start: Option<DateTime<FixedOffset>>) -> DateWindow {
    DateWindow { start, end: None }
}

fn parse_bound(value: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| AppError::DateError(format!("'{value}' is not a YYYY-MM-DD date: {e}")))
}

/// 00:00:00 of `day` in Singapore time.
pub fn start_of_day(day: NaiveDate) -> Option<DateTime<FixedOffset>> {
    singapore()
        .from_local_datetime(&day.and_time(NaiveTime::MIN))
        .single()
}

/// 23:59:59.999 of `day` in Singapore time.
pub fn end_of_day(day: NaiveDate) -> Option<DateTime<FixedOffset>> {
    let last = NaiveTime::from_hms_milli_opt(23, 59, 59, 999)?;
    singapore().from_local_datetime(&day.and_time(last)).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<FixedOffset> {
        singapore()
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .single()
            .unwrap()
    }

    #[test]
    fn today_is_a_rolling_day() {
        let now = at(2025, 3, 12, 15, 30);
        let window = DateMode::Today.window(now);
        assert_eq!(window.start, Some(at(2025, 3, 11, 15, 30)));
        assert_eq!(window.end, None);
    }

    #[test]
    fn yesterday_ends_one_second_before_midnight() {
        let now = at(2025, 3, 12, 9, 0);
        let window = DateMode::Yesterday.window(now);
        assert_eq!(window.start, start_of_day(day(2025, 3, 11)));
        assert!(window.contains_day(day(2025, 3, 11)));
        assert!(!window.contains_day(day(2025, 3, 12)));
    }

    #[test]
    fn last_n_days_counts_from_midnight() {
        let now = at(2025, 3, 12, 9, 0);
        let window = DateMode::Last7Days.window(now);
        assert_eq!(window.start, start_of_day(day(2025, 3, 5)));
        assert!(window.contains_day(day(2025, 3, 5)));
        assert!(!window.contains_day(day(2025, 3, 4)));
    }

    #[test]
    fn this_week_starts_on_monday() {
        // 2025-03-13 is a Thursday
        let now = at(2025, 3, 13, 9, 0);
        let window = DateMode::ThisWeek.window(now);
        assert_eq!(window.start, start_of_day(day(2025, 3, 10)));
    }

    #[test]
    fn last_working_day_skips_the_weekend() {
        // Monday reaches back to Friday
        let monday = at(2025, 3, 10, 9, 0);
        let window = DateMode::LastWorkingDay.window(monday);
        assert_eq!(window.start, start_of_day(day(2025, 3, 7)));
        assert_eq!(window.end, end_of_day(day(2025, 3, 10)));

        let sunday = at(2025, 3, 9, 9, 0);
        assert_eq!(
            DateMode::LastWorkingDay.window(sunday).start,
            start_of_day(day(2025, 3, 7))
        );

        let wednesday = at(2025, 3, 12, 9, 0);
        assert_eq!(
            DateMode::LastWorkingDay.window(wednesday).start,
            start_of_day(day(2025, 3, 11))
        );
    }

    #[test]
    fn all_is_unbounded() {
        let window = DateMode::All.window(at(2025, 1, 1, 0, 0));
        assert_eq!(window, DateWindow::UNBOUNDED);
        assert!(window.contains_day(day(1999, 1, 1)));
    }

    #[test]
    fn resolve_specific_date_becomes_single_day_range() {
        let mode = DateMode::resolve("specific_date", Some("2025-02-03"), None).unwrap();
        assert_eq!(
            mode,
            DateMode::Custom {
                start: day(2025, 2, 3),
                end: Some(day(2025, 2, 3))
            }
        );
    }

    #[test]
    fn resolve_unknown_mode_with_start_becomes_custom() {
        let mode = DateMode::resolve("range", Some("2025-02-01"), Some("2025-02-10")).unwrap();
        assert_eq!(
            mode,
            DateMode::Custom {
                start: day(2025, 2, 1),
                end: Some(day(2025, 2, 10))
            }
        );
        assert!(DateMode::resolve("range", None, None).is_err());
    }

    #[test]
    fn resolve_rolling_preset_ignores_bounds() {
        let mode = DateMode::resolve("last-14-days", Some("2025-02-01"), None).unwrap();
        assert_eq!(mode, DateMode::Last14Days);
        let mode = DateMode::resolve("last_working_day", Some("2025-02-01"), None).unwrap();
        assert_eq!(mode, DateMode::LastWorkingDay);
    }

    #[test]
    fn resolve_other_modes_with_start_become_custom() {
        let mode = DateMode::resolve("yesterday", Some("2025-02-01"), Some("2025-02-03")).unwrap();
        assert_eq!(
            mode,
            DateMode::Custom {
                start: day(2025, 2, 1),
                end: Some(day(2025, 2, 3))
            }
        );
        for name in ["all", "last_3_days", "this_week", "last_24_hours"] {
            assert_eq!(
                DateMode::resolve(name, Some("2025-02-01"), None).unwrap(),
                DateMode::Custom {
                    start: day(2025, 2, 1),
                    end: None
                },
                "{name}"
            );
        }
        assert_eq!(DateMode::resolve("all", None, None).unwrap(), DateMode::All);
    }

    #[test]
    fn resolve_rejects_reversed_and_malformed_bounds() {
        assert!(DateMode::resolve("custom", Some("2025-02-10"), Some("2025-02-01")).is_err());
        assert!(DateMode::resolve("custom", Some("10/02/2025"), None).is_err());
        assert!(DateMode::resolve("custom", None, None).is_err());
    }

    #[test]
    fn export_range_uses_window_or_today() {
        let now = at(2025, 3, 12, 9, 0);
        assert_eq!(
            DateMode::Last7Days.export_range(now),
            (day(2025, 3, 5), day(2025, 3, 12))
        );
        assert_eq!(
            DateMode::Yesterday.export_range(now),
            (day(2025, 3, 11), day(2025, 3, 11))
        );
        assert_eq!(
            DateMode::All.export_range(now),
            (day(2025, 3, 12), day(2025, 3, 12))
        );
    }

    #[test]
    fn display_includes_custom_bounds() {
        let mode = DateMode::Custom {
            start: day(2025, 1, 1),
            end: Some(day(2025, 1, 31)),
        };
        assert_eq!(mode.to_string(), "custom (2025-01-01 to 2025-01-31)");
        assert_eq!(DateMode::LastWorkingDay.to_string(), "last_working_day");
    }
}
