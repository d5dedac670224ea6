use crate::constants::SINGAPORE_OFFSET_SECS;
use crate::utils::cached_regex;
use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use regex::{Captures, Regex};
use std::sync::OnceLock;

static WEEKDAY_PREFIX: OnceLock<Regex> = OnceLock::new();
static ORDINAL_SUFFIX: OnceLock<Regex> = OnceLock::new();
static YEAR_FIRST: OnceLock<Regex> = OnceLock::new();
static NUMERIC_DMY: OnceLock<Regex> = OnceLock::new();
static TEXTUAL_DMY: OnceLock<Regex> = OnceLock::new();
static TEXTUAL_MDY: OnceLock<Regex> = OnceLock::new();
static TIME_PREFIX: OnceLock<Regex> = OnceLock::new();
static OFFSET_PREFIX: OnceLock<Regex> = OnceLock::new();
static ZONE_NAME_PREFIX: OnceLock<Regex> = OnceLock::new();
static DAY_MONTH: OnceLock<Regex> = OnceLock::new();

const WEEKDAY_PREFIX_PATTERN: &str = r"(?i)^(?:monday|tuesday|wednesday|thursday|friday|saturday|sunday|mon|tues|tue|wed|thurs|thur|thu|fri|sat|sun)\.?,?\s+";
const ORDINAL_SUFFIX_PATTERN: &str = r"(?i)\b(\d{1,2})(?:st|nd|rd|th)\b";
const YEAR_FIRST_PATTERN: &str = r"\b(\d{4})[-/.](\d{1,2})[-/.](\d{1,2})";
const NUMERIC_DMY_PATTERN: &str = r"\b(\d{1,2})[-/.](\d{1,2})[-/.](\d{4}|\d{2})\b";
const TEXTUAL_DMY_PATTERN: &str = r"\b(\d{1,2})[\s\-/]+([A-Za-z]{3,9})\.?[\s\-/,]+(\d{4}|\d{2})\b";
const TEXTUAL_MDY_PATTERN: &str = r"\b([A-Za-z]{3,9})\.?\s+(\d{1,2}),?\s+(\d{4})\b";
const TIME_PREFIX_PATTERN: &str =
    r"(?i)^[\sT,]*(?:at\s+)?(\d{1,2})(?::(\d{2}))?(?::(\d{2})(?:\.\d+)?)?\s*(am|pm|a\.m\.|p\.m\.)?";
const OFFSET_PREFIX_PATTERN: &str = r"(?i)^\s*\(?(?:GMT|UTC)?\s*([+-])(\d{1,2}):?(\d{2})?\)?";
const ZONE_NAME_PREFIX_PATTERN: &str = r"(?i)^\s*\(?(Z|GMT|UTC|SGT)\)?\b";
const DAY_MONTH_PATTERN: &str = r"\b(\d{1,2})\s+([A-Za-z]{3})\b";

const MONTH_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Asia/Singapore as a fixed offset. Singapore observes no daylight saving.
pub fn singapore() -> FixedOffset {
    FixedOffset::east_opt(SINGAPORE_OFFSET_SECS).expect("UTC+08:00 is a valid offset")
}

/// Current wall-clock time in Singapore.
pub fn now_in_singapore() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&singapore())
}

/// Parses a free-form date string as found in feeds and portal pages.
///
/// Strings starting with a four-digit year are read year-first; everything else is
/// read day-first, falling back to month-first when the second field cannot be a
/// month. Values without an offset are taken as Singapore time.
pub fn parse_date(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt);
    }

    let cleaned = clean(value);
    let (date, end) = find_date(&cleaned, true)?;
    let (dt, rest) = attach_time_and_offset(date, &cleaned[end..])?;
    if rest.trim().is_empty() {
        Some(dt)
    } else {
        None
    }
}

/// Like [`parse_date`] but finds the first date anywhere in `text`, ignoring the
/// surrounding words.
pub fn parse_date_fuzzy(text: &str) -> Option<DateTime<FixedOffset>> {
    if let Some(dt) = parse_date(text) {
        return Some(dt);
    }
    let cleaned = clean(text);
    let (date, end) = find_date(&cleaned, false)?;
    attach_time_and_offset(date, &cleaned[end..])
        .map(|(dt, _)| dt)
        .or_else(|| localize(date.and_time(NaiveTime::MIN), singapore()))
}

/// Calendar date in Singapore time, or `None` when `value` is not a date.
pub fn parse_day(value: &str) -> Option<NaiveDate> {
    parse_date(value).map(|dt| dt.with_timezone(&singapore()).date_naive())
}

/// Returns `YYYY-MM-DD` in Singapore time, or the input unchanged when it cannot be
/// parsed. Empty input stays empty.
pub fn extract_date_only(value: &str) -> String {
    if value.trim().is_empty() {
        return String::new();
    }
    match parse_day(value) {
        Some(day) => day.format("%Y-%m-%d").to_string(),
        None => value.to_string(),
    }
}

/// How a missing year is inferred for "DD Mon" dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearBias {
    /// Publication dates: a date more than a week ahead belongs to last year.
    Past,
    /// Closing dates: a date more than 90 days behind belongs to next year.
    Future,
    /// Closing dates paired with a known start: never before the start.
    After(NaiveDate),
}

/// Parses dates that may lack a year, such as `"12 Jan"`.
///
/// Complete dates are parsed normally. For `"DD Mon"` the year is taken from
/// `today` (or from the start date for [`YearBias::After`]) and then adjusted
/// according to `bias`.
pub fn parse_partial_day_month(value: &str, today: NaiveDate, bias: YearBias) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Some(day) = parse_day(value) {
        return Some(day);
    }

    let re = cached_regex(&DAY_MONTH, DAY_MONTH_PATTERN);
    let caps = re.captures(value)?;
    let day: u32 = caps[1].parse().ok()?;
    let month = month_from_name(&caps[2])?;

    match bias {
        YearBias::After(start) => {
            let candidate = NaiveDate::from_ymd_opt(start.year(), month, day)?;
            if candidate < start {
                NaiveDate::from_ymd_opt(start.year() + 1, month, day)
            } else {
                Some(candidate)
            }
        }
        YearBias::Past => {
            let candidate = NaiveDate::from_ymd_opt(today.year(), month, day)?;
            if candidate > today + Duration::days(7) {
                NaiveDate::from_ymd_opt(today.year() - 1, month, day)
            } else {
                Some(candidate)
            }
        }
        YearBias::Future => {
            let candidate = NaiveDate::from_ymd_opt(today.year(), month, day)?;
            if candidate < today - Duration::days(90) {
                NaiveDate::from_ymd_opt(today.year() + 1, month, day)
            } else {
                Some(candidate)
            }
        }
    }
}

/// Reads an `HH:MM` time (with optional seconds and AM/PM) from the start of `text`.
pub fn parse_time(text: &str) -> Option<NaiveTime> {
    let (time, rest) = take_time(text)?;
    if rest.trim().is_empty() {
        Some(time)
    } else {
        None
    }
}

/// Returns the month number for an English month name or abbreviation.
pub fn month_from_name(name: &str) -> Option<u32> {
    let lower = name.trim_end_matches('.').to_lowercase();
    if lower.len() < 3 {
        return None;
    }
    if lower == "sept" {
        return Some(9);
    }
    MONTH_NAMES
        .iter()
        .position(|full| full.starts_with(&lower))
        .map(|idx| idx as u32 + 1)
}

fn clean(value: &str) -> String {
    let weekday = cached_regex(&WEEKDAY_PREFIX, WEEKDAY_PREFIX_PATTERN);
    let ordinal = cached_regex(&ORDINAL_SUFFIX, ORDINAL_SUFFIX_PATTERN);
    let collapsed = crate::utils::collapse_whitespace(value);
    let without_weekday = weekday.replace(&collapsed, "");
    ordinal.replace_all(&without_weekday, "$1").into_owned()
}

/// Locates a date in `text`. When `anchored`, the date must start the string.
/// Returns the date and the byte offset just past it.
fn find_date(text: &str, anchored: bool) -> Option<(NaiveDate, usize)> {
    let candidates: [(&Regex, fn(&Captures) -> Option<NaiveDate>); 4] = [
        (cached_regex(&YEAR_FIRST, YEAR_FIRST_PATTERN), year_first),
        (cached_regex(&NUMERIC_DMY, NUMERIC_DMY_PATTERN), numeric_day_first),
        (cached_regex(&TEXTUAL_DMY, TEXTUAL_DMY_PATTERN), textual_day_first),
        (cached_regex(&TEXTUAL_MDY, TEXTUAL_MDY_PATTERN), textual_month_first),
    ];

    let mut best: Option<(usize, NaiveDate, usize)> = None;
    for (re, build) in candidates {
        for caps in re.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            if anchored && whole.start() != 0 {
                break;
            }
            if let Some(date) = build(&caps) {
                if best.map_or(true, |(start, _, _)| whole.start() < start) {
                    best = Some((whole.start(), date, whole.end()));
                }
                break;
            }
        }
    }
    best.map(|(_, date, end)| (date, end))
}

fn year_first(caps: &Captures) -> Option<NaiveDate> {
    let year: i32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let day: u32 = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn numeric_day_first(caps: &Captures) -> Option<NaiveDate> {
    let first: u32 = caps[1].parse().ok()?;
    let second: u32 = caps[2].parse().ok()?;
    let year = expand_year(&caps[3])?;
    // Day-first unless the second field cannot be a month.
    let (day, month) = if first <= 12 && second > 12 {
        (second, first)
    } else {
        (first, second)
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

fn textual_day_first(caps: &Captures) -> Option<NaiveDate> {
    let day: u32 = caps[1].parse().ok()?;
    let month = month_from_name(&caps[2])?;
    let year = expand_year(&caps[3])?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn textual_month_first(caps: &Captures) -> Option<NaiveDate> {
    let month = month_from_name(&caps[1])?;
    let day: u32 = caps[2].parse().ok()?;
    let year: i32 = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn expand_year(text: &str) -> Option<i32> {
    let year: i32 = text.parse().ok()?;
    if text.len() == 2 {
        Some(2000 + year)
    } else {
        Some(year)
    }
}

/// Combines `date` with an optional leading time and offset in `rest`.
/// Returns the result and whatever text was not consumed.
fn attach_time_and_offset(date: NaiveDate, rest: &str) -> Option<(DateTime<FixedOffset>, &str)> {
    let (time, rest) = take_time(rest).unwrap_or((NaiveTime::MIN, rest));
    let (offset, rest) = take_offset(rest).unwrap_or((singapore(), rest));
    let dt = localize(date.and_time(time), offset)?;
    Some((dt, rest))
}

fn take_time(text: &str) -> Option<(NaiveTime, &str)> {
    let re = cached_regex(&TIME_PREFIX, TIME_PREFIX_PATTERN);
    let caps = re.captures(text)?;
    let minute_given = caps.get(2).is_some();
    let meridiem = caps.get(4).map(|m| m.as_str().to_lowercase());
    if !minute_given && meridiem.is_none() {
        return None;
    }

    let mut hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps.get(2).map_or(Some(0), |m| m.as_str().parse().ok())?;
    let second: u32 = caps.get(3).map_or(Some(0), |m| m.as_str().parse().ok())?;
    if let Some(meridiem) = meridiem {
        if hour == 0 || hour > 12 {
            return None;
        }
        let is_pm = meridiem.starts_with('p');
        hour = match (hour, is_pm) {
            (12, false) => 0,
            (12, true) => 12,
            (h, true) => h + 12,
            (h, false) => h,
        };
    }
    let time = NaiveTime::from_hms_opt(hour, minute, second)?;
    let end = caps.get(0).map_or(0, |m| m.end());
    Some((time, &text[end..]))
}

fn take_offset(text: &str) -> Option<(FixedOffset, &str)> {
    let numeric = cached_regex(&OFFSET_PREFIX, OFFSET_PREFIX_PATTERN);
    if let Some(caps) = numeric.captures(text) {
        let sign = if &caps[1] == "-" { -1 } else { 1 };
        let hours: i32 = caps[2].parse().ok()?;
        let minutes: i32 = caps.get(3).map_or(Some(0), |m| m.as_str().parse().ok())?;
        let offset = FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))?;
        let end = caps.get(0).map_or(0, |m| m.end());
        return Some((offset, &text[end..]));
    }

    let named = cached_regex(&ZONE_NAME_PREFIX, ZONE_NAME_PREFIX_PATTERN);
    let caps = named.captures(text)?;
    let offset = if caps[1].eq_ignore_ascii_case("SGT") {
        singapore()
    } else {
        FixedOffset::east_opt(0)?
    };
    let end = caps.get(0).map_or(0, |m| m.end());
    Some((offset, &text[end..]))
}

fn localize(naive: NaiveDateTime, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    offset.from_local_datetime(&naive).single()
}
