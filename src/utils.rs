use regex::Regex;
use scraper::Selector;
use std::sync::OnceLock;
use std::time::Duration;

/// Returns the regex cached in `cell`, compiling `pattern` on first use.
///
/// Patterns are compile-time constants, so a failure here is a programming error.
pub fn cached_regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("pattern is a valid regex"))
}

/// First capture group of the cached `pattern` in `text`, trimmed; `None` when
/// there is no match or the group is blank.
pub fn first_capture(cell: &'static OnceLock<Regex>, pattern: &str, text: &str) -> Option<String> {
    cached_regex(cell, pattern)
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Returns the CSS selector cached in `cell`, parsing `css` on first use.
pub fn cached_selector(cell: &'static OnceLock<Selector>, css: &str) -> &'static Selector {
    cell.get_or_init(|| Selector::parse(css).expect("selector is valid CSS"))
}

/// Collapses runs of whitespace (including newlines and non-breaking spaces) into
/// single spaces and trims the result.
pub fn collapse_whitespace(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

pub fn kb_from_bytes(bytes: u64) -> f64 {
    bytes as f64 / 1024.0
}

pub fn round_two_decimals(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
