//! Field extraction from free-text titles and summaries.
//!
//! Every function is a best-effort heuristic: it returns an empty string when
//! nothing recognizable is found.

use crate::utils::{cached_regex, first_capture};
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock, PoisonError};

const TENDER_NUMBER_PATTERNS: [&str; 10] = [
    r"(?i)ITQ[:\s#]*([A-Z0-9\-/]{4,})",
    r"(?i)ITT[:\s#]*([A-Z0-9\-/]{4,})",
    r"(?i)Quotation No\.?[:\s#]*([A-Z0-9\-/]+)",
    r"(?i)Tender No\.?[:\s#]*([A-Z0-9\-/]+)",
    r"(?i)Document No\.?[:\s#]*([A-Z0-9\-/]+)",
    // Ariba document id
    r"(?i)Doc\s*([0-9]{8,})",
    r"\b([0-9]{9,15})\b",
    r"(?i)\b(Q[/-]?20\d{2}[/-]\d+)\b",
    r"(?i)\b(T[/-]?20\d{2}[/-]\d+)\b",
    // GeBIZ document codes such as HDB000ETT25000296
    r"(?i)\b([A-Z]{2,}\d{6,}[A-Z]{2,}\d{5,})\b",
];
static TENDER_NUMBERS: OnceLock<Vec<Regex>> = OnceLock::new();

const CLOSING_WITH_TIME_PATTERN: &str = r"(?i)Closing (?:on|Date)[:\s]+([0-9]{1,2}[/\-\s][A-Za-z0-9]{1,3}[/\-\s][0-9]{2,4})\s+([0-9]{1,2}:[0-9]{2}(?::[0-9]{2})?(?:\s*[AP]M)?)";
const CLOSING_DATE_PATTERN: &str =
    r"(?i)Closing (?:on|Date)[:\s]+([0-9]{1,2}[/\-\s][A-Za-z0-9]{1,3}[/\-\s][0-9]{2,4})";
const SECONDS_PATTERN: &str = r"^(\d{1,2}:\d{2}):\d{2}(.*)$";
static CLOSING_WITH_TIME: OnceLock<Regex> = OnceLock::new();
static CLOSING_DATE: OnceLock<Regex> = OnceLock::new();
static SECONDS: OnceLock<Regex> = OnceLock::new();

const ENTITY_BEFORE_PIPE_PATTERN: &str =
    r"(?im)(?:Agency|Organisation|Organization|Buyer|Calling Entity)[:\s]+([^|\n\r]+?)\s*\|";
const ENTITY_BEFORE_KEYWORD_PATTERN: &str = r"(?im)(?:Agency|Organisation|Organization|Buyer|Calling Entity)[:\s]+([^|\n\r:]+?)\s+(?:Document|Quotation|Tender|Supply|Delivery|Installation)";
const ENTITY_SENTENCE_PATTERN: &str =
    r"(?im)(?:Agency|Organisation|Organization)[:\s]+([A-Z][^|\n\r.]+?)(?:\.|,|\n|$)";
const ENTITY_NOISE_PATTERN: &str = r"(?i)\s+(?:Document|Quotation|Tender|Supply|Delivery|Installation|Commissioning|ITQ|ITT).*$";
static ENTITY_BEFORE_PIPE: OnceLock<Regex> = OnceLock::new();
static ENTITY_BEFORE_KEYWORD: OnceLock<Regex> = OnceLock::new();
static ENTITY_SENTENCE: OnceLock<Regex> = OnceLock::new();
static ENTITY_NOISE: OnceLock<Regex> = OnceLock::new();

const LABELLED_PUBLISHED_PATTERN: &str =
    r"(?i)(?:Published|Posted|Date)[:\s]+([0-9]{1,2}[/-][0-9]{1,2}[/-][0-9]{2,4})";
const ANY_NUMERIC_DATE_PATTERN: &str = r"([0-9]{1,2}[/-][0-9]{1,2}[/-][0-9]{4})";
static LABELLED_PUBLISHED: OnceLock<Regex> = OnceLock::new();
static ANY_NUMERIC_DATE: OnceLock<Regex> = OnceLock::new();

static FIELD_PATTERNS: OnceLock<Mutex<HashMap<String, Vec<Regex>>>> = OnceLock::new();

/// Value following `label` (`"Label: value"`), up to the end of the line or
/// the next well-known label.
pub fn extract_field(text: &str, label: &str) -> String {
    if text.is_empty() || label.is_empty() {
        return String::new();
    }
    field_patterns(label)
        .iter()
        .filter_map(|re| {
            re.captures(text)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim().to_string())
        })
        .find(|value| !value.is_empty() && value != ":")
        .unwrap_or_default()
}

/// The two patterns for `label`, compiled on first use and kept per label.
fn field_patterns(label: &str) -> Vec<Regex> {
    let cache = FIELD_PATTERNS.get_or_init(|| Mutex::new(HashMap::new()));
    let mut cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
    cache
        .entry(label.to_string())
        .or_insert_with(|| {
            let label = regex::escape(label);
            [
                format!(r"(?im){label}[:\s]+([^\n\r]+?)(?:\s*\n|\s*$)"),
                format!(
                    r"(?im){label}[:\s]+(.+?)(?:Agency|Organisation|Closing|Published|Document|Quotation|Tender|$)"
                ),
            ]
            .iter()
            .filter_map(|pattern| Regex::new(pattern).ok())
            .collect()
        })
        .clone()
}

/// ITQ/ITT, quotation, tender or document number found in the title or summary.
pub fn extract_tender_number(title: &str, summary: &str) -> String {
    let combined = format!("{title} {summary}");
    let patterns = TENDER_NUMBERS.get_or_init(|| {
        TENDER_NUMBER_PATTERNS
            .iter()
            .map(|pattern| Regex::new(pattern).expect("tender number pattern is a valid regex"))
            .collect()
    });
    patterns
        .iter()
        .filter_map(|re| re.captures(&combined).and_then(|caps| caps.get(1)))
        .map(|m| m.as_str().trim().to_string())
        .find(|number| !number.is_empty())
        .unwrap_or_default()
}

/// Closing date and time from `"Closing on 31/12/2024 23:59"` style text.
///
/// Seconds are dropped from the time.
pub fn extract_closing_info(summary: &str) -> (String, String) {
    if summary.is_empty() {
        return (String::new(), String::new());
    }
    if let Some(caps) = cached_regex(&CLOSING_WITH_TIME, CLOSING_WITH_TIME_PATTERN).captures(summary)
    {
        return (caps[1].trim().to_string(), strip_seconds(caps[2].trim()));
    }
    match first_capture(&CLOSING_DATE, CLOSING_DATE_PATTERN, summary) {
        Some(date) => (date, String::new()),
        None => (String::new(), String::new()),
    }
}

/// `"13:00:00"` becomes `"13:00"`, `"1:30:00 PM"` becomes `"1:30 PM"`.
pub fn strip_seconds(time: &str) -> String {
    if time.matches(':').count() < 2 {
        return time.to_string();
    }
    cached_regex(&SECONDS, SECONDS_PATTERN)
        .replace(time, "$1$2")
        .into_owned()
}

/// Agency or organisation named in the summary or title.
pub fn extract_calling_entity(summary: &str, title: &str) -> String {
    if summary.is_empty() && title.is_empty() {
        return String::new();
    }
    let combined = format!("{summary} {title}");
    let patterns = [
        (&ENTITY_BEFORE_PIPE, ENTITY_BEFORE_PIPE_PATTERN),
        (&ENTITY_BEFORE_KEYWORD, ENTITY_BEFORE_KEYWORD_PATTERN),
        (&ENTITY_SENTENCE, ENTITY_SENTENCE_PATTERN),
    ];

    patterns
        .into_iter()
        .filter_map(|(cell, pattern)| first_capture(cell, pattern, &combined))
        .map(|raw| clean_entity(&raw))
        .find(|entity| (4..100).contains(&entity.chars().count()))
        .unwrap_or_default()
}

fn clean_entity(raw: &str) -> String {
    let mut entity = raw.split('|').next().unwrap_or_default().trim();

    // Keep short prefixes such as "NUS: Faculty of Science"
    if let Some((head, _)) = entity.split_once(':') {
        if head.chars().count() > 5 {
            entity = head.trim();
        }
    }

    cached_regex(&ENTITY_NOISE, ENTITY_NOISE_PATTERN)
        .replace(entity, "")
        .trim()
        .to_string()
}

/// Numeric publish date (`d/m/yyyy`) mentioned in a summary, preferring one
/// next to a "Published", "Posted" or "Date" label.
pub fn extract_published_date(summary: &str) -> String {
    first_capture(&LABELLED_PUBLISHED, LABELLED_PUBLISHED_PATTERN, summary)
        .or_else(|| first_capture(&ANY_NUMERIC_DATE, ANY_NUMERIC_DATE_PATTERN, summary))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_field_stops_at_line_end() {
        let text = "Agency: Ministry of Health\nClosing on 12/01/2026";
        assert_eq!(extract_field(text, "Agency"), "Ministry of Health");
        assert_eq!(extract_field(text, "Awarded To"), "");
        assert_eq!(extract_field("", "Agency"), "");
    }

    #[test]
    fn field_patterns_are_compiled_once_per_label() {
        let first = field_patterns("Award Value");
        let second = field_patterns("Award Value");
        assert_eq!(first.len(), 2);
        let sources = |patterns: &[Regex]| {
            patterns.iter().map(|re| re.as_str().to_string()).collect::<Vec<_>>()
        };
        assert_eq!(sources(&first), sources(&second));

        let cache = FIELD_PATTERNS.get().unwrap().lock().unwrap();
        assert!(cache.contains_key("Award Value"));
        assert!(cache["Award Value"][0].as_str().starts_with("(?im)Award"));
    }

    #[test]
    fn extract_field_takes_rest_of_line() {
        let text = "Awarded To: Acme Pte Ltd Published 01/01/2026";
        assert_eq!(extract_field(text, "Awarded To"), "Acme Pte Ltd Published 01/01/2026");
        let text = "Buyer: NEA Tender No: T/2026/1";
        assert_eq!(extract_field(text, "Buyer"), "NEA Tender No: T/2026/1");
    }

    #[test]
    fn tender_number_prefers_itq() {
        assert_eq!(
            extract_tender_number("Supply of chairs ITQ: NEA000ETQ26000011", ""),
            "NEA000ETQ26000011"
        );
        assert_eq!(
            extract_tender_number("Repairs", "Quotation No. Q/2026/0042 closes soon"),
            "Q/2026/0042"
        );
    }

    #[test]
    fn tender_number_falls_back_to_codes() {
        assert_eq!(extract_tender_number("RFI Doc 12345678", ""), "12345678");
        assert_eq!(extract_tender_number("Event 1110001484 opened", ""), "1110001484");
        assert_eq!(
            extract_tender_number("Cleaning HDB000ETT25000296", ""),
            "HDB000ETT25000296"
        );
        assert_eq!(extract_tender_number("Nothing to see", "here"), "");
    }

    #[test]
    fn closing_info_with_time() {
        assert_eq!(
            extract_closing_info("Closing on 31/12/2024 23:59:00 for all bidders"),
            ("31/12/2024".to_string(), "23:59".to_string())
        );
        assert_eq!(
            extract_closing_info("Closing Date: 31-Dec-2024 5:00 PM"),
            ("31-Dec-2024".to_string(), "5:00 PM".to_string())
        );
    }

    #[test]
    fn closing_info_without_time() {
        assert_eq!(
            extract_closing_info("Closing on 05 Jan 2026"),
            ("05 Jan 2026".to_string(), String::new())
        );
        assert_eq!(extract_closing_info("no closing here"), (String::new(), String::new()));
    }

    #[test]
    fn strip_seconds_keeps_meridiem() {
        assert_eq!(strip_seconds("13:00:00"), "13:00");
        assert_eq!(strip_seconds("1:30:00 PM"), "1:30 PM");
        assert_eq!(strip_seconds("13:00"), "13:00");
    }

    #[test]
    fn calling_entity_before_pipe() {
        assert_eq!(
            extract_calling_entity("Agency: Land Transport Authority | Closing soon", ""),
            "Land Transport Authority"
        );
    }

    #[test]
    fn calling_entity_before_keyword() {
        assert_eq!(
            extract_calling_entity("Organisation: National Parks Board Supply of plants", ""),
            "National Parks Board"
        );
    }

    #[test]
    fn calling_entity_sentence_and_length_limits() {
        assert_eq!(
            extract_calling_entity("Agency: Public Utilities Board. Other text", ""),
            "Public Utilities Board"
        );
        assert_eq!(extract_calling_entity("Agency: MOE.", ""), "");
        assert_eq!(extract_calling_entity("", ""), "");
    }

    #[test]
    fn published_date_from_summary() {
        assert_eq!(extract_published_date("Posted: 03/02/2026 by buyer"), "03/02/2026");
        assert_eq!(extract_published_date("opened 3-2-2026"), "3-2-2026");
        assert_eq!(extract_published_date("no dates"), "");
    }
}
