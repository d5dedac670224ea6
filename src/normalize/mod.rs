//! Normalization of raw collector items into export records.
//!
//! Each source fills [`RawItem`] differently; [`mapping`] decides headers and
//! per-source overrides, and [`extract`] recovers fields from free text when a
//! source leaves them empty.

pub mod extract;
pub mod mapping;

pub use extract::{
    extract_calling_entity, extract_closing_info, extract_field, extract_published_date,
    extract_tender_number, strip_seconds,
};
pub use mapping::{map_source, SourceMapping};

use crate::catalog::FeedCatalog;
use crate::dates::{parse_date, parse_date_fuzzy, parse_day, parse_time};
use crate::models::{RawItem, Source, Tender};
use crate::utils::cached_regex;
use chrono::NaiveDate;
use rayon::prelude::*;
use regex::Regex;
use std::sync::OnceLock;
use tracing::info;

const ISO_DAY_PATTERN: &str = r"^\d{4}-\d{2}-\d{2}";
const CLOCK_PATTERN: &str = r"\d{1,2}:\d{2}";
static ISO_DAY: OnceLock<Regex> = OnceLock::new();
static CLOCK: OnceLock<Regex> = OnceLock::new();

/// Normalizes `items` in parallel, keeping their order.
///
/// Items that cannot be placed (no usable title, unknown GeBIZ category) are
/// dropped and the remaining rows are numbered from 1.
pub fn normalize_items(items: &[RawItem], catalog: &FeedCatalog, today: NaiveDate) -> Vec<Tender> {
    let mut tenders: Vec<Tender> = items
        .par_iter()
        .filter_map(|item| normalize_item(item, catalog, today))
        .collect();

    for (idx, tender) in tenders.iter_mut().enumerate() {
        tender.no = idx + 1;
    }

    info!(
        raw = items.len(),
        normalized = tenders.len(),
        skipped = items.len() - tenders.len(),
        "Normalized items"
    );
    tenders
}

/// Normalizes one item; `None` when the item is skipped.
pub fn normalize_item(item: &RawItem, catalog: &FeedCatalog, today: NaiveDate) -> Option<Tender> {
    let title = item.title.trim();
    if title.is_empty() && item.summary.trim().is_empty() {
        return None;
    }
    if title.chars().count() < 2 {
        return None;
    }
    let mapping = map_source(item, catalog)?;

    let mut published = if mapping.published_is_today {
        Some(today)
    } else {
        published_day(&item.published, mapping.published_is_iso)
            .or_else(|| day_of(&extract_published_date(&item.summary)))
    };

    let closing_raw = if item.closing_date.trim().is_empty() {
        mapping.closing_fallback.clone().unwrap_or_default()
    } else {
        item.closing_date.trim().to_string()
    };
    let (closing_date, closing_time) = if closing_raw.is_empty() {
        let (date, time) = extract_closing_info(&item.summary);
        (day_of(&date), format_time(&time))
    } else {
        let time = if item.closing_time.trim().is_empty() {
            time_of(&closing_raw)
        } else {
            item.closing_time.trim().to_string()
        };
        (day_of(&closing_raw), format_time(&time))
    };

    // GeBIZ feeds sometimes publish the closing date as the publish date
    if published.is_some() && published == closing_date {
        published = None;
    }

    let tender_number = mapping
        .tender_number
        .clone()
        .or_else(|| non_empty(&item.ref_no))
        .unwrap_or_else(|| extract_tender_number(title, &item.summary));
    let calling_entity = mapping
        .calling_entity
        .clone()
        .or_else(|| non_empty(&item.calling_entity))
        .unwrap_or_else(|| extract_calling_entity(&item.summary, title));

    let is_award = item.is_award
        || (item.source == Source::GebizRss && item.feed_url.contains("_AWD_"));
    let (awarded_to, award_value) = if is_award {
        (
            non_empty(&item.awarded_to)
                .unwrap_or_else(|| extract_field(&item.summary, "Awarded To")),
            non_empty(&item.award_value)
                .unwrap_or_else(|| extract_field(&item.summary, "Award Value")),
        )
    } else {
        (item.awarded_to.trim().to_string(), item.award_value.trim().to_string())
    };

    let mut tender = Tender::new(title, today);
    tender.published_date = published;
    tender.awarded_date = day_of(&item.awarded_date);
    tender.award_value = award_value;
    tender.awarded_to = awarded_to;
    tender.closing_date = closing_date;
    tender.closing_time = closing_time;
    tender.tender_number = tender_number;
    tender.calling_entity = calling_entity;
    tender.link = item.link.trim().to_string();
    tender.main_header = mapping.main_header;
    tender.sub_header = mapping.sub_header;
    tender.sourcing_doc_no = item.sourcing_doc_no.trim().to_string();
    tender.opportunity_amount = item.opportunity_amount.trim().to_string();
    tender.is_award = is_award;
    Some(tender)
}

fn published_day(raw: &str, iso: bool) -> Option<NaiveDate> {
    let raw = raw.trim();
    if iso && cached_regex(&ISO_DAY, ISO_DAY_PATTERN).is_match(raw) {
        return NaiveDate::parse_from_str(&raw[..10], "%Y-%m-%d").ok();
    }
    day_of(raw)
}

/// Calendar date of a free-form value, searching inside the text when the
/// whole value is not a date.
fn day_of(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    parse_day(raw).or_else(|| parse_date_fuzzy(raw).map(|dt| dt.date_naive()))
}

/// `HH:MM` of a date value that carries a time of day, else empty.
fn time_of(raw: &str) -> String {
    if !cached_regex(&CLOCK, CLOCK_PATTERN).is_match(raw) {
        return String::new();
    }
    parse_date(raw)
        .or_else(|| parse_date_fuzzy(raw))
        .map(|dt| dt.format("%H:%M").to_string())
        .unwrap_or_default()
}

/// `HH:MM` when the time can be read, otherwise the text without seconds.
fn format_time(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }
    let stripped = strip_seconds(raw);
    match parse_time(&stripped) {
        Some(time) => time.format("%H:%M").to_string(),
        None => stripped,
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
