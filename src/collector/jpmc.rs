use super::{element_lines, PageFetcher, Portal};
use crate::constants::JPMC_URL;
use crate::dates::{month_from_name, DateWindow};
use crate::errors::AppResult;
use crate::models::{PortalKind, RawItem, Source};
use crate::utils::{cached_regex, cached_selector};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use tracing::debug;

const ITEM_SELECTOR: &str = ".jet-listing-grid__item";
const FIELD_SELECTOR: &str = ".jet-listing-dynamic-field__content";
const LAST_PURCHASE_LABEL: &str = "Last Date For Tender Purchase:";
const LAST_PURCHASE_PATTERN: &str = r"(?i)(\d{1,2})(?:ST|ND|RD|TH)?\s+([A-Z]+)\s+(\d{4})";

/// Index, ref, title, -, fee, closing.
const MIN_FIELDS: usize = 6;

static ITEM: OnceLock<Selector> = OnceLock::new();
static FIELD: OnceLock<Selector> = OnceLock::new();
static LAST_PURCHASE: OnceLock<Regex> = OnceLock::new();

/// Jerudong Park Medical Centre tender and quotation board.
#[derive(Debug, Clone)]
pub struct JpmcPortal {
    url: String,
}

impl JpmcPortal {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Default for JpmcPortal {
    fn default() -> Self {
        Self::new(JPMC_URL)
    }
}

#[async_trait]
impl Portal for JpmcPortal {
    fn kind(&self) -> PortalKind {
        PortalKind::Jpmc
    }

    async fn fetch(
        &self,
        fetcher: &PageFetcher,
        window: &DateWindow,
        now: DateTime<FixedOffset>,
    ) -> AppResult<Vec<RawItem>> {
        let html = fetcher.fetch_text(&self.url).await?;
        Ok(parse_tenders(&html, window, now.date_naive()))
    }
}

/// Reads the listing grid.
///
/// Notices whose last purchase date has passed are dropped, unless that date
/// falls inside the window (closed at `today` when the window is open-ended).
pub fn parse_tenders(html: &str, window: &DateWindow, today: NaiveDate) -> Vec<RawItem> {
    let document = Html::parse_document(html);
    let item_selector = cached_selector(&ITEM, ITEM_SELECTOR);
    let field_selector = cached_selector(&FIELD, FIELD_SELECTOR);

    let mut items = Vec::new();
    for grid_item in document.select(item_selector) {
        let fields: Vec<ElementRef<'_>> = grid_item.select(field_selector).collect();
        if fields.len() < MIN_FIELDS {
            continue;
        }
        let ref_no = element_lines(fields[1]).join(" ");
        let title_lines = element_lines(fields[2]);
        let title_text = title_lines.join("\n");
        let closing = element_lines(fields[5]).join(" ").replace('@', "");

        let last_purchase = last_purchase_date(&title_text);
        if let Some(date) = last_purchase {
            if date < today && !expired_in_window(date, window, today) {
                debug!(reference = ref_no.as_str(), last_purchase = %date, "Skipping expired notice");
                continue;
            }
        }

        let mut item = RawItem::new(Source::JpmcBrunei, title_lines.join(" "));
        item.ref_no = ref_no;
        item.link = JPMC_URL.to_string();
        item.published = last_purchase
            .map(|date| date.format("%d %b %Y").to_string())
            .unwrap_or_default();
        item.closing_date = closing.split_whitespace().collect::<Vec<_>>().join(" ");
        items.push(item);
    }
    items
}

/// Parses `"Last Date For Tender Purchase: 5TH JANUARY 2026"` out of the title block.
pub fn last_purchase_date(title_text: &str) -> Option<NaiveDate> {
    let (_, after) = title_text.split_once(LAST_PURCHASE_LABEL)?;
    let caps = cached_regex(&LAST_PURCHASE, LAST_PURCHASE_PATTERN).captures(after)?;
    let day: u32 = caps[1].parse().ok()?;
    let month = month_from_name(&caps[2])?;
    let year: i32 = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn expired_in_window(date: NaiveDate, window: &DateWindow, today: NaiveDate) -> bool {
    let Some(start) = window.start else {
        return false;
    };
    let end = window.end.map(|end| end.date_naive()).unwrap_or(today);
    start.date_naive() <= date && date <= end
}
