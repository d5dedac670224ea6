use super::{fetch_paged, next_page_url, PageFetcher, Portal};
use crate::constants::{DEFAULT_MAX_PAGES, SESAMI_DETAIL_URL, SESAMI_URL};
use crate::dates::{parse_date, DateWindow};
use crate::errors::AppResult;
use crate::models::{PortalKind, RawItem, Source};
use crate::utils::{cached_regex, cached_selector, collapse_whitespace};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use tracing::debug;

const ROW_SELECTOR: &str = "#rfqTender tbody tr";
const CELL_SELECTOR: &str = "td";
const LINK_SELECTOR: &str = "a";
const NEXT_PAGE_SELECTOR: &str =
    "a#rfqTender_next[href]:not(.disabled), #rfqTender_next:not(.disabled) a[href]";
const VIEW_DETAIL_PATTERN: &str = r"viewDetail\('([^']+)',\s*'([^']+)'\)";

/// Buyer, ref, doc type, description, start, closing, submission, action.
const MIN_CELLS: usize = 8;

static ROW: OnceLock<Selector> = OnceLock::new();
static CELL: OnceLock<Selector> = OnceLock::new();
static LINK: OnceLock<Selector> = OnceLock::new();
static NEXT_PAGE: OnceLock<Selector> = OnceLock::new();
static VIEW_DETAIL: OnceLock<Regex> = OnceLock::new();

/// Sesami business opportunities table.
#[derive(Debug, Clone)]
pub struct SesamiPortal {
    url: String,
    max_pages: usize,
}

impl SesamiPortal {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }
}

impl Default for SesamiPortal {
    fn default() -> Self {
        Self::new(SESAMI_URL)
    }
}

#[async_trait]
impl Portal for SesamiPortal {
    fn kind(&self) -> PortalKind {
        PortalKind::Sesami
    }

    async fn fetch(
        &self,
        fetcher: &PageFetcher,
        window: &DateWindow,
        _now: DateTime<FixedOffset>,
    ) -> AppResult<Vec<RawItem>> {
        fetch_paged(fetcher, &self.url, self.max_pages, |html, url| {
            (parse_opportunities(html, window), next_page(html, url))
        })
        .await
    }
}

/// The table pager's next link, absent on the last page.
pub fn next_page(html: &str, current_url: &str) -> Option<String> {
    next_page_url(html, current_url, cached_selector(&NEXT_PAGE, NEXT_PAGE_SELECTOR))
}

/// Reads the opportunities table, skipping rows that started outside `window`.
pub fn parse_opportunities(html: &str, window: &DateWindow) -> Vec<RawItem> {
    let document = Html::parse_document(html);
    let row_selector = cached_selector(&ROW, ROW_SELECTOR);
    let cell_selector = cached_selector(&CELL, CELL_SELECTOR);

    let mut items = Vec::new();
    for row in document.select(row_selector) {
        let cells: Vec<ElementRef<'_>> = row.select(cell_selector).collect();
        if cells.len() < MIN_CELLS {
            continue;
        }
        let text = |idx: usize| collapse_whitespace(&cells[idx].text().collect::<String>());

        let start_raw = text(4);
        let started = parse_date(&start_raw);
        if let Some(started) = started {
            if !window.contains(started) {
                debug!(reference = text(1).as_str(), start = start_raw.as_str(), "Skipping row outside window");
                continue;
            }
        }

        let mut item = RawItem::new(Source::Sesami, text(3));
        item.calling_entity = text(0);
        item.ref_no = text(1);
        item.closing_date = text(5);
        item.published = match started {
            Some(started) => started.format("%Y-%m-%d").to_string(),
            None => start_raw,
        };
        item.link = detail_link(cells[7]);
        item.category = "Sesami Opportunity".to_string();
        items.push(item);
    }
    items
}

/// Turns the action cell's `viewDetail('DOC','HUB')` call into a detail page URL.
fn detail_link(action: ElementRef<'_>) -> String {
    let link_selector = cached_selector(&LINK, LINK_SELECTOR);
    let Some(anchor) = action.select(link_selector).next() else {
        return String::new();
    };
    let href = anchor.value().attr("href").unwrap_or_default();
    let onclick = anchor.value().attr("onclick").unwrap_or_default();

    let re = cached_regex(&VIEW_DETAIL, VIEW_DETAIL_PATTERN);
    match re.captures(href).or_else(|| re.captures(onclick)) {
        Some(caps) => format!(
            "{SESAMI_DETAIL_URL}?documentID={}&hubID={}",
            &caps[1], &caps[2]
        ),
        None => href.to_string(),
    }
}
