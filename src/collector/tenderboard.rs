use super::{element_lines, fetch_paged, next_page_url, PageFetcher, Portal};
use crate::constants::{DEFAULT_MAX_PAGES, TENDERBOARD_URL};
use crate::dates::{parse_partial_day_month, DateWindow, YearBias};
use crate::errors::AppResult;
use crate::models::{PortalKind, RawItem, Source};
use crate::utils::{cached_regex, cached_selector, collapse_whitespace, first_capture};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use tracing::debug;
use url::Url;

const VIEW_LINK_SELECTOR: &str = "a[class*='OpenDeals-viewLink']";
const LOGO_SELECTOR: &str = "img.agency-logo, div.agency-logo img, img[alt]";
const CELL_SELECTOR: &str = "div.mdl-cell";
const ANCHOR_SELECTOR: &str = "a[href]";
const ROW_CLASS: &str = "mdl-grid";
const NEXT_PAGE_SELECTOR: &str = "li.btn-next-page:not(.disabled) a[href]";

const INDUSTRY_PATTERN: &str = r"Industry:\s*(.+?)(?:\n|$)";
const RANGE_SEPARATOR_PATTERN: &str = r"\s*[-–]\s*";
const DAY_MONTH_PATTERN: &str = r"(\d{1,2}[-/\s]+[A-Za-z]{3}(?:[-/\s]+\d{2,4})?)";
const LEADING_DIGIT_PATTERN: &str = r"^\d";

const UNKNOWN_BUYER: &str = "TenderBoard (Unknown Buyer)";
const DEFAULT_INDUSTRY: &str = "General";
/// Cells longer than this are descriptions, not date ranges.
const MAX_DATE_CELL_LEN: usize = 100;

static VIEW_LINK: OnceLock<Selector> = OnceLock::new();
static LOGO: OnceLock<Selector> = OnceLock::new();
static CELL: OnceLock<Selector> = OnceLock::new();
static ANCHOR: OnceLock<Selector> = OnceLock::new();
static NEXT_PAGE: OnceLock<Selector> = OnceLock::new();
static INDUSTRY: OnceLock<Regex> = OnceLock::new();
static RANGE_SEPARATOR: OnceLock<Regex> = OnceLock::new();
static DAY_MONTH: OnceLock<Regex> = OnceLock::new();
static LEADING_DIGIT: OnceLock<Regex> = OnceLock::new();

/// TenderBoard's open deals for Singapore.
#[derive(Debug, Clone)]
pub struct TenderBoardPortal {
    url: String,
    max_pages: usize,
}

impl TenderBoardPortal {
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

impl Default for TenderBoardPortal {
    fn default() -> Self {
        Self::new(TENDERBOARD_URL)
    }
}

#[async_trait]
impl Portal for TenderBoardPortal {
    fn kind(&self) -> PortalKind {
        PortalKind::TenderBoard
    }

    async fn fetch(
        &self,
        fetcher: &PageFetcher,
        window: &DateWindow,
        now: DateTime<FixedOffset>,
    ) -> AppResult<Vec<RawItem>> {
        let today = now.date_naive();
        fetch_paged(fetcher, &self.url, self.max_pages, |html, url| {
            (parse_deals(html, window, today), next_page(html, url))
        })
        .await
    }
}

/// The pager's next link; the last page disables it.
pub fn next_page(html: &str, current_url: &str) -> Option<String> {
    next_page_url(html, current_url, cached_selector(&NEXT_PAGE, NEXT_PAGE_SELECTOR))
}

/// Reads every deal row on the page.
///
/// A deal whose start date falls outside `window` is skipped. Deals without a
/// readable date are kept.
pub fn parse_deals(html: &str, window: &DateWindow, today: NaiveDate) -> Vec<RawItem> {
    let document = Html::parse_document(html);
    let link_selector = cached_selector(&VIEW_LINK, VIEW_LINK_SELECTOR);

    let mut items = Vec::new();
    for link in document.select(link_selector) {
        let title = collapse_whitespace(&link.text().collect::<String>());
        if title.is_empty() {
            continue;
        }
        let Some(row) = enclosing_row(link) else {
            continue;
        };

        let lines = element_lines(row);
        let candidates = candidate_lines(&lines, &title);
        let (published, closing) = match date_range(row, today) {
            Some((start, end)) => (Some(start), end),
            None => (None, None),
        };

        if let Some(published) = published {
            if !window.contains_day(published) {
                debug!(title = title.as_str(), published = %published, "Skipping deal outside window");
                continue;
            }
        }

        let mut item = RawItem::new(Source::TenderBoard, title);
        item.industry = first_capture(&INDUSTRY, INDUSTRY_PATTERN, &lines.join("\n"))
            .unwrap_or_else(|| DEFAULT_INDUSTRY.to_string());
        item.calling_entity = buyer(row, &candidates);
        item.ref_no = reference(&candidates).unwrap_or_default();
        item.published = published.map(format_day).unwrap_or_default();
        item.closing_date = closing.map(format_day).unwrap_or_default();
        item.link = deal_link(link, row);
        items.push(item);
    }
    items
}

/// Nearest ancestor `div` carrying the grid row class.
fn enclosing_row(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element.ancestors().filter_map(ElementRef::wrap).find(|ancestor| {
        ancestor.value().name() == "div"
            && ancestor
                .value()
                .attr("class")
                .is_some_and(|class| class.contains(ROW_CLASS))
    })
}

/// Row lines that may hold the buyer or reference.
fn candidate_lines(lines: &[String], title: &str) -> Vec<String> {
    lines
        .iter()
        .filter(|line| {
            line.as_str() != title
                && !line.contains("Industry:")
                && !line.contains("Published")
                && !line.contains("Closes")
                && line.chars().count() >= 3
        })
        .cloned()
        .collect()
}

fn buyer(row: ElementRef<'_>, candidates: &[String]) -> String {
    let logo_selector = cached_selector(&LOGO, LOGO_SELECTOR);
    let logo_text = row.select(logo_selector).next().and_then(|logo| {
        logo.value()
            .attr("alt")
            .filter(|alt| !alt.is_empty())
            .or_else(|| logo.value().attr("title"))
    });
    if let Some(text) = logo_text {
        let text = text.trim();
        if text.chars().count() > 2 && !text.to_lowercase().contains("logo") {
            return text.to_string();
        }
    }

    candidates
        .iter()
        .find(|line| !has_digit(line) && !line.contains("EXCLUSIVE"))
        .cloned()
        .unwrap_or_else(|| UNKNOWN_BUYER.to_string())
}

fn reference(candidates: &[String]) -> Option<String> {
    candidates
        .iter()
        .find(|line| {
            (line.starts_with("TO") || line.starts_with("PT") || line.contains("Ref No"))
                && has_digit(line)
        })
        .map(|line| line.replace("Ref No:", "").trim().to_string())
}

/// Start and end of the first cell that reads as a date range.
///
/// The range is either `"start – end"` or two `"DD Mon[ YYYY]"` matches.
fn date_range(row: ElementRef<'_>, today: NaiveDate) -> Option<(NaiveDate, Option<NaiveDate>)> {
    let cell_selector = cached_selector(&CELL, CELL_SELECTOR);
    let separator = cached_regex(&RANGE_SEPARATOR, RANGE_SEPARATOR_PATTERN);
    let day_month = cached_regex(&DAY_MONTH, DAY_MONTH_PATTERN);
    let leading_digit = cached_regex(&LEADING_DIGIT, LEADING_DIGIT_PATTERN);

    for cell in row.select(cell_selector) {
        let flat = element_lines(cell).join(" ");
        if flat.chars().count() > MAX_DATE_CELL_LEN {
            continue;
        }

        let parts: Vec<&str> = separator.split(&flat).collect();
        let bounds = if parts.len() >= 2 && leading_digit.is_match(parts[0]) && has_digit(parts[1]) {
            Some((parts[0].trim().to_string(), parts[1].trim().to_string()))
        } else {
            let matches: Vec<&str> = day_month.find_iter(&flat).map(|m| m.as_str()).collect();
            match (matches.first(), matches.last()) {
                (Some(first), Some(last)) if matches.len() >= 2 => {
                    Some((first.to_string(), last.to_string()))
                }
                _ => None,
            }
        };

        let Some((start_raw, end_raw)) = bounds else {
            continue;
        };
        if let Some(start) = parse_partial_day_month(&start_raw, today, YearBias::Past) {
            let end = parse_partial_day_month(&end_raw, today, YearBias::After(start));
            return Some((start, end));
        }
    }
    None
}

/// The deal's own link, else another TenderBoard link in the row, else the listing page.
fn deal_link(link: ElementRef<'_>, row: ElementRef<'_>) -> String {
    if let Some(url) = link.value().attr("href").and_then(usable_link) {
        return url;
    }
    let anchor_selector = cached_selector(&ANCHOR, ANCHOR_SELECTOR);
    row.select(anchor_selector)
        .filter_map(|anchor| anchor.value().attr("href"))
        .filter_map(usable_link)
        .find(|url| url.contains("tenderboard.biz"))
        .unwrap_or_else(|| TENDERBOARD_URL.to_string())
}

fn usable_link(href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href == "#" || href.contains("javascript") {
        return None;
    }
    Url::parse(TENDERBOARD_URL)
        .and_then(|base| base.join(href))
        .ok()
        .map(|url| url.to_string())
}

fn format_day(day: NaiveDate) -> String {
    day.format("%d %b %Y").to_string()
}

fn has_digit(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit())
}
