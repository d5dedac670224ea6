use super::{element_text, PageFetcher, Portal};
use crate::constants::{GEBIZ_BASE_URL, GEBIZ_LISTING_URL, LISTING_FEED_URL};
use crate::dates::{parse_date_fuzzy, DateWindow};
use crate::errors::AppResult;
use crate::models::{PortalKind, RawItem, Source};
use crate::utils::{cached_regex, cached_selector, collapse_whitespace, first_capture};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;
use url::Url;

const CONTAINER_SELECTOR: &str = "div.formColumns_MAIN";
const TITLE_SELECTOR: &str = "a.commandLink_TITLE-BLUE";

const DOC_CODE_PATTERN: &str = r"docCode=([A-Za-z0-9]+)";
const HEADER_DOC_PATTERN: &str = r"(?:-|–)\s*([A-Za-z0-9]+)";
const KEYWORD_DOC_PATTERN: &str =
    r"(?i)(?:Document|Quotation|Tender|ITT|ITQ)\s*(?:No\.?)?[\s:\-]+([A-Za-z0-9\-/]+)";
const SECONDARY_REF_PATTERN: &str =
    r"(?i)/\s*(?:ITQ|ITT|Ref|PR|No\.)\s*(?:ref\.?\s*)?(?:no\.?)?\s*([A-Za-z0-9\-/]+)";
const CATEGORY_PATTERN: &str =
    r"(?i)(?:Category|Procurement Type|Procurement Category)[\s:]+(.*?)(?:\n|$)";
const CLOSING_PATTERN: &str = r"(?i)(?:Closing on|Closing Date|Closed)[\s\S]*?(\d{1,2}\s+[A-Za-z]{3}\s+\d{4})\s*(\d{1,2}:\d{2}\s?[AP]M)";
const PUBLISHED_PATTERN: &str =
    r"(?i)(?:Published|Posted)[\s\S]*?(\d{1,2}\s+[A-Za-z]{3}\s+\d{4})\s*(\d{1,2}:\d{2}\s?[AP]M)";
const PUBLISHED_LINE_PATTERN: &str = r"(?i)(?:Published|Posted)[\s:]+(.*?)(?:\n|$)";
const AGENCY_PATTERN: &str = r"Agency[\s:]+(.*?)(?:\n|$)";
const AWARDED_TO_PATTERN: &str = r"(?i)Awarded to\s+(.*?)(?:\r?\n|$)";
const AWARD_VALUE_PATTERN: &str = r"(?i)Award Value\s+(.*?)(?:\r?\n|$)";
const AWARDED_DATE_PATTERN: &str = r"Awarded\s+(\d{1,2}\s+[A-Za-z]{3}\s+\d{4})";

static CONTAINER: OnceLock<Selector> = OnceLock::new();
static TITLE: OnceLock<Selector> = OnceLock::new();
static DOC_CODE: OnceLock<Regex> = OnceLock::new();
static HEADER_DOC: OnceLock<Regex> = OnceLock::new();
static KEYWORD_DOC: OnceLock<Regex> = OnceLock::new();
static SECONDARY_REF: OnceLock<Regex> = OnceLock::new();
static CATEGORY: OnceLock<Regex> = OnceLock::new();
static CLOSING: OnceLock<Regex> = OnceLock::new();
static PUBLISHED: OnceLock<Regex> = OnceLock::new();
static PUBLISHED_LINE: OnceLock<Regex> = OnceLock::new();
static AGENCY: OnceLock<Regex> = OnceLock::new();
static AWARDED_TO: OnceLock<Regex> = OnceLock::new();
static AWARD_VALUE: OnceLock<Regex> = OnceLock::new();
static AWARDED_DATE: OnceLock<Regex> = OnceLock::new();

/// The GeBIZ opportunity listing page, read as served.
#[derive(Debug, Clone)]
pub struct GebizListingPortal {
    url: String,
}

impl GebizListingPortal {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Default for GebizListingPortal {
    fn default() -> Self {
        Self::new(GEBIZ_LISTING_URL)
    }
}

#[async_trait]
impl Portal for GebizListingPortal {
    fn kind(&self) -> PortalKind {
        PortalKind::GebizListing
    }

    async fn fetch(
        &self,
        fetcher: &PageFetcher,
        window: &DateWindow,
        _now: DateTime<FixedOffset>,
    ) -> AppResult<Vec<RawItem>> {
        let html = fetcher.fetch_text(&self.url).await?;
        Ok(parse_listing(&html, window))
    }
}

/// Extracts listing items from a GeBIZ results page.
///
/// Items published after the window end are dropped. Earlier items are kept;
/// the date filter downstream has the final say.
pub fn parse_listing(html: &str, window: &DateWindow) -> Vec<RawItem> {
    let document = Html::parse_document(html);
    let container_selector = cached_selector(&CONTAINER, CONTAINER_SELECTOR);
    let title_selector = cached_selector(&TITLE, TITLE_SELECTOR);

    let mut items = Vec::new();
    for container in document.select(container_selector) {
        let Some(title_el) = container.select(title_selector).next() else {
            continue;
        };

        let title = collapse_whitespace(&title_el.text().collect::<String>());
        let href = title_el.value().attr("href").unwrap_or_default();
        let text = element_text(container);

        let published = published_text(&text);
        if let (Some(end), Some(published_at)) = (window.end, parse_date_fuzzy(&published)) {
            if published_at > end {
                continue;
            }
        }

        let mut item = RawItem::new(Source::GebizListing, title);
        item.link = absolute_link(href);
        item.ref_no = document_number(href, &text);
        item.category = first_capture(&CATEGORY, CATEGORY_PATTERN, &text)
            .unwrap_or_else(|| "Business Opportunities".to_string());
        item.closing_date = date_and_time(&CLOSING, CLOSING_PATTERN, &text).unwrap_or_default();
        item.published = published;
        item.calling_entity = first_capture(&AGENCY, AGENCY_PATTERN, &text)
            .unwrap_or_else(|| "Unknown".to_string());
        item.awarded_to = first_capture(&AWARDED_TO, AWARDED_TO_PATTERN, &text).unwrap_or_default();
        item.award_value =
            first_capture(&AWARD_VALUE, AWARD_VALUE_PATTERN, &text).unwrap_or_default();
        item.awarded_date =
            first_capture(&AWARDED_DATE, AWARDED_DATE_PATTERN, &text).unwrap_or_default();
        item.is_award = !item.awarded_to.is_empty();
        item.feed_url = LISTING_FEED_URL.to_string();
        item.summary = text;
        items.push(item);
    }
    items
}

/// Document number from the link's `docCode`, the header or a labelled field,
/// with any secondary reference appended as `"A / B"`.
fn document_number(href: &str, text: &str) -> String {
    let mut doc = first_capture(&DOC_CODE, DOC_CODE_PATTERN, href)
        .or_else(|| first_capture(&HEADER_DOC, HEADER_DOC_PATTERN, text))
        .or_else(|| first_capture(&KEYWORD_DOC, KEYWORD_DOC_PATTERN, text))
        .unwrap_or_default();

    if let Some(secondary) = first_capture(&SECONDARY_REF, SECONDARY_REF_PATTERN, text) {
        if !doc.contains(&secondary) {
            doc = if doc.is_empty() {
                secondary
            } else {
                format!("{doc} / {secondary}")
            };
        }
    }
    doc
}

fn published_text(text: &str) -> String {
    date_and_time(&PUBLISHED, PUBLISHED_PATTERN, text)
        .or_else(|| first_capture(&PUBLISHED_LINE, PUBLISHED_LINE_PATTERN, text))
        .unwrap_or_default()
}

fn date_and_time(cell: &'static OnceLock<Regex>, pattern: &str, text: &str) -> Option<String> {
    let caps = cached_regex(cell, pattern).captures(text)?;
    Some(format!("{} {}", caps[1].trim(), caps[2].trim()))
}

fn absolute_link(href: &str) -> String {
    let href = href.trim();
    if href.is_empty() || href == "#" || href.starts_with("javascript:") {
        return GEBIZ_LISTING_URL.to_string();
    }
    Url::parse(GEBIZ_BASE_URL)
        .and_then(|base| base.join(href))
        .map(|url| url.to_string())
        .unwrap_or_else(|_| href.to_string())
}
