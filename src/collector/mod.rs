//! Collection of raw items from GeBIZ feeds and the scraped portals.
//!
//! The RSS side fetches many feeds with bounded concurrency. Each portal is a
//! bespoke client behind the [`Portal`] trait: it downloads its listing pages (or
//! data payload) through the shared [`PageFetcher`] and hands the content to a
//! pure parse function, so the markup heuristics can be tested without a network.

pub mod ariba;
pub mod gebiz_listing;
pub mod jpmc;
pub mod page_fetcher;
pub mod retry;
pub mod rss_fetcher;
pub mod rss_parser;
pub mod sesami;
pub mod stlogs;
pub mod tenderboard;

pub use ariba::AribaPortal;
pub use gebiz_listing::GebizListingPortal;
pub use jpmc::JpmcPortal;
pub use page_fetcher::{Page, PageFetcher};
pub use retry::RetryConfig;
pub use rss_fetcher::{fetch_feeds, fetch_single_feed, FeedReport};
pub use rss_parser::parse_feed;
pub use sesami::SesamiPortal;
pub use stlogs::StLogisticsPortal;
pub use tenderboard::TenderBoardPortal;

use crate::config::ResolvedConfig;
use crate::dates::DateWindow;
use crate::errors::AppResult;
use crate::models::{PortalKind, RawItem};
use crate::utils::collapse_whitespace;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use futures::future::join_all;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info, warn};
use url::Url;

/// A non-RSS procurement source.
#[async_trait]
pub trait Portal: Send + Sync {
    fn kind(&self) -> PortalKind;

    fn name(&self) -> &'static str {
        self.kind().display_name()
    }

    /// Fetches the portal and returns the items relevant to `window`.
    async fn fetch(
        &self,
        fetcher: &PageFetcher,
        window: &DateWindow,
        now: DateTime<FixedOffset>,
    ) -> AppResult<Vec<RawItem>>;
}

/// Builds the client for `kind` against the live portal.
pub fn portal_for(kind: PortalKind, config: &ResolvedConfig) -> Box<dyn Portal> {
    match kind {
        PortalKind::GebizListing => Box::new(GebizListingPortal::default()),
        PortalKind::Sesami => Box::new(SesamiPortal::default().with_max_pages(config.max_pages)),
        PortalKind::TenderBoard => {
            Box::new(TenderBoardPortal::default().with_max_pages(config.max_pages))
        }
        PortalKind::Jpmc => Box::new(JpmcPortal::default()),
        PortalKind::StLogistics => Box::new(StLogisticsPortal::new(config.stlogs_grid_url.clone())),
        PortalKind::Ariba => Box::new(AribaPortal::new(config.ariba_leads_url.clone())),
    }
}

/// Runs every portal concurrently and merges their items in portal order.
///
/// A failing portal is logged and contributes no items.
pub async fn collect_portals(
    portals: &[Box<dyn Portal>],
    fetcher: &PageFetcher,
    window: &DateWindow,
    now: DateTime<FixedOffset>,
) -> Vec<RawItem> {
    if portals.is_empty() {
        return Vec::new();
    }
    info!(portals = portals.len(), "Fetching portals");

    let results = join_all(
        portals
            .iter()
            .map(|portal| async move { (portal.name(), portal.fetch(fetcher, window, now).await) }),
    )
    .await;

    let mut items = Vec::new();
    for (name, result) in results {
        match result {
            Ok(found) => {
                info!(portal = name, items = found.len(), "Fetched portal");
                items.extend(found);
            }
            Err(e) => warn!(portal = name, error = %e, "Portal fetch failed"),
        }
    }
    items
}

/// Fetches `first_url`, then follows each page's next link until there is none,
/// a page repeats, or `max_pages` pages were read.
///
/// `parse_page` receives the page body and its URL and returns the page's items
/// and the next page URL. A failure after the first page ends the walk with
/// the items gathered so far.
pub(crate) async fn fetch_paged<F>(
    fetcher: &PageFetcher,
    first_url: &str,
    max_pages: usize,
    mut parse_page: F,
) -> AppResult<Vec<RawItem>>
where
    F: FnMut(&str, &str) -> (Vec<RawItem>, Option<String>) + Send,
{
    let max_pages = max_pages.max(1);
    let mut items = Vec::new();
    let mut visited = HashSet::new();
    let mut next = Some(first_url.to_string());
    let mut pages = 0;

    while let Some(url) = next.take() {
        if pages == max_pages {
            info!(url = url.as_str(), max_pages, "Page limit reached");
            break;
        }
        if !visited.insert(url.clone()) {
            break;
        }
        let body = match fetcher.fetch_text(&url).await {
            Ok(body) => body,
            Err(e) if pages > 0 => {
                warn!(url = url.as_str(), page = pages + 1, error = %e, "Stopping pagination");
                break;
            }
            Err(e) => return Err(e),
        };
        pages += 1;

        let (found, next_url) = parse_page(&body, &url);
        debug!(url = url.as_str(), page = pages, items = found.len(), "Parsed listing page");
        items.extend(found);
        next = next_url;
    }
    Ok(items)
}

/// Absolute URL of the first `selector` match's `href`, resolved against
/// `current_url`. Script and fragment links do not count.
pub(crate) fn next_page_url(html: &str, current_url: &str, selector: &Selector) -> Option<String> {
    let document = Html::parse_document(html);
    let href = document
        .select(selector)
        .find_map(|anchor| anchor.value().attr("href"))?
        .trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    Url::parse(current_url)
        .ok()?
        .join(href)
        .ok()
        .map(|url| url.to_string())
}

/// Reads a JSON string, number or bool as trimmed text; anything else is empty.
pub(crate) fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

/// First non-blank value.
pub(crate) fn first_non_empty(values: &[&str]) -> String {
    values
        .iter()
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Non-empty text nodes under `element`, whitespace-collapsed, in document order.
///
/// Approximates the rendered lines of a block of markup.
pub(crate) fn element_lines(element: ElementRef<'_>) -> Vec<String> {
    element
        .text()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect()
}

/// [`element_lines`] joined with newlines.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element_lines(element).join("\n")
}
