use super::page_fetcher::PageFetcher;
use super::rss_parser::parse_feed;
use crate::errors::{AppError, AppResult};
use crate::models::RawItem;
use crate::ui;
use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Outcome of fetching one feed.
#[derive(Debug)]
enum FeedOutcome {
    Items(Vec<RawItem>),
    Empty,
    Failed(String),
}

type FeedTaskResult = Result<(String, FeedOutcome), AppError>;

/// Items and bookkeeping from one round of feed fetching.
#[derive(Debug, Default)]
pub struct FeedReport {
    pub items: Vec<RawItem>,
    /// Feeds that returned at least one item
    pub successful: usize,
    /// Feeds that returned a valid document with no items
    pub empty: usize,
    pub failed: usize,
    /// One message per failed feed
    pub errors: Vec<String>,
}

impl FeedReport {
    pub fn attempted(&self) -> usize {
        self.successful + self.empty + self.failed
    }
}

/// Fetches and parses one feed.
///
/// A feed without items is an empty success, unless the server did not answer
/// with XML or RSS content at all.
pub async fn fetch_single_feed(
    fetcher: &PageFetcher,
    url: &str,
    today: NaiveDate,
) -> AppResult<Vec<RawItem>> {
    let page = fetcher.fetch(url).await?;
    let items = match parse_feed(page.body.as_bytes(), url, today) {
        Ok(items) => items,
        Err(e) if !is_xml_content_type(&page.content_type) => {
            return Err(not_xml_error(&page.content_type, e))
        }
        Err(e) => return Err(e),
    };

    if items.is_empty() && !is_xml_content_type(&page.content_type) {
        return Err(AppError::ParseError(format!(
            "Not XML/RSS content (got: {})",
            page.content_type
        )));
    }
    Ok(items)
}

fn not_xml_error(content_type: &str, cause: AppError) -> AppError {
    AppError::ParseError(format!(
        "Not XML/RSS content (got: {content_type}): {cause}"
    ))
}

fn is_xml_content_type(content_type: &str) -> bool {
    let lower = content_type.to_lowercase();
    lower.contains("xml") || lower.contains("rss")
}

/// Fetches every feed in `urls` with bounded concurrency.
///
/// Failures are logged and counted; they never abort the run.
///
/// # Errors
///
/// Returns an error only if the progress bar cannot be created.
pub async fn fetch_feeds(
    fetcher: &PageFetcher,
    urls: &[String],
    concurrent_fetches: usize,
    today: NaiveDate,
) -> AppResult<FeedReport> {
    let mut report = FeedReport::default();
    if urls.is_empty() {
        warn!("No feed URLs to fetch");
        return Ok(report);
    }

    let pb = Arc::new(ui::create_progress_bar(urls.len() as u64)?);
    info!(feeds = urls.len(), concurrency = concurrent_fetches, "Fetching feeds");

    let semaphore = Arc::new(Semaphore::new(concurrent_fetches.max(1)));
    let fetcher = Arc::new(fetcher.clone());
    let mut handles: Vec<JoinHandle<FeedTaskResult>> = Vec::with_capacity(urls.len());

    for url in urls {
        let semaphore = semaphore.clone();
        let fetcher = fetcher.clone();
        let pb = pb.clone();
        let url = url.clone();

        let handle = tokio::spawn(async move {
            let _permit = semaphore.acquire().await.map_err(|e| {
                AppError::IoError(format!("Failed to acquire semaphore permit: {e}"))
            })?;

            pb.set_message(feed_label(&url).to_string());
            let outcome = match fetch_single_feed(&fetcher, &url, today).await {
                Ok(items) if items.is_empty() => {
                    warn!(feed_url = url.as_str(), "Feed has no entries");
                    FeedOutcome::Empty
                }
                Ok(items) => {
                    info!(feed_url = url.as_str(), items = items.len(), "Fetched feed");
                    FeedOutcome::Items(items)
                }
                Err(e) => {
                    warn!(feed_url = url.as_str(), error = %e, "Failed to fetch feed");
                    FeedOutcome::Failed(format!("{url}: {e}"))
                }
            };
            Ok((url, outcome))
        });
        handles.push(handle);
    }

    for handle in handles {
        pb.inc(1);
        match handle.await {
            Ok(Ok((_url, FeedOutcome::Items(items)))) => {
                report.successful += 1;
                report.items.extend(items);
            }
            Ok(Ok((_url, FeedOutcome::Empty))) => report.empty += 1,
            Ok(Ok((_url, FeedOutcome::Failed(msg)))) => {
                report.failed += 1;
                report.errors.push(msg);
            }
            Ok(Err(e)) => {
                report.failed += 1;
                report.errors.push(format!("Task error: {e}"));
            }
            Err(e) => {
                report.failed += 1;
                report.errors.push(format!("Task join error: {e}"));
            }
        }
    }

    pb.finish_with_message(format!(
        "Fetched {} feed(s), {} empty, {} failed",
        report.successful, report.empty, report.failed
    ));
    info!(
        attempted = report.attempted(),
        successful = report.successful,
        empty = report.empty,
        failed = report.failed,
        items = report.items.len(),
        "Feed fetch completed"
    );
    if report.items.is_empty() && report.successful == 0 {
        warn!("No items retrieved from any feed");
    }

    Ok(report)
}

/// Short name for progress messages: the feed file name.
fn feed_label(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}
